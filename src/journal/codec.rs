//! JBD2 描述符块标签（block tag）编解码
//!
//! 对应 lwext4 的 `jbd_extract_block_tag()` / `jbd_write_block_tag()`
//! (`ext4_journal.c`)。
//!
//! Tag 的宽度由 journal superblock 的 incompat 特性位决定，因此不能直接
//! `read_unaligned::<jbd_block_tag>()` 整块搬运：CSUM_V2 关闭时 checksum
//! 字段根本不存在于磁盘上，64BIT 关闭时 blocknr_high 也不存在。这里按字节
//! 手工打包/解包。

use super::types::*;
use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// 从描述符块中解析出的一个 tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractedTag {
    /// 目标文件系统块号（已拼接高位）
    pub blocknr: u64,
    /// Tag flags（JBD_FLAG_*）
    pub flags: u16,
    /// 截断或完整校验和，原样保留以便忠实回写，不做校验
    pub checksum: u32,
    /// 紧随 tag 之后内联的 UUID（仅当未设置 SAME_UUID 时存在）
    pub uuid: Option<[u8; UUID_SIZE]>,
}

/// 计算给定特性位下一个 tag（不含内联 UUID）的字节宽度
///
/// - CSUM_V3：固定 16 字节（隐含 64BIT）。
/// - 否则：blocknr(4) + checksum(2) + flags(2) + \[blocknr_high(4) 当 64BIT\]。
///   `jbd_block_tag` 的 checksum 槽始终保留（即便 CSUM_V2 未协商、此实现
///   也从不校验它），flags 固定位于偏移 6——与 `struct jbd_block_tag` 和
///   原始 C `jbd_tag_bytes()` 一致。
pub fn tag_size(incompat_features: u32) -> usize {
    if incompat_features & JBD_FEATURE_INCOMPAT_CSUM_V3 != 0 {
        return 16;
    }
    let mut size = 4 + 2 + 2; // blocknr + checksum + flags
    if incompat_features & JBD_FEATURE_INCOMPAT_64BIT != 0 {
        size += 4; // blocknr_high
    }
    size
}

/// 从 `buf` 开头解析一个 tag，返回 (tag, 消耗的字节数，含可能的内联 UUID)
///
/// `buf` 必须至少覆盖固定宽度部分；若还需要内联 UUID 而剩余字节不足，返回
/// `ErrorKind::Corrupted`。
pub fn extract_tag(buf: &[u8], incompat_features: u32) -> Result<(ExtractedTag, usize)> {
    let fixed_len = tag_size(incompat_features);
    if buf.len() < fixed_len {
        return Err(Error::new(
            ErrorKind::Corrupted,
            "journal descriptor buffer too short for block tag",
        ));
    }

    let is_v3 = incompat_features & JBD_FEATURE_INCOMPAT_CSUM_V3 != 0;
    let is_64bit = incompat_features & JBD_FEATURE_INCOMPAT_64BIT != 0;

    let (blocknr_low, flags, checksum, blocknr_high) = if is_v3 {
        let blocknr_low = be32(&buf[0..4]);
        let flags = be32(&buf[4..8]) as u16;
        let blocknr_high = be32(&buf[8..12]);
        let checksum = be32(&buf[12..16]);
        (blocknr_low, flags, checksum, blocknr_high)
    } else {
        let mut off = 0usize;
        let blocknr_low = be32(&buf[off..off + 4]);
        off += 4;
        let checksum = be16(&buf[off..off + 2]) as u32;
        off += 2;
        let flags = be16(&buf[off..off + 2]);
        off += 2;
        let blocknr_high = if is_64bit {
            let h = be32(&buf[off..off + 4]);
            off += 4;
            h
        } else {
            0
        };
        debug_assert_eq!(off, fixed_len);
        (blocknr_low, flags, checksum, blocknr_high)
    };

    let blocknr = ((blocknr_high as u64) << 32) | blocknr_low as u64;

    let mut consumed = fixed_len;
    let uuid = if flags & JBD_FLAG_SAME_UUID == 0 {
        if buf.len() < fixed_len + UUID_SIZE {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "journal descriptor buffer too short for inline tag UUID",
            ));
        }
        let mut u = [0u8; UUID_SIZE];
        u.copy_from_slice(&buf[fixed_len..fixed_len + UUID_SIZE]);
        consumed += UUID_SIZE;
        Some(u)
    } else {
        None
    };

    Ok((
        ExtractedTag {
            blocknr,
            flags,
            checksum,
            uuid,
        },
        consumed,
    ))
}

/// 将一个 tag（及其可能的内联 UUID）写入 `buf` 开头，返回写入的字节数
pub fn write_tag(buf: &mut [u8], tag: &ExtractedTag, incompat_features: u32) -> Result<usize> {
    let fixed_len = tag_size(incompat_features);
    let uuid_len = if tag.uuid.is_some() { UUID_SIZE } else { 0 };
    if buf.len() < fixed_len + uuid_len {
        return Err(Error::new(
            ErrorKind::Corrupted,
            "journal descriptor buffer too small to hold block tag",
        ));
    }

    let is_v3 = incompat_features & JBD_FEATURE_INCOMPAT_CSUM_V3 != 0;
    let is_64bit = incompat_features & JBD_FEATURE_INCOMPAT_64BIT != 0;

    let blocknr_low = tag.blocknr as u32;
    let blocknr_high = (tag.blocknr >> 32) as u32;

    if is_v3 {
        put_be32(&mut buf[0..4], blocknr_low);
        put_be32(&mut buf[4..8], tag.flags as u32);
        put_be32(&mut buf[8..12], blocknr_high);
        put_be32(&mut buf[12..16], tag.checksum);
    } else {
        let mut off = 0usize;
        put_be32(&mut buf[off..off + 4], blocknr_low);
        off += 4;
        put_be16(&mut buf[off..off + 2], tag.checksum as u16);
        off += 2;
        put_be16(&mut buf[off..off + 2], tag.flags);
        off += 2;
        if is_64bit {
            put_be32(&mut buf[off..off + 4], blocknr_high);
            off += 4;
        }
        debug_assert_eq!(off, fixed_len);
    }

    if let Some(uuid) = tag.uuid {
        buf[fixed_len..fixed_len + UUID_SIZE].copy_from_slice(&uuid);
    }

    Ok(fixed_len + uuid_len)
}

/// 在已写入的描述符缓冲区中，就地修正某个偏移处 tag 的 flags 字段
///
/// 用于提交路径为最后一个 tag 回填 `JBD_FLAG_LAST_TAG`，无需重新序列化整个 tag。
pub fn patch_tag_flags(buf: &mut [u8], tag_offset: usize, incompat_features: u32, flags: u16) -> Result<()> {
    let is_v3 = incompat_features & JBD_FEATURE_INCOMPAT_CSUM_V3 != 0;
    // 非 V3 时 checksum 槽始终保留，flags 固定在 blocknr(4)+checksum(2) 之后。
    let flags_off = if is_v3 { tag_offset + 4 } else { tag_offset + 6 };
    let width = if is_v3 { 4 } else { 2 };
    if buf.len() < flags_off + width {
        return Err(Error::new(
            ErrorKind::Corrupted,
            "journal descriptor buffer too short to patch tag flags",
        ));
    }
    if is_v3 {
        put_be32(&mut buf[flags_off..flags_off + 4], flags as u32);
    } else {
        put_be16(&mut buf[flags_off..flags_off + 2], flags);
    }
    Ok(())
}

/// 撤销（revoke）记录的磁盘宽度：32 位或 64 位模式下分别为 4/8 字节
pub fn revoke_record_size(incompat_features: u32) -> usize {
    if incompat_features & JBD_FEATURE_INCOMPAT_64BIT != 0 {
        8
    } else {
        4
    }
}

/// 将一组块号编码为撤销块正文（紧随 `jbd_revoke_header` 之后的字节数组）
pub fn encode_revoke_records(blocks: &[u64], incompat_features: u32) -> Vec<u8> {
    let rec_size = revoke_record_size(incompat_features);
    let mut out = Vec::with_capacity(blocks.len() * rec_size);
    for &b in blocks {
        if rec_size == 8 {
            let mut tmp = [0u8; 8];
            put_be64(&mut tmp, b);
            out.extend_from_slice(&tmp);
        } else {
            let mut tmp = [0u8; 4];
            put_be32(&mut tmp, b as u32);
            out.extend_from_slice(&tmp);
        }
    }
    out
}

/// 解码撤销块正文中的块号数组
pub fn decode_revoke_records(body: &[u8], incompat_features: u32) -> Vec<u64> {
    let rec_size = revoke_record_size(incompat_features);
    let mut out = Vec::with_capacity(body.len() / rec_size.max(1));
    let mut off = 0;
    while off + rec_size <= body.len() {
        let v = if rec_size == 8 {
            be64(&body[off..off + 8])
        } else {
            be32(&body[off..off + 4]) as u64
        };
        out.push(v);
        off += rec_size;
    }
    out
}

fn be16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn put_be16(b: &mut [u8], v: u16) {
    b.copy_from_slice(&v.to_be_bytes());
}

fn put_be32(b: &mut [u8], v: u32) {
    b.copy_from_slice(&v.to_be_bytes());
}

fn put_be64(b: &mut [u8], v: u64) {
    b.copy_from_slice(&v.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_size_variants() {
        // 基本布局固定 8 字节：blocknr(4)+checksum(2)+flags(2)，checksum
        // 槽无论 CSUM_V2 是否协商都保留，与 `jbd_block_tag` / `jbd_tag_bytes()`
        // 一致。
        assert_eq!(tag_size(0), 8);
        assert_eq!(tag_size(JBD_FEATURE_INCOMPAT_64BIT), 12);
        assert_eq!(tag_size(JBD_FEATURE_INCOMPAT_CSUM_V2), 8);
        assert_eq!(
            tag_size(JBD_FEATURE_INCOMPAT_CSUM_V2 | JBD_FEATURE_INCOMPAT_64BIT),
            12
        );
        assert_eq!(tag_size(JBD_FEATURE_INCOMPAT_CSUM_V3), 16);
        assert_eq!(
            tag_size(JBD_FEATURE_INCOMPAT_CSUM_V3 | JBD_FEATURE_INCOMPAT_64BIT),
            16
        );
    }

    #[test]
    fn test_roundtrip_base_no_features() {
        let tag = ExtractedTag {
            blocknr: 0x1234,
            flags: JBD_FLAG_LAST_TAG,
            checksum: 0,
            uuid: None,
        };
        let mut buf = [0u8; 8];
        let written = write_tag(&mut buf, &tag, 0).unwrap();
        assert_eq!(written, 8);
        let (parsed, consumed) = extract_tag(&buf, 0).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(parsed.blocknr, 0x1234);
        assert_eq!(parsed.flags, JBD_FLAG_LAST_TAG);
    }

    #[test]
    fn test_roundtrip_64bit_with_uuid() {
        let features = JBD_FEATURE_INCOMPAT_64BIT;
        let tag = ExtractedTag {
            blocknr: 0x1_0000_0002,
            flags: 0,
            checksum: 0,
            uuid: Some([0xAB; UUID_SIZE]),
        };
        let mut buf = [0u8; 12 + UUID_SIZE];
        let written = write_tag(&mut buf, &tag, features).unwrap();
        assert_eq!(written, 12 + UUID_SIZE);
        let (parsed, consumed) = extract_tag(&buf, features).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(parsed.blocknr, 0x1_0000_0002);
        assert_eq!(parsed.uuid, Some([0xAB; UUID_SIZE]));
    }

    #[test]
    fn test_roundtrip_csum_v3() {
        let features = JBD_FEATURE_INCOMPAT_CSUM_V3 | JBD_FEATURE_INCOMPAT_64BIT;
        let tag = ExtractedTag {
            blocknr: 0xdead_beef,
            flags: JBD_FLAG_ESCAPE,
            checksum: 0x1122_3344,
            uuid: None,
        };
        let mut buf = [0u8; 16];
        write_tag(&mut buf, &tag, features).unwrap();
        let (parsed, consumed) = extract_tag(&buf, features).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(parsed.blocknr, 0xdead_beef);
        assert_eq!(parsed.flags, JBD_FLAG_ESCAPE);
        assert_eq!(parsed.checksum, 0x1122_3344);
    }

    #[test]
    fn test_extract_tag_too_short() {
        let buf = [0u8; 4];
        let err = extract_tag(&buf, JBD_FEATURE_INCOMPAT_64BIT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_patch_tag_flags() {
        let tag = ExtractedTag {
            blocknr: 7,
            flags: 0,
            checksum: 0,
            uuid: None,
        };
        let mut buf = [0u8; 8];
        write_tag(&mut buf, &tag, JBD_FEATURE_INCOMPAT_CSUM_V2).unwrap();
        patch_tag_flags(&mut buf, 0, JBD_FEATURE_INCOMPAT_CSUM_V2, JBD_FLAG_LAST_TAG).unwrap();
        let (parsed, _) = extract_tag(&buf, JBD_FEATURE_INCOMPAT_CSUM_V2).unwrap();
        assert_eq!(parsed.flags, JBD_FLAG_LAST_TAG);
    }

    #[test]
    fn test_roundtrip_escaped_tag_stores_zero_blocknr() {
        // property 5: 对于被提交路径标记为 ESCAPE 的 tag，盘上 blocknr 写作 0；
        // 编解码层本身是纯粹的字节打包/解包，不对 ESCAPE 做任何特殊处理——
        // 把 0 写进盘面是调用方（commit 流水线）的职责，见 `commit.rs`。
        let tag = ExtractedTag {
            blocknr: 0,
            flags: JBD_FLAG_ESCAPE | JBD_FLAG_LAST_TAG,
            checksum: 0,
            uuid: None,
        };
        let mut buf = [0u8; 8];
        write_tag(&mut buf, &tag, 0).unwrap();
        let (parsed, consumed) = extract_tag(&buf, 0).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(parsed.blocknr, 0);
        assert_eq!(parsed.flags & JBD_FLAG_ESCAPE, JBD_FLAG_ESCAPE);
    }

    #[test]
    fn test_revoke_record_roundtrip_32() {
        let blocks = [1u64, 2, 0xFFFF_FFFF];
        let body = encode_revoke_records(&blocks, 0);
        assert_eq!(body.len(), 12);
        assert_eq!(decode_revoke_records(&body, 0), alloc::vec![1u64, 2, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_revoke_record_roundtrip_64() {
        let blocks = [1u64, 0x1_0000_0000];
        let body = encode_revoke_records(&blocks, JBD_FEATURE_INCOMPAT_64BIT);
        assert_eq!(body.len(), 16);
        assert_eq!(
            decode_revoke_records(&body, JBD_FEATURE_INCOMPAT_64BIT),
            alloc::vec![1u64, 0x1_0000_0000]
        );
    }
}
