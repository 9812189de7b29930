//! Journal 事务提交流水线
//!
//! 对应 lwext4 的 `jbd_journal_commit_trans()` (`ext4_journal.c`)

use super::{
    checkpoint, codec,
    codec::ExtractedTag,
    jbd_buf::JbdBuf,
    jbd_journal::JbdJournal,
    jbd_trans,
    jbd_trans::JbdTrans,
    nav,
    types::*,
    JbdFs,
};
use crate::{
    block::{Block, BlockDev, BlockDevice},
    error::Result,
    superblock::Superblock,
};
use alloc::vec;
use alloc::vec::Vec;

/// 一个正在装填中的描述符块
struct Descriptor {
    /// 日志内逻辑块号
    iblock: u32,
    /// 对应的文件系统物理块号
    fs_lba: u64,
    /// 块内容缓冲区
    buf: Vec<u8>,
    /// 下一个 tag 应写入的偏移
    offset: usize,
    /// 最近一个已写入 tag 的起始偏移（用于回填 LAST_TAG）
    last_tag_offset: Option<usize>,
    /// 本描述符是否已经写过第一个 tag（决定是否内联 UUID / 设置 SAME_UUID）
    wrote_first_tag: bool,
}

fn incompat_features(jbd_fs: &JbdFs) -> u32 {
    u32::from_be(jbd_fs.sb.feature_incompat)
}

/// 分配一个日志块：记录事务的 `start_iblock`（首次分配时），并在绕回到
/// `journal.start` 时强制刷新检查点队列腾出空间
fn alloc_log_block<D: BlockDevice>(
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
) -> Result<u32> {
    let first_alloc = trans.alloc_blocks == 0;
    let iblock = journal.alloc_block(trans);
    if first_alloc {
        trans.start_iblock = iblock;
    }
    if journal.last == journal.start {
        checkpoint::flush_all_trans(journal, bdev)?;
    }
    Ok(iblock)
}

fn open_descriptor<D: BlockDevice>(
    jbd_fs: &JbdFs,
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
) -> Result<Descriptor> {
    let iblock = alloc_log_block(journal, trans, bdev)?;
    let fs_lba = jbd_fs.inode_bmap(bdev, superblock, iblock)?;

    let block_size = journal.block_size as usize;
    let mut buf = vec![0u8; block_size];
    let header = jbd_bhdr::new(JBD_DESCRIPTOR_BLOCK, trans.trans_id);
    unsafe {
        core::ptr::write_unaligned(buf.as_mut_ptr() as *mut jbd_bhdr, header);
    }

    Ok(Descriptor {
        iblock,
        fs_lba,
        buf,
        offset: core::mem::size_of::<jbd_bhdr>(),
        last_tag_offset: None,
        wrote_first_tag: false,
    })
}

/// 回填最近一个 tag 的 `LAST_TAG` 标志，并把整个描述符块写回设备
fn finalize_descriptor<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    desc: Descriptor,
    incompat: u32,
) -> Result<()> {
    let mut desc = desc;
    if let Some(off) = desc.last_tag_offset {
        codec::patch_tag_flags(&mut desc.buf, off, incompat, JBD_FLAG_LAST_TAG)?;
    }
    let mut block = Block::get_noread(bdev, desc.fs_lba)?;
    block.with_data_mut(|d| d.copy_from_slice(&desc.buf))?;
    Ok(())
}

/// 步骤 2：遍历登记的脏缓冲区，写出描述符+数据块，过滤掉已经被别处
/// 刷回的缓冲区
fn prepare_data<D: BlockDevice>(
    jbd_fs: &JbdFs,
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
    incompat: u32,
) -> Result<()> {
    let block_size = journal.block_size as usize;
    let enlisted = core::mem::take(&mut trans.buf_list);
    let mut kept: Vec<JbdBuf> = Vec::with_capacity(enlisted.len());
    let mut desc: Option<Descriptor> = None;

    for buf in enlisted {
        if !bdev.is_lba_dirty(buf.fs_lba) {
            continue;
        }

        let mut data = vec![0u8; block_size];
        {
            let mut block = Block::get(bdev, buf.fs_lba)?;
            block.with_data(|d| data.copy_from_slice(d))?;
        }

        let escape = data.len() >= 4 && u32::from_be_bytes([data[0], data[1], data[2], data[3]]) == JBD_MAGIC_NUMBER;
        if escape {
            data[0..4].copy_from_slice(&[0, 0, 0, 0]);
        }

        loop {
            if desc.is_none() {
                desc = Some(open_descriptor(jbd_fs, journal, trans, bdev, superblock)?);
            }
            let d = desc.as_ref().unwrap();
            let need_uuid = !d.wrote_first_tag;
            let need = codec::tag_size(incompat) + if need_uuid { UUID_SIZE } else { 0 };
            if d.offset + need <= block_size {
                break;
            }
            let full = desc.take().unwrap();
            finalize_descriptor(bdev, full, incompat)?;
        }

        let d = desc.as_mut().unwrap();
        let mut flags: u16 = if escape { JBD_FLAG_ESCAPE } else { 0 };
        if d.wrote_first_tag {
            flags |= JBD_FLAG_SAME_UUID;
        }
        // property 5: 对 ESCAPE tag，盘上 blocknr 写作 0（与文件系统自身
        // superblock 共享同一哨兵值），真正的 home 位置在 Recover 遍由
        // `tag.blocknr == 0` 统一走 superblock 路径处理——这与原始 C
        // `jbd_replay_block_tags()` 对被 ESCAPE 清零的 tag_info.block 的
        // 处理完全一致，详见 `recovery::replay_tag`。
        let tag = ExtractedTag {
            blocknr: if escape { 0 } else { buf.fs_lba },
            flags,
            checksum: 0,
            uuid: if d.wrote_first_tag { None } else { Some(jbd_fs.sb.uuid) },
        };
        d.last_tag_offset = Some(d.offset);
        let written = codec::write_tag(&mut d.buf[d.offset..], &tag, incompat)?;
        d.offset += written;
        d.wrote_first_tag = true;

        let data_iblock = alloc_log_block(journal, trans, bdev)?;
        let data_lba = jbd_fs.inode_bmap(bdev, superblock, data_iblock)?;
        {
            let mut block = Block::get_noread(bdev, data_lba)?;
            block.with_data_mut(|dst| dst.copy_from_slice(&data))?;
        }

        kept.push(buf);
    }

    if let Some(d) = desc.take() {
        finalize_descriptor(bdev, d, incompat)?;
    }

    trans.data_cnt = kept.len() as u32;
    trans.buf_list = kept;
    Ok(())
}

/// 步骤 3：把撤销列表打包进撤销块
fn prepare_revokes<D: BlockDevice>(
    jbd_fs: &JbdFs,
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
    incompat: u32,
) -> Result<()> {
    if trans.revoke_list.is_empty() {
        return Ok(());
    }

    let block_size = journal.block_size as usize;
    let header_size = core::mem::size_of::<jbd_revoke_header>();
    let rec_size = codec::revoke_record_size(incompat);
    let cap = (block_size - header_size) / rec_size;

    let revokes = trans.revoke_list.clone();
    for chunk in revokes.chunks(cap.max(1)) {
        let iblock = alloc_log_block(journal, trans, bdev)?;
        let fs_lba = jbd_fs.inode_bmap(bdev, superblock, iblock)?;

        let body = codec::encode_revoke_records(chunk, incompat);
        let count = (header_size + body.len()) as u32;
        let header = jbd_revoke_header {
            header: jbd_bhdr::new(JBD_REVOKE_BLOCK, trans.trans_id),
            count: count.to_be(),
        };

        let mut block_buf = vec![0u8; block_size];
        unsafe {
            core::ptr::write_unaligned(block_buf.as_mut_ptr() as *mut jbd_revoke_header, header);
        }
        block_buf[header_size..header_size + body.len()].copy_from_slice(&body);

        let mut block = Block::get_noread(bdev, fs_lba)?;
        block.with_data_mut(|d| d.copy_from_slice(&block_buf))?;
    }

    Ok(())
}

fn persist_journal_sb<D: BlockDevice>(
    jbd_fs: &mut JbdFs,
    journal: &JbdJournal,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
) -> Result<()> {
    jbd_fs.set_start(journal.start);
    jbd_fs.set_sequence(journal.trans_id);
    jbd_fs.put(bdev, superblock)
}

/// 提交一个事务：装填描述符/数据/撤销块，写提交块，并把事务移交给检查点队列
///
/// 失败时回滚 `journal.last` 到提交前的值，并以 `abort = true` 释放事务
/// （已写入日志的块被遗留，下次恢复会重新扫描到一个不完整的事务并在合适
/// 的位置终止，日志保持自洽）。
pub fn commit_trans<D: BlockDevice>(
    jbd_fs: &mut JbdFs,
    journal: &mut JbdJournal,
    mut trans: JbdTrans,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
) -> Result<()> {
    trans.trans_id = journal.alloc_trans_id;
    let incompat = incompat_features(jbd_fs);
    let pre_commit_last = journal.last;

    let assembled = (|| -> Result<()> {
        prepare_data(jbd_fs, journal, &mut trans, bdev, superblock, incompat)?;
        prepare_revokes(jbd_fs, journal, &mut trans, bdev, superblock, incompat)?;
        Ok(())
    })();

    if let Err(e) = assembled {
        journal.last = pre_commit_last;
        let _ = jbd_trans::free_trans(journal, &mut trans, true, bdev);
        return Err(e);
    }

    if trans.data_cnt == 0 && trans.revoke_list.is_empty() {
        jbd_trans::free_trans(journal, &mut trans, false, bdev)?;
        return Ok(());
    }

    let commit_iblock = alloc_log_block(journal, &mut trans, bdev)?;
    let commit_lba = jbd_fs.inode_bmap(bdev, superblock, commit_iblock)?;
    {
        let mut block = Block::get_noread(bdev, commit_lba)?;
        block.with_data_mut(|d| {
            let header = jbd_bhdr::new(JBD_COMMIT_BLOCK, trans.trans_id);
            unsafe {
                core::ptr::write_unaligned(d.as_mut_ptr() as *mut jbd_bhdr, header);
            }
        })?;
    }

    journal.alloc_trans_id += 1;

    if trans.data_cnt == 0 {
        journal.start = nav::wrap(
            journal.first,
            journal.maxlen,
            trans.start_iblock + trans.alloc_blocks as u32,
        );
        journal.trans_id = trans.trans_id + 1;
        persist_journal_sb(jbd_fs, journal, bdev, superblock)?;
        jbd_trans::free_trans(journal, &mut trans, false, bdev)?;
    } else {
        let was_empty = journal.cp_queue.is_empty();
        if was_empty {
            journal.start = trans.start_iblock;
            journal.trans_id = trans.trans_id;
        }
        journal.cp_queue.push_back(trans);
        if was_empty {
            persist_journal_sb(jbd_fs, journal, bdev, superblock)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{EXT4_FEATURE_COMPAT_HAS_JOURNAL, EXT4_INODE_DIRECT_BLOCKS};
    use crate::journal::jbd_trans;
    use crate::types::{ext4_group_desc, ext4_inode, ext4_sblock};
    use alloc::vec;

    struct RamDisk {
        data: Vec<u8>,
        block_size: u32,
    }

    impl RamDisk {
        fn new(blocks: u64, block_size: u32) -> Self {
            Self {
                data: vec![0u8; (blocks * block_size as u64) as usize],
                block_size,
            }
        }
    }

    impl BlockDevice for RamDisk {
        fn block_size(&self) -> u32 {
            self.block_size
        }
        fn sector_size(&self) -> u32 {
            512
        }
        fn total_blocks(&self) -> u64 {
            self.data.len() as u64 / self.block_size as u64
        }
        fn read_blocks(&mut self, pba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
            // pba/count 以扇区为单位（trait 约定：buf 至少 count * sector_size
            // 字节），不是块号，换算时必须用 sector_size 而不是 block_size。
            let off = pba as usize * self.sector_size() as usize;
            let len = count as usize * self.sector_size() as usize;
            buf[..len].copy_from_slice(&self.data[off..off + len]);
            Ok(count as usize)
        }
        fn write_blocks(&mut self, pba: u64, count: u32, buf: &[u8]) -> Result<usize> {
            let off = pba as usize * self.sector_size() as usize;
            let len = count as usize * self.sector_size() as usize;
            self.data[off..off + len].copy_from_slice(&buf[..len]);
            Ok(count as usize)
        }
    }

    fn dummy_jbd_fs() -> JbdFs {
        let mut sb = jbd_sb::default();
        sb.maxlen = 64u32.to_be();
        sb.first = 1u32.to_be();
        JbdFs {
            inode: 8,
            sb,
            dirty: false,
        }
    }

    const JOURNAL_INODE_NUM: u32 = 8;
    const INODE_TABLE_BLOCK: u64 = 2;

    /// 搭建一个块组、journal inode 用直接块指针映射到紧随其后的日志区域
    /// 的最小化文件系统。启用缓存，使 `prepare_data` 依赖的
    /// `is_lba_dirty` 能正确反映刚写入的块，并把缓存容量设得远大于本测试
    /// 会同时触碰的不同物理块数，避免脏数据被静默驱逐。
    fn setup_fs(
        block_size: u32,
        total_blocks: u64,
        journal_first_block: u64,
        journal_len: u32,
        cache_blocks: usize,
    ) -> (BlockDev<RamDisk>, Superblock) {
        let mut bdev = BlockDev::new_with_cache(RamDisk::new(total_blocks, block_size), cache_blocks).unwrap();

        let mut sb_inner = ext4_sblock::default();
        sb_inner.blocks_count_lo = (total_blocks as u32).to_le();
        sb_inner.log_block_size = (block_size / 1024).trailing_zeros().to_le(); // 1024 << n == block_size
        sb_inner.inodes_count = 16u32.to_le();
        sb_inner.inode_size = 256u16.to_le();
        sb_inner.blocks_per_group = (total_blocks as u32).to_le();
        sb_inner.inodes_per_group = 16u32.to_le();
        sb_inner.feature_compat = EXT4_FEATURE_COMPAT_HAS_JOURNAL.to_le();
        sb_inner.journal_inum = JOURNAL_INODE_NUM.to_le();
        let mut superblock = Superblock::new(sb_inner);

        let mut desc = ext4_group_desc::default();
        desc.inode_table_lo = (INODE_TABLE_BLOCK as u32).to_le();
        let desc_block = superblock.first_data_block() + 1;
        let mut block = Block::get_noread(&mut bdev, desc_block).unwrap();
        block
            .with_data_mut(|d| unsafe {
                core::ptr::write_unaligned(d.as_mut_ptr() as *mut ext4_group_desc, desc);
            })
            .unwrap();

        let mut journal_inode = ext4_inode::default();
        journal_inode.mode = 0x8000u16.to_le();
        journal_inode.size_lo = ((journal_len as u64) * block_size as u64) as u32;
        for i in 0..journal_len.min(EXT4_INODE_DIRECT_BLOCKS as u32) {
            journal_inode.blocks[i as usize] = ((journal_first_block as u32) + i).to_le();
        }

        let inode_size = superblock.inode_size() as usize;
        let index_in_group = (JOURNAL_INODE_NUM - 1) as usize;
        let inode_offset =
            INODE_TABLE_BLOCK * block_size as u64 + (index_in_group * inode_size) as u64;
        let mut inode_buf = vec![0u8; inode_size];
        unsafe {
            core::ptr::write_unaligned(inode_buf.as_mut_ptr() as *mut ext4_inode, journal_inode);
        }
        bdev.write_bytes(inode_offset, &inode_buf).unwrap();

        (bdev, superblock)
    }

    #[test]
    fn test_descriptor_tag_size_respects_features() {
        assert_eq!(codec::tag_size(incompat_features(&dummy_jbd_fs())), 8);
    }

    #[test]
    fn test_prepare_data_zeroes_blocknr_for_escaped_tag() {
        const BLOCK_SIZE: u32 = 4096;
        const JOURNAL_FIRST_BLOCK: u64 = 10;
        const JOURNAL_LEN: u32 = 12;

        let (mut bdev, mut superblock) = setup_fs(BLOCK_SIZE, 128, JOURNAL_FIRST_BLOCK, JOURNAL_LEN, 8);
        let mut journal = JbdJournal::new(1, JOURNAL_LEN, BLOCK_SIZE);
        let mut jbd_fs = dummy_jbd_fs();
        jbd_fs.inode = JOURNAL_INODE_NUM;
        jbd_fs.sb.blocksize = BLOCK_SIZE.to_be();
        jbd_fs.sb.maxlen = JOURNAL_LEN.to_be();
        let incompat = incompat_features(&jbd_fs);
        let mut trans = jbd_trans::JbdTrans::new();
        trans.trans_id = 1;

        // home 块的内容恰好以 journal magic 开头，触发 ESCAPE。
        let home_lba = 100u64;
        {
            let mut block = Block::get_noread(&mut bdev, home_lba).unwrap();
            block
                .with_data_mut(|d| {
                    d[0..4].copy_from_slice(&JBD_MAGIC_NUMBER.to_be_bytes());
                    d[4] = 0x7A;
                })
                .unwrap();
        }
        trans.buf_list.push(JbdBuf::new(home_lba));
        trans.data_cnt = 1;

        prepare_data(&jbd_fs, &mut journal, &mut trans, &mut bdev, &mut superblock, incompat).unwrap();

        // 描述符块紧跟在日志头之后：iblock = jbd_fs.first() = 1。
        let desc_lba = jbd_fs.inode_bmap(&mut bdev, &mut superblock, 1).unwrap();
        let body: Vec<u8> = {
            let mut block = Block::get(&mut bdev, desc_lba).unwrap();
            block.with_data(|d| d.to_vec()).unwrap()
        };
        let tag_off = core::mem::size_of::<jbd_bhdr>();
        let (tag, _) = codec::extract_tag(&body[tag_off..], incompat).unwrap();
        assert_eq!(tag.blocknr, 0);
        assert_ne!(tag.flags & JBD_FLAG_ESCAPE, 0);

        // 紧随 tag 的数据块第一个字写回前已被清零（ESCAPE 约定），其余内容不变。
        let data_lba = jbd_fs.inode_bmap(&mut bdev, &mut superblock, 2).unwrap();
        let mut data = vec![0u8; BLOCK_SIZE as usize];
        {
            let mut block = Block::get(&mut bdev, data_lba).unwrap();
            block.with_data(|d| data.copy_from_slice(d)).unwrap();
        }
        assert_eq!(&data[0..4], &[0, 0, 0, 0]);
        assert_eq!(data[4], 0x7A);
    }

    #[test]
    fn test_prepare_data_spills_into_second_descriptor_on_overflow() {
        // 一个描述符块装不下的 tag 数量：block_size=1024 时，首个 tag 带
        // 内联 UUID(24 字节)，其余 tag 各占 8 字节，头部 12 字节，故首个
        // 描述符最多容纳 124 个 tag。125 个脏缓冲区必然溢出到第二个
        // 描述符块,两个描述符各自都以自己的 LAST_TAG 收尾。
        use crate::consts::EXT4_INODE_INDIRECT_BLOCK;

        const BLOCK_SIZE: u32 = 1024;
        const TOTAL_BLOCKS: u64 = 512;
        const JOURNAL_FIRST_BLOCK: u64 = 10;
        // 恰好覆盖 127 个会用到的逻辑块（1 个描述符 + 124 个数据 + 溢出后
        // 再 1 个描述符 + 1 个数据），物理日志区间 [10, 138)，与下面
        // home 块的物理区间互不重叠。
        const JOURNAL_LEN: u32 = 128;
        const INDIRECT_BLOCK_LBA: u64 = 5;
        const NUM_BUFS: u32 = 125;
        const HOME_BASE: u64 = 300;

        let (mut bdev, mut superblock) =
            setup_fs(BLOCK_SIZE, TOTAL_BLOCKS, JOURNAL_FIRST_BLOCK, EXT4_INODE_DIRECT_BLOCKS as u32, 512);

        // 日志超过 12 个直接块覆盖的范围，补一个一级间接块，指向紧随
        // 直接块区域之后的日志块。`read_block_pointer` 绕过缓存直接读
        // 设备，因此这里必须用 `write_blocks_direct` 而不是走缓存写入。
        let blocks_per_indirect = (BLOCK_SIZE / 4) as usize;
        let mut indirect_buf = vec![0u8; BLOCK_SIZE as usize];
        let extra = (JOURNAL_LEN as u64 - EXT4_INODE_DIRECT_BLOCKS as u64) as usize;
        assert!(extra <= blocks_per_indirect);
        for i in 0..extra {
            let phys = (JOURNAL_FIRST_BLOCK + EXT4_INODE_DIRECT_BLOCKS as u64 + i as u64) as u32;
            indirect_buf[i * 4..i * 4 + 4].copy_from_slice(&phys.to_le_bytes());
        }
        bdev.write_blocks_direct(INDIRECT_BLOCK_LBA, 1, &indirect_buf).unwrap();
        {
            let mut inode_ref = crate::fs::InodeRef::get(&mut bdev, &mut superblock, JOURNAL_INODE_NUM).unwrap();
            inode_ref
                .with_inode_mut(|inode| {
                    inode.blocks[EXT4_INODE_INDIRECT_BLOCK] = (INDIRECT_BLOCK_LBA as u32).to_le();
                })
                .unwrap();
        }

        let mut journal = JbdJournal::new(1, JOURNAL_LEN, BLOCK_SIZE);
        let mut jbd_fs = dummy_jbd_fs();
        jbd_fs.inode = JOURNAL_INODE_NUM;
        jbd_fs.sb.blocksize = BLOCK_SIZE.to_be();
        jbd_fs.sb.maxlen = JOURNAL_LEN.to_be();
        let incompat = incompat_features(&jbd_fs);
        let mut trans = jbd_trans::JbdTrans::new();
        trans.trans_id = 1;

        for i in 0..NUM_BUFS as u64 {
            let home_lba = HOME_BASE + i;
            let mut block = Block::get_noread(&mut bdev, home_lba).unwrap();
            block.with_data_mut(|d| d.iter_mut().for_each(|b| *b = 0x42)).unwrap();
            trans.buf_list.push(JbdBuf::new(home_lba));
        }
        trans.data_cnt = NUM_BUFS;

        prepare_data(&jbd_fs, &mut journal, &mut trans, &mut bdev, &mut superblock, incompat).unwrap();

        // 第一个描述符：iblock 1，装满 124 个 tag；其中最后一个带 LAST_TAG——
        // 这个标志只表示“这个描述符块内最后一个 tag”，不是整个事务的最后
        // 一个 tag，每个描述符块都要以它收尾,`recovery::process_descriptor`
        // 正是靠它判断何时停止在本块内解析、转去下一个日志块。
        let desc1_lba = jbd_fs.inode_bmap(&mut bdev, &mut superblock, 1).unwrap();
        let desc1: Vec<u8> = {
            let mut block = Block::get(&mut bdev, desc1_lba).unwrap();
            block.with_data(|d| d.to_vec()).unwrap()
        };
        let header1 = unsafe { core::ptr::read_unaligned(desc1.as_ptr() as *const jbd_bhdr) };
        assert_eq!(u32::from_be(header1.magic), JBD_MAGIC_NUMBER);
        assert_eq!(u32::from_be(header1.blocktype), JBD_DESCRIPTOR_BLOCK);

        let mut offset = core::mem::size_of::<jbd_bhdr>();
        let mut tags_in_desc1 = 0u32;
        let mut last_tag_in_desc1_has_last_flag = false;
        loop {
            let (tag, consumed) = match codec::extract_tag(&desc1[offset..], incompat) {
                Ok(v) => v,
                Err(_) => break,
            };
            offset += consumed;
            tags_in_desc1 += 1;
            last_tag_in_desc1_has_last_flag = tag.flags & JBD_FLAG_LAST_TAG != 0;
            if offset >= desc1.len() {
                break;
            }
        }
        assert_eq!(tags_in_desc1, 124);
        assert!(last_tag_in_desc1_has_last_flag);

        // 第二个描述符紧随第一个描述符装填的全部数据块之后：
        // iblock 1（desc1）+ 124 个数据块（iblock 2..=125）= 下一个分配的
        // iblock 126。
        let desc2_lba = jbd_fs.inode_bmap(&mut bdev, &mut superblock, 126).unwrap();
        let desc2: Vec<u8> = {
            let mut block = Block::get(&mut bdev, desc2_lba).unwrap();
            block.with_data(|d| d.to_vec()).unwrap()
        };
        let header2 = unsafe { core::ptr::read_unaligned(desc2.as_ptr() as *const jbd_bhdr) };
        assert_eq!(u32::from_be(header2.magic), JBD_MAGIC_NUMBER);
        assert_eq!(u32::from_be(header2.blocktype), JBD_DESCRIPTOR_BLOCK);

        let tag_off2 = core::mem::size_of::<jbd_bhdr>();
        let (tag2, _) = codec::extract_tag(&desc2[tag_off2..], incompat).unwrap();
        assert_eq!(tag2.blocknr, HOME_BASE + NUM_BUFS as u64 - 1);
        assert_ne!(tag2.flags & JBD_FLAG_LAST_TAG, 0);

        // 两个描述符属于同一事务：序列号一致。
        assert_eq!(header1.sequence, header2.sequence);

        // 溢出前后写入的 home 块内容都完好无损。
        for i in 0..NUM_BUFS as u64 {
            let home_lba = HOME_BASE + i;
            let mut block = Block::get(&mut bdev, home_lba).unwrap();
            let ok = block.with_data(|d| d.iter().all(|&b| b == 0x42)).unwrap();
            assert!(ok, "home block {} corrupted", home_lba);
        }
    }

    #[test]
    fn test_prepare_revokes_empty_is_noop() {
        let (mut bdev, mut superblock) = setup_fs(4096, 128, 10, 12, 8);
        let mut journal = JbdJournal::new(1, 64, 4096);
        let mut jbd_fs = dummy_jbd_fs();
        let mut trans = jbd_trans::JbdTrans::new();
        trans.trans_id = 1;

        prepare_revokes(&mut jbd_fs, &mut journal, &mut trans, &mut bdev, &mut superblock, 0).unwrap();
        assert_eq!(journal.last, journal.first);
    }
}
