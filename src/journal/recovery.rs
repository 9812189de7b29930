//! Journal 崩溃恢复：扫描 / 撤销 / 重放三遍日志
//!
//! 对应 lwext4 的 `jbd_recover()` 及其内部按块类型分派的重放逻辑
//! (`ext4_journal.c`)。三遍共用同一套迭代规则，只是对每种块类型的
//! 处理动作不同：Scan 只确定重放的事务 ID 区间，Revoke 建立撤销表，
//! Recover 真正把日志内容写回 home 位置。

use super::{
    codec::{self, ExtractedTag},
    revoke::RevokeTable,
    types::*,
    JbdFs, JournalError,
};
use crate::{
    block::{Block, BlockDev, BlockDevice},
    consts::EXT4_FEATURE_INCOMPAT_RECOVER,
    error::Result,
    superblock::Superblock,
};
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Scan,
    Revoke,
    Recover,
}

/// 扫描遍确定的重放边界
#[derive(Debug, Clone, Copy)]
struct RecoverInfo {
    /// 需要重放的最后一个事务的序列号（含）
    last_trans_id: u32,
}

fn incompat_features(jbd_fs: &JbdFs) -> u32 {
    u32::from_be(jbd_fs.sb.feature_incompat)
}

fn wrap(first: u32, maxlen: u32, x: u32) -> u32 {
    if x >= maxlen {
        x - (maxlen - first)
    } else {
        x
    }
}

/// 读取一个块的 JBD 块头 (magic, blocktype, sequence)，三者均已转为本机字节序
fn read_header<D: BlockDevice>(bdev: &mut BlockDev<D>, fs_lba: u64) -> Result<(u32, u32, u32)> {
    let mut block = Block::get(bdev, fs_lba)?;
    block.with_data(|data| {
        if data.len() < core::mem::size_of::<jbd_bhdr>() {
            return (0u32, 0u32, 0u32);
        }
        let header = unsafe { core::ptr::read_unaligned(data.as_ptr() as *const jbd_bhdr) };
        (
            u32::from_be(header.magic),
            u32::from_be(header.blocktype),
            u32::from_be(header.sequence),
        )
    })
}

/// 把一个日志块的内容原样重放到它的 home 物理块
///
/// `tag.blocknr == 0` 特殊处理成文件系统自身的主 superblock：不能直接
/// 整块覆写（superblock 通过独立的字节偏移接口读写，不经过块缓存），
/// 而是把日志块的原始字节写回设备起始处，再通过 superblock 接口重新
/// 加载、叠加当前的 `mount_count`/`state`（这两个字段不被日志记录，
/// 可能在记录之后已经被运行中的文件系统推进过），最后写回。
///
/// 提交路径对 ESCAPE tag 写入的 `blocknr` 同样是 0（见 `commit::prepare_data`），
/// 这里不再依赖 tag 里的地址去定位 home 块——该信息在提交时已经随
/// ESCAPE 一起折叠进同一个哨兵值，这条分支因此和 superblock 特判共用
/// 同一段代码路径，与原始 C `jbd_replay_block_tags()` 对 `tag_info.block`
/// 的处理完全一致。先于 home 写回之前按 ESCAPE 标志位恢复数据块第一个字
/// 的 magic number，不受走哪条分支影响。
fn replay_tag<D: BlockDevice>(
    jbd_fs: &JbdFs,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
    log_iblock: u32,
    tag: &ExtractedTag,
) -> Result<()> {
    let log_lba = jbd_fs.inode_bmap(bdev, superblock, log_iblock)?;
    let mut data = {
        let mut block = Block::get(bdev, log_lba)?;
        block.with_data(|d| d.to_vec())?
    };

    if tag.flags & JBD_FLAG_ESCAPE != 0 && data.len() >= 4 {
        data[0..4].copy_from_slice(&JBD_MAGIC_NUMBER.to_be_bytes());
    }

    if tag.blocknr == 0 {
        let saved_mnt_count = superblock.inner().mnt_count;
        let saved_state = superblock.inner().state;

        bdev.write_bytes(0, &data)?;

        let mut replayed = Superblock::load(bdev)?;
        replayed.inner_mut().mnt_count = saved_mnt_count;
        replayed.inner_mut().state = saved_state;
        replayed.write(bdev)?;
        *superblock = replayed;
    } else {
        let mut block = Block::get_noread(bdev, tag.blocknr)?;
        block.with_data_mut(|d| {
            let len = data.len().min(d.len());
            d[..len].copy_from_slice(&data[..len]);
        })?;
    }

    Ok(())
}

/// 处理一个描述符块：依次解析其中的 tag，在 Recover 遍对每个未被撤销
/// 的 tag 重放日志内容，返回最后一个数据块之后的日志逻辑块号
fn process_descriptor<D: BlockDevice>(
    jbd_fs: &JbdFs,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
    pass: Pass,
    desc_lba: u64,
    desc_iblock: u32,
    this_trans_id: u32,
    incompat: u32,
    revoke: &RevokeTable,
) -> Result<u32> {
    let first = jbd_fs.first();
    let maxlen = jbd_fs.max_len();
    let block_size = jbd_fs.block_size() as usize;

    let body: Vec<u8> = {
        let mut block = Block::get(bdev, desc_lba)?;
        block.with_data(|d| d.to_vec())?
    };

    let mut offset = core::mem::size_of::<jbd_bhdr>();
    let mut iblock = desc_iblock;

    loop {
        if offset >= block_size {
            break;
        }
        let (tag, consumed) = match codec::extract_tag(&body[offset..], incompat) {
            Ok(v) => v,
            Err(_) => break,
        };
        offset += consumed;
        iblock = wrap(first, maxlen, iblock + 1);

        if pass == Pass::Recover && !revoke.should_skip(tag.blocknr, this_trans_id) {
            replay_tag(jbd_fs, bdev, superblock, iblock, &tag)?;
        }

        if tag.flags & JBD_FLAG_LAST_TAG != 0 {
            break;
        }
    }

    Ok(iblock)
}

/// 处理一个撤销块：解析其中的块号记录，逐个登记进撤销表
fn process_revoke<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    fs_lba: u64,
    this_trans_id: u32,
    incompat: u32,
    revoke: &mut RevokeTable,
) -> Result<()> {
    let header_size = core::mem::size_of::<jbd_revoke_header>();
    let body: Vec<u8> = {
        let mut block = Block::get(bdev, fs_lba)?;
        block.with_data(|d| d.to_vec())?
    };

    let count = {
        let header = unsafe { core::ptr::read_unaligned(body.as_ptr() as *const jbd_revoke_header) };
        u32::from_be(header.count) as usize
    };
    let body_len = count
        .saturating_sub(header_size)
        .min(body.len().saturating_sub(header_size));

    for block in codec::decode_revoke_records(&body[header_size..header_size + body_len], incompat) {
        revoke.record(block, this_trans_id);
    }

    Ok(())
}

/// 跑一遍日志：从 `jbd_fs.start()` 开始迭代，直到遇到无效块头、序列号
/// 不匹配、绕回起点，或者（非 Scan 遍）超出 `info.last_trans_id`。
///
/// 返回本遍结束时到达的事务 ID（即 Scan 遍用来确定 `last_trans_id` 的值）。
fn run_pass<D: BlockDevice>(
    jbd_fs: &JbdFs,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
    pass: Pass,
    info: Option<&RecoverInfo>,
    revoke: &mut RevokeTable,
) -> Result<u32> {
    let first = jbd_fs.first();
    let maxlen = jbd_fs.max_len();
    let loop_start = jbd_fs.start();
    let incompat = incompat_features(jbd_fs);

    let mut iblock = loop_start;
    let mut this_trans_id = jbd_fs.sequence();
    let mut first_iter = true;

    loop {
        if let Some(info) = info {
            if this_trans_id > info.last_trans_id {
                break;
            }
        }
        if !first_iter && iblock == loop_start {
            break;
        }
        first_iter = false;

        let fs_lba = jbd_fs.inode_bmap(bdev, superblock, iblock)?;
        let (magic, blocktype, seq) = read_header(bdev, fs_lba)?;

        if magic != JBD_MAGIC_NUMBER || seq != this_trans_id {
            break;
        }

        match blocktype {
            JBD_DESCRIPTOR_BLOCK => {
                iblock = process_descriptor(
                    jbd_fs,
                    bdev,
                    superblock,
                    pass,
                    fs_lba,
                    iblock,
                    this_trans_id,
                    incompat,
                    revoke,
                )?;
            }
            JBD_REVOKE_BLOCK => {
                if pass == Pass::Revoke {
                    process_revoke(bdev, fs_lba, this_trans_id, incompat, revoke)?;
                }
            }
            JBD_COMMIT_BLOCK => {
                this_trans_id += 1;
            }
            _ => break,
        }

        // 每个被读到的日志块（含描述符自身）都要前进一格，与原始 C
        // `jbd_iterate_log()` 在 switch 之后无条件的 `this_block++` 对应；
        // 描述符块内部按 tag 逐个前进到其数据块，这里的前进是落在最后一个
        // 数据块之后、指向紧随其后的下一个日志块（通常是 commit 块）。
        iblock = wrap(first, maxlen, iblock + 1);
    }

    Ok(this_trans_id)
}

/// 执行 journal 恢复
///
/// 对应 lwext4 的 `jbd_recover()`。若 `sb.start == 0`，日志是空的（正常的
/// 干净卸载），直接返回成功。否则依次跑 Scan -> Revoke -> Recover 三遍；
/// 全部成功后把 `sb.start` 置零、清除文件系统的 `INCOMPAT_RECOVER`
/// 特性并持久化文件系统 superblock，同时把 journal superblock 标记为脏
/// （按 [`JbdFs::put`] 既有的脏标记约定，由调用方负责最终落盘）。
pub fn recover<D: BlockDevice>(
    jbd_fs: &mut JbdFs,
    bdev: &mut BlockDev<D>,
    superblock: &mut Superblock,
) -> Result<()> {
    if jbd_fs.start() == 0 {
        return Ok(());
    }

    if !jbd_fs.sb.is_valid() {
        return Err(crate::error::Error::from(JournalError::InvalidSuperblock));
    }

    let mut revoke = RevokeTable::new();

    let last_trans_id = run_pass(jbd_fs, bdev, superblock, Pass::Scan, None, &mut revoke)?;
    let start_trans_id = jbd_fs.sequence();
    let info = RecoverInfo {
        last_trans_id: if last_trans_id > start_trans_id {
            last_trans_id - 1
        } else {
            last_trans_id
        },
    };

    run_pass(jbd_fs, bdev, superblock, Pass::Revoke, Some(&info), &mut revoke)?;
    run_pass(jbd_fs, bdev, superblock, Pass::Recover, Some(&info), &mut revoke)?;

    // `last_trans_id`（Scan 遍原始返回值，未经 `info.last_trans_id` 的 -1 修正）
    // 就是下一笔新事务应当使用的序列号：若最后一个事务的 commit 块被观察到，
    // Scan 遍已经把它计入并前进了一位；若日志尾部是一段不完整的事务（没有
    // commit 块），Scan 遍在那里终止，this_trans_id 还没有被那个未完成的
    // 事务消耗，原样就是它应当被重新使用的序列号。
    jbd_fs.set_sequence(last_trans_id);
    jbd_fs.set_start(0);
    superblock.clear_incompat_feature(EXT4_FEATURE_INCOMPAT_RECOVER);
    superblock.write(bdev)?;
    jbd_fs.mark_dirty();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::{EXT4_FEATURE_COMPAT_HAS_JOURNAL, EXT4_INODE_DIRECT_BLOCKS},
        types::{ext4_group_desc, ext4_inode, ext4_sblock},
    };
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

    fn dummy_jbd_fs(start: u32) -> JbdFs {
        let mut sb = jbd_sb::default();
        sb.maxlen = 64u32.to_be();
        sb.first = 1u32.to_be();
        sb.start = start.to_be();
        sb.sequence = 1u32.to_be();
        JbdFs {
            inode: 8,
            sb,
            dirty: false,
        }
    }

    const JOURNAL_INODE_NUM: u32 = 8;
    const BLOCK_SIZE: u32 = 4096;
    const TOTAL_BLOCKS: u64 = 128;
    const INODE_TABLE_BLOCK: u64 = 2;
    const JOURNAL_FIRST_BLOCK: u64 = 10;
    const JOURNAL_LEN: u32 = 12;

    /// 搭建一个块组、journal inode 用直接块指针映射到紧随其后的日志区域
    /// 的最小化文件系统，供端到端重放测试使用。块大小取 4096，使得“块 0”
    /// 完整覆盖 ext4 主 superblock 固定的字节偏移 1024 处，这样 superblock
    /// 特判分支（`replay_tag` 里 `tag.blocknr == 0`）才有意义可测。
    fn setup_fs() -> (BlockDev<RamDisk>, Superblock) {
        let mut bdev = BlockDev::new(RamDisk::new(TOTAL_BLOCKS, BLOCK_SIZE)).unwrap();

        let mut sb_inner = ext4_sblock::default();
        sb_inner.blocks_count_lo = (TOTAL_BLOCKS as u32).to_le();
        sb_inner.log_block_size = 2u32.to_le(); // 4096 = 1024 << 2
        sb_inner.inodes_count = 16u32.to_le();
        sb_inner.inode_size = 256u16.to_le();
        sb_inner.blocks_per_group = (TOTAL_BLOCKS as u32).to_le();
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
        journal_inode.size_lo = ((JOURNAL_LEN as u64) * BLOCK_SIZE as u64) as u32;
        for i in 0..JOURNAL_LEN.min(EXT4_INODE_DIRECT_BLOCKS as u32) {
            journal_inode.blocks[i as usize] = ((JOURNAL_FIRST_BLOCK as u32) + i).to_le();
        }

        let inode_size = superblock.inode_size() as usize;
        let index_in_group = (JOURNAL_INODE_NUM - 1) as usize;
        let inode_offset =
            INODE_TABLE_BLOCK * BLOCK_SIZE as u64 + (index_in_group * inode_size) as u64;
        let mut inode_buf = vec![0u8; inode_size];
        unsafe {
            core::ptr::write_unaligned(inode_buf.as_mut_ptr() as *mut ext4_inode, journal_inode);
        }
        bdev.write_bytes(inode_offset, &inode_buf).unwrap();

        (bdev, superblock)
    }

    /// 构造一个挂在 `setup_fs()` 日志区域上的 journal superblock，`first=1`
    /// 把 iblock 0 留给 jbd_sb 自身（与生产代码一致），`maxlen` 等于直接块
    /// 指针能覆盖的 12 个日志块。
    fn journal_fs(start: u32, sequence: u32) -> JbdFs {
        let mut sb = jbd_sb::default();
        sb.blocksize = BLOCK_SIZE.to_be();
        sb.maxlen = JOURNAL_LEN.to_be();
        sb.first = 1u32.to_be();
        sb.start = start.to_be();
        sb.sequence = sequence.to_be();
        JbdFs {
            inode: JOURNAL_INODE_NUM,
            sb,
            dirty: false,
        }
    }

    fn write_journal_block<D: BlockDevice>(
        jbd_fs: &JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
        iblock: u32,
        fill: impl FnOnce(&mut [u8]),
    ) {
        let lba = jbd_fs.inode_bmap(bdev, superblock, iblock).unwrap();
        let mut block = Block::get_noread(bdev, lba).unwrap();
        block.with_data_mut(fill).unwrap();
    }

    fn write_descriptor_block<D: BlockDevice>(
        jbd_fs: &JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
        iblock: u32,
        trans_id: u32,
        tags: &[ExtractedTag],
    ) {
        write_journal_block(jbd_fs, bdev, superblock, iblock, |d| {
            let header = jbd_bhdr::new(JBD_DESCRIPTOR_BLOCK, trans_id);
            unsafe {
                core::ptr::write_unaligned(d.as_mut_ptr() as *mut jbd_bhdr, header);
            }
            let mut off = core::mem::size_of::<jbd_bhdr>();
            for tag in tags {
                off += codec::write_tag(&mut d[off..], tag, 0).unwrap();
            }
        });
    }

    fn write_commit_block<D: BlockDevice>(
        jbd_fs: &JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
        iblock: u32,
        trans_id: u32,
    ) {
        write_journal_block(jbd_fs, bdev, superblock, iblock, |d| {
            let header = jbd_bhdr::new(JBD_COMMIT_BLOCK, trans_id);
            unsafe {
                core::ptr::write_unaligned(d.as_mut_ptr() as *mut jbd_bhdr, header);
            }
        });
    }

    fn write_revoke_block<D: BlockDevice>(
        jbd_fs: &JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
        iblock: u32,
        trans_id: u32,
        blocks: &[u64],
    ) {
        write_journal_block(jbd_fs, bdev, superblock, iblock, |d| {
            let body = codec::encode_revoke_records(blocks, 0);
            let hsz = core::mem::size_of::<jbd_revoke_header>();
            let header = jbd_revoke_header {
                header: jbd_bhdr::new(JBD_REVOKE_BLOCK, trans_id),
                count: (hsz as u32 + body.len() as u32).to_be(),
            };
            unsafe {
                core::ptr::write_unaligned(d.as_mut_ptr() as *mut jbd_revoke_header, header);
            }
            d[hsz..hsz + body.len()].copy_from_slice(&body);
        });
    }

    fn write_data_block<D: BlockDevice>(
        jbd_fs: &JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
        iblock: u32,
        fill_byte: u8,
    ) {
        write_journal_block(jbd_fs, bdev, superblock, iblock, |d| {
            for b in d.iter_mut() {
                *b = fill_byte;
            }
        });
    }

    fn read_home<D: BlockDevice>(bdev: &mut BlockDev<D>, lba: u64) -> Vec<u8> {
        let mut block = Block::get(bdev, lba).unwrap();
        block.with_data(|d| d.to_vec()).unwrap()
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(1, 64, 10), 10);
        assert_eq!(wrap(1, 64, 64), 1);
        assert_eq!(wrap(1, 64, 65), 2);
    }

    #[test]
    fn test_recover_noop_when_start_is_zero() {
        let mut bdev = BlockDev::new(RamDisk::new(8, 4096)).unwrap();
        let mut jbd_fs = dummy_jbd_fs(0);
        let mut superblock = Superblock::new(ext4_sblock::default());

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert!(!jbd_fs.is_dirty());
    }

    #[test]
    fn test_recover_empty_log_clears_recover_flag() {
        // start 指向一个全零块：既没有 JBD magic，Scan 遍立即终止，
        // last_trans_id 退化等于 start_trans_id，Recover 遍重放零个事务。
        let (mut bdev, mut superblock) = setup_fs();
        superblock.inner_mut().feature_incompat = EXT4_FEATURE_INCOMPAT_RECOVER.to_le();
        let mut jbd_fs = journal_fs(1, 1);

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert_eq!(jbd_fs.start(), 0);
        assert!(jbd_fs.is_dirty());
        assert!(!superblock.has_incompat_feature(EXT4_FEATURE_INCOMPAT_RECOVER));
    }

    #[test]
    fn test_recover_replays_single_transaction_to_home() {
        // spec §8 场景 2：一个完整事务（描述符 + 数据 + 提交），重放后
        // home 块应得到日志里记录的内容，序列号推进到下一个待用事务 ID。
        let (mut bdev, mut superblock) = setup_fs();
        let mut jbd_fs = journal_fs(1, 5);
        let home_lba = 100u64;

        write_descriptor_block(
            &jbd_fs,
            &mut bdev,
            &mut superblock,
            1,
            5,
            &[ExtractedTag {
                blocknr: home_lba,
                flags: JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
                checksum: 0,
                uuid: None,
            }],
        );
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 2, 0xAA);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 3, 5);

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert!(read_home(&mut bdev, home_lba).iter().all(|&b| b == 0xAA));
        assert_eq!(jbd_fs.start(), 0);
        assert_eq!(jbd_fs.sequence(), 6);
    }

    #[test]
    fn test_recover_revoke_suppresses_older_transaction_write() {
        // spec §8 场景 3：T1 写 home 块，T2 撤销它，T3 再写一次。重放后
        // home 块应只留下 T3 的内容,T1 被撤销表拦下。
        let (mut bdev, mut superblock) = setup_fs();
        let mut jbd_fs = journal_fs(1, 5);
        let home_lba = 101u64;

        let tag = |blocknr| ExtractedTag {
            blocknr,
            flags: JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
            checksum: 0,
            uuid: None,
        };

        write_descriptor_block(&jbd_fs, &mut bdev, &mut superblock, 1, 5, &[tag(home_lba)]);
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 2, 0x11);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 3, 5);

        write_revoke_block(&jbd_fs, &mut bdev, &mut superblock, 4, 6, &[home_lba]);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 5, 6);

        write_descriptor_block(&jbd_fs, &mut bdev, &mut superblock, 6, 7, &[tag(home_lba)]);
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 7, 0x33);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 8, 7);

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert!(read_home(&mut bdev, home_lba).iter().all(|&b| b == 0x33));
        assert_eq!(jbd_fs.sequence(), 8);
    }

    #[test]
    fn test_recover_stops_at_torn_tail() {
        // spec §8 场景 4：最后一个事务只留下了描述符和数据块，没有提交块
        // （崩溃发生在提交块落盘之前）。重放应当在那里停住，完整的前一个
        // 事务照常生效，不完整的尾部被整体丢弃。
        let (mut bdev, mut superblock) = setup_fs();
        let mut jbd_fs = journal_fs(1, 5);
        let home_z = 102u64;
        let home_w = 103u64;

        // 预先给 W 填一个哨兵值，用来证明它确实没有被碰过。
        {
            let mut block = Block::get_noread(&mut bdev, home_w).unwrap();
            block.with_data_mut(|d| d.iter_mut().for_each(|b| *b = 0x55)).unwrap();
        }

        write_descriptor_block(
            &jbd_fs,
            &mut bdev,
            &mut superblock,
            1,
            5,
            &[ExtractedTag {
                blocknr: home_z,
                flags: JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
                checksum: 0,
                uuid: None,
            }],
        );
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 2, 0xCC);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 3, 5);

        write_descriptor_block(
            &jbd_fs,
            &mut bdev,
            &mut superblock,
            4,
            6,
            &[ExtractedTag {
                blocknr: home_w,
                flags: JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
                checksum: 0,
                uuid: None,
            }],
        );
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 5, 0xEE);
        // 故意不写 iblock 6 的提交块：尾部事务不完整。

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert!(read_home(&mut bdev, home_z).iter().all(|&b| b == 0xCC));
        assert!(read_home(&mut bdev, home_w).iter().all(|&b| b == 0x55));
        assert_eq!(jbd_fs.sequence(), 6);
    }

    #[test]
    fn test_recover_wraps_across_log_end() {
        // 最后一个事务的描述符/数据落在日志区末尾，提交块绕回到区域起点，
        // 验证 `nav::wrap` 在端到端重放里被正确应用。
        let (mut bdev, mut superblock) = setup_fs();
        let mut jbd_fs = journal_fs(10, 5);
        let home_lba = 104u64;

        write_descriptor_block(
            &jbd_fs,
            &mut bdev,
            &mut superblock,
            10,
            5,
            &[ExtractedTag {
                blocknr: home_lba,
                flags: JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
                checksum: 0,
                uuid: None,
            }],
        );
        write_data_block(&jbd_fs, &mut bdev, &mut superblock, 11, 0x77);
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 1, 5);

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert!(read_home(&mut bdev, home_lba).iter().all(|&b| b == 0x77));
        assert_eq!(jbd_fs.start(), 0);
        assert_eq!(jbd_fs.sequence(), 6);
    }

    #[test]
    fn test_recover_escaped_superblock_tag_restores_magic_and_preserves_mount_state() {
        // ESCAPE + superblock 特判的交叉场景：tag.blocknr == 0 既可能是
        // 真正的文件系统 superblock,也可能是提交路径为 ESCAPE 写下的
        // 同一个哨兵值。日志块第一个字在提交时已被清零，重放时必须先
        // 按 ESCAPE 恢复 magic number，再叠加当前 mount_count/state 写回。
        use crate::consts::EXT4_SUPERBLOCK_OFFSET;

        let (mut bdev, mut superblock) = setup_fs();
        superblock.inner_mut().mnt_count = 42u16.to_le();
        superblock.inner_mut().state = 7u16.to_le();
        let mut jbd_fs = journal_fs(1, 9);

        write_descriptor_block(
            &jbd_fs,
            &mut bdev,
            &mut superblock,
            1,
            9,
            &[ExtractedTag {
                blocknr: 0,
                flags: JBD_FLAG_ESCAPE | JBD_FLAG_LAST_TAG | JBD_FLAG_SAME_UUID,
                checksum: 0,
                uuid: None,
            }],
        );

        let mut journaled_sblock = ext4_sblock::default();
        journaled_sblock.magic = crate::consts::EXT4_SUPERBLOCK_MAGIC.to_le();
        journaled_sblock.mnt_count = 3u16.to_le();
        journaled_sblock.state = 1u16.to_le();
        write_journal_block(&jbd_fs, &mut bdev, &mut superblock, 2, |d| {
            // 提交路径已经把 ESCAPE 块的头 4 字节清零；其余部分是 block 0
            // 在记录那一刻的原样内容，superblock 位于其固定字节偏移处。
            d[0..4].fill(0);
            unsafe {
                core::ptr::write_unaligned(
                    d[EXT4_SUPERBLOCK_OFFSET as usize..].as_mut_ptr() as *mut ext4_sblock,
                    journaled_sblock,
                );
            }
        });
        write_commit_block(&jbd_fs, &mut bdev, &mut superblock, 3, 9);

        recover(&mut jbd_fs, &mut bdev, &mut superblock).unwrap();

        assert_eq!(u16::from_le(superblock.inner().mnt_count), 42);
        assert_eq!(u16::from_le(superblock.inner().state), 7);

        let mut magic_bytes = [0u8; 4];
        bdev.read_bytes(0, &mut magic_bytes).unwrap();
        assert_eq!(magic_bytes, JBD_MAGIC_NUMBER.to_be_bytes());
    }

    #[test]
    fn test_process_revoke_populates_table() {
        let mut bdev = BlockDev::new(RamDisk::new(8, 4096)).unwrap();
        let header = jbd_revoke_header {
            header: jbd_bhdr::new(JBD_REVOKE_BLOCK, 3),
            count: (core::mem::size_of::<jbd_revoke_header>() as u32 + 8).to_be(),
        };
        let mut block_buf = vec![0u8; 4096];
        unsafe {
            core::ptr::write_unaligned(block_buf.as_mut_ptr() as *mut jbd_revoke_header, header);
        }
        let body = codec::encode_revoke_records(&[42u64], 0);
        let hsz = core::mem::size_of::<jbd_revoke_header>();
        block_buf[hsz..hsz + body.len()].copy_from_slice(&body);
        {
            let mut block = Block::get_noread(&mut bdev, 5).unwrap();
            block.with_data_mut(|d| d.copy_from_slice(&block_buf)).unwrap();
        }

        let mut revoke = RevokeTable::new();
        process_revoke(&mut bdev, 5, 3, 0, &mut revoke).unwrap();
        assert_eq!(revoke.lookup(42), Some(3));
    }
}
