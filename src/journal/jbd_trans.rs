//! JBD 事务管理
//!
//! 对应 lwext4 的 `struct jbd_trans` 及 `jbd_journal_get_write_access()` /
//! `jbd_trans_set_block_dirty()` / `jbd_journal_revoke()` 等事务操作函数
//! (`ext4_journal.c`)

use super::{checkpoint, jbd_buf::JbdBuf, jbd_journal::JbdJournal};
use crate::{
    block::{Block, BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;

/// 一个运行中或正在检查点的事务
///
/// 对应 lwext4 的 `struct jbd_trans`
#[derive(Debug, Clone)]
pub struct JbdTrans {
    /// 事务 ID，在提交时从 `journal.alloc_trans_id` 分配
    pub trans_id: u32,

    /// 第一个描述符块落地的日志块号；提交前为 0
    pub start_iblock: u32,

    /// 该事务消耗的日志块数
    pub alloc_blocks: i32,

    /// 已登记的脏缓冲区
    pub buf_list: Vec<JbdBuf>,

    /// 待撤销的块号列表（只增不减，允许重复）
    pub revoke_list: Vec<u64>,

    /// 本事务写入的数据块计数（检查点完成判据）
    pub data_cnt: u32,

    /// 已完成回写的数据块计数
    pub written_cnt: u32,

    /// 粘性错误：第一次写完成失败时记录的错误
    pub error: Option<Error>,
}

impl JbdTrans {
    /// 创建一个尚未分配 ID 的新事务（ID 在提交时分配）
    pub(super) fn new() -> Self {
        Self {
            trans_id: 0,
            start_iblock: 0,
            alloc_blocks: 0,
            buf_list: Vec::new(),
            revoke_list: Vec::new(),
            data_cnt: 0,
            written_cnt: 0,
            error: None,
        }
    }

    /// 本事务是否只产生了撤销记录，没有数据块需要检查点回写
    pub fn is_pure_revoke(&self) -> bool {
        self.data_cnt == 0
    }

    /// 本事务的所有数据块是否都已完成检查点回写
    pub fn is_checkpointed(&self) -> bool {
        self.written_cnt == self.data_cnt
    }

    /// 记录一个粘性错误（只保留第一个）
    pub(super) fn set_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// 是否已经登记了该文件系统块
    fn has_buf(&self, fs_lba: u64) -> bool {
        self.buf_list.iter().any(|b| b.fs_lba == fs_lba)
    }
}

/// 记录 home-lba 当前被哪个事务持有
///
/// 对应 lwext4 的 `struct jbd_block_rec`。缓冲区引用不在这里持有——一旦
/// 写完，记录本身就会被移除，因此不需要单独的“空指针”状态。
#[derive(Debug, Clone, Copy)]
pub struct BlockRecord {
    /// 拥有该 home-lba 的事务 ID
    pub trans_id: u32,
}

/// 授予对 `fs_lba` 的写访问权
///
/// 若该块当前被另一个事务持有（必然是已提交、正在检查点的事务，因为日志
/// 同时只允许一个打开事务），强制立即将其刷回 home 位置，确保任意时刻
/// 至多一个事务持有某个块的在途日志状态。
pub fn get_access<D: BlockDevice>(
    journal: &mut JbdJournal,
    trans: &JbdTrans,
    bdev: &mut BlockDev<D>,
    fs_lba: u64,
) -> Result<()> {
    let owner = journal.block_rec_root.get(&fs_lba).map(|r| r.trans_id);
    if let Some(owner_id) = owner {
        if owner_id != trans.trans_id {
            checkpoint::flush_buffer(journal, bdev, fs_lba)?;
        }
    }
    Ok(())
}

/// 将 `fs_lba` 标记为脏并登记进事务
///
/// 若该块尚未登记在本事务中，分配一个 `JbdBuf` 条目，登记（或复用）块记录，
/// 加入 `trans.buf_list`，增加 `data_cnt`，并标记底层缓存缓冲区为脏，
/// 使缓存自身的脏状态追踪保持权威。
pub fn set_block_dirty<D: BlockDevice>(
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
    fs_lba: u64,
) -> Result<()> {
    if trans.has_buf(fs_lba) {
        return Ok(());
    }

    match journal.block_rec_root.get(&fs_lba) {
        Some(rec) if rec.trans_id != trans.trans_id => {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "block record still owned by another live transaction; get_access should flush it first",
            ));
        }
        _ => {
            journal
                .block_rec_root
                .insert(fs_lba, BlockRecord { trans_id: trans.trans_id });
        }
    }

    trans.buf_list.push(JbdBuf::new(fs_lba));
    trans.data_cnt += 1;

    let mut block = Block::get(bdev, fs_lba)?;
    block.with_data_mut(|_| {})?;

    Ok(())
}

/// 将 `fs_lba` 追加到本事务的撤销列表（允许重复）
pub fn revoke_block(trans: &mut JbdTrans, fs_lba: u64) {
    trans.revoke_list.push(fs_lba);
}

/// 尝试撤销一个块：如果它被另一个事务持有且数据仍在途，先强制刷回，
/// 然后记录撤销。文件系统释放一个块、但该块之前的内容还在日志中或正在
/// 检查点时，用这个操作防止该块被复用后仍有一条过期的 home 写入落地。
pub fn try_revoke_block<D: BlockDevice>(
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    bdev: &mut BlockDev<D>,
    fs_lba: u64,
) -> Result<()> {
    let owner = journal.block_rec_root.get(&fs_lba).map(|r| r.trans_id);
    if let Some(owner_id) = owner {
        if owner_id != trans.trans_id {
            checkpoint::flush_buffer(journal, bdev, fs_lba)?;
            revoke_block(trans, fs_lba);
        }
    }
    Ok(())
}

/// 释放一个事务：`abort` 为真时丢弃其全部脏数据而不回写（事务被放弃，
/// 而非提交）；否则认为其缓冲区已经各自处理完毕。两种情况下都会移除
/// 仍归属于本事务的块记录。
pub fn free_trans<D: BlockDevice>(
    journal: &mut JbdJournal,
    trans: &mut JbdTrans,
    abort: bool,
    bdev: &mut BlockDev<D>,
) -> Result<()> {
    for buf in trans.buf_list.drain(..) {
        if abort {
            bdev.invalidate_cache_block(buf.fs_lba)?;
        }
        if let Some(rec) = journal.block_rec_root.get(&buf.fs_lba) {
            if rec.trans_id == trans.trans_id {
                journal.block_rec_root.remove(&buf.fs_lba);
            }
        }
    }
    trans.revoke_list.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDevice;
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
        fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
            let off = lba as usize * self.block_size as usize;
            let len = count as usize * self.block_size as usize;
            buf[..len].copy_from_slice(&self.data[off..off + len]);
            Ok(count as usize)
        }
        fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
            let off = lba as usize * self.block_size as usize;
            let len = count as usize * self.block_size as usize;
            self.data[off..off + len].copy_from_slice(&buf[..len]);
            Ok(count as usize)
        }
    }

    fn new_journal() -> JbdJournal {
        JbdJournal::new(1, 64, 4096)
    }

    #[test]
    fn test_set_block_dirty_enlists_once() {
        let mut bdev = BlockDev::new(RamDisk::new(128, 4096)).unwrap();
        let mut journal = new_journal();
        let mut trans = JbdTrans::new();
        trans.trans_id = journal.alloc_trans_id;

        set_block_dirty(&mut journal, &mut trans, &mut bdev, 10).unwrap();
        set_block_dirty(&mut journal, &mut trans, &mut bdev, 10).unwrap();

        assert_eq!(trans.data_cnt, 1);
        assert_eq!(trans.buf_list.len(), 1);
        assert_eq!(journal.block_rec_root.get(&10).unwrap().trans_id, trans.trans_id);
    }

    #[test]
    fn test_revoke_block_allows_duplicates() {
        let mut trans = JbdTrans::new();
        revoke_block(&mut trans, 5);
        revoke_block(&mut trans, 5);
        assert_eq!(trans.revoke_list, vec![5, 5]);
    }

    #[test]
    fn test_free_trans_clears_block_record() {
        let mut bdev = BlockDev::new(RamDisk::new(128, 4096)).unwrap();
        let mut journal = new_journal();
        let mut trans = JbdTrans::new();
        trans.trans_id = journal.alloc_trans_id;

        set_block_dirty(&mut journal, &mut trans, &mut bdev, 20).unwrap();
        assert!(journal.block_rec_root.contains_key(&20));

        free_trans(&mut journal, &mut trans, true, &mut bdev).unwrap();
        assert!(!journal.block_rec_root.contains_key(&20));
        assert!(trans.buf_list.is_empty());
    }

    #[test]
    fn test_set_block_dirty_rejects_foreign_owner() {
        let mut bdev = BlockDev::new(RamDisk::new(128, 4096)).unwrap();
        let mut journal = new_journal();
        journal.block_rec_root.insert(30, BlockRecord { trans_id: 999 });

        let mut trans = JbdTrans::new();
        trans.trans_id = 1;

        let err = set_block_dirty(&mut journal, &mut trans, &mut bdev, 30).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
}
