//! 检查点（checkpoint）完成处理
//!
//! 对应 lwext4 的 `jbd_trans_end()` 写完成回调路径
//! (`ext4_journal.c` 中 `jbd_buffer_free()`/写完成钩子)。
//!
//! # 为什么是同步调用
//!
//! lwext4 原本把检查点推进挂在块缓存的写完成回调上，回调既可能在写操作内
//! 同步触发，也可能由异步 I/O 层稍后触发。这个 crate 的 [`crate::cache::BlockCache`]
//! 总是同步、内联地完成刷盘，所以这里直接把“写完成后应该做的事”写成普通
//! 函数调用，而不是去拼一个 `Box<dyn FnOnce(..) + Send>` 回调——日志状态需要
//! `&mut JbdJournal`，把它捕获进一个 `Send` 闭包需要额外的 `Rc<RefCell<_>>`
//! 包装，而调用方本来就持有 `&mut JbdJournal`，直接传引用更直接。

use super::{jbd_journal::JbdJournal, jbd_trans::JbdTrans, nav};
use crate::{
    block::{BlockDev, BlockDevice},
    error::Result,
};
use alloc::vec::Vec;

/// 将 `fs_lba` 对应的脏缓冲区同步刷回其 home 位置，并驱动检查点完成处理
pub fn flush_buffer<D: BlockDevice>(
    journal: &mut JbdJournal,
    bdev: &mut BlockDev<D>,
    fs_lba: u64,
) -> Result<()> {
    let result = bdev.flush_lba(fs_lba);
    complete_buffer(journal, fs_lba, result)
}

/// 处理一次缓冲区写完成事件：更新所属事务的计数，必要时推进检查点队列
fn complete_buffer(journal: &mut JbdJournal, fs_lba: u64, result: Result<()>) -> Result<()> {
    let owner_trans_id = match journal.block_rec_root.get(&fs_lba) {
        Some(rec) => rec.trans_id,
        None => return result,
    };

    let idx = match journal.cp_queue.iter().position(|t| t.trans_id == owner_trans_id) {
        Some(idx) => idx,
        None => return result,
    };

    if let Err(ref err) = result {
        journal.cp_queue[idx].set_error(err.clone());
    }

    journal.cp_queue[idx].buf_list.retain(|b| b.fs_lba != fs_lba);
    journal.cp_queue[idx].written_cnt += 1;

    if let Some(rec) = journal.block_rec_root.get(&fs_lba) {
        if rec.trans_id == owner_trans_id {
            journal.block_rec_root.remove(&fs_lba);
        }
    }

    if journal.cp_queue[idx].is_checkpointed() && idx == 0 {
        let finished = journal.cp_queue.pop_front().unwrap();
        journal.start = nav::wrap(
            journal.first,
            journal.maxlen,
            finished.start_iblock + finished.alloc_blocks as u32,
        );
        journal.trans_id = finished.trans_id + 1;
        drain_checkpointed_head(journal);
    }

    result
}

/// 从 `cp_queue` 头部丢弃所有已经没有数据块要等待的事务，推进
/// `journal.start`/`journal.trans_id` 越过它们，直到遇到一个仍有未完成
/// 数据块的事务，或者队列被清空
fn drain_checkpointed_head(journal: &mut JbdJournal) {
    loop {
        match journal.cp_queue.front() {
            Some(front) if front.is_checkpointed() => {
                let trans = journal.cp_queue.pop_front().unwrap();
                journal.start = nav::wrap(
                    journal.first,
                    journal.maxlen,
                    trans.start_iblock + trans.alloc_blocks as u32,
                );
                journal.trans_id = trans.trans_id + 1;
            }
            Some(front) => {
                journal.start = front.start_iblock;
                journal.trans_id = front.trans_id;
                break;
            }
            None => {
                journal.start = journal.last;
                break;
            }
        }
    }
}

/// 强制刷新一个检查点事务的所有剩余脏缓冲区，走完它的检查点流程
///
/// 纯撤销事务没有数据块缓冲区，循环立即退出。
fn checkpoint_one<D: BlockDevice>(journal: &mut JbdJournal, bdev: &mut BlockDev<D>, trans_id: u32) -> Result<()> {
    loop {
        let next_lba = match journal.cp_queue.iter().find(|t| t.trans_id == trans_id) {
            Some(trans) => match trans.buf_list.first() {
                Some(buf) => buf.fs_lba,
                None => break,
            },
            None => break,
        };
        flush_buffer(journal, bdev, next_lba)?;
    }
    Ok(())
}

/// 强制把 `cp_queue` 上所有事务的数据同步刷回 home 位置，直至队列清空
///
/// 对应 `jbd_journal_flush_trans()`；在日志空间耗尽（`alloc_block` 绕回到
/// `start`）或 `journal_stop` 时调用。
pub fn flush_all_trans<D: BlockDevice>(journal: &mut JbdJournal, bdev: &mut BlockDev<D>) -> Result<()> {
    while let Some(trans_id) = journal.cp_queue.front().map(|t| t.trans_id) {
        checkpoint_one(journal, bdev, trans_id)?;
        let still_head_and_done = journal
            .cp_queue
            .front()
            .map(|t| t.trans_id == trans_id && t.is_checkpointed())
            .unwrap_or(false);
        if still_head_and_done {
            let trans = journal.cp_queue.pop_front().unwrap();
            journal.start = nav::wrap(
                journal.first,
                journal.maxlen,
                trans.start_iblock + trans.alloc_blocks as u32,
            );
            journal.trans_id = trans.trans_id + 1;
        }
    }
    journal.start = journal.last;
    Ok(())
}

/// 一个已提交事务是否是“纯撤销事务”（没有数据块需要检查点）
pub fn is_pure_revoke(trans: &JbdTrans) -> bool {
    trans.is_pure_revoke()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::jbd_buf::JbdBuf;
    use crate::journal::jbd_trans::BlockRecord;
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

    fn trans_with(id: u32, start_iblock: u32, alloc_blocks: i32, data_cnt: u32) -> JbdTrans {
        let mut trans = JbdTrans::new();
        trans.trans_id = id;
        trans.start_iblock = start_iblock;
        trans.alloc_blocks = alloc_blocks;
        trans.data_cnt = data_cnt;
        trans
    }

    #[test]
    fn test_complete_buffer_advances_queue_head() {
        let mut bdev = BlockDev::new(RamDisk::new(64, 4096)).unwrap();
        let mut journal = JbdJournal::new(1, 64, 4096);

        let mut trans = trans_with(1, 1, 2, 1);
        trans.buf_list.push(JbdBuf::new(10));
        journal.block_rec_root.insert(10, BlockRecord { trans_id: 1 });
        journal.cp_queue.push_back(trans);

        flush_buffer(&mut journal, &mut bdev, 10).unwrap();

        assert!(journal.cp_queue.is_empty());
        assert_eq!(journal.start, journal.last);
        assert_eq!(journal.trans_id, 2);
        assert!(!journal.block_rec_root.contains_key(&10));
    }

    #[test]
    fn test_drain_skips_pure_revoke_transactions() {
        let mut journal = JbdJournal::new(1, 64, 4096);
        journal.cp_queue.push_back(trans_with(5, 30, 3, 0));
        journal.cp_queue.push_back(trans_with(6, 33, 2, 1));

        drain_checkpointed_head(&mut journal);

        assert_eq!(journal.cp_queue.len(), 1);
        assert_eq!(journal.cp_queue[0].trans_id, 6);
        assert_eq!(journal.start, 33);
        assert_eq!(journal.trans_id, 6);
    }

    #[test]
    fn test_flush_all_trans_empties_queue() {
        let mut bdev = BlockDev::new(RamDisk::new(64, 4096)).unwrap();
        let mut journal = JbdJournal::new(1, 64, 4096);

        let mut trans = trans_with(1, 1, 1, 1);
        trans.buf_list.push(JbdBuf::new(20));
        journal.block_rec_root.insert(20, BlockRecord { trans_id: 1 });
        journal.cp_queue.push_back(trans);

        flush_all_trans(&mut journal, &mut bdev).unwrap();

        assert!(journal.cp_queue.is_empty());
        assert_eq!(journal.start, journal.last);
    }
}
