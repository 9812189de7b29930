//! JBD Journal 管理器
//!
//! 对应 lwext4 的 `struct jbd_journal`

use super::{checkpoint, commit, jbd_trans::BlockRecord, JbdFs, JbdTrans};
use crate::{
    block::{BlockDev, BlockDevice},
    consts::EXT4_FEATURE_INCOMPAT_RECOVER,
    error::Result,
    superblock::Superblock,
};
use alloc::collections::{BTreeMap, VecDeque};

/// Journal 配置
///
/// 对应 lwext4 的 `journal->max_transaction_buffers`：仅作为调用方提交
/// 批处理策略的建议值，日志本身不会据此强制拆分或拒绝事务。
#[derive(Debug, Clone, Copy)]
pub struct JournalConfig {
    /// 单个事务建议消耗的最大日志块数（仅供参考，不强制）
    pub max_transaction_blocks: u32,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            max_transaction_blocks: 256,
        }
    }
}

/// JBD Journal（日志管理器）
///
/// 对应 lwext4 的 `struct jbd_journal`
///
/// 维护日志区域的游标、提交队列和全局块记录表。
///
/// # lwext4 对应关系
///
/// ```c
/// struct jbd_journal {
///     uint32_t first;
///     uint32_t start;
///     uint32_t last;
///     uint32_t trans_id;
///     uint32_t alloc_trans_id;
///     uint32_t block_size;
///     TAILQ_HEAD(..., jbd_trans) trans_queue;
///     TAILQ_HEAD(..., jbd_trans) cp_queue;
///     RB_HEAD(..., jbd_block_rec) block_rec_root;
/// };
/// ```
#[derive(Debug)]
pub struct JbdJournal {
    /// 日志区域的第一个可用块号
    pub first: u32,

    /// 日志区域的绝对上界（总块数边界，对应 `jbd_sb.maxlen`）
    pub maxlen: u32,

    /// 日志头：最老的未检查点事务所在块号
    pub start: u32,

    /// 日志尾：下一个空闲日志块号
    pub last: u32,

    /// 最老的存活事务 ID（下次写 superblock 时会写入的值）
    pub trans_id: u32,

    /// 下一个要提交的事务将分配到的 ID
    pub alloc_trans_id: u32,

    /// 日志块大小
    pub block_size: u32,

    /// 已提交但尚未开始检查点的事务（单运行事务模型下最多一个）
    pub trans_queue: VecDeque<JbdTrans>,

    /// 已提交，等待检查点的事务
    pub cp_queue: VecDeque<JbdTrans>,

    /// 全局块记录表：home-lba -> 持有该块的事务
    pub block_rec_root: BTreeMap<u64, BlockRecord>,

    /// 配置
    pub config: JournalConfig,
}

impl JbdJournal {
    /// 创建一个新的日志管理器
    ///
    /// `first`/`maxlen` 对应 journal superblock 的 `first`/`maxlen` 字段；
    /// `start`、`last` 初始都等于 `first`（空日志）。
    pub fn new(first: u32, maxlen: u32, block_size: u32) -> Self {
        Self {
            first,
            maxlen,
            start: first,
            last: first,
            trans_id: 1,
            alloc_trans_id: 1,
            block_size,
            trans_queue: VecDeque::new(),
            cp_queue: VecDeque::new(),
            block_rec_root: BTreeMap::new(),
            config: JournalConfig::default(),
        }
    }

    /// 以给定配置创建一个新的日志管理器
    pub fn with_config(first: u32, maxlen: u32, block_size: u32, config: JournalConfig) -> Self {
        let mut journal = Self::new(first, maxlen, block_size);
        journal.config = config;
        journal
    }

    /// 获取配置
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// 开启一个新事务，加入 `trans_queue`
    ///
    /// 单运行事务模型下调用方应在提交前一个事务之后才调用本方法。
    pub fn new_trans(&mut self) -> &mut JbdTrans {
        self.trans_queue.push_back(JbdTrans::new());
        self.trans_queue.back_mut().unwrap()
    }

    /// 在日志中分配一个块，必要时强制刷新检查点队列腾出空间
    ///
    /// 对应 `jbd_journal_alloc_block()`；见 [`super::nav::alloc_block`]。
    pub fn alloc_block(&mut self, trans: &mut JbdTrans) -> u32 {
        super::nav::alloc_block(&mut self.last, &mut trans.alloc_blocks, self.first, self.maxlen)
    }

    /// 日志区域总块数
    pub fn total_blocks(&self) -> u32 {
        self.maxlen - self.first
    }

    /// 开启一次日志会话
    ///
    /// 对应 lwext4 的 `jbd_journal_start()`。置位文件系统的
    /// `INCOMPAT_RECOVER` 特性并持久化（标志着"日志当前处于活跃状态，
    /// 崩溃后需要重放"），以 `jbd_fs.sb` 的 `first`/block_size 初始化一个
    /// 空的日志管理器（`start == last == first`，两个事务 ID 计数器都
    /// 从 1 开始），并把这个初始状态写回 journal superblock。
    pub fn start<D: BlockDevice>(
        jbd_fs: &mut JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<Self> {
        superblock.set_incompat_feature(EXT4_FEATURE_INCOMPAT_RECOVER);
        superblock.write(bdev)?;

        let first = jbd_fs.first();
        let maxlen = jbd_fs.max_len();
        let block_size = jbd_fs.block_size();
        let mut journal = Self::new(first, maxlen, block_size);

        jbd_fs.set_start(first);
        jbd_fs.set_sequence(journal.trans_id);
        jbd_fs.put(bdev, superblock)?;

        Ok(journal)
    }

    /// 结束一次日志会话
    ///
    /// 对应 lwext4 的 `jbd_journal_stop()`。提交任何仍然打开的事务（单
    /// 运行事务模型下 `trans_queue` 至多一条），随后强制把 `cp_queue`
    /// 上剩余的所有事务同步刷回 home 位置，最后清除文件系统的
    /// `INCOMPAT_RECOVER` 特性并把日志标记为空（`start = trans_id = 0`）。
    pub fn stop<D: BlockDevice>(
        mut self,
        jbd_fs: &mut JbdFs,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<()> {
        if let Some(open_trans) = self.trans_queue.pop_front() {
            commit::commit_trans(jbd_fs, &mut self, open_trans, bdev, superblock)?;
        }

        checkpoint::flush_all_trans(&mut self, bdev)?;

        superblock.clear_incompat_feature(EXT4_FEATURE_INCOMPAT_RECOVER);
        superblock.write(bdev)?;

        self.start = 0;
        self.trans_id = 0;
        jbd_fs.set_start(0);
        jbd_fs.set_sequence(0);
        jbd_fs.put(bdev, superblock)?;

        Ok(())
    }
}
