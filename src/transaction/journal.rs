//! Journal Transaction：应用代码实际使用的公开封装
//!
//! 把 [`crate::journal`] 里分散的 `JbdFs`/`JbdJournal`/`JbdTrans` 拼成一个
//! 单一运行事务模型下的顺序 API：`open` 挂载日志、`recover` 重放崩溃遗留
//! 的日志、`start_transaction` 开启一个事务、`get_access`/`set_block_dirty`/
//! `revoke_block` 在其中登记块、`commit_transaction` 提交、`stop` 卸载。
//!
//! 对应 lwext4 的 `ext4_journal.c` 对外暴露的 `ext4_journal_start()` /
//! `ext4_trans_get_access()` / `ext4_trans_set_block_dirty()` /
//! `ext4_trans_stop()` / `ext4_journal_stop()` 这套调用序列。

use crate::{
    block::{BlockDev, BlockDevice},
    error::{Error, ErrorKind, Result},
    journal::{checkpoint, commit, jbd_trans, JbdFs, JbdJournal},
    superblock::Superblock,
};

/// 一次日志会话：挂载之后，同一时刻最多持有一个打开的事务
///
/// 对应 lwext4 的 `struct jbd_journal` 加上 `ext4_fs` 里挂载时创建、
/// 卸载时释放的那个日志句柄。
pub struct JournalTransaction {
    jbd_fs: JbdFs,
    journal: JbdJournal,
}

impl JournalTransaction {
    /// 挂载文件系统时打开日志
    ///
    /// 对应 lwext4 的 `jbd_get_fs()` + `jbd_journal_start()`：定位 journal
    /// inode、读取并校验 journal superblock、置位 `INCOMPAT_RECOVER`
    /// 并初始化一个空的日志管理器。调用前应先跑 [`Self::recover`]。
    pub fn open<D: BlockDevice>(
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<Self> {
        let mut jbd_fs = JbdFs::get(bdev, superblock)?;
        let journal = JbdJournal::start(&mut jbd_fs, bdev, superblock)?;
        Ok(Self { jbd_fs, journal })
    }

    /// 重放崩溃时遗留的日志
    ///
    /// 对应 lwext4 的 `jbd_get_fs()` + `jbd_recover()`。应在挂载时、
    /// [`Self::open`] 之前调用；若日志本就是空的（干净卸载），直接返回
    /// 成功。
    pub fn recover<D: BlockDevice>(
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<()> {
        let mut jbd_fs = JbdFs::get(bdev, superblock)?;
        jbd_fs.recover(bdev, superblock)?;
        jbd_fs.put(bdev, superblock)
    }

    /// 开启一个新事务
    ///
    /// 单运行事务模型下，调用前必须没有尚未提交的事务，否则返回
    /// `InvalidState`。
    pub fn start_transaction(&mut self) -> Result<()> {
        if !self.journal.trans_queue.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "a transaction is already open",
            ));
        }
        let trans_id = self.journal.alloc_trans_id;
        let trans = self.journal.new_trans();
        trans.trans_id = trans_id;
        Ok(())
    }

    /// 运行一个以当前打开事务为参数的闭包
    ///
    /// 事务暂时从队列中取出，避免同时持有 `&mut JbdJournal` 和
    /// `&mut JbdTrans` 两个互相别名的引用。
    fn with_open_trans<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut JbdJournal, &mut jbd_trans::JbdTrans) -> Result<R>,
    {
        let mut trans = self.journal.trans_queue.pop_front().ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, "no open transaction")
        })?;
        let result = f(&mut self.journal, &mut trans);
        self.journal.trans_queue.push_front(trans);
        result
    }

    /// 在修改一个块之前请求写访问权
    ///
    /// 若该块当前被另一个（必然是正在检查点中的）事务持有，强制立即把它
    /// 刷回 home 位置。
    pub fn get_access<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        fs_lba: u64,
    ) -> Result<()> {
        self.with_open_trans(|journal, trans| jbd_trans::get_access(journal, trans, bdev, fs_lba))
    }

    /// 把一个块登记进当前事务
    pub fn set_block_dirty<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        fs_lba: u64,
    ) -> Result<()> {
        self.with_open_trans(|journal, trans| {
            jbd_trans::set_block_dirty(journal, trans, bdev, fs_lba)
        })
    }

    /// 把一个块追加到当前事务的撤销列表
    pub fn revoke_block(&mut self, fs_lba: u64) -> Result<()> {
        self.with_open_trans(|_journal, trans| {
            jbd_trans::revoke_block(trans, fs_lba);
            Ok(())
        })
    }

    /// 撤销一个块，必要时先强制刷回其当前持有者
    pub fn try_revoke_block<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        fs_lba: u64,
    ) -> Result<()> {
        self.with_open_trans(|journal, trans| {
            jbd_trans::try_revoke_block(journal, trans, bdev, fs_lba)
        })
    }

    /// 提交当前打开的事务
    ///
    /// 装填描述符/数据/撤销块、写提交块，并把事务移交给检查点队列（如果
    /// 它确实写下了数据）。失败时事务已经被清理，日志保持自洽。
    pub fn commit_transaction<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<()> {
        let trans = self.journal.trans_queue.pop_front().ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, "no open transaction to commit")
        })?;
        commit::commit_trans(&mut self.jbd_fs, &mut self.journal, trans, bdev, superblock)
    }

    /// 把一个已检查点的块同步刷回 home 位置
    ///
    /// 对应调用方知道某个块已经真正落盘后触发的检查点完成处理，见
    /// [`crate::journal::checkpoint`] 模块说明。
    pub fn checkpoint_buffer<D: BlockDevice>(
        &mut self,
        bdev: &mut BlockDev<D>,
        fs_lba: u64,
    ) -> Result<()> {
        checkpoint::flush_buffer(&mut self.journal, bdev, fs_lba)
    }

    /// 强制把检查点队列上的全部事务同步刷回 home 位置
    pub fn checkpoint_all<D: BlockDevice>(&mut self, bdev: &mut BlockDev<D>) -> Result<()> {
        checkpoint::flush_all_trans(&mut self.journal, bdev)
    }

    /// 卸载文件系统时结束日志会话
    ///
    /// 提交任何仍然打开的事务，强制刷空检查点队列，清除
    /// `INCOMPAT_RECOVER` 特性并把日志标记为空。
    pub fn stop<D: BlockDevice>(
        self,
        bdev: &mut BlockDev<D>,
        superblock: &mut Superblock,
    ) -> Result<()> {
        let Self { mut jbd_fs, journal } = self;
        journal.stop(&mut jbd_fs, bdev, superblock)
    }
}
