//! Journal 恢复期间使用的撤销表
//!
//! 对应 lwext4 的 `struct recover_info` 中以红黑树实现的撤销表
//! (`jbd_revoke_entry_lookup` / `jbd_add_revoke_block_tags` / `jbd_destroy_revoke_tree`)。
//!
//! 这张表只在一次 [`super::recovery::recover`] 调用期间存在，记录每个物理块
//! 最后一次出现在 revoke 块中时所属的事务序列号。REVOKE 扫描阶段按日志中的
//! 时间顺序遍历，因此对同一块号的后续插入总会覆盖之前的值——保留下来的永远
//! 是“最高的撤销事务号”，这与事务自身的 `revoke_list`（允许重复、插入顺序
//! 无关紧要）是两个不同的概念，不要混淆。

use alloc::collections::BTreeMap;

/// 恢复阶段的撤销表：块号 -> 撤销它的最高事务序列号
#[derive(Debug, Default)]
pub struct RevokeTable {
    entries: BTreeMap<u64, u32>,
}

impl RevokeTable {
    /// 创建空表
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 记录一次撤销：若该块已有记录，无条件覆盖为新的事务号
    ///
    /// 对应 `jbd_add_revoke_block_tags()`
    pub fn record(&mut self, block: u64, trans_id: u32) {
        self.entries.insert(block, trans_id);
    }

    /// 查询某个块当前记录的撤销事务号
    ///
    /// 对应 `jbd_revoke_entry_lookup()`
    pub fn lookup(&self, block: u64) -> Option<u32> {
        self.entries.get(&block).copied()
    }

    /// 判断给定事务是否应当跳过对这个块的重放
    ///
    /// 对应 RECOVER 阶段里的判断：
    /// ```c
    /// revoke_entry = jbd_revoke_entry_lookup(info, block);
    /// if (revoke_entry && arg->this_trans_id < revoke_entry->trans_id)
    ///     return;
    /// ```
    pub fn should_skip(&self, block: u64, this_trans_id: u32) -> bool {
        matches!(self.lookup(block), Some(trans_id) if this_trans_id < trans_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_overwrites() {
        let mut table = RevokeTable::new();
        table.record(5, 1);
        assert_eq!(table.lookup(5), Some(1));
        table.record(5, 3);
        assert_eq!(table.lookup(5), Some(3));
    }

    #[test]
    fn test_should_skip() {
        let mut table = RevokeTable::new();
        table.record(5, 3);
        assert!(table.should_skip(5, 2));
        assert!(!table.should_skip(5, 3));
        assert!(!table.should_skip(5, 4));
        assert!(!table.should_skip(6, 10));
    }
}
