//! JBD Buffer 管理
//!
//! 对应 lwext4 的 `struct jbd_buf`

/// JBD Buffer（日志缓冲区）
///
/// 对应 lwext4 的 `struct jbd_buf`
///
/// 描述一个块在日志事务中的登记状态。
///
/// # lwext4 对应关系
///
/// ```c
/// struct jbd_buf {
///     uint32_t jbd_lba;
///     struct ext4_block block;
///     struct jbd_trans *trans;
///     struct jbd_block_rec *block_rec;
///     TAILQ_ENTRY(jbd_buf) buf_node;
///     TAILQ_ENTRY(jbd_buf) dirty_buf_node;
/// };
/// ```
///
/// # Rust 实现
///
/// lwext4 的 `jbd_buf` 持有指向已锁定块缓存项的指针，缓冲区数据一直驻留在
/// 内存中直到提交完成。这里不保存这种自引用指针：`JbdBuf` 只记录文件系统
/// 逻辑块号，真正需要访问数据时通过 `Block::get` 重新从块缓存取得——缓存
/// 本身已经持有脏数据，重复获取只是增加引用计数，不会丢失或复制内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JbdBuf {
    /// 文件系统逻辑块号（home location）
    pub fs_lba: u64,
}

impl JbdBuf {
    /// 登记一个新的日志缓冲区
    pub(super) fn new(fs_lba: u64) -> Self {
        Self { fs_lba }
    }

    /// 获取文件系统逻辑块号
    pub fn fs_lba(&self) -> u64 {
        self.fs_lba
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jbd_buf_identifies_by_fs_lba() {
        let buf = JbdBuf::new(42);
        assert_eq!(buf.fs_lba(), 42);
    }
}
