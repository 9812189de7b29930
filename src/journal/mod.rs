//! ext4 Journal (JBD2) 实现
//!
//! 这个模块提供完整的ext4 journal功能，实现崩溃一致性和原子事务。
//!
//! # 架构概述
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Application Layer                       │
//! │              (File/Directory Operations)                  │
//! └───────────────────────┬──────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Transaction Layer                         │
//! │   JournalTransaction::begin() / commit() / abort()        │
//! └───────────────────────┬──────────────────────────────────┘
//!                         │
//!                         ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                   Journal Core                            │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐   │
//! │  │  JbdJournal  │  │   JbdTrans   │  │    JbdBuf    │   │
//! │  │  (Manager)   │  │ (Transaction)│  │   (Buffer)   │   │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘   │
//! │         │                  │                  │           │
//! │         └──────────────────┴──────────────────┘           │
//! │                            │                              │
//! │                            ▼                              │
//! │                    ┌──────────────┐                       │
//! │                    │    JbdFs     │                       │
//! │                    │(Journal FS)  │                       │
//! │                    └──────┬───────┘                       │
//! └───────────────────────────┼───────────────────────────────┘
//!                             │
//!                             ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Block Layer                           │
//! │   BlockCache / BlockDev / InodeRef                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # 核心组件
//!
//! - [`types`] - JBD2磁盘格式定义
//! - [`codec`] - 描述符 tag / 撤销记录的二进制编解码
//! - [`nav`] - 循环日志区域的块号绕回与分配
//! - [`revoke`] - 恢复期间使用的撤销表
//! - [`JbdFs`] - Journal文件系统实例，管理journal inode
//! - [`JbdJournal`] - Journal管理器，维护所有活跃事务
//! - [`JbdTrans`] - 单个事务，跟踪修改的块
//! - [`JbdBuf`] - Journal缓冲区，描述事务中的块
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use lwext4_core::journal::{JbdFs, JbdJournal};
//!
//! // 1. 初始化journal（mount时）
//! let mut jbd_fs = JbdFs::get(&mut bdev, &mut superblock)?;
//! jbd_fs.recover(&mut bdev, &mut superblock)?;
//! let mut journal = JbdJournal::start(&mut jbd_fs, &mut bdev, &mut superblock)?;
//!
//! // 2. 开始事务，登记修改
//! let trans = journal.new_trans();
//! jbd_trans::set_block_dirty(&mut journal, trans, &mut bdev, 100)?;
//!
//! // 3. 提交事务
//! let trans = journal.trans_queue.pop_front().unwrap();
//! commit::commit_trans(&mut jbd_fs, &mut journal, trans, &mut bdev, &mut superblock)?;
//!
//! // 4. 停止journal（unmount时）
//! journal.stop(&mut jbd_fs, &mut bdev, &mut superblock)?;
//! ```
//!
//! # 对应lwext4
//!
//! 本模块是 lwext4 `ext4_journal.c` 的 Rust 重写。
//!
//! | lwext4                       | lwext4-rust                    |
//! |-------------------------------|--------------------------------|
//! | `struct jbd_fs`               | [`JbdFs`]                      |
//! | `struct jbd_journal`          | [`JbdJournal`]                 |
//! | `struct jbd_trans`            | [`JbdTrans`]                   |
//! | `struct jbd_buf`              | [`JbdBuf`]                     |
//! | `jbd_recover()`               | `recovery::recover()`          |
//! | `jbd_journal_start()`         | [`JbdJournal::start()`]        |
//! | `jbd_journal_stop()`          | [`JbdJournal::stop()`]         |
//! | `jbd_journal_commit_trans()`  | `commit::commit_trans()`       |

pub mod types;

pub(crate) mod checkpoint;
mod codec;
pub(crate) mod commit;
mod jbd_buf;
mod jbd_fs;
mod jbd_journal;
pub mod jbd_trans;
mod nav;
mod recovery;
mod revoke;

// Re-exports
pub use types::*;
pub use codec::{tag_size, ExtractedTag};
pub use jbd_buf::JbdBuf;
pub use jbd_fs::JbdFs;
pub use jbd_journal::{JbdJournal, JournalConfig};
pub use jbd_trans::JbdTrans;
pub use revoke::RevokeTable;

/// Journal 初始化错误
#[derive(Debug)]
pub enum JournalError {
    /// Journal inode 不存在
    NoJournalInode,
    /// Journal 超级块无效
    InvalidSuperblock,
    /// Journal 功能不支持
    UnsupportedFeature(u32),
    /// 恢复失败
    RecoveryFailed,
    /// 空间不足
    NoSpace,
    /// IO 错误
    IoError,
}

impl core::fmt::Display for JournalError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            JournalError::NoJournalInode => write!(f, "Journal inode not found"),
            JournalError::InvalidSuperblock => write!(f, "Invalid journal superblock"),
            JournalError::UnsupportedFeature(feat) => {
                write!(f, "Unsupported journal feature: 0x{:08x}", feat)
            }
            JournalError::RecoveryFailed => write!(f, "Journal recovery failed"),
            JournalError::NoSpace => write!(f, "Journal has no space"),
            JournalError::IoError => write!(f, "Journal I/O error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_module_compiles() {
        // Basic compilation test
        assert_eq!(JBD_MAGIC_NUMBER, 0xC03B3998);
    }
}
