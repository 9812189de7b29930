//! Transaction 系统
//!
//! 基于 [`crate::journal`] 提供带崩溃一致性保证的事务支持。
//!
//! ```rust,ignore
//! use lwext4_core::transaction::JournalTransaction;
//!
//! JournalTransaction::recover(&mut bdev, &mut superblock)?;
//! let mut trans = JournalTransaction::open(&mut bdev, &mut superblock)?;
//!
//! trans.start_transaction()?;
//! trans.set_block_dirty(&mut bdev, lba)?;
//! trans.commit_transaction(&mut bdev, &mut superblock)?;
//!
//! trans.stop(&mut bdev, &mut superblock)?;
//! ```

mod journal;

pub use journal::JournalTransaction;
