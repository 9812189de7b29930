//! lwext4_core: Pure Rust ext4 journaling subsystem
//!
//! 这是一个纯 Rust 实现的 ext4 日志 (JBD2) 子系统，旨在提供：
//! - **零 unsafe 代码**（除必要的结构体定义）
//! - **Rust 惯用风格**的 API
//! - **完整的类型安全**
//!
//! 本 crate 只覆盖文件系统的日志子系统：循环日志区域上的写前日志、
//! 事务生命周期（运行中 -> 已提交 -> 已检查点）、崩溃后的三趟重放，
//! 以及定位 journal inode、把日志内逻辑块号映射到设备物理块号所需的
//! 最小文件系统支撑（superblock、inode、block group、extent/indirect
//! block 映射）。
//!
//! # 示例
//!
//! ```rust,ignore
//! use lwext4_core::{BlockDevice, block::BlockDev, transaction::JournalTransaction, Result};
//!
//! fn mount<D: BlockDevice>(bdev: &mut BlockDev<D>, sb: &mut Superblock) -> Result<JournalTransaction> {
//!     JournalTransaction::recover(bdev, sb)?;
//!     JournalTransaction::open(bdev, sb)
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象和 I/O 操作
//! - [`cache`] - 块缓存
//! - [`consts`] - 常量定义
//! - [`types`] - 数据结构定义
//! - [`superblock`] - Superblock 操作
//! - [`inode`] / [`block_group`] / [`extent`] / [`indirect`] - 定位 journal
//!   inode、解析其块指针所需的只读文件系统层
//! - [`fs`] - `InodeRef`：journal inode 的 RAII 句柄
//! - [`journal`] - JBD2 日志核心实现
//! - [`transaction`] - `JournalTransaction`：应用代码实际使用的公开封装

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

/// Superblock 操作
pub mod superblock;

/// Inode 包装类型
pub mod inode;

/// 块组操作
pub mod block_group;

/// Extent 树操作
pub mod extent;

/// Indirect blocks 操作（传统 ext2/ext3 间接块寻址）
pub mod indirect;

/// Journal inode 的最小文件系统支撑
pub mod fs;

/// 块缓存
pub mod cache;

/// Transaction 系统
pub mod transaction;

/// Journal (JBD2) 系统
pub mod journal;

/// CRC32C 校验和计算
pub(crate) mod crc;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 块设备
pub use block::{BlockDevice, BlockDev, Block};

// Superblock
pub use superblock::{Superblock, read_superblock};

// Inode
pub use inode::Inode;

// BlockGroup
pub use block_group::{BlockGroup, read_block_group_desc};

// Extent
pub use extent::ExtentTree;

// Indirect blocks
pub use indirect::IndirectBlockMapper;

// Journal inode 定位
pub use fs::InodeRef;

// Cache
pub use cache::{BlockCache, CacheBuffer, CacheFlags, CacheStats, DEFAULT_CACHE_SIZE};

// Transaction
pub use transaction::JournalTransaction;

// Journal
pub use journal::{JbdFs, JbdJournal, JbdTrans, JbdBuf, JournalError};
