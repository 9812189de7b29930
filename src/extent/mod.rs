//! Extent 树操作模块
//!
//! 这个模块提供 ext4 extent 树的解析和块映射功能。
//!
//! Extent 是现代 ext4 文件系统中用于表示文件数据块位置的机制，
//! 相比传统的间接块方式更高效。日志子系统只需要把 journal inode
//! 的逻辑块号映射到物理块号，因此这里只保留只读的树遍历部分。
//!
//! ## 子模块
//!
//! - `tree` - Extent 树读取操作

mod tree;

pub use tree::*;
