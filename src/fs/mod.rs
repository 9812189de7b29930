//! 文件系统层的最小支撑
//!
//! Journal 只需要定位自己的 inode 并把 journal 内的逻辑块号映射到
//! 物理块号，这个模块因此只保留 [`InodeRef`] 这一个读路径。

mod inode_ref;

pub use inode_ref::InodeRef;
