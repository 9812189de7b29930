//! Inode 包装类型
//!
//! Journal 子系统只需要只读地解释 inode 的块指针（extents / indirect
//! blocks），因此这里只保留 [`Inode`] 的读路径。

mod read;

pub use read::*;
