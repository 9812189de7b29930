//! 间接块（indirect block）寻址
//!
//! 传统 ext2/ext3 风格的块映射：12 个直接块指针加三级间接块，供没有
//! 置位 `EXTENTS` 标志的 inode（包括大多数 journal inode）使用。

mod mapper;

pub use mapper::IndirectBlockMapper;
