//! Superblock 操作模块
//!
//! 这个模块提供 ext4 superblock 的读取、验证、写入和更新功能。

mod read;
mod write;
pub mod checksum;

pub use read::*;
pub use write::*;
