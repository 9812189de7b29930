//! 块组操作模块
//!
//! 这个模块提供 ext4 块组描述符的读取、验证、写入和更新功能。

mod read;

pub use read::*;
