//! Inode 读取和操作

use crate::{
    consts::*,
    superblock::Superblock,
    types::ext4_inode,
};

/// Inode 包装器，提供高级操作
pub struct Inode {
    pub(super) inner: ext4_inode,
    pub(super) inode_num: u32,
}

impl Inode {
    /// 从原始 inode 数据创建
    ///
    /// # 参数
    ///
    /// * `inner` - ext4_inode 结构
    /// * `inode_num` - inode 编号
    ///
    /// # 注意
    ///
    /// 此方法用于从已有的 ext4_inode 数据创建 Inode 实例，
    /// 主要用于临时需要 Inode 接口的场景（如 extent tree 操作）
    pub fn from_raw(inner: ext4_inode, inode_num: u32) -> Self {
        Self { inner, inode_num }
    }

    /// 获取 inode 编号
    pub fn inode_num(&self) -> u32 {
        self.inode_num
    }

    /// 获取内部 inode 结构的引用
    pub fn inner(&self) -> &ext4_inode {
        &self.inner
    }

    /// 获取文件大小
    pub fn file_size(&self) -> u64 {
        self.inner.file_size()
    }

    /// 获取文件模式（类型 + 权限）
    pub fn mode(&self) -> u16 {
        u16::from_le(self.inner.mode)
    }

    /// 检查是否是目录
    pub fn is_dir(&self) -> bool {
        self.inner.is_dir()
    }

    /// 检查是否是普通文件
    pub fn is_file(&self) -> bool {
        self.inner.is_file()
    }

    /// 检查是否是符号链接
    pub fn is_symlink(&self) -> bool {
        self.inner.is_symlink()
    }

    /// 获取链接计数
    pub fn links_count(&self) -> u16 {
        u16::from_le(self.inner.links_count)
    }

    /// 获取标志
    pub fn flags(&self) -> u32 {
        u32::from_le(self.inner.flags)
    }

    /// 检查是否使用 extent
    pub fn has_extents(&self) -> bool {
        (self.flags() & EXT4_INODE_FLAG_EXTENTS) != 0
    }

    /// 检查是否是巨型文件
    pub fn is_huge_file(&self) -> bool {
        (self.flags() & EXT4_INODE_FLAG_HUGE_FILE) != 0
    }

    /// 检查是否使用索引（对目录）
    pub fn has_index(&self) -> bool {
        (self.flags() & EXT4_INODE_FLAG_INDEX) != 0
    }

    /// 获取直接块指针
    ///
    /// # 参数
    ///
    /// * `index` - 块索引（0-11）
    ///
    /// # 返回
    ///
    /// 块号，如果索引无效则返回 None
    pub fn get_direct_block(&self, index: usize) -> Option<u32> {
        if index < EXT4_INODE_DIRECT_BLOCKS {
            Some(u32::from_le(self.inner.blocks[index]))
        } else {
            None
        }
    }

    /// 获取间接块指针
    pub fn get_indirect_block(&self) -> u32 {
        u32::from_le(self.inner.blocks[EXT4_INODE_INDIRECT_BLOCK])
    }

    /// 获取二级间接块指针
    pub fn get_double_indirect_block(&self) -> u32 {
        u32::from_le(self.inner.blocks[EXT4_INODE_DOUBLE_INDIRECT_BLOCK])
    }

    /// 获取三级间接块指针
    pub fn get_triple_indirect_block(&self) -> u32 {
        u32::from_le(self.inner.blocks[EXT4_INODE_TRIPLE_INDIRECT_BLOCK])
    }

    /// 获取访问时间（秒）
    pub fn atime(&self) -> u32 {
        u32::from_le(self.inner.atime)
    }

    /// 获取创建时间（秒）
    pub fn ctime(&self) -> u32 {
        u32::from_le(self.inner.ctime)
    }

    /// 获取修改时间（秒）
    pub fn mtime(&self) -> u32 {
        u32::from_le(self.inner.mtime)
    }

    /// 获取删除时间（秒）
    pub fn dtime(&self) -> u32 {
        u32::from_le(self.inner.dtime)
    }

    /// 检查文件是否已删除
    pub fn is_deleted(&self) -> bool {
        self.dtime() != 0
    }

    /// 获取访问时间（别名）
    pub fn access_time(&self) -> u32 {
        self.atime()
    }

    /// 获取修改时间（别名）
    pub fn modification_time(&self) -> u32 {
        self.mtime()
    }

    /// 获取改变时间（别名）
    pub fn change_time(&self) -> u32 {
        self.ctime()
    }

    /// 获取 UID（用户 ID）
    pub fn uid(&self) -> u32 {
        (u16::from_le(self.inner.uid) as u32)
            | ((u16::from_le(self.inner.uid_high) as u32) << 16)
    }

    /// 获取 GID（组 ID）
    pub fn gid(&self) -> u32 {
        (u16::from_le(self.inner.gid) as u32)
            | ((u16::from_le(self.inner.gid_high) as u32) << 16)
    }

    /// 获取 ACL 块号
    ///
    /// 对应 lwext4 的 `ext4_inode_get_file_acl()`
    ///
    /// # 参数
    ///
    /// * `sb` - superblock 引用
    ///
    /// # 返回
    ///
    /// ACL 块号（64位）
    pub fn get_file_acl(&self, sb: &Superblock) -> u64 {
        let acl_lo = u32::from_le(self.inner.file_acl_lo) as u64;

        if sb.inner().creator_os == EXT4_SUPERBLOCK_OS_LINUX.to_le() {
            let acl_hi = u16::from_le(self.inner.file_acl_high) as u64;
            acl_lo | (acl_hi << 32)
        } else {
            acl_lo
        }
    }

    /// 获取 inode 额外空间大小
    ///
    /// 对应 lwext4 的 `ext4_inode_get_extra_isize()`
    ///
    /// # 参数
    ///
    /// * `sb` - superblock 引用
    ///
    /// # 返回
    ///
    /// 额外空间大小（字节）
    pub fn get_extra_isize(&self, sb: &Superblock) -> u16 {
        if sb.inode_size() <= EXT4_GOOD_OLD_INODE_SIZE as u16 {
            0
        } else {
            u16::from_le(self.inner.extra_isize)
        }
    }
}
