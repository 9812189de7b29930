//! Inode 引用结构
//!
//! 对应 lwext4 的 `ext4_inode_ref`，提供 RAII 风格的 inode 操作

use crate::{
    block::{Block, BlockDev, BlockDevice},
    consts::*,
    error::{Error, ErrorKind, Result},
    extent::ExtentTree,
    superblock::Superblock,
    types::ext4_inode,
};

/// Inode 引用
///
/// 类似 lwext4 的 `ext4_inode_ref`，自动管理 inode 的加载和写回
///
/// # 设计说明
///
/// 与 lwext4 C 版本一致，InodeRef 持有一个 Block 句柄，
/// 直接操作 cache 中的 inode 数据，而不是持有数据副本。
/// 这保证了：
/// 1. **一致性**: 所有对同一 inode 的访问都操作同一份 cache 数据
/// 2. **性能**: 避免不必要的数据复制
/// 3. **正确语义**: 修改直接作用于 cache，自动标记为脏
///
/// # 生命周期
///
/// - 创建时获取包含 inode 的 block 句柄
/// - 通过 block 句柄访问和修改 inode 数据
/// - Drop 时自动释放 block 句柄
///
/// # 示例
///
/// ```rust,ignore
/// let mut inode_ref = InodeRef::get(&mut bdev, &sb, inode_num)?;
/// inode_ref.set_size(1024)?;
/// inode_ref.mark_dirty()?;
/// // Drop 时自动写回 inode
/// ```
pub struct InodeRef<'a, D: BlockDevice> {
    /// 块设备引用
    bdev: &'a mut BlockDev<D>,
    /// Superblock 引用（可变，以支持块分配等写操作）
    sb: &'a mut Superblock,
    /// Inode 编号
    inode_num: u32,
    /// Inode 所在的块地址
    inode_block_addr: u64,
    /// Inode 在块内的偏移（字节）
    offset_in_block: usize,
    /// 是否已标记为脏
    dirty: bool,
    /// 块映射缓存：(logical_block, physical_block)
    /// 用于加速重复的extent树查找
    block_map_cache: Option<(u32, u64)>,
}

impl<'a, D: BlockDevice> InodeRef<'a, D> {
    /// 获取 inode 引用（自动加载）
    ///
    /// # 参数
    ///
    /// * `bdev` - 块设备引用
    /// * `sb` - superblock 引用
    /// * `inode_num` - inode 编号
    ///
    /// # 返回
    ///
    /// 成功返回 InodeRef
    ///
    /// # 实现说明
    ///
    /// 对应 lwext4 的 `ext4_fs_get_inode_ref()`
    pub fn get(
        bdev: &'a mut BlockDev<D>,
        sb: &'a mut Superblock,
        inode_num: u32,
    ) -> Result<Self> {
        if inode_num == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Invalid inode number (0)",
            ));
        }

        // 计算 inode 所在的块组和索引
        let inodes_per_group = sb.inodes_per_group();
        let block_group = (inode_num - 1) / inodes_per_group;
        let index_in_group = (inode_num - 1) % inodes_per_group;

        // 读取块组描述符以获取 inode 表位置
        let inode_table_block = {
            use crate::block_group::BlockGroup;
            let bg = BlockGroup::load(bdev, sb, block_group)?;
            bg.get_inode_table_first_block(sb)
        };

        // 计算 inode 在 inode 表中的位置
        let block_size = sb.block_size() as u64;
        let inode_size = sb.inode_size() as u64;
        let inodes_per_block = block_size / inode_size;

        // 计算 inode 所在的块号和块内偏移
        let block_index = index_in_group as u64 / inodes_per_block;
        let offset_in_block = ((index_in_group as u64 % inodes_per_block) * inode_size) as usize;
        let inode_block_addr = inode_table_block + block_index;

        Ok(Self {
            bdev,
            sb,
            inode_num,
            inode_block_addr,
            offset_in_block,
            dirty: false,
            block_map_cache: None,
        })
    }

    /// 获取 inode 编号
    pub fn inode_num(&self) -> u32 {
        self.inode_num
    }

    /// 访问 inode 数据（只读）
    ///
    /// 通过闭包访问 inode 数据，避免生命周期问题
    pub fn with_inode<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&ext4_inode) -> R,
    {
        let mut block = Block::get(self.bdev, self.inode_block_addr)?;
        block.with_data(|data| {
            let inode = unsafe {
                &*(data.as_ptr().add(self.offset_in_block) as *const ext4_inode)
            };
            f(inode)
        })
    }

    /// 访问 inode 数据（可写）
    ///
    /// 通过闭包修改 inode 数据，自动标记 block 为脏
    pub fn with_inode_mut<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut ext4_inode) -> R,
    {
        let mut block = Block::get(self.bdev, self.inode_block_addr)?;
        let result = block.with_data_mut(|data| {
            let inode = unsafe {
                &mut *(data.as_mut_ptr().add(self.offset_in_block) as *mut ext4_inode)
            };
            f(inode)
        })?;
        self.dirty = true;
        Ok(result)
    }

    /// 获取 Superblock 引用（只读）
    pub fn superblock(&self) -> &Superblock {
        self.sb
    }

    /// 标记为脏（需要写回）
    ///
    /// 注意：修改 inode 时会自动标记为脏，通常不需要手动调用
    pub fn mark_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            // 标记 block 为脏 - 获取块并立即标记为脏
            let mut block = Block::get(self.bdev, self.inode_block_addr)?;
            block.with_data_mut(|_| {})?;
            self.dirty = true;
        }
        Ok(())
    }

    /// 检查是否为脏
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 手动写回
    ///
    /// 通常不需要手动调用，Drop 时 Block 会自动写回脏数据
    pub fn flush(&mut self) -> Result<()> {
        // Block 的 Drop 会自动处理写回
        // 这里只需要清除 dirty 标志
        if self.dirty {
            self.dirty = false;
        }
        Ok(())
    }

    // ===== 便捷方法 =====

    /// 获取文件大小
    pub fn size(&mut self) -> Result<u64> {
        self.with_inode(|inode| inode.file_size())
    }

    /// 检查是否是目录
    pub fn is_dir(&mut self) -> Result<bool> {
        self.with_inode(|inode| inode.is_dir())
    }

    /// 检查是否是普通文件
    pub fn is_file(&mut self) -> Result<bool> {
        self.with_inode(|inode| inode.is_file())
    }

    /// 检查是否使用 extents
    pub fn has_extents(&mut self) -> Result<bool> {
        self.with_inode(|inode| {
            let flags = u32::from_le(inode.flags);
            (flags & EXT4_INODE_FLAG_EXTENTS) != 0
        })
    }

    /// 获取 inode 数据的拷贝（用于需要长期持有的场景）
    ///
    /// 注意：返回的是数据副本，修改不会反映到磁盘
    pub fn get_inode_copy(&mut self) -> Result<ext4_inode> {
        self.with_inode(|inode| *inode)
    }

    /// 获取 inode 的 generation（用于校验和等）
    pub fn generation(&mut self) -> Result<u32> {
        self.with_inode(|inode| u32::from_le(inode.generation))
    }

    /// 获取 inode 编号（便捷方法）
    pub fn index(&self) -> u32 {
        self.inode_num
    }

    /// 获取 superblock 引用
    pub fn sb(&self) -> &Superblock {
        self.sb
    }

    /// 获取 BlockDev 的可变引用
    ///
    /// 用于需要访问块设备的操作（如读取目录块）
    pub fn bdev(&mut self) -> &mut BlockDev<D> {
        self.bdev
    }

    /// 获取 inode 所在的块地址
    pub fn inode_block_addr(&self) -> u64 {
        self.inode_block_addr
    }

    /// 获取 inode 在块内的偏移
    pub fn offset_in_block(&self) -> usize {
        self.offset_in_block
    }

    /// 将逻辑块号映射到物理块号（只读）
    ///
    /// 对应 lwext4 的 `ext4_fs_get_inode_dblk_idx()`。Journal 只需要
    /// 定位自己 inode 已有的块，不涉及分配，因此这里不支持 `create`。
    ///
    /// # 参数
    ///
    /// * `logical_block` - 逻辑块号（文件内的块索引）
    /// * `create` - 必须为 `false`；传 `true` 返回 `Unsupported`
    ///
    /// # 返回
    ///
    /// 物理块号
    pub fn get_inode_dblk_idx(
        &mut self,
        logical_block: u32,
        create: bool,
    ) -> Result<u64> {
        if create {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Block allocation is not supported by InodeRef",
            ));
        }

        let uses_extents = self.has_extents()?;

        if !uses_extents {
            use crate::indirect::IndirectBlockMapper;

            let mapper = IndirectBlockMapper::new(self.sb.block_size());
            let inode_wrapper = self.get_inode()?;

            match mapper.map_block(self.bdev, &inode_wrapper, logical_block as u64)? {
                Some(physical_block) => Ok(physical_block),
                None => Err(Error::new(
                    ErrorKind::NotFound,
                    "Logical block is a sparse hole in file",
                )),
            }
        } else {
            if let Some((cached_logical, cached_physical)) = self.block_map_cache {
                if cached_logical == logical_block {
                    return Ok(cached_physical);
                }
            }

            // 注意：这里使用快照是安全的，因为：
            // 1. self (InodeRef) 持有对 inode 块的独占访问
            // 2. 获取快照后立即使用，中间无其他操作
            // 3. InodeRef 不会被释放
            let inode_copy = self.get_inode_copy()?;
            let mut extent_tree = ExtentTree::new(self.bdev, self.sb.block_size());

            match extent_tree.map_block_internal(&inode_copy, logical_block)? {
                Some(physical_block) => {
                    self.block_map_cache = Some((logical_block, physical_block));
                    Ok(physical_block)
                }
                None => Err(Error::new(
                    ErrorKind::NotFound,
                    "Logical block not found in extent tree",
                )),
            }
        }
    }

    /// 获取 Inode 的只读包装
    pub fn get_inode(&mut self) -> Result<crate::inode::Inode> {
        let inode_copy = self.get_inode_copy()?;
        Ok(crate::inode::Inode::from_raw(inode_copy, self.inode_num))
    }
}

impl<'a, D: BlockDevice> Drop for InodeRef<'a, D> {
    fn drop(&mut self) {
        // Block 的 Drop 会自动处理写回
        // 这里不需要额外操作
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_ref_api() {
        // 这些测试需要实际的块设备和 ext4 文件系统
        // 主要是验证 API 的设计和编译
    }
}
