//! 渲染后端接口
//!
//! 本 crate 不接触 GPU，只把每帧的矩阵数组交给实现了 [`TransformBackend`] 的宿主。

mod publisher;

pub use publisher::{ModelPlacement, TransformPublisher};

use crate::{MmdError, Result};

/// 一个 4x4 f32 矩阵的字节数
pub const MATRIX_SIZE: usize = 64;

/// 常量缓冲区对齐
const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// 变换常量缓冲区大小：放置矩阵 + 每骨骼一个矩阵，向上对齐到 256 字节
pub fn constant_buffer_size(bone_count: usize) -> usize {
    let raw = (1 + bone_count) * MATRIX_SIZE;
    (raw + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// 渲染后端（外部协作者）
pub trait TransformBackend {
    /// 分配（或重新分配）指定大小的变换缓冲区
    fn allocate(&mut self, byte_size: usize) -> Result<()>;

    /// 从 `offset` 开始写入
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()>;
}

/// 内存中的变换缓冲区（无 GPU 的宿主和测试使用）
#[derive(Debug, Default, Clone)]
pub struct CpuTransformBuffer {
    bytes: Vec<u8>,
}

impl CpuTransformBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }

    /// 读回第 `slot` 个矩阵（按写入时的内存布局）
    pub fn matrix(&self, slot: usize) -> Option<glam::Mat4> {
        let start = slot * MATRIX_SIZE;
        let chunk = self.bytes.get(start..start + MATRIX_SIZE)?;
        Some(bytemuck::pod_read_unaligned(chunk))
    }
}

impl TransformBackend for CpuTransformBuffer {
    fn allocate(&mut self, byte_size: usize) -> Result<()> {
        self.bytes.clear();
        self.bytes.resize(byte_size, 0);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let capacity = self.bytes.len();
        let target = self
            .bytes
            .get_mut(offset..offset + bytes.len())
            .ok_or_else(|| {
                MmdError::Backend(format!(
                    "Write of {} bytes at {} exceeds buffer of {} bytes",
                    bytes.len(),
                    offset,
                    capacity
                ))
            })?;
        target.copy_from_slice(bytes);
        Ok(())
    }
}
