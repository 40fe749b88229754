//! 变换矩阵发布
//!
//! 缓冲区布局：第 0 个矩阵是模型放置矩阵（转置后写入），之后每个骨骼一个矩阵。
//! glam 按列存储的骨骼矩阵与行向量约定下按行存储的矩阵字节完全相同，骨骼矩阵原样写入。

use glam::{EulerRot, Mat4, Vec3};

use super::{constant_buffer_size, TransformBackend};
use crate::skeleton::PoseBuffer;
use crate::Result;

/// 模型整体放置
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelPlacement {
    pub position: Vec3,
    /// 欧拉角（弧度）：x 为俯仰，y 为偏航，z 为滚转
    pub euler_angle: Vec3,
}

impl ModelPlacement {
    /// 先滚转、再俯仰、再偏航，最后平移
    pub fn matrix(&self) -> Mat4 {
        let rotation = Mat4::from_euler(
            EulerRot::YXZ,
            self.euler_angle.y,
            self.euler_angle.x,
            self.euler_angle.z,
        );
        Mat4::from_translation(self.position) * rotation
    }
}

/// 姿势缓冲区的只读发布视图
#[derive(Clone, Copy, Debug)]
pub struct TransformPublisher<'a> {
    placement: Mat4,
    bones: &'a [Mat4],
}

impl<'a> TransformPublisher<'a> {
    pub fn new(placement: &ModelPlacement, pose: &'a PoseBuffer) -> Self {
        Self {
            placement: placement.matrix(),
            bones: pose.globals(),
        }
    }

    /// 放置矩阵 + 骨骼数
    pub fn matrix_count(&self) -> usize {
        1 + self.bones.len()
    }

    /// 按写入顺序排列的矩阵
    pub fn matrices(&self) -> Vec<Mat4> {
        let mut matrices = Vec::with_capacity(self.matrix_count());
        matrices.push(self.placement.transpose());
        matrices.extend_from_slice(self.bones);
        matrices
    }

    /// 缓冲区所需大小（256 字节对齐）
    pub fn buffer_size(&self) -> usize {
        constant_buffer_size(self.bones.len())
    }

    /// 写入后端缓冲区开头
    pub fn write_to(&self, backend: &mut dyn TransformBackend) -> Result<()> {
        let matrices = self.matrices();
        backend.write(0, bytemuck::cast_slice(&matrices))
    }
}
