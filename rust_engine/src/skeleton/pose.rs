//! 姿势矩阵缓冲区

use glam::{Mat4, Vec3};

use super::BoneManager;

/// 每骨骼一个本地矩阵和一个模型空间矩阵，每帧原地覆盖
#[derive(Clone, Debug, Default)]
pub struct PoseBuffer {
    local: Vec<Mat4>,
    global: Vec<Mat4>,
}

impl PoseBuffer {
    pub fn new(bone_count: usize) -> Self {
        Self {
            local: vec![Mat4::IDENTITY; bone_count],
            global: vec![Mat4::IDENTITY; bone_count],
        }
    }

    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty()
    }

    /// 调整为 `bone_count` 个骨骼，新增的骨骼处于初始姿势
    pub fn resize(&mut self, bone_count: usize) {
        self.local.resize(bone_count, Mat4::IDENTITY);
        self.global.resize(bone_count, Mat4::IDENTITY);
    }

    /// 所有骨骼回到初始姿势
    pub fn reset(&mut self) {
        self.local.fill(Mat4::IDENTITY);
        self.global.fill(Mat4::IDENTITY);
    }

    pub fn set_local(&mut self, index: usize, matrix: Mat4) {
        if let Some(slot) = self.local.get_mut(index) {
            *slot = matrix;
        }
    }

    pub fn local(&self, index: usize) -> Mat4 {
        self.local.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    pub fn global(&self, index: usize) -> Mat4 {
        self.global.get(index).copied().unwrap_or(Mat4::IDENTITY)
    }

    pub fn set_global(&mut self, index: usize, matrix: Mat4) {
        if let Some(slot) = self.global.get_mut(index) {
            *slot = matrix;
        }
    }

    pub fn globals(&self) -> &[Mat4] {
        &self.global
    }

    /// 骨骼当前所在位置 = 模型空间变换作用于初始位置
    pub fn posed_position(&self, skeleton: &BoneManager, index: usize) -> Vec3 {
        let rest = skeleton
            .get_bone(index)
            .map(|bone| bone.rest_position)
            .unwrap_or(Vec3::ZERO);
        self.global(index).transform_point3(rest)
    }

    /// 自根向下合成模型空间矩阵：子骨骼 = 父骨骼 * 本地
    ///
    /// 列向量约定下的 `parent * local` 等价于行向量约定的 `local * parent`，
    /// 即先应用子骨骼自身变换，再应用父骨骼变换。
    ///
    /// 缓冲区大小与骨骼数不一致时先按骨骼数调整。
    pub fn compose(&mut self, skeleton: &BoneManager) {
        self.resize(skeleton.bone_count());
        for &index in skeleton.sorted_indices() {
            let parent_global = skeleton
                .parent(index)
                .map(|parent| self.global[parent])
                .unwrap_or(Mat4::IDENTITY);
            self.global[index] = parent_global * self.local[index];
        }
    }
}
