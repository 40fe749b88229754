//! 动画关键帧

use glam::{Quat, Vec3};

use super::BezierCurve;

/// 骨骼关键帧
#[derive(Clone, Debug, PartialEq)]
pub struct BoneKeyframe {
    pub frame_index: u32,
    /// 相对初始位置的平移偏移
    pub translation: Vec3,
    pub orientation: Quat,
    /// 到下一个关键帧的缓动曲线
    pub interpolation: BezierCurve,
}

impl BoneKeyframe {
    pub fn new(frame_index: u32) -> Self {
        Self {
            frame_index,
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            interpolation: BezierCurve::linear(),
        }
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_interpolation(mut self, interpolation: BezierCurve) -> Self {
        self.interpolation = interpolation;
        self
    }
}

/// IK 开关关键帧
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IkKeyframe {
    pub frame_index: u32,
    pub enabled: bool,
}

impl IkKeyframe {
    pub fn new(frame_index: u32, enabled: bool) -> Self {
        Self { frame_index, enabled }
    }
}
