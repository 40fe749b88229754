//! 动画轨道
//!
//! 存储单个骨骼（或单个 IK 开关）的所有关键帧，并提供查找和插值功能。
//! 关键帧按帧号升序保存，同帧号的关键帧保持插入顺序。

use glam::{Quat, Vec3};

use super::keyframe::{BoneKeyframe, IkKeyframe};

/// 骨骼帧变换结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneFrameTransform {
    /// 平移
    pub translation: Vec3,
    /// 旋转
    pub orientation: Quat,
}

impl Default for BoneFrameTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

/// 动画轨道 trait
pub trait MotionTrack {
    type Frame;

    /// 求值指定帧（支持帧间小数）
    fn seek(&self, frame: f32) -> Self::Frame;

    /// 获取轨道长度
    fn len(&self) -> usize;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 获取最大帧索引
    fn max_frame_index(&self) -> u32;
}

/// 骨骼动画轨道
#[derive(Debug, Clone, Default)]
pub struct BoneMotionTrack {
    keyframes: Vec<BoneKeyframe>,
}

impl BoneMotionTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从任意顺序的关键帧创建（稳定排序）
    pub fn from_keyframes(mut keyframes: Vec<BoneKeyframe>) -> Self {
        keyframes.sort_by_key(|kf| kf.frame_index);
        Self { keyframes }
    }

    /// 插入关键帧，排在所有同帧号关键帧之后
    pub fn insert_keyframe(&mut self, keyframe: BoneKeyframe) {
        let position = self
            .keyframes
            .partition_point(|kf| kf.frame_index <= keyframe.frame_index);
        self.keyframes.insert(position, keyframe);
    }

    pub fn keyframes(&self) -> &[BoneKeyframe] {
        &self.keyframes
    }

    /// 查找最近的前后关键帧
    ///
    /// 前一帧为帧号 `<= frame` 的最后一个关键帧，后一帧为紧随其后的关键帧。
    pub fn search_closest(&self, frame: f32) -> (Option<&BoneKeyframe>, Option<&BoneKeyframe>) {
        let split = self
            .keyframes
            .partition_point(|kf| kf.frame_index as f32 <= frame);
        let prev = split.checked_sub(1).and_then(|i| self.keyframes.get(i));
        (prev, self.keyframes.get(split))
    }
}

impl MotionTrack for BoneMotionTrack {
    /// 第一个关键帧之前没有结果
    type Frame = Option<BoneFrameTransform>;

    fn seek(&self, frame: f32) -> Self::Frame {
        let (prev, next) = self.search_closest(frame);
        let prev = prev?;

        let Some(next) = next else {
            // 最后一个关键帧之后保持姿势
            return Some(BoneFrameTransform {
                translation: prev.translation,
                orientation: prev.orientation,
            });
        };

        // next 的帧号严格大于 frame >= prev 的帧号，区间不为零
        let interval = (next.frame_index - prev.frame_index) as f32;
        let t = (frame - prev.frame_index as f32) / interval;
        let eased = prev.interpolation.evaluate(t);

        Some(BoneFrameTransform {
            translation: prev.translation.lerp(next.translation, eased),
            orientation: prev.orientation.slerp(next.orientation, eased),
        })
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> u32 {
        self.keyframes.last().map(|kf| kf.frame_index).unwrap_or(0)
    }
}

/// IK 开关轨道
#[derive(Debug, Clone, Default)]
pub struct IkSwitchTrack {
    keyframes: Vec<IkKeyframe>,
}

impl IkSwitchTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_keyframe(&mut self, keyframe: IkKeyframe) {
        let position = self
            .keyframes
            .partition_point(|kf| kf.frame_index <= keyframe.frame_index);
        self.keyframes.insert(position, keyframe);
    }

    /// 指定帧 IK 是否启用，第一个开关之前默认启用
    pub fn is_enabled_at(&self, frame: f32) -> bool {
        let split = self
            .keyframes
            .partition_point(|kf| kf.frame_index as f32 <= frame);
        split
            .checked_sub(1)
            .and_then(|i| self.keyframes.get(i))
            .map(|kf| kf.enabled)
            .unwrap_or(true)
    }
}

impl MotionTrack for IkSwitchTrack {
    type Frame = bool;

    fn seek(&self, frame: f32) -> bool {
        self.is_enabled_at(frame)
    }

    fn len(&self) -> usize {
        self.keyframes.len()
    }

    fn max_frame_index(&self) -> u32 {
        self.keyframes.last().map(|kf| kf.frame_index).unwrap_or(0)
    }
}
