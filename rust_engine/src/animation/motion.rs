//! Motion 核心数据结构
//!
//! 存储完整的动画数据：按骨骼名分组的骨骼轨道和按 IK 骨骼名分组的 IK 开关轨道。
//! 轨道按名称而不是骨骼索引分组，模型里不存在的名称在加载时保留，播放时跳过。

use std::collections::HashMap;

use super::keyframe::{BoneKeyframe, IkKeyframe};
use super::motion_track::{BoneMotionTrack, IkSwitchTrack, MotionTrack};

/// 动画数据
#[derive(Debug, Clone, Default)]
pub struct Motion {
    /// 骨骼动画轨道（骨骼名称 -> 轨道）
    bone_tracks: HashMap<String, BoneMotionTrack>,
    /// IK 开关轨道（IK 骨骼名称 -> 轨道）
    ik_tracks: HashMap<String, IkSwitchTrack>,
    /// 所有骨骼关键帧中的最大帧号（循环长度）
    max_frame: u32,
}

impl Motion {
    /// 创建空的 Motion
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `(骨骼名, 关键帧)` 列表构建，每条轨道稳定排序
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, BoneKeyframe)>,
    {
        let mut grouped: HashMap<String, Vec<BoneKeyframe>> = HashMap::new();
        for (name, keyframe) in records {
            grouped.entry(name).or_default().push(keyframe);
        }

        let bone_tracks: HashMap<String, BoneMotionTrack> = grouped
            .into_iter()
            .map(|(name, keyframes)| (name, BoneMotionTrack::from_keyframes(keyframes)))
            .collect();
        let max_frame = bone_tracks
            .values()
            .map(|track| track.max_frame_index())
            .max()
            .unwrap_or(0);

        Self {
            bone_tracks,
            ik_tracks: HashMap::new(),
            max_frame,
        }
    }

    /// 循环长度（最大帧号）
    pub fn max_frame(&self) -> u32 {
        self.max_frame
    }

    pub fn is_empty(&self) -> bool {
        self.bone_tracks.is_empty()
    }

    /// 插入骨骼关键帧
    pub fn insert_bone_keyframe(&mut self, name: &str, keyframe: BoneKeyframe) {
        self.max_frame = self.max_frame.max(keyframe.frame_index);
        self.bone_tracks
            .entry(name.to_string())
            .or_default()
            .insert_keyframe(keyframe);
    }

    /// 插入 IK 开关关键帧
    pub fn insert_ik_keyframe(&mut self, name: &str, keyframe: IkKeyframe) {
        self.ik_tracks
            .entry(name.to_string())
            .or_default()
            .insert_keyframe(keyframe);
    }

    /// 获取 IK 在指定帧的启用状态，没有开关轨道时默认启用
    pub fn is_ik_enabled(&self, name: &str, frame: f32) -> bool {
        self.ik_tracks
            .get(name)
            .map(|track| track.is_enabled_at(frame))
            .unwrap_or(true)
    }

    pub fn has_ik_switches(&self) -> bool {
        !self.ik_tracks.is_empty()
    }

    /// 遍历所有骨骼轨道
    pub fn bone_tracks(&self) -> impl Iterator<Item = (&str, &BoneMotionTrack)> {
        self.bone_tracks
            .iter()
            .map(|(name, track)| (name.as_str(), track))
    }

    /// 获取骨骼轨道
    pub fn get_bone_track(&self, name: &str) -> Option<&BoneMotionTrack> {
        self.bone_tracks.get(name)
    }

    /// 检查是否包含骨骼轨道
    pub fn contains_bone_track(&self, name: &str) -> bool {
        self.bone_tracks.contains_key(name)
    }

    /// 获取骨骼轨道名称列表
    pub fn bone_track_names(&self) -> impl Iterator<Item = &String> {
        self.bone_tracks.keys()
    }
}
