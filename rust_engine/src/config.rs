//! 动画运行时配置
//!
//! 所有参数扁平化，由宿主构造后显式传入，不使用全局状态。

use glam::Vec3;

/// 动画配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct AnimationConfig {
    // ========== 播放 ==========
    /// 播放帧率，默认 30.0（VMD 标准）
    pub fps: f32,

    // ========== IK ==========
    /// 是否在每帧姿势合成后执行 IK 求解，默认 true
    pub ik_enabled: bool,
    /// IK 收敛阈值（末端到目标的距离），默认 0.0005
    pub ik_epsilon: f32,
    /// 使用固定弯曲轴的骨骼名（名称包含即匹配）
    pub knee_bone_names: Vec<String>,
    /// 膝盖类骨骼的固定弯曲轴，默认 X 轴
    pub knee_axis: Vec3,
    /// LookAt 基底的上方向参考
    pub up_reference: Vec3,
    /// 上方向与视线平行时使用的右方向参考
    pub right_reference: Vec3,

    // ========== 骨骼 ==========
    /// 根骨骼名称候选（按顺序匹配）
    pub root_bone_names: Vec<String>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,

            ik_enabled: true,
            ik_epsilon: 0.0005,
            // "ひざ" 是 PMD 模型中膝盖骨骼的标准命名
            knee_bone_names: vec!["ひざ".to_string(), "knee".to_string()],
            knee_axis: Vec3::X,
            up_reference: Vec3::Y,
            right_reference: Vec3::X,

            root_bone_names: vec!["センター".to_string(), "center".to_string()],
        }
    }
}

impl AnimationConfig {
    /// 骨骼名是否属于膝盖类（使用固定弯曲轴）
    pub fn is_knee_bone(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.knee_bone_names
            .iter()
            .any(|knee| lower.contains(&knee.to_lowercase()))
    }
}
