//! PMD Engine - PMD 模型骨骼动画运行时
//!
//! 提供：
//! - PMD 骨骼表 / IK 表解析
//! - VMD 关键帧解析和播放（贝塞尔缓动 + 四元数球面插值）
//! - 骨骼层级矩阵合成
//! - IK 求解（LookAt / 余弦定理双骨骼 / CCD）
//! - 面向渲染后端的变换矩阵发布

pub mod animation;
pub mod config;
pub mod diagnostics;
pub mod model;
pub mod render;
pub mod skeleton;

pub use animation::{AnimationClock, BezierCurve, BoneKeyframe, Motion, PoseEvaluator, VmdFile};
pub use config::AnimationConfig;
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink, RecordingSink};
pub use model::{MmdModel, PmdFile};
pub use render::{CpuTransformBuffer, ModelPlacement, TransformBackend, TransformPublisher};
pub use skeleton::{Bone, BoneKind, BoneManager, IkDescriptor, IkSolver, PoseBuffer};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmdError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PMD parse error: {0}")]
    PmdParse(String),

    #[error("VMD parse error: {0}")]
    VmdParse(String),

    #[error("Bone hierarchy contains a cycle through bone {bone}")]
    CyclicHierarchy { bone: usize },

    #[error("Unknown bone: {0}")]
    UnknownBone(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    #[error("No animation loaded")]
    NoAnimationLoaded,

    #[error("Render backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, MmdError>;
