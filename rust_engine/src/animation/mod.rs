//! 动画系统
//!
//! 提供 VMD 动画解析、关键帧插值、动画时钟和姿势求值。

mod bezier;
mod clock;
mod keyframe;
mod motion;
mod motion_track;
mod pose_evaluator;
mod vmd_loader;

pub use bezier::BezierCurve;
pub use clock::AnimationClock;
pub use keyframe::{BoneKeyframe, IkKeyframe};
pub use motion::Motion;
pub use motion_track::{BoneFrameTransform, BoneMotionTrack, IkSwitchTrack, MotionTrack};
pub use pose_evaluator::PoseEvaluator;
pub use vmd_loader::VmdFile;

pub(crate) use vmd_loader::decode_shift_jis;
#[cfg(test)]
pub(crate) use vmd_loader::test_data as vmd_test_data;
