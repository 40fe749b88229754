//! 姿势求值
//!
//! 每帧把动画采样写入姿势缓冲区的本地矩阵，再自根向下合成模型空间矩阵。

use super::motion::Motion;
use super::motion_track::MotionTrack;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::skeleton::{keyframe_matrix, BoneManager, PoseBuffer};

pub struct PoseEvaluator;

impl PoseEvaluator {
    /// 求值指定帧（可以带小数）
    ///
    /// 没有轨道或还没到第一个关键帧的骨骼保持初始姿势；
    /// 轨道名在模型中不存在时上报 `UnknownBone` 并跳过。
    pub fn evaluate(
        motion: &Motion,
        skeleton: &BoneManager,
        frame: f32,
        pose: &mut PoseBuffer,
        sink: &dyn DiagnosticSink,
    ) {
        pose.resize(skeleton.bone_count());
        pose.reset();

        for (name, track) in motion.bone_tracks() {
            let Some(index) = skeleton.find_bone_by_name(name) else {
                sink.report(Diagnostic::UnknownBone {
                    name: name.to_string(),
                });
                continue;
            };

            let Some(transform) = track.seek(frame) else {
                continue;
            };

            let rest_position = skeleton
                .get_bone(index)
                .map(|bone| bone.rest_position)
                .unwrap_or_default();
            pose.set_local(
                index,
                keyframe_matrix(rest_position, transform.orientation, transform.translation),
            );
        }

        pose.compose(skeleton);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::BoneKeyframe;
    use crate::diagnostics::RecordingSink;
    use crate::skeleton::BoneRecord;
    use glam::{Mat4, Quat, Vec3};
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    fn record(name: &str, parent: u16, position: Vec3) -> BoneRecord {
        BoneRecord {
            name: name.to_string(),
            parent_index: parent,
            tail_index: 0,
            kind: 0,
            ik_bone_index: 0,
            position,
        }
    }

    fn arm() -> BoneManager {
        BoneManager::build(&[
            record("センター", 0xFFFF, Vec3::ZERO),
            record("右肩", 0, Vec3::new(0.0, 1.0, 0.0)),
            record("右手首", 1, Vec3::new(0.0, 2.0, 0.0)),
        ])
        .unwrap()
    }

    #[test]
    fn test_halfway_rotation_about_rest_position() {
        let skeleton = arm();
        let motion = Motion::build(vec![
            ("右肩".to_string(), BoneKeyframe::new(0)),
            (
                "右肩".to_string(),
                BoneKeyframe::new(10).with_orientation(Quat::from_rotation_z(FRAC_PI_2)),
            ),
        ]);

        let mut pose = PoseBuffer::new(skeleton.bone_count());
        let sink = RecordingSink::new();
        PoseEvaluator::evaluate(&motion, &skeleton, 5.0, &mut pose, &sink);
        assert!(sink.is_empty());

        // 肩膀自身位置不变，手腕绕肩膀转 45 度
        let shoulder = pose.posed_position(&skeleton, 1);
        assert!((shoulder - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);

        let wrist = pose.posed_position(&skeleton, 2);
        let expected = Vec3::new(-FRAC_PI_4.sin(), 1.0 + FRAC_PI_4.cos(), 0.0);
        assert!((wrist - expected).length() < 1e-4, "wrist {:?}", wrist);
    }

    #[test]
    fn test_parent_translation_propagates() {
        let skeleton = arm();
        let motion = Motion::build(vec![(
            "センター".to_string(),
            BoneKeyframe::new(0).with_translation(Vec3::new(0.0, 0.0, 3.0)),
        )]);

        let mut pose = PoseBuffer::new(skeleton.bone_count());
        PoseEvaluator::evaluate(&motion, &skeleton, 0.0, &mut pose, &RecordingSink::new());

        let wrist = pose.posed_position(&skeleton, 2);
        assert!((wrist - Vec3::new(0.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_unknown_track_is_reported_and_skipped() {
        let skeleton = arm();
        let motion = Motion::build(vec![(
            "左足".to_string(),
            BoneKeyframe::new(0).with_translation(Vec3::X),
        )]);

        let mut pose = PoseBuffer::new(skeleton.bone_count());
        let sink = RecordingSink::new();
        PoseEvaluator::evaluate(&motion, &skeleton, 0.0, &mut pose, &sink);

        assert_eq!(
            sink.take(),
            vec![Diagnostic::UnknownBone { name: "左足".to_string() }]
        );
        assert!(pose.globals().iter().all(|m| *m == Mat4::IDENTITY));
    }

    #[test]
    fn test_previous_frame_is_overwritten() {
        let skeleton = arm();
        let motion = Motion::build(vec![(
            "右肩".to_string(),
            BoneKeyframe::new(5).with_translation(Vec3::X),
        )]);

        let mut pose = PoseBuffer::new(skeleton.bone_count());
        PoseEvaluator::evaluate(&motion, &skeleton, 6.0, &mut pose, &RecordingSink::new());
        assert_ne!(pose.global(1), Mat4::IDENTITY);

        // 第一个关键帧之前回到初始姿势
        PoseEvaluator::evaluate(&motion, &skeleton, 2.0, &mut pose, &RecordingSink::new());
        assert_eq!(pose.global(1), Mat4::IDENTITY);
    }

    #[test]
    fn test_mismatched_buffer_is_resized() {
        let skeleton = arm();
        let motion = Motion::build(vec![(
            "右手首".to_string(),
            BoneKeyframe::new(0).with_translation(Vec3::Z),
        )]);

        let mut pose = PoseBuffer::new(1);
        PoseEvaluator::evaluate(&motion, &skeleton, 0.0, &mut pose, &RecordingSink::new());
        assert_eq!(pose.len(), skeleton.bone_count());
        assert_eq!(pose.posed_position(&skeleton, 2), Vec3::new(0.0, 2.0, 1.0));
    }
}
