//! 骨骼系统和 IK 求解器

mod bone;
mod ik_solver;
mod manager;
mod pose;

pub use bone::{Bone, BoneKind, BoneRecord};
pub use ik_solver::{cosine_law_angles, look_rotation, IkDescriptor, IkMethod, IkSolver};
pub use manager::BoneManager;
pub use pose::PoseBuffer;

use glam::{Mat4, Quat, Vec3};

/// 绕 `pivot` 旋转的变换矩阵
pub(crate) fn rotate_about(pivot: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_translation(pivot) * Mat4::from_quat(rotation) * Mat4::from_translation(-pivot)
}

/// 关键帧姿势的本地矩阵：绕初始位置旋转后再叠加平移
///
/// 对应行向量写法 `T(-rest) * R * T(rest) * T(offset)`。
pub(crate) fn keyframe_matrix(rest_position: Vec3, rotation: Quat, offset: Vec3) -> Mat4 {
    Mat4::from_translation(offset) * rotate_about(rest_position, rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_keyframe_matrix_keeps_pivot() {
        let rest = Vec3::new(0.0, 1.0, 0.0);
        let m = keyframe_matrix(rest, Quat::from_rotation_z(FRAC_PI_2), Vec3::new(0.0, 0.0, 2.0));

        // 初始位置只受平移影响
        assert!((m.transform_point3(rest) - Vec3::new(0.0, 1.0, 2.0)).length() < 1e-6);
        // 初始位置上方一个单位的点绕 Z 转到左侧
        let p = m.transform_point3(Vec3::new(0.0, 2.0, 0.0));
        assert!((p - Vec3::new(-1.0, 1.0, 2.0)).length() < 1e-5);
    }
}
