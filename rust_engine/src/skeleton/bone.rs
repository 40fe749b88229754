//! 骨骼节点

use glam::Vec3;

/// PMD 骨骼类型
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneKind {
    /// 旋转
    Rotate,
    /// 旋转 + 移动
    RotateTranslate,
    /// IK 驱动骨骼
    Ik,
    Undefined,
    /// 受 IK 影响的链节点
    IkLink,
    /// 旋转跟随
    RotationFollow,
    /// IK 目标（末端）
    IkTarget,
    /// 不可见 / 辅助
    Invisible,
    /// 表外的类型值（保留原始值）
    Other(u8),
}

impl From<u8> for BoneKind {
    fn from(value: u8) -> Self {
        match value {
            0 => BoneKind::Rotate,
            1 => BoneKind::RotateTranslate,
            2 => BoneKind::Ik,
            3 => BoneKind::Undefined,
            4 => BoneKind::IkLink,
            5 => BoneKind::RotationFollow,
            6 => BoneKind::IkTarget,
            7 => BoneKind::Invisible,
            other => BoneKind::Other(other),
        }
    }
}

/// 骨骼表中的一条原始记录
#[derive(Clone, Debug, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    /// 父骨骼索引，越界（包括 0xFFFF）视为无父骨骼
    pub parent_index: u16,
    /// 尾端 / 子骨骼索引（骨骼系统不使用）
    pub tail_index: u16,
    pub kind: u8,
    pub ik_bone_index: u16,
    pub position: Vec3,
}

/// 骨骼节点
///
/// 子骨骼列表由 [`super::BoneManager`] 持有，骨骼本身只记录父索引。
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub index: usize,
    pub parent: Option<usize>,
    pub kind: BoneKind,
    pub ik_parent: Option<usize>,
    /// 初始位置（模型空间）
    pub rest_position: Vec3,
}

impl Bone {
    /// 从骨骼表记录创建，`bone_count` 用于判断索引是否越界
    pub fn from_record(index: usize, record: &BoneRecord, bone_count: usize) -> Self {
        let resolve = |raw: u16| {
            let raw = raw as usize;
            (raw < bone_count).then_some(raw)
        };

        Self {
            name: record.name.clone(),
            index,
            parent: resolve(record.parent_index),
            kind: BoneKind::from(record.kind),
            ik_parent: resolve(record.ik_bone_index),
            rest_position: record.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_parent_is_root() {
        let record = BoneRecord {
            name: "センター".to_string(),
            parent_index: 0xFFFF,
            tail_index: 0,
            kind: 1,
            ik_bone_index: 0,
            position: Vec3::new(0.0, 8.0, 0.0),
        };
        let bone = Bone::from_record(0, &record, 3);
        assert_eq!(bone.parent, None);
        assert_eq!(bone.kind, BoneKind::RotateTranslate);
        assert_eq!(bone.ik_parent, Some(0));
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        assert_eq!(BoneKind::from(9), BoneKind::Other(9));
        assert_eq!(BoneKind::from(6), BoneKind::IkTarget);
    }
}
