//! 骨骼管理器（骨骼层级）

use std::collections::{HashMap, VecDeque};

use super::bone::{Bone, BoneRecord};
use crate::{MmdError, Result};

/// 骨骼管理器
///
/// 骨骼存放在按索引寻址的数组中，子骨骼以索引列表保存，拓扑在加载后不再改变。
#[derive(Clone, Debug, Default)]
pub struct BoneManager {
    bones: Vec<Bone>,
    name_to_index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    /// 父骨骼先于子骨骼的遍历顺序
    sorted_indices: Vec<usize>,
}

impl BoneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从骨骼表构建层级
    pub fn build(records: &[BoneRecord]) -> Result<Self> {
        let bone_count = records.len();
        let mut manager = Self::new();
        for (index, record) in records.iter().enumerate() {
            manager.add_bone(Bone::from_record(index, record, bone_count));
        }
        manager.build_hierarchy()?;
        Ok(manager)
    }

    fn add_bone(&mut self, bone: Bone) {
        // 重名时后出现的骨骼覆盖前者（与 PMD 读取行为一致）
        self.name_to_index.insert(bone.name.clone(), bone.index);
        self.bones.push(bone);
    }

    /// 建立子骨骼列表和遍历顺序，检测父子环
    fn build_hierarchy(&mut self) -> Result<()> {
        let bone_count = self.bones.len();

        self.children = vec![Vec::new(); bone_count];
        for bone in &self.bones {
            if let Some(parent) = bone.parent {
                self.children[parent].push(bone.index);
            }
        }

        // 从所有根骨骼出发做广度优先遍历
        let mut queue: VecDeque<usize> = self
            .bones
            .iter()
            .filter(|bone| bone.parent.is_none())
            .map(|bone| bone.index)
            .collect();
        let mut visited = vec![false; bone_count];
        let mut sorted = Vec::with_capacity(bone_count);

        while let Some(index) = queue.pop_front() {
            visited[index] = true;
            sorted.push(index);
            queue.extend(self.children[index].iter().copied());
        }

        // 无法从根到达的骨骼必然处在环上
        if let Some(bone) = visited.iter().position(|&v| !v) {
            return Err(MmdError::CyclicHierarchy { bone });
        }

        self.sorted_indices = sorted;
        Ok(())
    }

    /// 通过名称查找骨骼
    pub fn find_bone_by_name(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 通过名称查找骨骼，不存在时返回 `UnknownBone`
    pub fn bone_index(&self, name: &str) -> Result<usize> {
        self.find_bone_by_name(name)
            .ok_or_else(|| MmdError::UnknownBone(name.to_string()))
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn get_bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.bones.get(index).and_then(|bone| bone.parent)
    }

    pub fn children(&self, index: usize) -> &[usize] {
        self.children.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 父骨骼先于子骨骼的顺序
    pub fn sorted_indices(&self) -> &[usize] {
        &self.sorted_indices
    }

    /// 指定的根骨骼：按候选名称匹配，否则取第一个没有父骨骼的骨骼
    pub fn designated_root(&self, candidates: &[String]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|name| self.find_bone_by_name(name))
            .or_else(|| self.bones.iter().find(|bone| bone.parent.is_none()).map(|bone| bone.index))
    }

    /// `ancestor` 是否为 `descendant` 的祖先（不含自身）
    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        let mut current = self.parent(descendant);
        // 层级无环，深度不会超过骨骼数
        for _ in 0..self.bones.len() {
            match current {
                Some(index) if index == ancestor => return true,
                Some(index) => current = self.parent(index),
                None => return false,
            }
        }
        false
    }

    /// 到根骨骼的深度，根为 0
    pub fn depth(&self, index: usize) -> usize {
        let mut depth = 0;
        let mut current = self.parent(index);
        while let Some(parent) = current {
            depth += 1;
            if depth > self.bones.len() {
                break;
            }
            current = self.parent(parent);
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use proptest::prelude::*;

    fn record(name: &str, parent: u16, y: f32) -> BoneRecord {
        BoneRecord {
            name: name.to_string(),
            parent_index: parent,
            tail_index: 0,
            kind: 0,
            ik_bone_index: 0,
            position: Vec3::new(0.0, y, 0.0),
        }
    }

    #[test]
    fn test_build_simple_chain() {
        let manager = BoneManager::build(&[
            record("センター", 0xFFFF, 8.0),
            record("上半身", 0, 10.0),
            record("首", 1, 15.0),
        ])
        .unwrap();

        assert_eq!(manager.bone_count(), 3);
        assert_eq!(manager.children(0), &[1]);
        assert_eq!(manager.children(1), &[2]);
        assert_eq!(manager.sorted_indices(), &[0, 1, 2]);
        assert_eq!(manager.designated_root(&["センター".to_string()]), Some(0));
        assert_eq!(manager.depth(2), 2);
        assert!(manager.is_ancestor(0, 2));
        assert!(!manager.is_ancestor(2, 0));
    }

    #[test]
    fn test_parent_after_child_is_sorted() {
        // 子骨骼在表中排在父骨骼之前
        let manager = BoneManager::build(&[
            record("lower", 2, 1.0),
            record("root", 0xFFFF, 0.0),
            record("upper", 1, 2.0),
        ])
        .unwrap();

        let order = manager.sorted_indices();
        let position = |i: usize| order.iter().position(|&x| x == i).unwrap();
        assert!(position(1) < position(2));
        assert!(position(2) < position(0));
    }

    #[test]
    fn test_out_of_range_parent_becomes_extra_root() {
        let manager =
            BoneManager::build(&[record("a", 0xFFFF, 0.0), record("b", 42, 1.0)]).unwrap();
        assert_eq!(manager.parent(1), None);
        assert_eq!(manager.sorted_indices().len(), 2);
        // 没有匹配的根名称时取第一个根
        assert_eq!(manager.designated_root(&["center".to_string()]), Some(0));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let result = BoneManager::build(&[
            record("root", 0xFFFF, 0.0),
            record("a", 2, 1.0),
            record("b", 1, 2.0),
        ]);
        assert!(matches!(result, Err(MmdError::CyclicHierarchy { .. })));

        let self_parent = BoneManager::build(&[record("loop", 0, 0.0)]);
        assert!(matches!(self_parent, Err(MmdError::CyclicHierarchy { bone: 0 })));
    }

    #[test]
    fn test_unknown_bone_lookup() {
        let manager = BoneManager::build(&[record("root", 0xFFFF, 0.0)]).unwrap();
        assert_eq!(manager.bone_index("root").unwrap(), 0);
        assert!(matches!(
            manager.bone_index("missing"),
            Err(MmdError::UnknownBone(name)) if name == "missing"
        ));
    }

    proptest! {
        /// 任意父索引表：要么构建失败（有环），要么每个骨骼都恰好出现一次且父先于子
        #[test]
        fn prop_hierarchy_order(parents in proptest::collection::vec(0u16..12, 1..10)) {
            let records: Vec<BoneRecord> = parents
                .iter()
                .enumerate()
                .map(|(i, &p)| record(&format!("bone{}", i), p, i as f32))
                .collect();

            if let Ok(manager) = BoneManager::build(&records) {
                let order = manager.sorted_indices();
                prop_assert_eq!(order.len(), records.len());

                let mut seen = vec![false; records.len()];
                for &index in order {
                    if let Some(parent) = manager.parent(index) {
                        prop_assert!(seen[parent]);
                    }
                    seen[index] = true;
                    prop_assert!(manager.depth(index) < records.len());
                }
            }
        }
    }
}
