//! IK 求解器
//!
//! 按链长选择算法：
//! - 0：跳过
//! - 1：LookAt，直接让链节点朝向目标
//! - 2：余弦定理解析双骨骼
//! - 3 及以上：CCD 迭代
//!
//! 所有求解都在模型空间内进行，结果以修正矩阵的形式左乘到链节点及其全部子孙骨骼上。

use std::f32::consts::PI;

use glam::{Mat3, Mat4, Quat, Vec3};

use super::{rotate_about, BoneManager, PoseBuffer};
use crate::config::AnimationConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::{MmdError, Result};

/// 方向向量的最小长度平方
const MIN_LENGTH_SQUARED: f32 = 1e-12;
/// 单位向量叉积的最小长度平方（小于此值视为平行）
const MIN_CROSS_SQUARED: f32 = 1e-8;

/// IK 描述
#[derive(Clone, Debug, PartialEq)]
pub struct IkDescriptor {
    /// IK 骨骼，其当前位置即目标位置
    pub target: usize,
    /// 被驱动的末端骨骼
    pub effector: usize,
    /// 最大迭代次数
    pub iterations: u16,
    /// 单步角度限制，以 π 为单位
    pub angle_limit: f32,
    /// 链节点，`chain[0]` 靠近末端，最后一个靠近根
    pub chain: Vec<usize>,
}

/// 求解算法
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IkMethod {
    Skip,
    LookAt,
    CosineLaw,
    Ccd,
}

impl IkMethod {
    pub fn for_chain_length(length: usize) -> Self {
        match length {
            0 => IkMethod::Skip,
            1 => IkMethod::LookAt,
            2 => IkMethod::CosineLaw,
            _ => IkMethod::Ccd,
        }
    }
}

/// IK 求解器
#[derive(Clone, Debug)]
pub struct IkSolver {
    pub descriptor: IkDescriptor,
    pub enabled: bool,
}

impl IkSolver {
    pub fn new(descriptor: IkDescriptor) -> Self {
        Self {
            descriptor,
            enabled: true,
        }
    }

    pub fn method(&self) -> IkMethod {
        IkMethod::for_chain_length(self.descriptor.chain.len())
    }

    /// 依次执行所有求解器，后一个求解器能看到前一个的修正结果
    pub fn solve_all(
        solvers: &[IkSolver],
        skeleton: &BoneManager,
        pose: &mut PoseBuffer,
        config: &AnimationConfig,
        sink: &dyn DiagnosticSink,
    ) {
        for solver in solvers {
            solver.solve(skeleton, pose, config, sink);
        }
    }

    /// 求解并原地修正姿势缓冲区，错误的描述只上报诊断，不会中断
    pub fn solve(
        &self,
        skeleton: &BoneManager,
        pose: &mut PoseBuffer,
        config: &AnimationConfig,
        sink: &dyn DiagnosticSink,
    ) {
        if !self.enabled {
            return;
        }

        if let Err(reason) = self.validate(skeleton) {
            sink.report(Diagnostic::MalformedIk {
                ik_bone: self.descriptor.target,
                reason,
            });
            return;
        }

        let result = match self.method() {
            IkMethod::Skip => Ok(()),
            IkMethod::LookAt => self.solve_look_at(skeleton, pose, config),
            IkMethod::CosineLaw => self.solve_cosine_law(skeleton, pose, config),
            IkMethod::Ccd => self.solve_ccd(skeleton, pose, config),
        };

        if let Err(MmdError::DegenerateGeometry(reason)) = result {
            sink.report(Diagnostic::DegenerateGeometry {
                ik_bone: self.descriptor.target,
                reason,
            });
        }
    }

    /// 检查索引范围和链结构
    fn validate(&self, skeleton: &BoneManager) -> std::result::Result<(), String> {
        let descriptor = &self.descriptor;
        let bone_count = skeleton.bone_count();

        if descriptor.chain.is_empty() {
            return Err("empty chain".to_string());
        }

        for (role, index) in [("target", descriptor.target), ("effector", descriptor.effector)] {
            if index >= bone_count {
                return Err(format!("{} bone {} out of range ({} bones)", role, index, bone_count));
            }
        }
        if let Some(&link) = descriptor.chain.iter().find(|&&link| link >= bone_count) {
            return Err(format!("chain bone {} out of range ({} bones)", link, bone_count));
        }

        // 链必须是从末端向根的一条祖先链
        let mut descendant = descriptor.effector;
        for &link in &descriptor.chain {
            if !skeleton.is_ancestor(link, descendant) {
                return Err(format!(
                    "chain bone {} is not an ancestor of bone {}",
                    link, descendant
                ));
            }
            descendant = link;
        }

        Ok(())
    }

    /// 单节点：让链节点到末端的初始方向对准链节点到目标的当前方向
    fn solve_look_at(
        &self,
        skeleton: &BoneManager,
        pose: &mut PoseBuffer,
        config: &AnimationConfig,
    ) -> Result<()> {
        let descriptor = &self.descriptor;
        let link = descriptor.chain[0];

        let link_rest = rest_position(skeleton, link);
        let effector_rest = rest_position(skeleton, descriptor.effector);
        let link_position = pose.posed_position(skeleton, link);
        let goal = pose.posed_position(skeleton, descriptor.target);

        let origin_dir = normalize_checked(effector_rest - link_rest)
            .ok_or(MmdError::DegenerateGeometry("effector rests on its chain link"))?;
        let goal_dir = normalize_checked(goal - link_position)
            .ok_or(MmdError::DegenerateGeometry("target coincides with chain link"))?;

        let from = look_rotation(origin_dir, config.up_reference, config.right_reference)
            .ok_or(MmdError::DegenerateGeometry("no look-at basis for rest direction"))?;
        let to = look_rotation(goal_dir, config.up_reference, config.right_reference)
            .ok_or(MmdError::DegenerateGeometry("no look-at basis for target direction"))?;

        // 初始姿势绕链节点旋转到目标方向，再放到链节点的当前位置
        let aligned = Mat4::from_translation(link_position)
            * Mat4::from_mat3(to * from.transpose())
            * Mat4::from_translation(-link_rest);
        let correction = aligned * pose.global(link).inverse();

        apply_chain_corrections(skeleton, pose, &descriptor.chain, &[correction]);
        Ok(())
    }

    /// 双节点：余弦定理求出两个关节角
    fn solve_cosine_law(
        &self,
        skeleton: &BoneManager,
        pose: &mut PoseBuffer,
        config: &AnimationConfig,
    ) -> Result<()> {
        let descriptor = &self.descriptor;
        let knee = descriptor.chain[0];
        let hip = descriptor.chain[1];

        let upper_length = (rest_position(skeleton, knee) - rest_position(skeleton, hip)).length();
        let lower_length =
            (rest_position(skeleton, descriptor.effector) - rest_position(skeleton, knee)).length();

        let hip_position = pose.posed_position(skeleton, hip);
        let knee_position = pose.posed_position(skeleton, knee);
        let effector_position = pose.posed_position(skeleton, descriptor.effector);
        let goal = pose.posed_position(skeleton, descriptor.target);

        let to_goal = goal - hip_position;
        let direction = normalize_checked(to_goal)
            .ok_or(MmdError::DegenerateGeometry("target coincides with chain root"))?;
        // 超出可达范围时尽量伸直或折叠
        let reach = to_goal
            .length()
            .clamp((upper_length - lower_length).abs(), upper_length + lower_length);

        let (hip_angle, knee_angle) = cosine_law_angles(reach, upper_length, lower_length)
            .ok_or(MmdError::DegenerateGeometry("zero-length edge in two-bone chain"))?;

        let knee_name = skeleton.get_bone(knee).map(|bone| bone.name.as_str()).unwrap_or("");
        let axis = bend_axis(config, knee_name, direction, knee_position - hip_position);

        let upper_dir = Quat::from_axis_angle(axis, hip_angle) * direction;
        let knee_goal = hip_position + upper_dir * upper_length;
        let lower_dir = Quat::from_axis_angle(axis, knee_angle) * upper_dir;
        let effector_goal = knee_goal + lower_dir * lower_length;

        let hip_rotation = rotation_between(knee_position - hip_position, knee_goal - hip_position)
            .ok_or(MmdError::DegenerateGeometry("knee coincides with hip"))?;
        let hip_correction = rotate_about(hip_position, hip_rotation);

        let moved_knee = hip_correction.transform_point3(knee_position);
        let moved_effector = hip_correction.transform_point3(effector_position);
        let knee_rotation =
            rotation_between(moved_effector - moved_knee, effector_goal - moved_knee)
                .ok_or(MmdError::DegenerateGeometry("effector coincides with knee"))?;
        let knee_correction = rotate_about(moved_knee, knee_rotation) * hip_correction;

        apply_chain_corrections(
            skeleton,
            pose,
            &descriptor.chain,
            &[knee_correction, hip_correction],
        );
        Ok(())
    }

    /// 三节点以上：CCD 迭代
    fn solve_ccd(
        &self,
        skeleton: &BoneManager,
        pose: &mut PoseBuffer,
        config: &AnimationConfig,
    ) -> Result<()> {
        let descriptor = &self.descriptor;
        let epsilon = config.ik_epsilon;

        let goal = pose.posed_position(skeleton, descriptor.target);
        let mut effector_position = pose.posed_position(skeleton, descriptor.effector);
        let mut link_positions: Vec<Vec3> = descriptor
            .chain
            .iter()
            .map(|&link| pose.posed_position(skeleton, link))
            .collect();
        let mut corrections = vec![Mat4::IDENTITY; descriptor.chain.len()];

        // 根端节点不动；链长之和即可达范围
        let root = link_positions.last().copied().unwrap_or(effector_position);
        let reach = link_positions
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum::<f32>()
            + link_positions[0].distance(effector_position);
        let mut stalled = false;

        // 非正的限制值不做限制
        let limit = if descriptor.angle_limit > 0.0 {
            descriptor.angle_limit * PI
        } else {
            PI
        };

        'iterations: for _ in 0..descriptor.iterations {
            if effector_position.distance(goal) <= epsilon {
                break;
            }

            let mut rotated = false;
            for slot in 0..descriptor.chain.len() {
                let pivot = link_positions[slot];
                let (Some(to_effector), Some(to_goal)) = (
                    normalize_checked(effector_position - pivot),
                    normalize_checked(goal - pivot),
                ) else {
                    continue;
                };

                if (to_effector - to_goal).length() <= epsilon {
                    continue;
                }

                let cross = to_effector.cross(to_goal);
                let axis = if cross.length_squared() > MIN_CROSS_SQUARED {
                    cross.normalize()
                } else {
                    // 反向共线，任取一条垂直轴
                    to_effector.any_orthonormal_vector()
                };
                let angle = to_effector.angle_between(to_goal).min(limit);
                let step = rotate_about(pivot, Quat::from_axis_angle(axis, angle));

                // 当前节点及更靠近末端的节点都跟着转
                for correction in &mut corrections[..=slot] {
                    *correction = step * *correction;
                }
                for position in &mut link_positions[..slot] {
                    *position = step.transform_point3(*position);
                }
                effector_position = step.transform_point3(effector_position);
                rotated = true;

                if effector_position.distance(goal) <= epsilon {
                    break 'iterations;
                }
            }

            // 每个节点看到的末端和目标都在同一射线上，之后的迭代不会再有变化
            if !rotated {
                stalled = goal.distance(root) < reach - epsilon;
                break;
            }
        }

        apply_chain_corrections(skeleton, pose, &descriptor.chain, &corrections);
        if stalled {
            return Err(MmdError::DegenerateGeometry("chain is collinear with the goal"));
        }
        Ok(())
    }
}

/// 余弦定理：返回 `(根关节角, 中间关节角 - π)`
///
/// `a` 为根到目标的距离，`b`、`c` 为两段骨骼长度。
pub fn cosine_law_angles(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a <= f32::EPSILON || b <= f32::EPSILON || c <= f32::EPSILON {
        return None;
    }

    let cos1 = ((a * a + b * b - c * c) / (2.0 * a * b)).clamp(-1.0, 1.0);
    let cos2 = ((b * b + c * c - a * a) / (2.0 * b * c)).clamp(-1.0, 1.0);

    Some((cos1.acos(), cos2.acos() - PI))
}

/// 以 `dir` 为 Z 轴构造正交基（列为 X、Y、Z）
///
/// `up` 与 `dir` 平行时改用 `right` 作参考。
pub fn look_rotation(dir: Vec3, up: Vec3, right: Vec3) -> Option<Mat3> {
    let z = normalize_checked(dir)?;

    let up_cross = up.cross(z);
    let (x, y) = if up_cross.length_squared() > MIN_CROSS_SQUARED {
        let x = up_cross.normalize();
        (x, z.cross(x))
    } else {
        let right_cross = z.cross(right);
        if right_cross.length_squared() <= MIN_CROSS_SQUARED {
            return None;
        }
        let y = right_cross.normalize();
        (y.cross(z), y)
    };

    Some(Mat3::from_cols(x, y, z))
}

/// 双骨骼弯曲平面的法线
fn bend_axis(config: &AnimationConfig, knee_name: &str, direction: Vec3, to_knee: Vec3) -> Vec3 {
    // 固定轴去掉沿目标方向的分量
    let fixed_axis =
        normalize_checked(config.knee_axis - direction * config.knee_axis.dot(direction));

    if config.is_knee_bone(knee_name) {
        if let Some(axis) = fixed_axis {
            return axis;
        }
    }

    let cross = direction.cross(to_knee);
    if cross.length_squared() > MIN_CROSS_SQUARED * to_knee.length_squared() {
        return cross.normalize();
    }

    // 腿完全伸直时没有弯曲平面
    fixed_axis.unwrap_or_else(|| direction.any_orthonormal_vector())
}

fn rest_position(skeleton: &BoneManager, index: usize) -> Vec3 {
    skeleton
        .get_bone(index)
        .map(|bone| bone.rest_position)
        .unwrap_or(Vec3::ZERO)
}

fn normalize_checked(v: Vec3) -> Option<Vec3> {
    (v.length_squared() > MIN_LENGTH_SQUARED).then(|| v.normalize())
}

fn rotation_between(from: Vec3, to: Vec3) -> Option<Quat> {
    Some(Quat::from_rotation_arc(normalize_checked(from)?, normalize_checked(to)?))
}

/// 把链节点的修正矩阵传播到各自的子树
///
/// 每个骨骼使用离它最近的链节点祖先（含自身）的修正。
fn apply_chain_corrections(
    skeleton: &BoneManager,
    pose: &mut PoseBuffer,
    chain: &[usize],
    corrections: &[Mat4],
) {
    let mut owner: Vec<Option<usize>> = vec![None; skeleton.bone_count()];
    for (slot, &link) in chain.iter().enumerate() {
        owner[link] = Some(slot);
    }

    for &index in skeleton.sorted_indices() {
        if owner[index].is_none() {
            owner[index] = skeleton.parent(index).and_then(|parent| owner[parent]);
        }
        if let Some(slot) = owner[index] {
            pose.set_global(index, corrections[slot] * pose.global(index));
        }
    }
}
