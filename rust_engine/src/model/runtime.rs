//! PMD 运行时模型
//!
//! 每帧流程：时钟换算帧号 → 姿势求值 → IK 求解 → 发布变换矩阵。

use std::path::Path;
use std::time::Instant;

use glam::{Mat4, Vec3};

use crate::animation::{AnimationClock, Motion, PoseEvaluator, VmdFile};
use crate::config::AnimationConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, LogSink};
use crate::render::{constant_buffer_size, ModelPlacement, TransformBackend, TransformPublisher};
use crate::skeleton::{BoneManager, IkSolver, PoseBuffer};
use crate::Result;

use super::PmdFile;

/// PMD 运行时模型
pub struct MmdModel {
    // 静态数据
    pub name: String,
    bone_manager: BoneManager,
    ik_solvers: Vec<IkSolver>,

    // 运行时数据
    pose: PoseBuffer,
    placement: ModelPlacement,
    motion: Option<Motion>,
    clock: AnimationClock,
    current_frame: f32,

    config: AnimationConfig,
    sink: Box<dyn DiagnosticSink>,
}

impl MmdModel {
    /// 从已解析的 PMD 数据创建
    pub fn from_pmd(pmd: PmdFile, config: AnimationConfig) -> Result<Self> {
        let bone_manager = BoneManager::build(&pmd.bones)?;
        let ik_solvers: Vec<IkSolver> = pmd.iks.into_iter().map(IkSolver::new).collect();

        match bone_manager
            .designated_root(&config.root_bone_names)
            .and_then(|index| bone_manager.get_bone(index))
        {
            Some(root) => log::debug!("PMD '{}' root bone: {}", pmd.name, root.name),
            None => log::debug!("PMD '{}' has no bones", pmd.name),
        }
        log::info!(
            "Created model '{}': {} bones, {} IK chains",
            pmd.name,
            bone_manager.bone_count(),
            ik_solvers.len()
        );

        let mut pose = PoseBuffer::new(bone_manager.bone_count());
        pose.compose(&bone_manager);

        Ok(Self {
            name: pmd.name,
            bone_manager,
            ik_solvers,
            pose,
            placement: ModelPlacement::default(),
            motion: None,
            clock: AnimationClock::new(config.fps),
            current_frame: 0.0,
            config,
            sink: Box::new(LogSink),
        })
    }

    /// 从 PMD 文件加载
    pub fn load_pmd<P: AsRef<Path>>(path: P, config: AnimationConfig) -> Result<Self> {
        Self::from_pmd(PmdFile::load(path)?, config)
    }

    /// 替换诊断接收端（默认转发到 `log`）
    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 设置动画，模型立即摆到第 0 帧
    pub fn set_motion(&mut self, motion: Motion) {
        let unknown = motion
            .bone_track_names()
            .filter(|name| self.bone_manager.find_bone_by_name(name).is_none())
            .count();
        if unknown > 0 {
            log::debug!("{} motion tracks have no matching bone in '{}'", unknown, self.name);
        }

        self.motion = Some(motion);
        self.update_frame(0.0);
    }

    /// 从 VMD 文件加载动画
    pub fn load_vmd<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let vmd = VmdFile::load(path)?;
        self.set_motion(vmd.into_motion());
        Ok(())
    }

    pub fn clear_motion(&mut self) {
        self.motion = None;
        self.pose.reset();
        self.current_frame = 0.0;
    }

    pub fn motion(&self) -> Option<&Motion> {
        self.motion.as_ref()
    }

    /// 循环长度，没有动画时为 0
    pub fn max_frame(&self) -> u32 {
        self.motion.as_ref().map(Motion::max_frame).unwrap_or(0)
    }

    /// 以当前时刻开始播放
    pub fn start_animation(&mut self) {
        self.clock.start();
    }

    pub fn start_animation_at(&mut self, start: Instant) {
        self.clock.start_at(start);
    }

    pub fn set_position(&mut self, x: f32, y: f32, z: f32) {
        self.placement.position = Vec3::new(x, y, z);
    }

    pub fn set_euler_angle(&mut self, x: f32, y: f32, z: f32) {
        self.placement.euler_angle = Vec3::new(x, y, z);
    }

    pub fn placement(&self) -> &ModelPlacement {
        &self.placement
    }

    /// 每帧更新：按时钟换算帧号后求值
    ///
    /// 帧率每次从配置读取，运行中修改 `config_mut().fps` 立即生效。
    pub fn update(&mut self, now: Instant) {
        let elapsed = self.clock.elapsed(now);
        let fps = self.config.fps;
        let frame = match AnimationClock::frame_for_elapsed(elapsed, fps, self.max_frame()) {
            Ok(frame) => frame,
            Err(_) => {
                self.sink.report(Diagnostic::NoAnimationLoaded);
                0
            }
        };
        self.update_frame(frame as f32);
    }

    /// 求值指定帧：姿势合成，然后（启用时）IK 求解
    pub fn update_frame(&mut self, frame: f32) {
        self.current_frame = frame;

        let Some(motion) = self.motion.as_ref() else {
            self.pose.reset();
            return;
        };

        PoseEvaluator::evaluate(
            motion,
            &self.bone_manager,
            frame,
            &mut self.pose,
            self.sink.as_ref(),
        );

        // VMD 中的 IK 开关按 IK 骨骼名生效
        for solver in &mut self.ik_solvers {
            solver.enabled = self
                .bone_manager
                .get_bone(solver.descriptor.target)
                .map(|bone| motion.is_ik_enabled(&bone.name, frame))
                .unwrap_or(true);
        }

        if self.config.ik_enabled {
            self.solve_ik();
        }
    }

    /// 对当前姿势执行所有 IK
    pub fn solve_ik(&mut self) {
        IkSolver::solve_all(
            &self.ik_solvers,
            &self.bone_manager,
            &mut self.pose,
            &self.config,
            self.sink.as_ref(),
        );
    }

    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    /// 发布视图：放置矩阵 + 当前骨骼矩阵
    pub fn transform_publisher(&self) -> TransformPublisher<'_> {
        TransformPublisher::new(&self.placement, &self.pose)
    }

    /// 分配变换缓冲区并写入当前姿势
    pub fn create_transform_buffer(&self, backend: &mut dyn TransformBackend) -> Result<()> {
        backend.allocate(constant_buffer_size(self.bone_manager.bone_count()))?;
        self.publish(backend)
    }

    /// 把当前姿势写入后端
    pub fn publish(&self, backend: &mut dyn TransformBackend) -> Result<()> {
        self.transform_publisher().write_to(backend)
    }

    pub fn bone_matrices(&self) -> &[Mat4] {
        self.pose.globals()
    }

    pub fn pose(&self) -> &PoseBuffer {
        &self.pose
    }

    pub fn bone_manager(&self) -> &BoneManager {
        &self.bone_manager
    }

    pub fn ik_solvers(&self) -> &[IkSolver] {
        &self.ik_solvers
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AnimationConfig {
        &mut self.config
    }
}
