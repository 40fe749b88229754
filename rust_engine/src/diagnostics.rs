//! 诊断通道
//!
//! 播放期间的数据问题（未知骨骼、错误的 IK 描述、退化几何）不会中断渲染循环，
//! 而是通过注入的 [`DiagnosticSink`] 上报。

use std::cell::RefCell;
use std::rc::Rc;

/// 非致命的数据问题
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// 关键帧轨道引用了模型中不存在的骨骼
    UnknownBone { name: String },
    /// IK 描述引用了越界骨骼，或链不是一条祖先链
    MalformedIk { ik_bone: usize, reason: String },
    /// IK 求解遇到零长度边或零方向向量
    DegenerateGeometry { ik_bone: usize, reason: &'static str },
    /// 没有动画数据时查询了播放帧
    NoAnimationLoaded,
}

/// 诊断接收端
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

/// 共享接收端：宿主保留一份引用，在模型之外读取诊断
impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Rc<T> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// 转发到 `log` 的默认接收端
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            // 每帧都会触发，只在 trace 级别输出
            Diagnostic::UnknownBone { name } => {
                log::trace!("Motion track '{}' has no matching bone, skipped", name);
            }
            Diagnostic::MalformedIk { ik_bone, reason } => {
                log::warn!("IK {} skipped: {}", ik_bone, reason);
            }
            Diagnostic::DegenerateGeometry { ik_bone, reason } => {
                log::debug!("IK {} degenerate: {}", ik_bone, reason);
            }
            Diagnostic::NoAnimationLoaded => {
                log::debug!("No animation loaded, using frame 0");
            }
        }
    }
}

/// 在内存中收集诊断（测试或宿主自定义展示用）
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: RefCell<Vec<Diagnostic>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出并清空已收集的诊断
    pub fn take(&self) -> Vec<Diagnostic> {
        self.records.take()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.records.borrow_mut().push(diagnostic);
    }
}
