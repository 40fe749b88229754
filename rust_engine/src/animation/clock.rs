//! 动画时钟
//!
//! 记录开始时刻，把经过的时间换算成循环内的整数帧号。

use std::time::{Duration, Instant};

use crate::{MmdError, Result};

#[derive(Clone, Debug)]
pub struct AnimationClock {
    fps: f32,
    start: Option<Instant>,
}

impl AnimationClock {
    pub fn new(fps: f32) -> Self {
        Self { fps, start: None }
    }

    /// 以当前时刻为起点
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, start: Instant) {
        self.start = Some(start);
    }

    pub fn is_started(&self) -> bool {
        self.start.is_some()
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// 从开始到 `now` 经过的时间，未开始时为零
    pub fn elapsed(&self, now: Instant) -> Duration {
        self.start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// `floor(elapsed * fps) % loop_length`，循环长度为 0 时返回 `NoAnimationLoaded`
    pub fn frame_for_elapsed(elapsed: Duration, fps: f32, loop_length: u32) -> Result<u32> {
        if loop_length == 0 {
            return Err(MmdError::NoAnimationLoaded);
        }

        let frame = (elapsed.as_secs_f64() * fps as f64).floor().max(0.0) as u64;
        Ok((frame % loop_length as u64) as u32)
    }

    pub fn try_current_frame(&self, now: Instant, loop_length: u32) -> Result<u32> {
        Self::frame_for_elapsed(self.elapsed(now), self.fps, loop_length)
    }

    /// 当前帧号，没有动画时为 0
    pub fn current_frame(&self, now: Instant, loop_length: u32) -> u32 {
        self.try_current_frame(now, loop_length).unwrap_or(0)
    }
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new(30.0)
    }
}
