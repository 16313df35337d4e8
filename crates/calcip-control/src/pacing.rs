//! 节拍换算与截止时间调度
//!
//! # BPM → sleep_rate
//!
//! ```text
//! bpm 反复减半直到 <= bpm_limiter
//! sleep_rate = (1 / publish_hz) * (60 / bpm)    // 秒/条
//! loop_rate  = sleep_rate * publish_hz          // 秒/循环，理想值 = 60 / bpm
//! ```
//!
//! # 截止时间调度
//!
//! 循环入口记录 `start`，第 `i` 个 tick（从 1 开始）的截止时间为
//! `start + i * sleep_rate`，睡眠 `max(target - now, 0)`。超时的 tick 立即执行，
//! 不跳过也不追赶，锚点保持不变，因此单个 tick 的抖动不会累积成漂移。

use crate::error::ConfigError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 节拍换算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// 限幅后的 BPM
    pub bpm: f64,
    /// 每条指令的间隔（秒）
    pub sleep_rate: f64,
    /// 每个逻辑循环的实际时长（秒），诊断用
    pub loop_rate: f64,
}

impl Pacing {
    /// 用显式的 `sleep_override` 替换 BPM 推导出的间隔
    pub fn with_sleep_override(self, sleep_override: f64, publish_hz: u32) -> Self {
        Self {
            bpm: self.bpm,
            sleep_rate: sleep_override,
            loop_rate: sleep_override * f64::from(publish_hz),
        }
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_secs_f64(self.sleep_rate)
    }
}

/// BPM 限幅：反复减半直到不超过 `bpm_limiter`
///
/// 结果满足 `bpm_limiter / 2 < result <= bpm_limiter`（原值已在范围内时保持不变）。
pub fn clamp_bpm(bpm: f64, bpm_limiter: f64) -> Result<f64, ConfigError> {
    if !bpm_limiter.is_finite() || bpm_limiter <= 0.0 {
        return Err(ConfigError::InvalidBpmLimiter(bpm_limiter));
    }
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(ConfigError::InvalidBpm(bpm));
    }

    let mut clamped = bpm;
    while clamped > bpm_limiter {
        clamped /= 2.0;
    }
    Ok(clamped)
}

/// 由节拍和发送频率推导定时参数
pub fn derive_pacing(bpm: f64, publish_hz: u32, bpm_limiter: f64) -> Result<Pacing, ConfigError> {
    let bpm = clamp_bpm(bpm, bpm_limiter)?;
    let hz = f64::from(publish_hz);
    let sleep_rate = (1.0 / hz) * (60.0 / bpm);
    Ok(Pacing {
        bpm,
        sleep_rate,
        loop_rate: sleep_rate * hz,
    })
}

/// 会话级节拍（交互式修改 BPM）
///
/// 非法的新值返回错误，同时保留之前的 BPM。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
    bpm_limiter: f64,
}

impl Tempo {
    pub fn new(bpm: f64, bpm_limiter: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            bpm: clamp_bpm(bpm, bpm_limiter)?,
            bpm_limiter,
        })
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn bpm_limiter(&self) -> f64 {
        self.bpm_limiter
    }

    /// 修改 BPM，返回限幅后的值
    pub fn change_bpm(&mut self, new_bpm: f64) -> Result<f64, ConfigError> {
        match clamp_bpm(new_bpm, self.bpm_limiter) {
            Ok(bpm) => {
                if bpm != new_bpm {
                    debug!("BPM {} clamped to {}", new_bpm, bpm);
                }
                self.bpm = bpm;
                Ok(bpm)
            },
            Err(e) => {
                warn!("Rejecting BPM change to {}: {}, BPM remains {}", new_bpm, e, self.bpm);
                Err(e)
            },
        }
    }
}

// ============================================================================
// 时钟抽象
// ============================================================================

/// 单调时钟
///
/// 控制循环只通过此 trait 读取时间和睡眠，测试中可替换为 [`VirtualClock`]。
pub trait Clock {
    /// 自时钟创建以来的单调时间
    fn now(&self) -> Duration;

    /// 睡眠指定时长
    fn sleep(&self, duration: Duration);
}

/// 真实时钟（`Instant` + `spin_sleep`）
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            spin_sleep::sleep(duration);
        }
    }
}

#[derive(Debug, Default)]
struct VirtualState {
    now: Duration,
    auto_advance: Duration,
    sleeps: Vec<Duration>,
}

/// 虚拟时钟
///
/// 只在 `sleep` / `advance` 时前进。`set_auto_advance` 让每次 `now()` 额外前进
/// 一段时间，用来模拟每个 tick 的计算/发送耗时。克隆共享同一时间线。
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 手动推进时间
    pub fn advance(&self, duration: Duration) {
        self.lock().now += duration;
    }

    /// 每次读取 `now()` 之后自动推进的时长
    pub fn set_auto_advance(&self, duration: Duration) {
        self.lock().auto_advance = duration;
    }

    /// 所有请求过的睡眠时长（按调用顺序）
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    /// 请求过的睡眠总时长
    pub fn total_slept(&self) -> Duration {
        self.lock().sleeps.iter().sum()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        let mut state = self.lock();
        let now = state.now;
        let step = state.auto_advance;
        state.now += step;
        now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

// ============================================================================
// 截止时间调度器
// ============================================================================

/// 截止时间调度器
#[derive(Debug, Clone)]
pub struct DeadlineScheduler {
    start: Duration,
    sleep_rate: f64,
    overruns: u64,
}

impl DeadlineScheduler {
    /// 以当前时间为锚点开始调度
    pub fn start(clock: &impl Clock, sleep_rate: f64) -> Self {
        Self {
            start: clock.now(),
            sleep_rate,
            overruns: 0,
        }
    }

    /// 第 `tick` 个截止时间（相对时钟原点）
    pub fn deadline(&self, tick: u64) -> Duration {
        self.start + Duration::from_secs_f64(tick as f64 * self.sleep_rate)
    }

    /// 睡眠到第 `tick` 个截止时间，返回实际请求的睡眠时长（可能为 0）
    pub fn wait_for_tick(&mut self, clock: &impl Clock, tick: u64) -> Duration {
        let target = self.deadline(tick);
        let now = clock.now();
        match target.checked_sub(now) {
            Some(remaining) => {
                clock.sleep(remaining);
                remaining
            },
            None => {
                // 超时：不睡眠，直接进入下一帧，锚点不变
                self.overruns += 1;
                debug!(
                    "Tick {} overrun by {:?} (sleep_rate {:.4}s)",
                    tick,
                    now - target,
                    self.sleep_rate
                );
                Duration::ZERO
            },
        }
    }

    /// 自锚点以来经过的时间
    pub fn elapsed(&self, clock: &impl Clock) -> Duration {
        clock.now().saturating_sub(self.start)
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}
