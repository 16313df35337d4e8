//! 循环状态与随机舞蹈
//!
//! [`LoopState`] 持有单次控制循环的全部可变状态，生命周期等于一次
//! `sin_euler_ctrl` 调用。舞蹈模式下 [`Choreographer`] 在发送完第 `t` 个 tick
//! 之后抽取一个 [`RerollEvent`]，事件在第 `t + 1` 个 tick 开始时经过
//! [`validate_wave`] 校验后生效；校验失败时丢弃事件，保留原参数。
//!
//! `timestep` 在整个循环内单调递增，重抽样不会重置相位累加。
//! 完整重抽样（新振幅/周期）同时把偏置归零，新振幅本身已接近预算上限。

use crate::axis::{Axis, AxisArray};
use crate::error::ConfigError;
use crate::oscillator::{Oscillator, compose};
use crate::pacing::Pacing;
use crate::params::WaveParams;
use crate::safety::{MotionPlan, SafetyPolicy, ValidationWarning, validate_wave};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// `rand_dance` 每隔多少个逻辑循环重抽样
pub const RAND_DANCE_INTERVAL_LOOPS: u64 = 2;
/// `rand_dance` 周期候选
pub const RAND_DANCE_PERIODS: [f64; 3] = [1.0, 2.0, 4.0];
/// `dance` 每隔多少个逻辑循环完整重抽样（其余循环边界只反向）
pub const DANCE_REROLL_INTERVAL_LOOPS: u64 = 4;
/// `dance` 周期候选
pub const DANCE_PERIODS: [f64; 3] = [0.5, 1.0, 2.0];
/// `dance` 模式下 BPM 超过此值时不允许周期 < 1
pub const DANCE_FAST_BPM: f64 = 45.0;

/// 振荡模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OscillationMode {
    /// 参数在整个循环中保持不变
    #[default]
    Default,
    /// 每两个循环随机重抽样（oscillation 策略）
    RandDance,
    /// 每个循环反向、每四个循环重抽样（rollpitchyaw 策略）
    Dance,
}

impl OscillationMode {
    pub const ALL: [OscillationMode; 3] = [
        OscillationMode::Default,
        OscillationMode::RandDance,
        OscillationMode::Dance,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            OscillationMode::Default => "default",
            OscillationMode::RandDance => "rand_dance",
            OscillationMode::Dance => "dance",
        }
    }

    /// 重抽样可能产生的最小周期
    pub fn min_reroll_period(self) -> Option<f64> {
        match self {
            OscillationMode::Default => None,
            OscillationMode::RandDance => Some(RAND_DANCE_PERIODS[0]),
            OscillationMode::Dance => Some(DANCE_PERIODS[0]),
        }
    }
}

impl fmt::Display for OscillationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OscillationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        OscillationMode::ALL
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| ConfigError::UnknownMode(s.to_string()))
    }
}

/// 重抽样动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerollAction {
    /// 新的振幅/周期（`rand_dance` 同时更换振荡函数）
    Params,
    /// 只更换振荡函数
    Oscillators,
    /// 新参数后反向
    ParamsAndReverse,
    /// 只反向
    Reverse,
}

impl RerollAction {
    fn from_draw(draw: u8) -> Self {
        match draw {
            0 => RerollAction::Params,
            1 => RerollAction::Oscillators,
            2 => RerollAction::ParamsAndReverse,
            _ => RerollAction::Reverse,
        }
    }
}

impl fmt::Display for RerollAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RerollAction::Params => "new params",
            RerollAction::Oscillators => "new oscillators",
            RerollAction::ParamsAndReverse => "new params + reverse",
            RerollAction::Reverse => "reverse",
        };
        f.write_str(name)
    }
}

/// 待生效的重抽样事件
#[derive(Debug, Clone, PartialEq)]
pub struct RerollEvent {
    /// 抽取事件时的 tick
    pub drawn_at: u64,
    pub action: RerollAction,
    /// 候选波形（尚未校验）
    pub wave: WaveParams,
}

fn random_sign<R: Rng>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) { 1.0 } else { -1.0 }
}

fn choose_period<R: Rng>(options: &[f64], rng: &mut R) -> f64 {
    options.choose(rng).copied().unwrap_or(1.0)
}

/// 舞蹈重抽样调度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Choreographer {
    mode: OscillationMode,
    publish_hz: u32,
    bpm: f64,
}

impl Choreographer {
    pub fn new(mode: OscillationMode, publish_hz: u32, bpm: f64) -> Self {
        Self {
            mode,
            publish_hz,
            bpm,
        }
    }

    pub fn from_plan(plan: &MotionPlan) -> Self {
        Self::new(
            plan.mode(),
            plan.timing().publish_hz(),
            plan.timing().pacing().bpm,
        )
    }

    pub fn mode(&self) -> OscillationMode {
        self.mode
    }

    /// 在第 `t` 个 tick 发送之后抽取事件（不到时间返回 `None`）
    pub fn draw<R: Rng>(&self, t: u64, current: &WaveParams, rng: &mut R) -> Option<RerollEvent> {
        let hz = u64::from(self.publish_hz);
        let action = match self.mode {
            OscillationMode::Default => return None,
            OscillationMode::RandDance => {
                if t % (RAND_DANCE_INTERVAL_LOOPS * hz) != 0 {
                    return None;
                }
                RerollAction::from_draw(rng.gen_range(0..=3))
            },
            OscillationMode::Dance => {
                if t == 0 || t % hz != 0 {
                    return None;
                }
                if t % (DANCE_REROLL_INTERVAL_LOOPS * hz) == 0 {
                    RerollAction::Params
                } else {
                    RerollAction::Reverse
                }
            },
        };

        let wave = match (self.mode, action) {
            (_, RerollAction::Reverse) => current.reversed(),
            (OscillationMode::Dance, _) => self.rpy_dance_wave(current, rng),
            (_, RerollAction::Params) => WaveParams {
                oscillator: Self::rand_oscillators(rng),
                ..Self::rand_dance_wave(current, rng)
            },
            (_, RerollAction::Oscillators) => WaveParams {
                oscillator: Self::rand_oscillators(rng),
                ..current.clone()
            },
            (_, RerollAction::ParamsAndReverse) => WaveParams {
                oscillator: Self::rand_oscillators(rng),
                ..Self::rand_dance_wave(current, rng)
            }
            .reversed(),
        };

        debug!("Re-roll drawn at timestep {}: {}", t, action);
        Some(RerollEvent {
            drawn_at: t,
            action,
            wave,
        })
    }

    /// `rand_dance` 参数：所有轴使能，周期之和 > 3，相位与偏置归零
    fn rand_dance_wave<R: Rng>(current: &WaveParams, rng: &mut R) -> WaveParams {
        let amplitude = AxisArray::new([
            rng.gen_range(0.45..=0.5) * random_sign(rng),
            rng.gen_range(0.5..=0.55) * random_sign(rng),
            rng.gen_range(0.35..=0.4) * random_sign(rng),
        ]);

        let mut period = AxisArray::splat(1.0);
        while period.iter().sum::<f64>() <= 3.0 {
            period = AxisArray::new([
                choose_period(&RAND_DANCE_PERIODS, rng),
                choose_period(&RAND_DANCE_PERIODS, rng),
                choose_period(&RAND_DANCE_PERIODS, rng),
            ]);
        }

        WaveParams {
            amplitude,
            offset: AxisArray::splat(0.0),
            period,
            phase: AxisArray::splat(0.0),
            enabled: AxisArray::splat(true),
            ..current.clone()
        }
    }

    /// 两个 `sin` 加一个随机振荡函数，顺序打乱
    fn rand_oscillators<R: Rng>(rng: &mut R) -> AxisArray<Oscillator> {
        let extra = Oscillator::ALL
            .choose(rng)
            .copied()
            .unwrap_or(Oscillator::Sin);
        let mut oscillators = [Oscillator::Sin, Oscillator::Sin, extra];
        oscillators.shuffle(rng);
        AxisArray::new(oscillators)
    }

    /// `dance` 参数：至少两个轴使能，周期取自 {0.5, 1, 2}，偏置归零
    fn rpy_dance_wave<R: Rng>(&self, current: &WaveParams, rng: &mut R) -> WaveParams {
        let mut enabled = AxisArray::splat(false);
        while enabled.iter().filter(|&&on| on).count() <= 1 {
            enabled = AxisArray::new([rng.gen_bool(0.5), rng.gen_bool(0.5), rng.gen_bool(0.5)]);
        }

        let amplitude = AxisArray::new([
            rng.gen_range(0.3..=0.5) * random_sign(rng),
            rng.gen_range(0.3..=0.5) * random_sign(rng),
            rng.gen_range(0.3..=0.4) * random_sign(rng),
        ]);

        let mut period = AxisArray::new([
            choose_period(&DANCE_PERIODS, rng),
            choose_period(&DANCE_PERIODS, rng),
            choose_period(&DANCE_PERIODS, rng),
        ]);
        if self.bpm > DANCE_FAST_BPM && period.iter().any(|&p| p < 1.0) {
            period[Axis::Yaw] = 1.0;
        }

        // 半周期的 sin 轴从 -π/4 开始
        let phase = period.map_with(current.oscillator, |p, osc| {
            if p == 0.5 && osc == Oscillator::Sin {
                -PI / 4.0
            } else {
                0.0
            }
        });

        WaveParams {
            amplitude,
            offset: AxisArray::splat(0.0),
            period,
            phase,
            enabled,
            ..current.clone()
        }
    }
}

/// 单次控制循环的可变状态
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    timestep: u64,
    wave: WaveParams,
    publish_hz: u32,
    pacing: Pacing,
    pending: Option<RerollEvent>,
    rerolls_applied: u32,
    rerolls_rejected: u32,
}

impl LoopState {
    pub fn new(plan: &MotionPlan) -> Self {
        Self::from_parts(plan.wave().clone(), plan.timing().publish_hz(), plan.timing().pacing())
    }

    pub fn from_parts(wave: WaveParams, publish_hz: u32, pacing: Pacing) -> Self {
        Self {
            timestep: 0,
            wave,
            publish_hz,
            pacing,
            pending: None,
            rerolls_applied: 0,
            rerolls_rejected: 0,
        }
    }

    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    pub fn wave(&self) -> &WaveParams {
        &self.wave
    }

    pub fn publish_hz(&self) -> u32 {
        self.publish_hz
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn pending(&self) -> Option<&RerollEvent> {
        self.pending.as_ref()
    }

    pub fn rerolls_applied(&self) -> u32 {
        self.rerolls_applied
    }

    pub fn rerolls_rejected(&self) -> u32 {
        self.rerolls_rejected
    }

    /// 当前 tick 的三轴设定值
    pub fn setpoint(&self) -> AxisArray<f64> {
        compose(&self.wave, self.timestep, self.publish_hz)
    }

    /// 登记事件，下一个 tick 开始时生效（覆盖尚未生效的旧事件）
    pub fn schedule(&mut self, event: RerollEvent) {
        self.pending = Some(event);
    }

    /// 在 tick 边界应用待生效事件
    ///
    /// 没有事件时返回 `None`。校验失败时保留原参数并返回错误。
    pub fn apply_pending(
        &mut self,
        policy: &SafetyPolicy,
    ) -> Option<Result<RerollAction, ConfigError>> {
        let event = self.pending.take()?;
        match validate_wave(&event.wave, policy, self.publish_hz) {
            Ok(validated) => {
                for w in &validated.warnings {
                    if matches!(w, ValidationWarning::PhaseWrapped { .. }) {
                        warn!("Re-roll auto-corrected: {}", w);
                    } else {
                        debug!("Re-roll advisory: {}", w);
                    }
                }
                self.wave = validated.value;
                self.rerolls_applied += 1;
                info!(
                    "Re-roll applied at timestep {:05}: {} (amplitude {:?}, period {:?})",
                    self.timestep,
                    event.action,
                    self.wave.amplitude.as_array(),
                    self.wave.period.as_array()
                );
                Some(Ok(event.action))
            },
            Err(e) => {
                self.rerolls_rejected += 1;
                warn!(
                    "Re-roll at timestep {:05} rejected, keeping previous parameters: {}",
                    self.timestep, e
                );
                Some(Err(e))
            },
        }
    }

    /// 进入下一个 tick
    pub fn advance(&mut self) {
        self.timestep += 1;
    }
}
