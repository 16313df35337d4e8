//! 安全校验
//!
//! 在第一条指令发出之前完成所有致命检查。校验是纯函数：输入参数不被修改，
//! 返回修正后的 Plan 以及警告列表（[`Validated`]）。
//!
//! # 检查顺序（振荡模式）
//!
//! 1. `publish_hz` ∈ [50, 1000]（致命）
//! 2. `sleep_override` ∈ [0.001, 0.1]（致命）
//! 3. 周期硬区间（致命）、软区间（提示）、低周期 + 高频率组合（自动降频）
//! 4. `|amplitude| + |offset|` ≤ 预算（致命）
//! 5. 相位折叠到 (-2, 2)（自动修正）
//! 6. `loop_repeats` ∈ [1, 128]（致命），不是最大周期整数倍（提示）
//! 7. `sleep_rate` < 0.001（致命）/ < 0.002（提示），`loop_rate` < 1（提示）

use crate::axis::{Axis, AxisArray};
use crate::choreography::OscillationMode;
use crate::error::ConfigError;
use crate::pacing::{Pacing, derive_pacing};
use crate::params::{
    MotionParameters, PoseParameters, PoseRequest, PoseTarget, PushUpParameters, Smoothness,
    Timing, WaveParams,
};
use std::fmt;
use tracing::warn;

/// `publish_hz` 允许范围
pub const PUBLISH_HZ_RANGE: (u32, u32) = (50, 1000);
/// `sleep_override` 允许范围（秒）
pub const SLEEP_OVERRIDE_RANGE: (f64, f64) = (0.001, 0.1);
/// `loop_repeats` 允许范围
pub const LOOP_REPEATS_RANGE: (u32, u32) = (1, 128);
/// 低于此 `sleep_rate` 给出提示
pub const SLEEP_RATE_ADVISORY: f64 = 0.002;
/// 低于此 `sleep_rate` 直接拒绝
pub const SLEEP_RATE_MIN: f64 = 0.001;
/// 相位折叠边界与步长
pub const PHASE_LIMIT: f64 = 2.0;
/// 姿态保持段最长时长（秒）
pub const MAX_POSE_HOLD_SECONDS: f64 = 600.0;
/// 姿态接近段最长时长（秒），即 `move_to_pose_base_time / velocity` 的上限
pub const MAX_POSE_MOVE_SECONDS: f64 = 60.0;
/// 接近段最少步数，保证首个采样是中立姿态、末个采样是目标姿态
pub const MIN_POSE_MOVE_STEPS: usize = 2;

/// 低周期限频规则：周期低于 `below` 时 `publish_hz` 不得超过 `max_publish_hz`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FastPeriodLimit {
    pub below: f64,
    pub max_publish_hz: u32,
}

/// 安全策略（不同控制模式的限值略有不同）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyPolicy {
    pub name: &'static str,
    /// 每轴 `|amplitude| + |offset|` 上限（弧度）
    pub amplitude_budget: f64,
    /// 周期硬区间，超出即拒绝
    pub period_hard: (f64, f64),
    /// 周期推荐区间，超出只提示
    pub period_soft: Option<(f64, f64)>,
    pub fast_period: Option<FastPeriodLimit>,
    /// 调用方未指定时使用的 BPM 上限
    pub default_bpm_limiter: f64,
}

impl SafetyPolicy {
    /// 连续振荡（`sin_euler`）
    pub const fn oscillation() -> Self {
        Self {
            name: "oscillation",
            amplitude_budget: 0.55,
            period_hard: (1.0, 16.0),
            period_soft: Some((1.0, 4.0)),
            fast_period: None,
            default_bpm_limiter: 50.0,
        }
    }

    /// roll-pitch-yaw 舞蹈
    pub const fn rollpitchyaw() -> Self {
        Self {
            name: "rollpitchyaw",
            amplitude_budget: 0.7,
            period_hard: (0.5, 16.0),
            period_soft: None,
            fast_period: Some(FastPeriodLimit {
                below: 1.0,
                max_publish_hz: 250,
            }),
            default_bpm_limiter: 60.0,
        }
    }

    /// 姿态
    pub const fn pose() -> Self {
        Self {
            name: "pose",
            amplitude_budget: 0.7,
            period_hard: (1.0, 16.0),
            period_soft: None,
            fast_period: None,
            default_bpm_limiter: 60.0,
        }
    }

    /// 振荡模式对应的策略
    pub const fn for_mode(mode: OscillationMode) -> Self {
        match mode {
            OscillationMode::Default | OscillationMode::RandDance => Self::oscillation(),
            OscillationMode::Dance => Self::rollpitchyaw(),
        }
    }
}

// ============================================================================
// 警告
// ============================================================================

/// 警告类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// 参数已被自动修正，按修正后的值执行
    AutoCorrected,
    /// 仅提示，不影响执行
    Advisory,
}

/// 非致命校验结果
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    BpmClamped { requested: f64, clamped: f64 },
    PhaseWrapped { axis: Axis, from: f64, to: f64 },
    PublishHzLowered { from: u32, to: u32, period: f64 },
    SleepOverrideActive { sleep_override: f64, loop_rate: f64 },
    LowSleepRate { sleep_rate: f64 },
    FastLoopRate { loop_rate: f64 },
    PeriodOutsideSoftBand { axis: Axis, period: f64, min: f64, max: f64 },
    IncompleteCycle { loop_repeats: u32, max_period: f64 },
}

impl ValidationWarning {
    pub fn kind(&self) -> WarningKind {
        match self {
            ValidationWarning::BpmClamped { .. }
            | ValidationWarning::PhaseWrapped { .. }
            | ValidationWarning::PublishHzLowered { .. } => WarningKind::AutoCorrected,
            ValidationWarning::SleepOverrideActive { .. }
            | ValidationWarning::LowSleepRate { .. }
            | ValidationWarning::FastLoopRate { .. }
            | ValidationWarning::PeriodOutsideSoftBand { .. }
            | ValidationWarning::IncompleteCycle { .. } => WarningKind::Advisory,
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::BpmClamped { requested, clamped } => {
                write!(f, "BPM {requested} above limiter, halved to {clamped}")
            },
            ValidationWarning::PhaseWrapped { axis, from, to } => {
                write!(f, "{axis} phase {from} outside (-2, 2), wrapped to {to}")
            },
            ValidationWarning::PublishHzLowered { from, to, period } => write!(
                f,
                "period {period} combined with publish_hz {from} is beyond the safety limiter, \
                 publish_hz lowered to {to}"
            ),
            ValidationWarning::SleepOverrideActive {
                sleep_override,
                loop_rate,
            } => write!(
                f,
                "sleep_override {sleep_override}s active, loop rate is {loop_rate:.4}s instead of one beat"
            ),
            ValidationWarning::LowSleepRate { sleep_rate } => write!(
                f,
                "low sleep_rate {sleep_rate:.5}s may cause control lag, recommended >= {SLEEP_RATE_ADVISORY}"
            ),
            ValidationWarning::FastLoopRate { loop_rate } => write!(
                f,
                "loop rate {loop_rate:.4}s < 1s, robot may move quickly and could damage itself"
            ),
            ValidationWarning::PeriodOutsideSoftBand {
                axis,
                period,
                min,
                max,
            } => write!(
                f,
                "{axis} period {period} outside recommended [{min}, {max}], motion may not be continuous"
            ),
            ValidationWarning::IncompleteCycle {
                loop_repeats,
                max_period,
            } => write!(
                f,
                "loop_repeats {loop_repeats} is not a multiple of max period {max_period}, \
                 motion may not complete a full cycle"
            ),
        }
    }
}

/// 校验结果：修正后的值 + 警告
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    pub value: T,
    pub warnings: Vec<ValidationWarning>,
}

impl<T> Validated<T> {
    /// 通过 tracing 输出所有警告
    pub fn log_warnings(&self) {
        for w in &self.warnings {
            match w.kind() {
                WarningKind::AutoCorrected => warn!("Auto-corrected: {}", w),
                WarningKind::Advisory => warn!("{}", w),
            }
        }
    }

    pub fn has_warning(&self, pred: impl Fn(&ValidationWarning) -> bool) -> bool {
        self.warnings.iter().any(pred)
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

// ============================================================================
// Plan
// ============================================================================

/// 校验后的定时参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingPlan {
    publish_hz: u32,
    loop_repeats: u32,
    pacing: Pacing,
    sleep_override: Option<f64>,
}

impl TimingPlan {
    pub fn publish_hz(&self) -> u32 {
        self.publish_hz
    }

    pub fn loop_repeats(&self) -> u32 {
        self.loop_repeats
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn sleep_override(&self) -> Option<f64> {
        self.sleep_override
    }

    /// 振荡 / 俯卧撑循环的总 tick 数
    pub fn total_ticks(&self) -> u64 {
        u64::from(self.publish_hz) * u64::from(self.loop_repeats)
    }
}

impl fmt::Display for TimingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  publish_hz:     {}", self.publish_hz)?;
        writeln!(f, "  bpm:            {}", self.pacing.bpm)?;
        match self.sleep_override {
            Some(s) => writeln!(f, "  sleep_rate:     {s} (override)")?,
            None => writeln!(f, "  sleep_rate:     {:.5}", self.pacing.sleep_rate)?,
        }
        writeln!(f, "  loop_rate:      {:.4} s/loop", self.pacing.loop_rate)?;
        writeln!(f, "  loop_repeats:   {}", self.loop_repeats)
    }
}

/// 校验后的振荡计划
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    timing: TimingPlan,
    wave: WaveParams,
    mode: OscillationMode,
    policy: SafetyPolicy,
}

impl MotionPlan {
    pub fn timing(&self) -> &TimingPlan {
        &self.timing
    }

    pub fn wave(&self) -> &WaveParams {
        &self.wave
    }

    pub fn mode(&self) -> OscillationMode {
        self.mode
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }
}

impl fmt::Display for MotionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sin_euler [{}] ({} policy)", self.mode, self.policy.name)?;
        write!(f, "{}", self.timing)?;
        writeln!(f, "  amplitude:      {:?}", self.wave.amplitude.as_array())?;
        writeln!(f, "  offset:         {:?}", self.wave.offset.as_array())?;
        writeln!(f, "  period:         {:?}", self.wave.period.as_array())?;
        writeln!(f, "  phase:          {:?}", self.wave.phase.as_array())?;
        writeln!(f, "  enabled:        {:?}", self.wave.enabled.as_array())?;
        writeln!(
            f,
            "  oscillator:     [{}, {}, {}]",
            self.wave.oscillator[Axis::Roll],
            self.wave.oscillator[Axis::Pitch],
            self.wave.oscillator[Axis::Yaw]
        )
    }
}

/// 校验后的姿态计划
#[derive(Debug, Clone, PartialEq)]
pub struct PosePlan {
    timing: TimingPlan,
    pose: PoseParameters,
    target: PoseTarget,
    move_step_qty: usize,
    hold_ticks: usize,
    hold_duration: f64,
    delay_start: f64,
}

impl PosePlan {
    pub fn timing(&self) -> &TimingPlan {
        &self.timing
    }

    pub fn pose(&self) -> &PoseParameters {
        &self.pose
    }

    pub fn target(&self) -> PoseTarget {
        self.target
    }

    /// 抖动幅度（平滑时为 0）
    pub fn smoothness(&self) -> f64 {
        self.pose.smoothness.value()
    }

    /// 接近阶段是否叠加噪声
    pub fn shaky(&self) -> bool {
        self.pose.smoothness == Smoothness::Shaky
    }

    /// 接近（以及返回）阶段的步数
    pub fn move_step_qty(&self) -> usize {
        self.move_step_qty
    }

    pub fn hold_ticks(&self) -> usize {
        self.hold_ticks
    }

    /// 保持时长（秒）
    pub fn hold_duration(&self) -> f64 {
        self.hold_duration
    }

    pub fn delay_start(&self) -> f64 {
        self.delay_start
    }

    /// 单次重复的 tick 数
    pub fn ticks_per_repeat(&self) -> usize {
        2 * self.move_step_qty + self.hold_ticks
    }
}

impl fmt::Display for PosePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pose")?;
        write!(f, "{}", self.timing)?;
        writeln!(
            f,
            "  pose:           roll={} pitch={} yaw={} body_height={}",
            self.pose.roll, self.pose.pitch, self.pose.yaw, self.pose.body_height
        )?;
        writeln!(
            f,
            "  target:         {:?} height {:.3}",
            self.target.euler.as_array(),
            self.target.body_height
        )?;
        writeln!(
            f,
            "  velocity:       {} ({} steps)",
            self.pose.velocity, self.move_step_qty
        )?;
        writeln!(
            f,
            "  hold:           {:.3} s ({} ticks)",
            self.hold_duration, self.hold_ticks
        )?;
        writeln!(f, "  smoothness:     {}", self.pose.smoothness)?;
        writeln!(f, "  delay_start:    {} s", self.delay_start)
    }
}

/// 校验后的俯卧撑计划
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PushUpPlan {
    timing: TimingPlan,
}

impl PushUpPlan {
    pub fn timing(&self) -> &TimingPlan {
        &self.timing
    }
}

impl fmt::Display for PushUpPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "push_up")?;
        write!(f, "{}", self.timing)
    }
}

// ============================================================================
// 检查函数
// ============================================================================

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFiniteParameter { field })
    }
}

fn check_axes_finite(field: &'static str, values: &AxisArray<f64>) -> Result<(), ConfigError> {
    values.iter().try_for_each(|&v| check_finite(field, v))
}

fn check_timing_finite(timing: &Timing) -> Result<(), ConfigError> {
    check_finite("bpm", timing.bpm)?;
    if let Some(limiter) = timing.bpm_limiter {
        check_finite("bpm_limiter", limiter)?;
    }
    if let Some(s) = timing.sleep_override {
        check_finite("sleep_override", s)?;
    }
    Ok(())
}

fn check_publish_hz(hz: u32) -> Result<(), ConfigError> {
    let (min, max) = PUBLISH_HZ_RANGE;
    if (min..=max).contains(&hz) {
        Ok(())
    } else {
        Err(ConfigError::PublishHzOutOfRange { hz, min, max })
    }
}

fn check_sleep_override(sleep_override: Option<f64>) -> Result<(), ConfigError> {
    let (min, max) = SLEEP_OVERRIDE_RANGE;
    match sleep_override {
        Some(value) if !(min..=max).contains(&value) => {
            Err(ConfigError::SleepOverrideOutOfRange { value, min, max })
        },
        _ => Ok(()),
    }
}

fn check_loop_repeats(repeats: u32) -> Result<(), ConfigError> {
    let (min, max) = LOOP_REPEATS_RANGE;
    if (min..=max).contains(&repeats) {
        Ok(())
    } else {
        Err(ConfigError::LoopRepeatsOutOfRange { repeats, min, max })
    }
}

/// 相位折叠到 (-2, 2)，步长 2
pub fn wrap_phase(phase: f64) -> f64 {
    let mut p = phase;
    while p >= PHASE_LIMIT {
        p -= PHASE_LIMIT;
    }
    while p <= -PHASE_LIMIT {
        p += PHASE_LIMIT;
    }
    p
}

/// 推导定时参数（BPM 限幅、sleep_override、sleep_rate / loop_rate 检查）
fn resolve_timing(
    timing: &Timing,
    publish_hz: u32,
    policy: &SafetyPolicy,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<TimingPlan, ConfigError> {
    let limiter = timing.bpm_limiter.unwrap_or(policy.default_bpm_limiter);
    let mut pacing = derive_pacing(timing.bpm, publish_hz, limiter)?;
    if pacing.bpm != timing.bpm {
        warnings.push(ValidationWarning::BpmClamped {
            requested: timing.bpm,
            clamped: pacing.bpm,
        });
    }

    if let Some(s) = timing.sleep_override {
        pacing = pacing.with_sleep_override(s, publish_hz);
        warnings.push(ValidationWarning::SleepOverrideActive {
            sleep_override: s,
            loop_rate: pacing.loop_rate,
        });
    }

    if pacing.sleep_rate < SLEEP_RATE_MIN {
        return Err(ConfigError::SleepRateTooLow {
            sleep_rate: pacing.sleep_rate,
            min: SLEEP_RATE_MIN,
        });
    }
    if pacing.sleep_rate < SLEEP_RATE_ADVISORY {
        warnings.push(ValidationWarning::LowSleepRate {
            sleep_rate: pacing.sleep_rate,
        });
    }
    if pacing.loop_rate < 1.0 {
        warnings.push(ValidationWarning::FastLoopRate {
            loop_rate: pacing.loop_rate,
        });
    }

    Ok(TimingPlan {
        publish_hz,
        loop_repeats: timing.loop_repeats,
        pacing,
        sleep_override: timing.sleep_override,
    })
}

/// 周期区间、振幅预算、相位折叠（不涉及 `publish_hz`）
fn check_wave(
    wave: &WaveParams,
    policy: &SafetyPolicy,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<WaveParams, ConfigError> {
    check_axes_finite("amplitude", &wave.amplitude)?;
    check_axes_finite("offset", &wave.offset)?;
    check_axes_finite("period", &wave.period)?;
    check_axes_finite("phase", &wave.phase)?;

    let (hard_min, hard_max) = policy.period_hard;
    for axis in Axis::ALL {
        let period = wave.period[axis];
        if period < hard_min || period > hard_max {
            return Err(ConfigError::PeriodOutOfRange {
                axis,
                period,
                min: hard_min,
                max: hard_max,
            });
        }
        if let Some((min, max)) = policy.period_soft
            && (period < min || period > max)
        {
            warnings.push(ValidationWarning::PeriodOutsideSoftBand {
                axis,
                period,
                min,
                max,
            });
        }
    }

    for axis in Axis::ALL {
        let amplitude = wave.amplitude[axis];
        let offset = wave.offset[axis];
        if amplitude.abs() + offset.abs() > policy.amplitude_budget {
            return Err(ConfigError::AmplitudeBudgetExceeded {
                axis,
                amplitude,
                offset,
                budget: policy.amplitude_budget,
            });
        }
    }

    let phase = wave.phase.map_with_axis(|axis, from| {
        let to = wrap_phase(from);
        if to != from {
            warnings.push(ValidationWarning::PhaseWrapped { axis, from, to });
        }
        to
    });

    Ok(WaveParams {
        phase,
        ..wave.clone()
    })
}

/// 校验振荡参数
pub fn validate_motion(
    params: &MotionParameters,
    policy: &SafetyPolicy,
) -> Result<Validated<MotionPlan>, ConfigError> {
    let timing = &params.timing;
    let mut warnings = Vec::new();

    check_timing_finite(timing)?;
    check_publish_hz(timing.publish_hz)?;
    check_sleep_override(timing.sleep_override)?;

    // 低周期 + 高频率：自动降频（包括舞蹈模式重抽样可能产生的周期）
    let mut publish_hz = timing.publish_hz;
    if let Some(limit) = policy.fast_period {
        let mut fastest = params
            .wave
            .period
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if let Some(reroll_min) = params.mode.min_reroll_period() {
            fastest = fastest.min(reroll_min);
        }
        if fastest < limit.below && publish_hz > limit.max_publish_hz {
            warnings.push(ValidationWarning::PublishHzLowered {
                from: publish_hz,
                to: limit.max_publish_hz,
                period: fastest,
            });
            publish_hz = limit.max_publish_hz;
        }
    }

    let wave = check_wave(&params.wave, policy, &mut warnings)?;

    check_loop_repeats(timing.loop_repeats)?;
    let max_period = wave.period.max();
    let cycles = f64::from(timing.loop_repeats) / max_period;
    if (cycles - cycles.round()).abs() > 1e-9 {
        warnings.push(ValidationWarning::IncompleteCycle {
            loop_repeats: timing.loop_repeats,
            max_period,
        });
    }

    let timing = resolve_timing(timing, publish_hz, policy, &mut warnings)?;

    Ok(Validated {
        value: MotionPlan {
            timing,
            wave,
            mode: params.mode,
            policy: *policy,
        },
        warnings,
    })
}

/// 校验舞蹈模式重抽样得到的新波形（`publish_hz` 固定，不能再自动降频）
pub fn validate_wave(
    wave: &WaveParams,
    policy: &SafetyPolicy,
    publish_hz: u32,
) -> Result<Validated<WaveParams>, ConfigError> {
    let mut warnings = Vec::new();
    let wave = check_wave(wave, policy, &mut warnings)?;

    if let Some(limit) = policy.fast_period {
        for axis in Axis::ALL {
            let period = wave.period[axis];
            if period < limit.below && publish_hz > limit.max_publish_hz {
                return Err(ConfigError::PeriodTooFastForRate {
                    axis,
                    period,
                    publish_hz,
                    ceiling: limit.max_publish_hz,
                });
            }
        }
    }

    Ok(Validated {
        value: wave,
        warnings,
    })
}

/// 校验姿态请求
///
/// `default_time_signature` 在请求未指定拍号时使用。
pub fn validate_pose(
    request: &PoseRequest,
    policy: &SafetyPolicy,
    default_time_signature: u32,
) -> Result<Validated<PosePlan>, ConfigError> {
    let timing = &request.timing;
    let mut warnings = Vec::new();

    check_timing_finite(timing)?;
    check_finite("move_to_pose_base_time", request.move_to_pose_base_time)?;
    check_finite("delay_start", request.delay_start)?;
    if let Some(bars) = request.bars {
        check_finite("bars", bars)?;
    }

    check_publish_hz(timing.publish_hz)?;
    check_sleep_override(timing.sleep_override)?;

    let target = request.pose.target();
    let smoothness = request.pose.smoothness.value();
    for axis in Axis::ALL {
        let amplitude = target.euler[axis];
        if amplitude.abs() + smoothness > policy.amplitude_budget {
            return Err(ConfigError::AmplitudeBudgetExceeded {
                axis,
                amplitude,
                offset: smoothness,
                budget: policy.amplitude_budget,
            });
        }
    }

    check_loop_repeats(timing.loop_repeats)?;

    if request.move_to_pose_base_time <= 0.0 {
        return Err(ConfigError::InvalidDuration {
            field: "move_to_pose_base_time",
            value: request.move_to_pose_base_time,
        });
    }
    if request.delay_start < 0.0 {
        return Err(ConfigError::InvalidDuration {
            field: "delay_start",
            value: request.delay_start,
        });
    }

    let timing_plan = resolve_timing(timing, timing.publish_hz, policy, &mut warnings)?;
    let hz = f64::from(timing_plan.publish_hz);

    let hold_duration = match request.bars {
        Some(bars) => {
            if bars <= 0.0 {
                return Err(ConfigError::InvalidBars(bars));
            }
            let time_signature = request.time_signature.unwrap_or(default_time_signature);
            if time_signature == 0 {
                return Err(ConfigError::InvalidTimeSignature(time_signature));
            }
            (timing_plan.pacing.bpm / 60.0) * f64::from(time_signature) * bars
        },
        None => request.pose.pose_duration.value(),
    };

    if hold_duration > MAX_POSE_HOLD_SECONDS {
        return Err(ConfigError::InvalidDuration {
            field: if request.bars.is_some() { "bars" } else { "pose_duration" },
            value: hold_duration,
        });
    }

    let move_seconds = request.move_to_pose_base_time / request.pose.velocity.value();
    let move_step_qty = (hz * move_seconds).floor() as usize;
    if move_seconds > MAX_POSE_MOVE_SECONDS || move_step_qty < MIN_POSE_MOVE_STEPS {
        return Err(ConfigError::InvalidDuration {
            field: "move_to_pose_base_time",
            value: request.move_to_pose_base_time,
        });
    }
    let hold_ticks = (hz * hold_duration).floor() as usize;

    Ok(Validated {
        value: PosePlan {
            timing: timing_plan,
            pose: request.pose,
            target,
            move_step_qty,
            hold_ticks,
            hold_duration,
            delay_start: request.delay_start,
        },
        warnings,
    })
}

/// 校验俯卧撑参数
pub fn validate_push_up(
    params: &PushUpParameters,
    policy: &SafetyPolicy,
) -> Result<Validated<PushUpPlan>, ConfigError> {
    let timing = &params.timing;
    let mut warnings = Vec::new();

    check_timing_finite(timing)?;
    check_publish_hz(timing.publish_hz)?;
    check_sleep_override(timing.sleep_override)?;
    check_loop_repeats(timing.loop_repeats)?;
    let timing = resolve_timing(timing, timing.publish_hz, policy, &mut warnings)?;

    Ok(Validated {
        value: PushUpPlan { timing },
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{PoseVelocity, RollPose};

    fn motion(amplitude: [f64; 3], period: [f64; 3]) -> MotionParameters {
        let mut params = MotionParameters::default();
        params.timing.publish_hz = 200;
        params.timing.bpm = 60.0;
        params.timing.bpm_limiter = Some(60.0);
        params.timing.loop_repeats = 1;
        params.wave.amplitude = amplitude.into();
        params.wave.period = period.into();
        params
    }

    #[test]
    fn test_reference_scenario_passes() {
        let validated =
            validate_motion(&motion([0.5, 0.5, 0.4], [1.0; 3]), &SafetyPolicy::oscillation())
                .unwrap();
        let plan = &validated.value;
        assert!((plan.timing().pacing().sleep_rate - 0.005).abs() < 1e-12);
        assert!((plan.timing().pacing().loop_rate - 1.0).abs() < 1e-12);
        assert_eq!(plan.timing().total_ticks(), 200);
        assert!(validated.warnings.is_empty(), "{:?}", validated.warnings);
    }

    #[test]
    fn test_publish_hz_out_of_range() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.publish_hz = 49;
        assert!(matches!(
            validate_motion(&params, &SafetyPolicy::oscillation()),
            Err(ConfigError::PublishHzOutOfRange { hz: 49, .. })
        ));
        params.timing.publish_hz = 1001;
        assert!(validate_motion(&params, &SafetyPolicy::oscillation()).is_err());
    }

    #[test]
    fn test_sleep_override_range_and_advisory() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.sleep_override = Some(0.5);
        assert!(matches!(
            validate_motion(&params, &SafetyPolicy::oscillation()),
            Err(ConfigError::SleepOverrideOutOfRange { .. })
        ));

        params.timing.sleep_override = Some(0.01);
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert_eq!(validated.value.timing().pacing().sleep_rate, 0.01);
        assert!(
            validated.has_warning(|w| matches!(w, ValidationWarning::SleepOverrideActive { .. }))
        );
    }

    #[test]
    fn test_budget_violation_is_fatal() {
        let mut params = motion([0.5, 0.5, 0.4], [1.0; 3]);
        params.wave.offset[Axis::Roll] = 0.1;
        let err = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::AmplitudeBudgetExceeded {
                axis: Axis::Roll,
                ..
            }
        ));
        // 同样的参数在 rollpitchyaw 策略下（预算 0.7）可以通过
        assert!(validate_motion(&params, &SafetyPolicy::rollpitchyaw()).is_ok());
    }

    #[test]
    fn test_negative_amplitude_uses_absolute_value() {
        let params = motion([-0.56, 0.0, 0.0], [1.0; 3]);
        assert!(validate_motion(&params, &SafetyPolicy::oscillation()).is_err());
    }

    #[test]
    fn test_period_bands() {
        let params = motion([0.5; 3], [0.5, 1.0, 1.0]);
        assert!(matches!(
            validate_motion(&params, &SafetyPolicy::oscillation()),
            Err(ConfigError::PeriodOutOfRange {
                axis: Axis::Roll,
                ..
            })
        ));

        let mut params = motion([0.5; 3], [8.0, 1.0, 1.0]);
        params.timing.loop_repeats = 8;
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.warnings[0].kind(), WarningKind::Advisory);
        assert!(matches!(
            validated.warnings[0],
            ValidationWarning::PeriodOutsideSoftBand { axis: Axis::Roll, .. }
        ));
    }

    #[test]
    fn test_fast_period_lowers_publish_hz() {
        let mut params = motion([0.4; 3], [0.5, 1.0, 1.0]);
        params.timing.publish_hz = 500;
        let validated = validate_motion(&params, &SafetyPolicy::rollpitchyaw()).unwrap();
        assert_eq!(validated.value.timing().publish_hz(), 250);
        // sleep_rate 按新的频率重新推导
        assert!((validated.value.timing().pacing().sleep_rate - 0.004).abs() < 1e-12);
        assert!(validated.has_warning(|w| w.kind() == WarningKind::AutoCorrected
            && matches!(w, ValidationWarning::PublishHzLowered { from: 500, to: 250, .. })));
    }

    #[test]
    fn test_dance_mode_lowers_publish_hz_up_front() {
        let mut params = motion([0.4; 3], [1.0; 3]);
        params.mode = OscillationMode::Dance;
        params.timing.publish_hz = 400;
        let validated = validate_motion(&params, &SafetyPolicy::rollpitchyaw()).unwrap();
        assert_eq!(validated.value.timing().publish_hz(), 250);
    }

    #[test]
    fn test_phase_wrapping() {
        assert_eq!(wrap_phase(0.5), 0.5);
        assert_eq!(wrap_phase(2.0), 0.0);
        assert_eq!(wrap_phase(5.5), 1.5);
        assert_eq!(wrap_phase(-2.0), 0.0);
        assert_eq!(wrap_phase(-3.0), -1.0);

        let mut params = motion([0.5; 3], [1.0; 3]);
        params.wave.phase[Axis::Yaw] = 3.0;
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert_eq!(validated.value.wave().phase[Axis::Yaw], 1.0);
        assert!(validated.has_warning(|w| matches!(
            w,
            ValidationWarning::PhaseWrapped { axis: Axis::Yaw, .. }
        )));
        // 调用方的数据不被修改
        assert_eq!(params.wave.phase[Axis::Yaw], 3.0);
    }

    #[test]
    fn test_loop_repeats_checks() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.loop_repeats = 0;
        assert!(matches!(
            validate_motion(&params, &SafetyPolicy::oscillation()),
            Err(ConfigError::LoopRepeatsOutOfRange { repeats: 0, .. })
        ));
        params.timing.loop_repeats = 129;
        assert!(validate_motion(&params, &SafetyPolicy::oscillation()).is_err());

        let mut params = motion([0.5; 3], [2.0, 1.0, 1.0]);
        params.timing.loop_repeats = 3;
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert!(validated.has_warning(|w| matches!(
            w,
            ValidationWarning::IncompleteCycle {
                loop_repeats: 3,
                ..
            }
        )));
    }

    #[test]
    fn test_sleep_rate_limits() {
        // 1000Hz @ 50bpm: sleep_rate 0.0012 → 提示
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.publish_hz = 1000;
        params.timing.bpm = 50.0;
        params.timing.bpm_limiter = Some(50.0);
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert!(validated.has_warning(|w| matches!(w, ValidationWarning::LowSleepRate { .. })));

        // 1000Hz @ 60bpm: sleep_rate 0.001 恰好在下限上
        params.timing.bpm = 60.0;
        params.timing.bpm_limiter = Some(60.0);
        assert!(validate_motion(&params, &SafetyPolicy::oscillation()).is_ok());

        // 1000Hz @ 120bpm, 上限 120: sleep_rate 0.0005 → 拒绝
        params.timing.bpm = 120.0;
        params.timing.bpm_limiter = Some(120.0);
        assert!(matches!(
            validate_motion(&params, &SafetyPolicy::oscillation()),
            Err(ConfigError::SleepRateTooLow { .. })
        ));
    }

    #[test]
    fn test_fast_loop_rate_is_advisory() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.sleep_override = Some(0.001);
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert!(validated.has_warning(|w| matches!(w, ValidationWarning::FastLoopRate { .. })));
    }

    #[test]
    fn test_bpm_clamp_warning() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.timing.bpm = 240.0;
        let validated = validate_motion(&params, &SafetyPolicy::oscillation()).unwrap();
        assert_eq!(validated.value.timing().pacing().bpm, 60.0);
        assert!(validated.has_warning(|w| *w
            == ValidationWarning::BpmClamped {
                requested: 240.0,
                clamped: 60.0
            }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut params = motion([0.5; 3], [1.0; 3]);
        params.wave.amplitude[Axis::Pitch] = f64::NAN;
        assert_eq!(
            validate_motion(&params, &SafetyPolicy::oscillation()).unwrap_err(),
            ConfigError::NonFiniteParameter { field: "amplitude" }
        );
    }

    #[test]
    fn test_validate_wave_rejects_fast_period_at_high_rate() {
        let mut wave = WaveParams::default();
        wave.period = AxisArray::new([0.5, 1.0, 1.0]);
        wave.amplitude = AxisArray::splat(0.4);
        assert!(validate_wave(&wave, &SafetyPolicy::rollpitchyaw(), 250).is_ok());
        assert!(matches!(
            validate_wave(&wave, &SafetyPolicy::rollpitchyaw(), 300),
            Err(ConfigError::PeriodTooFastForRate { .. })
        ));
    }

    #[test]
    fn test_validate_pose_lookup_and_steps() {
        let mut request = PoseRequest::default();
        request.pose.roll = RollPose::Left;
        let validated = validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap();
        let plan = validated.value;
        assert_eq!(plan.target().euler[Axis::Roll], -0.5);
        assert_eq!(plan.move_step_qty(), 200);
        assert_eq!(plan.hold_ticks(), 800);
        assert_eq!(plan.ticks_per_repeat(), 1200);
        assert!(!plan.shaky());

        request.pose.velocity = PoseVelocity::Fast;
        let plan = validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap().value;
        assert_eq!(plan.move_step_qty(), 100);
    }

    #[test]
    fn test_validate_pose_bars_duration() {
        let request = PoseRequest {
            bars: Some(2.0),
            timing: Timing {
                bpm: 120.0,
                ..Timing::default()
            },
            ..PoseRequest::default()
        };
        // 120bpm 被限幅到 60 → (60/60) * 4 * 2 = 8 秒
        let plan = validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap().value;
        assert_eq!(plan.hold_duration(), 8.0);
        assert_eq!(plan.hold_ticks(), 1600);

        let request = PoseRequest {
            bars: Some(0.0),
            ..PoseRequest::default()
        };
        assert_eq!(
            validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap_err(),
            ConfigError::InvalidBars(0.0)
        );
    }

    #[test]
    fn test_validate_pose_rejects_bad_durations() {
        let request = PoseRequest {
            delay_start: -1.0,
            ..PoseRequest::default()
        };
        assert!(matches!(
            validate_pose(&request, &SafetyPolicy::pose(), 4),
            Err(ConfigError::InvalidDuration {
                field: "delay_start",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_pose_bounds_hold_duration() {
        let request = PoseRequest {
            timing: Timing {
                publish_hz: 1000,
                ..Timing::default()
            },
            bars: Some(1e6),
            ..PoseRequest::default()
        };
        assert!(matches!(
            validate_pose(&request, &SafetyPolicy::pose(), 4),
            Err(ConfigError::InvalidDuration { field: "bars", .. })
        ));

        // 60bpm, 4/4: 150 小节正好 600 秒
        let request = PoseRequest {
            bars: Some(150.0),
            ..PoseRequest::default()
        };
        let plan = validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap().value;
        assert_eq!(plan.hold_duration(), MAX_POSE_HOLD_SECONDS);
    }

    #[test]
    fn test_validate_pose_bounds_move_steps() {
        let mut request = PoseRequest {
            move_to_pose_base_time: 0.001,
            ..PoseRequest::default()
        };
        request.pose.roll = RollPose::Left;
        assert!(matches!(
            validate_pose(&request, &SafetyPolicy::pose(), 4),
            Err(ConfigError::InvalidDuration {
                field: "move_to_pose_base_time",
                ..
            })
        ));

        // 200Hz * 0.005s = 1 步，接近段到不了目标
        request.move_to_pose_base_time = 0.005;
        assert!(validate_pose(&request, &SafetyPolicy::pose(), 4).is_err());

        request.move_to_pose_base_time = 0.01;
        let plan = validate_pose(&request, &SafetyPolicy::pose(), 4).unwrap().value;
        assert_eq!(plan.move_step_qty(), MIN_POSE_MOVE_STEPS);

        request.move_to_pose_base_time = 120.0;
        assert!(matches!(
            validate_pose(&request, &SafetyPolicy::pose(), 4),
            Err(ConfigError::InvalidDuration {
                field: "move_to_pose_base_time",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_push_up() {
        let params = PushUpParameters::default();
        let plan = validate_push_up(&params, &SafetyPolicy::oscillation()).unwrap().value;
        // 60bpm 超过默认上限 50 → 30bpm
        assert_eq!(plan.timing().pacing().bpm, 30.0);
        assert_eq!(plan.timing().total_ticks(), 200);
    }
}
