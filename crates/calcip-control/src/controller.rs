//! 会话控制器
//!
//! [`MotionController`] 持有连接、时钟与指令对象，提供：
//! - 会话生命周期：`connect` → `recover_control` → 控制循环 → `terminate_control`
//! - 三种控制循环：连续振荡、三段式姿态、俯卧撑
//! - 截止时间调度（锚点不随超时重置，单个 tick 的抖动不会累积）
//! - 容错：允许最多连续 5 次发送失败
//! - 停止标志：只在 tick 边界检测，返回 [`ControlError::Interrupted`]
//!
//! # 安全网
//!
//! 控制器被 drop 时，如果已经发送过运动指令但没有执行 `terminate_control`，
//! 会自动执行关停序列（FORCE_STAND → STAND_DOWN → IDLE → DAMPING）。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use calcip_control::{MotionController, MotionParameters, Verbosity};
//! use calcip_transport::{ConnectionPreset, UdpConnection};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let conn = UdpConnection::new(&ConnectionPreset::HighWifi.settings())?;
//! let mut controller = MotionController::new(conn).with_verbosity(Verbosity::Minimal);
//!
//! controller.connect()?;
//! controller.recover_control()?;
//! let report = controller.sin_euler_ctrl(&MotionParameters::default())?;
//! println!("{} ticks, {} overruns", report.ticks, report.overruns);
//! controller.terminate_control()?;
//! # Ok(())
//! # }
//! ```

use crate::choreography::{Choreographer, LoopState};
use crate::config::Routine;
use crate::error::{ConfigError, ControlError};
use crate::pacing::{Clock, DeadlineScheduler, MonotonicClock};
use crate::params::{DEFAULT_TIME_SIGNATURE, MotionParameters, PoseRequest, PushUpParameters};
use crate::pose::{PoseSequencer, Setpoint};
use crate::pushup::apply_push_up;
use crate::safety::{
    MotionPlan, PosePlan, PushUpPlan, SafetyPolicy, validate_motion, validate_pose,
    validate_push_up,
};
use calcip_protocol::{HighCmd, HighState, MotorModeHigh, byte_print, decode_sn, decode_version};
use calcip_transport::{Connection, TransportError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 连接建立后的等待时间
pub const CONNECT_SETTLE: Duration = Duration::from_millis(500);

/// 允许的连续发送失败次数
pub const MAX_SEND_FAILURES: u32 = 5;

/// 恢复序列：(模式, 等待时间)
pub const RECOVERY_SEQUENCE: [(MotorModeHigh, Duration); 2] = [
    (MotorModeHigh::Recovery, Duration::from_secs(1)),
    (MotorModeHigh::ForceStand, Duration::from_secs(1)),
];

/// 关停序列：(模式, 等待时间)
pub const SHUTDOWN_SEQUENCE: [(MotorModeHigh, Duration); 4] = [
    (MotorModeHigh::ForceStand, Duration::from_secs(1)),
    (MotorModeHigh::StandDown, Duration::from_secs(1)),
    (MotorModeHigh::Idle, Duration::from_millis(500)),
    (MotorModeHigh::Damping, Duration::from_secs(1)),
];

/// 逐 tick 诊断输出级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// 不输出逐 tick 日志
    None,
    /// 每个逻辑循环一次（含实测与目标 loop rate）
    #[default]
    Minimal,
    /// 另外每 10 个 tick 一次，并输出参数状态块
    All,
}

/// 单次控制循环的统计
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopReport {
    /// 发出的 tick 数（包括发送失败的 tick）
    pub ticks: u64,
    /// 超过截止时间的 tick 数
    pub overruns: u64,
    pub elapsed: Duration,
    pub last_setpoint: Option<Setpoint>,
    pub rerolls_applied: u32,
    pub rerolls_rejected: u32,
    /// 发送失败总数
    pub send_failures: u32,
}

/// 连续发送失败计数
#[derive(Debug, Default)]
struct SendGuard {
    consecutive: u32,
    total: u32,
}

/// 会话控制器
pub struct MotionController<C: Connection, K: Clock = MonotonicClock> {
    conn: C,
    clock: K,
    cmd: HighCmd,
    rng: StdRng,
    verbosity: Verbosity,
    time_signature: u32,
    stop: Arc<AtomicBool>,
    /// 已经向机器人发送过指令
    engaged: bool,
    terminated: bool,
}

impl<C: Connection> MotionController<C, MonotonicClock> {
    /// 使用系统单调时钟创建控制器
    pub fn new(conn: C) -> Self {
        Self::with_clock(conn, MonotonicClock::new())
    }
}

impl<C: Connection, K: Clock> MotionController<C, K> {
    pub fn with_clock(conn: C, clock: K) -> Self {
        Self {
            conn,
            clock,
            cmd: HighCmd::default(),
            rng: StdRng::from_entropy(),
            verbosity: Verbosity::default(),
            time_signature: DEFAULT_TIME_SIGNATURE,
            stop: Arc::new(AtomicBool::new(false)),
            engaged: false,
            terminated: false,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// 固定随机种子（舞蹈重抽样、姿态抖动可复现）
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// 拍号（姿态请求未指定时使用）
    pub fn with_time_signature(mut self, time_signature: u32) -> Self {
        self.time_signature = time_signature;
        self
    }

    /// 共享停止标志（例如交给 Ctrl-C 处理函数）
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// 使用外部的停止标志
    pub fn set_stop_flag(&mut self, stop: Arc<AtomicBool>) {
        self.stop = stop;
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn time_signature(&self) -> u32 {
        self.time_signature
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// 最近一次发送的指令
    pub fn command(&self) -> &HighCmd {
        &self.cmd
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn ensure_active(&self) -> Result<(), ControlError> {
        if self.terminated {
            return Err(ControlError::AlreadyTerminated);
        }
        Ok(())
    }

    fn check_stop(&self) -> Result<(), ControlError> {
        if self.stop.load(Ordering::Relaxed) {
            warn!("Stop requested, leaving control loop at tick boundary");
            return Err(ControlError::Interrupted);
        }
        Ok(())
    }

    /// 发送当前指令（单次）
    fn send_once(&mut self) -> Result<(), TransportError> {
        self.engaged = true;
        self.conn.send_cmd(&self.cmd)
    }

    /// 控制循环中的发送：偶发失败只跳过本帧
    fn send_tick(&mut self, guard: &mut SendGuard) -> Result<(), ControlError> {
        match self.send_once() {
            Ok(()) => {
                guard.consecutive = 0;
                Ok(())
            },
            Err(e) => {
                guard.consecutive += 1;
                guard.total += 1;
                if guard.consecutive > MAX_SEND_FAILURES {
                    error!(
                        "Consecutive send failures ({}): {}. Aborting control loop.",
                        guard.consecutive, e
                    );
                    return Err(ControlError::ConsecutiveFailures {
                        count: guard.consecutive,
                        last_error: Box::new(e),
                    });
                }
                warn!("Transient send error ({}): {}, frame dropped", guard.consecutive, e);
                Ok(())
            },
        }
    }

    /// 逐 tick 诊断输出
    fn log_tick(
        &self,
        tick: u64,
        publish_hz: u32,
        setpoint: &Setpoint,
        loop_mark: &mut Duration,
        target_loop_rate: f64,
    ) {
        let hz = u64::from(publish_hz);
        if self.verbosity != Verbosity::None && tick % hz == 0 {
            let now = self.clock.now();
            let real = now.saturating_sub(*loop_mark);
            *loop_mark = now;
            info!(
                "TimeStep: {:05}  euler: {:?}  body_height: {:6.3}  (real LR: {:.4} / target LR: {:.4} s)",
                tick,
                setpoint.euler.as_array(),
                setpoint.body_height,
                real.as_secs_f64(),
                target_loop_rate
            );
        } else if self.verbosity == Verbosity::All && tick % 10 == 0 {
            info!(
                "TimeStep: {:05}  euler: {:?}  body_height: {:6.3}",
                tick,
                setpoint.euler.as_array(),
                setpoint.body_height
            );
        } else {
            trace!("TimeStep: {:05}  euler: {:?}", tick, setpoint.euler.as_array());
        }
    }

    // ========================================================================
    // 会话生命周期
    // ========================================================================

    /// 建立会话：开始接收，发送一条空指令让机器人学习回复地址，等待 0.5 秒
    pub fn connect(&mut self) -> Result<(), ControlError> {
        self.ensure_active()?;
        self.conn.start_receive()?;
        self.cmd = HighCmd::default();
        // IDLE 空指令不算运动，不触发 drop 时的关停序列
        self.conn.send_cmd(&self.cmd)?;
        self.clock.sleep(CONNECT_SETTLE);
        info!("Motion controller connected");
        Ok(())
    }

    /// 读取并解析所有已接收的状态报文，返回最后一条
    ///
    /// 只用于诊断输出，不参与控制决策。无法解析的报文记录后跳过。
    pub fn parse_data(&mut self) -> Result<Option<HighState>, ControlError> {
        let packets = self.conn.get_data()?;
        debug!("Parsing {} state packet(s)", packets.len());

        let mut last = None;
        for (i, packet) in packets.iter().enumerate() {
            let state = match HighState::parse(packet) {
                Ok(state) => state,
                Err(e) => {
                    warn!("Skipping malformed state packet: {}", e);
                    continue;
                },
            };
            if i == 0 && self.verbosity == Verbosity::All {
                log_state(&state);
            }
            last = Some(state);
        }
        Ok(last)
    }

    /// 恢复控制：RECOVERY，然后 FORCE_STAND（姿态归零）
    pub fn recover_control(&mut self) -> Result<(), ControlError> {
        self.ensure_active()?;
        for (mode, settle) in RECOVERY_SEQUENCE {
            info!(">> Executing: {:?}", mode);
            if mode == MotorModeHigh::ForceStand {
                self.cmd.set_pose(mode, [0.0; 3], 0.0);
            } else {
                self.cmd.mode = mode;
            }
            self.send_once()?;
            self.clock.sleep(settle);
        }
        Ok(())
    }

    /// 关停序列：FORCE_STAND → STAND_DOWN → IDLE → DAMPING
    ///
    /// 每一步都会执行（包括等待时间），即使前面的步骤发送失败。
    /// 有失败步骤时返回 [`ControlError::Shutdown`]。
    pub fn terminate_control(&mut self) -> Result<(), ControlError> {
        self.ensure_active()?;
        self.terminated = true;

        let mut failed_steps = Vec::new();
        let mut last_error = None;
        for (mode, settle) in SHUTDOWN_SEQUENCE {
            info!(">> Executing: {:?}", mode);
            if mode == MotorModeHigh::ForceStand {
                self.cmd.set_pose(mode, [0.0; 3], 0.0);
            } else {
                self.cmd.mode = mode;
            }
            if let Err(e) = self.send_once() {
                error!("Shutdown step {:?} failed: {}. Continuing.", mode, e);
                failed_steps.push(mode);
                last_error = Some(e);
            }
            self.clock.sleep(settle);
        }

        match last_error {
            None => {
                info!("Shutdown sequence complete");
                Ok(())
            },
            Some(e) => Err(ControlError::Shutdown {
                failed_steps,
                last_error: Box::new(e),
            }),
        }
    }

    // ========================================================================
    // 连续振荡
    // ========================================================================

    /// 校验参数并运行连续振荡（`sin_euler`）
    ///
    /// 校验失败时不发送任何指令。
    pub fn sin_euler_ctrl(&mut self, params: &MotionParameters) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let validated = validate_motion(params, &SafetyPolicy::for_mode(params.mode))?;
        validated.log_warnings();
        self.execute_motion(&validated.value)
    }

    /// 运行已校验的振荡计划
    pub fn execute_motion(&mut self, plan: &MotionPlan) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let timing = *plan.timing();
        let policy = *plan.policy();
        let hz = timing.publish_hz();
        let total = timing.total_ticks();
        let choreographer = Choreographer::from_plan(plan);
        let mut state = LoopState::new(plan);
        let mut guard = SendGuard::default();

        info!(
            ">> sin_euler_ctrl [{}]: {} ticks @ {} Hz, sleep_rate {:.5} s",
            plan.mode(),
            total,
            hz,
            timing.pacing().sleep_rate
        );
        if self.verbosity == Verbosity::All {
            info!("\n{}", plan);
        }

        let mut last_setpoint = None;
        let mut scheduler = DeadlineScheduler::start(&self.clock, timing.pacing().sleep_rate);
        let mut loop_mark = self.clock.now();

        for tick in 0..total {
            self.check_stop()?;
            // 上一个 tick 抽取的事件在此生效（校验失败时保留原参数）
            match state.apply_pending(&policy) {
                Some(Ok(action)) => debug!("tick {}: {}", tick, action),
                Some(Err(_)) => debug!(
                    "tick {}: re-roll dropped ({} rejected so far)",
                    tick,
                    state.rerolls_rejected()
                ),
                None => {},
            }

            let euler = state.setpoint();
            self.cmd.mode = MotorModeHigh::ForceStand;
            self.cmd.euler = euler.to_f32();
            self.send_tick(&mut guard)?;

            let setpoint = Setpoint::new(euler, f64::from(self.cmd.body_height));
            self.log_tick(tick, hz, &setpoint, &mut loop_mark, timing.pacing().loop_rate);
            last_setpoint = Some(setpoint);

            if let Some(event) = choreographer.draw(tick, state.wave(), &mut self.rng) {
                state.schedule(event);
            }
            state.advance();
            scheduler.wait_for_tick(&self.clock, tick + 1);
        }

        let report = LoopReport {
            ticks: total,
            overruns: scheduler.overruns(),
            elapsed: scheduler.elapsed(&self.clock),
            last_setpoint,
            rerolls_applied: state.rerolls_applied(),
            rerolls_rejected: state.rerolls_rejected(),
            send_failures: guard.total,
        };
        info!(
            ">> End of sin_euler_ctrl [{}]: {:.3} s, {} overrun tick(s)",
            plan.mode(),
            report.elapsed.as_secs_f64(),
            report.overruns
        );
        Ok(report)
    }

    // ========================================================================
    // 姿态
    // ========================================================================

    /// 校验请求并运行姿态序列
    pub fn pose_ctrl(&mut self, request: &PoseRequest) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let validated = validate_pose(request, &SafetyPolicy::pose(), self.time_signature)?;
        validated.log_warnings();
        self.execute_pose(&validated.value)
    }

    /// 运行已校验的姿态计划
    ///
    /// `delay_start` 只在第一次重复之前等待一次；每次重复重新采样噪声，
    /// 并以新的起点重新开始截止时间调度。
    pub fn execute_pose(&mut self, plan: &PosePlan) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let timing = *plan.timing();
        let hz = timing.publish_hz();
        let sequencer = PoseSequencer::from_plan(plan);
        let mut guard = SendGuard::default();

        info!(
            ">> pose_ctrl: {} repeat(s) x {} ticks @ {} Hz",
            timing.loop_repeats(),
            plan.ticks_per_repeat(),
            hz
        );
        if self.verbosity == Verbosity::All {
            info!("\n{}", plan);
        }

        if plan.delay_start() > 0.0 {
            debug!("Delaying start by {} s", plan.delay_start());
            self.clock.sleep(Duration::from_secs_f64(plan.delay_start()));
        }

        let started = self.clock.now();
        let mut ticks = 0;
        let mut overruns = 0;
        let mut last_setpoint = None;

        for repeat in 0..timing.loop_repeats() {
            let sequence = sequencer.sequence(&mut self.rng);
            let mut scheduler = DeadlineScheduler::start(&self.clock, timing.pacing().sleep_rate);
            let mut loop_mark = self.clock.now();
            let mut current_phase = None;

            for (tick, (phase, setpoint)) in (0u64..).zip(sequence) {
                self.check_stop()?;
                if current_phase != Some(phase) {
                    info!(">> Repeat {}: {}", repeat + 1, phase);
                    current_phase = Some(phase);
                }

                self.cmd.set_pose(
                    MotorModeHigh::ForceStand,
                    setpoint.euler.to_f32(),
                    setpoint.body_height as f32,
                );
                self.send_tick(&mut guard)?;

                self.log_tick(tick, hz, &setpoint, &mut loop_mark, timing.pacing().loop_rate);
                last_setpoint = Some(setpoint);
                ticks += 1;
                scheduler.wait_for_tick(&self.clock, tick + 1);
            }
            overruns += scheduler.overruns();
        }

        let report = LoopReport {
            ticks,
            overruns,
            elapsed: self.clock.now().saturating_sub(started),
            last_setpoint,
            send_failures: guard.total,
            ..LoopReport::default()
        };
        info!(
            ">> End of pose_ctrl: {:.3} s, {} overrun tick(s)",
            report.elapsed.as_secs_f64(),
            report.overruns
        );
        Ok(report)
    }

    // ========================================================================
    // 俯卧撑
    // ========================================================================

    /// 校验参数并运行俯卧撑
    pub fn push_up_ctrl(&mut self, params: &PushUpParameters) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let validated = validate_push_up(params, &SafetyPolicy::oscillation())?;
        validated.log_warnings();
        self.execute_push_up(&validated.value)
    }

    /// 运行已校验的俯卧撑计划
    pub fn execute_push_up(&mut self, plan: &PushUpPlan) -> Result<LoopReport, ControlError> {
        self.ensure_active()?;
        let timing = *plan.timing();
        let hz = timing.publish_hz();
        let total = timing.total_ticks();
        let mut guard = SendGuard::default();

        info!(">> push_up_ctrl: {} ticks @ {} Hz", total, hz);
        if self.verbosity == Verbosity::All {
            info!("\n{}", plan);
        }

        let mut scheduler = DeadlineScheduler::start(&self.clock, timing.pacing().sleep_rate);
        let mut loop_mark = self.clock.now();
        let mut last_setpoint = None;

        for tick in 0..total {
            self.check_stop()?;
            if apply_push_up(&mut self.cmd, tick, hz) {
                debug!("TimeStep: {:05}  mode -> {:?}", tick, self.cmd.mode);
            }
            self.send_tick(&mut guard)?;

            let setpoint = Setpoint::new(
                self.cmd.euler.map(f64::from).into(),
                f64::from(self.cmd.body_height),
            );
            self.log_tick(tick, hz, &setpoint, &mut loop_mark, timing.pacing().loop_rate);
            last_setpoint = Some(setpoint);
            scheduler.wait_for_tick(&self.clock, tick + 1);
        }

        let report = LoopReport {
            ticks: total,
            overruns: scheduler.overruns(),
            elapsed: scheduler.elapsed(&self.clock),
            last_setpoint,
            send_failures: guard.total,
            ..LoopReport::default()
        };
        info!(
            ">> End of push_up_ctrl: {:.3} s, {} overrun tick(s)",
            report.elapsed.as_secs_f64(),
            report.overruns
        );
        Ok(report)
    }

    // ========================================================================
    // 演出例程
    // ========================================================================

    /// 运行一个演出例程
    ///
    /// `tempo` 例程应已由 [`ShowConfig::resolved_routines`] 展开，这里直接跳过。
    /// 控制循环返回报告，`pause` 与 `tempo` 返回 `None`。
    ///
    /// [`ShowConfig::resolved_routines`]: crate::config::ShowConfig::resolved_routines
    pub fn run_routine(&mut self, routine: &Routine) -> Result<Option<LoopReport>, ControlError> {
        self.ensure_active()?;
        match routine {
            Routine::SinEuler(params) => self.sin_euler_ctrl(params).map(Some),
            Routine::Pose(request) => self.pose_ctrl(request).map(Some),
            Routine::PushUp(params) => self.push_up_ctrl(params).map(Some),
            Routine::Pause { seconds } => {
                self.check_stop()?;
                if !seconds.is_finite() || *seconds < 0.0 {
                    return Err(ConfigError::InvalidDuration {
                        field: "seconds",
                        value: *seconds,
                    }
                    .into());
                }
                info!(">> pause: {:.3} s", seconds);
                self.clock.sleep(Duration::from_secs_f64(*seconds));
                Ok(None)
            },
            Routine::Tempo { bpm } => {
                debug!("Tempo routine ({} BPM) reached the controller, ignoring", bpm);
                Ok(None)
            },
        }
    }
}

/// 输出一条状态报文的诊断信息
pub fn log_state(state: &HighState) {
    let bms = &state.bms;
    info!("SN [{}]: {}", byte_print(&state.sn), decode_sn(&state.sn));
    info!("Ver [{}]: {}", byte_print(&state.version), decode_version(&state.version));
    info!("SOC: {} %", bms.soc);
    info!("Overall Voltage: {} mV", bms.total_voltage_mv());
    info!("Current: {} mA", bms.current);
    info!("Cycles: {}", bms.cycle);
    info!("Temps BQ: {} °C, {} °C", bms.bq_ntc[0], bms.bq_ntc[1]);
    info!("Temps MCU: {} °C, {} °C", bms.mcu_ntc[0], bms.mcu_ntc[1]);
    info!("FootForce: {:?}", state.foot_force);
    info!("FootForceEst: {:?}", state.foot_force_est);
}

impl<C: Connection, K: Clock> Drop for MotionController<C, K> {
    fn drop(&mut self) {
        if self.engaged && !self.terminated {
            warn!("MotionController dropped without terminate_control, running shutdown sequence");
            if let Err(e) = self.terminate_control() {
                error!("Shutdown on drop failed: {}", e);
            }
        }
    }
}
