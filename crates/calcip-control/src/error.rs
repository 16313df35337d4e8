//! 错误类型
//!
//! - [`ConfigError`]：参数校验失败，总是在第一条指令发出之前返回
//! - [`ControlError`]：控制循环与会话生命周期中的错误

use crate::axis::Axis;
use calcip_protocol::MotorModeHigh;
use calcip_transport::TransportError;
use thiserror::Error;

/// 参数配置错误（致命，不会发送任何指令）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("publish_hz {hz} out of range [{min}, {max}]")]
    PublishHzOutOfRange { hz: u32, min: u32, max: u32 },

    #[error("sleep_override {value} s out of range [{min}, {max}]")]
    SleepOverrideOutOfRange { value: f64, min: f64, max: f64 },

    #[error("sleep_rate {sleep_rate} s below hard floor {min} s")]
    SleepRateTooLow { sleep_rate: f64, min: f64 },

    #[error("loop_repeats {repeats} out of range [{min}, {max}]")]
    LoopRepeatsOutOfRange { repeats: u32, min: u32, max: u32 },

    #[error("{axis} period {period} out of range [{min}, {max}]")]
    PeriodOutOfRange {
        axis: Axis,
        period: f64,
        min: f64,
        max: f64,
    },

    #[error("{axis} period {period} requires publish_hz <= {ceiling}, got {publish_hz}")]
    PeriodTooFastForRate {
        axis: Axis,
        period: f64,
        publish_hz: u32,
        ceiling: u32,
    },

    #[error("{axis}: |amplitude| {amplitude} + |offset| {offset} exceeds budget {budget}")]
    AmplitudeBudgetExceeded {
        axis: Axis,
        amplitude: f64,
        offset: f64,
        budget: f64,
    },

    #[error("parameter {field} must be finite")]
    NonFiniteParameter { field: &'static str },

    #[error("unknown {field} value '{value}' (expected one of: {expected})")]
    UnknownPoseValue {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    #[error("unknown oscillator '{0}'")]
    UnknownOscillator(String),

    #[error("bpm must be positive, got {0}")]
    InvalidBpm(f64),

    #[error("bpm_limiter must be positive, got {0}")]
    InvalidBpmLimiter(f64),

    #[error("bars must be positive, got {0}")]
    InvalidBars(f64),

    #[error("time_signature must be at least 1, got {0}")]
    InvalidTimeSignature(u32),

    #[error("{field} must be a positive duration, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
}

/// 控制错误
#[derive(Error, Debug)]
pub enum ControlError {
    /// 参数校验失败
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 连续发送失败超过阈值
    #[error("Consecutive send failures: {count}, last error: {last_error}")]
    ConsecutiveFailures {
        count: u32,
        #[source]
        last_error: Box<TransportError>,
    },

    /// 停止标志被置位（在 tick 边界处检测）
    #[error("Control loop interrupted")]
    Interrupted,

    /// 会话已执行过关停序列
    #[error("Controller was already terminated, cannot execute commands")]
    AlreadyTerminated,

    /// 关停序列中有步骤发送失败（其余步骤仍已执行）
    #[error("Shutdown incomplete, failed steps: {failed_steps:?}, last error: {last_error}")]
    Shutdown {
        failed_steps: Vec<MotorModeHigh>,
        #[source]
        last_error: Box<TransportError>,
    },
}
