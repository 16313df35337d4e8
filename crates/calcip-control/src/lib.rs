//! # Calcip Control
//!
//! 节拍同步的轨迹生成与定时引擎。
//!
//! ## 模块
//!
//! - `axis`: roll / pitch / yaw 三轴索引与数组
//! - `params`: 运动参数值对象（振荡、姿态、俯卧撑）
//! - `safety`: 安全校验（致命错误 / 自动修正 / 提示）
//! - `pacing`: BPM 换算、时钟抽象与截止时间调度
//! - `oscillator`: 振荡函数库与三轴波形合成
//! - `pose`: 三段式（接近 → 保持 → 返回）姿态序列
//! - `choreography`: 循环状态与随机舞蹈重抽样
//! - `pushup`: 俯卧撑节拍
//! - `controller`: 会话生命周期与控制循环
//! - `config`: TOML 演出配置
//!
//! ## 数据流
//!
//! ```text
//! 参数 → safety::validate_* → Plan（修正后的参数 + Pacing）
//!      → MotionController 每个 tick：
//!          oscillator / pose 计算设定值 → HighCmd → Connection::send
//!          → DeadlineScheduler 睡眠到下一个截止时间
//! ```

pub mod axis;
pub mod choreography;
pub mod config;
pub mod controller;
pub mod error;
pub mod oscillator;
pub mod pacing;
pub mod params;
pub mod pose;
pub mod pushup;
pub mod safety;

pub use axis::{Axis, AxisArray};
pub use choreography::{Choreographer, LoopState, OscillationMode, RerollAction, RerollEvent};
pub use config::{ConnectionConfig, Routine, RoutineCheck, ShowConfig, ShowConfigError};
pub use controller::{LoopReport, MotionController, Verbosity, log_state};
pub use error::{ConfigError, ControlError};
pub use oscillator::{Oscillator, compose};
pub use pacing::{
    Clock, DeadlineScheduler, MonotonicClock, Pacing, Tempo, VirtualClock, clamp_bpm,
    derive_pacing,
};
pub use params::*;
pub use pose::{PosePhase, PoseSequence, PoseSequencer, Setpoint, linspace};
pub use safety::{
    MotionPlan, PosePlan, PushUpPlan, SafetyPolicy, Validated, ValidationWarning, WarningKind,
    validate_motion, validate_pose, validate_push_up, validate_wave,
};
