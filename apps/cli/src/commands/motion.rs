//! 运动命令：sin-euler / pose / push-up
//!
//! 命令行只负责组装参数，所有安全校验在会话开始前由 `calcip-control` 完成。

use crate::utils::axis_array;
use anyhow::Result;
use calcip_control::{
    BodyHeight, MotionParameters, OscillationMode, Oscillator, PitchPose, PoseDuration,
    PoseRequest, PoseVelocity, PushUpParameters, RollPose, Routine, Smoothness, Timing, YawPose,
};
use clap::Args;

/// 循环定时参数（未指定时使用各例程的默认值）
#[derive(Args, Debug, Clone, Default)]
pub struct TimingArgs {
    /// 每秒发送的指令数 [50, 1000]
    #[arg(long)]
    pub publish_hz: Option<u32>,

    /// 节拍（超过上限时反复减半）
    #[arg(long)]
    pub bpm: Option<f64>,

    /// BPM 上限
    #[arg(long)]
    pub bpm_limiter: Option<f64>,

    /// 固定每条指令的睡眠时间（秒），覆盖 BPM 推导值
    #[arg(long)]
    pub sleep_override: Option<f64>,

    /// 重复次数 [1, 128]
    #[arg(long)]
    pub loop_repeats: Option<u32>,
}

impl TimingArgs {
    fn apply(&self, timing: &mut Timing) {
        if let Some(hz) = self.publish_hz {
            timing.publish_hz = hz;
        }
        if let Some(bpm) = self.bpm {
            timing.bpm = bpm;
        }
        if self.bpm_limiter.is_some() {
            timing.bpm_limiter = self.bpm_limiter;
        }
        if self.sleep_override.is_some() {
            timing.sleep_override = self.sleep_override;
        }
        if let Some(repeats) = self.loop_repeats {
            timing.loop_repeats = repeats;
        }
    }
}

/// 连续振荡参数
#[derive(Args, Debug, Clone)]
pub struct SinEulerCommand {
    #[command(flatten)]
    pub timing: TimingArgs,

    /// 振幅（弧度），例如：0.5,0.5,0.4
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub amplitude: Option<Vec<f64>>,

    /// 偏移（弧度）
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub offset: Option<Vec<f64>>,

    /// 周期（循环数）
    #[arg(long, value_delimiter = ',')]
    pub period: Option<Vec<f64>>,

    /// 相位（循环时间单位）
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub phase: Option<Vec<f64>>,

    /// 轴使能，例如：1,1,0
    #[arg(long, value_delimiter = ',', value_parser = clap::builder::BoolishValueParser::new())]
    pub enabled: Option<Vec<bool>>,

    /// 振荡函数（sin / neg_sin / abs_sin / neg_abs_sin）
    #[arg(long, value_delimiter = ',')]
    pub oscillator: Option<Vec<Oscillator>>,

    /// 模式（default / rand_dance / dance）
    #[arg(long)]
    pub mode: Option<OscillationMode>,
}

impl SinEulerCommand {
    pub fn to_params(&self) -> Result<MotionParameters> {
        let mut params = MotionParameters::default();
        self.timing.apply(&mut params.timing);

        let wave = &mut params.wave;
        if let Some(values) = &self.amplitude {
            wave.amplitude = axis_array("amplitude", values)?;
        }
        if let Some(values) = &self.offset {
            wave.offset = axis_array("offset", values)?;
        }
        if let Some(values) = &self.period {
            wave.period = axis_array("period", values)?;
        }
        if let Some(values) = &self.phase {
            wave.phase = axis_array("phase", values)?;
        }
        if let Some(values) = &self.enabled {
            wave.enabled = axis_array("enabled", values)?;
        }
        if let Some(values) = &self.oscillator {
            wave.oscillator = axis_array("oscillator", values)?;
        }
        if let Some(mode) = self.mode {
            params.mode = mode;
        }
        Ok(params)
    }

    pub fn to_routine(&self) -> Result<Routine> {
        Ok(Routine::SinEuler(self.to_params()?))
    }
}

/// 姿态参数
#[derive(Args, Debug, Clone)]
pub struct PoseCommand {
    #[command(flatten)]
    pub timing: TimingArgs,

    /// left / neutral / right
    #[arg(long)]
    pub roll: Option<RollPose>,

    /// down / neutral / up
    #[arg(long)]
    pub pitch: Option<PitchPose>,

    /// left / neutral / right
    #[arg(long)]
    pub yaw: Option<YawPose>,

    /// low / neutral / high
    #[arg(long)]
    pub body_height: Option<BodyHeight>,

    /// 保持时长：short / medium / long（指定 --bars 时忽略）
    #[arg(long)]
    pub duration: Option<PoseDuration>,

    /// 接近速度：slow / normal / fast
    #[arg(long)]
    pub velocity: Option<PoseVelocity>,

    /// smooth / shaky
    #[arg(long)]
    pub smoothness: Option<Smoothness>,

    /// 保持的小节数（时长随节拍变化）
    #[arg(long)]
    pub bars: Option<f64>,

    /// 接近阶段的基准时长（秒）
    #[arg(long)]
    pub base_time: Option<f64>,

    /// 第一次重复前的延时（秒）
    #[arg(long)]
    pub delay_start: Option<f64>,
}

impl PoseCommand {
    pub fn to_request(&self) -> PoseRequest {
        let mut request = PoseRequest::default();
        self.timing.apply(&mut request.timing);

        let pose = &mut request.pose;
        if let Some(roll) = self.roll {
            pose.roll = roll;
        }
        if let Some(pitch) = self.pitch {
            pose.pitch = pitch;
        }
        if let Some(yaw) = self.yaw {
            pose.yaw = yaw;
        }
        if let Some(height) = self.body_height {
            pose.body_height = height;
        }
        if let Some(duration) = self.duration {
            pose.pose_duration = duration;
        }
        if let Some(velocity) = self.velocity {
            pose.velocity = velocity;
        }
        if let Some(smoothness) = self.smoothness {
            pose.smoothness = smoothness;
        }

        request.bars = self.bars;
        if let Some(base_time) = self.base_time {
            request.move_to_pose_base_time = base_time;
        }
        if let Some(delay) = self.delay_start {
            request.delay_start = delay;
        }
        request
    }

    pub fn to_routine(&self) -> Routine {
        Routine::Pose(self.to_request())
    }
}

/// 俯卧撑参数
#[derive(Args, Debug, Clone)]
pub struct PushUpCommand {
    #[command(flatten)]
    pub timing: TimingArgs,
}

impl PushUpCommand {
    pub fn to_routine(&self) -> Routine {
        let mut params = PushUpParameters::default();
        self.timing.apply(&mut params.timing);
        Routine::PushUp(params)
    }
}
