//! 运动参数值对象
//!
//! 每次控制循环调用时参数不可变；校验与修正由 [`crate::safety`] 完成，
//! 结果是新的 Plan 对象，不会回写调用方的数据。
//!
//! 所有类型都可以从 TOML 反序列化，字段名与字符串标签使用小写 snake_case。

use crate::axis::{Axis, AxisArray};
use crate::choreography::OscillationMode;
use crate::error::ConfigError;
use crate::oscillator::Oscillator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 默认拍号（每小节拍数）
pub const DEFAULT_TIME_SIGNATURE: u32 = 4;

/// 循环定时参数（所有控制循环共用）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// 每秒（逻辑循环时间）发送的指令数，范围 [50, 1000]
    pub publish_hz: u32,
    /// 目标节拍，超过 `bpm_limiter` 时反复减半
    pub bpm: f64,
    /// BPM 上限，`None` 时使用对应安全策略的默认值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm_limiter: Option<f64>,
    /// 显式指定每条指令的睡眠时间（秒），范围 [0.001, 0.1]
    ///
    /// 设置后覆盖 BPM 推导出的 `sleep_rate`，`loop_rate` 不再等于 `60 / bpm`。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_override: Option<f64>,
    /// 重复次数，范围 [1, 128]
    pub loop_repeats: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            publish_hz: 200,
            bpm: 60.0,
            bpm_limiter: None,
            sleep_override: None,
            loop_repeats: 1,
        }
    }
}

/// 三轴波形参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// 振幅（弧度），负值表示反向
    pub amplitude: AxisArray<f64>,
    /// 偏移（弧度）
    pub offset: AxisArray<f64>,
    /// 周期（循环数）
    pub period: AxisArray<f64>,
    /// 相位（循环时间单位，校验时折叠到 (-2, 2)）
    pub phase: AxisArray<f64>,
    /// 轴使能（整个循环期间不变）
    pub enabled: AxisArray<bool>,
    /// 每轴的振荡函数
    pub oscillator: AxisArray<Oscillator>,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            amplitude: AxisArray::new([0.5, 0.5, 0.4]),
            offset: AxisArray::splat(0.0),
            period: AxisArray::splat(2.0),
            phase: AxisArray::splat(0.0),
            enabled: AxisArray::splat(true),
            oscillator: AxisArray::splat(Oscillator::Sin),
        }
    }
}

impl WaveParams {
    /// 振幅取反（轨迹反向），其余参数不变
    pub fn reversed(&self) -> Self {
        Self {
            amplitude: self.amplitude.map(|a| -a),
            ..self.clone()
        }
    }
}

/// 连续振荡参数（`sin_euler`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionParameters {
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(flatten)]
    pub wave: WaveParams,
    pub mode: OscillationMode,
}

impl Default for MotionParameters {
    fn default() -> Self {
        Self {
            timing: Timing {
                bpm: 30.0,
                loop_repeats: 8,
                ..Timing::default()
            },
            wave: WaveParams::default(),
            mode: OscillationMode::Default,
        }
    }
}

/// 俯卧撑参数
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PushUpParameters {
    #[serde(flatten)]
    pub timing: Timing,
}

// ============================================================================
// 姿态符号参数
// ============================================================================

/// 定义一个符号参数枚举：字符串标签 ↔ 数值查表
macro_rules! symbolic_param {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal, expected = $expected:literal, default = $default:ident,
        { $($variant:ident => ($tag:literal, $value:expr)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(
                #[doc = concat!("`", $tag, "`")]
                $variant,
            )+
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl $name {
            /// 查表得到数值
            pub const fn value(self) -> f64 {
                match self {
                    $($name::$variant => $value,)+
                }
            }

            pub const fn tag(self) -> &'static str {
                match self {
                    $($name::$variant => $tag,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(ConfigError::UnknownPoseValue {
                        field: $field,
                        value: other.to_string(),
                        expected: $expected,
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.tag())
            }
        }
    };
}

symbolic_param!(
    /// 横滚目标
    RollPose, "roll", expected = "left, neutral, right", default = Neutral,
    {
        Left => ("left", -0.5),
        Neutral => ("neutral", 0.0),
        Right => ("right", 0.5),
    }
);

symbolic_param!(
    /// 俯仰目标（正值低头）
    PitchPose, "pitch", expected = "down, neutral, up", default = Neutral,
    {
        Down => ("down", 0.5),
        Neutral => ("neutral", 0.0),
        Up => ("up", -0.5),
    }
);

symbolic_param!(
    /// 偏航目标
    YawPose, "yaw", expected = "left, neutral, right", default = Neutral,
    {
        Left => ("left", 0.3),
        Neutral => ("neutral", 0.0),
        Right => ("right", -0.3),
    }
);

symbolic_param!(
    /// 机身高度（米，相对默认站立高度）
    BodyHeight, "body_height", expected = "low, neutral, high", default = Neutral,
    {
        Low => ("low", -0.25),
        Neutral => ("neutral", -0.05),
        High => ("high", 0.2),
    }
);

symbolic_param!(
    /// 保持时长（秒）
    PoseDuration, "pose_duration", expected = "short, medium, long", default = Medium,
    {
        Short => ("short", 1.0),
        Medium => ("medium", 4.0),
        Long => ("long", 8.0),
    }
);

symbolic_param!(
    /// 接近速度系数（越大越快）
    PoseVelocity, "velocity", expected = "slow, normal, fast", default = Normal,
    {
        Slow => ("slow", 0.5),
        Normal => ("normal", 1.0),
        Fast => ("fast", 2.0),
    }
);

symbolic_param!(
    /// 平滑度（抖动幅度，弧度/米）
    Smoothness, "smoothness", expected = "smooth, shaky", default = Smooth,
    {
        Smooth => ("smooth", 0.0),
        Shaky => ("shaky", 0.1),
    }
);

/// 数值化的姿态目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseTarget {
    pub euler: AxisArray<f64>,
    pub body_height: f64,
}

impl PoseTarget {
    /// 全零的中立姿态
    pub const NEUTRAL: PoseTarget = PoseTarget {
        euler: AxisArray::splat(0.0),
        body_height: 0.0,
    };
}

/// 符号化姿态参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParameters {
    pub roll: RollPose,
    pub pitch: PitchPose,
    pub yaw: YawPose,
    pub body_height: BodyHeight,
    pub pose_duration: PoseDuration,
    pub velocity: PoseVelocity,
    pub smoothness: Smoothness,
}

impl PoseParameters {
    /// 查表得到数值目标
    pub fn target(&self) -> PoseTarget {
        let mut euler = AxisArray::splat(0.0);
        euler[Axis::Roll] = self.roll.value();
        euler[Axis::Pitch] = self.pitch.value();
        euler[Axis::Yaw] = self.yaw.value();
        PoseTarget {
            euler,
            body_height: self.body_height.value(),
        }
    }

    /// 从字符串键值对解析（未知键被忽略，未知取值为致命错误）
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = PoseParameters::default();
        for (key, value) in pairs {
            match key {
                "roll" => params.roll = value.parse()?,
                "pitch" => params.pitch = value.parse()?,
                "yaw" => params.yaw = value.parse()?,
                "body_height" => params.body_height = value.parse()?,
                "pose_duration" | "duration" => params.pose_duration = value.parse()?,
                "velocity" => params.velocity = value.parse()?,
                "smoothness" => params.smoothness = value.parse()?,
                other => tracing::debug!("ignoring pose parameter '{}'", other),
            }
        }
        Ok(params)
    }
}

/// 姿态控制请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseRequest {
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(flatten)]
    pub pose: PoseParameters,
    /// 设置后保持时长由节拍推导：`(bpm / 60) * time_signature * bars`，
    /// 否则使用 `pose_duration` 查表值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bars: Option<f64>,
    /// 拍号，`None` 时使用控制器的默认值
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<u32>,
    /// 接近阶段的基准时长（秒），实际步数为 `publish_hz * base_time / velocity`
    pub move_to_pose_base_time: f64,
    /// 第一次重复之前的延时（秒）
    pub delay_start: f64,
}

impl Default for PoseRequest {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            pose: PoseParameters::default(),
            bars: None,
            time_signature: None,
            move_to_pose_base_time: 1.0,
            delay_start: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_lookup_table() {
        assert_eq!(RollPose::Left.value(), -0.5);
        assert_eq!(RollPose::Right.value(), 0.5);
        assert_eq!(PitchPose::Down.value(), 0.5);
        assert_eq!(PitchPose::Up.value(), -0.5);
        assert_eq!(YawPose::Left.value(), 0.3);
        assert_eq!(YawPose::Right.value(), -0.3);
        assert_eq!(BodyHeight::Low.value(), -0.25);
        assert_eq!(BodyHeight::Neutral.value(), -0.05);
        assert_eq!(BodyHeight::High.value(), 0.2);
        assert_eq!(PoseDuration::Short.value(), 1.0);
        assert_eq!(PoseDuration::Long.value(), 8.0);
        assert_eq!(PoseVelocity::Slow.value(), 0.5);
        assert_eq!(PoseVelocity::Fast.value(), 2.0);
        assert_eq!(Smoothness::Smooth.value(), 0.0);
        assert_eq!(Smoothness::Shaky.value(), 0.1);
    }

    #[test]
    fn test_pose_value_parse() {
        assert_eq!("left".parse::<RollPose>().unwrap(), RollPose::Left);
        assert_eq!("shaky".parse::<Smoothness>().unwrap(), Smoothness::Shaky);

        let err = "sideways".parse::<RollPose>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownPoseValue {
                field: "roll",
                value: "sideways".to_string(),
                expected: "left, neutral, right",
            }
        );
    }

    #[test]
    fn test_pose_parameters_from_pairs() {
        let params =
            PoseParameters::from_pairs([("roll", "left"), ("smoothness", "shaky"), ("extra", "x")])
                .unwrap();
        assert_eq!(params.roll, RollPose::Left);
        assert_eq!(params.smoothness, Smoothness::Shaky);
        assert_eq!(params.pitch, PitchPose::Neutral);

        let target = params.target();
        assert_eq!(target.euler[Axis::Roll], -0.5);
        assert_eq!(target.body_height, -0.05);

        assert!(PoseParameters::from_pairs([("pitch", "sideways")]).is_err());
    }

    #[test]
    fn test_motion_parameters_from_toml() {
        let params: MotionParameters = toml::from_str(
            r#"
            publish_hz = 300
            bpm = 120.0
            loop_repeats = 4
            mode = "rand_dance"
            amplitude = [0.3, 0.2, 0.1]
            oscillator = ["sin", "neg_sin", "abs_sin"]
            enabled = [true, false, true]
            "#,
        )
        .unwrap();
        assert_eq!(params.timing.publish_hz, 300);
        assert_eq!(params.timing.bpm, 120.0);
        assert_eq!(params.timing.loop_repeats, 4);
        assert_eq!(params.mode, OscillationMode::RandDance);
        assert_eq!(params.wave.amplitude[Axis::Yaw], 0.1);
        assert_eq!(params.wave.oscillator[Axis::Pitch], Oscillator::NegSin);
        assert!(!params.wave.enabled[Axis::Pitch]);
        // 未给出的字段使用默认值
        assert_eq!(params.wave.period, AxisArray::splat(2.0));
    }

    #[test]
    fn test_pose_request_from_toml() {
        let req: PoseRequest = toml::from_str(
            r#"
            roll = "right"
            body_height = "high"
            bars = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(req.pose.roll, RollPose::Right);
        assert_eq!(req.pose.body_height, BodyHeight::High);
        assert_eq!(req.bars, Some(2.0));
        assert_eq!(req.move_to_pose_base_time, 1.0);

        let bad: Result<PoseRequest, _> = toml::from_str(r#"roll = "sideways""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_wave_reversed() {
        let wave = WaveParams::default().reversed();
        assert_eq!(wave.amplitude.into_array(), [-0.5, -0.5, -0.4]);
        assert_eq!(wave.period, AxisArray::splat(2.0));
    }
}
