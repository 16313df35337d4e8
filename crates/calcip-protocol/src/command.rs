//! 高层控制指令
//!
//! `HighCmd` 是每个控制周期发送给机器人的指令对象。上层只设置
//! `mode` / `euler` / `body_height` 等字段，然后调用 [`HighCmd::build`]
//! 得到固定 129 字节的 UDP 负载。
//!
//! # 字节布局
//!
//! ```text
//! offset  size  field
//!      0     2  head (0xFE 0xEF)
//!      2     1  level_flag (0xEE = high level)
//!      3     1  frame_reserve
//!      4     8  sn [u32; 2]
//!     12     8  version [u32; 2]
//!     20     2  bandwidth u16
//!     22     1  mode
//!     23     1  gait_type
//!     24     1  speed_level
//!     25     4  foot_raise_height f32
//!     29     4  body_height f32
//!     33     8  position [f32; 2]
//!     41    12  euler [f32; 3]
//!     53     8  velocity [f32; 2]
//!     61     4  yaw_speed f32
//!     65     4  bms (off, reserve[3])
//!     69    12  led [rgb; 4]
//!     81    40  wireless_remote
//!    121     4  reserve u32
//!    125     4  crc u32 (over bytes 0..124 as 31 words)
//! ```

use crate::ProtocolError;
use crate::crc::crc32_bytes;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 帧头
pub const HIGH_CMD_HEAD: [u8; 2] = [0xFE, 0xEF];
/// 高层控制等级标志
pub const HIGH_LEVEL: u8 = 0xEE;
/// 指令总长度
pub const HIGH_CMD_LEN: usize = 129;
/// CRC 之前的字节数
pub const HIGH_CMD_BODY_LEN: usize = 125;
/// 参与 CRC 计算的字节数（31 个完整 u32 字，`reserve` 的最后一字节不参与）
pub const HIGH_CMD_CRC_SPAN: usize = 124;

/// 高层运动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
#[repr(u8)]
pub enum MotorModeHigh {
    /// 空闲
    Idle = 0,
    /// 强制站立（可控制姿态）
    ForceStand = 1,
    /// 速度行走
    VelWalk = 2,
    /// 位置行走
    PosWalk = 3,
    /// 路径
    Path = 4,
    /// 趴下
    StandDown = 5,
    /// 站起
    StandUp = 6,
    /// 阻尼（电机卸力）
    Damping = 7,
    /// 摔倒恢复
    Recovery = 8,
    Backflip = 9,
    JumpYaw = 10,
    StraightHand = 11,
    Dance1 = 12,
    Dance2 = 13,
}

impl MotorModeHigh {
    /// 从原始字节解析
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        Self::try_from(value).map_err(|_| ProtocolError::InvalidValue {
            field: "MotorModeHigh".to_string(),
            value,
        })
    }

    pub fn as_u8(self) -> u8 {
        self.into()
    }
}

/// 步态类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum GaitType {
    Idle = 0,
    Trot = 1,
    TrotRunning = 2,
    ClimbStair = 3,
    TrotObstacle = 4,
}

/// 速度档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SpeedLevel {
    Low = 0,
    Medium = 1,
    High = 2,
}

// num_enum 会把 `#[default]` 变体当作未知值的兜底，这里手写 Default 以保留解析错误。
impl Default for MotorModeHigh {
    fn default() -> Self {
        Self::Idle
    }
}

impl Default for GaitType {
    fn default() -> Self {
        Self::Idle
    }
}

impl Default for SpeedLevel {
    fn default() -> Self {
        Self::Low
    }
}

/// LED 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Led {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// 高层控制指令
#[derive(Debug, Clone, PartialEq)]
pub struct HighCmd {
    pub level_flag: u8,
    pub frame_reserve: u8,
    pub sn: [u32; 2],
    pub version: [u32; 2],
    pub bandwidth: u16,
    pub mode: MotorModeHigh,
    pub gait_type: GaitType,
    pub speed_level: SpeedLevel,
    pub foot_raise_height: f32,
    /// 机身高度偏移（米，相对默认站立高度）
    pub body_height: f32,
    pub position: [f32; 2],
    /// 姿态设定值 roll / pitch / yaw（弧度）
    pub euler: [f32; 3],
    pub velocity: [f32; 2],
    pub yaw_speed: f32,
    pub bms_off: u8,
    pub led: [Led; 4],
    pub wireless_remote: [u8; 40],
    pub reserve: u32,
}

impl Default for HighCmd {
    fn default() -> Self {
        Self {
            level_flag: HIGH_LEVEL,
            frame_reserve: 0,
            sn: [0; 2],
            version: [0; 2],
            bandwidth: 0,
            mode: MotorModeHigh::Idle,
            gait_type: GaitType::Idle,
            speed_level: SpeedLevel::Low,
            foot_raise_height: 0.0,
            body_height: 0.0,
            position: [0.0; 2],
            euler: [0.0; 3],
            velocity: [0.0; 2],
            yaw_speed: 0.0,
            bms_off: 0,
            led: [Led::default(); 4],
            wireless_remote: [0; 40],
            reserve: 0,
        }
    }
}

impl HighCmd {
    /// 创建指定模式的空指令
    pub fn with_mode(mode: MotorModeHigh) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// 设置模式、姿态与机身高度（每个控制周期都会调用）
    pub fn set_pose(&mut self, mode: MotorModeHigh, euler: [f32; 3], body_height: f32) {
        self.mode = mode;
        self.euler = euler;
        self.body_height = body_height;
    }

    /// 序列化为固定布局的字节缓冲区
    ///
    /// 纯函数，不修改 `self`，CRC 在最后 4 字节。
    pub fn build(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HIGH_CMD_LEN);

        buf.put_slice(&HIGH_CMD_HEAD);
        buf.put_u8(self.level_flag);
        buf.put_u8(self.frame_reserve);
        for w in self.sn {
            buf.put_u32_le(w);
        }
        for w in self.version {
            buf.put_u32_le(w);
        }
        buf.put_u16_le(self.bandwidth);
        buf.put_u8(self.mode.into());
        buf.put_u8(self.gait_type.into());
        buf.put_u8(self.speed_level.into());
        buf.put_f32_le(self.foot_raise_height);
        buf.put_f32_le(self.body_height);
        for v in self.position {
            buf.put_f32_le(v);
        }
        for v in self.euler {
            buf.put_f32_le(v);
        }
        for v in self.velocity {
            buf.put_f32_le(v);
        }
        buf.put_f32_le(self.yaw_speed);
        buf.put_u8(self.bms_off);
        buf.put_bytes(0, 3);
        for led in self.led {
            buf.put_slice(&[led.r, led.g, led.b]);
        }
        buf.put_slice(&self.wireless_remote);
        buf.put_u32_le(self.reserve);

        debug_assert_eq!(buf.len(), HIGH_CMD_BODY_LEN);
        let crc = crc32_bytes(&buf[..HIGH_CMD_CRC_SPAN]);
        buf.put_u32_le(crc);

        buf.freeze()
    }

    /// 从字节缓冲区解析（校验长度、帧头与 CRC）
    ///
    /// 主要用于抓包诊断（`sniff`）以及测试中检查已发送的指令。
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HIGH_CMD_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: HIGH_CMD_LEN,
                actual: data.len(),
            });
        }
        if data[..2] != HIGH_CMD_HEAD {
            return Err(ProtocolError::InvalidHeader(u16::from_be_bytes([
                data[0], data[1],
            ])));
        }

        let expected = crc32_bytes(&data[..HIGH_CMD_CRC_SPAN]);
        let actual = u32::from_le_bytes([data[125], data[126], data[127], data[128]]);
        if expected != actual {
            return Err(ProtocolError::CrcMismatch { expected, actual });
        }

        let mut buf = &data[2..HIGH_CMD_BODY_LEN];
        let level_flag = buf.get_u8();
        let frame_reserve = buf.get_u8();
        let sn = [buf.get_u32_le(), buf.get_u32_le()];
        let version = [buf.get_u32_le(), buf.get_u32_le()];
        let bandwidth = buf.get_u16_le();
        let mode = MotorModeHigh::from_u8(buf.get_u8())?;
        let gait_raw = buf.get_u8();
        let gait_type = GaitType::try_from(gait_raw).map_err(|_| ProtocolError::InvalidValue {
            field: "GaitType".to_string(),
            value: gait_raw,
        })?;
        let speed_raw = buf.get_u8();
        let speed_level =
            SpeedLevel::try_from(speed_raw).map_err(|_| ProtocolError::InvalidValue {
                field: "SpeedLevel".to_string(),
                value: speed_raw,
            })?;
        let foot_raise_height = buf.get_f32_le();
        let body_height = buf.get_f32_le();
        let position = [buf.get_f32_le(), buf.get_f32_le()];
        let euler = [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()];
        let velocity = [buf.get_f32_le(), buf.get_f32_le()];
        let yaw_speed = buf.get_f32_le();
        let bms_off = buf.get_u8();
        buf.advance(3);
        let mut led = [Led::default(); 4];
        for l in &mut led {
            *l = Led {
                r: buf.get_u8(),
                g: buf.get_u8(),
                b: buf.get_u8(),
            };
        }
        let mut wireless_remote = [0u8; 40];
        buf.copy_to_slice(&mut wireless_remote);
        let reserve = buf.get_u32_le();

        Ok(Self {
            level_flag,
            frame_reserve,
            sn,
            version,
            bandwidth,
            mode,
            gait_type,
            speed_level,
            foot_raise_height,
            body_height,
            position,
            euler,
            velocity,
            yaw_speed,
            bms_off,
            led,
            wireless_remote,
            reserve,
        })
    }
}
