//! 高层状态反馈解析
//!
//! 机器人以固定频率回传 `HighState` 报文。本模块只解析诊断输出需要的字段
//! （序列号、固件版本、电池、IMU、足端力、当前模式与机身状态），
//! 电机级别的 20 组 `MotorState` 被整体跳过。
//!
//! # 字节布局（小端）
//!
//! ```text
//! offset  size  field
//!      0     2  head
//!      2     1  level_flag
//!      3     1  frame_reserve
//!      4     8  sn
//!     12     8  version
//!     20     2  bandwidth
//!     22    53  imu (quaternion[4], gyroscope[3], accelerometer[3], rpy[3], temperature i8)
//!     75   640  motor_state[20] (skipped)
//!    715    34  bms
//!    749     8  foot_force[4] i16
//!    757     8  foot_force_est[4] i16
//!    765     1  mode
//!    766     4  progress f32
//!    770     1  gait_type
//!    771     4  foot_raise_height f32
//!    775    12  position[3] f32
//!    787     4  body_height f32
//!    791    12  velocity[3] f32
//!    803     4  yaw_speed f32
//! ```
//!
//! 之后的字段（测距、遥控器、CRC）不参与诊断，因此只要求最小长度
//! [`HIGH_STATE_MIN_LEN`]，更长的报文同样接受。

use crate::ProtocolError;
use crate::command::HIGH_CMD_HEAD;
use bytes::Buf;

/// 解析所需的最小报文长度
pub const HIGH_STATE_MIN_LEN: usize = 807;

const MOTOR_STATE_LEN: usize = 20 * 32;

/// IMU 数据
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Imu {
    pub quaternion: [f32; 4],
    pub gyroscope: [f32; 3],
    pub accelerometer: [f32; 3],
    /// roll / pitch / yaw（弧度）
    pub rpy: [f32; 3],
    pub temperature: i8,
}

/// 电池管理系统状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BmsState {
    pub version_h: u8,
    pub version_l: u8,
    pub status: u8,
    /// 电量百分比
    pub soc: u8,
    /// 电流（mA，放电为负）
    pub current: i32,
    pub cycle: u16,
    /// BQ 芯片温度（℃）
    pub bq_ntc: [i8; 2],
    /// MCU 温度（℃）
    pub mcu_ntc: [i8; 2],
    /// 单体电压（mV）
    pub cell_vol: [u16; 10],
}

impl BmsState {
    /// 总电压（mV），即所有单体电压之和
    pub fn total_voltage_mv(&self) -> u32 {
        self.cell_vol.iter().map(|&v| u32::from(v)).sum()
    }
}

/// 高层状态
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighState {
    pub level_flag: u8,
    pub sn: [u8; 8],
    pub version: [u8; 8],
    pub bandwidth: u16,
    pub imu: Imu,
    pub bms: BmsState,
    pub foot_force: [i16; 4],
    pub foot_force_est: [i16; 4],
    /// 原始模式字节（固件可能上报本库未定义的模式）
    pub mode: u8,
    pub progress: f32,
    pub gait_type: u8,
    pub foot_raise_height: f32,
    pub position: [f32; 3],
    pub body_height: f32,
    pub velocity: [f32; 3],
    pub yaw_speed: f32,
}

impl HighState {
    /// 解析一条原始报文
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HIGH_STATE_MIN_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: HIGH_STATE_MIN_LEN,
                actual: data.len(),
            });
        }
        if data[..2] != HIGH_CMD_HEAD {
            return Err(ProtocolError::InvalidHeader(u16::from_be_bytes([
                data[0], data[1],
            ])));
        }

        let mut buf = &data[2..HIGH_STATE_MIN_LEN];
        let level_flag = buf.get_u8();
        buf.advance(1);
        let mut sn = [0u8; 8];
        buf.copy_to_slice(&mut sn);
        let mut version = [0u8; 8];
        buf.copy_to_slice(&mut version);
        let bandwidth = buf.get_u16_le();

        let imu = Imu {
            quaternion: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            gyroscope: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            accelerometer: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            rpy: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            temperature: buf.get_i8(),
        };

        buf.advance(MOTOR_STATE_LEN);

        let mut bms = BmsState {
            version_h: buf.get_u8(),
            version_l: buf.get_u8(),
            status: buf.get_u8(),
            soc: buf.get_u8(),
            current: buf.get_i32_le(),
            cycle: buf.get_u16_le(),
            bq_ntc: [buf.get_i8(), buf.get_i8()],
            mcu_ntc: [buf.get_i8(), buf.get_i8()],
            cell_vol: [0; 10],
        };
        for v in &mut bms.cell_vol {
            *v = buf.get_u16_le();
        }

        let mut foot_force = [0i16; 4];
        for f in &mut foot_force {
            *f = buf.get_i16_le();
        }
        let mut foot_force_est = [0i16; 4];
        for f in &mut foot_force_est {
            *f = buf.get_i16_le();
        }

        Ok(Self {
            level_flag,
            sn,
            version,
            bandwidth,
            imu,
            bms,
            foot_force,
            foot_force_est,
            mode: buf.get_u8(),
            progress: buf.get_f32_le(),
            gait_type: buf.get_u8(),
            foot_raise_height: buf.get_f32_le(),
            position: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            body_height: buf.get_f32_le(),
            velocity: [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()],
            yaw_speed: buf.get_f32_le(),
        })
    }
}

/// 以十六进制打印字节，例如 `01 04 02 15`
pub fn byte_print(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 解码序列号
///
/// 格式：`<机型> <版本> (<部件>) <生产年月>-<批次>-<编号>`，未知编码显示为 `?`。
pub fn decode_sn(sn: &[u8; 8]) -> String {
    const TYPE_NAME: [&str; 5] = ["Laikago", "Aliengo", "A1", "Go1", "B1"];
    const MODEL_NAME: [&str; 5] = ["AIR", "PRO", "EDU", "PC", "XX"];
    const PRODUCT_NAME: [&str; 5] = [
        "BlackBone",
        "Sensor",
        "Sensor with Speaker",
        "BlackBone with Speaker",
        "Foot Force Sensor",
    ];

    let lookup = |table: &[&'static str], code: u8| -> &'static str {
        usize::from(code)
            .checked_sub(1)
            .and_then(|i| table.get(i).copied())
            .unwrap_or("?")
    };

    format!(
        "{} {} ({}) {:02}{:02}-{}-{}",
        lookup(&TYPE_NAME, sn[0]),
        lookup(&MODEL_NAME, sn[1]),
        lookup(&PRODUCT_NAME, sn[2]),
        sn[3],
        sn[4],
        sn[5],
        hex::encode_upper(&sn[6..8]),
    )
}

/// 解码固件版本：`hw <a.b.c> / sw <d.e.f>`
pub fn decode_version(version: &[u8; 8]) -> String {
    format!(
        "hw {}.{}.{} / sw {}.{}.{}",
        version[0], version[1], version[2], version[3], version[4], version[5]
    )
}
