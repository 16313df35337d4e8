//! # Calcip Protocol
//!
//! 四足机器人高层 UDP 协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `command`: 高层控制指令（`HighCmd`）及其固定布局序列化
//! - `state`: 高层状态反馈（`HighState`）解析
//! - `crc`: 指令校验和
//!
//! ## 字节序
//!
//! 与 CAN 协议不同，高层 UDP 协议全部使用小端字节序（little-endian），
//! 浮点数按 IEEE-754 `f32` 编码。

pub mod command;
pub mod crc;
pub mod state;

// 重新导出常用类型
pub use command::*;
pub use crc::crc32_core;
pub use state::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid packet length: expected at least {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid packet header: 0x{0:04X}")]
    InvalidHeader(u16),

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },

    #[error("CRC mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    CrcMismatch { expected: u32, actual: u32 },
}
