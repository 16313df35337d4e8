//! # Calcip Transport
//!
//! 与机器人高层控制器之间的 UDP 指令/遥测链路。
//!
//! 上层控制循环只依赖 [`Connection`] trait 的三个操作：
//!
//! - `start_receive()`：启动后台接收线程（fire-and-forget）
//! - `send(bytes)`：发送一条已序列化的指令
//! - `get_data()`：非阻塞地取走目前为止收到的所有报文
//!
//! ## 后端
//!
//! - [`UdpConnection`]：真实 UDP socket + 后台接收线程
//! - `MockConnection`（`mock` feature）：内存队列，用于测试

pub mod settings;
pub mod udp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use settings::*;
pub use udp::UdpConnection;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnection, MockHandle};

use calcip_protocol::HighCmd;
use thiserror::Error;

/// 传输层错误
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket 底层错误
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 地址或预设名称无法解析
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// 尚未调用 `start_receive()`
    #[error("Receiver not started")]
    NotStarted,

    /// 后台接收线程已退出
    #[error("Receiver closed")]
    ReceiverClosed,
}

/// 指令发送边界
///
/// 实现者负责 socket 生命周期与后台接收；控制循环在单线程内独占一个连接，
/// 每个 tick 调用一次 `send`，并可随时调用 `get_data` 轮询遥测。
pub trait Connection {
    /// 启动后台接收（重复调用无副作用）
    fn start_receive(&mut self) -> Result<(), TransportError>;

    /// 发送一条已序列化的指令
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// 取走所有已接收的报文（可能为空，不阻塞）
    fn get_data(&mut self) -> Result<Vec<Vec<u8>>, TransportError>;

    /// 序列化并发送一条高层指令
    fn send_cmd(&mut self, cmd: &HighCmd) -> Result<(), TransportError> {
        self.send(&cmd.build())
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn start_receive(&mut self) -> Result<(), TransportError> {
        (**self).start_receive()
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }

    fn get_data(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        (**self).get_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::NotStarted.to_string(), "Receiver not started");
        assert_eq!(TransportError::ReceiverClosed.to_string(), "Receiver closed");
        assert_eq!(
            TransportError::InvalidAddress("foo".into()).to_string(),
            "Invalid address: foo"
        );
        let io = std::io::Error::other("boom");
        assert!(TransportError::from(io).to_string().contains("boom"));
    }

    #[test]
    fn test_boxed_connection_delegates() {
        let (mock, handle) = MockConnection::new();
        let mut boxed: Box<dyn Connection> = Box::new(mock);
        boxed.start_receive().unwrap();
        boxed.send(&[1, 2, 3]).unwrap();
        assert_eq!(handle.take_sent(), vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_send_cmd_serializes_command() {
        use calcip_protocol::{HIGH_CMD_LEN, MotorModeHigh};

        let (mut mock, handle) = MockConnection::new();
        mock.send_cmd(&HighCmd::with_mode(MotorModeHigh::StandUp)).unwrap();
        let sent = handle.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), HIGH_CMD_LEN);
        assert_eq!(HighCmd::parse(&sent[0]).unwrap().mode, MotorModeHigh::StandUp);
    }
}
