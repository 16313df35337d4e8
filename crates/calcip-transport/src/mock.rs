//! Mock 连接
//!
//! 纯内存实现，不打开任何 socket。`MockConnection` 交给控制器，
//! 测试代码保留对应的 [`MockHandle`]，用来注入遥测报文、
//! 检查已发送的指令或模拟发送失败。

use crate::{Connection, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Shared {
    sent: Vec<Vec<u8>>,
    rx: VecDeque<Vec<u8>>,
    started: bool,
    fail_sends: usize,
}

/// Mock 连接
#[derive(Debug)]
pub struct MockConnection {
    shared: Arc<Mutex<Shared>>,
}

/// 测试侧句柄（与 `MockConnection` 共享状态）
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // 测试中 panic 导致的 poison 不影响队列内容
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockConnection {
    /// 创建连接及其测试句柄
    pub fn new() -> (Self, MockHandle) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            MockHandle { shared },
        )
    }
}

impl MockHandle {
    /// 注入一条待接收的报文
    pub fn push_rx(&self, packet: Vec<u8>) {
        lock(&self.shared).rx.push_back(packet);
    }

    /// 取走目前为止发送的所有报文
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut lock(&self.shared).sent)
    }

    pub fn sent_count(&self) -> usize {
        lock(&self.shared).sent.len()
    }

    pub fn is_started(&self) -> bool {
        lock(&self.shared).started
    }

    /// 让接下来的 `n` 次发送失败
    pub fn fail_next_sends(&self, n: usize) {
        lock(&self.shared).fail_sends = n;
    }
}

impl Connection for MockConnection {
    fn start_receive(&mut self) -> Result<(), TransportError> {
        lock(&self.shared).started = true;
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut shared = lock(&self.shared);
        if shared.fail_sends > 0 {
            shared.fail_sends -= 1;
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock send failure",
            )));
        }
        shared.sent.push(payload.to_vec());
        Ok(())
    }

    fn get_data(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut shared = lock(&self.shared);
        if !shared.started {
            return Err(TransportError::NotStarted);
        }
        Ok(shared.rx.drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_requires_start() {
        let (mut conn, handle) = MockConnection::new();
        assert!(matches!(conn.get_data(), Err(TransportError::NotStarted)));
        conn.start_receive().unwrap();
        assert!(handle.is_started());
        assert!(conn.get_data().unwrap().is_empty());
    }

    #[test]
    fn test_mock_rx_queue_drains() {
        let (mut conn, handle) = MockConnection::new();
        conn.start_receive().unwrap();
        handle.push_rx(vec![1]);
        handle.push_rx(vec![2]);
        assert_eq!(conn.get_data().unwrap(), vec![vec![1], vec![2]]);
        assert!(conn.get_data().unwrap().is_empty());
    }

    #[test]
    fn test_mock_send_failures() {
        let (mut conn, handle) = MockConnection::new();
        handle.fail_next_sends(2);
        assert!(conn.send(&[1]).is_err());
        assert!(conn.send(&[2]).is_err());
        conn.send(&[3]).unwrap();
        assert_eq!(handle.take_sent(), vec![vec![3]]);
        assert_eq!(handle.sent_count(), 0);
    }
}
