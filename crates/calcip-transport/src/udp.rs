//! UDP 连接
//!
//! 主线程通过 `send()` 发指令；后台线程阻塞在 `recv_from`（100ms 超时），
//! 把收到的报文推入 crossbeam 通道，`get_data()` 一次性取走。

use crate::{Connection, ConnectionSettings, TransportError};
use crossbeam_channel::{Receiver, TryRecvError, unbounded};
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 单个 UDP 报文的最大长度（高层状态报文约 1KB）
const RECV_BUFFER_LEN: usize = 2048;

/// 接收超时（决定 Drop 时线程退出的最长等待）
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// UDP 连接
pub struct UdpConnection {
    socket: UdpSocket,

    /// 机器人指令地址
    robot_addr: SocketAddr,

    /// 接收通道（`start_receive` 之后才存在）
    rx: Option<Receiver<Vec<u8>>>,

    /// 接收线程停止标志
    stop: Arc<AtomicBool>,

    /// 接收线程句柄
    rx_handle: Option<thread::JoinHandle<()>>,
}

impl UdpConnection {
    /// 绑定本地地址并创建连接
    pub fn new(settings: &ConnectionSettings) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(settings.local_addr())?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;

        debug!(
            "UDP connection bound to {}, robot at {}",
            socket.local_addr()?,
            settings.robot_addr()
        );

        Ok(Self {
            socket,
            robot_addr: settings.robot_addr(),
            rx: None,
            stop: Arc::new(AtomicBool::new(false)),
            rx_handle: None,
        })
    }

    /// 实际绑定的本地地址（端口为 0 时由系统分配）
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn robot_addr(&self) -> SocketAddr {
        self.robot_addr
    }
}

impl Connection for UdpConnection {
    fn start_receive(&mut self) -> Result<(), TransportError> {
        if self.rx.is_some() {
            return Ok(());
        }

        let socket = self.socket.try_clone()?;
        let stop_flag = Arc::clone(&self.stop);
        let (tx, rx) = unbounded();

        let handle = thread::Builder::new()
            .name("calcip-rx".into())
            .spawn(move || {
                let mut buf = [0u8; RECV_BUFFER_LEN];
                while !stop_flag.load(Ordering::Relaxed) {
                    match socket.recv_from(&mut buf) {
                        Ok((len, from)) => {
                            trace!("received {} bytes from {}", len, from);
                            if tx.send(buf[..len].to_vec()).is_err() {
                                break;
                            }
                        },
                        Err(e)
                            if matches!(
                                e.kind(),
                                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                            ) => {},
                        Err(e) => {
                            warn!("UDP receive error: {}", e);
                            thread::sleep(RECV_TIMEOUT);
                        },
                    }
                }
                debug!("UDP receive thread stopped");
            })?;

        self.rx = Some(rx);
        self.rx_handle = Some(handle);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.socket.send_to(payload, self.robot_addr)?;
        Ok(())
    }

    fn get_data(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let rx = self.rx.as_ref().ok_or(TransportError::NotStarted)?;

        let mut packets = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(packet) => packets.push(packet),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if packets.is_empty() {
                        return Err(TransportError::ReceiverClosed);
                    }
                    break;
                },
            }
        }
        Ok(packets)
    }
}

impl Drop for UdpConnection {
    fn drop(&mut self) {
        // 停止接收线程
        self.stop.store(true, Ordering::Relaxed);

        // 等待接收线程退出（最多一个接收超时周期）
        if let Some(handle) = self.rx_handle.take() {
            let _ = handle.join();
        }
    }
}
