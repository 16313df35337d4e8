//! 状态监听命令
//!
//! 建立会话后只读取状态报文，不发送任何运动指令。

use crate::session::{SessionArgs, install_stop_handler};
use anyhow::{Context, Result, bail};
use calcip_control::{Clock, MotionController, log_state};
use calcip_transport::UdpConnection;
use clap::Args;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::warn;

/// 监听命令参数
#[derive(Args, Debug)]
pub struct SniffCommand {
    /// 监听时长（秒）
    #[arg(long, default_value_t = 5.0)]
    pub seconds: f64,

    /// 读取间隔（秒）
    #[arg(long, default_value_t = 1.0)]
    pub interval: f64,
}

impl SniffCommand {
    pub fn execute(&self, session: &SessionArgs) -> Result<()> {
        if !self.interval.is_finite() || self.interval <= 0.0 {
            bail!("--interval 必须为正数");
        }
        if !self.seconds.is_finite() || self.seconds < 0.0 {
            bail!("--seconds 不能为负数");
        }

        let settings = session.connection.unwrap_or_default().settings();
        println!("🔌 连接到 {} ...", settings.robot_addr());
        let conn = UdpConnection::new(&settings)
            .with_context(|| format!("无法绑定本地地址 {}", settings.local_addr()))?;
        let mut controller = MotionController::new(conn);
        let stop = controller.stop_handle();
        install_stop_handler(stop.clone())?;

        controller.connect()?;

        let reads = (self.seconds / self.interval).ceil() as u64;
        let mut received = 0;
        for _ in 0..reads {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            controller.clock().sleep(Duration::from_secs_f64(self.interval));
            match controller.parse_data()? {
                Some(state) => {
                    received += 1;
                    log_state(&state);
                },
                None => warn!("No state packet received in the last {:.1} s", self.interval),
            }
        }

        println!("✅ 共收到 {} 次状态", received);
        Ok(())
    }
}
