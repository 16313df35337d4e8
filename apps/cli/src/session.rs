//! 运动会话
//!
//! 每次运行：预检 → 确认 → 连接 → 恢复 → 例程 → 关停。
//! 关停序列在任何错误之后都会执行。

use anyhow::{Context, Result, bail};
use calcip_control::{
    ConnectionConfig, ControlError, MotionController, Routine, RoutineCheck, ShowConfig, Verbosity,
};
use calcip_transport::{ConnectionPreset, UdpConnection};
use clap::{Args, ValueEnum};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// 输出级别
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityArg {
    None,
    Minimal,
    All,
}

impl From<VerbosityArg> for Verbosity {
    fn from(arg: VerbosityArg) -> Self {
        match arg {
            VerbosityArg::None => Verbosity::None,
            VerbosityArg::Minimal => Verbosity::Minimal,
            VerbosityArg::All => Verbosity::All,
        }
    }
}

/// 所有运动命令共享的会话参数
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// 连接预设（high_wifi / high_wired），覆盖演出文件
    #[arg(long, global = true)]
    pub connection: Option<ConnectionPreset>,

    /// 逐 tick 诊断输出级别，覆盖演出文件
    #[arg(long, global = true, value_enum)]
    pub verbosity: Option<VerbosityArg>,

    /// 拍号（每小节拍数），覆盖演出文件
    #[arg(long, global = true)]
    pub time_signature: Option<u32>,

    /// 跳过运动前的确认提示
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// 开始前不执行 RECOVERY → FORCE_STAND
    #[arg(long, global = true)]
    pub no_recover: bool,
}

impl SessionArgs {
    /// 命令行参数覆盖演出设置
    pub fn apply(&self, show: &mut ShowConfig) {
        if let Some(preset) = self.connection {
            show.connection = ConnectionConfig::Preset(preset);
        }
        if let Some(verbosity) = self.verbosity {
            show.verbosity = verbosity.into();
        }
        if let Some(time_signature) = self.time_signature {
            show.time_signature = time_signature;
        }
        if self.no_recover {
            show.recover = false;
        }
    }
}

/// 运行单个例程
pub fn run_single(routine: Routine, session: &SessionArgs) -> Result<()> {
    let mut show = ShowConfig {
        routines: vec![routine],
        ..ShowConfig::default()
    };
    session.apply(&mut show);
    run_show(&show, session.yes)
}

/// 打印预检结果
pub fn print_checks(checks: &[RoutineCheck]) {
    for (i, check) in checks.iter().enumerate() {
        println!("#{} {}", i + 1, check.name);
        println!("{}", check.summary.trim_end());
        for warning in &check.warnings {
            println!("  ⚠️  {}", warning);
        }
    }
}

/// 运行整场演出
pub fn run_show(show: &ShowConfig, assume_yes: bool) -> Result<()> {
    // 1. 预检：任何致命错误都在连接之前返回
    let checks = show.preflight().context("参数校验失败，未发送任何指令")?;
    for check in &checks {
        for warning in &check.warnings {
            warn!("[{}] {}", check.name, warning);
        }
    }
    if checks.is_empty() {
        bail!("演出中没有可执行的例程");
    }

    // 2. 确认
    if !assume_yes {
        println!("📋 演出计划:");
        print_checks(&checks);
        let confirmed = inquire::Confirm::new("确定要开始运动吗？")
            .with_default(false)
            .prompt()
            .context("用户交互失败")?;
        if !confirmed {
            println!("❌ 已取消");
            return Ok(());
        }
    }

    let routines = show.resolved_routines()?;

    // 3. 连接
    let settings = show.connection.settings();
    println!("🔌 连接到 {} ...", settings.robot_addr());
    let conn = UdpConnection::new(&settings)
        .with_context(|| format!("无法绑定本地地址 {}", settings.local_addr()))?;
    let mut controller = MotionController::new(conn)
        .with_verbosity(show.verbosity)
        .with_time_signature(show.time_signature);
    install_stop_handler(controller.stop_handle())?;

    // 4. 运动；无论结果如何都执行关停序列
    let result = perform(&mut controller, show.recover, &routines);
    println!("🛑 执行关停序列...");
    let shutdown = controller.terminate_control();

    match (result, shutdown) {
        (Ok(()), Ok(())) => {
            println!("✅ 演出结束");
            Ok(())
        },
        (Err(ControlError::Interrupted), Ok(())) => {
            println!("⏹️  已中断，机器人已关停");
            Ok(())
        },
        (Err(e), Ok(())) => Err(e).context("演出中止，机器人已关停"),
        (Ok(()), Err(e)) => Err(e).context("关停序列未完整执行"),
        (Err(e), Err(shutdown_err)) => {
            error!("Shutdown failed as well: {}", shutdown_err);
            Err(e).context("演出中止，且关停序列未完整执行")
        },
    }
}

fn perform(
    controller: &mut MotionController<UdpConnection>,
    recover: bool,
    routines: &[Routine],
) -> Result<(), ControlError> {
    controller.connect()?;
    controller.parse_data()?;
    if recover {
        controller.recover_control()?;
    }

    for (i, routine) in routines.iter().enumerate() {
        info!("▶ Routine {}/{}: {}", i + 1, routines.len(), routine.name());
        if let Some(report) = controller.run_routine(routine)? {
            info!(
                "  {} ticks in {:.3} s, {} overrun(s), {} send failure(s), rerolls {}/{}",
                report.ticks,
                report.elapsed.as_secs_f64(),
                report.overruns,
                report.send_failures,
                report.rerolls_applied,
                report.rerolls_applied + report.rerolls_rejected
            );
        }
    }
    Ok(())
}

/// Ctrl-C 只置位停止标志，控制循环在 tick 边界处退出
pub fn install_stop_handler(stop: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if stop.swap(true, Ordering::Relaxed) {
            eprintln!("\n⏳ 正在停止，请稍候...");
        } else {
            eprintln!("\n⏹️  收到中断信号，将在下一个 tick 停止");
        }
    })
    .context("无法注册 Ctrl-C 处理函数")
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcip_control::PushUpParameters;

    #[test]
    fn test_session_args_override_show() {
        let args = SessionArgs {
            connection: Some(ConnectionPreset::HighWired),
            verbosity: Some(VerbosityArg::All),
            time_signature: Some(3),
            yes: true,
            no_recover: true,
        };
        let mut show = ShowConfig::default();
        args.apply(&mut show);

        assert_eq!(show.connection, ConnectionConfig::Preset(ConnectionPreset::HighWired));
        assert_eq!(show.verbosity, Verbosity::All);
        assert_eq!(show.time_signature, 3);
        assert!(!show.recover);
    }

    #[test]
    fn test_session_args_keep_show_values() {
        let mut show = ShowConfig {
            time_signature: 6,
            verbosity: Verbosity::None,
            ..ShowConfig::default()
        };
        SessionArgs::default().apply(&mut show);
        assert_eq!(show.time_signature, 6);
        assert_eq!(show.verbosity, Verbosity::None);
        assert!(show.recover);
    }

    #[test]
    fn test_invalid_routine_fails_before_connecting() {
        let mut params = PushUpParameters::default();
        params.timing.loop_repeats = 0;
        let err = run_single(Routine::PushUp(params), &SessionArgs::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("loop_repeats"));
    }
}
