//! # Calcip CLI
//!
//! 四足机器人节拍同步舞蹈的命令行工具。
//!
//! ## 单个例程
//!
//! ```bash
//! # 连续振荡（每个循环 = 60 / bpm 秒）
//! calcip sin-euler --bpm 60 --amplitude 0.5,0.5,0.4 --period 1,1,1 --loop-repeats 4
//!
//! # 随机舞蹈
//! calcip sin-euler --mode rand_dance --publish-hz 200
//!
//! # 姿态：向左侧倾，保持 2 小节
//! calcip pose --roll left --bars 2
//!
//! # 俯卧撑
//! calcip push-up --loop-repeats 8
//! ```
//!
//! ## 演出文件
//!
//! ```bash
//! calcip config init          # 写入示例演出到默认配置目录
//! calcip config check         # 预检（不连接机器人）
//! calcip show                 # 运行默认演出
//! calcip show my_show.toml --yes
//! ```
//!
//! 所有参数在连接之前完成校验；运动开始前默认要求确认（`--yes` 跳过）。
//! Ctrl-C 在下一个 tick 边界处停止循环，然后执行关停序列。

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod session;
mod utils;

use commands::{
    ConfigCommand, PoseCommand, PushUpCommand, ShowCommand, SinEulerCommand, SniffCommand,
};
use session::SessionArgs;

/// Calcip CLI - 节拍同步的四足机器人舞蹈
#[derive(Parser, Debug)]
#[command(name = "calcip")]
#[command(about = "Beat-synchronized choreography for quadruped robots", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 演出文件管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 三轴连续振荡（含舞蹈模式）
    SinEuler {
        #[command(flatten)]
        args: SinEulerCommand,
    },

    /// 三段式姿态：接近 → 保持 → 返回
    Pose {
        #[command(flatten)]
        args: PoseCommand,
    },

    /// 俯卧撑
    PushUp {
        #[command(flatten)]
        args: PushUpCommand,
    },

    /// 只读取并打印机器人状态报文
    Sniff {
        #[command(flatten)]
        args: SniffCommand,
    },

    /// 运行 TOML 演出文件
    Show {
        #[command(flatten)]
        args: ShowCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志（RUST_LOG 优先）
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("calcip=info"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),

        Commands::SinEuler { args } => {
            let routine = args.to_routine()?;
            session::run_single(routine, &cli.session)
        },

        Commands::Pose { args } => {
            let routine = args.to_routine();
            session::run_single(routine, &cli.session)
        },

        Commands::PushUp { args } => {
            let routine = args.to_routine();
            session::run_single(routine, &cli.session)
        },

        Commands::Sniff { args } => args.execute(&cli.session),

        Commands::Show { args } => args.execute(&cli.session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["calcip", "push-up", "--yes", "--verbosity", "all"]).unwrap();
        assert!(cli.session.yes);
        assert!(matches!(cli.command, Commands::PushUp { .. }));
    }
}
