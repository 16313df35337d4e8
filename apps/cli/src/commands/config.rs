//! 演出文件管理命令
//!
//! 默认演出文件位于 `<config_dir>/calcip/show.toml`。

use crate::session::print_checks;
use anyhow::{Context, Result, bail};
use calcip_control::ShowConfig;
use clap::Subcommand;
use std::path::{Path, PathBuf};

/// 配置目录
fn config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;

    path.push("calcip");
    Ok(path)
}

/// 默认演出文件路径
pub fn default_show_file() -> Result<PathBuf> {
    let mut path = config_dir()?;
    path.push("show.toml");
    Ok(path)
}

/// 命令行指定的路径，否则使用默认路径
pub fn resolve_show_file(file: Option<&Path>) -> Result<PathBuf> {
    match file {
        Some(path) => Ok(path.to_path_buf()),
        None => default_show_file(),
    }
}

/// 读取演出文件
pub fn load_show(path: &Path) -> Result<ShowConfig> {
    ShowConfig::load_from_file(path).with_context(|| format!("读取演出文件失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入示例演出文件
    Init {
        /// 演出文件路径（默认：配置目录）
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 显示默认演出文件路径
    Path,

    /// 打印演出文件（规范化后的 TOML）
    Get {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 预检演出文件（不连接机器人）
    Check {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Init { file, force } => Self::init_(file, force),

            ConfigCommand::Path => {
                println!("{}", default_show_file()?.display());
                Ok(())
            },

            ConfigCommand::Get { file } => Self::get_(file),

            ConfigCommand::Check { file } => Self::check_(file),
        }
    }

    fn init_(file: Option<PathBuf>, force: bool) -> Result<()> {
        let path = resolve_show_file(file.as_deref())?;
        if path.exists() && !force {
            bail!("{} 已存在（使用 --force 覆盖）", path.display());
        }

        ShowConfig::example()
            .save_to_file(&path)
            .with_context(|| format!("写入演出文件失败: {}", path.display()))?;
        println!("✅ 已写入示例演出: {}", path.display());
        Ok(())
    }

    fn get_(file: Option<PathBuf>) -> Result<()> {
        let path = resolve_show_file(file.as_deref())?;
        let show = load_show(&path)?;
        print!("{}", show.to_toml_string()?);
        Ok(())
    }

    fn check_(file: Option<PathBuf>) -> Result<()> {
        let path = resolve_show_file(file.as_deref())?;
        let show = load_show(&path)?;
        let checks = show.preflight().context("演出校验失败")?;

        println!("演出文件: {}", path.display());
        println!("  连接: {}", show.connection.settings().robot_addr());
        println!("  拍号: {}", show.time_signature);
        print_checks(&checks);

        let warnings: usize = checks.iter().map(|c| c.warnings.len()).sum();
        println!("✅ 校验通过（{} 个例程，{} 条警告）", checks.len(), warnings);
        Ok(())
    }
}
