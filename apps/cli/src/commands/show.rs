//! 运行演出文件

use crate::commands::config::{load_show, resolve_show_file};
use crate::session::{SessionArgs, run_show};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// 演出命令参数
#[derive(Args, Debug)]
pub struct ShowCommand {
    /// 演出文件（默认：配置目录下的 show.toml）
    pub file: Option<PathBuf>,
}

impl ShowCommand {
    pub fn execute(&self, session: &SessionArgs) -> Result<()> {
        let path = resolve_show_file(self.file.as_deref())?;
        let mut show = load_show(&path)?;
        session.apply(&mut show);

        println!("🎵 演出: {}（{} 个例程）", path.display(), show.routines.len());
        run_show(&show, session.yes)
    }
}
