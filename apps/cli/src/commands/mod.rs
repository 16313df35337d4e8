//! 命令定义和实现

pub mod config;
pub mod motion;
pub mod show;
pub mod sniff;

pub use config::ConfigCommand;
pub use motion::{PoseCommand, PushUpCommand, SinEulerCommand};
pub use show::ShowCommand;
pub use sniff::SniffCommand;
