//! 命令行参数辅助函数

use anyhow::{Result, bail};
use calcip_control::AxisArray;

/// 逗号分隔的三个值 → roll / pitch / yaw
pub fn axis_array<T: Copy>(name: &str, values: &[T]) -> Result<AxisArray<T>> {
    match values {
        [roll, pitch, yaw] => Ok(AxisArray::new([*roll, *pitch, *yaw])),
        _ => bail!("--{} 需要 3 个值（roll,pitch,yaw），实际为 {} 个", name, values.len()),
    }
}
