//! 俯卧撑节拍
//!
//! 每个逻辑循环的第一个 tick 切换到 `StandDown`，半个循环处切换到 `StandUp`，
//! 其余 tick 重复发送上一条指令。

use calcip_protocol::{HighCmd, MotorModeHigh};

/// 第 `t` 个 tick 需要切换的模式（`None` 表示保持上一条指令）
pub fn push_up_command(t: u64, publish_hz: u32) -> Option<MotorModeHigh> {
    let hz = u64::from(publish_hz);
    if hz == 0 {
        return None;
    }
    match t % hz {
        0 => Some(MotorModeHigh::StandDown),
        r if r == hz / 2 => Some(MotorModeHigh::StandUp),
        _ => None,
    }
}

/// 把第 `t` 个 tick 的切换写入指令，返回是否发生了切换
pub fn apply_push_up(cmd: &mut HighCmd, t: u64, publish_hz: u32) -> bool {
    match push_up_command(t, publish_hz) {
        Some(MotorModeHigh::StandUp) => {
            cmd.set_pose(MotorModeHigh::StandUp, [0.0; 3], 0.0);
            true
        },
        Some(mode) => {
            cmd.mode = mode;
            cmd.euler = [0.0; 3];
            true
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_up_cadence() {
        assert_eq!(push_up_command(0, 200), Some(MotorModeHigh::StandDown));
        assert_eq!(push_up_command(1, 200), None);
        assert_eq!(push_up_command(100, 200), Some(MotorModeHigh::StandUp));
        assert_eq!(push_up_command(200, 200), Some(MotorModeHigh::StandDown));
        assert_eq!(push_up_command(300, 200), Some(MotorModeHigh::StandUp));
        assert_eq!(push_up_command(25, 51), Some(MotorModeHigh::StandUp));
    }

    #[test]
    fn test_apply_push_up_keeps_body_height_on_stand_down() {
        let mut cmd = HighCmd::default();
        cmd.body_height = -0.1;
        cmd.euler = [0.2, 0.1, 0.0];

        assert!(apply_push_up(&mut cmd, 0, 100));
        assert_eq!(cmd.mode, MotorModeHigh::StandDown);
        assert_eq!(cmd.euler, [0.0; 3]);
        assert_eq!(cmd.body_height, -0.1);

        assert!(!apply_push_up(&mut cmd, 10, 100));
        assert_eq!(cmd.mode, MotorModeHigh::StandDown);

        assert!(apply_push_up(&mut cmd, 50, 100));
        assert_eq!(cmd.mode, MotorModeHigh::StandUp);
        assert_eq!(cmd.body_height, 0.0);
    }
}
