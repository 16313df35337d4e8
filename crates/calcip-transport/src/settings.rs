//! 连接参数与预设
//!
//! 机器人高层控制器在 WiFi 热点与有线网口下使用不同的网段，
//! 两组预设与厂商默认配置一致。

use crate::TransportError;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// UDP 连接参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionSettings {
    /// 本地监听端口（机器人把状态报文发到这里）
    pub listen_port: u16,
    /// 机器人 IP
    pub robot_ip: Ipv4Addr,
    /// 机器人指令端口
    pub send_port: u16,
    /// 本地绑定 IP
    pub local_ip: Ipv4Addr,
}

impl ConnectionSettings {
    /// 本地绑定地址
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.local_ip, self.listen_port))
    }

    /// 机器人指令地址
    pub fn robot_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.robot_ip, self.send_port))
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        HIGH_WIFI_DEFAULTS
    }
}

/// WiFi 热点下的高层控制默认参数
pub const HIGH_WIFI_DEFAULTS: ConnectionSettings = ConnectionSettings {
    listen_port: 8090,
    robot_ip: Ipv4Addr::new(192, 168, 12, 1),
    send_port: 8082,
    local_ip: Ipv4Addr::new(192, 168, 12, 14),
};

/// 有线网口下的高层控制默认参数
pub const HIGH_WIRED_DEFAULTS: ConnectionSettings = ConnectionSettings {
    listen_port: 8090,
    robot_ip: Ipv4Addr::new(192, 168, 123, 161),
    send_port: 8082,
    local_ip: Ipv4Addr::new(192, 168, 123, 10),
};

/// 连接预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionPreset {
    #[default]
    HighWifi,
    HighWired,
}

impl ConnectionPreset {
    pub fn settings(self) -> ConnectionSettings {
        match self {
            ConnectionPreset::HighWifi => HIGH_WIFI_DEFAULTS,
            ConnectionPreset::HighWired => HIGH_WIRED_DEFAULTS,
        }
    }
}

impl FromStr for ConnectionPreset {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "high_wifi" | "wifi" => Ok(ConnectionPreset::HighWifi),
            "high_wired" | "wired" => Ok(ConnectionPreset::HighWired),
            other => Err(TransportError::InvalidAddress(format!(
                "unknown connection preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ConnectionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPreset::HighWifi => write!(f, "high_wifi"),
            ConnectionPreset::HighWired => write!(f, "high_wired"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_settings() {
        let wifi = ConnectionPreset::HighWifi.settings();
        assert_eq!(wifi.robot_addr().to_string(), "192.168.12.1:8082");
        assert_eq!(wifi.local_addr().to_string(), "192.168.12.14:8090");

        let wired = ConnectionPreset::HighWired.settings();
        assert_eq!(wired.robot_addr().to_string(), "192.168.123.161:8082");
        assert_eq!(wired.local_addr().to_string(), "192.168.123.10:8090");
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("wifi".parse::<ConnectionPreset>().unwrap(), ConnectionPreset::HighWifi);
        assert_eq!(
            "HIGH-WIRED".parse::<ConnectionPreset>().unwrap(),
            ConnectionPreset::HighWired
        );
        assert!(matches!(
            "lowlevel".parse::<ConnectionPreset>(),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_preset_display_parses_back() {
        for preset in [ConnectionPreset::HighWifi, ConnectionPreset::HighWired] {
            assert_eq!(preset.to_string().parse::<ConnectionPreset>().unwrap(), preset);
        }
    }
}
