//! TOML 演出配置
//!
//! 一场演出由连接参数、全局节拍和有序的 `[[routine]]` 列表组成：
//!
//! ```toml
//! time_signature = 4
//! bpm = 60.0
//! verbosity = "minimal"
//! connection = "high_wifi"
//!
//! [[routine]]
//! type = "sin_euler"
//! publish_hz = 200
//! loop_repeats = 8
//! mode = "rand_dance"
//!
//! [[routine]]
//! type = "tempo"
//! bpm = 90.0
//!
//! [[routine]]
//! type = "pose"
//! roll = "left"
//! bars = 2.0
//!
//! [[routine]]
//! type = "pause"
//! seconds = 1.5
//! ```
//!
//! 所有例程在第一条指令发出之前统一校验（[`ShowConfig::validate`]）。

use crate::controller::Verbosity;
use crate::error::ConfigError;
use crate::pacing::Tempo;
use crate::params::{DEFAULT_TIME_SIGNATURE, MotionParameters, PoseRequest, PushUpParameters, Timing};
use crate::safety::{SafetyPolicy, ValidationWarning, validate_motion, validate_pose, validate_push_up};
use calcip_transport::{ConnectionPreset, ConnectionSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// 配置文件读写错误
#[derive(Error, Debug)]
pub enum ShowConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid show file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize show: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// 连接配置：预设名或完整参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionConfig {
    Preset(ConnectionPreset),
    Custom(ConnectionSettings),
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::Preset(ConnectionPreset::HighWifi)
    }
}

impl ConnectionConfig {
    pub fn settings(&self) -> ConnectionSettings {
        match self {
            ConnectionConfig::Preset(preset) => preset.settings(),
            ConnectionConfig::Custom(settings) => *settings,
        }
    }
}

/// 演出中的一个例程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Routine {
    SinEuler(MotionParameters),
    Pose(PoseRequest),
    PushUp(PushUpParameters),
    /// 原地等待
    Pause { seconds: f64 },
    /// 修改后续例程的节拍
    Tempo { bpm: f64 },
}

impl Routine {
    pub fn name(&self) -> &'static str {
        match self {
            Routine::SinEuler(_) => "sin_euler",
            Routine::Pose(_) => "pose",
            Routine::PushUp(_) => "push_up",
            Routine::Pause { .. } => "pause",
            Routine::Tempo { .. } => "tempo",
        }
    }

    fn timing_mut(&mut self) -> Option<&mut Timing> {
        match self {
            Routine::SinEuler(p) => Some(&mut p.timing),
            Routine::Pose(p) => Some(&mut p.timing),
            Routine::PushUp(p) => Some(&mut p.timing),
            Routine::Pause { .. } | Routine::Tempo { .. } => None,
        }
    }
}

/// 单个例程的预检结果
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineCheck {
    pub name: &'static str,
    /// 修正后参数的状态块
    pub summary: String,
    pub warnings: Vec<ValidationWarning>,
}

impl RoutineCheck {
    fn new(routine: &Routine, summary: String, warnings: Vec<ValidationWarning>) -> Self {
        Self {
            name: routine.name(),
            summary,
            warnings,
        }
    }
}

/// 演出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    /// 每小节拍数
    pub time_signature: u32,
    /// 全局节拍，设置后覆盖各例程自己的 `bpm`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    /// 全局 BPM 上限，只填充没有自行指定上限的例程
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm_limiter: Option<f64>,
    pub verbosity: Verbosity,
    /// 开始前执行 RECOVERY → FORCE_STAND
    pub recover: bool,
    pub connection: ConnectionConfig,
    #[serde(rename = "routine")]
    pub routines: Vec<Routine>,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            time_signature: DEFAULT_TIME_SIGNATURE,
            bpm: None,
            bpm_limiter: None,
            verbosity: Verbosity::default(),
            recover: true,
            connection: ConnectionConfig::default(),
            routines: Vec::new(),
        }
    }
}

impl ShowConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ShowConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ShowConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ShowConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ShowConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let show = Self::from_toml_str(&content)?;
        info!("Loaded show with {} routine(s) from {}", show.routines.len(), path.display());
        Ok(show)
    }

    /// 保存到文件（父目录不存在时自动创建）
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ShowConfigError> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        let write_err = |source| ShowConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        debug!("Saved show to {}", path.display());
        Ok(())
    }

    /// 展开全局节拍后的例程列表（`tempo` 例程被消化）
    pub fn resolved_routines(&self) -> Result<Vec<Routine>, ConfigError> {
        if self.time_signature == 0 {
            return Err(ConfigError::InvalidTimeSignature(self.time_signature));
        }

        let limiter = self
            .bpm_limiter
            .unwrap_or(SafetyPolicy::pose().default_bpm_limiter);
        let mut tempo = self.bpm.map(|bpm| Tempo::new(bpm, limiter)).transpose()?;

        let mut resolved = Vec::with_capacity(self.routines.len());
        for routine in &self.routines {
            match routine {
                Routine::Tempo { bpm } => {
                    match tempo.as_mut() {
                        Some(t) => {
                            t.change_bpm(*bpm)?;
                        },
                        None => tempo = Some(Tempo::new(*bpm, limiter)?),
                    }
                    continue;
                },
                Routine::Pause { seconds } if !seconds.is_finite() || *seconds < 0.0 => {
                    return Err(ConfigError::InvalidDuration {
                        field: "seconds",
                        value: *seconds,
                    });
                },
                _ => {},
            }

            let mut routine = routine.clone();
            if let Some(timing) = routine.timing_mut() {
                if let Some(t) = &tempo {
                    timing.bpm = t.bpm();
                }
                if timing.bpm_limiter.is_none() {
                    timing.bpm_limiter = self.bpm_limiter;
                }
            }
            resolved.push(routine);
        }
        Ok(resolved)
    }

    /// 逐个预检例程（第一个致命错误即返回）
    pub fn preflight(&self) -> Result<Vec<RoutineCheck>, ConfigError> {
        let mut checks = Vec::new();
        for routine in self.resolved_routines()? {
            let check = match &routine {
                Routine::SinEuler(params) => {
                    let policy = SafetyPolicy::for_mode(params.mode);
                    let validated = validate_motion(params, &policy)?;
                    RoutineCheck::new(&routine, validated.value.to_string(), validated.warnings)
                },
                Routine::Pose(request) => {
                    let validated =
                        validate_pose(request, &SafetyPolicy::pose(), self.time_signature)?;
                    RoutineCheck::new(&routine, validated.value.to_string(), validated.warnings)
                },
                Routine::PushUp(params) => {
                    let validated = validate_push_up(params, &SafetyPolicy::oscillation())?;
                    RoutineCheck::new(&routine, validated.value.to_string(), validated.warnings)
                },
                Routine::Pause { seconds } => {
                    RoutineCheck::new(&routine, format!("Pause: {seconds:.3} s"), Vec::new())
                },
                Routine::Tempo { .. } => continue,
            };
            checks.push(check);
        }
        Ok(checks)
    }

    /// 预检所有例程，返回全部非致命警告
    pub fn validate(&self) -> Result<Vec<ValidationWarning>, ConfigError> {
        Ok(self
            .preflight()?
            .into_iter()
            .flat_map(|check| check.warnings)
            .collect())
    }

    /// 内置示例演出
    pub fn example() -> Self {
        Self {
            bpm: Some(60.0),
            routines: vec![
                Routine::SinEuler(MotionParameters::default()),
                Routine::Pause { seconds: 1.0 },
                Routine::Pose(PoseRequest {
                    bars: Some(2.0),
                    ..PoseRequest::default()
                }),
                Routine::PushUp(PushUpParameters::default()),
            ],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choreography::OscillationMode;
    use crate::params::RollPose;

    const SHOW: &str = r#"
        time_signature = 3
        bpm = 120.0
        verbosity = "all"
        connection = "high_wired"

        [[routine]]
        type = "sin_euler"
        publish_hz = 100
        loop_repeats = 4
        mode = "rand_dance"

        [[routine]]
        type = "tempo"
        bpm = 40.0

        [[routine]]
        type = "pose"
        roll = "left"
        bars = 1.0

        [[routine]]
        type = "pause"
        seconds = 0.5
    "#;

    #[test]
    fn test_parse_show() {
        let show = ShowConfig::from_toml_str(SHOW).unwrap();
        assert_eq!(show.time_signature, 3);
        assert_eq!(show.verbosity, Verbosity::All);
        assert_eq!(show.connection, ConnectionConfig::Preset(ConnectionPreset::HighWired));
        assert!(show.recover);
        assert_eq!(show.routines.len(), 4);
        match &show.routines[0] {
            Routine::SinEuler(p) => {
                assert_eq!(p.mode, OscillationMode::RandDance);
                assert_eq!(p.timing.publish_hz, 100);
            },
            other => panic!("unexpected routine {}", other.name()),
        }
        match &show.routines[2] {
            Routine::Pose(p) => assert_eq!(p.pose.roll, RollPose::Left),
            other => panic!("unexpected routine {}", other.name()),
        }
    }

    #[test]
    fn test_custom_connection() {
        let show = ShowConfig::from_toml_str(
            r#"
            [connection]
            listen_port = 9000
            robot_ip = "10.0.0.2"
            send_port = 9001
            local_ip = "10.0.0.1"
            "#,
        )
        .unwrap();
        let settings = show.connection.settings();
        assert_eq!(settings.listen_port, 9000);
        assert_eq!(settings.robot_addr().to_string(), "10.0.0.2:9001");
    }

    #[test]
    fn test_resolved_routines_apply_tempo() {
        let show = ShowConfig::from_toml_str(SHOW).unwrap();
        let resolved = show.resolved_routines().unwrap();
        assert_eq!(resolved.len(), 3);
        match (&resolved[0], &resolved[1]) {
            (Routine::SinEuler(motion), Routine::Pose(pose)) => {
                // 120 被全局上限 60 减半；tempo 例程把后续节拍改为 40
                assert_eq!(motion.timing.bpm, 60.0);
                assert_eq!(pose.timing.bpm, 40.0);
            },
            _ => panic!("unexpected routine order"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_routine() {
        let mut show = ShowConfig::from_toml_str(SHOW).unwrap();
        assert!(show.validate().is_ok());

        show.routines.push(Routine::PushUp(PushUpParameters {
            timing: Timing {
                publish_hz: 10,
                ..Timing::default()
            },
        }));
        assert!(matches!(
            show.validate(),
            Err(ConfigError::PublishHzOutOfRange { hz: 10, .. })
        ));
    }

    #[test]
    fn test_preflight_reports_each_routine() {
        let show = ShowConfig::from_toml_str(SHOW).unwrap();
        let checks = show.preflight().unwrap();
        let names: Vec<&str> = checks.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["sin_euler", "pose", "pause"]);
        assert!(checks[2].summary.contains("0.500"));
        // 全局 120 BPM 在振荡策略下再次减半
        assert!(checks[0].warnings.iter().any(|w| matches!(
            w,
            ValidationWarning::BpmClamped { requested, clamped } if *requested == 60.0 && *clamped == 30.0
        )));
    }

    #[test]
    fn test_negative_pause_rejected() {
        let show = ShowConfig {
            routines: vec![Routine::Pause { seconds: -1.0 }],
            ..ShowConfig::default()
        };
        assert!(matches!(
            show.resolved_routines(),
            Err(ConfigError::InvalidDuration { field: "seconds", .. })
        ));
    }

    #[test]
    fn test_unknown_routine_type() {
        let result = ShowConfig::from_toml_str(
            r#"
            [[routine]]
            type = "moonwalk"
            "#,
        );
        assert!(matches!(result, Err(ShowConfigError::Parse(_))));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("show.toml");

        let show = ShowConfig::example();
        show.save_to_file(&path).unwrap();
        let loaded = ShowConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, show);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShowConfig::load_from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ShowConfigError::Read { .. }));
    }
}
