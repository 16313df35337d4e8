//! 振荡函数库
//!
//! 闭集合 `{sin, -sin, |sin|, -|sin|}`，每个函数把相位角（弧度）映射到 `[-1, 1]`。
//! 三轴波形按下式逐轴合成：
//!
//! ```text
//! value[i] = amplitude[i] * f_i(2π / period[i] * (t / publish_hz + phase[i])) + offset[i]
//! ```
//!
//! 相位与 `t / publish_hz` 同单位（循环时间），禁用的轴恒为 0。

use crate::axis::AxisArray;
use crate::error::ConfigError;
use crate::params::WaveParams;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// 振荡函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oscillator {
    /// `sin(x)`
    #[default]
    Sin,
    /// `-sin(x)`
    NegSin,
    /// `|sin(x)|`
    AbsSin,
    /// `-|sin(x)|`
    NegAbsSin,
}

impl Oscillator {
    pub const ALL: [Oscillator; 4] = [
        Oscillator::Sin,
        Oscillator::NegSin,
        Oscillator::AbsSin,
        Oscillator::NegAbsSin,
    ];

    /// 在相位角 `x`（弧度）处取值
    #[inline]
    pub fn sample(self, x: f64) -> f64 {
        match self {
            Oscillator::Sin => x.sin(),
            Oscillator::NegSin => -x.sin(),
            Oscillator::AbsSin => x.sin().abs(),
            Oscillator::NegAbsSin => -x.sin().abs(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Oscillator::Sin => "sin",
            Oscillator::NegSin => "neg_sin",
            Oscillator::AbsSin => "abs_sin",
            Oscillator::NegAbsSin => "neg_abs_sin",
        }
    }
}

impl fmt::Display for Oscillator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Oscillator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Oscillator::ALL
            .into_iter()
            .find(|o| o.name() == s)
            .ok_or_else(|| ConfigError::UnknownOscillator(s.to_string()))
    }
}

/// 计算第 `t` 个 tick 的三轴设定值
pub fn compose(wave: &WaveParams, t: u64, publish_hz: u32) -> AxisArray<f64> {
    let x = t as f64 / f64::from(publish_hz);

    AxisArray::splat(()).map_with_axis(|axis, ()| {
        if !wave.enabled[axis] {
            return 0.0;
        }
        let angle = 2.0 * PI / wave.period[axis] * (x + wave.phase[axis]);
        wave.amplitude[axis] * wave.oscillator[axis].sample(angle) + wave.offset[axis]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;

    const EPS: f64 = 1e-9;

    fn wave(amplitude: [f64; 3], period: [f64; 3]) -> WaveParams {
        WaveParams {
            amplitude: amplitude.into(),
            period: period.into(),
            ..WaveParams::default()
        }
    }

    #[test]
    fn test_oscillator_values() {
        let x = PI / 2.0;
        assert!((Oscillator::Sin.sample(x) - 1.0).abs() < EPS);
        assert!((Oscillator::NegSin.sample(x) + 1.0).abs() < EPS);
        let x = -PI / 2.0;
        assert!((Oscillator::AbsSin.sample(x) - 1.0).abs() < EPS);
        assert!((Oscillator::NegAbsSin.sample(x) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_oscillator_from_str() {
        assert_eq!("neg_abs_sin".parse::<Oscillator>().unwrap(), Oscillator::NegAbsSin);
        assert_eq!(
            "cos".parse::<Oscillator>().unwrap_err(),
            ConfigError::UnknownOscillator("cos".to_string())
        );
        for osc in Oscillator::ALL {
            assert_eq!(osc.to_string().parse::<Oscillator>().unwrap(), osc);
        }
    }

    #[test]
    fn test_compose_zero_crossings() {
        // 200Hz、周期 1：tick 0 与 tick 100（半周期）都过零
        let w = wave([0.5, 0.5, 0.4], [1.0, 1.0, 1.0]);
        for t in [0, 100] {
            let v = compose(&w, t, 200);
            for axis in Axis::ALL {
                assert!(v[axis].abs() < EPS, "t={t} {axis}={}", v[axis]);
            }
        }
        // 四分之一周期达到振幅
        let v = compose(&w, 50, 200);
        assert!((v[Axis::Roll] - 0.5).abs() < EPS);
        assert!((v[Axis::Yaw] - 0.4).abs() < EPS);
    }

    #[test]
    fn test_compose_offset_and_phase() {
        let mut w = wave([0.2, 0.0, 0.0], [2.0, 1.0, 1.0]);
        w.offset[Axis::Roll] = 0.1;
        // 相位 0.5（循环时间单位），周期 2 → 角度 π/2
        w.phase[Axis::Roll] = 0.5;
        let v = compose(&w, 0, 100);
        assert!((v[Axis::Roll] - 0.3).abs() < EPS);
    }

    #[test]
    fn test_compose_disabled_axis() {
        let mut w = wave([0.5, 0.5, 0.5], [1.0, 1.0, 1.0]);
        w.offset = AxisArray::splat(0.2);
        w.enabled[Axis::Pitch] = false;
        for t in 0..400 {
            assert_eq!(compose(&w, t, 200)[Axis::Pitch], 0.0);
        }
    }
}
