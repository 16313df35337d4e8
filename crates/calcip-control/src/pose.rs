//! Pose Sequencer - 三段式姿态序列
//!
//! 接近（Approach）→ 保持（Hold）→ 返回（Return）。
//!
//! # 算法
//!
//! ```text
//! Approach: linspace(0, target, move_step_qty)，四个自由度独立插值
//!           shaky 时从 ceil(publish_hz / 5) 开始叠加同一组噪声
//! Hold:     hold_ticks 个 tick，target + 每个自由度独立的 ±smoothness 抖动
//! Return:   Approach 数组逆序
//! ```
//!
//! 返回段严格是接近段的逆序，所以最后一个设定值总是接近段的第一个，
//! 即全零的中立姿态。
//!
//! # 示例
//!
//! ```rust
//! use calcip_control::{PoseSequencer, PoseTarget, PosePhase};
//! use rand::SeedableRng;
//!
//! let mut target = PoseTarget::NEUTRAL;
//! target.euler[calcip_control::Axis::Roll] = -0.5;
//!
//! let sequencer = PoseSequencer::new(target, 200, 200, 800, 0.0, false);
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let sequence = sequencer.sequence(&mut rng);
//! assert_eq!(sequence.len(), 1200);
//!
//! for (phase, setpoint) in sequence {
//!     if phase == PosePhase::Hold {
//!         assert_eq!(setpoint.euler[calcip_control::Axis::Roll], -0.5);
//!     }
//! }
//! ```

use crate::axis::{Axis, AxisArray};
use crate::params::PoseTarget;
use crate::safety::PosePlan;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// 单个 tick 的设定值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setpoint {
    pub euler: AxisArray<f64>,
    pub body_height: f64,
}

impl Setpoint {
    pub const NEUTRAL: Setpoint = Setpoint {
        euler: AxisArray::splat(0.0),
        body_height: 0.0,
    };

    pub const fn new(euler: AxisArray<f64>, body_height: f64) -> Self {
        Self { euler, body_height }
    }
}

impl Default for Setpoint {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl From<PoseTarget> for Setpoint {
    fn from(target: PoseTarget) -> Self {
        Self::new(target.euler, target.body_height)
    }
}

/// 序列阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosePhase {
    Approach,
    Hold,
    Return,
}

impl fmt::Display for PosePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PosePhase::Approach => "approach",
            PosePhase::Hold => "hold",
            PosePhase::Return => "return",
        };
        f.write_str(name)
    }
}

/// 线性插值，包含两个端点
///
/// `n == 0` 返回空数组，`n == 1` 返回 `[start]`。
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        },
    }
}

/// 姿态序列生成器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSequencer {
    target: PoseTarget,
    move_step_qty: usize,
    hold_ticks: usize,
    smoothness: f64,
    shaky: bool,
    /// 接近段前 `settle_ticks` 个采样不叠加噪声
    settle_ticks: usize,
}

impl PoseSequencer {
    pub fn new(
        target: PoseTarget,
        publish_hz: u32,
        move_step_qty: usize,
        hold_ticks: usize,
        smoothness: f64,
        shaky: bool,
    ) -> Self {
        Self {
            target,
            move_step_qty,
            hold_ticks,
            smoothness,
            shaky,
            settle_ticks: publish_hz.div_ceil(5) as usize,
        }
    }

    pub fn from_plan(plan: &PosePlan) -> Self {
        Self::new(
            plan.target(),
            plan.timing().publish_hz(),
            plan.move_step_qty(),
            plan.hold_ticks(),
            plan.smoothness(),
            plan.shaky(),
        )
    }

    pub fn settle_ticks(&self) -> usize {
        self.settle_ticks
    }

    /// 生成一次完整的三段序列（每次调用重新采样噪声）
    ///
    /// 接近段预先生成；保持段的抖动在迭代到该 tick 时才采样，
    /// 噪声源由 `rng` 派生出独立的种子。
    pub fn sequence<R: Rng>(&self, rng: &mut R) -> PoseSequence {
        let n = self.move_step_qty;
        let roll = linspace(0.0, self.target.euler[Axis::Roll], n);
        let pitch = linspace(0.0, self.target.euler[Axis::Pitch], n);
        let yaw = linspace(0.0, self.target.euler[Axis::Yaw], n);
        let height = linspace(0.0, self.target.body_height, n);

        let mut approach: Vec<Setpoint> = (0..n)
            .map(|i| Setpoint::new(AxisArray::new([roll[i], pitch[i], yaw[i]]), height[i]))
            .collect();

        if self.shaky {
            for setpoint in approach.iter_mut().skip(self.settle_ticks) {
                let noise = rng.gen_range(-1.0..=1.0) * self.smoothness;
                setpoint.euler = setpoint.euler.map(|v| v + noise);
                setpoint.body_height += noise;
            }
        }

        PoseSequence {
            approach,
            target: Setpoint::from(self.target),
            hold_ticks: self.hold_ticks,
            smoothness: self.smoothness,
            hold_rng: StdRng::seed_from_u64(rng.r#gen()),
            current_index: 0,
        }
    }
}

/// 一次重复的设定值序列
///
/// 实现 [`Iterator`]，依次产出 `(阶段, 设定值)`。
#[derive(Debug, Clone)]
pub struct PoseSequence {
    approach: Vec<Setpoint>,
    target: Setpoint,
    hold_ticks: usize,
    smoothness: f64,
    hold_rng: StdRng,
    current_index: usize,
}

impl PoseSequence {
    pub fn approach(&self) -> &[Setpoint] {
        &self.approach
    }

    pub fn hold_ticks(&self) -> usize {
        self.hold_ticks
    }

    /// 返回段（接近段逆序）
    pub fn return_path(
        &self,
    ) -> impl DoubleEndedIterator<Item = &Setpoint> + ExactSizeIterator {
        self.approach.iter().rev()
    }

    /// 总 tick 数
    pub fn len(&self) -> usize {
        2 * self.approach.len() + self.hold_ticks
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hold_sample(&mut self) -> Setpoint {
        let s = self.smoothness;
        let rng = &mut self.hold_rng;
        let euler = self.target.euler.map(|v| v + rng.gen_range(-1.0..=1.0) * s);
        let body_height = self.target.body_height + rng.gen_range(-1.0..=1.0) * s;
        Setpoint::new(euler, body_height)
    }
}

impl Iterator for PoseSequence {
    type Item = (PosePhase, Setpoint);

    fn next(&mut self) -> Option<Self::Item> {
        let tick = self.current_index;
        let n = self.approach.len();
        let hold_end = n + self.hold_ticks;
        let item = if tick < n {
            (PosePhase::Approach, self.approach[tick])
        } else if tick < hold_end {
            (PosePhase::Hold, self.hold_sample())
        } else if tick < hold_end + n {
            (PosePhase::Return, self.approach[n - 1 - (tick - hold_end)])
        } else {
            return None;
        };
        self.current_index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PoseSequence {}
