//! 姿态轴索引和数组
//!
//! 所有逐轴参数（振幅、周期、相位、偏移、使能、振荡函数）都使用
//! [`AxisArray`] 存储，用 [`Axis`] 枚举索引，避免裸下标。
//!
//! # 示例
//!
//! ```rust
//! use calcip_control::{Axis, AxisArray};
//!
//! let amplitude = AxisArray::new([0.5, 0.5, 0.4]);
//! assert_eq!(amplitude[Axis::Yaw], 0.4);
//!
//! let reversed = amplitude.map(|a| -a);
//! assert_eq!(reversed[Axis::Roll], -0.5);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// 姿态轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// 横滚
    Roll = 0,
    /// 俯仰
    Pitch = 1,
    /// 偏航
    Yaw = 2,
}

impl Axis {
    /// 所有轴
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// 轴索引（0-2）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::Roll),
            1 => Some(Axis::Pitch),
            2 => Some(Axis::Yaw),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 三轴数组
///
/// 序列化为普通的三元素数组（TOML 中写作 `amplitude = [0.5, 0.5, 0.4]`）。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisArray<T> {
    data: [T; 3],
}

impl<T: Copy> Copy for AxisArray<T> {}

impl<T> AxisArray<T> {
    #[inline]
    pub const fn new(data: [T; 3]) -> Self {
        AxisArray { data }
    }

    #[inline]
    pub fn as_array(&self) -> &[T; 3] {
        &self.data
    }

    #[inline]
    pub fn into_array(self) -> [T; 3] {
        self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// 映射转换
    pub fn map<U, F>(self, mut f: F) -> AxisArray<U>
    where
        F: FnMut(T) -> U,
    {
        let [r, p, y] = self.data;
        AxisArray::new([f(r), f(p), f(y)])
    }

    /// 带轴标识的映射转换
    pub fn map_with_axis<U, F>(self, mut f: F) -> AxisArray<U>
    where
        F: FnMut(Axis, T) -> U,
    {
        let [r, p, y] = self.data;
        AxisArray::new([f(Axis::Roll, r), f(Axis::Pitch, p), f(Axis::Yaw, y)])
    }

    /// 与另一个数组逐轴组合
    pub fn map_with<U, V, F>(self, other: AxisArray<U>, mut f: F) -> AxisArray<V>
    where
        F: FnMut(T, U) -> V,
    {
        let [r1, p1, y1] = self.data;
        let [r2, p2, y2] = other.data;
        AxisArray::new([f(r1, r2), f(p1, p2), f(y1, y2)])
    }
}

impl<T: Copy> AxisArray<T> {
    /// 所有轴取相同值
    #[inline]
    pub const fn splat(value: T) -> Self {
        AxisArray {
            data: [value, value, value],
        }
    }
}

impl AxisArray<f64> {
    /// 转为指令使用的 `f32` 数组
    pub fn to_f32(self) -> [f32; 3] {
        self.map(|v| v as f32).into_array()
    }

    /// 最大分量
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

impl<T> Index<Axis> for AxisArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, axis: Axis) -> &T {
        &self.data[axis.index()]
    }
}

impl<T> IndexMut<Axis> for AxisArray<T> {
    #[inline]
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        &mut self.data[axis.index()]
    }
}

impl<T> From<[T; 3]> for AxisArray<T> {
    fn from(data: [T; 3]) -> Self {
        AxisArray::new(data)
    }
}

impl<T> From<AxisArray<T>> for [T; 3] {
    fn from(array: AxisArray<T>) -> Self {
        array.data
    }
}

impl<'a, T> IntoIterator for &'a AxisArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<T> IntoIterator for AxisArray<T> {
    type Item = T;
    type IntoIter = std::array::IntoIter<T, 3>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}
