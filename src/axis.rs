//! Head-rotation axes and a small per-axis record type.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One independent head-rotation degree of freedom mapped to one CC stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Pitch,
    Yaw,
    Roll,
}

impl Axis {
    /// Fixed processing and emission order.
    pub const ALL: [Axis; 3] = [Axis::Pitch, Axis::Yaw, Axis::Roll];

    pub fn index(&self) -> usize {
        match self {
            Axis::Pitch => 0,
            Axis::Yaw => 1,
            Axis::Roll => 2,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
            Axis::Roll => "roll",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which end of a calibrated range an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBound {
    Min,
    Max,
}

impl RangeBound {
    pub fn opposite(&self) -> RangeBound {
        match self {
            RangeBound::Min => RangeBound::Max,
            RangeBound::Max => RangeBound::Min,
        }
    }
}

/// Value held once per axis, indexable by [`Axis`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerAxis<T> {
    pub pitch: T,
    pub yaw: T,
    pub roll: T,
}

impl<T> PerAxis<T> {
    pub fn new(pitch: T, yaw: T, roll: T) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn from_fn(mut f: impl FnMut(Axis) -> T) -> Self {
        Self {
            pitch: f(Axis::Pitch),
            yaw: f(Axis::Yaw),
            roll: f(Axis::Roll),
        }
    }

    pub fn get(&self, axis: Axis) -> &T {
        match axis {
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
            Axis::Roll => &self.roll,
        }
    }

    pub fn get_mut(&mut self, axis: Axis) -> &mut T {
        match axis {
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
            Axis::Roll => &mut self.roll,
        }
    }

    /// Iterate in pitch, yaw, roll order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, &T)> {
        Axis::ALL.into_iter().map(move |axis| (axis, self.get(axis)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Axis, &T) -> U) -> PerAxis<U> {
        PerAxis::from_fn(|axis| f(axis, self.get(axis)))
    }
}

impl<T> Index<Axis> for PerAxis<T> {
    type Output = T;

    fn index(&self, axis: Axis) -> &T {
        self.get(axis)
    }
}

impl<T> IndexMut<Axis> for PerAxis<T> {
    fn index_mut(&mut self, axis: Axis) -> &mut T {
        self.get_mut(axis)
    }
}
