use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Distance every updatable site must keep from each lattice face.
///
/// Velocity decisions probe neighborhoods centered two sites away, and those
/// neighborhoods reach one site further, so the margin is kept well above the
/// radius actually touched.
pub const FIELD_MARGIN: usize = 5;

/// Integer lattice coordinate of fixed arity.
///
/// The same type doubles as the lattice extent: `dims.component(axis)` is the
/// number of sites along `axis`. Indexing is row-major with the first axis
/// varying slowest.
pub trait LatticeCoord:
    Copy + Debug + PartialEq + Eq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Number of axes (2 or 3).
    const AXES: usize;
    /// CSV column names for the coordinate components.
    const HEADER: &'static [&'static str];

    fn origin() -> Self;
    fn component(self, axis: usize) -> usize;
    fn with_component(self, axis: usize, value: usize) -> Self;

    /// Moves `delta` sites along `axis`. `None` when the result would be negative.
    #[inline(always)]
    fn offset(self, axis: usize, delta: isize) -> Option<Self> {
        self.component(axis)
            .checked_add_signed(delta)
            .map(|v| self.with_component(axis, v))
    }

    /// Total number of sites for a lattice with these extents.
    fn volume(self) -> usize {
        (0..Self::AXES).map(|axis| self.component(axis)).product()
    }

    /// True when `self` addresses a site inside a lattice of extent `dims`.
    fn within(self, dims: Self) -> bool {
        (0..Self::AXES).all(|axis| self.component(axis) < dims.component(axis))
    }

    /// True when the site keeps `FIELD_MARGIN` from every face of `dims`.
    #[inline(always)]
    fn in_field(self, dims: Self) -> bool {
        (0..Self::AXES).all(|axis| {
            let c = self.component(axis);
            c >= FIELD_MARGIN && c + FIELD_MARGIN <= dims.component(axis)
        })
    }

    /// Row-major linear index, `None` when out of range.
    #[inline(always)]
    fn index(self, dims: Self) -> Option<usize> {
        if !self.within(dims) {
            return None;
        }
        Some((0..Self::AXES).fold(0, |idx, axis| idx * dims.component(axis) + self.component(axis)))
    }

    /// Inverse of [`LatticeCoord::index`]. Caller guarantees `idx < dims.volume()`.
    fn from_index(mut idx: usize, dims: Self) -> Self {
        let mut coord = Self::origin();
        for axis in (0..Self::AXES).rev() {
            let extent = dims.component(axis);
            coord = coord.with_component(axis, idx % extent);
            idx /= extent;
        }
        coord
    }

    /// Geometric center, each component halved (integer division).
    fn center(self) -> Self {
        (0..Self::AXES).fold(Self::origin(), |c, axis| c.with_component(axis, self.component(axis) / 2))
    }

    /// Orthogonal (Von Neumann) neighbors at distance `radius`, ordered per axis
    /// as `-radius` then `+radius`. Coordinates that would go negative are skipped;
    /// the upper bound is the caller's concern.
    fn von_neumann(self, radius: usize) -> Vec<Self> {
        let r = radius as isize;
        (0..Self::AXES)
            .flat_map(|axis| [-r, r].into_iter().map(move |d| (axis, d)))
            .filter_map(|(axis, d)| self.offset(axis, d))
            .collect()
    }

    fn components(self) -> Vec<usize> {
        (0..Self::AXES).map(|axis| self.component(axis)).collect()
    }
}

/// Planar lattice coordinate: `x` is the row, `y` the column.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord2 {
    pub x: usize,
    pub y: usize,
}

impl Coord2 {
    pub fn new(x: usize, y: usize) -> Self {
        Coord2 { x, y }
    }
}

impl LatticeCoord for Coord2 {
    const AXES: usize = 2;
    const HEADER: &'static [&'static str] = &["x", "y"];

    fn origin() -> Self {
        Coord2::default()
    }

    #[inline(always)]
    fn component(self, axis: usize) -> usize {
        match axis {
            0 => self.x,
            _ => self.y,
        }
    }

    #[inline(always)]
    fn with_component(self, axis: usize, value: usize) -> Self {
        match axis {
            0 => Coord2 { x: value, ..self },
            _ => Coord2 { y: value, ..self },
        }
    }
}

/// Volumetric lattice coordinate: row, column, aisle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Coord3 {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Coord3 { x, y, z }
    }
}

impl LatticeCoord for Coord3 {
    const AXES: usize = 3;
    const HEADER: &'static [&'static str] = &["x", "y", "z"];

    fn origin() -> Self {
        Coord3::default()
    }

    #[inline(always)]
    fn component(self, axis: usize) -> usize {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    #[inline(always)]
    fn with_component(self, axis: usize, value: usize) -> Self {
        match axis {
            0 => Coord3 { x: value, ..self },
            1 => Coord3 { y: value, ..self },
            _ => Coord3 { z: value, ..self },
        }
    }
}
