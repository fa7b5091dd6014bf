//! Matrix Geometry
//!
//! The LED matrix is a set of vertical strings hung side by side. A cell is
//! addressed by [`Point`] `(row, col)`: `row` runs along a string
//! (`0..height`), `col` selects the string (`0..width`).
//!
//! # Linear addressing
//!
//! Sequences may also address cells by a flat index. The index walks one
//! whole string before moving to the next (column-major):
//!
//! ```text
//! col = index / height
//! row = index - col * height
//! ```
//!
//! This is also the order cells are streamed to the hardware.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// A cell coordinate, possibly off-grid
///
/// Coordinates are signed so sequence arithmetic can drift outside the
/// matrix (a particle entering from row `-3`). Off-grid points are simply
/// ignored when drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Position along a string
    pub row: i32,
    /// Which string
    pub col: i32,
}

impl Point {
    /// Create a point
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.row + rhs.row, self.col + rhs.col)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        *self = *self + rhs;
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Dimensions of the LED matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixSize {
    /// Number of strings
    pub width: usize,
    /// LEDs per string
    pub height: usize,
}

impl MatrixSize {
    /// Create a matrix size
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of cells
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Check if a point lies on the grid
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        usize::try_from(point.row).is_ok_and(|row| row < self.height)
            && usize::try_from(point.col).is_ok_and(|col| col < self.width)
    }

    /// Map a linear index to its cell (column-major)
    ///
    /// Indices past the last cell map to a column `>= width`, which
    /// [`contains`](Self::contains) rejects.
    ///
    /// # Examples
    ///
    /// ```
    /// use julelys_core::matrix::{MatrixSize, Point};
    ///
    /// let size = MatrixSize::new(8, 55);
    /// assert_eq!(size.point_at(0), Point::new(0, 0));
    /// assert_eq!(size.point_at(54), Point::new(54, 0));
    /// assert_eq!(size.point_at(55), Point::new(0, 1));
    /// ```
    #[must_use]
    pub fn point_at(&self, index: usize) -> Point {
        if self.height == 0 {
            return Point::new(0, i32::MAX);
        }
        let col = index / self.height;
        let row = index - col * self.height;
        Point::new(
            i32::try_from(row).unwrap_or(i32::MAX),
            i32::try_from(col).unwrap_or(i32::MAX),
        )
    }

    /// Map an on-grid point back to its linear index
    #[must_use]
    pub fn index_of(&self, point: Point) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        // contains() guarantees both coordinates are non-negative
        let row = point.row.unsigned_abs() as usize;
        let col = point.col.unsigned_abs() as usize;
        Some(col * self.height + row)
    }

    /// Iterate every on-grid point in linear-index order
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        (0..self.cell_count()).map(|index| self.point_at(index))
    }
}

impl Default for MatrixSize {
    fn default() -> Self {
        Self::new(8, 55)
    }
}

impl fmt::Display for MatrixSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_index_round_trips() {
        for size in [
            MatrixSize::new(8, 55),
            MatrixSize::new(1, 1),
            MatrixSize::new(3, 7),
            MatrixSize::new(16, 2),
        ] {
            for index in 0..size.cell_count() {
                let point = size.point_at(index);
                assert!(size.contains(point), "{point} should be on {size}");
                assert_eq!(size.index_of(point), Some(index));
            }
        }
    }

    #[test]
    fn test_linear_index_is_column_major() {
        let size = MatrixSize::new(8, 55);
        assert_eq!(size.point_at(56), Point::new(1, 1));
        assert_eq!(size.point_at(8 * 55 - 1), Point::new(54, 7));
    }

    #[test]
    fn test_index_past_end_is_off_grid() {
        let size = MatrixSize::new(8, 55);
        assert!(!size.contains(size.point_at(size.cell_count())));
    }

    #[test]
    fn test_contains_rejects_negative_and_overflow() {
        let size = MatrixSize::new(4, 10);
        assert!(!size.contains(Point::new(-1, 0)));
        assert!(!size.contains(Point::new(0, -1)));
        assert!(!size.contains(Point::new(10, 0)));
        assert!(!size.contains(Point::new(0, 4)));
        assert!(size.contains(Point::new(9, 3)));
    }

    #[test]
    fn test_point_arithmetic() {
        let mut p = Point::new(1, 2);
        p += Point::new(-3, 1);
        assert_eq!(p, Point::new(-2, 3));
    }
}
