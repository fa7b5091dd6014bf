//! Frame Buffer
//!
//! A [`Frame`] is one complete grid of colors. Cells are stored in
//! linear-index order (see [`crate::matrix`]) so the transmission encoder can
//! stream them without reordering.
//!
//! A frame's dimensions are fixed at construction. Writes outside the grid
//! are dropped without error so sequences can let particles drift off the
//! edge.

use crate::color::Color;
use crate::matrix::{MatrixSize, Point};

/// A fixed-size grid of RGBW cells
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    size: MatrixSize,
    cells: Vec<Color>,
}

impl Frame {
    /// Create an all-black frame
    #[must_use]
    pub fn new(size: MatrixSize) -> Self {
        Self::filled(size, Color::BLACK)
    }

    /// Create a frame with every cell set to `color`
    #[must_use]
    pub fn filled(size: MatrixSize, color: Color) -> Self {
        Self {
            size,
            cells: vec![color; size.cell_count()],
        }
    }

    /// Frame dimensions
    #[must_use]
    pub fn size(&self) -> MatrixSize {
        self.size
    }

    /// Write a cell; off-grid points are ignored
    pub fn set(&mut self, point: Point, color: Color) {
        if let Some(index) = self.size.index_of(point) {
            self.cells[index] = color;
        }
    }

    /// Write a cell by linear index; indices past the end are ignored
    pub fn set_index(&mut self, index: usize, color: Color) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = color;
        }
    }

    /// Read a cell, `None` when off-grid
    #[must_use]
    pub fn get(&self, point: Point) -> Option<Color> {
        self.size.index_of(point).map(|index| self.cells[index])
    }

    /// Set every cell to `color`
    pub fn fill(&mut self, color: Color) {
        self.cells.fill(color);
    }

    /// Set every cell to black
    pub fn clear(&mut self) {
        self.fill(Color::BLACK);
    }

    /// Cells in linear-index order
    #[must_use]
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    /// Check if every cell holds `color`
    #[must_use]
    pub fn is_filled_with(&self, color: Color) -> bool {
        self.cells.iter().all(|cell| *cell == color)
    }

    /// Overwrite this frame with the contents of `other`
    ///
    /// Both frames must share dimensions; mismatched sources are ignored.
    pub fn copy_from(&mut self, other: &Frame) {
        if self.size == other.size {
            self.cells.copy_from_slice(&other.cells);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_new_frame_is_black() {
        let frame = Frame::new(MatrixSize::new(8, 55));
        assert_eq!(frame.cells().len(), 440);
        assert!(frame.is_filled_with(Color::BLACK));
    }

    #[test]
    fn test_set_and_get() {
        let mut frame = Frame::new(MatrixSize::new(4, 10));
        frame.set(Point::new(3, 2), Color::RED);
        assert_eq!(frame.get(Point::new(3, 2)), Some(Color::RED));
        assert_eq!(frame.cells()[2 * 10 + 3], Color::RED);
    }

    #[test]
    fn test_off_grid_writes_leave_frame_untouched() {
        let size = MatrixSize::new(8, 55);
        let mut frame = Frame::filled(size, Color::BLUE);
        let before = frame.clone();
        let mut rng = rand::thread_rng();

        for _ in 0..2000 {
            let row = rng.gen_range(-500..500);
            let col = rng.gen_range(-500..500);
            let point = Point::new(row, col);
            if size.contains(point) {
                continue;
            }
            frame.set(point, Color::RED);
        }
        for extreme in [i32::MIN, -1, 55, 8, i32::MAX] {
            frame.set(Point::new(extreme, 0), Color::RED);
            frame.set(Point::new(0, extreme), Color::RED);
        }
        frame.set_index(size.cell_count(), Color::RED);
        frame.set_index(usize::MAX, Color::RED);

        assert_eq!(frame, before);
    }

    #[test]
    fn test_fill_and_clear() {
        let mut frame = Frame::new(MatrixSize::new(2, 3));
        frame.fill(Color::GREEN);
        assert!(frame.is_filled_with(Color::GREEN));
        frame.clear();
        assert!(frame.is_filled_with(Color::BLACK));
    }

    #[test]
    fn test_copy_from_ignores_mismatched_size() {
        let mut frame = Frame::new(MatrixSize::new(2, 3));
        frame.copy_from(&Frame::filled(MatrixSize::new(3, 2), Color::RED));
        assert!(frame.is_filled_with(Color::BLACK));

        frame.copy_from(&Frame::filled(MatrixSize::new(2, 3), Color::RED));
        assert!(frame.is_filled_with(Color::RED));
    }
}
