//! Grid and geometry primitives.
//!
//! All territory and trail bookkeeping happens in integer cell coordinates so
//! that containment and equality checks are exact. Continuous positions only
//! exist for movement and are projected onto the grid once per tick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer coordinate addressing one square of world space.
///
/// Ordering is row-major (`y` first, then `x`) so sorted cell lists read
/// naturally top-to-bottom in snapshots and test output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal neighbours. Diagonals are never considered
    /// connected, both for trails and for the capture flood fill.
    pub fn neighbors4(self) -> [Cell; 4] {
        [
            Cell::new(self.x + 1, self.y),
            Cell::new(self.x - 1, self.y),
            Cell::new(self.x, self.y + 1),
            Cell::new(self.x, self.y - 1),
        ]
    }

    /// Every cell of the `size`×`size` block whose top-left corner is `origin`.
    pub fn square(origin: Cell, size: i32) -> impl Iterator<Item = Cell> {
        (0..size).flat_map(move |dy| (0..size).map(move |dx| Cell::new(origin.x + dx, origin.y + dy)))
    }

    /// Center of this cell in world units.
    pub fn center(self, cell_size: f32) -> Vec2 {
        Vec2::new(
            (self.x as f32 + 0.5) * cell_size,
            (self.y as f32 + 0.5) * cell_size,
        )
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Continuous position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector for a heading in radians. Zero points along +x and
    /// positive angles turn towards +y (screen coordinates).
    pub fn from_heading(heading: f32) -> Self {
        Self::new(heading.cos(), heading.sin())
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    pub fn offset(self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    /// The cell containing this position.
    pub fn cell(self, cell_size: f32) -> Cell {
        Cell::new(
            (self.x / cell_size).floor() as i32,
            (self.y / cell_size).floor() as i32,
        )
    }
}

/// Fixed rectangular extent of a world, measured in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: i32,
    pub height: i32,
}

impl WorldBounds {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }

    /// Clamps a continuous position so it always falls inside the world.
    ///
    /// Agents never wrap: the same clamp applies to every agent on every tick.
    pub fn clamp(&self, position: Vec2, cell_size: f32) -> Vec2 {
        Vec2::new(
            position.x.clamp(0.0, last_inside(self.width, cell_size)),
            position.y.clamp(0.0, last_inside(self.height, cell_size)),
        )
    }
}

/// Largest coordinate along an axis of `extent` cells whose cell is still
/// `extent - 1`.
fn last_inside(extent: i32, cell_size: f32) -> f32 {
    let edge = extent as f32 * cell_size;
    let mut limit = edge - cell_size * 1e-3;
    // On wide worlds the inset rounds away, so step down one ulp at a time.
    while limit > 0.0 && (limit / cell_size).floor() as i32 >= extent {
        limit = f32::from_bits(limit.to_bits() - 1);
    }
    limit.max(0.0)
}

/// The 4-connected path from `from` to `to`, excluding `from` and ending at `to`.
///
/// Used when an agent crosses several cells (or cuts a corner diagonally) in
/// one tick. Trails built from this path never contain diagonal steps, which
/// keeps the capture flood fill from leaking between diagonal neighbours.
pub fn walk(from: Cell, to: Cell) -> Vec<Cell> {
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let step_x = (to.x - from.x).signum();
    let step_y = (to.y - from.y).signum();

    let mut path = Vec::with_capacity((dx + dy) as usize);
    let (mut x, mut y) = (from.x, from.y);
    let (mut moved_x, mut moved_y) = (0, 0);

    while moved_x < dx || moved_y < dy {
        // Advance along whichever axis is further behind the ideal line.
        if (1 + 2 * moved_x) * dy < (1 + 2 * moved_y) * dx {
            x += step_x;
            moved_x += 1;
        } else {
            y += step_y;
            moved_y += 1;
        }
        path.push(Cell::new(x, y));
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_four_connected(start: Cell, path: &[Cell]) -> bool {
        let mut prev = start;
        for &cell in path {
            if (cell.x - prev.x).abs() + (cell.y - prev.y).abs() != 1 {
                return false;
            }
            prev = cell;
        }
        true
    }

    #[test]
    fn test_walk_same_cell_is_empty() {
        assert!(walk(Cell::new(3, 3), Cell::new(3, 3)).is_empty());
    }

    #[test]
    fn test_walk_straight_line() {
        let path = walk(Cell::new(0, 0), Cell::new(3, 0));
        assert_eq!(path, vec![Cell::new(1, 0), Cell::new(2, 0), Cell::new(3, 0)]);
    }

    #[test]
    fn test_walk_diagonal_inserts_corner() {
        let start = Cell::new(2, 2);
        let path = walk(start, Cell::new(3, 3));
        assert_eq!(path.len(), 2);
        assert_eq!(path.last(), Some(&Cell::new(3, 3)));
        assert!(is_four_connected(start, &path));
    }

    #[test]
    fn test_walk_long_oblique_is_connected() {
        let start = Cell::new(-4, 7);
        let end = Cell::new(5, -2);
        let path = walk(start, end);
        assert_eq!(path.len(), 18);
        assert_eq!(path.last(), Some(&end));
        assert!(is_four_connected(start, &path));
    }

    #[test]
    fn test_square_block() {
        let cells: Vec<Cell> = Cell::square(Cell::new(3, 3), 2).collect();
        assert_eq!(
            cells,
            vec![Cell::new(3, 3), Cell::new(4, 3), Cell::new(3, 4), Cell::new(4, 4)]
        );
    }

    #[test]
    fn test_clamp_keeps_position_inside() {
        let bounds = WorldBounds::new(8, 8);
        let clamped = bounds.clamp(Vec2::new(100.0, -5.0), 1.0);
        assert!(bounds.contains(clamped.cell(1.0)));
        assert_eq!(clamped.cell(1.0), Cell::new(7, 0));
    }

    #[test]
    fn test_clamp_stays_inside_very_wide_world() {
        let width = 1 << 25;
        let bounds = WorldBounds::new(width, 4);
        let clamped = bounds.clamp(Vec2::new(f32::MAX, 100.0), 1.0);
        let cell = clamped.cell(1.0);
        assert!(bounds.contains(cell), "{cell} fell outside");
        assert!(cell.x >= width - 2);
        assert_eq!(cell.y, 3);
    }

    #[test]
    fn test_cell_ordering_is_row_major() {
        let mut cells = vec![Cell::new(1, 1), Cell::new(0, 2), Cell::new(2, 0)];
        cells.sort();
        assert_eq!(cells, vec![Cell::new(2, 0), Cell::new(1, 1), Cell::new(0, 2)]);
    }
}
