//! Territory capture: converting a closed trail into owned cells.
//!
//! The enclosed region is found by flooding from the outside in. Trail and
//! existing territory are both solid; everything the outside flood cannot
//! reach inside the search box is enclosed. The search box covers the trail
//! and the whole territory plus a margin, so a pocket bounded mostly by
//! territory is still surrounded by open cells the flood can start from.

use crate::error::CaptureError;
use crate::grid::Cell;
use crate::rules::Rules;
use std::collections::{HashSet, VecDeque};

/// Cells gained by one capture. Applied to the territory as a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Trail cells that become territory
    pub trail_cells: Vec<Cell>,
    /// Free cells enclosed by the loop, sorted row-major
    pub enclosed: Vec<Cell>,
}

impl CaptureOutcome {
    pub fn gained(&self) -> usize {
        self.trail_cells.len() + self.enclosed.len()
    }
}

/// Inclusive rectangle of cells searched by the flood fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchBox {
    min: Cell,
    max: Cell,
}

impl SearchBox {
    fn around<'a>(trail: &'a [Cell], territory: impl IntoIterator<Item = &'a Cell>, margin: i32) -> Option<Self> {
        let first = *trail.first()?;
        let (mut min, mut max) = (first, first);
        for cell in trail.iter().chain(territory) {
            min.x = min.x.min(cell.x);
            min.y = min.y.min(cell.y);
            max.x = max.x.max(cell.x);
            max.y = max.y.max(cell.y);
        }
        Some(Self {
            min: Cell::new(min.x - margin, min.y - margin),
            max: Cell::new(max.x + margin, max.y + margin),
        })
    }

    fn width(&self) -> usize {
        (self.max.x - self.min.x + 1) as usize
    }

    fn height(&self) -> usize {
        (self.max.y - self.min.y + 1) as usize
    }

    fn area(&self) -> usize {
        self.width() * self.height()
    }

    fn contains(&self, cell: Cell) -> bool {
        cell.x >= self.min.x && cell.x <= self.max.x && cell.y >= self.min.y && cell.y <= self.max.y
    }

    fn index(&self, cell: Cell) -> usize {
        (cell.y - self.min.y) as usize * self.width() + (cell.x - self.min.x) as usize
    }

    fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.min.y..=self.max.y).flat_map(move |y| (self.min.x..=self.max.x).map(move |x| Cell::new(x, y)))
    }

    fn edge(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells().filter(move |c| {
            c.x == self.min.x || c.x == self.max.x || c.y == self.min.y || c.y == self.max.y
        })
    }
}

/// Computes the cells an agent gains by closing `trail` back onto `territory`.
///
/// Cells outside the world are treated as open space, so a loop closed against
/// the world edge encloses nothing on that side. The flood fill is capped at
/// `capture_work_factor` times the search box area; exceeding it returns
/// [`CaptureError::WorkCapExceeded`] and nothing is captured.
pub fn capture(
    territory: &HashSet<Cell>,
    trail: &[Cell],
    rules: &Rules,
) -> Result<CaptureOutcome, CaptureError> {
    let Some(search) = SearchBox::around(trail, territory, rules.capture_margin.max(1)) else {
        return Ok(CaptureOutcome::default());
    };

    let trail_set: HashSet<Cell> = trail.iter().copied().collect();
    let is_solid = |cell: Cell| territory.contains(&cell) || trail_set.contains(&cell);

    let cap = search.area().saturating_mul(rules.capture_work_factor);
    let mut outside = vec![false; search.area()];
    let mut queue = VecDeque::new();

    for cell in search.edge() {
        if !is_solid(cell) {
            let idx = search.index(cell);
            if !outside[idx] {
                outside[idx] = true;
                queue.push_back(cell);
            }
        }
    }

    let mut visited = 0usize;
    while let Some(cell) = queue.pop_front() {
        visited += 1;
        if visited > cap {
            return Err(CaptureError::WorkCapExceeded { visited, cap });
        }
        for next in cell.neighbors4() {
            if !search.contains(next) || is_solid(next) {
                continue;
            }
            let idx = search.index(next);
            if !outside[idx] {
                outside[idx] = true;
                queue.push_back(next);
            }
        }
    }

    let enclosed = search
        .cells()
        .filter(|&cell| !is_solid(cell) && !outside[search.index(cell)])
        .collect();

    let trail_cells = trail
        .iter()
        .copied()
        .filter(|cell| !territory.contains(cell))
        .collect();

    Ok(CaptureOutcome { trail_cells, enclosed })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> Rules {
        Rules { seed_size: 2, ..Rules::default() }
    }

    fn block(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Cell> {
        (y0..=y1).flat_map(|y| (x0..=x1).map(move |x| Cell::new(x, y))).collect()
    }

    #[test]
    fn test_square_loop_encloses_three_by_three() {
        // Territory is the column x = 0; the trail walks a ring from (1,0)
        // around to (1,4), enclosing the 3x3 block (1..=3, 1..=3).
        let territory: HashSet<Cell> = (0..5).map(|y| Cell::new(0, y)).collect();
        let mut trail: Vec<Cell> = (1..=4).map(|x| Cell::new(x, 0)).collect();
        trail.extend((1..=4).map(|y| Cell::new(4, y)));
        trail.extend((1..=3).rev().map(|x| Cell::new(x, 4)));

        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert_eq!(outcome.enclosed, block(1, 1, 3, 3));
        assert_eq!(outcome.enclosed.len(), 9);
        assert_eq!(outcome.trail_cells.len(), 11);

        let mut after = territory.clone();
        after.extend(outcome.trail_cells);
        after.extend(outcome.enclosed);
        assert_eq!(after.len(), 25);
    }

    #[test]
    fn test_corner_wrap_encloses_nothing() {
        // The 2x2 seed at (3,3)-(4,4) with a trail wrapping its bottom-right corner.
        let territory: HashSet<Cell> = Cell::square(Cell::new(3, 3), 2).collect();
        let trail = vec![
            Cell::new(5, 3),
            Cell::new(5, 4),
            Cell::new(5, 5),
            Cell::new(4, 5),
            Cell::new(3, 5),
        ];
        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert!(outcome.enclosed.is_empty());
        assert_eq!(outcome.gained(), 5);
    }

    #[test]
    fn test_territory_edge_closes_the_loop() {
        // A U-shaped trail whose open side is sealed by a territory row.
        let territory: HashSet<Cell> = block(0, 0, 6, 0).into_iter().collect();
        let mut trail = vec![Cell::new(1, 1), Cell::new(1, 2), Cell::new(1, 3)];
        trail.extend([Cell::new(2, 3), Cell::new(3, 3), Cell::new(4, 3), Cell::new(5, 3)]);
        trail.extend([Cell::new(5, 2), Cell::new(5, 1)]);

        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert_eq!(outcome.enclosed, block(2, 1, 4, 2));
    }

    #[test]
    fn test_straight_out_and_back_line_encloses_nothing() {
        let territory: HashSet<Cell> = Cell::square(Cell::new(0, 0), 2).collect();
        let trail = vec![Cell::new(2, 0), Cell::new(3, 0), Cell::new(4, 0)];
        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert!(outcome.enclosed.is_empty());
    }

    #[test]
    fn test_empty_trail_is_noop() {
        let territory: HashSet<Cell> = Cell::square(Cell::new(0, 0), 2).collect();
        let outcome = capture(&territory, &[], &rules()).unwrap();
        assert_eq!(outcome, CaptureOutcome::default());
    }

    #[test]
    fn test_work_cap_trip_returns_error() {
        let territory: HashSet<Cell> = (0..5).map(|y| Cell::new(0, y)).collect();
        let trail: Vec<Cell> = (1..=4).map(|x| Cell::new(x, 0)).collect();
        let rules = Rules { capture_work_factor: 0, ..rules() };
        let err = capture(&territory, &trail, &rules).unwrap_err();
        assert!(matches!(err, CaptureError::WorkCapExceeded { cap: 0, .. }));
    }

    #[test]
    fn test_short_trail_sealing_a_ring_captures_its_interior() {
        // A 7x7 ring of territory with a gap at (2..=4, 0); the trail plugs it.
        let territory: HashSet<Cell> = block(0, 0, 6, 6)
            .into_iter()
            .filter(|c| c.x == 0 || c.x == 6 || c.y == 0 || c.y == 6)
            .filter(|c| !(c.y == 0 && (2..=4).contains(&c.x)))
            .collect();
        let trail = vec![Cell::new(2, 0), Cell::new(3, 0), Cell::new(4, 0)];

        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert_eq!(outcome.enclosed, block(1, 1, 5, 5));
        assert_eq!(outcome.trail_cells.len(), 3);
    }

    #[test]
    fn test_enclosure_is_not_off_by_one_at_boundary() {
        // 1-wide pocket: trail around a single free cell at (2,2).
        let territory: HashSet<Cell> = block(0, 1, 1, 3).into_iter().collect();
        let trail = vec![
            Cell::new(2, 1),
            Cell::new(3, 1),
            Cell::new(3, 2),
            Cell::new(3, 3),
            Cell::new(2, 3),
        ];
        let outcome = capture(&territory, &trail, &rules()).unwrap();
        assert_eq!(outcome.enclosed, vec![Cell::new(2, 2)]);
    }
}
