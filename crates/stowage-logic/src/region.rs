//! Storage regions: the set of cells where items may be placed.
//!
//! A region is configured as a list of rectangles whose union forms the
//! usable grid. Rectangles may overlap or leave gaps, so membership is
//! resolved per cell against a mask precomputed at construction; that is
//! what makes L-shaped and split regions behave correctly, and keeps the
//! containment check O(footprint cells) instead of O(rectangles).

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, CellRect};

/// Immutable set of placeable cells, built once from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRegion {
    rects: Vec<CellRect>,
    /// Bounding box of all non-empty rects.
    bounds: CellRect,
    /// Row-major membership mask over `bounds`.
    mask: Vec<bool>,
}

impl StorageRegion {
    /// Build a region from rectangles. Empty rects contribute nothing.
    pub fn new(rects: Vec<CellRect>) -> Self {
        let mut bounds = CellRect::default();
        for rect in rects.iter().filter(|r| !r.is_empty()) {
            bounds = bounds.union(rect);
        }

        let mut mask = vec![false; bounds.area() as usize];
        for rect in &rects {
            for cell in rect.cells() {
                let dx = (cell.x - bounds.x) as usize;
                let dy = (cell.y - bounds.y) as usize;
                mask[dy * bounds.width as usize + dx] = true;
            }
        }

        Self {
            rects,
            bounds,
            mask,
        }
    }

    /// The configured rectangles, in configuration order.
    pub fn rects(&self) -> &[CellRect] {
        &self.rects
    }

    /// Bounding box of the region; cells inside it are not necessarily
    /// part of the region.
    pub fn bounds(&self) -> CellRect {
        self.bounds
    }

    /// Whether a single cell is part of the region.
    pub fn contains_cell(&self, cell: Cell) -> bool {
        if !self.bounds.contains_cell(cell) {
            return false;
        }
        let dx = (cell.x - self.bounds.x) as usize;
        let dy = (cell.y - self.bounds.y) as usize;
        self.mask[dy * self.bounds.width as usize + dx]
    }

    /// Whether every cell of `rect` is part of the region. An empty rect
    /// covers no cell and is never contained.
    pub fn contains_rect(&self, rect: &CellRect) -> bool {
        !rect.is_empty() && rect.cells().all(|c| self.contains_cell(c))
    }

    /// Number of usable cells; overlapping rects count each cell once.
    pub fn cell_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2 wide at the bottom, 1 wide going up: an L on its side.
    fn l_region() -> StorageRegion {
        StorageRegion::new(vec![CellRect::new(0, 0, 2, 1), CellRect::new(0, 1, 1, 2)])
    }

    #[test]
    fn test_single_rect_membership() {
        let region = StorageRegion::new(vec![CellRect::new(0, 0, 2, 2)]);
        assert!(region.contains_cell(Cell::new(0, 0)));
        assert!(region.contains_cell(Cell::new(1, 1)));
        assert!(!region.contains_cell(Cell::new(2, 0)));
        assert_eq!(region.cell_count(), 4);
    }

    #[test]
    fn test_l_shape_has_a_hole_in_its_bounds() {
        let region = l_region();
        // Bounds cover 2x3 but only 4 cells are usable.
        assert_eq!(region.bounds(), CellRect::new(0, 0, 2, 3));
        assert_eq!(region.cell_count(), 4);
        assert!(region.contains_cell(Cell::new(1, 0)));
        assert!(!region.contains_cell(Cell::new(1, 1)));
        assert!(!region.contains_cell(Cell::new(1, 2)));
    }

    #[test]
    fn test_rect_containment_respects_the_mask() {
        let region = l_region();
        // Fully inside the arm.
        assert!(region.contains_rect(&CellRect::new(0, 0, 1, 3)));
        // Inside the bounds but covering the hole.
        assert!(!region.contains_rect(&CellRect::new(0, 0, 2, 2)));
        // Outside the bounds entirely.
        assert!(!region.contains_rect(&CellRect::new(5, 5, 1, 1)));
    }

    #[test]
    fn test_overlapping_rects_count_once() {
        let region = StorageRegion::new(vec![
            CellRect::new(0, 0, 2, 2),
            CellRect::new(1, 0, 2, 2),
        ]);
        assert_eq!(region.cell_count(), 6);
        assert!(region.contains_rect(&CellRect::new(0, 0, 3, 2)));
    }

    #[test]
    fn test_empty_region() {
        let region = StorageRegion::new(vec![]);
        assert!(region.is_empty());
        assert!(!region.contains_cell(Cell::ZERO));
        assert!(!region.contains_rect(&CellRect::new(0, 0, 1, 1)));

        let degenerate = StorageRegion::new(vec![CellRect::new(3, 3, 0, 5)]);
        assert!(degenerate.is_empty());
    }

    #[test]
    fn test_empty_rect_never_contained() {
        let region = StorageRegion::new(vec![CellRect::new(0, 0, 4, 4)]);
        assert!(!region.contains_rect(&CellRect::new(1, 1, 0, 0)));
    }
}
