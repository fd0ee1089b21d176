//! Cell neighborhoods

use serde::{Deserialize, Serialize};

/// A set of cells around a center cell, given as a radius in cells.
///
/// `Square(0)` and `Circle(0)` both reduce to the center cell alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Neighborhood {
    /// Square window of side `2 * r + 1`
    Square(usize),
    /// Cells whose offset `(dr, dc)` satisfies `dr² + dc² <= r²`
    Circle(usize),
}

impl Neighborhood {
    /// Radius of the neighborhood in cells
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Square(r) | Neighborhood::Circle(r) => *r,
        }
    }

    /// Side length of the bounding window
    pub fn size(&self) -> usize {
        self.radius() * 2 + 1
    }

    /// Check if a relative position is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        let r = self.radius() as isize;
        match self {
            Neighborhood::Square(_) => dr.abs() <= r && dc.abs() <= r,
            Neighborhood::Circle(_) => dr * dr + dc * dc <= r * r,
        }
    }

    /// Relative `(dr, dc)` positions in this neighborhood, row-major
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        let mut offsets = Vec::with_capacity(self.size() * self.size());

        for dr in -r..=r {
            for dc in -r..=r {
                if self.contains(dr, dc) {
                    offsets.push((dr, dc));
                }
            }
        }

        offsets
    }
}

impl Default for Neighborhood {
    fn default() -> Self {
        Neighborhood::Square(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_radius_is_center_only() {
        assert_eq!(Neighborhood::Square(0).offsets(), vec![(0, 0)]);
        assert_eq!(Neighborhood::Circle(0).offsets(), vec![(0, 0)]);
    }

    #[test]
    fn test_square_counts() {
        assert_eq!(Neighborhood::Square(1).offsets().len(), 9);
        assert_eq!(Neighborhood::Square(2).offsets().len(), 25);
        assert_eq!(Neighborhood::Square(2).size(), 5);
    }

    #[test]
    fn test_circle_drops_corners() {
        let circle = Neighborhood::Circle(2);
        assert!(circle.contains(0, 2));
        assert!(circle.contains(1, 1));
        assert!(!circle.contains(2, 2));
        assert_eq!(circle.offsets().len(), 13);
    }
}
