//! Skyline bottom-left rectangle packer
//!
//! The skyline is the upper envelope of everything placed so far, stored as
//! a left-to-right run of horizontal segments. A rectangle goes wherever its
//! top edge ends lowest, ties broken by the narrower supporting segment and
//! then by the leftmost position.

/// One horizontal segment of the skyline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SkylineNode {
    x: u32,
    y: u32,
    width: u32,
}

/// Bottom-left skyline bin packer over an integer grid
#[derive(Debug, Clone)]
pub struct SkylinePacker {
    width: u32,
    height: u32,
    nodes: Vec<SkylineNode>,
    used_area: u64,
}

impl SkylinePacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            nodes: vec![SkylineNode { x: 0, y: 0, width }],
            used_area: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total area of all rectangles inserted so far
    pub fn used_area(&self) -> u64 {
        self.used_area
    }

    /// Fraction of the bin covered by inserted rectangles
    pub fn occupancy(&self) -> f64 {
        let total = self.width as u64 * self.height as u64;
        if total == 0 {
            0.0
        } else {
            self.used_area as f64 / total as f64
        }
    }

    /// Lowest `y` at which a `width × height` rectangle can sit with its
    /// left edge on node `index`.
    fn fits(&self, index: usize, width: u32, height: u32) -> Option<u32> {
        let x = self.nodes[index].x;
        if x as u64 + width as u64 > self.width as u64 {
            return None;
        }

        let mut remaining = width as u64;
        let mut y = 0;
        let mut i = index;
        while remaining > 0 {
            let node = self.nodes.get(i)?;
            y = y.max(node.y);
            if y as u64 + height as u64 > self.height as u64 {
                return None;
            }
            remaining = remaining.saturating_sub(node.width as u64);
            i += 1;
        }
        Some(y)
    }

    /// Place a rectangle and return its lower-left corner, or `None` if it
    /// does not fit anywhere.
    pub fn insert(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 {
            return None;
        }

        let mut best: Option<(u64, u32, usize, u32)> = None;
        for index in 0..self.nodes.len() {
            let Some(y) = self.fits(index, width, height) else {
                continue;
            };
            let key = (y as u64 + height as u64, self.nodes[index].width);
            let better = match best {
                None => true,
                Some((top, node_width, _, _)) => key < (top, node_width),
            };
            if better {
                best = Some((key.0, key.1, index, y));
            }
        }

        let (_, _, index, y) = best?;
        let x = self.nodes[index].x;
        self.add_level(index, x, y, width, height);
        self.used_area += width as u64 * height as u64;
        Some((x, y))
    }

    fn add_level(&mut self, index: usize, x: u32, y: u32, width: u32, height: u32) {
        self.nodes.insert(
            index,
            SkylineNode {
                x,
                y: y + height,
                width,
            },
        );

        // Trim or drop the segments now shadowed by the new one
        let i = index + 1;
        while i < self.nodes.len() {
            let prev_end = self.nodes[i - 1].x + self.nodes[i - 1].width;
            let node = &mut self.nodes[i];
            if node.x >= prev_end {
                break;
            }
            let shrink = prev_end - node.x;
            if node.width <= shrink {
                self.nodes.remove(i);
            } else {
                node.x += shrink;
                node.width -= shrink;
                break;
            }
        }

        self.merge();
    }

    fn merge(&mut self) {
        let mut i = 0;
        while i + 1 < self.nodes.len() {
            if self.nodes[i].y == self.nodes[i + 1].y {
                self.nodes[i].width += self.nodes[i + 1].width;
                self.nodes.remove(i + 1);
            } else {
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: (u32, u32, u32, u32), b: (u32, u32, u32, u32)) -> bool {
        a.0 < b.0 + b.2 && b.0 < a.0 + a.2 && a.1 < b.1 + b.3 && b.1 < a.1 + a.3
    }

    #[test]
    fn test_first_insert_at_origin() {
        let mut packer = SkylinePacker::new(64, 64);
        assert_eq!(packer.insert(10, 20), Some((0, 0)));
        assert_eq!(packer.insert(10, 20), Some((10, 0)));
        assert_eq!(packer.used_area(), 400);
    }

    #[test]
    fn test_fills_row_then_stacks() {
        let mut packer = SkylinePacker::new(20, 20);
        assert_eq!(packer.insert(10, 10), Some((0, 0)));
        assert_eq!(packer.insert(10, 10), Some((10, 0)));
        assert_eq!(packer.insert(10, 10), Some((0, 10)));
        assert_eq!(packer.insert(10, 10), Some((10, 10)));
        assert_eq!(packer.insert(1, 1), None);
        assert!((packer.occupancy() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_prefers_lowest_top_edge() {
        let mut packer = SkylinePacker::new(30, 30);
        packer.insert(10, 20); // tall on the left
        packer.insert(10, 5); // short in the middle
        // A 10x5 fits lower beside the short one than on top of the tall one
        assert_eq!(packer.insert(10, 5), Some((20, 0)));
        assert_eq!(packer.insert(20, 5), Some((10, 5)));
    }

    #[test]
    fn test_rejects_oversized_and_empty() {
        let mut packer = SkylinePacker::new(16, 16);
        assert_eq!(packer.insert(17, 1), None);
        assert_eq!(packer.insert(1, 17), None);
        assert_eq!(packer.insert(0, 4), None);
        assert_eq!(packer.used_area(), 0);
    }

    #[test]
    fn test_no_overlap_many_rects() {
        let mut packer = SkylinePacker::new(128, 128);
        let mut placed = Vec::new();
        for i in 0..60u32 {
            let w = 3 + (i * 7) % 13;
            let h = 2 + (i * 5) % 11;
            if let Some((x, y)) = packer.insert(w, h) {
                assert!(x + w <= 128 && y + h <= 128);
                placed.push((x, y, w, h));
            }
        }
        assert!(placed.len() > 40);
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                assert!(!overlaps(*a, *b), "{:?} overlaps {:?}", a, b);
            }
        }
    }
}
