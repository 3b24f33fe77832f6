use super::pixel_stats::SignatureMask;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Inclusive bounding box of one detected marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    /// 区域内是否出现过彩色（非黑白）像素
    pub chromatic: bool,
    pub signature: u32,
}

impl Marker {
    fn seed(x: u32, y: u32, signature: u32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x,
            y2: y,
            chromatic: false,
            signature,
        }
    }

    fn include(&mut self, x: u32, y: u32, chromatic: bool) {
        self.x1 = self.x1.min(x);
        self.y1 = self.y1.min(y);
        self.x2 = self.x2.max(x);
        self.y2 = self.y2.max(y);
        self.chromatic |= chromatic;
    }

    fn absorb(&mut self, other: &Marker) {
        self.x1 = self.x1.min(other.x1);
        self.y1 = self.y1.min(other.y1);
        self.x2 = self.x2.max(other.x2);
        self.y2 = self.y2.max(other.y2);
        self.chromatic |= other.chromatic;
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1 + 1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1 + 1
    }

    pub fn center(&self) -> (u32, u32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Minimum `x2 - x1` and `y2 - y1` of a kept region.
    pub min_span: u32,
    /// Label budget; regions first seen after it is spent are dropped.
    pub max_regions: usize,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            min_span: 16,
            max_regions: 255,
        }
    }
}

/// Union-find over region indices; the lower index always becomes the root.
struct RegionJoins {
    parent: Vec<usize>,
}

impl RegionJoins {
    fn new() -> Self {
        Self { parent: Vec::new() }
    }

    fn push(&mut self) {
        let index = self.parent.len();
        self.parent.push(index);
    }

    fn find(&mut self, mut index: usize) -> usize {
        while self.parent[index] != index {
            self.parent[index] = self.parent[self.parent[index]];
            index = self.parent[index];
        }
        index
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (low, high) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[high] = low;
        }
    }
}

/// 4-connectivity labeling of the signature mask into marker rectangles.
pub struct MarkerRegionFinder {
    config: RegionConfig,
}

impl MarkerRegionFinder {
    pub fn new() -> Self {
        Self::with_config(RegionConfig::default())
    }

    pub fn with_config(config: RegionConfig) -> Self {
        Self { config }
    }

    /// Returns the markers in scan order of their first pixel.
    pub fn find_regions(&self, mask: &SignatureMask) -> Vec<Marker> {
        let w = mask.width() as usize;
        let h = mask.height() as usize;
        let signatures = mask.signatures();
        let chromatic = mask.chromatic();

        // 0 = unlabeled, otherwise region index + 1
        let mut labels = vec![0u32; w * h];
        let mut regions: Vec<Marker> = Vec::new();
        let mut joins = RegionJoins::new();
        let mut budget_warned = false;

        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let current = signatures[idx];
                if current == 0 {
                    continue;
                }

                let west = if x > 0 && signatures[idx - 1] == current {
                    labels[idx - 1]
                } else {
                    0
                };
                let north = if y > 0 && signatures[idx - w] == current {
                    labels[idx - w]
                } else {
                    0
                };

                let label = match (west, north) {
                    (0, 0) => {
                        // Single pixels and one-pixel lines never seed a region
                        let east = x + 1 < w && signatures[idx + 1] == current;
                        let south = y + 1 < h && signatures[idx + w] == current;
                        if !(east && south) {
                            continue;
                        }

                        if regions.len() >= self.config.max_regions {
                            if !budget_warned {
                                warn!(
                                    "⚠️ Region budget of {} exhausted at ({}, {}), further regions are dropped",
                                    self.config.max_regions, x, y
                                );
                                budget_warned = true;
                            }
                            continue;
                        }

                        regions.push(Marker::seed(x as u32, y as u32, current));
                        joins.push();
                        regions.len() as u32
                    }
                    (label, 0) | (0, label) => label,
                    (west, north) => {
                        if west != north {
                            joins.union(west as usize - 1, north as usize - 1);
                        }
                        west
                    }
                };

                labels[idx] = label;
                regions[label as usize - 1].include(x as u32, y as u32, chromatic[idx]);
            }
        }

        let mut merged = vec![false; regions.len()];
        for index in (0..regions.len()).rev() {
            let root = joins.find(index);
            if root != index {
                let source = regions[index];
                regions[root].absorb(&source);
                merged[index] = true;
            }
        }

        let min_span = self.config.min_span;
        let candidates = regions.len();
        let markers: Vec<Marker> = regions
            .into_iter()
            .zip(merged)
            .filter(|(_, merged)| !merged)
            .map(|(region, _)| region)
            .filter(|m| m.x2 - m.x1 >= min_span && m.y2 - m.y1 >= min_span)
            .collect();

        debug!(
            "Labeled {} candidate regions, {} survived merging and size filter",
            candidates,
            markers.len()
        );
        info!("🔍 Found {} markers", markers.len());

        markers
    }
}

impl Default for MarkerRegionFinder {
    fn default() -> Self {
        Self::new()
    }
}
