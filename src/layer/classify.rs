//! Layer-to-layer support classification.
//!
//! Every lit pixel of layer `i` is *supported* when the same pixel is lit
//! in layer `i - 1` (or when there is no previous layer), otherwise it is
//! an *island*. Island pixels are then grouped into connected components;
//! components smaller than [`IslandPolicy::min_island_pixels`] are treated
//! as noise and cleared to background before counting.

use serde::{Deserialize, Serialize};

use crate::raster::{ClassifiedRaster, PackedOverlay, PixelClass, Raster};
use crate::util::{BitRow, Error, Result};

/// Neighbourhood used to connect island pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
        const EIGHT: [(isize, isize); 8] =
            [(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)];
        match self {
            Self::Four => &FOUR,
            Self::Eight => &EIGHT,
        }
    }
}

/// Island grouping and noise rules.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IslandPolicy {
    pub connectivity: Connectivity,
    /// Components with fewer pixels are cleared to background.
    pub min_island_pixels: usize,
    /// Passes that turn island pixels edge-adjacent to supported pixels into supported ones.
    pub anchor_passes: u32,
}

impl Default for IslandPolicy {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Four,
            min_island_pixels: 2,
            anchor_passes: 0,
        }
    }
}

impl IslandPolicy {
    /// Policy that keeps every island pixel, including isolated ones.
    pub fn keep_all() -> Self {
        Self { min_island_pixels: 1, ..Self::default() }
    }
}

/// Result of classifying one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    /// Connected island components that survived noise reduction.
    pub island_count: usize,
    /// Island columns per row, all components merged.
    pub island_rows: Vec<BitRow>,
    pub island_pixels: u64,
    pub supported_pixels: u64,
    pub overlay: PackedOverlay,
}

/// Reusable classification state sized to the raster.
///
/// The grid and scratch buffers are allocated once and cleared per layer.
pub struct ClassificationEngine {
    policy: IslandPolicy,
    grid: ClassifiedRaster,
    visited: Vec<bool>,
    stack: Vec<(usize, usize)>,
    component: Vec<(usize, usize)>,
}

impl ClassificationEngine {
    pub fn new(width: usize, height: usize, policy: IslandPolicy) -> Self {
        Self {
            policy,
            grid: ClassifiedRaster::new(width, height),
            visited: vec![false; width * height],
            stack: Vec::new(),
            component: Vec::new(),
        }
    }

    #[inline]
    pub fn policy(&self) -> &IslandPolicy {
        &self.policy
    }

    /// Per-pixel labels from the last [`classify`](Self::classify) call.
    #[inline]
    pub fn grid(&self) -> &ClassifiedRaster {
        &self.grid
    }

    /// Classify `current` against `previous` (absent for the first layer).
    pub fn classify(&mut self, current: &Raster, previous: Option<&Raster>) -> Result<Classification> {
        let dims = (self.grid.width(), self.grid.height());
        for raster in std::iter::once(current).chain(previous) {
            if raster.dims() != dims {
                return Err(Error::DimensionMismatch { expected: dims, actual: raster.dims() });
            }
        }

        self.label(current, previous);
        for _ in 0..self.policy.anchor_passes {
            if !self.anchor_pass() {
                break;
            }
        }
        let (island_count, island_rows) = self.group_islands();

        Ok(Classification {
            island_count,
            island_pixels: island_rows.iter().map(|r| r.count_ones() as u64).sum(),
            island_rows,
            supported_pixels: self.grid.count(PixelClass::Supported) as u64,
            overlay: self.grid.pack(),
        })
    }

    /// Raw three-way labelling.
    fn label(&mut self, current: &Raster, previous: Option<&Raster>) {
        self.grid.clear();
        for (y, row) in current.rows().iter().enumerate() {
            let (supported, island) = match previous.and_then(|p| p.row(y)) {
                Some(prev) => (row.intersection(prev), row.difference(prev)),
                None => (row.clone(), BitRow::new(row.width())),
            };
            for x in supported.iter_ones() {
                self.grid.put(y, x, PixelClass::Supported);
            }
            for x in island.iter_ones() {
                self.grid.put(y, x, PixelClass::Island);
            }
        }
    }

    /// One anchoring pass. Returns whether anything changed.
    fn anchor_pass(&mut self) -> bool {
        let (w, h) = (self.grid.width(), self.grid.height());
        let mut anchored = Vec::new();
        for y in 0..h {
            for x in 0..w {
                if self.grid.get(y, x) != PixelClass::Island {
                    continue;
                }
                let touches = Connectivity::Four.offsets().iter().any(|&(dy, dx)| {
                    neighbour(y, x, dy, dx, w, h)
                        .is_some_and(|(ny, nx)| self.grid.get(ny, nx) == PixelClass::Supported)
                });
                if touches {
                    anchored.push((y, x));
                }
            }
        }
        for &(y, x) in &anchored {
            self.grid.put(y, x, PixelClass::Supported);
        }
        !anchored.is_empty()
    }

    /// Connected-component pass over island pixels: drops small components,
    /// counts the rest, and collects their columns per row.
    fn group_islands(&mut self) -> (usize, Vec<BitRow>) {
        let (w, h) = (self.grid.width(), self.grid.height());
        let mut rows: Vec<BitRow> = (0..h).map(|_| BitRow::new(w)).collect();
        let mut count = 0;
        self.visited.fill(false);

        for y in 0..h {
            for x in 0..w {
                if self.visited[y * w + x] || self.grid.get(y, x) != PixelClass::Island {
                    continue;
                }
                self.flood(y, x);
                if self.component.len() < self.policy.min_island_pixels {
                    for &(cy, cx) in &self.component {
                        self.grid.put(cy, cx, PixelClass::Background);
                    }
                } else {
                    count += 1;
                    for &(cy, cx) in &self.component {
                        rows[cy].set(cx);
                    }
                }
            }
        }

        (count, rows)
    }

    /// Collect the island component containing `(y, x)` into `self.component`.
    fn flood(&mut self, y: usize, x: usize) {
        let (w, h) = (self.grid.width(), self.grid.height());
        let offsets = self.policy.connectivity.offsets();
        self.component.clear();
        self.stack.clear();
        self.stack.push((y, x));
        self.visited[y * w + x] = true;

        while let Some((cy, cx)) = self.stack.pop() {
            self.component.push((cy, cx));
            for &(dy, dx) in offsets {
                let Some((ny, nx)) = neighbour(cy, cx, dy, dx, w, h) else {
                    continue;
                };
                let idx = ny * w + nx;
                if !self.visited[idx] && self.grid.get(ny, nx) == PixelClass::Island {
                    self.visited[idx] = true;
                    self.stack.push((ny, nx));
                }
            }
        }
    }
}

#[inline]
fn neighbour(y: usize, x: usize, dy: isize, dx: isize, w: usize, h: usize) -> Option<(usize, usize)> {
    let ny = y.checked_add_signed(dy)?;
    let nx = x.checked_add_signed(dx)?;
    (ny < h && nx < w).then_some((ny, nx))
}
