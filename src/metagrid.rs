//! `MetaGrid`: groups cache tiles into `m x n` meta-tiles with an optional
//! pixel buffer, so one upstream fetch can yield many adjacent cache tiles.

use crate::coord::TileCoord;
use crate::grid::Grid;
use crate::image::{BBox, MetaTileCrop};

/// A `Grid` plus meta-tile batching parameters.
#[derive(Debug, Clone)]
pub struct MetaGrid {
    grid: Grid,
    pub meta_size: (u32, u32),
    pub meta_buffer: u32,
}

impl MetaGrid {
    pub fn new(grid: Grid, meta_size: (u32, u32), meta_buffer: u32) -> Self {
        Self { grid, meta_size, meta_buffer }
    }

    /// The top-left coordinate of the meta-tile that `coord` belongs to.
    fn meta_origin(&self, coord: TileCoord) -> TileCoord {
        let mx = (coord.x / self.meta_size.0) * self.meta_size.0;
        let my = (coord.y / self.meta_size.1) * self.meta_size.1;
        TileCoord::new(mx, my, coord.z)
    }

    /// The constituent cache tiles of the meta-tile containing `coord`,
    /// each with its pixel crop offset within the (unbuffered) meta image,
    /// clamped to the level's actual grid extent.
    pub fn tiles(&self, coord: TileCoord) -> Vec<MetaTileCrop> {
        let origin = self.meta_origin(coord);
        let level = &self.grid.levels[coord.z as usize];
        let mut out = Vec::new();
        for dy in 0..self.meta_size.1 {
            let y = origin.y + dy;
            if y >= level.rows {
                continue;
            }
            for dx in 0..self.meta_size.0 {
                let x = origin.x + dx;
                if x >= level.cols {
                    continue;
                }
                out.push(MetaTileCrop {
                    coord: TileCoord::new(x, y, coord.z),
                    crop_x: dx * self.grid.tile_size.0 + self.meta_buffer,
                    crop_y: dy * self.grid.tile_size.1 + self.meta_buffer,
                });
            }
        }
        out
    }

    /// The bbox covering the meta-tile that `coord` belongs to, expanded by
    /// `meta_buffer` pixels (converted to projected units via the level's
    /// resolution) on every side.
    pub fn meta_bbox(&self, coord: TileCoord) -> BBox {
        let origin = self.meta_origin(coord);
        let level = self.grid.levels[coord.z as usize];
        let crops = self.tiles(coord);
        let last = crops.last().copied().unwrap_or(MetaTileCrop {
            coord: origin,
            crop_x: 0,
            crop_y: 0,
        });

        let top_left = self.grid.tile_bbox(origin);
        let bottom_right = self.grid.tile_bbox(last.coord);

        let buf_x = self.meta_buffer as f64 * level.res;
        let buf_y = self.meta_buffer as f64 * level.res;

        BBox::new(
            top_left.minx - buf_x,
            top_left.miny - buf_y,
            bottom_right.maxx + buf_x,
            bottom_right.maxy + buf_y,
        )
    }

    /// Meta image pixel dimensions for a given pyramid level: the full
    /// `meta_size` tile grid at that level's actual grid extent, plus
    /// buffer on both sides of each axis.
    pub fn meta_tile_size(&self, coord: TileCoord) -> (u32, u32) {
        let crops = self.tiles(coord);
        let cols = crops.iter().map(|c| c.coord.x).max().unwrap_or(coord.x)
            - crops.iter().map(|c| c.coord.x).min().unwrap_or(coord.x)
            + 1;
        let rows = crops.iter().map(|c| c.coord.y).max().unwrap_or(coord.y)
            - crops.iter().map(|c| c.coord.y).min().unwrap_or(coord.y)
            + 1;
        (
            cols * self.grid.tile_size.0 + 2 * self.meta_buffer,
            rows * self.grid.tile_size.1 + 2 * self.meta_buffer,
        )
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}
