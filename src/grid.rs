//! `Grid`: the tile pyramid. Maps `(bbox, size, srs)` to affected tile
//! coordinates and their covering source bbox.

use crate::coord::TileCoord;
use crate::image::BBox;
use crate::srs::{Srs, SrsTransformer};

/// One pyramid level: resolution (projected units per pixel) and grid
/// dimensions in tiles.
#[derive(Debug, Clone, Copy)]
pub struct GridLevel {
    pub res: f64,
    pub cols: u32,
    pub rows: u32,
}

/// Non-fatal/invalid outcomes of a grid lookup, matching `spec.md` §9's
/// guidance to model `BlankImage`/invalid-bbox as explicit result variants
/// rather than exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    /// The request lies entirely outside the grid's world bbox.
    NoTiles,
    /// The bbox is degenerate (zero/negative extent) or the output size is
    /// non-positive.
    InvalidBBox,
}

/// The set of tiles affected by a request, plus the bbox they cover.
#[derive(Debug, Clone)]
pub struct AffectedTiles {
    pub src_bbox: BBox,
    pub grid_size: (u32, u32),
    pub coords: Vec<TileCoord>,
}

/// Configuration-derived, immutable pyramid definition.
#[derive(Debug, Clone)]
pub struct Grid {
    pub srs: Srs,
    pub tile_size: (u32, u32),
    pub bbox: BBox,
    pub levels: Vec<GridLevel>,
}

impl Grid {
    pub fn new(srs: Srs, tile_size: (u32, u32), bbox: BBox, levels: Vec<GridLevel>) -> Self {
        Self { srs, tile_size, bbox, levels }
    }

    /// The projected bbox covered by a single tile coordinate.
    pub fn tile_bbox(&self, coord: TileCoord) -> BBox {
        let level = &self.levels[coord.z as usize];
        let tw = self.tile_size.0 as f64 * level.res;
        let th = self.tile_size.1 as f64 * level.res;
        let minx = self.bbox.minx + coord.x as f64 * tw;
        let miny = self.bbox.miny + coord.y as f64 * th;
        BBox::new(minx, miny, minx + tw, miny + th)
    }

    /// Pick the level whose resolution best matches `(dx_per_px, dy_per_px)`:
    /// the coarsest level that is still at least as fine as requested, i.e.
    /// the highest-numbered level with `res <= target` (mirrors the
    /// teacher's `PrefetchCalculator::level_for_scale` "bias toward higher
    /// resolution" rule).
    fn level_for_resolution(&self, target_res: f64) -> usize {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.res <= target_res || target_res <= 0.0)
            .max_by(|(_, a), (_, b)| a.res.partial_cmp(&b.res).unwrap())
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Map a request to affected tile coords and their covering bbox.
    ///
    /// `req_srs`, if different from the grid's own SRS, is reprojected via
    /// `transformer` first.
    pub fn get_affected_tiles(
        &self,
        bbox: BBox,
        size: (u32, u32),
        req_srs: &Srs,
        transformer: &dyn SrsTransformer,
    ) -> Result<AffectedTiles, GridError> {
        if size.0 == 0 || size.1 == 0 || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(GridError::InvalidBBox);
        }

        let bbox = if req_srs.code != self.srs.code {
            transformer
                .transform_bbox(req_srs, &self.srs, bbox)
                .map_err(|_| GridError::InvalidBBox)?
        } else {
            bbox
        };

        if bbox.maxx <= self.bbox.minx
            || bbox.minx >= self.bbox.maxx
            || bbox.maxy <= self.bbox.miny
            || bbox.miny >= self.bbox.maxy
        {
            return Err(GridError::NoTiles);
        }

        let xres = bbox.width() / size.0 as f64;
        let yres = bbox.height() / size.1 as f64;
        let level_idx = self.level_for_resolution(xres.min(yres));
        let level = self.levels[level_idx];

        let tw = self.tile_size.0 as f64 * level.res;
        let th = self.tile_size.1 as f64 * level.res;

        let clamp_col = |v: i64| -> u32 { v.clamp(0, level.cols as i64 - 1) as u32 };
        let clamp_row = |v: i64| -> u32 { v.clamp(0, level.rows as i64 - 1) as u32 };

        let min_col = clamp_col((((bbox.minx - self.bbox.minx) / tw).floor()) as i64);
        let max_col = clamp_col(((((bbox.maxx - self.bbox.minx) / tw).ceil()) as i64) - 1);
        let min_row = clamp_row((((bbox.miny - self.bbox.miny) / th).floor()) as i64);
        let max_row = clamp_row(((((bbox.maxy - self.bbox.miny) / th).ceil()) as i64) - 1);

        if max_col < min_col || max_row < min_row {
            return Err(GridError::NoTiles);
        }

        let mut coords = Vec::new();
        let mut covering = self.tile_bbox(TileCoord::new(min_col, min_row, level_idx as u32));
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let coord = TileCoord::new(col, row, level_idx as u32);
                covering = covering.union(&self.tile_bbox(coord));
                coords.push(coord);
            }
        }

        Ok(AffectedTiles {
            src_bbox: covering,
            grid_size: (max_col - min_col + 1, max_row - min_row + 1),
            coords,
        })
    }
}
