//! Request-time composition: turns a client map query into an image via
//! one or more `TileManager`s or direct sources (`spec.md` §4.6).

use crate::coord::TileCoord;
use crate::error::{CoreError, CoreResult};
use crate::grid::{Grid, GridError};
use crate::image::{BBox, ImageLibrary, TiledImage};
use crate::manager::TileManager;
use crate::srs::{Srs, SrsTransformer};

/// A client map request: bbox in `srs`, requested pixel size, output
/// format, and whether the result should carry an alpha channel.
#[derive(Debug, Clone)]
pub struct MapQuery {
    pub bbox: BBox,
    pub size: (u32, u32),
    pub srs: Srs,
    pub format: String,
    pub transparent: bool,
}

pub trait MapLayer: Send + Sync {
    fn get_map(&self, query: &MapQuery) -> CoreResult<bytes::Bytes>;
}

/// A source consumed by `DirectMapLayer`: takes the client's entire query
/// (bbox, size, srs) and returns bytes for it directly. Distinct from
/// `TileSource`, which is coord-indexed and consumed by `TileManager`/
/// `TileCreator` — a `DirectMapLayer` has no grid of its own and performs
/// no tiling, so it cannot be expressed in terms of a single synthesized
/// tile coord.
pub trait DirectSource: Send + Sync {
    fn get(&self, query: &MapQuery) -> CoreResult<bytes::Bytes>;
}

/// Delegates the query to a `DirectSource` unchanged: no caching, no
/// tiling, no grid.
pub struct DirectMapLayer<'a> {
    pub source: &'a dyn DirectSource,
}

impl<'a> MapLayer for DirectMapLayer<'a> {
    fn get_map(&self, query: &MapQuery) -> CoreResult<bytes::Bytes> {
        self.source.get(query)
    }
}

/// Computes affected tiles via `Grid`, enforces `max_tile_limit`, loads all
/// tile sources via a `TileManager`, and composes/transforms to the
/// query's own bbox/size/srs.
pub struct CacheMapLayer<'a> {
    pub grid: Grid,
    pub manager: TileManager<'a>,
    pub image_lib: &'a dyn ImageLibrary,
    pub transformer: &'a dyn SrsTransformer,
    pub max_tile_limit: usize,
}

impl<'a> MapLayer for CacheMapLayer<'a> {
    fn get_map(&self, query: &MapQuery) -> CoreResult<bytes::Bytes> {
        let affected = self
            .grid
            .get_affected_tiles(query.bbox, query.size, &query.srs, self.transformer)
            .map_err(map_grid_error)?;

        if affected.coords.len() >= self.max_tile_limit {
            return Err(CoreError::TooManyTiles {
                count: affected.coords.len(),
                limit: self.max_tile_limit,
            });
        }

        let coords: Vec<Option<TileCoord>> = affected.coords.iter().map(|c| Some(*c)).collect();
        let collection = self.manager.load_tile_coords(coords)?;

        let tiled = TiledImage {
            tile_sources: collection.iter().map(|t| t.source.clone()).collect(),
            src_bbox: affected.src_bbox,
            src_srs: self.grid.srs.code.clone(),
            tile_grid: affected.grid_size,
            tile_size: self.grid.tile_size,
            transparent: query.transparent,
        };

        self.image_lib.compose(&tiled, query.bbox, &query.srs.code, query.size)
    }
}

/// Routes to a sub-layer by effective resolution of the query bbox,
/// projected into this layer's own SRS: `one` when the resolution is
/// coarser than (or equal to) `threshold`, else `two` (`spec.md` §4.6).
pub struct ResolutionConditionalLayer<'a> {
    pub srs: Srs,
    pub transformer: &'a dyn SrsTransformer,
    pub threshold: f64,
    pub one: Box<dyn MapLayer + 'a>,
    pub two: Box<dyn MapLayer + 'a>,
}

impl<'a> MapLayer for ResolutionConditionalLayer<'a> {
    fn get_map(&self, query: &MapQuery) -> CoreResult<bytes::Bytes> {
        let bbox = if query.srs.code != self.srs.code {
            self.transformer.transform_bbox(&query.srs, &self.srs, query.bbox)?
        } else {
            query.bbox
        };
        let res = (bbox.width() / query.size.0 as f64).min(bbox.height() / query.size.1 as f64);
        if res >= self.threshold {
            self.one.get_map(query)
        } else {
            self.two.get_map(query)
        }
    }
}

/// Routes by the query's SRS: exact match on a member's SRS; else any
/// member of the same geographic/projected class; else the first member
/// (`spec.md` §4.6). Uses the locally selected member throughout — the
/// original's `self.layer` reference bug (`spec.md` §9) does not arise
/// here since there is no such field.
pub struct SrsConditionalLayer<'a> {
    pub members: Vec<(Srs, Box<dyn MapLayer + 'a>)>,
}

impl<'a> SrsConditionalLayer<'a> {
    pub fn new(members: Vec<(Srs, Box<dyn MapLayer + 'a>)>) -> Self {
        Self { members }
    }

    fn select(&self, srs: &Srs) -> CoreResult<&(dyn MapLayer + 'a)> {
        if let Some((_, layer)) = self.members.iter().find(|(s, _)| s.code == srs.code) {
            return Ok(layer.as_ref());
        }
        if let Some((_, layer)) = self.members.iter().find(|(s, _)| s.class() == srs.class()) {
            return Ok(layer.as_ref());
        }
        self.members
            .first()
            .map(|(_, layer)| layer.as_ref())
            .ok_or_else(|| CoreError::InvalidSourceQuery("no layers configured".to_string()))
    }
}

impl<'a> MapLayer for SrsConditionalLayer<'a> {
    fn get_map(&self, query: &MapQuery) -> CoreResult<bytes::Bytes> {
        let layer = self.select(&query.srs)?;
        layer.get_map(query)
    }
}

fn map_grid_error(err: GridError) -> CoreError {
    match err {
        GridError::NoTiles => CoreError::BlankImage,
        GridError::InvalidBBox => CoreError::InvalidBBox,
    }
}
