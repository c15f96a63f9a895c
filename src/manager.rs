//! Orchestrates load-or-create for a list of tile coords, routing misses
//! through meta-tile batching when the source supports it (`spec.md` §4.5).

use std::collections::HashMap;

use crate::cache::FileCache;
use crate::coord::TileCoord;
use crate::creator::TileCreator;
use crate::error::CoreResult;
use crate::metagrid::MetaGrid;
use crate::tile::{Tile, TileCollection};

/// Loads cached tiles and drives creation of the rest via a `TileCreator`.
pub struct TileManager<'a> {
    pub cache: &'a FileCache,
    pub creator: &'a dyn TileCreator,
    pub meta_grid: Option<&'a MetaGrid>,
    pub source_supports_meta_tiles: bool,
}

impl<'a> TileManager<'a> {
    pub fn new(
        cache: &'a FileCache,
        creator: &'a dyn TileCreator,
        meta_grid: Option<&'a MetaGrid>,
        source_supports_meta_tiles: bool,
    ) -> Self {
        Self { cache, creator, meta_grid, source_supports_meta_tiles }
    }

    /// For each coord, attempt a cache load; collect misses, create them,
    /// and merge created sources back in by coord. `None` coords (tiles
    /// out of bounds) pass through untouched.
    pub fn load_tile_coords(
        &self,
        coords: impl IntoIterator<Item = Option<TileCoord>>,
    ) -> CoreResult<TileCollection> {
        let mut collection = TileCollection::from_coords(coords);

        let mut missing = Vec::new();
        for tile in collection.iter_mut() {
            if tile.coord.is_none() {
                continue;
            }
            self.cache.load(tile, false)?;
            if tile.is_missing() {
                missing.push(tile.clone());
            }
        }

        if missing.is_empty() {
            return Ok(collection);
        }

        let created = self.create_tiles(&missing, &collection)?;
        for tile in created {
            if let Some(coord) = tile.coord {
                collection.set(coord, tile);
            }
        }

        Ok(collection)
    }

    /// If there's no meta-grid or the source doesn't support meta-tiles,
    /// create each missing tile individually. Otherwise bucket by
    /// meta-bbox, keep one representative tile per distinct meta-tile, and
    /// hand the whole representative set to the `TileCreator` in one call —
    /// its own strategy (sequential or a `rayon`-fanned-out parallel pool)
    /// decides how many buckets to build at once; bucketing here must never
    /// itself serialize the work one bucket at a time.
    fn create_tiles(&self, missing: &[Tile], all: &TileCollection) -> CoreResult<Vec<Tile>> {
        if self.meta_grid.is_none() || !self.source_supports_meta_tiles {
            let outcomes = self.creator.create_tiles(missing, all)?;
            return Ok(outcomes.into_iter().flat_map(|o| o.into_tiles()).collect());
        }

        let meta_grid = self.meta_grid.unwrap();
        let mut buckets: HashMap<(u32, u32, u32), Tile> = HashMap::new();
        for tile in missing {
            let coord = tile.coord.expect("missing tiles always have a coord");
            let crops = meta_grid.tiles(coord);
            let origin = crops.first().map(|c| c.coord).unwrap_or(coord);
            buckets.entry((origin.x, origin.y, origin.z)).or_insert_with(|| tile.clone());
        }

        let representatives: Vec<Tile> = buckets.into_values().collect();
        let outcomes = self.creator.create_tiles(&representatives, all)?;
        Ok(outcomes.into_iter().flat_map(|o| o.into_tiles()).collect())
    }
}
