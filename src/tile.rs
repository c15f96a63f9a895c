//! The tile unit of caching and its ordered, coord-indexed collection.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::coord::TileCoord;
use crate::image::ImageSource;

/// The unit of caching. `coord = None` is a sentinel for an out-of-bounds
/// tile: it participates in collections without ever touching disk.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    pub coord: Option<TileCoord>,
    pub source: Option<ImageSource>,
    pub location: Option<PathBuf>,
    pub size: Option<u64>,
    pub timestamp: Option<u64>,
    pub stored: bool,
}

impl Tile {
    pub fn new(coord: TileCoord) -> Self {
        Self { coord: Some(coord), ..Default::default() }
    }

    /// A sentinel tile for an out-of-bounds coordinate.
    pub fn null() -> Self {
        Self::default()
    }

    pub fn with_source(coord: TileCoord, source: ImageSource) -> Self {
        Self { coord: Some(coord), source: Some(source), ..Default::default() }
    }

    /// `true` iff this tile has a real coord but no data yet.
    pub fn is_missing(&self) -> bool {
        match self.coord {
            None => false,
            Some(_) => self.source.is_none(),
        }
    }
}

/// An ordered sequence of tiles plus a coord-keyed lookup.
#[derive(Debug, Clone, Default)]
pub struct TileCollection {
    tiles: Vec<Tile>,
    index: HashMap<TileCoord, usize>,
}

impl TileCollection {
    /// Build a collection of fresh (empty) tiles from a coord list. `None`
    /// entries become null sentinel tiles.
    pub fn from_coords(coords: impl IntoIterator<Item = Option<TileCoord>>) -> Self {
        let mut tiles = Vec::new();
        let mut index = HashMap::new();
        for coord in coords {
            let tile = match coord {
                Some(c) => Tile::new(c),
                None => Tile::null(),
            };
            if let Some(c) = tile.coord {
                index.insert(c, tiles.len());
            }
            tiles.push(tile);
        }
        Self { tiles, index }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    pub fn at(&self, idx: usize) -> Option<&Tile> {
        self.tiles.get(idx)
    }

    pub fn contains_coord(&self, coord: &TileCoord) -> bool {
        self.index.contains_key(coord)
    }

    /// Return the existing tile for `coord`, or a fresh (not inserted) one.
    pub fn get(&self, coord: TileCoord) -> Tile {
        match self.index.get(&coord) {
            Some(&i) => self.tiles[i].clone(),
            None => Tile::new(coord),
        }
    }

    /// Overwrite the stored tile for `coord` if it is present in this
    /// collection; no-op for coords outside the original request.
    pub fn set(&mut self, coord: TileCoord, tile: Tile) {
        if let Some(&i) = self.index.get(&coord) {
            self.tiles[i] = tile;
        }
    }
}

impl<'a> IntoIterator for &'a TileCollection {
    type Item = &'a Tile;
    type IntoIter = std::slice::Iter<'a, Tile>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiles.iter()
    }
}
