//! tilecache-core — tile-grid-mapping, file-caching, concurrent-tile-
//! creation, and composition subsystem of a map tile accelerating proxy.
//!
//! The HTTP front end that parses client WMS/TMS requests, YAML config
//! loading, the raster image codec, the spatial-reference transform
//! library, and the upstream HTTP transport's retry/auth/TLS policy are
//! out of scope — named here by contract (`ImageLibrary`, `SrsTransformer`,
//! `HttpClient`) and consumed, not implemented.

pub mod cache;
pub mod config;
pub mod coord;
pub mod creator;
pub mod error;
pub mod grid;
pub mod http;
pub mod image;
pub mod layer;
pub mod lock;
pub mod manager;
pub mod metagrid;
pub mod source;
pub mod srs;
pub mod tile;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::FileCache;
pub use config::CoreConfig;
pub use coord::TileCoord;
pub use creator::{CreateOutcome, ParallelTileCreator, SequentialTileCreator, TileCreator};
pub use error::{CoreError, CoreResult};
pub use grid::{Grid, GridError, GridLevel};
pub use layer::{
    CacheMapLayer, DirectMapLayer, DirectSource, MapLayer, MapQuery, ResolutionConditionalLayer,
    SrsConditionalLayer,
};
pub use manager::TileManager;
pub use metagrid::MetaGrid;
pub use source::{TiledSource, TileSource, WmsClient, WmsDirectSource, WmsSource};
pub use srs::{Srs, SrsClass, SrsTransformer};
pub use tile::{Tile, TileCollection};
