//! End-to-end scenarios against a real `tempfile` directory, a stub HTTP
//! client, and a noop image library (`spec.md` §8, scenarios S1-S4, S6).

use std::time::Duration;

use tempfile::TempDir;

use tilecache_core::cache::FileCache;
use tilecache_core::coord::TileCoord;
use tilecache_core::creator::{CreateOutcome, SequentialTileCreator, TileCreator};
use tilecache_core::error::{CoreError, CoreResult};
use tilecache_core::grid::{Grid, GridLevel};
use tilecache_core::http::{HttpClient, HttpResponse};
use tilecache_core::image::{BBox, Color, ImageLibrary, MetaTileCrop, TiledImage};
use tilecache_core::manager::TileManager;
use tilecache_core::metagrid::MetaGrid;
use tilecache_core::source::{TiledSource, TileSource, WmsClient, WmsSource};
use tilecache_core::srs::{IdentitySrsTransformer, Srs};
use tilecache_core::tile::TileCollection;

mod support;
use support::{FixedColorImageLibrary, NoopImageLibrary, StubHttpClient};

fn world_grid() -> Grid {
    Grid::new(
        Srs::new("EPSG:4326", true),
        (256, 256),
        BBox::new(-180.0, -90.0, 180.0, 90.0),
        vec![GridLevel { res: 180.0 / 256.0, cols: 2, rows: 1 }],
    )
}

/// S1 — single-tile cache miss: upstream called once for (0,0,0), file
/// lands at the spec'd path, response is the fetched bytes.
#[test]
fn s1_single_tile_cache_miss() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        dir.path().join("cache"),
        "png",
        dir.path().join("locks"),
        false,
        Duration::from_secs(1),
    );
    let grid = world_grid();
    let affected = grid
        .get_affected_tiles(
            BBox::new(-180.0, -90.0, 0.0, 90.0),
            (256, 256),
            &grid.srs,
            &IdentitySrsTransformer,
        )
        .unwrap();
    assert_eq!(affected.coords, vec![TileCoord::new(0, 0, 0)]);

    let source = TiledSource::new(
        "tiled",
        "http://upstream.test/{z}/{x}/{y}.png",
        Box::new(StubHttpClient::ok(b"a-png-body")),
        grid,
    );
    let creator = SequentialTileCreator {
        cache: &cache,
        source: &source,
        image_lib: &NoopImageLibrary,
        lock_dir: dir.path().join("locks"),
        lock_timeout: Duration::from_secs(1),
    };
    let manager = TileManager::new(&cache, &creator, None, false);

    let result = manager.load_tile_coords([Some(TileCoord::new(0, 0, 0))]).unwrap();
    assert!(!result.get(TileCoord::new(0, 0, 0)).is_missing());

    let expected_path = dir.path().join("cache/00/000/000/000/000/000/000.png");
    assert!(expected_path.exists());
    assert_eq!(std::fs::read(&expected_path).unwrap(), b"a-png-body");
}

/// S2 — cached hit: an identical second request makes zero upstream
/// calls and leaves the file's mtime unchanged.
#[test]
fn s2_cached_hit_makes_no_upstream_call() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        dir.path().join("cache"),
        "png",
        dir.path().join("locks"),
        false,
        Duration::from_secs(1),
    );
    let grid = world_grid();
    let source = TiledSource::new(
        "tiled",
        "http://upstream.test/{z}/{x}/{y}.png",
        Box::new(StubHttpClient::new(vec![Ok(HttpResponse {
            status: 200,
            body: bytes::Bytes::from_static(b"a-png-body"),
        })])),
        grid,
    );
    let creator = SequentialTileCreator {
        cache: &cache,
        source: &source,
        image_lib: &NoopImageLibrary,
        lock_dir: dir.path().join("locks"),
        lock_timeout: Duration::from_secs(1),
    };
    let manager = TileManager::new(&cache, &creator, None, false);

    manager.load_tile_coords([Some(TileCoord::new(0, 0, 0))]).unwrap();
    let path = dir.path().join("cache/00/000/000/000/000/000/000.png");
    let mtime_before = std::fs::metadata(&path).unwrap().modified().unwrap();

    // Second request: the stub has no more canned responses, so any
    // upstream call would surface as an error instead of succeeding.
    let result = manager.load_tile_coords([Some(TileCoord::new(0, 0, 0))]).unwrap();
    assert!(!result.get(TileCoord::new(0, 0, 0)).is_missing());
    let mtime_after = std::fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after);
}

/// S3 — meta-tile batching: one upstream fetch yields both constituent
/// tiles of a 2x1 meta-tile.
#[test]
fn s3_meta_tile_batching_single_upstream_call() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        dir.path().join("cache"),
        "png",
        dir.path().join("locks"),
        false,
        Duration::from_secs(1),
    );
    let grid = world_grid();
    let meta_grid = MetaGrid::new(world_grid(), (2, 1), 0);
    let wms = WmsSource::new(
        "wms",
        WmsClient::new("http://upstream.test/wms", "base", "image/png"),
        Box::new(StubHttpClient::ok(b"meta-image-bytes")),
        grid,
        Some(MetaGrid::new(world_grid(), (2, 1), 0)),
        vec![Srs::new("EPSG:4326", true)],
        Box::new(IdentitySrsTransformer),
        Box::new(NoopImageLibrary),
    );
    let creator = SequentialTileCreator {
        cache: &cache,
        source: &wms,
        image_lib: &NoopImageLibrary,
        lock_dir: dir.path().join("locks"),
        lock_timeout: Duration::from_secs(1),
    };
    let manager = TileManager::new(&cache, &creator, Some(&meta_grid), true);

    let result = manager
        .load_tile_coords([Some(TileCoord::new(0, 0, 0)), Some(TileCoord::new(1, 0, 0))])
        .unwrap();
    assert!(!result.get(TileCoord::new(0, 0, 0)).is_missing());
    assert!(!result.get(TileCoord::new(1, 0, 0)).is_missing());

    let a = dir.path().join("cache/00/000/000/000/000/000/000.png");
    let b = dir.path().join("cache/00/000/000/001/000/000/000.png");
    assert!(a.exists());
    assert!(b.exists());
}

/// S4 — monochrome dedup: a second differently-coordinated tile with the
/// same color reuses the single-color file via a new symlink, not a
/// second copy.
#[test]
fn s4_monochrome_dedup_shares_one_regular_file() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        dir.path().join("cache"),
        "png",
        dir.path().join("locks"),
        true,
        Duration::from_secs(1),
    );
    let red = Color { r: 0xff, g: 0x00, b: 0x00, a: None };
    let image_lib = FixedColorImageLibrary(red);

    let mut first = tilecache_core::tile::Tile::with_source(
        TileCoord::new(3, 4, 2),
        tilecache_core::image::ImageSource::Bytes(bytes::Bytes::from_static(b"solid-red")),
    );
    cache.store(&mut first, &image_lib).unwrap();

    let mut second = tilecache_core::tile::Tile::with_source(
        TileCoord::new(5, 6, 2),
        tilecache_core::image::ImageSource::Bytes(bytes::Bytes::from_static(b"solid-red")),
    );
    cache.store(&mut second, &image_lib).unwrap();

    let shared = dir.path().join("cache/single_color_tiles/ff0000.png");
    assert!(shared.is_file());

    let first_loc = dir.path().join("cache/02/000/000/003/000/000/004.png");
    let second_loc = dir.path().join("cache/02/000/000/005/000/000/006.png");
    assert!(first_loc.symlink_metadata().unwrap().file_type().is_symlink());
    assert!(second_loc.symlink_metadata().unwrap().file_type().is_symlink());
}

/// S6 — upstream failure: a 500 surfaces as `TileSource`, no file is
/// written, and the lock is released so a retry gets a fresh attempt.
#[test]
fn s6_upstream_failure_writes_no_file_and_releases_lock() {
    let dir = TempDir::new().unwrap();
    let cache = FileCache::new(
        dir.path().join("cache"),
        "png",
        dir.path().join("locks"),
        false,
        Duration::from_secs(1),
    );
    let grid = world_grid();
    let source = TiledSource::new(
        "tiled",
        "http://upstream.test/{z}/{x}/{y}.png",
        Box::new(StubHttpClient::new(vec![
            Ok(HttpResponse { status: 500, body: bytes::Bytes::new() }),
            Ok(HttpResponse { status: 200, body: bytes::Bytes::from_static(b"retry-body") }),
        ])),
        grid,
    );
    let creator = SequentialTileCreator {
        cache: &cache,
        source: &source,
        image_lib: &NoopImageLibrary,
        lock_dir: dir.path().join("locks"),
        lock_timeout: Duration::from_secs(1),
    };
    let manager = TileManager::new(&cache, &creator, None, false);

    let tile = tilecache_core::tile::Tile::new(TileCoord::new(0, 0, 0));
    let collection = TileCollection::from_coords([Some(TileCoord::new(0, 0, 0))]);
    let err = creator.create_tiles(&[tile.clone()], &collection).unwrap_err();
    assert!(matches!(err, tilecache_core::error::CoreError::TileSource(_)));

    let path = dir.path().join("cache/00/000/000/000/000/000/000.png");
    assert!(!path.exists());

    // Retry: the lock from the failed attempt was released, so this
    // acquires cleanly and the fresh fetch succeeds.
    let outcomes = creator.create_tiles(&[tile], &collection).unwrap();
    assert!(matches!(outcomes[0], CreateOutcome::Created(_)));
    assert!(path.exists());
}
