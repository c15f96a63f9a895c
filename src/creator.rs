//! Drives upstream fetches for missing tiles under per-tile locks, with a
//! sequential variant and a `rayon`-backed parallel one (`spec.md` §4.4).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::FileCache;
use crate::error::CoreResult;
use crate::image::ImageLibrary;
use crate::lock::cleanup_lockdir;
use crate::source::TileSource;
use crate::tile::{Tile, TileCollection};

/// The per-tile outcome of a create attempt inside a worker. Distinguishes
/// a tile this worker actually fetched from one it found already cached
/// on the double-checked recheck — the original source left that case an
/// implicit `None` (`spec.md` §9); here it's a named variant.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Vec<Tile>),
    AlreadyCached(Tile),
}

impl CreateOutcome {
    pub fn into_tiles(self) -> Vec<Tile> {
        match self {
            CreateOutcome::Created(tiles) => tiles,
            CreateOutcome::AlreadyCached(tile) => vec![tile],
        }
    }
}

/// Given a set of missing tiles and the surrounding collection, return the
/// tiles actually created — possibly more than asked, when a meta-capable
/// source batches.
pub trait TileCreator: Send + Sync {
    fn create_tiles(
        &self,
        missing: &[Tile],
        all: &TileCollection,
    ) -> CoreResult<Vec<CreateOutcome>>;
}

fn create_one(
    tile: &Tile,
    all: &TileCollection,
    cache: &FileCache,
    source: &dyn TileSource,
    image_lib: &dyn ImageLibrary,
    lock_dir: &Path,
    lock_timeout: Duration,
) -> CoreResult<CreateOutcome> {
    let _lock = source.tile_lock(tile, lock_dir, lock_timeout)?;

    if cache.is_cached(tile) {
        let mut recheck = tile.clone();
        cache.load(&mut recheck, true)?;
        return Ok(CreateOutcome::AlreadyCached(recheck));
    }

    let mut created = source.create_tile(tile, all)?;
    for t in &mut created {
        cache.store(t, image_lib)?;
    }
    Ok(CreateOutcome::Created(created))
}

/// Processes missing tiles one at a time, in order.
pub struct SequentialTileCreator<'a> {
    pub cache: &'a FileCache,
    pub source: &'a dyn TileSource,
    pub image_lib: &'a dyn ImageLibrary,
    pub lock_dir: PathBuf,
    pub lock_timeout: Duration,
}

impl<'a> TileCreator for SequentialTileCreator<'a> {
    fn create_tiles(
        &self,
        missing: &[Tile],
        all: &TileCollection,
    ) -> CoreResult<Vec<CreateOutcome>> {
        let mut outcomes = Vec::with_capacity(missing.len());
        for tile in missing {
            outcomes.push(create_one(
                tile,
                all,
                self.cache,
                self.source,
                self.image_lib,
                &self.lock_dir,
                self.lock_timeout,
            )?);
        }
        cleanup_lockdir(&self.lock_dir, self.lock_timeout * 10);
        Ok(outcomes)
    }
}

/// Deduplicates missing tiles by lock filename (tiles sharing a lock —
/// i.e. covered by the same meta-tile — collapse to one representative),
/// then fans the distinct representatives out across a bounded `rayon`
/// pool. Worker errors propagate after the pool drains; tiles stored
/// before a sibling's failure remain on disk (`spec.md` §4.4, §7).
pub struct ParallelTileCreator<'a> {
    pub cache: &'a FileCache,
    pub source: &'a dyn TileSource,
    pub image_lib: &'a dyn ImageLibrary,
    pub lock_dir: PathBuf,
    pub lock_timeout: Duration,
    pub pool: rayon::ThreadPool,
}

impl<'a> ParallelTileCreator<'a> {
    pub fn new(
        cache: &'a FileCache,
        source: &'a dyn TileSource,
        image_lib: &'a dyn ImageLibrary,
        lock_dir: PathBuf,
        lock_timeout: Duration,
        pool_size: usize,
    ) -> CoreResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size.max(1))
            .thread_name(|i| format!("tile-creator-{i}"))
            .build()
            .map_err(|e| crate::error::CoreError::TileSource(e.to_string()))?;
        Ok(Self { cache, source, image_lib, lock_dir, lock_timeout, pool })
    }

    fn lock_key(&self, tile: &Tile) -> Option<PathBuf> {
        self.source.lock_path(tile, &self.lock_dir)
    }
}

impl<'a> TileCreator for ParallelTileCreator<'a> {
    fn create_tiles(
        &self,
        missing: &[Tile],
        all: &TileCollection,
    ) -> CoreResult<Vec<CreateOutcome>> {
        let mut by_lock: HashMap<PathBuf, Tile> = HashMap::new();
        for tile in missing {
            if let Some(key) = self.lock_key(tile) {
                by_lock.entry(key).or_insert_with(|| tile.clone());
            }
        }
        let representatives: Vec<Tile> = by_lock.into_values().collect();

        if representatives.len() <= 1 {
            let outcomes = representatives
                .iter()
                .map(|t| {
                    create_one(
                        t,
                        all,
                        self.cache,
                        self.source,
                        self.image_lib,
                        &self.lock_dir,
                        self.lock_timeout,
                    )
                })
                .collect::<CoreResult<Vec<_>>>()?;
            cleanup_lockdir(&self.lock_dir, self.lock_timeout * 10);
            return Ok(outcomes);
        }

        let results: Mutex<Vec<CoreResult<CreateOutcome>>> =
            Mutex::new(Vec::with_capacity(representatives.len()));
        self.pool.install(|| {
            rayon::scope(|scope| {
                for tile in &representatives {
                    let results = &results;
                    scope.spawn(move |_| {
                        let outcome = create_one(
                            tile,
                            all,
                            self.cache,
                            self.source,
                            self.image_lib,
                            &self.lock_dir,
                            self.lock_timeout,
                        );
                        results.lock().push(outcome);
                    });
                }
            });
        });

        cleanup_lockdir(&self.lock_dir, self.lock_timeout * 10);

        let collected = results.into_inner();
        let mut outcomes = Vec::with_capacity(collected.len());
        for result in collected {
            outcomes.push(result?);
        }
        Ok(outcomes)
    }
}
