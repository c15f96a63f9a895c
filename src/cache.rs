//! On-disk tile storage: path layout, atomic write, monochrome dedup via
//! symlink, per-tile advisory locks.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coord::TileCoord;
use crate::error::CoreResult;
use crate::image::ImageLibrary;
use crate::lock::{lock_cache_id, ScopedLock};
use crate::tile::Tile;

/// Pure on-disk KV store keyed by tile coord, valued by image bytes.
pub struct FileCache {
    cache_dir: PathBuf,
    lock_dir: PathBuf,
    file_ext: String,
    link_single_color_images: bool,
    lock_timeout: Duration,
    cache_id: String,
}

impl FileCache {
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        file_ext: impl Into<String>,
        lock_dir: impl Into<PathBuf>,
        link_single_color_images: bool,
        lock_timeout: Duration,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let cache_id = lock_cache_id(&cache_dir.to_string_lossy());
        Self {
            cache_dir,
            lock_dir: lock_dir.into(),
            file_ext: file_ext.into(),
            link_single_color_images,
            lock_timeout,
            cache_id,
        }
    }

    /// `<root>/zz/xxx/xxx/xxx/yyy/yyy/yyy.ext` — deterministic and
    /// injective over `(z, x, y)`.
    pub fn tile_location(&self, coord: TileCoord) -> PathBuf {
        self.cache_dir
            .join(format!("{:02}", coord.z))
            .join(format!("{:03}", coord.x / 1_000_000))
            .join(format!("{:03}", (coord.x / 1_000) % 1_000))
            .join(format!("{:03}", coord.x % 1_000))
            .join(format!("{:03}", coord.y / 1_000_000))
            .join(format!("{:03}", (coord.y / 1_000) % 1_000))
            .join(format!("{:03}.{}", coord.y % 1_000, self.file_ext))
    }

    fn single_color_location(&self, hex: &str) -> PathBuf {
        self.cache_dir.join("single_color_tiles").join(format!("{hex}.{}", self.file_ext))
    }

    fn location_for(&self, tile: &mut Tile) -> Option<PathBuf> {
        let coord = tile.coord?;
        if tile.location.is_none() {
            tile.location = Some(self.tile_location(coord));
        }
        tile.location.clone()
    }

    /// `true` iff `tile.source` is already set, or `location` exists as a
    /// regular file or live symlink.
    pub fn is_cached(&self, tile: &Tile) -> bool {
        if tile.source.is_some() {
            return true;
        }
        let Some(coord) = tile.coord else { return false };
        let location = tile.location.clone().unwrap_or_else(|| self.tile_location(coord));
        location.symlink_metadata().is_ok()
    }

    /// Populate `tile.source` from disk if cached; idempotent, a no-op if
    /// `tile` already has a source.
    pub fn load(&self, tile: &mut Tile, with_metadata: bool) -> CoreResult<()> {
        if tile.source.is_some() || tile.coord.is_none() {
            return Ok(());
        }
        let location = match self.location_for(tile) {
            Some(l) => l,
            None => return Ok(()),
        };
        if !location.exists() {
            return Ok(());
        }
        if with_metadata {
            self.update_metadata(tile, &location)?;
        }
        tile.source = Some(crate::image::ImageSource::Path(location));
        Ok(())
    }

    fn update_metadata(&self, tile: &mut Tile, location: &Path) -> CoreResult<()> {
        let meta = std::fs::metadata(location)?;
        tile.size = Some(meta.len());
        tile.timestamp = Some(
            meta.modified()?
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        );
        Ok(())
    }

    /// `stat location`; returns the mtime in seconds.
    pub fn timestamp_created(&self, tile: &mut Tile) -> CoreResult<u64> {
        let location = self.location_for(tile).expect("tile has a coord");
        self.update_metadata(tile, &location)?;
        Ok(tile.timestamp.unwrap_or_default())
    }

    /// Write `tile.source` bytes atomically to `location`. No-op if the
    /// tile is already stored. When monochrome dedup is enabled and the
    /// image library reports a single color, the real bytes land once
    /// under `single_color_tiles/` and `location` becomes a symlink to it.
    pub fn store(&self, tile: &mut Tile, image_lib: &dyn ImageLibrary) -> CoreResult<()> {
        if tile.stored {
            return Ok(());
        }
        let location = self.location_for(tile).expect("tile has a coord");
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = tile.source.as_ref().expect("store requires tile.source").as_bytes()?;

        if self.link_single_color_images {
            if let Some(color) = image_lib.single_color(&data)? {
                let real_location = self.single_color_location(&color.to_hex());
                if !real_location.exists() {
                    if let Some(parent) = real_location.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    write_atomic(&real_location, &data)?;
                }
                if location.symlink_metadata().is_ok() {
                    std::fs::remove_file(&location)?;
                }
                symlink(&real_location, &location)?;
                self.update_metadata(tile, &location)?;
                tile.stored = true;
                tracing::debug!(coord = ?tile.coord, target = %real_location.display(), "linked monochrome tile");
                return Ok(());
            }
        }

        if location.symlink_metadata().is_ok() {
            std::fs::remove_file(&location)?;
        }
        write_atomic(&location, &data)?;
        self.update_metadata(tile, &location)?;
        tile.stored = true;
        tracing::debug!(coord = ?tile.coord, path = %location.display(), "stored tile");
        Ok(())
    }

    /// A lock scoped to this cache's own lock dir, keyed by tile coord.
    pub fn lock(&self, tile: &Tile) -> CoreResult<ScopedLock> {
        let coord = tile.coord.expect("cannot lock a null tile");
        let path = self
            .lock_dir
            .join(format!("{}-{}-{}-{}.lck", self.cache_id, coord.z, coord.x, coord.y));
        ScopedLock::acquire(&path, self.lock_timeout)
    }

    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }
}

fn write_atomic(location: &Path, data: &[u8]) -> CoreResult<()> {
    let tmp = location.with_extension(format!(
        "{}.tmp",
        location.extension().and_then(|e| e.to_str()).unwrap_or("part")
    ));
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, location)?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> CoreResult<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink(target: &Path, link: &Path) -> CoreResult<()> {
    // Symlink semantics aren't available on every target filesystem; fall
    // back to a plain copy rather than fail the store (`spec.md` §4.1).
    std::fs::copy(target, link)?;
    Ok(())
}
