//! Process-wide configuration consumed by the core.
//!
//! YAML loading is the front end's job (`spec.md` §1 lists it out of
//! scope); `CoreConfig` is plain, already-parsed data threaded explicitly
//! through constructors — no hidden globals (`spec.md` §9).

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// The five knobs `spec.md` §6 enumerates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Hard cap on tiles per map request.
    pub max_tile_limit: usize,
    /// Parallel-creator worker count.
    pub tile_creator_pool_size: usize,
    /// Seconds, used for both HTTP and lock timeouts.
    #[serde(rename = "http_client_timeout_secs")]
    pub http_client_timeout: DurationSecs,
    /// Path for source-level (and file-cache) locks.
    pub lock_dir: PathBuf,
    /// Enable filesystem-dedup of monochrome tiles.
    pub link_single_color_images: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_tile_limit: 100,
            tile_creator_pool_size: 4,
            http_client_timeout: DurationSecs(Duration::from_secs(60)),
            lock_dir: PathBuf::from("tile_locks"),
            link_single_color_images: false,
        }
    }
}

/// A `Duration` that (de)serializes as whole seconds, so `CoreConfig` can
/// be built straight from a front end's already-parsed YAML/JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationSecs(pub Duration);

impl<'de> Deserialize<'de> for DurationSecs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(DurationSecs(Duration::from_secs(secs)))
    }
}

impl From<DurationSecs> for Duration {
    fn from(d: DurationSecs) -> Duration {
        d.0
    }
}
