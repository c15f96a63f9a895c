//! Image data model and the external image-library contract.
//!
//! The raster codec itself (decode/encode, blitting, reprojection, single
//! color detection) is out of scope for this crate — `spec.md` §1 names it
//! as a pluggable dependency. [`ImageLibrary`] is that dependency's contract;
//! [`ImageSource`], [`BBox`] and [`Color`] are the plain data shapes the core
//! passes through it.

use std::path::PathBuf;

use bytes::Bytes;

use crate::coord::TileCoord;
use crate::error::CoreResult;

/// A geographic/projected bounding box `(minx, miny, maxx, maxy)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self { minx, miny, maxx, maxy }
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    /// Smallest bbox enclosing both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            minx: self.minx.min(other.minx),
            miny: self.miny.min(other.miny),
            maxx: self.maxx.max(other.maxx),
            maxy: self.maxy.max(other.maxy),
        }
    }

    /// Whether `self` fully contains `other`.
    pub fn encloses(&self, other: &BBox) -> bool {
        self.minx <= other.minx
            && self.miny <= other.miny
            && self.maxx >= other.maxx
            && self.maxy >= other.maxy
    }
}

/// An RGB(A) color used for monochrome-tile dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: Option<u8>,
}

impl Color {
    /// Lowercase hex, e.g. `ff0000` or `ff0000aa` when alpha is set — the
    /// same encoding used for `single_color_tiles/<hex>.<ext>` filenames.
    pub fn to_hex(&self) -> String {
        match self.a {
            Some(a) => format!("{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, a),
            None => format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b),
        }
    }
}

/// The tile's opaque image handle: either bytes already in memory, or a
/// path to a file that holds them (set by `FileCache::load`, which avoids
/// reading bytes it doesn't need to).
#[derive(Debug, Clone)]
pub enum ImageSource {
    Bytes(Bytes),
    Path(PathBuf),
}

impl ImageSource {
    /// Read this source into owned bytes, regardless of backing form.
    pub fn as_bytes(&self) -> CoreResult<Bytes> {
        match self {
            ImageSource::Bytes(b) => Ok(b.clone()),
            ImageSource::Path(p) => Ok(Bytes::from(std::fs::read(p)?)),
        }
    }
}

/// A single constituent tile split out of a meta-tile image: its cache
/// coordinate plus the pixel crop origin within the meta image.
#[derive(Debug, Clone, Copy)]
pub struct MetaTileCrop {
    pub coord: TileCoord,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// A composed grid of tile images awaiting final transform/crop to the
/// client's requested bbox/size/srs.
pub struct TiledImage {
    pub tile_sources: Vec<Option<ImageSource>>,
    pub src_bbox: BBox,
    pub src_srs: String,
    pub tile_grid: (u32, u32),
    pub tile_size: (u32, u32),
    pub transparent: bool,
}

/// The external image-library contract: decode/encode, blitting,
/// reprojection, single-color detection. Named by contract per `spec.md`
/// §1/§6 — never implemented inside this crate.
pub trait ImageLibrary: Send + Sync {
    /// Returns `Some(color)` if `data` is a single solid color image.
    fn single_color(&self, data: &[u8]) -> CoreResult<Option<Color>>;

    /// Split a meta-tile image into its constituent cache tiles.
    fn split_meta_tile(
        &self,
        meta_image: &[u8],
        crops: &[MetaTileCrop],
        tile_size: (u32, u32),
    ) -> CoreResult<Vec<(TileCoord, Bytes)>>;

    /// Reproject `data` from `src_srs` to `dst_srs`.
    fn transform(
        &self,
        data: &[u8],
        src_srs: &str,
        dst_srs: &str,
        src_bbox: BBox,
        dst_bbox: BBox,
        size: (u32, u32),
    ) -> CoreResult<Bytes>;

    /// Compose a `TiledImage` into the final bytes for `dst_bbox`/`size` in
    /// `dst_srs`, cropping/transforming as needed.
    fn compose(
        &self,
        tiled: &TiledImage,
        dst_bbox: BBox,
        dst_srs: &str,
        size: (u32, u32),
    ) -> CoreResult<Bytes>;
}
