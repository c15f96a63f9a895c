//! Spatial reference system data and the external transform contract.
//!
//! The actual coordinate transform math (e.g. a PROJ binding) is out of
//! scope — `spec.md` §1/§6 name it as a pluggable dependency. [`Srs`] is
//! just an identifier plus its geographic/projected class; [`SrsTransformer`]
//! is the contract the core consumes to reproject a bbox between two SRS.

use crate::error::CoreResult;
use crate::image::BBox;

/// A spatial reference system identifier, e.g. `"EPSG:4326"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Srs {
    pub code: String,
    pub is_latlong: bool,
}

impl Srs {
    pub fn new(code: impl Into<String>, is_latlong: bool) -> Self {
        Self { code: code.into(), is_latlong }
    }

    pub fn class(&self) -> SrsClass {
        if self.is_latlong {
            SrsClass::Geographic
        } else {
            SrsClass::Projected
        }
    }
}

/// The two SRS classes `SRSConditional` routes between when no exact or
/// class-matching member is configured for the query's own SRS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrsClass {
    Geographic,
    Projected,
}

/// The external coordinate-transform contract.
pub trait SrsTransformer: Send + Sync {
    /// Reproject `bbox` (in `src`) into `dst`'s coordinate space.
    fn transform_bbox(&self, src: &Srs, dst: &Srs, bbox: BBox) -> CoreResult<BBox>;
}

/// A transformer for deployments where every grid and query share one SRS,
/// or for tests — returns the bbox unchanged and errors if `src != dst`.
pub struct IdentitySrsTransformer;

impl SrsTransformer for IdentitySrsTransformer {
    fn transform_bbox(&self, src: &Srs, dst: &Srs, bbox: BBox) -> CoreResult<BBox> {
        if src.code != dst.code {
            return Err(crate::error::CoreError::InvalidSourceQuery(format!(
                "IdentitySrsTransformer cannot reproject {} to {}",
                src.code, dst.code
            )));
        }
        Ok(bbox)
    }
}
