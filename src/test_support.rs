//! Stub implementations of the external contracts (`spec.md` §1/§6), used
//! by this crate's own tests so they never depend on a real codec, SRS
//! library, or network.

use bytes::Bytes;

use crate::coord::TileCoord;
use crate::error::{CoreError, CoreResult};
use crate::http::{HttpClient, HttpResponse};
use crate::image::{BBox, Color, ImageLibrary, MetaTileCrop, TiledImage};

pub use crate::srs::IdentitySrsTransformer;

/// An `ImageLibrary` that never detects monochrome tiles and otherwise
/// passes bytes through untouched — enough to exercise cache/creator
/// plumbing without a real codec.
pub struct NoopImageLibrary;

impl ImageLibrary for NoopImageLibrary {
    fn single_color(&self, _data: &[u8]) -> CoreResult<Option<Color>> {
        Ok(None)
    }

    fn split_meta_tile(
        &self,
        meta_image: &[u8],
        crops: &[MetaTileCrop],
        _tile_size: (u32, u32),
    ) -> CoreResult<Vec<(TileCoord, Bytes)>> {
        let bytes = Bytes::copy_from_slice(meta_image);
        Ok(crops.iter().map(|c| (c.coord, bytes.clone())).collect())
    }

    fn transform(
        &self,
        data: &[u8],
        _src_srs: &str,
        _dst_srs: &str,
        _src_bbox: BBox,
        _dst_bbox: BBox,
        _size: (u32, u32),
    ) -> CoreResult<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn compose(
        &self,
        tiled: &TiledImage,
        _dst_bbox: BBox,
        _dst_srs: &str,
        _size: (u32, u32),
    ) -> CoreResult<Bytes> {
        for source in &tiled.tile_sources {
            if let Some(source) = source {
                return source.as_bytes();
            }
        }
        Ok(Bytes::new())
    }
}

/// An `ImageLibrary` whose `single_color` always reports the same fixed
/// color, for exercising the monochrome-dedup path deterministically.
pub struct FixedColorImageLibrary(pub Color);

impl ImageLibrary for FixedColorImageLibrary {
    fn single_color(&self, _data: &[u8]) -> CoreResult<Option<Color>> {
        Ok(Some(self.0))
    }

    fn split_meta_tile(
        &self,
        meta_image: &[u8],
        crops: &[MetaTileCrop],
        tile_size: (u32, u32),
    ) -> CoreResult<Vec<(TileCoord, Bytes)>> {
        NoopImageLibrary.split_meta_tile(meta_image, crops, tile_size)
    }

    fn transform(
        &self,
        data: &[u8],
        src_srs: &str,
        dst_srs: &str,
        src_bbox: BBox,
        dst_bbox: BBox,
        size: (u32, u32),
    ) -> CoreResult<Bytes> {
        NoopImageLibrary.transform(data, src_srs, dst_srs, src_bbox, dst_bbox, size)
    }

    fn compose(
        &self,
        tiled: &TiledImage,
        dst_bbox: BBox,
        dst_srs: &str,
        size: (u32, u32),
    ) -> CoreResult<Bytes> {
        NoopImageLibrary.compose(tiled, dst_bbox, dst_srs, size)
    }
}

/// A scripted `HttpClient`: returns canned responses by call order, and
/// records every URL it was asked to fetch.
pub struct StubHttpClient {
    responses: parking_lot::Mutex<std::collections::VecDeque<CoreResult<HttpResponse>>>,
    requested: parking_lot::Mutex<Vec<String>>,
}

impl StubHttpClient {
    pub fn new(responses: Vec<CoreResult<HttpResponse>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            requested: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: &'static [u8]) -> Self {
        Self::new(vec![Ok(HttpResponse { status: 200, body: Bytes::from_static(body) })])
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

impl HttpClient for StubHttpClient {
    fn get(&self, url: &str) -> CoreResult<HttpResponse> {
        self.requested.lock().push(url.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::TileSource("stub exhausted".into())))
    }
}
