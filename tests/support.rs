//! Stub external-contract implementations shared by the end-to-end tests.

use std::collections::VecDeque;

use bytes::Bytes;
use parking_lot::Mutex;

use tilecache_core::coord::TileCoord;
use tilecache_core::error::{CoreError, CoreResult};
use tilecache_core::http::{HttpClient, HttpResponse};
use tilecache_core::image::{BBox, Color, ImageLibrary, MetaTileCrop, TiledImage};

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

pub struct StubHttpClient {
    responses: Mutex<VecDeque<CoreResult<HttpResponse>>>,
}

impl StubHttpClient {
    pub fn new(responses: Vec<CoreResult<HttpResponse>>) -> Self {
        Self { responses: Mutex::new(responses.into()) }
    }

    pub fn ok(body: &'static [u8]) -> Self {
        Self::new(vec![Ok(HttpResponse { status: 200, body: Bytes::from_static(body) })])
    }
}

impl HttpClient for StubHttpClient {
    fn get(&self, _url: &str) -> CoreResult<HttpResponse> {
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::TileSource("stub exhausted".into())))
    }
}
