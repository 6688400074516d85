// src/resolver.rs
//
// Resource resolution: identifier -> source bytes.

mod http;

pub use http::{HttpResolver, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BODY_BYTES};

use crate::error::Result;
use std::io::Cursor;

/// Header attached to every outbound fetch. A request arriving with it was
/// sent by an instance of this service and is refused.
pub const LOOP_DETECTION_HEADER: &str = "X-Iiif-Pipe";

/// Fetched source bytes as a seekable stream.
pub type Resource = Cursor<Vec<u8>>;

/// Resolves an identifier to the bytes of a source image.
///
/// Implementations block; the server calls them from a blocking worker.
pub trait ResourceResolver: Send + Sync {
    fn get_resource(&self, identifier: &str) -> Result<Resource>;
}

impl<R: ResourceResolver + ?Sized> ResourceResolver for std::sync::Arc<R> {
    fn get_resource(&self, identifier: &str) -> Result<Resource> {
        (**self).get_resource(identifier)
    }
}
