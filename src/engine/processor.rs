// src/engine/processor.rs
//
// Request orchestration: fetch -> decode -> orient -> trim -> crop -> scale -> encode.
// Runs synchronously on the calling thread; the sink sees nothing until the
// output is fully encoded.

use super::decoder::{decode_image, detect_exif_orientation, format_name};
use super::encoder::encode;
use super::limits::Limits;
use super::pipeline::apply_ops;
use crate::error::Result;
use crate::geometry::Dimensions;
use crate::ops::{Operation, Orientation};
use crate::request::Request;
use crate::resolver::ResourceResolver;
use std::io::Write;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a successful `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub content_type: &'static str,
    /// Lower-case codec name of the source, when it could be sniffed.
    pub source_format: Option<String>,
    pub dimensions: Dimensions,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Processor {
    limits: Limits,
}

impl Processor {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Runs `request` end to end and writes the encoded image to `sink`.
    pub fn process<R, W>(
        &self,
        request: &Request,
        resolver: &R,
        sink: &mut W,
    ) -> Result<ProcessResult>
    where
        R: ResourceResolver + ?Sized,
        W: Write + ?Sized,
    {
        let started_at = Instant::now();

        let bytes = resolver.get_resource(&request.identifier)?.into_inner();
        debug!(bytes = bytes.len(), "resource resolved");

        let (img, detected) = decode_image(&bytes, &self.limits)?;
        let source_format = detected.map(format_name);
        debug!(
            width = img.width(),
            height = img.height(),
            format = source_format.as_deref().unwrap_or("unknown"),
            "decoded source"
        );

        let orientation = if request.auto_orient {
            Orientation::from_exif(detect_exif_orientation(&bytes))
        } else {
            Orientation::Identity
        };
        // The raw bytes are not needed past this point.
        drop(bytes);

        let ops = Operation::plan(request, orientation);
        let img = apply_ops(img, &ops, &self.limits)?;
        let dimensions = Dimensions::new(img.width(), img.height());

        let encoded = encode(&img, request.format)?;
        drop(img);

        sink.write_all(&encoded)?;

        info!(
            format = request.format.extension(),
            width = dimensions.width,
            height = dimensions.height,
            bytes = encoded.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "processed image"
        );
        Ok(ProcessResult {
            content_type: request.format.content_type(),
            source_format,
            dimensions,
            bytes_written: encoded.len(),
        })
    }
}
