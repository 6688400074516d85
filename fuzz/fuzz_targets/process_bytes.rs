#![no_main]

use arbitrary::Arbitrary;
use iiif_pipe::engine::{Limits, Processor};
use iiif_pipe::error::Result;
use iiif_pipe::geometry::Dimensions;
use iiif_pipe::request::parse;
use iiif_pipe::resolver::{Resource, ResourceResolver};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

#[derive(Arbitrary, Debug)]
struct Input {
    region: u8,
    size: u8,
    format: u8,
    auto_orient: bool,
    trim: bool,
    bytes: Vec<u8>,
}

struct Bytes(Vec<u8>);

impl ResourceResolver for Bytes {
    fn get_resource(&self, _identifier: &str) -> Result<Resource> {
        Ok(Cursor::new(self.0.clone()))
    }
}

const REGIONS: &[&str] = &["full", "square", "0,0,16,16", "pct:25,25,50,50", "5,5,0,0"];
const SIZES: &[&str] = &["full", "max", "32,", ",32", "!64,64", "pct:50", "0,0"];
const FORMATS: &[&str] = &["jpg", "png", "gif"];

fuzz_target!(|input: Input| {
    let mut spec = format!(
        "fuzz/{}/{}/0/default.{}",
        REGIONS[input.region as usize % REGIONS.len()],
        SIZES[input.size as usize % SIZES.len()],
        FORMATS[input.format as usize % FORMATS.len()],
    );
    let mut query = Vec::new();
    if input.auto_orient {
        query.push("autoOrient=true");
    }
    if input.trim {
        query.push("trimBorder=0.1");
    }
    if !query.is_empty() {
        spec.push('?');
        spec.push_str(&query.join("&"));
    }

    let request = parse(&spec).expect("fuzz spec table is valid");
    // Keep decoded sources small so iterations stay fast.
    let limits = Limits::default()
        .with_max_source_pixels(1 << 20)
        .with_max_scale_size(Dimensions::new(512, 512));
    let mut sink = Vec::new();
    if Processor::new(limits)
        .process(&request, &Bytes(input.bytes), &mut sink)
        .is_err()
    {
        assert!(sink.is_empty(), "nothing is written on failure");
    }
});
