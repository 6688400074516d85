#![no_main]

use iiif_pipe::request::parse;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(spec) = std::str::from_utf8(data) else {
        return;
    };
    // Anything that parses must serialize to a form that parses to the same thing.
    if let Ok(request) = parse(spec) {
        let canonical = request.to_string();
        let reparsed = parse(&canonical).expect("canonical form must parse");
        assert_eq!(reparsed.to_string(), canonical);
        assert_eq!(reparsed.identifier, request.identifier);
        assert_eq!(reparsed.format, request.format);
    }
});
