// src/request/parse.rs
//
// Parser for the request grammar. Every failure is an InvalidSpec naming the
// offending token; nothing partial is ever returned.

use super::{Format, Region, Request, Size};
use crate::error::{IiifError, Result};
use crate::geometry::{Rect, RelativeRegion};
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;

static SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([^/]+)/([^/]*)/([^/]*)/([^/]+)/([^.]+)\.([^?]+)(?:\?(.*))?$")
        .expect("spec regex is valid")
});

static PERCENT_COORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-?[0-9]+(?:\.[0-9]+)?),(-?[0-9]+(?:\.[0-9]+)?),(-?[0-9]+(?:\.[0-9]+)?),(-?[0-9]+(?:\.[0-9]+)?)$",
    )
    .expect("percentage regex is valid")
});

static PIXEL_RECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?[0-9]+),(-?[0-9]+),(-?[0-9]+),(-?[0-9]+)$")
        .expect("rectangle regex is valid")
});

static PIXEL_WH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(!)?([0-9]+)?,([0-9]+)?$").expect("width/height regex is valid"));

const TRIM_FUZZ_MIN: f64 = 0.0;
const TRIM_FUZZ_MAX: f64 = 0.999;

/// Parses `{identifier}/{region}/{size}/{rotation}/{quality}.{format}[?{query}]`.
pub fn parse(spec: &str) -> Result<Request> {
    let caps = SPEC_RE
        .captures(spec)
        .ok_or_else(|| IiifError::invalid_spec(format!("not a valid spec: {spec:?}")))?;
    let group = |i: usize| caps.get(i).map_or("", |m| m.as_str());

    let raw_identifier = group(1);
    let identifier = query_unescape(raw_identifier).ok_or_else(|| {
        IiifError::invalid_spec(format!("invalid identifier encoding: {raw_identifier:?}"))
    })?;
    if identifier.is_empty() {
        return Err(IiifError::invalid_spec("identifier is empty"));
    }

    let region = parse_region(group(2))?;
    let size = parse_size(group(3))?;

    let rotation = group(4);
    if rotation != "0" {
        return Err(IiifError::invalid_spec(format!(
            "unsupported rotation {rotation:?}"
        )));
    }

    let quality = group(5);
    if !matches!(quality, "color" | "default") {
        return Err(IiifError::invalid_spec(format!(
            "unsupported quality {quality:?}"
        )));
    }

    let extension = group(6);
    let format = Format::from_extension(extension).ok_or_else(|| {
        IiifError::invalid_spec(format!("unsupported format {extension:?}"))
    })?;

    let mut request = Request {
        identifier,
        region,
        size,
        format,
        auto_orient: false,
        trim_border: false,
        trim_border_fuzziness: 0.0,
    };

    let query = group(7);
    if !query.is_empty() {
        let pairs = parse_query(query)
            .ok_or_else(|| IiifError::invalid_spec(format!("invalid query string {query:?}")))?;

        if let Some(value) = first_value(&pairs, "trimBorder") {
            let fuzz = parse_float_in_range(value, TRIM_FUZZ_MIN, TRIM_FUZZ_MAX)?;
            request.trim_border_fuzziness = fuzz;
            request.trim_border = fuzz > 0.0;
        }

        if let Some(value) = first_value(&pairs, "autoOrient") {
            request.auto_orient = parse_boolean(value)?;
        }

        if let Some(value) = first_value(&pairs, "scale") {
            if value != "down" {
                return Err(IiifError::invalid_spec(format!(
                    "not a valid scale: {value:?}"
                )));
            }
            // Only an absolute size can be enlarged past the source.
            if let Size::Absolute {
                ref mut do_not_enlarge,
                ..
            } = request.size
            {
                *do_not_enlarge = true;
            }
        }
    }

    Ok(request)
}

fn parse_region(value: &str) -> Result<Region> {
    match value {
        "full" | "" => Ok(Region::Full),
        "square" => Ok(Region::Square),
        _ => match value.strip_prefix("pct:") {
            Some(coords) => parse_percentage_coords(coords).map(Region::Relative),
            None => parse_rectangle(value).map(Region::Absolute),
        },
    }
}

fn parse_size(value: &str) -> Result<Size> {
    match value {
        "full" | "" => Ok(Size::Full),
        "max" => Ok(Size::Max),
        _ => match value.strip_prefix("pct:") {
            Some(pct) => parse_percentage(pct).map(Size::Relative),
            None => parse_width_height(value),
        },
    }
}

fn parse_percentage_coords(s: &str) -> Result<RelativeRegion> {
    let caps = PERCENT_COORDS_RE.captures(s).ok_or_else(|| {
        IiifError::invalid_spec(format!("Not a valid set of coordinates: {s}"))
    })?;
    let x = parse_percentage(&caps[1])?;
    let y = parse_percentage(&caps[2])?;
    let w = parse_percentage(&caps[3])?;
    let h = parse_percentage(&caps[4])?;
    RelativeRegion::new(x, y, w, h)
}

fn parse_rectangle(s: &str) -> Result<Rect> {
    let caps = PIXEL_RECT_RE.captures(s).ok_or_else(|| {
        IiifError::invalid_spec(format!("Not a valid set of coordinates: {s}"))
    })?;
    let x = parse_pixel_component(&caps[1])?;
    let y = parse_pixel_component(&caps[2])?;
    let w = parse_pixel_component(&caps[3])?.max(0);
    let h = parse_pixel_component(&caps[4])?.max(0);

    let x1 = i32::try_from(x as i64 + w as i64);
    let y1 = i32::try_from(y as i64 + h as i64);
    match (x1, y1) {
        (Ok(x1), Ok(y1)) => Ok(Rect::new(x, y, x1, y1)),
        _ => Err(IiifError::invalid_spec(format!(
            "Not a valid set of coordinates: {s}"
        ))),
    }
}

fn parse_width_height(s: &str) -> Result<Size> {
    let caps = PIXEL_WH_RE
        .captures(s)
        .ok_or_else(|| IiifError::invalid_spec(format!("Not a valid width/height: {s}")))?;

    let to_pixels = |i: usize| -> Result<Option<u32>> {
        caps.get(i)
            .map(|m| {
                m.as_str().parse::<u32>().map_err(|_| {
                    IiifError::invalid_spec(format!("Not a valid width/height: {s}"))
                })
            })
            .transpose()
    };
    let width = to_pixels(2)?;
    let height = to_pixels(3)?;
    let best_fit = caps.get(1).is_some() && width.is_some() && height.is_some();

    Ok(Size::Absolute {
        width,
        height,
        best_fit,
        do_not_enlarge: false,
    })
}

fn parse_pixel_component(s: &str) -> Result<i32> {
    s.parse::<i32>()
        .map_err(|_| IiifError::invalid_spec(format!("Not a valid pixel value: {s}")))
}

/// Parses a percentage in [0, 100] and normalizes it to [0, 1].
fn parse_percentage(s: &str) -> Result<f64> {
    let invalid = || IiifError::invalid_spec(format!("Invalid percentage number: {s}"));
    let pct: f64 = s.parse().map_err(|_| invalid())?;
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(invalid());
    }
    Ok(pct / 100.0)
}

fn parse_float_in_range(value: &str, min: f64, max: f64) -> Result<f64> {
    let f: f64 = value
        .parse()
        .ok()
        .filter(|f: &f64| f.is_finite())
        .ok_or_else(|| {
            IiifError::invalid_spec(format!("not a floating-point value: {value:?}"))
        })?;
    if f < min || f > max {
        return Err(IiifError::invalid_spec(format!(
            "value outside of range {min:.6}..{max:.6}: {f:.6}"
        )));
    }
    Ok(f)
}

fn parse_boolean(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(IiifError::invalid_spec(format!(
            "not a boolean value: {value:?}"
        ))),
    }
}

/// True when every `%` starts a two-digit hex escape.
fn has_valid_escapes(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Form-style unescape of the identifier segment: `+` is a space, `%XX` a
/// byte. Raw `&` and `=` are kept, so this cannot go through a pair parser.
fn query_unescape(s: &str) -> Option<String> {
    if !has_valid_escapes(s) {
        return None;
    }
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

fn parse_query(query: &str) -> Option<Vec<(String, String)>> {
    if !has_valid_escapes(query) {
        return None;
    }
    Some(
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
    )
}

/// First value for `key`; an empty value counts as absent.
fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec_error(spec: &str) -> String {
        match parse(spec) {
            Err(IiifError::InvalidSpec { message }) => message.into_owned(),
            other => panic!("expected InvalidSpec for {spec:?}, got {other:?}"),
        }
    }

    mod grammar_tests {
        use super::*;

        #[test]
        fn test_minimal_spec() {
            let req = parse("some-identifier/full/max/0/default.png").unwrap();
            assert_eq!(req.identifier, "some-identifier");
            assert_eq!(req.region, Region::Full);
            assert_eq!(req.size, Size::Max);
            assert_eq!(req.format, Format::Png);
            assert!(!req.auto_orient);
            assert!(!req.trim_border);
        }

        #[test]
        fn test_identifier_is_unescaped() {
            let req = parse("http%3A%2F%2Fexample.com%2Fa+b.jpg/full/full/0/color.jpg").unwrap();
            assert_eq!(req.identifier, "http://example.com/a b.jpg");
            assert_eq!(req.format, Format::Jpeg);
        }

        #[test]
        fn test_identifier_keeps_raw_separators() {
            let req = parse("a=b&c+d/full/full/0/default.png").unwrap();
            assert_eq!(req.identifier, "a=b&c d");
        }

        #[test]
        fn test_bad_identifier_escape() {
            assert!(spec_error("bad%zzid/full/full/0/default.png").contains("bad%zzid"));
        }

        #[test]
        fn test_empty_region_and_size_are_full() {
            let req = parse("id///0/default.gif").unwrap();
            assert_eq!(req.region, Region::Full);
            assert_eq!(req.size, Size::Full);
            assert_eq!(req.format, Format::Gif);
        }

        #[test]
        fn test_not_a_valid_spec() {
            assert_eq!(
                spec_error("some-identifier/full/max/0/default."),
                "not a valid spec: \"some-identifier/full/max/0/default.\""
            );
            assert!(spec_error("full/max/0/default.png").starts_with("not a valid spec"));
        }

        #[test]
        fn test_rotation_must_be_zero() {
            assert_eq!(
                spec_error("id/full/max/90/default.png"),
                "unsupported rotation \"90\""
            );
        }

        #[test]
        fn test_quality() {
            assert!(parse("id/full/max/0/color.png").is_ok());
            assert_eq!(
                spec_error("id/full/max/0/grayscale.png"),
                "unsupported quality \"grayscale\""
            );
        }

        #[test]
        fn test_unsupported_format() {
            assert_eq!(
                spec_error("id/full/max/0/default.tif"),
                "unsupported format \"tif\""
            );
        }
    }

    mod region_tests {
        use super::*;

        #[test]
        fn test_square() {
            let req = parse("id/square/max/0/default.png").unwrap();
            assert_eq!(req.region, Region::Square);
        }

        #[test]
        fn test_absolute() {
            let req = parse("id/10,20,30,40/max/0/default.png").unwrap();
            assert_eq!(req.region, Region::Absolute(Rect::new(10, 20, 40, 60)));
        }

        #[test]
        fn test_absolute_negative_origin() {
            let req = parse("id/-10,-10,100,100/max/0/default.png").unwrap();
            assert_eq!(req.region, Region::Absolute(Rect::new(-10, -10, 90, 90)));
        }

        #[test]
        fn test_absolute_negative_size_clamps_to_empty() {
            let req = parse("id/0,0,-100,-100/max/0/default.png").unwrap();
            assert_eq!(req.region, Region::Absolute(Rect::new(0, 0, 0, 0)));
        }

        #[test]
        fn test_absolute_malformed() {
            assert_eq!(
                spec_error("id/1,2,3/max/0/default.png"),
                "Not a valid set of coordinates: 1,2,3"
            );
        }

        #[test]
        fn test_relative() {
            let req = parse("id/pct:10,20,50,100/max/0/default.png").unwrap();
            let expected = RelativeRegion::new(0.1, 0.2, 0.5, 1.0).unwrap();
            assert_eq!(req.region, Region::Relative(expected));
        }

        #[test]
        fn test_relative_bounds_inclusive() {
            assert!(parse("id/pct:0,0,100,100/max/0/default.png").is_ok());
        }

        #[test]
        fn test_relative_out_of_range_cites_numeral() {
            assert_eq!(
                spec_error("id/pct:-1.0,0,10,10/max/0/default.png"),
                "Invalid percentage number: -1.0"
            );
            assert_eq!(
                spec_error("id/pct:0,0,10,100.5/max/0/default.png"),
                "Invalid percentage number: 100.5"
            );
        }

        #[test]
        fn test_relative_malformed() {
            assert_eq!(
                spec_error("id/pct:a,b,c,d/max/0/default.png"),
                "Not a valid set of coordinates: a,b,c,d"
            );
        }
    }

    mod size_tests {
        use super::*;

        fn size_of(size: &str) -> Size {
            parse(&format!("id/full/{size}/0/default.png")).unwrap().size
        }

        #[test]
        fn test_full_and_max() {
            assert_eq!(size_of("full"), Size::Full);
            assert_eq!(size_of("max"), Size::Max);
        }

        #[test]
        fn test_relative() {
            assert_eq!(size_of("pct:50"), Size::Relative(0.5));
            assert_eq!(
                spec_error("id/full/pct:101/0/default.png"),
                "Invalid percentage number: 101"
            );
        }

        #[test]
        fn test_absolute_variants() {
            let abs = |width, height, best_fit| Size::Absolute {
                width,
                height,
                best_fit,
                do_not_enlarge: false,
            };
            assert_eq!(size_of("100,200"), abs(Some(100), Some(200), false));
            assert_eq!(size_of("!100,200"), abs(Some(100), Some(200), true));
            assert_eq!(size_of("100,"), abs(Some(100), None, false));
            assert_eq!(size_of(",200"), abs(None, Some(200), false));
            // A lone `!` with a missing side is not best-fit.
            assert_eq!(size_of("!100,"), abs(Some(100), None, false));
            assert_eq!(size_of("!,200"), abs(None, Some(200), false));
        }

        #[test]
        fn test_absolute_malformed() {
            assert_eq!(
                spec_error("id/full/100x200/0/default.png"),
                "Not a valid width/height: 100x200"
            );
            assert!(spec_error("id/full/99999999999,1/0/default.png")
                .contains("99999999999,1"));
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_trim_border() {
            let req = parse("id/full/max/0/default.png?trimBorder=0.5").unwrap();
            assert!(req.trim_border);
            assert_eq!(req.trim_border_fuzziness, 0.5);
        }

        #[test]
        fn test_trim_border_zero_disables() {
            let req = parse("id/full/max/0/default.png?trimBorder=0").unwrap();
            assert!(!req.trim_border);
        }

        #[test]
        fn test_trim_border_errors() {
            assert_eq!(
                spec_error("id/full/max/0/default.png?trimBorder=abc"),
                "not a floating-point value: \"abc\""
            );
            assert_eq!(
                spec_error("id/full/max/0/default.png?trimBorder=1"),
                "value outside of range 0.000000..0.999000: 1.000000"
            );
            assert!(spec_error("id/full/max/0/default.png?trimBorder=NaN")
                .starts_with("not a floating-point value"));
        }

        #[test]
        fn test_auto_orient() {
            assert!(parse("id/full/max/0/default.png?autoOrient=true").unwrap().auto_orient);
            assert!(!parse("id/full/max/0/default.png?autoOrient=false").unwrap().auto_orient);
            assert_eq!(
                spec_error("id/full/max/0/default.png?autoOrient=yes"),
                "not a boolean value: \"yes\""
            );
        }

        #[test]
        fn test_scale_down() {
            let req = parse("id/full/100,200/0/default.png?scale=down").unwrap();
            assert_eq!(
                req.size,
                Size::Absolute {
                    width: Some(100),
                    height: Some(200),
                    best_fit: false,
                    do_not_enlarge: true,
                }
            );
            assert_eq!(
                spec_error("id/full/100,200/0/default.png?scale=up"),
                "not a valid scale: \"up\""
            );
        }

        #[test]
        fn test_scale_down_ignored_for_non_absolute() {
            let req = parse("id/full/max/0/default.png?scale=down").unwrap();
            assert_eq!(req.size, Size::Max);
        }

        #[test]
        fn test_empty_values_are_absent() {
            let req = parse("id/full/max/0/default.png?autoOrient=&scale=").unwrap();
            assert!(!req.auto_orient);
        }

        #[test]
        fn test_invalid_query_escape() {
            assert_eq!(
                spec_error("id/full/max/0/default.png?trimBorder=%zz"),
                "invalid query string \"trimBorder=%zz\""
            );
        }

        #[test]
        fn test_query_pairs_are_decoded() {
            let req =
                parse("id/full/max/0/default.png?&foo&auto%4Frient=tru%65&&trimBorder=0%2E25")
                    .unwrap();
            assert!(req.auto_orient);
            assert_eq!(req.trim_border_fuzziness, 0.25);
        }

        #[test]
        fn test_first_value_wins() {
            let req = parse("id/full/max/0/default.png?autoOrient=true&autoOrient=false").unwrap();
            assert!(req.auto_orient);
        }

        #[test]
        fn test_unknown_keys_are_ignored() {
            assert!(parse("id/full/max/0/default.png?foo=bar").is_ok());
        }
    }

    mod round_trip_tests {
        use super::*;

        #[test]
        fn test_serialized_form_reparses() {
            for spec in [
                "id/full/full/0/default.png",
                "id/square/max/0/default.jpg?autoOrient=true",
                "a%20b/pct:12.5,0,50,100/pct:33.3/0/default.gif?trimBorder=0.1",
                "id/-10,-10,100,100/!300,200/0/default.png",
                "id/0,0,10,10/300,/0/default.png?scale=down",
            ] {
                let req = parse(spec).unwrap();
                let again = parse(&req.to_string()).unwrap();
                assert_eq!(req, again, "round trip of {spec}");
                assert_eq!(req.to_string(), spec);
            }
        }
    }
}
