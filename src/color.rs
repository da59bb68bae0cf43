//! Colour comparison, edge blending and colour-string parsing.

use image::Rgba;

/// Opaque black, the initial stroke colour.
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Fully transparent pixel (the state of a cleared surface).
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Share of the existing pixel that survives an edge blend, in percent.
/// The fill colour contributes the remaining 99%.
pub const EDGE_BLEND_EXISTING_PERCENT: u32 = 1;

// ============================================================================
// MATCHING / BLENDING
// ============================================================================

/// Exact 4-channel equality.
#[inline(always)]
pub fn colors_match(a: Rgba<u8>, b: Rgba<u8>) -> bool {
    a.0 == b.0
}

/// Soften `existing` toward `fill`: 1% existing, 99% fill, per channel
/// (alpha included), rounded to nearest.
#[inline]
pub fn blend_toward(existing: Rgba<u8>, fill: Rgba<u8>) -> Rgba<u8> {
    let keep = EDGE_BLEND_EXISTING_PERCENT;
    let take = 100 - keep;
    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let v = existing.0[i] as u32 * keep + fill.0[i] as u32 * take;
        *o = ((v + 50) / 100) as u8;
    }
    Rgba(out)
}

/// Source-over composite of `top` onto `base` (straight alpha).
pub fn source_over(base: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let ta = top.0[3] as f32 / 255.0;
    if ta >= 1.0 {
        return top;
    }
    if ta <= 0.0 {
        return base;
    }
    let ba = base.0[3] as f32 / 255.0;
    let out_a = ta + ba * (1.0 - ta);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (top.0[i] as f32 * ta + base.0[i] as f32 * ba * (1.0 - ta)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

// ============================================================================
// PARSING / FORMATTING
// ============================================================================

/// A colour string that is neither `#rrggbb` nor `rgb(...)` / `rgba(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError {
    pub input: String,
}

impl std::fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed colour string '{}'", self.input)
    }
}

impl std::error::Error for ColorParseError {}

/// Parse a CSS-like colour string.
///
/// Accepted forms:
/// * `#rrggbb` / `rrggbb` (case-insensitive hex, alpha 255)
/// * `rgb(r, g, b)` with 0–255 channels
/// * `rgba(r, g, b, a)` with 0–255 channels and `a` in 0.0–1.0
pub fn parse_color(input: &str) -> Result<Rgba<u8>, ColorParseError> {
    let s = input.trim();
    let err = || ColorParseError {
        input: input.to_string(),
    };

    let lower = s.to_ascii_lowercase();
    if let Some(body) = lower.strip_prefix("rgba(").and_then(|b| b.strip_suffix(')')) {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(err());
        }
        let r = parse_channel(parts[0]).ok_or_else(err)?;
        let g = parse_channel(parts[1]).ok_or_else(err)?;
        let b = parse_channel(parts[2]).ok_or_else(err)?;
        let a: f64 = parts[3].parse().map_err(|_| err())?;
        if !(0.0..=1.0).contains(&a) {
            return Err(err());
        }
        return Ok(Rgba([r, g, b, (a * 255.0).round() as u8]));
    }
    if let Some(body) = lower.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(err());
        }
        let r = parse_channel(parts[0]).ok_or_else(err)?;
        let g = parse_channel(parts[1]).ok_or_else(err)?;
        let b = parse_channel(parts[2]).ok_or_else(err)?;
        return Ok(Rgba([r, g, b, 255]));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }
    let val = u32::from_str_radix(hex, 16).map_err(|_| err())?;
    Ok(Rgba([
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
        255,
    ]))
}

fn parse_channel(s: &str) -> Option<u8> {
    s.parse::<u8>().ok()
}

/// `#rrggbb` for opaque colours, `rgba(r,g,b,a)` otherwise.
pub fn format_color(c: Rgba<u8>) -> String {
    let [r, g, b, a] = c.0;
    if a == 255 {
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    } else {
        let alpha = a as f64 / 255.0;
        format!("rgba({},{},{},{})", r, g, b, (alpha * 1000.0).round() / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_checks_all_channels() {
        assert!(colors_match(Rgba([1, 2, 3, 4]), Rgba([1, 2, 3, 4])));
        assert!(!colors_match(Rgba([1, 2, 3, 4]), Rgba([1, 2, 3, 5])));
        assert!(!colors_match(Rgba([0, 2, 3, 4]), Rgba([1, 2, 3, 4])));
    }

    #[test]
    fn blend_is_mostly_fill_colour() {
        let out = blend_toward(Rgba([0, 0, 0, 255]), Rgba([255, 0, 0, 255]));
        assert_eq!(out, Rgba([252, 0, 0, 255]));
    }

    #[test]
    fn blend_with_fill_colour_is_stable() {
        let red = Rgba([255, 0, 0, 255]);
        assert_eq!(blend_toward(red, red), red);
        let odd = Rgba([17, 99, 201, 33]);
        assert_eq!(blend_toward(odd, odd), odd);
    }

    #[test]
    fn source_over_opaque_replaces() {
        let base = Rgba([10, 20, 30, 255]);
        let top = Rgba([200, 100, 50, 255]);
        assert_eq!(source_over(base, top), top);
        assert_eq!(source_over(base, TRANSPARENT), base);
    }

    #[test]
    fn source_over_half_alpha_onto_transparent_keeps_colour() {
        let top = Rgba([200, 100, 50, 128]);
        let out = source_over(TRANSPARENT, top);
        assert_eq!(out, Rgba([200, 100, 50, 128]));
    }

    #[test]
    fn parses_hex_with_and_without_hash() {
        assert_eq!(parse_color("#ff8000").unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!(parse_color("FF8000").unwrap(), Rgba([255, 128, 0, 255]));
    }

    #[test]
    fn parses_rgb_and_rgba_functions() {
        assert_eq!(parse_color("rgb(1, 2, 3)").unwrap(), Rgba([1, 2, 3, 255]));
        assert_eq!(parse_color("rgba(0,0,0,1)").unwrap(), BLACK);
        assert_eq!(parse_color("RGBA(10,20,30,0)").unwrap(), Rgba([10, 20, 30, 0]));
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in ["", "#fff", "#gggggg", "#1234567", "rgb(1,2)", "rgb(256,0,0)", "rgba(0,0,0,2)", "red"] {
            let e = parse_color(bad).unwrap_err();
            assert_eq!(e.input, bad);
        }
    }

    #[test]
    fn format_then_parse_gives_same_opaque_colour() {
        let c = Rgba([12, 200, 7, 255]);
        assert_eq!(format_color(c), "#0cc807");
        assert_eq!(parse_color(&format_color(c)).unwrap(), c);
    }
}
