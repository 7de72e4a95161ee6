//! Per-display mode parsing
//!
//! Grammar: `name [@WxH] [+X+Y] [{key=value, ...}]`

use tracing::debug;

use super::{parse_rect, parse_size, parse_token_value_pairs, read_offset, read_size};
use crate::config::Settings;
use crate::constants::{grammar, mode_tokens};
use crate::errors::{LayoutError, Result};
use crate::geometry::{Rect, Size};
use crate::layout::{Display, Mode, PixelShift, Reflection, Rotation, StereoEye};

/// Values read from a `{...}` block before normalization
#[derive(Debug, Default)]
struct ModeAttributes {
    viewport_in: Option<Size>,
    viewport_out: Option<Rect>,
}

/// Parse the mode part of one metamode segment for `display`.
///
/// A name that matches none of the display's modelines is reported and
/// the mode becomes NULL. Unknown top-level syntax is an error.
pub fn parse_mode(display: &Display, input: &str, settings: &Settings) -> Result<Mode> {
    let input = input.trim();
    let name_end = input.find(char::is_whitespace).unwrap_or(input.len());
    let name = &input[..name_end];
    if name.is_empty() {
        return Err(LayoutError::malformed("mode has no name"));
    }

    let mut mode = Mode::default();
    if name != grammar::NULL_MODE {
        mode.modeline = display.find_modeline(name);
        if mode.modeline.is_none() {
            settings.report(&LayoutError::missing(format!(
                "mode '{}' not found on display {}, treating as NULL",
                name, display.names.target_id
            )));
        }
    }

    let mut attrs = ModeAttributes::default();
    let mut pan_size = Size::default();
    let mut rest = input[name_end..].trim_start();

    while let Some(first) = rest.chars().next() {
        rest = match first {
            '@' => {
                let (size, tail) = read_size(&rest[1..]).ok_or_else(|| {
                    LayoutError::malformed(format!("bad panning in mode '{}'", input))
                })?;
                pan_size = size;
                tail
            }
            '+' => {
                let ((x, y), tail) = read_offset(&rest[1..]).ok_or_else(|| {
                    LayoutError::malformed(format!("bad position in mode '{}'", input))
                })?;
                mode.pan.x = x;
                mode.pan.y = y;
                tail
            }
            '{' => {
                let close = rest.find('}').ok_or_else(|| {
                    LayoutError::malformed(format!("unterminated '{{' in mode '{}'", input))
                })?;
                let applied = parse_token_value_pairs(&rest[1..close], |token, value| {
                    apply_mode_attribute(&mut mode, &mut attrs, token, value)
                });
                if let Err(err) = applied {
                    settings.report(&err);
                }
                &rest[close + 1..]
            }
            other => {
                return Err(LayoutError::malformed(format!(
                    "unknown token '{}' in mode '{}'",
                    other, input
                )));
            }
        }
        .trim_start();
    }

    let modeline_size = display
        .modeline_of(&mode)
        .map(|ml| ml.size())
        .unwrap_or_default();
    normalize(&mut mode, attrs, pan_size, modeline_size);
    Ok(mode)
}

fn apply_mode_attribute(mode: &mut Mode, attrs: &mut ModeAttributes, token: &str, value: &str) {
    let is = |name: &str| token.eq_ignore_ascii_case(name);
    let value_is = |name: &str| value.eq_ignore_ascii_case(name);

    if is(mode_tokens::STEREO) {
        if value_is("PassiveLeft") {
            mode.stereo = StereoEye::Left;
        } else if value_is("PassiveRight") {
            mode.stereo = StereoEye::Right;
        } else {
            debug!(value, "Unknown stereo eye");
        }
    } else if is(mode_tokens::VIEWPORT_IN) {
        match parse_size(value) {
            Some(size) => attrs.viewport_in = Some(size),
            None => debug!(value, "Bad viewportin"),
        }
    } else if is(mode_tokens::VIEWPORT_OUT) {
        match parse_rect(value) {
            Some(rect) => attrs.viewport_out = Some(rect),
            None => debug!(value, "Bad viewportout"),
        }
    } else if is(mode_tokens::ROTATION) {
        let rotation = match value.to_ascii_lowercase().as_str() {
            "normal" | "0" => Some(Rotation::Normal),
            "left" | "ccw" | "90" => Some(Rotation::Left),
            "invert" | "inverted" | "180" => Some(Rotation::Invert),
            "right" | "cw" | "270" => Some(Rotation::Right),
            _ => None,
        };
        match rotation {
            Some(r) => mode.rotation = r,
            None => debug!(value, "Unknown rotation"),
        }
    } else if is(mode_tokens::REFLECTION) {
        let reflection = match value.to_ascii_lowercase().as_str() {
            "x" => Some(Reflection::X),
            "y" => Some(Reflection::Y),
            "xy" => Some(Reflection::XY),
            _ => None,
        };
        match reflection {
            Some(r) => mode.reflection = r,
            None => debug!(value, "Unknown reflection"),
        }
    } else if is(mode_tokens::PIXEL_SHIFT) {
        if value_is("4kTopLeft") {
            mode.pixel_shift = PixelShift::TopLeft4k;
        } else if value_is("4kBottomRight") {
            mode.pixel_shift = PixelShift::BottomRight4k;
        } else if value_is("8k") {
            mode.pixel_shift = PixelShift::Full8k;
        } else {
            debug!(value, "Unknown pixel shift mode");
        }
    } else if is(mode_tokens::FORCE_COMPOSITION) {
        mode.force_composition = value_is("On");
    } else if is(mode_tokens::FORCE_FULL_COMPOSITION) {
        mode.force_full_composition = value_is("On");
    } else if is(mode_tokens::ALLOW_GSYNC) {
        mode.allow_gsync = !value_is("Off");
    } else {
        debug!(token, value, "Ignoring unknown mode attribute");
    }
}

/// Fill in defaults so the viewports and panning domain are consistent
fn normalize(mode: &mut Mode, attrs: ModeAttributes, pan_size: Size, modeline_size: Size) {
    let mut viewport_out = attrs.viewport_out.unwrap_or_default();
    if viewport_out.width == 0 || viewport_out.height == 0 {
        viewport_out.set_size(modeline_size);
    }
    mode.viewport_out = viewport_out;

    // pixel shift drives ViewPortIn itself; an explicit one is not kept
    let explicit_in = match attrs.viewport_in {
        Some(size) if mode.pixel_shift != PixelShift::None => {
            debug!(
                width = size.width,
                height = size.height,
                "Ignoring viewportin of a pixel shift mode"
            );
            None
        }
        other => other,
    };
    let mut viewport_in = explicit_in.unwrap_or_default();
    if viewport_in.width == 0 || viewport_in.height == 0 {
        viewport_in = viewport_out.size();
    }
    // the server reports panning already rotated, so only ViewPortIn turns
    if mode.rotation.is_sideways() && viewport_in == viewport_out.size() {
        viewport_in = viewport_in.transposed();
    }
    mode.viewport_in = viewport_in;

    mode.pan.width = pan_size.width.max(viewport_in.width);
    mode.pan.height = pan_size.height.max(viewport_in.height);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::test_support::*;

    fn display() -> Display {
        display_with(1, "DFP-0", "DP-0", &[ML_1920X1200, ML_1024X768])
    }

    fn parse(input: &str) -> Result<Mode> {
        parse_mode(&display(), input, &Settings::default())
    }

    #[test]
    fn test_parse_plain_mode() {
        let mode = parse("1920x1200_60 +1920+0").unwrap();
        assert_eq!(mode.modeline, Some(0));
        assert_eq!(mode.pan, Rect::new(1920, 0, 1920, 1200));
        assert_eq!(mode.viewport_in, Size::new(1920, 1200));
        assert_eq!(mode.viewport_out, Rect::new(0, 0, 1920, 1200));
        assert!(!mode.dummy);
        assert!(mode.allow_gsync);
    }

    #[test]
    fn test_parse_panning_and_negative_position() {
        let mode = parse("1024x768 @2048x1536 +-1024+0").unwrap();
        assert_eq!(mode.pan, Rect::new(-1024, 0, 2048, 1536));
    }

    #[test]
    fn test_panning_clamped_to_viewport_in() {
        let mode = parse("1024x768 @100x100 +0+0").unwrap();
        assert_eq!(mode.pan.size(), Size::new(1024, 768));
    }

    #[test]
    fn test_parse_attributes() {
        let mode = parse(
            "1920x1200_60 +0+0 {stereo=PassiveRight, viewportin=1280x800, viewportout=1824x1140+48+30, \
             reflection=xy, ForceCompositionPipeline=On, ForceFullCompositionPipeline=On, AllowGSYNC=Off}",
        )
        .unwrap();
        assert_eq!(mode.stereo, StereoEye::Right);
        assert_eq!(mode.viewport_in, Size::new(1280, 800));
        assert_eq!(mode.viewport_out, Rect::new(48, 30, 1824, 1140));
        assert_eq!(mode.reflection, Reflection::XY);
        assert!(mode.force_composition);
        assert!(mode.force_full_composition);
        assert!(!mode.allow_gsync);
    }

    #[test]
    fn test_rotation_swaps_default_viewport_in() {
        for (value, rotation) in [
            ("left", Rotation::Left),
            ("CW", Rotation::Right),
            ("270", Rotation::Right),
        ] {
            let mode = parse(&format!("1920x1200_60 +0+0 {{rotation={}}}", value)).unwrap();
            assert_eq!(mode.rotation, rotation);
            assert_eq!(mode.viewport_in, Size::new(1200, 1920));
            assert_eq!(mode.pan.size(), Size::new(1200, 1920));
            assert_eq!(mode.viewport_out.size(), Size::new(1920, 1200));
        }

        let inverted = parse("1920x1200_60 +0+0 {rotation=inverted}").unwrap();
        assert_eq!(inverted.viewport_in, Size::new(1920, 1200));
    }

    #[test]
    fn test_pixel_shift() {
        let mode = parse("1920x1200_60 +0+0 {PixelShiftMode=4kBottomRight}").unwrap();
        assert_eq!(mode.pixel_shift, PixelShift::BottomRight4k);
    }

    #[test]
    fn test_pixel_shift_discards_explicit_viewport_in() {
        let mode = parse("1920x1200_60 +0+0 {viewportin=1280x800, PixelShiftMode=8k}").unwrap();
        assert_eq!(mode.pixel_shift, PixelShift::Full8k);
        assert_eq!(mode.viewport_in, Size::new(1920, 1200));
        assert_eq!(mode.pan.size(), Size::new(1920, 1200));
    }

    #[test]
    fn test_null_and_unknown_names() {
        let null = parse("NULL").unwrap();
        assert!(null.is_null());
        assert_eq!(null.pan, Rect::default());

        let unknown = parse("3840x2160 +0+0").unwrap();
        assert!(unknown.is_null());
        assert!(!unknown.dummy);
    }

    #[test]
    fn test_unknown_top_level_token_is_error() {
        assert!(matches!(
            parse("1920x1200_60 +0+0 junk"),
            Err(LayoutError::MalformedInput(_))
        ));
        assert!(parse("1920x1200_60 {rotation=left").is_err());
        assert!(parse("1920x1200_60 +10").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_malformed_attribute_block_keeps_earlier_pairs() {
        let mode = parse("1920x1200_60 +0+0 {rotation=left, oops, reflection=x}").unwrap();
        assert_eq!(mode.rotation, Rotation::Left);
        assert_eq!(mode.reflection, Reflection::None);
    }
}
