//! Canonical string output for modes, metamodes and modelines
//!
//! Everything written here parses back to an equal model: attributes left
//! at their defaults are omitted, and every emitted attribute uses the
//! spelling the mode parser accepts.

use crate::constants::{grammar, mode_tokens};
use crate::errors::{LayoutError, Result};
use crate::geometry::Rect;
use crate::layout::{
    Display, DisplayId, Layout, Mode, ModeLine, ModeLineFlags, PixelShift, Reflection, Rotation,
    ScreenId, StereoEye,
};

/// Attribute block entries, in their fixed order
fn mode_attributes(display: &Display, mode: &Mode) -> Vec<String> {
    let mut attrs = Vec::new();

    match mode.stereo {
        StereoEye::None => {}
        StereoEye::Left => attrs.push(format!("{}=PassiveLeft", mode_tokens::STEREO)),
        StereoEye::Right => attrs.push(format!("{}=PassiveRight", mode_tokens::STEREO)),
    }

    let rotation = match mode.rotation {
        Rotation::Normal => None,
        Rotation::Left => Some("left"),
        Rotation::Invert => Some("invert"),
        Rotation::Right => Some("right"),
    };
    if let Some(rotation) = rotation {
        attrs.push(format!("{}={}", mode_tokens::ROTATION, rotation));
    }

    let reflection = match mode.reflection {
        Reflection::None => None,
        Reflection::X => Some("x"),
        Reflection::Y => Some("y"),
        Reflection::XY => Some("xy"),
    };
    if let Some(reflection) = reflection {
        attrs.push(format!("{}={}", mode_tokens::REFLECTION, reflection));
    }

    let pixel_shift = match mode.pixel_shift {
        PixelShift::None => None,
        PixelShift::TopLeft4k => Some("4kTopLeft"),
        PixelShift::BottomRight4k => Some("4kBottomRight"),
        PixelShift::Full8k => Some("8k"),
    };
    if let Some(shift) = pixel_shift {
        attrs.push(format!("{}={}", mode_tokens::PIXEL_SHIFT, shift));
    } else {
        let mut expected_in = mode.viewport_out.size();
        if mode.rotation.is_sideways() {
            expected_in = expected_in.transposed();
        }
        if mode.viewport_in != expected_in {
            attrs.push(format!(
                "{}={}x{}",
                mode_tokens::VIEWPORT_IN,
                mode.viewport_in.width,
                mode.viewport_in.height
            ));
        }
    }

    let modeline_size = display.modeline_of(mode).map(|ml| ml.size()).unwrap_or_default();
    let vpo = mode.viewport_out;
    if vpo.has_offset() || vpo.size() != modeline_size {
        attrs.push(format!(
            "{}={}x{}{:+}{:+}",
            mode_tokens::VIEWPORT_OUT,
            vpo.width,
            vpo.height,
            vpo.x,
            vpo.y
        ));
    }

    if mode.force_composition {
        attrs.push(format!("{}=On", mode_tokens::FORCE_COMPOSITION));
    }
    if mode.force_full_composition {
        attrs.push(format!("{}=On", mode_tokens::FORCE_FULL_COMPOSITION));
    }
    if !mode.allow_gsync {
        attrs.push(format!("{}=Off", mode_tokens::ALLOW_GSYNC));
    }
    attrs
}

/// Serialize a mode with its position taken relative to `origin`
pub fn mode_to_string(display: &Display, mode: &Mode, origin: (i32, i32)) -> String {
    let name = display
        .modeline_of(mode)
        .map_or(grammar::NULL_MODE, |ml| ml.identifier.as_str());
    let mut out = name.to_string();

    if mode.pan.size() != mode.viewport_in {
        out.push_str(&format!(" @{}x{}", mode.pan.width, mode.pan.height));
    }

    let x = mode.pan.x.saturating_sub(origin.0);
    let y = mode.pan.y.saturating_sub(origin.1);
    if !(mode.is_null() && x == 0 && y == 0) {
        out.push_str(&format!(" +{}{:+}", x, y));
    }

    let attrs = mode_attributes(display, mode);
    if !attrs.is_empty() {
        out.push_str(" {");
        out.push_str(&attrs.join(", "));
        out.push('}');
    }
    out
}

/// Offset subtracted from mode positions: none when auxiliary displays
/// share the desktop, else the metamode's bounding box origin
fn position_origin(layout: &Layout, screen: Option<ScreenId>, index: usize) -> (i32, i32) {
    if !layout.aux_displays.is_empty() {
        return (0, 0);
    }
    screen
        .and_then(|s| layout.metamode_bounding_box(s, index))
        .map_or((0, 0), |bbox: Rect| (bbox.x, bbox.y))
}

/// Serialize the mode of `display` at metamode `index`
pub fn serialize_mode(layout: &Layout, display: DisplayId, index: usize) -> Result<String> {
    let d = layout.display_or_err(display)?;
    let mode = d.modes.get(index).ok_or_else(|| {
        LayoutError::missing(format!("mode {} of display {}", index, d.names.target_id))
    })?;
    let origin = position_origin(layout, d.screen, index);
    Ok(mode_to_string(d, mode, origin))
}

/// Name used to qualify a display's mode inside a metamode, if any
pub fn display_qualifier(layout: &Layout, screen: ScreenId, display: DisplayId) -> Option<String> {
    let s = layout.screen(screen)?;
    let d = layout.display(display)?;
    let gpu = d.gpu.and_then(|g| layout.gpu(g));

    if s.displays.len() == 1 && gpu.is_some_and(|g| g.displays.len() == 1) {
        return None;
    }

    let spans_gpus = s.gpus.len() > 1 || gpu.is_some_and(|g| g.aggregation.spans_gpus());
    if spans_gpus && let Some(stable) = layout.stable_display_name(display) {
        return Some(stable);
    }
    Some(d.names.target_id.clone())
}

/// Serialize metamode `index` of `screen`. Dummy modes are left out; a
/// metamode with nothing left is `NULL`.
pub fn serialize_metamode(layout: &Layout, screen: ScreenId, index: usize) -> Result<String> {
    let s = layout.screen_or_err(screen)?;
    if index >= s.metamodes.len() {
        return Err(LayoutError::missing(format!(
            "metamode {} of screen {}",
            index, s.number
        )));
    }
    let origin = position_origin(layout, Some(screen), index);

    let mut segments = Vec::new();
    for id in &s.displays {
        let d = layout.display_or_err(*id)?;
        let Some(mode) = d.modes.get(index) else {
            continue;
        };
        if mode.dummy {
            continue;
        }
        let text = mode_to_string(d, mode, origin);
        match display_qualifier(layout, screen, *id) {
            Some(name) => segments.push(format!("{}: {}", name, text)),
            None => segments.push(text),
        }
    }

    if segments.is_empty() {
        return Ok(grammar::NULL_MODE.to_string());
    }
    Ok(segments.join(grammar::SEGMENT_JOIN))
}

/// Serialize a metamode with its `id=..., switchable=..., source=... ::`
/// header
pub fn serialize_metamode_with_header(layout: &Layout, screen: ScreenId, index: usize) -> Result<String> {
    let body = serialize_metamode(layout, screen, index)?;
    let s = layout.screen_or_err(screen)?;
    let mm = &s.metamodes[index];
    Ok(format!(
        "id={}, switchable={}, source={} {} {}",
        mm.id,
        if mm.switchable { "yes" } else { "no" },
        mm.source.as_str(),
        grammar::HEADER_SEPARATOR,
        body
    ))
}

/// All metamodes of a screen, in order
pub fn serialize_screen_metamodes(layout: &Layout, screen: ScreenId) -> Result<Vec<String>> {
    let count = layout.screen_or_err(screen)?.metamodes.len();
    (0..count)
        .map(|index| serialize_metamode(layout, screen, index))
        .collect()
}

/// Config-file modeline text
pub fn serialize_modeline(modeline: &ModeLine) -> String {
    let timings = modeline
        .timings
        .to_array()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let mut out = format!("\"{}\" {} {}", modeline.identifier, modeline.clock, timings);

    let keywords = [
        (ModeLineFlags::PHSYNC, "+hsync"),
        (ModeLineFlags::NHSYNC, "-hsync"),
        (ModeLineFlags::PVSYNC, "+vsync"),
        (ModeLineFlags::NVSYNC, "-vsync"),
        (ModeLineFlags::INTERLACE, "interlace"),
        (ModeLineFlags::DOUBLESCAN, "doublescan"),
        (ModeLineFlags::CSYNC, "composite"),
        (ModeLineFlags::PCSYNC, "+csync"),
        (ModeLineFlags::NCSYNC, "-csync"),
        (ModeLineFlags::BCAST, "bcast"),
        (ModeLineFlags::CUSTOM, "CUSTOM"),
    ];
    for (flag, keyword) in keywords {
        if modeline.flags.contains(flag) {
            out.push(' ');
            out.push_str(keyword);
        }
    }
    if modeline.flags.contains(ModeLineFlags::HSKEW) {
        out.push_str(&format!(" hskew {}", modeline.hskew));
    }
    if modeline.flags.contains(ModeLineFlags::VSCAN) {
        out.push_str(&format!(" vscan {}", modeline.vscan));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::layout::test_support::*;
    use crate::layout::{AuxDisplay, Gpu, Screen};
    use crate::parse::metamode::add_metamode;
    use crate::parse::mode::parse_mode;
    use crate::parse::modeline::{parse_modeline, RefreshContext};

    fn single_display() -> Display {
        display_with(1, "DFP-0", "DP-0", &[ML_1920X1200, ML_1024X768])
    }

    fn round_trip(input: &str) -> (Mode, String, Mode) {
        let display = single_display();
        let settings = Settings::default();
        let first = parse_mode(&display, input, &settings).unwrap();
        let text = mode_to_string(&display, &first, (0, 0));
        let second = parse_mode(&display, &text, &settings).unwrap();
        (first, text, second)
    }

    #[test]
    fn test_canonical_strings_are_fixed_points() {
        for canonical in [
            "1920x1200_60 +0+0",
            "1024x768 @2048x1536 +-1024+0",
            "1920x1200_60 +1920-10 {rotation=left}",
            "1920x1200_60 +0+0 {stereo=PassiveLeft, rotation=invert, reflection=xy, viewportin=1280x800}",
            "1920x1200_60 +0+0 {viewportout=1824x1140+48+30}",
            "1024x768 +0+0 {PixelShiftMode=8k, ForceCompositionPipeline=On, ForceFullCompositionPipeline=On, AllowGSYNC=Off}",
            "NULL",
            "NULL +100+0",
        ] {
            let (first, text, second) = round_trip(canonical);
            assert_eq!(text, canonical);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_non_canonical_input_round_trips_to_equal_mode() {
        for input in [
            "1920x1200_60 +0+0 {viewportin=1920x1200}",
            "1920x1200_60 @10x10 +5+5 {AllowGSYNC=On, rotation=90}",
            "1920x1200_60 +0+0 {rotation=CW, viewportin=1200x1920, viewportout=1920x1200+0+0}",
            "1024x768 +0+0 {viewportin=800x600, rotation=left}",
            "1920x1200_60 +0+0 {viewportin=1280x800, PixelShiftMode=8k}",
            "1920x1200_60 +0+0 {PixelShiftMode=4kTopLeft, viewportin=1280x800, rotation=right}",
        ] {
            let (first, _text, second) = round_trip(input);
            assert_eq!(first, second, "input: {}", input);
        }
    }

    #[test]
    fn test_default_omission() {
        let (_, text, _) = round_trip("1920x1200_60 +0+0 {viewportin=1920x1200}");
        assert_eq!(text, "1920x1200_60 +0+0");
        let (_, text, _) = round_trip("1920x1200_60 +0+0 {rotation=right, viewportin=1200x1920}");
        assert_eq!(text, "1920x1200_60 +0+0 {rotation=right}");
    }

    #[test]
    fn test_metamode_string_and_relative_positions() {
        let (mut layout, screen, _d1, _d2) = two_display_layout();
        add_metamode(
            &mut layout,
            screen,
            "DPY-1: 1920x1200_60 +100+50, DPY-2: 1600x1200 +2020+50",
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(
            serialize_metamode(&layout, screen, 0).unwrap(),
            "DPY-1: 1920x1200_60 +0+0, DPY-2: 1600x1200 +1920+0"
        );

        layout.aux_displays.push(AuxDisplay {
            name: None,
            screen: None,
            rect: Rect::new(0, 0, 800, 600),
        });
        assert_eq!(
            serialize_metamode(&layout, screen, 0).unwrap(),
            "DPY-1: 1920x1200_60 +100+50, DPY-2: 1600x1200 +2020+50"
        );
    }

    #[test]
    fn test_far_positions_do_not_overflow() {
        let (mut layout, screen, _d1, _d2) = two_display_layout();
        add_metamode(
            &mut layout,
            screen,
            "DPY-1: 1920x1200_60 +2147483000+0, DPY-2: 1600x1200 +0+0",
            &Settings::default(),
        )
        .unwrap();
        let bbox = layout.metamode_bounding_box(screen, 0).unwrap();
        assert_eq!((bbox.x, bbox.width), (0, i32::MAX));
        assert_eq!(
            serialize_metamode(&layout, screen, 0).unwrap(),
            "DPY-1: 1920x1200_60 +2147483000+0, DPY-2: 1600x1200 +0+0"
        );

        let (mut layout, screen, _d1, _d2) = two_display_layout();
        add_metamode(
            &mut layout,
            screen,
            "DPY-1: 1920x1200_60 +-2147483000+0, DPY-2: 1600x1200 +2147483000+0",
            &Settings::default(),
        )
        .unwrap();
        let text = serialize_metamode(&layout, screen, 0).unwrap();
        assert!(text.starts_with("DPY-1: 1920x1200_60 +0+0"), "{}", text);
    }

    #[test]
    fn test_metamode_skips_dummies_and_empty_is_null() {
        let (mut layout, screen, _d1, _d2) = two_display_layout();
        add_metamode(&mut layout, screen, "DPY-1: 1024x768 +0+0", &Settings::default()).unwrap();
        add_metamode(&mut layout, screen, "DPY-2: 1024x768 +0+0", &Settings::default()).unwrap();
        add_metamode(&mut layout, screen, "NULL", &Settings::default()).unwrap();

        let all = serialize_screen_metamodes(&layout, screen).unwrap();
        assert_eq!(
            all,
            vec!["DPY-1: 1024x768 +0+0", "DPY-2: 1024x768 +0+0", "NULL"]
        );
        assert!(serialize_metamode(&layout, screen, 3).is_err());
    }

    #[test]
    fn test_metamode_round_trip_through_parser() {
        let (mut layout, screen, d1, d2) = two_display_layout();
        let original = "DPY-1: 1920x1200_60 +0+0 {rotation=left}, DPY-2: 1600x1200 @3200x1200 +1200+0";
        add_metamode(&mut layout, screen, original, &Settings::default()).unwrap();
        let text = serialize_metamode(&layout, screen, 0).unwrap();
        assert_eq!(text, original);

        add_metamode(&mut layout, screen, &text, &Settings::default()).unwrap();
        for d in [d1, d2] {
            let modes = &layout.display(d).unwrap().modes;
            assert_eq!(modes[0], modes[1]);
        }
    }

    #[test]
    fn test_header_serialization() {
        let (mut layout, screen, _d1, _d2) = two_display_layout();
        add_metamode(
            &mut layout,
            screen,
            "id=50, switchable=no, source=xconfig :: DPY-1: 1024x768 +0+0",
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(
            serialize_metamode_with_header(&layout, screen, 0).unwrap(),
            "id=50, switchable=no, source=xconfig :: DPY-1: 1024x768 +0+0"
        );
    }

    #[test]
    fn test_qualifier_rules() {
        // a lone display on a single-display GPU needs no name
        let mut layout = Layout::new();
        let gpu = layout.add_gpu(Gpu::new(0, "GPU", "GPU-AAAA"));
        let screen = layout.add_screen(Screen::new(0));
        layout.link_screen_to_gpu(screen, gpu).unwrap();
        let d = layout
            .add_display(gpu, display_with(1, "DFP-0", "DP-0", &[ML_1024X768]))
            .unwrap();
        add_metamode(&mut layout, screen, "DPY-1: 1024x768 +0+0", &Settings::default()).unwrap();
        assert_eq!(display_qualifier(&layout, screen, d), None);
        assert_eq!(serialize_metamode(&layout, screen, 0).unwrap(), "1024x768 +0+0");

        // a second display on the GPU brings the portable name back
        layout
            .add_display(gpu, display_with(2, "DFP-1", "DP-1", &[ML_1024X768]))
            .unwrap();
        assert_eq!(display_qualifier(&layout, screen, d).as_deref(), Some("DPY-1"));

        // mosaic needs the GPU-qualified name
        if let Some(g) = layout.gpu_mut(gpu) {
            g.aggregation.kind = crate::layout::AggregationType::BaseMosaic;
            g.aggregation.enabled = true;
        }
        assert_eq!(
            display_qualifier(&layout, screen, d).as_deref(),
            Some("GPU-AAAA.DP-0")
        );
        let text = serialize_metamode(&layout, screen, 0).unwrap();
        assert_eq!(text, "GPU-AAAA.DP-0: 1024x768 +0+0");

        // and the parser resolves it again
        add_metamode(&mut layout, screen, &text, &Settings::default()).unwrap();
        assert!(!layout.display(d).unwrap().modes[1].dummy);
    }

    #[test]
    fn test_modeline_round_trip() {
        let line = "\"1024x768i\" 65.0 1024 1048 1184 1344 768 771 777 806 -hsync +vsync interlace CUSTOM hskew 4";
        let ml = parse_modeline(line, &RefreshContext::default()).unwrap();
        let text = serialize_modeline(&ml);
        assert_eq!(text, line);
        assert_eq!(parse_modeline(&text, &RefreshContext::default()).unwrap(), ml);
    }
}
