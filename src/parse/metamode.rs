//! Metamode parsing
//!
//! A metamode record is either
//!
//! ```text
//! id=50, switchable=yes, source=xconfig :: DPY-1: 1920x1200 +0+0, DPY-2: 1600x1200 +1920+0
//! 50: DPY-1: 1920x1200 +0+0
//! ```
//!
//! Parsing a record appends one MetaMode to the screen and one Mode to every
//! display linked to it, so mode lists stay index-aligned with the screen's
//! metamode list after every insertion.

use tracing::{debug, info};

use super::mode::parse_mode;
use super::{parse_bool, parse_token_value_pairs, read_integer, split_header, split_top_level};
use crate::config::Settings;
use crate::constants::{grammar, metamode_tokens};
use crate::errors::{LayoutError, Result};
use crate::layout::{DisplayId, Layout, MetaMode, MetaModeSource, Mode, ScreenId};

/// Read the header of a record, returning the MetaMode and the body
fn parse_metamode_header<'a>(record: &'a str, settings: &Settings) -> (MetaMode, &'a str) {
    let mut metamode = MetaMode {
        string: record.to_string(),
        ..MetaMode::default()
    };

    match split_header(record) {
        (Some(header), body) => {
            let applied = parse_token_value_pairs(header, |token, value| {
                if token.eq_ignore_ascii_case(metamode_tokens::ID) {
                    match value.parse() {
                        Ok(id) => metamode.id = id,
                        Err(_) => debug!(value, "Bad metamode id"),
                    }
                } else if token.eq_ignore_ascii_case(metamode_tokens::SOURCE) {
                    match MetaModeSource::from_keyword(value) {
                        Some(source) => metamode.source = source,
                        None => debug!(value, "Unknown metamode source"),
                    }
                } else if token.eq_ignore_ascii_case(metamode_tokens::SWITCHABLE) {
                    match parse_bool(value) {
                        Some(switchable) => metamode.switchable = switchable,
                        None => debug!(value, "Bad switchable value"),
                    }
                } else {
                    debug!(token, value, "Unknown metamode token");
                }
            });
            if let Err(err) = applied {
                settings.report(&err);
            }
            (metamode, body)
        }
        (None, body) => {
            // legacy "ID: body"
            metamode.source = MetaModeSource::NvControl;
            let trimmed = body.trim_start();
            match read_integer(trimmed) {
                Some((id, rest)) if rest.starts_with(':') => {
                    metamode.id = id;
                    (metamode, &rest[1..])
                }
                _ => (metamode, body),
            }
        }
    }
}

/// Split `DPY-1: 1920x1200 +0+0` into the display name and the mode text.
/// Segments without a name return `None` for it.
fn split_display_name(segment: &str) -> (Option<&str>, &str) {
    let brace = segment.find('{').unwrap_or(segment.len());
    match segment[..brace].find(':') {
        Some(colon) => (Some(segment[..colon].trim()), &segment[colon + 1..]),
        None => (None, segment),
    }
}

/// Parse one metamode record and append it to `screen`. Returns the index
/// of the new metamode.
///
/// Segments naming an unknown display, or whose mode does not parse, are
/// reported and skipped. A record other than `NULL` that resolves no
/// segment at all is rejected and leaves the layout untouched.
pub fn add_metamode(
    layout: &mut Layout,
    screen: ScreenId,
    record: &str,
    settings: &Settings,
) -> Result<usize> {
    layout.screen_or_err(screen)?;
    let (metamode, body) = parse_metamode_header(record, settings);
    let body = body.trim();
    let candidates = layout.screen_candidate_displays(screen);

    let mut pending: Vec<(DisplayId, Mode)> = Vec::new();
    if body != grammar::NULL_MODE {
        for segment in split_top_level(body, ',') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }

            let (name, mode_text) = split_display_name(segment);
            let display = match name {
                Some(name) => layout.find_display_by_name_in(&candidates, name),
                None if candidates.len() == 1 => candidates.first().copied(),
                None => None,
            };
            let Some(display) = display else {
                settings.report(&LayoutError::missing(format!(
                    "no display matches '{}' in metamode '{}'",
                    name.unwrap_or(segment),
                    record
                )));
                continue;
            };

            if pending.iter().any(|(id, _)| *id == display) {
                settings.report(&LayoutError::malformed(format!(
                    "display '{}' appears twice in metamode '{}'",
                    name.unwrap_or_default(),
                    record
                )));
                continue;
            }

            let Some(d) = layout.display(display) else {
                continue;
            };
            match parse_mode(d, mode_text, settings) {
                Ok(mode) => pending.push((display, mode)),
                Err(err) => settings.report(&err),
            }
        }

        if pending.is_empty() {
            return Err(LayoutError::invariant(format!(
                "metamode '{}' does not resolve any display",
                record
            )));
        }
    }

    commit_metamode(layout, screen, metamode, pending)
}

/// Append the parsed metamode and its modes, then pad every display that
/// did not take part
fn commit_metamode(
    layout: &mut Layout,
    screen: ScreenId,
    metamode: MetaMode,
    pending: Vec<(DisplayId, Mode)>,
) -> Result<usize> {
    let index = {
        let s = layout
            .screen_mut(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        s.metamodes.push(metamode);
        s.metamodes.len() - 1
    };

    for (display, mode) in pending {
        layout.link_display_to_screen(display, screen)?;
        if let Some(d) = layout.display_mut(display) {
            // a display first seen now gets placeholders for earlier metamodes
            while d.modes.len() < index {
                d.modes.push(Mode::dummy_like(&mode));
            }
            d.modes.push(mode);
        }
    }

    layout.repair_metamode_alignment(screen)?;
    Ok(index)
}

/// Parse a NUL-separated metamode list into `screen`, then select the
/// metamode whose string equals `current` (the first one if none does).
pub fn add_metamodes(
    layout: &mut Layout,
    screen: ScreenId,
    list: &str,
    current: Option<&str>,
    settings: &Settings,
) -> Vec<LayoutError> {
    let mut errors = Vec::new();
    for record in list.split('\0').map(str::trim).filter(|r| !r.is_empty()) {
        if let Err(err) = add_metamode(layout, screen, record, settings) {
            settings.report(&err);
            errors.push(err);
        }
    }

    let Some(s) = layout.screen(screen) else {
        return errors;
    };
    if s.metamodes.is_empty() {
        return errors;
    }

    // TODO: compare metamodes structurally once the server's formatting of
    // the current metamode is pinned down; exact text is brittle
    let current_index = current
        .map(str::trim)
        .and_then(|cur| s.metamodes.iter().position(|m| m.string == cur))
        .unwrap_or_else(|| {
            debug!(screen = s.number, "Current metamode not found, using the first");
            0
        });

    info!(
        screen = s.number,
        metamodes = s.metamodes.len(),
        current = current_index,
        "Loaded metamodes"
    );
    if let Err(err) = layout.set_current_metamode(screen, current_index) {
        errors.push(err);
    }
    errors
}
