//! Modeline parsing
//!
//! A modeline record looks like
//!
//! ```text
//! source=edid, xconfig-name=DFP-0 :: "1024x768" 65.0 1024 1048 1184 1344 768 771 777 806 +hsync +vsync
//! ```
//!
//! The header is optional. Flag keywords are case-insensitive.

use tracing::debug;

use super::{parse_token_value_pairs, split_header};
use crate::config::Settings;
use crate::constants::{modeline_tokens, refresh};
use crate::errors::{LayoutError, Result};
use crate::layout::{ModeLine, ModeLineFlags, ModeLineSource, SerialVideoFormat, Timings};

/// Inputs to the refresh-rate computation that do not come from the line
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshContext<'a> {
    /// Format table of a serial digital video display
    pub serial_video: Option<&'a [SerialVideoFormat]>,
    /// The source already accounts for doublescan in vtotal
    pub doublescan_in_vtotal: bool,
}

pub fn parse_modeline(line: &str, ctx: &RefreshContext<'_>) -> Result<ModeLine> {
    // the header ends before the quoted name; a `::` inside the name is not a separator
    let quote = line.find('"').unwrap_or(line.len());
    let (header, body) = match split_header(&line[..quote]) {
        (Some(header), rest) => (Some(header), &line[quote - rest.len()..]),
        (None, _) => (None, line),
    };

    let mut source = ModeLineSource::empty();
    let mut xconfig_name = None;
    if let Some(header) = header {
        let applied = parse_token_value_pairs(header, |token, value| {
            if token.eq_ignore_ascii_case(modeline_tokens::SOURCE) {
                match ModeLineSource::from_keyword(value) {
                    Some(s) => source |= s,
                    None => debug!(value, "Unknown modeline source"),
                }
            } else if token.eq_ignore_ascii_case(modeline_tokens::XCONFIG_NAME) {
                xconfig_name = Some(value.to_string());
            } else {
                debug!(token, value, "Unknown modeline token");
            }
        });
        if let Err(err) = applied {
            debug!(error = %err, "Modeline header partially applied");
        }
    }

    let body = body.trim();
    let quoted = body
        .strip_prefix('"')
        .ok_or_else(|| LayoutError::malformed(format!("modeline '{}' has no quoted name", body)))?;
    let close = quoted
        .find('"')
        .ok_or_else(|| LayoutError::malformed(format!("unterminated modeline name in '{}'", body)))?;
    let identifier = quoted[..close].to_string();
    if identifier.is_empty() {
        return Err(LayoutError::malformed("modeline has an empty name"));
    }

    let mut words = quoted[close + 1..].split_whitespace().peekable();

    let clock = words
        .next()
        .ok_or_else(|| LayoutError::malformed(format!("modeline '{}' has no clock", identifier)))?;
    let mut values = [0i32; 8];
    for value in values.iter_mut() {
        let word = words.next().ok_or_else(|| {
            LayoutError::malformed(format!("modeline '{}' has too few timings", identifier))
        })?;
        *value = word.parse().map_err(|_| {
            LayoutError::malformed(format!("modeline '{}' has bad timing '{}'", identifier, word))
        })?;
    }
    let timings = Timings::from_array(values);

    let mut flags = ModeLineFlags::empty();
    let mut hskew = 0;
    let mut vscan = 0;
    while let Some(word) = words.next() {
        let lower = word.to_ascii_lowercase();
        let flag = match lower.as_str() {
            "+hsync" => ModeLineFlags::PHSYNC,
            "-hsync" => ModeLineFlags::NHSYNC,
            "+vsync" => ModeLineFlags::PVSYNC,
            "-vsync" => ModeLineFlags::NVSYNC,
            "interlace" => ModeLineFlags::INTERLACE,
            "doublescan" => ModeLineFlags::DOUBLESCAN,
            "composite" => ModeLineFlags::CSYNC,
            "+csync" => ModeLineFlags::PCSYNC,
            "-csync" => ModeLineFlags::NCSYNC,
            "bcast" => ModeLineFlags::BCAST,
            "custom" => ModeLineFlags::CUSTOM,
            other => {
                if let Some(attached) = other.strip_prefix("hskew") {
                    hskew = keyword_value(&identifier, "hskew", attached, &mut words)?;
                    ModeLineFlags::HSKEW
                } else if let Some(attached) = other.strip_prefix("vscan") {
                    vscan = keyword_value(&identifier, "vscan", attached, &mut words)?;
                    ModeLineFlags::VSCAN
                } else {
                    return Err(LayoutError::malformed(format!(
                        "modeline '{}' has unknown flag '{}'",
                        identifier, word
                    )));
                }
            }
        };
        flags |= flag;
    }

    let mut modeline = ModeLine {
        identifier,
        clock: clock.to_string(),
        timings,
        hskew,
        vscan,
        flags,
        source,
        xconfig_name,
        refresh_rate: 0.0,
    };

    let clock_mhz = modeline.clock_mhz().ok_or_else(|| {
        LayoutError::malformed(format!(
            "modeline '{}' has non-numeric clock '{}'",
            modeline.identifier, modeline.clock
        ))
    })?;
    if timings.htotal == 0 || timings.vtotal == 0 {
        return Err(LayoutError::malformed(format!(
            "modeline '{}' has a zero htotal or vtotal",
            modeline.identifier
        )));
    }

    let serial_rate = ctx
        .serial_video
        .and_then(|table| table.iter().find(|f| f.name == modeline.identifier))
        .map(|f| f.rate);
    modeline.refresh_rate = serial_rate
        .unwrap_or_else(|| compute_refresh_rate(clock_mhz, &timings, flags, ctx.doublescan_in_vtotal));
    Ok(modeline)
}

/// Integer argument of `hskew`/`vscan`, attached (`hskew5`) or as the next
/// word (`hskew 5`)
fn keyword_value<'a, I>(
    identifier: &str,
    keyword: &str,
    attached: &str,
    words: &mut std::iter::Peekable<I>,
) -> Result<i32>
where
    I: Iterator<Item = &'a str>,
{
    let text = if attached.is_empty() {
        words.next().ok_or_else(|| {
            LayoutError::malformed(format!("modeline '{}' is missing the {} value", identifier, keyword))
        })?
    } else {
        attached
    };
    text.parse().map_err(|_| {
        LayoutError::malformed(format!(
            "modeline '{}' has bad {} value '{}'",
            identifier, keyword, text
        ))
    })
}

/// Vertical refresh in Hz. Interlaced modes report the field rate.
pub fn compute_refresh_rate(
    clock_mhz: f64,
    timings: &Timings,
    flags: ModeLineFlags,
    doublescan_in_vtotal: bool,
) -> f64 {
    let pixels = timings.htotal as f64 * timings.vtotal as f64;
    let mut rate = clock_mhz * refresh::CLOCK_SCALE / pixels;
    if flags.contains(ModeLineFlags::DOUBLESCAN) && !doublescan_in_vtotal {
        rate *= refresh::DOUBLESCAN_FACTOR;
    }
    if flags.contains(ModeLineFlags::INTERLACE) {
        rate *= refresh::INTERLACE_FACTOR;
    }
    rate
}

/// Parse a NUL-separated modeline list. Rejected lines are reported and
/// skipped; duplicate names keep the first entry.
pub fn parse_modelines(
    list: &str,
    ctx: &RefreshContext<'_>,
    settings: &Settings,
) -> (Vec<ModeLine>, Vec<LayoutError>) {
    let mut modelines: Vec<ModeLine> = Vec::new();
    let mut errors = Vec::new();

    for line in list.split('\0').map(str::trim).filter(|l| !l.is_empty()) {
        match parse_modeline(line, ctx) {
            Ok(modeline) => {
                if modelines.iter().any(|m| m.identifier == modeline.identifier) {
                    debug!(name = %modeline.identifier, "Duplicate modeline, keeping the first");
                    continue;
                }
                modelines.push(modeline);
            }
            Err(err) => {
                settings.report(&err);
                errors.push(err);
            }
        }
    }
    (modelines, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VGA: &str = "\"1024x768\" 65.0 1024 1048 1184 1344 768 771 777 806 +hsync +vsync";

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_parse_basic_modeline() {
        let ml = parse_modeline(VGA, &RefreshContext::default()).unwrap();
        assert_eq!(ml.identifier, "1024x768");
        assert_eq!(ml.timings.hdisplay, 1024);
        assert_eq!(ml.timings.htotal, 1344);
        assert_eq!(ml.timings.vtotal, 806);
        assert_eq!(ml.flags, ModeLineFlags::PHSYNC | ModeLineFlags::PVSYNC);
        assert!(close(ml.refresh_rate, 65_000_000.0 / (1344.0 * 806.0)));
        assert!((ml.refresh_rate - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_header_tokens() {
        let line = format!("source=edid, source=xserver, xconfig-name=DFP-0 :: {}", VGA);
        let ml = parse_modeline(&line, &RefreshContext::default()).unwrap();
        assert_eq!(ml.source, ModeLineSource::EDID | ModeLineSource::XSERVER);
        assert_eq!(ml.xconfig_name.as_deref(), Some("DFP-0"));
    }

    #[test]
    fn test_separator_inside_name_is_not_a_header() {
        let line = "\"a::b\" 65.0 1024 1048 1184 1344 768 771 777 806";
        let ml = parse_modeline(line, &RefreshContext::default()).unwrap();
        assert_eq!(ml.identifier, "a::b");
        assert_eq!(ml.source, ModeLineSource::empty());

        let line = format!("source=edid :: {}", line);
        let ml = parse_modeline(&line, &RefreshContext::default()).unwrap();
        assert_eq!(ml.identifier, "a::b");
        assert_eq!(ml.source, ModeLineSource::EDID);
    }

    #[test]
    fn test_clock_is_read_through_clock_mhz() {
        let ml = parse_modeline(VGA, &RefreshContext::default()).unwrap();
        assert_eq!(ml.clock, "65.0");
        assert_eq!(ml.clock_mhz(), Some(65.0));

        let inf = "\"a\" inf 1024 1048 1184 1344 768 771 777 806";
        let err = parse_modeline(inf, &RefreshContext::default()).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInput(_)));
    }

    #[test]
    fn test_flags_are_case_insensitive_with_values() {
        let line = "\"m\" 25.0 640 656 752 800 480 490 492 525 -HSync -VSYNC HSkew 3 vscan2 Custom BCAST";
        let ml = parse_modeline(line, &RefreshContext::default()).unwrap();
        assert!(ml.flags.contains(ModeLineFlags::NHSYNC | ModeLineFlags::NVSYNC));
        assert!(ml.flags.contains(ModeLineFlags::HSKEW | ModeLineFlags::VSCAN));
        assert!(ml.flags.contains(ModeLineFlags::CUSTOM | ModeLineFlags::BCAST));
        assert_eq!(ml.hskew, 3);
        assert_eq!(ml.vscan, 2);
    }

    #[test]
    fn test_unknown_flag_rejects_line() {
        let line = format!("{} +wobble", VGA);
        let err = parse_modeline(&line, &RefreshContext::default()).unwrap_err();
        assert!(matches!(err, LayoutError::MalformedInput(_)));
    }

    #[test]
    fn test_bad_clock_and_zero_totals() {
        let bad_clock = "\"a\" fast 1024 1048 1184 1344 768 771 777 806";
        assert!(parse_modeline(bad_clock, &RefreshContext::default()).is_err());
        let zero = "\"a\" 65.0 1024 1048 1184 0 768 771 777 806";
        assert!(parse_modeline(zero, &RefreshContext::default()).is_err());
        let short = "\"a\" 65.0 1024 1048 1184";
        assert!(parse_modeline(short, &RefreshContext::default()).is_err());
        assert!(parse_modeline("1024x768 65.0", &RefreshContext::default()).is_err());
    }

    #[test]
    fn test_refresh_factors_compose() {
        let timings = Timings::from_array([1024, 1048, 1184, 1344, 768, 771, 777, 806]);
        let base = compute_refresh_rate(65.0, &timings, ModeLineFlags::empty(), false);
        let dbl = compute_refresh_rate(65.0, &timings, ModeLineFlags::DOUBLESCAN, false);
        let ilace = compute_refresh_rate(65.0, &timings, ModeLineFlags::INTERLACE, false);
        let both = compute_refresh_rate(
            65.0,
            &timings,
            ModeLineFlags::DOUBLESCAN | ModeLineFlags::INTERLACE,
            false,
        );
        assert!(close(dbl, base * 0.5));
        assert!(close(ilace, base * 2.0));
        assert!(close(both, base));

        let folded = compute_refresh_rate(65.0, &timings, ModeLineFlags::DOUBLESCAN, true);
        assert!(close(folded, base));
    }

    #[test]
    fn test_serial_video_table_overrides_rate() {
        let table = vec![SerialVideoFormat::new("1024x768", 59.94)];
        let ctx = RefreshContext {
            serial_video: Some(&table),
            doublescan_in_vtotal: false,
        };
        let ml = parse_modeline(VGA, &ctx).unwrap();
        assert!(close(ml.refresh_rate, 59.94));

        let other = parse_modeline(
            "\"800x600\" 40.0 800 840 968 1056 600 601 605 628",
            &ctx,
        )
        .unwrap();
        assert!(close(other.refresh_rate, 40_000_000.0 / (1056.0 * 628.0)));
    }

    #[test]
    fn test_parse_modelines_skips_bad_lines() {
        let list = format!(
            "{}\0\"bad\" x 1 2 3 4 5 6 7 8\0{}\0\"800x600\" 40.0 800 840 968 1056 600 601 605 628\0",
            VGA, VGA
        );
        let (modelines, errors) = parse_modelines(&list, &RefreshContext::default(), &Settings::default());
        assert_eq!(modelines.len(), 2);
        assert_eq!(modelines[1].identifier, "800x600");
        assert_eq!(errors.len(), 1);
    }
}
