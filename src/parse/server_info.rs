//! Screen geometry strings reported by the server

use tracing::debug;

use super::parse_token_value_pairs;
use crate::config::Settings;
use crate::constants::grammar::AUX_RECORD_SEPARATOR;
use crate::errors::{LayoutError, Result};
use crate::geometry::Rect;
use crate::layout::AuxDisplay;

#[derive(Debug, Default)]
struct RectFields {
    x: Option<i32>,
    y: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
}

impl RectFields {
    /// Record `value` under `token`; false when the token is not a
    /// rectangle field
    fn apply(&mut self, token: &str, value: &str, x_key: &str, y_key: &str) -> bool {
        let slot = if token.eq_ignore_ascii_case(x_key) {
            &mut self.x
        } else if token.eq_ignore_ascii_case(y_key) {
            &mut self.y
        } else if token.eq_ignore_ascii_case("width") {
            &mut self.width
        } else if token.eq_ignore_ascii_case("height") {
            &mut self.height
        } else {
            return false;
        };
        match value.parse() {
            Ok(v) => *slot = Some(v),
            Err(_) => debug!(token, value, "Non-numeric rectangle field"),
        }
        true
    }

    fn into_rect(self) -> Option<Rect> {
        Some(Rect::new(self.x?, self.y?, self.width?, self.height?))
    }
}

/// Parse `x=#, y=#, width=#, height=#`
pub fn parse_screen_rect(input: &str) -> Result<Rect> {
    let mut fields = RectFields::default();
    parse_token_value_pairs(input, |token, value| {
        if !fields.apply(token, value, "x", "y") {
            debug!(token, value, "Unknown screen rectangle token");
        }
    })?;
    fields
        .into_rect()
        .ok_or_else(|| LayoutError::malformed(format!("incomplete screen rectangle '{}'", input)))
}

/// Parse the `;`-separated auxiliary display placement list. Records
/// missing width, height, xpos or ypos are reported and skipped.
pub fn parse_aux_displays(input: &str, settings: &Settings) -> (Vec<AuxDisplay>, Vec<LayoutError>) {
    let mut displays = Vec::new();
    let mut errors = Vec::new();

    for record in input
        .split(AUX_RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|r| !r.is_empty())
    {
        let mut fields = RectFields::default();
        let mut name = None;
        let mut screen = None;
        let parsed = parse_token_value_pairs(record, |token, value| {
            if fields.apply(token, value, "xpos", "ypos") {
                return;
            }
            if token.eq_ignore_ascii_case("name") {
                name = Some(value.to_string());
            } else if token.eq_ignore_ascii_case("screen") {
                screen = value.parse().ok();
            } else {
                debug!(token, value, "Unknown auxiliary display token");
            }
        });

        let result = parsed.and_then(|_| {
            fields.into_rect().ok_or_else(|| {
                LayoutError::malformed(format!("auxiliary display '{}' lacks a required key", record))
            })
        });
        match result {
            Ok(rect) => displays.push(AuxDisplay { name, screen, rect }),
            Err(err) => {
                settings.report(&err);
                errors.push(err);
            }
        }
    }
    (displays, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_rect() {
        let rect = parse_screen_rect("x=0, y=0, width=3520, height=1200").unwrap();
        assert_eq!(rect, Rect::new(0, 0, 3520, 1200));
        assert!(parse_screen_rect("x=0, y=0, width=3520").is_err());
        assert!(parse_screen_rect("x=0 y=0").is_err());
    }

    #[test]
    fn test_aux_displays() {
        let input = "width=1920, height=1080, xpos=3520, ypos=0, screen=0, name=HDMI-1-1; \
                     width=800, height=600, xpos=0, ypos=1200;\
                     width=10, xpos=0, ypos=0";
        let (displays, errors) = parse_aux_displays(input, &Settings::default());
        assert_eq!(displays.len(), 2);
        assert_eq!(displays[0].rect, Rect::new(3520, 0, 1920, 1080));
        assert_eq!(displays[0].name.as_deref(), Some("HDMI-1-1"));
        assert_eq!(displays[0].screen, Some(0));
        assert_eq!(displays[1].name, None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_empty_aux_list() {
        let (displays, errors) = parse_aux_displays("", &Settings::default());
        assert!(displays.is_empty());
        assert!(errors.is_empty());
    }
}
