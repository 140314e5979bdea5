//! Text widget content with live placeholders.
//!
//! | placeholder | value |
//! |-------------|-------|
//! | `{apm}`     | instant actions per minute |
//! | `{cpm}`     | instant clicks per minute |
//! | `{mpm}`     | instant movement keys per minute |
//! | `{ppm}`     | pixels the pointer moved per minute |
//! | `{ta}`      | total actions |
//! | `{tc}`      | total mouse clicks |
//! | `{tp}`      | total pixels moved |
//! | `{tk:<c>}`  | total presses of the key labelled `<c>` |
//!
//! Anything else in braces is copied through unchanged.

use std::sync::OnceLock;

use regex::Regex;

use crate::snapshot::MetricsSnapshot;

const PLACEHOLDER_PATTERN: &str = r"\{(apm|cpm|mpm|ppm|ta|tc|tp|tk:(.))\}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is a valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Apm,
    ClicksPerMinute,
    MovementPerMinute,
    PixelsPerMinute,
    TotalActions,
    TotalClicks,
    TotalPixels,
    KeyPresses(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Value(Placeholder),
}

/// A content string split into literal text and placeholders once, then
/// rendered every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(&source) {
            let Some(whole) = caps.get(0) else { continue };
            let placeholder = match caps.get(2).and_then(|m| m.as_str().chars().next()) {
                Some(c) => Placeholder::KeyPresses(c),
                None => match &caps[1] {
                    "apm" => Placeholder::Apm,
                    "cpm" => Placeholder::ClicksPerMinute,
                    "mpm" => Placeholder::MovementPerMinute,
                    "ppm" => Placeholder::PixelsPerMinute,
                    "ta" => Placeholder::TotalActions,
                    "tp" => Placeholder::TotalPixels,
                    _ => Placeholder::TotalClicks,
                },
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Value(placeholder));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Self { source, segments }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Value(_)))
    }

    /// `key_presses` resolves `{tk:<c>}`; `None` renders as 0.
    pub fn render<F>(&self, snapshot: &MetricsSnapshot, key_presses: F) -> String
    where
        F: Fn(char) -> Option<u64>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Value(p) => {
                    let value = match *p {
                        Placeholder::Apm => u64::from(snapshot.instant_apm),
                        Placeholder::ClicksPerMinute => {
                            u64::from(snapshot.instant_clicks_per_minute)
                        }
                        Placeholder::MovementPerMinute => {
                            u64::from(snapshot.instant_movement_per_minute)
                        }
                        Placeholder::PixelsPerMinute => snapshot.instant_pixels_per_minute,
                        Placeholder::TotalActions => snapshot.total_actions,
                        Placeholder::TotalClicks => snapshot.total_mouse_clicks,
                        Placeholder::TotalPixels => snapshot.total_pixels,
                        Placeholder::KeyPresses(c) => key_presses(c).unwrap_or(0),
                    };
                    out.push_str(&value.to_string());
                }
            }
        }
        out
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::new("APM: {apm}\nPPM: {ppm}")
    }
}
