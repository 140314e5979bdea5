// Raw input events as delivered by a global input hook, plus a line format
// for recording and replaying them.
//
//   press <code>     key went down
//   release <code>   key went up
//   click <button>   mouse button went down
//   move <dx> <dy>   pointer moved by a signed pixel offset
//
// Kinds are case-insensitive; blank lines and `#` comments are skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Virtual key code as reported by the input hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u32);

/// Mouse button number as reported by the input hook (1 = left, 2 = right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MouseButton(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPress(KeyCode),
    KeyRelease(KeyCode),
    MousePress(MouseButton),
    MouseMove { dx: i32, dy: i32 },
}

const KIND_PRESS: &str = "press";
const KIND_RELEASE: &str = "release";
const KIND_CLICK: &str = "click";
const KIND_MOVE: &str = "move";

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::KeyPress(KeyCode(c)) => write!(f, "{KIND_PRESS} {c}"),
            InputEvent::KeyRelease(KeyCode(c)) => write!(f, "{KIND_RELEASE} {c}"),
            InputEvent::MousePress(MouseButton(b)) => write!(f, "{KIND_CLICK} {b}"),
            InputEvent::MouseMove { dx, dy } => write!(f, "{KIND_MOVE} {dx} {dy}"),
        }
    }
}

/// Parses one event line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<InputEvent>, ParseError> {
    let line = match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    };
    let mut parts = line.split_whitespace();
    let Some(kind) = parts.next() else {
        return Ok(None);
    };

    let event = match kind.to_ascii_lowercase().as_str() {
        KIND_PRESS => InputEvent::KeyPress(KeyCode(next_number(&mut parts, kind)?)),
        KIND_RELEASE => InputEvent::KeyRelease(KeyCode(next_number(&mut parts, kind)?)),
        KIND_CLICK => InputEvent::MousePress(MouseButton(next_number(&mut parts, kind)?)),
        KIND_MOVE => InputEvent::MouseMove {
            dx: next_number(&mut parts, kind)?,
            dy: next_number(&mut parts, kind)?,
        },
        _ => return Err(ParseError::UnknownKind(kind.to_string())),
    };
    if let Some(extra) = parts.next() {
        return Err(ParseError::Trailing(extra.to_string()));
    }
    Ok(Some(event))
}

fn next_number<'a, N, I>(parts: &mut I, kind: &str) -> Result<N, ParseError>
where
    N: std::str::FromStr,
    I: Iterator<Item = &'a str>,
{
    let raw = parts.next().ok_or_else(|| ParseError::MissingCode(kind.to_string()))?;
    raw.parse().map_err(|_| ParseError::BadCode(raw.to_string()))
}

impl std::str::FromStr for InputEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s)?.ok_or(ParseError::Empty)
    }
}
