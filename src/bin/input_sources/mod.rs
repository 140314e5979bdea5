use std::io::BufRead;
use std::thread::JoinHandle;

use anyhow::Result;
use input_stats::input::parse_line;
use input_stats::InputEvent;
use tracing::warn;

pub type HandleEvent = Box<dyn FnMut(InputEvent) -> Result<()> + Send + 'static>;

/// Producer of raw input events. A real global keyboard/mouse hook would
/// implement this too; the sources here read the text event format.
pub trait InputSource {
  fn name(&self) -> String;
  fn start(&mut self, handle_event: HandleEvent) -> Result<JoinHandle<()>>;
}

pub mod file;
pub mod stdin;

pub use file::FileInput;
pub use stdin::StdinInput;

/// Feeds every parseable line to `handle_event` until EOF, a read error, or
/// the handler refuses an event. Malformed lines are logged and skipped.
pub(crate) fn pump_lines<R: BufRead>(reader: R, source: &str, mut handle_event: HandleEvent) {
  for (lineno, line) in reader.lines().enumerate() {
    let line = match line {
      Ok(line) => line,
      Err(e) => {
        warn!(source, error = %e, "stopped reading input");
        break;
      }
    };
    match parse_line(&line) {
      Ok(Some(event)) => {
        if let Err(e) = handle_event(event) {
          warn!(source, error = %e, "event handler failed");
          break;
        }
      }
      Ok(None) => {}
      Err(e) => warn!(source, line = lineno + 1, error = %e, "skipping malformed event"),
    }
  }
}
