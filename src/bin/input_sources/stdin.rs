use std::io;
use std::thread::JoinHandle;

use anyhow::Result;

use super::{pump_lines, HandleEvent, InputSource};

pub struct StdinInput;

impl InputSource for StdinInput {
  fn name(&self) -> String {
    "stdin".into()
  }

  fn start(&mut self, handle_event: HandleEvent) -> Result<JoinHandle<()>> {
    tracing::info!("Input: stdin (one event per line)");
    let handle = std::thread::Builder::new()
      .name("input-stdin".into())
      .spawn(move || {
        crate::boost_current_thread_priority();
        pump_lines(io::stdin().lock(), "stdin", handle_event);
      })?;
    Ok(handle)
  }
}
