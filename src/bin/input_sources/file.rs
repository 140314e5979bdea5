use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread::JoinHandle;

use anyhow::{Context, Result};

use super::{pump_lines, HandleEvent, InputSource};

/// Replays a recorded event file as fast as it can be read.
pub struct FileInput {
  path: PathBuf,
}

impl FileInput {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }
}

impl InputSource for FileInput {
  fn name(&self) -> String {
    self.path.display().to_string()
  }

  fn start(&mut self, handle_event: HandleEvent) -> Result<JoinHandle<()>> {
    let file = File::open(&self.path)
      .with_context(|| format!("opening event file {}", self.path.display()))?;
    let name = self.name();
    tracing::info!(path = %name, "Input: replaying event file");
    let handle = std::thread::Builder::new()
      .name("input-replay".into())
      .spawn(move || pump_lines(BufReader::new(file), &name, handle_event))?;
    Ok(handle)
  }
}
