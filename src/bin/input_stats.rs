mod input_sources;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use input_stats::{AggregatorConfig, InputEvent, MetricsAggregator, Template};
use input_sources::{FileInput, InputSource, StdinInput};
use tracing_subscriber::EnvFilter;

/// Live keyboard/mouse statistics from a stream of input events.
#[derive(Debug, Parser)]
#[command(name = "input_stats")]
struct Args {
  /// JSON aggregator config; defaults are used for missing fields.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Replay events from a file instead of reading stdin.
  #[arg(long)]
  replay: Option<PathBuf>,

  /// Redraw interval in milliseconds.
  #[arg(long, default_value_t = 200)]
  interval_ms: u64,

  /// Text widget content, e.g. "APM: {apm} ({ta} total)".
  #[arg(long)]
  template: Option<String>,

  /// Redraw a live status block on stderr.
  #[arg(long)]
  progress: bool,

  /// Emit one JSON snapshot per redraw on stdout.
  #[arg(long)]
  json: bool,
}

pub(crate) fn boost_current_thread_priority() {
  use thread_priority::{set_current_thread_priority, ThreadPriority};
  if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
    tracing::debug!(error = ?e, "could not raise input thread priority");
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  if args.interval_ms == 0 {
    return Err(anyhow!("--interval-ms must be positive"));
  }

  let config = match &args.config {
    Some(path) => AggregatorConfig::from_path(path)
      .with_context(|| format!("loading config {}", path.display()))?,
    None => AggregatorConfig::default(),
  };
  let aggregator = Arc::new(MetricsAggregator::with_system_clock(config)?);
  let template = args.template.as_deref().map(Template::new);

  let mut source: Box<dyn InputSource> = match args.replay {
    Some(path) => Box::new(FileInput::new(path)),
    None => Box::new(StdinInput),
  };
  let sink = aggregator.clone();
  let reader = source.start(Box::new(move |event: InputEvent| -> Result<()> {
    sink.record(event);
    Ok(())
  }))?;
  tracing::info!(source = %source.name(), "collecting input statistics");

  let interval = Duration::from_millis(args.interval_ms);
  let mut rendered_lines = 0usize;
  if args.progress {
    eprint!("\x1b[?25l");
  }

  loop {
    std::thread::sleep(interval);
    let finished = reader.is_finished();
    let snapshot = aggregator.snapshot();

    if args.json {
      println!("{}", serde_json::to_string(&snapshot)?);
    }

    if args.progress {
      // Move back to the start of the previous block and redraw it
      if rendered_lines > 0 {
        eprint!("\x1b[{}A", rendered_lines);
      }
      let mut lines = vec![snapshot.format_status_line()];
      if let Some(template) = &template {
        lines.extend(aggregator.render(template).lines().map(str::to_owned));
      }
      for line in &lines {
        eprint!("\r\x1b[2K{}\n", line);
      }
      for _ in lines.len()..rendered_lines {
        eprint!("\r\x1b[2K\n");
      }
      io::stderr().flush()?;
      rendered_lines = lines.len().max(rendered_lines);
    }

    if finished {
      break;
    }
  }

  if args.progress {
    eprint!("\x1b[?25h");
  }
  reader
    .join()
    .map_err(|_| anyhow!("input thread panicked"))?;

  let snapshot = aggregator.snapshot();
  match &template {
    Some(template) => println!("{}", aggregator.render(template)),
    None => println!("{}", snapshot.format_status_line()),
  }
  tracing::info!(
    total_actions = snapshot.total_actions,
    total_clicks = snapshot.total_mouse_clicks,
    "input ended"
  );
  Ok(())
}
