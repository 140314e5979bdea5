pub mod accumulating;
pub mod aggregator;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiring;
pub mod input;
pub mod rate;
pub mod snapshot;
pub mod template;

pub use accumulating::AccumulatingWindow;
pub use aggregator::MetricsAggregator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AggregatorConfig, HistoryConfig, WindowConfig};
pub use error::{ConfigError, ParseError, WindowError};
pub use expiring::ExpiringWindow;
pub use input::{InputEvent, KeyCode, MouseButton};
pub use rate::instant_rate_per_minute;
pub use snapshot::MetricsSnapshot;
pub use template::Template;
