use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use crate::accumulating::AccumulatingWindow;
use crate::clock::{Clock, SystemClock};
use crate::config::{AggregatorConfig, WindowConfig};
use crate::error::WindowError;
use crate::expiring::ExpiringWindow;
use crate::input::{InputEvent, KeyCode, MouseButton};
use crate::rate::{amount_per_minute, instant_rate_per_minute, mean_delta_to_per_minute};
use crate::snapshot::MetricsSnapshot;
use crate::template::Template;

// Everything the input thread writes and the render thread reads.
struct State {
    actions: ExpiringWindow<Instant>,
    clicks: ExpiringWindow<Instant>,
    movement: ExpiringWindow<Instant>,
    // Pixel distance of each recent pointer move.
    pixels: ExpiringWindow<u64>,
    // Sums of millisecond gaps between consecutive actions, per bucket.
    history: AccumulatingWindow<u64>,
    pressed: HashMap<KeyCode, bool>,
    key_presses: BTreeMap<KeyCode, u64>,
    last_action: Option<Instant>,
    total_actions: u64,
    total_clicks: u64,
    total_pixels: u64,
}

impl State {
    fn record_action(&mut self, now: Instant) {
        self.actions.insert(now);
        match self.last_action {
            Some(last) => {
                let gap_ms = now.saturating_duration_since(last).as_millis();
                self.history.add(u64::try_from(gap_ms).unwrap_or(u64::MAX));
            }
            None => debug!("first action of the session"),
        }
        self.last_action = Some(now);
        self.total_actions += 1;
    }

    fn pixels_per_minute(&mut self) -> u64 {
        let window = self.pixels.ttl();
        amount_per_minute(self.pixels.iter().copied(), window)
    }

    fn snapshot(&mut self) -> MetricsSnapshot {
        MetricsSnapshot {
            instant_apm: instant_rate_per_minute(self.actions.iter()),
            instant_clicks_per_minute: instant_rate_per_minute(self.clicks.iter()),
            instant_movement_per_minute: instant_rate_per_minute(self.movement.iter()),
            instant_pixels_per_minute: self.pixels_per_minute(),
            total_actions: self.total_actions,
            total_mouse_clicks: self.total_clicks,
            total_pixels: self.total_pixels,
            historical_apm: self.history.iter().collect(),
            key_presses: self.key_presses.clone(),
        }
    }
}

fn window<T>(
    config: &WindowConfig,
    clock: &Arc<dyn Clock>,
) -> Result<ExpiringWindow<T>, WindowError> {
    ExpiringWindow::new(config.capacity, config.ttl(), clock.clone())
}

/// Turns raw key and mouse events into live rates and running totals.
///
/// One writer (the input hook thread) and any number of readers (the render
/// tick) share an aggregator through `&self`; all state sits behind a single
/// lock, held for one insert or one read at a time.
///
/// A key counts once per physical press: repeats delivered while it is held
/// down are ignored until it is released. Only configured action keys are
/// tracked at all.
pub struct MetricsAggregator {
    config: AggregatorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl MetricsAggregator {
    pub fn new(config: AggregatorConfig, clock: Arc<dyn Clock>) -> Result<Self, WindowError> {
        config.validate()?;

        let history = AccumulatingWindow::new(
            config.history.buckets,
            config.history.bucket_duration(),
            clock.clone(),
            0u64,
            |sum: u64, gap: u64| sum.saturating_add(gap),
        )?
        .with_report(mean_delta_to_per_minute);

        let state = State {
            actions: window(&config.actions, &clock)?,
            clicks: window(&config.clicks, &clock)?,
            movement: window(&config.movement, &clock)?,
            pixels: window(&config.pixels, &clock)?,
            history,
            pressed: HashMap::new(),
            key_presses: BTreeMap::new(),
            last_action: None,
            total_actions: 0,
            total_clicks: 0,
            total_pixels: 0,
        };
        debug!(
            action_keys = config.action_keys.len(),
            history_buckets = config.history.buckets,
            "metrics aggregator ready"
        );

        Ok(Self { config, clock, state: Mutex::new(state) })
    }

    pub fn with_system_clock(config: AggregatorConfig) -> Result<Self, WindowError> {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn record(&self, event: InputEvent) {
        match event {
            InputEvent::KeyPress(code) => self.on_key_press(code),
            InputEvent::KeyRelease(code) => self.on_key_release(code),
            InputEvent::MousePress(button) => self.on_mouse_press(button),
            InputEvent::MouseMove { dx, dy } => self.on_mouse_move(dx, dy),
        }
    }

    pub fn on_key_press(&self, code: KeyCode) {
        if !self.config.tracks_key(code) {
            return;
        }
        let mut state = self.state.lock();
        let was_pressed = state.pressed.insert(code, true).unwrap_or(false);
        if was_pressed {
            return;
        }

        let now = self.clock.now();
        state.record_action(now);
        *state.key_presses.entry(code).or_insert(0) += 1;
        if self.config.movement_keys.contains(&code) {
            state.movement.insert(now);
        }
    }

    pub fn on_key_release(&self, code: KeyCode) {
        if !self.config.tracks_key(code) {
            return;
        }
        self.state.lock().pressed.insert(code, false);
    }

    pub fn on_mouse_press(&self, button: MouseButton) {
        let is_action = self.config.action_buttons.contains(&button);
        let is_click = self.config.click_buttons.contains(&button);
        if !is_action && !is_click {
            return;
        }

        let mut state = self.state.lock();
        let now = self.clock.now();
        if is_action {
            state.record_action(now);
        }
        if is_click {
            state.clicks.insert(now);
            state.total_clicks += 1;
        }
    }

    /// Pointer moved by a relative offset. The straight-line distance,
    /// truncated to whole pixels, is what counts.
    pub fn on_mouse_move(&self, dx: i32, dy: i32) {
        let pixels = f64::from(dx).hypot(f64::from(dy)) as u64;
        if pixels == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.pixels.insert(pixels);
        state.total_pixels = state.total_pixels.saturating_add(pixels);
    }

    /// Actions per minute from the gaps between the most recent actions.
    pub fn instant_apm(&self) -> u32 {
        instant_rate_per_minute(self.state.lock().actions.iter())
    }

    pub fn instant_clicks_per_minute(&self) -> u32 {
        instant_rate_per_minute(self.state.lock().clicks.iter())
    }

    pub fn instant_movement_per_minute(&self) -> u32 {
        instant_rate_per_minute(self.state.lock().movement.iter())
    }

    /// Pixels moved over the last pixel window, scaled to a minute.
    pub fn instant_pixels_per_minute(&self) -> u64 {
        self.state.lock().pixels_per_minute()
    }

    /// Average APM per history bucket, oldest first. Always one value per
    /// bucket; buckets without actions read 0.
    pub fn historical_apm(&self) -> Vec<u64> {
        self.state.lock().history.iter().collect()
    }

    pub fn total_actions(&self) -> u64 {
        self.state.lock().total_actions
    }

    pub fn total_mouse_clicks(&self) -> u64 {
        self.state.lock().total_clicks
    }

    pub fn total_pixels(&self) -> u64 {
        self.state.lock().total_pixels
    }

    pub fn total_key_presses(&self, code: KeyCode) -> u64 {
        self.state.lock().key_presses.get(&code).copied().unwrap_or(0)
    }

    /// Presses of the key labelled `c` in the config, 0 for unknown labels.
    pub fn total_key_presses_for_char(&self, c: char) -> u64 {
        self.config
            .key_for_char(c)
            .map(|code| self.total_key_presses(code))
            .unwrap_or(0)
    }

    /// All read-side figures from a single lock acquisition.
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.state.lock().snapshot()
    }

    pub fn render(&self, template: &Template) -> String {
        let snapshot = self.snapshot();
        template.render(&snapshot, |c| {
            self.config
                .key_for_char(c)
                .map(|code| snapshot.key_presses_for(code))
        })
    }

    /// Forgets the session: recent windows, totals, held keys and the action
    /// gap chain. History buckets are left to age out.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.actions.clear();
        state.clicks.clear();
        state.movement.clear();
        state.pixels.clear();
        state.pressed.clear();
        state.key_presses.clear();
        state.last_action = None;
        state.total_actions = 0;
        state.total_clicks = 0;
        state.total_pixels = 0;
        debug!("metrics aggregator reset");
    }
}

impl std::fmt::Debug for MetricsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsAggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::HistoryConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;

    const W: KeyCode = KeyCode(17);
    const Q: KeyCode = KeyCode(16);
    const UNTRACKED: KeyCode = KeyCode(99);
    const LEFT: MouseButton = MouseButton(1);
    const MOUSE5: MouseButton = MouseButton(5);

    fn aggregator(config: AggregatorConfig) -> (Arc<ManualClock>, MetricsAggregator) {
        let clock = Arc::new(ManualClock::new());
        let agg = MetricsAggregator::new(config, clock.clone()).unwrap();
        (clock, agg)
    }

    fn tap(agg: &MetricsAggregator, code: KeyCode) {
        agg.on_key_press(code);
        agg.on_key_release(code);
    }

    fn small_history() -> AggregatorConfig {
        AggregatorConfig {
            history: HistoryConfig { buckets: 3, bucket_ms: 1_000 },
            ..AggregatorConfig::default()
        }
    }

    #[test]
    fn held_key_counts_once() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        agg.on_key_press(W);
        agg.on_key_press(W);
        agg.on_key_press(W);
        assert_eq!(agg.total_actions(), 1);

        agg.on_key_release(W);
        agg.on_key_press(W);
        assert_eq!(agg.total_actions(), 2);
        assert_eq!(agg.total_key_presses(W), 2);
    }

    #[test]
    fn untracked_keys_are_ignored() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        tap(&agg, UNTRACKED);
        assert_eq!(agg.total_actions(), 0);
        assert_eq!(agg.total_key_presses(UNTRACKED), 0);
    }

    #[test]
    fn instant_apm_from_even_spacing() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        for _ in 0..5 {
            tap(&agg, W);
            clock.advance_ms(200);
        }
        // newest press at +800, read at +1000: the first press just expired
        assert_eq!(agg.instant_apm(), 300);
        assert_eq!(agg.instant_movement_per_minute(), 300);
    }

    #[test]
    fn instant_apm_expires_to_zero() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        tap(&agg, W);
        clock.advance_ms(100);
        tap(&agg, W);
        assert_eq!(agg.instant_apm(), 600);
        clock.advance_ms(1_000);
        assert_eq!(agg.instant_apm(), 0);
        assert_eq!(agg.total_actions(), 2);
    }

    #[test]
    fn non_movement_action_keys_skip_movement() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        tap(&agg, Q);
        clock.advance_ms(100);
        tap(&agg, Q);
        assert_eq!(agg.instant_apm(), 600);
        assert_eq!(agg.instant_movement_per_minute(), 0);
    }

    #[test]
    fn mouse_buttons_split_into_actions_and_clicks() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        agg.on_mouse_press(LEFT);
        clock.advance_ms(250);
        agg.on_mouse_press(LEFT);
        agg.on_mouse_press(MOUSE5);
        agg.on_mouse_press(MouseButton(4));

        assert_eq!(agg.total_actions(), 3);
        assert_eq!(agg.total_mouse_clicks(), 2);
        assert_eq!(agg.instant_clicks_per_minute(), 240);
    }

    #[test]
    fn historical_apm_reports_mean_gap() {
        let (clock, agg) = aggregator(small_history());
        for _ in 0..4 {
            tap(&agg, W);
            clock.advance_ms(200);
        }
        // three gaps of 200ms in the current bucket
        assert_eq!(agg.historical_apm(), vec![0, 0, 300]);
    }

    #[test]
    fn historical_apm_rolls_into_new_buckets() {
        let (clock, agg) = aggregator(small_history());
        tap(&agg, W);
        clock.advance_ms(500);
        tap(&agg, W); // gap 500 -> 120 apm in bucket 0
        clock.advance_ms(600);
        tap(&agg, W); // gap 600 -> 100 apm in bucket 1
        assert_eq!(agg.historical_apm(), vec![0, 120, 100]);

        clock.advance_ms(3_000);
        assert_eq!(agg.historical_apm(), vec![0, 0, 0]);
    }

    #[test]
    fn simultaneous_actions_do_not_divide_by_zero() {
        let (_clock, agg) = aggregator(small_history());
        agg.on_mouse_press(LEFT);
        agg.on_mouse_press(LEFT);
        assert_eq!(agg.historical_apm(), vec![0, 0, 0]);
        assert_eq!(agg.instant_apm(), 0);
    }

    #[test]
    fn sub_millisecond_gaps_report_zero() {
        let (clock, agg) = aggregator(small_history());
        agg.on_mouse_press(LEFT);
        clock.advance(Duration::from_micros(500));
        agg.on_mouse_press(LEFT);
        assert_eq!(agg.instant_apm(), 0);
        assert_eq!(agg.instant_clicks_per_minute(), 0);
        assert_eq!(agg.historical_apm(), vec![0, 0, 0]);
    }

    #[test]
    fn mouse_moves_accumulate_pixels() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        agg.on_mouse_move(3, 4);
        agg.on_mouse_move(-6, 8);
        agg.on_mouse_move(0, 0);
        assert_eq!(agg.total_pixels(), 15);
        // 15px over the default one-second pixel window
        assert_eq!(agg.instant_pixels_per_minute(), 900);
        assert_eq!(agg.total_actions(), 0);

        clock.advance_ms(1_000);
        assert_eq!(agg.instant_pixels_per_minute(), 0);
        assert_eq!(agg.total_pixels(), 15);
    }

    #[test]
    fn pixel_distance_is_truncated() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        // sqrt(2) = 1.41
        agg.on_mouse_move(1, 1);
        agg.on_mouse_move(1, -1);
        assert_eq!(agg.total_pixels(), 2);
    }

    #[test]
    fn record_dispatches_events() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        agg.record(InputEvent::KeyPress(W));
        agg.record(InputEvent::KeyPress(W));
        agg.record(InputEvent::KeyRelease(W));
        agg.record(InputEvent::MousePress(LEFT));
        agg.record(InputEvent::MouseMove { dx: 0, dy: -12 });
        assert_eq!(agg.total_actions(), 2);
        assert_eq!(agg.total_mouse_clicks(), 1);
        assert_eq!(agg.total_pixels(), 12);
    }

    #[test]
    fn key_presses_by_label() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        tap(&agg, W);
        tap(&agg, W);
        assert_eq!(agg.total_key_presses_for_char('w'), 2);
        assert_eq!(agg.total_key_presses_for_char('W'), 2);
        assert_eq!(agg.total_key_presses_for_char('x'), 0);
    }

    #[test]
    fn snapshot_matches_individual_reads() {
        let (clock, agg) = aggregator(small_history());
        tap(&agg, W);
        clock.advance_ms(100);
        agg.on_mouse_press(LEFT);
        agg.on_mouse_move(30, 40);

        let snap = agg.snapshot();
        assert_eq!(snap.instant_apm, agg.instant_apm());
        assert_eq!(snap.total_actions, 2);
        assert_eq!(snap.total_mouse_clicks, 1);
        assert_eq!(snap.historical_apm, agg.historical_apm());
        assert_eq!(snap.key_presses_for(W), 1);
        assert_eq!(snap.total_pixels, 50);
        assert_eq!(snap.instant_pixels_per_minute, agg.instant_pixels_per_minute());
    }

    #[test]
    fn render_fills_placeholders() {
        let (_clock, agg) = aggregator(AggregatorConfig::default());
        tap(&agg, W);
        agg.on_mouse_press(LEFT);
        let template = Template::new("APM {apm} | {ta} actions | W {tk:w} | {tc} clicks");
        assert_eq!(agg.render(&template), "APM 0 | 2 actions | W 1 | 1 clicks");
    }

    #[test]
    fn reset_forgets_session() {
        let (clock, agg) = aggregator(AggregatorConfig::default());
        agg.on_key_press(W);
        clock.advance_ms(50);
        agg.on_mouse_press(LEFT);
        agg.on_mouse_move(10, 0);
        agg.reset();

        assert_eq!(agg.total_actions(), 0);
        assert_eq!(agg.total_mouse_clicks(), 0);
        assert_eq!(agg.instant_apm(), 0);
        assert_eq!(agg.total_key_presses(W), 0);
        assert_eq!(agg.total_pixels(), 0);
        assert_eq!(agg.instant_pixels_per_minute(), 0);
        // W was held before the reset; pressing again counts
        agg.on_key_press(W);
        assert_eq!(agg.total_actions(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AggregatorConfig {
            actions: WindowConfig { capacity: 0, ttl_ms: 1_000 },
            ..AggregatorConfig::default()
        };
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        assert!(matches!(
            MetricsAggregator::new(config, clock),
            Err(WindowError::InvalidConfig(_))
        ));
    }

    // Counts clock reads made while the aggregator's state is unlocked.
    struct LockCheckingClock {
        inner: ManualClock,
        aggregator: OnceLock<Weak<MetricsAggregator>>,
        unlocked_reads: AtomicUsize,
    }

    impl Clock for LockCheckingClock {
        fn now(&self) -> Instant {
            if let Some(agg) = self.aggregator.get().and_then(Weak::upgrade) {
                if !agg.state.is_locked() {
                    self.unlocked_reads.fetch_add(1, Ordering::SeqCst);
                }
            }
            self.inner.now()
        }
    }

    #[test]
    fn event_timestamps_are_taken_under_the_lock() {
        let clock = Arc::new(LockCheckingClock {
            inner: ManualClock::new(),
            aggregator: OnceLock::new(),
            unlocked_reads: AtomicUsize::new(0),
        });
        let agg = MetricsAggregator::new(AggregatorConfig::default(), clock.clone()).unwrap();
        let agg = Arc::new(agg);
        assert!(clock.aggregator.set(Arc::downgrade(&agg)).is_ok());

        agg.on_key_press(W);
        clock.inner.advance_ms(100);
        agg.on_mouse_press(LEFT);
        agg.on_mouse_press(MOUSE5);
        agg.on_mouse_move(5, 5);
        let snap = agg.snapshot();

        assert_eq!(snap.total_actions, 3);
        assert_eq!(clock.unlocked_reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn aggregator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MetricsAggregator>();
    }
}
