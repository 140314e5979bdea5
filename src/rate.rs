use std::borrow::Borrow;
use std::time::{Duration, Instant};

const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_MINUTE_INT: u64 = 60_000;

/// Instantaneous "events per minute" from recent timestamps, oldest first.
///
/// Averages the gaps between consecutive timestamps and extrapolates how many
/// would fit in a minute, floored. Fewer than two timestamps, or timestamps
/// that all coincide, give 0.
pub fn instant_rate_per_minute<I>(timestamps: I) -> u32
where
    I: IntoIterator,
    I::Item: Borrow<Instant>,
{
    let mut samples = 0u64;
    let mut total_delay_ms = 0u64;
    let mut last: Option<Instant> = None;

    for t in timestamps {
        let t = *t.borrow();
        if let Some(prev) = last {
            samples += 1;
            // whole milliseconds per gap; sub-millisecond gaps count as 0
            let gap_ms = u64::try_from(t.saturating_duration_since(prev).as_millis())
                .unwrap_or(u64::MAX);
            total_delay_ms = total_delay_ms.saturating_add(gap_ms);
        }
        last = Some(t);
    }

    if samples == 0 || total_delay_ms == 0 {
        return 0;
    }
    let rate = MS_PER_MINUTE_INT.saturating_mul(samples) / total_delay_ms;
    u32::try_from(rate).unwrap_or(u32::MAX)
}

/// Per-minute figure for a bucket that summed `entries` millisecond gaps.
/// A zero mean gap gives 0 rather than an infinite rate.
pub fn mean_delta_to_per_minute(sum_ms: u64, entries: usize) -> u64 {
    if entries == 0 || sum_ms == 0 {
        return 0;
    }
    let mean_ms = sum_ms as f64 / entries as f64;
    (MS_PER_MINUTE / mean_ms).round() as u64
}

/// Per-minute figure for an amount (pixels moved, say) observed over the last
/// `window`, extrapolated linearly.
pub fn amount_per_minute<I>(amounts: I, window: Duration) -> u64
where
    I: IntoIterator<Item = u64>,
{
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    if window_ms == 0 {
        return 0;
    }
    let total = amounts.into_iter().fold(0u64, u64::saturating_add);
    let per_minute = u128::from(total) * u128::from(MS_PER_MINUTE_INT) / u128::from(window_ms);
    u64::try_from(per_minute).unwrap_or(u64::MAX)
}
