//! Time window check against the notary's clock.

use crate::error::NotaryError;
use chrono::{DateTime, Utc};
use shared_types::TimeWindow;
use std::time::Duration;

/// `None` if `now` lies within `window` widened by `tolerance` on both ends.
pub fn validate_time_window(
    now: DateTime<Utc>,
    window: Option<&TimeWindow>,
    tolerance: Duration,
) -> Option<NotaryError> {
    let window = window?;
    let slack = chrono::Duration::from_std(tolerance).unwrap_or_else(|_| chrono::Duration::zero());
    let widened = TimeWindow {
        from: window.from.map(|from| from.checked_sub_signed(slack).unwrap_or(from)),
        until: window.until.map(|until| until.checked_add_signed(slack).unwrap_or(until)),
    };
    if widened.contains(now) {
        None
    } else {
        Some(NotaryError::TimeWindowInvalid {
            current_time: now,
            tx_time_window: *window,
        })
    }
}
