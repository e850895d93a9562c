use chrono::{DateTime, Duration, Utc};
use shared::domain::{Event, EventId};
use tracing::{info, warn};

use crate::{
    display::{to_display_tiers, DisplayTiers},
    EventStore,
};

/// Events without a date count down to two weeks from now.
const DEFAULT_COUNTDOWN_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq)]
pub enum EventPageState {
    Loaded(EventPage),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    pub event: Event,
    /// Signed-in organizers get preview controls on the page.
    pub is_organizer: bool,
}

impl EventPage {
    pub fn ticket_cards(&self) -> DisplayTiers<'_> {
        to_display_tiers(&self.event)
    }

    pub fn countdown(&self, now: DateTime<Utc>) -> Countdown {
        Countdown::until(countdown_target(self.event.date, now), now)
    }
}

/// Read failures are logged and shown as "not found"; the page never
/// surfaces store errors.
pub async fn load_event_page(
    store: &dyn EventStore,
    event_id: EventId,
    is_organizer: bool,
) -> EventPageState {
    match store.get_event(event_id).await {
        Ok(Some(event)) => EventPageState::Loaded(EventPage {
            event,
            is_organizer,
        }),
        Ok(None) => {
            info!(event_id = event_id.0, "event page: event not found");
            EventPageState::NotFound
        }
        Err(err) => {
            warn!(event_id = event_id.0, "event page: fetch failed: {err:#}");
            EventPageState::NotFound
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// All zero once the target has passed.
    pub fn until(target: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = target.signed_duration_since(now);
        if remaining <= Duration::zero() {
            return Self::default();
        }
        let total_seconds = remaining.num_seconds();
        Self {
            days: total_seconds / 86_400,
            hours: (total_seconds / 3_600) % 24,
            minutes: (total_seconds / 60) % 60,
            seconds: total_seconds % 60,
        }
    }

    pub fn is_over(&self) -> bool {
        *self == Self::default()
    }
}

pub fn countdown_target(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    date.unwrap_or_else(|| now + Duration::days(DEFAULT_COUNTDOWN_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> DateTime<Utc> {
        raw.parse().expect("timestamp")
    }

    #[test]
    fn countdown_splits_remaining_time() {
        let now = at("2025-12-01T00:00:00Z");
        let target = at("2025-12-03T05:06:07Z");
        assert_eq!(
            Countdown::until(target, now),
            Countdown {
                days: 2,
                hours: 5,
                minutes: 6,
                seconds: 7,
            }
        );
    }

    #[test]
    fn countdown_stops_at_zero() {
        let now = at("2026-01-02T00:00:00Z");
        let countdown = Countdown::until(at("2026-01-01T00:00:00Z"), now);
        assert!(countdown.is_over());
    }

    #[test]
    fn undated_events_count_down_two_weeks() {
        let now = at("2025-12-01T00:00:00Z");
        assert_eq!(countdown_target(None, now), at("2025-12-15T00:00:00Z"));
        assert_eq!(Countdown::until(countdown_target(None, now), now).days, 14);
    }
}
