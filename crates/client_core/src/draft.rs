use chrono::{DateTime, NaiveDateTime, Utc};
use shared::{
    domain::{min_tier_price, Event, TicketTier},
    protocol::NewEvent,
};
use tracing::{error, info};

use crate::{
    error::ClientError,
    session::Session,
    tiers::{parse_tier, DraftTierBuffer, TierRejected},
    EventStore,
};

/// Event under construction in the organizer's creation form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftEvent {
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub location: String,
    pub description: String,
    tiers: Vec<TicketTier>,
}

impl DraftEvent {
    pub fn new(title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn tiers(&self) -> &[TicketTier] {
        &self.tiers
    }

    /// Appends the buffered tier and clears the buffer. On rejection neither
    /// the draft nor the buffer changes.
    pub fn add_tier(&mut self, buffer: &mut DraftTierBuffer) -> Result<&TicketTier, TierRejected> {
        let tier = parse_tier(buffer)?;
        buffer.clear();
        self.tiers.push(tier);
        Ok(&self.tiers[self.tiers.len() - 1])
    }

    pub fn remove_tier(&mut self, index: usize) -> Option<TicketTier> {
        if index < self.tiers.len() {
            Some(self.tiers.remove(index))
        } else {
            None
        }
    }

    pub fn min_price(&self) -> Option<f64> {
        min_tier_price(&self.tiers)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.title.trim().is_empty() {
            return Err(ClientError::validation("Event title is required"));
        }
        if self.date.is_none() {
            return Err(ClientError::validation("Event date is required"));
        }
        if self.location.trim().is_empty() {
            return Err(ClientError::validation("Event location is required"));
        }
        if self.tiers.is_empty() {
            return Err(ClientError::validation(
                "Please add at least one ticket tier",
            ));
        }
        Ok(())
    }

    pub fn to_new_event(&self, session: &Session) -> Result<NewEvent, ClientError> {
        self.validate()?;
        let (Some(date), Some(ticket_price)) = (self.date, self.min_price()) else {
            return Err(ClientError::validation("Event draft is incomplete"));
        };

        Ok(NewEvent {
            title: self.title.trim().to_string(),
            date,
            location: self.location.trim().to_string(),
            description: self.description.trim().to_string(),
            organizer_id: session.user_id,
            ticket_tiers: self.tiers.clone(),
            ticket_price,
        })
    }
}

/// Accepts RFC 3339 or the `YYYY-MM-DDTHH:MM` shape a datetime-local input
/// produces (read as UTC).
pub fn parse_event_date(text: &str) -> Result<DateTime<Utc>, ClientError> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ClientError::validation(format!("'{trimmed}' is not a valid date")))
}

/// Single attempt; the caller decides whether to resubmit.
pub async fn submit_event(
    store: &dyn EventStore,
    draft: &DraftEvent,
    session: Option<&Session>,
) -> Result<Event, ClientError> {
    let session = session.ok_or(ClientError::Unauthorized)?;
    let new_event = draft.to_new_event(session)?;

    match store.insert_event(&new_event).await {
        Ok(event) => {
            info!(
                event_id = event.id.0,
                organizer_id = %session.user_id,
                tiers = new_event.ticket_tiers.len(),
                min_price = new_event.ticket_price,
                "draft: event created"
            );
            Ok(event)
        }
        Err(err) => {
            error!(organizer_id = %session.user_id, "draft: event insert failed: {err:#}");
            Err(ClientError::StoreWrite {
                what: "event",
                source: err,
            })
        }
    }
}

#[cfg(test)]
#[path = "tests/draft_tests.rs"]
mod tests;
