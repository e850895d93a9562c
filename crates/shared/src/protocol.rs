//! Record shapes exchanged with the data store.
//!
//! Rows written by older clients are loose: tiers may carry `title` instead
//! of `name`, prices may arrive as strings, and events created before tiers
//! existed only have a scalar `ticket_price`. [`EventRow::into_event`] is the
//! one place that loose shape is folded into [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{
    min_tier_price, Event, EventId, TicketStatus, TicketTier, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: String,
    pub organizer_id: UserId,
    pub ticket_tiers: Vec<TicketTier>,
    /// Derived minimum tier price, kept under the legacy column name.
    pub ticket_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub event_title: String,
    pub ticket_type: String,
    pub price: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub payment_reference: String,
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredTier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl StoredTier {
    pub fn into_tier(self) -> TicketTier {
        let name = self
            .title
            .filter(|title| !title.trim().is_empty())
            .or(self.name)
            .unwrap_or_default();
        TicketTier {
            name,
            price: self.price.unwrap_or(0.0),
            features: self.features.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub organizer_id: Option<UserId>,
    #[serde(default)]
    pub ticket_tiers: Option<Vec<StoredTier>>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub ticket_price: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl EventRow {
    pub fn into_event(self) -> Event {
        let ticket_tiers: Vec<TicketTier> = self
            .ticket_tiers
            .unwrap_or_default()
            .into_iter()
            .map(StoredTier::into_tier)
            .collect();
        let min_price = min_tier_price(&ticket_tiers).or(self.ticket_price);

        Event {
            id: self.id,
            title: self.title,
            date: self.date,
            location: self.location.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            organizer_id: self.organizer_id,
            ticket_tiers,
            min_price,
            created_at: self.created_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PriceRepr {
    Number(f64),
    Text(String),
}

fn lenient_price<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PriceRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PriceRepr::Number(value)) => Ok(Some(value)),
        Some(PriceRepr::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("invalid price '{text}'")))
        }
    }
}
