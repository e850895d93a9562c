use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(TicketId);

/// Identifier the auth service assigns to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named ticket option. Tiers have no identity of their own; they are
/// addressed by their position in the parent event's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketTier {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Canonical event shape. Every read from a store goes through
/// [`crate::protocol::EventRow::into_event`] before reaching this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub location: String,
    pub description: String,
    pub organizer_id: Option<UserId>,
    pub ticket_tiers: Vec<TicketTier>,
    /// Cheapest tier price, or the legacy scalar price for events stored
    /// without tiers.
    pub min_price: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Paid,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaidTicket {
    pub id: TicketId,
    pub event_title: String,
    pub ticket_type: String,
    pub price: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub payment_reference: String,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

pub fn min_tier_price(tiers: &[TicketTier]) -> Option<f64> {
    tiers
        .iter()
        .map(|tier| tier.price)
        .fold(None, |lowest: Option<f64>, price| match lowest {
            Some(current) if current <= price => Some(current),
            _ => Some(price),
        })
}
