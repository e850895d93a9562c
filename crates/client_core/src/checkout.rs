//! Checkout handoff: the selected tier travels into the checkout view, the
//! hosted widget collects payment, and a paid ticket is recorded.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{PaidTicket, TicketStatus},
    protocol::NewTicket,
};
use tracing::{error, info, warn};

use crate::{
    display::{DisplayTier, DEFAULT_BASE_PRICE},
    error::ClientError,
    EventStore, PaymentWidget,
};

pub const CHECKOUT_FEE: i64 = 5;
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;
pub const DEFAULT_TICKET_TYPE: &str = "General";
pub const TICKET_NOT_SAVED_MESSAGE: &str =
    "Payment successful but failed to save ticket. Please contact support.";
pub const AMOUNT_TOO_LARGE_MESSAGE: &str = "amount too large";

/// Navigation handoff between the ticket cards and the checkout view. Lives
/// only in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketSelection {
    pub ticket_type: String,
    pub price: f64,
}

impl Default for TicketSelection {
    fn default() -> Self {
        Self {
            ticket_type: DEFAULT_TICKET_TYPE.to_string(),
            price: DEFAULT_BASE_PRICE,
        }
    }
}

pub fn select_tier(tier: &DisplayTier) -> TicketSelection {
    TicketSelection {
        ticket_type: tier.title.clone(),
        price: tier.price,
    }
}

/// `floor(price) + fee` in major units, or `None` when the price cannot be
/// charged as a whole number of major units.
pub fn checkout_total(price: f64) -> Option<i64> {
    let floored = price.floor();
    // `i64::MAX as f64` rounds up to 2^63, so the bound is exclusive.
    if !floored.is_finite() || floored < 0.0 || floored >= i64::MAX as f64 {
        return None;
    }
    (floored as i64).checked_add(CHECKOUT_FEE)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuyerContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl BuyerContact {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::validation("Full name is required"));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ClientError::validation("A valid email address is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(ClientError::validation("Phone number is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub display_name: String,
    pub variable_name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub name: String,
    pub phone: String,
    pub custom_fields: Vec<CustomField>,
}

/// Everything the hosted widget is configured with for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub email: String,
    /// Total in the currency's smallest unit.
    pub amount: i64,
    pub currency: String,
    pub public_key: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetResult {
    Success { reference: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutState {
    Idle,
    AwaitingWidgetResult,
    Success(PaidTicket),
    Cancelled,
    PaidButNotRecorded { reference: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Recorded(PaidTicket),
    Cancelled,
    /// The buyer was charged but the ticket row was not written. Nothing
    /// retries this; the buyer is told to contact support.
    PaidButNotRecorded { reference: String, message: String },
}

pub struct Checkout {
    event_title: String,
    selection: TicketSelection,
    public_key: String,
    currency: String,
    state: CheckoutState,
}

impl Checkout {
    /// A missing selection (e.g. after a full reload) falls back to the
    /// default General ticket.
    pub fn new(
        event_title: impl Into<String>,
        selection: Option<TicketSelection>,
        public_key: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            event_title: event_title.into(),
            selection: selection.unwrap_or_default(),
            public_key: public_key.into(),
            currency: currency.into(),
            state: CheckoutState::Idle,
        }
    }

    pub fn selection(&self) -> &TicketSelection {
        &self.selection
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn fee(&self) -> i64 {
        CHECKOUT_FEE
    }

    pub fn total(&self) -> Option<i64> {
        checkout_total(self.selection.price)
    }

    pub fn amount_minor(&self) -> Option<i64> {
        self.total()?.checked_mul(MINOR_UNITS_PER_MAJOR)
    }

    pub fn payment_request(&self, contact: &BuyerContact) -> Result<PaymentRequest, ClientError> {
        contact.validate()?;
        let amount = self
            .amount_minor()
            .ok_or_else(|| ClientError::validation(AMOUNT_TOO_LARGE_MESSAGE))?;
        Ok(PaymentRequest {
            email: contact.email.trim().to_string(),
            amount,
            currency: self.currency.clone(),
            public_key: self.public_key.clone(),
            metadata: PaymentMetadata {
                name: contact.name.trim().to_string(),
                phone: contact.phone.trim().to_string(),
                custom_fields: vec![CustomField {
                    display_name: "Ticket Type".to_string(),
                    variable_name: "ticket_type".to_string(),
                    value: self.selection.ticket_type.clone(),
                }],
            },
        })
    }

    /// Drives one widget attempt. A cancelled attempt can be retried by
    /// calling `pay` again.
    pub async fn pay(
        &mut self,
        contact: &BuyerContact,
        widget: &dyn PaymentWidget,
        store: &dyn EventStore,
    ) -> Result<CheckoutOutcome, ClientError> {
        let request = self.payment_request(contact)?;

        self.state = CheckoutState::AwaitingWidgetResult;
        let result = match widget.collect(&request).await {
            Ok(result) => result,
            Err(err) => {
                self.state = CheckoutState::Idle;
                warn!("checkout: payment widget failed: {err:#}");
                return Err(ClientError::Payment(err.to_string()));
            }
        };

        let reference = match result {
            WidgetResult::Cancelled => {
                self.state = CheckoutState::Cancelled;
                info!(ticket_type = %self.selection.ticket_type, "checkout: transaction cancelled");
                return Ok(CheckoutOutcome::Cancelled);
            }
            WidgetResult::Success { reference } => reference,
        };

        let ticket = NewTicket {
            event_title: self.event_title.clone(),
            ticket_type: self.selection.ticket_type.clone(),
            price: request.amount / MINOR_UNITS_PER_MAJOR,
            customer_name: contact.name.trim().to_string(),
            customer_email: contact.email.trim().to_string(),
            customer_phone: contact.phone.trim().to_string(),
            payment_reference: reference.clone(),
            status: TicketStatus::Paid,
        };

        match store.insert_ticket(&ticket).await {
            Ok(paid) => {
                info!(
                    ticket_id = paid.id.0,
                    reference = %reference,
                    total = paid.price,
                    "checkout: ticket recorded"
                );
                self.state = CheckoutState::Success(paid.clone());
                Ok(CheckoutOutcome::Recorded(paid))
            }
            Err(err) => {
                error!(reference = %reference, "checkout: payment captured but ticket not saved: {err:#}");
                self.state = CheckoutState::PaidButNotRecorded {
                    reference: reference.clone(),
                };
                Ok(CheckoutOutcome::PaidButNotRecorded {
                    reference,
                    message: TICKET_NOT_SAVED_MESSAGE.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/checkout_tests.rs"]
mod tests;
