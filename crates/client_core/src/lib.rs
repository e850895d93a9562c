use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::{
    domain::{Event, EventId, PaidTicket, TicketId, UserId},
    protocol::{EventRow, NewEvent, NewTicket},
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

pub mod backend;
pub mod checkout;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod draft;
pub mod error;
pub mod event_page;
pub mod session;
pub mod tiers;

pub use backend::HttpBackend;
pub use checkout::{
    BuyerContact, Checkout, CheckoutOutcome, CheckoutState, PaymentRequest, TicketSelection,
    WidgetResult,
};
pub use config::{load_settings, Settings};
pub use dashboard::{Dashboard, DashboardEntry, EventSummary};
pub use display::{to_display_tiers, DisplayTier, DisplayTiers};
pub use draft::{submit_event, DraftEvent};
pub use error::ClientError;
pub use event_page::{load_event_page, Countdown, EventPage, EventPageState};
pub use session::{
    AuthService, FileSessionFlag, LocalAuth, MemorySessionFlag, Session, SessionFlag,
    SessionHub, SessionManager, SignUpOutcome,
};
pub use tiers::{DraftTierBuffer, TierRejected};

/// Persistence seam for events and tickets. Implementations normalize rows
/// into [`Event`] before returning them.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: &NewEvent) -> Result<Event>;
    async fn list_events_for_organizer(&self, organizer_id: UserId) -> Result<Vec<Event>>;
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>>;
    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<PaidTicket>;
}

#[async_trait]
impl EventStore for Storage {
    async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        Storage::insert_event(self, event)
            .await
            .map(EventRow::into_event)
    }

    async fn list_events_for_organizer(&self, organizer_id: UserId) -> Result<Vec<Event>> {
        let rows = Storage::list_events_for_organizer(self, organizer_id).await?;
        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        Ok(Storage::get_event(self, event_id)
            .await?
            .map(EventRow::into_event))
    }

    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<PaidTicket> {
        Storage::insert_ticket(self, ticket).await
    }
}

/// Hosted payment widget. Resolves once the buyer completes or closes it.
#[async_trait]
pub trait PaymentWidget: Send + Sync {
    async fn collect(&self, request: &PaymentRequest) -> Result<WidgetResult>;
}

pub struct MissingPaymentWidget;

#[async_trait]
impl PaymentWidget for MissingPaymentWidget {
    async fn collect(&self, request: &PaymentRequest) -> Result<WidgetResult> {
        Err(anyhow!(
            "payment widget unavailable for {} ({} {})",
            request.email,
            request.amount,
            request.currency
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    EventsRefreshed { count: usize },
    EventCreated { event_id: EventId },
    TicketRecorded { ticket_id: TicketId, reference: String },
    TicketNotRecorded { reference: String },
    Error(String),
}

pub struct TicketingClient {
    store: Arc<dyn EventStore>,
    payment_widget: Arc<dyn PaymentWidget>,
    sessions: Arc<SessionManager>,
    settings: Settings,
    origin: Url,
    events: broadcast::Sender<ClientEvent>,
}

impl TicketingClient {
    pub fn new(
        store: Arc<dyn EventStore>,
        sessions: Arc<SessionManager>,
        settings: Settings,
    ) -> Result<Arc<Self>> {
        Self::new_with_dependencies(store, sessions, Arc::new(MissingPaymentWidget), settings)
    }

    pub fn new_with_dependencies(
        store: Arc<dyn EventStore>,
        sessions: Arc<SessionManager>,
        payment_widget: Arc<dyn PaymentWidget>,
        settings: Settings,
    ) -> Result<Arc<Self>> {
        let origin = Url::parse(&settings.public_origin)
            .with_context(|| format!("invalid public origin '{}'", settings.public_origin))?;
        let (events, _) = broadcast::channel(256);
        Ok(Arc::new(Self {
            store,
            payment_widget,
            sessions,
            settings,
            origin,
            events,
        }))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn EventStore> {
        Arc::clone(&self.store)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn share_link(&self, event_id: EventId) -> String {
        dashboard::share_link(&self.origin, event_id)
    }

    pub async fn open_dashboard(&self) -> DashboardEntry {
        Dashboard::open(
            Arc::clone(&self.store),
            &self.sessions,
            self.origin.clone(),
            self.events.clone(),
        )
        .await
    }

    /// Anyone may view an event; a signed-in organizer additionally gets
    /// preview controls.
    pub async fn open_event(&self, event_id: EventId) -> EventPageState {
        let is_organizer = self.sessions.current().is_some();
        load_event_page(self.store.as_ref(), event_id, is_organizer).await
    }

    pub fn begin_checkout(
        &self,
        event_title: impl Into<String>,
        selection: Option<TicketSelection>,
    ) -> Checkout {
        Checkout::new(
            event_title,
            selection,
            self.settings.payment_public_key.clone(),
            self.settings.currency.clone(),
        )
    }

    pub async fn complete_checkout(
        &self,
        checkout: &mut Checkout,
        contact: &BuyerContact,
    ) -> Result<CheckoutOutcome, ClientError> {
        let outcome = checkout
            .pay(contact, self.payment_widget.as_ref(), self.store.as_ref())
            .await;

        match &outcome {
            Ok(CheckoutOutcome::Recorded(ticket)) => {
                let _ = self.events.send(ClientEvent::TicketRecorded {
                    ticket_id: ticket.id,
                    reference: ticket.payment_reference.clone(),
                });
            }
            Ok(CheckoutOutcome::PaidButNotRecorded { reference, .. }) => {
                let _ = self.events.send(ClientEvent::TicketNotRecorded {
                    reference: reference.clone(),
                });
            }
            Ok(CheckoutOutcome::Cancelled) => {
                info!("client: checkout cancelled by buyer");
            }
            Err(err) => {
                warn!("client: checkout failed: {err}");
                let _ = self.events.send(ClientEvent::Error(err.user_message()));
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
