use std::sync::Arc;

use shared::domain::{Event, EventId, TicketTier};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use url::Url;

use crate::{
    draft::{submit_event, DraftEvent},
    error::ClientError,
    session::{Session, SessionManager},
    tiers::{DraftTierBuffer, TierRejected},
    ClientEvent, EventStore,
};

pub const CURRENCY_SYMBOL: &str = "GH₵";

#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub id: EventId,
    pub title: String,
    pub date_label: String,
    pub location: String,
    pub price_label: String,
    pub share_link: String,
}

pub enum DashboardEntry {
    Ready(Dashboard),
    RedirectToSignIn,
}

/// Organizer view: the event list plus the creation form state.
pub struct Dashboard {
    store: Arc<dyn EventStore>,
    session_rx: watch::Receiver<Option<Session>>,
    origin: Url,
    notifier: broadcast::Sender<ClientEvent>,
    events: Vec<Event>,
    draft: DraftEvent,
    tier_buffer: DraftTierBuffer,
}

impl Dashboard {
    pub async fn open(
        store: Arc<dyn EventStore>,
        sessions: &SessionManager,
        origin: Url,
        notifier: broadcast::Sender<ClientEvent>,
    ) -> DashboardEntry {
        if !sessions.has_session_flag() {
            return DashboardEntry::RedirectToSignIn;
        }
        if sessions.current().is_none() && sessions.restore().await.is_none() {
            return DashboardEntry::RedirectToSignIn;
        }

        let mut dashboard = Self {
            store,
            session_rx: sessions.subscribe(),
            origin,
            notifier,
            events: Vec::new(),
            draft: DraftEvent::default(),
            tier_buffer: DraftTierBuffer::default(),
        };
        dashboard.refresh().await;
        DashboardEntry::Ready(dashboard)
    }

    /// True once the hub reports a sign-out; the view should redirect.
    pub fn is_signed_out(&self) -> bool {
        self.session_rx.borrow().is_none()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Read failures leave an empty list rather than an error.
    pub async fn refresh(&mut self) -> usize {
        let Some(session) = self.session_rx.borrow().clone() else {
            self.events.clear();
            return 0;
        };

        self.events = match self
            .store
            .list_events_for_organizer(session.user_id)
            .await
        {
            Ok(events) => events,
            Err(err) => {
                warn!(organizer_id = %session.user_id, "dashboard: failed to load events: {err:#}");
                let _ = self
                    .notifier
                    .send(ClientEvent::Error(format!("failed to load events: {err}")));
                Vec::new()
            }
        };
        let count = self.events.len();
        let _ = self.notifier.send(ClientEvent::EventsRefreshed { count });
        count
    }

    pub fn draft(&self) -> &DraftEvent {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftEvent {
        &mut self.draft
    }

    pub fn tier_buffer_mut(&mut self) -> &mut DraftTierBuffer {
        &mut self.tier_buffer
    }

    pub fn add_tier(&mut self) -> Result<&TicketTier, TierRejected> {
        self.draft.add_tier(&mut self.tier_buffer)
    }

    pub fn remove_tier(&mut self, index: usize) -> Option<TicketTier> {
        self.draft.remove_tier(index)
    }

    pub fn cancel_create(&mut self) {
        self.draft.reset();
        self.tier_buffer.clear();
    }

    /// Submits the form once. A failed submit keeps the draft so the
    /// organizer can try again.
    pub async fn create_event(&mut self) -> Result<Event, ClientError> {
        let session = self.session_rx.borrow().clone();
        let event = submit_event(self.store.as_ref(), &self.draft, session.as_ref()).await?;

        self.draft.reset();
        self.tier_buffer.clear();
        let _ = self.notifier.send(ClientEvent::EventCreated { event_id: event.id });
        info!(event_id = event.id.0, "dashboard: refreshing after create");
        self.refresh().await;
        Ok(event)
    }

    pub fn share_link(&self, event_id: EventId) -> String {
        share_link(&self.origin, event_id)
    }

    pub fn summaries(&self) -> Vec<EventSummary> {
        self.events
            .iter()
            .map(|event| EventSummary {
                id: event.id,
                title: event.title.clone(),
                date_label: event
                    .date
                    .map(|date| date.format("%b %-d, %Y").to_string())
                    .unwrap_or_else(|| "Date TBA".to_string()),
                location: event.location.clone(),
                price_label: event
                    .min_price
                    .map(format_price)
                    .unwrap_or_else(|| "Free".to_string()),
                share_link: self.share_link(event.id),
            })
            .collect()
    }
}

pub fn share_link(origin: &Url, event_id: EventId) -> String {
    let base = origin.as_str().trim_end_matches('/');
    format!("{base}/events/{event_id}")
}

pub fn format_price(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{CURRENCY_SYMBOL}{amount:.0}")
    } else {
        format!("{CURRENCY_SYMBOL}{amount}")
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
