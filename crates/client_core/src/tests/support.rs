use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{min_tier_price, Event, EventId, PaidTicket, TicketId, UserId},
    protocol::{NewEvent, NewTicket},
};
use tokio::sync::Mutex;

use crate::{
    checkout::{PaymentRequest, WidgetResult},
    EventStore, PaymentWidget,
};

/// In-memory store with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<Event>>,
    tickets: Mutex<Vec<PaidTicket>>,
    pub event_inserts: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_event_writes: AtomicBool,
    pub fail_ticket_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn seed(&self, event: Event) {
        self.events.lock().await.push(event);
    }

    pub async fn tickets(&self) -> Vec<PaidTicket> {
        self.tickets.lock().await.clone()
    }

    pub async fn event_count(&self) -> usize {
        self.events.lock().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        self.event_inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_event_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("event insert rejected"));
        }
        let mut events = self.events.lock().await;
        let stored = Event {
            id: EventId(events.len() as i64 + 1),
            title: event.title.clone(),
            date: Some(event.date),
            location: event.location.clone(),
            description: event.description.clone(),
            organizer_id: Some(event.organizer_id),
            ticket_tiers: event.ticket_tiers.clone(),
            min_price: min_tier_price(&event.ticket_tiers).or(Some(event.ticket_price)),
            created_at: Some(Utc::now()),
        };
        events.push(stored.clone());
        Ok(stored)
    }

    async fn list_events_for_organizer(&self, organizer_id: UserId) -> Result<Vec<Event>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("store unreachable"));
        }
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .rev()
            .filter(|event| event.organizer_id == Some(organizer_id))
            .cloned()
            .collect())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("store unreachable"));
        }
        let events = self.events.lock().await;
        Ok(events.iter().find(|event| event.id == event_id).cloned())
    }

    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<PaidTicket> {
        if self.fail_ticket_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("ticket insert rejected"));
        }
        let mut tickets = self.tickets.lock().await;
        let paid = PaidTicket {
            id: TicketId(tickets.len() as i64 + 1),
            event_title: ticket.event_title.clone(),
            ticket_type: ticket.ticket_type.clone(),
            price: ticket.price,
            customer_name: ticket.customer_name.clone(),
            customer_email: ticket.customer_email.clone(),
            customer_phone: ticket.customer_phone.clone(),
            payment_reference: ticket.payment_reference.clone(),
            status: ticket.status,
            created_at: Some(Utc::now()),
        };
        tickets.push(paid.clone());
        Ok(paid)
    }
}

/// Widget that answers every attempt with the same result and records what
/// it was configured with.
pub struct ScriptedWidget {
    result: WidgetResult,
    pub requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedWidget {
    pub fn paying(reference: &str) -> Arc<Self> {
        Arc::new(Self {
            result: WidgetResult::Success {
                reference: reference.to_string(),
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn cancelling() -> Arc<Self> {
        Arc::new(Self {
            result: WidgetResult::Cancelled,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PaymentWidget for ScriptedWidget {
    async fn collect(&self, request: &PaymentRequest) -> Result<WidgetResult> {
        self.requests.lock().await.push(request.clone());
        Ok(self.result.clone())
    }
}
