use std::sync::atomic::Ordering;

use super::*;
use crate::test_support::{MemoryStore, ScriptedWidget};

fn buyer() -> BuyerContact {
    BuyerContact {
        name: "Ama Mensah".to_string(),
        email: "ama@example.com".to_string(),
        phone: "+233200000000".to_string(),
    }
}

fn vip_checkout() -> Checkout {
    Checkout::new(
        "Harbour Fest",
        Some(TicketSelection {
            ticket_type: "VIP".to_string(),
            price: 150.0,
        }),
        "pk_test_key",
        "GHS",
    )
}

#[test]
fn total_floors_price_and_adds_fee() {
    assert_eq!(checkout_total(150.0), Some(155));
    assert_eq!(checkout_total(49.99), Some(54));
    assert_eq!(checkout_total(0.0), Some(5));
}

#[test]
fn total_rejects_prices_beyond_the_integer_range() {
    assert_eq!(checkout_total(1e19), None);
    assert_eq!(checkout_total(f64::INFINITY), None);
    assert_eq!(checkout_total(-1.0), None);
    assert_eq!(checkout_total(1e15), Some(1_000_000_000_000_005));
}

#[test]
fn amount_overflow_is_a_validation_error() {
    let checkout = Checkout::new(
        "Harbour Fest",
        Some(TicketSelection {
            ticket_type: "Patron".to_string(),
            price: 100_000_000_000_000_000.0,
        }),
        "pk_test_key",
        "GHS",
    );
    assert_eq!(checkout.total(), Some(100_000_000_000_000_005));
    assert_eq!(checkout.amount_minor(), None);

    let err = checkout.payment_request(&buyer()).expect_err("too large");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(err.to_string(), AMOUNT_TOO_LARGE_MESSAGE);
}

#[test]
fn missing_selection_defaults_to_general() {
    let checkout = Checkout::new("Harbour Fest", None, "pk_test_key", "GHS");
    assert_eq!(checkout.selection(), &TicketSelection::default());
    assert_eq!(checkout.selection().ticket_type, "General");
    assert_eq!(checkout.total(), Some(94));
    assert_eq!(checkout.amount_minor(), Some(9_400));
}

#[test]
fn select_tier_carries_title_and_price() {
    let card = DisplayTier {
        title: "Early Bird".to_string(),
        price: 45.0,
        features: Vec::new(),
        rank: 0,
        popular: false,
    };
    assert_eq!(
        select_tier(&card),
        TicketSelection {
            ticket_type: "Early Bird".to_string(),
            price: 45.0,
        }
    );
}

#[test]
fn payment_request_is_in_minor_units_with_ticket_type_field() {
    let request = vip_checkout().payment_request(&buyer()).expect("request");
    assert_eq!(request.amount, 15_500);
    assert_eq!(request.currency, "GHS");
    assert_eq!(request.public_key, "pk_test_key");
    assert_eq!(request.metadata.name, "Ama Mensah");
    assert_eq!(request.metadata.custom_fields.len(), 1);
    let field = &request.metadata.custom_fields[0];
    assert_eq!(field.display_name, "Ticket Type");
    assert_eq!(field.variable_name, "ticket_type");
    assert_eq!(field.value, "VIP");
}

#[test]
fn contact_details_are_required() {
    let mut contact = buyer();
    contact.email = "not-an-email".to_string();
    assert!(matches!(
        vip_checkout().payment_request(&contact),
        Err(ClientError::Validation(_))
    ));

    let mut contact = buyer();
    contact.phone = " ".to_string();
    assert!(contact.validate().is_err());
}

#[tokio::test]
async fn successful_payment_records_one_paid_ticket() {
    let store = MemoryStore::new();
    let widget = ScriptedWidget::paying("T123");
    let mut checkout = vip_checkout();

    let outcome = checkout
        .pay(&buyer(), widget.as_ref(), store.as_ref())
        .await
        .expect("outcome");

    let CheckoutOutcome::Recorded(ticket) = outcome else {
        panic!("expected recorded ticket");
    };
    assert_eq!(ticket.price, 155);
    assert_eq!(ticket.ticket_type, "VIP");
    assert_eq!(ticket.payment_reference, "T123");
    assert_eq!(ticket.status, TicketStatus::Paid);
    assert_eq!(store.tickets().await.len(), 1);
    assert!(matches!(checkout.state(), CheckoutState::Success(_)));
}

#[tokio::test]
async fn cancelled_widget_writes_nothing_and_allows_retry() {
    let store = MemoryStore::new();
    let mut checkout = vip_checkout();

    let outcome = checkout
        .pay(&buyer(), ScriptedWidget::cancelling().as_ref(), store.as_ref())
        .await
        .expect("outcome");
    assert_eq!(outcome, CheckoutOutcome::Cancelled);
    assert_eq!(checkout.state(), &CheckoutState::Cancelled);
    assert!(store.tickets().await.is_empty());

    let retry = checkout
        .pay(&buyer(), ScriptedWidget::paying("T124").as_ref(), store.as_ref())
        .await
        .expect("retry");
    assert!(matches!(retry, CheckoutOutcome::Recorded(_)));
    assert_eq!(store.tickets().await.len(), 1);
}

#[tokio::test]
async fn failed_ticket_write_reports_paid_but_not_recorded() {
    let store = MemoryStore::new();
    store.fail_ticket_writes.store(true, Ordering::SeqCst);
    let mut checkout = vip_checkout();

    let outcome = checkout
        .pay(&buyer(), ScriptedWidget::paying("T999").as_ref(), store.as_ref())
        .await
        .expect("outcome");

    assert_eq!(
        outcome,
        CheckoutOutcome::PaidButNotRecorded {
            reference: "T999".to_string(),
            message: TICKET_NOT_SAVED_MESSAGE.to_string(),
        }
    );
    assert_eq!(
        checkout.state(),
        &CheckoutState::PaidButNotRecorded {
            reference: "T999".to_string()
        }
    );
}

#[tokio::test]
async fn invalid_contact_never_opens_widget() {
    let store = MemoryStore::new();
    let widget = ScriptedWidget::paying("T1");
    let mut checkout = vip_checkout();
    let contact = BuyerContact::default();

    let err = checkout
        .pay(&contact, widget.as_ref(), store.as_ref())
        .await
        .expect_err("invalid contact");
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(widget.requests.lock().await.is_empty());
    assert_eq!(checkout.state(), &CheckoutState::Idle);
}

#[tokio::test]
async fn widget_failure_returns_to_idle() {
    let store = MemoryStore::new();
    let mut checkout = vip_checkout();

    let err = checkout
        .pay(&buyer(), &crate::MissingPaymentWidget, store.as_ref())
        .await
        .expect_err("widget unavailable");
    assert!(matches!(err, ClientError::Payment(_)));
    assert_eq!(checkout.state(), &CheckoutState::Idle);
}

#[tokio::test]
async fn oversized_amount_never_opens_widget() {
    let store = MemoryStore::new();
    let widget = ScriptedWidget::paying("T2");
    let mut checkout = Checkout::new(
        "Harbour Fest",
        Some(TicketSelection {
            ticket_type: "Patron".to_string(),
            price: 100_000_000_000_000_000.0,
        }),
        "pk_test_key",
        "GHS",
    );

    let err = checkout
        .pay(&buyer(), widget.as_ref(), store.as_ref())
        .await
        .expect_err("amount too large");
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(widget.requests.lock().await.is_empty());
    assert!(store.tickets().await.is_empty());
    assert_eq!(checkout.state(), &CheckoutState::Idle);
}
