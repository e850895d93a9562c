use std::{collections::HashMap, sync::Arc};

use super::*;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use shared::domain::{TicketStatus, TicketTier};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct BackendState {
    inserted_events: Arc<Mutex<Vec<Value>>>,
    event_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    authorizations: Arc<Mutex<Vec<String>>>,
}

const ORGANIZER: &str = "6f1c1a52-4b1e-4a43-9b7e-2b1f4c3d9a10";

async fn insert_event(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Json(body): Json<Vec<Value>>,
) -> (StatusCode, Json<Value>) {
    record_auth(&state, &headers).await;
    let mut row = body.into_iter().next().unwrap_or(Value::Null);
    state.inserted_events.lock().await.push(row.clone());
    row["id"] = json!(7);
    row["created_at"] = json!("2026-01-05T10:00:00Z");
    (StatusCode::CREATED, Json(json!([row])))
}

async fn select_events(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    record_auth(&state, &headers).await;
    state.event_queries.lock().await.push(query.clone());
    if query.get("id").map(String::as_str) == Some("eq.404") {
        return Json(json!([]));
    }
    // Legacy row shape: tiers keyed by `title`, prices as strings.
    Json(json!([{
        "id": 3,
        "title": "Legacy Night",
        "date": "2026-02-01T20:00:00Z",
        "location": "Osu",
        "description": null,
        "organizer_id": ORGANIZER,
        "ticket_tiers": [
            { "title": "Gold", "price": "120", "features": ["Front row"] },
            { "name": "Standard", "price": 60 }
        ],
        "ticket_price": "60",
        "created_at": "2025-12-01T00:00:00Z"
    }]))
}

async fn insert_ticket(Json(body): Json<Vec<Value>>) -> (StatusCode, Json<Value>) {
    let mut row = body.into_iter().next().unwrap_or(Value::Null);
    if row["payment_reference"] == json!("FAIL") {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "database is read-only" })),
        );
    }
    row["id"] = json!(11);
    (StatusCode::CREATED, Json(json!([row])))
}

async fn token(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != json!("secret") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error_description": "Invalid login credentials" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": "jwt-abc",
            "user": { "id": ORGANIZER, "email": body["email"] }
        })),
    )
}

async fn signup(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "user": { "id": ORGANIZER, "email": body["email"] } }))
}

async fn record_auth(state: &BackendState, headers: &HeaderMap) {
    let value = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().await.push(value);
}

async fn spawn_backend() -> Result<(String, BackendState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = BackendState::default();
    let app = Router::new()
        .route("/rest/v1/events", post(insert_event).get(select_events))
        .route("/rest/v1/tickets", post(insert_ticket))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn organizer_id() -> UserId {
    UserId(ORGANIZER.parse().expect("uuid"))
}

#[tokio::test]
async fn insert_event_posts_row_and_normalizes_response() -> Result<()> {
    let (url, state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;

    let event = backend
        .insert_event(&NewEvent {
            title: "Harbour Fest".to_string(),
            date: "2026-04-01T18:00:00Z".parse()?,
            location: "Jamestown".to_string(),
            description: String::new(),
            organizer_id: organizer_id(),
            ticket_tiers: vec![TicketTier {
                name: "VIP".to_string(),
                price: 150.0,
                features: vec!["Skip line".to_string()],
            }],
            ticket_price: 150.0,
        })
        .await?;

    assert_eq!(event.id, EventId(7));
    assert_eq!(event.min_price, Some(150.0));
    assert_eq!(event.ticket_tiers[0].name, "VIP");

    let inserted = state.inserted_events.lock().await;
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["ticket_price"], json!(150.0));
    assert_eq!(inserted[0]["organizer_id"], json!(ORGANIZER));
    assert_eq!(
        state.authorizations.lock().await.as_slice(),
        ["Bearer anon-key".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn organizer_listing_filters_and_folds_legacy_rows() -> Result<()> {
    let (url, state) = spawn_backend().await?;
    let backend = HttpBackend::new(&format!("{url}/"), "anon-key")?;

    let events = backend.list_events_for_organizer(organizer_id()).await?;

    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.ticket_tiers[0].name, "Gold");
    assert_eq!(event.ticket_tiers[0].price, 120.0);
    assert_eq!(event.ticket_tiers[1].name, "Standard");
    assert_eq!(event.min_price, Some(60.0));
    assert_eq!(event.description, "");

    let queries = state.event_queries.lock().await;
    assert_eq!(
        queries[0].get("organizer_id").map(String::as_str),
        Some(format!("eq.{ORGANIZER}").as_str())
    );
    assert_eq!(
        queries[0].get("order").map(String::as_str),
        Some("created_at.desc")
    );
    Ok(())
}

#[tokio::test]
async fn get_event_returns_none_for_empty_result() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;

    assert!(backend.get_event(EventId(404)).await?.is_none());
    assert!(backend.get_event(EventId(3)).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn sign_in_uses_access_token_for_later_requests() -> Result<()> {
    let (url, state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;

    let session = backend.sign_in("host@example.com", "secret").await?;
    assert_eq!(session.user_id, organizer_id());
    assert_eq!(session.access_token.as_deref(), Some("jwt-abc"));
    assert_eq!(backend.current_session().await?, Some(session));

    backend.get_event(EventId(3)).await?;
    assert_eq!(
        state.authorizations.lock().await.last().map(String::as_str),
        Some("Bearer jwt-abc")
    );
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_carry_backend_message() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;

    let err = backend
        .sign_in("host@example.com", "wrong")
        .await
        .expect_err("rejected");
    let api = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(api.code, ErrorCode::Validation);
    assert_eq!(api.message, "Invalid login credentials");
    assert!(backend.current_session().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn sign_up_without_session_is_pending_confirmation() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;

    let outcome = backend.sign_up("new@example.com", "longenough").await?;
    assert_eq!(outcome, SignUpOutcome::PendingConfirmation);
    Ok(())
}

#[tokio::test]
async fn ticket_insert_round_trips_and_maps_outage() -> Result<()> {
    let (url, _state) = spawn_backend().await?;
    let backend = HttpBackend::new(&url, "anon-key")?;
    let mut ticket = NewTicket {
        event_title: "Harbour Fest".to_string(),
        ticket_type: "VIP".to_string(),
        price: 155,
        customer_name: "Ama Mensah".to_string(),
        customer_email: "ama@example.com".to_string(),
        customer_phone: "+233200000000".to_string(),
        payment_reference: "T123".to_string(),
        status: TicketStatus::Paid,
    };

    let paid = backend.insert_ticket(&ticket).await?;
    assert_eq!(paid.id.0, 11);
    assert_eq!(paid.price, 155);
    assert_eq!(paid.status, TicketStatus::Paid);

    ticket.payment_reference = "FAIL".to_string();
    let err = backend.insert_ticket(&ticket).await.expect_err("outage");
    let api = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(api.code, ErrorCode::StoreUnavailable);
    assert_eq!(api.message, "database is read-only");
    Ok(())
}
