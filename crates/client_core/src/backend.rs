//! REST adapter for the hosted backend: PostgREST-style table endpoints for
//! events and tickets, GoTrue-style endpoints for auth.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared::{
    domain::{Event, EventId, PaidTicket, UserId},
    error::{ApiException, ErrorCode},
    protocol::{EventRow, NewEvent, NewTicket},
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::{
    session::{AuthService, Session, SignUpOutcome},
    EventStore,
};

const EVENTS_TABLE: &str = "rest/v1/events";
const TICKETS_TABLE: &str = "rest/v1/tickets";
const TOKEN_ROUTE: &str = "auth/v1/token";
const SIGNUP_ROUTE: &str = "auth/v1/signup";
const LOGOUT_ROUTE: &str = "auth/v1/logout";

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: uuid::Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// Sign-up answers with a full session when confirmation is disabled and
/// with just the user otherwise.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct BackendErrorBody {
    #[serde(default, alias = "msg", alias = "error_description")]
    message: Option<String>,
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
}

impl HttpBackend {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid backend url '{base_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            anon_key: anon_key.into(),
            session: RwLock::new(None),
        })
    }

    /// Reuses a session restored from the persisted flag.
    pub async fn adopt_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    fn endpoint(&self, route: &str) -> Result<Url> {
        self.base_url
            .join(route)
            .with_context(|| format!("invalid backend route '{route}'"))
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .session
            .read()
            .await
            .as_ref()
            .and_then(|session| session.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn insert_row<B, T>(&self, table: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .http
            .post(self.endpoint(table)?)
            .header("Prefer", "return=representation")
            .json(&[body]);
        let response = self.authorized(request).await.send().await?;
        let mut rows: Vec<T> = decode(response).await?;
        if rows.is_empty() {
            return Err(anyhow!("backend returned no row for insert into {table}"));
        }
        Ok(rows.remove(0))
    }

    async fn select_events(&self, filters: &[(&str, String)]) -> Result<Vec<EventRow>> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());
        let request = self.http.get(self.endpoint(EVENTS_TABLE)?).query(&query);
        let response = self.authorized(request).await.send().await?;
        decode(response).await
    }

    fn session_from(access_token: String, user: AuthUser, fallback_email: &str) -> Session {
        Session {
            user_id: UserId(user.id),
            email: user.email.unwrap_or_else(|| fallback_email.to_string()),
            access_token: Some(access_token),
            guest: false,
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("failed to decode backend response");
    }

    let code = match status.as_u16() {
        400 | 422 => ErrorCode::Validation,
        401 | 403 => ErrorCode::Unauthorized,
        404 => ErrorCode::NotFound,
        _ => ErrorCode::StoreUnavailable,
    };
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<BackendErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.message)
        .unwrap_or_else(|| format!("backend returned {status}"));
    Err(ApiException::new(code, message).into())
}

#[async_trait]
impl EventStore for HttpBackend {
    async fn insert_event(&self, event: &NewEvent) -> Result<Event> {
        let row: EventRow = self.insert_row(EVENTS_TABLE, event).await?;
        Ok(row.into_event())
    }

    async fn list_events_for_organizer(&self, organizer_id: UserId) -> Result<Vec<Event>> {
        let rows = self
            .select_events(&[
                ("organizer_id", format!("eq.{organizer_id}")),
                ("order", "created_at.desc".to_string()),
            ])
            .await?;
        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let rows = self
            .select_events(&[("id", format!("eq.{event_id}"))])
            .await?;
        Ok(rows.into_iter().next().map(EventRow::into_event))
    }

    async fn insert_ticket(&self, ticket: &NewTicket) -> Result<PaidTicket> {
        self.insert_row(TICKETS_TABLE, ticket).await
    }
}

#[async_trait]
impl AuthService for HttpBackend {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.session.read().await.clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .http
            .post(self.endpoint(TOKEN_ROUTE)?)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password });
        let token: TokenResponse = decode(request.send().await?).await?;
        let session = Self::session_from(token.access_token, token.user, email);
        *self.session.write().await = Some(session.clone());
        info!(user_id = %session.user_id, "backend: password sign-in succeeded");
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let request = self
            .http
            .post(self.endpoint(SIGNUP_ROUTE)?)
            .header("apikey", &self.anon_key)
            .json(&Credentials { email, password });
        let response: SignUpResponse = decode(request.send().await?).await?;
        match (response.access_token, response.user) {
            (Some(access_token), Some(user)) => {
                let session = Self::session_from(access_token, user, email);
                *self.session.write().await = Some(session.clone());
                Ok(SignUpOutcome::Session(session))
            }
            _ => Ok(SignUpOutcome::PendingConfirmation),
        }
    }

    async fn sign_out(&self) -> Result<()> {
        let previous = self.session.write().await.take();
        let Some(token) = previous.and_then(|session| session.access_token) else {
            return Ok(());
        };
        let response = self
            .http
            .post(self.endpoint(LOGOUT_ROUTE)?)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "backend: logout rejected");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
