use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use shared::{
    domain::{EventId, PaidTicket, TicketId, TicketStatus, UserId},
    protocol::{EventRow, NewEvent, NewTicket, StoredTier},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

pub const MEMORY_URL: &str = "sqlite::memory:";

/// Local event/ticket store backed by sqlite. Used for offline mode and as
/// the reference implementation of the hosted backend's two collections.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if database_url.starts_with(MEMORY_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_event(&self, event: &NewEvent) -> Result<EventRow> {
        let tiers_json = serde_json::to_string(&event.ticket_tiers)
            .context("failed to encode ticket tiers")?;
        let row = sqlx::query(
            r#"
            INSERT INTO events (
                title, date, location, description, organizer_id,
                ticket_tiers, ticket_price, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id, title, date, location, description, organizer_id,
                      ticket_tiers, ticket_price, created_at
            "#,
        )
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.organizer_id.0.to_string())
        .bind(tiers_json)
        .bind(event.ticket_price)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert event")?;

        let stored = event_row(&row)?;
        debug!(event_id = stored.id.0, "storage: inserted event");
        Ok(stored)
    }

    /// Newest first; ties on `created_at` fall back to insertion order.
    pub async fn list_events_for_organizer(&self, organizer_id: UserId) -> Result<Vec<EventRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, date, location, description, organizer_id,
                   ticket_tiers, ticket_price, created_at
            FROM events
            WHERE organizer_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(organizer_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .context("failed to list organizer events")?;

        rows.iter().map(event_row).collect()
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Option<EventRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, date, location, description, organizer_id,
                   ticket_tiers, ticket_price, created_at
            FROM events
            WHERE id = ?1
            "#,
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load event {}", event_id.0))?;

        row.as_ref().map(event_row).transpose()
    }

    pub async fn insert_ticket(&self, ticket: &NewTicket) -> Result<PaidTicket> {
        let row = sqlx::query(
            r#"
            INSERT INTO tickets (
                event_title, ticket_type, price, customer_name, customer_email,
                customer_phone, payment_reference, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING id, event_title, ticket_type, price, customer_name,
                      customer_email, customer_phone, payment_reference, status,
                      created_at
            "#,
        )
        .bind(&ticket.event_title)
        .bind(&ticket.ticket_type)
        .bind(ticket.price)
        .bind(&ticket.customer_name)
        .bind(&ticket.customer_email)
        .bind(&ticket.customer_phone)
        .bind(&ticket.payment_reference)
        .bind(ticket.status.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert ticket")?;

        paid_ticket(&row)
    }

    pub async fn tickets_by_reference(&self, payment_reference: &str) -> Result<Vec<PaidTicket>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_title, ticket_type, price, customer_name,
                   customer_email, customer_phone, payment_reference, status,
                   created_at
            FROM tickets
            WHERE payment_reference = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(payment_reference)
        .fetch_all(&self.pool)
        .await
        .context("failed to look up tickets by payment reference")?;

        rows.iter().map(paid_ticket).collect()
    }
}

fn event_row(row: &SqliteRow) -> Result<EventRow> {
    let organizer_id = row
        .try_get::<Option<String>, _>("organizer_id")?
        .map(|raw| {
            Uuid::parse_str(&raw)
                .map(UserId)
                .with_context(|| format!("invalid organizer id '{raw}'"))
        })
        .transpose()?;

    let ticket_tiers = row
        .try_get::<Option<String>, _>("ticket_tiers")?
        .map(|raw| {
            serde_json::from_str::<Vec<StoredTier>>(&raw).context("invalid ticket tiers column")
        })
        .transpose()?;

    Ok(EventRow {
        id: EventId(row.try_get::<i64, _>("id")?),
        title: row.try_get("title")?,
        date: row.try_get::<Option<DateTime<Utc>>, _>("date")?,
        location: row.try_get("location")?,
        description: row.try_get("description")?,
        organizer_id,
        ticket_tiers,
        ticket_price: row.try_get("ticket_price")?,
        created_at: Some(row.try_get::<DateTime<Utc>, _>("created_at")?),
    })
}

fn paid_ticket(row: &SqliteRow) -> Result<PaidTicket> {
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "paid" => TicketStatus::Paid,
        other => return Err(anyhow!("unknown ticket status '{other}'")),
    };

    Ok(PaidTicket {
        id: TicketId(row.try_get::<i64, _>("id")?),
        event_title: row.try_get("event_title")?,
        ticket_type: row.try_get("ticket_type")?,
        price: row.try_get("price")?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        customer_phone: row.try_get("customer_phone")?,
        payment_reference: row.try_get("payment_reference")?,
        status,
        created_at: Some(row.try_get::<DateTime<Utc>, _>("created_at")?),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
