use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    checkout::{select_tier, AMOUNT_TOO_LARGE_MESSAGE},
    config::load_settings,
    dashboard::format_price,
    draft::parse_event_date,
    AuthService, BuyerContact, CheckoutOutcome, DashboardEntry, DraftTierBuffer, EventPageState,
    EventStore, FileSessionFlag, HttpBackend, LocalAuth, PaymentRequest, PaymentWidget,
    SessionManager, Settings, SignUpOutcome, TicketingClient, WidgetResult,
};
use shared::domain::EventId;
use storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    SignInGuest,
    SignUp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    SignOut,
    CreateEvent {
        #[arg(long)]
        title: String,
        /// RFC 3339 or YYYY-MM-DDTHH:MM
        #[arg(long)]
        date: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value = "")]
        description: String,
        /// name:price[:perk, perk, ...]; repeat for more tiers
        #[arg(long = "tier")]
        tiers: Vec<String>,
    },
    ListEvents,
    ShowEvent {
        event_id: i64,
    },
    Checkout {
        event_id: i64,
        /// Tier title as shown on the event page; defaults to General
        #[arg(long)]
        tier: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        /// Reference reported by the payment provider
        #[arg(long, conflicts_with = "cancel")]
        reference: Option<String>,
        #[arg(long)]
        cancel: bool,
    },
}

/// Stands in for the hosted widget: the payment itself happens elsewhere and
/// its outcome is passed on the command line.
struct CommandLineWidget {
    reference: Option<String>,
}

#[async_trait]
impl PaymentWidget for CommandLineWidget {
    async fn collect(&self, request: &PaymentRequest) -> Result<WidgetResult> {
        println!("payment request: {}", serde_json::to_string(request)?);
        Ok(match &self.reference {
            Some(reference) => WidgetResult::Success {
                reference: reference.clone(),
            },
            None => WidgetResult::Cancelled,
        })
    }
}

async fn build_client(
    settings: Settings,
    widget: Arc<dyn PaymentWidget>,
) -> Result<Arc<TicketingClient>> {
    let flag = Arc::new(FileSessionFlag::new(&settings.session_flag_path));

    let hosted = settings
        .backend_url
        .as_deref()
        .filter(|_| settings.uses_hosted_backend());
    let (store, auth, backend) = match hosted {
        Some(url) => {
            let anon_key = settings.backend_anon_key.clone().unwrap_or_default();
            let backend = Arc::new(HttpBackend::new(url, anon_key)?);
            info!(backend = url, "ticketdesk: using hosted backend");
            let store: Arc<dyn EventStore> = backend.clone();
            let auth: Arc<dyn AuthService> = backend.clone();
            (store, auth, Some(backend))
        }
        None => {
            let store: Arc<dyn EventStore> = Arc::new(Storage::new(&settings.database_url).await?);
            let auth: Arc<dyn AuthService> = Arc::new(LocalAuth::new());
            info!(database_url = %settings.database_url, "ticketdesk: using local store");
            (store, auth, None)
        }
    };

    let sessions = Arc::new(SessionManager::new(auth, flag));
    let restored = sessions.restore().await;
    if let Some(backend) = backend {
        backend.adopt_session(restored).await;
    }
    TicketingClient::new_with_dependencies(store, sessions, widget, settings)
}

fn parse_tier_arg(raw: &str) -> DraftTierBuffer {
    let mut parts = raw.splitn(3, ':');
    DraftTierBuffer::new(
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
        parts.next().unwrap_or_default(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();
    let settings = load_settings();

    let reference = match &cli.command {
        Command::Checkout {
            reference, cancel, ..
        } if !cancel => Some(
            reference
                .clone()
                .ok_or_else(|| anyhow!("pass --reference or --cancel"))?,
        ),
        _ => None,
    };
    let client = build_client(settings, Arc::new(CommandLineWidget { reference })).await?;
    let sessions = client.sessions();

    match cli.command {
        Command::SignIn { email, password } => {
            let session = sessions.sign_in(&email, &password).await?;
            println!("signed in as {} ({})", session.email, session.user_id);
        }
        Command::SignInGuest => {
            let session = sessions.sign_in_as_guest()?;
            println!("signed in as guest ({})", session.user_id);
        }
        Command::SignUp { email, password } => match sessions.sign_up(&email, &password).await? {
            SignUpOutcome::Session(session) => {
                println!("account created; signed in as {}", session.email)
            }
            SignUpOutcome::PendingConfirmation => {
                println!("account created; check your email to confirm before signing in")
            }
        },
        Command::SignOut => {
            sessions.sign_out().await;
            println!("signed out");
        }
        Command::CreateEvent {
            title,
            date,
            location,
            description,
            tiers,
        } => {
            let DashboardEntry::Ready(mut dashboard) = client.open_dashboard().await else {
                bail!("sign in first");
            };
            {
                let draft = dashboard.draft_mut();
                draft.title = title;
                draft.date = Some(parse_event_date(&date)?);
                draft.location = location;
                draft.description = description;
            }
            for raw in &tiers {
                *dashboard.tier_buffer_mut() = parse_tier_arg(raw);
                if let Err(rejected) = dashboard.add_tier() {
                    bail!("tier '{raw}': {rejected}");
                }
            }
            let event = dashboard.create_event().await?;
            println!(
                "created event {} ({})",
                event.id,
                client.share_link(event.id)
            );
        }
        Command::ListEvents => {
            let DashboardEntry::Ready(dashboard) = client.open_dashboard().await else {
                bail!("sign in first");
            };
            let summaries = dashboard.summaries();
            if summaries.is_empty() {
                println!("no events yet");
            }
            for summary in summaries {
                println!(
                    "#{} {} | {} | {} | from {} | {}",
                    summary.id,
                    summary.title,
                    summary.date_label,
                    summary.location,
                    summary.price_label,
                    summary.share_link
                );
            }
        }
        Command::ShowEvent { event_id } => match client.open_event(EventId(event_id)).await {
            EventPageState::NotFound => println!("event not found"),
            EventPageState::Loaded(page) => {
                let countdown = page.countdown(Utc::now());
                println!("{} @ {}", page.event.title, page.event.location);
                println!(
                    "starts in {}d {}h {}m {}s",
                    countdown.days, countdown.hours, countdown.minutes, countdown.seconds
                );
                for card in page.ticket_cards() {
                    let marker = if card.popular { " (most popular)" } else { "" };
                    println!("- {} {}{}", card.title, format_price(card.price), marker);
                    for feature in &card.features {
                        println!("    * {feature}");
                    }
                }
            }
        },
        Command::Checkout {
            event_id,
            tier,
            name,
            email,
            phone,
            ..
        } => {
            let EventPageState::Loaded(page) = client.open_event(EventId(event_id)).await else {
                bail!("event {event_id} not found");
            };
            let selection = match tier {
                Some(wanted) => Some(
                    page.ticket_cards()
                        .find(|card| card.title.eq_ignore_ascii_case(&wanted))
                        .map(|card| select_tier(&card))
                        .ok_or_else(|| anyhow!("no tier named '{wanted}'"))?,
                ),
                None => None,
            };
            let mut checkout = client.begin_checkout(&page.event.title, selection);
            let total = checkout
                .total()
                .ok_or_else(|| anyhow!(AMOUNT_TOO_LARGE_MESSAGE))?;
            println!(
                "{} x1: subtotal {} + fee {} = total {}",
                checkout.selection().ticket_type,
                format_price(checkout.selection().price),
                format_price(checkout.fee() as f64),
                format_price(total as f64)
            );
            let contact = BuyerContact { name, email, phone };
            match client.complete_checkout(&mut checkout, &contact).await? {
                CheckoutOutcome::Recorded(ticket) => {
                    println!("ticket {} recorded ({})", ticket.id, ticket.payment_reference)
                }
                CheckoutOutcome::Cancelled => println!("transaction cancelled"),
                CheckoutOutcome::PaidButNotRecorded { reference, message } => {
                    println!("{message} (reference {reference})")
                }
            }
        }
    }

    Ok(())
}
