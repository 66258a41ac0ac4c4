//! club-tail: follow a live list from the terminal.
//!
//! Prints every record of the chosen scope as it becomes visible, and can
//! post a message or register for an event once the list is live.

use std::collections::HashSet;
use std::sync::Arc;

use clap::Parser;
use club_client::{ClientConfig, HttpGateway, LiveList, LiveStatus, RemoteGateway};
use club_engine::{
    ChatMessage, ClubEvent, LiveRecord, ReactionPolicy, Registration, RegistrationStatus,
    ScopeKey, Table,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "club-tail", version, about = "Follow a live list of the startup club app")]
struct Args {
    /// Scope to follow: room:<id>, month:YYYY-MM or event:<id>
    scope: ScopeKey,

    /// Base URL of club-server (overrides CLUB_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Profile token to act as (overrides CLUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Post this message once the room is live
    #[arg(long)]
    say: Option<String>,

    /// Register for the followed event once the list is live
    #[arg(long, conflicts_with = "cancel")]
    register: bool,

    /// Cancel the registration for the followed event
    #[arg(long)]
    cancel: bool,

    /// Apply updates and deletes as well as inserts
    #[arg(long)]
    all_changes: bool,
}

/// One-line terminal rendering of a record.
trait Line {
    fn line(&self) -> String;
}

impl Line for ChatMessage {
    fn line(&self) -> String {
        let who = self
            .sender
            .as_ref()
            .map_or(self.sender_id.as_str(), |s| s.display_name.as_str());
        format!("[{}] {}: {}", timestamp(self.created_at), who, self.content)
    }
}

impl Line for ClubEvent {
    fn line(&self) -> String {
        let mut line = format!("{} {}", timestamp(self.starts_at), self.title);
        if let Some(location) = &self.location {
            line.push_str(&format!(" @ {location}"));
        }
        if let Some(capacity) = self.capacity {
            line.push_str(&format!(" ({capacity} seats)"));
        }
        line
    }
}

impl Line for Registration {
    fn line(&self) -> String {
        let who = self
            .attendee
            .as_ref()
            .map_or(self.profile_id.as_str(), |a| a.display_name.as_str());
        match self.status {
            RegistrationStatus::Registered => format!("{who} registered"),
            RegistrationStatus::Waitlisted => format!("{who} is on the waitlist"),
        }
    }
}

fn timestamp(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "club_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.api_url {
        Some(url) => ClientConfig::new(url.clone())?,
        None => ClientConfig::from_env()?,
    };
    if let Some(token) = &args.token {
        config = config.with_token(token.clone());
    }

    let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::new(config)?);
    let policy = if args.all_changes {
        ReactionPolicy::AllChanges
    } else {
        ReactionPolicy::InsertsOnly
    };

    match args.scope.table() {
        Table::ChatMessages => {
            let mut list: LiveList<ChatMessage> =
                LiveList::mount_with_policy(gateway, args.scope.clone(), policy);
            if let Some(text) = &args.say {
                wait_settled(&mut list).await?;
                list.send_message(text).await?;
            }
            follow(list).await
        }
        Table::Events => {
            let list: LiveList<ClubEvent> =
                LiveList::mount_with_policy(gateway, args.scope.clone(), policy);
            follow(list).await
        }
        Table::Registrations => {
            let mut list: LiveList<Registration> =
                LiveList::mount_with_policy(gateway, args.scope.clone(), policy);
            if args.register || args.cancel {
                wait_settled(&mut list).await?;
                if args.register {
                    list.register().await?;
                } else {
                    list.cancel().await?;
                }
            }
            follow(list).await
        }
    }
}

async fn wait_settled<R: LiveRecord>(list: &mut LiveList<R>) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = list.wait_until(|s| s.status.is_settled()).await?;
    if let LiveStatus::LoadFailed(reason) = snapshot.status {
        return Err(format!("could not load {}: {}", snapshot.scope, reason).into());
    }
    Ok(())
}

/// Print newly visible records until interrupted.
async fn follow<R: LiveRecord + Line>(mut list: LiveList<R>) -> Result<(), Box<dyn std::error::Error>> {
    let mut printed: HashSet<String> = HashSet::new();
    let mut last_status = LiveStatus::Loading;

    loop {
        let snapshot = tokio::select! {
            snapshot = list.changed() => match snapshot {
                Ok(snapshot) => snapshot,
                Err(_) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        for record in snapshot.collection.iter() {
            if printed.insert(record.id().clone()) {
                println!("{}", record.line());
            }
        }
        // Forget ids that were removed so a re-insert prints again
        printed.retain(|id| snapshot.collection.contains(id));

        if snapshot.status != last_status {
            match &snapshot.status {
                LiveStatus::LoadFailed(_) | LiveStatus::ConnectivityWarning(_) => {
                    eprintln!("{}: {}", snapshot.scope, snapshot.status)
                }
                status => tracing::info!(scope = %snapshot.scope, %status, "Status changed"),
            }
            last_status = snapshot.status;
        }
    }

    list.close().await;
    Ok(())
}
