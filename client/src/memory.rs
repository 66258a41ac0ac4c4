//! In-memory gateway.
//!
//! Holds rows in process, routes change events to open channels and lets
//! tests script failures and the resolution order of enrichment fetches.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    ChannelHandle, ChannelSignal, Mutation, MutationReceipt, RemoteGateway, Subscription,
};
use async_trait::async_trait;
use club_engine::{
    ChangeEvent, ChatMessage, ClubEvent, LiveRecord, ProfileId, ProfileSummary,
    RecordId, Registration, RegistrationStatus, ScopeKey, Table,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot, Mutex};

#[derive(Debug, Clone)]
struct StoredRow {
    id: RecordId,
    scope: Option<ScopeKey>,
    value: Value,
}

#[derive(Debug)]
struct OpenChannel {
    scope: ScopeKey,
    sender: mpsc::UnboundedSender<ChannelSignal>,
}

struct PendingGate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Holds back the enrichment fetch of one record until released.
pub struct Gate {
    entered: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl Gate {
    /// Wait until a fetch is blocked on this gate.
    pub async fn entered(&mut self) {
        let _ = (&mut self.entered).await;
    }

    /// Let the held fetch proceed.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// Gateway backed by process memory.
pub struct MemoryGateway {
    rows: Mutex<HashMap<Table, Vec<StoredRow>>>,
    profiles: Mutex<HashMap<ProfileId, ProfileSummary>>,
    channels: Mutex<HashMap<String, OpenChannel>>,
    gates: Mutex<HashMap<RecordId, PendingGate>>,
    fetch_failures: Mutex<VecDeque<String>>,
    enrich_failures: Mutex<HashSet<RecordId>>,
    mutation_failures: Mutex<VecDeque<String>>,
    acting_profile: ProfileId,
    auto_ack: bool,
    next_id: AtomicU64,
    pub fetch_calls: AtomicU64,
    pub enrich_calls: AtomicU64,
    pub subscribe_calls: AtomicU64,
    pub unsubscribe_calls: AtomicU64,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            fetch_failures: Mutex::new(VecDeque::new()),
            enrich_failures: Mutex::new(HashSet::new()),
            mutation_failures: Mutex::new(VecDeque::new()),
            acting_profile: "member-1".to_string(),
            auto_ack: true,
            next_id: AtomicU64::new(1),
            fetch_calls: AtomicU64::new(0),
            enrich_calls: AtomicU64::new(0),
            subscribe_calls: AtomicU64::new(0),
            unsubscribe_calls: AtomicU64::new(0),
        }
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform mutations as `profile_id`.
    pub fn acting_as(mut self, profile_id: impl Into<ProfileId>) -> Self {
        self.acting_profile = profile_id.into();
        self
    }

    /// Leave new channels in `Opening` until [`acknowledge_all`] is called.
    ///
    /// [`acknowledge_all`]: MemoryGateway::acknowledge_all
    pub fn without_auto_ack(mut self) -> Self {
        self.auto_ack = false;
        self
    }

    pub async fn add_profile(&self, profile_id: impl Into<ProfileId>, summary: ProfileSummary) {
        self.profiles.lock().await.insert(profile_id.into(), summary);
    }

    /// Store a record without announcing it.
    pub async fn seed<R: LiveRecord>(&self, record: R) {
        let row = match serde_json::to_value(&record) {
            Ok(value) => StoredRow {
                id: record.id().clone(),
                scope: record.home_scope(),
                value,
            },
            Err(err) => {
                tracing::warn!(error = %err, "Could not serialize seeded record");
                return;
            }
        };

        let mut rows = self.rows.lock().await;
        let table = rows.entry(R::TABLE).or_default();
        table.retain(|r| r.id != row.id);
        table.push(row);
    }

    /// Store a record and emit an insert event for it.
    pub async fn insert<R: LiveRecord>(&self, record: R) -> Option<ChangeEvent> {
        let event = record
            .home_scope()
            .map(|scope| ChangeEvent::insert(R::TABLE, record.id().clone(), scope));
        self.seed(record).await;
        if let Some(event) = &event {
            self.emit(event.clone()).await;
        }
        event
    }

    /// Replace a stored record in place and emit an update event for it.
    ///
    /// Returns `None` when no row with the record's id exists.
    pub async fn update<R: LiveRecord>(&self, record: R) -> Option<ChangeEvent> {
        let value = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "Could not serialize updated record");
                return None;
            }
        };

        let scope = {
            let mut rows = self.rows.lock().await;
            let row = rows
                .get_mut(&R::TABLE)?
                .iter_mut()
                .find(|r| r.id == *record.id())?;
            row.value = value;
            row.scope = record.home_scope();
            row.scope.clone()?
        };

        let event = ChangeEvent::update(R::TABLE, record.id().clone(), scope);
        self.emit(event.clone()).await;
        Some(event)
    }

    /// Remove a row and emit a delete event for it.
    pub async fn remove(&self, table: Table, id: &str) -> Option<ChangeEvent> {
        let removed = {
            let mut rows = self.rows.lock().await;
            let table_rows = rows.entry(table).or_default();
            let pos = table_rows.iter().position(|r| r.id == id)?;
            table_rows.remove(pos)
        };

        let event = ChangeEvent::delete(table, removed.id, removed.scope?);
        self.emit(event.clone()).await;
        Some(event)
    }

    /// Deliver `event` to every open channel of its scope.
    ///
    /// Returns the number of channels reached.
    pub async fn emit(&self, event: ChangeEvent) -> usize {
        let channels = self.channels.lock().await;
        channels
            .values()
            .filter(|c| c.scope == event.scope)
            .filter(|c| c.sender.send(ChannelSignal::Change(event.clone())).is_ok())
            .count()
    }

    /// Acknowledge every open channel.
    pub async fn acknowledge_all(&self) {
        for channel in self.channels.lock().await.values() {
            let _ = channel.sender.send(ChannelSignal::Acknowledged);
        }
    }

    /// Report a transport error on every open channel.
    pub async fn break_channels(&self, reason: &str) {
        for channel in self.channels.lock().await.values() {
            let _ = channel
                .sender
                .send(ChannelSignal::TransportError(reason.to_string()));
        }
    }

    /// Drop every open channel without a word, as a lost connection does.
    pub async fn drop_channels(&self) {
        self.channels.lock().await.clear();
    }

    /// Close every open channel from the server side.
    pub async fn close_channels(&self) {
        for (_, channel) in self.channels.lock().await.drain() {
            let _ = channel.sender.send(ChannelSignal::Closed);
        }
    }

    pub async fn open_channels(&self) -> usize {
        self.channels.lock().await.len()
    }

    pub async fn row_count(&self, table: Table) -> usize {
        self.rows.lock().await.get(&table).map_or(0, Vec::len)
    }

    /// Fail the next collection fetch with `reason`.
    pub async fn fail_next_fetch(&self, reason: &str) {
        self.fetch_failures.lock().await.push_back(reason.to_string());
    }

    /// Fail every enrichment fetch of `id`.
    pub async fn fail_enrichment(&self, id: &str) {
        self.enrich_failures.lock().await.insert(id.to_string());
    }

    /// Fail the next mutation with `reason`.
    pub async fn fail_next_mutation(&self, reason: &str) {
        self.mutation_failures
            .lock()
            .await
            .push_back(reason.to_string());
    }

    /// Hold the next enrichment fetch of `id` until the gate is released.
    pub async fn hold(&self, id: &str) -> Gate {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.gates.lock().await.insert(
            id.to_string(),
            PendingGate {
                entered: entered_tx,
                release: release_rx,
            },
        );
        Gate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    async fn find<R: LiveRecord>(&self, id: &str) -> Option<R> {
        let rows = self.rows.lock().await;
        let row = rows.get(&R::TABLE)?.iter().find(|r| r.id == id)?;
        serde_json::from_value(row.value.clone()).ok()
    }

    async fn registrations_for(&self, event_id: &str) -> Vec<Registration> {
        let rows = self.rows.lock().await;
        rows.get(&Table::Registrations)
            .into_iter()
            .flatten()
            .filter_map(|r| serde_json::from_value::<Registration>(r.value.clone()).ok())
            .filter(|r| r.event_id == event_id)
            .collect()
    }

    async fn acting_summary(&self) -> Option<ProfileSummary> {
        self.profiles.lock().await.get(&self.acting_profile).cloned()
    }

    async fn send_message(&self, room_id: String, content: String) -> GatewayResult<RecordId> {
        let mut message = ChatMessage::new(
            self.next_id("msg"),
            room_id,
            self.acting_profile.clone(),
            content,
            chrono::Utc::now().timestamp_millis(),
        );
        message.sender = self.acting_summary().await;

        let id = message.id.clone();
        self.insert(message).await;
        Ok(id)
    }

    async fn register(&self, event_id: String) -> GatewayResult<RecordId> {
        let event: ClubEvent = self
            .find::<ClubEvent>(&event_id)
            .await
            .ok_or_else(|| not_found(format!("event {event_id} not found")))?;

        let existing = self.registrations_for(&event_id).await;
        if existing.iter().any(|r| r.profile_id == self.acting_profile) {
            return Err(GatewayError::Status {
                status: 409,
                message: "already registered".to_string(),
            });
        }

        let mut registration = Registration::new(
            self.next_id("reg"),
            event_id,
            self.acting_profile.clone(),
            chrono::Utc::now().timestamp_millis(),
        );
        let taken = existing
            .iter()
            .filter(|r| r.status == RegistrationStatus::Registered)
            .count();
        if event.capacity.is_some_and(|cap| taken >= cap as usize) {
            registration.status = RegistrationStatus::Waitlisted;
        }
        registration.attendee = self.acting_summary().await;

        let id = registration.id.clone();
        self.insert(registration).await;
        Ok(id)
    }

    async fn cancel(&self, event_id: String) -> GatewayResult<RecordId> {
        let registration = self
            .registrations_for(&event_id)
            .await
            .into_iter()
            .find(|r| r.profile_id == self.acting_profile)
            .ok_or_else(|| not_found("not registered for this event".to_string()))?;

        self.remove(Table::Registrations, &registration.id).await;
        if registration.status == RegistrationStatus::Registered {
            self.promote_next(&event_id).await;
        }
        Ok(registration.id)
    }

    /// Move the longest-waiting member into a free seat, if there is one.
    async fn promote_next(&self, event_id: &str) {
        let Some(capacity) = self
            .find::<ClubEvent>(event_id)
            .await
            .and_then(|event| event.capacity)
        else {
            return;
        };

        let registrations = self.registrations_for(event_id).await;
        let taken = registrations
            .iter()
            .filter(|r| r.status == RegistrationStatus::Registered)
            .count();
        if taken >= capacity as usize {
            return;
        }

        let next = registrations
            .into_iter()
            .filter(|r| r.status == RegistrationStatus::Waitlisted)
            .min_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        if let Some(mut promoted) = next {
            promoted.status = RegistrationStatus::Registered;
            self.update(promoted).await;
        }
    }
}

fn not_found(message: String) -> GatewayError {
    GatewayError::Status {
        status: 404,
        message,
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn fetch_collection(&self, scope: &ScopeKey) -> GatewayResult<Vec<Value>> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(reason) = self.fetch_failures.lock().await.pop_front() {
            return Err(GatewayError::Status {
                status: 503,
                message: reason,
            });
        }

        let rows = self.rows.lock().await;
        Ok(rows
            .get(&scope.table())
            .into_iter()
            .flatten()
            .filter(|r| r.scope.as_ref() == Some(scope))
            .map(|r| r.value.clone())
            .collect())
    }

    async fn fetch_by_id(&self, table: Table, id: &str) -> GatewayResult<Option<Value>> {
        self.enrich_calls.fetch_add(1, Ordering::Relaxed);

        let gate = self.gates.lock().await.remove(id);
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.await;
        }

        if self.enrich_failures.lock().await.contains(id) {
            return Err(GatewayError::Status {
                status: 500,
                message: format!("could not fetch {id}"),
            });
        }

        let rows = self.rows.lock().await;
        Ok(rows
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .map(|r| r.value.clone()))
    }

    async fn mutate(&self, mutation: Mutation) -> GatewayResult<MutationReceipt> {
        if let Some(reason) = self.mutation_failures.lock().await.pop_front() {
            return Err(GatewayError::Status {
                status: 500,
                message: reason,
            });
        }

        let record_id = match mutation {
            Mutation::SendMessage { room_id, content } => {
                self.send_message(room_id, content).await?
            }
            Mutation::Register { event_id } => self.register(event_id).await?,
            Mutation::CancelRegistration { event_id } => self.cancel(event_id).await?,
        };
        Ok(MutationReceipt { record_id })
    }

    async fn subscribe(&self, scope: &ScopeKey) -> GatewayResult<Subscription> {
        self.subscribe_calls.fetch_add(1, Ordering::Relaxed);

        let (sender, signals) = mpsc::unbounded_channel();
        if self.auto_ack {
            let _ = sender.send(ChannelSignal::Acknowledged);
        }

        let handle = ChannelHandle {
            id: self.next_id("chan"),
            scope: scope.clone(),
        };
        self.channels.lock().await.insert(
            handle.id.clone(),
            OpenChannel {
                scope: scope.clone(),
                sender,
            },
        );

        Ok(Subscription { handle, signals })
    }

    async fn unsubscribe(&self, handle: &ChannelHandle) -> GatewayResult<()> {
        self.unsubscribe_calls.fetch_add(1, Ordering::Relaxed);
        self.channels.lock().await.remove(&handle.id);
        Ok(())
    }
}
