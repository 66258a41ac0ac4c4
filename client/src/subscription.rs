//! Subscription manager: the driver task behind every live list.
//!
//! The manager owns the list's [`LiveView`] and is its only writer. It loads
//! the snapshot, opens one channel for the scope and reacts to change events
//! by fetching the enriched record and reconciling it. Enrichment fetches run
//! as separate tasks and report back with the epoch they were issued under;
//! results are applied in the order they resolve.

use crate::error::{ClientError, Result};
use crate::gateway::{ChannelHandle, ChannelSignal, RemoteGateway};
use crate::live::{LiveSnapshot, LiveStatus};
use crate::loader::SnapshotLoader;
use club_engine::{
    decode_row, Applied, Change, ChangeEvent, ChangeOp, LiveRecord, LiveView, ReactionPolicy,
    ScopeEpoch, ScopeKey,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Requests from a [`LiveList`](crate::LiveList) to its driver.
#[derive(Debug)]
pub(crate) enum Command {
    SetScope(ScopeKey),
    Reload,
    Close(Option<oneshot::Sender<()>>),
}

/// Outcome of one enrichment fetch.
struct Enriched<R> {
    epoch: ScopeEpoch,
    event: ChangeEvent,
    result: Result<Option<R>>,
}

pub(crate) struct SubscriptionManager<R: LiveRecord> {
    gateway: Arc<dyn RemoteGateway>,
    loader: SnapshotLoader,
    view: LiveView<R>,
    status: LiveStatus,
    channel: Option<ChannelHandle>,
    signals: Option<mpsc::UnboundedReceiver<ChannelSignal>>,
    enriched_tx: mpsc::UnboundedSender<Enriched<R>>,
    enriched_rx: mpsc::UnboundedReceiver<Enriched<R>>,
    publisher: watch::Sender<LiveSnapshot<R>>,
}

impl<R: LiveRecord> SubscriptionManager<R> {
    pub(crate) fn new(
        gateway: Arc<dyn RemoteGateway>,
        scope: ScopeKey,
        policy: ReactionPolicy,
        publisher: watch::Sender<LiveSnapshot<R>>,
    ) -> Self {
        let (enriched_tx, enriched_rx) = mpsc::unbounded_channel();
        Self {
            loader: SnapshotLoader::new(gateway.clone()),
            gateway,
            view: LiveView::new(scope, policy),
            status: LiveStatus::Loading,
            channel: None,
            signals: None,
            enriched_tx,
            enriched_rx,
            publisher,
        }
    }

    /// Drive the list until it is closed or its handle is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.mount().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::SetScope(scope)) => self.retarget(scope).await,
                    Some(Command::Reload) => self.reload().await,
                    Some(Command::Close(done)) => {
                        self.close().await;
                        if let Some(done) = done {
                            let _ = done.send(());
                        }
                        break;
                    }
                    None => {
                        self.close().await;
                        break;
                    }
                },
                signal = next_signal(&mut self.signals) => match signal {
                    Some(signal) => self.on_signal(signal),
                    None => self.on_channel_lost(),
                },
                Some(enriched) = self.enriched_rx.recv() => self.on_enriched(enriched),
            }
        }
    }

    async fn mount(&mut self) {
        self.set_status(LiveStatus::Loading);
        if !self.load().await {
            return;
        }
        self.open().await;
        if self.status == LiveStatus::Loading {
            self.set_status(LiveStatus::Live);
        }
    }

    /// Replace the collection with a fresh snapshot. Returns whether it loaded.
    ///
    /// On failure the collection is emptied and the status says why.
    async fn load(&mut self) -> bool {
        let scope = self.view.scope().clone();
        let epoch = self.view.epoch();

        match self.loader.fetch_records::<R>(&scope).await {
            Ok(records) => {
                self.view.load_snapshot(epoch, records);
                true
            }
            Err(err) => {
                tracing::warn!(scope = %scope, error = %err, "Snapshot load failed");
                self.view.load_snapshot(epoch, Vec::new());
                self.set_status(LiveStatus::LoadFailed(err.to_string()));
                false
            }
        }
    }

    async fn open(&mut self) {
        let scope = self.view.scope().clone();
        if !scope.is_valid() {
            return;
        }
        if let Err(err) = self.view.begin_open() {
            tracing::debug!(scope = %scope, error = %err, "Channel not opened");
            return;
        }

        match self.gateway.subscribe(&scope).await {
            Ok(subscription) => {
                tracing::info!(
                    scope = %scope,
                    channel_id = %subscription.handle.id,
                    "Channel opening"
                );
                self.channel = Some(subscription.handle);
                self.signals = Some(subscription.signals);
            }
            Err(err) => {
                let err = ClientError::SubscriptionFailed {
                    scope,
                    reason: err.to_string(),
                };
                tracing::warn!(error = %err, "Could not open channel");
                self.set_status(LiveStatus::ConnectivityWarning(err.to_string()));
            }
        }
    }

    /// Close the channel if one is open. Safe to call repeatedly.
    async fn teardown(&mut self) {
        self.signals = None;
        let Some(handle) = self.channel.take() else {
            return;
        };

        match self.gateway.unsubscribe(&handle).await {
            Ok(()) => tracing::info!(scope = %handle.scope, channel_id = %handle.id, "Channel closed"),
            Err(err) => tracing::warn!(
                scope = %handle.scope,
                channel_id = %handle.id,
                error = %err,
                "Unsubscribe failed"
            ),
        }
    }

    async fn retarget(&mut self, scope: ScopeKey) {
        if scope == *self.view.scope() {
            return;
        }
        self.teardown().await;
        let epoch = self.view.retarget(scope);
        tracing::debug!(scope = %self.view.scope(), epoch = %epoch, "Scope changed");
        self.mount().await;
    }

    async fn reload(&mut self) {
        if self.signals.is_some() {
            self.set_status(LiveStatus::Loading);
            if self.load().await {
                self.set_status(LiveStatus::Live);
            }
            return;
        }

        // No channel is delivering: release the stale one and mount again.
        self.teardown().await;
        let scope = self.view.scope().clone();
        self.view.retarget(scope);
        self.mount().await;
    }

    async fn close(&mut self) {
        self.teardown().await;
        if self.view.close() {
            tracing::debug!(scope = %self.view.scope(), "Live list unmounted");
        }
        self.set_status(LiveStatus::Closed);
    }

    fn on_signal(&mut self, signal: ChannelSignal) {
        match signal {
            ChannelSignal::Acknowledged => match self.view.acknowledge() {
                Ok(()) => tracing::debug!(scope = %self.view.scope(), "Channel subscribed"),
                Err(err) => tracing::debug!(error = %err, "Ignoring acknowledgement"),
            },
            ChannelSignal::Change(event) => self.on_change(event),
            ChannelSignal::TransportError(reason) => {
                tracing::warn!(scope = %self.view.scope(), reason = %reason, "Channel transport error");
                // The handle stays until reload so it can still be unsubscribed.
                self.signals = None;
                self.set_status(LiveStatus::ConnectivityWarning(reason));
            }
            ChannelSignal::Closed => {
                tracing::warn!(scope = %self.view.scope(), "Channel closed by server");
                self.channel = None;
                self.signals = None;
                self.set_status(LiveStatus::ConnectivityWarning(
                    "channel closed by server".to_string(),
                ));
            }
        }
    }

    fn on_channel_lost(&mut self) {
        self.signals = None;
        if self.channel.is_some() {
            tracing::warn!(scope = %self.view.scope(), "Channel signal stream ended");
            self.set_status(LiveStatus::ConnectivityWarning(
                "realtime connection lost".to_string(),
            ));
        }
    }

    fn on_change(&mut self, event: ChangeEvent) {
        if !self.view.wants(&event) {
            tracing::trace!(
                scope = %self.view.scope(),
                operation = %event.operation,
                record_id = %event.record_id,
                "Ignoring change event"
            );
            return;
        }

        match event.operation {
            ChangeOp::Delete => {
                let epoch = self.view.epoch();
                let applied = self.view.apply(epoch, Change::Deleted(event.record_id));
                self.after_apply(applied);
            }
            ChangeOp::Insert | ChangeOp::Update => self.spawn_enrichment(event),
        }
    }

    fn spawn_enrichment(&self, event: ChangeEvent) {
        let gateway = self.gateway.clone();
        let results = self.enriched_tx.clone();
        let epoch = self.view.epoch();

        tokio::spawn(async move {
            let result = fetch_enriched::<R>(gateway.as_ref(), &event).await;
            let _ = results.send(Enriched {
                epoch,
                event,
                result,
            });
        });
    }

    fn on_enriched(&mut self, enriched: Enriched<R>) {
        let Enriched {
            epoch,
            event,
            result,
        } = enriched;

        let record = match result {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(record_id = %event.record_id, "Record gone before enrichment");
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "Dropping change event");
                return;
            }
        };

        let change = match event.operation {
            ChangeOp::Update => Change::Updated(record),
            _ => Change::Inserted(record),
        };
        let applied = self.view.apply(epoch, change);
        self.after_apply(applied);
    }

    fn after_apply(&mut self, applied: Applied) {
        match applied {
            Applied::Merged(outcome) if outcome.changed() => self.publish(),
            Applied::Merged(outcome) => {
                tracing::trace!(?outcome, "Collection unchanged");
            }
            Applied::Stale => tracing::debug!("Discarding result of a previous mount"),
            Applied::OutOfScope => {
                tracing::warn!(scope = %self.view.scope(), "Discarding record from another scope")
            }
        }
    }

    fn set_status(&mut self, status: LiveStatus) {
        self.status = status;
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(LiveSnapshot {
            scope: self.view.scope().clone(),
            collection: self.view.collection().clone(),
            status: self.status.clone(),
        });
    }
}

async fn next_signal(
    signals: &mut Option<mpsc::UnboundedReceiver<ChannelSignal>>,
) -> Option<ChannelSignal> {
    match signals {
        Some(signals) => signals.recv().await,
        None => std::future::pending().await,
    }
}

/// Fetch and decode the enriched row named by `event`.
async fn fetch_enriched<R: LiveRecord>(
    gateway: &dyn RemoteGateway,
    event: &ChangeEvent,
) -> Result<Option<R>> {
    let failed = |reason: String| ClientError::EnrichmentFailed {
        table: event.table,
        record_id: event.record_id.clone(),
        reason,
    };

    let row = gateway
        .fetch_by_id(event.table, &event.record_id)
        .await
        .map_err(|e| failed(e.to_string()))?;

    row.map(decode_row::<R>)
        .transpose()
        .map_err(|e| failed(e.to_string()))
}
