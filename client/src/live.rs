//! Presentation binding for live collections.

use crate::error::{ClientError, Result};
use crate::gateway::{Mutation, MutationReceipt, RemoteGateway};
use crate::subscription::{Command, SubscriptionManager};
use club_engine::{LiveRecord, OrderedCollection, ReactionPolicy, ScopeKey};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// What a live list is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    /// The snapshot is being fetched
    Loading,
    /// The snapshot is loaded and changes are applied as they arrive
    Live,
    /// The snapshot could not be fetched; call `reload` to try again
    LoadFailed(String),
    /// The realtime channel failed; the collection is kept but may be stale
    ConnectivityWarning(String),
    /// The list was unmounted
    Closed,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live)
    }

    /// Whether the initial load has finished, successfully or not.
    pub fn is_settled(&self) -> bool {
        !matches!(self, LiveStatus::Loading)
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveStatus::Loading => f.write_str("loading"),
            LiveStatus::Live => f.write_str("live"),
            LiveStatus::LoadFailed(reason) => write!(f, "load failed: {reason}"),
            LiveStatus::ConnectivityWarning(reason) => write!(f, "connectivity warning: {reason}"),
            LiveStatus::Closed => f.write_str("closed"),
        }
    }
}

/// One published state of a live list.
#[derive(Debug, Clone)]
pub struct LiveSnapshot<R> {
    pub scope: ScopeKey,
    pub collection: OrderedCollection<R>,
    pub status: LiveStatus,
}

/// A mounted live collection.
///
/// Mounting spawns a driver task that loads the snapshot, opens the realtime
/// channel and applies change events. The list is the only handle to that
/// task: dropping it unmounts.
///
/// Actions never touch the collection. A successful write becomes visible
/// when the subscription delivers it.
pub struct LiveList<R: LiveRecord> {
    gateway: Arc<dyn RemoteGateway>,
    scope: ScopeKey,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<LiveSnapshot<R>>,
}

impl<R: LiveRecord> LiveList<R> {
    /// Mount a list for `scope` that reacts to inserts.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(gateway: Arc<dyn RemoteGateway>, scope: ScopeKey) -> Self {
        Self::mount_with_policy(gateway, scope, ReactionPolicy::default())
    }

    pub fn mount_with_policy(
        gateway: Arc<dyn RemoteGateway>,
        scope: ScopeKey,
        policy: ReactionPolicy,
    ) -> Self {
        let (publisher, snapshots) = watch::channel(LiveSnapshot {
            scope: scope.clone(),
            collection: OrderedCollection::new(),
            status: LiveStatus::Loading,
        });
        let (commands, command_rx) = mpsc::unbounded_channel();

        let manager = SubscriptionManager::new(gateway.clone(), scope.clone(), policy, publisher);
        tokio::spawn(manager.run(command_rx));

        Self {
            gateway,
            scope,
            commands,
            snapshots,
        }
    }

    /// The scope actions are addressed to.
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// The latest published state.
    pub fn snapshot(&self) -> LiveSnapshot<R> {
        self.snapshots.borrow().clone()
    }

    pub fn collection(&self) -> OrderedCollection<R> {
        self.snapshots.borrow().collection.clone()
    }

    pub fn status(&self) -> LiveStatus {
        self.snapshots.borrow().status.clone()
    }

    /// Wait for the next published state.
    ///
    /// Fails with [`ClientError::Closed`] once the list is unmounted.
    pub async fn changed(&mut self) -> Result<LiveSnapshot<R>> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_until(
        &mut self,
        predicate: impl FnMut(&LiveSnapshot<R>) -> bool,
    ) -> Result<LiveSnapshot<R>> {
        let snapshot = self
            .snapshots
            .wait_for(predicate)
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Point the list at another scope.
    ///
    /// The current channel is closed, the collection emptied and the new
    /// scope mounted from scratch. Setting the current scope again is a no-op.
    pub fn set_scope(&mut self, scope: ScopeKey) -> Result<()> {
        if scope == self.scope {
            return Ok(());
        }
        self.commands
            .send(Command::SetScope(scope.clone()))
            .map_err(|_| ClientError::Closed)?;
        self.scope = scope;
        Ok(())
    }

    /// Fetch the snapshot again, e.g. after a load failure.
    pub fn reload(&self) -> Result<()> {
        self.commands
            .send(Command::Reload)
            .map_err(|_| ClientError::Closed)
    }

    /// Unmount and wait until the channel is closed.
    ///
    /// Closing an already closed list does nothing.
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.commands.send(Command::Close(Some(done))).is_ok() {
            let _ = closed.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub(crate) async fn perform(&self, mutation: Mutation) -> Result<MutationReceipt> {
        let action = mutation.action();
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        match self.gateway.mutate(mutation).await {
            Ok(receipt) => {
                tracing::info!(
                    action,
                    scope = %self.scope,
                    record_id = %receipt.record_id,
                    "Mutation accepted"
                );
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(action, scope = %self.scope, error = %err, "Mutation failed");
                Err(ClientError::mutation(action, err))
            }
        }
    }
}

impl<R: LiveRecord> Drop for LiveList<R> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close(None));
    }
}
