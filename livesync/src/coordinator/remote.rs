//! Inbound bus traffic: remote transport commands, join handshakes,
//! heartbeats and connectivity notices.

use std::sync::Arc;

use livesync_state::{roles_intersect, ApplyOutcome, ClientId, GroupPlaybackState, RoleId};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::{Lifecycle, SessionCoordinator};
use crate::bus::{BusNotice, Envelope, SessionMessage, TransportAction};
use crate::error::{Result, SyncError};
use crate::events::{ActionSource, GroupAction, GroupActionEvent};

impl SessionCoordinator {
    /// Handle every queued bus notice
    ///
    /// Returns how many notices were handled. Hosts that do not
    /// [`spawn`](Self::spawn) a listener call this from their own loop.
    pub async fn pump(&self) -> Result<usize> {
        self.require_active()?;
        let mut handled = 0;
        loop {
            if self.lifecycle() != Lifecycle::Active {
                break;
            }
            let notice = match self.inbox.lock().await.as_mut() {
                Some(inbox) => inbox.try_recv(),
                None => None,
            };
            let Some(notice) = notice else {
                break;
            };
            self.handle_notice(notice).await;
            handled += 1;
        }
        self.process_deferred().await;
        Ok(handled)
    }

    /// Start a background listener
    ///
    /// The listener handles notices as they arrive and broadcasts the group
    /// state every `position_update_interval` unless the client is
    /// suspended. It holds only a weak reference and stops on
    /// [`dispose`](Self::dispose) or when the coordinator is dropped.
    pub async fn spawn(self: &Arc<Self>) -> Result<()> {
        self.require_active()?;
        if self.listener.lock().is_some() {
            return Ok(());
        }
        let Some(mut inbox) = self.inbox.lock().await.take() else {
            return Err(SyncError::NotInitialized);
        };

        let weak = Arc::downgrade(self);
        let interval = self.config.position_update_interval;
        let client = self.local_id.clone();

        let handle = tokio::spawn(async move {
            info!(%client, "Coordinator listener started");
            let mut heartbeat = tokio::time::interval(interval);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    notice = inbox.recv() => {
                        let Some(notice) = notice else {
                            debug!(%client, "Bus subscription closed");
                            break;
                        };
                        let Some(coordinator) = weak.upgrade() else {
                            break;
                        };
                        coordinator.handle_notice(notice).await;
                        coordinator.process_deferred().await;
                    }
                    _ = heartbeat.tick() => {
                        let Some(coordinator) = weak.upgrade() else {
                            break;
                        };
                        coordinator.on_heartbeat().await;
                    }
                }
            }

            info!(%client, "Coordinator listener stopped");
        });

        *self.listener.lock() = Some(handle);
        Ok(())
    }

    async fn on_heartbeat(&self) {
        if self.lifecycle() != Lifecycle::Active {
            return;
        }
        self.process_deferred().await;

        if self.is_suspended() {
            // Wait points are re-checked as the group advances
            let has_wait_points = self.suspensions.lock().has_wait_points();
            if has_wait_points {
                self.reconcile_player(false).await;
            }
            return;
        }
        if let Err(e) = self.send_position_update().await {
            debug!(client = %self.local_id, "Heartbeat not sent: {}", e);
        }
    }

    pub(super) async fn handle_notice(&self, notice: BusNotice) {
        match notice {
            BusNotice::Message(envelope) => self.handle_envelope(envelope).await,
            BusNotice::Disconnected => {
                warn!(client = %self.local_id, "Event bus disconnected");
                self.emit(
                    GroupActionEvent::new(GroupAction::Connection, ActionSource::Local).with_error(
                        SyncError::NotConnected("event bus disconnected".to_string()),
                    ),
                );
            }
            BusNotice::Reconnected => {
                info!(client = %self.local_id, "Event bus reconnected");
                self.emit(GroupActionEvent::new(
                    GroupAction::Connection,
                    ActionSource::Local,
                ));
                if let Err(e) = self.bus.broadcast(SessionMessage::Joined).await {
                    warn!(client = %self.local_id, "Failed to re-announce join: {}", e);
                }
            }
            BusNotice::Reset => {
                warn!(client = %self.local_id, "Session reset, clearing group state");
                self.store.reset();
                self.throttler.reset();
            }
        }
    }

    async fn handle_envelope(&self, envelope: Envelope) {
        let Envelope {
            sender,
            timestamp,
            message,
        } = envelope;
        if sender == self.local_id {
            return;
        }
        trace!(
            client = %self.local_id,
            %sender,
            %timestamp,
            kind = message.kind(),
            "Received message"
        );

        match message {
            SessionMessage::Joined => self.answer_join(&sender).await,
            SessionMessage::Transport { action, state } => {
                if self.authorize_remote(&sender, action.into(), &state, true) {
                    self.merge_remote(state, &sender, Some(action)).await;
                }
            }
            SessionMessage::PositionUpdate { state } => {
                // Any member may relay a state, but only an eligible writer
                // makes it authoritative
                if self.authorize_remote(&sender, GroupAction::Catchup, &state, false) {
                    self.merge_remote(state, &sender, None).await;
                }
            }
        }
    }

    /// Reply to a joining client with the state exactly as stored
    async fn answer_join(&self, joiner: &ClientId) {
        let state = self.store.current();
        if state.is_none() {
            return;
        }
        debug!(client = %self.local_id, %joiner, "Sending group state to joining client");
        if let Err(e) = self
            .bus
            .broadcast(SessionMessage::PositionUpdate { state })
            .await
        {
            warn!(client = %self.local_id, "Failed to answer join: {}", e);
        }
    }

    /// Check the writer of `state` (and, for transport commands, the
    /// sender) against the eligible roles
    fn authorize_remote(
        &self,
        sender: &ClientId,
        action: GroupAction,
        state: &GroupPlaybackState,
        check_sender: bool,
    ) -> bool {
        let eligible = self.eligible_roles.read().clone();
        if eligible.is_empty() {
            return true;
        }

        let mut candidates: Vec<Option<&ClientId>> = vec![state.change_owner_id.as_ref()];
        if check_sender && state.change_owner_id.as_ref() != Some(sender) {
            candidates.push(Some(sender));
        }

        for candidate in candidates {
            let roles = candidate.and_then(|id| self.roles_of(id)).unwrap_or_default();
            if roles_intersect(&roles, &eligible) {
                continue;
            }
            warn!(
                client = %self.local_id,
                %sender,
                writer = ?candidate,
                ?action,
                "Ignoring group state from unauthorized client"
            );
            self.emit(
                GroupActionEvent::new(action, ActionSource::Remote(sender.clone()))
                    .with_error(SyncError::NotAuthorized { roles, eligible }),
            );
            return false;
        }
        true
    }

    fn roles_of(&self, client_id: &ClientId) -> Option<Vec<RoleId>> {
        if *client_id == self.local_id {
            return Some(self.roster.local_roles());
        }
        self.roster.client_info(client_id).map(|info| info.roles)
    }

    async fn merge_remote(
        &self,
        state: GroupPlaybackState,
        sender: &ClientId,
        action: Option<TransportAction>,
    ) {
        match self.store.apply_remote(state, sender) {
            ApplyOutcome::Applied => {
                debug!(client = %self.local_id, %sender, ?action, "Applied remote group state");
                self.reconcile_remote(sender).await;
                let group_action = action.map_or(GroupAction::Catchup, GroupAction::from);
                self.emit(GroupActionEvent::new(
                    group_action,
                    ActionSource::Remote(sender.clone()),
                ));
            }
            ApplyOutcome::Duplicate => {
                trace!(client = %self.local_id, %sender, "Duplicate group state");
                self.reconcile_remote(sender).await;
            }
            ApplyOutcome::Stale => {
                debug!(client = %self.local_id, %sender, "Ignoring stale group state");
            }
        }
    }

    async fn reconcile_remote(&self, sender: &ClientId) {
        let state = self.store.current();
        self.apply_state(&state, ActionSource::Remote(sender.clone()), false)
            .await;
    }
}
