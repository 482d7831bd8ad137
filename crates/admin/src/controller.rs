//! Admin controller: owns the live [`MenuTree`] and coordinates edits.
//!
//! The controller is the only writer of the tree. User actions compute the
//! next tree synchronously, apply it optimistically, and spawn the network
//! round trip as a Tokio task. Completed tasks are applied one at a time via
//! [`AdminController::next_update`], so the server snapshot of whichever
//! response lands last wins. Posts for one concern still reach the server
//! in the order the user issued them.
//!
//! States:
//! - `Normal`: read-only view, no edits accepted
//! - `AdminIdle`: admin view, nothing in flight
//! - `AdminPending`: admin view, at least one submission in flight

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use navbar_api::{NavTransport, NotificationSender, PersistenceClient, Resolution};
use navbar_engine::{DropEvent, ViewTree, compute_reorder, render};
use navbar_types::{Concern, DisplayMode, GroupingThreshold, MenuTree, NavError, Notification, ValidationError};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Normal,
    AdminIdle,
    AdminPending,
}

/// What happened when an in-flight submission completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerUpdate {
    /// The tree was replaced by the server snapshot.
    Refreshed { concern: Concern },
    /// The submission failed; the optimistic tree was kept.
    Retained { concern: Concern },
    /// The task died before reporting back.
    Abandoned,
}

/// Result of a spawned round trip.
#[derive(Debug)]
enum Msg {
    OrderSettled(Result<Resolution, NavError>),
    /// `Some` carries the refreshed snapshot, `None` means the optimistic
    /// threshold stands.
    ThresholdSettled(Result<Option<MenuTree>, NavError>),
}

pub struct AdminController<T: NavTransport + 'static> {
    client: Arc<PersistenceClient<T>>,
    notifier: NotificationSender,
    tree: MenuTree,
    mode: DisplayMode,
    in_flight: FuturesUnordered<JoinHandle<Msg>>,
    fault: Option<NavError>,
}

impl<T: NavTransport + 'static> AdminController<T> {
    /// Fetches the initial snapshot and starts in normal mode.
    ///
    /// Returns the controller plus the receiving end of its notification
    /// channel.
    pub async fn mount(transport: T) -> Result<(Self, UnboundedReceiver<Notification>), NavError> {
        let (notifier, notifications) = mpsc::unbounded_channel();
        let client = PersistenceClient::new(transport, notifier.clone());
        let tree = client.fetch_snapshot().await?;
        Ok((Self::assemble(client, notifier, tree), notifications))
    }

    /// Starts from a tree the host already holds (e.g. embedded page data).
    pub fn with_tree(transport: T, tree: MenuTree) -> (Self, UnboundedReceiver<Notification>) {
        let (notifier, notifications) = mpsc::unbounded_channel();
        let client = PersistenceClient::new(transport, notifier.clone());
        (Self::assemble(client, notifier, tree), notifications)
    }

    fn assemble(client: PersistenceClient<T>, notifier: NotificationSender, tree: MenuTree) -> Self {
        Self {
            client: Arc::new(client),
            notifier,
            tree,
            mode: DisplayMode::Normal,
            in_flight: FuturesUnordered::new(),
            fault: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        match (self.mode, self.in_flight.is_empty()) {
            (DisplayMode::Normal, _) => ControllerState::Normal,
            (DisplayMode::Admin, true) => ControllerState::AdminIdle,
            (DisplayMode::Admin, false) => ControllerState::AdminPending,
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn tree(&self) -> &MenuTree {
        &self.tree
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// The latched fatal error, if a malformed snapshot was received.
    pub fn fault(&self) -> Option<&NavError> {
        self.fault.as_ref()
    }

    pub fn client(&self) -> &PersistenceClient<T> {
        &self.client
    }

    /// Renders the current tree in the current mode.
    pub fn view(&self) -> ViewTree {
        render(&self.tree, self.mode)
    }

    /// Flips between normal and admin view. Purely local.
    pub fn toggle_admin(&mut self) -> DisplayMode {
        self.mode = self.mode.toggled();
        debug!(mode = ?self.mode, "toggled navbar mode");
        self.mode
    }

    /// Applies a drag-drop release optimistically and submits the new order.
    ///
    /// Accepted while idle or pending; an earlier in-flight submission keeps
    /// running.
    pub fn drop_tool(&mut self, event: &DropEvent) -> Result<(), NavError> {
        self.ensure_healthy()?;
        self.ensure_admin()?;
        let next = compute_reorder(&self.tree, event).map_err(|error| self.reject(error))?;
        debug!(mount_point = %event.moved_mount_point, "applying reorder optimistically");
        self.tree = next.clone();

        let client = Arc::clone(&self.client);
        let ticket = client.reserve(Concern::Order);
        self.in_flight.push(tokio::spawn(async move {
            Msg::OrderSettled(client.submit_order_queued(ticket, next).await)
        }));
        Ok(())
    }

    /// Updates the grouping threshold locally and submits it.
    pub fn change_threshold(&mut self, value: i64) -> Result<(), NavError> {
        self.ensure_healthy()?;
        self.ensure_admin()?;
        let threshold = GroupingThreshold::new(value).map_err(|error| self.reject(error))?;
        self.tree = self.tree.with_threshold(threshold);

        let client = Arc::clone(&self.client);
        let ticket = client.reserve(Concern::Threshold);
        self.in_flight.push(tokio::spawn(async move {
            let settled = match client.submit_threshold_queued(ticket, value).await {
                Ok(()) => client.refresh().await,
                // already reported by the client
                Err(NavError::PersistFailed { .. }) => Ok(None),
                Err(error) => Err(error),
            };
            Msg::ThresholdSettled(settled)
        }));
        Ok(())
    }

    /// Waits for the next in-flight submission and applies its outcome.
    ///
    /// Returns `None` when nothing is in flight. A malformed snapshot is
    /// returned as an error and latches the controller.
    pub async fn next_update(&mut self) -> Option<Result<ControllerUpdate, NavError>> {
        let joined = self.in_flight.next().await?;
        Some(self.apply(joined))
    }

    /// Drains every in-flight submission.
    pub async fn settle(&mut self) -> Result<Vec<ControllerUpdate>, NavError> {
        let mut updates = Vec::new();
        while let Some(update) = self.next_update().await {
            updates.push(update?);
        }
        Ok(updates)
    }

    /// Aborts every in-flight submission. Late responses are discarded.
    pub fn shutdown(&mut self) {
        if !self.in_flight.is_empty() {
            debug!(in_flight = self.in_flight.len(), "tearing down with requests in flight");
        }
        for handle in self.in_flight.iter() {
            handle.abort();
        }
        self.in_flight.clear();
    }

    fn apply(&mut self, joined: Result<Msg, JoinError>) -> Result<ControllerUpdate, NavError> {
        let msg = match joined {
            Ok(msg) => msg,
            Err(error) => {
                warn!(%error, "navbar submission task ended abnormally");
                return Ok(ControllerUpdate::Abandoned);
            }
        };
        match msg {
            Msg::OrderSettled(Ok(Resolution::Confirmed(snapshot))) => {
                self.tree = snapshot;
                Ok(ControllerUpdate::Refreshed { concern: Concern::Order })
            }
            Msg::OrderSettled(Ok(Resolution::Optimistic(_))) => Ok(ControllerUpdate::Retained { concern: Concern::Order }),
            Msg::ThresholdSettled(Ok(Some(snapshot))) => {
                self.tree = snapshot;
                Ok(ControllerUpdate::Refreshed {
                    concern: Concern::Threshold,
                })
            }
            Msg::ThresholdSettled(Ok(None)) => Ok(ControllerUpdate::Retained {
                concern: Concern::Threshold,
            }),
            Msg::OrderSettled(Err(error)) | Msg::ThresholdSettled(Err(error)) => {
                if !error.is_recoverable() {
                    warn!(%error, "navbar snapshot unusable; editor halted");
                    self.fault = Some(error.clone());
                }
                Err(error)
            }
        }
    }

    fn ensure_healthy(&self) -> Result<(), NavError> {
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn ensure_admin(&self) -> Result<(), NavError> {
        if self.mode.is_admin() {
            Ok(())
        } else {
            Err(self.reject(ValidationError::NotInAdminMode))
        }
    }

    fn reject(&self, error: ValidationError) -> NavError {
        debug!(%error, "rejected navbar edit");
        // a closed channel means the host stopped listening
        let _ = self.notifier.send(Notification::from(&error));
        error.into()
    }
}

impl<T: NavTransport + 'static> Drop for AdminController<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
