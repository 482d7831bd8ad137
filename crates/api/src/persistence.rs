//! Persistence client: ships local menu changes to the server.
//!
//! Failures never roll local state back. A failed order submission resolves
//! with the optimistic tree and emits [`Notification::PersistFailed`]; only a
//! malformed snapshot is returned as an error the caller must surface.
//!
//! Posts for the same concern reach the server in the order they were
//! reserved with [`PersistenceClient::reserve`], regardless of which task
//! runs first. Snapshot refreshes are not ordered.

use std::collections::HashMap;
use std::sync::Mutex;

use navbar_types::{Concern, GroupingThreshold, MenuTree, NavError, Notification};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::transport::{Endpoint, NavTransport, SESSION_COOKIE, TransportError};

/// Channel the client reports notifications on.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

/// How an order submission settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Server accepted the order; this is the freshly fetched snapshot.
    Confirmed(MenuTree),
    /// Submission failed; the optimistic tree stands until the next refresh.
    Optimistic(MenuTree),
}

impl Resolution {
    pub fn tree(&self) -> &MenuTree {
        match self {
            Resolution::Confirmed(tree) | Resolution::Optimistic(tree) => tree,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Resolution::Confirmed(_))
    }
}

/// A reserved position in one concern's post queue.
///
/// The holder may post once the previous ticket for the same concern has
/// posted or been dropped. Dropping a ticket releases the next one.
#[derive(Debug)]
pub struct PostTicket {
    concern: Concern,
    previous: Option<oneshot::Receiver<()>>,
    posted: oneshot::Sender<()>,
}

impl PostTicket {
    pub fn concern(&self) -> Concern {
        self.concern
    }

    async fn wait_turn(&mut self) {
        if let Some(previous) = self.previous.take() {
            // an error means the earlier holder was dropped without posting
            let _ = previous.await;
        }
    }

    fn release(self) {
        let _ = self.posted.send(());
    }
}

#[derive(Debug)]
pub struct PersistenceClient<T> {
    transport: T,
    notifier: NotificationSender,
    queues: Mutex<HashMap<Concern, oneshot::Receiver<()>>>,
}

impl<T: NavTransport> PersistenceClient<T> {
    pub fn new(transport: T, notifier: NotificationSender) -> Self {
        Self {
            transport,
            notifier,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Takes the next slot in `concern`'s post queue. Call this before
    /// handing the submission to another task so issue order is kept.
    pub fn reserve(&self, concern: Concern) -> PostTicket {
        let (posted, released) = oneshot::channel();
        let previous = self.queues.lock().expect("post queue lock poisoned").insert(concern, released);
        PostTicket {
            concern,
            previous,
            posted,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches and parses the authoritative `_nav.json` snapshot.
    ///
    /// Network failures come back as [`NavError::PersistFailed`] with
    /// [`Concern::Refresh`]; a bad payload as [`NavError::SnapshotMalformed`].
    pub async fn fetch_snapshot(&self) -> Result<MenuTree, NavError> {
        let body = self
            .transport
            .fetch_snapshot()
            .await
            .map_err(|error| NavError::persist_failed(Concern::Refresh, error.to_string()))?;
        MenuTree::from_snapshot_json(&body).inspect_err(|error| warn!(%error, "rejecting navigation snapshot"))
    }

    /// Form fields for `admin/mount_order`: the session id plus
    /// `index -> mount_point` for every orderable entry, depth first.
    /// Anchored and admin-pinned entries are left for the server to place.
    pub fn order_fields(&self, tree: &MenuTree) -> Vec<(String, String)> {
        let mut fields = self.session_fields();
        fields.extend(
            tree.ordinal_map()
                .into_iter()
                .map(|(mount_point, index)| (index.to_string(), mount_point)),
        );
        fields
    }

    /// Posts the order of `tree` and, on success, re-fetches the snapshot.
    pub async fn submit_order(&self, tree: MenuTree) -> Result<Resolution, NavError> {
        self.submit_order_queued(self.reserve(Concern::Order), tree).await
    }

    /// Like [`submit_order`](Self::submit_order), posting only once `ticket`'s
    /// turn comes up.
    pub async fn submit_order_queued(&self, mut ticket: PostTicket, tree: MenuTree) -> Result<Resolution, NavError> {
        let fields = self.order_fields(&tree);
        ticket.wait_turn().await;
        let posted = self.transport.post_form(Endpoint::MountOrder, &fields).await;
        ticket.release();
        if let Err(error) = posted {
            self.report(Concern::Order, &error);
            return Ok(Resolution::Optimistic(tree));
        }
        info!(tools = fields.len(), "tool order updated");
        self.notify(Notification::OrderSaved);

        Ok(match self.refresh().await? {
            Some(snapshot) => Resolution::Confirmed(snapshot),
            None => Resolution::Optimistic(tree),
        })
    }

    /// Re-fetches the snapshot after a mutation. A network failure is
    /// reported and yields `None`; a malformed payload is still an error.
    pub async fn refresh(&self) -> Result<Option<MenuTree>, NavError> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(NavError::PersistFailed { concern, reason }) => {
                warn!(?concern, %reason, "refresh after mutation failed");
                self.notify(Notification::PersistFailed { concern, reason });
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Validates and posts a new grouping threshold. Out-of-range values are
    /// rejected without touching the network.
    pub async fn submit_threshold(&self, value: i64) -> Result<(), NavError> {
        self.submit_threshold_queued(self.reserve(Concern::Threshold), value).await
    }

    /// Like [`submit_threshold`](Self::submit_threshold), posting only once
    /// `ticket`'s turn comes up.
    pub async fn submit_threshold_queued(&self, mut ticket: PostTicket, value: i64) -> Result<(), NavError> {
        let threshold = match GroupingThreshold::new(value) {
            Ok(threshold) => threshold,
            Err(error) => {
                self.notify(Notification::from(&error));
                return Err(error.into());
            }
        };
        let mut fields = self.session_fields();
        fields.push(("grouping_threshold".to_string(), threshold.get().to_string()));
        ticket.wait_turn().await;
        let posted = self.transport.post_form(Endpoint::ConfigureToolGrouping, &fields).await;
        ticket.release();
        posted.map_err(|error| self.report(Concern::Threshold, &error))?;
        debug!(threshold = threshold.get(), "grouping threshold saved");
        Ok(())
    }

    fn session_fields(&self) -> Vec<(String, String)> {
        self.transport
            .session_id()
            .map(|session_id| (SESSION_COOKIE.to_string(), session_id))
            .into_iter()
            .collect()
    }

    fn report(&self, concern: Concern, error: &TransportError) -> NavError {
        warn!(?concern, %error, "persisting navbar change failed");
        let reason = error.to_string();
        self.notify(Notification::PersistFailed {
            concern,
            reason: reason.clone(),
        });
        NavError::persist_failed(concern, reason)
    }

    fn notify(&self, notification: Notification) {
        // a closed channel means the host stopped listening
        if self.notifier.send(notification).is_err() {
            debug!("notification dropped; no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navbar_types::{ToolEntry, ValidationError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Default)]
    struct RecordingTransport {
        posts: Mutex<Vec<(Endpoint, Vec<(String, String)>)>>,
        fetches: AtomicUsize,
        snapshot: String,
        fail_posts: bool,
        fail_fetches: bool,
    }

    #[async_trait::async_trait]
    impl NavTransport for RecordingTransport {
        async fn fetch_snapshot(&self) -> Result<String, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetches {
                return Err(TransportError::network("connection reset"));
            }
            Ok(self.snapshot.clone())
        }

        async fn post_form(&self, endpoint: Endpoint, fields: &[(String, String)]) -> Result<(), TransportError> {
            self.posts.lock().unwrap().push((endpoint, fields.to_vec()));
            if self.fail_posts {
                Err(TransportError::status(500, "boom"))
            } else {
                Ok(())
            }
        }

        fn session_id(&self) -> Option<String> {
            Some("sess".into())
        }
    }

    const SNAPSHOT: &str = r#"{"grouping_threshold": 2, "menu": [
        {"mount_point": "home", "name": "Home", "url": "/p/demo/", "is_anchored": true},
        {"mount_point": "b", "name": "B", "url": "/p/demo/b/", "ordinal": 0},
        {"mount_point": "a", "name": "A", "url": "/p/demo/a/", "ordinal": 1},
        {"mount_point": "admin", "name": "Admin", "url": "/p/demo/admin/", "ordinal": 2}
    ]}"#;

    fn client(transport: RecordingTransport) -> (PersistenceClient<RecordingTransport>, UnboundedReceiver<Notification>) {
        let (notifier, notifications) = mpsc::unbounded_channel();
        (PersistenceClient::new(transport, notifier), notifications)
    }

    fn local_tree() -> MenuTree {
        MenuTree::new(
            vec![
                ToolEntry::new("home", "Home", "/p/demo/").anchored(),
                ToolEntry::new("b", "B", "/p/demo/b/").with_ordinal(0),
                ToolEntry::new("a", "A", "/p/demo/a/").with_ordinal(1),
                ToolEntry::new("admin", "Admin", "/p/demo/admin/").with_ordinal(2),
            ],
            GroupingThreshold::default(),
        )
    }

    fn pairs(fields: &[(String, String)]) -> Vec<(&str, &str)> {
        fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[tokio::test]
    async fn order_submission_posts_orderable_entries_and_refreshes() {
        let (client, mut notifications) = client(RecordingTransport {
            snapshot: SNAPSHOT.into(),
            ..Default::default()
        });

        let resolution = client.submit_order(local_tree()).await.expect("submit");
        assert!(resolution.is_confirmed());
        assert_eq!(resolution.tree().grouping_threshold().get(), 2);

        let posts = client.transport().posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, Endpoint::MountOrder);
        assert_eq!(pairs(&posts[0].1), vec![("_session_id", "sess"), ("0", "b"), ("1", "a")]);
        assert_eq!(client.transport().fetches.load(Ordering::SeqCst), 1);
        assert_eq!(notifications.try_recv(), Ok(Notification::OrderSaved));
    }

    #[tokio::test]
    async fn rejected_order_keeps_optimistic_tree() {
        let (client, mut notifications) = client(RecordingTransport {
            snapshot: SNAPSHOT.into(),
            fail_posts: true,
            ..Default::default()
        });

        let resolution = client.submit_order(local_tree()).await.expect("submit");
        assert_eq!(resolution, Resolution::Optimistic(local_tree()));
        assert_eq!(client.transport().fetches.load(Ordering::SeqCst), 0);
        assert!(matches!(
            notifications.try_recv(),
            Ok(Notification::PersistFailed {
                concern: Concern::Order,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn malformed_refresh_is_an_error() {
        let (client, _notifications) = client(RecordingTransport {
            snapshot: r#"{"grouping_threshold": 2}"#.into(),
            ..Default::default()
        });
        let err = client.submit_order(local_tree()).await.unwrap_err();
        assert!(matches!(err, NavError::SnapshotMalformed { .. }));
    }

    #[tokio::test]
    async fn threshold_bounds_are_checked_before_sending() {
        let (client, mut notifications) = client(RecordingTransport::default());

        for value in [0, 11] {
            let err = client.submit_threshold(value).await.unwrap_err();
            assert_eq!(err, NavError::Validation(ValidationError::InvalidThreshold { value }));
            assert!(matches!(notifications.try_recv(), Ok(Notification::Rejected { .. })));
        }
        assert!(client.transport().posts.lock().unwrap().is_empty());

        for value in [1, 10] {
            client.submit_threshold(value).await.expect("in range");
        }
        let posts = client.transport().posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].0, Endpoint::ConfigureToolGrouping);
        assert_eq!(pairs(&posts[1].1), vec![("_session_id", "sess"), ("grouping_threshold", "10")]);
    }

    #[tokio::test]
    async fn failed_threshold_post_notifies() {
        let (client, mut notifications) = client(RecordingTransport {
            fail_posts: true,
            ..Default::default()
        });
        let err = client.submit_threshold(4).await.unwrap_err();
        assert_eq!(err, NavError::persist_failed(Concern::Threshold, "HTTP 500: boom"));
        assert_eq!(
            notifications.try_recv(),
            Ok(Notification::PersistFailed {
                concern: Concern::Threshold,
                reason: "HTTP 500: boom".into(),
            })
        );
    }

    #[tokio::test]
    async fn failed_refresh_after_saved_order_keeps_optimistic_tree() {
        let (client, mut notifications) = client(RecordingTransport {
            fail_fetches: true,
            ..Default::default()
        });

        let resolution = client.submit_order(local_tree()).await.expect("submit");
        assert_eq!(resolution, Resolution::Optimistic(local_tree()));
        assert_eq!(client.transport().posts.lock().unwrap().len(), 1);
        assert_eq!(notifications.try_recv(), Ok(Notification::OrderSaved));
        assert_eq!(
            notifications.try_recv(),
            Ok(Notification::PersistFailed {
                concern: Concern::Refresh,
                reason: "Network error: connection reset".into(),
            })
        );
    }

    #[tokio::test]
    async fn queued_posts_go_out_in_reservation_order() {
        let (client, _notifications) = client(RecordingTransport {
            snapshot: SNAPSHOT.into(),
            ..Default::default()
        });
        let client = Arc::new(client);
        let first = client.reserve(Concern::Order);
        let second = client.reserve(Concern::Order);
        assert_eq!(second.concern(), Concern::Order);

        let swapped = MenuTree::new(
            vec![
                ToolEntry::new("a", "A", "/p/demo/a/").with_ordinal(0),
                ToolEntry::new("b", "B", "/p/demo/b/").with_ordinal(1),
            ],
            GroupingThreshold::default(),
        );
        let later = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.submit_order_queued(second, swapped).await })
        };
        tokio::task::yield_now().await;
        assert!(client.transport().posts.lock().unwrap().is_empty());

        client.submit_order_queued(first, local_tree()).await.expect("first");
        later.await.expect("join").expect("second");

        let posts = client.transport().posts.lock().unwrap().clone();
        assert_eq!(pairs(&posts[0].1), vec![("_session_id", "sess"), ("0", "b"), ("1", "a")]);
        assert_eq!(pairs(&posts[1].1), vec![("_session_id", "sess"), ("0", "a"), ("1", "b")]);
    }

    #[tokio::test]
    async fn dropped_ticket_releases_the_queue() {
        let (client, _notifications) = client(RecordingTransport::default());
        let abandoned = client.reserve(Concern::Threshold);
        let next = client.reserve(Concern::Threshold);
        drop(abandoned);

        client.submit_threshold_queued(next, 3).await.expect("threshold");
        assert_eq!(client.transport().posts.lock().unwrap().len(), 1);
    }
}
