//! Live delivery tracking by polling.
//!
//! A [`TrackingPoller`] fetches the tracking record on a fixed interval (30 seconds unless
//! configured) and reports through a channel. It stops by itself once the delivery is
//! delivered or failed, and on any error. A stopped poller is resumed only by an explicit
//! [`TrackingPoller::refresh`] or a new [`TrackingPoller::spawn`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::{ApiClient, ClientError};
use crate::api::deliveries::TrackingRecord;
use crate::domain::aggregates::DeliveryStatus;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub status: DeliveryStatus,
    pub message: &'static str,
}

/// Remembers the last observed status so each change is announced once.
#[derive(Debug, Default, Clone)]
pub struct TrackingSession {
    last: Option<DeliveryStatus>,
}

impl TrackingSession {
    pub fn new() -> Self { Self::default() }

    pub fn last_status(&self) -> Option<DeliveryStatus> { self.last }

    /// The first observation sets the baseline and is not announced.
    pub fn observe(&mut self, status: DeliveryStatus) -> Option<Notification> {
        match self.last.replace(status) {
            Some(previous) if previous != status => {
                Some(Notification { status, message: status.notification_message() })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    Terminal(DeliveryStatus),
    LoginRequired,
    Forbidden,
    /// Shown as "tracking not available".
    Unavailable,
    Failed(String),
}

impl From<ClientError> for StopReason {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized => StopReason::LoginRequired,
            ClientError::Forbidden => StopReason::Forbidden,
            ClientError::NotFound => StopReason::Unavailable,
            other => StopReason::Failed(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingUpdate {
    Record(TrackingRecord),
    Notify(Notification),
    Stopped(StopReason),
}

#[async_trait]
pub trait TrackingSource: Send + Sync {
    async fn fetch(&self, order_id: Uuid) -> Result<TrackingRecord, ClientError>;
}

#[async_trait]
impl TrackingSource for ApiClient {
    async fn fetch(&self, order_id: Uuid) -> Result<TrackingRecord, ClientError> {
        self.get(&format!("/deliveries/track/{order_id}")).await
    }
}

pub struct TrackingPoller<S> {
    source: Arc<S>,
    order_id: Uuid,
    interval: Duration,
    session: TrackingSession,
}

impl<S: TrackingSource + 'static> TrackingPoller<S> {
    pub fn new(source: Arc<S>, order_id: Uuid) -> Self {
        Self { source, order_id, interval: DEFAULT_POLL_INTERVAL, session: TrackingSession::new() }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn session(&self) -> &TrackingSession { &self.session }

    /// One fetch. The last update is `Stopped` when polling should not continue.
    pub async fn refresh(&mut self) -> Vec<TrackingUpdate> {
        let record = match self.source.fetch(self.order_id).await {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(order_id = %self.order_id, error = %err, "tracking fetch failed");
                return vec![TrackingUpdate::Stopped(err.into())];
            }
        };
        let status = record.status;
        let mut updates = Vec::with_capacity(3);
        if let Some(notification) = self.session.observe(status) {
            updates.push(TrackingUpdate::Notify(notification));
        }
        updates.push(TrackingUpdate::Record(record));
        if status.is_terminal() {
            updates.push(TrackingUpdate::Stopped(StopReason::Terminal(status)));
        }
        updates
    }

    /// Polls on a background task, fetching immediately and then on every tick.
    pub fn spawn(mut self) -> TrackingHandle<S> {
        let (tx, updates) = mpsc::channel(16);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            'poll: loop {
                ticker.tick().await;
                for update in self.refresh().await {
                    let stopped = matches!(update, TrackingUpdate::Stopped(_));
                    if tx.send(update).await.is_err() || stopped {
                        break 'poll;
                    }
                }
            }
            self
        });
        TrackingHandle { updates, task }
    }
}

/// Owner of a running poller. Dropping or stopping it cancels polling.
pub struct TrackingHandle<S> {
    pub updates: mpsc::Receiver<TrackingUpdate>,
    task: JoinHandle<TrackingPoller<S>>,
}

impl<S> TrackingHandle<S> {
    pub fn stop(self) { self.task.abort(); }

    /// Waits for polling to end on its own and hands the poller back for a manual refresh.
    pub async fn finished(mut self) -> Option<TrackingPoller<S>> {
        self.updates.close();
        (&mut self.task).await.ok()
    }
}

impl<S> Drop for TrackingHandle<S> {
    fn drop(&mut self) { self.task.abort(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::TestApp;
    use crate::domain::aggregates::{OrderStatus, Role, Rider};
    use crate::domain::value_objects::CampusZone;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Step {
        Status(DeliveryStatus),
        Fail(fn() -> ClientError),
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self { steps: Mutex::new(steps.into()), calls: AtomicUsize::new(0) })
        }
    }

    fn record(status: DeliveryStatus) -> TrackingRecord {
        TrackingRecord {
            order_id: Uuid::nil(),
            order_number: "ORD-00000001".into(),
            order_status: OrderStatus::Processing,
            status,
            rider: None,
            assigned_at: None,
            delivered_at: None,
            estimated_arrival: None,
            eta_minutes: None,
            timeline: vec![],
        }
    }

    #[async_trait]
    impl TrackingSource for Scripted {
        async fn fetch(&self, _order_id: Uuid) -> Result<TrackingRecord, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.steps.lock().unwrap().pop_front() {
                Some(Step::Status(status)) => Ok(record(status)),
                Some(Step::Fail(err)) => Err(err()),
                None => Ok(record(DeliveryStatus::InTransit)),
            }
        }
    }

    async fn drain(mut handle: TrackingHandle<Scripted>) -> Vec<TrackingUpdate> {
        let mut seen = vec![];
        while let Some(update) = handle.updates.recv().await {
            seen.push(update);
        }
        seen
    }

    fn notified(updates: &[TrackingUpdate]) -> Vec<DeliveryStatus> {
        updates
            .iter()
            .filter_map(|u| match u {
                TrackingUpdate::Notify(n) => Some(n.status),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_session_announces_each_change_once() {
        let mut session = TrackingSession::new();
        assert_eq!(session.observe(DeliveryStatus::Assigned), None);
        assert_eq!(session.observe(DeliveryStatus::Assigned), None);
        let n = session.observe(DeliveryStatus::PickedUp).unwrap();
        assert_eq!(n.message, DeliveryStatus::PickedUp.notification_message());
        assert_eq!(session.observe(DeliveryStatus::PickedUp), None);
        assert_eq!(session.last_status(), Some(DeliveryStatus::PickedUp));
    }

    #[tokio::test]
    async fn test_polling_stops_exactly_at_terminal() {
        use DeliveryStatus::*;
        let source = Scripted::new(vec![
            Step::Status(Pending),
            Step::Status(Assigned),
            Step::Status(Assigned),
            Step::Status(InTransit),
            Step::Status(Delivered),
            Step::Status(Failed),
        ]);
        let handle = TrackingPoller::new(source.clone(), Uuid::nil()).every(Duration::from_millis(5)).spawn();
        let updates = drain(handle).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
        assert_eq!(notified(&updates), vec![Assigned, InTransit, Delivered]);
        assert_eq!(updates.last(), Some(&TrackingUpdate::Stopped(StopReason::Terminal(Delivered))));
    }

    #[tokio::test]
    async fn test_errors_stop_polling_until_manual_refresh() {
        let source = Scripted::new(vec![
            Step::Status(DeliveryStatus::Assigned),
            Step::Fail(|| ClientError::Status { status: 502, message: "bad gateway".into() }),
            Step::Status(DeliveryStatus::PickedUp),
        ]);
        let mut poller = TrackingPoller::new(source.clone(), Uuid::nil()).every(Duration::from_millis(5));
        let first = poller.refresh().await;
        assert!(notified(&first).is_empty());

        let mut handle = poller.spawn();
        let stop = handle.updates.recv().await.unwrap();
        assert!(matches!(stop, TrackingUpdate::Stopped(StopReason::Failed(ref m)) if m.contains("bad gateway")));
        let mut poller = handle.finished().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        let resumed = poller.refresh().await;
        assert_eq!(notified(&resumed), vec![DeliveryStatus::PickedUp]);
    }

    #[tokio::test]
    async fn test_already_delivered_stops_without_notifying() {
        let source = Scripted::new(vec![Step::Status(DeliveryStatus::Delivered)]);
        let handle = TrackingPoller::new(source.clone(), Uuid::nil()).every(Duration::from_millis(5)).spawn();
        let updates = drain(handle).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(notified(&updates).is_empty());
        assert_eq!(updates.len(), 2);
    }

    #[test]
    fn test_http_statuses_map_to_stop_reasons() {
        for (fail, reason) in [
            (ClientError::Unauthorized, StopReason::LoginRequired),
            (ClientError::Forbidden, StopReason::Forbidden),
            (ClientError::NotFound, StopReason::Unavailable),
        ] {
            assert_eq!(StopReason::from(fail), reason);
        }
    }

    #[tokio::test]
    async fn test_tracks_a_real_delivery() {
        let app = TestApp::new();
        let base = app.serve().await;
        let seller = app.user("Esi", Role::Customer).await;
        let buyer = app.user("Kwame", Role::Customer).await;
        let order_id = app.order(&buyer, &app.product(&seller, "Kettle", 3000).await).await;
        let mut order = app.state.repo.find_order(order_id).await.unwrap().unwrap();
        order.payment_confirmed().unwrap();
        app.state.repo.save_order(&order).await.unwrap();
        let rider = Rider::enlist(seller.user.id, "Esi", CampusZone::new("NORTH").unwrap());
        app.state.repo.insert_rider(&rider).await.unwrap();

        let client = Arc::new(ApiClient::new(&base).with_token(&buyer.token));
        let mut poller = TrackingPoller::new(client, order_id);
        let first = poller.refresh().await;
        assert!(matches!(&first[..], [TrackingUpdate::Record(r)] if r.status == DeliveryStatus::Pending));

        let mut delivery = app.state.repo.find_delivery(order_id).await.unwrap().unwrap();
        delivery.assign(rider.id(), None).unwrap();
        app.state.repo.save_delivery(&delivery).await.unwrap();
        let second = poller.refresh().await;
        assert_eq!(notified(&second), vec![DeliveryStatus::Assigned]);

        let mut stranger = TrackingPoller::new(Arc::new(ApiClient::new(&base)), order_id);
        assert_eq!(stranger.refresh().await, vec![TrackingUpdate::Stopped(StopReason::LoginRequired)]);
        let mut missing = TrackingPoller::new(Arc::new(ApiClient::new(&base).with_token(&buyer.token)), Uuid::new_v4());
        assert_eq!(missing.refresh().await, vec![TrackingUpdate::Stopped(StopReason::Unavailable)]);
    }
}
