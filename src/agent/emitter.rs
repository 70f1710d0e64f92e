//! Agent event emitter.
//!
//! The single dispatch surface for everything that happens to a bot.
//! Side effects — RPC reporting, status updates, screenshot capture —
//! are subscribers with ordered, fail-independent delivery: a
//! subscriber that errors logs and never blocks the next one, and
//! never blocks the emit itself.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::models::{BotStatus, EventData, EventType};

/// One emitted occurrence, as subscribers see it.
#[derive(Debug, Clone)]
pub struct AgentEvent {
    pub bot_id: i64,
    pub event_type: EventType,
    pub event_time: DateTime<Utc>,
    pub data: EventData,
    /// `(new, old)` when this event moved the lifecycle state.
    pub transition: Option<(BotStatus, BotStatus)>,
}

/// A registered side effect. Implementations own their retries and
/// swallow their failures.
#[async_trait::async_trait]
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &AgentEvent);
}

pub struct EventEmitter {
    bot_id: i64,
    state: RwLock<BotStatus>,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
    fatal_emitted: AtomicBool,
}

impl EventEmitter {
    pub fn new(bot_id: i64, initial: BotStatus) -> Self {
        Self {
            bot_id,
            state: RwLock::new(initial),
            subscribers: RwLock::new(Vec::new()),
            fatal_emitted: AtomicBool::new(false),
        }
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().await.push(subscriber);
    }

    pub async fn current_state(&self) -> BotStatus {
        *self.state.read().await
    }

    /// Whether a FATAL was ever emitted; decides the process exit code.
    pub fn saw_fatal(&self) -> bool {
        self.fatal_emitted.load(Ordering::Acquire)
    }

    /// Emit an event. Status-class events advance the in-memory state
    /// (terminal states stick); every subscriber is notified in
    /// registration order regardless of earlier subscriber failures.
    pub async fn emit(&self, event_type: EventType, data: EventData) -> AgentEvent {
        let event_time = Utc::now();

        let transition = match event_type.status() {
            Some(new_status) => {
                let mut state = self.state.write().await;
                let old = *state;
                if old.is_terminal() {
                    debug!(bot_id = self.bot_id, %event_type, "state is terminal, not transitioning");
                    None
                } else {
                    *state = new_status;
                    Some((new_status, old))
                }
            }
            None => None,
        };

        if event_type == EventType::Fatal {
            self.fatal_emitted.store(true, Ordering::Release);
        }

        let event = AgentEvent {
            bot_id: self.bot_id,
            event_type,
            event_time,
            data,
            transition,
        };

        let subscribers = self.subscribers.read().await.clone();
        for subscriber in subscribers {
            // Delivery is ordered but fail-independent; on_event
            // implementations log their own failures.
            subscriber.on_event(&event).await;
        }

        if let Some((new, old)) = transition {
            debug!(bot_id = self.bot_id, from = %old, to = %new, "state transition");
        }

        event
    }
}

/// Subscriber that mirrors events to the control plane: report-event
/// always, update-status for status-class events. Failures are logged
/// and dropped — reporting is at-least-once, never blocking.
pub struct RpcReporter {
    client: crate::agent::control_client::ControlPlaneClient,
    retry: crate::agent::retry::RetryPolicy,
}

impl RpcReporter {
    pub fn new(client: crate::agent::control_client::ControlPlaneClient) -> Self {
        Self {
            client,
            retry: crate::agent::retry::RetryPolicy::default(),
        }
    }
}

#[async_trait::async_trait]
impl EventSubscriber for RpcReporter {
    fn name(&self) -> &'static str {
        "rpc-reporter"
    }

    async fn on_event(&self, event: &AgentEvent) {
        let report = self
            .retry
            .execute(|| {
                self.client
                    .report_event(event.event_type, event.event_time, &event.data)
            })
            .await;
        if let Err(err) = report {
            warn!(event = %event.event_type, error = %err, "event report dropped");
        }

        if let Some((new_status, _)) = event.transition {
            let update = self
                .retry
                .execute(|| self.client.update_status(new_status.as_str(), None, None))
                .await;
            if let Err(err) = update {
                warn!(status = %new_status, error = %err, "status update dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Arc<Mutex<Vec<(EventType, Option<(BotStatus, BotStatus)>)>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EventSubscriber for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn on_event(&self, event: &AgentEvent) {
            self.seen
                .lock()
                .unwrap()
                .push((event.event_type, event.transition));
            if self.fail {
                // A misbehaving subscriber logs internally; the emitter
                // must keep going either way.
                warn!("recorder simulated failure");
            }
        }
    }

    #[tokio::test]
    async fn status_events_carry_new_and_old_state() {
        let emitter = EventEmitter::new(1, BotStatus::JoiningCall);
        let seen = Arc::new(Mutex::new(Vec::new()));
        emitter
            .subscribe(Arc::new(Recorder { seen: seen.clone(), fail: false }))
            .await;

        emitter.emit(EventType::InCall, EventData::default()).await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (
                EventType::InCall,
                Some((BotStatus::InCall, BotStatus::JoiningCall))
            )
        );
    }

    #[tokio::test]
    async fn log_only_events_do_not_transition() {
        let emitter = EventEmitter::new(1, BotStatus::InCall);
        emitter
            .emit(EventType::ParticipantJoin, EventData::description("Ada"))
            .await;
        assert_eq!(emitter.current_state().await, BotStatus::InCall);
    }

    #[tokio::test]
    async fn terminal_state_sticks() {
        let emitter = EventEmitter::new(1, BotStatus::InCall);
        emitter.emit(EventType::Fatal, EventData::default()).await;
        assert_eq!(emitter.current_state().await, BotStatus::Fatal);
        assert!(emitter.saw_fatal());

        let event = emitter.emit(EventType::Done, EventData::default()).await;
        assert!(event.transition.is_none());
        assert_eq!(emitter.current_state().await, BotStatus::Fatal);
    }

    #[tokio::test]
    async fn all_subscribers_see_events_in_order() {
        let emitter = EventEmitter::new(1, BotStatus::InCall);
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        emitter
            .subscribe(Arc::new(Recorder { seen: first.clone(), fail: true }))
            .await;
        emitter
            .subscribe(Arc::new(Recorder { seen: second.clone(), fail: false }))
            .await;

        emitter.emit(EventType::CallEnded, EventData::default()).await;
        emitter.emit(EventType::Done, EventData::default()).await;

        // The failing first subscriber never starves the second.
        assert_eq!(first.lock().unwrap().len(), 2);
        assert_eq!(second.lock().unwrap().len(), 2);
        assert_eq!(second.lock().unwrap()[0].0, EventType::CallEnded);
        assert_eq!(second.lock().unwrap()[1].0, EventType::Done);
    }
}
