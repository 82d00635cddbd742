//! Debounced evaluation triggers and the periodic render tick

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::shared::config::SchedulerCfg;
use crate::shared::types::{VenueSlot, VenueValues};

/// Receiver of scheduler events.
#[async_trait]
pub trait TriggerSink: Send + Sync + 'static {
    /// Run one evaluation cycle. `None` for triggers not tied to a venue.
    async fn evaluate(&self, source: Option<VenueSlot>);

    /// Re-render the latest result without evaluating.
    async fn render(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

/// Per-venue debounce timer: every notification pushes the deadline out.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn notify(&mut self, now: Instant) {
        self.state = DebounceState::Pending {
            deadline: now + self.delay,
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    /// Returns true exactly once per expired deadline, resetting to idle.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if deadline <= now => {
                self.state = DebounceState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub debounce: Duration,
    pub render_interval: Duration,
    /// Evaluate once at start-up without waiting for a notification
    pub initial_trigger: bool,
}

impl From<&SchedulerCfg> for SchedulerSettings {
    fn from(cfg: &SchedulerCfg) -> Self {
        Self {
            debounce: Duration::from_millis(cfg.debounce_ms),
            render_interval: Duration::from_millis(cfg.render_interval_ms),
            initial_trigger: true,
        }
    }
}

/// Turns bursty venue notifications into evaluation triggers.
///
/// Each trigger runs on its own task so the loop keeps draining
/// notifications; overlapping cycles are resolved by the sink.
pub struct Scheduler {
    settings: SchedulerSettings,
    sink: Arc<dyn TriggerSink>,
    notifications: mpsc::Receiver<VenueSlot>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        sink: Arc<dyn TriggerSink>,
        notifications: mpsc::Receiver<VenueSlot>,
    ) -> Self {
        Self {
            settings,
            sink,
            notifications,
        }
    }

    /// Runs until the notification channel closes.
    pub async fn run(mut self) {
        let mut timers = VenueValues::new(
            Debouncer::new(self.settings.debounce),
            Debouncer::new(self.settings.debounce),
        );
        let mut render = tokio::time::interval(self.settings.render_interval);
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "⏱️ Scheduler started (debounce {:?}, render every {:?})",
            self.settings.debounce, self.settings.render_interval
        );
        if self.settings.initial_trigger {
            self.fire(None);
        }

        loop {
            let next_deadline = [timers.first.deadline(), timers.second.deadline()]
                .into_iter()
                .flatten()
                .min();
            let expiry = async move {
                match next_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                notification = self.notifications.recv() => match notification {
                    Some(slot) => {
                        debug!("Change notification from {:?}", slot);
                        timers.get_mut(slot).notify(Instant::now());
                    }
                    None => {
                        info!("Notification channel closed, scheduler stopping");
                        break;
                    }
                },
                _ = expiry => {
                    let now = Instant::now();
                    for slot in VenueSlot::ALL {
                        if timers.get_mut(slot).fire_if_due(now) {
                            self.fire(Some(slot));
                        }
                    }
                }
                _ = render.tick() => {
                    self.sink.render().await;
                }
            }
        }
    }

    fn fire(&self, source: Option<VenueSlot>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            sink.evaluate(source).await;
        });
    }
}
