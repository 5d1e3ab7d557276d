use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::config::AlarmConfig;
use super::state::{AlarmEvent, AlarmState, AlarmStateMachine};
use crate::notify::{AlertKind, Notifier};
use crate::sensor::DoorState;
use crate::tracing::prelude::*;

/// Drives an [`AlarmStateMachine`] from the shared door state and turns its
/// events into notifications.
pub struct AlarmMonitor {
    config: AlarmConfig,
    machine: AlarmStateMachine,
    tick_duration: Duration,
    door_rx: watch::Receiver<DoorState>,
    state_tx: watch::Sender<AlarmState>,
    notifier: Notifier,
}

impl AlarmMonitor {
    pub fn new(
        config: AlarmConfig,
        tick_duration: Duration,
        door_rx: watch::Receiver<DoorState>,
        state_tx: watch::Sender<AlarmState>,
        notifier: Notifier,
    ) -> Self {
        Self {
            config,
            machine: AlarmStateMachine::new(config),
            tick_duration,
            door_rx,
            state_tx,
            notifier,
        }
    }

    pub async fn run(mut self, cancellation: CancellationToken) {
        debug!(
            first_alert_s = self.config.first_alert_delay.as_secs(),
            overtime_s = self.config.overtime_delay.as_secs(),
            "Alarm monitor started"
        );
        let mut interval = time::interval(self.tick_duration);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancellation.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        info!("Alarm loop shutting down");
    }

    pub fn current_state(&self) -> AlarmState {
        self.machine.state()
    }

    fn tick(&mut self, now: Instant) {
        let door = *self.door_rx.borrow_and_update();

        for event in self.machine.update(door, now) {
            self.handle(event);
        }

        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = %current, to = %state, "Alarm state changed");
            *current = state;
            true
        });
    }

    fn handle(&self, event: AlarmEvent) {
        match event {
            AlarmEvent::Opened => info!("Switch triggered"),
            AlarmEvent::FirstAlert { elapsed } => {
                info!(
                    elapsed_s = elapsed.as_secs(),
                    threshold_s = self.config.first_alert_delay.as_secs(),
                    "Alarm triggered"
                );
                self.notifier.dispatch(AlertKind::DoorOpen);
            }
            AlarmEvent::OvertimeAlert { elapsed } => {
                info!(
                    elapsed_s = elapsed.as_secs(),
                    threshold_s = self.config.overtime_delay.as_secs(),
                    "Second alarm triggered"
                );
                self.notifier.dispatch(AlertKind::Overtime);
            }
            AlarmEvent::Reset { open_for } => {
                info!(
                    elapsed_s = open_for.as_secs(),
                    "Alarm was reset after {} sec",
                    open_for.as_secs()
                );
            }
            AlarmEvent::Transient { open_for } => {
                info!(
                    elapsed_s = open_for.as_secs(),
                    "Switch was reset within {} sec",
                    open_for.as_secs()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::task::TaskTracker;

    use super::*;
    use crate::notify::MessageTemplates;
    use crate::notify::testing::RecordingClient;

    const TICK: Duration = Duration::from_millis(100);

    struct Harness {
        door_tx: watch::Sender<DoorState>,
        state_rx: watch::Receiver<AlarmState>,
        client: Arc<RecordingClient>,
        tracker: TaskTracker,
    }

    impl Harness {
        fn texts(&self) -> Vec<String> {
            self.client.posts().into_iter().map(|(_, text)| text).collect()
        }

        async fn flush(&self) {
            // Let spawned dispatch tasks run.
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }
    }

    fn monitor() -> (AlarmMonitor, Harness) {
        let (door_tx, door_rx) = watch::channel(DoorState::Closed);
        let (state_tx, state_rx) = watch::channel(AlarmState::Idle);
        let client = Arc::new(RecordingClient::new());
        let tracker = TaskTracker::new();
        let templates = MessageTemplates {
            timestamp_format: "%H:%M".to_string(),
            open_message: "open".to_string(),
            overtime_message: "overtime $DURATION".to_string(),
            overtime_delay: Duration::from_secs(8),
        };
        let notifier = Notifier::new(client.clone(), "C1".to_string(), templates, tracker.clone());
        let monitor = AlarmMonitor::new(AlarmConfig::default(), TICK, door_rx, state_tx, notifier);

        (
            monitor,
            Harness {
                door_tx,
                state_rx,
                client,
                tracker,
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn tick_dispatches_alerts_and_publishes_state() {
        let (mut monitor, h) = monitor();
        let t0 = Instant::now();

        h.door_tx.send_replace(DoorState::Open);
        monitor.tick(t0);
        assert_eq!(*h.state_rx.borrow(), AlarmState::OpenPending);

        monitor.tick(t0 + Duration::from_secs(2));
        h.flush().await;
        assert!(h.texts().is_empty());

        monitor.tick(t0 + Duration::from_secs(3));
        h.flush().await;
        assert_eq!(h.texts(), vec!["open"]);
        assert_eq!(*h.state_rx.borrow(), AlarmState::Alerted);

        monitor.tick(t0 + Duration::from_secs(8));
        h.flush().await;
        assert_eq!(h.texts(), vec!["open", "overtime 8"]);
        assert_eq!(monitor.current_state(), AlarmState::Overtime);

        h.door_tx.send_replace(DoorState::Closed);
        monitor.tick(t0 + Duration::from_secs(9));
        assert_eq!(*h.state_rx.borrow(), AlarmState::Idle);
        assert_eq!(h.texts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_open_sends_nothing() {
        let (monitor, h) = monitor();
        let token = CancellationToken::new();
        let task = tokio::spawn(monitor.run(token.clone()));

        h.door_tx.send_replace(DoorState::Open);
        time::sleep(Duration::from_secs(2)).await;
        h.door_tx.send_replace(DoorState::Closed);
        time::sleep(Duration::from_secs(10)).await;

        token.cancel();
        task.await.unwrap();
        h.tracker.close();
        h.tracker.wait().await;

        assert!(h.client.posts().is_empty());
        assert_eq!(*h.state_rx.borrow(), AlarmState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_escalates_once_per_session() {
        let (monitor, h) = monitor();
        let token = CancellationToken::new();
        let task = tokio::spawn(monitor.run(token.clone()));

        h.door_tx.send_replace(DoorState::Open);
        time::sleep(Duration::from_secs(60)).await;

        token.cancel();
        task.await.unwrap();
        h.tracker.close();
        h.tracker.wait().await;

        assert_eq!(h.texts(), vec!["open", "overtime 8"]);
        assert_eq!(*h.state_rx.borrow(), AlarmState::Overtime);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_within_one_tick_of_cancellation() {
        let (monitor, _h) = monitor();
        let token = CancellationToken::new();
        let task = tokio::spawn(monitor.run(token.clone()));

        time::sleep(Duration::from_secs(1)).await;
        token.cancel();

        time::timeout(TICK, task).await.unwrap().unwrap();
    }
}
