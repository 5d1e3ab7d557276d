//! Escalating door-open alarm.
//!
//! # State Machine
//!
//! ```text
//!        open                 elapsed >= first           elapsed >= overtime
//!  Idle ──────► OpenPending ─────────────────► Alerted ─────────────────────► Overtime
//!   ▲               │                             │                              │
//!   │   closed      │          closed             │           closed             │
//!   └───────────────┴─────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! - **Idle:** door closed, no session.
//! - **OpenPending:** door open, still inside the first-alert window. Closing
//!   here is a transient open and produces no alert.
//! - **Alerted:** first alert sent. Latched until the door closes.
//! - **Overtime:** overtime alert sent. Latched until the door closes.
//!
//! [`AlarmStateMachine::update`] returns the [`AlarmEvent`]s for the edges
//! crossed on that tick; the caller decides what to do with them.

use std::time::Duration;

use strum::Display;
use tokio::time::Instant;

use super::config::AlarmConfig;
use crate::sensor::DoorState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    #[default]
    Idle,
    OpenPending,
    Alerted,
    Overtime,
}

/// One continuous open interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmSession {
    opened_at: Instant,
    first_alert_sent: bool,
    overtime_alert_sent: bool,
}

impl AlarmSession {
    fn new(opened_at: Instant) -> Self {
        Self {
            opened_at,
            first_alert_sent: false,
            overtime_alert_sent: false,
        }
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn first_alert_sent(&self) -> bool {
        self.first_alert_sent
    }

    pub fn overtime_alert_sent(&self) -> bool {
        self.overtime_alert_sent
    }

    fn state(&self) -> AlarmState {
        match (self.first_alert_sent, self.overtime_alert_sent) {
            (_, true) => AlarmState::Overtime,
            (true, false) => AlarmState::Alerted,
            (false, false) => AlarmState::OpenPending,
        }
    }
}

/// Edge crossed during an [`AlarmStateMachine::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    /// Door went from closed to open; a session started.
    Opened,

    /// First threshold crossed. Emitted once per session.
    FirstAlert { elapsed: Duration },

    /// Overtime threshold crossed. Emitted once per session, always after
    /// [`FirstAlert`](AlarmEvent::FirstAlert).
    OvertimeAlert { elapsed: Duration },

    /// Door closed after at least the first alert went out.
    Reset { open_for: Duration },

    /// Door closed before the first threshold.
    Transient { open_for: Duration },
}

#[derive(Debug)]
pub struct AlarmStateMachine {
    config: AlarmConfig,
    session: Option<AlarmSession>,
}

impl AlarmStateMachine {
    pub fn new(config: AlarmConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.session
            .as_ref()
            .map_or(AlarmState::Idle, AlarmSession::state)
    }

    pub fn session(&self) -> Option<&AlarmSession> {
        self.session.as_ref()
    }

    /// Advance the machine with the door state sampled at `now`.
    ///
    /// | State | door | Events |
    /// |-------|------|--------|
    /// | Idle | closed | none |
    /// | Idle | open | `Opened`, plus any thresholds already due |
    /// | OpenPending/Alerted | open | `FirstAlert` and/or `OvertimeAlert` when due |
    /// | Overtime | open | none |
    /// | any session | closed | `Reset` or `Transient` |
    pub fn update(&mut self, door: DoorState, now: Instant) -> Vec<AlarmEvent> {
        let mut events = Vec::new();

        if !door.is_open() {
            if let Some(session) = self.session.take() {
                let open_for = now.saturating_duration_since(session.opened_at);
                events.push(if session.first_alert_sent {
                    AlarmEvent::Reset { open_for }
                } else {
                    AlarmEvent::Transient { open_for }
                });
            }
            return events;
        }

        let session = self.session.get_or_insert_with(|| {
            events.push(AlarmEvent::Opened);
            AlarmSession::new(now)
        });
        let elapsed = now.saturating_duration_since(session.opened_at);

        if !session.first_alert_sent && elapsed >= self.config.first_alert_delay {
            session.first_alert_sent = true;
            events.push(AlarmEvent::FirstAlert { elapsed });
        }

        if session.first_alert_sent
            && !session.overtime_alert_sent
            && elapsed >= self.config.overtime_delay
        {
            session.overtime_alert_sent = true;
            events.push(AlarmEvent::OvertimeAlert { elapsed });
        }

        events
    }
}
