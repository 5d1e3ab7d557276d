mod config;
mod monitor;
mod state;

pub use config::AlarmConfig;
pub use monitor::AlarmMonitor;
pub use state::{AlarmEvent, AlarmSession, AlarmState, AlarmStateMachine};
