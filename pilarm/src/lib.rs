//! pilarm watches a door switch and posts staged Slack alerts when the door
//! stays open too long.
//!
//! A handful of cooperating tasks share two pieces of state: the latest door
//! reading (a `watch` channel written by the sensor sampler or the manual
//! override) and the shutdown token. The alarm monitor samples the door at a
//! fixed cadence and fires notifications on escalation edges.

pub mod alarm;
pub mod config;
pub mod daemon;
pub mod error;
pub mod gpio;
pub mod notify;
pub mod sensor;
pub mod shutdown;
pub mod status_light;
pub mod tracing;
