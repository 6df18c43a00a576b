//!Core types for the nest monitoring backend. All other nest crates depend on this one.
//!
//!This includes the reading kinds a remote device reports, the alerts derived from them, and the
//!declarative threshold table that turns the former into the latter.

pub mod alert;
pub mod error;
pub mod reading;
pub mod rules;
pub mod sentiment;
pub mod subject;

pub use alert::{Alert, AlertSource, Level};
pub use reading::{Environment, Health, Reminder, TextLog};
pub use rules::{evaluate, Rated};
pub use subject::SubjectId;
