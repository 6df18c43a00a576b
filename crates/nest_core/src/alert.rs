use std::fmt;

use serde::{Deserialize, Serialize};

///Severity tier, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Critical,
}

///Which kind of reading raised an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Environment,
    Text,
    Health,
    Other,
}

///A notification derived from a reading. Title and message are baked in when the alert is raised,
///so it stays a snapshot of what was seen at that moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: Level,
    pub title: String,
    pub message: String,
    pub source: AlertSource,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(level: Level, title: &str, message: String, source: AlertSource) -> Self {
        Alert {
            level,
            title: title.to_owned(),
            message,
            source,
            acknowledged: false,
        }
    }

    ///Marks the alert as seen. Returns `false` if it already was.
    pub fn acknowledge(&mut self) -> bool {
        !std::mem::replace(&mut self.acknowledged, true)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warn => f.write_str("warn"),
            Self::Critical => f.write_str("critical"),
        }
    }
}
