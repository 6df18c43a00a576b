//!Records reported by the remote device, plus the inbound payload shapes they are mapped from.
//!
//!Payloads (`*In`) are what a client posts. Each one maps into a `(SubjectId, record)` pair through
//![`Submission::into_record`], so the stored record never depends on how the payload happens to be laid out.

use serde::{Deserialize, Serialize};

use crate::{error::InputError, sentiment, subject::SubjectId};

///Room conditions around the child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light_lux: Option<f64>,
    pub noise_db: Option<f64>,
}

///A free-text mood log and its sentiment score in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLog {
    pub content: String,
    pub sentiment: Option<f64>,
}

///Vitals from a wearable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub heart_rate: Option<i32>,
    pub spo2: Option<f64>,
}

///A recurring caregiver reminder. `cron` is a simplified rule such as `DAILY 20:30`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub title: String,
    pub cron: String,
    pub channel: String,
}

pub const DEFAULT_CHANNEL: &str = "multi";

pub trait Submission {
    type Record;

    fn into_record(self) -> Result<(SubjectId, Self::Record), InputError>;
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentIn {
    pub child_id: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub light_lux: Option<f64>,
    pub noise_db: Option<f64>,
}

impl Submission for EnvironmentIn {
    type Record = Environment;

    fn into_record(self) -> Result<(SubjectId, Environment), InputError> {
        let subject = SubjectId::normalize(self.child_id.as_deref());
        let record = Environment {
            temperature: self.temperature,
            humidity: self.humidity,
            light_lux: self.light_lux,
            noise_db: self.noise_db,
        };
        Ok((subject, record))
    }
}

///`content` carries the child's words, `text` is accepted from clients that log transcripts under that name.
#[derive(Debug, Default, Deserialize)]
pub struct TextLogIn {
    pub child_id: Option<String>,
    pub content: Option<String>,
    pub text: Option<String>,
    pub sentiment: Option<f64>,
}

impl Submission for TextLogIn {
    type Record = TextLog;

    fn into_record(self) -> Result<(SubjectId, TextLog), InputError> {
        let subject = SubjectId::normalize(self.child_id.as_deref());
        let content = [self.content, self.text]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_owned())
            .find(|s| !s.is_empty())
            .ok_or(InputError::EmptyText)?;
        let sentiment = self
            .sentiment
            .unwrap_or_else(|| sentiment::score(&content));
        Ok((
            subject,
            TextLog {
                content,
                sentiment: Some(sentiment),
            },
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthIn {
    pub child_id: Option<String>,
    pub heart_rate: Option<i32>,
    pub spo2: Option<f64>,
}

impl Submission for HealthIn {
    type Record = Health;

    fn into_record(self) -> Result<(SubjectId, Health), InputError> {
        let subject = SubjectId::normalize(self.child_id.as_deref());
        Ok((
            subject,
            Health {
                heart_rate: self.heart_rate,
                spo2: self.spo2,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReminderIn {
    pub child_id: Option<String>,
    pub title: String,
    pub cron: String,
    pub channel: Option<String>,
}

impl Submission for ReminderIn {
    type Record = Reminder;

    fn into_record(self) -> Result<(SubjectId, Reminder), InputError> {
        let subject = SubjectId::normalize(self.child_id.as_deref());
        let channel = self
            .channel
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_owned());
        Ok((
            subject,
            Reminder {
                title: self.title,
                cron: self.cron,
                channel,
            },
        ))
    }
}
