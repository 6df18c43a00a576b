//!Threshold rules that turn a freshly stored reading into zero or more alerts.
//!
//!Each reading kind owns a static table of [`Rule`]s. A rule reads one field, and every rule is
//!checked on its own, so a reading with three bad fields raises three alerts. Missing fields are
//!skipped. Comparisons are strict unless the limit says otherwise, so a value sitting exactly on a
//!bound raises nothing.

use std::fmt;

use tracing::debug;

use crate::{
    alert::{Alert, AlertSource, Level},
    reading::{Environment, Health, TextLog},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    Below(f64),
    AtOrBelow(f64),
    Above(f64),
}

impl Limit {
    fn crossed(self, value: f64) -> bool {
        match self {
            Self::Below(bound) => value < bound,
            Self::AtOrBelow(bound) => value <= bound,
            Self::Above(bound) => value > bound,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Below(bound) => write!(f, "below {bound}"),
            Self::AtOrBelow(bound) => write!(f, "at or below {bound}"),
            Self::Above(bound) => write!(f, "above {bound}"),
        }
    }
}

///One row of a threshold table.
///
///`limits` raise an alert at `level`; `critical` limits (tighter, possibly empty) escalate it.
pub struct Rule<R> {
    pub title: &'static str,
    pub metric: &'static str,
    pub unit: &'static str,
    pub read: fn(&R) -> Option<f64>,
    pub level: Level,
    pub limits: &'static [Limit],
    pub critical: &'static [Limit],
}

impl<R> Rule<R> {
    pub fn check(&self, reading: &R, source: AlertSource) -> Option<Alert> {
        let value = (self.read)(reading)?;
        let (level, limit) = match self.critical.iter().find(|l| l.crossed(value)) {
            Some(limit) => (Level::Critical, limit),
            None => (self.level, self.limits.iter().find(|l| l.crossed(value))?),
        };
        let message = format!(
            "{} is {value:.1}{unit}, {limit}{unit}",
            self.metric,
            unit = self.unit
        );
        Some(Alert::new(level, self.title, message, source))
    }
}

///A reading kind with a threshold table.
pub trait Rated: Sized + 'static {
    const SOURCE: AlertSource;

    fn rules() -> &'static [Rule<Self>];
}

///Runs every rule for the reading's kind and returns the alerts raised, in table order.
pub fn evaluate<R: Rated>(reading: &R) -> Vec<Alert> {
    let alerts: Vec<Alert> = R::rules()
        .iter()
        .filter_map(|rule| rule.check(reading, R::SOURCE))
        .collect();
    debug!("evaluated {:?} reading: {} alert(s)", R::SOURCE, alerts.len());
    alerts
}

static ENVIRONMENT_RULES: [Rule<Environment>; 4] = [
    Rule {
        title: "temperature anomaly",
        metric: "temperature",
        unit: "°C",
        read: |env| env.temperature,
        level: Level::Warn,
        limits: &[Limit::Below(16.0), Limit::Above(29.0)],
        critical: &[Limit::Below(14.0), Limit::Above(31.0)],
    },
    Rule {
        title: "humidity discomfort",
        metric: "humidity",
        unit: "%",
        read: |env| env.humidity,
        level: Level::Warn,
        limits: &[Limit::Below(30.0), Limit::Above(75.0)],
        critical: &[],
    },
    Rule {
        title: "low light",
        metric: "light",
        unit: " lux",
        read: |env| env.light_lux,
        level: Level::Info,
        limits: &[Limit::Below(50.0)],
        critical: &[],
    },
    Rule {
        title: "excessive noise",
        metric: "noise",
        unit: " dB",
        read: |env| env.noise_db,
        level: Level::Warn,
        limits: &[Limit::Above(65.0)],
        critical: &[Limit::Above(80.0)],
    },
];

static TEXT_RULES: [Rule<TextLog>; 1] = [Rule {
    title: "low mood",
    metric: "sentiment",
    unit: "",
    read: |log| log.sentiment,
    level: Level::Warn,
    limits: &[Limit::AtOrBelow(-0.5)],
    critical: &[],
}];

static HEALTH_RULES: [Rule<Health>; 2] = [
    Rule {
        title: "abnormal heart rate",
        metric: "heart rate",
        unit: " bpm",
        read: |health| health.heart_rate.map(f64::from),
        level: Level::Warn,
        limits: &[Limit::Below(55.0), Limit::Above(130.0)],
        critical: &[Limit::Below(45.0), Limit::Above(150.0)],
    },
    Rule {
        title: "low blood oxygen",
        metric: "SpO2",
        unit: "%",
        read: |health| health.spo2,
        level: Level::Warn,
        limits: &[Limit::Below(94.0)],
        critical: &[Limit::Below(90.0)],
    },
];

impl Rated for Environment {
    const SOURCE: AlertSource = AlertSource::Environment;

    fn rules() -> &'static [Rule<Self>] {
        &ENVIRONMENT_RULES
    }
}

impl Rated for TextLog {
    const SOURCE: AlertSource = AlertSource::Text;

    fn rules() -> &'static [Rule<Self>] {
        &TEXT_RULES
    }
}

impl Rated for Health {
    const SOURCE: AlertSource = AlertSource::Health;

    fn rules() -> &'static [Rule<Self>] {
        &HEALTH_RULES
    }
}
