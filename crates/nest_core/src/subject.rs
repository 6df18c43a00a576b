use std::fmt;

use serde::{Deserialize, Serialize};

///Identifier used whenever a caller leaves the subject out.
pub const DEFAULT_SUBJECT: &str = "default";

///Identifies the monitored child a record belongs to.
///
///Every create and list path goes through [`SubjectId::normalize`], so writers that omit the id
///and readers that omit the id land on the same records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(id) if !id.is_empty() => SubjectId(id.to_owned()),
            _ => SubjectId::default(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        SubjectId(DEFAULT_SUBJECT.to_owned())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
