use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The stable identifier of a record
///
/// The same id is used for the record itself, the cache index and the backing store key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A single record of the population
///
/// Records are never mutated once loaded. The group is the categorical attribute used to measure
/// skew, it is stored under the `street` column by the event scraper. Every other field is carried
/// through untouched in the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, rename = "street")]
    pub group: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, group: Option<&str>) -> Self {
        Self {
            id: id.into(),
            group: group.map(str::to_owned),
            payload: Map::new(),
        }
    }

    /// Adds an opaque payload field, mostly useful when building populations by hand
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(name.to_owned(), value.into());
        self
    }

    /// The value written to the backing store for this record
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
