use case_store_types::cases;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

pub const ID_LEN: usize = 20;

/// A case document as stored in one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCase {
    pub id: String,
    pub name: Option<String>,
    pub issue: String,
    pub treatment: String,
    pub routine: String,
    pub improvement: i64,
    pub result: String,
    pub created_at: Option<i64>,
    pub date_str: String,
    pub stored_at: i64,
}

impl StoredCase {
    /// A freshly written document with a new random id.
    pub fn new(fields: cases::NewCase) -> Self {
        Self {
            id: new_id(),
            name: Some(fields.name),
            issue: fields.issue,
            treatment: fields.treatment,
            routine: fields.routine,
            improvement: fields.improvement,
            result: fields.result,
            created_at: Some(fields.created_at),
            date_str: fields.date_str,
            stored_at: Utc::now().timestamp_millis(),
        }
    }
}

impl From<StoredCase> for cases::CaseRecord {
    fn from(case: StoredCase) -> Self {
        Self {
            id: case.id,
            name: case.name,
            issue: case.issue,
            treatment: case.treatment,
            routine: case.routine,
            improvement: case.improvement,
            result: case.result,
            created_at: case.created_at,
            date_str: case.date_str,
        }
    }
}

pub fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}
