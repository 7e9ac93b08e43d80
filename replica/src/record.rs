//! The patient case record and the input used to create one.

use crate::error::Error;

pub const MAX_IMPROVEMENT: u8 = 100;

/// A treatment case as held in the replica.
///
/// Records are replaced wholesale by each snapshot; there is no partial
/// update path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseRecord {
    /// Assigned by the store on create.
    pub id: String,
    /// Empty when the stored document has no name.
    pub name: String,
    pub issue: String,
    pub treatment: String,
    pub routine: String,
    pub result: String,
    /// Percentage in `0..=100`.
    pub improvement: u8,
    /// Milliseconds since the epoch, stamped by the writer.
    pub created_at: Option<i64>,
    /// Display date derived from `created_at` by the writer.
    pub date_str: String,
}

impl CaseRecord {
    /// Sort key for the ordered view. Missing timestamps sort as oldest.
    pub fn created_at_or_zero(&self) -> i64 {
        self.created_at.unwrap_or(0)
    }
}

/// Form input for a new case, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseInput {
    pub name: String,
    pub issue: String,
    pub treatment: String,
    pub routine: String,
    pub result: String,
    /// Raw slider value; clamped on the way out.
    pub improvement: i64,
}

impl CaseInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_empty() {
            return Err(Error::Validation {
                field: "name",
                message: "name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Stamps the input into the fields sent to the store.
    pub(crate) fn into_new_case(self, created_at: i64, date_str: String) -> NewCase {
        NewCase {
            name: self.name,
            issue: self.issue,
            treatment: self.treatment,
            routine: self.routine,
            result: self.result,
            improvement: clamp_improvement(self.improvement),
            created_at,
            date_str,
        }
    }
}

/// The document written to the store by a create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCase {
    pub name: String,
    pub issue: String,
    pub treatment: String,
    pub routine: String,
    pub result: String,
    pub improvement: u8,
    pub created_at: i64,
    pub date_str: String,
}

pub fn clamp_improvement(value: i64) -> u8 {
    value.clamp(0, MAX_IMPROVEMENT as i64) as u8
}
