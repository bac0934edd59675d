//! Persistence boundary: a document store keyed by subject id.
//!
//! Each subject owns two logical documents, the transcript and the form
//! record, plus the onboarding flag. Writes are not transactional across the
//! two documents; callers append to the transcript before writing the form.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::form::FormRecord;
use crate::transcript::Message;

/// Append-only message log
pub trait TranscriptStore: Send + Sync {
    /// Record `message` and return its sequence number. Sequences must be
    /// strictly increasing per subject; anything else is rejected.
    ///
    /// On error the message may or may not have been recorded.
    fn append(&self, subject: &str, message: &Message) -> Result<u64, StoreError>;

    /// All messages for `subject` in increasing sequence order. Empty when
    /// the subject has no transcript yet.
    fn load(&self, subject: &str) -> Result<Vec<Message>, StoreError>;
}

/// Form record and onboarding flag
pub trait FormStore: Send + Sync {
    fn load_form(&self, subject: &str) -> Result<Option<FormRecord>, StoreError>;

    /// Replace the stored record. Last write wins.
    fn save_form(&self, subject: &str, record: &FormRecord) -> Result<(), StoreError>;

    fn onboarding_completed(&self, subject: &str) -> Result<bool, StoreError>;

    fn set_onboarding_completed(&self, subject: &str, completed: bool) -> Result<(), StoreError>;
}

/// Everything a form session needs from persistence
pub trait SessionStore: TranscriptStore + FormStore {}

impl<T: TranscriptStore + FormStore> SessionStore for T {}

/// Shared check for [`TranscriptStore::append`] implementations
pub(crate) fn check_sequence(last: Option<u64>, message: &Message) -> Result<(), StoreError> {
    match last {
        Some(last) if message.sequence <= last => Err(StoreError::Rejected(format!(
            "sequence {} is not after {}",
            message.sequence, last
        ))),
        _ => Ok(()),
    }
}
