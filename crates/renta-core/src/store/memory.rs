use super::{check_sequence, FormStore, TranscriptStore};
use crate::error::StoreError;
use crate::form::FormRecord;
use crate::transcript::Message;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct SubjectDocs {
    messages: Vec<Message>,
    form: Option<FormRecord>,
    onboarding_completed: bool,
}

/// In-process store, lost when dropped
#[derive(Default)]
pub struct MemoryStore {
    subjects: Mutex<HashMap<String, SubjectDocs>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, SubjectDocs>>, StoreError> {
        self.subjects
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl TranscriptStore for MemoryStore {
    fn append(&self, subject: &str, message: &Message) -> Result<u64, StoreError> {
        let mut subjects = self.lock()?;
        let docs = subjects.entry(subject.to_string()).or_default();
        check_sequence(docs.messages.last().map(|m| m.sequence), message)?;
        docs.messages.push(message.clone());
        Ok(message.sequence)
    }

    fn load(&self, subject: &str) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .lock()?
            .get(subject)
            .map(|d| d.messages.clone())
            .unwrap_or_default())
    }
}

impl FormStore for MemoryStore {
    fn load_form(&self, subject: &str) -> Result<Option<FormRecord>, StoreError> {
        Ok(self.lock()?.get(subject).and_then(|d| d.form.clone()))
    }

    fn save_form(&self, subject: &str, record: &FormRecord) -> Result<(), StoreError> {
        self.lock()?.entry(subject.to_string()).or_default().form = Some(record.clone());
        Ok(())
    }

    fn onboarding_completed(&self, subject: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .get(subject)
            .map_or(false, |d| d.onboarding_completed))
    }

    fn set_onboarding_completed(&self, subject: &str, completed: bool) -> Result<(), StoreError> {
        self.lock()?
            .entry(subject.to_string())
            .or_default()
            .onboarding_completed = completed;
        Ok(())
    }
}
