#![allow(dead_code)]

use async_trait::async_trait;
use renta_core::{
    AssistantGateway, FormRecord, FormStore, GatewayError, MemoryStore, Message, Role,
    StoreError, TranscriptStore,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Gateway that answers from a fixed script and records what it was sent
#[derive(Default)]
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, GatewayError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, text: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(&self, err: GatewayError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_transcript(&self) -> Vec<Message> {
        self.seen.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl AssistantGateway for ScriptedGateway {
    async fn complete(&self, transcript: &[Message]) -> Result<String, GatewayError> {
        self.seen.lock().unwrap().push(transcript.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::RemoteUnavailable("script exhausted".into())))
    }

    fn describe(&self) -> String {
        "Scripted".to_string()
    }
}

/// Memory store with switchable failures
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_user_appends: AtomicBool,
    pub fail_assistant_appends: AtomicBool,
    pub fail_form_writes: AtomicBool,
    pub form_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    pub fn form_writes(&self) -> usize {
        self.form_writes.load(Ordering::SeqCst)
    }

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".to_string())
    }
}

impl TranscriptStore for FlakyStore {
    fn append(&self, subject: &str, message: &Message) -> Result<u64, StoreError> {
        let failing = match message.role {
            Role::User => self.fail_user_appends.load(Ordering::SeqCst),
            Role::Assistant => self.fail_assistant_appends.load(Ordering::SeqCst),
            Role::System => false,
        };
        if failing {
            return Err(Self::down());
        }
        self.inner.append(subject, message)
    }

    fn load(&self, subject: &str) -> Result<Vec<Message>, StoreError> {
        self.inner.load(subject)
    }
}

impl FormStore for FlakyStore {
    fn load_form(&self, subject: &str) -> Result<Option<FormRecord>, StoreError> {
        self.inner.load_form(subject)
    }

    fn save_form(&self, subject: &str, record: &FormRecord) -> Result<(), StoreError> {
        if self.fail_form_writes.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        self.form_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_form(subject, record)
    }

    fn onboarding_completed(&self, subject: &str) -> Result<bool, StoreError> {
        self.inner.onboarding_completed(subject)
    }

    fn set_onboarding_completed(&self, subject: &str, completed: bool) -> Result<(), StoreError> {
        self.inner.set_onboarding_completed(subject, completed)
    }
}
