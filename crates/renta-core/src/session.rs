//! One subject's form session: the conversational round-trip and the
//! review-surface edits, in front of the store and the assistant.
//!
//! A round-trip is:
//!
//! 1. append the user message to the transcript store
//! 2. ask the assistant gateway for a reply (the only suspension point)
//! 3. append the reply
//! 4. extract candidates from the (user, reply) pair
//! 5. merge them into the form record and write it if anything changed
//!
//! [`FormSession::send`] takes `&mut self` for the whole round-trip, so a
//! second send for the same subject cannot start until the first has finished.
//! There is no cancellation: once started, a round-trip runs to completion and
//! its merge is applied.
//!
//! When a write fails after the gateway call, the result stays applied in
//! memory and the session is marked unsynced. [`FormSession::sync`] retries the
//! pending writes in order (transcript first, then the form). The form is never
//! written while transcript messages are still pending.

use crate::error::{SessionError, StoreError, WriteStage};
use crate::extract::{ExtractionCandidate, Extractor};
use crate::form::FormRecord;
use crate::gateway::AssistantGateway;
use crate::merge::{merge_with_policy, MergePolicy};
use crate::pdf;
use crate::progress::{self, ProgressSnapshot};
use crate::prompt;
use crate::render::{DocumentRenderer, RenderedDocument};
use crate::schema::Field;
use crate::store::SessionStore;
use crate::transcript::{Message, Role, Transcript};
use std::path::Path;
use std::sync::Arc;

/// Tunables for a session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tax_form: String,
    pub policy: MergePolicy,
    pub extractor: Extractor,
    pub renderer: DocumentRenderer,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tax_form: crate::config::DEFAULT_TAX_FORM.to_string(),
            policy: MergePolicy::default(),
            extractor: Extractor::standard(),
            renderer: DocumentRenderer::default(),
        }
    }
}

/// Outcome of a successful round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTrip {
    pub reply: String,
    pub candidates: Vec<ExtractionCandidate>,
    /// Fields whose value changed because of this exchange
    pub changed: Vec<Field>,
    pub progress: ProgressSnapshot,
}

pub struct FormSession {
    subject: String,
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn AssistantGateway>,
    options: SessionOptions,
    transcript: Transcript,
    form: FormRecord,
    /// Leading transcript messages known to be in the store
    persisted: usize,
    form_dirty: bool,
}

impl FormSession {
    /// Load the subject's transcript and form, seeding a new conversation if
    /// the subject has none.
    ///
    /// Only load failures are returned. If seeding cannot be written the
    /// session still opens, unsynced.
    pub fn open(
        subject: impl Into<String>,
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn AssistantGateway>,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let subject = subject.into();
        let transcript = Transcript::from_messages(store.load(&subject)?);
        let form = store.load_form(&subject)?.unwrap_or_default();
        let persisted = transcript.len();

        let mut session = Self {
            subject,
            store,
            gateway,
            options,
            transcript,
            form,
            persisted,
            form_dirty: false,
        };

        if session.transcript.is_empty() {
            let tax_form = session.options.tax_form.clone();
            session
                .transcript
                .push(Role::System, prompt::system_prompt(&tax_form));
            session
                .transcript
                .push(Role::Assistant, prompt::welcome_message(&tax_form));
            if let Err(e) = session.flush_messages() {
                tracing::warn!("Could not save new conversation for {}: {}", session.subject, e);
            }
        }

        tracing::info!(
            "Opened session for {} ({} messages, {} fields)",
            session.subject,
            session.transcript.len(),
            session.form.len()
        );
        Ok(session)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Messages for the chat surface (no system message)
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.transcript.visible()
    }

    pub fn form(&self) -> &FormRecord {
        &self.form
    }

    pub fn progress(&self) -> ProgressSnapshot {
        progress::snapshot(&self.form)
    }

    pub fn render(&self) -> RenderedDocument {
        self.options.renderer.render(&self.form)
    }

    pub fn export_pdf(&self, path: &Path) -> anyhow::Result<()> {
        pdf::write_pdf(&self.render(), path)
    }

    pub fn gateway_name(&self) -> String {
        self.gateway.describe()
    }

    /// True once the user has exchanged anything beyond the seeded greeting
    pub fn has_conversation(&self) -> bool {
        self.transcript.len() > 2
    }

    /// Whether every local change has reached the store
    pub fn is_synced(&self) -> bool {
        self.persisted == self.transcript.len() && !self.form_dirty
    }

    /// Run a round-trip for `text`
    pub async fn send(&mut self, text: &str) -> Result<RoundTrip, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let message = Message {
            role: Role::User,
            content: text.to_string(),
            sequence: self.transcript.next_sequence(),
        };
        // Earlier pending writes go first so the store keeps a gapless order
        if let Err(source) = self.flush_messages().and_then(|()| self.record(&message)) {
            tracing::warn!("User message for {} not recorded: {}", self.subject, source);
            return Err(SessionError::NotSent {
                text: text.to_string(),
                source,
            });
        }
        self.transcript.push(Role::User, text);
        self.persisted = self.transcript.len();

        self.complete_exchange(text.to_string()).await
    }

    /// Ask for a reply to a user message that was recorded but never answered
    pub async fn retry(&mut self) -> Result<RoundTrip, SessionError> {
        let pending = self
            .transcript
            .unanswered()
            .map(|m| m.content.clone())
            .ok_or(SessionError::NothingPending)?;
        self.complete_exchange(pending).await
    }

    async fn complete_exchange(&mut self, user_text: String) -> Result<RoundTrip, SessionError> {
        tracing::info!(
            "Requesting reply for {} from {}",
            self.subject,
            self.gateway.describe()
        );
        let reply = match self.gateway.complete(self.transcript.messages()).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Assistant failed for {}: {}", self.subject, e);
                return Err(SessionError::Gateway(e));
            }
        };

        self.transcript.push(Role::Assistant, reply.clone());
        let reply_saved = self.flush_messages();

        let candidates = self.options.extractor.extract(&user_text, &reply);
        let mut changed = Vec::new();
        if !candidates.is_empty() {
            let merged = merge_with_policy(&self.form, &candidates, self.options.policy);
            if merged != self.form {
                changed = self.form.changed_fields(&merged);
                self.form = merged;
                self.form_dirty = true;
                tracing::info!("Merged {:?} for {}", changed, self.subject);
            }
        }

        if let Err(source) = reply_saved {
            tracing::warn!("Reply for {} not saved: {}", self.subject, source);
            return Err(SessionError::Persistence {
                stage: WriteStage::Transcript,
                source,
            });
        }
        if self.form_dirty {
            self.write_form()?;
        }

        Ok(RoundTrip {
            reply,
            candidates,
            changed,
            progress: self.progress(),
        })
    }

    /// Apply a review-surface edit in memory. An empty value unsets the field.
    pub fn edit_field(&mut self, field: Field, value: &str) -> Result<(), SessionError> {
        if !field.accepts(value) {
            return Err(SessionError::InvalidValue {
                field,
                value: value.to_string(),
            });
        }
        let before = self.form.clone();
        self.form.edit(field, value);
        if self.form != before {
            self.form_dirty = true;
        }
        Ok(())
    }

    /// Persist the form record (after any pending transcript messages)
    pub fn save_form(&mut self) -> Result<(), SessionError> {
        self.flush_messages()
            .map_err(|source| SessionError::Persistence {
                stage: WriteStage::Transcript,
                source,
            })?;
        self.write_form()
    }

    /// Retry every write a previous failure left pending
    pub fn sync(&mut self) -> Result<(), SessionError> {
        self.flush_messages()
            .map_err(|source| SessionError::Persistence {
                stage: WriteStage::Transcript,
                source,
            })?;
        if self.form_dirty {
            self.write_form()?;
        }
        Ok(())
    }

    pub fn onboarding_completed(&self) -> Result<bool, SessionError> {
        Ok(self.store.onboarding_completed(&self.subject)?)
    }

    pub fn complete_onboarding(&self) -> Result<(), SessionError> {
        self.store
            .set_onboarding_completed(&self.subject, true)
            .map_err(|source| SessionError::Persistence {
                stage: WriteStage::Onboarding,
                source,
            })
    }

    fn write_form(&mut self) -> Result<(), SessionError> {
        match self.store.save_form(&self.subject, &self.form) {
            Ok(()) => {
                self.form_dirty = false;
                Ok(())
            }
            Err(source) => {
                tracing::warn!("Form for {} not saved: {}", self.subject, source);
                Err(SessionError::Persistence {
                    stage: WriteStage::Form,
                    source,
                })
            }
        }
    }

    /// Append every message after `persisted`, in order
    fn flush_messages(&mut self) -> Result<(), StoreError> {
        while self.persisted < self.transcript.len() {
            let message = self.transcript.messages()[self.persisted].clone();
            self.record(&message)?;
            self.persisted += 1;
        }
        Ok(())
    }

    /// Append one message. A rejection caused by an earlier attempt that did
    /// land (same sequence, same content) counts as recorded.
    fn record(&self, message: &Message) -> Result<(), StoreError> {
        match self.store.append(&self.subject, message) {
            Ok(_) => Ok(()),
            Err(StoreError::Rejected(reason)) => {
                let stored = self.store.load(&self.subject)?;
                if stored.iter().any(|m| m == message) {
                    tracing::debug!("Message {} was already recorded", message.sequence);
                    Ok(())
                } else {
                    Err(StoreError::Rejected(reason))
                }
            }
            Err(e) => Err(e),
        }
    }
}
