pub mod ai;
pub mod config;
pub mod error;
pub mod extract;
pub mod form;
pub mod gateway;
pub mod merge;
pub mod pdf;
pub mod progress;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod schema;
pub mod session;
pub mod store;
pub mod transcript;

// Re-export main types for convenience
pub use ai::{build_gateway, ClaudeClient, OllamaClient, OpenAIClient};
pub use config::Config;
pub use error::{GatewayError, SessionError, StoreError, WriteStage};
pub use extract::{ExtractionCandidate, Extractor, Rule};
pub use form::FormRecord;
pub use gateway::AssistantGateway;
pub use merge::{merge, merge_with_policy, MergePolicy};
pub use progress::{snapshot, ProgressSnapshot, ProgressStatus};
pub use provider::Provider;
pub use render::{render, DocumentRenderer, Instruction, PageLayout, RenderedDocument};
pub use schema::{Field, Section};
pub use session::{FormSession, RoundTrip, SessionOptions};
pub use store::{FormStore, MemoryStore, SessionStore, SqliteStore, TranscriptStore};
pub use transcript::{Message, Role, Transcript};
