//! Error types for the form assembly pipeline
//!
//! None of these are fatal. Every failure leaves the session usable and can be
//! recovered from by retrying the send.

use crate::schema::Field;

/// The backing store was unreachable or rejected a write
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Rejected(err.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => StoreError::Corrupt(err.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// The assistant could not produce a reply
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("assistant unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("assistant rate limited: {0}")]
    RateLimited(String),

    #[error("invalid assistant response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::RemoteUnavailable(err.to_string())
        }
    }
}

/// Which write of a round-trip failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Transcript,
    Form,
    Onboarding,
}

/// Errors surfaced by a [`crate::session::FormSession`]
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("no unanswered message to retry")]
    NothingPending,

    /// The user message could not be recorded; nothing was sent and the
    /// text is handed back so it can be restored to the input.
    #[error("could not record message: {source}")]
    NotSent {
        text: String,
        #[source]
        source: StoreError,
    },

    /// The round-trip was applied locally but a later write failed
    #[error("changes not saved ({stage:?}): {source}")]
    Persistence {
        stage: WriteStage,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: Field, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Short Spanish notification for the user
    pub fn notice(&self) -> &'static str {
        match self {
            SessionError::EmptyMessage => "Escribe un mensaje antes de enviarlo",
            SessionError::NothingPending => "No hay ningún mensaje pendiente de respuesta",
            SessionError::NotSent { .. } => "No se pudo enviar tu mensaje",
            SessionError::Persistence { .. } | SessionError::Store(_) => {
                "No se pudieron guardar los cambios"
            }
            SessionError::Gateway(GatewayError::RateLimited(_)) => {
                "El asistente está saturado, inténtalo de nuevo en unos segundos"
            }
            SessionError::Gateway(_) => "No se pudo procesar tu mensaje",
            SessionError::InvalidValue { .. } => "El valor introducido no es válido",
        }
    }
}
