use thiserror::Error;

/// Closed error type for the engine. Every failure a caller can observe is
/// one of these variants; `Unknown` is the explicit catch-all for errors
/// raised inside host-injected collaborators.
#[derive(Error, Debug)]
pub enum NotelingoError {
    #[error("No language set for {field}. Set a language for this field in the language mapping settings.")]
    MappingMissing { field: String },

    #[error("Deck or note type not found: deck id {deck_id}, note type id {model_id}")]
    ItemNotFound { deck_id: u64, model_id: u64 },

    #[error("Note not found: {note_id}")]
    NoteNotFound { note_id: u64 },

    #[error("Field not found: {field}")]
    FieldNotFound { field: String },

    #[error("No voice selected for language {language}")]
    VoiceNotSet { language: String },

    #[error("Field is empty")]
    EmptyField,

    #[error("Could not load result: {message}")]
    Api { status_code: u16, message: String },

    #[error("Request failed with status {status_code}: {body}")]
    BadStatus { status_code: u16, body: String },

    #[error("Request error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for NotelingoError {
    fn from(error: reqwest::Error) -> Self {
        NotelingoError::Reqwest(Box::new(error))
    }
}

impl From<std::io::Error> for NotelingoError {
    fn from(error: std::io::Error) -> Self {
        NotelingoError::Io(Box::new(error))
    }
}

/// Observability channel supplied by the host. Only `Unknown` errors are
/// routed here; classified errors become user-visible messages instead.
pub trait ErrorReporter {
    fn report(&self, context: &str, error: &NotelingoError);
}

/// Reporter that drops everything, for hosts without an error channel.
pub struct NullReporter;

impl ErrorReporter for NullReporter {
    fn report(&self, _context: &str, _error: &NotelingoError) {}
}

/// Convert an error into the message shown to the user. Unclassified errors
/// are forwarded to the reporter first, then masked behind a generic text.
pub fn user_message(context: &str, error: &NotelingoError, reporter: &dyn ErrorReporter) -> String {
    match error {
        NotelingoError::Unknown(_) => {
            log::error!("unclassified error during {}: {}", context, error);
            reporter.report(context, error);
            format!("An unexpected error occurred during {}", context)
        }
        _ => error.to_string(),
    }
}
