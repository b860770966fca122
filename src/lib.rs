pub mod anki;
pub mod batch;
pub mod cloud;
pub mod config;
pub mod core;
pub mod detect;
pub mod editor;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::{
    anki::{DeckNoteType, DeckNoteTypeField, NoteStore},
    batch::{BatchExecutor, BatchSummary},
    cloud::{CloudLanguageTools, LanguageService, ServiceCatalog},
    config::{ConfigStore, NotelingoConfig, RuleStore},
    core::{errors::user_message, ErrorReporter, NotelingoError, NullReporter},
    editor::LiveUpdater,
    text::TransformationType,
};
