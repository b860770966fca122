use std::{
    fmt,
    hash::{
        Hash,
        Hasher,
    },
    path::Path,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::core::NotelingoError;

pub type DeckId = u64;
pub type ModelId = u64;
pub type NoteId = u64;

/// A (deck, note type) pair. Identity lives in the id pair; the names are
/// resolved for display and for the name-keyed rule store, and may drift
/// after a rename without breaking identity.
#[derive(Debug, Clone)]
pub struct DeckNoteType {
    pub deck_id: DeckId,
    pub deck_name: String,
    pub model_id: ModelId,
    pub model_name: String,
}

impl PartialEq for DeckNoteType {
    fn eq(&self, other: &Self) -> bool {
        self.deck_id == other.deck_id && self.model_id == other.model_id
    }
}

impl Eq for DeckNoteType {}

impl Hash for DeckNoteType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.deck_id.hash(state);
        self.model_id.hash(state);
    }
}

impl fmt::Display for DeckNoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.model_name, self.deck_name)
    }
}

impl DeckNoteType {
    /// Resolve display names for an id pair through the host. Fails when
    /// either id no longer exists, e.g. after a deck was deleted while its
    /// mapping lingered in the rule store.
    pub fn resolve(
        store: &dyn NoteStore,
        deck_id: DeckId,
        model_id: ModelId,
    ) -> Result<Self, NotelingoError> {
        let deck_name = store
            .deck_name(deck_id)
            .ok_or(NotelingoError::ItemNotFound { deck_id, model_id })?;
        let model_name = store
            .model_name(model_id)
            .ok_or(NotelingoError::ItemNotFound { deck_id, model_id })?;
        Ok(Self { deck_id, deck_name, model_id, model_name })
    }

    /// Identity of the note/card pair open in an editor: the note carries
    /// the note type, the card carries the deck.
    pub fn from_note_card(
        store: &dyn NoteStore,
        note: &NoteInfo,
        card: &CardInfo,
    ) -> Result<Self, NotelingoError> {
        Self::resolve(store, card.deck_id, note.model_id)
    }

    pub fn field(&self, field_name: &str) -> DeckNoteTypeField {
        DeckNoteTypeField { deck_note_type: self.clone(), field_name: field_name.to_string() }
    }

    /// Field at an editor-side ordinal, as reported by field-edit events.
    pub fn field_at_index(
        &self,
        store: &dyn NoteStore,
        field_index: usize,
    ) -> Result<DeckNoteTypeField, NotelingoError> {
        let field_names = store.field_names(self.model_id)?;
        let field_name = field_names.get(field_index).ok_or(NotelingoError::FieldNotFound {
            field: format!("{} / index {}", self, field_index),
        })?;
        Ok(self.field(field_name))
    }
}

/// A single field on a note type within a deck: the unit of language
/// assignment and the endpoint of every rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeckNoteTypeField {
    pub deck_note_type: DeckNoteType,
    pub field_name: String,
}

impl DeckNoteTypeField {
    pub fn model_name(&self) -> &str {
        &self.deck_note_type.model_name
    }

    pub fn deck_name(&self) -> &str {
        &self.deck_note_type.deck_name
    }
}

impl fmt::Display for DeckNoteTypeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.deck_note_type, self.field_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub note_id: NoteId,
    pub model_id: ModelId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    pub card_id: u64,
    pub deck_id: DeckId,
}

/// Host-side note storage. The engine never touches collection storage
/// directly; everything goes through this interface.
pub trait NoteStore {
    fn deck_name(&self, deck_id: DeckId) -> Option<String>;

    fn model_name(&self, model_id: ModelId) -> Option<String>;

    /// Field names of a note type, in editor order.
    fn field_names(&self, model_id: ModelId) -> Result<Vec<String>, NotelingoError>;

    fn get_field(&self, note_id: NoteId, field_name: &str) -> Result<String, NotelingoError>;

    fn set_field(
        &mut self,
        note_id: NoteId,
        field_name: &str,
        value: &str,
    ) -> Result<(), NotelingoError>;

    /// Flush a modified note back to the collection.
    fn persist_note(&mut self, note_id: NoteId) -> Result<(), NotelingoError>;

    /// Every (deck, note type) pair that has at least one note.
    fn populated_deck_models(&self) -> Vec<(DeckId, ModelId)>;

    fn notes_for(&self, deck_note_type: &DeckNoteType) -> Vec<NoteId>;

    /// Import a generated media file into the collection, returning the
    /// filename to reference from a sound tag. De-duplication of identical
    /// files is the host's concern.
    fn import_media_file(&mut self, path: &Path) -> Result<String, NotelingoError>;
}
