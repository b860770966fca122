use std::collections::BTreeSet;

use rand::seq::IndexedRandom;

use crate::{
    anki::{
        DeckNoteType,
        DeckNoteTypeField,
        NoteId,
        NoteStore,
    },
    cloud::LanguageService,
    config::{
        ConfigStore,
        FieldLanguage,
        RuleStore,
    },
    core::{
        tasks::ProgressSink,
        NotelingoError,
    },
};

/// Cap on how many field values are sent per detection request.
const SAMPLE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub fields_assigned: usize,
    pub languages_found: BTreeSet<String>,
}

/// Sample a field's non-empty values and ask the service which language
/// they are in. `None` when the field holds no data to detect from.
async fn detect_field_language<S: NoteStore>(
    notes: &S,
    service: &dyn LanguageService,
    field: &DeckNoteTypeField,
    note_ids: &[NoteId],
) -> Result<Option<String>, NotelingoError> {
    let mut values = Vec::new();
    for &note_id in note_ids {
        let value = notes.get_field(note_id, &field.field_name)?;
        if !value.is_empty() {
            values.push(value);
        }
    }
    if values.is_empty() {
        return Ok(None);
    }

    let sample: Vec<String> = if values.len() <= SAMPLE_SIZE {
        values
    } else {
        values.choose_multiple(&mut rand::rng(), SAMPLE_SIZE).cloned().collect()
    };

    let language = service.detect(&sample).await?;
    Ok(Some(language))
}

/// One-off detection for a single field, used when the user asks for a
/// suggestion while mapping languages.
pub async fn guess_language<S: NoteStore>(
    notes: &S,
    service: &dyn LanguageService,
    field: &DeckNoteTypeField,
) -> Result<Option<String>, NotelingoError> {
    let note_ids = notes.notes_for(&field.deck_note_type);
    detect_field_language(notes, service, field, &note_ids).await
}

/// Detect and store a language for every field of every populated
/// (deck, note type) pair. Pairs whose ids no longer resolve are skipped;
/// detected languages land in the rule store and in `wanted_languages`.
pub async fn run_language_detection<S: NoteStore, C: ConfigStore>(
    notes: &S,
    rules: &mut RuleStore<C>,
    service: &dyn LanguageService,
    progress: &dyn ProgressSink,
) -> Result<DetectionOutcome, NotelingoError> {
    let pairs = notes.populated_deck_models();
    let total = pairs.len();
    let mut outcome = DetectionOutcome::default();

    for (step, (deck_id, model_id)) in pairs.into_iter().enumerate() {
        let deck_note_type = match DeckNoteType::resolve(notes, deck_id, model_id) {
            Ok(deck_note_type) => deck_note_type,
            Err(error @ NotelingoError::ItemNotFound { .. }) => {
                log::warn!("skipping stale deck/model pair: {}", error);
                progress.progress(step + 1, total);
                continue;
            }
            Err(error) => return Err(error),
        };

        let note_ids = notes.notes_for(&deck_note_type);
        if !note_ids.is_empty() {
            for field_name in notes.field_names(model_id)? {
                let field = deck_note_type.field(&field_name);
                if let Some(language) =
                    detect_field_language(notes, service, &field, &note_ids).await?
                {
                    log::debug!("detected {} for {}", language, field);
                    rules.set_language(&field, FieldLanguage::code(&language))?;
                    outcome.fields_assigned += 1;
                    outcome.languages_found.insert(language);
                }
            }
        }
        progress.progress(step + 1, total);
    }

    Ok(outcome)
}
