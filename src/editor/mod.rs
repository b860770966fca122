use std::sync::Arc;

use serde_json::json;

use crate::{
    anki::{
        DeckNoteType,
        NoteId,
        NoteStore,
    },
    cloud::LanguageService,
    config::{
        ConfigStore,
        RuleStore,
        StoredRule,
    },
    core::{
        tasks::{
            LivePayload,
            TaskManager,
            TaskResult,
        },
        NotelingoError,
    },
    text,
};

/// A single field edit reported by the host editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    pub note_id: NoteId,
    pub field_index: usize,
    pub text: String,
}

/// What the foreground loop observes after draining completed work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    FieldUpdated { note_id: NoteId, field_name: String, value: String },
    Error { message: String },
}

/// As-you-type rule replay. Every edit fans out into one background task
/// per dependent rule; completions are applied by `apply_completed`, called
/// from the foreground loop, and only while the originating note is still
/// the active one. Navigating away silently discards in-flight results.
pub struct LiveUpdater {
    tasks: TaskManager,
    service: Arc<dyn LanguageService>,
    active_note: Option<NoteId>,
    discarded: usize,
}

impl LiveUpdater {
    pub fn new(service: Arc<dyn LanguageService>) -> Self {
        Self { tasks: TaskManager::new(), service, active_note: None, discarded: 0 }
    }

    /// Record which note the editor currently shows. Completions for any
    /// other note are dropped.
    pub fn set_active_note(&mut self, note_id: Option<NoteId>) {
        self.active_note = note_id;
    }

    pub fn active_note(&self) -> Option<NoteId> {
        self.active_note
    }

    /// Results dropped by the staleness guard so far.
    pub fn discarded_results(&self) -> usize {
        self.discarded
    }

    /// React to one field edit: commit the new value, then regenerate every
    /// field fed by the edited one. Unchanged text is a no-op; emptied text
    /// clears all dependent targets without a remote call.
    pub fn on_field_update<S: NoteStore, C: ConfigStore>(
        &mut self,
        notes: &mut S,
        rules: &RuleStore<C>,
        deck_note_type: &DeckNoteType,
        update: &FieldUpdate,
    ) -> Result<(), NotelingoError> {
        let field = deck_note_type.field_at_index(notes, update.field_index)?;

        let committed = notes.get_field(update.note_id, &field.field_name)?;
        if committed == update.text {
            return Ok(());
        }
        notes.set_field(update.note_id, &field.field_name, &update.text)?;

        let matching = rules.rules_from_source(deck_note_type, &field.field_name);
        if matching.is_empty() {
            return Ok(());
        }

        if text::is_empty(&update.text) {
            for (to_field, _) in &matching {
                notes.set_field(update.note_id, to_field, "")?;
            }
            return Ok(());
        }

        for (to_field, rule) in matching {
            self.dispatch(rules, deck_note_type, update.note_id, &update.text, to_field, rule)?;
        }
        Ok(())
    }

    /// Launch one transformation in the background. The note id rides along
    /// so the completion can be checked against the note active at apply
    /// time.
    fn dispatch<C: ConfigStore>(
        &self,
        rules: &RuleStore<C>,
        deck_note_type: &DeckNoteType,
        note_id: NoteId,
        raw_text: &str,
        to_field: String,
        rule: StoredRule,
    ) -> Result<(), NotelingoError> {
        let kind = rule.kind();
        let source_text = text::process(raw_text, kind, rules.text_replacements());
        let service = Arc::clone(&self.service);

        match rule {
            StoredRule::Translation(rule) => {
                let option = rule.translation_option;
                self.tasks.run_detached(move |runtime| {
                    let result = runtime
                        .block_on(service.translate(&source_text, &option))
                        .map(LivePayload::Text)
                        .map_err(|e| e.to_string());
                    TaskResult::LiveResult { note_id, field_name: to_field, kind, result }
                });
            }
            StoredRule::Transliteration(rule) => {
                let option = rule.transliteration_option;
                self.tasks.run_detached(move |runtime| {
                    let result = runtime
                        .block_on(service.transliterate(&source_text, &option))
                        .map(LivePayload::Text)
                        .map_err(|e| e.to_string());
                    TaskResult::LiveResult { note_id, field_name: to_field, kind, result }
                });
            }
            StoredRule::Audio { from_field } => {
                let source = deck_note_type.field(&from_field);
                let language = rules.source_language_code(&source)?;
                let voice = rules
                    .get_voice(&language)
                    .ok_or(NotelingoError::VoiceNotSet { language })?
                    .clone();
                self.tasks.run_detached(move |runtime| {
                    let result = runtime
                        .block_on(service.audio(&source_text, &voice, &json!({})))
                        .map(LivePayload::AudioFile)
                        .map_err(|e| e.to_string());
                    TaskResult::LiveResult { note_id, field_name: to_field, kind, result }
                });
            }
        }
        Ok(())
    }

    /// Drain finished transformations and write their results into the
    /// note. Must be called from the foreground context; it is the only
    /// place completions touch shared state.
    pub fn apply_completed<S: NoteStore>(&mut self, notes: &mut S) -> Vec<EditorEvent> {
        let mut events = Vec::new();

        for completed in self.tasks.poll_results() {
            let TaskResult::LiveResult { note_id, field_name, kind, result } = completed else {
                continue;
            };

            if self.active_note != Some(note_id) {
                self.discarded += 1;
                log::debug!(
                    "discarding stale {} result for note {} field {}",
                    kind.name(),
                    note_id,
                    field_name
                );
                continue;
            }

            match result {
                Ok(LivePayload::Text(value)) => {
                    match notes.set_field(note_id, &field_name, &value) {
                        Ok(()) => {
                            events.push(EditorEvent::FieldUpdated { note_id, field_name, value })
                        }
                        Err(error) => {
                            events.push(EditorEvent::Error { message: error.to_string() })
                        }
                    }
                }
                Ok(LivePayload::AudioFile(path)) => {
                    let applied = notes.import_media_file(&path).and_then(|media_name| {
                        let value = format!("[sound:{}]", media_name);
                        notes.set_field(note_id, &field_name, &value).map(|_| value)
                    });
                    match applied {
                        Ok(value) => {
                            events.push(EditorEvent::FieldUpdated { note_id, field_name, value })
                        }
                        Err(error) => {
                            events.push(EditorEvent::Error { message: error.to_string() })
                        }
                    }
                }
                Err(message) => events.push(EditorEvent::Error { message }),
            }
        }

        events
    }
}
