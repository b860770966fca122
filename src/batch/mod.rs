use std::collections::{
    BTreeMap,
    BTreeSet,
};

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
        tasks::ProgressSink,
        ErrorReporter,
        NotelingoError,
    },
    text::{
        self,
        TransformationType,
    },
};

/// One rule selected for a batch run: the stored rule plus the target field
/// it regenerates.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRule {
    pub to_field: String,
    pub rule: StoredRule,
}

impl PlannedRule {
    pub fn kind(&self) -> TransformationType {
        self.rule.kind()
    }
}

/// Collect the stored rules to replay for a (deck, note type), in the fixed
/// execution order: translation, then transliteration, then audio, target
/// fields in name order within a kind. `enabled` restricts to a subset of
/// target fields; `None` takes every stored rule.
pub fn plan_rules<C: ConfigStore>(
    rules: &RuleStore<C>,
    deck_note_type: &DeckNoteType,
    enabled: Option<&BTreeSet<String>>,
) -> Vec<PlannedRule> {
    let mut planned = Vec::new();
    for kind in TransformationType::ALL {
        for (to_field, rule) in rules.rules_for_kind(kind, deck_note_type) {
            if enabled.is_some_and(|fields| !fields.contains(&to_field)) {
                continue;
            }
            planned.push(PlannedRule { to_field, rule });
        }
    }
    planned
}

/// Fields a batch dialog may offer as transformation sources. Fields marked
/// with a special language are rule outputs and never qualify; translation
/// sources additionally need a translatable language assignment.
pub fn source_field_candidates<S: NoteStore, C: ConfigStore>(
    notes: &S,
    rules: &RuleStore<C>,
    deck_note_type: &DeckNoteType,
    kind: TransformationType,
) -> Result<Vec<String>, NotelingoError> {
    let mut candidates = Vec::new();
    for field_name in notes.field_names(deck_note_type.model_id)? {
        let field = deck_note_type.field(&field_name);
        match rules.get_language(&field) {
            Some(language) if language.is_special() => continue,
            Some(_) => candidates.push(field_name),
            None => {
                if kind != TransformationType::Translation {
                    candidates.push(field_name);
                }
            }
        }
    }
    Ok(candidates)
}

/// Whether any selected note already has content in one of the target
/// fields. Callers ask the user once, before the batch, when this is true.
pub fn target_fields_populated<S: NoteStore>(
    notes: &S,
    note_ids: &[NoteId],
    planned: &[PlannedRule],
) -> Result<bool, NotelingoError> {
    for &note_id in note_ids {
        for rule in planned {
            if !notes.get_field(note_id, &rule.to_field)?.is_empty() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Aggregated outcome of one batch run. Errors are histogrammed by message
/// text rather than reported per occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub attempt_count: usize,
    pub success_count: usize,
    pub error_counts: BTreeMap<String, usize>,
}

impl BatchSummary {
    fn record_error(&mut self, message: String) {
        *self.error_counts.entry(message).or_default() += 1;
    }

    /// Compact error report, `None` when the run was clean.
    pub fn error_message(&self) -> Option<String> {
        if self.error_counts.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .error_counts
            .iter()
            .map(|(message, count)| format!("{} ({} times)", message, count))
            .collect();
        Some(format!("Errors: {}", parts.join(", ")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
}

/// Replays a set of rules over a fixed list of notes. Sequential per note
/// and per rule, so progress accounting stays simple and at most one remote
/// call is in flight; a failed attempt never stops later rules or notes.
pub struct BatchExecutor {
    state: BatchState,
    summary: BatchSummary,
}

impl BatchExecutor {
    pub fn new() -> Self {
        Self { state: BatchState::Idle, summary: BatchSummary::default() }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn summary(&self) -> &BatchSummary {
        &self.summary
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn run<S: NoteStore, C: ConfigStore>(
        &mut self,
        notes: &mut S,
        rules: &RuleStore<C>,
        service: &dyn LanguageService,
        reporter: &dyn ErrorReporter,
        deck_note_type: &DeckNoteType,
        note_ids: &[NoteId],
        planned: &[PlannedRule],
        progress: &dyn ProgressSink,
    ) -> BatchSummary {
        self.state = BatchState::Running;
        self.summary = BatchSummary::default();

        let total = note_ids.len() * planned.len();
        let mut done = 0;

        for &note_id in note_ids {
            for planned_rule in planned {
                self.summary.attempt_count += 1;
                match apply_rule(notes, rules, service, deck_note_type, note_id, planned_rule).await
                {
                    Ok(true) => self.summary.success_count += 1,
                    Ok(false) => {
                        log::debug!(
                            "note {}: source {} empty, skipping {}",
                            note_id,
                            planned_rule.rule.from_field(),
                            planned_rule.to_field
                        );
                    }
                    Err(error) => {
                        log::warn!(
                            "note {}: {} into {} failed: {}",
                            note_id,
                            planned_rule.kind().name(),
                            planned_rule.to_field,
                            error
                        );
                        if matches!(error, NotelingoError::Unknown(_)) {
                            reporter.report("batch transformation", &error);
                        }
                        self.summary.record_error(error.to_string());
                    }
                }
                done += 1;
                progress.progress(done, total);
            }

            if let Err(error) = notes.persist_note(note_id) {
                log::warn!("note {}: persist failed: {}", note_id, error);
                self.summary.record_error(error.to_string());
            }
        }

        self.state = BatchState::Completed;
        self.summary.clone()
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one rule to one note. `Ok(false)` means the source field was empty
/// and nothing was dispatched.
async fn apply_rule<S: NoteStore, C: ConfigStore>(
    notes: &mut S,
    rules: &RuleStore<C>,
    service: &dyn LanguageService,
    deck_note_type: &DeckNoteType,
    note_id: NoteId,
    planned: &PlannedRule,
) -> Result<bool, NotelingoError> {
    let raw = notes.get_field(note_id, planned.rule.from_field())?;
    let source_text = text::process(&raw, planned.kind(), rules.text_replacements());
    if source_text.is_empty() {
        return Ok(false);
    }

    let value = match &planned.rule {
        StoredRule::Translation(rule) => {
            service.translate(&source_text, &rule.translation_option).await?
        }
        StoredRule::Transliteration(rule) => {
            service.transliterate(&source_text, &rule.transliteration_option).await?
        }
        StoredRule::Audio { from_field } => {
            let source = deck_note_type.field(from_field);
            let language = rules.source_language_code(&source)?;
            let voice = rules
                .get_voice(&language)
                .ok_or(NotelingoError::VoiceNotSet { language })?
                .clone();
            let audio_path = service.audio(&source_text, &voice, &json!({})).await?;
            let media_name = notes.import_media_file(&audio_path)?;
            format!("[sound:{}]", media_name)
        }
    };

    notes.set_field(note_id, &planned.to_field, &value)?;
    Ok(true)
}
