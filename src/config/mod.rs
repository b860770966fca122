use std::collections::{
    BTreeMap,
    BTreeSet,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    anki::{
        DeckNoteType,
        DeckNoteTypeField,
    },
    core::NotelingoError,
    text::{
        TextReplacement,
        TransformationType,
    },
};

/// Marker stored in place of a language code for fields whose content is
/// rule-generated output rather than authored text. Such fields are never
/// offered as translation sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialLanguage {
    Transliteration,
    Sound,
}

/// Language assignment of a field: either a code from the server catalog or
/// a special marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldLanguage {
    Special(SpecialLanguage),
    Code(String),
}

impl FieldLanguage {
    pub fn code(code: &str) -> Self {
        FieldLanguage::Code(code.to_string())
    }

    pub fn is_special(&self) -> bool {
        matches!(self, FieldLanguage::Special(_))
    }

    pub fn language_code(&self) -> Option<&str> {
        match self {
            FieldLanguage::Code(code) => Some(code),
            FieldLanguage::Special(_) => None,
        }
    }

    /// Whether the field can serve as a translation source.
    pub fn translatable(&self) -> bool {
        !self.is_special()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOption {
    pub service: String,
    pub source_language_id: String,
    pub target_language_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransliterationOption {
    pub service: String,
    pub transliteration_key: String,
    pub transliteration_name: String,
}

/// Service-specific voice handle from the voice catalog. `voice_key` is
/// opaque to the engine; the service defines its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub service: String,
    pub language_code: String,
    pub voice_key: serde_json::Value,
    pub voice_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRule {
    pub from_field: String,
    pub translation_option: TranslationOption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransliterationRule {
    pub from_field: String,
    pub transliteration_option: TransliterationOption,
}

/// One stored rule of any kind, with its target field's options.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRule {
    Translation(TranslationRule),
    Transliteration(TransliterationRule),
    Audio { from_field: String },
}

impl StoredRule {
    pub fn kind(&self) -> TransformationType {
        match self {
            StoredRule::Translation(_) => TransformationType::Translation,
            StoredRule::Transliteration(_) => TransformationType::Transliteration,
            StoredRule::Audio { .. } => TransformationType::Audio,
        }
    }

    pub fn from_field(&self) -> &str {
        match self {
            StoredRule::Translation(rule) => &rule.from_field,
            StoredRule::Transliteration(rule) => &rule.from_field,
            StoredRule::Audio { from_field } => from_field,
        }
    }
}

/// Options handed to `store_rule`; the variant selects the rule kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOptions {
    Translation(TranslationOption),
    Transliteration(TransliterationOption),
    Audio,
}

/// model_name -> deck_name -> field_name -> value. Keyed by names, not ids,
/// so stored rules survive reinstalls where ids churn; the flip side is that
/// renaming a deck or note type orphans its entries.
pub type NestedMap<T> = BTreeMap<String, BTreeMap<String, BTreeMap<String, T>>>;

/// The persisted shape owned by this crate. The host stores it wherever it
/// keeps configuration; the engine only ever sees it whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotelingoConfig {
    #[serde(default)]
    pub language_map: NestedMap<FieldLanguage>,
    #[serde(default)]
    pub translation_rules: NestedMap<TranslationRule>,
    #[serde(default)]
    pub transliteration_rules: NestedMap<TransliterationRule>,
    #[serde(default)]
    pub audio_rules: NestedMap<String>,
    #[serde(default)]
    pub voice_selection: BTreeMap<String, VoiceDescriptor>,
    #[serde(default)]
    pub wanted_languages: BTreeSet<String>,
    #[serde(default)]
    pub text_replacements: Vec<TextReplacement>,
}

/// Host-side configuration storage. Mutations always write the whole
/// config back; there is no partial update and a single writer is assumed.
pub trait ConfigStore {
    fn get_config(&self) -> NotelingoConfig;

    fn write_config(&mut self, config: &NotelingoConfig) -> Result<(), NotelingoError>;
}

fn nested_get<'a, T>(map: &'a NestedMap<T>, field: &DeckNoteTypeField) -> Option<&'a T> {
    map.get(field.model_name())?.get(field.deck_name())?.get(&field.field_name)
}

fn nested_insert<T>(map: &mut NestedMap<T>, field: &DeckNoteTypeField, value: T) {
    map.entry(field.model_name().to_string())
        .or_default()
        .entry(field.deck_name().to_string())
        .or_default()
        .insert(field.field_name.clone(), value);
}

fn nested_remove<T>(map: &mut NestedMap<T>, field: &DeckNoteTypeField) -> Option<T> {
    map.get_mut(field.model_name())?.get_mut(field.deck_name())?.remove(&field.field_name)
}

fn nested_scope<'a, T>(
    map: &'a NestedMap<T>,
    deck_note_type: &DeckNoteType,
) -> Option<&'a BTreeMap<String, T>> {
    map.get(&deck_note_type.model_name)?.get(&deck_note_type.deck_name)
}

/// Read/write access to the rule store. Holds the current config in memory
/// and pushes the whole thing through the injected `ConfigStore` on every
/// mutation (read-then-write, last writer wins).
pub struct RuleStore<C: ConfigStore> {
    backend: C,
    config: NotelingoConfig,
}

impl<C: ConfigStore> RuleStore<C> {
    pub fn new(backend: C) -> Self {
        let config = backend.get_config();
        Self { backend, config }
    }

    pub fn config(&self) -> &NotelingoConfig {
        &self.config
    }

    fn write_back(&mut self) -> Result<(), NotelingoError> {
        self.backend.write_config(&self.config)
    }

    pub fn get_language(&self, field: &DeckNoteTypeField) -> Option<&FieldLanguage> {
        nested_get(&self.config.language_map, field)
    }

    fn assign_language(&mut self, field: &DeckNoteTypeField, language: FieldLanguage) {
        if let FieldLanguage::Code(code) = &language {
            self.config.wanted_languages.insert(code.clone());
        }
        nested_insert(&mut self.config.language_map, field, language);
    }

    pub fn set_language(
        &mut self,
        field: &DeckNoteTypeField,
        language: FieldLanguage,
    ) -> Result<(), NotelingoError> {
        self.assign_language(field, language);
        self.write_back()
    }

    /// Language code of a field required to feed a transformation; special
    /// markers do not qualify.
    pub fn source_language_code(
        &self,
        field: &DeckNoteTypeField,
    ) -> Result<String, NotelingoError> {
        match self.get_language(field) {
            Some(FieldLanguage::Code(code)) => Ok(code.clone()),
            _ => Err(NotelingoError::MappingMissing { field: field.to_string() }),
        }
    }

    /// Stored rules of one kind for a (deck, note type), keyed by target
    /// field.
    pub fn rules_for_kind(
        &self,
        kind: TransformationType,
        deck_note_type: &DeckNoteType,
    ) -> BTreeMap<String, StoredRule> {
        match kind {
            TransformationType::Translation => {
                nested_scope(&self.config.translation_rules, deck_note_type)
                    .map(|rules| {
                        rules
                            .iter()
                            .map(|(to, rule)| (to.clone(), StoredRule::Translation(rule.clone())))
                            .collect()
                    })
                    .unwrap_or_default()
            }
            TransformationType::Transliteration => {
                nested_scope(&self.config.transliteration_rules, deck_note_type)
                    .map(|rules| {
                        rules
                            .iter()
                            .map(|(to, rule)| {
                                (to.clone(), StoredRule::Transliteration(rule.clone()))
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
            TransformationType::Audio => nested_scope(&self.config.audio_rules, deck_note_type)
                .map(|rules| {
                    rules
                        .iter()
                        .map(|(to, from)| {
                            (to.clone(), StoredRule::Audio { from_field: from.clone() })
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// All rules fed by one source field, in fixed kind order. This is what
    /// a field edit has to replay.
    pub fn rules_from_source(
        &self,
        deck_note_type: &DeckNoteType,
        from_field: &str,
    ) -> Vec<(String, StoredRule)> {
        let mut matching = Vec::new();
        for kind in TransformationType::ALL {
            for (to_field, rule) in self.rules_for_kind(kind, deck_note_type) {
                if rule.from_field() == from_field {
                    matching.push((to_field, rule));
                }
            }
        }
        matching
    }

    /// Memorize a rule for a target field. Storing a transliteration or
    /// audio rule also forces the target field's language to the matching
    /// special marker, overwriting any earlier assignment: those outputs
    /// are not independently translatable text.
    pub fn store_rule(
        &mut self,
        target: &DeckNoteTypeField,
        from_field: &str,
        options: RuleOptions,
    ) -> Result<(), NotelingoError> {
        match options {
            RuleOptions::Translation(translation_option) => {
                let rule =
                    TranslationRule { from_field: from_field.to_string(), translation_option };
                nested_insert(&mut self.config.translation_rules, target, rule);
            }
            RuleOptions::Transliteration(transliteration_option) => {
                let rule = TransliterationRule {
                    from_field: from_field.to_string(),
                    transliteration_option,
                };
                nested_insert(&mut self.config.transliteration_rules, target, rule);
                self.assign_language(
                    target,
                    FieldLanguage::Special(SpecialLanguage::Transliteration),
                );
            }
            RuleOptions::Audio => {
                nested_insert(&mut self.config.audio_rules, target, from_field.to_string());
                self.assign_language(target, FieldLanguage::Special(SpecialLanguage::Sound));
            }
        }
        self.write_back()
    }

    /// Drop the rule of one kind targeting a field. Removing an absent rule
    /// is a no-op; empty leaf maps are left in place.
    pub fn remove_rule(
        &mut self,
        kind: TransformationType,
        target: &DeckNoteTypeField,
    ) -> Result<(), NotelingoError> {
        let removed = match kind {
            TransformationType::Translation => {
                nested_remove(&mut self.config.translation_rules, target).is_some()
            }
            TransformationType::Transliteration => {
                nested_remove(&mut self.config.transliteration_rules, target).is_some()
            }
            TransformationType::Audio => {
                nested_remove(&mut self.config.audio_rules, target).is_some()
            }
        };
        if !removed {
            return Ok(());
        }
        self.write_back()
    }

    pub fn get_voice(&self, language_code: &str) -> Option<&VoiceDescriptor> {
        self.config.voice_selection.get(language_code)
    }

    pub fn set_voice(
        &mut self,
        language_code: &str,
        voice: VoiceDescriptor,
    ) -> Result<(), NotelingoError> {
        self.config.voice_selection.insert(language_code.to_string(), voice);
        self.write_back()
    }

    pub fn text_replacements(&self) -> &[TextReplacement] {
        &self.config.text_replacements
    }

    pub fn set_text_replacements(
        &mut self,
        replacements: Vec<TextReplacement>,
    ) -> Result<(), NotelingoError> {
        self.config.text_replacements = replacements;
        self.write_back()
    }

    pub fn wanted_languages(&self) -> &BTreeSet<String> {
        &self.config.wanted_languages
    }
}
