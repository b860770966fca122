//! Mock collaborators shared by the module tests: an in-memory note store,
//! an in-memory config store, and a scripted language service.

use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;

use crate::{
    anki::{
        DeckId,
        DeckNoteType,
        ModelId,
        NoteId,
        NoteStore,
    },
    cloud::{
        audio_cache_filename,
        LanguageService,
        ServiceCatalog,
        TranslationLanguage,
        TransliterationLanguage,
    },
    config::{
        ConfigStore,
        NotelingoConfig,
        TranslationOption,
        TransliterationOption,
        VoiceDescriptor,
    },
    core::NotelingoError,
};

pub fn mandarin_deck_note_type() -> DeckNoteType {
    DeckNoteType {
        deck_id: 1000,
        deck_name: "Mandarin".to_string(),
        model_id: 2000,
        model_name: "Vocab".to_string(),
    }
}

pub fn sample_translation_option() -> TranslationOption {
    TranslationOption {
        service: "Azure".to_string(),
        source_language_id: "zh-Hans".to_string(),
        target_language_id: "en".to_string(),
    }
}

pub fn sample_transliteration_option() -> TransliterationOption {
    TransliterationOption {
        service: "Azure".to_string(),
        transliteration_key: "zh_pinyin".to_string(),
        transliteration_name: "Pinyin (Azure)".to_string(),
    }
}

pub fn sample_voice(language_code: &str) -> VoiceDescriptor {
    VoiceDescriptor {
        service: "Azure".to_string(),
        language_code: language_code.to_string(),
        voice_key: json!({"name": "XiaoxiaoNeural"}),
        voice_description: "Azure Xiaoxiao (neural)".to_string(),
    }
}

pub fn sample_catalog() -> ServiceCatalog {
    ServiceCatalog {
        language_list: [
            ("en".to_string(), "English".to_string()),
            ("zh_cn".to_string(), "Chinese".to_string()),
            ("de_de".to_string(), "German".to_string()),
        ]
        .into(),
        translation_language_list: vec![
            TranslationLanguage {
                service: "Azure".to_string(),
                language_code: "zh_cn".to_string(),
                language_name: "Chinese".to_string(),
                language_id: "zh-Hans".to_string(),
            },
            TranslationLanguage {
                service: "Azure".to_string(),
                language_code: "en".to_string(),
                language_name: "English".to_string(),
                language_id: "en".to_string(),
            },
            TranslationLanguage {
                service: "Epitran".to_string(),
                language_code: "zh_cn".to_string(),
                language_name: "Chinese".to_string(),
                language_id: "cmn-Hans".to_string(),
            },
        ],
        transliteration_language_list: vec![TransliterationLanguage {
            service: "Azure".to_string(),
            language_code: "zh_cn".to_string(),
            language_name: "Chinese".to_string(),
            transliteration_key: "zh_pinyin".to_string(),
            transliteration_name: "Pinyin (Azure)".to_string(),
        }],
        voice_list: vec![sample_voice("zh_cn"), {
            let mut voice = sample_voice("en");
            voice.voice_description = "Azure Aria (neural)".to_string();
            voice
        }],
    }
}

/// Config storage backed by a plain struct, counting write-backs.
#[derive(Default)]
pub struct MemoryConfigStore {
    config: NotelingoConfig,
    writes: usize,
}

impl MemoryConfigStore {
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_config(&self) -> NotelingoConfig {
        self.config.clone()
    }

    fn write_config(&mut self, config: &NotelingoConfig) -> Result<(), NotelingoError> {
        self.config = config.clone();
        self.writes += 1;
        Ok(())
    }
}

/// In-memory note collection with one deck, one note type and three notes.
pub struct MockNoteStore {
    pub deck_id: DeckId,
    pub model_id: ModelId,
    decks: BTreeMap<DeckId, String>,
    models: BTreeMap<ModelId, (String, Vec<String>)>,
    notes: BTreeMap<NoteId, BTreeMap<String, String>>,
    note_home: BTreeMap<NoteId, (DeckId, ModelId)>,
    pub persisted: Vec<NoteId>,
    pub imported: Vec<PathBuf>,
}

impl MockNoteStore {
    pub fn single_deck() -> Self {
        let mut store = Self {
            deck_id: 1000,
            model_id: 2000,
            decks: [(1000, "Mandarin".to_string())].into(),
            models: [(
                2000,
                (
                    "Vocab".to_string(),
                    ["Chinese", "English", "Sound", "Pinyin", "Notes"]
                        .map(String::from)
                        .to_vec(),
                ),
            )]
            .into(),
            notes: BTreeMap::new(),
            note_home: BTreeMap::new(),
            persisted: Vec::new(),
            imported: Vec::new(),
        };
        store.add_note(101, &[("Chinese", "老人家")]);
        store.add_note(102, &[("Chinese", "你好")]);
        store.add_note(103, &[]);
        store
    }

    pub fn add_note(&mut self, note_id: NoteId, values: &[(&str, &str)]) {
        let field_names = &self.models[&self.model_id].1;
        let mut fields: BTreeMap<String, String> =
            field_names.iter().map(|name| (name.clone(), String::new())).collect();
        for (name, value) in values {
            fields.insert((*name).to_string(), (*value).to_string());
        }
        self.notes.insert(note_id, fields);
        self.note_home.insert(note_id, (self.deck_id, self.model_id));
    }

    pub fn note_ids(&self) -> Vec<NoteId> {
        self.notes.keys().copied().collect()
    }

    /// Current value of a field, panicking on unknown ids; test-side sugar.
    pub fn field(&self, note_id: NoteId, field_name: &str) -> String {
        self.notes[&note_id][field_name].clone()
    }
}

impl NoteStore for MockNoteStore {
    fn deck_name(&self, deck_id: DeckId) -> Option<String> {
        self.decks.get(&deck_id).cloned()
    }

    fn model_name(&self, model_id: ModelId) -> Option<String> {
        self.models.get(&model_id).map(|(name, _)| name.clone())
    }

    fn field_names(&self, model_id: ModelId) -> Result<Vec<String>, NotelingoError> {
        self.models
            .get(&model_id)
            .map(|(_, fields)| fields.clone())
            .ok_or(NotelingoError::ItemNotFound { deck_id: 0, model_id })
    }

    fn get_field(&self, note_id: NoteId, field_name: &str) -> Result<String, NotelingoError> {
        let note = self.notes.get(&note_id).ok_or(NotelingoError::NoteNotFound { note_id })?;
        note.get(field_name)
            .cloned()
            .ok_or_else(|| NotelingoError::FieldNotFound { field: field_name.to_string() })
    }

    fn set_field(
        &mut self,
        note_id: NoteId,
        field_name: &str,
        value: &str,
    ) -> Result<(), NotelingoError> {
        let note = self.notes.get_mut(&note_id).ok_or(NotelingoError::NoteNotFound { note_id })?;
        let slot = note
            .get_mut(field_name)
            .ok_or_else(|| NotelingoError::FieldNotFound { field: field_name.to_string() })?;
        *slot = value.to_string();
        Ok(())
    }

    fn persist_note(&mut self, note_id: NoteId) -> Result<(), NotelingoError> {
        if !self.notes.contains_key(&note_id) {
            return Err(NotelingoError::NoteNotFound { note_id });
        }
        self.persisted.push(note_id);
        Ok(())
    }

    fn populated_deck_models(&self) -> Vec<(DeckId, ModelId)> {
        let mut pairs: Vec<_> = self.note_home.values().copied().collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    fn notes_for(&self, deck_note_type: &DeckNoteType) -> Vec<NoteId> {
        self.note_home
            .iter()
            .filter(|(_, home)| **home == (deck_note_type.deck_id, deck_note_type.model_id))
            .map(|(note_id, _)| *note_id)
            .collect()
    }

    fn import_media_file(&mut self, path: &Path) -> Result<String, NotelingoError> {
        self.imported.push(path.to_path_buf());
        Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default())
    }
}

/// Scripted language service: canned answers keyed by source text, with
/// switches to make specific operations fail.
pub struct MockLanguageService {
    translations: HashMap<String, String>,
    transliterations: HashMap<String, String>,
    detected_language: String,
    fail_translations: Mutex<Option<&'static str>>,
    calls: Mutex<Vec<String>>,
    last_detection_sample: Mutex<Option<Vec<String>>>,
}

impl MockLanguageService {
    pub fn new() -> Self {
        Self {
            translations: [
                ("老人家".to_string(), "old people".to_string()),
                ("老人".to_string(), "old people (short)".to_string()),
                ("你好".to_string(), "hello".to_string()),
            ]
            .into(),
            transliterations: [
                ("老人家".to_string(), "lǎo rén jiā".to_string()),
                ("老人".to_string(), "lǎo rén".to_string()),
                ("你好".to_string(), "nǐ hǎo".to_string()),
            ]
            .into(),
            detected_language: "zh_cn".to_string(),
            fail_translations: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            last_detection_sample: Mutex::new(None),
        }
    }

    /// All subsequent translation calls fail with a service error.
    pub fn fail_translations(&self) {
        *self.fail_translations.lock().unwrap() = Some("api");
    }

    /// All subsequent translation calls fail with an unclassified error.
    pub fn fail_translations_unknown(&self) {
        *self.fail_translations.lock().unwrap() = Some("unknown");
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_detection_sample(&self) -> Option<Vec<String>> {
        self.last_detection_sample.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockLanguageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageService for MockLanguageService {
    async fn translate(
        &self,
        text: &str,
        _option: &TranslationOption,
    ) -> Result<String, NotelingoError> {
        self.record(format!("translate:{}", text));
        match *self.fail_translations.lock().unwrap() {
            Some("api") => Err(NotelingoError::Api {
                status_code: 400,
                message: "translation service down".to_string(),
            }),
            Some(_) => Err(NotelingoError::Unknown("provider exploded".to_string())),
            None => Ok(self
                .translations
                .get(text)
                .cloned()
                .unwrap_or_else(|| format!("{} (translated)", text))),
        }
    }

    async fn translate_all(
        &self,
        text: &str,
        _from_language: &str,
        _to_language: &str,
    ) -> Result<HashMap<String, String>, NotelingoError> {
        self.record(format!("translate_all:{}", text));
        Ok([
            ("Azure".to_string(), format!("{} (Azure)", text)),
            ("Google".to_string(), format!("{} (Google)", text)),
        ]
        .into())
    }

    async fn transliterate(
        &self,
        text: &str,
        _option: &TransliterationOption,
    ) -> Result<String, NotelingoError> {
        self.record(format!("transliterate:{}", text));
        Ok(self
            .transliterations
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("{} (romanized)", text)))
    }

    async fn audio(
        &self,
        text: &str,
        voice: &VoiceDescriptor,
        options: &serde_json::Value,
    ) -> Result<PathBuf, NotelingoError> {
        self.record(format!("audio:{}", text));
        let payload = json!({
            "text": text,
            "service": voice.service,
            "voice_key": voice.voice_key,
            "options": options,
        });
        let path = std::env::temp_dir().join(audio_cache_filename("/audio", &payload));
        std::fs::write(&path, payload.to_string())?;
        Ok(path)
    }

    async fn detect(&self, text_list: &[String]) -> Result<String, NotelingoError> {
        self.record(format!("detect:{}", text_list.len()));
        *self.last_detection_sample.lock().unwrap() = Some(text_list.to_vec());
        Ok(self.detected_language.clone())
    }

    async fn language_list(&self) -> Result<HashMap<String, String>, NotelingoError> {
        Ok(sample_catalog().language_list)
    }

    async fn translation_language_list(&self) -> Result<Vec<TranslationLanguage>, NotelingoError> {
        Ok(sample_catalog().translation_language_list)
    }

    async fn transliteration_language_list(
        &self,
    ) -> Result<Vec<TransliterationLanguage>, NotelingoError> {
        Ok(sample_catalog().transliteration_language_list)
    }

    async fn voice_list(&self) -> Result<Vec<VoiceDescriptor>, NotelingoError> {
        Ok(sample_catalog().voice_list)
    }
}

/// Poll a condition until it holds, for tests that wait on background
/// completions. Panics after two seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not met within two seconds");
}
