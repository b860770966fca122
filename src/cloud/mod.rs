use std::{
    collections::HashMap,
    path::PathBuf,
};

use async_trait::async_trait;
use serde::{
    de::DeserializeOwned,
    Deserialize,
    Serialize,
};
use serde_json::json;
use sha2::{
    Digest,
    Sha224,
};

use crate::{
    config::{
        TranslationOption,
        TransliterationOption,
        VoiceDescriptor,
    },
    core::NotelingoError,
};

pub const DEFAULT_BASE_URL: &str = "https://cloud-language-tools-prod.anki.study";

/// One (service, language) entry of the translation catalog. A service can
/// translate between two languages when it lists both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationLanguage {
    pub service: String,
    pub language_code: String,
    pub language_name: String,
    pub language_id: String,
}

/// One transliteration scheme offered by a service for a language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransliterationLanguage {
    pub service: String,
    pub language_code: String,
    pub language_name: String,
    pub transliteration_key: String,
    pub transliteration_name: String,
}

/// The remote language-processing service. Callers guard against empty
/// source text themselves; the adapter assumes it is handed text worth
/// sending.
#[async_trait]
pub trait LanguageService: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        option: &TranslationOption,
    ) -> Result<String, NotelingoError>;

    /// Every service's translation of `text`, keyed by service name.
    async fn translate_all(
        &self,
        text: &str,
        from_language: &str,
        to_language: &str,
    ) -> Result<HashMap<String, String>, NotelingoError>;

    async fn transliterate(
        &self,
        text: &str,
        option: &TransliterationOption,
    ) -> Result<String, NotelingoError>;

    /// Synthesize speech, returning the path of the cached audio file.
    async fn audio(
        &self,
        text: &str,
        voice: &VoiceDescriptor,
        options: &serde_json::Value,
    ) -> Result<PathBuf, NotelingoError>;

    /// Detect the dominant language of a sample of field values.
    async fn detect(&self, text_list: &[String]) -> Result<String, NotelingoError>;

    async fn language_list(&self) -> Result<HashMap<String, String>, NotelingoError>;

    async fn translation_language_list(&self) -> Result<Vec<TranslationLanguage>, NotelingoError>;

    async fn transliteration_language_list(
        &self,
    ) -> Result<Vec<TransliterationLanguage>, NotelingoError>;

    async fn voice_list(&self) -> Result<Vec<VoiceDescriptor>, NotelingoError>;
}

#[derive(Debug, Deserialize)]
struct TranslationResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct TransliterationResponse {
    transliterated_text: String,
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    detected_language: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Error for a non-2xx response. Client errors carry the server-provided
/// message; anything else keeps status and raw body for diagnosis.
fn status_error(status: u16, body: &str) -> NotelingoError {
    if status == 400 || status == 401 {
        if let Ok(response) = serde_json::from_str::<ErrorResponse>(body) {
            return NotelingoError::Api { status_code: status, message: response.error };
        }
    }
    NotelingoError::BadStatus { status_code: status, body: body.to_string() }
}

fn interpret_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, NotelingoError> {
    if (200..300).contains(&status) {
        return Ok(serde_json::from_str(body)?);
    }
    Err(status_error(status, body))
}

fn check_status(status: u16, body: &[u8]) -> Result<(), NotelingoError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(status_error(status, &String::from_utf8_lossy(body)))
}

/// Deterministic cache name for a synthesized audio request: a hash over
/// the endpoint path and the full request payload, so identical requests
/// land on the same file and different ones never collide.
pub fn audio_cache_filename(endpoint_path: &str, payload: &serde_json::Value) -> String {
    let mut hasher = Sha224::new();
    hasher.update(endpoint_path.as_bytes());
    hasher.update(payload.to_string().as_bytes());
    format!("notelingo-{:x}.mp3", hasher.finalize())
}

/// HTTP client for the cloud language service.
pub struct CloudLanguageTools {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl CloudLanguageTools {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, NotelingoError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("api_key", &self.api_key)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_body(status, &body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<T, NotelingoError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("api_key", &self.api_key)
            .json(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        interpret_body(status, &body)
    }

    async fn post_bytes(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<Vec<u8>, NotelingoError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("api_key", &self.api_key)
            .json(payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        check_status(status, &body)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl LanguageService for CloudLanguageTools {
    async fn translate(
        &self,
        text: &str,
        option: &TranslationOption,
    ) -> Result<String, NotelingoError> {
        let payload = json!({
            "text": text,
            "service": option.service,
            "from_language_key": option.source_language_id,
            "to_language_key": option.target_language_id,
        });
        let response: TranslationResponse = self.post_json("/translate", &payload).await?;
        Ok(response.translated_text)
    }

    async fn translate_all(
        &self,
        text: &str,
        from_language: &str,
        to_language: &str,
    ) -> Result<HashMap<String, String>, NotelingoError> {
        let payload = json!({
            "text": text,
            "from_language": from_language,
            "to_language": to_language,
        });
        self.post_json("/translate_all", &payload).await
    }

    async fn transliterate(
        &self,
        text: &str,
        option: &TransliterationOption,
    ) -> Result<String, NotelingoError> {
        let payload = json!({
            "text": text,
            "service": option.service,
            "transliteration_key": option.transliteration_key,
        });
        let response: TransliterationResponse = self.post_json("/transliterate", &payload).await?;
        Ok(response.transliterated_text)
    }

    async fn audio(
        &self,
        text: &str,
        voice: &VoiceDescriptor,
        options: &serde_json::Value,
    ) -> Result<PathBuf, NotelingoError> {
        let payload = json!({
            "text": text,
            "service": voice.service,
            "voice_key": voice.voice_key,
            "options": options,
        });
        let path = std::env::temp_dir().join(audio_cache_filename("/audio", &payload));
        let bytes = self.post_bytes("/audio", &payload).await?;
        std::fs::write(&path, bytes)?;
        log::debug!("cached audio for voice {} at {:?}", voice.voice_description, path);
        Ok(path)
    }

    async fn detect(&self, text_list: &[String]) -> Result<String, NotelingoError> {
        let payload = json!({ "text_list": text_list });
        let response: DetectionResponse = self.post_json("/detect", &payload).await?;
        Ok(response.detected_language)
    }

    async fn language_list(&self) -> Result<HashMap<String, String>, NotelingoError> {
        self.get_json("/language_list").await
    }

    async fn translation_language_list(&self) -> Result<Vec<TranslationLanguage>, NotelingoError> {
        self.get_json("/translation_language_list").await
    }

    async fn transliteration_language_list(
        &self,
    ) -> Result<Vec<TransliterationLanguage>, NotelingoError> {
        self.get_json("/transliteration_language_list").await
    }

    async fn voice_list(&self) -> Result<Vec<VoiceDescriptor>, NotelingoError> {
        self.get_json("/voice_list").await
    }
}

/// Server-provided catalogs, fetched once at startup and queried when the
/// user configures rules or voices.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    pub language_list: HashMap<String, String>,
    pub translation_language_list: Vec<TranslationLanguage>,
    pub transliteration_language_list: Vec<TransliterationLanguage>,
    pub voice_list: Vec<VoiceDescriptor>,
}

impl ServiceCatalog {
    pub async fn fetch(service: &dyn LanguageService) -> Result<Self, NotelingoError> {
        let (language_list, translation_language_list, transliteration_language_list, voice_list) = futures::join!(
            service.language_list(),
            service.translation_language_list(),
            service.transliteration_language_list(),
            service.voice_list()
        );
        Ok(Self {
            language_list: language_list?,
            translation_language_list: translation_language_list?,
            transliteration_language_list: transliteration_language_list?,
            voice_list: voice_list?,
        })
    }

    pub fn language_name(&self, language_code: &str) -> Option<&str> {
        self.language_list.get(language_code).map(String::as_str)
    }

    /// Whether a code may be assigned to a field; only catalog languages
    /// qualify (special markers are handled before this check).
    pub fn is_known_language(&self, language_code: &str) -> bool {
        self.language_list.contains_key(language_code)
    }

    /// Option bundles for every service able to translate between the two
    /// languages, carrying the per-service language ids.
    pub fn translation_options(&self, from_language: &str, to_language: &str) -> Vec<TranslationOption> {
        let mut options = Vec::new();
        for source in
            self.translation_language_list.iter().filter(|x| x.language_code == from_language)
        {
            let mut targets = self
                .translation_language_list
                .iter()
                .filter(|x| x.language_code == to_language && x.service == source.service);
            if let Some(target) = targets.next() {
                options.push(TranslationOption {
                    service: source.service.clone(),
                    source_language_id: source.language_id.clone(),
                    target_language_id: target.language_id.clone(),
                });
            }
        }
        options
    }

    /// Transliteration schemes available from a language.
    pub fn transliteration_options(&self, language_code: &str) -> Vec<TransliterationOption> {
        self.transliteration_language_list
            .iter()
            .filter(|x| x.language_code == language_code)
            .map(|x| TransliterationOption {
                service: x.service.clone(),
                transliteration_key: x.transliteration_key.clone(),
                transliteration_name: x.transliteration_name.clone(),
            })
            .collect()
    }

    pub fn voices_for_language(&self, language_code: &str) -> Vec<&VoiceDescriptor> {
        self.voice_list.iter().filter(|v| v.language_code == language_code).collect()
    }
}
