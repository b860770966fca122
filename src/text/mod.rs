use std::{
    collections::BTreeSet,
    sync::OnceLock,
};

use regex::Regex;
use serde::{
    Deserialize,
    Serialize,
};

/// The three ways a source field can feed a target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransformationType {
    Translation,
    Transliteration,
    Audio,
}

impl TransformationType {
    pub const ALL: [TransformationType; 3] = [
        TransformationType::Translation,
        TransformationType::Transliteration,
        TransformationType::Audio,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TransformationType::Translation => "Translation",
            TransformationType::Transliteration => "Transliteration",
            TransformationType::Audio => "Audio",
        }
    }
}

/// User-defined find/replace rule, applied after HTML conversion and only
/// for the transformation kinds it is enabled for. `pattern` is a regular
/// expression; a malformed pattern disables the rule without failing the
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextReplacement {
    pub pattern: String,
    pub replace: String,
    #[serde(default)]
    pub applies_to: BTreeSet<TransformationType>,
}

impl TextReplacement {
    pub fn new(pattern: &str, replace: &str, applies_to: &[TransformationType]) -> Self {
        Self {
            pattern: pattern.to_string(),
            replace: replace.to_string(),
            applies_to: applies_to.iter().copied().collect(),
        }
    }

    fn apply(&self, text: &str, kind: TransformationType) -> String {
        if !self.applies_to.contains(&kind) {
            return text.to_string();
        }
        match Regex::new(&self.pattern) {
            Ok(re) => re.replace_all(text, self.replace.as_str()).into_owned(),
            Err(e) => {
                log::warn!("skipping text replacement with bad pattern {:?}: {}", self.pattern, e);
                text.to_string()
            }
        }
    }
}

fn img_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<img[^>]*>").unwrap())
}

fn sound_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[sound:[^\]]*\]").unwrap())
}

fn line_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</?(?:div|p|ul|ol|li|tr)(?:\s[^>]*)?>|\n").unwrap())
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]+>").unwrap())
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(#x?[0-9a-fA-F]+|[a-zA-Z]+);").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Remove embedded image references; images never affect text pipelines.
pub fn strip_images(text: &str) -> String {
    img_tag_re().replace_all(text, "").into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "nbsp" => "\u{a0}",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            return char::from_u32(code).map(String::from);
        }
    };
    Some(decoded.to_string())
}

/// Flatten an HTML field value into a single line of plain text: sound tags
/// removed, line and block breaks collapsed to whitespace, remaining markup
/// stripped, entities decoded, whitespace normalized.
pub fn html_to_text_line(text: &str) -> String {
    let text = sound_tag_re().replace_all(text, "");
    let text = line_break_re().replace_all(&text, " ");
    let text = html_tag_re().replace_all(&text, "");
    let text = entity_re().replace_all(&text, |captures: &regex::Captures| {
        decode_entity(&captures[1]).unwrap_or_else(|| captures[0].to_string())
    });
    whitespace_re().replace_all(&text, " ").trim().to_string()
}

/// A field is empty when no visible characters remain after HTML
/// conversion; whitespace, non-breaking-space entities and empty container
/// tags all count as empty.
pub fn is_empty(text: &str) -> bool {
    html_to_text_line(text).is_empty()
}

/// Normalize a raw field value for one transformation kind. Pure function
/// of its inputs; used both for live preview and for real transformations.
pub fn process(text: &str, kind: TransformationType, replacements: &[TextReplacement]) -> String {
    let text = strip_images(text);
    let mut text = html_to_text_line(&text);
    for replacement in replacements {
        text = replacement.apply(&text, kind);
    }
    text
}
