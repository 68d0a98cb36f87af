use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer};

/// Top-level view of the window. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Text,
    Image,
    Parse,
    History,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Text, Mode::Image, Mode::Parse, Mode::History];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Text => "Текст",
            Mode::Image => "Изображение",
            Mode::Parse => "Парсинг",
            Mode::History => "История",
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TextAnalysis {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub unique_offers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default, deserialize_with = "null_as_blank")]
    pub description: String,
    /// Nominally 0..=10, but the service does not guarantee it.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub visual_style_score: f64,
    #[serde(default, deserialize_with = "null_as_blank")]
    pub visual_style_analysis: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub marketing_insights: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParsedPage {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub h1: Option<String>,
    #[serde(default)]
    pub first_paragraph: Option<String>,
    #[serde(default)]
    pub analysis: Option<TextAnalysis>,
}

/// Any successful payload the service can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Text(TextAnalysis),
    Image(ImageAnalysis),
    Page(ParsedPage),
}

/// The `{success, analysis|data, error}` wrapper around every analysis call.
///
/// FastAPI rejections arrive as `{"detail": ...}` instead; `detail` is kept so
/// its text can be shown when it is a plain string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "none", alias = "analysis", alias = "data")]
    pub payload: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Envelope {
            success: false,
            payload: None,
            error: Some(message.into()),
            detail: None,
        }
    }

    /// Payload of a successful envelope. A `success: true` without payload counts as failure.
    pub fn into_payload(self) -> Result<T, Option<String>> {
        match (self.success, self.payload) {
            (true, Some(payload)) => Ok(payload),
            _ => Err(self
                .error
                .filter(|e| !e.trim().is_empty())
                .or_else(|| match self.detail {
                    Some(serde_json::Value::String(detail)) => Some(detail),
                    _ => None,
                })),
        }
    }
}

/// When a history entry was recorded. The service writes naive local
/// ISO-8601 timestamps; anything unparseable is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Timestamp::Parsed(at.with_timezone(&Local).naive_local());
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            Ok(at) => Timestamp::Parsed(at),
            Err(_) => Timestamp::Raw(raw.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Timestamp::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: Timestamp,
    pub request_type: String,
    #[serde(default, deserialize_with = "null_as_blank")]
    pub request_summary: String,
    #[serde(default)]
    pub response_summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryList {
    #[serde(default)]
    pub items: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Image formats the analysis service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// Raw bytes of a chosen image, ready for a multipart upload.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub file_name: String,
    pub kind: ImageKind,
    pub bytes: Arc<Vec<u8>>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Option<Self> {
        let file_name = file_name.into();
        let kind = ImageKind::from_file_name(&file_name)?;
        Some(ImagePayload {
            file_name,
            kind,
            bytes: Arc::new(bytes),
        })
    }
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("file_name", &self.file_name)
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn envelope_reads_analysis_and_data_keys() {
        let text: Envelope<TextAnalysis> = serde_json::from_value(json!({
            "success": true,
            "analysis": { "strengths": ["price"], "summary": null }
        }))
        .unwrap();
        assert_eq!(text.payload.unwrap().strengths, vec!["price".to_string()]);

        let page: Envelope<ParsedPage> = serde_json::from_value(json!({
            "success": true,
            "data": { "url": "https://a.example", "title": "A" }
        }))
        .unwrap();
        assert_eq!(page.payload.unwrap().title.as_deref(), Some("A"));
    }

    #[test]
    fn null_lists_become_empty() {
        let analysis: TextAnalysis = serde_json::from_value(json!({
            "strengths": null,
            "weaknesses": ["slow delivery"]
        }))
        .unwrap();
        assert!(analysis.strengths.is_empty());
        assert!(analysis.unique_offers.is_empty());
        assert_eq!(analysis.weaknesses.len(), 1);
    }

    #[test]
    fn null_score_reads_as_zero() {
        let envelope: Envelope<ImageAnalysis> = serde_json::from_value(json!({
            "success": true,
            "analysis": {
                "description": "Баннер",
                "visual_style_score": null,
                "visual_style_analysis": null
            }
        }))
        .unwrap();
        let analysis = envelope.into_payload().unwrap();
        assert_eq!(analysis.visual_style_score, 0.0);
        assert_eq!(analysis.visual_style_analysis, "");
    }

    #[test]
    fn success_without_payload_is_a_failure() {
        let envelope: Envelope<ImageAnalysis> =
            serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(envelope.into_payload(), Err(None));
    }

    #[test]
    fn string_detail_is_used_as_message() {
        let envelope: Envelope<ImageAnalysis> =
            serde_json::from_value(json!({ "detail": "Неподдерживаемый тип файла" })).unwrap();
        assert_eq!(
            envelope.into_payload(),
            Err(Some("Неподдерживаемый тип файла".to_string()))
        );

        let validation: Envelope<TextAnalysis> =
            serde_json::from_value(json!({ "detail": [{ "loc": ["body", "text"] }] })).unwrap();
        assert_eq!(validation.into_payload(), Err(None));
    }

    #[test]
    fn naive_timestamps_parse_and_garbage_is_kept() {
        match Timestamp::parse("2024-03-05T14:07:09.123456") {
            Timestamp::Parsed(at) => {
                assert_eq!((at.day(), at.month(), at.hour(), at.minute()), (5, 3, 14, 7));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            Timestamp::parse("yesterday"),
            Timestamp::Raw("yesterday".to_string())
        );
    }

    #[test]
    fn image_kind_follows_extension() {
        assert_eq!(ImageKind::from_file_name("ad.JPG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("banner.webp").map(ImageKind::mime), Some("image/webp"));
        assert_eq!(ImageKind::from_file_name("notes.txt"), None);
        assert!(ImagePayload::new("notes", vec![1, 2]).is_none());
    }
}
