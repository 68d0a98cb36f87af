//! HTTP access to the analysis service.
//!
//! Every call returns the service's envelope untouched; deciding what a
//! failed envelope means for the user is left to the caller. Analysis
//! submissions share one [`RequestGate`], so at most one of them is ever on
//! the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::model::{
    Acknowledgement, Envelope, HistoryList, ImageAnalysis, ImagePayload, ParsedPage, TextAnalysis,
};

pub const MIN_TEXT_CHARS: usize = 10;

/// Local precondition failures. The message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Введите текст минимум 10 символов для анализа")]
    TextTooShort,
    #[error("Введите URL сайта для парсинга")]
    EmptyUrl,
    #[error("Выберите изображение для анализа")]
    NoImage,
    #[error("Неподдерживаемый тип файла: {0}. Разрешены PNG, JPG, GIF, WEBP")]
    UnsupportedImage(String),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("another analysis request is still in flight")]
    Busy,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of a gateway call as carried through GUI messages.
pub type Outcome<T> = Result<T, Arc<GatewayError>>;

/// Trimmed text if it is long enough to be worth analysing.
pub fn validate_text(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.chars().count() < MIN_TEXT_CHARS {
        return Err(ValidationError::TextTooShort);
    }
    Ok(text.to_string())
}

/// Trims the input and prefixes `https://` unless it already names http(s).
pub fn normalize_url(input: &str) -> Result<String, ValidationError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Ok(format!("https://{url}"))
    }
}

/// Admits one holder at a time; dropping the permit reopens the gate.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    busy: Arc<AtomicBool>,
}

#[derive(Debug)]
pub struct Permit {
    busy: Arc<AtomicBool>,
}

impl RequestGate {
    pub fn try_acquire(&self) -> Option<Permit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Permit {
                busy: self.busy.clone(),
            })
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct RequestGateway {
    base_url: String,
    client: reqwest::Client,
    gate: RequestGate,
}

impl RequestGateway {
    pub fn new(config: &ServerConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(RequestGateway {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            gate: RequestGate::default(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn submit_text(&self, text: &str) -> Result<Envelope<TextAnalysis>, GatewayError> {
        let text = validate_text(text)?;
        let _permit = self.gate.try_acquire().ok_or(GatewayError::Busy)?;
        let request = self
            .client
            .post(self.url("/analyze_text"))
            .json(&json!({ "text": text }));
        self.send_envelope("/analyze_text", request).await
    }

    pub async fn submit_image(
        &self,
        image: &ImagePayload,
    ) -> Result<Envelope<ImageAnalysis>, GatewayError> {
        let _permit = self.gate.try_acquire().ok_or(GatewayError::Busy)?;
        let part = Part::bytes(image.bytes.as_ref().clone())
            .file_name(image.file_name.clone())
            .mime_str(image.kind.mime())?;
        let form = Form::new().part("file", part);
        let request = self.client.post(self.url("/analyze_image")).multipart(form);
        self.send_envelope("/analyze_image", request).await
    }

    pub async fn submit_url(&self, url: &str) -> Result<Envelope<ParsedPage>, GatewayError> {
        let url = normalize_url(url)?;
        let _permit = self.gate.try_acquire().ok_or(GatewayError::Busy)?;
        let request = self
            .client
            .post(self.url("/parse_demo"))
            .json(&json!({ "url": url }));
        self.send_envelope("/parse_demo", request).await
    }

    pub async fn fetch_history(&self) -> Result<HistoryList, GatewayError> {
        debug!("GET /history");
        let response = self.client.get(self.url("/history")).send().await?;
        let list: HistoryList = read_json(response).await?;
        info!(entries = list.items.len(), "history fetched");
        Ok(list)
    }

    pub async fn clear_history(&self) -> Result<Acknowledgement, GatewayError> {
        debug!("DELETE /history");
        let response = self.client.delete(self.url("/history")).send().await?;
        let ack: Acknowledgement = read_json(response).await?;
        info!(success = ack.success, "history cleared");
        Ok(ack)
    }

    /// True when `/health` answers 2xx. Never fails loudly.
    pub async fn health(&self) -> bool {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("health check failed: {e}");
                false
            }
        }
    }

    async fn send_envelope<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, GatewayError> {
        debug!("POST {path}");
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope = match serde_json::from_slice::<Envelope<T>>(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => Envelope::failure(format!("HTTP ошибка: {status}")),
            Err(e) => return Err(GatewayError::Decode(e)),
        };
        info!(path, %status, success = envelope.success, "analysis response");
        Ok(envelope)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::Status(status));
    }
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
