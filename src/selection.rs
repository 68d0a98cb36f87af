use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use image::GenericImageView;
use tracing::debug;

use crate::gateway::ValidationError;
use crate::model::ImagePayload;

const PREVIEW_MAX_WIDTH: u32 = 300;
const PREVIEW_MAX_HEIGHT: u32 = 200;

/// Decoded RGBA thumbnail of the pending image.
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Preview({}x{})", self.width, self.height)
    }
}

/// Identifies one `select` call, so a decode that finishes after the
/// selection changed can be told apart and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingImage {
    pub payload: ImagePayload,
    pub preview: Option<Preview>,
}

#[derive(Debug, Default)]
pub struct SelectionController {
    pending: Option<PendingImage>,
    generation: u64,
    drag_over: bool,
}

impl SelectionController {
    /// Replaces any previous selection. The preview arrives later through
    /// [`SelectionController::preview_ready`].
    pub fn select(&mut self, payload: ImagePayload) -> Ticket {
        self.generation += 1;
        debug!(file = %payload.file_name, "image selected");
        self.pending = Some(PendingImage {
            payload,
            preview: None,
        });
        Ticket(self.generation)
    }

    /// Returns false when the ticket is stale and the preview was discarded.
    pub fn preview_ready(&mut self, ticket: Ticket, preview: Preview) -> bool {
        match &mut self.pending {
            Some(pending) if ticket.0 == self.generation => {
                pending.preview = Some(preview);
                true
            }
            _ => false,
        }
    }

    /// Drops the selection whose decode failed, if it is still current.
    pub fn preview_failed(&mut self, ticket: Ticket) -> bool {
        if self.pending.is_some() && ticket.0 == self.generation {
            self.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    pub fn payload(&self) -> Option<&ImagePayload> {
        self.pending.as_ref().map(|p| &p.payload)
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.pending.as_ref().and_then(|p| p.preview.as_ref())
    }

    /// Submission opens once the preview is decoded.
    pub fn can_submit(&self) -> bool {
        self.preview().is_some()
    }

    pub fn upload_affordance_visible(&self) -> bool {
        self.preview().is_none()
    }

    pub fn set_drag_over(&mut self, over: bool) {
        self.drag_over = over;
    }

    pub fn is_drag_over(&self) -> bool {
        self.drag_over
    }
}

pub async fn read_image(path: impl AsRef<Path>) -> Result<ImagePayload> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Не удалось прочитать {}", path.display()))?;
    let payload = ImagePayload::new(file_name.clone(), bytes)
        .ok_or(ValidationError::UnsupportedImage(file_name))?;
    Ok(payload)
}

pub fn decode_preview(bytes: &[u8]) -> Result<Preview> {
    let mut img = image::load_from_memory(bytes).context("Не удалось декодировать изображение")?;

    let (width, height) = img.dimensions();
    if width > PREVIEW_MAX_WIDTH || height > PREVIEW_MAX_HEIGHT {
        let width_ratio = PREVIEW_MAX_WIDTH as f32 / width as f32;
        let height_ratio = PREVIEW_MAX_HEIGHT as f32 / height as f32;
        let scale = width_ratio.min(height_ratio);

        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        debug!("preview resize {width}x{height} -> {new_width}x{new_height}");

        img = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
    }

    let rgba = img.to_rgba8();
    Ok(Preview {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Decodes off the event loop.
pub async fn decode_preview_async(payload: ImagePayload) -> Result<Preview> {
    tokio::task::spawn_blocking(move || decode_preview(&payload.bytes))
        .await
        .context("preview task failed")?
}
