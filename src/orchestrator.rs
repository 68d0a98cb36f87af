//! User actions in, commands out.
//!
//! The orchestrator owns all client state and never performs I/O itself.
//! Each action returns a [`Command`] for the shell to run; the shell feeds
//! the result back through the matching completion method.

use std::path::PathBuf;

use tracing::{debug, error, warn};

use crate::gateway::{self, GatewayError, Outcome, ValidationError};
use crate::history::{FetchTicket, HistoryController};
use crate::mode::{ModeController, ModeEffect};
use crate::model::{
    Acknowledgement, AnalysisResult, Envelope, HistoryList, ImageAnalysis, ImageKind, ImagePayload,
    Mode, ParsedPage, TextAnalysis,
};
use crate::render::{self, Display};
use crate::selection::{Preview, SelectionController, Ticket};

pub const CONNECTION_ERROR: &str = "Ошибка соединения с сервером";
pub const BUSY_ERROR: &str = "Дождитесь завершения текущего запроса";
const TEXT_FALLBACK: &str = "Произошла ошибка при анализе";
const IMAGE_FALLBACK: &str = "Произошла ошибка при анализе изображения";
const PARSE_FALLBACK: &str = "Не удалось распарсить сайт";
const IMAGE_READ_ERROR: &str = "Не удалось прочитать изображение";

/// Work the shell must carry out on the orchestrator's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    None,
    SubmitText(String),
    SubmitImage(ImagePayload),
    SubmitUrl(String),
    FetchHistory(FetchTicket),
    ClearHistory,
    ReadImage(PathBuf),
    DecodePreview(Ticket, ImagePayload),
}

/// Set while an analysis request is outstanding. A set gate refuses new
/// submissions rather than racing them.
#[derive(Debug, Default)]
pub struct LoadingGate {
    set: bool,
}

impl LoadingGate {
    pub fn try_begin(&mut self) -> bool {
        !std::mem::replace(&mut self.set, true)
    }

    pub fn finish(&mut self) {
        self.set = false;
    }

    pub fn is_set(&self) -> bool {
        self.set
    }
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    modes: ModeController,
    selection: SelectionController,
    history: HistoryController,
    loading: LoadingGate,
    results: Option<Display>,
    pub text_input: String,
    pub url_input: String,
    pub image_path_input: String,
}

impl Orchestrator {
    pub fn mode(&self) -> Mode {
        self.modes.current()
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn history(&self) -> &HistoryController {
        &self.history
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    pub fn results(&self) -> Option<&Display> {
        self.results.as_ref()
    }

    pub fn close_results(&mut self) {
        self.results = None;
    }

    fn show_error(&mut self, message: impl Into<String>) {
        self.results = Some(Display::error(message));
    }

    fn validation_failed(&mut self, err: ValidationError) -> Command {
        debug!("validation: {err}");
        self.show_error(err.to_string());
        Command::None
    }

    /// Shows the loading state and hands back `command`, unless a request
    /// is already outstanding.
    fn begin(&mut self, command: Command) -> Command {
        if !self.loading.try_begin() {
            warn!("request rejected, another one is still in flight");
            return Command::None;
        }
        command
    }

    // Modes

    pub fn select_mode(&mut self, mode: Mode) -> Command {
        if mode != Mode::Image {
            self.remove_image();
            self.selection.set_drag_over(false);
        }
        match self.modes.activate(mode) {
            Some(ModeEffect::RefreshHistory) => Command::FetchHistory(self.history.refresh()),
            None => Command::None,
        }
    }

    // Text

    pub fn analyze_text(&mut self) -> Command {
        if self.loading.is_set() {
            return Command::None;
        }
        match gateway::validate_text(&self.text_input) {
            Ok(text) => self.begin(Command::SubmitText(text)),
            Err(err) => self.validation_failed(err),
        }
    }

    pub fn text_analyzed(&mut self, outcome: Outcome<Envelope<TextAnalysis>>) {
        self.complete(outcome, TEXT_FALLBACK, AnalysisResult::Text);
    }

    // Page parse

    pub fn parse_url(&mut self) -> Command {
        if self.loading.is_set() {
            return Command::None;
        }
        match gateway::normalize_url(&self.url_input) {
            Ok(url) => self.begin(Command::SubmitUrl(url)),
            Err(err) => self.validation_failed(err),
        }
    }

    pub fn page_parsed(&mut self, outcome: Outcome<Envelope<ParsedPage>>) {
        self.complete(outcome, PARSE_FALLBACK, AnalysisResult::Page);
    }

    // Image

    pub fn pick_image(&mut self) -> Command {
        let path = self.image_path_input.trim();
        if path.is_empty() {
            return self.validation_failed(ValidationError::NoImage);
        }
        Command::ReadImage(PathBuf::from(path))
    }

    pub fn file_hovered(&mut self) {
        if self.modes.is_visible(Mode::Image) {
            self.selection.set_drag_over(true);
        }
    }

    pub fn hover_left(&mut self) {
        self.selection.set_drag_over(false);
    }

    pub fn file_dropped(&mut self, path: PathBuf) -> Command {
        self.selection.set_drag_over(false);
        if !self.modes.is_visible(Mode::Image) {
            debug!("drop ignored outside image mode: {}", path.display());
            return Command::None;
        }
        let is_image = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(ImageKind::from_file_name)
            .is_some();
        if !is_image {
            debug!("drop ignored, not an image: {}", path.display());
            return Command::None;
        }
        self.image_path_input = path.display().to_string();
        Command::ReadImage(path)
    }

    /// A read that finishes after the user left Image mode is discarded.
    pub fn image_read(&mut self, outcome: Result<ImagePayload, String>) -> Command {
        if !self.modes.is_visible(Mode::Image) {
            debug!("image read finished outside image mode, dropped");
            return Command::None;
        }
        match outcome {
            Ok(payload) => {
                let ticket = self.selection.select(payload.clone());
                Command::DecodePreview(ticket, payload)
            }
            Err(message) => {
                warn!("image read failed: {message}");
                self.show_error(message);
                Command::None
            }
        }
    }

    pub fn preview_decoded(&mut self, ticket: Ticket, outcome: Result<Preview, String>) {
        match outcome {
            Ok(preview) => {
                if !self.selection.preview_ready(ticket, preview) {
                    debug!("stale preview dropped");
                }
            }
            Err(message) => {
                if self.selection.preview_failed(ticket) {
                    warn!("preview decode failed: {message}");
                    self.image_path_input.clear();
                    self.show_error(IMAGE_READ_ERROR);
                }
            }
        }
    }

    pub fn remove_image(&mut self) {
        self.selection.clear();
        self.image_path_input.clear();
    }

    pub fn analyze_image(&mut self) -> Command {
        if self.loading.is_set() {
            return Command::None;
        }
        match self.selection.payload() {
            Some(payload) if self.selection.can_submit() => {
                let payload = payload.clone();
                self.begin(Command::SubmitImage(payload))
            }
            _ => self.validation_failed(ValidationError::NoImage),
        }
    }

    pub fn image_analyzed(&mut self, outcome: Outcome<Envelope<ImageAnalysis>>) {
        self.complete(outcome, IMAGE_FALLBACK, AnalysisResult::Image);
    }

    // History

    pub fn history_loaded(&mut self, ticket: FetchTicket, outcome: Outcome<HistoryList>) {
        self.history.loaded(ticket, outcome);
    }

    pub fn request_clear_history(&mut self) {
        self.history.request_clear();
    }

    pub fn cancel_clear_history(&mut self) {
        self.history.cancel_clear();
    }

    pub fn confirm_clear_history(&mut self) -> Command {
        if self.history.confirm_clear() {
            Command::ClearHistory
        } else {
            Command::None
        }
    }

    pub fn history_cleared(&mut self, outcome: Outcome<Acknowledgement>) {
        self.history.cleared(outcome);
    }

    /// Lowers the loading gate whatever the outcome, then replaces the
    /// results region with either the rendering or a single error.
    fn complete<T>(
        &mut self,
        outcome: Outcome<Envelope<T>>,
        fallback: &str,
        wrap: impl FnOnce(T) -> AnalysisResult,
    ) {
        self.loading.finish();
        let display = match outcome {
            Ok(envelope) => match envelope.into_payload() {
                Ok(payload) => render::render(&wrap(payload)),
                Err(message) => {
                    let message = message.unwrap_or_else(|| fallback.to_string());
                    warn!("service reported failure: {message}");
                    Display::error(message)
                }
            },
            Err(err) => Display::error(failure_message(&err)),
        };
        self.results = Some(display);
    }
}

fn failure_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Validation(validation) => validation.to_string(),
        GatewayError::Busy => BUSY_ERROR.to_string(),
        GatewayError::Transport(_) | GatewayError::Status(_) | GatewayError::Decode(_) => {
            error!("request failed: {err}");
            CONNECTION_ERROR.to_string()
        }
    }
}
