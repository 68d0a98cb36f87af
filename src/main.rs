mod config;
mod gateway;
mod history;
mod mode;
mod model;
mod orchestrator;
mod render;
mod selection;

use iced::{
    widget::{
        button, column, container, image::{Handle, Image}, progress_bar, row, scrollable, text,
        text_editor, text_input, Column,
    },
    Element, Length, Task, Theme, Subscription,
    time, clipboard,
    keyboard::{self, Key},
    event::{self, Event as IcedEvent},
    alignment,
    window,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::gateway::{Outcome, RequestGateway};
use crate::history::{FetchTicket, HistoryView};
use crate::model::{
    Acknowledgement, Envelope, HistoryList, ImageAnalysis, ImagePayload, Mode, ParsedPage,
    TextAnalysis,
};
use crate::orchestrator::{Command, Orchestrator};
use crate::render::{Block, Format, Kind};
use crate::selection::{Preview, Ticket};

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "competitor_monitor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = config::Config::load();
    let gateway = match RequestGateway::new(&config.server) {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("cannot build HTTP client: {e}");
            std::process::exit(1);
        }
    };
    info!("analysis service at {}", gateway.base_url());

    iced::application("Мониторинг конкурентов", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size: iced::Size::new(config.window.width as f32, config.window.height as f32),
            min_size: Some(iced::Size::new(
                config.window.min_width as f32,
                config.window.min_height as f32,
            )),
            position: window::Position::Centered,
            ..Default::default()
        })
        .run_with(move || App::new(gateway.clone()))
}

#[derive(Debug, Clone)]
enum Message {
    ModeSelected(Mode),
    TextEdited(text_editor::Action),
    AnalyzeText,
    UrlChanged(String),
    Parse,
    ImagePathChanged(String),
    PickImage,
    ImageRead(Result<ImagePayload, String>),
    PreviewDecoded(Ticket, Result<Preview, String>),
    RemoveImage,
    AnalyzeImage,
    FileHovered,
    FilesHoveredLeft,
    FileDropped(PathBuf),
    TextAnalyzed(Outcome<Envelope<TextAnalysis>>),
    ImageAnalyzed(Outcome<Envelope<ImageAnalysis>>),
    PageParsed(Outcome<Envelope<ParsedPage>>),
    HistoryLoaded(FetchTicket, Outcome<HistoryList>),
    ClearHistory,
    ConfirmClearHistory,
    CancelClearHistory,
    HistoryCleared(Outcome<Acknowledgement>),
    HealthChecked(bool),
    CloseResults,
    CopyResults(Format),
    Tick,
    Exit,
}

struct App {
    orchestrator: Orchestrator,
    gateway: RequestGateway,
    editor: text_editor::Content,
    preview: Option<Handle>,
    server_online: Option<bool>,
    loading_frame: usize,
}

impl App {
    fn new(gateway: RequestGateway) -> (Self, Task<Message>) {
        let app = App {
            orchestrator: Orchestrator::default(),
            gateway: gateway.clone(),
            editor: text_editor::Content::new(),
            preview: None,
            server_online: None,
            loading_frame: 0,
        };
        let health = Task::perform(async move { gateway.health().await }, Message::HealthChecked);
        (app, health)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        let app = &mut self.orchestrator;
        let command = match message {
            Message::ModeSelected(mode) => app.select_mode(mode),
            Message::TextEdited(action) => {
                self.editor.perform(action);
                app.text_input = self.editor.text();
                Command::None
            }
            Message::AnalyzeText => app.analyze_text(),
            Message::UrlChanged(value) => {
                app.url_input = value;
                Command::None
            }
            Message::Parse => app.parse_url(),
            Message::ImagePathChanged(value) => {
                app.image_path_input = value;
                Command::None
            }
            Message::PickImage => app.pick_image(),
            Message::ImageRead(outcome) => app.image_read(outcome),
            Message::PreviewDecoded(ticket, outcome) => {
                app.preview_decoded(ticket, outcome);
                Command::None
            }
            Message::RemoveImage => {
                app.remove_image();
                Command::None
            }
            Message::AnalyzeImage => app.analyze_image(),
            Message::FileHovered => {
                app.file_hovered();
                Command::None
            }
            Message::FilesHoveredLeft => {
                app.hover_left();
                Command::None
            }
            Message::FileDropped(path) => app.file_dropped(path),
            Message::TextAnalyzed(outcome) => {
                app.text_analyzed(outcome);
                Command::None
            }
            Message::ImageAnalyzed(outcome) => {
                app.image_analyzed(outcome);
                Command::None
            }
            Message::PageParsed(outcome) => {
                app.page_parsed(outcome);
                Command::None
            }
            Message::HistoryLoaded(ticket, outcome) => {
                app.history_loaded(ticket, outcome);
                Command::None
            }
            Message::ClearHistory => {
                app.request_clear_history();
                Command::None
            }
            Message::ConfirmClearHistory => app.confirm_clear_history(),
            Message::CancelClearHistory => {
                app.cancel_clear_history();
                Command::None
            }
            Message::HistoryCleared(outcome) => {
                app.history_cleared(outcome);
                Command::None
            }
            Message::HealthChecked(online) => {
                if !online {
                    error!("analysis service unreachable at {}", self.gateway.base_url());
                }
                self.server_online = Some(online);
                Command::None
            }
            Message::CloseResults => {
                app.close_results();
                Command::None
            }
            Message::CopyResults(format) => {
                return match app.results() {
                    Some(display) => clipboard::write(display.to_markup(format)),
                    None => Task::none(),
                };
            }
            Message::Tick => {
                if app.is_loading() {
                    self.loading_frame = (self.loading_frame + 1) % 80; // 10 frames * 8 messages
                }
                Command::None
            }
            Message::Exit => return iced::exit(),
        };

        self.sync_preview();
        self.run(command)
    }

    /// Keeps one texture per decoded preview instead of rebuilding it every frame.
    fn sync_preview(&mut self) {
        match self.orchestrator.selection().preview() {
            None => self.preview = None,
            Some(preview) if self.preview.is_none() => {
                self.preview = Some(Handle::from_rgba(
                    preview.width,
                    preview.height,
                    preview.rgba.clone(),
                ));
            }
            Some(_) => {}
        }
    }

    fn run(&self, command: Command) -> Task<Message> {
        let gateway = self.gateway.clone();
        match command {
            Command::None => Task::none(),
            Command::SubmitText(text) => Task::perform(
                async move { gateway.submit_text(&text).await.map_err(Arc::new) },
                Message::TextAnalyzed,
            ),
            Command::SubmitImage(payload) => Task::perform(
                async move { gateway.submit_image(&payload).await.map_err(Arc::new) },
                Message::ImageAnalyzed,
            ),
            Command::SubmitUrl(url) => Task::perform(
                async move { gateway.submit_url(&url).await.map_err(Arc::new) },
                Message::PageParsed,
            ),
            Command::FetchHistory(ticket) => Task::perform(
                async move { gateway.fetch_history().await.map_err(Arc::new) },
                move |outcome| Message::HistoryLoaded(ticket, outcome),
            ),
            Command::ClearHistory => Task::perform(
                async move { gateway.clear_history().await.map_err(Arc::new) },
                Message::HistoryCleared,
            ),
            Command::ReadImage(path) => Task::perform(
                async move { selection::read_image(path).await.map_err(|e| e.to_string()) },
                Message::ImageRead,
            ),
            Command::DecodePreview(ticket, payload) => Task::perform(
                async move {
                    selection::decode_preview_async(payload)
                        .await
                        .map_err(|e| format!("{e:#}"))
                },
                move |outcome| Message::PreviewDecoded(ticket, outcome),
            ),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let timer = if self.orchestrator.is_loading() {
            time::every(Duration::from_millis(80)).map(|_| Message::Tick)
        } else {
            Subscription::none()
        };

        let events = event::listen_with(|event, _status, _id| match event {
            IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) => Some(Message::Exit),
            IcedEvent::Window(window::Event::FileHovered(_)) => Some(Message::FileHovered),
            IcedEvent::Window(window::Event::FilesHoveredLeft) => Some(Message::FilesHoveredLeft),
            IcedEvent::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            _ => None,
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        let app = &self.orchestrator;

        let nav = Mode::ALL.iter().fold(row![].spacing(8), |nav, &mode| {
            let style: fn(&Theme, button::Status) -> button::Style = if app.mode() == mode {
                button::primary
            } else {
                button::secondary
            };
            nav.push(
                button(text(mode.label()))
                    .padding(10)
                    .style(style)
                    .on_press(Message::ModeSelected(mode)),
            )
        });

        let status = match self.server_online {
            None => text("● Проверка соединения..."),
            Some(true) => text("● Система активна").style(text::success),
            Some(false) => text("● Сервер недоступен").style(text::danger),
        };

        let header = row![nav, container(status).width(Length::Fill).align_x(alignment::Horizontal::Right)]
            .spacing(10)
            .align_y(alignment::Vertical::Center);

        let panel = match app.mode() {
            Mode::Text => self.text_panel(),
            Mode::Image => self.image_panel(),
            Mode::Parse => self.parse_panel(),
            Mode::History => self.history_panel(),
        };

        let mut content = column![header, panel].spacing(16).padding(16);

        if app.is_loading() {
            content = content.push(self.loading_view());
        } else if let (Some(display), false) = (app.results(), app.mode() == Mode::History) {
            content = content.push(results_view(&display.blocks));
        }

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn submit_button(&self, label: &str, message: Message, enabled: bool) -> Element<Message> {
        let ready = enabled && !self.orchestrator.is_loading();
        button(text(label.to_string()))
            .padding(12)
            .on_press_maybe(ready.then_some(message))
            .into()
    }

    fn text_panel(&self) -> Element<Message> {
        let input = text_editor(&self.editor)
            .placeholder("Вставьте текст конкурента: описание продукта, рекламу, отзывы...")
            .on_action(Message::TextEdited)
            .height(Length::Fixed(180.0))
            .padding(15)
            .size(16);

        column![input, self.submit_button("Анализировать", Message::AnalyzeText, true)]
            .spacing(10)
            .into()
    }

    fn image_panel(&self) -> Element<Message> {
        let selection = self.orchestrator.selection();

        let zone: Element<Message> = match (&self.preview, selection.payload()) {
            (Some(handle), Some(payload)) => column![
                Image::new(handle.clone()).width(Length::Fixed(300.0)),
                text(payload.file_name.as_str()),
                button(text("Удалить")).on_press(Message::RemoveImage),
            ]
            .spacing(8)
            .align_x(alignment::Horizontal::Center)
            .into(),
            (None, Some(payload)) => text(format!("Загрузка превью {}...", payload.file_name)).into(),
            _ => {
                let prompt = if selection.is_drag_over() {
                    "📥 Отпустите файл"
                } else {
                    "📁 Перетащите изображение или укажите путь к файлу"
                };
                column![text(prompt).size(18), text("PNG, JPG, GIF, WEBP до 10MB").size(12)]
                    .spacing(6)
                    .align_x(alignment::Horizontal::Center)
                    .into()
            }
        };

        let zone = container(zone)
            .width(Length::Fill)
            .padding(30)
            .align_x(alignment::Horizontal::Center)
            .style(container::rounded_box);

        let path = row![
            text_input("/путь/к/изображению.png", &self.orchestrator.image_path_input)
                .on_input(Message::ImagePathChanged)
                .on_submit(Message::PickImage)
                .padding(10),
            button(text("Выбрать")).padding(10).on_press(Message::PickImage),
        ]
        .spacing(8);

        column![
            zone,
            path,
            self.submit_button("Анализировать изображение", Message::AnalyzeImage, selection.can_submit()),
        ]
        .spacing(10)
        .into()
    }

    fn parse_panel(&self) -> Element<Message> {
        let input = text_input("example.com", &self.orchestrator.url_input)
            .on_input(Message::UrlChanged)
            .on_submit(Message::Parse)
            .padding(15)
            .size(16);

        column![input, self.submit_button("Парсить", Message::Parse, true)]
            .spacing(10)
            .into()
    }

    fn history_panel(&self) -> Element<Message> {
        let history = self.orchestrator.history();

        let actions: Element<Message> = if history.is_confirming() {
            row![
                text("Вы уверены, что хотите очистить историю?"),
                button(text("Да")).style(button::danger).on_press(Message::ConfirmClearHistory),
                button(text("Нет")).style(button::secondary).on_press(Message::CancelClearHistory),
            ]
            .spacing(8)
            .align_y(alignment::Vertical::Center)
            .into()
        } else {
            button(text("🗑 Очистить")).style(button::secondary).on_press(Message::ClearHistory).into()
        };

        let body: Element<Message> = match history.view() {
            _ if history.is_loading() => text("Загрузка...").into(),
            HistoryView::NotLoaded => text("").into(),
            HistoryView::Empty => container(
                text(format!("{} {}", Kind::EmptyHistory.icon(), Kind::EmptyHistory.label())).size(16),
            )
            .padding(40)
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Center)
            .into(),
            HistoryView::Rows(rows) => Column::with_children(rows.iter().map(|entry| {
                let mut lines = column![
                    text(entry.label.as_str()).size(12).style(text::primary),
                    text(entry.summary.as_str()),
                ];
                if let Some(detail) = &entry.detail {
                    lines = lines.push(text(detail.as_str()).size(12).style(text::secondary));
                }

                container(
                    row![
                        text(entry.icon).size(24),
                        lines.width(Length::Fill),
                        text(entry.time.as_str()).size(12),
                    ]
                    .spacing(12)
                    .align_y(alignment::Vertical::Center),
                )
                .padding(10)
                .style(container::rounded_box)
                .into()
            }))
            .spacing(8)
            .into(),
        };

        column![actions, body].spacing(12).into()
    }

    fn loading_view(&self) -> Element<Message> {
        let loading_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let loading_messages = [
            "Анализирую данные...",
            "Изучаю конкурента...",
            "Ищу сильные стороны...",
            "Ищу слабые места...",
            "Формулирую рекомендации...",
            "Сравниваю предложения...",
            "Оцениваю визуальный стиль...",
            "Почти готово...",
        ];

        let message_idx = (self.loading_frame / 10) % loading_messages.len();
        let spinner_idx = self.loading_frame % loading_frames.len();

        container(
            column![
                text(loading_frames[spinner_idx]).size(32),
                text(loading_messages[message_idx]).size(15)
            ]
            .spacing(10)
            .align_x(alignment::Horizontal::Center),
        )
        .width(Length::Fill)
        .padding(30)
        .align_x(alignment::Horizontal::Center)
        .into()
    }
}

fn results_view(blocks: &[Block]) -> Element<'_, Message> {
    let toolbar = row![
        text("Результаты").size(20).width(Length::Fill),
        button(text("Копировать")).style(button::secondary).on_press(Message::CopyResults(Format::Plain)),
        button(text("HTML")).style(button::secondary).on_press(Message::CopyResults(Format::Html)),
        button(text("✕")).style(button::secondary).on_press(Message::CloseResults),
    ]
    .spacing(8)
    .align_y(alignment::Vertical::Center);

    let blocks = Column::with_children(blocks.iter().map(block_view)).spacing(12);
    column![toolbar, blocks].spacing(12).into()
}

fn heading(kind: Kind) -> Element<'static, Message> {
    text(format!("{} {}", kind.icon(), kind.label())).size(17).into()
}

fn block_view(block: &Block) -> Element<'_, Message> {
    let body: Element<Message> = match block {
        Block::List { kind, items } => column![
            heading(*kind),
            Column::with_children(items.iter().map(|item| text(format!("• {item}")).into())).spacing(4),
        ]
        .spacing(8)
        .into(),
        Block::Paragraph { kind, text: content } => {
            column![heading(*kind), text(content.as_str())].spacing(8).into()
        }
        Block::Score {
            kind,
            score,
            fill_percent,
            text: analysis,
        } => column![
            heading(*kind),
            row![
                text(format!("{}/10", render::format_score(*score))).size(20),
                progress_bar(0.0..=100.0, *fill_percent as f32).height(Length::Fixed(10.0)),
            ]
            .spacing(12)
            .align_y(alignment::Vertical::Center),
            text(analysis.as_str()),
        ]
        .spacing(8)
        .into(),
        Block::Table { rows } => Column::with_children(rows.iter().map(|r| {
            let value = if r.missing {
                text(r.value.as_str()).style(text::secondary)
            } else {
                text(r.value.as_str())
            };
            row![text(r.label).width(Length::Fixed(140.0)), value].spacing(8).into()
        }))
        .spacing(6)
        .into(),
        Block::Error { message } => text(format!("{} {message}", Kind::Error.icon()))
            .style(text::danger)
            .into(),
    };

    container(body)
        .padding(14)
        .width(Length::Fill)
        .style(container::rounded_box)
        .into()
}

impl App {
    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
