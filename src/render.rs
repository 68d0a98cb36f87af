//! Turns analysis results into a [`Display`]: a framework-neutral list of
//! titled blocks. The window draws it with widgets; [`Display::to_markup`]
//! serializes it for the clipboard.

use std::borrow::Cow;
use std::fmt::Write;

use crate::model::{AnalysisResult, ImageAnalysis, ParsedPage, TextAnalysis};

pub const NOT_FOUND: &str = "Не найден";

/// Every titled thing the client shows. Icons and labels for result blocks
/// and history rows all come from [`Kind::icon`] and [`Kind::label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Strengths,
    Weaknesses,
    UniqueOffers,
    Recommendations,
    Insights,
    Summary,
    Description,
    VisualStyle,
    Page,
    TextRequest,
    ImageRequest,
    ParseRequest,
    UnknownRequest,
    EmptyHistory,
    Error,
}

impl Kind {
    pub fn icon(self) -> &'static str {
        self.meta().0
    }

    pub fn label(self) -> &'static str {
        self.meta().1
    }

    fn meta(self) -> (&'static str, &'static str) {
        match self {
            Kind::Strengths => ("✔", "Сильные стороны"),
            Kind::Weaknesses => ("⚠", "Слабые стороны"),
            Kind::UniqueOffers => ("★", "Уникальные предложения"),
            Kind::Recommendations => ("💡", "Рекомендации"),
            Kind::Insights => ("👁", "Маркетинговые инсайты"),
            Kind::Summary => ("📄", "Резюме"),
            Kind::Description => ("🖼", "Описание изображения"),
            Kind::VisualStyle => ("★", "Оценка визуального стиля"),
            Kind::Page => ("🌐", "Страница"),
            Kind::TextRequest => ("📝", "Анализ текста"),
            Kind::ImageRequest => ("🖼", "Анализ изображения"),
            Kind::ParseRequest => ("🌐", "Парсинг сайта"),
            Kind::UnknownRequest => ("📄", ""),
            Kind::EmptyHistory => ("🕑", "История пуста"),
            Kind::Error => ("⛔", "Ошибка"),
        }
    }

    /// Kind of a logged request; unknown types get [`Kind::UnknownRequest`].
    pub fn for_request_type(request_type: &str) -> Kind {
        match request_type {
            "text" => Kind::TextRequest,
            "image" => Kind::ImageRequest,
            "parse" => Kind::ParseRequest,
            _ => Kind::UnknownRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: &'static str,
    pub value: String,
    pub missing: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    List {
        kind: Kind,
        items: Vec<String>,
    },
    Paragraph {
        kind: Kind,
        text: String,
    },
    Score {
        kind: Kind,
        score: f64,
        /// `score / 10 * 100`, held inside 0..=100 for drawing.
        fill_percent: f64,
        text: String,
    },
    Table {
        rows: Vec<TableRow>,
    },
    Error {
        message: String,
    },
}

impl Block {
    pub fn kind(&self) -> Kind {
        match self {
            Block::List { kind, .. } | Block::Paragraph { kind, .. } | Block::Score { kind, .. } => {
                *kind
            }
            Block::Table { .. } => Kind::Page,
            Block::Error { .. } => Kind::Error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Display {
    pub blocks: Vec<Block>,
}

impl Display {
    pub fn error(message: impl Into<String>) -> Self {
        Display {
            blocks: vec![Block::Error {
                message: message.into(),
            }],
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.blocks.as_slice(), [Block::Error { .. }])
    }

    #[cfg(test)]
    pub fn find(&self, kind: Kind) -> Option<&Block> {
        self.blocks.iter().find(|block| block.kind() == kind)
    }

    pub fn to_markup(&self, format: Format) -> String {
        match format {
            Format::Plain => self.to_plain(),
            Format::Html => self.to_html(),
        }
    }

    fn to_plain(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            if !out.is_empty() {
                out.push('\n');
            }
            match block {
                Block::List { kind, items } => {
                    let _ = writeln!(out, "{} {}", kind.icon(), kind.label());
                    for item in items {
                        let _ = writeln!(out, "  • {item}");
                    }
                }
                Block::Paragraph { kind, text } => {
                    let _ = writeln!(out, "{} {}\n  {text}", kind.icon(), kind.label());
                }
                Block::Score { kind, score, text, .. } => {
                    let _ = writeln!(
                        out,
                        "{} {}\n  {}/10\n  {text}",
                        kind.icon(),
                        kind.label(),
                        format_score(*score)
                    );
                }
                Block::Table { rows } => {
                    for row in rows {
                        let _ = writeln!(out, "{} {}", row.label, row.value);
                    }
                }
                Block::Error { message } => {
                    let _ = writeln!(out, "{} {message}", Kind::Error.icon());
                }
            }
        }
        out
    }

    fn to_html(&self) -> String {
        let esc = |text: &str| escape(Format::Html, text).into_owned();
        let heading = |kind: Kind| format!("<h3>{} {}</h3>", esc(kind.icon()), esc(kind.label()));
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                Block::List { kind, items } => {
                    let _ = write!(out, "<div class=\"result-block\">{}<ul>", heading(*kind));
                    for item in items {
                        let _ = write!(out, "<li>{}</li>", esc(item));
                    }
                    out.push_str("</ul></div>");
                }
                Block::Paragraph { kind, text } => {
                    let _ = write!(
                        out,
                        "<div class=\"result-block\">{}<p>{}</p></div>",
                        heading(*kind),
                        esc(text)
                    );
                }
                Block::Score {
                    kind,
                    score,
                    fill_percent,
                    text,
                } => {
                    let _ = write!(
                        out,
                        "<div class=\"result-block\">{}<div class=\"score-display\">\
                         <span class=\"score-value\">{}/10</span>\
                         <div class=\"score-bar\"><div class=\"score-fill\" style=\"width: {}%\"></div></div>\
                         </div><p>{}</p></div>",
                        heading(*kind),
                        format_score(*score),
                        fill_percent,
                        esc(text)
                    );
                }
                Block::Table { rows } => {
                    out.push_str("<div class=\"parsed-content\">");
                    for row in rows {
                        let _ = write!(
                            out,
                            "<div class=\"label\">{}</div><div class=\"value\">{}</div>",
                            esc(row.label),
                            esc(&row.value)
                        );
                    }
                    out.push_str("</div>");
                }
                Block::Error { message } => {
                    let _ = write!(out, "<div class=\"error-message\"><span>{}</span></div>", esc(message));
                }
            }
        }
        out
    }
}

/// Output target for [`escape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Plain,
    Html,
}

pub fn escape(format: Format, text: &str) -> Cow<'_, str> {
    match format {
        Format::Plain => Cow::Borrowed(text),
        Format::Html => html_escape::encode_text(text),
    }
}

pub fn render(result: &AnalysisResult) -> Display {
    match result {
        AnalysisResult::Text(analysis) => render_text(analysis),
        AnalysisResult::Image(analysis) => render_image(analysis),
        AnalysisResult::Page(page) => render_page(page),
    }
}

pub fn render_text(analysis: &TextAnalysis) -> Display {
    let mut display = Display::default();
    push_text_blocks(&mut display.blocks, analysis);
    display
}

fn push_text_blocks(blocks: &mut Vec<Block>, analysis: &TextAnalysis) {
    push_list(blocks, Kind::Strengths, &analysis.strengths);
    push_list(blocks, Kind::Weaknesses, &analysis.weaknesses);
    push_list(blocks, Kind::UniqueOffers, &analysis.unique_offers);
    push_list(blocks, Kind::Recommendations, &analysis.recommendations);
    if let Some(summary) = analysis.summary.as_deref().filter(|s| !s.trim().is_empty()) {
        blocks.push(Block::Paragraph {
            kind: Kind::Summary,
            text: summary.to_string(),
        });
    }
}

fn push_list(blocks: &mut Vec<Block>, kind: Kind, items: &[String]) {
    if items.is_empty() {
        return;
    }
    blocks.push(Block::List {
        kind,
        items: items.to_vec(),
    });
}

pub fn render_image(analysis: &ImageAnalysis) -> Display {
    let mut blocks = vec![
        Block::Paragraph {
            kind: Kind::Description,
            text: or_placeholder(Some(&analysis.description)),
        },
        Block::Score {
            kind: Kind::VisualStyle,
            score: analysis.visual_style_score,
            fill_percent: fill_percent(analysis.visual_style_score),
            text: or_placeholder(Some(&analysis.visual_style_analysis)),
        },
    ];
    push_list(&mut blocks, Kind::Insights, &analysis.marketing_insights);
    push_list(&mut blocks, Kind::Recommendations, &analysis.recommendations);
    Display { blocks }
}

pub fn render_page(page: &ParsedPage) -> Display {
    let row = |label: &'static str, value: Option<&String>| {
        let missing = value.map_or(true, |v| v.trim().is_empty());
        TableRow {
            label,
            value: or_placeholder(value),
            missing,
        }
    };
    let mut blocks = vec![Block::Table {
        rows: vec![
            TableRow {
                label: "URL:",
                value: page.url.clone(),
                missing: false,
            },
            row("Title:", page.title.as_ref()),
            row("H1:", page.h1.as_ref()),
            row("Первый абзац:", page.first_paragraph.as_ref()),
        ],
    }];
    if let Some(analysis) = &page.analysis {
        push_text_blocks(&mut blocks, analysis);
    }
    Display { blocks }
}

fn or_placeholder(value: Option<&String>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.clone(),
        _ => NOT_FOUND.to_string(),
    }
}

pub fn fill_percent(score: f64) -> f64 {
    (score / 10.0 * 100.0).clamp(0.0, 100.0)
}

/// `7.0` prints as `7`, `7.5` as `7.5`; out-of-range values print as given.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        format!("{score}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_lists_and_missing_summary_are_omitted() {
        let display = render_text(&TextAnalysis {
            strengths: vec![],
            weaknesses: strings(&["weak packaging"]),
            unique_offers: vec![],
            recommendations: strings(&["improve packaging"]),
            summary: None,
        });
        assert_eq!(
            display.blocks,
            vec![
                Block::List {
                    kind: Kind::Weaknesses,
                    items: strings(&["weak packaging"]),
                },
                Block::List {
                    kind: Kind::Recommendations,
                    items: strings(&["improve packaging"]),
                },
            ]
        );
    }

    #[test]
    fn list_items_keep_count_and_order() {
        let display = render_text(&TextAnalysis {
            strengths: strings(&["c", "a", "b"]),
            summary: Some("overall fine".into()),
            ..TextAnalysis::default()
        });
        assert_eq!(display.blocks.len(), 2);
        match display.find(Kind::Strengths) {
            Some(Block::List { items, .. }) => assert_eq!(items, &strings(&["c", "a", "b"])),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            display.find(Kind::Summary),
            Some(Block::Paragraph { text, .. }) if text == "overall fine"
        ));
    }

    #[test]
    fn blank_summary_is_omitted() {
        let display = render_text(&TextAnalysis {
            summary: Some("   ".into()),
            ..TextAnalysis::default()
        });
        assert!(display.blocks.is_empty());
    }

    #[test]
    fn score_fill_is_proportional_and_clamped() {
        assert_eq!(fill_percent(7.0), 70.0);
        assert_eq!(fill_percent(0.0), 0.0);
        assert_eq!(fill_percent(10.0), 100.0);
        assert_eq!(fill_percent(12.0), 100.0);
        assert_eq!(fill_percent(-3.0), 0.0);
        assert_eq!(format_score(7.0), "7");
        assert_eq!(format_score(7.5), "7.5");
        assert_eq!(format_score(12.0), "12");
    }

    #[test]
    fn image_analysis_has_description_and_score() {
        let display = render_image(&ImageAnalysis {
            description: "Red banner".into(),
            visual_style_score: 12.0,
            visual_style_analysis: String::new(),
            marketing_insights: strings(&["discount focus"]),
            recommendations: vec![],
        });
        assert_eq!(display.blocks.len(), 3);
        assert_eq!(
            display.blocks[1],
            Block::Score {
                kind: Kind::VisualStyle,
                score: 12.0,
                fill_percent: 100.0,
                text: NOT_FOUND.into(),
            }
        );
        assert!(display.find(Kind::Recommendations).is_none());
        assert!(display.to_markup(Format::Plain).contains("12/10"));
    }

    #[test]
    fn parsed_page_uses_placeholder_and_appends_analysis() {
        let display = render_page(&ParsedPage {
            url: "https://shop.example".into(),
            title: Some("Shop".into()),
            h1: None,
            first_paragraph: Some(String::new()),
            analysis: Some(TextAnalysis {
                strengths: strings(&["wide range"]),
                ..TextAnalysis::default()
            }),
        });
        match &display.blocks[0] {
            Block::Table { rows } => {
                let values: Vec<_> = rows.iter().map(|r| r.value.as_str()).collect();
                assert_eq!(values, vec!["https://shop.example", "Shop", NOT_FOUND, NOT_FOUND]);
                assert_eq!(rows.iter().filter(|r| r.missing).count(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(display.blocks.len(), 2);
        assert_eq!(display.blocks[1].kind(), Kind::Strengths);
    }

    #[test]
    fn page_without_analysis_is_only_the_table() {
        let display = render(&AnalysisResult::Page(ParsedPage {
            url: "https://a.example".into(),
            ..ParsedPage::default()
        }));
        assert_eq!(display.blocks.len(), 1);
    }

    #[test]
    fn html_output_escapes_remote_text() {
        let display = render_text(&TextAnalysis {
            strengths: strings(&["<script>alert(1)</script>"]),
            summary: Some("Tom & Jerry".into()),
            ..TextAnalysis::default()
        });
        let html = display.to_markup(Format::Html);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Tom &amp; Jerry"));

        let plain = display.to_markup(Format::Plain);
        assert!(plain.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn error_display_escapes_too() {
        let html = Display::error("<b>down</b>").to_markup(Format::Html);
        assert!(html.contains("&lt;b&gt;down&lt;/b&gt;"));
    }

    #[test]
    fn request_types_share_the_kind_table() {
        assert_eq!(Kind::for_request_type("text").label(), "Анализ текста");
        assert_eq!(Kind::for_request_type("parse").icon(), "🌐");
        assert_eq!(Kind::for_request_type("video"), Kind::UnknownRequest);
    }
}
