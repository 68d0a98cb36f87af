use tracing::{debug, error, info, warn};

use crate::gateway::Outcome;
use crate::model::{Acknowledgement, HistoryEntry, HistoryList, Timestamp};
use crate::render::Kind;

/// One formatted line of the request log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub kind: Kind,
    pub icon: &'static str,
    pub label: String,
    pub summary: String,
    /// What the service answered, when it logged that too.
    pub detail: Option<String>,
    pub time: String,
}

impl HistoryRow {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        let kind = Kind::for_request_type(&entry.request_type);
        let label = match kind {
            Kind::UnknownRequest => entry.request_type.clone(),
            known => known.label().to_string(),
        };
        HistoryRow {
            kind,
            // Unknown types borrow the text icon.
            icon: match kind {
                Kind::UnknownRequest => Kind::TextRequest.icon(),
                known => known.icon(),
            },
            label,
            summary: entry.request_summary.clone(),
            detail: entry
                .response_summary
                .clone()
                .filter(|detail| !detail.trim().is_empty()),
            time: format_time(&entry.timestamp),
        }
    }
}

/// Day, month, hour and minute as written in ru-RU: `05.03, 14:07`.
pub fn format_time(timestamp: &Timestamp) -> String {
    match timestamp {
        Timestamp::Parsed(at) => at.format("%d.%m, %H:%M").to_string(),
        Timestamp::Raw(raw) => raw.chars().take(16).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryView {
    #[default]
    NotLoaded,
    Empty,
    Rows(Vec<HistoryRow>),
}

/// Identifies one history fetch. A clear invalidates every fetch issued
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
pub struct HistoryController {
    view: HistoryView,
    loading: bool,
    confirming: bool,
    generation: u64,
}

impl HistoryController {
    pub fn view(&self) -> &HistoryView {
        &self.view
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    /// Marks a fetch as started; the caller issues the request and hands
    /// the ticket back with its outcome.
    pub fn refresh(&mut self) -> FetchTicket {
        self.loading = true;
        FetchTicket(self.generation)
    }

    pub fn loaded(&mut self, ticket: FetchTicket, outcome: Outcome<HistoryList>) {
        if ticket.0 != self.generation {
            debug!("stale history fetch dropped");
            return;
        }
        self.loading = false;
        match outcome {
            Ok(list) => self.show(&list.items),
            // A failed refresh leaves whatever was shown before.
            Err(e) => error!("failed to load history: {e}"),
        }
    }

    pub fn show(&mut self, items: &[HistoryEntry]) {
        self.view = if items.is_empty() {
            HistoryView::Empty
        } else {
            HistoryView::Rows(items.iter().map(HistoryRow::from_entry).collect())
        };
    }

    pub fn request_clear(&mut self) {
        self.confirming = true;
    }

    pub fn cancel_clear(&mut self) {
        self.confirming = false;
    }

    /// True when a confirmation was pending, meaning the clear may proceed.
    pub fn confirm_clear(&mut self) -> bool {
        std::mem::take(&mut self.confirming)
    }

    pub fn cleared(&mut self, outcome: Outcome<Acknowledgement>) {
        match outcome {
            Ok(ack) if ack.success => {
                info!("history cleared");
                self.generation += 1;
                self.loading = false;
                self.view = HistoryView::Empty;
            }
            Ok(ack) => warn!("history clear refused: {:?}", ack.message),
            Err(e) => error!("failed to clear history: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn entry(request_type: &str, timestamp: Timestamp) -> HistoryEntry {
        HistoryEntry {
            timestamp,
            request_type: request_type.into(),
            request_summary: "URL: https://a.example".into(),
            response_summary: None,
        }
    }

    fn at(day: u32, month: u32, hour: u32, minute: u32) -> Timestamp {
        Timestamp::Parsed(
            NaiveDate::from_ymd_opt(2024, month, day)
                .unwrap()
                .and_hms_opt(hour, minute, 30)
                .unwrap(),
        )
    }

    #[test]
    fn zero_entries_render_empty_state() {
        let mut history = HistoryController::default();
        let ticket = history.refresh();
        assert!(history.is_loading());
        history.loaded(ticket, Ok(HistoryList::default()));
        assert!(!history.is_loading());
        assert_eq!(history.view(), &HistoryView::Empty);
    }

    #[test]
    fn one_entry_renders_one_row() {
        let mut history = HistoryController::default();
        let mut logged = entry("parse", at(5, 3, 14, 7));
        logged.response_summary = Some("Title: A".into());
        let ticket = history.refresh();
        history.loaded(ticket, Ok(HistoryList { items: vec![logged] }));
        assert_eq!(
            history.view(),
            &HistoryView::Rows(vec![HistoryRow {
                kind: Kind::ParseRequest,
                icon: "🌐",
                label: "Парсинг сайта".into(),
                summary: "URL: https://a.example".into(),
                detail: Some("Title: A".into()),
                time: "05.03, 14:07".into(),
            }])
        );
    }

    #[test]
    fn unknown_type_keeps_raw_label_and_default_icon() {
        let row = HistoryRow::from_entry(&entry("video", Timestamp::Raw("2024-03-05 14:07:09 UTC".into())));
        assert_eq!(row.label, "video");
        assert_eq!(row.icon, Kind::TextRequest.icon());
        assert_eq!(row.time, "2024-03-05 14:07");
    }

    #[test]
    fn failed_refresh_keeps_previous_view() {
        let mut history = HistoryController::default();
        history.show(&[entry("text", at(1, 1, 0, 0))]);
        let ticket = history.refresh();
        history.loaded(ticket, Err(Arc::new(GatewayError::Busy)));
        assert!(matches!(history.view(), HistoryView::Rows(rows) if rows.len() == 1));
    }

    #[test]
    fn clear_needs_confirmation_and_empties_without_refetch() {
        let mut history = HistoryController::default();
        history.show(&[entry("image", at(1, 2, 3, 4))]);

        assert!(!history.confirm_clear());
        history.request_clear();
        assert!(history.is_confirming());
        history.cancel_clear();
        assert!(!history.confirm_clear());

        history.request_clear();
        assert!(history.confirm_clear());
        assert!(!history.is_confirming());
        history.cleared(Ok(Acknowledgement {
            success: true,
            message: None,
        }));
        assert_eq!(history.view(), &HistoryView::Empty);
    }

    #[test]
    fn failed_clear_leaves_rows() {
        let mut history = HistoryController::default();
        history.show(&[entry("image", at(1, 2, 3, 4))]);
        history.cleared(Ok(Acknowledgement::default()));
        assert!(matches!(history.view(), HistoryView::Rows(_)));
    }

    #[test]
    fn fetch_that_lands_after_a_clear_is_ignored() {
        let mut history = HistoryController::default();
        let ticket = history.refresh();
        history.request_clear();
        assert!(history.confirm_clear());
        history.cleared(Ok(Acknowledgement {
            success: true,
            message: None,
        }));
        assert!(!history.is_loading());

        let mut old = entry("text", at(1, 1, 9, 0));
        old.request_summary = "old".into();
        history.loaded(ticket, Ok(HistoryList { items: vec![old] }));
        assert_eq!(history.view(), &HistoryView::Empty);

        let fresh = history.refresh();
        history.loaded(fresh, Ok(HistoryList { items: vec![entry("text", at(1, 1, 9, 5))] }));
        assert!(matches!(history.view(), HistoryView::Rows(rows) if rows.len() == 1));
    }
}
