use crate::theme::Base16Palette;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph},
};

/// Shown instead of a chapter title the TOC does not know.
pub const UNKNOWN_CHAPTER_PLACEHOLDER: &str = "—";
pub const INDEXING_LABEL: &str = "indexing…";

/// Everything the status bar displays, gathered from the reader each frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusInfo {
    pub file_name: Option<String>,
    pub chapter_title: String,
    pub has_book: bool,
    /// `None` while the progress slider is disabled.
    pub progress: Option<f64>,
    /// Uncommitted slider value while dragging.
    pub drag: Option<f64>,
    pub theme: String,
    pub font: String,
    pub font_size_percent: u16,
    pub line_height_label: String,
}

impl StatusInfo {
    pub fn chapter_label(&self) -> &str {
        let title = self.chapter_title.trim();
        if title.is_empty() {
            UNKNOWN_CHAPTER_PLACEHOLDER
        } else {
            title
        }
    }

    pub fn progress_label(&self) -> String {
        match (self.drag, self.progress) {
            (Some(drag), _) => format!("→ {drag:.1}% (Enter to jump, Esc to cancel)"),
            (None, Some(progress)) => format!("{progress:.1}%"),
            (None, None) => INDEXING_LABEL.to_string(),
        }
    }
}

const GAUGE_WIDTH: usize = 20;

fn gauge(percentage: f64) -> String {
    let filled = ((percentage.clamp(0.0, 100.0) / 100.0) * GAUGE_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "█".repeat(filled),
        "░".repeat(GAUGE_WIDTH - filled)
    )
}

/// Two rows: reading position, then appearance controls with key hints.
pub fn render_status_bar(f: &mut Frame, area: Rect, info: &StatusInfo, palette: &Base16Palette) {
    let label = Style::default().fg(palette.base_03);
    let value = Style::default().fg(palette.base_05);
    let accent = Style::default()
        .fg(palette.base_0d)
        .add_modifier(Modifier::BOLD);

    let position = if info.has_book {
        let mut spans = vec![
            Span::styled(info.file_name.clone().unwrap_or_default(), accent),
            Span::styled(" │ ", label),
            Span::styled(info.chapter_label().to_string(), value),
            Span::styled(" │ ", label),
        ];
        if let Some(percentage) = info.drag.or(info.progress) {
            spans.push(Span::styled(gauge(percentage), value));
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(info.progress_label(), value));
        Line::from(spans)
    } else {
        Line::from(Span::styled(
            info.file_name
                .as_deref()
                .map(|name| format!("Loading {name}…"))
                .unwrap_or_else(|| "No book open".to_string()),
            label,
        ))
    };

    let appearance = Line::from(vec![
        Span::styled("Theme ", label),
        Span::styled(info.theme.clone(), value),
        Span::styled("  Font ", label),
        Span::styled(info.font.clone(), value),
        Span::styled("  Size ", label),
        Span::styled(format!("{}%", info.font_size_percent), value),
        Span::styled("  Spacing ", label),
        Span::styled(format!("{}×", info.line_height_label), value),
        Span::styled(
            "   o open · h/l page · [ ] seek · t theme · f/F font · +/- size · </> spacing · q quit",
            label,
        ),
    ]);

    f.render_widget(
        Paragraph::new(vec![position, appearance])
            .block(Block::default().style(Style::default().bg(palette.base_01))),
        area,
    );
}

pub fn render_error_banner(f: &mut Frame, area: Rect, message: &str, palette: &Base16Palette) {
    f.render_widget(
        Paragraph::new(Span::styled(
            format!(" ✖ {message}"),
            Style::default()
                .fg(palette.base_00)
                .add_modifier(Modifier::BOLD),
        ))
        .block(Block::default().style(Style::default().bg(palette.base_08))),
        area,
    );
}
