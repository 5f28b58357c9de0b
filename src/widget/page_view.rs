use crate::native_engine::PageView;
use crate::theme::{Base16Palette, parse_hex_color};
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph},
};

/// What the content area shows when no page is available.
pub enum PageContent<'a> {
    Page(PageView<'a>),
    Loading(&'a str),
    Empty,
}

pub fn render_page(
    f: &mut Frame,
    area: Rect,
    content: PageContent<'_>,
    is_focused: bool,
    palette: &Base16Palette,
) {
    let (border, title_color, _) = palette.get_panel_colors(is_focused);

    let message = match content {
        PageContent::Page(page) => {
            render_text(f, area, page, border, title_color, palette);
            return;
        }
        PageContent::Loading(file_name) => format!("Loading {file_name}…"),
        PageContent::Empty => {
            "Press o to open an EPUB file, or drop one onto the terminal.".to_string()
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .style(Style::default().bg(palette.base_00));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let top = inner.height / 2;
    let message_area = Rect {
        y: inner.y + top,
        height: inner.height.saturating_sub(top).min(1),
        ..inner
    };
    f.render_widget(
        Paragraph::new(Span::styled(message, Style::default().fg(palette.base_04)))
            .alignment(Alignment::Center),
        message_area,
    );
}

fn render_text(
    f: &mut Frame,
    area: Rect,
    page: PageView<'_>,
    border: Color,
    title_color: Color,
    palette: &Base16Palette,
) {
    let bg = page
        .background
        .and_then(parse_hex_color)
        .unwrap_or(palette.base_00);
    let fg = page
        .foreground
        .and_then(parse_hex_color)
        .unwrap_or(palette.base_05);

    let footer = format!(
        " page {}/{} · section {}/{} ",
        page.page + 1,
        page.page_count,
        page.chapter_index + 1,
        page.chapter_count
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title_bottom(
            Line::from(Span::styled(
                footer,
                Style::default()
                    .fg(title_color)
                    .add_modifier(Modifier::DIM),
            ))
            .right_aligned(),
        )
        .padding(Padding::horizontal(1))
        .style(Style::default().bg(bg).fg(fg));

    let lines: Vec<Line> = page
        .lines
        .iter()
        .map(|l| Line::from(l.to_string()))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

/// Cells available for text inside the content block.
pub fn text_viewport(area: Rect) -> (u16, u16) {
    // Borders on both sides plus one column of padding each side.
    (area.width.saturating_sub(4), area.height.saturating_sub(2))
}
