use crate::main_app::VimNavMotions;
use crate::theme::Base16Palette;
use crate::toc::{FlattenedTocEntry, find_entry_index};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

const INDENT: &str = "  ";
const ACTIVE_MARKER: &str = "▶ ";

/// Left panel listing the flattened table of contents. The cursor moves
/// independently of the active chapter, which follows relocation events.
pub struct NavigationPanel {
    state: ListState,
    len: usize,
    page_size: usize,
}

impl Default for NavigationPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationPanel {
    pub fn new() -> Self {
        Self {
            state: ListState::default(),
            len: 0,
            page_size: 10,
        }
    }

    /// Re-syncs with a new TOC, keeping the cursor in range.
    pub fn sync(&mut self, entries: &[FlattenedTocEntry]) {
        if entries.len() != self.len {
            self.len = entries.len();
            let selected = match (self.state.selected(), self.len) {
                (_, 0) => None,
                (Some(i), len) => Some(i.min(len - 1)),
                (None, _) => Some(0),
            };
            self.state.select(selected);
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selected()
    }

    /// Moves the cursor onto the entry for `locator`, if there is one.
    pub fn select_locator(&mut self, locator: &str, entries: &[FlattenedTocEntry]) {
        if let Some(index) = find_entry_index(locator, entries) {
            self.state.select(Some(index));
        }
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        entries: &[FlattenedTocEntry],
        active_locator: &str,
        is_focused: bool,
        palette: &Base16Palette,
    ) {
        self.sync(entries);
        self.page_size = usize::from(area.height.saturating_sub(2)).max(1);

        let (border, title, bg) = palette.get_panel_colors(is_focused);
        let (sel_bg, sel_fg) = palette.get_selection_colors(is_focused);
        let active = find_entry_index(active_locator, entries);

        let items: Vec<ListItem> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let is_active = Some(idx) == active;
                let marker = if is_active { ACTIVE_MARKER } else { "  " };
                let style = if is_active {
                    Style::default()
                        .fg(palette.base_0d)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(palette.base_05)
                };

                ListItem::new(Line::from(vec![
                    Span::raw(INDENT.repeat(entry.depth)),
                    Span::styled(marker, Style::default().fg(palette.base_0d)),
                    Span::styled(entry.label.clone(), style),
                ]))
            })
            .collect();

        let block = Block::default()
            .title(Span::styled(" Contents ", Style::default().fg(title)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(bg));

        if items.is_empty() {
            f.render_widget(block, area);
            return;
        }

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(sel_bg).fg(sel_fg));

        f.render_stateful_widget(list, area, &mut self.state);
    }

    fn move_by(&mut self, delta: isize) {
        if self.len == 0 {
            return;
        }
        let current = self.state.selected().unwrap_or(0) as isize;
        let target = (current + delta).clamp(0, self.len as isize - 1);
        self.state.select(Some(target as usize));
    }
}

impl VimNavMotions for NavigationPanel {
    fn handle_h(&mut self) {}

    fn handle_j(&mut self) {
        self.move_by(1);
    }

    fn handle_k(&mut self) {
        self.move_by(-1);
    }

    fn handle_l(&mut self) {}

    fn handle_ctrl_d(&mut self) {
        self.move_by((self.page_size / 2).max(1) as isize);
    }

    fn handle_ctrl_u(&mut self) {
        self.move_by(-((self.page_size / 2).max(1) as isize));
    }

    fn handle_gg(&mut self) {
        if self.len > 0 {
            self.state.select(Some(0));
        }
    }

    fn handle_upper_g(&mut self) {
        if self.len > 0 {
            self.state.select(Some(self.len - 1));
        }
    }
}
