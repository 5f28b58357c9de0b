use crate::inputs::KeySeq;
use crate::main_app::VimNavMotions;
use crate::stylesheet::ThemeName;
use crate::theme::palette_for;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState},
};

use super::centered_rect;

pub enum ThemeSelectorAction {
    Close,
    ThemeChanged(ThemeName),
}

pub struct ThemeSelector {
    state: ListState,
    current: ThemeName,
}

impl ThemeSelector {
    pub fn new(current: ThemeName) -> Self {
        let current_idx = ThemeName::all()
            .iter()
            .position(|t| *t == current)
            .unwrap_or(0);

        let mut state = ListState::default();
        state.select(Some(current_idx));

        ThemeSelector { state, current }
    }

    pub fn selected(&self) -> Option<ThemeName> {
        self.state
            .selected()
            .and_then(|idx| ThemeName::all().get(idx).copied())
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect) {
        let popup_area = centered_rect(30, 40, area);
        f.render_widget(Clear, popup_area);

        let palette = palette_for(self.current);

        let items: Vec<ListItem> = ThemeName::all()
            .iter()
            .map(|theme| {
                let marker = if *theme == self.current {
                    " (current)"
                } else {
                    ""
                };

                ListItem::new(Line::from(vec![
                    Span::styled(theme.label(), Style::default().fg(palette.base_06)),
                    Span::styled(marker, Style::default().fg(palette.base_03)),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .title(" Select Theme ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.base_0c))
                    .style(Style::default().bg(palette.base_00)),
            )
            .highlight_style(
                Style::default()
                    .bg(palette.base_02)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("» ");

        f.render_stateful_widget(list, popup_area, &mut self.state);
    }

    fn next(&mut self) {
        let last = ThemeName::all().len() - 1;
        let i = match self.state.selected() {
            Some(i) if i >= last => 0,
            Some(i) => i + 1,
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn previous(&mut self) {
        let i = match self.state.selected() {
            Some(0) | None => ThemeName::all().len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn handle_key(
        &mut self,
        key: crossterm::event::KeyEvent,
        key_seq: &mut KeySeq,
    ) -> Option<ThemeSelectorAction> {
        use crossterm::event::KeyCode;

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.handle_j();
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.handle_k();
                None
            }
            KeyCode::Char('g') if key_seq.handle_key('g') == "gg" => {
                self.handle_gg();
                None
            }
            KeyCode::Char('G') => {
                self.handle_upper_g();
                None
            }
            KeyCode::Esc | KeyCode::Char('q') => Some(ThemeSelectorAction::Close),
            KeyCode::Enter => match self.selected() {
                Some(theme) if theme != self.current => {
                    Some(ThemeSelectorAction::ThemeChanged(theme))
                }
                _ => Some(ThemeSelectorAction::Close),
            },
            _ => None,
        }
    }
}

impl VimNavMotions for ThemeSelector {
    fn handle_h(&mut self) {}

    fn handle_j(&mut self) {
        self.next();
    }

    fn handle_k(&mut self) {
        self.previous();
    }

    fn handle_l(&mut self) {}

    // Three entries: half-page motions are plain jumps to the ends.
    fn handle_ctrl_d(&mut self) {
        self.handle_upper_g();
    }

    fn handle_ctrl_u(&mut self) {
        self.handle_gg();
    }

    fn handle_gg(&mut self) {
        self.state.select(Some(0));
    }

    fn handle_upper_g(&mut self) {
        self.state.select(Some(ThemeName::all().len() - 1));
    }
}
