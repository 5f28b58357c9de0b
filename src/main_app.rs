use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use ratatui::{
    Frame, Terminal,
    layout::{Constraint, Direction, Layout, Rect},
};

use crate::engine::Viewport;
use crate::inputs::{EventSource, KeySeq, map_keys_to_input, parse_dropped_paths};
use crate::native_engine::NativeEngine;
use crate::progress::round_percentage;
use crate::reader::{FileIntake, Reader};
use crate::session::{LoadError, SessionState};
use crate::settings;
use crate::theme::palette_for;
use crate::typography::{FONT_SIZE_STEP, FontChoice, LINE_SPACING_STEP};
use crate::widget::navigation_panel::NavigationPanel;
use crate::widget::page_view::{PageContent, render_page, text_viewport};
use crate::widget::status_bar::{StatusInfo, render_error_banner, render_status_bar};
use crate::widget::text_prompt::{PromptAction, PromptKind, TextPrompt};
use crate::widget::theme_selector::{ThemeSelector, ThemeSelectorAction};

/// Slider movement per `[` / `]` press, in percent.
const SLIDER_STEP: f64 = 1.0;
const STATUS_BAR_HEIGHT: u16 = 2;

pub trait VimNavMotions {
    fn handle_h(&mut self);
    fn handle_j(&mut self);
    fn handle_k(&mut self);
    fn handle_l(&mut self);
    fn handle_ctrl_d(&mut self);
    fn handle_ctrl_u(&mut self);
    fn handle_gg(&mut self);
    fn handle_upper_g(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum FocusedPanel {
    Main(MainPanel),
    Popup(PopupWindow),
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MainPanel {
    NavigationList,
    Content,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum PopupWindow {
    ThemeSelector,
    Prompt,
}

pub struct App {
    reader: Reader<NativeEngine>,
    navigation_panel: NavigationPanel,
    theme_selector: Option<ThemeSelector>,
    prompt: Option<TextPrompt>,
    /// Intake requests served one per loop iteration, oldest first.
    pending_intakes: VecDeque<FileIntake>,
    pub focused_panel: FocusedPanel,
    previous_main_panel: MainPanel,
    key_sequence: KeySeq,
    slider_drag: Option<f64>,
    persist_settings: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// App backed by the native engine, with appearance taken from the
    /// loaded settings and saved back on every change.
    pub fn new() -> Self {
        let reader = Reader::new(
            NativeEngine::new(),
            Viewport::default(),
            settings::get_appearance(),
        );
        let mut app = Self::with_reader(reader);
        app.persist_settings = true;
        app
    }

    /// App around an existing reader; nothing is written to disk.
    pub fn with_reader(reader: Reader<NativeEngine>) -> Self {
        Self {
            reader,
            navigation_panel: NavigationPanel::new(),
            theme_selector: None,
            prompt: None,
            pending_intakes: VecDeque::new(),
            focused_panel: FocusedPanel::Main(MainPanel::Content),
            previous_main_panel: MainPanel::Content,
            key_sequence: KeySeq::new(),
            slider_drag: None,
            persist_settings: false,
        }
    }

    pub fn reader(&self) -> &Reader<NativeEngine> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut Reader<NativeEngine> {
        &mut self.reader
    }

    pub fn slider_drag(&self) -> Option<f64> {
        self.slider_drag
    }

    fn is_main_panel(&self, panel: MainPanel) -> bool {
        match self.focused_panel {
            FocusedPanel::Main(p) => p == panel,
            FocusedPanel::Popup(_) => false,
        }
    }

    fn set_main_panel_focus(&mut self, panel: MainPanel) {
        self.previous_main_panel = panel;
        self.focused_panel = FocusedPanel::Main(panel);
    }

    fn close_popup_to_previous(&mut self) {
        self.theme_selector = None;
        self.prompt = None;
        self.focused_panel = FocusedPanel::Main(self.previous_main_panel);
    }

    // ------------------------------------------------------------------
    // File intake
    // ------------------------------------------------------------------

    pub fn queue_intake(&mut self, intake: FileIntake) {
        debug!("Queued file intake {intake:?}");
        self.pending_intakes.push_back(intake);
    }

    pub fn pending_intakes(&self) -> usize {
        self.pending_intakes.len()
    }

    /// Serves the oldest queued intake. Returns whether one was processed.
    pub fn process_next_intake(&mut self) -> bool {
        let Some(intake) = self.pending_intakes.pop_front() else {
            return false;
        };

        match self.reader.intake(intake) {
            Some(Ok(session)) => {
                info!(
                    "Opened {} as {}",
                    session.source_file_name, session.rendition
                );
                self.slider_drag = None;
                self.navigation_panel = NavigationPanel::new();
                self.set_main_panel_focus(MainPanel::Content);
            }
            Some(Err(LoadError::Read { path, .. })) => {
                debug!("Intake of {path:?} failed before reaching the engine");
            }
            Some(Err(_)) | None => {}
        }
        self.pump_engine_events();
        true
    }

    /// Treats pasted text as a file drop. The paste never reaches a widget.
    pub fn handle_paste(&mut self, text: &str) {
        let paths = parse_dropped_paths(text);
        if paths.is_empty() {
            debug!("Ignoring paste without paths");
            return;
        }
        self.queue_intake(FileIntake::Dropped(paths));
    }

    pub fn pump_engine_events(&mut self) -> usize {
        let applied = self.reader.pump_events();
        if applied > 0 && !self.is_main_panel(MainPanel::NavigationList) {
            let locator = self.reader.active_locator().to_string();
            self.navigation_panel
                .select_locator(&locator, self.reader.toc());
        }
        applied
    }

    // ------------------------------------------------------------------
    // Appearance
    // ------------------------------------------------------------------

    fn save_appearance(&self) {
        if self.persist_settings {
            settings::set_appearance(self.reader.appearance());
        }
    }

    fn change_font_size(&mut self, delta: i32) {
        let current = i32::from(self.reader.appearance().typography.font_size_percent);
        let target = (current + delta).clamp(0, i32::from(u16::MAX)) as u16;
        self.reader.set_font_size_percent(target);
        self.save_appearance();
    }

    fn change_line_spacing(&mut self, delta: i32) {
        let current = i32::from(self.reader.appearance().typography.line_spacing_percent);
        let target = (current + delta).clamp(0, i32::from(u16::MAX)) as u16;
        self.reader.set_line_spacing_percent(target);
        self.save_appearance();
    }

    fn cycle_font(&mut self) {
        let next = self.reader.appearance().typography.font_choice.next();
        self.reader.set_font_choice(next);
        self.save_appearance();
    }

    fn apply_custom_font(&mut self, text: String) {
        if text.is_empty() {
            self.reader.set_custom_font(None);
        } else {
            self.reader.set_custom_font(Some(text));
            self.reader.set_font_choice(FontChoice::Custom);
        }
        self.save_appearance();
    }

    // ------------------------------------------------------------------
    // Progress slider
    // ------------------------------------------------------------------

    fn drag_slider(&mut self, delta: f64) {
        if !self.reader.controls().progress {
            debug!("Ignoring slider drag: progress unavailable");
            return;
        }
        let base = self
            .slider_drag
            .or_else(|| self.reader.progress())
            .unwrap_or(0.0);
        self.slider_drag = Some(round_percentage(base + delta));
    }

    fn commit_slider(&mut self) {
        if let Some(target) = self.slider_drag.take() {
            self.reader.commit_progress(target);
        }
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        match self.focused_panel {
            FocusedPanel::Popup(PopupWindow::Prompt) => {
                self.handle_prompt_key(key);
                return None;
            }
            FocusedPanel::Popup(PopupWindow::ThemeSelector) => {
                self.handle_theme_selector_key(key);
                return None;
            }
            FocusedPanel::Main(_) => {}
        }

        if self.slider_drag.is_some() {
            match key.code {
                KeyCode::Enter => {
                    self.commit_slider();
                    return None;
                }
                KeyCode::Esc => {
                    self.slider_drag = None;
                    return None;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Some(AppAction::Quit);
            }
            KeyCode::Char('o') => self.open_prompt(PromptKind::OpenFile, ""),
            KeyCode::Char('F') => {
                let current = self
                    .reader
                    .appearance()
                    .typography
                    .custom_font_stack
                    .clone()
                    .unwrap_or_default();
                self.open_prompt(PromptKind::CustomFont, &current);
            }
            KeyCode::Char('t') => {
                self.theme_selector = Some(ThemeSelector::new(self.reader.appearance().theme));
                self.focused_panel = FocusedPanel::Popup(PopupWindow::ThemeSelector);
            }
            KeyCode::Char('f') => self.cycle_font(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.change_font_size(i32::from(FONT_SIZE_STEP))
            }
            KeyCode::Char('-') => self.change_font_size(-i32::from(FONT_SIZE_STEP)),
            KeyCode::Char('>') => self.change_line_spacing(i32::from(LINE_SPACING_STEP)),
            KeyCode::Char('<') => self.change_line_spacing(-i32::from(LINE_SPACING_STEP)),
            KeyCode::Char('[') => self.drag_slider(-SLIDER_STEP),
            KeyCode::Char(']') => self.drag_slider(SLIDER_STEP),
            KeyCode::Tab => {
                let next = if self.is_main_panel(MainPanel::Content) {
                    MainPanel::NavigationList
                } else {
                    MainPanel::Content
                };
                self.set_main_panel_focus(next);
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp => self.reader.prev_page(),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::PageDown | KeyCode::Char(' ') => {
                self.reader.next_page()
            }
            _ if self.is_main_panel(MainPanel::NavigationList) => self.handle_navigation_key(key),
            KeyCode::Char('j') | KeyCode::Down => self.reader.next_page(),
            KeyCode::Char('k') | KeyCode::Up => self.reader.prev_page(),
            _ => {}
        }
        None
    }

    fn handle_navigation_key(&mut self, key: KeyEvent) {
        self.navigation_panel.sync(self.reader.toc());
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.navigation_panel.handle_j(),
            KeyCode::Char('k') | KeyCode::Up => self.navigation_panel.handle_k(),
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.navigation_panel.handle_ctrl_d()
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.navigation_panel.handle_ctrl_u()
            }
            KeyCode::Char('g') if self.key_sequence.handle_key('g') == "gg" => {
                self.navigation_panel.handle_gg()
            }
            KeyCode::Char('G') => self.navigation_panel.handle_upper_g(),
            KeyCode::Enter => {
                if let Some(index) = self.navigation_panel.selected() {
                    self.reader.activate_toc_entry(index);
                }
            }
            _ => {}
        }
    }

    fn open_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.prompt = Some(TextPrompt::new(kind, initial));
        self.focused_panel = FocusedPanel::Popup(PopupWindow::Prompt);
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) {
        let Some(input) = map_keys_to_input(key) else {
            return;
        };
        let Some(action) = self.prompt.as_mut().and_then(|p| p.handle_input(input)) else {
            return;
        };

        self.close_popup_to_previous();
        match action {
            PromptAction::Submit(PromptKind::OpenFile, path) if !path.is_empty() => {
                self.queue_intake(FileIntake::Picked(PathBuf::from(path)));
            }
            PromptAction::Submit(PromptKind::CustomFont, text) => self.apply_custom_font(text),
            _ => {}
        }
    }

    fn handle_theme_selector_key(&mut self, key: KeyEvent) {
        let Some(selector) = self.theme_selector.as_mut() else {
            self.close_popup_to_previous();
            return;
        };
        match selector.handle_key(key, &mut self.key_sequence) {
            Some(ThemeSelectorAction::ThemeChanged(theme)) => {
                self.close_popup_to_previous();
                self.reader.set_theme(theme);
                self.save_appearance();
            }
            Some(ThemeSelectorAction::Close) => self.close_popup_to_previous(),
            None => {}
        }
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    pub fn status_info(&self) -> StatusInfo {
        let appearance = self.reader.appearance();
        StatusInfo {
            file_name: self.reader.file_name().map(str::to_string),
            chapter_title: self.reader.chapter_title().to_string(),
            has_book: self.reader.session().is_some(),
            progress: self.reader.progress(),
            drag: self.slider_drag,
            theme: appearance.theme.label().to_string(),
            font: appearance.typography.font_choice.label().to_string(),
            font_size_percent: appearance.typography.font_size_percent,
            line_height_label: appearance.typography.line_height_label(),
        }
    }

    fn layout(&self, area: Rect) -> (Rect, Rect, Option<Rect>, Rect) {
        let banner = u16::from(self.reader.error().is_some());
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(banner),
                Constraint::Length(STATUS_BAR_HEIGHT),
            ])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(rows[0]);
        let banner_area = (banner > 0).then_some(rows[1]);
        (columns[0], columns[1], banner_area, rows[2])
    }

    /// Keeps the rendition viewport in step with the content panel.
    pub fn handle_resize(&mut self, area: Rect) {
        let (_, content, _, _) = self.layout(area);
        let (width, height) = text_viewport(content);
        self.reader
            .resize(Viewport::new(width.max(1), height.max(1)));
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let area = f.area();
        self.handle_resize(area);
        let (nav_area, content_area, banner_area, status_area) = self.layout(area);
        let palette = palette_for(self.reader.appearance().theme);
        let nav_focused = self.is_main_panel(MainPanel::NavigationList);
        let content_focused = self.is_main_panel(MainPanel::Content);

        self.navigation_panel.render(
            f,
            nav_area,
            self.reader.toc(),
            self.reader.active_locator(),
            nav_focused,
            palette,
        );

        let content = match self.reader.state() {
            SessionState::Ready(ready) => self
                .reader
                .engine()
                .visible_page(ready.session.rendition)
                .map(PageContent::Page)
                .unwrap_or(PageContent::Empty),
            SessionState::Loading { file_name } => PageContent::Loading(file_name),
            SessionState::Empty | SessionState::Failed { .. } => PageContent::Empty,
        };
        render_page(f, content_area, content, content_focused, palette);

        if let (Some(banner), Some(message)) = (banner_area, self.reader.error()) {
            render_error_banner(f, banner, message, palette);
        }
        render_status_bar(f, status_area, &self.status_info(), palette);

        if let Some(selector) = self.theme_selector.as_mut() {
            selector.render(f, area);
        }
        if let Some(prompt) = self.prompt.as_mut() {
            prompt.render(f, area, palette);
        }
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut first_render = true;
    loop {
        let mut events_processed = 0;
        let mut should_quit = false;
        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Paste(text) => app.handle_paste(&text),
                Event::Resize(cols, rows) => app.handle_resize(Rect::new(0, 0, cols, rows)),
                _ => {}
            }

            if should_quit {
                break;
            }
        }

        let intake_processed = !should_quit && app.process_next_intake();
        let events_applied = app.pump_engine_events();

        let needs_redraw =
            first_render || events_processed > 0 || intake_processed || events_applied > 0;
        first_render = false;

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }

        if should_quit {
            return Ok(());
        }

        if events_processed == 0 && app.pending_intakes() == 0 {
            let _ = event_source.poll(tick_rate);
        }
    }
}
