use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::engine::{EngineEvent, RenderingEngine, Viewport};
use crate::progress;
use crate::session::{self, BookSource, LoadError, ReadySession, Session, SessionManager, SessionState};
use crate::stylesheet::{Appearance, READER_THEME_NAME, ThemeName};
use crate::toc::FlattenedTocEntry;
use crate::typography::FontChoice;

/// Which controls currently accept input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub open_file: bool,
    pub page_turn: bool,
    pub toc: bool,
    pub progress: bool,
    pub appearance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileIntake {
    Picked(PathBuf),
    /// Files dropped onto the reader; only the first one is opened.
    Dropped(Vec<PathBuf>),
}

impl FileIntake {
    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            FileIntake::Picked(path) => Some(path),
            FileIntake::Dropped(paths) => paths.into_iter().next(),
        }
    }
}

pub fn is_epub_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"))
}

/// Guarded operation surface over one reading session and the appearance
/// settings, shared by every host.
pub struct Reader<E: RenderingEngine> {
    sessions: SessionManager<E>,
    appearance: Appearance,
}

impl<E: RenderingEngine> Reader<E> {
    pub fn new(engine: E, viewport: Viewport, appearance: Appearance) -> Self {
        Self {
            sessions: SessionManager::new(engine, viewport),
            appearance,
        }
    }

    pub fn engine(&self) -> &E {
        self.sessions.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.sessions.engine_mut()
    }

    pub fn state(&self) -> &SessionState {
        self.sessions.state()
    }

    pub fn session(&self) -> Option<&ReadySession> {
        self.sessions.ready()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn controls(&self) -> Controls {
        let ready = self.session();
        Controls {
            open_file: true,
            page_turn: ready.is_some(),
            toc: ready.is_some(),
            progress: ready.is_some_and(|r| r.locations_ready),
            appearance: true,
        }
    }

    pub fn toc(&self) -> &[FlattenedTocEntry] {
        self.session().map(|r| r.toc.as_slice()).unwrap_or(&[])
    }

    pub fn active_locator(&self) -> &str {
        self.session().map(|r| r.active_locator.as_str()).unwrap_or("")
    }

    pub fn chapter_title(&self) -> &str {
        self.session().map(|r| r.chapter_title.as_str()).unwrap_or("")
    }

    /// Progress percentage, or `None` while the slider must stay disabled.
    pub fn progress(&self) -> Option<f64> {
        self.session()
            .filter(|r| r.locations_ready)
            .map(|r| r.position.progress_percentage)
    }

    pub fn error(&self) -> Option<&str> {
        match self.state() {
            SessionState::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self.state() {
            SessionState::Loading { file_name } => Some(file_name),
            SessionState::Ready(ready) => Some(&ready.session.source_file_name),
            _ => None,
        }
    }

    pub fn load(&mut self, source: BookSource, file_name: &str) -> Result<Session, LoadError> {
        self.sessions.load_book(source, file_name, &self.appearance)
    }

    /// Opens a picked or dropped file. Returns `None` when the intake held
    /// nothing loadable.
    pub fn intake(&mut self, intake: FileIntake) -> Option<Result<Session, LoadError>> {
        let path = intake.into_path()?;
        if !is_epub_path(&path) {
            warn!("Ignoring non-EPUB file {path:?}");
            return None;
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Some(self.load(BookSource::Path(path), &file_name))
    }

    pub fn next_page(&mut self) {
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            debug!("Ignoring next page: no book loaded");
            return;
        };
        if let Err(e) = engine.next(ready.session.rendition) {
            warn!("Next page failed: {e}");
        }
    }

    pub fn prev_page(&mut self) {
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            debug!("Ignoring previous page: no book loaded");
            return;
        };
        if let Err(e) = engine.prev(ready.session.rendition) {
            warn!("Previous page failed: {e}");
        }
    }

    pub fn activate_toc_entry(&mut self, index: usize) {
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            debug!("Ignoring TOC activation: no book loaded");
            return;
        };
        progress::activate_toc_entry(engine, ready, index);
    }

    pub fn commit_progress(&mut self, percentage: f64) {
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            debug!("Ignoring progress commit: no book loaded");
            return;
        };
        progress::commit_percentage(engine, ready, percentage);
    }

    pub fn set_theme(&mut self, theme: ThemeName) {
        self.appearance.theme = theme;
        self.apply_style_sheet();
    }

    pub fn set_font_choice(&mut self, choice: FontChoice) {
        self.appearance.typography.font_choice = choice;
        self.apply_style_sheet();
    }

    pub fn set_custom_font(&mut self, text: Option<String>) {
        self.appearance.typography.custom_font_stack = text;
        self.apply_style_sheet();
    }

    pub fn set_line_spacing_percent(&mut self, percent: u16) {
        self.appearance.typography.set_line_spacing_percent(percent);
        self.apply_style_sheet();
    }

    pub fn set_font_size_percent(&mut self, percent: u16) {
        self.appearance.typography.set_font_size_percent(percent);
        let size = self.appearance.typography.font_size_percent;
        if let Some((engine, ready)) = self.sessions.ready_parts() {
            if let Err(e) = engine.set_font_size(ready.session.rendition, size) {
                warn!("Failed to apply font size {size}%: {e}");
            }
        }
    }

    fn apply_style_sheet(&mut self) {
        let sheet = self.appearance.style_sheet();
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            return;
        };
        let rendition = ready.session.rendition;
        let applied = engine
            .register_theme(rendition, READER_THEME_NAME, &sheet)
            .and_then(|_| engine.select_theme(rendition, READER_THEME_NAME));
        if let Err(e) = applied {
            warn!("Failed to apply style sheet to {rendition}: {e}");
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.sessions.set_viewport(viewport);
    }

    /// Applies queued engine events; returns how many were accepted.
    pub fn pump_events(&mut self) -> usize {
        let events = self.sessions.take_events();
        let mut applied = 0;
        for event in events {
            if self.apply_event(event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_event(&mut self, event: EngineEvent) -> bool {
        let Some((engine, ready)) = self.sessions.ready_parts() else {
            debug!("Dropping engine event with no live session: {event:?}");
            return false;
        };

        match event {
            EngineEvent::Relocated { rendition, start } => {
                if rendition != ready.session.rendition {
                    debug!("Dropping relocation from stale {rendition}");
                    return false;
                }
                progress::apply_relocation(&*engine, ready, &start);
                true
            }
            EngineEvent::LocationsGenerated { book, count } => {
                if book != ready.session.book {
                    debug!("Dropping location index of stale {book}");
                    return false;
                }
                info!("Location index ready for {book}: {count} locations");
                progress::apply_locations_ready(&*engine, ready);
                true
            }
            EngineEvent::BookReady { book } => {
                if book != ready.session.book {
                    debug!("Dropping readiness of stale {book}");
                    return false;
                }
                if ready.locations_ready {
                    return false;
                }
                session::request_locations(engine, ready);
                if ready.locations_ready {
                    progress::apply_locations_ready(&*engine, ready);
                }
                true
            }
        }
    }

    /// Releases the live session; the reader can load again afterwards.
    pub fn close(&mut self) {
        self.sessions.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::stub_engine::{EngineCall, StubEngine};
    use crate::toc::NavigationEntry;

    fn stub_with_toc() -> StubEngine {
        let mut engine = StubEngine::new();
        engine.navigation = vec![
            NavigationEntry::new("1", "Intro", "a.xhtml"),
            NavigationEntry::new("2", "Ch1", "b.xhtml#x"),
        ];
        engine
    }

    fn loaded_reader() -> Reader<StubEngine> {
        let mut reader = Reader::new(stub_with_toc(), Viewport::default(), Appearance::default());
        reader
            .load(BookSource::Bytes(b"book".to_vec()), "book.epub")
            .unwrap();
        reader
    }

    #[test]
    fn test_guards_with_no_book() {
        let mut reader = Reader::new(StubEngine::new(), Viewport::default(), Appearance::default());
        let controls = reader.controls();
        assert!(controls.open_file);
        assert!(controls.appearance);
        assert!(!controls.page_turn);
        assert!(!controls.toc);
        assert!(!controls.progress);

        reader.next_page();
        reader.prev_page();
        reader.activate_toc_entry(0);
        reader.commit_progress(50.0);
        assert!(reader.engine().calls.is_empty());
    }

    #[test]
    fn test_progress_disabled_until_locations_generated() {
        let mut reader = loaded_reader();
        assert!(reader.controls().page_turn);
        assert!(!reader.controls().progress);
        assert_eq!(reader.progress(), None);

        let calls_before = reader.engine().calls.len();
        reader.commit_progress(40.0);
        assert_eq!(reader.engine().calls.len(), calls_before);

        reader.engine_mut().finish_locations(100);
        assert_eq!(reader.pump_events(), 1);
        assert!(reader.controls().progress);
        assert_eq!(reader.progress(), Some(0.0));
    }

    #[test]
    fn test_relocation_updates_title_locator_and_progress() {
        let mut reader = loaded_reader();
        reader.engine_mut().finish_locations(10);
        reader.engine_mut().set_fraction("cfi-b", 0.4567);
        reader.engine_mut().emit_relocated("b.xhtml#y", "cfi-b");
        reader.pump_events();

        assert_eq!(reader.chapter_title(), "Ch1");
        assert_eq!(reader.active_locator(), "b.xhtml");
        assert_eq!(reader.progress(), Some(45.7));
    }

    #[test]
    fn test_unplaceable_cfi_reports_zero() {
        let mut reader = loaded_reader();
        reader.engine_mut().finish_locations(10);
        reader.engine_mut().emit_relocated("a.xhtml", "cfi-unknown");
        reader.pump_events();
        assert_eq!(reader.progress(), Some(0.0));
        assert_eq!(reader.chapter_title(), "Intro");
    }

    #[test]
    fn test_toc_activation_highlights_before_relocation() {
        let mut reader = loaded_reader();
        reader.activate_toc_entry(1);

        assert_eq!(reader.active_locator(), "b.xhtml");
        assert_eq!(reader.chapter_title(), "");
        assert_eq!(
            reader.engine().calls.last(),
            Some(&EngineCall::Display(
                reader.session().unwrap().session.rendition,
                crate::engine::DisplayTarget::Href("b.xhtml#x".into())
            ))
        );
    }

    #[test]
    fn test_slider_commit_goes_through_location_index() {
        let mut reader = loaded_reader();
        reader.engine_mut().finish_locations(10);
        reader.pump_events();

        reader.commit_progress(25.0);
        let rendition = reader.session().unwrap().session.rendition;
        assert_eq!(
            reader.engine().calls.last(),
            Some(&EngineCall::Display(
                rendition,
                crate::engine::DisplayTarget::Cfi("cfi@0.250".into())
            ))
        );
        assert_eq!(reader.progress(), Some(25.0));

        // The relocation that follows is authoritative.
        reader.engine_mut().set_fraction("cfi@0.250", 0.2481);
        reader.engine_mut().emit_relocated("a.xhtml", "cfi@0.250");
        reader.pump_events();
        assert_eq!(reader.progress(), Some(24.8));
    }

    #[test]
    fn test_appearance_changes_reach_live_session() {
        let mut reader = loaded_reader();
        reader.engine_mut().calls.clear();

        reader.set_theme(ThemeName::Dark);
        reader.set_line_spacing_percent(180);
        reader.set_font_size_percent(130);

        let rendition = reader.session().unwrap().session.rendition;
        let calls = &reader.engine().calls;
        assert_eq!(
            calls.iter().filter(|c| matches!(c, EngineCall::RegisterTheme(..))).count(),
            2
        );
        assert!(calls.contains(&EngineCall::SetFontSize(rendition, 130)));

        let sheet = reader.engine().sheets.get(&rendition).unwrap();
        assert_eq!(sheet.value("body", "background"), Some("#1e1e1e"));
        assert_eq!(sheet.value("p", "line-height"), Some("1.80"));
    }

    #[test]
    fn test_appearance_changes_without_session_only_update_state() {
        let mut reader = Reader::new(StubEngine::new(), Viewport::default(), Appearance::default());
        reader.set_theme(ThemeName::Sepia);
        reader.set_font_choice(FontChoice::Custom);
        reader.set_custom_font(Some("Literata".into()));
        reader.set_font_size_percent(999);

        assert!(reader.engine().calls.is_empty());
        assert_eq!(reader.appearance().theme, ThemeName::Sepia);
        assert_eq!(reader.appearance().typography.font_size_percent, 150);
        assert_eq!(reader.appearance().typography.font_stack(), "Literata");
    }

    #[test]
    fn test_intake_takes_first_dropped_file_only() {
        let intake = FileIntake::Dropped(vec![PathBuf::from("one.epub"), PathBuf::from("two.epub")]);
        assert_eq!(intake.into_path(), Some(PathBuf::from("one.epub")));
        assert_eq!(FileIntake::Dropped(Vec::new()).into_path(), None);
    }

    #[test]
    fn test_intake_rejects_non_epub() {
        let mut reader = Reader::new(StubEngine::new(), Viewport::default(), Appearance::default());
        let result = reader.intake(FileIntake::Dropped(vec![PathBuf::from("notes.pdf")]));
        assert!(result.is_none());
        assert!(matches!(reader.state(), SessionState::Empty));
        assert!(reader.engine().calls.is_empty());
    }

    #[test]
    fn test_is_epub_path() {
        assert!(is_epub_path(Path::new("a/b/Book.EPUB")));
        assert!(is_epub_path(Path::new("book.epub")));
        assert!(!is_epub_path(Path::new("book.epub.zip")));
        assert!(!is_epub_path(Path::new("epub")));
    }

    #[test]
    fn test_events_after_close_are_dropped() {
        let mut reader = loaded_reader();
        reader.engine_mut().emit_relocated("a.xhtml", "cfi-a");
        reader.close();
        assert_eq!(reader.pump_events(), 0);
        assert!(matches!(reader.state(), SessionState::Empty));
    }

    #[test]
    fn test_stale_relocation_is_ignored() {
        let mut reader = loaded_reader();
        let first = reader.session().unwrap().session.rendition;
        // Queued by the first session but only pumped after the second load.
        reader.engine_mut().emit_relocated("a.xhtml", "cfi-a");
        reader
            .load(BookSource::Bytes(b"second".to_vec()), "second.epub")
            .unwrap();

        assert_ne!(reader.session().unwrap().session.rendition, first);
        assert_eq!(reader.pump_events(), 0);
        assert_eq!(reader.active_locator(), "");
        assert_eq!(reader.file_name(), Some("second.epub"));
    }

    #[test]
    fn test_stale_location_index_is_ignored() {
        let mut reader = loaded_reader();
        let first = reader.session().unwrap().session.book;
        reader.engine_mut().finish_locations(100);
        reader
            .load(BookSource::Bytes(b"second".to_vec()), "second.epub")
            .unwrap();

        assert_ne!(reader.session().unwrap().session.book, first);
        assert_eq!(reader.pump_events(), 0);
        assert!(!reader.controls().progress);
        assert_eq!(reader.progress(), None);
    }
}
