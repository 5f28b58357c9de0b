use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::{
    BookId, DisplayTarget, EngineError, EngineEvent, EventSink, LocationStart, RenderingEngine,
    RenditionId, RenditionOptions, SubscriptionId, Viewport,
};
use crate::stylesheet::StyleSheet;
use crate::toc::NavigationEntry;

/// Every engine call, in order, so tests can assert on call sequences.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    OpenBook(BookId),
    RenderTo(BookId, RenditionId),
    Navigation(BookId),
    GenerateLocations(BookId),
    RegisterTheme(RenditionId, String),
    SelectTheme(RenditionId, String),
    SetFontSize(RenditionId, u16),
    Display(RenditionId, DisplayTarget),
    Prev(RenditionId),
    Next(RenditionId),
    Subscribe(RenditionId),
    Unsubscribe(RenditionId),
    Resize(RenditionId, Viewport),
    DestroyRendition(RenditionId),
    DestroyBook(BookId),
}

/// Scriptable in-memory engine. Nothing happens on its own: tests emit
/// relocation and location events explicitly.
#[derive(Default)]
pub struct StubEngine {
    pub calls: Vec<EngineCall>,
    pub navigation: Vec<NavigationEntry>,
    pub fail_open: bool,
    pub fail_display: bool,
    pub fail_navigation: bool,
    pub not_ready: bool,
    /// Location count reported for books that already carry an index.
    pub preexisting_locations: usize,
    pub sheets: HashMap<RenditionId, StyleSheet>,
    /// Mirror of `calls` that outlives the engine, for teardown-on-drop checks.
    pub shared_log: Option<Rc<RefCell<Vec<EngineCall>>>>,
    registered: HashMap<(RenditionId, String), StyleSheet>,
    fractions: HashMap<String, f64>,
    location_counts: HashMap<BookId, usize>,
    live_books: Vec<BookId>,
    live_renditions: Vec<(RenditionId, BookId)>,
    sinks: HashMap<RenditionId, (SubscriptionId, EventSink)>,
    next_id: u64,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shared_log(log: Rc<RefCell<Vec<EngineCall>>>) -> Self {
        Self {
            shared_log: Some(log),
            ..Self::default()
        }
    }

    fn record(&mut self, call: EngineCall) {
        if let Some(log) = &self.shared_log {
            log.borrow_mut().push(call.clone());
        }
        self.calls.push(call);
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn live_books(&self) -> &[BookId] {
        &self.live_books
    }

    pub fn live_renditions(&self) -> Vec<RenditionId> {
        self.live_renditions.iter().map(|(r, _)| *r).collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn display_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, EngineCall::Display(..)))
            .count()
    }

    pub fn set_fraction(&mut self, cfi: &str, fraction: f64) {
        self.fractions.insert(cfi.to_string(), fraction);
    }

    /// Completes index generation for the most recently opened live book.
    pub fn finish_locations(&mut self, count: usize) {
        let Some(book) = self.live_books.last().copied() else {
            return;
        };
        self.location_counts.insert(book, count);
        self.send_event(EngineEvent::LocationsGenerated { book, count });
    }

    /// Finishes parsing of the most recently opened live book.
    pub fn finish_parsing(&mut self) {
        self.not_ready = false;
        let Some(book) = self.live_books.last().copied() else {
            return;
        };
        self.send_event(EngineEvent::BookReady { book });
    }

    /// Reports a relocation from the most recent live rendition.
    pub fn emit_relocated(&mut self, href: &str, cfi: &str) {
        let Some((rendition, _)) = self.live_renditions.last().copied() else {
            return;
        };
        self.send_event(EngineEvent::Relocated {
            rendition,
            start: LocationStart {
                href: href.to_string(),
                cfi: cfi.to_string(),
            },
        });
    }

    pub fn send_event(&self, event: EngineEvent) {
        for (_, sink) in self.sinks.values() {
            let _ = sink.send(event.clone());
        }
    }

    fn check_book(&self, book: BookId) -> Result<(), EngineError> {
        if self.live_books.contains(&book) {
            Ok(())
        } else {
            Err(EngineError::UnknownBook(book))
        }
    }

    fn check_rendition(&self, rendition: RenditionId) -> Result<(), EngineError> {
        if self.live_renditions.iter().any(|(r, _)| *r == rendition) {
            Ok(())
        } else {
            Err(EngineError::UnknownRendition(rendition))
        }
    }
}

impl RenderingEngine for StubEngine {
    fn open_book(&mut self, _bytes: Vec<u8>) -> Result<BookId, EngineError> {
        if self.fail_open {
            return Err(EngineError::InvalidBook("stub refuses to open".into()));
        }
        let book = BookId(self.next_id());
        self.record(EngineCall::OpenBook(book));
        self.live_books.push(book);
        if self.preexisting_locations > 0 {
            self.location_counts.insert(book, self.preexisting_locations);
        }
        Ok(book)
    }

    fn render_to(
        &mut self,
        book: BookId,
        _options: &RenditionOptions,
    ) -> Result<RenditionId, EngineError> {
        self.check_book(book)?;
        let rendition = RenditionId(self.next_id());
        self.record(EngineCall::RenderTo(book, rendition));
        self.live_renditions.push((rendition, book));
        Ok(rendition)
    }

    fn navigation(&mut self, book: BookId) -> Result<Vec<NavigationEntry>, EngineError> {
        self.check_book(book)?;
        self.record(EngineCall::Navigation(book));
        if self.fail_navigation {
            return Err(EngineError::Other("navigation unavailable".into()));
        }
        Ok(self.navigation.clone())
    }

    fn is_ready(&self, book: BookId) -> bool {
        !self.not_ready && self.live_books.contains(&book)
    }

    fn location_count(&self, book: BookId) -> usize {
        self.location_counts.get(&book).copied().unwrap_or(0)
    }

    fn generate_locations(&mut self, book: BookId) -> Result<(), EngineError> {
        self.check_book(book)?;
        self.record(EngineCall::GenerateLocations(book));
        Ok(())
    }

    fn percentage_from_cfi(&self, _book: BookId, cfi: &str) -> Option<f64> {
        self.fractions.get(cfi).copied()
    }

    fn cfi_from_percentage(&self, _book: BookId, fraction: f64) -> Option<String> {
        Some(format!("cfi@{fraction:.3}"))
    }

    fn register_theme(
        &mut self,
        rendition: RenditionId,
        name: &str,
        sheet: &StyleSheet,
    ) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::RegisterTheme(rendition, name.to_string()));
        self.registered
            .insert((rendition, name.to_string()), sheet.clone());
        Ok(())
    }

    fn select_theme(&mut self, rendition: RenditionId, name: &str) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::SelectTheme(rendition, name.to_string()));
        let sheet = self
            .registered
            .get(&(rendition, name.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::UnknownTheme(name.to_string()))?;
        self.sheets.insert(rendition, sheet);
        Ok(())
    }

    fn set_font_size(&mut self, rendition: RenditionId, percent: u16) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::SetFontSize(rendition, percent));
        Ok(())
    }

    fn display(
        &mut self,
        rendition: RenditionId,
        target: &DisplayTarget,
    ) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::Display(rendition, target.clone()));
        if self.fail_display {
            return Err(EngineError::TargetNotFound(format!("{target:?}")));
        }
        Ok(())
    }

    fn prev(&mut self, rendition: RenditionId) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::Prev(rendition));
        Ok(())
    }

    fn next(&mut self, rendition: RenditionId) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::Next(rendition));
        Ok(())
    }

    fn subscribe(
        &mut self,
        rendition: RenditionId,
        sink: EventSink,
    ) -> Result<SubscriptionId, EngineError> {
        self.check_rendition(rendition)?;
        let subscription = SubscriptionId(self.next_id());
        self.record(EngineCall::Subscribe(rendition));
        self.sinks.insert(rendition, (subscription, sink));
        Ok(subscription)
    }

    fn unsubscribe(
        &mut self,
        rendition: RenditionId,
        subscription: SubscriptionId,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Unsubscribe(rendition));
        match self.sinks.get(&rendition) {
            Some((id, _)) if *id == subscription => {
                self.sinks.remove(&rendition);
                Ok(())
            }
            _ => Err(EngineError::UnknownRendition(rendition)),
        }
    }

    fn resize(&mut self, rendition: RenditionId, viewport: Viewport) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::Resize(rendition, viewport));
        Ok(())
    }

    fn destroy_rendition(&mut self, rendition: RenditionId) -> Result<(), EngineError> {
        self.check_rendition(rendition)?;
        self.record(EngineCall::DestroyRendition(rendition));
        self.live_renditions.retain(|(r, _)| *r != rendition);
        self.sheets.remove(&rendition);
        Ok(())
    }

    fn destroy_book(&mut self, book: BookId) -> Result<(), EngineError> {
        self.check_book(book)?;
        self.record(EngineCall::DestroyBook(book));
        self.live_books.retain(|b| *b != book);
        Ok(())
    }
}
