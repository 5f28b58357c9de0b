//! Capability interface of the rendering engine.
//!
//! The reader core never parses, lays out or draws book content itself. It
//! drives an engine through [`RenderingEngine`] and learns about position
//! changes from [`EngineEvent`]s the engine pushes into a subscribed sink.

use std::fmt;
use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::stylesheet::StyleSheet;
use crate::toc::NavigationEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenditionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "book#{}", self.0)
    }
}

impl fmt::Display for RenditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rendition#{}", self.0)
    }
}

/// Host area the rendition is attached to, in engine units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Paginated,
    Scrolled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    None,
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionOptions {
    pub viewport: Viewport,
    pub flow: Flow,
    pub spread: Spread,
}

impl RenditionOptions {
    /// Paginated, single column.
    pub fn paginated(viewport: Viewport) -> Self {
        Self {
            viewport,
            flow: Flow::Paginated,
            spread: Spread::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    Start,
    Href(String),
    Cfi(String),
}

/// Start of the visible range after a relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationStart {
    pub href: String,
    pub cfi: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Relocated {
        rendition: RenditionId,
        start: LocationStart,
    },
    LocationsGenerated {
        book: BookId,
        count: usize,
    },
    /// The book finished parsing after `is_ready` first reported false.
    BookReady {
        book: BookId,
    },
}

pub type EventSink = Sender<EngineEvent>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid book: {0}")]
    InvalidBook(String),
    #[error("unknown book handle {0}")]
    UnknownBook(BookId),
    #[error("unknown rendition handle {0}")]
    UnknownRendition(RenditionId),
    #[error("no content for target {0}")]
    TargetNotFound(String),
    #[error("theme '{0}' is not registered")]
    UnknownTheme(String),
    #[error("engine failure: {0}")]
    Other(String),
}

pub trait RenderingEngine {
    fn open_book(&mut self, bytes: Vec<u8>) -> Result<BookId, EngineError>;

    fn render_to(
        &mut self,
        book: BookId,
        options: &RenditionOptions,
    ) -> Result<RenditionId, EngineError>;

    /// Hierarchical chapter tree of the book.
    fn navigation(&mut self, book: BookId) -> Result<Vec<NavigationEntry>, EngineError>;

    /// Whether the book has been fully parsed. An engine that answers
    /// false here emits [`EngineEvent::BookReady`] once parsing completes.
    fn is_ready(&self, book: BookId) -> bool;

    /// Size of the location index; zero until one has been generated.
    fn location_count(&self, book: BookId) -> usize;

    /// Starts building the location index. Completion is reported with
    /// [`EngineEvent::LocationsGenerated`].
    fn generate_locations(&mut self, book: BookId) -> Result<(), EngineError>;

    /// Completion fraction in `[0, 1]` of a CFI, if the index can place it.
    fn percentage_from_cfi(&self, book: BookId, cfi: &str) -> Option<f64>;

    fn cfi_from_percentage(&self, book: BookId, fraction: f64) -> Option<String>;

    fn register_theme(
        &mut self,
        rendition: RenditionId,
        name: &str,
        sheet: &StyleSheet,
    ) -> Result<(), EngineError>;

    fn select_theme(&mut self, rendition: RenditionId, name: &str) -> Result<(), EngineError>;

    fn set_font_size(&mut self, rendition: RenditionId, percent: u16) -> Result<(), EngineError>;

    fn display(&mut self, rendition: RenditionId, target: &DisplayTarget)
    -> Result<(), EngineError>;

    fn prev(&mut self, rendition: RenditionId) -> Result<(), EngineError>;

    fn next(&mut self, rendition: RenditionId) -> Result<(), EngineError>;

    fn subscribe(
        &mut self,
        rendition: RenditionId,
        sink: EventSink,
    ) -> Result<SubscriptionId, EngineError>;

    fn unsubscribe(
        &mut self,
        rendition: RenditionId,
        subscription: SubscriptionId,
    ) -> Result<(), EngineError>;

    fn resize(&mut self, _rendition: RenditionId, _viewport: Viewport) -> Result<(), EngineError> {
        Ok(())
    }

    fn destroy_rendition(&mut self, rendition: RenditionId) -> Result<(), EngineError>;

    fn destroy_book(&mut self, book: BookId) -> Result<(), EngineError>;
}
