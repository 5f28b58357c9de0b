use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::engine::{
    BookId, DisplayTarget, EngineError, EngineEvent, LocationStart, RenderingEngine,
    RenditionId, RenditionOptions, SubscriptionId, Viewport,
};
use crate::progress::ReadingPosition;
use crate::stylesheet::{Appearance, READER_THEME_NAME};
use crate::toc::{FlattenedTocEntry, flatten};

/// The only message a user sees when a book cannot be opened.
pub const LOAD_FAILURE_MESSAGE: &str =
    "Unable to open this book. The file may be damaged or is not a valid EPUB.";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub enum BookSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl BookSource {
    fn read(self) -> Result<Vec<u8>, LoadError> {
        match self {
            BookSource::Bytes(bytes) => Ok(bytes),
            BookSource::Path(path) => fs::read(&path).map_err(|source| LoadError::Read { path, source }),
        }
    }
}

/// Handles of one loaded book and its rendition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub book: BookId,
    pub rendition: RenditionId,
    pub subscription: SubscriptionId,
    pub source_file_name: String,
}

/// A live session plus everything derived from it.
#[derive(Debug, Clone)]
pub struct ReadySession {
    pub session: Session,
    pub toc: Vec<FlattenedTocEntry>,
    pub position: ReadingPosition,
    pub active_locator: String,
    pub chapter_title: String,
    pub locations_ready: bool,
    pub last_start: Option<LocationStart>,
}

impl ReadySession {
    fn new(session: Session, toc: Vec<FlattenedTocEntry>) -> Self {
        Self {
            session,
            toc,
            position: ReadingPosition::default(),
            active_locator: String::new(),
            chapter_title: String::new(),
            locations_ready: false,
            last_start: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionState {
    Empty,
    Loading { file_name: String },
    Ready(Box<ReadySession>),
    Failed { message: String },
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading { .. })
    }

    pub fn ready(&self) -> Option<&ReadySession> {
        match self {
            SessionState::Ready(ready) => Some(ready),
            _ => None,
        }
    }
}

// Handles created so far during a load, released in reverse on failure.
#[derive(Default)]
struct PartialSession {
    book: Option<BookId>,
    rendition: Option<RenditionId>,
    subscription: Option<SubscriptionId>,
}

pub struct SessionManager<E: RenderingEngine> {
    engine: E,
    state: SessionState,
    viewport: Viewport,
    events_tx: Sender<EngineEvent>,
    events_rx: Receiver<EngineEvent>,
}

impl<E: RenderingEngine> SessionManager<E> {
    pub fn new(engine: E, viewport: Viewport) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            engine,
            state: SessionState::Empty,
            viewport,
            events_tx,
            events_rx,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn ready(&self) -> Option<&ReadySession> {
        self.state.ready()
    }

    /// Engine and live session, borrowed together.
    pub fn ready_parts(&mut self) -> Option<(&mut E, &mut ReadySession)> {
        match &mut self.state {
            SessionState::Ready(ready) => Some((&mut self.engine, ready.as_mut())),
            _ => None,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn load_book(
        &mut self,
        source: BookSource,
        file_name: &str,
        appearance: &Appearance,
    ) -> Result<Session, LoadError> {
        info!("Loading book {file_name}");

        let previous = std::mem::replace(
            &mut self.state,
            SessionState::Loading {
                file_name: file_name.to_string(),
            },
        );
        if let SessionState::Ready(ready) = previous {
            teardown(&mut self.engine, &ready.session);
        }

        let mut partial = PartialSession::default();
        match self.build(source, file_name, appearance, &mut partial) {
            Ok(ready) => {
                let session = ready.session.clone();
                info!(
                    "Opened {} as {} ({} TOC entries)",
                    file_name,
                    session.rendition,
                    ready.toc.len()
                );
                self.state = SessionState::Ready(Box::new(ready));
                Ok(session)
            }
            Err(e) => {
                error!("Failed to load {file_name}: {e}");
                self.rollback(partial);
                self.state = SessionState::Failed {
                    message: LOAD_FAILURE_MESSAGE.to_string(),
                };
                Err(e)
            }
        }
    }

    fn build(
        &mut self,
        source: BookSource,
        file_name: &str,
        appearance: &Appearance,
        partial: &mut PartialSession,
    ) -> Result<ReadySession, LoadError> {
        let bytes = source.read()?;
        debug!("Read {} bytes from {file_name}", bytes.len());

        let book = self.engine.open_book(bytes)?;
        partial.book = Some(book);

        let rendition = self
            .engine
            .render_to(book, &RenditionOptions::paginated(self.viewport))?;
        partial.rendition = Some(rendition);

        let subscription = self.engine.subscribe(rendition, self.events_tx.clone())?;
        partial.subscription = Some(subscription);

        // Sized and themed before the first display.
        self.engine
            .set_font_size(rendition, appearance.typography.font_size_percent)?;
        let sheet = appearance.style_sheet();
        self.engine
            .register_theme(rendition, READER_THEME_NAME, &sheet)?;
        self.engine.select_theme(rendition, READER_THEME_NAME)?;

        self.engine.display(rendition, &DisplayTarget::Start)?;

        let navigation = self.engine.navigation(book)?;
        let toc = flatten(&navigation);

        let session = Session {
            book,
            rendition,
            subscription,
            source_file_name: file_name.to_string(),
        };
        let mut ready = ReadySession::new(session, toc);

        if self.engine.is_ready(book) {
            request_locations(&mut self.engine, &mut ready);
        } else {
            debug!("{book} is still parsing; location index deferred until it is ready");
        }

        Ok(ready)
    }

    fn rollback(&mut self, partial: PartialSession) {
        if let (Some(rendition), Some(subscription)) = (partial.rendition, partial.subscription) {
            if let Err(e) = self.engine.unsubscribe(rendition, subscription) {
                warn!("Rollback: failed to unsubscribe from {rendition}: {e}");
            }
        }
        if let Some(rendition) = partial.rendition {
            if let Err(e) = self.engine.destroy_rendition(rendition) {
                warn!("Rollback: failed to destroy {rendition}: {e}");
            }
        }
        if let Some(book) = partial.book {
            if let Err(e) = self.engine.destroy_book(book) {
                warn!("Rollback: failed to destroy {book}: {e}");
            }
        }
    }

    /// Releases the live session, if any, and returns to the empty state.
    pub fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Empty);
        if let SessionState::Ready(ready) = previous {
            teardown(&mut self.engine, &ready.session);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport == viewport {
            return;
        }
        self.viewport = viewport;
        if let Some((engine, ready)) = self.ready_parts() {
            if let Err(e) = engine.resize(ready.session.rendition, viewport) {
                warn!("Failed to resize {}: {e}", ready.session.rendition);
            }
        }
    }

    /// Events queued by the engine since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.events_rx.try_iter().collect()
    }
}

impl<E: RenderingEngine> Drop for SessionManager<E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Uses an existing location index or asks the engine to build one.
pub(crate) fn request_locations<E: RenderingEngine>(engine: &mut E, ready: &mut ReadySession) {
    let book = ready.session.book;
    if engine.location_count(book) > 0 {
        ready.locations_ready = true;
    } else if let Err(e) = engine.generate_locations(book) {
        warn!("Could not start location index generation for {book}: {e}");
    }
}

fn teardown<E: RenderingEngine>(engine: &mut E, session: &Session) {
    if let Err(e) = engine.unsubscribe(session.rendition, session.subscription) {
        warn!("Failed to unsubscribe from {}: {e}", session.rendition);
    }
    if let Err(e) = engine.destroy_rendition(session.rendition) {
        warn!("Failed to destroy {}: {e}", session.rendition);
    }
    if let Err(e) = engine.destroy_book(session.book) {
        warn!("Failed to destroy {}: {e}", session.book);
    }
    info!("Closed {}", session.source_file_name);
}
