//! Built-in rendering engine for character-cell hosts.
//!
//! Parses the container with the `epub` crate, flattens each spine document
//! to paragraphs of plain text with html5ever and paginates them into the
//! rendition's viewport. Positions are expressed as simplified CFIs that
//! carry the spine step and a character offset into the chapter text.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;

use epub::doc::{EpubDoc, NavPoint};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use log::{debug, info, warn};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::{
    BookId, DisplayTarget, EngineError, EngineEvent, EventSink, LocationStart, RenderingEngine,
    RenditionId, RenditionOptions, SubscriptionId, Viewport,
};
use crate::stylesheet::StyleSheet;
use crate::toc::{NavigationEntry, normalize_locator};

/// Characters of chapter text per entry of the location index.
pub const CHARS_PER_LOCATION: usize = 1024;

/// Line heights at or above this get a spacer row after every line.
const DOUBLE_SPACING_THRESHOLD: f64 = 1.8;
const MIN_WRAP_WIDTH: usize = 10;

static CFI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^epubcfi\(/6/(\d+)!/4:(\d+)\)$").unwrap());

pub fn format_cfi(spine_index: usize, offset: usize) -> String {
    format!("epubcfi(/6/{}!/4:{})", (spine_index + 1) * 2, offset)
}

pub fn parse_cfi(cfi: &str) -> Option<(usize, usize)> {
    let caps = CFI_RE.captures(cfi.trim())?;
    let step: usize = caps[1].parse().ok()?;
    let offset: usize = caps[2].parse().ok()?;
    if step < 2 || step % 2 != 0 {
        return None;
    }
    Some((step / 2 - 1, offset))
}

// ============================================================================
// Text extraction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub text: String,
    /// Character offset of the first character within the chapter.
    pub offset: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterText {
    pub paragraphs: Vec<Paragraph>,
    pub anchors: HashMap<String, usize>,
    pub len: usize,
}

const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "title", "noscript"];
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

pub fn extract_text(html: &str) -> ChapterText {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    let mut builder = TextBuilder::default();
    builder.walk(&dom.document);
    builder.finish()
}

#[derive(Default)]
struct TextBuilder {
    paragraphs: Vec<Paragraph>,
    anchors: HashMap<String, usize>,
    current: String,
    current_len: usize,
    offset: usize,
}

impl TextBuilder {
    fn walk(&mut self, handle: &Handle) {
        match &handle.data {
            NodeData::Text { contents } => {
                let text = contents.borrow();
                self.push_text(&text);
            }
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                if SKIPPED_TAGS.contains(&tag) {
                    return;
                }

                let is_block = BLOCK_TAGS.contains(&tag);
                if is_block || tag == "br" {
                    self.break_paragraph();
                }

                let attrs = attrs.borrow();
                if let Some(id) = attrs.iter().find(|a| &*a.name.local == "id") {
                    let position = self.offset + self.current_len;
                    self.anchors.entry(id.value.to_string()).or_insert(position);
                }

                match tag {
                    "li" => self.push_raw("• "),
                    "img" => {
                        let alt = attrs
                            .iter()
                            .find(|a| &*a.name.local == "alt")
                            .map(|a| a.value.trim().to_string())
                            .unwrap_or_default();
                        if alt.is_empty() {
                            self.push_raw("[image]");
                        } else {
                            self.push_raw(&format!("[image: {alt}]"));
                        }
                    }
                    _ => {}
                }
                drop(attrs);

                for child in handle.children.borrow().iter() {
                    self.walk(child);
                }

                if is_block {
                    self.break_paragraph();
                }
            }
            _ => {
                for child in handle.children.borrow().iter() {
                    self.walk(child);
                }
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                    self.current_len += 1;
                }
            } else {
                self.current.push(ch);
                self.current_len += 1;
            }
        }
    }

    fn push_raw(&mut self, text: &str) {
        self.current.push_str(text);
        self.current_len += text.chars().count();
    }

    fn break_paragraph(&mut self) {
        if self.current.ends_with(' ') {
            self.current.pop();
            self.current_len -= 1;
        }
        if self.current.trim().is_empty() {
            self.current.clear();
            self.current_len = 0;
            return;
        }
        let text = std::mem::take(&mut self.current);
        self.paragraphs.push(Paragraph {
            text,
            offset: self.offset,
        });
        self.offset += self.current_len + 1;
        self.current_len = 0;
    }

    fn finish(mut self) -> ChapterText {
        self.break_paragraph();
        ChapterText {
            paragraphs: self.paragraphs,
            anchors: self.anchors,
            len: self.offset,
        }
    }
}

// ============================================================================
// Books and renditions
// ============================================================================

struct Chapter {
    href: String,
    text: ChapterText,
}

struct LoadedBook {
    chapters: Vec<Chapter>,
    navigation: Vec<NavigationEntry>,
    locations: Vec<(usize, usize)>,
}

impl LoadedBook {
    fn chapter_index(&self, href: &str) -> Option<usize> {
        find_chapter(&self.chapters, href)
    }
}

fn find_chapter(chapters: &[Chapter], href: &str) -> Option<usize> {
    let document = normalize_locator(href);
    if document.is_empty() {
        return None;
    }
    chapters
        .iter()
        .position(|c| c.href == document)
        .or_else(|| {
            // Hrefs relative to the package document instead of the container root.
            chapters
                .iter()
                .position(|c| c.href.ends_with(&format!("/{document}")))
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLine {
    pub text: String,
    pub offset: usize,
}

#[derive(Default)]
struct ChapterLayout {
    lines: Vec<PageLine>,
    rows: usize,
}

impl ChapterLayout {
    fn page_count(&self) -> usize {
        self.lines.len().div_ceil(self.rows).max(1)
    }

    fn page_lines(&self, page: usize) -> &[PageLine] {
        let start = (page * self.rows).min(self.lines.len());
        let end = (start + self.rows).min(self.lines.len());
        &self.lines[start..end]
    }

    fn page_start_offset(&self, page: usize) -> usize {
        self.page_lines(page).first().map(|l| l.offset).unwrap_or(0)
    }

    fn page_for_offset(&self, offset: usize) -> usize {
        let line = self
            .lines
            .partition_point(|l| l.offset <= offset)
            .saturating_sub(1);
        (line / self.rows).min(self.page_count() - 1)
    }
}

struct Rendition {
    book: BookId,
    viewport: Viewport,
    font_size: u16,
    themes: HashMap<String, StyleSheet>,
    selected_theme: Option<String>,
    layout: Vec<ChapterLayout>,
    spine_index: usize,
    page: usize,
    subscribers: Vec<(SubscriptionId, EventSink)>,
}

impl Rendition {
    fn sheet(&self) -> Option<&StyleSheet> {
        self.selected_theme
            .as_ref()
            .and_then(|name| self.themes.get(name))
    }

    fn line_height(&self) -> f64 {
        self.sheet()
            .and_then(|s| s.value("body", "line-height"))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(1.0)
    }

    fn wrap_width(&self) -> usize {
        let scaled = usize::from(self.viewport.width) * 100 / usize::from(self.font_size.max(1));
        scaled.max(MIN_WRAP_WIDTH)
    }

    fn current_offset(&self) -> usize {
        self.layout
            .get(self.spine_index)
            .map(|l| l.page_start_offset(self.page))
            .unwrap_or(0)
    }

    fn relayout(&mut self, book: &LoadedBook) {
        let offset = self.current_offset();
        let width = self.wrap_width();
        let rows = usize::from(self.viewport.height).max(1);
        let spacer = self.line_height() >= DOUBLE_SPACING_THRESHOLD;

        self.layout = book
            .chapters
            .iter()
            .map(|chapter| layout_chapter(&chapter.text, width, rows, spacer))
            .collect();

        if let Some(layout) = self.layout.get(self.spine_index) {
            self.page = layout.page_for_offset(offset);
        }
    }

    fn start(&self, book: &LoadedBook) -> LocationStart {
        let href = book
            .chapters
            .get(self.spine_index)
            .map(|c| c.href.clone())
            .unwrap_or_default();
        LocationStart {
            href,
            cfi: format_cfi(self.spine_index, self.current_offset()),
        }
    }
}

fn layout_chapter(text: &ChapterText, width: usize, rows: usize, spacer: bool) -> ChapterLayout {
    let mut lines = Vec::new();
    for (index, paragraph) in text.paragraphs.iter().enumerate() {
        if index > 0 {
            lines.push(PageLine {
                text: String::new(),
                offset: paragraph.offset,
            });
        }
        let mut consumed = 0;
        for wrapped in textwrap::wrap(&paragraph.text, width) {
            let offset = paragraph.offset + consumed;
            consumed += wrapped.chars().count() + 1;
            lines.push(PageLine {
                text: wrapped.into_owned(),
                offset,
            });
            if spacer {
                lines.push(PageLine {
                    text: String::new(),
                    offset,
                });
            }
        }
    }
    ChapterLayout { lines, rows }
}

/// What the host needs to draw the current page.
#[derive(Debug)]
pub struct PageView<'a> {
    pub lines: Vec<&'a str>,
    pub page: usize,
    pub page_count: usize,
    pub chapter_index: usize,
    pub chapter_count: usize,
    pub background: Option<&'a str>,
    pub foreground: Option<&'a str>,
}

#[derive(Default)]
pub struct NativeEngine {
    books: HashMap<BookId, LoadedBook>,
    renditions: HashMap<RenditionId, Rendition>,
    next_handle: u64,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn book(&self, book: BookId) -> Result<&LoadedBook, EngineError> {
        self.books.get(&book).ok_or(EngineError::UnknownBook(book))
    }

    fn rendition_mut(&mut self, rendition: RenditionId) -> Result<&mut Rendition, EngineError> {
        self.renditions
            .get_mut(&rendition)
            .ok_or(EngineError::UnknownRendition(rendition))
    }

    /// Re-paginates after a change to the viewport, font size or theme,
    /// keeping the first visible character on screen.
    fn reflow(&mut self, rendition_id: RenditionId) -> Result<(), EngineError> {
        let rendition = self
            .renditions
            .get_mut(&rendition_id)
            .ok_or(EngineError::UnknownRendition(rendition_id))?;
        let book = self
            .books
            .get(&rendition.book)
            .ok_or(EngineError::UnknownBook(rendition.book))?;
        rendition.relayout(book);
        self.emit_relocated(rendition_id);
        Ok(())
    }

    fn emit_relocated(&self, rendition_id: RenditionId) {
        let Some(rendition) = self.renditions.get(&rendition_id) else {
            return;
        };
        let Some(book) = self.books.get(&rendition.book) else {
            return;
        };
        let start = rendition.start(book);
        for (_, sink) in &rendition.subscribers {
            let _ = sink.send(EngineEvent::Relocated {
                rendition: rendition_id,
                start: start.clone(),
            });
        }
    }

    fn move_to(
        &mut self,
        rendition_id: RenditionId,
        spine_index: usize,
        offset: usize,
    ) -> Result<(), EngineError> {
        let rendition = self.rendition_mut(rendition_id)?;
        let Some(layout) = rendition.layout.get(spine_index) else {
            return Err(EngineError::TargetNotFound(format_cfi(spine_index, offset)));
        };
        let page = layout.page_for_offset(offset);
        rendition.spine_index = spine_index;
        rendition.page = page;
        self.emit_relocated(rendition_id);
        Ok(())
    }

    pub fn visible_page(&self, rendition_id: RenditionId) -> Option<PageView<'_>> {
        let rendition = self.renditions.get(&rendition_id)?;
        let layout = rendition.layout.get(rendition.spine_index)?;
        let sheet = rendition.sheet();
        Some(PageView {
            lines: layout
                .page_lines(rendition.page)
                .iter()
                .map(|l| l.text.as_str())
                .collect(),
            page: rendition.page,
            page_count: layout.page_count(),
            chapter_index: rendition.spine_index,
            chapter_count: rendition.layout.len(),
            background: sheet.and_then(|s| s.value("body", "background")),
            foreground: sheet.and_then(|s| s.value("body", "color")),
        })
    }
}

fn path_to_href(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Rewrites a TOC target onto the spine document's own href so relocation
/// locators and TOC entries compare equal.
fn canonical_target(chapters: &[Chapter], target: &str) -> String {
    let Some(index) = find_chapter(chapters, target) else {
        return target.to_string();
    };
    match target.split_once('#') {
        Some((_, fragment)) => format!("{}#{fragment}", chapters[index].href),
        None => chapters[index].href.clone(),
    }
}

fn convert_nav_points(points: &[NavPoint], chapters: &[Chapter]) -> Vec<NavigationEntry> {
    let mut used = HashSet::new();
    let mut position = 0;
    convert_nav_level(points, chapters, 0, &mut used, &mut position)
}

/// Ids come from `playOrder` when present and unique, otherwise from the
/// pre-order position of the point.
fn convert_nav_level(
    points: &[NavPoint],
    chapters: &[Chapter],
    depth: usize,
    used: &mut HashSet<String>,
    position: &mut usize,
) -> Vec<NavigationEntry> {
    let mut entries = Vec::with_capacity(points.len());
    for point in points {
        *position += 1;
        let id = match point.play_order {
            Some(order) if !used.contains(&format!("navpoint-{order}")) => {
                format!("navpoint-{order}")
            }
            _ => format!("navpoint-at-{position}"),
        };
        used.insert(id.clone());
        let children = convert_nav_level(&point.children, chapters, depth + 1, used, position);
        entries.push(NavigationEntry {
            id,
            label: point.label.clone(),
            target_locator: canonical_target(chapters, &path_to_href(&point.content)),
            depth,
            children,
        });
    }
    entries
}

fn build_locations(chapters: &[Chapter]) -> Vec<(usize, usize)> {
    let mut locations = Vec::new();
    for (spine_index, chapter) in chapters.iter().enumerate() {
        let mut offset = 0;
        loop {
            locations.push((spine_index, offset));
            offset += CHARS_PER_LOCATION;
            if offset >= chapter.text.len {
                break;
            }
        }
    }
    locations
}

impl RenderingEngine for NativeEngine {
    fn open_book(&mut self, bytes: Vec<u8>) -> Result<BookId, EngineError> {
        let mut doc = EpubDoc::from_reader(Cursor::new(bytes))
            .map_err(|e| EngineError::InvalidBook(e.to_string()))?;

        let spine: Vec<(String, String)> = doc
            .spine
            .iter()
            .filter_map(|item| {
                doc.resources
                    .get(&item.idref)
                    .map(|resource| (item.idref.clone(), path_to_href(&resource.path)))
            })
            .collect();
        if spine.is_empty() {
            return Err(EngineError::InvalidBook("spine has no documents".into()));
        }

        let mut chapters = Vec::with_capacity(spine.len());
        for (idref, href) in spine {
            let text = match doc.get_resource_str(&idref) {
                Some((html, _mime)) => extract_text(&html),
                None => {
                    warn!("Spine item {idref} ({href}) has no readable content");
                    ChapterText::default()
                }
            };
            chapters.push(Chapter { href, text });
        }

        let navigation = convert_nav_points(&doc.toc, &chapters);
        let book = BookId(self.next_handle());
        info!(
            "Opened {book}: {} spine documents, {} top-level TOC entries",
            chapters.len(),
            navigation.len()
        );
        self.books.insert(
            book,
            LoadedBook {
                chapters,
                navigation,
                locations: Vec::new(),
            },
        );
        Ok(book)
    }

    fn render_to(
        &mut self,
        book: BookId,
        options: &RenditionOptions,
    ) -> Result<RenditionId, EngineError> {
        let loaded = self.book(book)?;
        let mut rendition = Rendition {
            book,
            viewport: options.viewport,
            font_size: 100,
            themes: HashMap::new(),
            selected_theme: None,
            layout: Vec::new(),
            spine_index: 0,
            page: 0,
            subscribers: Vec::new(),
        };
        rendition.relayout(loaded);

        let id = RenditionId(self.next_handle());
        debug!("Attached {id} to {book} at {:?}", options.viewport);
        self.renditions.insert(id, rendition);
        Ok(id)
    }

    fn navigation(&mut self, book: BookId) -> Result<Vec<NavigationEntry>, EngineError> {
        Ok(self.book(book)?.navigation.clone())
    }

    fn is_ready(&self, book: BookId) -> bool {
        self.books.contains_key(&book)
    }

    fn location_count(&self, book: BookId) -> usize {
        self.books.get(&book).map(|b| b.locations.len()).unwrap_or(0)
    }

    fn generate_locations(&mut self, book: BookId) -> Result<(), EngineError> {
        let loaded = self
            .books
            .get_mut(&book)
            .ok_or(EngineError::UnknownBook(book))?;
        loaded.locations = build_locations(&loaded.chapters);
        let count = loaded.locations.len();
        debug!("Generated {count} locations for {book}");

        for rendition in self.renditions.values().filter(|r| r.book == book) {
            for (_, sink) in &rendition.subscribers {
                let _ = sink.send(EngineEvent::LocationsGenerated { book, count });
            }
        }
        Ok(())
    }

    fn percentage_from_cfi(&self, book: BookId, cfi: &str) -> Option<f64> {
        let locations = &self.books.get(&book)?.locations;
        let position = parse_cfi(cfi)?;
        if locations.is_empty() {
            return None;
        }
        let index = locations
            .partition_point(|location| *location <= position)
            .saturating_sub(1);
        if locations.len() == 1 {
            return Some(0.0);
        }
        Some(index as f64 / (locations.len() - 1) as f64)
    }

    fn cfi_from_percentage(&self, book: BookId, fraction: f64) -> Option<String> {
        let locations = &self.books.get(&book)?.locations;
        if locations.is_empty() || !fraction.is_finite() {
            return None;
        }
        let last = locations.len() - 1;
        let index = (fraction.clamp(0.0, 1.0) * last as f64).round() as usize;
        let (spine_index, offset) = locations[index.min(last)];
        Some(format_cfi(spine_index, offset))
    }

    fn register_theme(
        &mut self,
        rendition: RenditionId,
        name: &str,
        sheet: &StyleSheet,
    ) -> Result<(), EngineError> {
        let target = self.rendition_mut(rendition)?;
        target.themes.insert(name.to_string(), sheet.clone());
        let is_selected = target.selected_theme.as_deref() == Some(name);
        if is_selected {
            self.reflow(rendition)?;
        }
        Ok(())
    }

    fn select_theme(&mut self, rendition: RenditionId, name: &str) -> Result<(), EngineError> {
        let target = self.rendition_mut(rendition)?;
        if !target.themes.contains_key(name) {
            return Err(EngineError::UnknownTheme(name.to_string()));
        }
        target.selected_theme = Some(name.to_string());
        self.reflow(rendition)
    }

    fn set_font_size(&mut self, rendition: RenditionId, percent: u16) -> Result<(), EngineError> {
        self.rendition_mut(rendition)?.font_size = percent;
        self.reflow(rendition)
    }

    fn display(
        &mut self,
        rendition: RenditionId,
        target: &DisplayTarget,
    ) -> Result<(), EngineError> {
        let book_id = self
            .renditions
            .get(&rendition)
            .ok_or(EngineError::UnknownRendition(rendition))?
            .book;
        let book = self.book(book_id)?;

        let (spine_index, offset) = match target {
            DisplayTarget::Start => (0, 0),
            DisplayTarget::Href(href) => {
                let spine_index = book
                    .chapter_index(href)
                    .ok_or_else(|| EngineError::TargetNotFound(href.clone()))?;
                let offset = href
                    .split_once('#')
                    .and_then(|(_, fragment)| {
                        book.chapters[spine_index].text.anchors.get(fragment)
                    })
                    .copied()
                    .unwrap_or(0);
                (spine_index, offset)
            }
            DisplayTarget::Cfi(cfi) => {
                parse_cfi(cfi).ok_or_else(|| EngineError::TargetNotFound(cfi.clone()))?
            }
        };
        self.move_to(rendition, spine_index, offset)
    }

    fn prev(&mut self, rendition_id: RenditionId) -> Result<(), EngineError> {
        let rendition = self.rendition_mut(rendition_id)?;
        if rendition.page > 0 {
            rendition.page -= 1;
        } else if rendition.spine_index > 0 {
            rendition.spine_index -= 1;
            rendition.page = rendition
                .layout
                .get(rendition.spine_index)
                .map(|l| l.page_count() - 1)
                .unwrap_or(0);
        } else {
            return Ok(());
        }
        self.emit_relocated(rendition_id);
        Ok(())
    }

    fn next(&mut self, rendition_id: RenditionId) -> Result<(), EngineError> {
        let rendition = self.rendition_mut(rendition_id)?;
        let page_count = rendition
            .layout
            .get(rendition.spine_index)
            .map(|l| l.page_count())
            .unwrap_or(1);
        if rendition.page + 1 < page_count {
            rendition.page += 1;
        } else if rendition.spine_index + 1 < rendition.layout.len() {
            rendition.spine_index += 1;
            rendition.page = 0;
        } else {
            return Ok(());
        }
        self.emit_relocated(rendition_id);
        Ok(())
    }

    fn subscribe(
        &mut self,
        rendition: RenditionId,
        sink: EventSink,
    ) -> Result<SubscriptionId, EngineError> {
        let subscription = SubscriptionId(self.next_handle());
        self.rendition_mut(rendition)?
            .subscribers
            .push((subscription, sink));
        Ok(subscription)
    }

    fn unsubscribe(
        &mut self,
        rendition: RenditionId,
        subscription: SubscriptionId,
    ) -> Result<(), EngineError> {
        self.rendition_mut(rendition)?
            .subscribers
            .retain(|(id, _)| *id != subscription);
        Ok(())
    }

    fn resize(&mut self, rendition: RenditionId, viewport: Viewport) -> Result<(), EngineError> {
        self.rendition_mut(rendition)?.viewport = viewport;
        self.reflow(rendition)
    }

    fn destroy_rendition(&mut self, rendition: RenditionId) -> Result<(), EngineError> {
        self.renditions
            .remove(&rendition)
            .map(|_| debug!("Destroyed {rendition}"))
            .ok_or(EngineError::UnknownRendition(rendition))
    }

    fn destroy_book(&mut self, book: BookId) -> Result<(), EngineError> {
        self.renditions.retain(|_, r| r.book != book);
        self.books
            .remove(&book)
            .map(|_| debug!("Destroyed {book}"))
            .ok_or(EngineError::UnknownBook(book))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::{ThemeName, compose};
    use crate::test_utils::fake_epub::sample_book;
    use crate::toc::flatten;
    use std::path::PathBuf;
    use std::sync::mpsc::{self, Receiver};

    fn open_sample(viewport: Viewport) -> (NativeEngine, BookId, RenditionId, Receiver<EngineEvent>) {
        let mut engine = NativeEngine::new();
        let book = engine.open_book(sample_book()).unwrap();
        let rendition = engine
            .render_to(book, &RenditionOptions::paginated(viewport))
            .unwrap();
        let (tx, rx) = mpsc::channel();
        engine.subscribe(rendition, tx).unwrap();
        (engine, book, rendition, rx)
    }

    fn last_start(rx: &Receiver<EngineEvent>) -> Option<LocationStart> {
        rx.try_iter()
            .filter_map(|event| match event {
                EngineEvent::Relocated { start, .. } => Some(start),
                _ => None,
            })
            .last()
    }

    #[test]
    fn test_extract_text_paragraphs_and_anchors() {
        let text = extract_text(
            r#"<html><head><title>T</title><style>p{}</style></head>
            <body><h1 id="top">Title</h1>
            <p id="a">First   paragraph
            spans lines.</p>
            <script>ignored()</script>
            <ul><li>one</li><li>two</li></ul>
            <p>Figure <img src="x.png" alt="a fox"/></p></body></html>"#,
        );
        let paragraphs: Vec<&str> = text.paragraphs.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(
            paragraphs,
            vec![
                "Title",
                "First paragraph spans lines.",
                "• one",
                "• two",
                "Figure [image: a fox]"
            ]
        );
        assert_eq!(text.anchors.get("top"), Some(&0));
        assert_eq!(text.anchors.get("a"), Some(&text.paragraphs[1].offset));
        assert_eq!(text.paragraphs[1].offset, "Title".len() + 1);
    }

    #[test]
    fn test_cfi_format_and_parse() {
        assert_eq!(format_cfi(0, 0), "epubcfi(/6/2!/4:0)");
        assert_eq!(parse_cfi("epubcfi(/6/6!/4:120)"), Some((2, 120)));
        assert_eq!(parse_cfi("epubcfi(/6/3!/4:1)"), None);
        assert_eq!(parse_cfi("garbage"), None);
    }

    #[test]
    fn test_invalid_bytes_are_rejected() {
        let mut engine = NativeEngine::new();
        let result = engine.open_book(b"definitely not a zip".to_vec());
        assert!(matches!(result, Err(EngineError::InvalidBook(_))));
    }

    #[test]
    fn test_navigation_tree_from_ncx() {
        let mut engine = NativeEngine::new();
        let book = engine.open_book(sample_book()).unwrap();
        let nav = engine.navigation(book).unwrap();

        let labels: Vec<&str> = nav.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Introduction", "Chapter One", "Chapter Two"]);
        assert_eq!(nav[1].children.len(), 2);
        assert!(nav[1].children[0].target_locator.ends_with("chapter1.xhtml#p10"));
        assert_eq!(nav[1].children[0].depth, 1);

        let ids: Vec<String> = flatten(&nav).into_iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            vec!["navpoint-1", "navpoint-2", "navpoint-3", "navpoint-4", "navpoint-5"]
        );
    }

    #[test]
    fn test_nav_ids_without_play_order_stay_unique() {
        fn point(label: &str, play_order: Option<usize>, children: Vec<NavPoint>) -> NavPoint {
            NavPoint {
                label: label.to_string(),
                content: PathBuf::from(format!("{label}.xhtml")),
                children,
                play_order,
            }
        }
        let points = vec![
            point("a", None, vec![point("a1", None, vec![])]),
            point("b", Some(7), vec![]),
            point("c", Some(7), vec![]),
        ];

        let ids: Vec<String> = flatten(&convert_nav_points(&points, &[]))
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(
            ids,
            vec!["navpoint-at-1", "navpoint-at-2", "navpoint-7", "navpoint-at-4"]
        );
    }

    #[test]
    fn test_display_start_and_page_through_chapters() {
        let (mut engine, _book, rendition, rx) = open_sample(Viewport::new(40, 8));
        engine.display(rendition, &DisplayTarget::Start).unwrap();
        let start = last_start(&rx).unwrap();
        assert!(start.href.ends_with("intro.xhtml"));
        assert_eq!(start.cfi, "epubcfi(/6/2!/4:0)");

        let mut hrefs = Vec::new();
        for _ in 0..200 {
            engine.next(rendition).unwrap();
            if let Some(start) = last_start(&rx) {
                hrefs.push(start.href);
            }
        }
        assert!(hrefs.iter().any(|h| h.ends_with("chapter1.xhtml")));
        assert!(hrefs.last().unwrap().ends_with("chapter2.xhtml"));

        // At the end of the book next is a no-op without an event.
        engine.next(rendition).unwrap();
        assert!(last_start(&rx).is_none());

        engine.prev(rendition).unwrap();
        assert!(last_start(&rx).unwrap().href.ends_with("chapter2.xhtml"));
    }

    #[test]
    fn test_display_href_with_fragment_lands_on_anchor_page() {
        let (mut engine, book, rendition, rx) = open_sample(Viewport::new(40, 8));
        let nav = engine.navigation(book).unwrap();
        let target = nav[1].children[1].target_locator.clone();

        engine
            .display(rendition, &DisplayTarget::Href(target.clone()))
            .unwrap();
        let start = last_start(&rx).unwrap();
        assert!(start.href.ends_with("chapter1.xhtml"));
        assert_eq!(start.href, normalize_locator(&target));

        let page = engine.visible_page(rendition).unwrap();
        assert!(page.page > 0);
        assert!(page.lines.iter().any(|l| l.contains("Paragraph 30")));
    }

    #[test]
    fn test_display_unknown_href_fails() {
        let (mut engine, _book, rendition, _rx) = open_sample(Viewport::new(40, 8));
        let result = engine.display(rendition, &DisplayTarget::Href("missing.xhtml".into()));
        assert!(matches!(result, Err(EngineError::TargetNotFound(_))));
    }

    #[test]
    fn test_locations_round_trip() {
        let (mut engine, book, _rendition, rx) = open_sample(Viewport::new(40, 8));
        assert_eq!(engine.location_count(book), 0);
        assert_eq!(engine.cfi_from_percentage(book, 0.5), None);

        engine.generate_locations(book).unwrap();
        let count = engine.location_count(book);
        assert!(count >= 3);
        assert!(rx.try_iter().any(|e| matches!(
            e,
            EngineEvent::LocationsGenerated { book: b, .. } if b == book
        )));

        let step = 1.0 / (count - 1) as f64;
        for fraction in [0.0, 0.3, 0.5, 1.0] {
            let cfi = engine.cfi_from_percentage(book, fraction).unwrap();
            let back = engine.percentage_from_cfi(book, &cfi).unwrap();
            assert!((back - fraction).abs() <= step, "{fraction} -> {cfi} -> {back}");
        }
    }

    #[test]
    fn test_theme_selection_exposes_page_colours() {
        let (mut engine, _book, rendition, _rx) = open_sample(Viewport::new(40, 8));
        let sheet = compose(ThemeName::Dark, "serif", 1.6);
        engine.register_theme(rendition, "pageturn", &sheet).unwrap();
        assert!(matches!(
            engine.select_theme(rendition, "other"),
            Err(EngineError::UnknownTheme(_))
        ));
        engine.select_theme(rendition, "pageturn").unwrap();

        let page = engine.visible_page(rendition).unwrap();
        assert_eq!(page.background, Some("#1e1e1e"));
        assert_eq!(page.foreground, Some("#d4d4d4"));
    }

    #[test]
    fn test_larger_font_and_spacing_add_pages() {
        let (mut engine, _book, rendition, _rx) = open_sample(Viewport::new(40, 8));
        engine
            .display(rendition, &DisplayTarget::Href("chapter1.xhtml".into()))
            .unwrap();
        let base = engine.visible_page(rendition).unwrap().page_count;

        engine.set_font_size(rendition, 150).unwrap();
        let larger = engine.visible_page(rendition).unwrap().page_count;
        assert!(larger > base);

        let sheet = compose(ThemeName::Light, "serif", 2.0);
        engine.register_theme(rendition, "pageturn", &sheet).unwrap();
        engine.select_theme(rendition, "pageturn").unwrap();
        let spaced = engine.visible_page(rendition).unwrap().page_count;
        assert!(spaced > larger);
    }

    #[test]
    fn test_destroyed_handles_are_unknown() {
        let (mut engine, book, rendition, _rx) = open_sample(Viewport::new(40, 8));
        engine.destroy_rendition(rendition).unwrap();
        assert!(matches!(
            engine.next(rendition),
            Err(EngineError::UnknownRendition(_))
        ));
        engine.destroy_book(book).unwrap();
        assert!(!engine.is_ready(book));
        assert!(matches!(
            engine.destroy_book(book),
            Err(EngineError::UnknownBook(_))
        ));
    }
}
