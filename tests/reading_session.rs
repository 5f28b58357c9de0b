use std::cell::RefCell;
use std::rc::Rc;

use pageturn::engine::{DisplayTarget, Viewport};
use pageturn::reader::Reader;
use pageturn::session::{BookSource, LOAD_FAILURE_MESSAGE, LoadError, SessionState};
use pageturn::stylesheet::{Appearance, ThemeName};
use pageturn::test_utils::stub_engine::{EngineCall, StubEngine};
use pageturn::toc::NavigationEntry;

fn reader_with(engine: StubEngine) -> Reader<StubEngine> {
    Reader::new(engine, Viewport::new(80, 24), Appearance::default())
}

fn load(reader: &mut Reader<StubEngine>, name: &str) -> Result<(), LoadError> {
    reader
        .load(BookSource::Bytes(b"PK fake".to_vec()), name)
        .map(|_| ())
}

fn position(calls: &[EngineCall], wanted: &EngineCall) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in {calls:?}"))
}

fn assert_clean_failure(reader: &Reader<StubEngine>) {
    assert!(matches!(reader.state(), SessionState::Failed { .. }));
    assert_eq!(reader.error(), Some(LOAD_FAILURE_MESSAGE));
    assert!(reader.toc().is_empty());
    assert_eq!(reader.progress(), None);
    assert_eq!(reader.chapter_title(), "");
    assert!(!reader.controls().page_turn);
    assert!(reader.controls().open_file);
    assert!(reader.engine().live_books().is_empty());
    assert!(reader.engine().live_renditions().is_empty());
    assert_eq!(reader.engine().subscriber_count(), 0);
}

#[test]
fn replacing_a_book_tears_down_before_opening_the_next() {
    let mut reader = reader_with(StubEngine::new());
    load(&mut reader, "first.epub").unwrap();
    let first = reader.session().unwrap().session.clone();

    load(&mut reader, "second.epub").unwrap();
    let second = reader.session().unwrap().session.clone();
    assert_ne!(first.book, second.book);

    let calls = &reader.engine().calls;
    let unsubscribe = position(calls, &EngineCall::Unsubscribe(first.rendition));
    let destroy_rendition = position(calls, &EngineCall::DestroyRendition(first.rendition));
    let destroy_book = position(calls, &EngineCall::DestroyBook(first.book));
    let open_second = position(calls, &EngineCall::OpenBook(second.book));
    assert!(unsubscribe < destroy_rendition);
    assert!(destroy_rendition < destroy_book);
    assert!(destroy_book < open_second);

    assert_eq!(reader.engine().live_books(), &[second.book]);
    assert_eq!(reader.engine().live_renditions(), vec![second.rendition]);
    assert_eq!(reader.engine().subscriber_count(), 1);
    assert_eq!(reader.file_name(), Some("second.epub"));
}

#[test]
fn load_is_sized_and_themed_before_first_display() {
    let mut reader = reader_with(StubEngine::new());
    load(&mut reader, "book.epub").unwrap();
    let rendition = reader.session().unwrap().session.rendition;

    let calls = &reader.engine().calls;
    let select = position(
        calls,
        &EngineCall::SelectTheme(rendition, "pageturn".to_string()),
    );
    let size = position(calls, &EngineCall::SetFontSize(rendition, 100));
    let display = position(calls, &EngineCall::Display(rendition, DisplayTarget::Start));
    assert!(size < display);
    assert!(select < display);
}

#[test]
fn open_failure_leaves_no_session() {
    let mut engine = StubEngine::new();
    engine.fail_open = true;
    let mut reader = reader_with(engine);

    let result = load(&mut reader, "broken.epub");
    assert!(matches!(result, Err(LoadError::Engine(_))));
    assert_clean_failure(&reader);
}

#[test]
fn display_failure_rolls_back_in_reverse_order() {
    let mut engine = StubEngine::new();
    engine.fail_display = true;
    let mut reader = reader_with(engine);

    assert!(load(&mut reader, "broken.epub").is_err());
    assert_clean_failure(&reader);

    let tail: Vec<&EngineCall> = reader.engine().calls.iter().rev().take(3).collect();
    assert!(matches!(tail[2], EngineCall::Unsubscribe(_)));
    assert!(matches!(tail[1], EngineCall::DestroyRendition(_)));
    assert!(matches!(tail[0], EngineCall::DestroyBook(_)));
}

#[test]
fn navigation_failure_rolls_back() {
    let mut engine = StubEngine::new();
    engine.fail_navigation = true;
    engine.navigation = vec![NavigationEntry::new("1", "Intro", "intro.xhtml")];
    let mut reader = reader_with(engine);

    assert!(load(&mut reader, "broken.epub").is_err());
    assert_clean_failure(&reader);
}

#[test]
fn failure_after_a_live_session_also_releases_it() {
    let mut reader = reader_with(StubEngine::new());
    load(&mut reader, "good.epub").unwrap();
    let good = reader.session().unwrap().session.clone();

    reader.engine_mut().fail_open = true;
    assert!(load(&mut reader, "bad.epub").is_err());

    assert!(
        reader
            .engine()
            .calls
            .contains(&EngineCall::DestroyBook(good.book))
    );
    assert_clean_failure(&reader);

    // A failed load does not block the next one.
    reader.engine_mut().fail_open = false;
    load(&mut reader, "good-again.epub").unwrap();
    assert!(reader.error().is_none());
    assert!(reader.controls().page_turn);
}

#[test]
fn unreadable_file_never_reaches_the_engine() {
    let mut reader = reader_with(StubEngine::new());
    let result = reader.load(
        BookSource::Path("/definitely/not/here.epub".into()),
        "here.epub",
    );

    assert!(matches!(result, Err(LoadError::Read { .. })));
    assert!(reader.engine().calls.is_empty());
    assert_eq!(reader.error(), Some(LOAD_FAILURE_MESSAGE));
}

#[test]
fn existing_location_index_is_used_without_regenerating() {
    let mut engine = StubEngine::new();
    engine.preexisting_locations = 120;
    let mut reader = reader_with(engine);
    load(&mut reader, "indexed.epub").unwrap();

    assert!(reader.controls().progress);
    assert_eq!(reader.progress(), Some(0.0));
    assert!(
        !reader
            .engine()
            .calls
            .iter()
            .any(|c| matches!(c, EngineCall::GenerateLocations(_)))
    );
}

fn generate_calls(reader: &Reader<StubEngine>) -> usize {
    reader
        .engine()
        .calls
        .iter()
        .filter(|c| matches!(c, EngineCall::GenerateLocations(_)))
        .count()
}

#[test]
fn location_index_waits_for_the_book_to_finish_parsing() {
    let mut engine = StubEngine::new();
    engine.not_ready = true;
    let mut reader = reader_with(engine);
    load(&mut reader, "slow.epub").unwrap();

    assert!(reader.controls().page_turn);
    assert!(!reader.controls().progress);
    assert_eq!(generate_calls(&reader), 0);

    reader.engine_mut().finish_parsing();
    assert_eq!(reader.pump_events(), 1);
    assert_eq!(generate_calls(&reader), 1);
    assert!(!reader.controls().progress);

    reader.engine_mut().finish_locations(40);
    reader.pump_events();
    assert!(reader.controls().progress);
}

#[test]
fn readiness_of_a_replaced_book_is_ignored() {
    let mut engine = StubEngine::new();
    engine.not_ready = true;
    let mut reader = reader_with(engine);
    load(&mut reader, "first.epub").unwrap();
    let first = reader.session().unwrap().session.book;

    load(&mut reader, "second.epub").unwrap();
    reader
        .engine()
        .send_event(pageturn::engine::EngineEvent::BookReady { book: first });
    assert_eq!(reader.pump_events(), 0);
    assert_eq!(generate_calls(&reader), 0);
}

#[test]
fn appearance_chosen_before_loading_is_applied_on_load() {
    let mut reader = reader_with(StubEngine::new());
    reader.set_theme(ThemeName::Dark);
    reader.set_line_spacing_percent(200);
    load(&mut reader, "book.epub").unwrap();

    let rendition = reader.session().unwrap().session.rendition;
    let sheet = &reader.engine().sheets[&rendition];
    assert_eq!(sheet.value("body", "background"), Some("#1e1e1e"));
    assert_eq!(sheet.value("p", "line-height"), Some("2.00"));
}

#[test]
fn dropping_the_reader_releases_the_session() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut reader = reader_with(StubEngine::with_shared_log(log.clone()));
    load(&mut reader, "book.epub").unwrap();
    let session = reader.session().unwrap().session.clone();
    drop(reader);

    let calls = log.borrow();
    assert_eq!(calls.last(), Some(&EngineCall::DestroyBook(session.book)));
    assert!(calls.contains(&EngineCall::DestroyRendition(session.rendition)));
    assert!(calls.contains(&EngineCall::Unsubscribe(session.rendition)));
}
