pub mod fake_epub;
pub mod stub_engine;

pub mod test_helpers {
    use ratatui::{Terminal, backend::TestBackend};

    use crate::engine::Viewport;
    use crate::main_app::App;
    use crate::native_engine::NativeEngine;
    use crate::reader::Reader;
    use crate::session::BookSource;
    use crate::stylesheet::Appearance;

    use super::fake_epub::sample_book;

    pub fn create_test_terminal(width: u16, height: u16) -> Terminal<TestBackend> {
        let backend = TestBackend::new(width, height);
        Terminal::new(backend).unwrap()
    }

    pub fn create_test_app() -> App {
        App::with_reader(Reader::new(
            NativeEngine::new(),
            Viewport::new(60, 20),
            Appearance::default(),
        ))
    }

    pub fn create_test_app_with_sample_book() -> App {
        let mut app = create_test_app();
        app.reader_mut()
            .load(BookSource::Bytes(sample_book()), "sample.epub")
            .unwrap();
        app.reader_mut().pump_events();
        app
    }

    /// Flattens a rendered buffer into one string per row.
    pub fn buffer_lines(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }
}
