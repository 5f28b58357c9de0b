// Reading-surface core
pub mod engine;
pub mod progress;
pub mod reader;
pub mod session;
pub mod stylesheet;
pub mod toc;
pub mod typography;

// Built-in engine and terminal host
pub mod inputs;
pub mod main_app;
pub mod native_engine;
pub mod panic_handler;
pub mod settings;
pub mod theme;
pub mod widget;
pub use widget::navigation_panel;

// Test utilities - only available when test-utils feature is enabled or during tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use main_app::{App, FocusedPanel, MainPanel, PopupWindow, run_app_with_event_source};
pub use reader::{FileIntake, Reader};
