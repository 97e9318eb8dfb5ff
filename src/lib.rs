// Export modules for use in tests
pub mod anchor;
pub mod comments;
pub mod document;
pub mod event_source;
pub mod highlight;
pub mod main_app;
pub mod markdown;
pub mod notification;
pub mod panic_handler;
pub mod parsing;
pub mod reader_view;
pub mod review;
pub mod rich_text;
pub mod session;
pub mod settings;
pub mod signal;
pub mod storage;
pub mod theme;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main app components
pub use main_app::{App, AppAction, run_app_with_event_source};
