use mdreview::comments::{CommentStore, comments_path};
use mdreview::review::ReviewController;
use mdreview::session::Session;
use mdreview::settings::Settings;
use mdreview::signal::{CompletionSignal, ReviewStatus, signal_path};
use mdreview::storage::{FsStorage, MemoryStorage, Storage};
use mdreview::test_utils::test_helpers::*;
use mdreview::{App, run_app_with_event_source};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn write_doc(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

fn app_for(storage: Arc<dyn Storage>, paths: &[PathBuf]) -> App {
    let session = Session::open(storage, paths).unwrap();
    App::with_settings(session, &Settings::default())
}

fn read_signal_file(source: &Path) -> CompletionSignal {
    let content = fs::read_to_string(signal_path(source)).unwrap();
    CompletionSignal::from_json(&content).unwrap()
}

#[test]
fn approve_without_comments_signals_approved() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "# Plan\n\nStep one.\n");
    let mut app = app_for(Arc::new(FsStorage), &[doc.clone()]);
    let mut terminal = create_test_terminal(80, 20);
    let mut events = TestScenarioBuilder::new().press_char('a').build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    let signal = read_signal_file(&doc);
    assert_eq!(signal.status, ReviewStatus::Approved);
    assert_eq!(signal.comment_count, 0);
    assert_eq!(fs::read_to_string(&doc).unwrap(), "# Plan\n\nStep one.\n");
    assert_eq!(fs::read_to_string(comments_path(&doc)).unwrap(), "[]\n");
    assert!(app.should_exit());
    assert_eq!(app.outcomes(), &[(doc, ReviewStatus::Approved)]);
}

#[test]
fn request_changes_with_two_comments() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "Alpha beta gamma.\n\nDelta epsilon.\n");
    let mut app = app_for(Arc::new(FsStorage), &[doc.clone()]);
    let mut terminal = create_test_terminal(80, 20);
    let mut events = TestScenarioBuilder::new()
        .press_char('v')
        .move_right(4)
        .press_char('c')
        .type_text("rename this")
        .press_enter()
        .move_down(2)
        .press_char('v')
        .move_right(4)
        .press_char('c')
        .type_text("why?")
        .press_enter()
        .press_char('r')
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    let signal = read_signal_file(&doc);
    assert_eq!(signal.status, ReviewStatus::ChangesRequested);
    assert_eq!(signal.comment_count, 2);

    let saved = CommentStore::from_json(&fs::read_to_string(comments_path(&doc)).unwrap()).unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].selected_text, "Alpha");
    assert_eq!(saved[0].text, "rename this");
    assert_eq!(saved[0].char_offset, 0);
    assert_eq!(saved[1].selected_text, "Delta");
    assert_eq!(saved[1].char_offset, 19);
    assert_eq!(saved[1].line_number, Some(3));
}

#[test]
fn mouse_drag_comment_then_quit_writes_no_signal() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "notes.md", "hello world\n");
    let mut app = app_for(Arc::new(FsStorage), &[doc.clone()]);
    let mut terminal = create_test_terminal(80, 20);
    // Content text starts inside the pane border at (1, 2).
    let mut events = TestScenarioBuilder::new()
        .drag((7, 2), (11, 2))
        .press_char('c')
        .type_text("more detail")
        .press_enter()
        .quit()
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    let saved = CommentStore::load(&FsStorage, &doc);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved.all()[0].selected_text, "world");
    assert!(!signal_path(&doc).exists());

    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("1. \"world\""), "{screen}");
    assert!(screen.contains("more detail"), "{screen}");
}

#[test]
fn failed_save_keeps_document_open_and_unsignaled() {
    let source = Path::new("/docs/plan.md");
    let storage = Arc::new(MemoryStorage::new().with_file(source, "# Plan\n"));
    storage.fail_writes_to(comments_path(source));
    let mut app = app_for(storage.clone(), &[source.to_path_buf()]);
    let mut terminal = create_test_terminal(100, 20);
    let mut events = TestScenarioBuilder::new().press_char('a').quit().build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert!(!storage.exists(&signal_path(source)));
    assert!(!app.should_exit());
    assert!(app.outcomes().is_empty());

    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("plan.md*"), "{screen}");
    assert!(screen.contains("failed to save comments"), "{screen}");
}

#[test]
fn tabs_switch_and_finished_tabs_close() {
    let dir = TempDir::new().unwrap();
    let first = write_doc(&dir, "first.md", "one\n");
    let second = write_doc(&dir, "second.md", "two\n");
    let mut app = app_for(Arc::new(FsStorage), &[first.clone(), second.clone()]);
    let mut terminal = create_test_terminal(80, 20);
    let mut events = TestScenarioBuilder::new()
        .press_tab()
        .press_char('a')
        .quit()
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert!(signal_path(&second).exists());
    assert!(!signal_path(&first).exists());
    assert_eq!(app.session().len(), 1);
    assert_eq!(app.session().active().unwrap().path(), first.as_path());

    let screen = capture_terminal_state(&terminal);
    let tab_row = screen.lines().next().unwrap();
    assert!(tab_row.contains("first.md"), "{screen}");
    assert!(!tab_row.contains("second.md"), "{screen}");
}

#[test]
fn editing_a_highlight_updates_its_comment() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "hello world\n");
    let mut store = CommentStore::new();
    store.add("old", "world", 6).unwrap();
    store.save(&FsStorage, &doc).unwrap();

    let mut app = app_for(Arc::new(FsStorage), &[doc.clone()]);
    let mut terminal = create_test_terminal(80, 20);
    let mut events = TestScenarioBuilder::new()
        .press_char(']')
        .press_enter()
        .type_text(" and new")
        .press_enter()
        .quit()
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    let saved = CommentStore::load(&FsStorage, &doc);
    assert_eq!(saved.all()[0].text, "old and new");
}

#[test]
fn edited_source_is_saved_before_signal() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "draft\n");
    let mut controller = ReviewController::open(Arc::new(FsStorage), &doc).unwrap();

    controller.set_source("final\n");
    controller.approve().unwrap();

    assert_eq!(fs::read_to_string(&doc).unwrap(), "final\n");
    assert_eq!(read_signal_file(&doc).status, ReviewStatus::Approved);
}

#[test]
fn orphaned_comment_is_deleted_from_the_panel() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "hello world\n");
    let mut store = CommentStore::new();
    store.add("outdated", "paragraph that was removed", 40).unwrap();
    store.save(&FsStorage, &doc).unwrap();

    let mut app = app_for(Arc::new(FsStorage), &[doc.clone()]);
    let mut terminal = create_test_terminal(100, 20);
    let mut events = TestScenarioBuilder::new()
        .press_char('n')
        .press_enter()
        .press_ctrl_char('d')
        .quit()
        .build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    assert!(CommentStore::load(&FsStorage, &doc).is_empty());
    assert_eq!(app.focused_comment(), None);
    assert!(!signal_path(&doc).exists());
}

#[test]
fn focused_panel_entry_is_marked() {
    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "plan.md", "hello world\n");
    let mut store = CommentStore::new();
    store.add("gone", "missing text", 0).unwrap();
    store.save(&FsStorage, &doc).unwrap();

    let mut app = app_for(Arc::new(FsStorage), &[doc]);
    let mut terminal = create_test_terminal(120, 20);
    let mut events = TestScenarioBuilder::new().press_char('n').quit().build();

    run_app_with_event_source(&mut terminal, &mut app, &mut events).unwrap();

    let screen = capture_terminal_state(&terminal);
    assert!(screen.contains("> 1. \"missing text\" [orphaned]"), "{screen}");
}
