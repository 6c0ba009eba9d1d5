//! End-to-end dispatch tests: real scripts on disk, a custom capability
//! recording what the scripts did, and window events fed through the runner.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use mlua::{IntoLuaMulti, MultiValue};
use tempfile::TempDir;
use windlass_events::{
    EventConsumer, EventEnvelope, EventSource, Window, WindowEvent, WindowId, WindowRef,
};
use windlass_scripting_host::{check_arity, CapabilityTable, ScriptRunner, ScriptingConfig};

#[derive(Debug)]
struct FakeWindow {
    id: u64,
    title: Mutex<String>,
}

impl FakeWindow {
    fn new(id: u64, title: &str) -> Arc<Self> {
        Arc::new(Self {
            id,
            title: Mutex::new(title.to_string()),
        })
    }
}

impl Window for FakeWindow {
    fn id(&self) -> WindowId {
        WindowId(self.id)
    }

    fn title(&self) -> String {
        self.title.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

/// Capabilities with an extra `mark(tag)` recording "<tag>@<window title>"
fn recording_capabilities() -> (CapabilityTable, Rc<RefCell<Vec<String>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);

    let mut table = CapabilityTable::with_builtins();
    table
        .register("mark", move |lua, window, args: MultiValue| {
            check_arity("mark", &args, 1)?;
            let tag: String = lua.unpack(args.into_iter().next().unwrap_or(mlua::Value::Nil))?;
            let title = window.map(|w| w.title()).unwrap_or_default();
            sink.borrow_mut().push(format!("{}@{}", tag, title));
            true.into_lua_multi(lua)
        })
        .unwrap();
    table.alias("set_mark", "mark").unwrap();

    (table, log)
}

fn runner_for(dir: &TempDir, table: CapabilityTable) -> ScriptRunner {
    let config = ScriptingConfig {
        script_dir: Some(dir.path().to_path_buf()),
        script_timeout_ms: 300,
        ..ScriptingConfig::default()
    };
    ScriptRunner::new(&config, table).unwrap()
}

fn send(runner: &mut ScriptRunner, event: WindowEvent) {
    runner.handle_event(EventEnvelope::window_event(event, EventSource::Replay));
}

#[test]
fn test_failing_focus_script_does_not_block_the_next() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a_broken.lua"), "mark(\"a\")\nerror(\"nope\")\nmark(\"never\")").unwrap();
    fs::write(dir.path().join("b_works.lua"), "mark(\"b\")").unwrap();
    fs::write(
        dir.path().join("windlass.lua"),
        "scripts_window_focus = { \"b_works.lua\", \"a_broken.lua\" }",
    )
    .unwrap();

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);

    send(
        &mut runner,
        WindowEvent::ActiveChanged {
            previous: None,
            current: Some(FakeWindow::new(1, "editor")),
        },
    );

    assert_eq!(*log.borrow(), ["a@editor", "b@editor"]);
}

#[test]
fn test_open_scripts_run_in_case_insensitive_order() {
    let dir = TempDir::new().unwrap();
    for name in ["charlie", "Alpha", "bravo"] {
        fs::write(dir.path().join(format!("{}.lua", name)), format!("mark(\"{}\")", name)).unwrap();
    }

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);

    send(&mut runner, WindowEvent::Opened(FakeWindow::new(7, "term")));

    assert_eq!(*log.borrow(), ["Alpha@term", "bravo@term", "charlie@term"]);
}

#[test]
fn test_timeout_skips_to_next_script() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("1_spin.lua"), "mark(\"spin\")\nwhile true do end").unwrap();
    fs::write(dir.path().join("2_after.lua"), "mark(\"after\")").unwrap();

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);

    let report = runner.handle_window_event(WindowEvent::Opened(FakeWindow::new(3, "x")));

    assert_eq!(report.failed, 1);
    assert_eq!(report.ran, 1);
    assert_eq!(*log.borrow(), ["spin@x", "after@x"]);
}

#[test]
fn test_alias_calls_the_same_handler() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("open.lua"), "set_mark(\"old name\")").unwrap();

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);

    send(&mut runner, WindowEvent::Opened(FakeWindow::new(1, "w")));

    assert_eq!(*log.borrow(), ["old name@w"]);
}

#[test]
fn test_duplicate_title_changes_dispatch_once() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("title.lua"), "mark(\"title\")").unwrap();
    fs::write(
        dir.path().join("windlass.lua"),
        "scripts_window_name_change = { \"title.lua\" }",
    )
    .unwrap();

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);

    let window = FakeWindow::new(5, "mail");
    let window_ref: WindowRef = window.clone();
    send(
        &mut runner,
        WindowEvent::ActiveChanged {
            previous: None,
            current: Some(window_ref.clone()),
        },
    );

    for _ in 0..3 {
        send(
            &mut runner,
            WindowEvent::TitleChanged {
                window: window_ref.clone(),
                title: "mail".to_string(),
            },
        );
    }

    assert_eq!(*log.borrow(), ["title@mail"]);
}

#[test]
fn test_close_runs_destruction_list() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bye.lua"), "mark(\"bye\")").unwrap();
    fs::write(dir.path().join("hello.lua"), "mark(\"hello\")").unwrap();
    fs::write(
        dir.path().join("windlass.lua"),
        "scripts_window_close = { \"bye.lua\" }",
    )
    .unwrap();

    let (table, log) = recording_capabilities();
    let mut runner = runner_for(&dir, table);
    let window: WindowRef = FakeWindow::new(2, "doc");

    send(&mut runner, WindowEvent::Opened(window.clone()));
    send(&mut runner, WindowEvent::Closed(window));

    assert_eq!(*log.borrow(), ["hello@doc", "bye@doc"]);
}
