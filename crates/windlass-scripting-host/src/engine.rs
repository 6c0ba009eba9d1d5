//! Script execution supervisor
//!
//! One Lua interpreter serves every run for the life of the process. The only
//! ways in are [`ScriptEngine::load`] and [`ScriptEngine::run`]: runs go through
//! the standard `xpcall` with a native error handler that enriches the error
//! with a backtrace, and a wall-clock watchdog bounds each run.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use mlua::{Function, HookTriggers, Lua, MultiValue, Table, Value, VmState};
use tracing::{debug, warn};

use crate::capability::CapabilityTable;
use crate::context::CurrentWindow;
use crate::error::ScriptError;
use crate::traceback::{collect_frames, error_message, format_backtrace, root_message};
use crate::watchdog::{Watchdog, WatchdogProbe};

/// Wall-clock budget of a single run unless configured otherwise
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Instructions between two watchdog checks
const SAFEPOINT_INSTRUCTIONS: u32 = 1000;

/// A compiled script, ready to run
#[derive(Debug, Clone)]
pub struct LoadedScript {
    path: PathBuf,
    function: Function,
}

impl LoadedScript {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct ScriptEngine {
    lua: Lua,
    /// `xpcall` as it was when the engine was created; scripts may reassign the global
    xpcall: Function,
    error_handler: Function,
    watchdog: Watchdog,
    probe: WatchdogProbe,
    /// Source location where the safepoint hook stopped a timed-out run
    timeout_site: Rc<RefCell<Option<String>>>,
    context: CurrentWindow,
    timeout: Duration,
}

impl ScriptEngine {
    /// Create the interpreter and install `capabilities` into it
    pub fn new(capabilities: &CapabilityTable) -> mlua::Result<Self> {
        Self::with_timeout(capabilities, DEFAULT_SCRIPT_TIMEOUT)
    }

    pub fn with_timeout(capabilities: &CapabilityTable, timeout: Duration) -> mlua::Result<Self> {
        let lua = Lua::new();
        let context = CurrentWindow::new();
        capabilities.install(&lua, &context)?;

        let xpcall: Function = lua.globals().get("xpcall")?;

        let watchdog = Watchdog::new();
        let probe = watchdog.probe();
        let timeout_site = Rc::new(RefCell::new(None));

        let error_handler = create_error_handler(&lua, probe.clone())?;
        install_safepoint(&lua, probe.clone(), Rc::clone(&timeout_site));
        guard_protected_calls(&lua, &probe, &timeout_site)?;

        debug!(target: "scripting", "Script engine ready (timeout {:?})", timeout);

        Ok(Self {
            lua,
            xpcall,
            error_handler,
            watchdog,
            probe,
            timeout_site,
            context,
            timeout,
        })
    }

    /// Interpreter shared by every run
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Current-window slot the capability handlers read
    pub fn context(&self) -> &CurrentWindow {
        &self.context
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Read and compile a script. Nothing runs.
    pub fn load(&self, path: &Path) -> Result<LoadedScript, ScriptError> {
        let source = fs::read(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let function = self
            .lua
            .load(&source[..])
            .set_name(format!("@{}", path.display()))
            .into_function()
            .map_err(|e| ScriptError::Load {
                path: path.to_path_buf(),
                message: root_message(&e),
            })?;

        Ok(LoadedScript {
            path: path.to_path_buf(),
            function,
        })
    }

    /// Run a loaded script under the error handler and the watchdog
    pub fn run(&self, script: &LoadedScript) -> Result<(), ScriptError> {
        self.timeout_site.borrow_mut().take();

        let guard = self.watchdog.arm(self.timeout);
        let result = self.xpcall.call::<(bool, Value)>((
            script.function.clone(),
            self.error_handler.clone(),
        ));
        let timed_out = self.probe.has_fired();
        drop(guard);

        let (ok, error) = result?;
        let site = self.timeout_site.borrow_mut().take();

        // Over budget is a timeout even if the script swallowed the error
        if timed_out {
            return Err(ScriptError::Timeout {
                path: script.path.clone(),
                location: site.unwrap_or_else(|| script.path.display().to_string()),
            });
        }
        if ok {
            return Ok(());
        }

        Err(ScriptError::Runtime {
            path: script.path.clone(),
            message: error_message(&error),
        })
    }

    /// Load and run in one step
    pub fn exec_file(&self, path: &Path) -> Result<(), ScriptError> {
        let script = self.load(path)?;
        self.run(&script)
    }
}

fn create_error_handler(lua: &Lua, probe: WatchdogProbe) -> mlua::Result<Function> {
    lua.create_function(move |lua, error: Value| {
        let message = error_message(&error);
        // A timed-out run reports its location only
        if probe.has_fired() {
            return Ok(message);
        }

        let frames = collect_frames(lua);
        Ok(match format_backtrace(&frames) {
            Some(backtrace) => format!("{}\n{}", message, backtrace),
            None => message,
        })
    })
}

fn install_safepoint(lua: &Lua, probe: WatchdogProbe, timeout_site: Rc<RefCell<Option<String>>>) {
    let triggers = HookTriggers::new().every_nth_instruction(SAFEPOINT_INSTRUCTIONS);

    lua.set_hook(triggers, move |_lua, debug| {
        if !probe.has_fired() {
            return Ok(VmState::Continue);
        }

        let source = debug.source();
        let location = format!(
            "{}:{}",
            source.short_src.as_deref().unwrap_or("?"),
            debug.curr_line()
        );
        warn!(target: "scripting", "{}: script timed out", location);

        let message = format!("{}: script timed out", location);
        *timeout_site.borrow_mut() = Some(location);
        Err(mlua::Error::RuntimeError(message))
    });
}

/// Wrap the script-visible `pcall`, `xpcall` and `coroutine.resume` so a
/// timeout raised inside them is raised again once they return.
fn guard_protected_calls(
    lua: &Lua,
    probe: &WatchdogProbe,
    timeout_site: &Rc<RefCell<Option<String>>>,
) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in ["pcall", "xpcall"] {
        let protected: Function = globals.get(name)?;
        let guarded = rethrow_after_timeout(lua, protected, probe.clone(), Rc::clone(timeout_site))?;
        globals.set(name, guarded)?;
    }

    let coroutine: Table = globals.get("coroutine")?;
    let resume: Function = coroutine.get("resume")?;
    let guarded = rethrow_after_timeout(lua, resume, probe.clone(), Rc::clone(timeout_site))?;
    coroutine.set("resume", guarded)
}

fn rethrow_after_timeout(
    lua: &Lua,
    protected: Function,
    probe: WatchdogProbe,
    timeout_site: Rc<RefCell<Option<String>>>,
) -> mlua::Result<Function> {
    lua.create_function(move |_lua, args: MultiValue| {
        let results: MultiValue = protected.call(args)?;
        if !probe.has_fired() {
            return Ok(results);
        }

        let location = timeout_site
            .borrow()
            .clone()
            .unwrap_or_else(|| "?".to_string());
        Err(mlua::Error::RuntimeError(format!("{}: script timed out", location)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn engine(timeout: Duration) -> ScriptEngine {
        ScriptEngine::with_timeout(&CapabilityTable::with_builtins(), timeout).unwrap()
    }

    #[test]
    fn test_successful_run() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "ok.lua", "ran_ok = true");
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        engine.exec_file(&path).unwrap();
        let ran: bool = engine.lua().globals().get("ran_ok").unwrap();
        assert!(ran);
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "broken.lua", "ran_broken = true\nif then");
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        let err = engine.load(&path).unwrap_err();
        assert!(matches!(err, ScriptError::Load { .. }));
        assert!(err.to_string().contains("broken.lua"));

        // Compilation only; nothing ran
        let ran: Value = engine.lua().globals().get("ran_broken").unwrap();
        assert!(ran.is_nil());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);
        let err = engine.load(&dir.path().join("missing.lua")).unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }

    #[test]
    fn test_single_frame_error_has_no_backtrace() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "fail.lua", "error(\"boom\")");
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        let err = engine.exec_file(&path).unwrap_err();
        let ScriptError::Runtime { message, .. } = &err else {
            panic!("expected runtime error, got {err:?}");
        };
        assert!(message.contains("fail.lua:1: boom"));
        assert!(!message.contains("stack traceback:"));
    }

    #[test]
    fn test_nested_error_has_backtrace() {
        let dir = TempDir::new().unwrap();
        let body = "local function inner()\n  error(\"deep\")\nend\nlocal function outer()\n  inner()\nend\nouter()\n";
        let path = write_script(&dir, "nested.lua", body);
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        let err = engine.exec_file(&path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nested.lua:2: deep"));
        assert!(message.contains("stack traceback:"));
        assert!(message.contains("nested.lua:2 [upvalue] inner"));
        assert!(message.contains("nested.lua:5 [local] outer"));
        assert!(message.contains("nested.lua:7 [main] main chunk"));
    }

    #[test]
    fn test_capability_error_surfaces_message() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "arity.lua", "get_window_name(1)");
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        let err = engine.exec_file(&path).unwrap_err();
        assert!(err.to_string().contains("get_window_name: No indata expected"));
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let dir = TempDir::new().unwrap();
        let path = write_script(&dir, "spin.lua", "while true do end");
        let engine = engine(Duration::from_millis(200));

        let started = Instant::now();
        let err = engine.exec_file(&path).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));

        let ScriptError::Timeout { location, .. } = &err else {
            panic!("expected timeout, got {err:?}");
        };
        assert!(location.contains("spin.lua:1"));
        assert!(err.to_string().ends_with("script timed out"));
        assert!(!err.to_string().contains("stack traceback:"));
    }

    #[test]
    fn test_caught_timeout_still_times_out() {
        let dir = TempDir::new().unwrap();
        let body = "for i = 1, 20 do\n  pcall(function() while true do end end)\nend\nfinished = true";
        let path = write_script(&dir, "swallow.lua", body);
        let engine = engine(Duration::from_millis(100));

        let err = engine.exec_file(&path).unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err:?}");
        let finished: Value = engine.lua().globals().get("finished").unwrap();
        assert!(finished.is_nil());
    }

    #[test]
    fn test_protected_call_loops_are_bounded() {
        let dir = TempDir::new().unwrap();
        let scripts = [
            ("pcall_loop.lua", "while true do pcall(function() while true do end end) end"),
            (
                "xpcall_loop.lua",
                "while true do xpcall(function() while true do end end, function(e) return e end) end",
            ),
            (
                "resume_loop.lua",
                "while true do coroutine.resume(coroutine.create(function() while true do end end)) end",
            ),
        ];
        let engine = engine(Duration::from_millis(100));

        for (name, body) in scripts {
            let path = write_script(&dir, name, body);
            let started = Instant::now();
            let err = engine.exec_file(&path).unwrap_err();
            assert!(started.elapsed() < Duration::from_secs(5), "{name} ran too long");
            assert!(err.is_timeout(), "{name}: expected timeout, got {err:?}");
        }
    }

    #[test]
    fn test_pcall_still_catches_ordinary_errors() {
        let dir = TempDir::new().unwrap();
        let body = "local ok, err = pcall(function() error(\"caught\", 0) end)\ncaught_ok = ok\ncaught_err = err";
        let path = write_script(&dir, "catch.lua", body);
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        engine.exec_file(&path).unwrap();
        let ok: bool = engine.lua().globals().get("caught_ok").unwrap();
        let err: String = engine.lua().globals().get("caught_err").unwrap();
        assert!(!ok);
        assert_eq!(err, "caught");
    }

    #[test]
    fn test_run_under_budget_is_unaffected() {
        let dir = TempDir::new().unwrap();
        let body = "local start = os.clock()\nwhile os.clock() - start < 0.3 do end\nfinished = true";
        let path = write_script(&dir, "busy.lua", body);
        let engine = engine(Duration::from_millis(1000));

        engine.exec_file(&path).unwrap();
        let finished: bool = engine.lua().globals().get("finished").unwrap();
        assert!(finished);
    }

    #[test]
    fn test_engine_usable_after_timeout() {
        let dir = TempDir::new().unwrap();
        let spin = write_script(&dir, "spin.lua", "while true do end");
        let ok = write_script(&dir, "ok.lua", "after_timeout = 1");
        let engine = engine(Duration::from_millis(100));

        assert!(engine.exec_file(&spin).unwrap_err().is_timeout());
        engine.exec_file(&ok).unwrap();
        let value: i64 = engine.lua().globals().get("after_timeout").unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_reassigned_xpcall_does_not_affect_runs() {
        let dir = TempDir::new().unwrap();
        let hijack = write_script(&dir, "hijack.lua", "xpcall = nil");
        let fail = write_script(&dir, "fail.lua", "error(\"still handled\")");
        let engine = engine(DEFAULT_SCRIPT_TIMEOUT);

        engine.exec_file(&hijack).unwrap();
        let err = engine.exec_file(&fail).unwrap_err();
        assert!(err.to_string().contains("still handled"));
    }
}
