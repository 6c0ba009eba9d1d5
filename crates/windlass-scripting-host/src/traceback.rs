use std::fmt::Write as _;

use mlua::{Lua, Value};

/// Header placed above the collected frames
pub const TRACEBACK_HEADER: &str = "stack traceback:";

/// One Lua-source frame of a failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Short source name, normally the script path
    pub source: String,
    pub line: i32,
    /// How the function was reached ("global", "local", "method", "field") or
    /// the function kind ("main", "Lua") when Lua has no name for it
    pub kind: String,
    pub name: String,
}

impl Frame {
    pub fn new(
        source: impl Into<String>,
        line: i32,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            line,
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Render `frames` under [`TRACEBACK_HEADER`].
///
/// A lone frame repeats what the error message already says, so nothing is
/// rendered unless there are at least two.
pub fn format_backtrace(frames: &[Frame]) -> Option<String> {
    if frames.len() < 2 {
        return None;
    }

    let mut out = String::from(TRACEBACK_HEADER);
    for frame in frames {
        let _ = write!(
            out,
            "\n\t{}:{} [{}] {}",
            frame.source, frame.line, frame.kind, frame.name
        );
    }
    Some(out)
}

/// Walk the active stack from the innermost level outward, keeping Lua frames only
pub(crate) fn collect_frames(lua: &Lua) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut level = 0;

    while let Some(debug) = lua.inspect_stack(level) {
        level += 1;

        let source = debug.source();
        if source.what == "C" {
            continue;
        }

        let names = debug.names();
        let name = match (names.name, source.what) {
            (Some(name), _) => name.into_owned(),
            (None, "main") => "main chunk".to_string(),
            (None, _) => "?".to_string(),
        };
        let kind = names
            .name_what
            .filter(|what| !what.is_empty())
            .unwrap_or(source.what);
        let short_src = source
            .short_src
            .map(|s| s.into_owned())
            .unwrap_or_else(|| "?".to_string());

        frames.push(Frame::new(short_src, debug.curr_line(), kind, name));
    }

    frames
}

/// Best textual form of an error value handed to the error handler
pub(crate) fn error_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string_lossy(),
        Value::Error(e) => root_message(e),
        Value::Nil => "nil".to_string(),
        other => format!("{:?}", other),
    }
}

/// Message of the innermost cause, without mlua's wrapping
pub(crate) fn root_message(error: &mlua::Error) -> String {
    match error {
        mlua::Error::CallbackError { cause, .. } => root_message(cause),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_frame_has_no_backtrace() {
        let frames = vec![Frame::new("a.lua", 3, "main", "main chunk")];
        assert_eq!(format_backtrace(&frames), None);
        assert_eq!(format_backtrace(&[]), None);
    }

    #[test]
    fn test_frames_are_rendered_in_order() {
        let frames = vec![
            Frame::new("/scripts/a.lua", 2, "local", "inner"),
            Frame::new("/scripts/a.lua", 5, "main", "main chunk"),
        ];
        let rendered = format_backtrace(&frames).unwrap();
        assert_eq!(
            rendered,
            "stack traceback:\n\t/scripts/a.lua:2 [local] inner\n\t/scripts/a.lua:5 [main] main chunk"
        );
    }

    #[test]
    fn test_root_message_unwraps_callback_errors() {
        let inner = mlua::Error::RuntimeError("get_window_name: No indata expected".to_string());
        let wrapped = mlua::Error::CallbackError {
            traceback: "ignored".to_string(),
            cause: Arc::new(inner),
        };
        assert_eq!(root_message(&wrapped), "get_window_name: No indata expected");
    }

    #[test]
    fn test_error_message_of_string_value() {
        let lua = Lua::new();
        let value = Value::String(lua.create_string("boom").unwrap());
        assert_eq!(error_message(&value), "boom");
        assert_eq!(error_message(&Value::Nil), "nil");
    }
}
