//! Capability API table
//!
//! Scripts act on windows exclusively through host functions registered here.
//! The table maps canonical names to handlers and keeps a separate alias table
//! for deprecated or alternative spellings; both are resolved once, when the
//! script engine is created. Every handler receives the window of the
//! in-progress dispatch as an explicit argument.

use std::collections::BTreeMap;
use std::sync::Arc;

use mlua::{Function, IntoLuaMulti, Lua, MultiValue, Value};
use tracing::{debug, warn};
use windlass_events::WindowRef;

use crate::context::CurrentWindow;
use crate::error::CapabilityError;

/// Version of the capability table layout exposed to scripts
pub const CAPABILITY_API_VERSION: u32 = 1;

/// Signature shared by all capability handlers
pub type CapabilityFn =
    Arc<dyn Fn(&Lua, Option<&WindowRef>, MultiValue) -> mlua::Result<MultiValue>>;

/// Table of host functions made available to scripts
#[derive(Clone, Default)]
pub struct CapabilityTable {
    handlers: BTreeMap<&'static str, CapabilityFn>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl CapabilityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the window-independent core accessors
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        register_builtins(&mut table);
        table
    }

    /// Register a handler under its canonical name
    pub fn register<F>(&mut self, name: &'static str, handler: F) -> Result<&mut Self, CapabilityError>
    where
        F: Fn(&Lua, Option<&WindowRef>, MultiValue) -> mlua::Result<MultiValue> + 'static,
    {
        if self.handlers.contains_key(name) || self.aliases.contains_key(name) {
            return Err(CapabilityError::Duplicate(name));
        }
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    /// Make `alias` resolve to the handler registered as `canonical`
    pub fn alias(
        &mut self,
        alias: &'static str,
        canonical: &'static str,
    ) -> Result<&mut Self, CapabilityError> {
        if !self.handlers.contains_key(canonical) {
            return Err(CapabilityError::UnknownCanonical { alias, canonical });
        }
        if self.handlers.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(CapabilityError::Duplicate(alias));
        }
        self.aliases.insert(alias, canonical);
        Ok(self)
    }

    /// Look up a handler by canonical name or alias
    pub fn resolve(&self, name: &str) -> Option<&CapabilityFn> {
        let canonical = self.aliases.get(name).copied().unwrap_or(name);
        self.handlers.get(canonical)
    }

    /// Canonical name an alias points to
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).copied().unwrap_or(name)
    }

    /// Canonical names, sorted
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Number of canonical handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bind every canonical name and alias as a global function in `lua`
    pub(crate) fn install(&self, lua: &Lua, context: &CurrentWindow) -> mlua::Result<()> {
        let globals = lua.globals();

        for (&name, handler) in &self.handlers {
            let function = bind(lua, name, None, Arc::clone(handler), context.clone())?;
            globals.set(name, function)?;
        }

        for (&alias, &canonical) in &self.aliases {
            let handler = Arc::clone(&self.handlers[canonical]);
            let function = bind(lua, alias, Some(canonical), handler, context.clone())?;
            globals.set(alias, function)?;
        }

        debug!(
            target: "scripting",
            "Installed {} capabilities and {} aliases (api v{})",
            self.handlers.len(),
            self.aliases.len(),
            CAPABILITY_API_VERSION
        );
        Ok(())
    }
}

fn bind(
    lua: &Lua,
    name: &'static str,
    canonical: Option<&'static str>,
    handler: CapabilityFn,
    context: CurrentWindow,
) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: MultiValue| {
        if let Some(canonical) = canonical {
            warn!(target: "script", "warning: deprecated function {} called, use {}", name, canonical);
        }
        // Clone out of the slot so a nested dispatch from inside the handler
        // can replace the current window.
        let window = context.get();
        handler(lua, window.as_ref(), args)
    })
}

// ============================================================================
// Argument checks
// ============================================================================

const ARITY_MESSAGES: [&str; 5] = [
    "No indata expected",
    "One indata expected",
    "Two indata expected",
    "Three indata expected",
    "Four indata expected",
];

/// Fail with the conventional message unless exactly `expected` arguments were passed
pub fn check_arity(name: &str, args: &MultiValue, expected: usize) -> mlua::Result<()> {
    if args.len() == expected {
        return Ok(());
    }
    let message = ARITY_MESSAGES.get(expected).copied().unwrap_or("Failed!");
    Err(mlua::Error::RuntimeError(format!("{}: {}", name, message)))
}

// ============================================================================
// Built-in capabilities
// ============================================================================

fn register_builtins(table: &mut CapabilityTable) {
    let builtins: [(&'static str, CapabilityFn); 6] = [
        ("debug_print", Arc::new(debug_print) as CapabilityFn),
        ("get_window_name", Arc::new(get_window_name) as CapabilityFn),
        ("get_window_has_name", Arc::new(get_window_has_name) as CapabilityFn),
        ("get_window_xid", Arc::new(get_window_xid) as CapabilityFn),
        ("get_application_name", Arc::new(get_application_name) as CapabilityFn),
        ("get_window_class", Arc::new(get_window_class) as CapabilityFn),
    ];

    for (name, handler) in builtins {
        table.handlers.insert(name, handler);
    }
}

fn debug_print(lua: &Lua, _window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    let tostring: Function = lua.globals().get("tostring")?;
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        parts.push(tostring.call::<String>(value)?);
    }
    debug!(target: "script", "{}", parts.join("\t"));
    Ok(MultiValue::new())
}

fn get_window_name(lua: &Lua, window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    check_arity("get_window_name", &args, 0)?;
    let name = window.map(|w| w.title()).unwrap_or_default();
    name.into_lua_multi(lua)
}

fn get_window_has_name(lua: &Lua, window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    check_arity("get_window_has_name", &args, 0)?;
    let has_name = window.is_some_and(|w| !w.title().is_empty());
    has_name.into_lua_multi(lua)
}

fn get_window_xid(lua: &Lua, window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    check_arity("get_window_xid", &args, 0)?;
    let xid = window.map(|w| w.id().0 as i64).unwrap_or(0);
    Value::Integer(xid).into_lua_multi(lua)
}

fn get_application_name(lua: &Lua, window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    check_arity("get_application_name", &args, 0)?;
    let name = window.and_then(|w| w.application_name()).unwrap_or_default();
    name.into_lua_multi(lua)
}

fn get_window_class(lua: &Lua, window: Option<&WindowRef>, args: MultiValue) -> mlua::Result<MultiValue> {
    check_arity("get_window_class", &args, 0)?;
    let class = window.and_then(|w| w.class_name()).unwrap_or_default();
    class.into_lua_multi(lua)
}
