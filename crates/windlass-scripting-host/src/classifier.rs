//! Builds a [`Classification`] from the scripts directory.
//!
//! The bootstrap file may claim scripts for the close, focus, blur and
//! title-change categories through four global tables. Every other script in
//! the directory runs when a window opens.

use std::cmp::Ordering;
use std::fs;
use std::path::{Component, Path, PathBuf};

use mlua::Value;
use tracing::{debug, info, warn};
use windlass_events::EventCategory;

use crate::engine::ScriptEngine;
use crate::error::ClassifyError;

/// Extension a file needs to be considered a script
pub const SCRIPT_EXTENSION: &str = "lua";

/// Globals read from the bootstrap file, and the category each one fills
pub const BOOTSTRAP_LISTS: [(&str, EventCategory); 4] = [
    ("scripts_window_close", EventCategory::Destruction),
    ("scripts_window_focus", EventCategory::FocusGained),
    ("scripts_window_blur", EventCategory::FocusLost),
    ("scripts_window_name_change", EventCategory::TitleChanged),
];

/// Immutable mapping of every category to its ordered script list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    lists: [Vec<PathBuf>; 5],
}

impl Classification {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the list of `category`, sorting it
    pub fn with_scripts(mut self, category: EventCategory, mut scripts: Vec<PathBuf>) -> Self {
        sort_scripts(&mut scripts);
        self.lists[category.index()] = scripts;
        self
    }

    /// Scripts to run for `category`, in execution order
    pub fn scripts(&self, category: EventCategory) -> &[PathBuf] {
        &self.lists[category.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Number of script entries across all categories
    pub fn total(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventCategory, &[PathBuf])> + '_ {
        EventCategory::ALL
            .into_iter()
            .map(move |category| (category, self.scripts(category)))
    }

    /// Print every non-empty list for the operator
    pub fn log_lists(&self, script_dir: &Path) {
        for (category, scripts) in self.iter() {
            if scripts.is_empty() {
                continue;
            }
            info!(
                target: "scripting",
                "List of Lua files handling \"{}\" events in folder {}:",
                category,
                script_dir.display()
            );
            for script in scripts {
                info!(target: "scripting", "    {}", display_name(script));
            }
        }
    }
}

/// Build a classification for the directory containing `bootstrap`.
///
/// If the bootstrap file exists it is run once in `engine`, under the engine's
/// normal timeout, purely to read the [`BOOTSTRAP_LISTS`] globals.
pub fn classify(bootstrap: &Path, engine: &ScriptEngine) -> Result<Classification, ClassifyError> {
    let script_dir = match bootstrap.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !script_dir.is_dir() {
        return Err(ClassifyError::DirectoryNotFound(script_dir));
    }

    let mut classification = Classification::empty();
    let mut claimed: Vec<PathBuf> = Vec::new();

    if bootstrap.is_file() {
        debug!(target: "scripting", "Reading script lists from {}", bootstrap.display());
        let lists = read_bootstrap(bootstrap, &script_dir, engine)?;
        for (category, scripts) in lists {
            claimed.extend(scripts.iter().cloned());
            classification = classification.with_scripts(category, scripts);
        }
    }

    let entries = fs::read_dir(&script_dir).map_err(|source| ClassifyError::Io {
        path: script_dir.clone(),
        source,
    })?;

    let bootstrap_entry = bootstrap
        .file_name()
        .map(|name| script_dir.join(name))
        .unwrap_or_else(|| bootstrap.to_path_buf());

    let mut creation = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ClassifyError::Io {
            path: script_dir.clone(),
            source,
        })?;
        let path = entry.path();

        if !is_script_file(&path) || path.is_dir() {
            continue;
        }
        if same_script(&path, &bootstrap_entry) || claimed.iter().any(|c| same_script(c, &path)) {
            continue;
        }
        creation.push(path);
    }
    classification = classification.with_scripts(EventCategory::Creation, creation);

    if classification.is_empty() {
        info!(
            target: "scripting",
            "No script files found in the script folder {}",
            script_dir.display()
        );
    }

    Ok(classification)
}

/// Run the bootstrap and collect its lists. The list globals are cleared before
/// and after the run so nothing leaks into the next classification.
fn read_bootstrap(
    bootstrap: &Path,
    script_dir: &Path,
    engine: &ScriptEngine,
) -> Result<Vec<(EventCategory, Vec<PathBuf>)>, ClassifyError> {
    let bootstrap_error = |message: String| ClassifyError::Bootstrap {
        path: bootstrap.to_path_buf(),
        message,
    };

    clear_list_globals(engine).map_err(|e| bootstrap_error(e.to_string()))?;

    let result = engine
        .exec_file(bootstrap)
        .map_err(|e| bootstrap_error(e.to_string()))
        .and_then(|()| {
            BOOTSTRAP_LISTS
                .iter()
                .map(|&(global, category)| {
                    read_list(engine, global, script_dir).map(|scripts| (category, scripts))
                })
                .collect::<mlua::Result<Vec<_>>>()
                .map_err(|e| bootstrap_error(e.to_string()))
        });

    clear_list_globals(engine).map_err(|e| bootstrap_error(e.to_string()))?;
    result
}

fn read_list(engine: &ScriptEngine, global: &str, script_dir: &Path) -> mlua::Result<Vec<PathBuf>> {
    let value: Value = engine.lua().globals().get(global)?;
    let Value::Table(table) = value else {
        return Ok(Vec::new());
    };

    let mut scripts = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        let (_, value) = pair?;
        let Value::String(name) = value else {
            continue;
        };
        let name = name.to_string_lossy();
        match resolve_listed_script(script_dir, &name) {
            Some(path) => scripts.push(path),
            None => warn!(
                target: "scripting",
                "Ignoring {:?} in {}: not a script file inside {}",
                name,
                global,
                script_dir.display()
            ),
        }
    }
    Ok(scripts)
}

/// Resolve a name listed by the bootstrap against the scripts directory.
///
/// `None` for absolute names, names leaving the directory through `..`, and
/// anything [`is_script_file`] rejects.
fn resolve_listed_script(script_dir: &Path, name: &str) -> Option<PathBuf> {
    let mut path = script_dir.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    is_script_file(&path).then_some(path)
}

fn clear_list_globals(engine: &ScriptEngine) -> mlua::Result<()> {
    let globals = engine.lua().globals();
    for (global, _) in BOOTSTRAP_LISTS {
        globals.set(global, Value::Nil)?;
    }
    Ok(())
}

/// Visible file ending in the script extension
pub fn is_script_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return false;
    };
    !name.starts_with('.')
        && path
            .extension()
            .is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

/// Case-insensitive by file name, exact byte order as tie-break
pub fn compare_scripts(a: &Path, b: &Path) -> Ordering {
    let a_name = display_name(a).to_ascii_lowercase();
    let b_name = display_name(b).to_ascii_lowercase();
    a_name
        .cmp(&b_name)
        .then_with(|| a.as_os_str().cmp(b.as_os_str()))
}

pub fn sort_scripts(scripts: &mut [PathBuf]) {
    scripts.sort_by(|a, b| compare_scripts(a, b));
}

/// Component-wise path equality, ignoring ASCII case
fn same_script(a: &Path, b: &Path) -> bool {
    a.components().count() == b.components().count()
        && a.components().zip(b.components()).all(|(x, y)| {
            x.as_os_str()
                .to_string_lossy()
                .eq_ignore_ascii_case(&y.as_os_str().to_string_lossy())
        })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
