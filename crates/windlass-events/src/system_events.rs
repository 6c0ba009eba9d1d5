/// Why a script reload was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadReason {
    /// An entry was created, removed or renamed in the scripts directory
    DirectoryChanged,
    /// The bootstrap file's contents changed
    BootstrapChanged,
    /// Reload requested by the operator (SIGUSR2 or replay input)
    Manual,
}

#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Rebuild the script classification from disk
    ReloadScripts { reason: ReloadReason },
    /// Stop the event loop
    Shutdown,
}
