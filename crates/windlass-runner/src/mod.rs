pub mod event_consumer;
pub mod event_loop;
pub mod host;
pub mod logging;
pub mod replay;

pub use event_consumer::{EventConsumer, LoggingConsumer};
pub use event_loop::{EventLoop, EVENT_CHANNEL_CAPACITY};
pub use host::{run_host, HostExit};
pub use replay::{parse_line, run_replay, spawn_stdin_replay, ReplayCommand, ReplayState, ReplayWindow};
