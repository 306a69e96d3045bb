#[cfg(target_os = "linux")]
#[path = "known_dirs/linux.rs"]
mod platform;

pub use platform::{logs, root_runtime, session, settings};
