#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Ambient OS glue shared by the daemon binary: process signal handling and
//! the well-known directories for logs, runtime sockets and carrier-config
//! settings. Everything that binds tunnels to real network devices (TUN
//! interfaces, DNS control, route/interface monitoring) is out of scope —
//! the platform service bindings are external collaborators, not something
//! this crate implements.

pub mod known_dirs;
pub mod signals;

/// Bundle ID used to namespace config/log/runtime directories on disk.
pub const BUNDLE_ID: &str = "dev.iwlan.daemon";
