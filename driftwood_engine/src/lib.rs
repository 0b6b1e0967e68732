#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]

// Core modules
pub mod bundle;
pub mod command;
pub mod debug;
pub mod event;
pub mod filter;
pub mod host;
pub mod npc;
pub mod object;
pub mod pattern;
pub mod resources;
pub mod restriction;
pub mod run;
pub mod serial;
pub mod state;
pub mod task;
pub mod vars;

// Re-exports for convenience
pub use bundle::Bundle;
pub use filter::PrintFilter;
pub use host::{ConfirmKind, Host, Tag};
pub use run::Session;
pub use state::{Gamestate, ObjectPosition, Openness};
pub use vars::VarValue;

/// Engine version, reported by the `version` library command.
pub const DRIFTWOOD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Adrift emulation level, surfaced through the `%version%` system variable.
pub const ADRIFT_EMULATION: i64 = 4046;
