//! Multi-tab task notes.
//!
//! Every tab owns one session, addressed by a [`model::SessionId`]. Session
//! fields live in a shared key/value store (one key per field) and the
//! active session is mirrored into the tab's shareable URL. The engine
//! reconciles URL and stored state on load, scans the store for every
//! session written by any tab, and debounces edits into storage and the URL.

pub mod cli;
pub mod clock;
pub mod io;
pub mod logging;
pub mod model;
pub mod ops;
pub mod session;
pub mod util;

pub use session::{Session, SessionError};
