//! Admin console client: session persistence, API client, route guard.
//!
//! The console keeps a copy of the admin token on disk so sessions survive
//! restarts. The [`guard`] module decides what the console shows before any
//! network round-trip; authorization itself always happens server-side.

pub mod api;
pub mod guard;
pub mod session;
