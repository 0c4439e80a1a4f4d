//! Login, session endpoints, and the admin authorization gate.

pub mod login;
pub mod principal;
pub mod session;
