//! The scrawl relay: session registry, websocket fan-out, and the background
//! reaper for abandoned sessions.

pub mod registry;
pub mod session;
pub mod socket;
