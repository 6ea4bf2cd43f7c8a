//! The scrawl client engine.
//!
//! Three independent loops share this state: the local pointer feeds
//! [`pen::LocalPen`], a 50 ms send tick flushes its delta packets to the
//! relay, and a ~60 Hz ticker advances [`strokes::StrokeStore`] through the
//! hold/fade/timeout schedule. Incoming relay traffic lands in
//! [`handler::MessageHandler`].

pub mod handler;
pub mod net;
pub mod pen;
pub mod state;
pub mod strokes;
