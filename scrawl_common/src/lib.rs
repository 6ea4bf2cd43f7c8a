//! Shared pieces of the scrawl overlay: geometry, Schneider curve fitting,
//! the incremental fitter that feeds it, and the websocket wire protocol.

pub mod fit;
pub mod geom;
pub mod proto;
pub mod stream;

pub use fit::{BezierSegment, CurveFitter};
pub use geom::{NormPoint, Point, SurfaceSize};
pub use stream::{DeltaPacket, FullPacket, IncrementalFitter};
