//! Local drawing capture: pointer samples in, wire messages out.
//!
//! The pointer loop calls `begin`/`sample`/`finish`; an independent 50 ms
//! send tick calls `flush`. The fitter's delta cursor is the single source of
//! truth for what has been sent, so a tick landing mid-stroke never
//! duplicates or drops a segment.

use std::sync::Arc;

use nanoid::nanoid;
use scrawl_common::geom::{Point, SurfaceSize};
use scrawl_common::proto::{ClientMessage, NormSegment};
use scrawl_common::stream::IncrementalFitter;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Duration;

/// The cadence at which in-progress strokes are flushed to the relay.
pub const SEND_INTERVAL: Duration = Duration::from_millis(50);

pub struct LocalPen {
    fitter: IncrementalFitter,
    surface: SurfaceSize,
    user_id: String,
    color: String,
    line_id: Option<String>,
}

impl LocalPen {
    pub fn new(user_id: String, color: String, surface: SurfaceSize) -> Self {
        Self {
            fitter: IncrementalFitter::default(),
            surface,
            user_id,
            color,
            line_id: None,
        }
    }

    pub fn with_fitter(
        user_id: String,
        color: String,
        surface: SurfaceSize,
        fitter: IncrementalFitter,
    ) -> Self {
        Self {
            fitter,
            surface,
            user_id,
            color,
            line_id: None,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.fitter.is_drawing()
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: String) {
        self.color = color;
    }

    /// The resize notification from the drawing surface. Only affects the
    /// normalization of packets built after the change.
    pub fn set_surface(&mut self, surface: SurfaceSize) {
        self.surface = surface;
    }

    /// Announces a pen-style change to the session.
    pub fn color_change_message(&self, alpha: f64) -> ClientMessage {
        ClientMessage::ColorChange {
            user_id: self.user_id.clone(),
            color: self.color.clone(),
            alpha,
        }
    }

    /// Pointer down: starts a fresh stroke under a new line id.
    pub fn begin(&mut self, point: Point) -> ClientMessage {
        let line_id = nanoid!();
        self.line_id = Some(line_id.clone());
        self.fitter.start_drawing(point);

        ClientMessage::DrawingStart {
            line_id,
            user_id: self.user_id.clone(),
            color: self.color.clone(),
            start_point: point.to_norm(self.surface),
        }
    }

    /// Pointer move: feeds the incremental fitter.
    pub fn sample(&mut self, point: Point) {
        self.fitter.add_point(point);
    }

    /// Builds the next delta update, or `None` when nothing changed since the
    /// last flush.
    pub fn flush(&mut self) -> Option<ClientMessage> {
        let line_id = self.line_id.clone()?;
        if !self.fitter.has_changes() {
            return None;
        }

        let delta = self.fitter.delta_packet();
        Some(ClientMessage::DrawingUpdate {
            line_id,
            user_id: self.user_id.clone(),
            new_finalized_segments: delta
                .new_finalized_segments
                .iter()
                .map(|seg| NormSegment::from_pixel(seg, self.surface))
                .collect(),
            current_raw_points: delta
                .current_raw_points
                .iter()
                .map(|p| p.to_norm(self.surface))
                .collect(),
        })
    }

    /// Pointer up: runs the final fit, then emits the last delta update and
    /// the end-of-stroke message.
    pub fn finish(&mut self) -> Vec<ClientMessage> {
        if !self.fitter.is_drawing() {
            return Vec::new();
        }

        let mut messages = Vec::new();
        self.fitter.end_drawing();

        if let Some(update) = self.flush() {
            messages.push(update);
        }
        if let Some(line_id) = self.line_id.take() {
            messages.push(ClientMessage::DrawingEnd {
                line_id,
                user_id: self.user_id.clone(),
            });
        }
        messages
    }
}

/// The throttled network-send loop: every 50 ms, flush whatever the pen has
/// accumulated into `outgoing`. Exits when the outgoing channel closes.
pub async fn run_send_loop(pen: Arc<Mutex<LocalPen>>, outgoing: mpsc::UnboundedSender<ClientMessage>) {
    let mut interval = tokio::time::interval(SEND_INTERVAL);
    loop {
        interval.tick().await;
        if outgoing.is_closed() {
            break;
        }
        let update = pen.lock().await.flush();
        if let Some(update) = update
            && outgoing.send(update).is_err()
        {
            break;
        }
    }
}
