//! Streaming wrapper around [`CurveFitter`].
//!
//! Pointer samples arrive one at a time; once enough accumulate the batch is
//! fitted, fully-determined segments are frozen, and the tail of the buffer
//! keeps feeding the still-open segment. A send cursor tracks which frozen
//! segments have already gone out so delta packets carry only new data.

use crate::fit::{BezierSegment, CurveFitter};
use crate::geom::Point;

/// Everything appended since the last send: newly frozen segments plus the
/// raw tail for live preview of the in-progress segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaPacket {
    pub new_finalized_segments: Vec<BezierSegment>,
    pub current_raw_points: Vec<Point>,
}

/// The whole stroke so far, used for late-joiner state sync.
#[derive(Debug, Clone, PartialEq)]
pub struct FullPacket {
    pub finalized_segments: Vec<BezierSegment>,
    pub current_raw_points: Vec<Point>,
}

pub struct IncrementalFitter {
    trigger_count: usize,
    fitter: CurveFitter,
    raw_buffer: Vec<Point>,
    finalized_segments: Vec<BezierSegment>,
    is_drawing: bool,
    sent_count: usize,
}

impl Default for IncrementalFitter {
    fn default() -> Self {
        Self::new(10, CurveFitter::default())
    }
}

impl IncrementalFitter {
    pub fn new(trigger_count: usize, fitter: CurveFitter) -> Self {
        Self {
            trigger_count,
            fitter,
            raw_buffer: Vec::new(),
            finalized_segments: Vec::new(),
            is_drawing: false,
            sent_count: 0,
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.is_drawing
    }

    pub fn finalized_segments(&self) -> &[BezierSegment] {
        &self.finalized_segments
    }

    pub fn raw_buffer(&self) -> &[Point] {
        &self.raw_buffer
    }

    pub fn finalized_count(&self) -> usize {
        self.finalized_segments.len()
    }

    pub fn raw_count(&self) -> usize {
        self.raw_buffer.len()
    }

    /// Begin a new stroke at `start_point`, discarding any previous state.
    pub fn start_drawing(&mut self, start_point: Point) {
        self.is_drawing = true;
        self.raw_buffer.clear();
        self.raw_buffer.push(start_point);
        self.finalized_segments.clear();
        self.sent_count = 0;
    }

    /// Append a sample, fitting the buffer once it reaches the trigger size.
    /// Returns true when one or more segments were frozen.
    pub fn add_point(&mut self, point: Point) -> bool {
        if !self.is_drawing {
            return false;
        }

        self.raw_buffer.push(point);

        if self.raw_buffer.len() >= self.trigger_count {
            self.try_fit_and_freeze()
        } else {
            false
        }
    }

    /// Finish the stroke: fit whatever remains in the buffer and freeze all
    /// of it. Returns true when a final fit ran.
    pub fn end_drawing(&mut self) -> bool {
        if !self.is_drawing {
            return false;
        }
        self.is_drawing = false;

        if self.raw_buffer.len() >= 2 {
            let segments = self.fitter.fit(&self.raw_buffer);
            self.finalized_segments.extend(segments);
            self.raw_buffer.clear();
            return true;
        }
        false
    }

    fn try_fit_and_freeze(&mut self) -> bool {
        if self.raw_buffer.len() < 2 {
            return false;
        }

        let mut segments = self.fitter.fit(&self.raw_buffer);

        if segments.len() < 2 {
            // A single segment stays tentative: the stroke may still extend
            // it smoothly, so nothing is frozen yet.
            return false;
        }

        // Freeze everything but the last segment; that one stays open and
        // gets refit as more samples arrive.
        let open = segments.pop();
        self.finalized_segments.extend(segments);

        // Keep the buffer tail feeding the still-open segment. Its first
        // control point is a copy of an input sample, so the next fit starts
        // exactly at the last frozen endpoint.
        let keep_from = open
            .and_then(|seg| self.raw_buffer.iter().rposition(|p| *p == seg.p0))
            .unwrap_or_else(|| {
                let keep_count = usize::max(3, self.trigger_count / 2);
                self.raw_buffer.len().saturating_sub(keep_count)
            });
        self.raw_buffer.drain(..keep_from);

        true
    }

    /// Segments frozen since the previous call plus the live raw tail, and
    /// advances the send cursor. Calling twice without new data returns an
    /// empty segment list the second time.
    pub fn delta_packet(&mut self) -> DeltaPacket {
        let packet = DeltaPacket {
            new_finalized_segments: self.finalized_segments[self.sent_count..].to_vec(),
            current_raw_points: self.raw_buffer.clone(),
        };
        self.sent_count = self.finalized_segments.len();
        packet
    }

    /// The entire stroke fitted so far. Does not advance the send cursor.
    pub fn full_packet(&self) -> FullPacket {
        FullPacket {
            finalized_segments: self.finalized_segments.clone(),
            current_raw_points: self.raw_buffer.clone(),
        }
    }

    /// Whether a delta packet would carry anything new.
    pub fn has_changes(&self) -> bool {
        self.finalized_segments.len() > self.sent_count || !self.raw_buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.raw_buffer.clear();
        self.finalized_segments.clear();
        self.is_drawing = false;
        self.sent_count = 0;
    }
}
