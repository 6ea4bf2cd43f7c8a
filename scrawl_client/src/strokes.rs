//! Remote stroke lifecycle: Streaming -> Completed -> Holding -> Fading ->
//! Removed, plus the stale-stroke timeout that protects against peers that
//! vanish mid-stroke.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use scrawl_common::geom::NormPoint;
use scrawl_common::proto::NormSegment;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Post-completion decay schedule and the no-updates timeout.
#[derive(Debug, Clone, Copy)]
pub struct FadeConfig {
    /// How long a completed stroke keeps its full alpha.
    pub fade_hold_duration: Duration,
    /// How long the linear alpha ramp to zero takes after the hold.
    pub fade_duration: Duration,
    /// A stroke receiving no events for this long is removed outright,
    /// whatever its fade phase.
    pub timeout_duration: Duration,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fade_hold_duration: Duration::from_secs(2),
            fade_duration: Duration::from_secs(1),
            timeout_duration: Duration::from_secs(10),
        }
    }
}

/// One peer's stroke as mirrored locally. Geometry stays normalized; the
/// drawing surface converts to pixels at render time.
#[derive(Debug, Clone)]
pub struct RemoteStroke {
    pub line_id: String,
    pub user_id: String,
    pub color: String,
    /// Current rendering alpha; rides the hold/fade schedule once the stroke
    /// completes.
    pub alpha: f64,
    pub finalized_segments: Vec<NormSegment>,
    pub current_raw_points: Vec<NormPoint>,
    pub is_complete: bool,
    pub end_time: Option<Instant>,
    pub last_update_time: Instant,
}

impl RemoteStroke {
    fn new(line_id: String, user_id: String, color: String, start_point: NormPoint, now: Instant) -> Self {
        Self {
            line_id,
            user_id,
            color,
            alpha: 1.0,
            finalized_segments: Vec::new(),
            current_raw_points: vec![start_point],
            is_complete: false,
            end_time: None,
            last_update_time: now,
        }
    }
}

/// All remote strokes currently on screen, plus the ids of strokes already
/// removed so late-arriving events for them are silently ignored.
pub struct StrokeStore {
    strokes: HashMap<String, RemoteStroke>,
    removed_ids: HashSet<String>,
    config: FadeConfig,
}

impl StrokeStore {
    pub fn new(config: FadeConfig) -> Self {
        Self {
            strokes: HashMap::new(),
            removed_ids: HashSet::new(),
            config,
        }
    }

    pub fn get(&self, line_id: &str) -> Option<&RemoteStroke> {
        self.strokes.get(line_id)
    }

    pub fn strokes(&self) -> impl Iterator<Item = &RemoteStroke> {
        self.strokes.values()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn is_removed(&self, line_id: &str) -> bool {
        self.removed_ids.contains(line_id)
    }

    pub fn apply_start(
        &mut self,
        line_id: String,
        user_id: String,
        color: String,
        start_point: NormPoint,
        now: Instant,
    ) {
        if self.removed_ids.contains(&line_id) {
            return;
        }
        let stroke = RemoteStroke::new(line_id.clone(), user_id, color, start_point, now);
        self.strokes.insert(line_id, stroke);
    }

    /// Appends newly frozen segments and replaces the live raw tail. Restarts
    /// the stroke's timeout window but never its fade schedule.
    pub fn apply_update(
        &mut self,
        line_id: &str,
        new_segments: Vec<NormSegment>,
        raw_points: Vec<NormPoint>,
        now: Instant,
    ) {
        if self.removed_ids.contains(line_id) {
            return;
        }
        let Some(stroke) = self.strokes.get_mut(line_id) else {
            return;
        };
        stroke.finalized_segments.extend(new_segments);
        stroke.current_raw_points = raw_points;
        stroke.last_update_time = now;
    }

    /// Marks the stroke complete: the raw preview tail disappears and the
    /// hold/fade clock starts.
    pub fn apply_end(&mut self, line_id: &str, now: Instant) {
        if self.removed_ids.contains(line_id) {
            return;
        }
        let Some(stroke) = self.strokes.get_mut(line_id) else {
            return;
        };
        stroke.is_complete = true;
        stroke.current_raw_points.clear();
        stroke.end_time = Some(now);
        stroke.last_update_time = now;
    }

    /// Advances every stroke's state one step. Called at ~60 Hz by the fade
    /// ticker, with `now` passed in so tests can drive it deterministically.
    pub fn tick(&mut self, now: Instant) {
        let config = self.config;
        let mut expired = Vec::new();

        for stroke in self.strokes.values_mut() {
            // Stale strokes are dropped outright, fade or no fade; the peer
            // vanished without a completion event.
            if now.duration_since(stroke.last_update_time) >= config.timeout_duration {
                debug!("stroke {} timed out", stroke.line_id);
                expired.push(stroke.line_id.clone());
                continue;
            }

            let Some(end_time) = stroke.end_time else {
                continue;
            };

            let since_end = now.duration_since(end_time);
            if since_end <= config.fade_hold_duration {
                continue;
            }

            let fading_for = since_end - config.fade_hold_duration;
            if fading_for >= config.fade_duration {
                expired.push(stroke.line_id.clone());
            } else {
                let progress = fading_for.as_secs_f64() / config.fade_duration.as_secs_f64();
                stroke.alpha = 1.0 - progress;
            }
        }

        for line_id in expired {
            self.strokes.remove(&line_id);
            self.removed_ids.insert(line_id);
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.removed_ids.clear();
    }
}

/// Runs [`StrokeStore::tick`] on a fixed interval, independent of network
/// I/O. Abort the returned handle to stop the scheduler; strokes already
/// removed stay removed.
pub fn spawn_fade_ticker(store: Arc<Mutex<StrokeStore>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(16));
        loop {
            interval.tick().await;
            store.lock().await.tick(Instant::now());
        }
    })
}
