//! Import progress reporting.
//!
//! Progress is delivered through a callback that can be wired to a CLI
//! progress line, a log, or a server-sent event stream.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Progress callback for imports.
pub type ImportProgressCallback = Arc<dyn Fn(ImportProgress) + Send + Sync>;

/// Minimum time between two updates within a phase.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Phase of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    /// Decoding the file
    Decode,
    /// Loading tileset textures
    Prefetch,
    /// Rendering and storing grids
    Render,
    /// Building zoom levels
    Pyramid,
    /// Uploading markers
    Markers,
}

impl ImportPhase {
    pub const ALL: [ImportPhase; 5] = [
        ImportPhase::Decode,
        ImportPhase::Prefetch,
        ImportPhase::Render,
        ImportPhase::Pyramid,
        ImportPhase::Markers,
    ];

    /// Share of overall progress, in percent.
    pub fn weight(&self) -> f64 {
        match self {
            Self::Decode => 2.0,
            Self::Prefetch => 18.0,
            Self::Render => 60.0,
            Self::Pyramid => 15.0,
            Self::Markers => 5.0,
        }
    }

    /// One-based position of the phase.
    pub fn number(&self) -> usize {
        match self {
            Self::Decode => 1,
            Self::Prefetch => 2,
            Self::Render => 3,
            Self::Pyramid => 4,
            Self::Markers => 5,
        }
    }

    /// Percent of overall progress completed before this phase starts.
    pub fn base_percent(&self) -> f64 {
        Self::ALL
            .iter()
            .take_while(|p| *p != self)
            .map(|p| p.weight())
            .sum()
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Decode => "Decoding",
            Self::Prefetch => "Loading textures",
            Self::Render => "Rendering grids",
            Self::Pyramid => "Building zoom levels",
            Self::Markers => "Importing markers",
        }
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    /// Items completed in this phase
    pub current: usize,
    /// Items in this phase
    pub total: usize,
    /// Item just completed, if meaningful
    pub item_name: Option<String>,
    pub phase_number: usize,
    pub phase_count: usize,
    /// Overall completion, 0-100
    pub overall_percent: f64,
    pub elapsed_secs: f64,
    /// Throughput within the current phase
    pub items_per_second: f64,
}

struct ReporterState {
    phase: Option<ImportPhase>,
    phase_started: Instant,
    last_emit: Option<Instant>,
}

/// Throttles progress updates to at most one per [`PROGRESS_INTERVAL`],
/// always passing the first and last item of a phase.
pub struct ProgressReporter {
    callback: Option<ImportProgressCallback>,
    started: Instant,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ImportProgressCallback>) -> Self {
        let now = Instant::now();
        Self {
            callback,
            started: now,
            state: Mutex::new(ReporterState {
                phase: None,
                phase_started: now,
                last_emit: None,
            }),
        }
    }

    /// Reports `current` of `total` items done in `phase`.
    ///
    /// Returns whether the update was delivered.
    pub fn report(
        &self,
        phase: ImportPhase,
        current: usize,
        total: usize,
        item_name: Option<&str>,
    ) -> bool {
        let Some(callback) = &self.callback else {
            return false;
        };
        let now = Instant::now();

        let progress = {
            let mut state = self.state.lock();
            if state.phase != Some(phase) {
                state.phase = Some(phase);
                state.phase_started = now;
                state.last_emit = None;
            }
            let boundary = current <= 1 || current >= total;
            let due = state
                .last_emit
                .map_or(true, |last| now.duration_since(last) >= PROGRESS_INTERVAL);
            if !boundary && !due {
                return false;
            }
            state.last_emit = Some(now);

            let fraction = if total == 0 {
                1.0
            } else {
                (current.min(total)) as f64 / total as f64
            };
            let phase_secs = now.duration_since(state.phase_started).as_secs_f64();
            ImportProgress {
                phase,
                current,
                total,
                item_name: item_name.map(str::to_string),
                phase_number: phase.number(),
                phase_count: ImportPhase::ALL.len(),
                overall_percent: phase.base_percent() + phase.weight() * fraction,
                elapsed_secs: now.duration_since(self.started).as_secs_f64(),
                items_per_second: if phase_secs > 0.0 {
                    current as f64 / phase_secs
                } else {
                    0.0
                },
            }
        };

        callback(progress);
        true
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting() -> (ProgressReporter, Arc<Mutex<Vec<ImportProgress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Some(Arc::new(move |p| sink.lock().push(p))));
        (reporter, seen)
    }

    #[test]
    fn test_phase_weights_sum_to_100() {
        let total: f64 = ImportPhase::ALL.iter().map(|p| p.weight()).sum();
        assert_eq!(total, 100.0);
        assert_eq!(ImportPhase::Render.base_percent(), 20.0);
        assert_eq!(ImportPhase::Markers.base_percent(), 95.0);
    }

    #[test]
    fn test_throttles_middle_items() {
        let (reporter, seen) = collecting();
        let mut delivered = 0;
        for i in 1..=1000 {
            if reporter.report(ImportPhase::Render, i, 1000, None) {
                delivered += 1;
            }
        }
        // first and last always pass; the loop runs far faster than 100ms
        assert!(delivered >= 2);
        assert!(delivered < 50);
        let seen = seen.lock();
        assert_eq!(seen.first().unwrap().current, 1);
        assert_eq!(seen.last().unwrap().current, 1000);
        assert_eq!(seen.last().unwrap().overall_percent, 80.0);
    }

    #[test]
    fn test_new_phase_resets_throttle() {
        let (reporter, seen) = collecting();
        assert!(reporter.report(ImportPhase::Decode, 1, 1, None));
        assert!(reporter.report(ImportPhase::Prefetch, 1, 10, Some("gfx/tiles/grass")));
        let seen = seen.lock();
        assert_eq!(seen[1].phase_number, 2);
        assert_eq!(seen[1].phase_count, 5);
        assert_eq!(seen[1].item_name.as_deref(), Some("gfx/tiles/grass"));
        assert!((seen[1].overall_percent - 3.8).abs() < 1e-9);
    }

    #[test]
    fn test_without_callback_nothing_is_delivered() {
        let reporter = ProgressReporter::new(None);
        assert!(!reporter.report(ImportPhase::Decode, 1, 1, None));
    }
}
