//! Evaluation statistics. A sum type rather than a trait object: only two
//! implementations ever exist, and matching avoids a vtable on a hot path
//! that runs once per evaluation pass.

use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub frontier_size: usize,
    pub closure_size: usize,
    pub scc_count: usize,
    pub largest_scc: usize,
    pub cells_evaluated: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct LiveStatsRecorder {
    pub passes: Vec<PassStats>,
}

impl LiveStatsRecorder {
    pub fn record(&mut self, stats: PassStats) {
        self.passes.push(stats);
    }

    pub fn total_cells_evaluated(&self) -> usize {
        self.passes.iter().map(|p| p.cells_evaluated).sum()
    }
}

/// Either a real recorder or a no-op stand-in, selected once from
/// `EngineConfig::use_stats` at engine construction time.
#[derive(Debug, Clone)]
pub enum StatsRecorder {
    Live(LiveStatsRecorder),
    NoOp,
}

impl StatsRecorder {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            StatsRecorder::Live(LiveStatsRecorder::default())
        } else {
            StatsRecorder::NoOp
        }
    }

    pub fn record(&mut self, stats: PassStats) {
        if let StatsRecorder::Live(rec) = self {
            rec.record(stats);
        }
    }

    pub fn passes(&self) -> &[PassStats] {
        match self {
            StatsRecorder::Live(rec) => &rec.passes,
            StatsRecorder::NoOp => &[],
        }
    }
}
