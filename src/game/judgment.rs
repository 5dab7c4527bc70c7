use crate::config::{
    ASSIST_WINDOW_MULTIPLIER, GOOD_WINDOW_MS, GREAT_WINDOW_MS, MISS_WINDOW_MS, PERFECT_WINDOW_MS,
};
use serde::{Deserialize, Serialize};

// Flow mode bounds and step sizes. The controller is hysteresis-based:
// no single grade flips the multiplier, so ambiguous performance cannot
// make the windows oscillate.
const FLOW_MIN: f64 = 0.6;
const FLOW_MAX: f64 = 1.5;
const FLOW_TIGHTEN: f64 = 0.85;
const FLOW_RELAX: f64 = 1.15;
const FLOW_DRIFT: f64 = 0.01;
const FLOW_SAMPLE: usize = 10;
const FLOW_TIGHTEN_COUNT: usize = 8;
const FLOW_RELAX_COUNT: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Perfect,
    Great,
    Good,
    Miss,
}

impl Grade {
    /// Sample-intensity tier for this grade (4 = strongest).
    pub fn dynamic(self) -> u8 {
        match self {
            Grade::Perfect => 4,
            Grade::Great => 3,
            Grade::Good => 2,
            Grade::Miss => 1,
        }
    }

    pub fn is_miss(self) -> bool {
        matches!(self, Grade::Miss)
    }
}

/// Outcome of judging one keystroke. Negative offset = early, positive = late.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimingResult {
    pub grade: Grade,
    pub offset_ms: f64,
    pub dynamic: u8,
}

/// Classifies keystroke offsets into grades against nested timing windows.
///
/// Every window is the base width scaled by
/// `assist * flow / tempo_rate` — timing assist and flow mode widen or
/// tighten all four windows together, and a slowed-down song widens them
/// in proportion.
#[derive(Debug, Clone)]
pub struct TimingEngine {
    perfect_window: f64,
    great_window: f64,
    good_window: f64,
    miss_window: f64,

    assist_multiplier: f64,
    tempo_rate: f64,
    flow_multiplier: f64,
}

impl TimingEngine {
    pub fn new(assist: bool) -> Self {
        let mut engine = Self {
            perfect_window: 0.0,
            great_window: 0.0,
            good_window: 0.0,
            miss_window: 0.0,
            assist_multiplier: if assist { ASSIST_WINDOW_MULTIPLIER } else { 1.0 },
            tempo_rate: 1.0,
            flow_multiplier: 1.0,
        };
        engine.recalc_windows();
        engine
    }

    fn recalc_windows(&mut self) {
        let m = self.assist_multiplier * self.flow_multiplier / self.tempo_rate;
        self.perfect_window = PERFECT_WINDOW_MS * m;
        self.great_window = GREAT_WINDOW_MS * m;
        self.good_window = GOOD_WINDOW_MS * m;
        self.miss_window = MISS_WINDOW_MS * m;
    }

    /// Judge a keystroke at `current_time_ms` against the expected
    /// `note_time_ms`. Ties on a window edge resolve to the better grade.
    pub fn judge(&self, current_time_ms: f64, note_time_ms: f64) -> TimingResult {
        let offset_ms = current_time_ms - note_time_ms;
        let abs_offset = offset_ms.abs();

        let grade = if abs_offset <= self.perfect_window {
            Grade::Perfect
        } else if abs_offset <= self.great_window {
            Grade::Great
        } else if abs_offset <= self.good_window {
            Grade::Good
        } else {
            Grade::Miss
        };

        TimingResult {
            grade,
            offset_ms,
            dynamic: grade.dynamic(),
        }
    }

    pub fn set_assist(&mut self, enabled: bool) {
        self.assist_multiplier = if enabled { ASSIST_WINDOW_MULTIPLIER } else { 1.0 };
        self.recalc_windows();
    }

    /// Windows scale inversely with tempo: slower playback widens them.
    pub fn set_tempo(&mut self, rate: f64) {
        self.tempo_rate = rate;
        self.recalc_windows();
    }

    /// Adjust the flow multiplier from recent grade history. Considers the
    /// most recent ten grades; does nothing until ten are available.
    pub fn adjust_flow(&mut self, recent_grades: &[Grade]) {
        if recent_grades.len() < FLOW_SAMPLE {
            return;
        }
        let last = &recent_grades[recent_grades.len() - FLOW_SAMPLE..];

        let perfect_great = last
            .iter()
            .filter(|g| matches!(g, Grade::Perfect | Grade::Great))
            .count();
        let miss_good = last
            .iter()
            .filter(|g| matches!(g, Grade::Miss | Grade::Good))
            .count();

        if perfect_great >= FLOW_TIGHTEN_COUNT {
            self.flow_multiplier = (self.flow_multiplier * FLOW_TIGHTEN).max(FLOW_MIN);
        } else if miss_good >= FLOW_RELAX_COUNT {
            self.flow_multiplier = (self.flow_multiplier * FLOW_RELAX).min(FLOW_MAX);
        } else {
            self.flow_multiplier += (1.0 - self.flow_multiplier) * FLOW_DRIFT;
        }

        self.recalc_windows();
    }

    /// Current flow multiplier, for UI display.
    pub fn flow_level(&self) -> f64 {
        self.flow_multiplier
    }

    pub fn reset_flow(&mut self) {
        self.flow_multiplier = 1.0;
        self.recalc_windows();
    }

    pub fn good_window_ms(&self) -> f64 {
        self.good_window
    }

    /// The outer window; notes auto-miss once it has elapsed.
    pub fn miss_window_ms(&self) -> f64 {
        self.miss_window
    }
}
