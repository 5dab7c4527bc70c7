// Gameplay tuning constants. Settings the player can change live in
// `crate::settings`; everything here is fixed at build time.

// Timing windows (song mode). Base widths before assist/flow/tempo scaling.
pub const PERFECT_WINDOW_MS: f64 = 50.0;
pub const GREAT_WINDOW_MS: f64 = 100.0;
pub const GOOD_WINDOW_MS: f64 = 150.0;
pub const MISS_WINDOW_MS: f64 = 200.0;

// Timing assist widens every window by this factor.
pub const ASSIST_WINDOW_MULTIPLIER: f64 = 1.5;

// Scoring: base points per grade (miss scores 0).
pub const SCORE_PERFECT: u32 = 100;
pub const SCORE_GREAT: u32 = 60;
pub const SCORE_GOOD: u32 = 30;

// Combo multiplier table. The multiplier at index i+1 applies once combo
// reaches COMBO_THRESHOLDS[i]; index 0 is the floor below all thresholds.
pub const COMBO_THRESHOLDS: [u32; 4] = [10, 25, 50, 100];
pub const COMBO_MULTIPLIERS: [f64; 5] = [1.0, 1.2, 1.5, 2.0, 3.0];

// Choir meter: one singer joins each time combo lands exactly on a
// threshold; one leaves on every combo break. Cap equals the table length.
pub const CHOIR_THRESHOLDS: [u32; 8] = [5, 10, 15, 20, 30, 40, 50, 75];

// Letter grade bands, half-open [threshold, next).
pub const GRADE_S_ACCURACY: f64 = 0.90;
pub const GRADE_A_ACCURACY: f64 = 0.75;
pub const GRADE_B_ACCURACY: f64 = 0.55;
pub const GRADE_C_ACCURACY: f64 = 0.40;
pub const GRADE_D_ACCURACY: f64 = 0.25;

// Combo breakpoints for the 0-4 backing intensity level.
pub const DYNAMIC_LEVEL_COMBOS: [u32; 4] = [1, 10, 30, 50];

// Phrase mode: per-phrase point values (per phrase, not per character —
// phrase-mode scores are not comparable to song-mode scores).
pub const PHRASE_SCORE_PERFECT: u32 = 300;
pub const PHRASE_SCORE_GREAT: u32 = 250;
pub const PHRASE_SCORE_GOOD: u32 = 200;

// Phrase mode: a gap above this between keystrokes counts as a long pause.
pub const LONG_PAUSE_MS: f64 = 2000.0;

// Phrase mode: grace after the last note of the final phrase, and the
// fallback duration for a phrase with no notes.
pub const LAST_PHRASE_GRACE_MS: f64 = 1000.0;
pub const FALLBACK_PHRASE_DURATION_MS: f64 = 3000.0;

// Practice mode.
pub const PRACTICE_SESSION_MS: u64 = 60_000;
pub const PRACTICE_INITIAL_WORDS: usize = 100;
pub const PRACTICE_REFILL_BATCH: usize = 20;
pub const PRACTICE_REFILL_THRESHOLD: usize = 5;

// Adaptive engine.
pub const WEAK_KEY_ACCURACY_THRESHOLD: f64 = 0.75;
pub const WEAK_KEY_MIN_ATTEMPTS: u32 = 3;
pub const KEY_STAT_WINDOW: u32 = 20;
pub const RECENT_ACCURACY_WINDOW: usize = 50;
pub const WEAK_WORD_BIAS: f64 = 0.7;
