use crate::config::{
    PRACTICE_INITIAL_WORDS, PRACTICE_REFILL_BATCH, PRACTICE_REFILL_THRESHOLD, PRACTICE_SESSION_MS,
};
use crate::game::PlayState;
use crate::game::adaptive::{AdaptiveEngine, KeyCounter};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A practice lesson: the keys it drills and the word bank to draw from.
/// Content is external input, loaded from JSON like beatmaps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub description: String,
    pub keys: Vec<char>,
    pub word_pool: Vec<String>,
    pub unlock_level: u32,
}

impl Lesson {
    pub fn from_json(json: &str) -> Result<Lesson, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Final aggregate for one practice session. Emitted exactly once, on the
/// session clock running out — never on an external stop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeResult {
    pub lesson_id: String,
    pub words_completed: usize,
    pub total_chars: u32,
    pub correct_chars: u32,
    pub incorrect_chars: u32,
    pub wpm: u32,
    pub accuracy: f64,
    pub per_key_stats: HashMap<char, KeyCounter>,
    pub duration_ms: f64,
}

pub trait PracticeEvents {
    fn on_correct_key(&mut self, _key: char, _char_index: usize, _word_index: usize) {}
    fn on_wrong_key(
        &mut self,
        _pressed: char,
        _expected: char,
        _char_index: usize,
        _word_index: usize,
    ) {
    }
    fn on_word_complete(&mut self, _word_index: usize, _word: &str) {}
    fn on_new_word(&mut self, _word_index: usize, _word: &str) {}
    fn on_complete(&mut self, _result: &PracticeResult) {}
}

/// Beatmap-free typing tutor: a fixed-duration session over a word stream
/// the adaptive engine keeps biased toward the player's weak keys. No
/// timing judgment — accuracy and WPM only.
pub struct PracticePlayer {
    adaptive: AdaptiveEngine,
    lesson: Option<Lesson>,
    state: PlayState,

    words: Vec<String>,
    word_index: usize,
    char_index: usize,

    correct_chars: u32,
    incorrect_chars: u32,
    per_key_stats: HashMap<char, KeyCounter>,
    started_at: Option<Instant>,
    duration: Duration,
}

impl Default for PracticePlayer {
    fn default() -> Self {
        Self::new(Duration::from_millis(PRACTICE_SESSION_MS))
    }
}

impl PracticePlayer {
    pub fn new(duration: Duration) -> Self {
        Self {
            adaptive: AdaptiveEngine::new(),
            lesson: None,
            state: PlayState::Idle,
            words: Vec::new(),
            word_index: 0,
            char_index: 0,
            correct_chars: 0,
            incorrect_chars: 0,
            per_key_stats: HashMap::new(),
            started_at: None,
            duration,
        }
    }

    fn generate_words(&self, count: usize) -> Vec<String> {
        let Some(lesson) = &self.lesson else {
            return Vec::new();
        };
        (0..count)
            .filter_map(|_| self.adaptive.pick_word(&lesson.word_pool))
            .map(String::from)
            .collect()
    }

    pub fn load_lesson(&mut self, lesson: Lesson) {
        info!(
            "loaded lesson '{}': {} words in pool",
            lesson.id,
            lesson.word_pool.len()
        );
        self.adaptive.reset();
        self.lesson = Some(lesson);
        self.words = self.generate_words(PRACTICE_INITIAL_WORDS);
        self.word_index = 0;
        self.char_index = 0;
        self.correct_chars = 0;
        self.incorrect_chars = 0;
        self.per_key_stats.clear();
        self.started_at = None;
        self.state = if self.words.is_empty() {
            PlayState::Idle
        } else {
            PlayState::Loaded
        };
    }

    pub fn start(&mut self, events: &mut dyn PracticeEvents) {
        if self.state != PlayState::Loaded {
            return;
        }
        self.state = PlayState::Playing;
        self.started_at = Some(Instant::now());
        events.on_new_word(0, &self.words[0]);
    }

    /// Caller-driven tick; completes the session once the duration has
    /// elapsed. Stopping before expiry never produces a result.
    pub fn update(&mut self, events: &mut dyn PracticeEvents) {
        if self.state != PlayState::Playing {
            return;
        }
        let elapsed = self.started_at.map(|at| at.elapsed()).unwrap_or_default();
        if elapsed >= self.duration {
            self.complete(events);
        }
    }

    pub fn handle_keystroke(&mut self, key: char, events: &mut dyn PracticeEvents) {
        if self.state != PlayState::Playing {
            return;
        }
        let Some(word) = self.words.get(self.word_index).cloned() else {
            return;
        };
        let Some(expected) = word.chars().nth(self.char_index) else {
            return;
        };

        if key == expected {
            self.correct_chars += 1;
            self.per_key_stats.entry(expected).or_default().hits += 1;
            self.adaptive.record(expected, true);
            events.on_correct_key(key, self.char_index, self.word_index);
            self.char_index += 1;

            if self.char_index >= word.chars().count() {
                events.on_word_complete(self.word_index, &word);
                self.word_index += 1;
                self.char_index = 0;

                // Keep the stream ahead of the cursor; the refill draws on
                // whatever the engine has learned so far.
                if self.word_index + PRACTICE_REFILL_THRESHOLD >= self.words.len() {
                    let refill = self.generate_words(PRACTICE_REFILL_BATCH);
                    self.words.extend(refill);
                }

                if let Some(next) = self.words.get(self.word_index).cloned() {
                    events.on_new_word(self.word_index, &next);
                }
            }
        } else {
            self.incorrect_chars += 1;
            self.per_key_stats.entry(expected).or_default().misses += 1;
            self.adaptive.record(expected, false);
            events.on_wrong_key(key, expected, self.char_index, self.word_index);
        }
    }

    fn complete(&mut self, events: &mut dyn PracticeEvents) {
        self.state = PlayState::Completed;

        let elapsed_ms = self
            .started_at
            .map(|at| at.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);
        let result = PracticeResult {
            lesson_id: self
                .lesson
                .as_ref()
                .map(|l| l.id.clone())
                .unwrap_or_default(),
            words_completed: self.word_index,
            total_chars: self.correct_chars + self.incorrect_chars,
            correct_chars: self.correct_chars,
            incorrect_chars: self.incorrect_chars,
            wpm: compute_wpm(self.correct_chars, elapsed_ms),
            accuracy: compute_accuracy(self.correct_chars, self.incorrect_chars),
            per_key_stats: self.per_key_stats.clone(),
            duration_ms: elapsed_ms,
        };
        info!(
            "practice session '{}' complete: {} wpm, {:.3} accuracy",
            result.lesson_id, result.wpm, result.accuracy
        );
        events.on_complete(&result);
    }

    /// Cancel the session. Idempotent; no result is emitted.
    pub fn stop(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Loaded;
            self.started_at = None;
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn current_word(&self) -> Option<&str> {
        self.words.get(self.word_index).map(String::as_str)
    }

    pub fn char_index(&self) -> usize {
        self.char_index
    }

    pub fn word_index(&self) -> usize {
        self.word_index
    }

    /// Session progress in [0,1] against the fixed duration.
    pub fn progress(&self) -> f64 {
        let Some(at) = self.started_at else { return 0.0 };
        (at.elapsed().as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn time_remaining(&self) -> Duration {
        let Some(at) = self.started_at else {
            return self.duration;
        };
        self.duration.saturating_sub(at.elapsed())
    }

    pub fn upcoming_words(&self, count: usize) -> &[String] {
        let start = (self.word_index + 1).min(self.words.len());
        let end = (start + count).min(self.words.len());
        &self.words[start..end]
    }

    /// The adaptive engine, e.g. for the lesson screen to show weak keys
    /// or pick the next lesson's word lengths.
    pub fn adaptive(&self) -> &AdaptiveEngine {
        &self.adaptive
    }
}

/// Words-per-minute at the standard five characters per word.
fn compute_wpm(correct_chars: u32, elapsed_ms: f64) -> u32 {
    let minutes = elapsed_ms / 60_000.0;
    if minutes <= 0.0 {
        return 0;
    }
    ((correct_chars as f64 / 5.0) / minutes).round() as u32
}

fn compute_accuracy(correct: u32, incorrect: u32) -> f64 {
    let total = correct + incorrect;
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64
}
