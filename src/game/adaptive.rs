use crate::config::{
    KEY_STAT_WINDOW, RECENT_ACCURACY_WINDOW, WEAK_KEY_ACCURACY_THRESHOLD, WEAK_KEY_MIN_ATTEMPTS,
    WEAK_WORD_BIAS,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Rolling hit/miss counts for one key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCounter {
    pub hits: u32,
    pub misses: u32,
}

impl KeyCounter {
    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }

    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 1.0;
        }
        self.hits as f64 / self.total() as f64
    }
}

/// One key's stats as reported to callers, worst keys first.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyStat {
    pub key: char,
    pub attempts: u32,
    pub hits: u32,
    pub accuracy: f64,
}

/// Tracks rolling per-key accuracy and biases practice word selection
/// toward the player's weak keys.
///
/// The per-key window decays by proportional rescaling: once a key's total
/// exceeds the window, both counters shrink back to it, preserving the
/// ratio while implicitly weighting recent behavior.
#[derive(Debug, Default)]
pub struct AdaptiveEngine {
    key_history: HashMap<char, KeyCounter>,
    recent: VecDeque<bool>,
}

impl AdaptiveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one keystroke outcome for `key`.
    pub fn record(&mut self, key: char, correct: bool) {
        let stat = self.key_history.entry(key).or_default();
        if correct {
            stat.hits += 1;
        } else {
            stat.misses += 1;
        }

        let total = stat.total();
        if total > KEY_STAT_WINDOW {
            let scale = KEY_STAT_WINDOW as f64 / total as f64;
            stat.hits = (stat.hits as f64 * scale).round() as u32;
            stat.misses = (stat.misses as f64 * scale).round() as u32;
        }

        self.recent.push_back(correct);
        if self.recent.len() > RECENT_ACCURACY_WINDOW {
            self.recent.pop_front();
        }
    }

    /// Keys performing below the weak threshold, worst first. Keys with
    /// fewer than three recorded attempts are not classified.
    pub fn weak_keys(&self) -> Vec<KeyStat> {
        let mut weak: Vec<KeyStat> = self
            .key_history
            .iter()
            .filter(|(_, stat)| stat.total() >= WEAK_KEY_MIN_ATTEMPTS)
            .filter(|(_, stat)| stat.accuracy() < WEAK_KEY_ACCURACY_THRESHOLD)
            .map(|(&key, stat)| KeyStat {
                key,
                attempts: stat.total(),
                hits: stat.hits,
                accuracy: stat.accuracy(),
            })
            .collect();
        weak.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
        weak
    }

    /// All recorded key stats, worst first.
    pub fn all_key_stats(&self) -> Vec<KeyStat> {
        let mut stats: Vec<KeyStat> = self
            .key_history
            .iter()
            .filter(|(_, stat)| stat.total() > 0)
            .map(|(&key, stat)| KeyStat {
                key,
                attempts: stat.total(),
                hits: stat.hits,
                accuracy: stat.accuracy(),
            })
            .collect();
        stats.sort_by(|a, b| a.accuracy.total_cmp(&b.accuracy));
        stats
    }

    /// Overall accuracy over the last 50 attempts; 1.0 with no data.
    pub fn recent_accuracy(&self) -> f64 {
        if self.recent.is_empty() {
            return 1.0;
        }
        let hits = self.recent.iter().filter(|&&c| c).count();
        hits as f64 / self.recent.len() as f64
    }

    /// Pick a word from `pool`, biased toward words containing weak keys.
    ///
    /// With no weak keys the pick is uniform. Otherwise 70% of calls walk a
    /// cumulative weight over words scored by weak-key count; the rest (and
    /// any call where no word contains a weak key) fall back to uniform, so
    /// variety is never fully excluded.
    pub fn pick_word<'a>(&self, pool: &'a [String]) -> Option<&'a str> {
        if pool.is_empty() {
            return None;
        }
        let mut rng = rand::rng();

        let weak: HashSet<char> = self.weak_keys().into_iter().map(|s| s.key).collect();
        if weak.is_empty() {
            return Some(pool[rng.random_range(0..pool.len())].as_str());
        }

        if rng.random::<f64>() < WEAK_WORD_BIAS {
            let scored: Vec<(&str, u32)> = pool
                .iter()
                .map(|word| {
                    let weak_count = word.chars().filter(|c| weak.contains(c)).count() as u32;
                    (word.as_str(), weak_count)
                })
                .filter(|(_, count)| *count > 0)
                .collect();

            if !scored.is_empty() {
                let total_weight: u32 = scored.iter().map(|(_, count)| count).sum();
                let mut r = rng.random::<f64>() * total_weight as f64;
                for &(word, count) in &scored {
                    r -= count as f64;
                    if r <= 0.0 {
                        return Some(word);
                    }
                }
                return Some(scored[scored.len() - 1].0);
            }
        }

        Some(pool[rng.random_range(0..pool.len())].as_str())
    }

    /// Word-length band `[min, max]` for the practice content generator,
    /// from overall recent accuracy.
    pub fn suggested_word_length(&self) -> (usize, usize) {
        let acc = self.recent_accuracy();
        if acc >= 0.95 {
            (5, 12)
        } else if acc >= 0.85 {
            (4, 8)
        } else if acc >= 0.70 {
            (3, 6)
        } else {
            (2, 5)
        }
    }

    pub fn reset(&mut self) {
        self.key_history.clear();
        self.recent.clear();
    }
}
