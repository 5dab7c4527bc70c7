use crate::config::{
    CHOIR_THRESHOLDS, COMBO_MULTIPLIERS, COMBO_THRESHOLDS, DYNAMIC_LEVEL_COMBOS, GRADE_A_ACCURACY,
    GRADE_B_ACCURACY, GRADE_C_ACCURACY, GRADE_D_ACCURACY, GRADE_S_ACCURACY, SCORE_GOOD,
    SCORE_GREAT, SCORE_PERFECT,
};
use crate::game::judgment::Grade;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    S,
    A,
    B,
    C,
    D,
    F,
}

/// One resolved note (hit or auto-miss), as appended to the result log.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub grade: Grade,
    pub timing_offset: f64,
    pub dynamic: u8,
    pub combo: u32,
    pub points: u32,
}

/// Final aggregate for a song session, emitted exactly once on completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SongResult {
    pub song_id: String,
    pub score: u32,
    pub accuracy: f64,
    pub max_combo: u32,
    pub grade: LetterGrade,
    pub note_results: Vec<NoteResult>,
    pub choir_size: u8,
    pub perfects: u32,
    pub greats: u32,
    pub goods: u32,
    pub misses: u32,
}

fn base_points(grade: Grade) -> u32 {
    match grade {
        Grade::Perfect => SCORE_PERFECT,
        Grade::Great => SCORE_GREAT,
        Grade::Good => SCORE_GOOD,
        Grade::Miss => 0,
    }
}

pub fn letter_grade_for(accuracy: f64) -> LetterGrade {
    if accuracy >= GRADE_S_ACCURACY {
        LetterGrade::S
    } else if accuracy >= GRADE_A_ACCURACY {
        LetterGrade::A
    } else if accuracy >= GRADE_B_ACCURACY {
        LetterGrade::B
    } else if accuracy >= GRADE_C_ACCURACY {
        LetterGrade::C
    } else if accuracy >= GRADE_D_ACCURACY {
        LetterGrade::D
    } else {
        LetterGrade::F
    }
}

/// Score, combo and choir meter for one song session.
///
/// The choir meter is a lagging indicator: a singer joins each time combo
/// lands exactly on a threshold and one leaves on every combo break, so its
/// value persists across combo resets rather than tracking combo directly.
/// Combo only ever changes by +1 or resets to 0 here, which is what makes
/// the exact-equality threshold check sufficient.
#[derive(Debug, Default)]
pub struct ScoreSystem {
    results: Vec<NoteResult>,
    score: u32,
    combo: u32,
    max_combo: u32,
    choir_size: u8,
}

impl ScoreSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn choir_size(&self) -> u8 {
        self.choir_size
    }

    pub fn results(&self) -> &[NoteResult] {
        &self.results
    }

    fn multiplier(&self) -> f64 {
        for i in (0..COMBO_THRESHOLDS.len()).rev() {
            if self.combo >= COMBO_THRESHOLDS[i] {
                return COMBO_MULTIPLIERS[i + 1];
            }
        }
        COMBO_MULTIPLIERS[0]
    }

    /// Record one resolved note. A miss breaks the combo and shrinks the
    /// choir; anything else extends the combo and may grow it.
    pub fn record_hit(&mut self, grade: Grade, timing_offset: f64, dynamic: u8) -> NoteResult {
        if grade.is_miss() {
            self.combo = 0;
            self.choir_size = self.choir_size.saturating_sub(1);
        } else {
            self.combo += 1;
            if self.combo > self.max_combo {
                self.max_combo = self.combo;
            }
            if CHOIR_THRESHOLDS.contains(&self.combo) {
                self.choir_size = (self.choir_size + 1).min(CHOIR_THRESHOLDS.len() as u8);
            }
        }

        let points = (base_points(grade) as f64 * self.multiplier()).round() as u32;
        self.score += points;

        let result = NoteResult {
            grade,
            timing_offset,
            dynamic,
            combo: self.combo,
            points,
        };
        self.results.push(result);
        result
    }

    /// Lifetime accuracy in [0,1], recomputed from the full result log.
    pub fn accuracy(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        let max_possible = (self.results.len() as u32 * SCORE_PERFECT) as f64;
        let earned: u32 = self.results.iter().map(|r| base_points(r.grade)).sum();
        earned as f64 / max_possible
    }

    pub fn letter_grade(&self) -> LetterGrade {
        letter_grade_for(self.accuracy())
    }

    /// Backing intensity level (0-4) for the current combo. Pure signal for
    /// the audio collaborator; reads no further than `combo`.
    pub fn dynamic_level(&self) -> u8 {
        let [warm, clear, almost, full] = DYNAMIC_LEVEL_COMBOS;
        if self.combo >= full {
            4
        } else if self.combo >= almost {
            3
        } else if self.combo >= clear {
            2
        } else if self.combo >= warm {
            1
        } else {
            0
        }
    }

    pub fn song_result(&self, song_id: &str) -> SongResult {
        let mut perfects = 0;
        let mut greats = 0;
        let mut goods = 0;
        let mut misses = 0;
        for r in &self.results {
            match r.grade {
                Grade::Perfect => perfects += 1,
                Grade::Great => greats += 1,
                Grade::Good => goods += 1,
                Grade::Miss => misses += 1,
            }
        }

        SongResult {
            song_id: song_id.to_string(),
            score: self.score,
            accuracy: self.accuracy(),
            max_combo: self.max_combo,
            grade: self.letter_grade(),
            note_results: self.results.clone(),
            choir_size: self.choir_size,
            perfects,
            greats,
            goods,
            misses,
        }
    }

    pub fn reset(&mut self) {
        self.results.clear();
        self.score = 0;
        self.combo = 0;
        self.max_combo = 0;
        self.choir_size = 0;
    }
}
