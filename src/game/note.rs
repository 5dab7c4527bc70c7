use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Vocal syllable a note (or the player's selected voice) is sung on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syllable {
    Dah,
    Doh,
    Dmm,
    Bmm,
    Don,
    #[default]
    Doo,
    Nun,
}

impl fmt::Display for Syllable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Syllable::Dah => "dah",
            Syllable::Doh => "doh",
            Syllable::Dmm => "dmm",
            Syllable::Bmm => "bmm",
            Syllable::Don => "don",
            Syllable::Doo => "doo",
            Syllable::Nun => "nun",
        };
        f.write_str(s)
    }
}

impl FromStr for Syllable {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dah" => Ok(Syllable::Dah),
            "doh" => Ok(Syllable::Doh),
            "dmm" => Ok(Syllable::Dmm),
            "bmm" => Ok(Syllable::Bmm),
            "don" => Ok(Syllable::Don),
            "doo" => Ok(Syllable::Doo),
            "nun" => Ok(Syllable::Nun),
            _ => Err(()),
        }
    }
}

/// One typeable character of a song, pinned to the song timeline.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub character: char,
    /// Milliseconds from song start.
    pub time: f64,
    /// MIDI note number the voice sample is pitched to.
    pub midi: u8,
    pub duration: f64,
    pub syllable: Syllable,
}

/// One sung line of lyrics. Each character of `text` maps 1:1 to a note,
/// separators included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phrase {
    pub text: String,
    pub start_time: f64,
    pub notes: Vec<Note>,
}

/// A song's full note content. Read-only input; the players never mutate it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub bpm: f64,
    pub time_signature: [u8; 2],
    pub difficulty: u8,
    pub phrases: Vec<Phrase>,
}

#[derive(Debug, Error)]
pub enum BeatmapError {
    #[error("beatmap is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("beatmap '{0}' has no phrases")]
    Empty(String),
    #[error("beatmap '{song_id}' notes go backwards in time at flattened index {index}")]
    UnorderedNotes { song_id: String, index: usize },
}

impl Beatmap {
    /// Parse and validate a beatmap from JSON.
    ///
    /// Note ordering is a hard invariant — every player walks the flattened
    /// sequence with a forward-only cursor. A phrase whose text and note
    /// counts disagree is tolerated here (phrase mode has a documented
    /// fallback) but logged, since it means malformed content.
    pub fn from_json(json: &str) -> Result<Beatmap, BeatmapError> {
        let beatmap: Beatmap = serde_json::from_str(json)?;
        beatmap.validate()?;
        Ok(beatmap)
    }

    fn validate(&self) -> Result<(), BeatmapError> {
        if self.phrases.is_empty() {
            return Err(BeatmapError::Empty(self.song_id.clone()));
        }

        let mut last_time = f64::NEG_INFINITY;
        let mut index = 0usize;
        for phrase in &self.phrases {
            if phrase.text.chars().count() != phrase.notes.len() {
                warn!(
                    "beatmap '{}': phrase \"{}\" has {} chars but {} notes",
                    self.song_id,
                    phrase.text,
                    phrase.text.chars().count(),
                    phrase.notes.len()
                );
            }
            for note in &phrase.notes {
                if note.time < last_time {
                    return Err(BeatmapError::UnorderedNotes {
                        song_id: self.song_id.clone(),
                        index,
                    });
                }
                last_time = note.time;
                index += 1;
            }
        }
        Ok(())
    }

    /// All notes in phrase order, cloned into one sequence. Non-decreasing
    /// in time for any beatmap that passed validation.
    pub fn flattened_notes(&self) -> Vec<Note> {
        self.phrases.iter().flat_map(|p| p.notes.clone()).collect()
    }

    pub fn note_count(&self) -> usize {
        self.phrases.iter().map(|p| p.notes.len()).sum()
    }
}
