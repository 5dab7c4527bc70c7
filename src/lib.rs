//! Gameplay core for a rhythm-typing game: the player types lyrics in time
//! with a vocal backing track, each correct keystroke sings a pitched
//! sample, and timing accuracy drives score, combo and the choir meter.
//!
//! The crate owns the timing-judgment engine, the song/phrase/practice
//! state machines, scoring, and adaptive word selection. Audio output,
//! rendering and persistence stay outside, reached through the
//! [`BackingTrack`]/[`VoiceBank`] traits and the per-player event sinks.
//! Everything is single-threaded and caller-driven: call `update` once per
//! animation frame and route keystrokes to the active player.

pub mod audio;
pub mod config;
pub mod game;
pub mod settings;

pub use audio::clock::{BackingTrack, SystemClock};
pub use audio::voice::VoiceBank;
pub use game::PlayState;
pub use game::adaptive::{AdaptiveEngine, KeyCounter, KeyStat};
pub use game::judgment::{Grade, TimingEngine, TimingResult};
pub use game::note::{Beatmap, BeatmapError, Note, Phrase, Syllable};
pub use game::phrase::{PhraseEvents, PhraseModeSongPlayer, PhraseResult};
pub use game::practice::{Lesson, PracticeEvents, PracticePlayer, PracticeResult};
pub use game::score::{LetterGrade, NoteResult, ScoreSystem, SongResult};
pub use game::song::{SongEvents, SongPlayer, SongPlayerOptions};
pub use settings::Settings;
