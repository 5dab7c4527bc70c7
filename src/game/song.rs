use crate::audio::clock::BackingTrack;
use crate::audio::voice::VoiceBank;
use crate::game::PlayState;
use crate::game::judgment::{Grade, TimingEngine};
use crate::game::note::{Beatmap, Note, Syllable};
use crate::game::score::{ScoreSystem, SongResult};
use crate::settings::Settings;
use log::{debug, info};

// Grades kept for the flow controller; matches its sample size.
const FLOW_HISTORY: usize = 10;

/// Fire-and-forget notifications out of the song player. All methods
/// default to no-ops so a sink implements only what it renders.
pub trait SongEvents {
    fn on_note_hit(
        &mut self,
        _note: &Note,
        _grade: Grade,
        _combo: u32,
        _points: u32,
        _note_index: usize,
        _offset_ms: f64,
    ) {
    }
    fn on_auto_miss(&mut self, _note: &Note, _note_index: usize) {}
    fn on_wrong_key(&mut self, _pressed: char, _expected: char) {}
    fn on_combo_update(&mut self, _combo: u32, _choir_size: u8) {}
    fn on_phrase_change(&mut self, _phrase_index: usize) {}
    fn on_flow_update(&mut self, _flow_level: f64) {}
    fn on_tick(&mut self, _position_ms: f64) {}
    fn on_song_complete(&mut self, _result: &SongResult) {}
}

/// Per-session options, normally read from the player's saved settings.
#[derive(Clone, Debug)]
pub struct SongPlayerOptions {
    pub timing_assist: bool,
    /// Playback rate in (0, 1]. Below 1.0 slows the song and widens the
    /// timing windows to match.
    pub tempo: f64,
    pub voice: Syllable,
    pub latency_offset_ms: f64,
    pub flow_mode: bool,
}

impl Default for SongPlayerOptions {
    fn default() -> Self {
        Self {
            timing_assist: false,
            tempo: 1.0,
            voice: Syllable::default(),
            latency_offset_ms: 0.0,
            flow_mode: false,
        }
    }
}

impl SongPlayerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timing_assist: settings.timing_assist,
            tempo: settings.tempo,
            voice: settings.voice,
            latency_offset_ms: settings.latency_offset_ms,
            flow_mode: settings.flow_mode,
        }
    }
}

/// Note-granularity song playback: walks the beatmap's flattened note
/// sequence against the backing clock, matches keystrokes to the active
/// note, auto-misses what the player lets slip past, and composes the
/// dynamic backing level from combo performance.
///
/// Driven by the caller once per animation frame via [`update`]; each call
/// is O(notes newly resolved). The note cursor only ever moves forward —
/// a resolved note is never re-examined.
///
/// [`update`]: SongPlayer::update
pub struct SongPlayer<C: BackingTrack, V: VoiceBank> {
    clock: C,
    voices: V,
    timing: TimingEngine,
    score: ScoreSystem,
    beatmap: Option<Beatmap>,
    notes: Vec<Note>,
    note_index: usize,
    phrase_index: usize,
    state: PlayState,

    voice: Syllable,
    latency_offset_ms: f64,
    flow_mode: bool,
    recent_grades: Vec<Grade>,
    last_dynamic_level: Option<u8>,
}

impl<C: BackingTrack, V: VoiceBank> SongPlayer<C, V> {
    pub fn new(mut clock: C, voices: V, options: SongPlayerOptions) -> Self {
        let mut timing = TimingEngine::new(options.timing_assist);
        if options.tempo < 1.0 {
            timing.set_tempo(options.tempo);
            clock.set_playback_rate(options.tempo);
        }

        Self {
            clock,
            voices,
            timing,
            score: ScoreSystem::new(),
            beatmap: None,
            notes: Vec::new(),
            note_index: 0,
            phrase_index: 0,
            state: PlayState::Idle,
            voice: options.voice,
            latency_offset_ms: options.latency_offset_ms,
            flow_mode: options.flow_mode,
            recent_grades: Vec::new(),
            last_dynamic_level: None,
        }
    }

    /// Load a beatmap and reset the session. The caller primes the clock
    /// (decodes the backing track) before calling [`start`].
    ///
    /// [`start`]: SongPlayer::start
    pub fn load_song(&mut self, beatmap: Beatmap) {
        self.notes = beatmap.flattened_notes();
        info!(
            "loaded '{}': {} phrases, {} notes",
            beatmap.song_id,
            beatmap.phrases.len(),
            self.notes.len()
        );
        self.beatmap = Some(beatmap);
        self.note_index = 0;
        self.phrase_index = 0;
        self.score.reset();
        self.recent_grades.clear();
        self.last_dynamic_level = None;
        self.timing.reset_flow();
        self.state = PlayState::Loaded;
    }

    /// Begin playback. The backing starts muffled (level 0) and brightens
    /// as the player builds combo.
    pub fn start(&mut self) {
        if self.state != PlayState::Loaded {
            debug!("start ignored in state {:?}", self.state);
            return;
        }
        self.state = PlayState::Playing;
        self.clock.play();
        self.clock.set_dynamic_level(0);
        self.last_dynamic_level = Some(0);
    }

    /// One animation-frame tick: auto-miss sweep, time-based phrase
    /// advance, tick notification.
    pub fn update(&mut self, events: &mut dyn SongEvents) {
        if self.state != PlayState::Playing {
            return;
        }
        let t = self.clock.position_ms();

        self.process_auto_miss(t, events);
        self.advance_phrase_by_time(t, events);
        events.on_tick(t);
    }

    /// Resolve every unresolved note whose miss window has fully elapsed.
    fn process_auto_miss(&mut self, current_time_ms: f64, events: &mut dyn SongEvents) {
        let auto_miss_window = self.timing.miss_window_ms();

        while self.note_index < self.notes.len() {
            let note = self.notes[self.note_index];
            if current_time_ms <= note.time + auto_miss_window {
                break;
            }

            self.score
                .record_hit(Grade::Miss, current_time_ms - note.time, 1);
            self.record_grade_for_flow(Grade::Miss, events);
            events.on_auto_miss(&note, self.note_index);
            events.on_combo_update(self.score.combo(), self.score.choir_size());
            self.update_dynamic_backing(true);
            self.note_index += 1;

            self.update_phrase_by_position(events);

            if self.note_index >= self.notes.len() {
                self.complete(events);
                return;
            }
        }
    }

    /// Lyric display follows the song clock even when the player falls
    /// behind the notes.
    fn advance_phrase_by_time(&mut self, current_time_ms: f64, events: &mut dyn SongEvents) {
        let target = {
            let Some(beatmap) = &self.beatmap else { return };
            let mut target = self.phrase_index;
            for p in (self.phrase_index + 1)..beatmap.phrases.len() {
                if current_time_ms >= beatmap.phrases[p].start_time {
                    target = p;
                }
            }
            target
        };
        self.set_phrase_index(target, events);
    }

    /// The committed phrase position, derived from how many notes have
    /// been resolved.
    fn update_phrase_by_position(&mut self, events: &mut dyn SongEvents) {
        let target = {
            let Some(beatmap) = &self.beatmap else { return };
            let mut note_count = 0;
            let mut found = None;
            for (p, phrase) in beatmap.phrases.iter().enumerate() {
                note_count += phrase.notes.len();
                if self.note_index < note_count {
                    found = Some(p);
                    break;
                }
            }
            // Past the last note: leave the phrase where it is.
            let Some(target) = found else { return };
            target
        };
        self.set_phrase_index(target, events);
    }

    /// Both phrase trackers funnel through here; listeners hear about a
    /// phrase exactly once per actual change.
    fn set_phrase_index(&mut self, index: usize, events: &mut dyn SongEvents) {
        if index != self.phrase_index {
            self.phrase_index = index;
            events.on_phrase_change(index);
        }
    }

    /// Match a pressed key against the active note.
    ///
    /// A correct key always scores: a judgment of miss is coerced to good
    /// (dynamic 2) — correctly-typed input is under-rewarded for bad
    /// timing, never penalized as a miss. A wrong key only notifies the
    /// UI; the note stays unresolved for the auto-miss sweep to claim.
    pub fn handle_keystroke(&mut self, key: char, events: &mut dyn SongEvents) {
        if self.state != PlayState::Playing || self.note_index >= self.notes.len() {
            return;
        }

        let note = self.notes[self.note_index];
        let current_time = self.clock.position_ms() - self.latency_offset_ms;
        let expected = note.character.to_ascii_lowercase();

        if key.to_ascii_lowercase() != expected {
            events.on_wrong_key(key, expected);
            return;
        }

        // The reward for a correct keystroke: the note sings. Separators
        // stay silent, and a missing sample degrades to a silent note.
        if note.character != ' ' && !self.voices.play_voice(self.voice, note.midi) {
            debug!("no {} sample at midi {}", self.voice, note.midi);
        }

        let judged = self.timing.judge(current_time, note.time);
        let (grade, dynamic) = if judged.grade.is_miss() {
            (Grade::Good, 2)
        } else {
            (judged.grade, judged.dynamic)
        };
        let note_result = self.score.record_hit(grade, judged.offset_ms, dynamic);

        self.record_grade_for_flow(grade, events);
        events.on_note_hit(
            &note,
            grade,
            self.score.combo(),
            note_result.points,
            self.note_index,
            judged.offset_ms,
        );
        events.on_combo_update(self.score.combo(), self.score.choir_size());
        self.update_dynamic_backing(false);
        self.note_index += 1;

        if self.note_index >= self.notes.len() {
            self.complete(events);
            return;
        }

        self.update_phrase_by_position(events);
    }

    fn record_grade_for_flow(&mut self, grade: Grade, events: &mut dyn SongEvents) {
        self.recent_grades.push(grade);
        if self.recent_grades.len() > FLOW_HISTORY {
            self.recent_grades.remove(0);
        }
        if self.flow_mode {
            self.timing.adjust_flow(&self.recent_grades);
            events.on_flow_update(self.timing.flow_level());
        }
    }

    /// Recompute the backing intensity after a resolution. A combo break
    /// from a bright mix takes the abrupt dip path instead of the smooth
    /// ramp, as an immediate audible cue.
    fn update_dynamic_backing(&mut self, is_combo_break: bool) {
        if is_combo_break
            && self.score.combo() == 0
            && self.last_dynamic_level.is_some_and(|level| level > 1)
        {
            self.clock.dip_on_combo_break();
            self.last_dynamic_level = Some(1);
            return;
        }

        let level = self.score.dynamic_level();
        if self.last_dynamic_level != Some(level) {
            self.clock.set_dynamic_level(level);
            self.last_dynamic_level = Some(level);
        }
    }

    fn complete(&mut self, events: &mut dyn SongEvents) {
        self.state = PlayState::Completed;
        self.clock.stop();

        if let Some(beatmap) = &self.beatmap {
            let result = self.score.song_result(&beatmap.song_id);
            info!(
                "song '{}' complete: score {}, accuracy {:.3}, max combo {}",
                result.song_id, result.score, result.accuracy, result.max_combo
            );
            events.on_song_complete(&result);
        }
    }

    /// Idempotent. Leaves the player re-loadable (and re-startable from
    /// the current cursor if the caller chooses not to reload).
    pub fn stop(&mut self) {
        match self.state {
            PlayState::Playing | PlayState::Paused => {
                self.state = PlayState::Loaded;
                self.clock.stop();
            }
            _ => {}
        }
    }

    /// Idempotent. The backing clock freezes with playback, so notes whose
    /// time falls inside the pause are not swept on resume.
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            self.clock.pause();
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlayState::Paused {
            self.state = PlayState::Playing;
            self.clock.play();
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.notes.get(self.note_index)
    }

    pub fn current_phrase(&self) -> usize {
        self.phrase_index
    }

    /// Fraction of notes resolved, in [0,1].
    pub fn progress(&self) -> f64 {
        if self.notes.is_empty() {
            return 0.0;
        }
        self.note_index as f64 / self.notes.len() as f64
    }

    pub fn score(&self) -> &ScoreSystem {
        &self.score
    }

    pub fn flow_level(&self) -> f64 {
        self.timing.flow_level()
    }

    /// The backing collaborator, e.g. for the caller to prime or seek.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The sample-bank collaborator, e.g. for the caller to load voices.
    pub fn voices_mut(&mut self) -> &mut V {
        &mut self.voices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clock::test_support::ManualClock;
    use crate::audio::voice::test_support::RecordingVoices;
    use crate::config::MISS_WINDOW_MS;
    use crate::game::note::test_support::beatmap;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Sink {
        hits: Vec<(char, Grade, u32)>,
        auto_misses: Vec<usize>,
        wrong_keys: Vec<(char, char)>,
        phrase_changes: Vec<usize>,
        completions: Vec<SongResult>,
        ticks: u32,
    }

    impl SongEvents for Sink {
        fn on_note_hit(
            &mut self,
            note: &Note,
            grade: Grade,
            combo: u32,
            _points: u32,
            _note_index: usize,
            _offset_ms: f64,
        ) {
            self.hits.push((note.character, grade, combo));
        }
        fn on_auto_miss(&mut self, _note: &Note, note_index: usize) {
            self.auto_misses.push(note_index);
        }
        fn on_wrong_key(&mut self, pressed: char, expected: char) {
            self.wrong_keys.push((pressed, expected));
        }
        fn on_phrase_change(&mut self, phrase_index: usize) {
            self.phrase_changes.push(phrase_index);
        }
        fn on_song_complete(&mut self, result: &SongResult) {
            self.completions.push(result.clone());
        }
        fn on_tick(&mut self, _position_ms: f64) {
            self.ticks += 1;
        }
    }

    fn player(phrases: &[(&str, f64)]) -> SongPlayer<ManualClock, RecordingVoices> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut player = SongPlayer::new(
            ManualClock::new(),
            RecordingVoices::default(),
            SongPlayerOptions::default(),
        );
        player.load_song(beatmap(phrases));
        player
    }

    #[test]
    fn keystrokes_before_start_are_ignored() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.handle_keystroke('a', &mut sink);
        assert!(sink.hits.is_empty());
        assert_eq!(p.state(), PlayState::Loaded);
    }

    #[test]
    fn start_requires_a_loaded_song() {
        let mut p = SongPlayer::new(
            ManualClock::new(),
            RecordingVoices::default(),
            SongPlayerOptions::default(),
        );
        p.start();
        assert_eq!(p.state(), PlayState::Idle);
    }

    #[test]
    fn correct_key_scores_and_advances() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        assert_eq!(sink.hits, vec![('a', Grade::Perfect, 1)]);
        assert_eq!(p.current_note().unwrap().character, 'b');
        assert_eq!(p.progress(), 0.5);
    }

    #[test]
    fn correct_key_plays_voice_but_separators_stay_silent() {
        let mut p = player(&[("a b", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        p.clock_mut().advance_ms(500.0);
        p.handle_keystroke(' ', &mut sink);
        p.clock_mut().advance_ms(500.0);
        p.handle_keystroke('b', &mut sink);
        assert_eq!(sink.hits.len(), 3);
        assert_eq!(sink.completions.len(), 1);
        // Two pitched plays; the space scored but made no sound.
        assert_eq!(
            p.voices_mut().played,
            vec![(Syllable::Doo, 60), (Syllable::Doo, 60)]
        );
    }

    #[test]
    fn missing_sample_degrades_to_silence_without_affecting_score() {
        let mut p = player(&[("ab", 0.0)]);
        p.voices_mut().unavailable = true;
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        assert_eq!(sink.hits.len(), 1);
        assert_eq!(p.score().combo(), 1);
    }

    #[test]
    fn wrong_key_never_scores_and_leaves_note_unresolved() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('x', &mut sink);
        assert_eq!(sink.wrong_keys, vec![('x', 'a')]);
        assert!(sink.hits.is_empty());
        assert_eq!(p.score().combo(), 0);
        assert_eq!(p.score().results().len(), 0);
        assert_eq!(p.current_note().unwrap().character, 'a');
    }

    #[test]
    fn uppercase_input_matches() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('A', &mut sink);
        assert_eq!(sink.hits.len(), 1);
    }

    #[test]
    fn very_late_correct_key_is_coerced_to_good() {
        // Note at t=0; key lands at 180ms, inside the miss window's edge
        // but outside good (150ms).
        let mut p = player(&[("a", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.clock_mut().advance_ms(180.0);
        p.handle_keystroke('a', &mut sink);
        assert_eq!(sink.hits, vec![('a', Grade::Good, 1)]);
        let logged = p.score().results()[0];
        assert_eq!(logged.grade, Grade::Good);
        assert_eq!(logged.dynamic, 2);
    }

    #[test]
    fn auto_miss_sweeps_every_expired_note() {
        let mut p = player(&[("abc", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        // Past the last note (1000ms) plus the miss window.
        p.clock_mut().advance_ms(1000.0 + MISS_WINDOW_MS + 1.0);
        p.update(&mut sink);
        assert_eq!(sink.auto_misses, vec![0, 1, 2]);
        assert_eq!(p.state(), PlayState::Completed);
        assert_eq!(sink.completions.len(), 1);
        let result = &sink.completions[0];
        assert_eq!(result.misses, 3);
        assert_eq!(result.note_results.len(), 3);
        assert!(result.note_results.iter().all(|r| r.dynamic == 1));
    }

    #[test]
    fn notes_inside_the_window_are_not_swept() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        // First note expired, second (t=500) still within its window.
        p.clock_mut().advance_ms(500.0 + MISS_WINDOW_MS);
        p.update(&mut sink);
        assert_eq!(sink.auto_misses, vec![0]);
        assert_eq!(p.current_note().unwrap().character, 'b');
        assert_eq!(p.state(), PlayState::Playing);
    }

    #[test]
    fn pause_freezes_auto_miss() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.pause();
        // A frozen clock gains nothing; nothing can expire.
        p.clock_mut().advance_ms(10_000.0);
        p.resume();
        p.update(&mut sink);
        assert!(sink.auto_misses.is_empty());
        assert_eq!(p.state(), PlayState::Playing);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut p = player(&[("ab", 0.0)]);
        p.start();
        p.pause();
        p.pause();
        assert_eq!(p.state(), PlayState::Paused);
        p.resume();
        p.resume();
        assert_eq!(p.state(), PlayState::Playing);
    }

    #[test]
    fn stop_twice_is_stop_once() {
        let mut p = player(&[("ab", 0.0)]);
        p.start();
        p.stop();
        let state_after_one = p.state();
        let stops_after_one = p.clock_mut().stops;
        p.stop();
        assert_eq!(p.state(), state_after_one);
        assert_eq!(p.clock_mut().stops, stops_after_one);
    }

    #[test]
    fn completion_by_typing_emits_one_result() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        p.clock_mut().advance_ms(500.0);
        p.handle_keystroke('b', &mut sink);
        assert_eq!(p.state(), PlayState::Completed);
        assert_eq!(sink.completions.len(), 1);
        assert_eq!(sink.completions[0].perfects, 2);
        // Stale keystrokes after completion are ignored.
        p.handle_keystroke('b', &mut sink);
        assert_eq!(sink.completions.len(), 1);
        assert_eq!(sink.hits.len(), 2);
    }

    #[test]
    fn phrase_advances_by_resolved_position() {
        let mut p = player(&[("ab", 0.0), ("cd", 2000.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        assert_eq!(p.current_phrase(), 0);
        p.clock_mut().advance_ms(500.0);
        p.handle_keystroke('b', &mut sink);
        assert_eq!(p.current_phrase(), 1);
        assert_eq!(sink.phrase_changes, vec![1]);
    }

    #[test]
    fn phrase_advances_by_time_even_without_typing() {
        let mut p = player(&[("ab", 0.0), ("cd", 2000.0)]);
        let mut sink = Sink::default();
        p.start();
        p.clock_mut().advance_ms(2000.0);
        p.update(&mut sink);
        assert_eq!(p.current_phrase(), 1);
        // One notification, not one per tracker.
        assert_eq!(sink.phrase_changes, vec![1]);
        assert_eq!(sink.ticks, 1);
    }

    #[test]
    fn backing_dips_on_combo_break_from_bright_mix() {
        let mut p = player(&[("abcdefghijklmnop", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        // Build combo 10 → dynamic level 2.
        for (i, key) in "abcdefghij".chars().enumerate() {
            if i > 0 {
                p.clock_mut().advance_ms(500.0);
            }
            p.handle_keystroke(key, &mut sink);
        }
        assert_eq!(p.score().dynamic_level(), 2);
        let dips_before = p.clock_mut().dips;
        // Let the next note expire: combo break from level 2.
        p.clock_mut().advance_ms(500.0 + MISS_WINDOW_MS + 1.0);
        p.update(&mut sink);
        assert_eq!(p.clock_mut().dips, dips_before + 1);
    }

    #[test]
    fn backing_level_changes_are_deduplicated() {
        let mut p = player(&[("abcd", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        p.clock_mut().advance_ms(500.0);
        p.handle_keystroke('b', &mut sink);
        // Level 0 at start, then 1 at combo 1; combo 2 stays level 1.
        assert_eq!(p.clock_mut().dynamic_levels, vec![0, 1]);
    }

    #[test]
    fn flow_mode_tightens_windows_during_play() {
        let mut p = SongPlayer::new(
            ManualClock::new(),
            RecordingVoices::default(),
            SongPlayerOptions {
                flow_mode: true,
                ..SongPlayerOptions::default()
            },
        );
        p.load_song(beatmap(&[("abcdefghijkl", 0.0)]));
        let mut sink = Sink::default();
        p.start();
        for (i, key) in "abcdefghijk".chars().enumerate() {
            if i > 0 {
                p.clock_mut().advance_ms(500.0);
            }
            p.handle_keystroke(key, &mut sink);
        }
        // Eleven perfects: the controller has seen ten and tightened.
        assert!(p.flow_level() < 1.0);
    }

    #[test]
    fn tempo_scales_judgment_windows() {
        let mut p = SongPlayer::new(
            ManualClock::new(),
            RecordingVoices::default(),
            SongPlayerOptions {
                tempo: 0.5,
                ..SongPlayerOptions::default()
            },
        );
        p.load_song(beatmap(&[("a", 1000.0)]));
        let mut sink = Sink::default();
        p.start();
        // 90ms late: outside the base perfect window (50ms), inside the
        // half-tempo one (100ms).
        p.clock_mut().advance_ms(1090.0);
        p.handle_keystroke('a', &mut sink);
        assert_eq!(sink.hits, vec![('a', Grade::Perfect, 1)]);
    }

    #[test]
    fn latency_offset_shifts_judged_time() {
        let mut p = SongPlayer::new(
            ManualClock::new(),
            RecordingVoices::default(),
            SongPlayerOptions {
                latency_offset_ms: 60.0,
                ..SongPlayerOptions::default()
            },
        );
        p.load_song(beatmap(&[("a", 0.0)]));
        let mut sink = Sink::default();
        p.start();
        // Raw clock says 100ms late (great); compensated time is 40ms.
        p.clock_mut().advance_ms(100.0);
        p.handle_keystroke('a', &mut sink);
        assert_eq!(sink.hits, vec![('a', Grade::Perfect, 1)]);
    }

    #[test]
    fn reload_resets_session_state() {
        let mut p = player(&[("ab", 0.0)]);
        let mut sink = Sink::default();
        p.start();
        p.handle_keystroke('a', &mut sink);
        p.load_song(beatmap(&[("xy", 0.0)]));
        assert_eq!(p.state(), PlayState::Loaded);
        assert_eq!(p.score().results().len(), 0);
        assert_eq!(p.current_note().unwrap().character, 'x');
        assert_eq!(p.progress(), 0.0);
    }
}
