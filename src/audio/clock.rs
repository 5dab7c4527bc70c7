use log::debug;
use std::time::Instant;

/// The backing-track collaborator: a monotonic audio-derived playback
/// clock plus the dynamic-backing effect hooks the song player composes.
///
/// Position must freeze exactly while paused — the auto-miss sweep relies
/// on that to avoid resolving notes whose time fell inside a pause.
pub trait BackingTrack {
    /// Current playback position in milliseconds.
    fn position_ms(&self) -> f64;

    fn play(&mut self);
    fn pause(&mut self);
    /// Stop playback and rewind to zero.
    fn stop(&mut self);
    fn seek_ms(&mut self, position_ms: f64);

    /// Playback rate in (0, 1]. Implementations clamp.
    fn set_playback_rate(&mut self, rate: f64);

    /// Ramp the backing mix to intensity `level` (0-4). Effect hook;
    /// a bare clock may ignore it.
    fn set_dynamic_level(&mut self, _level: u8) {}

    /// Abrupt dip on a combo break, distinct from the smooth level ramp.
    /// Effect hook; a bare clock may ignore it.
    fn dip_on_combo_break(&mut self) {}
}

const MIN_PLAYBACK_RATE: f64 = 0.25;
const MAX_PLAYBACK_RATE: f64 = 1.0;

/// Wall-clock implementation of [`BackingTrack`] for headless use: a real
/// audio engine derives position from its output stream, this one derives
/// it from [`Instant`]. Honors playback rate and freezes while paused. The
/// effect hooks are no-ops.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    base_ms: f64,
    rate: f64,
    playing: bool,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            base_ms: 0.0,
            rate: 1.0,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    fn elapsed_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0 * self.rate
    }
}

impl BackingTrack for SystemClock {
    fn position_ms(&self) -> f64 {
        if self.playing {
            self.base_ms + self.elapsed_ms()
        } else {
            self.base_ms
        }
    }

    fn play(&mut self) {
        if self.playing {
            return;
        }
        self.origin = Instant::now();
        self.playing = true;
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        self.base_ms += self.elapsed_ms();
        self.playing = false;
    }

    fn stop(&mut self) {
        self.base_ms = 0.0;
        self.playing = false;
    }

    fn seek_ms(&mut self, position_ms: f64) {
        self.base_ms = position_ms.max(0.0);
        self.origin = Instant::now();
    }

    fn set_playback_rate(&mut self, rate: f64) {
        // Rebase so the position is continuous across the rate change.
        self.base_ms = self.position_ms();
        self.origin = Instant::now();
        self.rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        debug!("playback rate set to {:.2}", self.rate);
    }
}
