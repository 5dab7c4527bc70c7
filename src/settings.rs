use crate::game::note::Syllable;
use configparser::ini::Ini;
use log::{info, warn};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const SETTINGS_DIR: &str = "save";
const SETTINGS_INI_PATH: &str = "save/settings.ini";

/// Player-persisted settings. The gameplay core reads these; the settings
/// and calibration screens write them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub master_volume: f64,
    pub backing_volume: f64,
    pub sample_volume: f64,
    pub show_keyboard: bool,
    pub timing_assist: bool,
    /// Playback rate in (0, 1].
    pub tempo: f64,
    pub voice: Syllable,
    /// Measured input latency, subtracted from the clock when judging.
    pub latency_offset_ms: f64,
    pub flow_mode: bool,
    pub phrase_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            backing_volume: 0.6,
            sample_volume: 1.0,
            show_keyboard: true,
            timing_assist: false,
            tempo: 1.0,
            voice: Syllable::Doo,
            latency_offset_ms: 0.0,
            flow_mode: true,
            phrase_mode: false,
        }
    }
}

// Global static for the current settings.
static SETTINGS: Lazy<Mutex<Settings>> = Lazy::new(|| Mutex::new(Settings::default()));

fn write_ini(settings: &Settings) -> Ini {
    let mut conf = Ini::new();
    let set = |conf: &mut Ini, key: &str, value: String| {
        conf.set("game", key, Some(value));
    };
    set(&mut conf, "MasterVolume", settings.master_volume.to_string());
    set(&mut conf, "BackingVolume", settings.backing_volume.to_string());
    set(&mut conf, "SampleVolume", settings.sample_volume.to_string());
    set(
        &mut conf,
        "ShowKeyboard",
        u8::from(settings.show_keyboard).to_string(),
    );
    set(
        &mut conf,
        "TimingAssist",
        u8::from(settings.timing_assist).to_string(),
    );
    set(&mut conf, "Tempo", settings.tempo.to_string());
    set(&mut conf, "Voice", settings.voice.to_string());
    set(
        &mut conf,
        "LatencyOffsetMs",
        settings.latency_offset_ms.to_string(),
    );
    set(&mut conf, "FlowMode", u8::from(settings.flow_mode).to_string());
    set(
        &mut conf,
        "PhraseMode",
        u8::from(settings.phrase_mode).to_string(),
    );
    conf
}

fn from_ini(conf: &Ini) -> Settings {
    let defaults = Settings::default();
    let float = |key: &str, fallback: f64| {
        conf.get("game", key)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(fallback)
    };
    let flag = |key: &str, fallback: bool| {
        conf.get("game", key)
            .and_then(|v| v.parse::<u8>().ok())
            .map_or(fallback, |v| v != 0)
    };

    Settings {
        master_volume: float("MasterVolume", defaults.master_volume),
        backing_volume: float("BackingVolume", defaults.backing_volume),
        sample_volume: float("SampleVolume", defaults.sample_volume),
        show_keyboard: flag("ShowKeyboard", defaults.show_keyboard),
        timing_assist: flag("TimingAssist", defaults.timing_assist),
        tempo: float("Tempo", defaults.tempo),
        voice: conf
            .get("game", "Voice")
            .and_then(|v| v.parse::<Syllable>().ok())
            .unwrap_or(defaults.voice),
        latency_offset_ms: float("LatencyOffsetMs", defaults.latency_offset_ms),
        flow_mode: flag("FlowMode", defaults.flow_mode),
        phrase_mode: flag("PhraseMode", defaults.phrase_mode),
    }
}

fn create_default_file() -> Result<(), std::io::Error> {
    info!(
        "Settings file not found, creating defaults in '{}'.",
        SETTINGS_DIR
    );
    fs::create_dir_all(SETTINGS_DIR)?;
    write_ini(&Settings::default()).write(SETTINGS_INI_PATH)?;
    Ok(())
}

/// Loads settings from disk into the global, creating defaults on first run.
pub fn load() {
    if !Path::new(SETTINGS_INI_PATH).exists() {
        if let Err(e) = create_default_file() {
            warn!("Failed to create default settings file: {}", e);
            return;
        }
    }

    let mut conf = Ini::new();
    if conf.load(SETTINGS_INI_PATH).is_ok() {
        *SETTINGS.lock().unwrap() = from_ini(&conf);
    } else {
        warn!("Failed to load '{}', using defaults.", SETTINGS_INI_PATH);
    }
}

/// Returns a copy of the currently loaded settings.
pub fn get() -> Settings {
    SETTINGS.lock().unwrap().clone()
}

/// Replaces the global settings and persists them; the calibration screen
/// writes its measured latency offset through here.
pub fn save(settings: Settings) -> Result<(), std::io::Error> {
    fs::create_dir_all(SETTINGS_DIR)?;
    write_ini(&settings).write(SETTINGS_INI_PATH)?;
    *SETTINGS.lock().unwrap() = settings;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_first_run_experience() {
        let s = Settings::default();
        assert!(!s.timing_assist);
        assert!(s.flow_mode);
        assert!(!s.phrase_mode);
        assert_eq!(s.tempo, 1.0);
        assert_eq!(s.voice, Syllable::Doo);
        assert_eq!(s.latency_offset_ms, 0.0);
    }

    #[test]
    fn settings_round_trip_through_ini() {
        let original = Settings {
            master_volume: 0.5,
            backing_volume: 0.4,
            sample_volume: 0.9,
            show_keyboard: false,
            timing_assist: true,
            tempo: 0.75,
            voice: Syllable::Bmm,
            latency_offset_ms: 42.5,
            flow_mode: false,
            phrase_mode: true,
        };
        let conf = write_ini(&original);
        // Writing is case-preserving but reading is case-insensitive in
        // configparser; round-trip through the serialized text.
        let mut reread = Ini::new();
        reread.read(conf.writes()).unwrap();
        assert_eq!(from_ini(&reread), original);
    }

    #[test]
    fn unknown_or_corrupt_keys_fall_back_to_defaults() {
        let mut conf = Ini::new();
        conf.set("game", "Tempo", Some("not-a-number".to_string()));
        conf.set("game", "Voice", Some("kazoo".to_string()));
        let parsed = from_ini(&conf);
        assert_eq!(parsed, Settings::default());
    }
}
