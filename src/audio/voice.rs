use crate::game::note::Syllable;

/// Pitched vocal sample playback, the sample-bank collaborator.
///
/// Returns `false` when no sample is available for the requested pitch;
/// falling back to a nearby dynamic or pitch is the bank's own business.
/// Callers treat a failed play as a silent note — never an error.
pub trait VoiceBank {
    fn play_voice(&mut self, syllable: Syllable, midi: u8) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Records every requested voice; optionally reports samples missing.
    #[derive(Debug, Default)]
    pub struct RecordingVoices {
        pub played: Vec<(Syllable, u8)>,
        pub unavailable: bool,
    }

    impl VoiceBank for RecordingVoices {
        fn play_voice(&mut self, syllable: Syllable, midi: u8) -> bool {
            self.played.push((syllable, midi));
            !self.unavailable
        }
    }
}
