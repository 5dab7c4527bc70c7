pub mod adaptive;
pub mod judgment;
pub mod note;
pub mod phrase;
pub mod practice;
pub mod score;
pub mod song;

/// Lifecycle shared by the three players. Content must be loaded before
/// `start`; `Playing` and `Paused` alternate freely; `Completed` is
/// terminal until the next load.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlayState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Completed,
}
