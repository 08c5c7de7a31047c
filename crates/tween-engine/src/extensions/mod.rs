// extensions/mod.rs
//
// Value-side helpers shared by the task kinds and the position batch.
// Nothing in here knows about the scheduler.

pub mod easing;

pub use easing::{ease, lerp, Easing, EasingCurve, Lerp};
