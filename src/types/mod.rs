mod clip;
mod platform;
mod quality;

pub use clip::{Clip, Subject};
#[cfg(test)]
pub use clip::sample_clip;
pub use platform::Platform;
pub use quality::Quality;
