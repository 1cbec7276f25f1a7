//! Timeline-animation model: sequences, channels, keyframes and easing.

mod easing;
mod keyframe;
mod model;
mod sequence;

pub use easing::{Easing, EasingKind};
pub use keyframe::{CallbackScope, Keyframe, KeyframeValue};
pub use model::{AnimationModel, NodeSequence};
pub use sequence::{Channel, Sequence};
