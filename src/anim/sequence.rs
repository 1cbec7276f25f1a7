//! Sequences and animated-property channels.

use crate::reader::PropType;

use super::Keyframe;

/// A named, typed animated-property track on one node, belonging to exactly
/// one sequence.
#[derive(Clone, Debug)]
pub struct Channel {
    pub name: String,
    pub prop_type: PropType,
    pub keyframes: Vec<Keyframe>,
}

/// One timeline of a document.
///
/// The per-node property channels live in the document-wide
/// [`AnimationModel`](super::AnimationModel), not here.
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    pub sequence_id: u32,
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
    /// Sequence chained after this one finishes, if any.
    pub chained_sequence_id: Option<u32>,
    /// Callback keyframes; empty when the file carries no callback channel.
    pub callback_channel: Vec<Keyframe>,
    /// Sound keyframes; empty when the file carries no sound channel.
    pub sound_channel: Vec<Keyframe>,
}
