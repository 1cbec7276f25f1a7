//! Keyframes and their typed values.

use glam::Vec2;

use crate::scene::SpriteFrame;

use super::Easing;

/// Scope a keyframe callback is dispatched against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackScope {
    /// The per-document controller object.
    Document,
    /// The file owner supplied by the caller.
    Owner,
}

impl CallbackScope {
    /// Map a wire tag to a callback scope.
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(Self::Document),
            2 => Some(Self::Owner),
            _ => None,
        }
    }
}

/// Keyframe payload; the shape is selected by the owning channel's declared
/// property type.
#[derive(Clone, Debug)]
pub enum KeyframeValue {
    Bool(bool),
    Byte(u8),
    /// 3-channel color.
    Color([u8; 3]),
    /// Single float (degrees channels).
    Float(f32),
    /// 2D float pair (position, scale, float-xy channels).
    Pair(Vec2),
    /// Resolved sprite-frame handle.
    SpriteFrame(SpriteFrame),
    /// Callback channel entry.
    Callback { name: String, scope: CallbackScope },
    /// Sound channel entry.
    Sound {
        file: String,
        pitch: f32,
        pan: f32,
        gain: f32,
    },
}

/// One keyframe on a channel.
#[derive(Clone, Debug)]
pub struct Keyframe {
    pub time: f32,
    pub easing: Easing,
    pub value: KeyframeValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_scope_tags() {
        assert_eq!(CallbackScope::from_tag(1), Some(CallbackScope::Document));
        assert_eq!(CallbackScope::from_tag(2), Some(CallbackScope::Owner));
        assert_eq!(CallbackScope::from_tag(0), None);
        assert_eq!(CallbackScope::from_tag(3), None);
    }
}
