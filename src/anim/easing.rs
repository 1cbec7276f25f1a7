//! Keyframe easing kinds.

/// Easing curve applied between a keyframe and its successor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EasingKind {
    Instant,
    Linear,
    CubicIn,
    CubicOut,
    CubicInOut,
    ElasticIn,
    ElasticOut,
    ElasticInOut,
    BounceIn,
    BounceOut,
    BounceInOut,
    BackIn,
    BackOut,
    BackInOut,
}

impl EasingKind {
    /// Map a wire tag to an easing kind.
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::Instant),
            1 => Some(Self::Linear),
            2 => Some(Self::CubicIn),
            3 => Some(Self::CubicOut),
            4 => Some(Self::CubicInOut),
            5 => Some(Self::ElasticIn),
            6 => Some(Self::ElasticOut),
            7 => Some(Self::ElasticInOut),
            8 => Some(Self::BounceIn),
            9 => Some(Self::BounceOut),
            10 => Some(Self::BounceInOut),
            11 => Some(Self::BackIn),
            12 => Some(Self::BackOut),
            13 => Some(Self::BackInOut),
            _ => None,
        }
    }

    /// Whether the kind is followed by an extra easing-amount float in the
    /// stream (cubic rate, elastic period).
    pub fn has_amount(&self) -> bool {
        matches!(
            self,
            Self::CubicIn
                | Self::CubicOut
                | Self::CubicInOut
                | Self::ElasticIn
                | Self::ElasticOut
                | Self::ElasticInOut
        )
    }
}

/// Easing kind plus its optional amount parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Easing {
    pub kind: EasingKind,
    /// Present only for the cubic and elastic kinds.
    pub amount: Option<f32>,
}

impl Easing {
    pub fn new(kind: EasingKind, amount: Option<f32>) -> Self {
        Self { kind, amount }
    }

    pub fn instant() -> Self {
        Self::new(EasingKind::Instant, None)
    }

    pub fn linear() -> Self {
        Self::new(EasingKind::Linear, None)
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::instant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_mapping() {
        assert_eq!(EasingKind::from_tag(0), Some(EasingKind::Instant));
        assert_eq!(EasingKind::from_tag(7), Some(EasingKind::ElasticInOut));
        assert_eq!(EasingKind::from_tag(13), Some(EasingKind::BackInOut));
        assert_eq!(EasingKind::from_tag(14), None);
    }

    #[test]
    fn test_amount_only_for_cubic_and_elastic() {
        assert!(EasingKind::CubicIn.has_amount());
        assert!(EasingKind::ElasticOut.has_amount());
        assert!(!EasingKind::Linear.has_amount());
        assert!(!EasingKind::BounceInOut.has_amount());
        assert!(!EasingKind::BackIn.has_amount());
    }
}
