//! Visibility masks parallel to an upstream sequence.

/// Number of visible slots before `index`.
pub(crate) fn rank(mask: &[bool], index: usize) -> usize {
    mask[..index].iter().filter(|&&visible| visible).count()
}
