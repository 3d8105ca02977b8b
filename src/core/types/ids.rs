//! Identifiers minted by the SLAM back-end.

/// Globally unique keyframe identifier, allocated by the back-end.
pub type KeyframeId = u64;

/// Identifier returned by the back-end when a factor is accepted.
pub type FactorId = u64;

/// Sentinel for "no previous keyframe".
pub const INVALID_KEYFRAME_ID: KeyframeId = KeyframeId::MAX;

/// Sentinel for "no factor".
pub const INVALID_FACTOR_ID: FactorId = FactorId::MAX;
