//! Shared primitive identifiers.

/// Monotonic ownership record identifier.
pub type OwnershipId = u64;
/// Gemstone identifier owning a chain of ownership records.
pub type GemstoneId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;
