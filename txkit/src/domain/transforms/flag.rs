//! Boolean stored as a small integer.

use super::ValueTransformer;

/// Maps `bool` to `0`/`1`; any non-zero stored value reads as `true`.
///
/// # Examples
/// ```
/// use txkit::domain::transforms::{BooleanFlag, ValueTransformer};
///
/// assert_eq!(BooleanFlag.from_stored(Some(2)), Some(true));
/// assert_eq!(BooleanFlag.to_stored(Some(false)), Some(0));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BooleanFlag;

impl BooleanFlag {
    /// Stored form of a flag.
    pub const fn encode(value: bool) -> i16 {
        if value { 1 } else { 0 }
    }

    /// Flag for a stored integer.
    pub const fn decode(stored: i16) -> bool {
        stored != 0
    }
}

impl ValueTransformer for BooleanFlag {
    type Model = bool;
    type Stored = i16;

    fn to_stored(&self, value: Option<bool>) -> Option<i16> {
        value.map(Self::encode)
    }

    fn from_stored(&self, value: Option<i16>) -> Option<bool> {
        value.map(Self::decode)
    }
}
