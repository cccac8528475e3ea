//! Field transforms applied between model values and stored columns.
//!
//! Each transformer is a pair of pure functions. Absent values stay absent
//! unless a transformer documents a default.

mod flag;
mod generated_id;
mod json_text;

pub use flag::BooleanFlag;
pub use generated_id::{GeneratedId, ID_PLACEHOLDER, generate_id};
pub use json_text::{JsonText, JsonValue, RawJson};

/// Bidirectional conversion between a model value and its stored form.
pub trait ValueTransformer {
    /// Value seen by application code.
    type Model;
    /// Value written to storage.
    type Stored;

    /// Convert a model value for writing.
    fn to_stored(&self, value: Option<Self::Model>) -> Option<Self::Stored>;

    /// Convert a stored value for reading.
    fn from_stored(&self, value: Option<Self::Stored>) -> Option<Self::Model>;
}
