//! Identifier column with a generation placeholder.

use uuid::Uuid;

use super::ValueTransformer;

/// Sentinel asking for a freshly generated id.
pub const ID_PLACEHOLDER: &str = "UUID";

/// Fresh identifier: a v4 UUID as 32 lowercase hex characters.
///
/// # Examples
/// ```
/// let id = txkit::domain::transforms::generate_id();
/// assert_eq!(id.len(), 32);
/// assert!(!id.contains('-'));
/// ```
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Replaces the [`ID_PLACEHOLDER`] with a generated id.
///
/// On read, absent or empty values are also replaced so every loaded row
/// carries an id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratedId;

impl ValueTransformer for GeneratedId {
    type Model = String;
    type Stored = String;

    fn to_stored(&self, value: Option<String>) -> Option<String> {
        value.map(|id| if id == ID_PLACEHOLDER { generate_id() } else { id })
    }

    fn from_stored(&self, value: Option<String>) -> Option<String> {
        match value {
            Some(id) if !id.is_empty() && id != ID_PLACEHOLDER => Some(id),
            _ => Some(generate_id()),
        }
    }
}
