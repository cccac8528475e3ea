//! Diesel column types for the domain transforms.
//!
//! Each newtype converts through its transformer at the SQL boundary, so a
//! row struct can use them directly:
//!
//! ```ignore
//! #[derive(Queryable)]
//! struct PostRow {
//!     id: IdColumn,
//!     published: FlagColumn,
//!     meta: Option<JsonTextColumn>,
//! }
//! ```
//!
//! `NULL` maps to `None` through diesel's `Option` support.

use std::io::Write as _;

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::{SmallInt, Text};

use crate::domain::transforms::{
    BooleanFlag, GeneratedId, JsonText, JsonValue, ValueTransformer, generate_id,
};

/// Boolean stored as `SMALLINT` `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow)]
#[diesel(sql_type = SmallInt)]
pub struct FlagColumn(pub bool);

impl ToSql<SmallInt, Pg> for FlagColumn {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(&BooleanFlag::encode(self.0).to_be_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<SmallInt, Pg> for FlagColumn {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let stored = <i16 as FromSql<SmallInt, Pg>>::from_sql(bytes)?;
        Ok(Self(BooleanFlag::decode(stored)))
    }
}

/// JSON document stored as `TEXT`, timestamps revived on read.
///
/// Malformed stored text is logged and read as `null`.
#[derive(Debug, Clone, PartialEq, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub struct JsonTextColumn(pub JsonValue);

impl JsonTextColumn {
    /// Serialised form written to the column.
    pub fn stored(&self) -> String {
        JsonText::new()
            .to_stored(Some(self.0.clone()))
            .unwrap_or_else(|| "{}".to_owned())
    }

    /// Decode stored text.
    pub fn parse(text: String) -> Self {
        Self(
            JsonText::new()
                .from_stored(Some(text))
                .unwrap_or(JsonValue::Null),
        )
    }

    /// Document for a nullable column, falling back to `transformer`'s
    /// default when the column is `NULL`.
    pub fn or_default(column: Option<Self>, transformer: &JsonText) -> Option<JsonValue> {
        match column {
            Some(Self(doc)) => Some(doc),
            None => transformer.from_stored(None),
        }
    }
}

impl ToSql<Text, Pg> for JsonTextColumn {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.stored().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for JsonTextColumn {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let text = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(Self::parse(text))
    }
}

/// Identifier stored as `TEXT`; the `"UUID"` placeholder and empty values
/// become generated ids.
#[derive(Debug, Clone, PartialEq, Eq, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub struct IdColumn(pub String);

impl IdColumn {
    /// Column asking for a generated id on write.
    pub fn placeholder() -> Self {
        Self(crate::domain::transforms::ID_PLACEHOLDER.to_owned())
    }

    /// Value written to the column.
    pub fn stored(&self) -> String {
        GeneratedId
            .to_stored(Some(self.0.clone()))
            .unwrap_or_else(generate_id)
    }

    /// Identifier for a possibly `NULL` column; absent values get a fresh id.
    pub fn resolve(column: Option<Self>) -> Self {
        Self(
            GeneratedId
                .from_stored(column.map(|Self(id)| id))
                .unwrap_or_else(generate_id),
        )
    }
}

impl ToSql<Text, Pg> for IdColumn {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.stored().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for IdColumn {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let stored = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(Self::resolve(Some(Self(stored))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn json_column_reads_malformed_text_as_null() {
        assert_eq!(JsonTextColumn::parse("{".to_owned()).0, JsonValue::Null);
    }

    #[rstest]
    fn json_column_stores_compact_text() {
        let column = JsonTextColumn(JsonValue::revive(json!({"n": 1})));
        assert_eq!(column.stored(), r#"{"n":1}"#);
    }

    #[rstest]
    fn json_column_null_uses_transformer_default() {
        let transformer = JsonText::with_default(json!([]));
        let doc = JsonTextColumn::or_default(None, &transformer).expect("default");
        assert_eq!(doc.into_json(), json!([]));
    }

    #[rstest]
    fn id_placeholder_is_replaced_when_stored() {
        let stored = IdColumn::placeholder().stored();
        assert_eq!(stored.len(), 32);
        assert_eq!(IdColumn("kept".to_owned()).stored(), "kept");
    }

    #[rstest]
    #[case(None)]
    #[case(Some(IdColumn(String::new())))]
    fn missing_ids_resolve_to_generated(#[case] column: Option<IdColumn>) {
        assert_eq!(IdColumn::resolve(column).0.len(), 32);
    }
}
