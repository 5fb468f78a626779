//! Bound parameter values.
//!
//! [`SqlValue`] is the closed set of values a [`SqlBuffer`](crate::SqlBuffer) can bind.
//! It is a concrete enum (instead of `dyn ToSql`) because the literal renderer has to
//! format every bound value in the target dialect's syntax.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A value bound to a SQL placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value, if it has one.
    ///
    /// Numeric text is accepted so that flag columns configured as strings
    /// (`"0"` / `"1"`) still compare numerically.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Bool(v) => Some(i64::from(*v)),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short type name used in logs and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::DateTime(_) => "datetime",
            SqlValue::Date(_) => "date",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Json(_) => "json",
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(f64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::DateTime(v.naive_utc())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

#[cfg(feature = "postgres")]
mod pg {
    use super::SqlValue;
    use bytes::BytesMut;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use std::error::Error;
    use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};

    type BoxError = Box<dyn Error + Sync + Send>;

    fn is_text(ty: &Type) -> bool {
        *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
            || *ty == Type::UNKNOWN
    }

    impl ToSql for SqlValue {
        fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
            match self {
                SqlValue::Null => Ok(IsNull::Yes),
                SqlValue::Bool(v) => v.to_sql(ty, out),
                SqlValue::Int(v) => {
                    if *ty == Type::INT2 {
                        i16::try_from(*v)?.to_sql(ty, out)
                    } else if *ty == Type::INT4 {
                        i32::try_from(*v)?.to_sql(ty, out)
                    } else if *ty == Type::FLOAT8 {
                        (*v as f64).to_sql(ty, out)
                    } else if *ty == Type::FLOAT4 {
                        (*v as f32).to_sql(ty, out)
                    } else if *ty == Type::BOOL {
                        (*v != 0).to_sql(ty, out)
                    } else if is_text(ty) {
                        v.to_string().to_sql(ty, out)
                    } else {
                        v.to_sql(ty, out)
                    }
                }
                SqlValue::Float(v) => {
                    if *ty == Type::FLOAT4 {
                        (*v as f32).to_sql(ty, out)
                    } else {
                        v.to_sql(ty, out)
                    }
                }
                SqlValue::Text(v) => v.to_sql(ty, out),
                SqlValue::DateTime(v) => {
                    if *ty == Type::TIMESTAMPTZ {
                        v.and_utc().to_sql(ty, out)
                    } else {
                        v.to_sql(ty, out)
                    }
                }
                SqlValue::Date(v) => v.to_sql(ty, out),
                SqlValue::Uuid(v) => v.to_sql(ty, out),
                SqlValue::Bytes(v) => v.to_sql(ty, out),
                SqlValue::Json(v) => v.to_sql(ty, out),
            }
        }

        fn accepts(_ty: &Type) -> bool {
            true
        }

        to_sql_checked!();
    }

    impl<'a> FromSql<'a> for SqlValue {
        fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
            let value = if *ty == Type::BOOL {
                SqlValue::Bool(bool::from_sql(ty, raw)?)
            } else if *ty == Type::INT2 {
                SqlValue::Int(i64::from(i16::from_sql(ty, raw)?))
            } else if *ty == Type::INT4 {
                SqlValue::Int(i64::from(i32::from_sql(ty, raw)?))
            } else if *ty == Type::INT8 {
                SqlValue::Int(i64::from_sql(ty, raw)?)
            } else if *ty == Type::FLOAT4 {
                SqlValue::Float(f64::from(f32::from_sql(ty, raw)?))
            } else if *ty == Type::FLOAT8 {
                SqlValue::Float(f64::from_sql(ty, raw)?)
            } else if *ty == Type::TIMESTAMP {
                SqlValue::DateTime(NaiveDateTime::from_sql(ty, raw)?)
            } else if *ty == Type::TIMESTAMPTZ {
                SqlValue::DateTime(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc())
            } else if *ty == Type::DATE {
                SqlValue::Date(NaiveDate::from_sql(ty, raw)?)
            } else if *ty == Type::UUID {
                SqlValue::Uuid(uuid::Uuid::from_sql(ty, raw)?)
            } else if *ty == Type::JSON || *ty == Type::JSONB {
                SqlValue::Json(serde_json::Value::from_sql(ty, raw)?)
            } else if *ty == Type::BYTEA {
                SqlValue::Bytes(Vec::<u8>::from_sql(ty, raw)?)
            } else if is_text(ty) {
                SqlValue::Text(String::from_sql(ty, raw)?)
            } else {
                return Err(format!("unsupported column type {ty}").into());
            };
            Ok(value)
        }

        fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
            Ok(SqlValue::Null)
        }

        fn accepts(_ty: &Type) -> bool {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_pick_the_expected_variant() {
        assert_eq!(SqlValue::from(5_i32), SqlValue::Int(5));
        assert_eq!(SqlValue::from("x"), SqlValue::Text("x".into()));
        assert_eq!(SqlValue::from(None::<i32>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(true)), SqlValue::Bool(true));
    }

    #[test]
    fn as_i64_accepts_numeric_text() {
        assert_eq!(SqlValue::from("12").as_i64(), Some(12));
        assert_eq!(SqlValue::from("E").as_i64(), None);
        assert_eq!(SqlValue::Float(1.5).as_i64(), None);
    }

    #[test]
    fn deserializes_scalars_untagged() {
        let v: SqlValue = serde_json::from_str("1").unwrap();
        assert_eq!(v, SqlValue::Int(1));
        let v: SqlValue = serde_json::from_str("\"D\"").unwrap();
        assert_eq!(v, SqlValue::Text("D".into()));
        let v: SqlValue = serde_json::from_str("null").unwrap();
        assert_eq!(v, SqlValue::Null);
    }
}
