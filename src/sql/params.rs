//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
/// Placeholders always carry a `$n::<type>` cast, so each variant only has to name its own wire type.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Null | PgBindValue::String(_) => <String as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::Bool(_) => <bool as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::Json(_) => <Value as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_keep_integer_precision() {
        assert_eq!(PgBindValue::from_json(&json!(9007199254740993i64)), PgBindValue::I64(9007199254740993));
        assert_eq!(PgBindValue::from_json(&json!(12.5)), PgBindValue::F64(12.5));
    }

    #[test]
    fn uuid_like_strings_stay_text() {
        let s = "6f1c7e0a-2c3b-4a5d-8e9f-001122334455";
        assert_eq!(PgBindValue::from_json(&json!(s)), PgBindValue::String(s.into()));
    }

    #[test]
    fn arrays_and_objects_bind_as_json() {
        assert!(matches!(PgBindValue::from_json(&json!(["a", "b"])), PgBindValue::Json(_)));
        assert!(matches!(PgBindValue::from_json(&json!({"k": 1})), PgBindValue::Json(_)));
    }
}
