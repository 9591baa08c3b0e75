//! Request validation from catalog rules. Collects every failing field instead of stopping at the first.

use crate::catalog::{FieldKind, ResolvedEntity, ValidationRule};
use crate::error::FieldErrors;
use crate::service::phone::is_formatted_phone;
use crate::service::slug::is_slug;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// Partial update of an existing row.
    Update { id: i64 },
}

impl WriteMode {
    pub fn ignore_id(&self) -> Option<i64> {
        match self {
            WriteMode::Create => None,
            WriteMode::Update { id } => Some(*id),
        }
    }
}

pub struct RequestValidator;

impl RequestValidator {
    /// Bring form-style input to column types in place: empty strings become null,
    /// numeric and boolean strings are parsed, JSON columns accept encoded strings.
    pub fn coerce(entity: &ResolvedEntity, body: &mut HashMap<String, Value>, errors: &mut FieldErrors) {
        for (name, value) in body.iter_mut() {
            let Some(col) = entity.column(name) else { continue };
            if matches!(value, Value::String(s) if s.is_empty()) {
                *value = Value::Null;
                continue;
            }
            if value.is_null() {
                continue;
            }
            let coerced = match col.kind {
                Some(FieldKind::Integer) | Some(FieldKind::BigInt) => coerce_integer(value),
                Some(FieldKind::Decimal) => coerce_number(value),
                Some(FieldKind::Boolean) => coerce_bool(value),
                Some(FieldKind::Json) => coerce_json(value),
                Some(FieldKind::Text) | Some(FieldKind::LongText) | Some(FieldKind::Date) | Some(FieldKind::Timestamp) | None => {
                    coerce_text(value)
                }
            };
            match coerced {
                Ok(v) => *value = v,
                Err(expected) => {
                    errors.entry(name.clone()).or_insert_with(|| format!("{} must be {}", name, expected));
                }
            }
        }
    }

    /// Check rules. On create every required field must be present; on update only
    /// the keys present are checked. A null sent for a NOT NULL column is rejected
    /// unless a create can fall back to the column default.
    pub fn validate(entity: &ResolvedEntity, body: &HashMap<String, Value>, mode: WriteMode, errors: &mut FieldErrors) {
        for (field, value) in body {
            if !value.is_null() || errors.contains_key(field) {
                continue;
            }
            let Some(col) = entity.column(field) else { continue };
            let keeps_default = mode == WriteMode::Create && col.has_default();
            if !col.nullable && !keeps_default {
                errors.insert(field.clone(), format!("{} is required", field));
            }
        }
        for (field, rule) in &entity.rules {
            if errors.contains_key(field) {
                continue;
            }
            let value = body.get(field);
            let missing = match value {
                None => mode == WriteMode::Create,
                Some(v) => v.is_null(),
            };
            if missing {
                if rule.required == Some(true) {
                    errors.insert(field.clone(), format!("{} is required", field));
                }
                continue;
            }
            if let Some(v) = value {
                if let Err(msg) = check_field(field, v, rule, entity.patterns.get(field)) {
                    errors.insert(field.clone(), msg);
                }
            }
        }
    }
}

fn coerce_integer(v: &Value) -> Result<Value, &'static str> {
    match v {
        Value::Number(n) if n.is_i64() => Ok(v.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::Number((f as i64).into())),
            _ => Err("an integer"),
        },
        Value::String(s) => s.trim().parse::<i64>().map(|n| Value::Number(n.into())).map_err(|_| "an integer"),
        _ => Err("an integer"),
    }
}

fn coerce_number(v: &Value) -> Result<Value, &'static str> {
    match v {
        Value::Number(_) => Ok(v.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or("a number"),
        _ => Err("a number"),
    }
}

fn coerce_bool(v: &Value) -> Result<Value, &'static str> {
    match v {
        Value::Bool(_) => Ok(v.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(Value::Bool(false)),
            Some(1) => Ok(Value::Bool(true)),
            _ => Err("true or false"),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Ok(Value::Bool(true)),
            "false" | "0" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err("true or false"),
        },
        _ => Err("true or false"),
    }
}

fn coerce_json(v: &Value) -> Result<Value, &'static str> {
    match v {
        Value::Array(_) | Value::Object(_) => Ok(v.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => Ok(parsed),
            _ => Err("a JSON array or object"),
        },
        _ => Err("a JSON array or object"),
    }
}

fn coerce_text(v: &Value) -> Result<Value, &'static str> {
    match v {
        Value::String(_) => Ok(v.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err("a string"),
    }
}

fn check_field(col: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>) -> Result<(), String> {
    if let Some(format) = &rule.format {
        check_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let chars = s.chars().count();
        if let Some(max) = rule.max_length {
            if chars > max as usize {
                return Err(format!("{} must be at most {} characters", col, max));
            }
        }
        if let Some(min) = rule.min_length {
            if chars < min as usize {
                return Err(format!("{} must be at least {} characters", col, min));
            }
        }
        if let Some(re) = pattern {
            if !re.is_match(s) {
                return Err(format!("{} format is invalid", col));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let names: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(str::to_string).unwrap_or_else(|| a.to_string()))
                .collect();
            return Err(format!("{} must be one of: {}", col, names.join(", ")));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(format!("{} must be at least {}", col, min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(format!("{} must be at most {}", col, max));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn is_match_cached(re: &'static OnceLock<Option<Regex>>, pattern: &str, s: &str) -> bool {
    re.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .map(|r| r.is_match(s))
        .unwrap_or(false)
}

static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
static URL_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Accepts RFC 3339 and the `datetime-local` input shapes.
pub fn parse_datetime(s: &str) -> bool {
    if chrono::DateTime::parse_from_rfc3339(s).is_ok() {
        return true;
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .any(|f| chrono::NaiveDateTime::parse_from_str(s, f).is_ok())
}

fn check_format(col: &str, v: &Value, format: &str) -> Result<(), String> {
    let Some(s) = v.as_str() else {
        return Err(format!("{} must be a string", col));
    };
    let ok = match format {
        "email" => is_match_cached(&EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$", s),
        "url" => is_match_cached(&URL_RE, r"^https?://[^\s/$.?#][^\s]*$", s),
        "phone" => is_formatted_phone(s),
        "slug" => is_slug(s),
        "date" => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        "datetime" => parse_datetime(s),
        _ => true,
    };
    if ok {
        return Ok(());
    }
    Err(match format {
        "email" => format!("{} must be a valid email address", col),
        "url" => format!("{} must be a valid URL", col),
        "phone" => format!("{} must be a valid phone number", col),
        "slug" => format!("{} may only contain lowercase letters, numbers and dashes", col),
        "date" => format!("{} must be a valid date (YYYY-MM-DD)", col),
        _ => format!("{} must be a valid date and time", col),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{cms_catalog, resolve, Catalog};
    use serde_json::json;

    fn catalog() -> Catalog {
        resolve(&cms_catalog(), "cms").expect("catalog")
    }

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().expect("object").clone().into_iter().collect()
    }

    #[test]
    fn create_collects_every_missing_required_field() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let mut errors = FieldErrors::new();
        RequestValidator::validate(posts, &body(json!({"excerpt": "x"})), WriteMode::Create, &mut errors);
        assert_eq!(errors.get("title").map(String::as_str), Some("title is required"));
        assert_eq!(errors.get("content").map(String::as_str), Some("content is required"));
        assert!(!errors.contains_key("status"));
    }

    #[test]
    fn update_only_checks_present_keys() {
        let c = catalog();
        let posts = c.entity("posts").expect("posts");
        let mut errors = FieldErrors::new();
        RequestValidator::validate(posts, &body(json!({"excerpt": "x"})), WriteMode::Update { id: 1 }, &mut errors);
        assert!(errors.is_empty());
        RequestValidator::validate(posts, &body(json!({"title": null})), WriteMode::Update { id: 1 }, &mut errors);
        assert_eq!(errors.get("title").map(String::as_str), Some("title is required"));
    }

    #[test]
    fn update_rejects_null_for_not_null_columns() {
        let c = catalog();
        let users = c.entity("users").expect("users");
        let mut b = body(json!({"role": "", "status": null, "phone": ""}));
        let mut errors = FieldErrors::new();
        RequestValidator::coerce(users, &mut b, &mut errors);
        RequestValidator::validate(users, &b, WriteMode::Update { id: 1 }, &mut errors);
        assert_eq!(errors.get("role").map(String::as_str), Some("role is required"));
        assert_eq!(errors.get("status").map(String::as_str), Some("status is required"));
        assert!(!errors.contains_key("phone"));

        let subs = c.entity("subscriptions").expect("subscriptions");
        let mut errors = FieldErrors::new();
        RequestValidator::validate(subs, &body(json!({"currency": null})), WriteMode::Update { id: 1 }, &mut errors);
        assert_eq!(errors.get("currency").map(String::as_str), Some("currency is required"));
    }

    #[test]
    fn create_lets_null_fall_back_to_column_default() {
        let c = catalog();
        let users = c.entity("users").expect("users");
        let b = body(json!({"name": "Ada", "email": "ada@example.com", "role": null, "status": null}));
        let mut errors = FieldErrors::new();
        RequestValidator::validate(users, &b, WriteMode::Create, &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn formats_lengths_and_enumerations() {
        let c = catalog();
        let conferences = c.entity("conferences").expect("conferences");
        let mut errors = FieldErrors::new();
        let b = body(json!({
            "title": "x".repeat(201),
            "start_date": "2024-13-01",
            "contact_email": "nobody",
            "contact_phone": "555-1234",
            "website": "ftp://example.com",
            "status": "cancelled"
        }));
        RequestValidator::validate(conferences, &b, WriteMode::Create, &mut errors);
        assert_eq!(errors["title"], "title must be at most 200 characters");
        assert_eq!(errors["start_date"], "start_date must be a valid date (YYYY-MM-DD)");
        assert_eq!(errors["contact_email"], "contact_email must be a valid email address");
        assert_eq!(errors["contact_phone"], "contact_phone must be a valid phone number");
        assert_eq!(errors["website"], "website must be a valid URL");
        assert_eq!(errors["status"], "status must be one of: live, schedule, archive");
    }

    #[test]
    fn ranges_and_patterns() {
        let c = catalog();
        let subs = c.entity("subscriptions").expect("subscriptions");
        let mut errors = FieldErrors::new();
        let b = body(json!({"amount": -1, "currency": "usd"}));
        RequestValidator::validate(subs, &b, WriteMode::Update { id: 2 }, &mut errors);
        assert_eq!(errors["amount"], "amount must be at least 0");
        assert_eq!(errors["currency"], "currency format is invalid");
    }

    #[test]
    fn coerce_parses_form_strings() {
        let c = catalog();
        let episodes = c.entity("episodes").expect("episodes");
        let mut b = body(json!({"season": "2", "episode_number": "", "tags": "[\"a\"]", "duration_seconds": "long"}));
        let mut errors = FieldErrors::new();
        RequestValidator::coerce(episodes, &mut b, &mut errors);
        assert_eq!(b["season"], json!(2));
        assert_eq!(b["episode_number"], Value::Null);
        assert_eq!(b["tags"], json!(["a"]));
        assert_eq!(errors["duration_seconds"], "duration_seconds must be an integer");
    }

    #[test]
    fn datetime_shapes() {
        assert!(parse_datetime("2024-05-01T09:30:00Z"));
        assert!(parse_datetime("2024-05-01T09:30"));
        assert!(parse_datetime("2024-05-01 09:30:15"));
        assert!(!parse_datetime("May 1st"));
    }
}
