//! Claim schema carried by bearer tokens.
//!
//! Registered claims (RFC 7519 §4.1) are typed; anything else the issuer
//! adds is kept verbatim in [`Claims::extra`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `aud` claim, which may be a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "api"`
    Single(String),
    /// `"aud": ["api", "admin"]`
    Many(Vec<String>),
}

impl Audience {
    /// Returns `true` if `name` is one of the audiences.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Audience::Single(a) => a == name,
            Audience::Many(list) => list.iter().any(|a| a == name),
        }
    }
}

/// Claims extracted from a verified token.
///
/// Deserialisation never fails on a JSON object: a registered claim whose
/// value has an unexpected type stays in [`Claims::extra`] under its own name
/// instead of filling the typed field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Claims {
    /// Subject the token was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Intended audience(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiry, seconds since the Unix epoch. Fractional values are rounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,

    /// Not-before, seconds since the Unix epoch. Fractional values are rounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,

    /// Issued-at, seconds since the Unix epoch. Fractional values are rounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,

    /// Unique token identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Private and public claims not covered above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for Claims {
    fn from(mut map: Map<String, Value>) -> Self {
        Self {
            sub: take(&mut map, "sub", string),
            iss: take(&mut map, "iss", string),
            aud: take(&mut map, "aud", audience),
            exp: take(&mut map, "exp", numeric_date),
            nbf: take(&mut map, "nbf", numeric_date),
            iat: take(&mut map, "iat", numeric_date),
            jti: take(&mut map, "jti", string),
            extra: map,
        }
    }
}

/// Remove `name` from `map` only if `convert` accepts its value.
fn take<T>(map: &mut Map<String, Value>, name: &str, convert: fn(&Value) -> Option<T>) -> Option<T> {
    let typed = convert(map.get(name)?)?;
    map.remove(name);
    Some(typed)
}

fn string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn audience(value: &Value) -> Option<Audience> {
    Audience::deserialize(value).ok()
}

/// RFC 7519 NumericDate: integer or fractional seconds, never negative.
fn numeric_date(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs >= 0.0 && *secs < u64::MAX as f64)
            .map(|secs| secs.round() as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialises_registered_and_private_claims() {
        let c: Claims = serde_json::from_value(json!({
            "sub": "user-42",
            "exp": 1_900_000_000u64,
            "aud": ["api", "admin"],
            "scope": "read write",
        }))
        .unwrap();
        assert_eq!(c.sub.as_deref(), Some("user-42"));
        assert_eq!(c.exp, Some(1_900_000_000));
        assert!(c.aud.as_ref().unwrap().contains("admin"));
        assert_eq!(c.extra["scope"], "read write");
        assert!(c.iss.is_none());
    }

    #[test]
    fn single_audience() {
        let c: Claims = serde_json::from_value(json!({ "aud": "api" })).unwrap();
        assert_eq!(c.aud, Some(Audience::Single("api".into())));
        assert!(!c.aud.unwrap().contains("admin"));
    }

    #[test]
    fn absent_claims_are_not_serialised() {
        let c = Claims {
            sub: Some("svc".into()),
            ..Claims::default()
        };
        assert_eq!(serde_json::to_value(&c).unwrap(), json!({ "sub": "svc" }));
    }

    #[test]
    fn fractional_dates_are_rounded() {
        let c: Claims = serde_json::from_value(json!({
            "exp": 1_900_000_000.6,
            "iat": 1_800_000_000.2,
        }))
        .unwrap();
        assert_eq!(c.exp, Some(1_900_000_001));
        assert_eq!(c.iat, Some(1_800_000_000));
        assert!(c.extra.is_empty());
    }

    #[test]
    fn mistyped_registered_claims_fall_back_to_extra() {
        let c: Claims = serde_json::from_value(json!({
            "sub": 42,
            "jti": { "n": 1 },
            "iss": "issuer",
            "nbf": "soon",
            "aud": 7,
        }))
        .unwrap();
        assert!(c.sub.is_none());
        assert!(c.jti.is_none());
        assert!(c.nbf.is_none());
        assert!(c.aud.is_none());
        assert_eq!(c.iss.as_deref(), Some("issuer"));
        assert_eq!(c.extra["sub"], 42);
        assert_eq!(c.extra["jti"], json!({ "n": 1 }));
        assert_eq!(c.extra["nbf"], "soon");
        assert_eq!(c.extra["aud"], 7);
        assert!(!c.extra.contains_key("iss"));
    }

    #[test]
    fn negative_date_is_not_a_numeric_date() {
        let c: Claims = serde_json::from_value(json!({ "iat": -5 })).unwrap();
        assert!(c.iat.is_none());
        assert_eq!(c.extra["iat"], -5);
    }
}
