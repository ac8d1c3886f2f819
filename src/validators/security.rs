//! Presence checks for the credentials an operation's `security` requires.

use crate::error::SpecError;
use crate::violation::{Violation, ViolationKind};
use serde_json::{Map, Value};

/// Where a security scheme expects its credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Header(String),
    Query(String),
    Cookie(String),
}

impl Credential {
    /// Reads a Swagger 2.0 `securityDefinitions` entry or an OpenAPI 3
    /// `securitySchemes` entry.
    pub fn from_scheme(name: &str, scheme: &Value) -> Result<Self, SpecError> {
        let field = |key: &str| scheme.get(key).and_then(Value::as_str);
        match field("type") {
            Some("apiKey") => {
                let key_name = field("name").ok_or_else(|| {
                    SpecError::SwaggerSpecInvalid(format!("apiKey scheme '{}' has no name", name))
                })?;
                match field("in") {
                    Some("header") => Ok(Self::Header(key_name.to_string())),
                    Some("query") => Ok(Self::Query(key_name.to_string())),
                    Some("cookie") => Ok(Self::Cookie(key_name.to_string())),
                    other => Err(SpecError::SwaggerSpecInvalid(format!(
                        "apiKey scheme '{}' has unsupported location {:?}",
                        name, other
                    ))),
                }
            }
            Some("basic" | "http" | "oauth2" | "openIdConnect") => {
                Ok(Self::Header("Authorization".to_string()))
            }
            other => Err(SpecError::SwaggerSpecInvalid(format!(
                "security scheme '{}' has unknown type {:?}",
                name, other
            ))),
        }
    }

    fn is_present(&self, query: &[(String, String)], headers: &[(String, String)]) -> bool {
        match self {
            Self::Header(name) => headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)),
            Self::Query(name) => query.iter().any(|(n, _)| n == name),
            Self::Cookie(name) => headers
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case("cookie"))
                .flat_map(|(_, value)| value.split(';'))
                .any(|pair| pair.trim().split('=').next() == Some(name.as_str())),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Header(name) => format!("header {}", name),
            Self::Query(name) => format!("query parameter {}", name),
            Self::Cookie(name) => format!("cookie {}", name),
        }
    }
}

/// One entry of a `security` list: every scheme in it must be satisfied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecurityRequirement {
    pub schemes: Vec<(String, Credential)>,
}

/// Alternatives an operation accepts. No alternatives means no check.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecurityValidator {
    alternatives: Vec<SecurityRequirement>,
}

impl SecurityValidator {
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolves a `security` list against the declared schemes.
    pub fn from_requirements(requirements: &Value, schemes: &Map<String, Value>) -> Result<Self, SpecError> {
        let Some(requirements) = requirements.as_array() else {
            return Ok(Self::none());
        };
        let mut alternatives = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let Some(requirement) = requirement.as_object() else {
                continue;
            };
            let mut resolved = SecurityRequirement::default();
            for name in requirement.keys() {
                let scheme = schemes.get(name).ok_or_else(|| {
                    SpecError::SwaggerSpecInvalid(format!("security requirement uses undefined scheme '{}'", name))
                })?;
                resolved.schemes.push((name.clone(), Credential::from_scheme(name, scheme)?));
            }
            alternatives.push(resolved);
        }
        Ok(Self { alternatives })
    }

    pub fn is_enforced(&self) -> bool {
        !self.alternatives.is_empty()
    }

    /// Query parameter names credentials may arrive under.
    pub fn query_names(&self) -> impl Iterator<Item = &str> {
        self.alternatives
            .iter()
            .flat_map(|alternative| alternative.schemes.iter())
            .filter_map(|(_, credential)| match credential {
                Credential::Query(name) => Some(name.as_str()),
                _ => None,
            })
    }

    /// Passes when any alternative has all of its credentials present; an
    /// empty alternative (`{}`) allows anonymous access.
    pub fn validate(&self, query: &[(String, String)], headers: &[(String, String)]) -> Result<(), Vec<Violation>> {
        if !self.is_enforced() {
            return Ok(());
        }
        let satisfied = self.alternatives.iter().any(|alternative| {
            alternative
                .schemes
                .iter()
                .all(|(_, credential)| credential.is_present(query, headers))
        });
        if satisfied {
            return Ok(());
        }

        let violations = self
            .alternatives
            .iter()
            .flat_map(|alternative| alternative.schemes.iter())
            .filter(|(_, credential)| !credential.is_present(query, headers))
            .map(|(scheme, credential)| {
                Violation::new(
                    ViolationKind::MissingCredentials,
                    "security",
                    format!("{} required by security scheme '{}' is missing", credential.describe(), scheme),
                )
            })
            .collect();
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schemes() -> Map<String, Value> {
        json!({
            "key": {"type": "apiKey", "name": "X-Api-Key", "in": "header"},
            "token": {"type": "apiKey", "name": "token", "in": "query"},
            "basic": {"type": "basic"}
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_any_alternative_satisfies() {
        let security =
            SecurityValidator::from_requirements(&json!([{"key": []}, {"token": [], "basic": []}]), &schemes())
                .unwrap();
        assert!(security.validate(&[], &pairs(&[("x-api-key", "s3cret")])).is_ok());
        assert!(security
            .validate(&pairs(&[("token", "t")]), &pairs(&[("Authorization", "Basic dTpw")]))
            .is_ok());

        // Half of the second alternative is not enough.
        let violations = security.validate(&pairs(&[("token", "t")]), &[]).unwrap_err();
        assert!(violations.iter().all(|v| v.kind == ViolationKind::MissingCredentials));
        assert!(violations.iter().any(|v| v.message.contains("X-Api-Key")));
        assert!(violations.iter().any(|v| v.message.contains("Authorization")));
    }

    #[test]
    fn test_empty_requirement_allows_anonymous() {
        let security = SecurityValidator::from_requirements(&json!([{"key": []}, {}]), &schemes()).unwrap();
        assert!(security.validate(&[], &[]).is_ok());
        assert!(!SecurityValidator::none().is_enforced());
        assert!(SecurityValidator::from_requirements(&json!([]), &schemes()).unwrap().validate(&[], &[]).is_ok());
    }

    #[test]
    fn test_undefined_scheme_is_rejected() {
        let err = SecurityValidator::from_requirements(&json!([{"nope": []}]), &schemes()).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_cookie_credential() {
        let cookie = Credential::from_scheme("session", &json!({"type": "apiKey", "name": "sid", "in": "cookie"}))
            .unwrap();
        assert!(cookie.is_present(&[], &pairs(&[("Cookie", "theme=dark; sid=abc")])));
        assert!(!cookie.is_present(&[], &pairs(&[("Cookie", "sidekick=1")])));
    }

    #[test]
    fn test_query_names() {
        let security = SecurityValidator::from_requirements(&json!([{"token": []}, {"key": []}]), &schemes()).unwrap();
        assert_eq!(security.query_names().collect::<Vec<_>>(), vec!["token"]);
    }
}
