//! `$ref` classification, target computation and the marshaled key format
//! used to name collected definitions.
//!
//! A marshaled key is the four components of a target location
//! (`scheme`, `host`, `path`, `fragment`), each escaped so that every byte
//! outside `[A-Za-z0-9.-]` becomes `_XX`, joined by `_.`. An escape always
//! starts with `_` followed by a hex digit, so the separator is never produced
//! by escaping and the split on unmarshal is unambiguous.

use crate::error::SpecError;
use crate::spec::document::without_fragment;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

const SEPARATOR: &str = "_.";
const SUPPORTED_SCHEMES: [&str; 3] = ["file", "http", "https"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `#/definitions/Pet`
    Internal,
    /// `models/pet.json#/Pet`
    RelativeFile,
    /// `/specs/pet.json#/Pet` or `file:///specs/pet.json`
    AbsoluteFile,
    /// `https://example.com/pet.json#/Pet`
    Remote,
}

impl ReferenceKind {
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with('#') {
            return Self::Internal;
        }
        match Url::parse(reference) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Remote,
            Ok(_) => Self::AbsoluteFile,
            Err(_) if reference.starts_with("//") => Self::Remote,
            Err(_) if reference.starts_with('/') => Self::AbsoluteFile,
            Err(_) => Self::RelativeFile,
        }
    }
}

/// Absolute location of a `$ref` target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefTarget {
    pub location: Url,
    /// JSON pointer into the document at `location`, percent-decoded.
    pub fragment: String,
}

impl RefTarget {
    /// Combines the origin of the document containing `reference` with it.
    pub fn resolve(origin: &Url, reference: &str) -> Result<Self, SpecError> {
        if reference.trim().is_empty() {
            return Err(SpecError::invalid_target(reference, "empty reference"));
        }
        let joined = origin
            .join(reference)
            .map_err(|e| SpecError::invalid_target(reference, e.to_string()))?;
        if !SUPPORTED_SCHEMES.contains(&joined.scheme()) {
            return Err(SpecError::invalid_target(
                reference,
                format!("unsupported scheme '{}'", joined.scheme()),
            ));
        }
        let fragment = joined
            .fragment()
            .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            location: without_fragment(&joined),
            fragment,
        })
    }

    /// Local ref to this target once it lives in the output document.
    pub fn local_ref(&self) -> String {
        format!("#{}", self.fragment)
    }

    pub fn display(&self) -> String {
        format!("{}#{}", self.location, self.fragment)
    }
}

/// Looks up a JSON pointer fragment (`""` is the whole document).
pub fn lookup_fragment<'a>(document: &'a Value, fragment: &str) -> Option<&'a Value> {
    if fragment.is_empty() {
        return Some(document);
    }
    if !fragment.starts_with('/') {
        return None;
    }
    document.pointer(fragment)
}

/// Escapes one JSON pointer segment.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Structured form of a marshaled key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarshalTarget {
    pub scheme: String,
    pub host: String,
    /// For `file` targets: relative to the root document's directory when possible.
    pub path: String,
    pub fragment: String,
}

impl MarshalTarget {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            path: path.into(),
            fragment: fragment.into(),
        }
    }

    /// Describes `target` relative to `root_dir` (the root document's directory).
    pub fn from_target(target: &RefTarget, root_dir: &Url) -> Self {
        let location = &target.location;
        let scheme = location.scheme().to_string();
        if scheme == "file" {
            let path = root_dir
                .make_relative(location)
                .filter(|relative| !relative.is_empty())
                .unwrap_or_else(|| location.path().to_string());
            return Self::new(scheme, "", path, target.fragment.clone());
        }
        let host = match (location.host_str(), location.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        let path = match location.query() {
            Some(query) => format!("{}?{}", location.path(), query),
            None => location.path().to_string(),
        };
        Self::new(scheme, host, path, target.fragment.clone())
    }

    /// Rebuilds the absolute target this key stands for.
    pub fn to_target(&self, root_dir: &Url) -> Result<RefTarget, SpecError> {
        let location = if self.scheme == "file" {
            root_dir.join(&self.path)
        } else {
            Url::parse(&format!("{}://{}{}", self.scheme, self.host, self.path))
        }
        .map_err(|e| SpecError::invalid_target(self.path.clone(), e.to_string()))?;
        Ok(RefTarget {
            location,
            fragment: self.fragment.clone(),
        })
    }

    pub fn marshal(&self) -> Result<String, SpecError> {
        if self.scheme.is_empty() && self.host.is_empty() && self.path.is_empty() {
            return Err(SpecError::invalid_target("", "empty target"));
        }
        if !SUPPORTED_SCHEMES.contains(&self.scheme.as_str()) {
            return Err(SpecError::invalid_target(
                format!("{}://{}{}", self.scheme, self.host, self.path),
                format!("unsupported scheme '{}'", self.scheme),
            ));
        }
        Ok([&self.scheme, &self.host, &self.path, &self.fragment]
            .iter()
            .map(|component| escape_component(component))
            .collect::<Vec<_>>()
            .join(SEPARATOR))
    }

    pub fn unmarshal(key: &str) -> Result<Self, SpecError> {
        let parts: Vec<&str> = key.split(SEPARATOR).collect();
        if parts.len() != 4 {
            return Err(SpecError::invalid_target(
                key,
                format!("expected 4 key components, found {}", parts.len()),
            ));
        }
        let decoded = parts
            .iter()
            .map(|part| unescape_component(part).map_err(|reason| SpecError::invalid_target(key, reason)))
            .collect::<Result<Vec<_>, _>>()?;
        let target = Self::new(
            decoded[0].clone(),
            decoded[1].clone(),
            decoded[2].clone(),
            decoded[3].clone(),
        );
        if !SUPPORTED_SCHEMES.contains(&target.scheme.as_str()) {
            return Err(SpecError::invalid_target(
                key,
                format!("unsupported scheme '{}'", target.scheme),
            ));
        }
        Ok(target)
    }
}

/// Marshals the location of `target` into a key usable inside a JSON pointer.
pub fn marshal_target(target: &RefTarget, root_dir: &Url) -> Result<String, SpecError> {
    MarshalTarget::from_target(target, root_dir).marshal()
}

/// Inverse of [`marshal_target`].
pub fn unmarshal_target(key: &str, root_dir: &Url) -> Result<RefTarget, SpecError> {
    MarshalTarget::unmarshal(key)?.to_target(root_dir)
}

fn escape_component(component: &str) -> String {
    let mut escaped = String::with_capacity(component.len());
    for byte in component.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("_{:02X}", byte));
        }
    }
    escaped
}

fn unescape_component(component: &str) -> Result<String, String> {
    let bytes = component.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                let hex = component
                    .get(i + 1..i + 3)
                    .ok_or_else(|| format!("truncated escape in '{}'", component))?;
                // Exactly the two uppercase digits `escape_component` writes.
                if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
                    return Err(format!("invalid escape '_{}' in '{}'", hex, component));
                }
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| format!("invalid escape '_{}' in '{}'", hex, component))?;
                decoded.push(byte);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'.' || b == b'-' => {
                decoded.push(b);
                i += 1;
            }
            other => {
                return Err(format!(
                    "unexpected character '{}' in '{}'",
                    other as char, component
                ))
            }
        }
    }
    String::from_utf8(decoded).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root_dir() -> Url {
        Url::parse("file:///specs/").unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(ReferenceKind::classify("#/definitions/Pet"), ReferenceKind::Internal);
        assert_eq!(ReferenceKind::classify("pet.json#/Pet"), ReferenceKind::RelativeFile);
        assert_eq!(ReferenceKind::classify("../a/pet.yaml"), ReferenceKind::RelativeFile);
        assert_eq!(ReferenceKind::classify("/abs/pet.json"), ReferenceKind::AbsoluteFile);
        assert_eq!(ReferenceKind::classify("file:///abs/pet.json"), ReferenceKind::AbsoluteFile);
        assert_eq!(ReferenceKind::classify("https://host/pet.json"), ReferenceKind::Remote);
    }

    #[test]
    fn test_resolve_relative_directory() {
        let origin = Url::parse("file:///dir1/another1.json").unwrap();
        let target = RefTarget::resolve(&origin, "../dir2/other2.json#/path/resource").unwrap();
        assert_eq!(target.location.as_str(), "file:///dir2/other2.json");
        assert_eq!(target.fragment, "/path/resource");
    }

    #[test]
    fn test_resolve_internal_keeps_document() {
        let origin = Url::parse("file:///swagger.json").unwrap();
        let target = RefTarget::resolve(&origin, "#/path/resource").unwrap();
        assert_eq!(target.location, origin);
        assert_eq!(target.local_ref(), "#/path/resource");
    }

    #[test]
    fn test_resolve_remote_ignores_origin() {
        let origin = Url::parse("file:///swagger.json").unwrap();
        let target =
            RefTarget::resolve(&origin, "http://hostname/dir1/file.json#/path1/resource").unwrap();
        assert_eq!(target.location.as_str(), "http://hostname/dir1/file.json");
    }

    #[test]
    fn test_resolve_rejects_bad_targets() {
        let origin = Url::parse("file:///swagger.json").unwrap();
        for bad in ["", "xhttps://hostname/dir1/file.json#/path1/resource"] {
            let err = RefTarget::resolve(&origin, bad).unwrap_err();
            assert!(matches!(err, SpecError::InvalidReferenceTarget { .. }), "{}", bad);
        }
    }

    #[test]
    fn test_fragment_is_percent_decoded() {
        let origin = Url::parse("file:///swagger.json").unwrap();
        let target = RefTarget::resolve(&origin, "#/definitions/My%20Pet").unwrap();
        assert_eq!(target.fragment, "/definitions/My Pet");
    }

    #[test]
    fn test_marshal_round_trip() {
        for raw in [
            "file:///dir1/dir2/file.json#/path1/path2/resource",
            "file:///specs/dir1/dir2/file.json#/path1/path2/resource",
            "file:///specs/swagger.json#",
            "http://hostname/dir1/dir2/file.json#/path1/path2/resource",
            "https://hostname:8443/dir1/file.json?v=2#/path1/path2/resource",
        ] {
            let target = RefTarget::resolve(&root_dir(), raw).unwrap();
            let key = marshal_target(&target, &root_dir()).unwrap();
            assert!(!key.contains('/') && !key.contains('#') && !key.contains('~'), "{}", key);
            assert_eq!(unmarshal_target(&key, &root_dir()).unwrap(), target, "{}", raw);
        }
    }

    #[test]
    fn test_marshal_structured_round_trip() {
        let target = MarshalTarget::new("file", "", "dir1/dir2/file.json", "/path1/path2/resource");
        let key = target.marshal().unwrap();
        assert_eq!(MarshalTarget::unmarshal(&key).unwrap(), target);
    }

    #[test]
    fn test_marshal_relativizes_files_under_root() {
        let target = RefTarget::resolve(&root_dir(), "models/pet.json#/Pet").unwrap();
        let marshaled = MarshalTarget::from_target(&target, &root_dir());
        assert_eq!(marshaled.path, "models/pet.json");
        assert_eq!(marshaled.host, "");
    }

    #[test]
    fn test_marshal_is_deterministic_and_distinct() {
        let a = RefTarget::resolve(&root_dir(), "a.json#/x_y").unwrap();
        let b = RefTarget::resolve(&root_dir(), "a.json#/x/y").unwrap();
        let c = RefTarget::resolve(&root_dir(), "a.json_#/x").unwrap();
        let key_a = marshal_target(&a, &root_dir()).unwrap();
        assert_eq!(key_a, marshal_target(&a, &root_dir()).unwrap());
        assert_ne!(key_a, marshal_target(&b, &root_dir()).unwrap());
        assert_ne!(key_a, marshal_target(&c, &root_dir()).unwrap());
    }

    #[test]
    fn test_fragment_containing_previous_key_is_not_collapsed() {
        let first = RefTarget::resolve(&root_dir(), "swagger.json#/definitions/Pet").unwrap();
        let first_key = marshal_target(&first, &root_dir()).unwrap();

        let nested = RefTarget::resolve(
            &root_dir(),
            &format!("swagger.json#/definitions/{}", first_key),
        )
        .unwrap();
        let nested_key = marshal_target(&nested, &root_dir()).unwrap();

        assert_ne!(nested_key, first_key);
        let back = unmarshal_target(&nested_key, &root_dir()).unwrap();
        assert_eq!(back.fragment, format!("/definitions/{}", first_key));
    }

    #[test]
    fn test_marshal_rejects_malformed() {
        assert!(MarshalTarget::new("", "", "", "").marshal().is_err());
        assert!(MarshalTarget::new("xhttps", "hostname", "/dir1/file.json", "/a")
            .marshal()
            .is_err());
        assert!(MarshalTarget::unmarshal("xhttps.hostname..dir1..file.json|..path1").is_err());
        assert!(MarshalTarget::unmarshal("file_._.a_ZZ_.").is_err());
    }

    #[test]
    fn test_unmarshal_accepts_only_uppercase_hex_escapes() {
        let target = MarshalTarget::unmarshal("file_._.a_2Fb_.").unwrap();
        assert_eq!(target.path, "a/b");
        for key in ["file_._.a_2fb_.", "file_._.a_0f_.", "file_._.a_+F_.", "file_._.a_-1_.", "file_._.a_2_."] {
            assert!(MarshalTarget::unmarshal(key).is_err(), "{}", key);
        }
    }

    #[test]
    fn test_lookup_fragment() {
        let doc = json!({"definitions": {"a/b": {"type": "string"}}});
        assert_eq!(lookup_fragment(&doc, ""), Some(&doc));
        assert_eq!(
            lookup_fragment(&doc, "/definitions/a~1b"),
            Some(&json!({"type": "string"}))
        );
        assert_eq!(lookup_fragment(&doc, "/missing"), None);
        assert_eq!(lookup_fragment(&doc, "definitions"), None);
    }
}
