//! Casting of raw string parameters to the primitive types their schema declares.

use serde_json::{Number, Value};

/// How an `array` parameter packs its items into a single string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    #[default]
    Csv,
    Ssv,
    Tsv,
    Pipes,
    /// One value per repeated parameter.
    Multi,
}

impl CollectionFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("ssv") => Self::Ssv,
            Some("tsv") => Self::Tsv,
            Some("pipes") => Self::Pipes,
            Some("multi") => Self::Multi,
            _ => Self::Csv,
        }
    }

    /// Collection format implied by an OpenAPI 3 `style` / `explode` pair.
    pub fn from_style(style: &str, explode: bool) -> Self {
        match style {
            "form" if explode => Self::Multi,
            "spaceDelimited" => Self::Ssv,
            "pipeDelimited" => Self::Pipes,
            _ => Self::Csv,
        }
    }

    fn delimiter(&self) -> Option<char> {
        match self {
            Self::Csv => Some(','),
            Self::Ssv => Some(' '),
            Self::Tsv => Some('\t'),
            Self::Pipes => Some('|'),
            Self::Multi => None,
        }
    }

    /// Splits the raw values of one parameter into array items.
    pub fn split(&self, values: &[String]) -> Vec<String> {
        match self.delimiter() {
            None => values.to_vec(),
            Some(delimiter) => values
                .iter()
                .flat_map(|value| value.split(delimiter).map(str::to_string))
                .collect(),
        }
    }
}

/// Casts `raw` to `type_name`; on failure the original string is kept so the
/// schema reports the mismatch against what the client sent.
pub fn cast_primitive(type_name: Option<&str>, raw: &str) -> Value {
    let original = || Value::String(raw.to_string());
    match type_name {
        Some("integer") => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| original()),
        Some("number") | Some("float") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(original),
        Some("boolean") => {
            if raw.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if raw.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                original()
            }
        }
        _ => original(),
    }
}
