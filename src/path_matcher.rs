use std::collections::HashMap;

fn is_placeholder(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Segment-wise comparison of two paths where `{name}` segments on either
/// side match anything.
///
/// ```
/// use swagger_guard::path_matcher::partial_path_match;
///
/// assert!(partial_path_match("/v1/bars/{id}", "/v1/bars/1"));
/// assert!(!partial_path_match("/v1/bars/{id}", "/v1/bars"));
/// ```
pub fn partial_path_match(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split('/').collect();
    let b: Vec<&str> = b.split('/').collect();
    a.len() == b.len()
        && a
            .iter()
            .zip(&b)
            .all(|(x, y)| x == y || is_placeholder(x) || is_placeholder(y))
}

/// Values of the `{name}` segments of `template` in `path`, or `None` when
/// they do not match.
pub fn extract_path_params(template: &str, path: &str) -> Option<HashMap<String, String>> {
    if !partial_path_match(template, path) {
        return None;
    }
    let params = template
        .split('/')
        .zip(path.split('/'))
        .filter(|(segment, _)| is_placeholder(segment))
        .map(|(segment, value)| {
            let name = &segment[1..segment.len() - 1];
            let value = percent_encoding::percent_decode_str(value).decode_utf8_lossy();
            (name.to_string(), value.into_owned())
        })
        .collect();
    Some(params)
}
