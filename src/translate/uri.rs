/// Path and query of a request URI, plus a low-cardinality query shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriShape {
    /// Path exactly as received: no dot-segment removal, no re-encoding.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: String,
    /// Parameter names sorted, each value replaced with `?`, e.g. `a=?&b=?`.
    pub query_shape: String,
}

/// Split a request URI into raw path and raw query. Absolute URIs drop their
/// `scheme://authority` prefix; anything after `#` is ignored.
pub fn parse(uri: &str) -> UriShape {
    let without_fragment = uri.split_once('#').map_or(uri, |(before, _)| before);
    let (target, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    UriShape {
        path: strip_authority(target).to_string(),
        query: query.to_string(),
        query_shape: shape_query(query),
    }
}

fn strip_authority(target: &str) -> &str {
    match target.find("://") {
        Some(pos) if is_scheme(&target[..pos]) => {
            let rest = &target[pos + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        _ => target,
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn shape_query(query: &str) -> String {
    let mut keys: Vec<String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, _)| k.into_owned())
        .collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}=?", k))
        .collect::<Vec<_>>()
        .join("&")
}
