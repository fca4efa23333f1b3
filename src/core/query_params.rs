use std::borrow::Cow;
use std::collections::HashMap;

/// Parse query parameters from a URI string.
///
/// Values are URL-decoded; a repeated key keeps its last value and a bare
/// flag (`?verbose`) maps to an empty string.
pub fn parse_query_params(uri: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    let Some((_, query)) = uri.split_once('?') else {
        return params;
    };

    for param in query.split('&').filter(|p| !p.is_empty()) {
        match param.split_once('=') {
            Some((key, encoded)) => {
                let decoded = urlencoding::decode(encoded)
                    .unwrap_or(Cow::Borrowed(encoded))
                    .into_owned();
                params.insert(key.to_string(), decoded);
            }
            None => {
                params.insert(param.to_string(), String::new());
            }
        }
    }

    params
}

/// 1-based page number, if the caller asked for one. Garbage and zero clamp to 1.
pub fn get_page(params: &HashMap<String, String>) -> Option<usize> {
    params
        .get("page")
        .map(|raw| raw.parse::<usize>().unwrap_or(1).max(1))
}
