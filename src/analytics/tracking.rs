use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};

pub const GENERATED_TOKEN_LENGTH: usize = 10;
const MIN_TOKEN_LENGTH: usize = 4;
const MAX_TOKEN_LENGTH: usize = 64;

/// The token embedded in outreach URLs, either as `/t/{token}` or as the `t`
/// query parameter the redirect appends.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct TrackingToken(String);

impl TrackingToken {
    pub fn generate() -> TrackingToken {
        let rng = rand::rng();
        let token: String = rng
            .sample_iter(&Alphanumeric)
            .take(GENERATED_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        TrackingToken(token)
    }

    /// Returns None for anything that could not have been issued by us,
    /// including custom tokens typed in by staff.
    pub fn parse(raw: &str) -> Option<TrackingToken> {
        let raw = raw.trim();
        let valid_length = (MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&raw.len());
        let valid_chars = raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid_length && valid_chars {
            Some(TrackingToken(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Appends `key=value` pairs to a local path, preserving an existing query.
pub fn append_query_params(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let (base, fragment) = match path.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (path, None),
    };
    let mut url = base.to_string();
    let mut separator = if base.contains('?') { '&' } else { '?' };
    for (key, value) in params {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            url.push(separator);
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
            separator = '&';
        }
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}
