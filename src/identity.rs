//! External identity tokens
//!
//! A shortcut owned by this tool carries a `<store>:<store_id>` token in
//! its launch options, e.g. `MANGOHUD=1 gog:1207658930 --no-splash`.
//! The token may sit anywhere among environment-variable and flag tokens;
//! a record without one is foreign and never touched by the sync engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The storefronts we sync from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Store {
    Epic,
    Gog,
    Amazon,
}

impl Store {
    pub const ALL: [Store; 3] = [Store::Epic, Store::Gog, Store::Amazon];

    /// The tag used in identity tokens. Matching is exact and
    /// case-sensitive.
    pub fn tag(self) -> &'static str {
        match self {
            Store::Epic => "epic",
            Store::Gog => "gog",
            Store::Amazon => "amazon",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Store> {
        Store::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A store-scoped stable game identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub store: Store,
    pub store_id: String,
}

impl ExternalIdentity {
    pub fn new(store: Store, store_id: impl Into<String>) -> Self {
        Self {
            store,
            store_id: store_id.into(),
        }
    }

    /// The launch-options token form, `epic:abc123`.
    pub fn token(&self) -> String {
        format!("{}:{}", self.store.tag(), self.store_id)
    }
}

impl fmt::Display for ExternalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store.tag(), self.store_id)
    }
}

fn parse_token(token: &str) -> Option<ExternalIdentity> {
    let (tag, id) = token.split_once(':')?;
    if id.is_empty() {
        return None;
    }
    Store::from_tag(tag).map(|store| ExternalIdentity::new(store, id))
}

/// First identity token in a whitespace-delimited launch-options string.
pub fn extract_identity(launch_options: &str) -> Option<ExternalIdentity> {
    launch_options.split_whitespace().find_map(parse_token)
}

/// Whether the record carrying these launch options belongs to us.
pub fn is_owned(launch_options: &str) -> bool {
    extract_identity(launch_options).is_some()
}

/// Just the store component of the embedded identity, if any.
pub fn store_prefix(launch_options: &str) -> Option<Store> {
    extract_identity(launch_options).map(|id| id.store)
}

/// Rebuild a launch-options string around `identity`.
///
/// Non-identity tokens from `existing` (env vars, flags) are preserved
/// verbatim and in order. An existing identity token is replaced in place;
/// otherwise the token is appended. Duplicate identity tokens are dropped.
pub fn build_launch_options(identity: &ExternalIdentity, existing: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut placed = false;
    for tok in existing.split_whitespace() {
        if parse_token(tok).is_some() {
            if !placed {
                tokens.push(identity.token());
                placed = true;
            }
        } else {
            tokens.push(tok.to_string());
        }
    }
    if !placed {
        tokens.push(identity.token());
    }
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_among_env_and_flags() {
        let id = extract_identity("MANGOHUD=1 gog:abc-123 --no-splash").unwrap();
        assert_eq!(id, ExternalIdentity::new(Store::Gog, "abc-123"));
    }

    #[test]
    fn test_extract_none_without_token() {
        assert_eq!(extract_identity("--some-random-option"), None);
        assert_eq!(extract_identity(""), None);
        assert!(!is_owned("PROTON_LOG=1 --fullscreen"));
    }

    #[test]
    fn test_store_tag_is_exact_and_case_sensitive() {
        assert_eq!(extract_identity("GOG:abc"), None);
        assert_eq!(extract_identity("gogg:abc"), None);
        assert_eq!(extract_identity("gog:"), None);
        assert_eq!(store_prefix("epic:xyz"), Some(Store::Epic));
    }

    #[test]
    fn test_id_may_contain_colons() {
        let id = extract_identity("amazon:a:b").unwrap();
        assert_eq!(id.store_id, "a:b");
    }

    #[test]
    fn test_build_appends_when_absent() {
        let id = ExternalIdentity::new(Store::Epic, "fn-1");
        assert_eq!(
            build_launch_options(&id, "MANGOHUD=1 --windowed"),
            "MANGOHUD=1 --windowed epic:fn-1"
        );
        assert_eq!(build_launch_options(&id, ""), "epic:fn-1");
    }

    #[test]
    fn test_build_replaces_in_place() {
        let id = ExternalIdentity::new(Store::Gog, "new-id");
        assert_eq!(
            build_launch_options(&id, "MANGOHUD=1 gog:old-id --no-splash"),
            "MANGOHUD=1 gog:new-id --no-splash"
        );
    }

    #[test]
    fn test_build_drops_duplicate_identity_tokens() {
        let id = ExternalIdentity::new(Store::Amazon, "z9");
        assert_eq!(
            build_launch_options(&id, "amazon:z9 --dx11 epic:stale"),
            "amazon:z9 --dx11"
        );
    }

    #[test]
    fn test_round_trip_preserves_user_flags() {
        let id = ExternalIdentity::new(Store::Gog, "g1");
        let opts = build_launch_options(&id, "PROTON_LOG=1 --skip-intro");
        assert_eq!(extract_identity(&opts), Some(id.clone()));
        let again = build_launch_options(&id, &opts);
        assert_eq!(again, opts);
    }
}
