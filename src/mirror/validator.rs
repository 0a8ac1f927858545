//! Namespace gate for mirrored keys
//!
//! A key is admitted only if it is exactly `env`, optionally followed by
//! `.`-separated sub-namespaces, then `/` and a name. Segments are ASCII word
//! characters or hyphens.

use regex::Regex;
use std::sync::LazyLock;

static ENV_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^env(\.[A-Za-z0-9_-]+)*/[A-Za-z0-9_-]+$").expect("valid env key regex")
});

/// Check whether `key` belongs to the trusted `env` namespace
pub fn is_valid_env_key(key: &str) -> bool {
    ENV_KEY.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_namespaced_keys() {
        for key in [
            "env/color",
            "env.display/width",
            "env.display.main/x-offset",
            "env/under_score",
            "env/42",
        ] {
            assert!(is_valid_env_key(key), "{} should be valid", key);
        }
    }

    #[test]
    fn rejects_everything_else() {
        for key in [
            "environment/color",
            "env/",
            "ENV/color",
            "env",
            "env.display",
            "env./color",
            "env/color/extra",
            "env/col or",
            "junk/x",
            "xenv/color",
            "env/color\n",
            "env/cölor",
            "",
        ] {
            assert!(!is_valid_env_key(key), "{:?} should be invalid", key);
        }
    }
}
