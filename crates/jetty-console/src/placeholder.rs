//! `${key}` placeholder substitution.

use std::collections::HashMap;
use std::sync::Arc;

/// Source of placeholder values.
pub trait PlaceholderResolver: Send + Sync {
    /// Value for `key`, or `None` to leave the placeholder untouched.
    fn resolve(&self, key: &str) -> Option<String>;
}

/// Resolves nothing.
pub struct NoResolver;

impl PlaceholderResolver for NoResolver {
    fn resolve(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Resolves from process environment variables.
pub struct EnvResolver;

impl PlaceholderResolver for EnvResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Resolves from a fixed map.
#[derive(Debug, Clone, Default)]
pub struct MapResolver(pub HashMap<String, String>);

impl MapResolver {
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }
}

impl PlaceholderResolver for MapResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Tries each resolver in order.
pub struct ChainResolver(pub Vec<Arc<dyn PlaceholderResolver>>);

impl PlaceholderResolver for ChainResolver {
    fn resolve(&self, key: &str) -> Option<String> {
        self.0.iter().find_map(|r| r.resolve(key))
    }
}

/// Replace every `${key}` in `value` that `resolver` knows.
///
/// Unknown keys and an unterminated `${` are kept verbatim. Substituted
/// values are not scanned again.
pub fn resolve_placeholders(value: &str, resolver: &dyn PlaceholderResolver) -> String {
    if !value.contains("${") {
        return value.to_string();
    }
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match resolver.resolve(key) {
                    Some(v) => result.push_str(&v),
                    None => {
                        result.push_str("${");
                        result.push_str(key);
                        result.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            },
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> MapResolver {
        MapResolver::default()
            .with("jetty.port", "8080")
            .with("host", "localhost")
    }

    #[test]
    fn resolves_single() {
        assert_eq!(resolve_placeholders("${jetty.port}", &map()), "8080");
    }

    #[test]
    fn resolves_embedded_and_multiple() {
        assert_eq!(
            resolve_placeholders("http://${host}:${jetty.port}/", &map()),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn unresolved_kept_verbatim() {
        assert_eq!(resolve_placeholders("${NOPE}", &NoResolver), "${NOPE}");
        assert_eq!(resolve_placeholders("a ${x} b ${host}", &map()), "a ${x} b localhost");
    }

    #[test]
    fn unterminated_kept_verbatim() {
        assert_eq!(resolve_placeholders("x ${host", &map()), "x ${host");
    }

    #[test]
    fn dollar_without_brace_untouched() {
        assert_eq!(resolve_placeholders("$host {host}", &map()), "$host {host}");
    }

    #[test]
    fn empty_key_asks_resolver() {
        let r = MapResolver::default().with("", "blank");
        assert_eq!(resolve_placeholders("${}", &r), "blank");
        assert_eq!(resolve_placeholders("${}", &NoResolver), "${}");
    }

    #[test]
    fn values_are_not_rescanned() {
        let r = MapResolver::default().with("a", "${b}").with("b", "x");
        assert_eq!(resolve_placeholders("${a}", &r), "${b}");
    }

    #[test]
    fn chain_prefers_first() {
        let first: Arc<dyn PlaceholderResolver> =
            Arc::new(MapResolver::default().with("k", "one"));
        let second: Arc<dyn PlaceholderResolver> =
            Arc::new(MapResolver::default().with("k", "two").with("j", "jay"));
        let chain = ChainResolver(vec![first, second]);
        assert_eq!(resolve_placeholders("${k}-${j}", &chain), "one-jay");
    }

    #[test]
    fn env_resolver_reads_environment() {
        // PATH is set in every test environment we run in.
        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(resolve_placeholders("${PATH}", &EnvResolver), path);
        }
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn identity_without_placeholder(s in "[a-z0-9 ${}]{0,40}") {
                prop_assume!(!s.contains("${"));
                prop_assert_eq!(resolve_placeholders(&s, &map()), s);
            }

            #[test]
            fn empty_resolver_is_identity(s in "[a-z${} ]{0,40}") {
                prop_assert_eq!(resolve_placeholders(&s, &NoResolver), s);
            }
        }
    }
}
