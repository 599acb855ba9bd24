//! Case-insensitive header storage shared by every stage that reads or
//! writes HTTP headers (security gate, pipeline, response submitter).

use std::collections::BTreeMap;

/// An ordered, case-insensitive header collection. Keys are normalized to
/// lowercase on insert; iteration order is the header name's sort order,
/// which keeps serialized responses deterministic for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap(BTreeMap<String, String>);

impl HeaderMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Headers whose name starts with `prefix` (case-insensitive), with the
    /// prefix stripped — used to collect `x-ambry-um-<key>` user metadata.
    pub fn strip_prefixed(&self, prefix: &str) -> Vec<(String, String)> {
        let prefix = prefix.to_ascii_lowercase();
        self.0
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix.as_str()).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, String)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Ambry-Service-Id", "my-service");
        assert_eq!(headers.get("x-ambry-service-id"), Some("my-service"));
        assert_eq!(headers.get("X-AMBRY-SERVICE-ID"), Some("my-service"));
    }

    #[test]
    fn strip_prefixed_collects_user_metadata() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ambry-um-foo", "bar");
        headers.insert("x-ambry-um-baz", "qux");
        headers.insert("x-ambry-service-id", "svc");
        let mut um = headers.strip_prefixed("x-ambry-um-");
        um.sort();
        assert_eq!(um, vec![("baz".to_string(), "qux".to_string()), ("foo".to_string(), "bar".to_string())]);
    }
}
