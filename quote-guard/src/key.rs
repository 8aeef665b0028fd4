use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a search request
///
/// Holds the canonical JSON rendering of the request parameters: every
/// object's keys are sorted, recursively, before serialization. Two parameter
/// sets that are equal as mappings produce the same key no matter what order
/// their entries were inserted in.
#[derive(Hash, Eq, PartialEq, Clone)]
pub struct DedupKey(String);

impl DedupKey {
    /// Derive the key for any serializable parameter set
    pub fn from_params<P: Serialize + ?Sized>(params: &P) -> Result<Self> {
        let value = serde_json::to_value(params)?;
        let canonical = serde_json::to_string(&Canonical(&value))?;
        Ok(DedupKey(canonical))
    }

    /// Canonical serialization used as the map key
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short digest of the canonical form, for log lines
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DedupKey({})", self.fingerprint())
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializes a JSON value with object keys in lexicographic order.
///
/// `serde_json::Map` only sorts when the `preserve_order` feature is off, and
/// feature unification can switch it on from anywhere in the dependency graph.
struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Canonical<'_>> =
                    map.iter().map(|(k, v)| (k, Canonical(v))).collect();
                sorted.serialize(serializer)
            }
            Value::Array(items) => {
                let items: Vec<Canonical<'_>> = items.iter().map(Canonical).collect();
                items.serialize(serializer)
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn test_key_ignores_insertion_order() {
        let mut a = Map::new();
        a.insert("origin".into(), json!("JFK"));
        a.insert("destination".into(), json!("LAX"));
        a.insert("adults".into(), json!(2));

        let mut b = Map::new();
        b.insert("adults".into(), json!(2));
        b.insert("origin".into(), json!("JFK"));
        b.insert("destination".into(), json!("LAX"));

        let key_a = DedupKey::from_params(&a).unwrap();
        let key_b = DedupKey::from_params(&b).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.as_str(), r#"{"adults":2,"destination":"LAX","origin":"JFK"}"#);
    }

    #[test]
    fn test_nested_objects_are_sorted() {
        let a = json!({"filters": {"stops": 0, "airline": "BA"}, "q": "LON"});
        let b = json!({"q": "LON", "filters": {"airline": "BA", "stops": 0}});

        assert_eq!(
            DedupKey::from_params(&a).unwrap(),
            DedupKey::from_params(&b).unwrap()
        );
    }

    #[test]
    fn test_different_values_produce_different_keys() {
        let a = json!({"origin": "JFK", "destination": "LAX"});
        let b = json!({"origin": "JFK", "destination": "SFO"});

        let key_a = DedupKey::from_params(&a).unwrap();
        let key_b = DedupKey::from_params(&b).unwrap();
        assert_ne!(key_a, key_b);
        assert_ne!(key_a.fingerprint(), key_b.fingerprint());
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = json!({"legs": ["JFK", "LHR"]});
        let b = json!({"legs": ["LHR", "JFK"]});

        assert_ne!(
            DedupKey::from_params(&a).unwrap(),
            DedupKey::from_params(&b).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let key = DedupKey::from_params(&json!({"origin": "JFK"})).unwrap();
        let fingerprint = key.fingerprint();

        assert_eq!(fingerprint.len(), 16);
        assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
