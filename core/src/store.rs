use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque payload returned by the annotation service for one item.
pub type AnnotationResult = Value;

/// One unit of work: a dream report with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub text: String,
}

impl Item {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// Mapping from item id to annotation result, kept in insertion order.
///
/// Entries can only be added. An id that is already present keeps its
/// original result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsStore {
    entries: Map<String, Value>,
}

impl ResultsStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn contains(&self, id: &str) -> bool { self.entries.contains_key(id) }

    pub fn get(&self, id: &str) -> Option<&AnnotationResult> { self.entries.get(id) }

    /// Record a result for a new id. Returns false (and leaves the store
    /// untouched) when the id already has a result.
    pub fn insert_new(&mut self, id: impl Into<String>, result: AnnotationResult) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, result);
        true
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnotationResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Items from `items` that do not have a result yet, in input order.
    pub fn missing<'a>(&'a self, items: &'a [Item]) -> impl Iterator<Item = &'a Item> + 'a {
        items.iter().filter(move |item| !self.contains(&item.id))
    }
}

impl From<Map<String, Value>> for ResultsStore {
    fn from(entries: Map<String, Value>) -> Self { Self { entries } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_never_replaces() {
        let mut store = ResultsStore::new();
        assert!(store.insert_new("a", json!({"ok": true})));
        assert!(!store.insert_new("a", json!({"ok": false})));
        assert_eq!(store.get("a"), Some(&json!({"ok": true})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let mut store = ResultsStore::new();
        for id in ["c", "a", "b"] {
            store.insert_new(id, json!(id));
        }
        assert_eq!(store.ids().collect::<Vec<_>>(), vec!["c", "a", "b"]);
        let text = serde_json::to_string(&store).unwrap();
        assert_eq!(text, r#"{"c":"c","a":"a","b":"b"}"#);
    }

    #[test]
    fn missing_follows_input_order() {
        let mut store = ResultsStore::new();
        store.insert_new("b", json!(1));
        let items = vec![Item::new("a", "t1"), Item::new("b", "t2"), Item::new("c", "t3")];
        let ids: Vec<&str> = store.missing(&items).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
