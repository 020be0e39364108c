//! Properties (C6, §4.6): `pprop`/`gprop`/`remprop`/`plist`, a flat
//! per-name property list independent of the variable table — a name
//! can hold both a variable binding and properties simultaneously.

use crate::value::Value;

#[derive(Default)]
struct PropList {
    entries: Vec<(String, Value)>,
}

#[derive(Default)]
pub struct Properties {
    lists: Vec<(String, PropList)>,
}

impl Properties {
    pub fn new() -> Self {
        Properties::default()
    }

    fn find_list_mut(&mut self, plist_name: &str) -> &mut PropList {
        if let Some(i) = self.lists.iter().position(|(n, _)| n == plist_name) {
            return &mut self.lists[i].1;
        }
        self.lists.push((plist_name.to_string(), PropList::default()));
        &mut self.lists.last_mut().unwrap().1
    }

    pub fn pprop(&mut self, plist_name: &str, key: &str, value: Value) {
        let list = self.find_list_mut(plist_name);
        if let Some(slot) = list.entries.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            list.entries.push((key.to_string(), value));
        }
    }

    pub fn gprop(&self, plist_name: &str, key: &str) -> Option<Value> {
        self.lists
            .iter()
            .find(|(n, _)| n == plist_name)
            .and_then(|(_, list)| list.entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| *v)
    }

    pub fn remprop(&mut self, plist_name: &str, key: &str) {
        if let Some((_, list)) = self.lists.iter_mut().find(|(n, _)| n == plist_name) {
            list.entries.retain(|(k, _)| k != key);
        }
    }

    /// All key/value pairs on a plist, in insertion order, for `plist`.
    pub fn plist(&self, plist_name: &str) -> Vec<(String, Value)> {
        self.lists
            .iter()
            .find(|(n, _)| n == plist_name)
            .map(|(_, list)| list.entries.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pprop_then_gprop_round_trips() {
        let mut p = Properties::new();
        p.pprop("turtle", "color", Value::Number(5.0));
        assert_eq!(p.gprop("turtle", "color"), Some(Value::Number(5.0)));
    }

    #[test]
    fn gprop_on_missing_list_or_key_is_none() {
        let p = Properties::new();
        assert_eq!(p.gprop("nothing", "x"), None);
    }

    #[test]
    fn pprop_overwrites_existing_key() {
        let mut p = Properties::new();
        p.pprop("a", "k", Value::Number(1.0));
        p.pprop("a", "k", Value::Number(2.0));
        assert_eq!(p.gprop("a", "k"), Some(Value::Number(2.0)));
    }

    #[test]
    fn remprop_removes_only_named_key() {
        let mut p = Properties::new();
        p.pprop("a", "k1", Value::Number(1.0));
        p.pprop("a", "k2", Value::Number(2.0));
        p.remprop("a", "k1");
        assert_eq!(p.gprop("a", "k1"), None);
        assert_eq!(p.gprop("a", "k2"), Some(Value::Number(2.0)));
    }

    #[test]
    fn plist_preserves_insertion_order() {
        let mut p = Properties::new();
        p.pprop("a", "first", Value::Number(1.0));
        p.pprop("a", "second", Value::Number(2.0));
        let keys: Vec<_> = p.plist("a").into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["first".to_string(), "second".to_string()]);
    }
}
