use std::collections::BTreeMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Scalar field value extracted from a transcript. `Null` means the key was
/// present in the source text but its value was blank; an absent key has no
/// entry at all.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value {
    /// Trimmed text becomes `Str`; blank text becomes `Null`.
    pub fn from_text(s: &str) -> Value {
        let t = s.trim();
        if t.is_empty() { Value::Null } else { Value::Str(t.to_string()) }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Value::Str(s) => Some(s), _ => None }
    }

    /// Rendering for HTML/CSV cells. `Null` renders empty.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format!("{}", f),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Null => serializer.serialize_unit(),
        }
    }
}

/// One normalized entity: named scalar fields plus named sub-record lists
/// (e.g. a game's `Characters`). Field order is irrelevant.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
    lists: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new() -> Record { Record::default() }

    /// Last write wins.
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn set_list(&mut self, name: &str, rows: Vec<Record>) {
        self.lists.insert(name.to_string(), rows);
    }

    pub fn list(&self, name: &str) -> &[Record] {
        self.lists.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.fields.len() }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() && self.lists.is_empty() }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.lists.len()))?;
        for (k, v) in &self.fields { map.serialize_entry(k, v)?; }
        for (k, rows) in &self.lists { map.serialize_entry(k, rows)?; }
        map.end()
    }
}

/// Ordered collection of records keyed by a caller-supplied identity.
/// Insertion order reflects source order; inserting an existing identity
/// replaces the record in place, so the transcript's most recent occurrence
/// wins without moving the slot.
#[derive(Clone, Debug, Default)]
pub struct RecordSet {
    entries: Vec<(String, Record)>,
}

impl RecordSet {
    pub fn new() -> RecordSet { RecordSet::default() }

    pub fn insert(&mut self, identity: &str, record: Record) {
        if let Some(slot) = self.entries.iter_mut().find(|(id, _)| id == identity) {
            slot.1 = record;
        } else {
            self.entries.push((identity.to_string(), record));
        }
    }

    pub fn get(&self, identity: &str) -> Option<&Record> {
        self.entries.iter().find(|(id, _)| id == identity).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut Record> {
        self.entries.iter_mut().find(|(id, _)| id == identity).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(id, r)| (id.as_str(), r))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, rec) in &self.entries { map.serialize_entry(id, rec)?; }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_null_not_empty_string() {
        assert_eq!(Value::from_text("   "), Value::Null);
        assert_eq!(Value::from_text(" x "), Value::Str("x".to_string()));
    }

    #[test]
    fn null_serializes_as_json_null() {
        let mut rec = Record::new();
        rec.set("Owner", Value::Null);
        rec.set("Name", Value::Str("run1".to_string()));
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("Owner").unwrap().is_null());
        assert_eq!(json.get("Name").unwrap(), "run1");
    }

    #[test]
    fn record_serializes_sub_lists() {
        let mut row = Record::new();
        row.set("CharName", Value::Str("Sorc".to_string()));
        let mut rec = Record::new();
        rec.set("Name", Value::Str("baal-01".to_string()));
        rec.set_list("Characters", vec![row]);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["Characters"][0]["CharName"], "Sorc");
    }

    #[test]
    fn recordset_overwrite_keeps_slot_order() {
        let mut set = RecordSet::new();
        let mut a = Record::new();
        a.set("Status", Value::Str("open".to_string()));
        set.insert("game1", a);
        let mut b = Record::new();
        b.set("Status", Value::Str("open".to_string()));
        set.insert("game2", b);
        let mut a2 = Record::new();
        a2.set("Status", Value::Str("started".to_string()));
        set.insert("game1", a2);
        assert_eq!(set.len(), 2);
        let order: Vec<&str> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["game1", "game2"]);
        assert_eq!(set.get("game1").unwrap().get_str("Status"), Some("started"));
    }
}
