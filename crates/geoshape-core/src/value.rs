use chrono::NaiveDate;
use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A decoded `.dbf` cell.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    #[default]
    Null,
    Logical(bool),
    Number(f64),
    Date(NaiveDate),
    Character(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Character(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Logical(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Character(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Character(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Logical(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Field name to value mapping that keeps the table's field order.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes {
    entries: IndexMap<String, FieldValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
        }
    }

    /// Sets `name` to `value`, replacing an existing entry in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<IndexMap<String, FieldValue>> for Attributes {
    fn from(entries: IndexMap<String, FieldValue>) -> Self {
        Self { entries }
    }
}

impl IntoIterator for Attributes {
    type Item = (String, FieldValue);
    type IntoIter = indexmap::map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut attrs = Attributes::new();
        attrs.insert("NAME", "Austin");
        attrs.insert("POP", 961855);
        attrs.insert("NAME", "Dallas");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs.names().collect::<Vec<_>>(), vec!["NAME", "POP"]);
        assert_eq!(attrs.get("NAME").and_then(FieldValue::as_str), Some("Dallas"));
        assert_eq!(attrs.get("POP").and_then(FieldValue::as_f64), Some(961855.0));
        assert!(attrs.get("MISSING").is_none());
    }

    #[test]
    fn option_converts_to_null() {
        let v: FieldValue = Option::<bool>::None.into();
        assert!(v.is_null());
        let v: FieldValue = Some(true).into();
        assert_eq!(v.as_bool(), Some(true));
    }

    #[test]
    fn collects_from_index_map() {
        let map: IndexMap<String, FieldValue> = [("B", 2), ("A", 1)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), FieldValue::from(v)))
            .collect();
        let attrs = Attributes::from(map);
        assert_eq!(attrs.names().collect::<Vec<_>>(), vec!["B", "A"]);
        assert!(attrs.contains("A"));
        let back: Vec<_> = attrs.into_iter().map(|(k, _)| k).collect();
        assert_eq!(back, vec!["B".to_string(), "A".to_string()]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_keeps_field_order() {
        let mut attrs = Attributes::new();
        attrs.insert("ZONE", "R1");
        attrs.insert("AREA", 2.5);
        attrs.insert("OPEN", FieldValue::Null);
        let text = serde_json::to_string(&attrs).unwrap();
        assert_eq!(text, r#"{"ZONE":"R1","AREA":2.5,"OPEN":null}"#);
        let back: Attributes = serde_json::from_str(&text).unwrap();
        assert_eq!(back, attrs);
    }
}
