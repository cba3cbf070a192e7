use crate::event::{OpaqueValue, PropertyValue, Scalar};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt::{self, Write};

/// JSON-ready projection of a [`PropertyValue`] tree.
///
/// Every property value maps to exactly one simplified value. Opaque values
/// keep their renderer until serialization, so a failing `Display` impl
/// shows up as a serialization error rather than a panic.
#[derive(Debug, Clone)]
pub enum SimplifiedValue {
    Scalar(Scalar),
    List(Vec<SimplifiedValue>),
    Object(Object),
    Rendered(OpaqueValue),
}

/// String-keyed map that keeps insertion order.
#[derive(Debug, Clone, Default)]
pub struct Object(Vec<(String, SimplifiedValue)>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`. An existing key keeps its position and
    /// takes the new value.
    ///
    /// Lookup is a linear scan, so building an object of `n` keys is
    /// quadratic. Property bags and structures are small; very wide maps pay
    /// for it.
    pub fn insert(&mut self, key: String, value: SimplifiedValue) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }
}

/// Simplify `value` leaving structure field names untouched.
pub fn simplify(value: &PropertyValue) -> SimplifiedValue {
    simplify_with(value, &|name| name.to_string())
}

/// Simplify `value`, passing every structure field name through
/// `key_transform`.
///
/// Map keys are simplified and turned into text but never transformed;
/// sequence elements are simplified with the same transform.
pub fn simplify_with(value: &PropertyValue, key_transform: &dyn Fn(&str) -> String) -> SimplifiedValue {
    match value {
        PropertyValue::Scalar(scalar) => SimplifiedValue::Scalar(scalar.clone()),
        PropertyValue::Sequence(elements) => SimplifiedValue::List(
            elements
                .iter()
                .map(|element| simplify_with(element, key_transform))
                .collect(),
        ),
        PropertyValue::Structure { fields, .. } => {
            let mut object = Object::new();
            for (name, field) in fields {
                object.insert(key_transform(name), simplify_with(field, key_transform));
            }
            SimplifiedValue::Object(object)
        }
        PropertyValue::Map(entries) => {
            let mut object = Object::new();
            for (key, entry) in entries {
                let key = simplify_with(key, key_transform).key_text();
                object.insert(key, simplify_with(entry, key_transform));
            }
            SimplifiedValue::Object(object)
        }
        PropertyValue::Opaque(opaque) => SimplifiedValue::Rendered(opaque.clone()),
    }
}

impl SimplifiedValue {
    /// Text form used when a simplified value becomes a map key. Keys that
    /// cannot be rendered become the empty string.
    fn key_text(&self) -> String {
        let mut text = String::new();
        match self.write_text(&mut text) {
            Ok(()) => text,
            Err(_) => String::new(),
        }
    }

    /// Append the plain text form of the value to `out`.
    ///
    /// Strings are written without quotes, null as nothing, lists and objects
    /// as compact JSON.
    pub fn write_text(&self, out: &mut String) -> fmt::Result {
        match self {
            SimplifiedValue::Scalar(scalar) => write!(out, "{}", scalar),
            SimplifiedValue::Rendered(opaque) => opaque.render(out),
            SimplifiedValue::List(_) | SimplifiedValue::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                out.push_str(&json);
                Ok(())
            }
        }
    }
}

impl Serialize for SimplifiedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SimplifiedValue::Scalar(scalar) => serialize_scalar(scalar, serializer),
            SimplifiedValue::List(elements) => {
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for element in elements {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            SimplifiedValue::Object(object) => object.serialize(serializer),
            SimplifiedValue::Rendered(opaque) => {
                let mut text = String::new();
                opaque
                    .render(&mut text)
                    .map_err(|_| S::Error::custom("property value could not be rendered as text"))?;
                serializer.serialize_str(&text)
            }
        }
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn serialize_scalar<S: Serializer>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
    match scalar {
        Scalar::Null => serializer.serialize_unit(),
        Scalar::Bool(b) => serializer.serialize_bool(*b),
        Scalar::I64(n) => serializer.serialize_i64(*n),
        Scalar::U64(n) => serializer.serialize_u64(*n),
        Scalar::F64(n) => serializer.serialize_f64(*n),
        Scalar::Str(s) => serializer.serialize_str(s),
        Scalar::DateTime(ts) => serializer.serialize_str(&crate::record::iso8601(ts)),
    }
}
