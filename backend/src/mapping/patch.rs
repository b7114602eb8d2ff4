//! Target patches: the normalized output of resolving one field mapping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoreRef;

/// How one target field gets written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Value to write. `None` means "take the source field's raw value".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    /// Reject the record if the primary store already holds this value.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,

    /// Persist the value through this store and keep only its index key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<StoreRef>,
}

impl FieldDescriptor {
    /// Descriptor with an explicit value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Descriptor that defaults to the raw source value.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Mark as unique against the primary store.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Route the value through a related store.
    pub fn related(mut self, store: impl Into<StoreRef>) -> Self {
        self.related = Some(store.into());
        self
    }

    /// True when nothing would be written for this field.
    pub fn is_absent(&self) -> bool {
        matches!(self.value, None | Some(Value::Null))
    }
}

/// Target field name -> descriptor, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPatch(IndexMap<String, FieldDescriptor>);

impl TargetPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.insert(field, descriptor);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, descriptor: FieldDescriptor) {
        self.0.insert(field.into(), descriptor);
    }

    pub fn get(&self, field: &str) -> Option<&FieldDescriptor> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.0.iter()
    }

    /// Union with `other`; on key collision `other` wins.
    pub fn merge(&mut self, other: TargetPatch) {
        for (field, descriptor) in other.0 {
            self.0.insert(field, descriptor);
        }
    }

    /// Give every descriptor without a value the raw source value.
    pub fn fill_defaults(&mut self, raw: Option<&Value>) {
        for descriptor in self.0.values_mut() {
            if descriptor.value.is_none() {
                descriptor.value = raw.cloned();
            }
        }
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut FieldDescriptor> {
        self.0.values_mut()
    }
}

impl IntoIterator for TargetPatch {
    type Item = (String, FieldDescriptor);
    type IntoIter = indexmap::map::IntoIter<String, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, FieldDescriptor)> for TargetPatch {
    fn from_iter<I: IntoIterator<Item = (String, FieldDescriptor)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
