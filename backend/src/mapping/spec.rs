//! Mapping specifications: source field -> field mapping, in declaration order.

use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::patch::TargetPatch;
use crate::error::MappingResult;

/// Future returned by a resolver function.
pub type ResolveFuture = BoxFuture<'static, MappingResult<TargetPatch>>;

/// A function of the whole source record producing a target patch.
#[derive(Clone)]
pub struct Resolver(Arc<dyn Fn(Value) -> ResolveFuture + Send + Sync>);

impl Resolver {
    /// Wrap an async function.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MappingResult<TargetPatch>> + Send + 'static,
    {
        Self(Arc::new(move |record| f(record).boxed()))
    }

    /// Wrap a synchronous function.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value) -> MappingResult<TargetPatch> + Send + Sync + 'static,
    {
        Self::new(move |record| futures::future::ready(f(&record)))
    }

    pub fn call(&self, record: Value) -> ResolveFuture {
        (self.0)(record)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Resolver(..)")
    }
}

/// The three supported mapping shapes.
#[derive(Debug, Clone)]
pub enum FieldMapping {
    /// Copy the source value into the named target field.
    Rename(String),
    /// Fixed descriptors; string values may use `{{field}}` templates.
    Literal(TargetPatch),
    /// Arbitrary computation over the source record.
    Resolver(Resolver),
}

impl From<&str> for FieldMapping {
    fn from(target: &str) -> Self {
        FieldMapping::Rename(target.to_string())
    }
}

impl From<String> for FieldMapping {
    fn from(target: String) -> Self {
        FieldMapping::Rename(target)
    }
}

impl From<TargetPatch> for FieldMapping {
    fn from(patch: TargetPatch) -> Self {
        FieldMapping::Literal(patch)
    }
}

impl From<Resolver> for FieldMapping {
    fn from(resolver: Resolver) -> Self {
        FieldMapping::Resolver(resolver)
    }
}

/// Ordered source field -> mapping table.
#[derive(Debug, Clone, Default)]
pub struct MappingSpec {
    fields: IndexMap<String, FieldMapping>,
}

impl MappingSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style declaration. Redeclaring a field keeps its position.
    pub fn field(mut self, source: impl Into<String>, mapping: impl Into<FieldMapping>) -> Self {
        self.insert(source, mapping);
        self
    }

    pub fn insert(&mut self, source: impl Into<String>, mapping: impl Into<FieldMapping>) {
        self.fields.insert(source.into(), mapping.into());
    }

    /// Rename every listed field onto itself.
    pub fn identity<S: AsRef<str>>(fields: &[S]) -> Self {
        fields.iter().fold(Self::new(), |spec, f| {
            spec.field(f.as_ref(), f.as_ref())
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldMapping)> {
        self.fields.iter()
    }

    pub fn source_fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::FieldDescriptor;
    use serde_json::json;

    #[test]
    fn test_declaration_order() {
        let spec = MappingSpec::new()
            .field("zeta", "z")
            .field("alpha", "a")
            .field("mid", "m");
        assert_eq!(spec.source_fields(), vec!["zeta", "alpha", "mid"]);
    }

    #[tokio::test]
    async fn test_sync_resolver() {
        let resolver = Resolver::sync(|record| {
            let name = record["name"].as_str().unwrap_or_default().to_uppercase();
            Ok(TargetPatch::new().with("name", FieldDescriptor::value(name)))
        });

        let patch = resolver.call(json!({ "name": "jo" })).await.unwrap();
        assert_eq!(patch.get("name").unwrap().value, Some(json!("JO")));
    }
}
