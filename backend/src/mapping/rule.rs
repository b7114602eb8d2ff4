//! Declarative derive rules.
//!
//! A rule computes one target value from any fields of the source record.
//! A set of rules compiles into a [`Resolver`], which is how mapping files
//! express many-to-one, one-to-many and relational mappings without code.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::operations::Operation;
use super::patch::{FieldDescriptor, TargetPatch};
use super::spec::Resolver;
use super::template;
use crate::error::{MappingError, MappingResult};
use crate::store::StoreRef;

/// Rule for a single derived target field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedField {
    /// Single source field
    #[serde(default)]
    pub source: Option<String>,

    /// Several source fields joined with `separator`, blanks skipped
    #[serde(default)]
    pub sources: Option<Vec<String>>,

    /// Separator for `sources` (default: " ")
    #[serde(default = "default_separator")]
    pub separator: String,

    /// `{{field}}` template rendered against the record
    #[serde(default)]
    pub template: Option<String>,

    /// Constant value
    #[serde(default)]
    pub constant: Option<Value>,

    /// Build an object from nested rules
    #[serde(default)]
    pub fields: Option<IndexMap<String, DerivedField>>,

    /// Operations applied in order to the initial value
    #[serde(default)]
    pub operations: Vec<Operation>,

    /// Used when the value is empty before or after operations
    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub unique: bool,

    #[serde(default)]
    pub related: Option<StoreRef>,
}

fn default_separator() -> String {
    " ".to_string()
}

impl DerivedField {
    pub fn from_source(source: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            separator: default_separator(),
            ..Self::default()
        }
    }

    pub fn from_sources(sources: &[&str], separator: &str) -> Self {
        Self {
            sources: Some(sources.iter().map(|s| s.to_string()).collect()),
            separator: separator.to_string(),
            ..Self::default()
        }
    }

    pub fn from_template(template: &str) -> Self {
        Self {
            template: Some(template.to_string()),
            separator: default_separator(),
            ..Self::default()
        }
    }

    pub fn from_fields(fields: IndexMap<String, DerivedField>) -> Self {
        Self {
            fields: Some(fields),
            separator: default_separator(),
            ..Self::default()
        }
    }

    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn related(mut self, store: impl Into<StoreRef>) -> Self {
        self.related = Some(store.into());
        self
    }

    /// Check that exactly one value origin is set.
    pub fn validate(&self, target: &str) -> MappingResult<()> {
        let origins = [
            self.source.is_some(),
            self.sources.is_some(),
            self.template.is_some(),
            self.constant.is_some(),
            self.fields.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();

        if origins != 1 {
            return Err(MappingError::Rule {
                field: target.to_string(),
                message: "expected exactly one of source, sources, template, constant, fields"
                    .to_string(),
            });
        }
        if let Some(ref fields) = self.fields {
            for (name, rule) in fields {
                rule.validate(&format!("{}.{}", target, name))?;
            }
        }
        Ok(())
    }

    /// Evaluate against a source record. `Null` means "nothing to write".
    pub fn evaluate(&self, record: &Map<String, Value>) -> Value {
        let initial = if let Some(ref source) = self.source {
            record.get(source).cloned()
        } else if let Some(ref sources) = self.sources {
            let parts: Vec<String> = sources
                .iter()
                .filter_map(|s| record.get(s))
                .filter_map(scalar_text)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| Value::String(parts.join(&self.separator)))
        } else if let Some(ref tpl) = self.template {
            Some(Value::String(template::render(tpl, &Value::Object(record.clone()))))
        } else if let Some(ref fields) = self.fields {
            let obj: Map<String, Value> = fields
                .iter()
                .map(|(name, rule)| (name.clone(), rule.evaluate(record)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            Some(Value::Object(obj))
        } else {
            self.constant.clone()
        };

        let value = match initial {
            Some(v) if !is_empty(&v) => v,
            _ => return self.default.clone().unwrap_or(Value::Null),
        };

        let value = self.operations.iter().fold(value, |v, op| op.apply(&v));

        if is_empty(&value) {
            self.default.clone().unwrap_or(Value::Null)
        } else {
            value
        }
    }

    fn descriptor(&self, record: &Map<String, Value>) -> FieldDescriptor {
        FieldDescriptor {
            value: Some(self.evaluate(record)),
            unique: self.unique,
            related: self.related.clone(),
        }
    }
}

/// Compile a rule set into a resolver producing one descriptor per rule.
pub fn compile(rules: IndexMap<String, DerivedField>) -> MappingResult<Resolver> {
    for (target, rule) in &rules {
        rule.validate(target)?;
    }

    Ok(Resolver::sync(move |record| {
        let obj = record.as_object().ok_or(MappingError::NotAnObject)?;
        Ok(rules
            .iter()
            .map(|(target, rule)| (target.clone(), rule.descriptor(obj)))
            .collect::<TargetPatch>())
    }))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Check if a value is "empty" (null, blank string, empty array/object)
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_sources_concat_skip_blank() {
        let rule = DerivedField::from_sources(&["first", "middle", "last"], " ");
        let row = record(json!({ "first": "Jo", "middle": " ", "last": "Doe" }));
        assert_eq!(rule.evaluate(&row), json!("Jo Doe"));
    }

    #[test]
    fn test_default_when_empty_after_operations() {
        let rule = DerivedField::from_source("tags")
            .with_operation(Operation::Split { separator: ",".into() })
            .with_default(json!(["untagged"]));
        assert_eq!(rule.evaluate(&record(json!({ "tags": " , " }))), json!(["untagged"]));
    }

    #[test]
    fn test_nested_fields_drop_nulls() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), DerivedField::from_source("author"));
        fields.insert("email".to_string(), DerivedField::from_source("email"));
        let rule = DerivedField::from_fields(fields);

        let value = rule.evaluate(&record(json!({ "author": "Jo" })));
        assert_eq!(value, json!({ "name": "Jo" }));
    }

    #[test]
    fn test_validate_rejects_ambiguous_rule() {
        let rule = DerivedField {
            constant: Some(json!(1)),
            ..DerivedField::from_source("a")
        };
        assert!(rule.validate("x").is_err());
        assert!(DerivedField::default().validate("x").is_err());
    }

    #[tokio::test]
    async fn test_compile_fan_out() {
        let mut rules = IndexMap::new();
        rules.insert(
            "category".to_string(),
            DerivedField::from_source("keywords")
                .with_operation(Operation::Split { separator: ",".into() })
                .with_operation(Operation::First),
        );
        rules.insert(
            "tags".to_string(),
            DerivedField::from_source("keywords")
                .with_operation(Operation::Split { separator: ",".into() })
                .with_operation(Operation::Rest),
        );

        let resolver = compile(rules).unwrap();
        let patch = resolver.call(json!({ "keywords": "x,y,z" })).await.unwrap();

        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("category").unwrap().value, Some(json!("x")));
        assert_eq!(patch.get("tags").unwrap().value, Some(json!(["y", "z"])));
    }

    #[tokio::test]
    async fn test_compiled_resolver_rejects_non_object() {
        let mut rules = IndexMap::new();
        rules.insert("a".to_string(), DerivedField::from_source("a"));
        let resolver = compile(rules).unwrap();
        assert!(matches!(
            resolver.call(json!([1, 2])).await,
            Err(MappingError::NotAnObject)
        ));
    }
}
