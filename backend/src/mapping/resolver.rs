//! Field resolution: one mapping entry + one source record -> target patch.

use serde_json::Value;

use super::patch::{FieldDescriptor, TargetPatch};
use super::spec::FieldMapping;
use super::template;
use crate::error::MappingResult;

/// Resolve `mapping` (declared for `source_field`) against `record`.
///
/// Descriptors without a value receive the raw value of `source_field`.
/// Resolver errors propagate unchanged.
pub async fn resolve(
    source_field: &str,
    mapping: &FieldMapping,
    record: &Value,
) -> MappingResult<TargetPatch> {
    let mut patch = match mapping {
        FieldMapping::Rename(target) => {
            TargetPatch::new().with(target.clone(), FieldDescriptor::passthrough())
        }
        FieldMapping::Literal(patch) => render_literal(patch, record),
        FieldMapping::Resolver(resolver) => resolver.call(record.clone()).await?,
    };

    patch.fill_defaults(record.get(source_field));
    Ok(patch)
}

fn render_literal(patch: &TargetPatch, record: &Value) -> TargetPatch {
    let mut rendered = patch.clone();
    for descriptor in rendered.values_mut() {
        if let Some(ref value) = descriptor.value {
            descriptor.value = Some(template::render_value(value, record));
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use crate::mapping::Resolver;
    use serde_json::json;

    #[tokio::test]
    async fn test_rename_passes_value_through() {
        let record = json!({ "name": { "first": "Jo" } });
        let patch = resolve("name", &"fullName".into(), &record).await.unwrap();

        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("fullName").unwrap().value, Some(json!({ "first": "Jo" })));
    }

    #[tokio::test]
    async fn test_rename_missing_source_is_absent() {
        let patch = resolve("nope", &"x".into(), &json!({})).await.unwrap();
        assert!(patch.get("x").unwrap().is_absent());
    }

    #[tokio::test]
    async fn test_literal_renders_templates() {
        let literal = TargetPatch::new()
            .with("status", FieldDescriptor::value("imported"))
            .with("note", FieldDescriptor::value("from {{origin}}"))
            .with("raw", FieldDescriptor::passthrough());
        let record = json!({ "origin": "legacy", "raw": 7 });

        let patch = resolve("raw", &literal.into(), &record).await.unwrap();
        assert_eq!(patch.get("status").unwrap().value, Some(json!("imported")));
        assert_eq!(patch.get("note").unwrap().value, Some(json!("from legacy")));
        assert_eq!(patch.get("raw").unwrap().value, Some(json!(7)));
    }

    #[tokio::test]
    async fn test_resolver_sees_whole_record() {
        let combine = Resolver::sync(|r| {
            let title = format!("{}: {}", r["title"].as_str().unwrap_or(""), r["subtitle"].as_str().unwrap_or(""));
            Ok(TargetPatch::new().with("title", FieldDescriptor::value(title)))
        });
        let record = json!({ "title": "A", "subtitle": "B" });

        let patch = resolve("title", &combine.into(), &record).await.unwrap();
        assert_eq!(patch.get("title").unwrap().value, Some(json!("A: B")));
    }

    #[tokio::test]
    async fn test_resolver_error_propagates() {
        let failing = Resolver::new(|_| async { Err(MappingError::resolver("bad row")) });
        let result = resolve("x", &failing.into(), &json!({})).await;
        assert!(result.unwrap_err().to_string().contains("bad row"));
    }
}
