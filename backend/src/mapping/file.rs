//! Mapping files: a JSON description of a [`MappingSpec`] and its target store.
//!
//! ```json
//! {
//!   "target": "articles",
//!   "fields": {
//!     "title": { "derive": { "title": { "template": "{{title}}: {{subtitle}}" } } },
//!     "keywords": { "derive": {
//!       "category": { "source": "keywords", "operations": [{"type": "split"}, {"type": "first"}] },
//!       "tags": { "source": "keywords", "operations": [{"type": "split"}, {"type": "rest"}] }
//!     } },
//!     "author": { "derive": { "author": {
//!       "fields": { "name": { "source": "author" }, "email": { "source": "email" } },
//!       "related": "users"
//!     } } },
//!     "slug": "slug",
//!     "status": { "literal": { "status": { "value": "draft" } } }
//!   }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::patch::TargetPatch;
use super::rule::{compile, DerivedField};
use super::spec::MappingSpec;
use crate::error::MappingResult;
use crate::store::StoreRef;

/// One field entry of a mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMappingDef {
    Rename(String),
    Literal { literal: TargetPatch },
    Derive { derive: IndexMap<String, DerivedField> },
}

/// A complete mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingFile {
    /// Primary store the records are migrated into
    pub target: StoreRef,

    /// Source field -> mapping, in declaration order
    pub fields: IndexMap<String, FieldMappingDef>,
}

impl MappingFile {
    /// Parse a mapping file from a JSON string
    pub fn from_json(json: &str) -> MappingResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a mapping file
    pub fn load(path: impl AsRef<Path>) -> MappingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Build the executable spec. Derive rules are validated here.
    pub fn to_spec(&self) -> MappingResult<MappingSpec> {
        let mut spec = MappingSpec::new();
        for (source, def) in &self.fields {
            match def {
                FieldMappingDef::Rename(target) => spec.insert(source.clone(), target.clone()),
                FieldMappingDef::Literal { literal } => spec.insert(source.clone(), literal.clone()),
                FieldMappingDef::Derive { derive } => {
                    spec.insert(source.clone(), compile(derive.clone())?)
                }
            }
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MappingError;
    use crate::mapping::resolve;
    use serde_json::json;

    const ARTICLES: &str = r#"{
        "target": "articles",
        "fields": {
            "title": { "derive": { "title": { "template": "{{title}}: {{subtitle}}" } } },
            "keywords": { "derive": {
                "category": { "source": "keywords", "operations": [{"type": "split"}, {"type": "first"}] },
                "tags": { "source": "keywords", "operations": [{"type": "split"}, {"type": "rest"}] }
            } },
            "author": { "derive": { "author": {
                "fields": { "name": { "source": "author" }, "email": { "source": "email" } },
                "related": "users"
            } } },
            "slug": "slug",
            "status": { "literal": { "status": { "value": "draft" } } }
        }
    }"#;

    #[test]
    fn test_parse_shapes() {
        let file = MappingFile::from_json(ARTICLES).unwrap();
        assert_eq!(file.target, StoreRef::new("articles"));
        assert!(matches!(file.fields["slug"], FieldMappingDef::Rename(_)));
        assert!(matches!(file.fields["status"], FieldMappingDef::Literal { .. }));
        assert!(matches!(file.fields["keywords"], FieldMappingDef::Derive { .. }));

        let spec = file.to_spec().unwrap();
        assert_eq!(spec.source_fields(), vec!["title", "keywords", "author", "slug", "status"]);
    }

    #[tokio::test]
    async fn test_relation_rule_builds_sub_record() {
        let spec = MappingFile::from_json(ARTICLES).unwrap().to_spec().unwrap();
        let record = json!({ "author": "Jo", "email": "jo@x" });
        let (field, mapping) = spec.iter().find(|(f, _)| *f == "author").unwrap();

        let patch = resolve(field, mapping, &record).await.unwrap();
        let author = patch.get("author").unwrap();
        assert_eq!(author.value, Some(json!({ "name": "Jo", "email": "jo@x" })));
        assert_eq!(author.related, Some(StoreRef::new("users")));
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let file = MappingFile::from_json(
            r#"{ "target": "t", "fields": { "a": { "derive": { "a": { "operations": [] } } } } }"#,
        )
        .unwrap();
        assert!(matches!(file.to_spec(), Err(MappingError::Rule { .. })));
    }

    #[test]
    fn test_malformed_file_is_json_error() {
        assert!(matches!(MappingFile::from_json("{ \"target\": "), Err(MappingError::Json(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, ARTICLES).unwrap();
        assert_eq!(MappingFile::load(&path).unwrap().fields.len(), 5);
    }
}
