//! Options for a migration run.

use serde::{Deserialize, Serialize};

/// Options for [`crate::migrate::RestMigrator::boot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateOptions {
    /// Resolve everything, write nothing, yield the would-be records
    #[serde(default)]
    pub dry_run: bool,

    /// Records drawn and processed together per window
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            concurrency: default_concurrency(),
        }
    }
}

impl MigrateOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true, ..Self::default() }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Window size actually used (at least 1)
    pub fn window(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = MigrateOptions::default();
        assert!(!opts.dry_run);
        assert_eq!(opts.concurrency, 1);
    }

    #[test]
    fn test_zero_concurrency_normalized() {
        assert_eq!(MigrateOptions::default().with_concurrency(0).window(), 1);
    }

    #[test]
    fn test_json_defaults() {
        let opts: MigrateOptions = serde_json::from_str(r#"{ "dryRun": true }"#).unwrap();
        assert!(opts.dry_run);
        assert_eq!(opts.concurrency, 1);
    }
}
