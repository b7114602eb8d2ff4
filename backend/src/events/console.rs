//! Default observer: one summary line per notification, followed by a
//! field table comparing source, mapped and persisted values.

use async_trait::async_trait;
use serde_json::Value;

use super::logs::{
    log_error, log_error_indent, log_info_indent, log_success, log_success_indent, log_warning,
};
use super::{EventBus, MigrationProgress};

/// Cells longer than this are truncated
const MAX_CELL: usize = 32;

/// Console observer
#[derive(Debug, Clone)]
pub struct ConsoleEvents {
    tables: bool,
}

impl ConsoleEvents {
    pub fn new() -> Self {
        Self { tables: true }
    }

    /// Summary lines only
    pub fn quiet() -> Self {
        Self { tables: false }
    }

    fn print_table(&self, progress: &MigrationProgress, indent: u8) {
        if !self.tables {
            return;
        }
        for line in render_table(progress) {
            log_info_indent(line, indent + 1);
        }
    }
}

impl Default for ConsoleEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for ConsoleEvents {
    async fn save(&self, progress: &MigrationProgress) {
        match progress.relation {
            Some(ref store) => {
                let id = progress.target_item.as_ref().map(short).unwrap_or_default();
                log_success_indent(format!("#{} related '{}' saved {}", progress.index, store, id), 1);
                self.print_table(progress, 1);
            }
            None => {
                log_success(format!("#{} saved", progress.index));
                self.print_table(progress, 0);
            }
        }
    }

    async fn skip(&self, progress: &MigrationProgress) {
        let reason = progress.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
        log_warning(format!("#{} skipped: {}", progress.index, reason));
        self.print_table(progress, 0);
    }

    async fn error(&self, progress: &MigrationProgress) {
        let reason = progress.error.as_ref().map(|e| e.message.as_str()).unwrap_or("");
        match progress.relation {
            Some(ref store) => {
                log_error_indent(
                    format!("#{} related '{}' failed: {}", progress.index, store, reason),
                    1,
                );
            }
            None => {
                log_error(format!("#{} failed: {}", progress.index, reason));
                self.print_table(progress, 0);
            }
        }
    }
}

/// Render `field | source | mapped | target` rows.
///
/// Relation notifications use the sub-record as their source column.
pub fn render_table(progress: &MigrationProgress) -> Vec<String> {
    let source = if progress.is_relation() {
        &progress.mapped_data
    } else {
        &progress.source_item
    };
    let columns = [Some(source), Some(&progress.mapped_data), progress.target_item.as_ref()];

    let mut fields: Vec<&String> = Vec::new();
    for column in columns.iter().flatten() {
        if let Value::Object(obj) = column {
            for key in obj.keys() {
                if !fields.contains(&key) {
                    fields.push(key);
                }
            }
        }
    }

    let rows: Vec<[String; 4]> = fields
        .iter()
        .map(|field| {
            let cell = |column: Option<&Value>| {
                column
                    .and_then(|c| c.get(field.as_str()))
                    .map(short)
                    .unwrap_or_default()
            };
            [
                field.to_string(),
                cell(columns[0]),
                cell(columns[1]),
                cell(columns[2]),
            ]
        })
        .collect();

    let header = ["field", "source", "mapped", "target"].map(String::from);
    let mut widths = header.clone().map(|h| h.chars().count());
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |row: &[String; 4]| {
        row.iter()
            .enumerate()
            .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![line(&header)];
    lines.push(widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    lines.extend(rows.iter().map(line));
    lines
}

/// Compact single-line form of a value
fn short(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL {
        let cut: String = text.chars().take(MAX_CELL - 1).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn progress() -> MigrationProgress {
        MigrationProgress {
            run_id: Uuid::new_v4(),
            index: 1,
            batch_ordinal: None,
            relation: None,
            source_item: json!({ "title": "A", "subtitle": "B" }),
            mapped_data: json!({ "title": "A: B" }),
            target_item: Some(json!({ "title": "A: B", "id": 1 })),
            error: None,
        }
    }

    #[test]
    fn test_table_has_union_of_fields() {
        let lines = render_table(&progress());
        assert!(lines[0].starts_with("field"));
        assert_eq!(lines.len(), 2 + 3);
        assert!(lines.iter().any(|l| l.starts_with("title") && l.contains("A: B")));
        assert!(lines.iter().any(|l| l.starts_with("id")));
    }

    #[test]
    fn test_short_truncates() {
        let long = json!("x".repeat(100));
        assert_eq!(short(&long).chars().count(), MAX_CELL);
        assert_eq!(short(&json!(12)), "12");
    }

    #[tokio::test]
    async fn test_console_never_panics() {
        let events = ConsoleEvents::quiet();
        let mut p = progress();
        events.save(&p).await;
        p.relation = Some("users".into());
        p.target_item = None;
        events.error(&p).await;
        events.skip(&p).await;
    }
}
