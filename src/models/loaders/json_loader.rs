use crate::error::ImportError;
use crate::models::preview::ImportPreviewRow;
use serde_json::Value;

/// 从 JSON 文本解析预览行，文件内容必须是对象数组
pub fn parse_json_rows(content: &str, file_name: &str) -> Result<Vec<ImportPreviewRow>, ImportError> {
    let malformed = |line: usize, reason: String| ImportError::Malformed {
        file_name: file_name.to_string(),
        line,
        reason,
    };

    let value: Value =
        serde_json::from_str(content).map_err(|e| malformed(e.line(), e.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| malformed(1, "顶层必须是数组".to_string()))?;

    let mut rows = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let object = item
            .as_object()
            .ok_or_else(|| malformed(0, format!("第 {} 项不是对象", idx + 1)))?;
        let mut row = ImportPreviewRow::new();
        for (column, value) in object {
            let cell = cell_text(value).ok_or_else(|| {
                malformed(0, format!("第 {} 项的字段 '{}' 不是简单值", idx + 1, column))
            })?;
            row.insert(column.clone(), cell);
        }
        rows.push(row);
    }

    tracing::debug!("JSON 文件 {} 解析出 {} 行", file_name, rows.len());
    Ok(rows)
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(", ")),
        Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_of_objects_becomes_rows() {
        let content = r#"[
            {"Question Text": "What is the largest planet?", "Subject": "Astronomy",
             "Option A": "Saturn", "Option B": "Jupiter (Correct)", "Max Score": 2},
            {"Question Text": "Describe gravity.", "Type": "Essay", "Tags": ["Physics", "Basic"], "Answer": null}
        ]"#;
        let rows = parse_json_rows(content, "bank.json").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].columns().next(), Some("Question Text"));
        assert_eq!(rows[0].get("Max Score"), Some("2"));
        assert_eq!(rows[1].get("Tags"), Some("Physics, Basic"));
        assert_eq!(rows[1].get("Answer"), None);
    }

    #[test]
    fn non_array_document_is_malformed() {
        let err = parse_json_rows(r#"{"rows": []}"#, "bank.json").unwrap_err();
        assert!(matches!(err, ImportError::Malformed { .. }));
        let err = parse_json_rows("[1, 2]", "bank.json").unwrap_err();
        assert!(matches!(err, ImportError::Malformed { .. }));
    }
}
