use crate::error::ImportError;
use crate::models::preview::ImportPreviewRow;
use serde::Deserialize;

/// TOML 导入文件：每个 `[[rows]]` 表是一行
#[derive(Debug, Deserialize)]
struct TomlSheet {
    #[serde(default)]
    rows: Vec<toml::Table>,
}

/// 从 TOML 文本解析预览行
pub fn parse_toml_rows(content: &str, file_name: &str) -> Result<Vec<ImportPreviewRow>, ImportError> {
    let sheet: TomlSheet = toml::from_str(content).map_err(|e| ImportError::Malformed {
        file_name: file_name.to_string(),
        line: error_line(content, e.span()),
        reason: e.message().to_string(),
    })?;

    let mut rows = Vec::with_capacity(sheet.rows.len());
    for (idx, table) in sheet.rows.into_iter().enumerate() {
        let mut row = ImportPreviewRow::new();
        for (column, value) in table {
            let cell = cell_text(&value).ok_or_else(|| ImportError::Malformed {
                file_name: file_name.to_string(),
                line: 0,
                reason: format!("第 {} 行的列 '{}' 不是简单值", idx + 1, column),
            })?;
            row.insert(column, cell);
        }
        rows.push(row);
    }

    tracing::debug!("TOML 文件 {} 解析出 {} 行", file_name, rows.len());
    Ok(rows)
}

/// 把 TOML 值转成单元格文本，嵌套表不支持
fn cell_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(items) => items
            .iter()
            .map(cell_text)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(", ")),
        toml::Value::Table(_) => None,
    }
}

fn error_line(content: &str, span: Option<std::ops::Range<usize>>) -> usize {
    span.map(|s| content[..s.start.min(content.len())].lines().count().max(1))
        .unwrap_or(0)
}
