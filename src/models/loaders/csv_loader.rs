//! CSV 导入文件解析
//!
//! 第一行是表头；字段可用双引号包裹，引号内允许逗号、换行和 `""` 转义。

use crate::error::ImportError;
use crate::models::preview::ImportPreviewRow;

/// 从 CSV 文本解析预览行
pub fn parse_csv_rows(content: &str, file_name: &str) -> Result<Vec<ImportPreviewRow>, ImportError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let records = split_records(content, file_name)?;

    let mut iter = records.into_iter();
    let (header_line, header) = match iter.next() {
        Some(h) => h,
        None => return Ok(Vec::new()),
    };
    let header: Vec<String> = header.into_iter().map(|h| h.trim().to_string()).collect();
    if header.iter().all(|h| h.is_empty()) {
        return Err(ImportError::Malformed {
            file_name: file_name.to_string(),
            line: header_line,
            reason: "表头为空".to_string(),
        });
    }
    // 列名不区分大小写，不允许重复
    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = header
        .iter()
        .filter(|h| !h.is_empty())
        .find(|h| !seen.insert(h.to_lowercase()))
    {
        return Err(ImportError::Malformed {
            file_name: file_name.to_string(),
            line: header_line,
            reason: format!("表头中的列 '{}' 重复", dup),
        });
    }

    let mut rows = Vec::new();
    for (line, fields) in iter {
        // 跳过空行
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if fields.len() > header.len() {
            return Err(ImportError::Malformed {
                file_name: file_name.to_string(),
                line,
                reason: format!("字段数 {} 超过表头列数 {}", fields.len(), header.len()),
            });
        }
        let row: ImportPreviewRow = header
            .iter()
            .zip(fields.into_iter().chain(std::iter::repeat(String::new())))
            .map(|(column, value)| (column.clone(), value))
            .collect();
        rows.push(row);
    }

    tracing::debug!("CSV 文件 {} 解析出 {} 行", file_name, rows.len());
    Ok(rows)
}

/// 切分记录，返回 (起始行号, 字段列表)
fn split_records(content: &str, file_name: &str) -> Result<Vec<(usize, Vec<String>)>, ImportError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut field)),
            ('\r', false) if chars.peek() == Some(&'\n') => {}
            ('\n', false) => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            ('\n', true) => {
                field.push('\n');
                line += 1;
            }
            (other, _) => field.push(other),
        }
    }

    if in_quotes {
        return Err(ImportError::Malformed {
            file_name: file_name.to_string(),
            line: record_line,
            reason: "引号未闭合".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }

    Ok(records)
}
