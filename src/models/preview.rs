use serde::{Deserialize, Serialize};

/// 导入预览行：按列顺序保存"列名 → 原始单元格"
///
/// 确认之前它还不是题目。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreviewRow {
    cells: Vec<(String, String)>,
}

impl ImportPreviewRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一列；同名列覆盖原值但保留原位置
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// 按列名取值（忽略大小写与首尾空白），空字符串视为缺失
    pub fn get(&self, column: &str) -> Option<&str> {
        let wanted = column.trim();
        self.cells
            .iter()
            .find(|(c, _)| c.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn cells(&self) -> &[(String, String)] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ImportPreviewRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ImportPreviewRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}
