pub mod csv_loader;
pub mod json_loader;
pub mod toml_loader;

pub use csv_loader::parse_csv_rows;
pub use json_loader::parse_json_rows;
pub use toml_loader::parse_toml_rows;

use crate::error::ImportError;
use crate::models::preview::ImportPreviewRow;
use std::path::Path;
use tokio::fs;

/// 导入文件的格式，由扩展名决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Json,
    Toml,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(SheetFormat::Csv),
            "json" => Some(SheetFormat::Json),
            "toml" => Some(SheetFormat::Toml),
            _ => None,
        }
    }

    pub fn parse(self, content: &str, file_name: &str) -> Result<Vec<ImportPreviewRow>, ImportError> {
        match self {
            SheetFormat::Csv => parse_csv_rows(content, file_name),
            SheetFormat::Json => parse_json_rows(content, file_name),
            SheetFormat::Toml => parse_toml_rows(content, file_name),
        }
    }
}

/// 读取导入文件并解析为预览行
pub async fn load_preview_rows(path: &Path) -> Result<Vec<ImportPreviewRow>, ImportError> {
    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let format = SheetFormat::from_path(path).ok_or_else(|| ImportError::UnsupportedFileType {
        file_name: file_name.clone(),
    })?;

    tracing::info!("正在加载: {}", file_name);

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ImportError::Unreadable {
            file_name: file_name.clone(),
            reason: e.to_string(),
        })?;

    format.parse(&content, &file_name)
}
