//! 输入输出：DXF 导入与 PDF 导出。

mod dxf;
mod pdf;

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tileplot_canvas::CanvasPage;
use tileplot_core::document::{BoundsOptions, Drawing};
use tracing::{info, warn};

use crate::dxf::{DxfError, DxfParser};

pub use dxf::{DEFAULT_CHORD_TOLERANCE, DxfImport};
pub use pdf::PdfSaver;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported entity type {kind} at entity #{index}")]
    UnsupportedEntity { kind: String, index: usize },
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl From<DxfError> for IoError {
    fn from(err: DxfError) -> Self {
        match err {
            DxfError::Unsupported { kind, index } => IoError::UnsupportedEntity { kind, index },
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        }
    }
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, pages: &[CanvasPage], path: &Path) -> Result<(), IoError>;
}

/// DXF 导入器。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DxfFacade {
    chord_tolerance: f64,
    bounds_options: BoundsOptions,
}

impl DxfFacade {
    pub fn new() -> Self {
        Self {
            chord_tolerance: DEFAULT_CHORD_TOLERANCE,
            bounds_options: BoundsOptions::default(),
        }
    }

    pub fn with_chord_tolerance(mut self, tolerance: f64) -> Self {
        self.chord_tolerance = tolerance;
        self
    }

    pub fn with_bounds_options(mut self, options: BoundsOptions) -> Self {
        self.bounds_options = options;
        self
    }

    /// 解析内存中的 DXF 文本。
    pub fn parse_str(&self, source: &str) -> Result<DxfImport, IoError> {
        let import = DxfParser::new(source, self.chord_tolerance, self.bounds_options).parse()?;
        Ok(import)
    }

    /// 读取文件并返回导入统计。
    pub fn import(&self, path: &Path) -> Result<DxfImport, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        // R2007 之前的 DXF 按 ANSI 代码页保存，非 UTF-8 字节只会出现在文字内容中
        let data = String::from_utf8_lossy(&bytes);
        if let Cow::Owned(_) = data {
            warn!(path = ?path, "文件包含非 UTF-8 字节，已按替换字符解码");
        }
        let import = self.parse_str(&data)?;
        info!(
            path = ?path,
            entities = import.drawing.len(),
            skipped = import.skipped_annotations,
            "DXF 导入完成"
        );
        Ok(import)
    }
}

impl Default for DxfFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        self.import(path).map(|import| import.drawing)
    }
}
