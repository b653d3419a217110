use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tileplot_canvas::CanvasPage;
use tileplot_core::geometry::Bounds2D;
use tileplot_engine::{Orientation, PipelineOutput, TileIndex};

/// `--report` 输出的转换摘要。
#[derive(Debug, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub extent: Bounds2D,
    pub orientation: Orientation,
    pub page_width: f64,
    pub page_height: f64,
    pub cut_x: f64,
    pub cut_y: f64,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub kept: usize,
    pub removed: usize,
    pub skipped_annotations: usize,
    pub kept_tiles: Vec<TileIndex>,
    pub tiles: Vec<TileReport>,
}

#[derive(Debug, Serialize)]
pub struct TileReport {
    pub tile: TileIndex,
    pub non_white_pct: f64,
    pub is_empty: bool,
}

impl ConversionReport {
    pub fn new(
        input: &Path,
        output_path: &Path,
        skipped_annotations: usize,
        output: &PipelineOutput<CanvasPage>,
    ) -> Self {
        let layout = &output.layout;
        Self {
            input: input.to_path_buf(),
            output: output_path.to_path_buf(),
            extent: output.extent,
            orientation: layout.orientation,
            page_width: layout.page_width,
            page_height: layout.page_height,
            cut_x: layout.cut_x,
            cut_y: layout.cut_y,
            tiles_x: layout.tiles_x,
            tiles_y: layout.tiles_y,
            kept: output.document.kept,
            removed: output.document.removed,
            skipped_annotations,
            kept_tiles: output.document.kept_tiles.clone(),
            tiles: output
                .verdicts
                .iter()
                .map(|(tile, verdict)| TileReport {
                    tile: *tile,
                    non_white_pct: verdict.non_white_pct,
                    is_empty: verdict.is_empty,
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("序列化转换报告失败")?;
        fs::write(path, json).with_context(|| format!("写入转换报告 {} 失败", path.display()))
    }
}
