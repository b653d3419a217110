//! 基于显示列表的页面后端：页面以命令序列保存在内存中，
//! 栅格化交给 tiny-skia，写出 PDF 由 `tileplot-io` 负责。

pub mod bezier;
pub mod canvas;
pub mod raster;

use tileplot_engine::{LuminanceGrid, PageBackend, RenderError};

pub use bezier::{ArcCurves, CubicSegment, arc_curves};
pub use canvas::{CanvasPage, Command, Layer};
pub use raster::rasterize_page;

/// 每英寸 72 个采样点。
pub const DEFAULT_SAMPLES_PER_UNIT: f64 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBackend {
    samples_per_unit: f64,
}

impl CanvasBackend {
    pub fn new(samples_per_unit: f64) -> Self {
        Self { samples_per_unit }
    }

    #[inline]
    pub fn samples_per_unit(&self) -> f64 {
        self.samples_per_unit
    }
}

impl Default for CanvasBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLES_PER_UNIT)
    }
}

impl PageBackend for CanvasBackend {
    type Page = CanvasPage;

    fn new_page(&self, width: f64, height: f64) -> Result<CanvasPage, RenderError> {
        CanvasPage::new(width, height)
    }

    fn rasterize(&self, page: &CanvasPage) -> Result<LuminanceGrid, RenderError> {
        rasterize_page(page, self.samples_per_unit)
    }

    fn merge_overlay(&self, base: &mut CanvasPage, overlay: CanvasPage) -> Result<(), RenderError> {
        base.append_layers(overlay);
        Ok(())
    }
}
