use serde::{Deserialize, Serialize};
use thiserror::Error;
use tileplot_core::geometry::{Bounds2D, Point2};

/// 页面方向：横向时物理页宽大于页高。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// 由整体范围决定方向：宽大于高取横向，否则纵向。
    pub fn for_extent(extent: &Bounds2D) -> Self {
        if extent.width() > extent.height() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// 纸张尺寸（纵向摆放时的宽与高），单位为文档长度单位（英寸）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

impl PaperSize {
    pub const LETTER: PaperSize = PaperSize::new(8.5, 11.0);
    pub const LEGAL: PaperSize = PaperSize::new(8.5, 14.0);
    pub const TABLOID: PaperSize = PaperSize::new(11.0, 17.0);
    pub const A4: PaperSize = PaperSize::new(8.267, 11.693);

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 按方向返回 (页宽, 页高)。
    pub fn oriented(&self, orientation: Orientation) -> (f64, f64) {
        let short = self.width.min(self.height);
        let long = self.width.max(self.height);
        match orientation {
            Orientation::Landscape => (long, short),
            Orientation::Portrait => (short, long),
        }
    }
}

impl Default for PaperSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// 分页参数。`scale` 为页面长度与世界长度之比（放大倍数）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub paper: PaperSize,
    pub margin: f64,
    pub overlap: f64,
    pub scale: f64,
}

impl LayoutParams {
    pub const DEFAULT_MARGIN: f64 = 0.25;
    pub const DEFAULT_OVERLAP: f64 = 0.5;

    pub fn new(scale: f64) -> Self {
        Self {
            paper: PaperSize::default(),
            margin: Self::DEFAULT_MARGIN,
            overlap: Self::DEFAULT_OVERLAP,
            scale,
        }
    }

    fn validate(&self) -> Result<(), LayoutError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(LayoutError::InvalidParameter {
                name: "scale",
                value: self.scale,
            });
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(LayoutError::InvalidParameter {
                name: "margin",
                value: self.margin,
            });
        }
        if !self.overlap.is_finite() || self.overlap < 0.0 {
            return Err(LayoutError::InvalidParameter {
                name: "overlap",
                value: self.overlap,
            });
        }
        Ok(())
    }
}

/// 单次转换允许的最大页数。
pub const MAX_TILES: u64 = 100_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("layout parameter `{name}` is invalid: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error(
        "page {axis} of {page} leaves no printable span after overlap {overlap} and margins {margin}"
    )]
    NoPrintableSpan {
        axis: &'static str,
        page: f64,
        overlap: f64,
        margin: f64,
    },
    #[error("drawing extent is not finite")]
    NonFiniteExtent,
    #[error("tile grid {tiles_x} x {tiles_y} exceeds the limit of {limit} pages")]
    GridTooLarge {
        tiles_x: f64,
        tiles_y: f64,
        limit: u64,
    },
}

/// 网格中的一页，按 (i, j) 索引：i 沿 X，j 沿 Y。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub i: u32,
    pub j: u32,
}

impl TileIndex {
    #[inline]
    pub fn new(i: u32, j: u32) -> Self {
        Self { i, j }
    }

    /// 页面标签文本。
    pub fn label(&self) -> String {
        format!("({}, {})", self.i, self.j)
    }
}

/// 世界坐标到单页打印坐标的仿射变换。页面 Y 轴向下，世界 Y 轴向上。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    pub scale: f64,
    pub margin: f64,
    pub page_height: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl PageTransform {
    #[inline]
    pub fn apply(&self, point: Point2) -> (f64, f64) {
        let x = self.scale * (point.x() - self.origin_x) + self.margin;
        let y = self.page_height - self.scale * (point.y() - self.origin_y) - self.margin;
        (x, y)
    }

    #[inline]
    pub fn length(&self, world_length: f64) -> f64 {
        world_length * self.scale
    }
}

/// 分页规划结果：方向、物理页尺寸、每页有效跨度与网格规模。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileLayout {
    pub orientation: Orientation,
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    pub overlap: f64,
    pub scale: f64,
    pub cut_x: f64,
    pub cut_y: f64,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub extent: Bounds2D,
}

impl TileLayout {
    /// 根据归一化后的整体范围规划网格。方向只在此处根据整体范围决定一次。
    pub fn plan(extent: &Bounds2D, params: &LayoutParams) -> Result<Self, LayoutError> {
        params.validate()?;
        if extent.is_empty() || !extent.is_finite() {
            return Err(LayoutError::NonFiniteExtent);
        }
        let orientation = Orientation::for_extent(extent);
        let (page_width, page_height) = params.paper.oriented(orientation);
        let cut_x = printable_cut("width", page_width, params)?;
        let cut_y = printable_cut("height", page_height, params)?;
        let (tiles_x, tiles_y) = grid_size(extent, cut_x, cut_y)?;

        Ok(Self {
            orientation,
            page_width,
            page_height,
            margin: params.margin,
            overlap: params.overlap,
            scale: params.scale,
            cut_x,
            cut_y,
            tiles_x,
            tiles_y,
            extent: *extent,
        })
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// 固定的遍历顺序：先 i 后 j，与输出页序一致。
    pub fn tiles(&self) -> impl Iterator<Item = TileIndex> + use<> {
        let tiles_y = self.tiles_y;
        (0..self.tiles_x).flat_map(move |i| (0..tiles_y).map(move |j| TileIndex::new(i, j)))
    }

    /// 页面左下角在世界坐标中的原点（不含页边距）。
    #[inline]
    pub fn tile_origin(&self, tile: TileIndex) -> Point2 {
        Point2::new(tile.i as f64 * self.cut_x, tile.j as f64 * self.cut_y)
    }

    pub fn transform(&self, tile: TileIndex) -> PageTransform {
        let origin = self.tile_origin(tile);
        PageTransform {
            scale: self.scale,
            margin: self.margin,
            page_height: self.page_height,
            origin_x: origin.x(),
            origin_y: origin.y(),
        }
    }

    /// 页边距以内可见的世界坐标范围。相邻两页沿公共边重叠 `overlap / scale`。
    pub fn printable_region(&self, tile: TileIndex) -> Bounds2D {
        let origin = self.tile_origin(tile);
        let width = (self.page_width - 2.0 * self.margin) / self.scale;
        let height = (self.page_height - 2.0 * self.margin) / self.scale;
        Bounds2D::new(
            origin,
            Point2::new(origin.x() + width, origin.y() + height),
        )
    }

    /// 页边距以内的打印区域（页面坐标）：(x, y, 宽, 高)。
    pub fn printable_rect(&self) -> (f64, f64, f64, f64) {
        (
            self.margin,
            self.margin,
            self.page_width - 2.0 * self.margin,
            self.page_height - 2.0 * self.margin,
        )
    }
}

fn printable_cut(
    axis: &'static str,
    page: f64,
    params: &LayoutParams,
) -> Result<f64, LayoutError> {
    let span = page - params.overlap - 2.0 * params.margin;
    if span <= 0.0 {
        return Err(LayoutError::NoPrintableSpan {
            axis,
            page,
            overlap: params.overlap,
            margin: params.margin,
        });
    }
    Ok(span / params.scale)
}

fn tile_count(length: f64, cut: f64) -> f64 {
    let count = (length / cut).ceil();
    if count >= 1.0 { count } else { 1.0 }
}

/// 网格总页数超过 [`MAX_TILES`] 时拒绝，而不是截断网格。
fn grid_size(extent: &Bounds2D, cut_x: f64, cut_y: f64) -> Result<(u32, u32), LayoutError> {
    let tiles_x = tile_count(extent.width(), cut_x);
    let tiles_y = tile_count(extent.height(), cut_y);
    let total = tiles_x * tiles_y;
    if !total.is_finite() || total > MAX_TILES as f64 {
        return Err(LayoutError::GridTooLarge {
            tiles_x,
            tiles_y,
            limit: MAX_TILES,
        });
    }
    Ok((tiles_x as u32, tiles_y as u32))
}
