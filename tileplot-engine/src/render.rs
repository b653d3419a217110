//! 页面渲染：把世界坐标图元经过分页变换后，以页面坐标调用绘图接口。
//!
//! 实际绘制交给 [`DrawingSurface`] 的实现；本模块只负责坐标变换与图元拆分。

use thiserror::Error;
use tileplot_core::document::{Arc, Drawing, Ellipse, Entity, Line};
use tileplot_core::geometry::{Bounds2D, Point2};

use crate::detect::LuminanceGrid;
use crate::layout::{PageTransform, TileIndex, TileLayout};
use crate::marks::{MarkParams, MarkSet};

/// 裁剪矩形向外扩展的容差（半毫米），避免边线被裁掉一半。
pub const CLIP_TOLERANCE: f64 = 0.5 / 25.4;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("invalid clip rectangle ({x}, {y}, {width}, {height})")]
    InvalidClip {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    #[error("non-finite coordinate in `{operation}`")]
    NonFinite { operation: &'static str },
    #[error("invalid page size {width} x {height}")]
    InvalidPage { width: f64, height: f64 },
    #[error("rasterization failed: {0}")]
    Raster(String),
}

/// 描边样式：灰度（0 为黑，255 为白）与线宽（页面单位）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub gray: u8,
    pub width: f64,
}

impl StrokeStyle {
    #[inline]
    pub fn new(gray: u8, width: f64) -> Self {
        Self { gray, width }
    }
}

/// 页面坐标下的椭圆弧。角度单位为度，在页面坐标中从 +X 转向 +Y（即屏幕顺时针）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageArc {
    pub cx: f64,
    pub cy: f64,
    pub semi_major: f64,
    pub semi_minor: f64,
    pub start_deg: f64,
    pub end_deg: f64,
    pub rotation_deg: f64,
}

/// 外部绘图接口。所有坐标均为页面坐标，Y 轴向下。
pub trait DrawingSurface {
    fn set_stroke(&mut self, style: StrokeStyle) -> Result<(), RenderError>;
    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<(), RenderError>;
    fn elliptical_arc(&mut self, arc: PageArc) -> Result<(), RenderError>;
    fn clip_to_rect(&mut self, x: f64, y: f64, width: f64, height: f64)
    -> Result<(), RenderError>;
    fn reset_clip(&mut self) -> Result<(), RenderError>;
    fn text(&mut self, x: f64, y: f64, text: &str) -> Result<(), RenderError>;
}

/// 页面后端：创建页面、栅格化内容页、把覆盖层合并到内容页上。
pub trait PageBackend: Sync {
    type Page: DrawingSurface + Send;

    fn new_page(&self, width: f64, height: f64) -> Result<Self::Page, RenderError>;
    fn rasterize(&self, page: &Self::Page) -> Result<LuminanceGrid, RenderError>;
    fn merge_overlay(&self, base: &mut Self::Page, overlay: Self::Page) -> Result<(), RenderError>;
}

/// 渲染样式。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub line_width: f64,
    pub hatch_gray: u8,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            line_width: 0.5 / 25.4,
            hatch_gray: 200,
        }
    }
}

pub struct PageRenderer<'a> {
    layout: &'a TileLayout,
    style: RenderStyle,
    marks: MarkParams,
}

impl<'a> PageRenderer<'a> {
    pub fn new(layout: &'a TileLayout, style: RenderStyle, marks: MarkParams) -> Self {
        Self {
            layout,
            style,
            marks,
        }
    }

    #[inline]
    pub fn layout(&self) -> &TileLayout {
        self.layout
    }

    /// 内容层：裁剪到打印区域后按黑色描边绘制与该页相交的实体。
    pub fn render_content<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
        tile: TileIndex,
        drawing: &Drawing,
    ) -> Result<(), RenderError> {
        let transform = self.layout.transform(tile);
        let window = self.visible_window(tile);
        let options = drawing.bounds_options();
        self.clip_printable(surface)?;
        surface.set_stroke(StrokeStyle::new(0, self.style.line_width))?;
        for entity in drawing.entities() {
            if entity.bounds_with(&options).intersects(&window) {
                draw_entity(surface, &transform, entity)?;
            }
        }
        surface.reset_clip()
    }

    /// 裁剪矩形对应的世界坐标范围（含裁剪容差）。
    fn visible_window(&self, tile: TileIndex) -> Bounds2D {
        let region = self.layout.printable_region(tile);
        let pad = CLIP_TOLERANCE / self.layout.scale;
        Bounds2D::new(
            Point2::new(region.min().x() - pad, region.min().y() - pad),
            Point2::new(region.max().x() + pad, region.max().y() + pad),
        )
    }

    /// 覆盖层：背景斜线、十字标记与页面标签。标签位于页边距内，不受裁剪影响。
    pub fn render_overlay<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
        tile: TileIndex,
    ) -> Result<(), RenderError> {
        let transform = self.layout.transform(tile);
        let marks = MarkSet::for_tile(self.layout, tile, &self.marks);

        self.clip_printable(surface)?;
        surface.set_stroke(StrokeStyle::new(self.style.hatch_gray, self.style.line_width))?;
        for line in &marks.hatch {
            draw_line(surface, &transform, line)?;
        }
        surface.set_stroke(StrokeStyle::new(0, self.style.line_width))?;
        for line in &marks.crosses {
            draw_line(surface, &transform, line)?;
        }
        surface.reset_clip()?;
        surface.text(marks.label.x, marks.label.y, &marks.label.text)
    }

    fn clip_printable<S: DrawingSurface + ?Sized>(
        &self,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        let (x, y, width, height) = self.layout.printable_rect();
        surface.clip_to_rect(
            x - CLIP_TOLERANCE,
            y - CLIP_TOLERANCE,
            width + 2.0 * CLIP_TOLERANCE,
            height + 2.0 * CLIP_TOLERANCE,
        )
    }
}

pub fn draw_entity<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    transform: &PageTransform,
    entity: &Entity,
) -> Result<(), RenderError> {
    match entity {
        Entity::Line(line) => draw_line(surface, transform, line),
        Entity::Arc(arc) => surface.elliptical_arc(arc_to_page(transform, arc)),
        Entity::Ellipse(ellipse) => surface.elliptical_arc(ellipse_to_page(transform, ellipse)),
    }
}

fn draw_line<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    transform: &PageTransform,
    line: &Line,
) -> Result<(), RenderError> {
    let (x1, y1) = transform.apply(line.start);
    let (x2, y2) = transform.apply(line.end);
    surface.line(x1, y1, x2, y2)
}

/// Y 轴翻转后逆时针变为顺时针：页面角度区间为 `[-end, -start]`。
pub fn arc_to_page(transform: &PageTransform, arc: &Arc) -> PageArc {
    let (cx, cy) = transform.apply(arc.center);
    let radius = transform.length(arc.radius);
    let (start, end) = if arc.is_wrapping() {
        (arc.start_angle, arc.end_angle + 360.0)
    } else {
        (arc.start_angle, arc.end_angle)
    };
    PageArc {
        cx,
        cy,
        semi_major: radius,
        semi_minor: radius,
        start_deg: -end,
        end_deg: -start,
        rotation_deg: 0.0,
    }
}

pub fn ellipse_to_page(transform: &PageTransform, ellipse: &Ellipse) -> PageArc {
    let (cx, cy) = transform.apply(ellipse.center);
    let (start, end) = ellipse.parameter_range();
    PageArc {
        cx,
        cy,
        semi_major: transform.length(ellipse.semi_major()),
        semi_minor: transform.length(ellipse.semi_minor()),
        start_deg: -end.to_degrees(),
        end_deg: -start.to_degrees(),
        rotation_deg: -ellipse.rotation().to_degrees(),
    }
}
