//! 对齐标记：背景斜线网格、网格交点处的十字标记以及页面标签。
//!
//! 标记只生成 `Line` 图元，并与内容共用同一页面变换，因此两层合并后逐像素对齐。

use tileplot_core::document::Line;
use tileplot_core::geometry::{Bounds2D, Point2};

use crate::layout::{TileIndex, TileLayout};

/// 标记尺寸参数，长度均为页面单位。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkParams {
    /// 背景斜线间距；不大于 0 时不绘制背景。
    pub hatch_spacing: f64,
    /// 十字标记半长。
    pub cross_half_length: f64,
    /// 页面标签锚点（页面坐标，Y 向下）。
    pub label_anchor: (f64, f64),
}

impl Default for MarkParams {
    fn default() -> Self {
        Self {
            hatch_spacing: 1.0,
            cross_half_length: 0.25,
            label_anchor: (0.3, 0.4),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLabel {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// 单页的标记集合，世界坐标。
#[derive(Debug, Clone, PartialEq)]
pub struct MarkSet {
    pub hatch: Vec<Line>,
    pub crosses: Vec<Line>,
    pub label: PageLabel,
}

impl MarkSet {
    pub fn for_tile(layout: &TileLayout, tile: TileIndex, params: &MarkParams) -> Self {
        let region = layout.printable_region(tile);
        let hatch = if params.hatch_spacing > 0.0 {
            hatch_lines(&region, params.hatch_spacing / layout.scale)
        } else {
            Vec::new()
        };
        let crosses =
            registration_crosses(layout, &region, params.cross_half_length / layout.scale);
        let (x, y) = params.label_anchor;
        Self {
            hatch,
            crosses,
            label: PageLabel {
                x,
                y,
                text: tile.label(),
            },
        }
    }
}

/// 以打印区域中心为中心、边长 `2r` 的正方形内的 45° 交叉斜线，
/// `r = max(宽, 高)`。
fn hatch_lines(region: &Bounds2D, spacing: f64) -> Vec<Line> {
    let r = region.width().max(region.height());
    if r <= 0.0 || spacing <= 0.0 || !spacing.is_finite() {
        return Vec::new();
    }
    let center = region.center();
    let (cx, cy) = (center.x(), center.y());
    let mut lines = Vec::new();
    let mut k = 1.0;
    loop {
        let c = -2.0 * r + k * spacing;
        if c >= 2.0 * r {
            break;
        }
        let run = 2.0 * r - c.abs();
        let rise_start_y = cy - r + (-c).max(0.0);
        // 斜率 +1
        let start_x = cx - r + c.max(0.0);
        lines.push(Line {
            start: Point2::new(start_x, rise_start_y),
            end: Point2::new(start_x + run, rise_start_y + run),
        });
        // 斜率 -1，关于中心竖线镜像
        let mirror_x = cx + r - c.max(0.0);
        lines.push(Line {
            start: Point2::new(mirror_x, rise_start_y),
            end: Point2::new(mirror_x - run, rise_start_y + run),
        });
        k += 1.0;
    }
    lines
}

/// 网格交点 `(i·cut_x, j·cut_y)` 处的十字，`i ∈ [0, tiles_x]`、`j ∈ [0, tiles_y]`；
/// 只保留落在本页可见窗口内的交点。
fn registration_crosses(layout: &TileLayout, region: &Bounds2D, half: f64) -> Vec<Line> {
    let min_x = region.min().x() - half;
    let max_x = region.max().x() + half;
    let min_y = region.min().y() - half;
    let max_y = region.max().y() + half;

    let i_start = (min_x / layout.cut_x).ceil().max(0.0) as u32;
    let i_end = ((max_x / layout.cut_x).floor().max(0.0) as u32).min(layout.tiles_x);
    let j_start = (min_y / layout.cut_y).ceil().max(0.0) as u32;
    let j_end = ((max_y / layout.cut_y).floor().max(0.0) as u32).min(layout.tiles_y);

    let mut lines = Vec::new();
    for i in i_start..=i_end {
        for j in j_start..=j_end {
            let x = i as f64 * layout.cut_x;
            let y = j as f64 * layout.cut_y;
            lines.push(Line {
                start: Point2::new(x - half, y),
                end: Point2::new(x + half, y),
            });
            lines.push(Line {
                start: Point2::new(x, y - half),
                end: Point2::new(x, y + half),
            });
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutParams;

    const TOL: f64 = 1e-9;

    fn layout() -> TileLayout {
        let extent = Bounds2D::new(Point2::ORIGIN, Point2::new(100.0, 40.0));
        TileLayout::plan(&extent, &LayoutParams::new(2.5)).unwrap()
    }

    #[test]
    fn hatch_stays_inside_square_and_is_diagonal() {
        let layout = layout();
        let tile = TileIndex::new(2, 1);
        let marks = MarkSet::for_tile(&layout, tile, &MarkParams::default());
        let region = layout.printable_region(tile);
        let r = region.width().max(region.height());
        let center = region.center();
        assert!(!marks.hatch.is_empty());
        for line in &marks.hatch {
            for point in [line.start, line.end] {
                assert!((point.x() - center.x()).abs() <= r + TOL);
                assert!((point.y() - center.y()).abs() <= r + TOL);
            }
            let dx = line.end.x() - line.start.x();
            let dy = line.end.y() - line.start.y();
            assert!((dx.abs() - dy.abs()).abs() < TOL);
        }
    }

    #[test]
    fn hatch_is_deterministic_and_can_be_disabled() {
        let layout = layout();
        let tile = TileIndex::new(0, 0);
        let a = MarkSet::for_tile(&layout, tile, &MarkParams::default());
        let b = MarkSet::for_tile(&layout, tile, &MarkParams::default());
        assert_eq!(a, b);

        let params = MarkParams {
            hatch_spacing: 0.0,
            ..MarkParams::default()
        };
        assert!(MarkSet::for_tile(&layout, tile, &params).hatch.is_empty());
    }

    #[test]
    fn crosses_sit_on_grid_intersections_within_tile() {
        let layout = layout();
        let tile = TileIndex::new(1, 1);
        let marks = MarkSet::for_tile(&layout, tile, &MarkParams::default());
        let half = 0.25 / layout.scale;
        // 打印区域 [4, 8.2] x [3, 6.2]：交点 x ∈ {4, 8}，y ∈ {3, 6}
        assert_eq!(marks.crosses.len(), 2 * 4);
        for pair in marks.crosses.chunks(2) {
            let horizontal = &pair[0];
            let vertical = &pair[1];
            let x = (horizontal.start.x() + horizontal.end.x()) / 2.0;
            let y = horizontal.start.y();
            assert!((horizontal.end.x() - horizontal.start.x() - 2.0 * half).abs() < TOL);
            assert!((vertical.end.y() - vertical.start.y() - 2.0 * half).abs() < TOL);
            assert!(((x / layout.cut_x).round() * layout.cut_x - x).abs() < TOL);
            assert!(((y / layout.cut_y).round() * layout.cut_y - y).abs() < TOL);
        }
    }

    #[test]
    fn last_tile_includes_outer_grid_corner() {
        let layout = layout();
        let tile = TileIndex::new(layout.tiles_x - 1, layout.tiles_y - 1);
        let marks = MarkSet::for_tile(&layout, tile, &MarkParams::default());
        let corner_x = layout.tiles_x as f64 * layout.cut_x;
        let corner_y = layout.tiles_y as f64 * layout.cut_y;
        let has_corner = marks.crosses.iter().any(|line| {
            let vertical = (line.start.x() - line.end.x()).abs() < TOL;
            let mid_y = (line.start.y() + line.end.y()) / 2.0;
            vertical && (line.start.x() - corner_x).abs() < TOL && (mid_y - corner_y).abs() < TOL
        });
        assert!(has_corner);
    }

    #[test]
    fn label_uses_tile_indices() {
        let layout = layout();
        let marks = MarkSet::for_tile(&layout, TileIndex::new(4, 7), &MarkParams::default());
        assert_eq!(marks.label.text, "(4, 7)");
        assert!((marks.label.x - 0.3).abs() < TOL);
        assert!((marks.label.y - 0.4).abs() < TOL);
    }
}
