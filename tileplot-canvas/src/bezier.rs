//! 椭圆弧到三次 Bezier 曲线的转换。
//!
//! 每段不超过 90°，整圆恰好四段。输出曲线已经过旋转与平移，可直接用于栅格化或写入 PDF。

use std::f64::consts::FRAC_PI_2;

use tileplot_engine::PageArc;

/// 小于该扫掠角（弧度）的剩余部分并入上一段，避免产生退化曲线。
const ARC_ANGLE_EPSILON: f64 = 0.01;

/// 一段三次 Bezier：两个控制点与终点，起点为上一段的终点。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    pub ctrl1: (f64, f64),
    pub ctrl2: (f64, f64),
    pub to: (f64, f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArcCurves {
    pub start: (f64, f64),
    pub segments: Vec<CubicSegment>,
}

/// 以原点为中心的单段弧控制点（局部坐标，未旋转）。
fn arc_to_bezier(rx: f64, ry: f64, start_angle: f64, sweep_angle: f64) -> [(f64, f64); 4] {
    let x0 = (sweep_angle / 2.0).cos();
    let y0 = (sweep_angle / 2.0).sin();
    let tx = (1.0 - x0) * 4.0 / 3.0;
    let ty = y0 - tx * x0 / y0;

    let px = [x0, x0 + tx, x0 + tx, x0];
    let py = [-y0, -ty, ty, y0];

    let mid = start_angle + sweep_angle / 2.0;
    let (sn, cs) = mid.sin_cos();

    let mut points = [(0.0, 0.0); 4];
    for (k, point) in points.iter_mut().enumerate() {
        *point = (
            rx * (px[k] * cs - py[k] * sn),
            ry * (px[k] * sn + py[k] * cs),
        );
    }
    points
}

/// 扫掠为零或半轴非正时返回 `None`。
pub fn arc_curves(arc: &PageArc) -> Option<ArcCurves> {
    let start = arc.start_deg.to_radians();
    let sweep = (arc.end_deg - arc.start_deg).to_radians().clamp(0.0, 2.0 * std::f64::consts::PI);
    if sweep <= f64::EPSILON || arc.semi_major <= 0.0 || arc.semi_minor < 0.0 {
        return None;
    }

    let (sin_r, cos_r) = arc.rotation_deg.to_radians().sin_cos();
    let place = |(x, y): (f64, f64)| {
        (
            arc.cx + x * cos_r - y * sin_r,
            arc.cy + x * sin_r + y * cos_r,
        )
    };

    let mut segments = Vec::with_capacity(4);
    let mut first = None;
    let mut angle = start;
    let mut remaining = sweep;
    while remaining > 0.0 {
        let local = if remaining > FRAC_PI_2 + ARC_ANGLE_EPSILON {
            FRAC_PI_2
        } else {
            remaining
        };
        let points = arc_to_bezier(arc.semi_major, arc.semi_minor, angle, local);
        if first.is_none() {
            first = Some(place(points[0]));
        }
        segments.push(CubicSegment {
            ctrl1: place(points[1]),
            ctrl2: place(points[2]),
            to: place(points[3]),
        });
        angle += local;
        remaining -= local;
    }

    first.map(|start| ArcCurves { start, segments })
}
