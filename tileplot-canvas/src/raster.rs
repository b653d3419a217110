use tileplot_engine::{LuminanceGrid, RenderError, StrokeStyle};
use tiny_skia::{FillRule, Mask, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use tracing::trace;

use crate::bezier::arc_curves;
use crate::canvas::{CanvasPage, Command};

#[derive(Clone)]
struct RasterState {
    stroke: StrokeStyle,
    clip_mask: Option<Mask>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            stroke: StrokeStyle::new(0, 0.0),
            clip_mask: None,
        }
    }
}

/// 以 `samples_per_unit`（每页面单位采样数）栅格化页面，白底，返回灰度网格。
///
/// 文字不参与栅格化。
pub fn rasterize_page(
    page: &CanvasPage,
    samples_per_unit: f64,
) -> Result<LuminanceGrid, RenderError> {
    if !(samples_per_unit.is_finite() && samples_per_unit > 0.0) {
        return Err(RenderError::Raster(format!(
            "invalid sampling density {samples_per_unit}"
        )));
    }
    let width_px = (page.width() * samples_per_unit).round() as u32;
    let height_px = (page.height() * samples_per_unit).round() as u32;
    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        RenderError::Raster(format!("invalid raster size {width_px}x{height_px}"))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let scale = samples_per_unit as f32;
    let transform = Transform::from_scale(scale, scale);
    for layer in page.layers() {
        let mut state = RasterState::default();
        for command in &layer.commands {
            render_command(&mut pixmap, &mut state, command, transform)?;
        }
    }

    let samples = pixmap
        .pixels()
        .iter()
        .map(|pixel| luminance(pixel.red(), pixel.green(), pixel.blue()))
        .collect();
    trace!(width = width_px, height = height_px, "页面栅格化完成");
    LuminanceGrid::from_samples(width_px as usize, height_px as usize, samples)
        .ok_or_else(|| RenderError::Raster("sample count mismatch".to_string()))
}

fn render_command(
    pixmap: &mut Pixmap,
    state: &mut RasterState,
    command: &Command,
    transform: Transform,
) -> Result<(), RenderError> {
    match command {
        Command::SetStroke(style) => state.stroke = *style,
        Command::Line { x1, y1, x2, y2 } => {
            let mut builder = PathBuilder::new();
            builder.move_to(*x1 as f32, *y1 as f32);
            builder.line_to(*x2 as f32, *y2 as f32);
            stroke_builder(pixmap, state, builder, transform);
        }
        Command::Arc(arc) => {
            if let Some(curves) = arc_curves(arc) {
                let mut builder = PathBuilder::new();
                builder.move_to(curves.start.0 as f32, curves.start.1 as f32);
                for segment in &curves.segments {
                    builder.cubic_to(
                        segment.ctrl1.0 as f32,
                        segment.ctrl1.1 as f32,
                        segment.ctrl2.0 as f32,
                        segment.ctrl2.1 as f32,
                        segment.to.0 as f32,
                        segment.to.1 as f32,
                    );
                }
                stroke_builder(pixmap, state, builder, transform);
            }
        }
        Command::ClipRect {
            x,
            y,
            width,
            height,
        } => {
            let rect = Rect::from_xywh(*x as f32, *y as f32, *width as f32, *height as f32)
                .ok_or(RenderError::InvalidClip {
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                })?;
            let path = PathBuilder::from_rect(rect);
            let mut mask = Mask::new(pixmap.width(), pixmap.height())
                .ok_or_else(|| RenderError::Raster("clip mask allocation failed".to_string()))?;
            mask.fill_path(&path, FillRule::Winding, true, transform);
            state.clip_mask = Some(mask);
        }
        Command::ResetClip => state.clip_mask = None,
        Command::Text { .. } => {}
    }
    Ok(())
}

fn stroke_builder(
    pixmap: &mut Pixmap,
    state: &RasterState,
    builder: PathBuilder,
    transform: Transform,
) {
    let Some(path) = builder.finish() else {
        return;
    };
    let mut paint = Paint::default();
    let gray = state.stroke.gray;
    paint.set_color_rgba8(gray, gray, gray, 255);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: state.stroke.width.max(0.0) as f32,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, transform, state.clip_mask.as_ref());
}

/// ITU-R 601 亮度。
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let weighted = r as u32 * 299 + g as u32 * 587 + b as u32 * 114;
    ((weighted + 500) / 1000) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileplot_engine::{DrawingSurface, EmptyTileDetector, PageArc};

    const SPU: f64 = 72.0;
    const LINE_WIDTH: f64 = 0.5 / 25.4;

    fn page() -> CanvasPage {
        CanvasPage::new(11.0, 8.5).unwrap()
    }

    #[test]
    fn blank_page_is_white() {
        let grid = rasterize_page(&page(), SPU).unwrap();
        assert_eq!(grid.width(), 792);
        assert_eq!(grid.height(), 612);
        assert!(grid.samples().iter().all(|&value| value == 255));
        assert!(EmptyTileDetector::default().classify(&grid).is_empty);
    }

    #[test]
    fn diagonal_line_is_detected() {
        let mut page = page();
        page.set_stroke(StrokeStyle::new(0, LINE_WIDTH)).unwrap();
        page.line(0.25, 0.25, 10.75, 8.25).unwrap();
        let grid = rasterize_page(&page, SPU).unwrap();
        let verdict = EmptyTileDetector::default().classify(&grid);
        assert!(!verdict.is_empty, "non-white {}%", verdict.non_white_pct);
    }

    #[test]
    fn clipped_line_leaves_page_blank() {
        let mut page = page();
        page.clip_to_rect(0.25, 0.25, 10.5, 8.0).unwrap();
        page.set_stroke(StrokeStyle::new(0, LINE_WIDTH)).unwrap();
        page.line(20.0, 20.0, 40.0, 20.0).unwrap();
        page.line(0.0, 0.1, 11.0, 0.1).unwrap();
        let grid = rasterize_page(&page, SPU).unwrap();
        assert!(grid.samples().iter().all(|&value| value == 255));
    }

    #[test]
    fn circle_is_drawn() {
        let mut page = page();
        page.set_stroke(StrokeStyle::new(0, LINE_WIDTH)).unwrap();
        page.elliptical_arc(PageArc {
            cx: 5.5,
            cy: 4.25,
            semi_major: 3.0,
            semi_minor: 3.0,
            start_deg: 0.0,
            end_deg: 360.0,
            rotation_deg: 0.0,
        })
        .unwrap();
        let grid = rasterize_page(&page, SPU).unwrap();
        // 圆上最右点 (8.5, 4.25) 附近应有深色像素
        let x = (8.5 * SPU) as usize;
        let y = (4.25 * SPU) as usize;
        let dark = (y - 1..=y + 1)
            .flat_map(|row| (x - 1..=x + 1).map(move |col| (col, row)))
            .any(|(col, row)| grid.get(col, row).is_some_and(|value| value < 128));
        assert!(dark);
        assert_eq!(grid.get(396, 306), Some(255));
    }

    #[test]
    fn hatch_gray_is_lighter_than_content() {
        let mut page = page();
        page.set_stroke(StrokeStyle::new(200, 0.1)).unwrap();
        page.line(1.0, 1.0, 5.0, 1.0).unwrap();
        page.set_stroke(StrokeStyle::new(0, 0.1)).unwrap();
        page.line(1.0, 3.0, 5.0, 3.0).unwrap();
        let grid = rasterize_page(&page, SPU).unwrap();
        let hatch = grid.get(216, 72).unwrap();
        let content = grid.get(216, 216).unwrap();
        assert!(content < hatch);
        assert!(hatch < 255);
    }

    #[test]
    fn text_is_not_rasterized() {
        let mut page = page();
        page.text(0.3, 0.4, "(0, 0)").unwrap();
        let grid = rasterize_page(&page, SPU).unwrap();
        assert!(grid.samples().iter().all(|&value| value == 255));
    }

    #[test]
    fn luminance_weights() {
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(200, 200, 200), 200);
    }
}
