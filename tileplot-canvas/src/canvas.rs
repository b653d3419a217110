use tileplot_engine::{DrawingSurface, PageArc, RenderError, StrokeStyle};

/// 页面绘图命令，坐标为页面坐标（Y 向下）。
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetStroke(StrokeStyle),
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Arc(PageArc),
    ClipRect { x: f64, y: f64, width: f64, height: f64 },
    ResetClip,
    Text { x: f64, y: f64, text: String },
}

/// 一个图层的命令序列。每个图层从默认状态开始（黑色描边、无裁剪），互不影响。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub commands: Vec<Command>,
}

/// 内存中的页面。新页面只有一个图层；合并覆盖层时追加其图层。
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasPage {
    width: f64,
    height: f64,
    layers: Vec<Layer>,
}

impl CanvasPage {
    pub fn new(width: f64, height: f64) -> Result<Self, RenderError> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(RenderError::InvalidPage { width, height });
        }
        Ok(Self {
            width,
            height,
            layers: vec![Layer::default()],
        })
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// 把另一页的图层叠加在本页之上。
    pub fn append_layers(&mut self, other: CanvasPage) {
        self.layers.extend(other.layers);
    }

    fn push(&mut self, command: Command) {
        if let Some(layer) = self.layers.last_mut() {
            layer.commands.push(command);
        } else {
            self.layers.push(Layer {
                commands: vec![command],
            });
        }
    }
}

fn ensure_finite(operation: &'static str, values: &[f64]) -> Result<(), RenderError> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(())
    } else {
        Err(RenderError::NonFinite { operation })
    }
}

impl DrawingSurface for CanvasPage {
    fn set_stroke(&mut self, style: StrokeStyle) -> Result<(), RenderError> {
        ensure_finite("set_stroke", &[style.width])?;
        self.push(Command::SetStroke(style));
        Ok(())
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<(), RenderError> {
        ensure_finite("line", &[x1, y1, x2, y2])?;
        self.push(Command::Line { x1, y1, x2, y2 });
        Ok(())
    }

    fn elliptical_arc(&mut self, arc: PageArc) -> Result<(), RenderError> {
        ensure_finite(
            "elliptical_arc",
            &[
                arc.cx,
                arc.cy,
                arc.semi_major,
                arc.semi_minor,
                arc.start_deg,
                arc.end_deg,
                arc.rotation_deg,
            ],
        )?;
        self.push(Command::Arc(arc));
        Ok(())
    }

    fn clip_to_rect(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Result<(), RenderError> {
        let valid = [x, y, width, height].iter().all(|v| v.is_finite())
            && width > 0.0
            && height > 0.0;
        if !valid {
            return Err(RenderError::InvalidClip {
                x,
                y,
                width,
                height,
            });
        }
        self.push(Command::ClipRect {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    fn reset_clip(&mut self) -> Result<(), RenderError> {
        self.push(Command::ResetClip);
        Ok(())
    }

    fn text(&mut self, x: f64, y: f64, text: &str) -> Result<(), RenderError> {
        ensure_finite("text", &[x, y])?;
        self.push(Command::Text {
            x,
            y,
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_page_sizes() {
        assert!(CanvasPage::new(0.0, 11.0).is_err());
        assert!(CanvasPage::new(8.5, f64::NAN).is_err());
        assert!(CanvasPage::new(8.5, 11.0).is_ok());
    }

    #[test]
    fn rejects_invalid_clip_and_non_finite_lines() {
        let mut page = CanvasPage::new(8.5, 11.0).unwrap();
        assert!(matches!(
            page.clip_to_rect(0.0, 0.0, -1.0, 2.0),
            Err(RenderError::InvalidClip { .. })
        ));
        assert!(matches!(
            page.line(0.0, f64::INFINITY, 1.0, 1.0),
            Err(RenderError::NonFinite { operation: "line" })
        ));
        assert!(page.layers()[0].commands.is_empty());
    }

    #[test]
    fn merging_appends_layers_in_order() {
        let mut base = CanvasPage::new(8.5, 11.0).unwrap();
        base.line(0.0, 0.0, 1.0, 1.0).unwrap();
        let mut overlay = CanvasPage::new(8.5, 11.0).unwrap();
        overlay.text(0.3, 0.4, "(0, 0)").unwrap();

        assert!(matches!(base.layers()[0].commands[0], Command::Line { .. }));
        base.append_layers(overlay);
        assert_eq!(base.layers().len(), 2);
        assert!(matches!(base.layers()[1].commands[0], Command::Text { .. }));
    }
}
