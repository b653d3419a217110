//! 把合成后的画布页面写成 PDF。页面单位为英寸，写出时换算为点（×72）并翻转 Y 轴。

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use lopdf::{Document as PdfDocument, Object, Stream, dictionary};
use tempfile::NamedTempFile;
use tileplot_canvas::{CanvasPage, Command, Layer, arc_curves};
use tileplot_engine::StrokeStyle;
use tracing::{debug, info};

use crate::{DocumentSaver, IoError};

const POINTS_PER_UNIT: f64 = 72.0;
const LABEL_FONT: &str = "F1";

/// PDF 写出器。标签使用 Helvetica-Bold。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfSaver {
    label_size: f64,
}

impl PdfSaver {
    pub const DEFAULT_LABEL_SIZE: f64 = 8.0;

    pub fn new(label_size: f64) -> Self {
        Self { label_size }
    }

    /// 生成 PDF 字节。
    pub fn to_bytes(&self, pages: &[CanvasPage]) -> Result<Vec<u8>, IoError> {
        let mut document = self.build(pages)?;
        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|err| IoError::Pdf(err.to_string()))?;
        Ok(bytes)
    }

    fn build(&self, pages: &[CanvasPage]) -> Result<PdfDocument, IoError> {
        let mut document = PdfDocument::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { LABEL_FONT => font_id },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for page in pages {
            let content = self.page_content(page)?;
            let content_id = document.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let media_box: Vec<Object> = vec![
                0.into(),
                0.into(),
                Object::Real((page.width() * POINTS_PER_UNIT) as f32),
                Object::Real((page.height() * POINTS_PER_UNIT) as f32),
            ];
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => media_box,
            });
            kids.push(page_id.into());
        }

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages.len() as i64,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document.compress();
        Ok(document)
    }

    fn page_content(&self, page: &CanvasPage) -> Result<String, IoError> {
        let mut out = String::new();
        for layer in page.layers() {
            self.write_layer(&mut out, page.height(), layer)
                .map_err(|err| IoError::Pdf(err.to_string()))?;
        }
        Ok(out)
    }

    /// 每个图层包在 `q … Q` 中；裁剪再嵌套一层 `q`，取消裁剪时恢复并重放描边状态。
    fn write_layer(&self, out: &mut String, page_height: f64, layer: &Layer) -> std::fmt::Result {
        let y = |value: f64| (page_height - value) * POINTS_PER_UNIT;
        let x = |value: f64| value * POINTS_PER_UNIT;

        let mut stroke = StrokeStyle::new(0, 0.0);
        let mut clip_depth = 0usize;
        writeln!(out, "q")?;
        for command in &layer.commands {
            match command {
                Command::SetStroke(style) => {
                    stroke = *style;
                    write_stroke(out, stroke)?;
                }
                Command::Line { x1, y1, x2, y2 } => {
                    writeln!(
                        out,
                        "{:.3} {:.3} m {:.3} {:.3} l S",
                        x(*x1),
                        y(*y1),
                        x(*x2),
                        y(*y2)
                    )?;
                }
                Command::Arc(arc) => {
                    if let Some(curves) = arc_curves(arc) {
                        write!(out, "{:.3} {:.3} m", x(curves.start.0), y(curves.start.1))?;
                        for segment in &curves.segments {
                            write!(
                                out,
                                " {:.3} {:.3} {:.3} {:.3} {:.3} {:.3} c",
                                x(segment.ctrl1.0),
                                y(segment.ctrl1.1),
                                x(segment.ctrl2.0),
                                y(segment.ctrl2.1),
                                x(segment.to.0),
                                y(segment.to.1)
                            )?;
                        }
                        writeln!(out, " S")?;
                    }
                }
                Command::ClipRect {
                    x: left,
                    y: top,
                    width,
                    height,
                } => {
                    writeln!(
                        out,
                        "q {:.3} {:.3} {:.3} {:.3} re W n",
                        x(*left),
                        y(*top + *height),
                        width * POINTS_PER_UNIT,
                        height * POINTS_PER_UNIT
                    )?;
                    clip_depth += 1;
                }
                Command::ResetClip => {
                    if clip_depth > 0 {
                        for _ in 0..clip_depth {
                            writeln!(out, "Q")?;
                        }
                        clip_depth = 0;
                        write_stroke(out, stroke)?;
                    }
                }
                Command::Text { x: tx, y: ty, text } => {
                    writeln!(
                        out,
                        "BT 0 g /{} {:.1} Tf {:.3} {:.3} Td ({}) Tj ET",
                        LABEL_FONT,
                        self.label_size,
                        x(*tx),
                        y(*ty),
                        escape_text(text)
                    )?;
                }
            }
        }
        for _ in 0..clip_depth {
            writeln!(out, "Q")?;
        }
        writeln!(out, "Q")
    }
}

impl Default for PdfSaver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LABEL_SIZE)
    }
}

impl DocumentSaver for PdfSaver {
    /// 先写入目标目录中的临时文件，成功后原子替换，失败时目标路径保持不变。
    fn save(&self, pages: &[CanvasPage], path: &Path) -> Result<(), IoError> {
        let bytes = self.to_bytes(pages)?;
        let write_error = |source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(directory).map_err(write_error)?;
        file.write_all(&bytes).map_err(write_error)?;
        file.flush().map_err(write_error)?;
        debug!(temp = ?file.path(), bytes = bytes.len(), "PDF 已写入临时文件");
        file.persist(path)
            .map_err(|err| write_error(err.error))?;
        info!(path = ?path, pages = pages.len(), "PDF 已保存");
        Ok(())
    }
}

fn write_stroke(out: &mut String, style: StrokeStyle) -> std::fmt::Result {
    writeln!(
        out,
        "{:.3} w {:.4} G",
        style.width * POINTS_PER_UNIT,
        style.gray as f64 / 255.0
    )
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileplot_engine::{DrawingSurface, PageArc};

    fn page() -> CanvasPage {
        let mut page = CanvasPage::new(11.0, 8.5).unwrap();
        page.clip_to_rect(0.25, 0.25, 10.5, 8.0).unwrap();
        page.set_stroke(StrokeStyle::new(0, 0.5 / 25.4)).unwrap();
        page.line(0.25, 8.25, 10.25, 0.75).unwrap();
        page.elliptical_arc(PageArc {
            cx: 5.0,
            cy: 4.0,
            semi_major: 1.0,
            semi_minor: 1.0,
            start_deg: 0.0,
            end_deg: 360.0,
            rotation_deg: 0.0,
        })
        .unwrap();
        page.reset_clip().unwrap();
        let mut overlay = CanvasPage::new(11.0, 8.5).unwrap();
        overlay.text(0.3, 0.4, "(1, 2)").unwrap();
        page.append_layers(overlay);
        page
    }

    #[test]
    fn content_flips_y_and_scales_to_points() {
        let content = PdfSaver::default().page_content(&page()).unwrap();
        assert!(content.contains("18.000 18.000 m 738.000 558.000 l S"));
        assert!(content.contains("q 18.000 18.000 756.000 576.000 re W n"));
        assert!(content.contains(" c S"));
        assert!(content.contains("/F1 8.0 Tf 21.600 583.200 Td (\\(1, 2\\)) Tj ET"));
    }

    #[test]
    fn layers_and_clips_are_balanced() {
        let content = PdfSaver::default().page_content(&page()).unwrap();
        let saves = content.lines().filter(|line| line.starts_with('q')).count();
        let restores = content.lines().filter(|line| line.trim() == "Q").count();
        assert_eq!(saves, 3);
        assert_eq!(saves, restores);
    }

    #[test]
    fn writes_loadable_pdf_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        PdfSaver::default().save(&[page(), page()], &path).unwrap();

        let document = PdfDocument::load(&path).unwrap();
        assert_eq!(document.get_pages().len(), 2);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.path() != path)
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_save_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.pdf");
        let err = PdfSaver::default().save(&[page()], &path).unwrap_err();
        assert!(matches!(err, IoError::WriteError { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn escapes_parentheses() {
        assert_eq!(escape_text("(0, 1)"), "\\(0, 1\\)");
        assert_eq!(escape_text("a\\b"), "a\\\\b");
    }
}
