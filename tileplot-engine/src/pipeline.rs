//! 端到端流水线：归一化 → 分页规划 → 逐页渲染与判定 → 合成。

use rayon::prelude::*;
use tileplot_core::document::Drawing;
use tileplot_core::geometry::Bounds2D;
use tracing::{debug, info};

use crate::compose::{ComposedDocument, LayeredPage, PageCompositor, RenderedTile};
use crate::detect::{EmptyTileDetector, TileVerdict};
use crate::errors::EngineError;
use crate::layout::{LayoutParams, TileIndex, TileLayout};
use crate::marks::MarkParams;
use crate::render::{PageBackend, PageRenderer, RenderStyle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    pub layout: LayoutParams,
    pub detector: EmptyTileDetector,
    pub style: RenderStyle,
    pub marks: MarkParams,
    /// 是否在 rayon 线程池上并行渲染各页。
    pub parallel: bool,
}

impl PipelineOptions {
    pub fn new(layout: LayoutParams) -> Self {
        Self {
            layout,
            detector: EmptyTileDetector::default(),
            style: RenderStyle::default(),
            marks: MarkParams::default(),
            parallel: true,
        }
    }
}

#[derive(Debug)]
pub struct PipelineOutput<P> {
    /// 归一化后的整体范围，左下角位于原点。
    pub extent: Bounds2D,
    pub layout: TileLayout,
    pub verdicts: Vec<(TileIndex, TileVerdict)>,
    pub document: ComposedDocument<P>,
}

pub struct TilingPipeline<'a, B: PageBackend> {
    backend: &'a B,
    options: PipelineOptions,
}

impl<'a, B: PageBackend> TilingPipeline<'a, B> {
    pub fn new(backend: &'a B, options: PipelineOptions) -> Self {
        Self { backend, options }
    }

    /// 执行一次完整转换。`drawing` 会被就地归一化。
    pub fn run(&self, drawing: &mut Drawing) -> Result<PipelineOutput<B::Page>, EngineError> {
        let extent = drawing.normalize()?.ok_or(EngineError::EmptyDrawing)?;
        info!(
            entities = drawing.len(),
            width = extent.width(),
            height = extent.height(),
            "图纸范围"
        );

        let layout = TileLayout::plan(&extent, &self.options.layout)?;
        info!(
            orientation = ?layout.orientation,
            page_width = layout.page_width,
            page_height = layout.page_height,
            cut_x = layout.cut_x,
            cut_y = layout.cut_y,
            "分页参数"
        );
        info!(
            tiles_x = layout.tiles_x,
            tiles_y = layout.tiles_y,
            total = layout.tile_count(),
            "分页网格"
        );

        let drawing: &Drawing = drawing;
        let renderer = PageRenderer::new(&layout, self.options.style, self.options.marks);
        let tiles: Vec<TileIndex> = layout.tiles().collect();
        let results: Vec<Result<RenderedTile<B::Page>, EngineError>> = if self.options.parallel {
            tiles
                .par_iter()
                .map(|&tile| self.render_tile(&renderer, drawing, tile))
                .collect()
        } else {
            tiles
                .iter()
                .map(|&tile| self.render_tile(&renderer, drawing, tile))
                .collect()
        };

        let mut rendered = Vec::with_capacity(results.len());
        for result in results {
            rendered.push(result?);
        }
        let verdicts = rendered
            .iter()
            .map(|tile| (tile.tile, tile.verdict))
            .collect();

        let document = PageCompositor::new(self.backend).compose(rendered)?;
        info!(
            kept = document.kept,
            removed = document.removed,
            "合成完成"
        );

        Ok(PipelineOutput {
            extent,
            layout,
            verdicts,
            document,
        })
    }

    fn render_tile(
        &self,
        renderer: &PageRenderer<'_>,
        drawing: &Drawing,
        tile: TileIndex,
    ) -> Result<RenderedTile<B::Page>, EngineError> {
        let wrap = |source| EngineError::Render { tile, source };
        let layout = renderer.layout();

        let mut content = self
            .backend
            .new_page(layout.page_width, layout.page_height)
            .map_err(wrap)?;
        renderer
            .render_content(&mut content, tile, drawing)
            .map_err(wrap)?;

        let mut overlay = self
            .backend
            .new_page(layout.page_width, layout.page_height)
            .map_err(wrap)?;
        renderer.render_overlay(&mut overlay, tile).map_err(wrap)?;

        let grid = self.backend.rasterize(&content).map_err(wrap)?;
        let verdict = self.options.detector.classify(&grid);
        debug!(
            tile = %tile.label(),
            pct = verdict.non_white_pct,
            empty = verdict.is_empty,
            "页面判定"
        );

        Ok(RenderedTile {
            tile,
            page: LayeredPage { content, overlay },
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{Call, RecordingBackend};
    use tileplot_core::geometry::Point2;

    fn options(parallel: bool) -> PipelineOptions {
        let mut options = PipelineOptions::new(LayoutParams::new(2.5));
        options.parallel = parallel;
        options
    }

    /// 100 x 40 的矩形框：只有沿边的页面有内容。
    fn frame() -> Drawing {
        let mut drawing = Drawing::new();
        let corners = [
            Point2::new(10.0, 5.0),
            Point2::new(110.0, 5.0),
            Point2::new(110.0, 45.0),
            Point2::new(10.0, 45.0),
        ];
        for k in 0..4 {
            drawing.add_line(corners[k], corners[(k + 1) % 4]);
        }
        drawing
    }

    #[test]
    fn frame_keeps_border_tiles_only() {
        let backend = RecordingBackend;
        let mut drawing = frame();
        let output = TilingPipeline::new(&backend, options(false))
            .run(&mut drawing)
            .unwrap();

        assert_eq!(output.extent.min(), Point2::ORIGIN);
        assert_eq!(output.layout.tiles_x, 25);
        assert_eq!(output.layout.tiles_y, 14);
        assert_eq!(output.verdicts.len(), 350);
        assert_eq!(output.document.total(), 350);
        assert!(output.document.kept > 0);
        assert!(output.document.removed > 0);

        // 网格中间的页面不与边框相交
        assert!(
            !output
                .document
                .kept_tiles
                .contains(&TileIndex::new(12, 7))
        );
        assert!(output.document.kept_tiles.contains(&TileIndex::new(0, 0)));

        let mut sorted = output.document.kept_tiles.clone();
        sorted.sort();
        assert_eq!(sorted, output.document.kept_tiles);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let backend = RecordingBackend;
        let sequential = TilingPipeline::new(&backend, options(false))
            .run(&mut frame())
            .unwrap();
        let parallel = TilingPipeline::new(&backend, options(true))
            .run(&mut frame())
            .unwrap();
        assert_eq!(sequential.verdicts, parallel.verdicts);
        assert_eq!(sequential.document.kept_tiles, parallel.document.kept_tiles);
        assert_eq!(sequential.document.pages, parallel.document.pages);
    }

    #[test]
    fn kept_pages_carry_the_overlay_label() {
        let backend = RecordingBackend;
        let output = TilingPipeline::new(&backend, options(true))
            .run(&mut frame())
            .unwrap();
        for (page, tile) in output
            .document
            .pages
            .iter()
            .zip(&output.document.kept_tiles)
        {
            assert_eq!(
                page.calls.last(),
                Some(&Call::Text(0.3, 0.4, tile.label()))
            );
        }
    }

    #[test]
    fn empty_drawing_is_rejected() {
        let backend = RecordingBackend;
        let err = TilingPipeline::new(&backend, options(false))
            .run(&mut Drawing::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyDrawing));
    }

    #[test]
    fn degenerate_entity_aborts_before_layout() {
        let backend = RecordingBackend;
        let mut drawing = frame();
        drawing.add_line(Point2::new(0.0, f64::NAN), Point2::new(1.0, 1.0));
        let err = TilingPipeline::new(&backend, options(false))
            .run(&mut drawing)
            .unwrap_err();
        assert!(matches!(err, EngineError::Geometry(_)));
    }

    #[test]
    fn invalid_scale_is_a_layout_error() {
        let backend = RecordingBackend;
        let mut options = options(false);
        options.layout.scale = -1.0;
        let err = TilingPipeline::new(&backend, options)
            .run(&mut frame())
            .unwrap_err();
        assert!(matches!(err, EngineError::Layout(_)));
    }
}
