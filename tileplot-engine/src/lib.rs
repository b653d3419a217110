//! 分页引擎：分页规划、对齐标记、页面渲染、空白页判定与页面合成。

pub mod compose;
pub mod detect;
pub mod layout;
pub mod marks;
pub mod pipeline;
pub mod render;

pub mod errors {
    use thiserror::Error;
    use tileplot_core::document::GeometryError;

    use crate::layout::{LayoutError, TileIndex};
    use crate::render::RenderError;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error(transparent)]
        Geometry(#[from] GeometryError),
        #[error(transparent)]
        Layout(#[from] LayoutError),
        #[error("failed to render tile ({}, {}): {source}", tile.i, tile.j)]
        Render {
            tile: TileIndex,
            #[source]
            source: RenderError,
        },
        #[error("drawing contains no entities")]
        EmptyDrawing,
    }
}

pub use compose::{ComposedDocument, LayeredPage, PageCompositor, RenderedTile};
pub use detect::{EmptyTileDetector, LuminanceGrid, TileVerdict};
pub use errors::EngineError;
pub use layout::{
    LayoutError, LayoutParams, MAX_TILES, Orientation, PageTransform, PaperSize, TileIndex,
    TileLayout,
};
pub use marks::{MarkParams, MarkSet, PageLabel};
pub use pipeline::{PipelineOptions, PipelineOutput, TilingPipeline};
pub use render::{
    DrawingSurface, PageArc, PageBackend, PageRenderer, RenderError, RenderStyle, StrokeStyle,
};
