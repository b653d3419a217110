//! 页面合成：只保留非空白页，把覆盖层合并到内容层之上，按分页顺序输出。

use tracing::debug;

use crate::detect::TileVerdict;
use crate::errors::EngineError;
use crate::layout::TileIndex;
use crate::render::PageBackend;

/// 一页的两个图层。空白判定只看 `content`，`overlay` 在保留时才合并上去。
#[derive(Debug, Clone)]
pub struct LayeredPage<P> {
    pub content: P,
    pub overlay: P,
}

#[derive(Debug, Clone)]
pub struct RenderedTile<P> {
    pub tile: TileIndex,
    pub page: LayeredPage<P>,
    pub verdict: TileVerdict,
}

/// 合成后的文档：保留页按分页顺序排列。
#[derive(Debug, Clone)]
pub struct ComposedDocument<P> {
    pub pages: Vec<P>,
    pub kept: usize,
    pub removed: usize,
    pub kept_tiles: Vec<TileIndex>,
}

impl<P> ComposedDocument<P> {
    #[inline]
    pub fn total(&self) -> usize {
        self.kept + self.removed
    }
}

pub struct PageCompositor<'a, B: PageBackend> {
    backend: &'a B,
}

impl<'a, B: PageBackend> PageCompositor<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// 输入顺序任意，先按 `(i, j)` 排序再合成。
    pub fn compose(
        &self,
        mut tiles: Vec<RenderedTile<B::Page>>,
    ) -> Result<ComposedDocument<B::Page>, EngineError> {
        tiles.sort_by_key(|rendered| rendered.tile);

        let mut pages = Vec::new();
        let mut kept_tiles = Vec::new();
        let mut removed = 0;
        for rendered in tiles {
            let RenderedTile { tile, page, verdict } = rendered;
            if verdict.is_empty {
                debug!(tile = %tile.label(), pct = verdict.non_white_pct, "丢弃空白页");
                removed += 1;
                continue;
            }
            let LayeredPage {
                mut content,
                overlay,
            } = page;
            self.backend
                .merge_overlay(&mut content, overlay)
                .map_err(|source| EngineError::Render { tile, source })?;
            pages.push(content);
            kept_tiles.push(tile);
        }

        Ok(ComposedDocument {
            kept: pages.len(),
            pages,
            removed,
            kept_tiles,
        })
    }
}
