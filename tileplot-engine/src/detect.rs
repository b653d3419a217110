use serde::Serialize;

/// 栅格化后的灰度网格，行优先存储，0 为黑、255 为白。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminanceGrid {
    width: usize,
    height: usize,
    samples: Vec<u8>,
}

impl LuminanceGrid {
    /// 全白网格。
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            samples: vec![u8::MAX; width * height],
        }
    }

    /// 由已有采样构造；长度与尺寸不符时返回 `None`。
    pub fn from_samples(width: usize, height: usize, samples: Vec<u8>) -> Option<Self> {
        (samples.len() == width * height).then_some(Self {
            width,
            height,
            samples,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x < self.width && y < self.height {
            self.samples.get(y * self.width + x).copied()
        } else {
            None
        }
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.samples[y * self.width + x] = value;
        }
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }
}

/// 单页的判定结果。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TileVerdict {
    pub non_white_pct: f64,
    pub is_empty: bool,
}

/// 空白页判定：亮度严格低于 `threshold` 的像素视为非白，
/// 非白像素占比（百分数）低于 `empty_percent` 时判为空白。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmptyTileDetector {
    pub threshold: u8,
    pub empty_percent: f64,
}

impl EmptyTileDetector {
    pub const DEFAULT_THRESHOLD: u8 = 250;
    pub const DEFAULT_EMPTY_PERCENT: f64 = 0.1;

    pub fn new(threshold: u8, empty_percent: f64) -> Self {
        Self {
            threshold,
            empty_percent,
        }
    }

    pub fn classify(&self, grid: &LuminanceGrid) -> TileVerdict {
        if grid.is_empty() {
            return TileVerdict {
                non_white_pct: 0.0,
                is_empty: true,
            };
        }
        let non_white = grid
            .samples()
            .iter()
            .filter(|&&value| value < self.threshold)
            .count();
        let non_white_pct = 100.0 * non_white as f64 / grid.len() as f64;
        TileVerdict {
            non_white_pct,
            is_empty: non_white_pct < self.empty_percent,
        }
    }
}

impl Default for EmptyTileDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD, Self::DEFAULT_EMPTY_PERCENT)
    }
}
