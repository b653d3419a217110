use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "TILEPLOT_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `TILEPLOT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperKind {
    #[default]
    Letter,
    Legal,
    Tabloid,
    A4,
}

/// 纸张与页边距，单位英寸。
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub paper: PaperKind,
    #[serde(default = "LayoutConfig::default_margin")]
    pub margin: f64,
    #[serde(default = "LayoutConfig::default_overlap")]
    pub overlap: f64,
}

impl LayoutConfig {
    fn default_margin() -> f64 {
        0.25
    }

    fn default_overlap() -> f64 {
        0.5
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            paper: PaperKind::default(),
            margin: Self::default_margin(),
            overlap: Self::default_overlap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryConfig {
    #[serde(default = "GeometryConfig::default_ellipse_samples")]
    pub ellipse_samples: usize,
}

impl GeometryConfig {
    fn default_ellipse_samples() -> usize {
        1000
    }
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            ellipse_samples: Self::default_ellipse_samples(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// 多段线 bulge 段离散时的弦高容差（图纸单位）。
    #[serde(default = "InputConfig::default_chord_tolerance")]
    pub chord_tolerance: f64,
}

impl InputConfig {
    fn default_chord_tolerance() -> f64 {
        0.01
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            chord_tolerance: Self::default_chord_tolerance(),
        }
    }
}

/// 空白页判定参数。
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// 灰度低于该值视为非白像素。
    #[serde(default = "DetectionConfig::default_threshold")]
    pub threshold: u8,
    /// 非白像素百分比低于该值时判为空白。
    #[serde(default = "DetectionConfig::default_empty_percent")]
    pub empty_percent: f64,
    #[serde(default = "DetectionConfig::default_samples_per_unit")]
    pub samples_per_unit: f64,
}

impl DetectionConfig {
    fn default_threshold() -> u8 {
        250
    }

    fn default_empty_percent() -> f64 {
        0.1
    }

    fn default_samples_per_unit() -> f64 {
        72.0
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: Self::default_threshold(),
            empty_percent: Self::default_empty_percent(),
            samples_per_unit: Self::default_samples_per_unit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "RenderConfig::default_parallel")]
    pub parallel: bool,
    /// 线宽，页面单位。
    #[serde(default = "RenderConfig::default_line_width")]
    pub line_width: f64,
    #[serde(default = "RenderConfig::default_hatch_gray")]
    pub hatch_gray: u8,
    #[serde(default = "RenderConfig::default_hatch_spacing")]
    pub hatch_spacing: f64,
    /// 页码标签字号（磅）。
    #[serde(default = "RenderConfig::default_label_size")]
    pub label_size: f64,
}

impl RenderConfig {
    fn default_parallel() -> bool {
        true
    }

    fn default_line_width() -> f64 {
        0.5 / 25.4
    }

    fn default_hatch_gray() -> u8 {
        200
    }

    fn default_hatch_spacing() -> f64 {
        1.0
    }

    fn default_label_size() -> f64 {
        8.0
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            parallel: Self::default_parallel(),
            line_width: Self::default_line_width(),
            hatch_gray: Self::default_hatch_gray(),
            hatch_spacing: Self::default_hatch_spacing(),
            label_size: Self::default_label_size(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.layout.paper, PaperKind::Letter);
        assert_eq!(cfg.layout.margin, 0.25);
        assert_eq!(cfg.layout.overlap, 0.5);
        assert_eq!(cfg.geometry.ellipse_samples, 1000);
        assert_eq!(cfg.input.chord_tolerance, 0.01);
        assert_eq!(cfg.detection.threshold, 250);
        assert_eq!(cfg.detection.empty_percent, 0.1);
        assert_eq!(cfg.detection.samples_per_unit, 72.0);
        assert!(cfg.render.parallel);
        assert_eq!(cfg.render.hatch_gray, 200);
        assert_eq!(cfg.render.label_size, 8.0);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [layout]
            paper = "a4"
            overlap = 0.75

            [detection]
            threshold = 240

            [render]
            parallel = false
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.layout.paper, PaperKind::A4);
        assert_eq!(cfg.layout.overlap, 0.75);
        assert_eq!(cfg.layout.margin, 0.25);
        assert_eq!(cfg.detection.threshold, 240);
        assert_eq!(cfg.detection.empty_percent, 0.1);
        assert!(!cfg.render.parallel);
        assert_eq!(cfg.render.hatch_spacing, 1.0);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[layout]\nmargin = \"wide\"").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
