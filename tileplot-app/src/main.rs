use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tileplot_canvas::CanvasBackend;
use tileplot_config::{AppConfig, ConfigError, PaperKind};
use tileplot_core::document::BoundsOptions;
use tileplot_engine::{
    EmptyTileDetector, LayoutParams, MarkParams, PaperSize, PipelineOptions, RenderStyle,
    TilingPipeline,
};
use tileplot_io::{DocumentSaver, DxfFacade, PdfSaver};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod report;

use report::ConversionReport;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaperChoice {
    Letter,
    A4,
    Legal,
    Tabloid,
}

impl From<PaperChoice> for PaperKind {
    fn from(choice: PaperChoice) -> Self {
        match choice {
            PaperChoice::Letter => PaperKind::Letter,
            PaperChoice::A4 => PaperKind::A4,
            PaperChoice::Legal => PaperKind::Legal,
            PaperChoice::Tabloid => PaperKind::Tabloid,
        }
    }
}

/// 把 DXF 图纸按比例拆分为带对齐标记的多页 PDF。
#[derive(Debug, Parser)]
#[command(name = "tileplot", version, about = "Convert DXF to tiled PDF pages")]
struct Cli {
    /// 输入 DXF 文件
    dxf: PathBuf,

    /// 输出 PDF 文件
    #[arg(long)]
    pdf: PathBuf,

    /// 缩放比例（页面长度 / 图纸长度）
    #[arg(long, allow_negative_numbers = true)]
    scale: f64,

    /// 相邻页面的重叠量（英寸），缺省取配置值
    #[arg(long)]
    overlap: Option<f64>,

    /// 页边距（英寸），缺省取配置值
    #[arg(long)]
    margin: Option<f64>,

    #[arg(long, value_enum)]
    paper: Option<PaperChoice>,

    /// 显式指定配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 以 JSON 写出转换摘要
    #[arg(long)]
    report: Option<PathBuf>,

    /// 调试模式：日志提升为 debug，并在打印 PID 后等待回车
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    let loaded = load_configuration(cli.config.as_deref());
    let config = loaded.as_ref().cloned().unwrap_or_default();
    init_logging(&config, cli.debug);

    if let Err(err) = &loaded {
        if cli.config.is_some() {
            error!(error = %err, "加载指定配置失败");
            eprintln!("错误：加载指定配置失败：{err}");
            process::exit(1);
        }
        report_discovery_failure(err);
    }

    if cli.debug {
        wait_for_debugger();
    }

    if let Err(err) = run(&cli, &config) {
        error!(error = %err, "转换失败");
        eprintln!("错误：{err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli, config: &AppConfig) -> Result<()> {
    info!(input = %cli.dxf.display(), output = %cli.pdf.display(), "开始转换");

    let facade = DxfFacade::new()
        .with_chord_tolerance(config.input.chord_tolerance)
        .with_bounds_options(BoundsOptions {
            ellipse_samples: config.geometry.ellipse_samples,
        });
    let import = facade
        .import(&cli.dxf)
        .with_context(|| format!("读取 DXF 文件 {} 失败", cli.dxf.display()))?;
    if import.skipped_annotations > 0 {
        warn!(count = import.skipped_annotations, "已跳过注释实体");
    }
    let mut drawing = import.drawing;

    let options = pipeline_options(cli, config);
    debug!(?options, "流水线参数");
    let backend = CanvasBackend::new(config.detection.samples_per_unit);
    let output = TilingPipeline::new(&backend, options)
        .run(&mut drawing)
        .context("分页渲染失败")?;

    if output.document.kept == 0 {
        warn!("所有页面均为空白，输出的 PDF 不含任何页面");
    }
    PdfSaver::new(config.render.label_size)
        .save(&output.document.pages, &cli.pdf)
        .with_context(|| format!("写出 PDF {} 失败", cli.pdf.display()))?;

    if let Some(path) = &cli.report {
        ConversionReport::new(&cli.dxf, &cli.pdf, import.skipped_annotations, &output).write(path)?;
        info!(path = %path.display(), "已写出转换报告");
    }

    println!(
        "保留 {} 页，移除 {} 页空白页（共 {} 页）",
        output.document.kept,
        output.document.removed,
        output.document.total()
    );
    Ok(())
}

fn pipeline_options(cli: &Cli, config: &AppConfig) -> PipelineOptions {
    let paper = cli.paper.map(PaperKind::from).unwrap_or(config.layout.paper);
    let mut layout = LayoutParams::new(cli.scale);
    layout.paper = paper_size(paper);
    layout.margin = cli.margin.unwrap_or(config.layout.margin);
    layout.overlap = cli.overlap.unwrap_or(config.layout.overlap);

    let mut options = PipelineOptions::new(layout);
    options.detector = EmptyTileDetector::new(
        config.detection.threshold,
        config.detection.empty_percent,
    );
    options.style = RenderStyle {
        line_width: config.render.line_width,
        hatch_gray: config.render.hatch_gray,
    };
    options.marks = MarkParams {
        hatch_spacing: config.render.hatch_spacing,
        ..MarkParams::default()
    };
    options.parallel = config.render.parallel;
    options
}

fn paper_size(kind: PaperKind) -> PaperSize {
    match kind {
        PaperKind::Letter => PaperSize::LETTER,
        PaperKind::Legal => PaperSize::LEGAL,
        PaperKind::Tabloid => PaperSize::TABLOID,
        PaperKind::A4 => PaperSize::A4,
    }
}

fn wait_for_debugger() {
    println!("PID: {}，附加调试器后按回车继续", process::id());
    let _ = io::stdout().flush();
    let mut line = String::new();
    if let Err(err) = io::stdin().lock().read_line(&mut line) {
        warn!(error = %err, "读取标准输入失败，继续执行");
    }
}

/// 显式指定的配置文件必须可用；自动发现失败时由调用方回退到内建默认值。
fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn report_discovery_failure(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(
                path = %path.display(),
                error = %err,
                "加载默认配置失败，使用内建默认值"
            );
        }
        ConfigError::Context { .. } => {
            warn!(error = %err, "加载默认配置失败，使用内建默认值");
        }
    }
}

fn init_logging(config: &AppConfig, debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
