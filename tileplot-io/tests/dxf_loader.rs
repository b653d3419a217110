use std::path::PathBuf;

use tileplot_core::document::Entity;
use tileplot_core::geometry::Point2;
use tileplot_io::{DocumentLoader, DxfFacade, IoError};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-4,
        "期望 {expected}，实际 {actual}"
    );
}

#[test]
fn load_basic_entities_in_file_order() {
    let drawing = DxfFacade::new()
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");
    assert_eq!(drawing.len(), 4);

    let entities = drawing.entities();
    match &entities[0] {
        Entity::Line(line) => {
            assert_eq!(line.start, Point2::new(0.0, 0.0));
            assert_eq!(line.end, Point2::new(10.0, 5.0));
        }
        other => panic!("期望 LINE，实际 {other:?}"),
    }
    match &entities[1] {
        Entity::Arc(arc) => {
            assert_eq!(arc.center, Point2::new(5.0, 5.0));
            assert_eq!(arc.start_angle, 0.0);
            assert_eq!(arc.end_angle, 90.0);
        }
        other => panic!("期望 ARC，实际 {other:?}"),
    }
    match &entities[2] {
        Entity::Arc(circle) => {
            assert_eq!(circle.radius, 1.5);
            assert_eq!(circle.start_angle, 0.0);
            assert_eq!(circle.end_angle, 360.0);
        }
        other => panic!("期望由 CIRCLE 转换的 ARC，实际 {other:?}"),
    }
    match &entities[3] {
        Entity::Ellipse(ellipse) => {
            assert_eq!(ellipse.ratio, 0.5);
            assert_close(ellipse.end_parameter, std::f64::consts::PI);
        }
        other => panic!("期望 ELLIPSE，实际 {other:?}"),
    }
}

#[test]
fn basic_entities_extent_covers_all_geometry() {
    let drawing = DxfFacade::new()
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");
    let extent = drawing
        .extent()
        .expect("几何有效")
        .expect("图纸不为空");

    assert_close(extent.min().x(), -4.5);
    assert_close(extent.min().y(), -0.5);
    assert_close(extent.max().x(), 24.0);
    assert_close(extent.max().y(), 7.0);
}

#[test]
fn bulge_polyline_is_flattened_onto_the_arc() {
    let import = DxfFacade::new()
        .import(&fixture("bulge_polyline.dxf"))
        .expect("读取带 bulge 的 DXF 失败");
    let lines: Vec<_> = import
        .drawing
        .entities()
        .iter()
        .map(|entity| match entity {
            Entity::Line(line) => line.clone(),
            other => panic!("多段线应只产生直线，实际 {other:?}"),
        })
        .collect();

    assert!(lines.len() > 4);
    assert_eq!(lines[0].start, Point2::new(0.0, 0.0));
    assert_eq!(lines[lines.len() - 1].end, Point2::new(2.0, 0.0));
    for pair in lines.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    for line in &lines {
        let dx = line.end.x() - 1.0;
        let dy = line.end.y();
        assert_close((dx * dx + dy * dy).sqrt(), 1.0);
        assert!(line.end.y() <= 1e-9);
    }
}

#[test]
fn coarser_chord_tolerance_uses_fewer_segments() {
    let fine = DxfFacade::new()
        .import(&fixture("bulge_polyline.dxf"))
        .expect("读取 DXF 失败");
    let coarse = DxfFacade::new()
        .with_chord_tolerance(0.2)
        .import(&fixture("bulge_polyline.dxf"))
        .expect("读取 DXF 失败");
    assert!(coarse.drawing.len() < fine.drawing.len());
    assert!(coarse.drawing.len() >= 2);
}

#[test]
fn unsupported_entity_reports_kind_and_position() {
    let err = DxfFacade::new()
        .load(&fixture("unsupported_entity.dxf"))
        .expect_err("SPLINE 不受支持");
    match err {
        IoError::UnsupportedEntity { kind, index } => {
            assert_eq!(kind, "SPLINE");
            assert_eq!(index, 1);
        }
        other => panic!("期望 UnsupportedEntity，实际 {other:?}"),
    }
}

#[test]
fn annotations_are_skipped_and_counted() {
    let import = DxfFacade::new()
        .import(&fixture("annotations.dxf"))
        .expect("注释实体不应导致失败");
    assert_eq!(import.skipped_annotations, 2);
    assert_eq!(import.drawing.len(), 1);
}

#[test]
fn ansi_encoded_annotation_does_not_abort_import() {
    // TEXT 内容含 cp1252 的度数符号 0xB0，不是合法 UTF-8
    let path = fixture("cp1252_annotation.dxf");
    let raw = std::fs::read(&path).expect("读取测试数据失败");
    assert!(std::str::from_utf8(&raw).is_err());

    let import = DxfFacade::new().import(&path).expect("非 UTF-8 注释不应导致失败");
    assert_eq!(import.drawing.len(), 1);
    assert_eq!(import.skipped_annotations, 1);
}

#[test]
fn missing_file_is_a_read_error() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .expect_err("文件不存在");
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn malformed_value_is_an_invalid_document() {
    let source = "0\nSECTION\n2\nENTITIES\n0\nLINE\n10\nabc\n20\n0\n11\n1\n21\n1\n0\nENDSEC\n0\nEOF\n";
    let err = DxfFacade::new().parse_str(source).expect_err("坐标无法解析");
    assert!(matches!(err, IoError::InvalidDocument(_)));
}
