use std::f64::consts::{PI, TAU};

use glam::DVec2;
use tileplot_core::document::{Arc, BoundsOptions, Drawing, Ellipse, Entity, Line};
use tileplot_core::geometry::{Point2, Vector2};
use tracing::{debug, warn};

/// 默认弦高容差（图纸单位），用于把带 bulge 的多段线段拆成直线。
pub const DEFAULT_CHORD_TOLERANCE: f64 = 0.01;

/// 单段圆弧最多拆分的直线段数。
const MAX_BULGE_SEGMENTS: usize = 4096;

#[derive(Debug)]
pub(crate) enum DxfError {
    Unsupported { kind: String, index: usize },
    Invalid { message: String },
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// 导入结果：图纸与被跳过的注释实体数量。
#[derive(Debug, Clone)]
pub struct DxfImport {
    pub drawing: Drawing,
    pub skipped_annotations: usize,
}

pub(crate) struct DxfParser<'a> {
    reader: DxfReader<'a>,
    chord_tolerance: f64,
    bounds_options: BoundsOptions,
}

impl<'a> DxfParser<'a> {
    pub(crate) fn new(
        source: &'a str,
        chord_tolerance: f64,
        bounds_options: BoundsOptions,
    ) -> Self {
        Self {
            reader: DxfReader::new(source),
            chord_tolerance,
            bounds_options,
        }
    }

    pub(crate) fn parse(mut self) -> Result<DxfImport, DxfError> {
        let mut import = DxfImport {
            drawing: Drawing::with_bounds_options(self.bounds_options),
            skipped_annotations: 0,
        };
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "ENTITIES" => self.parse_entities(&mut import)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(import)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, import: &mut DxfImport) -> Result<(), DxfError> {
        let mut index = 0;
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "TEXT" | "MTEXT" => {
                    warn!(kind = value.trim(), index, "跳过注释实体");
                    self.skip_entity_body()?;
                    import.skipped_annotations += 1;
                }
                "LINE" => {
                    let line = self.parse_line()?;
                    import.drawing.add_entity(Entity::Line(line));
                }
                "ARC" => {
                    let arc = self.parse_arc()?;
                    import.drawing.add_entity(Entity::Arc(arc));
                }
                "CIRCLE" => {
                    let circle = self.parse_circle()?;
                    import.drawing.add_entity(Entity::Arc(circle));
                }
                "ELLIPSE" => {
                    let ellipse = self.parse_ellipse()?;
                    import.drawing.add_entity(Entity::Ellipse(ellipse));
                }
                "LWPOLYLINE" => {
                    let lines = self.parse_lwpolyline()?;
                    debug!(index, segments = lines.len(), "LWPOLYLINE 拆分为直线");
                    for line in lines {
                        import.drawing.add_entity(Entity::Line(line));
                    }
                }
                other => {
                    return Err(DxfError::Unsupported {
                        kind: other.to_string(),
                        index,
                    });
                }
            }
            index += 1;
        }
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Line, DxfError> {
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        while let Some((code, value)) = self.next_field("LINE")? {
            match code {
                10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                _ => {} // 图层、Z 坐标等
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
        })
    }

    fn parse_circle(&mut self) -> Result<Arc, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        while let Some((code, value)) = self.next_field("CIRCLE")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(Arc::full_circle(Point2::new(cx, cy), radius))
    }

    /// 角度保持为度。
    fn parse_arc(&mut self) -> Result<Arc, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        while let Some((code, value)) = self.next_field("ARC")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        Ok(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle,
            end_angle,
        })
    }

    /// 参数范围缺省为整椭圆。主轴与比值的合法性留给几何校验。
    fn parse_ellipse(&mut self) -> Result<Ellipse, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut major_x = None;
        let mut major_y = None;
        let mut ratio = None;
        let mut start_parameter = None;
        let mut end_parameter = None;
        while let Some((code, value)) = self.next_field("ELLIPSE")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "ELLIPSE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "ELLIPSE 圆心 Y（组码 20）")?,
                11 => assign_coord(&mut major_x, &value, "ELLIPSE 主轴向量 X（组码 11）")?,
                21 => assign_coord(&mut major_y, &value, "ELLIPSE 主轴向量 Y（组码 21）")?,
                40 => assign_coord(&mut ratio, &value, "ELLIPSE 半径比（组码 40）")?,
                41 => assign_coord(&mut start_parameter, &value, "ELLIPSE 起始参数（组码 41）")?,
                42 => assign_coord(&mut end_parameter, &value, "ELLIPSE 终止参数（组码 42）")?,
                _ => {} // Z 分量、法向量等
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 Y（组码 20）"))?;
        let major_x =
            major_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 X（组码 11）"))?;
        let major_y =
            major_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 Y（组码 21）"))?;

        Ok(Ellipse {
            center: Point2::new(cx, cy),
            major_axis: Vector2::new(major_x, major_y),
            ratio: ratio.unwrap_or(1.0),
            start_parameter: start_parameter.unwrap_or(0.0),
            end_parameter: end_parameter.unwrap_or(TAU),
        })
    }

    /// 多段线拆为直线；带 bulge 的段按弦高容差离散。
    fn parse_lwpolyline(&mut self) -> Result<Vec<Line>, DxfError> {
        let mut is_closed = false;
        let mut vertices: Vec<(Point2, f64)> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        while let Some((code, value)) = self.next_field("LWPOLYLINE")? {
            match code {
                70 => {
                    let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                    is_closed = flag & 0x01 == 0x01;
                }
                10 => {
                    let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                    if let Some(y) = pending_y.take() {
                        vertices.push((Point2::new(x, y), 0.0));
                    } else if pending_x.replace(x).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 Y（组码 20）"));
                    }
                }
                20 => {
                    let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                    if let Some(x) = pending_x.take() {
                        vertices.push((Point2::new(x, y), 0.0));
                    } else if pending_y.replace(y).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 X（组码 10）"));
                    }
                }
                42 => {
                    let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                    match vertices.last_mut() {
                        Some(vertex) => vertex.1 = bulge,
                        None => {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）",
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }
        if vertices.is_empty() {
            return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
        }

        let segment_count = if is_closed && vertices.len() > 1 {
            vertices.len()
        } else {
            vertices.len() - 1
        };
        let mut lines = Vec::new();
        for k in 0..segment_count {
            let (start, bulge) = vertices[k];
            let (end, _) = vertices[(k + 1) % vertices.len()];
            bulge_to_lines(start, end, bulge, self.chord_tolerance, &mut lines);
        }
        Ok(lines)
    }

    /// 读取当前实体的下一个字段；遇到下一个实体（组码 0）时回退并返回 `None`。
    fn next_field(&mut self, kind: &str) -> Result<Option<(i32, String)>, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(DxfError::invalid(format!("{kind} 未正确结束"))),
        }
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

/// 把一段多段线（可带 bulge）离散为直线并追加到 `out`。
///
/// `bulge = tan(θ/4)`，θ 为圆心角，正值为逆时针。每条直线的弦高不超过 `tolerance`。
pub(crate) fn bulge_to_lines(
    start: Point2,
    end: Point2,
    bulge: f64,
    tolerance: f64,
    out: &mut Vec<Line>,
) {
    let start_vec = start.as_vec2();
    let end_vec = end.as_vec2();
    let chord = end_vec - start_vec;
    let chord_len = chord.length();
    if bulge.abs() <= 1e-9 || chord_len <= f64::EPSILON || !bulge.is_finite() {
        out.push(Line { start, end });
        return;
    }

    let theta = 4.0 * bulge.atan();
    let radius = (chord_len / (2.0 * (theta / 2.0).sin())).abs();
    // 圆心位于弦中点沿左法向偏移 h 处
    let left = DVec2::new(-chord.y, chord.x) / chord_len;
    let h = chord_len / 2.0 * (1.0 - bulge * bulge) / (2.0 * bulge);
    let center = (start_vec + end_vec) * 0.5 + left * h;

    let step = if tolerance > 0.0 && tolerance < radius {
        2.0 * (1.0 - tolerance / radius).acos()
    } else {
        PI / 2.0
    };
    let count = ((theta.abs() / step).ceil() as usize).clamp(1, MAX_BULGE_SEGMENTS);

    let offset = start_vec - center;
    let mut previous = start;
    for k in 1..=count {
        let point = if k == count {
            end
        } else {
            let angle = theta * k as f64 / count as f64;
            Point2::from_vec(center + DVec2::from_angle(angle).rotate(offset))
        };
        out.push(Line {
            start: previous,
            end: point,
        });
        previous = point;
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾可能有空行
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    /// 每次最多回退一个组码对。
    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}
