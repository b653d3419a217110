pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        pub const ORIGIN: Point2 = Point2(DVec2::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        /// 逐分量减去 `delta`，用于把图纸最小角归一化到原点。
        #[inline]
        pub fn offset(self, delta: Point2) -> Self {
            Self(self.0 - delta.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，表示方向与长度（不参与平移）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        /// 与 +X 轴的夹角（弧度）。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框。`min` 为左下角，`max` 为右上角。
    ///
    /// 空边界框以 (+∞,+∞)-(−∞,−∞) 表示，是 [`Bounds2D::union`] 的单位元；
    /// 在至少并入一个实际范围之前不应读取其尺寸。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn from_point(point: Point2) -> Self {
            Self {
                min: point,
                max: point,
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn is_finite(&self) -> bool {
            self.min.is_finite() && self.max.is_finite()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            debug_assert!(!self.is_empty());
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            debug_assert!(!self.is_empty());
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        /// 累加器的折叠操作：左下角取分量最小值，右上角取分量最大值。
        /// 满足结合律与交换律，空边界框为单位元。
        #[inline]
        pub fn union(&self, other: &Bounds2D) -> Bounds2D {
            Bounds2D {
                min: Point2::from_vec(self.min.as_vec2().min(other.min.as_vec2())),
                max: Point2::from_vec(self.max.as_vec2().max(other.max.as_vec2())),
            }
        }

        #[inline]
        pub fn offset(&self, delta: Point2) -> Bounds2D {
            Bounds2D {
                min: self.min.offset(delta),
                max: self.max.offset(delta),
            }
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn intersects(&self, other: &Bounds2D) -> bool {
            self.min.x() <= other.max.x()
                && other.min.x() <= self.max.x()
                && self.min.y() <= other.max.y()
                && other.min.y() <= self.max.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    impl Default for Bounds2D {
        fn default() -> Self {
            Self::empty()
        }
    }

}

pub mod document {
    use std::f64::consts::TAU;
    use std::fmt;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Bounds2D, Point2, Vector2};

    /// 椭圆弧包围盒默认采样点数。
    pub const DEFAULT_ELLIPSE_SAMPLES: usize = 1000;

    /// 包围盒计算选项。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BoundsOptions {
        /// 椭圆弧采样点数（含两端点），至少为 2。
        pub ellipse_samples: usize,
    }

    impl Default for BoundsOptions {
        fn default() -> Self {
            Self {
                ellipse_samples: DEFAULT_ELLIPSE_SAMPLES,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum EntityKind {
        Line,
        Arc,
        Ellipse,
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                EntityKind::Line => "LINE",
                EntityKind::Arc => "ARC",
                EntityKind::Ellipse => "ELLIPSE",
            };
            f.write_str(name)
        }
    }

    #[derive(Debug, Error, Clone, PartialEq)]
    pub enum GeometryError {
        #[error("entity #{index} ({kind}) has degenerate field `{field}`")]
        Degenerate {
            index: usize,
            kind: EntityKind,
            field: &'static str,
        },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Arc(Arc),
        Ellipse(Ellipse),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Line(_) => EntityKind::Line,
                Entity::Arc(_) => EntityKind::Arc,
                Entity::Ellipse(_) => EntityKind::Ellipse,
            }
        }

        /// 使用默认选项计算 2D 轴对齐范围。
        #[inline]
        pub fn bounds(&self) -> Bounds2D {
            self.bounds_with(&BoundsOptions::default())
        }

        pub fn bounds_with(&self, options: &BoundsOptions) -> Bounds2D {
            match self {
                Entity::Line(line) => line.bounds(),
                Entity::Arc(arc) => arc.bounds(),
                Entity::Ellipse(ellipse) => ellipse.bounds_sampled(options.ellipse_samples),
            }
        }

        /// 平移实体的定位字段（减去 `delta`）。方向向量保持不变。
        pub fn offset(&mut self, delta: Point2) {
            match self {
                Entity::Line(line) => {
                    line.start = line.start.offset(delta);
                    line.end = line.end.offset(delta);
                }
                Entity::Arc(arc) => arc.center = arc.center.offset(delta),
                Entity::Ellipse(ellipse) => ellipse.center = ellipse.center.offset(delta),
            }
        }

        /// 检查字段是否有限、合法，返回首个有问题的字段名。
        pub fn degenerate_field(&self) -> Option<&'static str> {
            match self {
                Entity::Line(line) => {
                    if !line.start.is_finite() {
                        Some("start")
                    } else if !line.end.is_finite() {
                        Some("end")
                    } else {
                        None
                    }
                }
                Entity::Arc(arc) => {
                    if !arc.center.is_finite() {
                        Some("center")
                    } else if !arc.radius.is_finite() || arc.radius < 0.0 {
                        Some("radius")
                    } else if !arc.start_angle.is_finite() {
                        Some("start_angle")
                    } else if !arc.end_angle.is_finite() {
                        Some("end_angle")
                    } else {
                        None
                    }
                }
                Entity::Ellipse(ellipse) => {
                    if !ellipse.center.is_finite() {
                        Some("center")
                    } else if !ellipse.major_axis.is_finite() {
                        Some("major_axis")
                    } else if !ellipse.ratio.is_finite() {
                        Some("ratio")
                    } else if !ellipse.start_parameter.is_finite() {
                        Some("start_parameter")
                    } else if !ellipse.end_parameter.is_finite() {
                        Some("end_parameter")
                    } else {
                        None
                    }
                }
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    impl Line {
        pub fn bounds(&self) -> Bounds2D {
            let mut bounds = Bounds2D::from_point(self.start);
            bounds.include_point(self.end);
            bounds
        }
    }

    /// 圆弧实体，角度以度储存，逆时针为正；`start_angle > end_angle` 表示跨越 0°。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    impl Arc {
        /// 整圆，DXF CIRCLE 以此表示。
        pub fn full_circle(center: Point2, radius: f64) -> Self {
            Self {
                center,
                radius,
                start_angle: 0.0,
                end_angle: 360.0,
            }
        }

        #[inline]
        pub fn is_wrapping(&self) -> bool {
            self.start_angle > self.end_angle
        }

        /// 扫掠区间上界：跨越 0° 时加一整圈。
        #[inline]
        fn sweep_end(&self) -> f64 {
            if self.is_wrapping() {
                self.end_angle + 360.0
            } else {
                self.end_angle
            }
        }

        /// 角度 `angle`（度）是否落在扫掠范围内，按 360° 周期判断。
        pub fn sweeps(&self, angle: f64) -> bool {
            let start = self.start_angle;
            let end = self.sweep_end();
            let turns = ((start - angle) / 360.0).ceil();
            let candidate = angle + turns * 360.0;
            candidate >= start && candidate <= end
        }

        pub fn point_at(&self, angle: f64) -> Point2 {
            let radians = angle.to_radians();
            let offset = Vector2::new(self.radius * radians.cos(), self.radius * radians.sin());
            self.center.translate(offset)
        }

        /// 精确包围盒：端点加上扫掠范围内的四个象限点。
        pub fn bounds(&self) -> Bounds2D {
            if self.radius <= f64::EPSILON {
                return Bounds2D::from_point(self.center);
            }
            let mut bounds = Bounds2D::from_point(self.point_at(self.start_angle));
            bounds.include_point(self.point_at(self.end_angle));
            for cardinal in [0.0, 90.0, 180.0, 270.0] {
                if self.sweeps(cardinal) {
                    bounds.include_point(self.point_at(cardinal));
                }
            }
            bounds
        }
    }

    /// 椭圆弧实体，记录主轴向量、短长轴比与参数范围（弧度）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
    }

    impl Ellipse {
        /// 归一化后的参数区间 `[start, end]`，`end > start`。
        pub fn parameter_range(&self) -> (f64, f64) {
            canonical_interval(self.start_parameter, self.end_parameter)
        }

        pub fn semi_major(&self) -> f64 {
            self.major_axis.length()
        }

        pub fn semi_minor(&self) -> f64 {
            self.semi_major() * self.ratio
        }

        pub fn rotation(&self) -> f64 {
            self.major_axis.angle()
        }

        pub fn point_at(&self, t: f64) -> Point2 {
            let a = self.semi_major();
            let b = a * self.ratio;
            let local = DVec2::new(a * t.cos(), b * t.sin());
            let rotated = DVec2::from_angle(self.rotation()).rotate(local);
            self.center.translate(Vector2::from(rotated))
        }

        /// 近似包围盒：在参数区间上均匀采样 `samples` 个点（含端点）。
        ///
        /// 采样数趋于无穷时收敛到真实范围；有限采样可能略微低估曲率极大处的范围。
        pub fn bounds_sampled(&self, samples: usize) -> Bounds2D {
            if self.semi_major() <= f64::EPSILON {
                return Bounds2D::from_point(self.center);
            }
            let samples = samples.max(2);
            let (start, end) = self.parameter_range();
            let span = end - start;
            let last = (samples - 1) as f64;
            let mut bounds = Bounds2D::empty();
            for k in 0..samples {
                let t = start + span * (k as f64 / last);
                bounds.include_point(self.point_at(t));
            }
            bounds
        }
    }

    fn normalize_angle(angle: f64) -> f64 {
        let result = angle.rem_euclid(TAU);
        // rem_euclid 可能因舍入返回 TAU 本身
        if result >= TAU { 0.0 } else { result }
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if end <= start {
            end += TAU;
        }
        (start, end)
    }

    /// 导入后的图纸。实体列表不被别名或共享修改，唯一的修改入口是 [`Drawing::normalize`]。
    #[derive(Debug, Default, Clone)]
    pub struct Drawing {
        entities: Vec<Entity>,
        bounds_options: BoundsOptions,
    }

    impl Drawing {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_bounds_options(options: BoundsOptions) -> Self {
            Self {
                entities: Vec::new(),
                bounds_options: options,
            }
        }

        #[inline]
        pub fn bounds_options(&self) -> BoundsOptions {
            self.bounds_options
        }

        pub fn add_line(&mut self, start: Point2, end: Point2) -> usize {
            self.add_entity(Entity::Line(Line { start, end }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        ) -> usize {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
            }))
        }

        pub fn add_ellipse(
            &mut self,
            center: Point2,
            major_axis: Vector2,
            ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
        ) -> usize {
            self.add_entity(Entity::Ellipse(Ellipse {
                center,
                major_axis,
                ratio,
                start_parameter,
                end_parameter,
            }))
        }

        /// 追加一个实体并返回其序号；每个解析出的实体只追加一次。
        pub fn add_entity(&mut self, entity: Entity) -> usize {
            self.entities.push(entity);
            self.entities.len() - 1
        }

        #[inline]
        pub fn entities(&self) -> &[Entity] {
            &self.entities
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        /// 折叠全部实体的包围盒。任一实体字段或包围盒非有限时返回错误，
        /// 保证损坏数据不会进入整体范围。无实体时返回 `Ok(None)`。
        pub fn extent(&self) -> Result<Option<Bounds2D>, GeometryError> {
            let mut extent = Bounds2D::empty();
            for (index, entity) in self.entities.iter().enumerate() {
                let kind = entity.kind();
                if let Some(field) = entity.degenerate_field() {
                    return Err(GeometryError::Degenerate { index, kind, field });
                }
                let bounds = entity.bounds_with(&self.bounds_options);
                if bounds.is_empty() || !bounds.is_finite() {
                    return Err(GeometryError::Degenerate {
                        index,
                        kind,
                        field: "bounds",
                    });
                }
                extent = extent.union(&bounds);
            }
            if extent.is_empty() {
                Ok(None)
            } else {
                Ok(Some(extent))
            }
        }

        /// 将全部实体平移，使整体范围的左下角落在原点，返回归一化后的范围。
        pub fn normalize(&mut self) -> Result<Option<Bounds2D>, GeometryError> {
            let Some(extent) = self.extent()? else {
                return Ok(None);
            };
            let origin = extent.min();
            for entity in &mut self.entities {
                entity.offset(origin);
            }
            Ok(Some(extent.offset(origin)))
        }
    }

}
