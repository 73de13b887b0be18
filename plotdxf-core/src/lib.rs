pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，坐标为设备单位。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
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

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        /// 在容差内判断两点是否重合。
        #[inline]
        pub fn approx_eq(self, other: Point2, tolerance: f64) -> bool {
            (self.0 - other.0).abs().max_element() <= tolerance
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于文档范围与填充图案铺排。
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
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 由顶点序列计算包围盒；序列为空时返回 None。
        pub fn from_points<'a, I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = &'a Point2>,
        {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(*point);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
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
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 轴对齐裁剪矩形。构造时自动规整为 min <= max。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(from = "[f64; 4]", into = "[f64; 4]")]
    pub struct ClipRect {
        min: Point2,
        max: Point2,
    }

    impl ClipRect {
        pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
            Self {
                min: Point2::new(x0.min(x1), y0.min(y1)),
                max: Point2::new(x0.max(x1), y0.max(y1)),
            }
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
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        /// 宽或高为零（或非有限值）时矩形不含任何面积。
        pub fn is_degenerate(&self) -> bool {
            let (w, h) = (self.width(), self.height());
            !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0
        }

        /// 逆时针顺序的四个角点。
        pub fn corners(&self) -> [Point2; 4] {
            [
                self.min,
                Point2::new(self.max.x(), self.min.y()),
                self.max,
                Point2::new(self.min.x(), self.max.y()),
            ]
        }
    }

    impl From<[f64; 4]> for ClipRect {
        fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
            Self::new(x0, y0, x1, y1)
        }
    }

    impl From<ClipRect> for [f64; 4] {
        fn from(rect: ClipRect) -> Self {
            [rect.min.x(), rect.min.y(), rect.max.x(), rect.max.y()]
        }
    }

    /// 多边形有向面积（逆时针为正）。
    pub fn signed_area(vertices: &[Point2]) -> f64 {
        if vertices.len() < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for (index, current) in vertices.iter().enumerate() {
            let next = vertices[(index + 1) % vertices.len()];
            twice += current.x() * next.y() - next.x() * current.y();
        }
        twice * 0.5
    }
}

pub mod document {
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::geometry::{Bounds2D, Point2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 调色板索引（ACI，0-255）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ColorIndex(u8);

    impl ColorIndex {
        #[inline]
        pub const fn new(raw: u8) -> Self {
            Self(raw)
        }

        #[inline]
        pub fn get(self) -> u8 {
            self.0
        }
    }

    #[derive(Debug, Error, Clone, PartialEq, Eq)]
    pub enum DocumentError {
        #[error("unsupported DXF version tag: {0}")]
        UnsupportedVersion(String),
        #[error("unsupported text alignment: {0:?}")]
        UnsupportedAlignment(String),
    }

    /// 文档支持的 DXF 版本。轻量多段线（LWPOLYLINE）要求 R2000 及以上。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(try_from = "String", into = "String")]
    pub enum DxfVersion {
        #[default]
        R2000,
        R2004,
        R2007,
        R2010,
        R2013,
        R2018,
    }

    impl DxfVersion {
        pub fn tag(self) -> &'static str {
            match self {
                DxfVersion::R2000 => "AC1015",
                DxfVersion::R2004 => "AC1018",
                DxfVersion::R2007 => "AC1021",
                DxfVersion::R2010 => "AC1024",
                DxfVersion::R2013 => "AC1027",
                DxfVersion::R2018 => "AC1032",
            }
        }
    }

    impl FromStr for DxfVersion {
        type Err = DocumentError;

        /// 同时接受 `AC1015` 形式的版本标记与 `R2000` 形式的发布名。
        fn from_str(value: &str) -> Result<Self, Self::Err> {
            match value.trim().to_ascii_uppercase().as_str() {
                "AC1015" | "R2000" => Ok(DxfVersion::R2000),
                "AC1018" | "R2004" => Ok(DxfVersion::R2004),
                "AC1021" | "R2007" => Ok(DxfVersion::R2007),
                "AC1024" | "R2010" => Ok(DxfVersion::R2010),
                "AC1027" | "R2013" => Ok(DxfVersion::R2013),
                "AC1032" | "R2018" => Ok(DxfVersion::R2018),
                _ => Err(DocumentError::UnsupportedVersion(value.to_string())),
            }
        }
    }

    impl TryFrom<String> for DxfVersion {
        type Error = DocumentError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    impl From<DxfVersion> for String {
        fn from(value: DxfVersion) -> Self {
            value.tag().to_string()
        }
    }

    impl fmt::Display for DxfVersion {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.tag())
        }
    }

    /// DXF TEXT 实体支持的对齐方式，命名与组合对齐标记一致。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum TextAlignment {
        #[default]
        Left,
        Center,
        Right,
        Aligned,
        Middle,
        Fit,
        BottomLeft,
        BottomCenter,
        BottomRight,
        MiddleLeft,
        MiddleCenter,
        MiddleRight,
        TopLeft,
        TopCenter,
        TopRight,
    }

    impl TextAlignment {
        pub fn token(self) -> &'static str {
            match self {
                TextAlignment::Left => "LEFT",
                TextAlignment::Center => "CENTER",
                TextAlignment::Right => "RIGHT",
                TextAlignment::Aligned => "ALIGNED",
                TextAlignment::Middle => "MIDDLE",
                TextAlignment::Fit => "FIT",
                TextAlignment::BottomLeft => "BOTTOM_LEFT",
                TextAlignment::BottomCenter => "BOTTOM_CENTER",
                TextAlignment::BottomRight => "BOTTOM_RIGHT",
                TextAlignment::MiddleLeft => "MIDDLE_LEFT",
                TextAlignment::MiddleCenter => "MIDDLE_CENTER",
                TextAlignment::MiddleRight => "MIDDLE_RIGHT",
                TextAlignment::TopLeft => "TOP_LEFT",
                TextAlignment::TopCenter => "TOP_CENTER",
                TextAlignment::TopRight => "TOP_RIGHT",
            }
        }

        /// 返回 DXF 组码 72（水平）与 73（垂直）的取值。
        pub fn dxf_flags(self) -> (i16, i16) {
            match self {
                TextAlignment::Left => (0, 0),
                TextAlignment::Center => (1, 0),
                TextAlignment::Right => (2, 0),
                TextAlignment::Aligned => (3, 0),
                TextAlignment::Middle => (4, 0),
                TextAlignment::Fit => (5, 0),
                TextAlignment::BottomLeft => (0, 1),
                TextAlignment::BottomCenter => (1, 1),
                TextAlignment::BottomRight => (2, 1),
                TextAlignment::MiddleLeft => (0, 2),
                TextAlignment::MiddleCenter => (1, 2),
                TextAlignment::MiddleRight => (2, 2),
                TextAlignment::TopLeft => (0, 3),
                TextAlignment::TopCenter => (1, 3),
                TextAlignment::TopRight => (2, 3),
            }
        }

        /// 左对齐基线以外的方式需要额外写出对齐点。
        #[inline]
        pub fn uses_alignment_point(self) -> bool {
            self != TextAlignment::Left
        }
    }

    impl FromStr for TextAlignment {
        type Err = DocumentError;

        /// 空标记等同于左对齐基线。
        fn from_str(token: &str) -> Result<Self, Self::Err> {
            let alignment = match token {
                "" | "LEFT" => TextAlignment::Left,
                "CENTER" => TextAlignment::Center,
                "RIGHT" => TextAlignment::Right,
                "ALIGNED" => TextAlignment::Aligned,
                "MIDDLE" => TextAlignment::Middle,
                "FIT" => TextAlignment::Fit,
                "BOTTOM_LEFT" => TextAlignment::BottomLeft,
                "BOTTOM_CENTER" => TextAlignment::BottomCenter,
                "BOTTOM_RIGHT" => TextAlignment::BottomRight,
                "MIDDLE_LEFT" => TextAlignment::MiddleLeft,
                "MIDDLE_CENTER" => TextAlignment::MiddleCenter,
                "MIDDLE_RIGHT" => TextAlignment::MiddleRight,
                "TOP_LEFT" => TextAlignment::TopLeft,
                "TOP_CENTER" => TextAlignment::TopCenter,
                "TOP_RIGHT" => TextAlignment::TopRight,
                other => return Err(DocumentError::UnsupportedAlignment(other.to_string())),
            };
            Ok(alignment)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Polyline(Polyline),
        FilledRegion(FilledRegion),
        Text(Text),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::FilledRegion(region) => &region.layer,
                Entity::Text(text) => &text.layer,
            }
        }

        #[inline]
        pub fn color(&self) -> ColorIndex {
            match self {
                Entity::Polyline(polyline) => polyline.color,
                Entity::FilledRegion(region) => region.color,
                Entity::Text(text) => text.color,
            }
        }

        /// 计算实体的 2D 轴对齐范围，文本退化为插入点。
        pub fn bounds(&self) -> Option<Bounds2D> {
            match self {
                Entity::Polyline(polyline) => Bounds2D::from_points(&polyline.vertices),
                Entity::FilledRegion(region) => Bounds2D::from_points(
                    region.loops.iter().flat_map(|boundary| &boundary.vertices),
                ),
                Entity::Text(text) => Some(Bounds2D::new(text.insert, text.insert)),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        pub color: ColorIndex,
        pub layer: String,
    }

    /// 填充区域的一条边界环。`source` 记录定义该环的多段线（仅作查找关联，不持有所有权）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct BoundaryLoop {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source: Option<EntityId>,
    }

    impl BoundaryLoop {
        #[inline]
        pub fn inline(vertices: Vec<Point2>) -> Self {
            Self {
                vertices,
                is_closed: true,
                source: None,
            }
        }

        /// 复制多段线的顶点与闭合状态，并记录关联。
        pub fn associated(id: EntityId, polyline: &Polyline) -> Self {
            Self {
                vertices: polyline.vertices.clone(),
                is_closed: polyline.is_closed,
                source: Some(id),
            }
        }
    }

    /// 实心填充区域（DXF HATCH）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct FilledRegion {
        pub loops: Vec<BoundaryLoop>,
        pub color: ColorIndex,
        pub layer: String,
    }

    impl FilledRegion {
        #[inline]
        pub fn is_associative(&self) -> bool {
            self.loops.iter().any(|boundary| boundary.source.is_some())
        }

        pub fn associated_sources(&self) -> impl Iterator<Item = EntityId> + '_ {
            self.loops.iter().filter_map(|boundary| boundary.source)
        }
    }

    /// 单行文字，旋转角以度为单位。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub color: ColorIndex,
        pub alignment: TextAlignment,
        pub layer: String,
    }

    /// 文档头信息：版本与全局范围（$EXTMIN / $EXTMAX）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Header {
        pub version: DxfVersion,
        pub extents: Bounds2D,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        header: Header,
        layers: BTreeMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        /// 以画布范围创建文档；范围此后只会扩大。
        pub fn new(version: DxfVersion, extents: Bounds2D) -> Self {
            let mut doc = Self {
                header: Header { version, extents },
                layers: BTreeMap::new(),
                entities: Vec::new(),
                next_entity_id: 0,
            };
            doc.ensure_layer("0");
            doc
        }

        /// 以 `(0, 0)`-`(width, height)` 作为初始范围。
        pub fn for_canvas(version: DxfVersion, width: f64, height: f64) -> Self {
            Self::new(
                version,
                Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(width, height)),
            )
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        #[inline]
        pub fn header(&self) -> &Header {
            &self.header
        }

        #[inline]
        pub fn version(&self) -> DxfVersion {
            self.header.version
        }

        #[inline]
        pub fn extents(&self) -> Bounds2D {
            self.header.extents
        }

        pub fn expand_extents(&mut self, bounds: &Bounds2D) {
            self.header.extents.include_bounds(bounds);
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            color: ColorIndex,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Polyline(Polyline {
                    vertices: vertices.into_iter().collect(),
                    is_closed,
                    color,
                    layer,
                }),
            ));
            id
        }

        pub fn add_filled_region(
            &mut self,
            loops: Vec<BoundaryLoop>,
            color: ColorIndex,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::FilledRegion(FilledRegion {
                    loops,
                    color,
                    layer,
                }),
            ));
            id
        }

        /// 以指定多段线为边界创建关联填充。多段线不存在时返回 None。
        pub fn add_associated_fill(
            &mut self,
            outline: EntityId,
            color: ColorIndex,
            layer: impl Into<String>,
        ) -> Option<EntityId> {
            let boundary = match self.entity(outline)? {
                Entity::Polyline(polyline) => BoundaryLoop::associated(outline, polyline),
                _ => return None,
            };
            Some(self.add_filled_region(vec![boundary], color, layer))
        }

        #[allow(clippy::too_many_arguments)]
        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            color: ColorIndex,
            alignment: TextAlignment,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.ensure_layer(&layer);
            let id = self.next_id();
            self.entities.push((
                id,
                Entity::Text(Text {
                    insert,
                    content: content.into(),
                    height,
                    rotation,
                    color,
                    alignment,
                    layer,
                }),
            ));
            id
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            // 编号按插入顺序递增，可直接定位。
            usize::try_from(id.get())
                .ok()
                .and_then(|index| self.entities.get(index))
                .filter(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        /// 返回以指定多段线作为关联边界的填充区域。
        pub fn regions_associated_with(&self, outline: EntityId) -> Vec<EntityId> {
            self.entities
                .iter()
                .filter_map(|(id, entity)| match entity {
                    Entity::FilledRegion(region)
                        if region.associated_sources().any(|source| source == outline) =>
                    {
                        Some(*id)
                    }
                    _ => None,
                })
                .collect()
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}
