//! 绘图原语到文档实体的转换。
//!
//! 图元类别作为显式参数传入；宿主的分组栈由 [`crate::session::DrawingSession`] 负责解析。

use glam::DAffine2;
use plotdxf_core::document::{BoundaryLoop, Document, EntityId};
use plotdxf_core::geometry::{Bounds2D, ClipRect, Point2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::align::resolve_alignment;
use crate::clip::{clip_polygon_to_rect, clip_polyline_runs};
use crate::errors::RenderError;
use crate::hatch::{HatchFragment, HatchSpec, tile_hatch};
use crate::palette::{Rgb, rgb_to_index};

const POINTS_PER_INCH: f64 = 72.0;

/// 几何调用所属的图元类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// 可填充的闭合图形。
    Patch,
    /// 开放折线。
    Line,
    /// 未识别的分组，不产生实体。
    Unclassified,
}

impl PrimitiveKind {
    pub fn classify(tag: &str) -> Self {
        match tag {
            "patch" => PrimitiveKind::Patch,
            "line2d" => PrimitiveKind::Line,
            _ => PrimitiveKind::Unclassified,
        }
    }
}

/// 单次绘制调用的图形状态。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphicsState {
    #[serde(default)]
    pub stroke: Option<Rgb>,
    #[serde(default)]
    pub clip: Option<ClipRect>,
    #[serde(default)]
    pub hatch: Option<HatchSpec>,
}

/// 文字绘制请求。`position` 为未旋转、未平移的原始位置，经 `transform` 得到插入点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub content: String,
    pub position: Point2,
    #[serde(default)]
    pub transform: DAffine2,
    pub size_points: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "TextRun::default_horizontal")]
    pub horizontal_align: String,
    #[serde(default = "TextRun::default_vertical")]
    pub vertical_align: String,
}

impl TextRun {
    pub fn new(content: impl Into<String>, position: Point2, size_points: f64) -> Self {
        Self {
            content: content.into(),
            position,
            transform: DAffine2::IDENTITY,
            size_points,
            rotation: 0.0,
            horizontal_align: Self::default_horizontal(),
            vertical_align: Self::default_vertical(),
        }
    }

    fn default_horizontal() -> String {
        "left".to_string()
    }

    fn default_vertical() -> String {
        "baseline".to_string()
    }

    #[inline]
    pub fn anchor(&self) -> Point2 {
        Point2::from_vec(self.transform.transform_point2(self.position.as_vec2()))
    }
}

/// 根据图元类别与图形状态生成实体，所有实体写入同一图层。
#[derive(Debug, Clone)]
pub struct EntityEmitter {
    dpi: f64,
    layer: String,
}

impl EntityEmitter {
    pub fn new(dpi: f64) -> Self {
        Self {
            dpi,
            layer: "0".to_string(),
        }
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = layer.into();
        self
    }

    #[inline]
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    #[inline]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// 磅值转换为设备单位。
    #[inline]
    pub fn points_to_device(&self, points: f64) -> f64 {
        points / POINTS_PER_INCH * self.dpi
    }

    /// 绘制一条路径，返回新建实体的编号（按追加顺序）。
    pub fn emit_path(
        &self,
        document: &mut Document,
        kind: PrimitiveKind,
        vertices: &[Point2],
        gc: &GraphicsState,
        fill: Option<Rgb>,
    ) -> Vec<EntityId> {
        match kind {
            PrimitiveKind::Patch => self.emit_patch(document, vertices, gc, fill),
            PrimitiveKind::Line => self.emit_line(document, vertices, gc),
            PrimitiveKind::Unclassified => {
                trace!(vertices = vertices.len(), "未识别的图元类别，跳过");
                Vec::new()
            }
        }
    }

    /// 在每个数据点处绘制一次标记（标记局部坐标按数据点平移）。
    pub fn emit_markers(
        &self,
        document: &mut Document,
        marker: &[Point2],
        points: &[Point2],
        gc: &GraphicsState,
    ) -> Vec<EntityId> {
        let mut ids = Vec::new();
        for point in points {
            let offset = Vector2::from(point.as_vec2());
            let placed: Vec<Point2> = marker.iter().map(|local| local.translate(offset)).collect();
            ids.extend(self.emit_line(document, &placed, gc));
        }
        ids
    }

    pub fn emit_text(
        &self,
        document: &mut Document,
        run: &TextRun,
        gc: &GraphicsState,
    ) -> Result<EntityId, RenderError> {
        let alignment = resolve_alignment(&run.horizontal_align, &run.vertical_align)?;
        let height = self.points_to_device(run.size_points);
        let color = rgb_to_index(gc.stroke);
        let id = document.add_text(
            run.anchor(),
            sanitize_text(&run.content),
            height,
            run.rotation,
            color,
            alignment,
            self.layer.as_str(),
        );
        debug!(
            id = id.get(),
            height,
            alignment = alignment.token(),
            "已创建文字实体"
        );
        Ok(id)
    }

    fn emit_patch(
        &self,
        document: &mut Document,
        vertices: &[Point2],
        gc: &GraphicsState,
        fill: Option<Rgb>,
    ) -> Vec<EntityId> {
        let outline = strip_closing_vertex(vertices);
        let outline = match &gc.clip {
            Some(rect) => clip_polygon_to_rect(rect, outline),
            None => outline.to_vec(),
        };
        if outline.len() < 3 {
            trace!(vertices = outline.len(), "闭合图形裁剪后顶点不足，跳过");
            return Vec::new();
        }

        // 铺排使用未裁剪路径的范围，边界使用裁剪后的轮廓。
        let hatch = gc.hatch.as_ref().and_then(|spec| {
            let extent = Bounds2D::from_points(vertices)?;
            let fragments = tile_hatch(&extent, self.dpi, &spec.cell, &outline);
            Some((rgb_to_index(spec.color), fragments))
        });

        let outline_color = rgb_to_index(fill.or(gc.stroke));
        let mut ids = Vec::new();
        let outline_id = document.add_polyline(outline, true, outline_color, self.layer.as_str());
        ids.push(outline_id);

        if let Some(face) = fill {
            ids.extend(document.add_associated_fill(
                outline_id,
                rgb_to_index(Some(face)),
                self.layer.as_str(),
            ));
        }

        if let Some((color, fragments)) = hatch {
            for fragment in fragments {
                let id = match fragment {
                    HatchFragment::Open(points) => {
                        document.add_polyline(points, false, color, self.layer.as_str())
                    }
                    HatchFragment::Closed(points) => document.add_filled_region(
                        vec![BoundaryLoop::inline(points)],
                        color,
                        self.layer.as_str(),
                    ),
                };
                ids.push(id);
            }
        }

        debug!(
            outline = outline_id.get(),
            filled = fill.is_some(),
            entities = ids.len(),
            "已创建闭合图形"
        );
        ids
    }

    fn emit_line(
        &self,
        document: &mut Document,
        vertices: &[Point2],
        gc: &GraphicsState,
    ) -> Vec<EntityId> {
        let runs = match &gc.clip {
            Some(rect) => clip_polyline_runs(rect, vertices),
            None if vertices.len() >= 2 => vec![vertices.to_vec()],
            None => Vec::new(),
        };
        if runs.is_empty() {
            trace!(vertices = vertices.len(), "折线裁剪后为空，跳过");
            return Vec::new();
        }

        let color = rgb_to_index(gc.stroke);
        let ids: Vec<EntityId> = runs
            .into_iter()
            .map(|run| document.add_polyline(run, false, color, self.layer.as_str()))
            .collect();
        debug!(count = ids.len(), color = color.get(), "已创建折线");
        ids
    }
}

/// 去掉与首点重合的显式闭合点。
fn strip_closing_vertex(vertices: &[Point2]) -> &[Point2] {
    match vertices {
        [first, .., last] if vertices.len() > 3 && first.approx_eq(*last, 1e-9) => {
            &vertices[..vertices.len() - 1]
        }
        _ => vertices,
    }
}

/// 把 Unicode 减号替换为 ASCII 连字符，并丢弃其余非 ASCII 字符。
pub fn sanitize_text(content: &str) -> String {
    content
        .chars()
        .map(|ch| if ch == '\u{2212}' { '-' } else { ch })
        .filter(char::is_ascii)
        .collect()
}

#[cfg(test)]
mod tests {
    use plotdxf_core::document::{DxfVersion, Entity, TextAlignment};
    use plotdxf_core::geometry::signed_area;

    use super::*;
    use crate::palette::WHITE;

    fn document() -> Document {
        Document::for_canvas(DxfVersion::R2000, 640.0, 480.0)
    }

    fn closed_square(size: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
            Point2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn classify_known_tags() {
        assert_eq!(PrimitiveKind::classify("patch"), PrimitiveKind::Patch);
        assert_eq!(PrimitiveKind::classify("line2d"), PrimitiveKind::Line);
        assert_eq!(PrimitiveKind::classify("legend"), PrimitiveKind::Unclassified);
    }

    #[test]
    fn patch_drops_explicit_closing_vertex() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let ids = emitter.emit_path(
            &mut doc,
            PrimitiveKind::Patch,
            &closed_square(10.0),
            &GraphicsState::default(),
            None,
        );
        assert_eq!(ids.len(), 1);
        match doc.entity(ids[0]) {
            Some(Entity::Polyline(polyline)) => {
                assert!(polyline.is_closed);
                assert_eq!(polyline.vertices.len(), 4);
                assert_eq!(polyline.color, WHITE);
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn clipped_away_patch_emits_nothing() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let gc = GraphicsState {
            clip: Some(ClipRect::new(100.0, 100.0, 200.0, 200.0)),
            hatch: Some(HatchSpec {
                cell: vec![vec![Point2::new(0.0, 0.5), Point2::new(1.0, 0.5)]],
                color: None,
            }),
            ..GraphicsState::default()
        };
        let ids = emitter.emit_path(
            &mut doc,
            PrimitiveKind::Patch,
            &closed_square(10.0),
            &gc,
            Some(Rgb::new(1.0, 0.0, 0.0)),
        );
        assert!(ids.is_empty());
        assert_eq!(doc.entity_count(), 0);
    }

    #[test]
    fn hatched_patch_emits_outline_then_fragments() {
        let emitter = EntityEmitter::new(10.0);
        let mut doc = document();
        let gc = GraphicsState {
            hatch: Some(HatchSpec {
                cell: vec![
                    vec![Point2::new(0.0, 0.5), Point2::new(1.0, 0.5)],
                    vec![
                        Point2::new(0.25, 0.25),
                        Point2::new(0.75, 0.25),
                        Point2::new(0.75, 0.75),
                        Point2::new(0.25, 0.75),
                    ],
                ],
                color: Some(Rgb::new(0.0, 0.0, 1.0)),
            }),
            ..GraphicsState::default()
        };
        let ids = emitter.emit_path(&mut doc, PrimitiveKind::Patch, &closed_square(30.0), &gc, None);

        // 30x30 的父图形、10 单位图块：rows = cols = 2，共 25 个候选，内部 3x3 各产生线段与方块。
        let open = ids
            .iter()
            .filter(|id| matches!(doc.entity(**id), Some(Entity::Polyline(p)) if !p.is_closed))
            .count();
        let closed = ids
            .iter()
            .filter(|id| matches!(doc.entity(**id), Some(Entity::FilledRegion(_))))
            .count();
        assert_eq!(open, 9);
        assert_eq!(closed, 9);
        assert_eq!(ids.len(), 1 + 9 + 9);

        for id in &ids[1..] {
            let entity = doc.entity(*id).expect("fragment exists");
            assert_eq!(entity.color().get(), 5);
            if let Entity::FilledRegion(region) = entity {
                assert!(!region.is_associative());
            }
        }
    }

    #[test]
    fn clipped_hatched_patch_keeps_fragments_inside_clip() {
        let emitter = EntityEmitter::new(10.0);
        let mut doc = document();
        let clip = ClipRect::new(0.0, 0.0, 15.0, 30.0);
        let gc = GraphicsState {
            stroke: None,
            clip: Some(clip),
            hatch: Some(HatchSpec {
                cell: vec![
                    vec![Point2::new(0.0, 0.5), Point2::new(1.0, 0.5)],
                    vec![
                        Point2::new(0.25, 0.25),
                        Point2::new(0.75, 0.25),
                        Point2::new(0.75, 0.75),
                        Point2::new(0.25, 0.75),
                    ],
                ],
                color: None,
            }),
        };
        let ids = emitter.emit_path(&mut doc, PrimitiveKind::Patch, &closed_square(30.0), &gc, None);

        let inside = |point: &Point2| {
            (-1e-9..=15.0 + 1e-9).contains(&point.x()) && (-1e-9..=30.0 + 1e-9).contains(&point.y())
        };
        let mut open = 0;
        let mut areas = Vec::new();
        for id in &ids[1..] {
            match doc.entity(*id).expect("fragment exists") {
                Entity::Polyline(line) => {
                    assert!(!line.is_closed);
                    assert!(line.vertices.iter().all(inside), "{:?}", line.vertices);
                    open += 1;
                }
                Entity::FilledRegion(region) => {
                    let boundary = &region.loops[0].vertices;
                    assert!(boundary.iter().all(inside), "{boundary:?}");
                    areas.push(signed_area(boundary).abs());
                }
                other => panic!("unexpected entity {other:?}"),
            }
        }

        // 图块按未裁剪的 30x30 范围铺排：左列完整，中列被 x = 15 截半。
        assert_eq!(open, 6);
        areas.sort_by(f64::total_cmp);
        let expected = [12.5, 12.5, 12.5, 25.0, 25.0, 25.0];
        assert_eq!(areas.len(), expected.len());
        for (area, want) in areas.iter().zip(expected) {
            assert!((area - want).abs() < 1e-9, "areas = {areas:?}");
        }
    }

    #[test]
    fn line_split_by_clip_emits_one_polyline_per_run() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let gc = GraphicsState {
            stroke: Some(Rgb::new(0.0, 1.0, 0.0)),
            clip: Some(ClipRect::new(0.0, 0.0, 10.0, 10.0)),
            hatch: None,
        };
        let line = [
            Point2::new(2.0, 5.0),
            Point2::new(2.0, 15.0),
            Point2::new(8.0, 15.0),
            Point2::new(8.0, 5.0),
        ];
        let ids = emitter.emit_path(&mut doc, PrimitiveKind::Line, &line, &gc, None);
        assert_eq!(ids.len(), 2);
        assert!(ids
            .iter()
            .all(|id| doc.entity(*id).map(|e| e.color().get()) == Some(3)));
    }

    #[test]
    fn single_vertex_line_is_skipped() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let ids = emitter.emit_path(
            &mut doc,
            PrimitiveKind::Line,
            &[Point2::new(1.0, 1.0)],
            &GraphicsState::default(),
            None,
        );
        assert!(ids.is_empty());
    }

    #[test]
    fn markers_are_translated_to_each_point() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let marker = [Point2::new(0.0, 0.0), Point2::new(0.0, -3.5)];
        let points = [Point2::new(10.0, 20.0), Point2::new(30.0, 20.0)];
        let ids = emitter.emit_markers(&mut doc, &marker, &points, &GraphicsState::default());
        assert_eq!(ids.len(), 2);
        match doc.entity(ids[1]) {
            Some(Entity::Polyline(polyline)) => {
                assert!(!polyline.is_closed);
                assert_eq!(
                    polyline.vertices,
                    vec![Point2::new(30.0, 20.0), Point2::new(30.0, 16.5)]
                );
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn text_uses_transformed_anchor_and_device_height() {
        let emitter = EntityEmitter::new(144.0);
        let mut doc = document();
        let mut run = TextRun::new("\u{2212}1.5 µm", Point2::new(0.5, 0.25), 12.0);
        run.transform = DAffine2::from_scale_angle_translation(
            glam::DVec2::new(100.0, 100.0),
            0.0,
            glam::DVec2::new(10.0, 20.0),
        );
        run.rotation = 90.0;
        run.horizontal_align = "center".to_string();
        run.vertical_align = "top".to_string();

        let id = emitter
            .emit_text(&mut doc, &run, &GraphicsState::default())
            .expect("text emitted");
        match doc.entity(id) {
            Some(Entity::Text(text)) => {
                assert_eq!(text.content, "-1.5 m");
                assert!(text.insert.approx_eq(Point2::new(60.0, 45.0), 1e-9));
                assert!((text.height - 24.0).abs() < 1e-12);
                assert!((text.rotation - 90.0).abs() < 1e-12);
                assert_eq!(text.alignment, TextAlignment::TopCenter);
                assert_eq!(text.color, WHITE);
            }
            other => panic!("unexpected entity {other:?}"),
        }
    }

    #[test]
    fn unsupported_text_alignment_emits_nothing() {
        let emitter = EntityEmitter::new(72.0);
        let mut doc = document();
        let mut run = TextRun::new("x", Point2::new(0.0, 0.0), 10.0);
        run.vertical_align = "justify".to_string();
        let err = emitter
            .emit_text(&mut doc, &run, &GraphicsState::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedAlignment(_)));
        assert_eq!(doc.entity_count(), 0);
    }
}
