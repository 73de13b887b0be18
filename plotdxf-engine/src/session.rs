//! 绘图会话：维护画布、分组栈与正在构建的文档。

use plotdxf_core::document::{Document, DxfVersion, EntityId};
use plotdxf_core::geometry::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::emitter::{EntityEmitter, GraphicsState, PrimitiveKind, TextRun};
use crate::errors::RenderError;
use crate::palette::Rgb;

/// 画布尺寸（设备单位）、分辨率与目标 DXF 版本。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub dpi: f64,
    #[serde(default)]
    pub version: DxfVersion,
}

impl Canvas {
    pub fn new(width: f64, height: f64, dpi: f64) -> Self {
        Self {
            width,
            height,
            dpi,
            version: DxfVersion::default(),
        }
    }

    pub fn with_version(mut self, version: DxfVersion) -> Self {
        self.version = version;
        self
    }

    /// 会话复用的判定键：宽、高与分辨率。
    #[inline]
    fn same_key(&self, other: &Canvas) -> bool {
        self.width == other.width && self.height == other.height && self.dpi == other.dpi
    }

    fn build_document(&self) -> Document {
        Document::for_canvas(self.version, self.width, self.height)
    }
}

/// 单线程绘图会话。几何调用依据分组栈顶的标签分类，文字调用与分组无关。
#[derive(Debug)]
pub struct DrawingSession {
    canvas: Canvas,
    document: Document,
    groups: Vec<String>,
    emitter: EntityEmitter,
}

impl DrawingSession {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            document: canvas.build_document(),
            groups: Vec::new(),
            emitter: EntityEmitter::new(canvas.dpi),
            canvas,
        }
    }

    /// 指定实体写入的图层。
    pub fn with_layer(canvas: Canvas, layer: impl Into<String>) -> Self {
        let mut session = Self::new(canvas);
        session.emitter = session.emitter.with_layer(layer);
        session
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    #[inline]
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    #[inline]
    pub fn group_depth(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn current_group(&self) -> Option<&str> {
        self.groups.last().map(String::as_str)
    }

    #[inline]
    pub fn points_to_device(&self, points: f64) -> f64 {
        self.emitter.points_to_device(points)
    }

    pub fn open_group(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        trace!(tag = %tag, depth = self.groups.len() + 1, "进入分组");
        self.groups.push(tag);
    }

    /// 关闭栈顶分组；标签必须与栈顶一致。
    pub fn close_group(&mut self, tag: &str) -> Result<(), RenderError> {
        let top = self.groups.last().ok_or(RenderError::GroupUnderflow)?;
        if top != tag {
            return Err(RenderError::GroupMismatch {
                expected: top.clone(),
                found: tag.to_string(),
            });
        }
        self.groups.pop();
        trace!(tag, depth = self.groups.len(), "离开分组");
        Ok(())
    }

    pub fn draw_path(
        &mut self,
        vertices: &[Point2],
        gc: &GraphicsState,
        fill: Option<Rgb>,
    ) -> Result<Vec<EntityId>, RenderError> {
        let kind = PrimitiveKind::classify(self.top_group()?);
        Ok(self
            .emitter
            .emit_path(&mut self.document, kind, vertices, gc, fill))
    }

    /// 仅在刻度线（父分组含 `tick` 的 `line2d`）中绘制标记，其余情况忽略。
    pub fn draw_markers(
        &mut self,
        marker: &[Point2],
        points: &[Point2],
        gc: &GraphicsState,
    ) -> Result<Vec<EntityId>, RenderError> {
        let top = self.top_group()?;
        let is_tick_line = top == "line2d"
            && self
                .groups
                .len()
                .checked_sub(2)
                .is_some_and(|index| self.groups[index].contains("tick"));
        if !is_tick_line {
            trace!(group = top, points = points.len(), "非刻度标记，跳过");
            return Ok(Vec::new());
        }
        Ok(self
            .emitter
            .emit_markers(&mut self.document, marker, points, gc))
    }

    pub fn draw_text(&mut self, run: &TextRun, gc: &GraphicsState) -> Result<EntityId, RenderError> {
        self.emitter.emit_text(&mut self.document, run, gc)
    }

    /// 丢弃当前文档与分组栈，按画布重建空文档。
    pub fn clear(&mut self) {
        self.document = self.canvas.build_document();
        self.groups.clear();
        debug!(
            width = self.canvas.width,
            height = self.canvas.height,
            "会话已清空"
        );
    }

    /// 画布尺寸或分辨率变化时重建会话，否则仅清空；返回是否发生重建。
    pub fn ensure_canvas(&mut self, canvas: Canvas) -> bool {
        let rebuild = !self.canvas.same_key(&canvas);
        self.canvas = canvas;
        if rebuild {
            let layer = self.emitter.layer().to_string();
            self.emitter = EntityEmitter::new(canvas.dpi).with_layer(layer);
            debug!(
                width = canvas.width,
                height = canvas.height,
                dpi = canvas.dpi,
                "画布变化，重建会话"
            );
        }
        self.clear();
        rebuild
    }

    fn top_group(&self) -> Result<&str, RenderError> {
        self.current_group().ok_or(RenderError::NoOpenGroup)
    }
}
