//! JSON 绘图脚本：画布覆盖项与按顺序回放的绘图命令。

use std::fs;
use std::path::{Path, PathBuf};

use plotdxf_config::CanvasConfig;
use plotdxf_core::document::DxfVersion;
use plotdxf_core::geometry::Point2;
use plotdxf_engine::palette::Rgb;
use plotdxf_engine::{Canvas, DrawingSession, GraphicsState, RenderError, TextRun};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("读取脚本 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析脚本 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("脚本画布版本无效: {0}")]
    Version(String),
    #[error("第 {index} 条命令执行失败: {source}")]
    Command {
        index: usize,
        #[source]
        source: RenderError,
    },
}

/// 脚本中可选的画布覆盖项，缺省时沿用配置。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CanvasOverrides {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub dpi: Option<f64>,
    pub dxf_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    OpenGroup {
        tag: String,
    },
    CloseGroup {
        tag: String,
    },
    Path {
        vertices: Vec<Point2>,
        #[serde(default)]
        gc: GraphicsState,
        #[serde(default)]
        fill: Option<Rgb>,
    },
    Markers {
        marker: Vec<Point2>,
        points: Vec<Point2>,
        #[serde(default)]
        gc: GraphicsState,
    },
    Text {
        run: TextRun,
        #[serde(default)]
        gc: GraphicsState,
    },
    /// 切换画布；尺寸或分辨率变化时重建会话，否则清空。
    Canvas {
        width: f64,
        height: f64,
        dpi: f64,
    },
    Clear,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawScript {
    #[serde(default)]
    pub canvas: CanvasOverrides,
    #[serde(default)]
    pub commands: Vec<DrawCommand>,
}

/// 回放统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub commands: usize,
    pub emitted: usize,
    pub rebuilds: usize,
}

impl DrawScript {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ScriptError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 以配置为基础合并脚本覆盖项。
    pub fn resolve_canvas(&self, defaults: &CanvasConfig) -> Result<Canvas, ScriptError> {
        let version = match &self.canvas.dxf_version {
            Some(tag) => tag
                .parse::<DxfVersion>()
                .map_err(|err| ScriptError::Version(err.to_string()))?,
            None => defaults
                .dxf_version()
                .map_err(|err| ScriptError::Version(err.to_string()))?,
        };
        Ok(Canvas::new(
            self.canvas.width.unwrap_or(defaults.width),
            self.canvas.height.unwrap_or(defaults.height),
            self.canvas.dpi.unwrap_or(defaults.dpi),
        )
        .with_version(version))
    }

    /// 依次回放命令；遇到第一条失败的命令即停止。
    pub fn replay(&self, session: &mut DrawingSession) -> Result<ReplaySummary, ScriptError> {
        let mut summary = ReplaySummary::default();
        for (index, command) in self.commands.iter().enumerate() {
            let emitted = apply(session, command)
                .map_err(|source| ScriptError::Command { index, source })?;
            summary.commands += 1;
            match emitted {
                Applied::Entities(count) => summary.emitted += count,
                Applied::Rebuilt => summary.rebuilds += 1,
                Applied::Nothing => {}
            }
        }
        debug!(
            commands = summary.commands,
            emitted = summary.emitted,
            "脚本回放完成"
        );
        Ok(summary)
    }
}

enum Applied {
    Entities(usize),
    Rebuilt,
    Nothing,
}

fn apply(session: &mut DrawingSession, command: &DrawCommand) -> Result<Applied, RenderError> {
    let applied = match command {
        DrawCommand::OpenGroup { tag } => {
            session.open_group(tag.as_str());
            Applied::Nothing
        }
        DrawCommand::CloseGroup { tag } => {
            session.close_group(tag)?;
            Applied::Nothing
        }
        DrawCommand::Path { vertices, gc, fill } => {
            Applied::Entities(session.draw_path(vertices, gc, *fill)?.len())
        }
        DrawCommand::Markers { marker, points, gc } => {
            Applied::Entities(session.draw_markers(marker, points, gc)?.len())
        }
        DrawCommand::Text { run, gc } => {
            session.draw_text(run, gc)?;
            Applied::Entities(1)
        }
        DrawCommand::Canvas { width, height, dpi } => {
            let canvas = Canvas::new(*width, *height, *dpi).with_version(session.canvas().version);
            if session.ensure_canvas(canvas) {
                Applied::Rebuilt
            } else {
                Applied::Nothing
            }
        }
        DrawCommand::Clear => {
            session.clear();
            Applied::Nothing
        }
    };
    Ok(applied)
}
