use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use plotdxf_core::document::DxfVersion;
use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "PLOTDXF_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置，并校验取值。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `PLOTDXF_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
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

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.canvas.dxf_version()?;
        for (field, value) in [
            ("canvas.dpi", self.canvas.dpi),
            ("canvas.width", self.canvas.width),
            ("canvas.height", self.canvas.height),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("必须为正数，实际为 {value}"),
                });
            }
        }
        if self.output.layer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "output.layer",
                message: "图层名不能为空".to_string(),
            });
        }
        Ok(())
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

/// 画布默认值；脚本可逐项覆盖。
#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "CanvasConfig::default_dpi")]
    pub dpi: f64,
    #[serde(default = "CanvasConfig::default_dxf_version")]
    pub dxf_version: String,
    #[serde(default = "CanvasConfig::default_width")]
    pub width: f64,
    #[serde(default = "CanvasConfig::default_height")]
    pub height: f64,
}

impl CanvasConfig {
    fn default_dpi() -> f64 {
        72.0
    }

    fn default_dxf_version() -> String {
        DxfVersion::default().tag().to_string()
    }

    fn default_width() -> f64 {
        640.0
    }

    fn default_height() -> f64 {
        480.0
    }

    pub fn dxf_version(&self) -> Result<DxfVersion, ConfigError> {
        self.dxf_version
            .parse()
            .map_err(|err: plotdxf_core::document::DocumentError| ConfigError::Invalid {
                field: "canvas.dxf_version",
                message: err.to_string(),
            })
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            dpi: Self::default_dpi(),
            dxf_version: Self::default_dxf_version(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "OutputConfig::default_layer")]
    pub layer: String,
}

impl OutputConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_layer() -> String {
        "0".to_string()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            layer: Self::default_layer(),
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
    #[error("配置项 {field} 无效: {message}")]
    Invalid { field: &'static str, message: String },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
