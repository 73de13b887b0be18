use std::fs;
use std::path::{Path, PathBuf};

use plotdxf_config::{AppConfig, ConfigError};
use plotdxf_core::document::Entity;
use plotdxf_engine::DrawingSession;
use plotdxf_io::{DocumentSaver, DxfFacade};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use crate::errors::AppError;
use crate::script::DrawScript;

mod errors;
mod script;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut config_override: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--input" | "--output" | "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("`{arg}` 需要提供文件路径");
                    std::process::exit(1);
                };
                let slot = match arg.as_str() {
                    "--input" => &mut input,
                    "--output" => &mut output,
                    _ => &mut config_override,
                };
                *slot = Some(PathBuf::from(value));
            }
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let Some(input) = input else {
        eprintln!("用法: plotdxf --input <script.json> [--output <file.dxf>] [--config <file.toml>]");
        std::process::exit(1);
    };

    let config = load_configuration(config_override);
    init_logging(&config);
    info!(input = %input.display(), "启动 plotdxf");

    match run(&config, &input, output) {
        Ok(path) => info!(path = %path.display(), "DXF 已写出"),
        Err(err) => {
            error!(error = %err, "生成 DXF 失败");
            std::process::exit(1);
        }
    }
}

/// 读取脚本、回放到会话并保存文档，返回输出路径。
fn run(config: &AppConfig, input: &Path, output: Option<PathBuf>) -> Result<PathBuf, AppError> {
    let script = DrawScript::from_file(input)?;
    let canvas = script.resolve_canvas(&config.canvas)?;
    let mut session = DrawingSession::with_layer(canvas, config.output.layer.as_str());
    let summary = script.replay(&mut session)?;
    info!(
        commands = summary.commands,
        emitted = summary.emitted,
        rebuilds = summary.rebuilds,
        "脚本回放完成"
    );

    let path = output.unwrap_or_else(|| default_output_path(&config.output.directory, input));
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| AppError::OutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let document = session.into_document();
    let (mut polylines, mut regions, mut texts) = (0usize, 0usize, 0usize);
    for (_, entity) in document.entities() {
        match entity {
            Entity::Polyline(_) => polylines += 1,
            Entity::FilledRegion(_) => regions += 1,
            Entity::Text(_) => texts += 1,
        }
    }
    info!(
        entity_count = document.entity_count(),
        polylines,
        regions,
        texts,
        version = %document.version(),
        "文档统计"
    );

    DxfFacade::new().save(&document, &path)?;
    Ok(path)
}

/// `<输出目录>/<脚本文件名>.dxf`。
fn default_output_path(directory: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "figure".to_string());
    directory.join(format!("{stem}.dxf"))
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Invalid { field, .. } => {
                        warn!(field, error = %err, "配置取值无效，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "canvas": { "width": 200.0, "height": 100.0 },
        "commands": [
            { "op": "open_group", "tag": "line2d" },
            { "op": "path", "vertices": [[0.0, 0.0], [50.0, 50.0], [100.0, 0.0]] },
            { "op": "close_group", "tag": "line2d" }
        ]
    }"#;

    #[test]
    fn default_output_uses_script_stem() {
        let path = default_output_path(Path::new("out"), Path::new("plots/figure1.json"));
        assert_eq!(path, PathBuf::from("out/figure1.dxf"));
    }

    #[test]
    fn run_writes_dxf_into_output_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("chart.json");
        fs::write(&input, SCRIPT).expect("write script");

        let mut config = AppConfig::default();
        config.output.directory = dir.path().join("dxf");
        config.output.layer = "plot".to_string();

        let path = run(&config, &input, None).expect("run succeeds");
        assert_eq!(path, dir.path().join("dxf").join("chart.dxf"));

        let text = fs::read_to_string(&path).expect("read dxf");
        assert!(text.contains("LWPOLYLINE"));
        assert!(text.lines().any(|line| line == "plot"));
        assert!(text.lines().any(|line| line == "200.000000"));
    }

    #[test]
    fn run_fails_on_missing_script() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = run(&AppConfig::default(), &dir.path().join("absent.json"), None).unwrap_err();
        assert!(matches!(
            err,
            AppError::Script(script::ScriptError::Io { .. })
        ));
    }
}
