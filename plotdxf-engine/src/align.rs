//! 宿主文字对齐标记到 DXF TEXT 对齐方式的映射。

use plotdxf_core::document::TextAlignment;

use crate::errors::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignAxis {
    Horizontal,
    Vertical,
}

/// 单轴映射。`baseline` 映射为空标记；垂直方向上的 `CENTER` 统一为 `MIDDLE`。
pub fn map_align(value: &str, axis: AlignAxis) -> Result<&'static str, RenderError> {
    let token = match value {
        "right" => "RIGHT",
        "center" => "CENTER",
        "left" => "LEFT",
        "top" => "TOP",
        "bottom" => "BOTTOM",
        "middle" => "MIDDLE",
        "baseline" => "",
        "center_baseline" => "MIDDLE",
        other => return Err(RenderError::UnsupportedAlignment(other.to_string())),
    };
    if axis == AlignAxis::Vertical && token == "CENTER" {
        return Ok("MIDDLE");
    }
    Ok(token)
}

/// 组合标记：垂直标记非空时以 `_` 连接水平标记。
pub fn combine_alignment(vertical: &str, horizontal: &str) -> String {
    if vertical.is_empty() {
        horizontal.to_string()
    } else {
        format!("{vertical}_{horizontal}")
    }
}

/// 将宿主的水平/垂直对齐解析为 DXF 对齐方式，不支持的组合直接报错。
pub fn resolve_alignment(horizontal: &str, vertical: &str) -> Result<TextAlignment, RenderError> {
    let h = map_align(horizontal, AlignAxis::Horizontal)?;
    let v = map_align(vertical, AlignAxis::Vertical)?;
    let token = combine_alignment(v, h);
    token
        .parse()
        .map_err(|_| RenderError::UnsupportedAlignment(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_axis_tokens() {
        assert_eq!(map_align("center_baseline", AlignAxis::Vertical).unwrap(), "MIDDLE");
        assert_eq!(map_align("baseline", AlignAxis::Horizontal).unwrap(), "");
        assert_eq!(map_align("center", AlignAxis::Horizontal).unwrap(), "CENTER");
        assert_eq!(map_align("center", AlignAxis::Vertical).unwrap(), "MIDDLE");
        assert_eq!(map_align("left", AlignAxis::Vertical).unwrap(), "LEFT");
    }

    #[test]
    fn unknown_alignment_fails_fast() {
        let err = map_align("justify", AlignAxis::Horizontal).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedAlignment(value) if value == "justify"));
        assert!(map_align("Center", AlignAxis::Vertical).is_err());
    }

    #[test]
    fn combined_tokens() {
        assert_eq!(combine_alignment("TOP", "CENTER"), "TOP_CENTER");
        assert_eq!(combine_alignment("", "LEFT"), "LEFT");
        assert_eq!(resolve_alignment("center", "top").unwrap(), TextAlignment::TopCenter);
        assert_eq!(resolve_alignment("left", "baseline").unwrap(), TextAlignment::Left);
        assert_eq!(
            resolve_alignment("right", "center").unwrap(),
            TextAlignment::MiddleRight
        );
        assert_eq!(
            resolve_alignment("center", "center_baseline").unwrap(),
            TextAlignment::MiddleCenter
        );
    }

    #[test]
    fn combinations_without_dxf_equivalent_are_rejected() {
        let err = resolve_alignment("top", "bottom").unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedAlignment(token) if token == "BOTTOM_TOP"));
    }
}
