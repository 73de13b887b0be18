//! 填充图案铺排：把单位图元复制到覆盖父图形包围盒的行列网格上，并逐块裁剪到父边界。

use glam::{DAffine2, DVec2};
use plotdxf_core::geometry::{Bounds2D, Point2};
use serde::{Deserialize, Serialize};

use crate::clip::{clip_segment_to_polygon, intersect_polygons};
use crate::palette::Rgb;

/// 宿主提供的填充图案：单位图元（约定位于 0..1 方格内）与颜色。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatchSpec {
    pub cell: Vec<Vec<Point2>>,
    #[serde(default)]
    pub color: Option<Rgb>,
}

/// 裁剪后的图案片段。
#[derive(Debug, Clone, PartialEq)]
pub enum HatchFragment {
    /// 两点线段裁剪后的开放折线。
    Open(Vec<Point2>),
    /// 闭合多边形。
    Closed(Vec<Point2>),
}

/// 覆盖父图形所需的对称行列范围：行 `-rows..=rows`，列 `-cols..=cols`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub rows: i64,
    pub cols: i64,
}

impl TileGrid {
    pub fn covering(extent: &Bounds2D, cell_size: f64) -> Self {
        Self {
            rows: half_span(extent.height(), cell_size),
            cols: half_span(extent.width(), cell_size),
        }
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        ((2 * self.rows + 1) * (2 * self.cols + 1)) as usize
    }

    /// 按行优先顺序返回 `(row, col)`。
    pub fn cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (-self.rows..=self.rows)
            .flat_map(move |row| (-self.cols..=self.cols).map(move |col| (row, col)))
    }
}

fn half_span(dimension: f64, cell_size: f64) -> i64 {
    let cells = (dimension / cell_size).ceil() - 1.0;
    if cells.is_finite() && cells > 0.0 {
        cells as i64
    } else {
        0
    }
}

/// 将单位图元映射到父图形中心的变换：平移 (-0.5, -0.5)、缩放 `cell_size`、再平移到中心。
pub fn cell_transform(center: Point2, cell_size: f64) -> DAffine2 {
    DAffine2::from_translation(center.as_vec2())
        * DAffine2::from_scale(DVec2::splat(cell_size))
        * DAffine2::from_translation(DVec2::splat(-0.5))
}

/// 在 `parent_extent` 上铺排 `unit_cell`，并把每块裁剪到 `parent_boundary`。
///
/// 两点子路径视为线段，与父边界（按闭合多边形处理）求交；三点及以上视为闭合多边形，
/// 与父边界求真正的交集，凹图块或凹边界可能得到多个片段。空片段直接丢弃。
pub fn tile_hatch(
    parent_extent: &Bounds2D,
    cell_size: f64,
    unit_cell: &[Vec<Point2>],
    parent_boundary: &[Point2],
) -> Vec<HatchFragment> {
    if !(cell_size.is_finite() && cell_size > 0.0)
        || parent_extent.is_empty()
        || parent_boundary.len() < 3
    {
        return Vec::new();
    }

    let grid = TileGrid::covering(parent_extent, cell_size);
    let base = cell_transform(parent_extent.center(), cell_size);
    let mut fragments = Vec::new();

    for (row, col) in grid.cells() {
        let offset = DVec2::new(col as f64 * cell_size, row as f64 * cell_size);
        let transform = DAffine2::from_translation(offset) * base;
        for sub_path in unit_cell {
            let tile: Vec<Point2> = sub_path
                .iter()
                .map(|point| Point2::from_vec(transform.transform_point2(point.as_vec2())))
                .collect();
            match tile.len() {
                0 | 1 => {}
                2 => fragments.extend(
                    clip_segment_to_polygon(tile[0], tile[1], parent_boundary)
                        .into_iter()
                        .map(HatchFragment::Open),
                ),
                _ => fragments.extend(
                    intersect_polygons(&tile, parent_boundary)
                        .into_iter()
                        .map(HatchFragment::Closed),
                ),
            }
        }
    }
    fragments
}
