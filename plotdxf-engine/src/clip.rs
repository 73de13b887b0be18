//! 几何裁剪：闭合多边形使用 Sutherland–Hodgman，开放折线逐段使用 Liang–Barsky。

use plotdxf_core::geometry::{ClipRect, Point2, signed_area};
use serde::{Deserialize, Serialize};

const TOLERANCE: f64 = 1e-9;

/// 裁剪语义：闭合多边形或开放折线。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipMode {
    Polygon,
    Polyline,
}

/// 按矩形裁剪顶点序列。
///
/// 折线模式只返回第一段连通结果；需要全部分段时使用 [`clip_polyline_runs`]。
/// 结果可能为空，调用方需自行判断顶点数是否足以生成实体。
pub fn clip(rect: &ClipRect, vertices: &[Point2], mode: ClipMode) -> Vec<Point2> {
    match mode {
        ClipMode::Polygon => clip_polygon_to_rect(rect, vertices),
        ClipMode::Polyline => clip_polyline_runs(rect, vertices)
            .into_iter()
            .next()
            .unwrap_or_default(),
    }
}

/// 闭合多边形对矩形裁剪，输入始终视为隐式闭合。
pub fn clip_polygon_to_rect(rect: &ClipRect, vertices: &[Point2]) -> Vec<Point2> {
    if rect.is_degenerate() {
        return Vec::new();
    }
    clip_polygon(vertices, &rect.corners())
}

/// Sutherland–Hodgman：用凸多边形 `clip_polygon` 裁剪 `subject`，两者方向任意。
pub fn clip_polygon(subject: &[Point2], clip_polygon: &[Point2]) -> Vec<Point2> {
    if subject.len() < 3 || clip_polygon.len() < 3 {
        return Vec::new();
    }
    let area = signed_area(clip_polygon);
    if area.abs() <= TOLERANCE {
        return Vec::new();
    }
    let orientation = area.signum();

    let mut output = subject.to_vec();
    for (index, &edge_start) in clip_polygon.iter().enumerate() {
        if output.is_empty() {
            break;
        }
        let edge_end = clip_polygon[(index + 1) % clip_polygon.len()];
        let side = |point: Point2| orientation * cross(edge_start, edge_end, point);

        let input = std::mem::take(&mut output);
        let mut previous = input[input.len() - 1];
        for &current in &input {
            let current_side = side(current);
            let previous_side = side(previous);
            if current_side >= 0.0 {
                if previous_side < 0.0 {
                    output.push(edge_crossing(previous, current, previous_side, current_side));
                }
                output.push(current);
            } else if previous_side >= 0.0 {
                output.push(edge_crossing(previous, current, previous_side, current_side));
            }
            previous = current;
        }
    }
    output
}

/// 两个简单多边形求交，返回面积非零的片段。
///
/// 任一方为凸多边形时以它作裁剪多边形，结果为单一片段；两者皆凹时把 `b`
/// 耳切为三角形，逐个裁剪 `a`，片段之间互不重叠。
pub fn intersect_polygons(a: &[Point2], b: &[Point2]) -> Vec<Vec<Point2>> {
    if a.len() < 3 || b.len() < 3 {
        return Vec::new();
    }
    let pieces = if is_convex(b) {
        vec![clip_polygon(a, b)]
    } else if is_convex(a) {
        vec![clip_polygon(b, a)]
    } else {
        triangulate(b)
            .iter()
            .map(|triangle| clip_polygon(a, triangle))
            .collect()
    };
    pieces
        .into_iter()
        .filter(|piece| piece.len() >= 3 && signed_area(piece).abs() > TOLERANCE)
        .collect()
}

/// 凸性判定：各顶点转向一致且总转角为一周（排除自交的星形）。共线顶点忽略。
pub fn is_convex(polygon: &[Point2]) -> bool {
    let mut points: Vec<Point2> = Vec::with_capacity(polygon.len());
    for &point in polygon {
        push_distinct(&mut points, point);
    }
    if points.len() > 1 && points[0].approx_eq(points[points.len() - 1], TOLERANCE) {
        points.pop();
    }
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0;
    let mut turning = 0.0;
    for index in 0..n {
        let previous = points[(index + n - 1) % n].as_vec2();
        let current = points[index].as_vec2();
        let next = points[(index + 1) % n].as_vec2();
        let incoming = current - previous;
        let outgoing = next - current;
        let turn = incoming.perp_dot(outgoing);
        if turn.abs() <= TOLERANCE {
            // 原路折返的尖刺不是凸的。
            if incoming.dot(outgoing) < 0.0 {
                return false;
            }
            continue;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
        turning += turn.atan2(incoming.dot(outgoing));
    }
    sign != 0.0 && (turning.abs() - std::f64::consts::TAU).abs() < 1e-6
}

/// 耳切法三角化简单多边形，三角形与输入同向。找不到耳朵时（退化输入）提前结束。
pub fn triangulate(polygon: &[Point2]) -> Vec<[Point2; 3]> {
    let orientation = signed_area(polygon).signum();
    if polygon.len() < 3 || orientation == 0.0 {
        return Vec::new();
    }

    let mut remaining: Vec<Point2> = polygon.to_vec();
    let mut triangles = Vec::with_capacity(polygon.len() - 2);
    while remaining.len() > 3 {
        let n = remaining.len();
        let ear = (0..n).find(|&i| {
            let (a, b, c) = (remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]);
            orientation * cross(a, b, c) > TOLERANCE
                && remaining
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i && *j != (i + n - 1) % n && *j != (i + 1) % n)
                    .all(|(_, &p)| !point_in_triangle(p, [a, b, c], orientation))
        });
        let Some(i) = ear else {
            break;
        };
        triangles.push([remaining[(i + n - 1) % n], remaining[i], remaining[(i + 1) % n]]);
        remaining.remove(i);
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    }
    triangles
}

/// 点位于三角形内部或边上；与三角形顶点重合的点不算。
fn point_in_triangle(point: Point2, [a, b, c]: [Point2; 3], orientation: f64) -> bool {
    if [a, b, c].iter().any(|corner| corner.approx_eq(point, TOLERANCE)) {
        return false;
    }
    orientation * cross(a, b, point) >= -TOLERANCE
        && orientation * cross(b, c, point) >= -TOLERANCE
        && orientation * cross(c, a, point) >= -TOLERANCE
}

/// 开放折线对矩形裁剪，返回所有连通分段（每段至少两个顶点）。
pub fn clip_polyline_runs(rect: &ClipRect, vertices: &[Point2]) -> Vec<Vec<Point2>> {
    if rect.is_degenerate() || vertices.len() < 2 {
        return Vec::new();
    }

    let mut runs = Vec::new();
    let mut current: Vec<Point2> = Vec::new();
    // 上一段是否在原始终点处仍位于矩形内，决定本段能否与之相连。
    let mut connected = false;

    for segment in vertices.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let Some(piece) = clip_segment_to_rect(rect, a, b) else {
            connected = false;
            continue;
        };
        if !(connected && piece.enters_at_start) {
            flush_run(&mut runs, &mut current);
            current.push(piece.start);
        }
        push_distinct(&mut current, piece.end);
        connected = piece.exits_at_end;
    }
    flush_run(&mut runs, &mut current);
    runs
}

/// 线段与任意闭合多边形（奇偶规则）求交，按线段方向返回位于内部的片段。
pub fn clip_segment_to_polygon(a: Point2, b: Point2, polygon: &[Point2]) -> Vec<Vec<Point2>> {
    if polygon.len() < 3 || a.approx_eq(b, TOLERANCE) {
        return Vec::new();
    }

    let mut params = vec![0.0, 1.0];
    for (index, &edge_start) in polygon.iter().enumerate() {
        let edge_end = polygon[(index + 1) % polygon.len()];
        if let Some(t) = segment_intersection(a, b, edge_start, edge_end) {
            params.push(t);
        }
    }
    params.sort_by(|x, y| x.total_cmp(y));
    params.dedup_by(|x, y| (*x - *y).abs() < TOLERANCE);

    let at = |t: f64| Point2::from_vec(a.as_vec2() + (b.as_vec2() - a.as_vec2()) * t);
    let mut pieces: Vec<Vec<Point2>> = Vec::new();
    let mut last_end: Option<f64> = None;
    for interval in params.windows(2) {
        let (t0, t1) = (interval[0], interval[1]);
        if !point_in_polygon(at((t0 + t1) * 0.5), polygon) {
            continue;
        }
        let start = if t0 <= 0.0 { a } else { at(t0) };
        let end = if t1 >= 1.0 { b } else { at(t1) };
        match (last_end, pieces.last_mut()) {
            // 相邻区间都在内部时合并为同一片段。
            (Some(previous), Some(piece)) if (previous - t0).abs() < TOLERANCE => {
                if let Some(tail) = piece.last_mut() {
                    *tail = end;
                }
            }
            _ => pieces.push(vec![start, end]),
        }
        last_end = Some(t1);
    }
    pieces
}

/// 射线法判断点是否位于多边形内部。
pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (vi, vj) = (polygon[i], polygon[j]);
        if (vi.y() > point.y()) != (vj.y() > point.y())
            && point.x() < (vj.x() - vi.x()) * (point.y() - vi.y()) / (vj.y() - vi.y()) + vi.x()
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

struct ClippedSegment {
    start: Point2,
    end: Point2,
    enters_at_start: bool,
    exits_at_end: bool,
}

fn clip_segment_to_rect(rect: &ClipRect, a: Point2, b: Point2) -> Option<ClippedSegment> {
    let (min, max) = (rect.min(), rect.max());
    let delta = b.as_vec2() - a.as_vec2();
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let constraints = [
        (-delta.x, a.x() - min.x()),
        (delta.x, max.x() - a.x()),
        (-delta.y, a.y() - min.y()),
        (delta.y, max.y() - a.y()),
    ];
    for (p, q) in constraints {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| Point2::from_vec(a.as_vec2() + delta * t);
    let enters_at_start = t0 <= 0.0;
    let exits_at_end = t1 >= 1.0;
    Some(ClippedSegment {
        start: if enters_at_start { a } else { at(t0) },
        end: if exits_at_end { b } else { at(t1) },
        enters_at_start,
        exits_at_end,
    })
}

fn flush_run(runs: &mut Vec<Vec<Point2>>, current: &mut Vec<Point2>) {
    let run = std::mem::take(current);
    if run.len() >= 2 {
        runs.push(run);
    }
}

fn push_distinct(run: &mut Vec<Point2>, point: Point2) {
    if run.last().is_none_or(|last| !last.approx_eq(point, TOLERANCE)) {
        run.push(point);
    }
}

#[inline]
fn cross(origin: Point2, a: Point2, b: Point2) -> f64 {
    let u = a.as_vec2() - origin.as_vec2();
    let v = b.as_vec2() - origin.as_vec2();
    u.perp_dot(v)
}

fn edge_crossing(previous: Point2, current: Point2, previous_side: f64, current_side: f64) -> Point2 {
    let t = previous_side / (previous_side - current_side);
    Point2::from_vec(previous.as_vec2() + (current.as_vec2() - previous.as_vec2()) * t)
}

/// 返回交点在线段 `a-b` 上的参数 t；两线段不相交或平行时返回 None。
fn segment_intersection(a: Point2, b: Point2, e0: Point2, e1: Point2) -> Option<f64> {
    let d = b.as_vec2() - a.as_vec2();
    let e = e1.as_vec2() - e0.as_vec2();
    let denom = d.perp_dot(e);
    if denom.abs() < TOLERANCE {
        return None;
    }
    let offset = e0.as_vec2() - a.as_vec2();
    let t = offset.perp_dot(e) / denom;
    let s = offset.perp_dot(d) / denom;
    let range = -TOLERANCE..=1.0 + TOLERANCE;
    if range.contains(&t) && range.contains(&s) {
        Some(t.clamp(0.0, 1.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]
    }

    fn same_loop(actual: &[Point2], expected: &[Point2]) -> bool {
        if actual.len() != expected.len() {
            return false;
        }
        (0..actual.len()).any(|shift| {
            expected
                .iter()
                .enumerate()
                .all(|(i, point)| actual[(i + shift) % actual.len()].approx_eq(*point, 1e-9))
        })
    }

    #[test]
    fn polygon_inside_rect_is_unchanged() {
        let rect = ClipRect::new(0.0, 0.0, 100.0, 100.0);
        let subject = square(10.0, 10.0, 20.0);
        let clipped = clip(&rect, &subject, ClipMode::Polygon);
        assert!(same_loop(&clipped, &subject), "got {clipped:?}");
    }

    #[test]
    fn polygon_outside_rect_is_dropped() {
        let rect = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let clipped = clip(&rect, &square(50.0, 50.0, 5.0), ClipMode::Polygon);
        assert!(clipped.len() < 3);
    }

    #[test]
    fn bisected_square_keeps_half_the_area() {
        let rect = ClipRect::new(0.0, -5.0, 5.0, 20.0);
        let subject = square(0.0, 0.0, 10.0);
        let clipped = clip(&rect, &subject, ClipMode::Polygon);
        let area = signed_area(&clipped).abs();
        assert!((area - 50.0).abs() < 1e-9, "area = {area}");
    }

    #[test]
    fn clockwise_clip_polygon_is_handled() {
        let mut clockwise = square(0.0, 0.0, 10.0);
        clockwise.reverse();
        let clipped = clip_polygon(&square(5.0, 5.0, 10.0), &clockwise);
        assert!((signed_area(&clipped).abs() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn zero_area_rect_yields_nothing() {
        let rect = ClipRect::new(0.0, 0.0, 0.0, 10.0);
        assert!(clip(&rect, &square(0.0, 0.0, 5.0), ClipMode::Polygon).is_empty());
        let line = [Point2::new(-1.0, 1.0), Point2::new(1.0, 1.0)];
        assert!(clip(&rect, &line, ClipMode::Polyline).is_empty());
    }

    #[test]
    fn polyline_inside_rect_is_unchanged() {
        let rect = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let line = vec![
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 5.0),
            Point2::new(3.0, 2.0),
            Point2::new(9.0, 9.0),
        ];
        assert_eq!(clip(&rect, &line, ClipMode::Polyline), line);
    }

    #[test]
    fn polyline_outside_rect_is_empty() {
        let rect = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let line = [Point2::new(20.0, 20.0), Point2::new(30.0, 25.0)];
        assert!(clip(&rect, &line, ClipMode::Polyline).is_empty());
    }

    #[test]
    fn polyline_crossing_one_edge_ends_on_the_edge() {
        let rect = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let line = [Point2::new(5.0, 5.0), Point2::new(15.0, 5.0)];
        let clipped = clip(&rect, &line, ClipMode::Polyline);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[0], Point2::new(5.0, 5.0));
        assert!(clipped[1].approx_eq(Point2::new(10.0, 5.0), 1e-12));
    }

    #[test]
    fn polyline_reentering_rect_splits_into_runs() {
        let rect = ClipRect::new(0.0, 0.0, 10.0, 10.0);
        let line = [
            Point2::new(2.0, 5.0),
            Point2::new(2.0, 15.0),
            Point2::new(8.0, 15.0),
            Point2::new(8.0, 5.0),
        ];
        let runs = clip_polyline_runs(&rect, &line);
        assert_eq!(runs.len(), 2);
        assert!(runs[0][1].approx_eq(Point2::new(2.0, 10.0), 1e-12));
        assert!(runs[1][0].approx_eq(Point2::new(8.0, 10.0), 1e-12));
        assert_eq!(clip(&rect, &line, ClipMode::Polyline), runs[0]);
    }

    #[test]
    fn segment_against_concave_polygon_returns_inside_pieces() {
        // U 形多边形：水平线穿过两条竖臂。
        let polygon = vec![
            Point2::new(0.0, 0.0),
            Point2::new(9.0, 0.0),
            Point2::new(9.0, 9.0),
            Point2::new(6.0, 9.0),
            Point2::new(6.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 9.0),
            Point2::new(0.0, 9.0),
        ];
        let pieces =
            clip_segment_to_polygon(Point2::new(-1.0, 6.0), Point2::new(10.0, 6.0), &polygon);
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0][0].approx_eq(Point2::new(0.0, 6.0), 1e-9));
        assert!(pieces[0][1].approx_eq(Point2::new(3.0, 6.0), 1e-9));
        assert!(pieces[1][0].approx_eq(Point2::new(6.0, 6.0), 1e-9));
        assert!(pieces[1][1].approx_eq(Point2::new(9.0, 6.0), 1e-9));

        let below = clip_segment_to_polygon(Point2::new(1.0, 1.0), Point2::new(8.0, 1.0), &polygon);
        assert_eq!(below, vec![vec![Point2::new(1.0, 1.0), Point2::new(8.0, 1.0)]]);
    }

    fn l_shape(x0: f64, y0: f64) -> Vec<Point2> {
        [(0.0, 0.0), (20.0, 0.0), (20.0, 10.0), (10.0, 10.0), (10.0, 20.0), (0.0, 20.0)]
            .iter()
            .map(|&(x, y)| Point2::new(x0 + x, y0 + y))
            .collect()
    }

    fn total_area(pieces: &[Vec<Point2>]) -> f64 {
        pieces.iter().map(|piece| signed_area(piece).abs()).sum()
    }

    #[test]
    fn convexity_rejects_notches_and_self_intersections() {
        assert!(is_convex(&square(0.0, 0.0, 10.0)));
        let mut clockwise = square(0.0, 0.0, 10.0);
        clockwise.reverse();
        assert!(is_convex(&clockwise));
        assert!(!is_convex(&l_shape(0.0, 0.0)));

        // 五角星按隔点连接：转向一致但绕行两周。
        let pentagram: Vec<Point2> = (0..5)
            .map(|k| {
                let angle = std::f64::consts::FRAC_PI_2 + f64::from(k * 2) * std::f64::consts::TAU / 5.0;
                Point2::new(angle.cos(), angle.sin())
            })
            .collect();
        assert!(!is_convex(&pentagram));
    }

    #[test]
    fn triangulation_preserves_area() {
        let polygon = l_shape(0.0, 0.0);
        let triangles = triangulate(&polygon);
        assert_eq!(triangles.len(), polygon.len() - 2);
        let area: f64 = triangles.iter().map(|t| signed_area(t).abs()).sum();
        assert!((area - 300.0).abs() < 1e-9, "area = {area}");
    }

    #[test]
    fn concave_subject_inside_convex_clip_is_kept_whole() {
        let notched = l_shape(5.0, 5.0);
        let pieces = intersect_polygons(&notched, &square(0.0, 0.0, 40.0));
        assert_eq!(pieces.len(), 1);
        assert!(same_loop(&pieces[0], &notched), "got {:?}", pieces[0]);
    }

    #[test]
    fn two_concave_polygons_intersect_exactly() {
        // [5,20]x[5,10] + [5,10]x[10,15] + [5,10]x[15,20] = 75 + 25 + 25
        let pieces = intersect_polygons(&l_shape(5.0, 5.0), &l_shape(0.0, 0.0));
        assert!(!pieces.is_empty());
        let area = total_area(&pieces);
        assert!((area - 125.0).abs() < 1e-9, "area = {area}");
        for piece in &pieces {
            for point in piece {
                assert!((5.0 - 1e-9..=20.0 + 1e-9).contains(&point.x()));
                assert!((5.0 - 1e-9..=20.0 + 1e-9).contains(&point.y()));
            }
        }
    }

    #[test]
    fn disjoint_polygons_have_no_intersection() {
        assert!(intersect_polygons(&l_shape(100.0, 100.0), &l_shape(0.0, 0.0)).is_empty());
        assert!(intersect_polygons(&square(100.0, 0.0, 5.0), &l_shape(0.0, 0.0)).is_empty());
    }
}
