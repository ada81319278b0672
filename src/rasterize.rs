use ndarray::Array2;

use crate::enums::{ContourGeometry, HoleRule};
use crate::geometry::nearly_equal;

/// Slack when relating continuous coordinates to pixel centers.
const COORD_EPS: f64 = 1e-6;

/// One contour projected onto its slice, in continuous voxel coordinates.
#[derive(Debug, Clone)]
pub struct SliceContour {
    pub points: Vec<(f64, f64)>,
    pub geometry: ContourGeometry,
    pub is_hole: bool,
}

impl SliceContour {
    pub fn new(points: Vec<(f64, f64)>, geometry: ContourGeometry, is_hole: bool) -> Self {
        Self {
            points,
            geometry,
            is_hole,
        }
    }
}

/// Rasterizes a single polygon onto a `(rows, cols)` grid, even-odd rule.
///
/// Pixel centers sit at integer coordinates. A center is set when it lies
/// inside the polygon by even-odd parity, or exactly on an edge; the fill
/// is boundary inclusive. The polygon is closed implicitly with a
/// last-to-first edge. Fewer than three points set nothing; the output is
/// exact 0/1 with no anti-aliasing.
pub fn fill_polygon(points: &[(f64, f64)], shape: (usize, usize)) -> Array2<u8> {
    let mut grid = Array2::zeros(shape);
    fill_polygon_into(points, &mut grid, 1);
    grid
}

/// Scanline fill writing `value` into an existing grid.
///
/// Per pixel row, X crossings are collected over all edges with a
/// half-open `[y_min, y_max)` rule so shared vertices count once, sorted,
/// and paired for even-odd spans. A second pass writes centers lying
/// exactly on an edge, which covers rows coinciding with horizontal edges
/// that the half-open rule leaves out.
pub(crate) fn fill_polygon_into(points: &[(f64, f64)], grid: &mut Array2<u8>, value: u8) {
    let (rows, cols) = grid.dim();
    if points.len() < 3 || rows == 0 || cols == 0 {
        return;
    }
    if points.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
        return;
    }

    let (y_lo, y_hi) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });
    let y_first = y_lo.ceil().max(0.0) as i64;
    let y_last = y_hi.floor().min(rows as f64 - 1.0) as i64;

    let mut crossings: Vec<f64> = Vec::new();
    for y in y_first..=y_last {
        let scan_y = y as f64;
        crossings.clear();

        let mut prev = points[points.len() - 1];
        for &point in points {
            let (x0, y0) = prev;
            let (x1, y1) = point;
            prev = point;
            if y0 == y1 {
                continue;
            }
            let (y_min, y_max) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
            if scan_y >= y_min && scan_y < y_max {
                let t = (scan_y - y0) / (y1 - y0);
                crossings.push(x0 + t * (x1 - x0));
            }
        }

        crossings.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        for pair in crossings.chunks_exact(2) {
            let x_start = (pair[0] - COORD_EPS).ceil().max(0.0) as i64;
            let x_end = (pair[1] + COORD_EPS).floor().min(cols as f64 - 1.0) as i64;
            for x in x_start..=x_end {
                grid[[y as usize, x as usize]] = value;
            }
        }
    }

    let mut prev = points[points.len() - 1];
    for &point in points {
        mark_centers_on_edge(prev, point, grid, value);
        prev = point;
    }
}

/// Writes every pixel whose center lies on the segment, within tolerance.
fn mark_centers_on_edge(from: (f64, f64), to: (f64, f64), grid: &mut Array2<u8>, value: u8) {
    let (rows, cols) = grid.dim();
    let (x0, y0) = from;
    let (x1, y1) = to;

    if (y1 - y0).abs() <= COORD_EPS {
        // Horizontal edge: centers exist only when it sits on a lattice row.
        let row = y0.round();
        if (row - y0).abs() > COORD_EPS || row < 0.0 || row > rows as f64 - 1.0 {
            return;
        }
        let (x_lo, x_hi) = if x0 < x1 { (x0, x1) } else { (x1, x0) };
        let x_start = (x_lo - COORD_EPS).ceil().max(0.0) as i64;
        let x_end = (x_hi + COORD_EPS).floor().min(cols as f64 - 1.0) as i64;
        for x in x_start..=x_end {
            grid[[row as usize, x as usize]] = value;
        }
        return;
    }

    let (y_lo, y_hi) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
    let y_start = (y_lo - COORD_EPS).ceil().max(0.0) as i64;
    let y_end = (y_hi + COORD_EPS).floor().min(rows as f64 - 1.0) as i64;
    for y in y_start..=y_end {
        let t = (y as f64 - y0) / (y1 - y0);
        let x = x0 + t * (x1 - x0);
        let column = x.round();
        if (column - x).abs() <= COORD_EPS && column >= 0.0 && column <= cols as f64 - 1.0 {
            grid[[y as usize, column as usize]] = value;
        }
    }
}

/// Composes the contours of one slice into a binary slice mask.
///
/// With [`HoleRule::UnionThenSubtract`] all positive contours are painted
/// first and all hole contours cleared afterwards, making the result
/// independent of sequence order; [`HoleRule::SequenceOrder`] paints and
/// clears in encounter order. Clearing uses the same rasterization as
/// painting, so a hole removes exactly the pixels its fill would set.
///
/// When `fill_holes` is set and the composed mask is non-empty, enclosed
/// background is turned on as a final step. Because that runs after hole
/// subtraction, a hole contour lying strictly inside positive area is
/// filled back in; callers wanting such holes preserved must not combine
/// them with `fill_holes`.
pub fn compose_slice(
    contours: &[SliceContour],
    shape: (usize, usize),
    rule: HoleRule,
    fill_holes: bool,
) -> Array2<u8> {
    let mut slice = Array2::zeros(shape);
    match rule {
        HoleRule::UnionThenSubtract => {
            for contour in contours.iter().filter(|c| !c.is_hole) {
                paint(contour, &mut slice, 1);
            }
            for contour in contours.iter().filter(|c| c.is_hole) {
                paint(contour, &mut slice, 0);
            }
        }
        HoleRule::SequenceOrder => {
            for contour in contours {
                paint(contour, &mut slice, if contour.is_hole { 0 } else { 1 });
            }
        }
    }
    if fill_holes && slice.iter().any(|&v| v != 0) {
        fill_enclosed_background(&mut slice);
    }
    slice
}

fn paint(contour: &SliceContour, slice: &mut Array2<u8>, value: u8) {
    let points = &contour.points;
    if points.len() >= 3
        && contour.geometry == ContourGeometry::ClosedPlanar
        && !xy_closed(points)
    {
        let mut closed = points.clone();
        closed.push(closed[0]);
        fill_polygon_into(&closed, slice, value);
    } else {
        fill_polygon_into(points, slice, value);
    }
}

fn xy_closed(points: &[(f64, f64)]) -> bool {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) => {
            nearly_equal(first.0, last.0) && nearly_equal(first.1, last.1)
        }
        _ => false,
    }
}

/// Turns on background pixels with no 4-connected path to the grid border.
///
/// This is the hole-filling step of slice composition: flood the
/// background from every border pixel, then promote whatever background
/// was not reached.
pub fn fill_enclosed_background(slice: &mut Array2<u8>) {
    let (rows, cols) = slice.dim();
    if rows == 0 || cols == 0 {
        return;
    }

    let mut reached = Array2::<u8>::zeros((rows, cols));
    let mut stack: Vec<(usize, usize)> = Vec::with_capacity(rows * cols / 10 + 64);

    for y in 0..rows {
        for x in [0, cols - 1] {
            visit(slice, &mut reached, &mut stack, y, x);
        }
    }
    for x in 0..cols {
        for y in [0, rows - 1] {
            visit(slice, &mut reached, &mut stack, y, x);
        }
    }

    while let Some((y, x)) = stack.pop() {
        if y > 0 {
            visit(slice, &mut reached, &mut stack, y - 1, x);
        }
        if y + 1 < rows {
            visit(slice, &mut reached, &mut stack, y + 1, x);
        }
        if x > 0 {
            visit(slice, &mut reached, &mut stack, y, x - 1);
        }
        if x + 1 < cols {
            visit(slice, &mut reached, &mut stack, y, x + 1);
        }
    }

    for (pixel, seen) in slice.iter_mut().zip(reached.iter()) {
        if *pixel == 0 && *seen == 0 {
            *pixel = 1;
        }
    }
}

fn visit(
    slice: &Array2<u8>,
    reached: &mut Array2<u8>,
    stack: &mut Vec<(usize, usize)>,
    y: usize,
    x: usize,
) {
    if slice[[y, x]] == 0 && reached[[y, x]] == 0 {
        reached[[y, x]] = 1;
        stack.push((y, x));
    }
}
