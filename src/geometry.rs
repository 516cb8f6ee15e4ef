//! Thin wrappers over the `geo` kernel: line merging, validity repair and
//! winding normalization. Everything here is pure geometry; diagnostics
//! and failure policy stay with the conversion layer.

use geo::algorithm::orient::{Direction, Orient};
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon, Validation};

pub fn is_closed(line: &LineString<f64>) -> bool {
    line.0.len() > 1 && line.0.first() == line.0.last()
}

fn endpoint_key(coord: Coord<f64>) -> (u64, u64) {
    (coord.x.to_bits(), coord.y.to_bits())
}

/// Stitch line segments sharing endpoints into maximal connected runs,
/// reversing segments as needed. Segments with fewer than two coordinates
/// are dropped. Exact coordinate equality is the join criterion: member
/// ways of one relation share their boundary nodes bit for bit.
pub fn merge_lines(lines: Vec<LineString<f64>>) -> Vec<LineString<f64>> {
    let mut pending: Vec<Vec<Coord<f64>>> = lines
        .into_iter()
        .map(|line| line.0)
        .filter(|coords| coords.len() >= 2)
        .collect();
    let mut merged = Vec::new();

    while let Some(mut run) = pending.pop() {
        let mut grew = true;
        while grew {
            grew = false;
            let head = endpoint_key(run[0]);
            let tail = endpoint_key(run[run.len() - 1]);
            let mut joined = None;
            for (i, seg) in pending.iter().enumerate() {
                let first = endpoint_key(seg[0]);
                let last = endpoint_key(seg[seg.len() - 1]);
                if first == tail || last == tail || first == head || last == head {
                    joined = Some(i);
                    break;
                }
            }
            if let Some(i) = joined {
                let mut seg = pending.swap_remove(i);
                let first = endpoint_key(seg[0]);
                let last = endpoint_key(seg[seg.len() - 1]);
                let tail = endpoint_key(run[run.len() - 1]);
                let head = endpoint_key(run[0]);
                if first == tail {
                    run.extend_from_slice(&seg[1..]);
                } else if last == tail {
                    seg.reverse();
                    run.extend_from_slice(&seg[1..]);
                } else if last == head {
                    seg.pop();
                    seg.extend_from_slice(&run);
                    run = seg;
                } else {
                    seg.reverse();
                    seg.pop();
                    seg.extend_from_slice(&run);
                    run = seg;
                }
                grew = true;
            }
        }
        merged.push(LineString::new(run));
    }

    merged
}

/// Force a possibly self-intersecting polygon into valid form. The boolean
/// kernel renormalizes rings the way a zero-width buffer does; an input
/// that is already valid passes through untouched.
pub fn fix_polygon(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    fix_multipolygon(MultiPolygon::new(vec![polygon]))
}

/// Same repair pass for an assembled multipolygon.
pub fn fix_multipolygon(multipolygon: MultiPolygon<f64>) -> MultiPolygon<f64> {
    if multipolygon.is_valid() {
        multipolygon
    } else {
        multipolygon.union(&MultiPolygon::<f64>::new(vec![]))
    }
}

/// Merge a run of boundary segments into closed rings and union them into
/// one multipolygon. Returns `None` when no usable ring remains. Unclosed
/// runs are closed implicitly, as the ring constructor does.
pub fn lines_to_multipolygon(lines: Vec<LineString<f64>>) -> Option<MultiPolygon<f64>> {
    let mut result: Option<MultiPolygon<f64>> = None;
    for line in merge_lines(lines) {
        if line.0.len() < 3 {
            continue;
        }
        let ring = fix_polygon(Polygon::new(line, vec![]));
        result = Some(match result {
            Some(acc) => acc.union(&ring),
            None => ring,
        });
    }
    result
}

/// Normalize ring winding: exterior rings counter-clockwise, holes
/// clockwise, per the GeoJSON convention.
pub fn orient_multipolygon(multipolygon: MultiPolygon<f64>) -> MultiPolygon<f64> {
    multipolygon.orient(Direction::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn merge_joins_reversed_segments_into_one_ring() {
        let lines = vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 1.0, y: 1.0), (x: 1.0, y: 0.0)],
            line_string![(x: 1.0, y: 1.0), (x: 0.0, y: 1.0), (x: 0.0, y: 0.0)],
        ];
        let merged = merge_lines(lines);
        assert_eq!(merged.len(), 1);
        assert!(is_closed(&merged[0]));
        assert_eq!(merged[0].0.len(), 5);
    }

    #[test]
    fn merge_keeps_disconnected_segments_apart() {
        let lines = vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0)],
        ];
        assert_eq!(merge_lines(lines).len(), 2);
    }

    #[test]
    fn lines_to_multipolygon_builds_square() {
        let lines = vec![
            line_string![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0)],
            line_string![(x: 4.0, y: 4.0), (x: 0.0, y: 4.0), (x: 0.0, y: 0.0)],
        ];
        let multipolygon = lines_to_multipolygon(lines).unwrap();
        assert_eq!(multipolygon.0.len(), 1);
    }

    #[test]
    fn bowtie_ring_is_repaired() {
        // self-intersecting "bowtie": repair yields valid geometry
        let bowtie = Polygon::new(
            line_string![
                (x: 0.0, y: 0.0),
                (x: 2.0, y: 2.0),
                (x: 2.0, y: 0.0),
                (x: 0.0, y: 2.0),
                (x: 0.0, y: 0.0)
            ],
            vec![],
        );
        assert!(!bowtie.is_valid());
        let fixed = fix_polygon(bowtie);
        assert!(fixed.is_valid());
        assert!(!fixed.0.is_empty());
    }
}
