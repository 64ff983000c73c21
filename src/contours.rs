//! Marching squares at iso-level 0.5 over a binary field.
//!
//! Contour vertices sit on the midpoints of cell edges, so they are kept as
//! doubled integer coordinates while paths are assembled and only converted to
//! `(row, col)` floats at the end. Saddle cells keep diagonal `true` corners
//! apart. Contours that run into the raster edge stay open.

use std::collections::{HashMap, VecDeque};

/// Vertex in doubled coordinates: `(2 * row, 2 * col)`.
type Key = (i64, i64);

/// One traced isoline, in sub-pixel `(row, col)` coordinates.
///
/// Closed contours repeat their first point at the end.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<(f64, f64)>,
}

impl Contour {
    pub fn is_closed(&self) -> bool {
        self.points.len() > 2 && self.points.first() == self.points.last()
    }
}

/// Inclusive pixel bounding box `(row_min, row_max, col_min, col_max)`.
pub type BBox = (usize, usize, usize, usize);

/// Trace the 0.5 isolines of `inside` over the cells touching `bbox`.
///
/// `inside(row, col)` must be `false` everywhere outside `bbox`.
pub fn find_contours<F>(nrow: usize, ncol: usize, bbox: BBox, inside: F) -> Vec<Contour>
where
    F: Fn(usize, usize) -> bool,
{
    if nrow < 2 || ncol < 2 {
        return Vec::new();
    }
    let (r0, r1, c0, c1) = bbox;
    let rows = r0.saturating_sub(1)..=r1.min(nrow - 2);
    let cols = c0.saturating_sub(1)..=c1.min(ncol - 2);

    let mut segments: Vec<(Key, Key)> = Vec::new();
    for r in rows {
        for c in cols.clone() {
            let ul = inside(r, c);
            let ur = inside(r, c + 1);
            let ll = inside(r + 1, c);
            let lr = inside(r + 1, c + 1);
            let (ri, ci) = (2 * r as i64, 2 * c as i64);
            let top = (ri, ci + 1);
            let bottom = (ri + 2, ci + 1);
            let left = (ri + 1, ci);
            let right = (ri + 1, ci + 2);

            let mut crossed = Vec::with_capacity(4);
            if ul != ur {
                crossed.push(top);
            }
            if ur != lr {
                crossed.push(right);
            }
            if lr != ll {
                crossed.push(bottom);
            }
            if ll != ul {
                crossed.push(left);
            }
            match crossed.len() {
                2 => segments.push((crossed[0], crossed[1])),
                4 if ul => {
                    segments.push((top, left));
                    segments.push((bottom, right));
                }
                4 => {
                    segments.push((top, right));
                    segments.push((bottom, left));
                }
                _ => {}
            }
        }
    }
    assemble(&segments)
}

/// Trace the outline(s) of every `true` region of `mask`.
pub fn mask_contours(mask: &crate::raster::Raster<bool>) -> Vec<Contour> {
    let (nrow, ncol) = mask.shape();
    if mask.is_empty() {
        return Vec::new();
    }
    find_contours(nrow, ncol, (0, nrow - 1, 0, ncol - 1), |r, c| mask.get(r, c))
}

/// Chain segments sharing endpoints into polylines.
fn assemble(segments: &[(Key, Key)]) -> Vec<Contour> {
    let mut touching: HashMap<Key, Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        touching.entry(a).or_default().push(i);
        touching.entry(b).or_default().push(i);
    }
    let mut used = vec![false; segments.len()];

    let next_from = |at: Key, used: &mut Vec<bool>| -> Option<Key> {
        let idx = touching.get(&at)?.iter().copied().find(|&i| !used[i])?;
        used[idx] = true;
        let (a, b) = segments[idx];
        Some(if a == at { b } else { a })
    };

    let mut contours = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let (a, b) = segments[start];
        let mut path: VecDeque<Key> = VecDeque::from([a, b]);

        let mut closed = false;
        while let Some(&tail) = path.back() {
            match next_from(tail, &mut used) {
                Some(p) => {
                    path.push_back(p);
                    if Some(&p) == path.front() {
                        closed = true;
                        break;
                    }
                }
                None => break,
            }
        }
        if !closed {
            while let Some(&head) = path.front() {
                match next_from(head, &mut used) {
                    Some(p) => path.push_front(p),
                    None => break,
                }
            }
        }
        contours.push(Contour {
            points: path
                .into_iter()
                .map(|(r, c)| (r as f64 / 2.0, c as f64 / 2.0))
                .collect(),
        });
    }
    contours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;

    #[test]
    fn test_single_pixel_diamond() {
        let mut mask = Raster::new(3, 3, false);
        mask.set(1, 1, true);
        let contours = mask_contours(&mask);
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(c.is_closed());
        assert_eq!(c.points.len(), 5);
        for p in [(0.5, 1.0), (1.0, 0.5), (1.5, 1.0), (1.0, 1.5)] {
            assert!(c.points.contains(&p));
        }
    }

    #[test]
    fn test_square_closed_contour() {
        let mask = Raster::from_fn(8, 8, |r, c| (2..6).contains(&r) && (2..6).contains(&c));
        let contours = mask_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].is_closed());
        // 4 sides of 4 edges each, plus the repeated start
        assert_eq!(contours[0].points.len(), 17);
    }

    #[test]
    fn test_edge_touching_region_is_open() {
        let mask = Raster::from_fn(6, 6, |_, c| c < 2);
        let contours = mask_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert!(!contours[0].is_closed());
        assert!(contours[0].points.iter().all(|&(_, c)| c == 1.5));
    }

    #[test]
    fn test_diagonal_pixels_stay_separate() {
        let mask = Raster::from_fn(4, 4, |r, c| (r, c) == (1, 1) || (r, c) == (2, 2));
        let contours = mask_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|c| c.is_closed()));
    }

    #[test]
    fn test_bbox_restricts_search() {
        let mask = Raster::from_fn(20, 20, |r, c| (3..6).contains(&r) && (4..8).contains(&c));
        let full = mask_contours(&mask);
        let local = find_contours(20, 20, (3, 5, 4, 7), |r, c| mask.get(r, c));
        assert_eq!(full.len(), local.len());
        assert_eq!(full[0].points.len(), local[0].points.len());
    }
}
