use nalgebra::{DMatrix, Point2};

/// Pairwise Euclidean distances, rows = tracked objects, columns = detections.
pub fn distance_matrix(objects: &[Point2<f32>], detections: &[Point2<f32>]) -> DMatrix<f32> {
    DMatrix::from_fn(objects.len(), detections.len(), |i, j| {
        nalgebra::distance(&objects[i], &detections[j])
    })
}

/// Result of one association pass, indices into the rows and columns of the cost matrix.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Assignment {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_objects: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl Assignment {
    fn from_matches(matches: Vec<(usize, usize)>, rows: usize, cols: usize) -> Self {
        let mut row_used = vec![false; rows];
        let mut col_used = vec![false; cols];
        for &(r, c) in &matches {
            row_used[r] = true;
            col_used[c] = true;
        }
        Assignment {
            matches,
            unmatched_objects: (0..rows).filter(|&r| !row_used[r]).collect(),
            unmatched_detections: (0..cols).filter(|&c| !col_used[c]).collect(),
        }
    }
}

/// Association policy between existing objects and new detections.
pub trait Matcher: Send {
    fn assign(&self, distances: &DMatrix<f32>) -> Assignment;
}

/// Repeatedly binds the globally closest remaining (object, detection) pair.
/// No distance cap: every object gets some detection while detections remain.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyMatcher;

impl Matcher for GreedyMatcher {
    fn assign(&self, distances: &DMatrix<f32>) -> Assignment {
        Assignment::from_matches(greedy(distances, f32::INFINITY), distances.nrows(), distances.ncols())
    }
}

/// Greedy matching that refuses pairs farther apart than `max_distance`.
#[derive(Debug, Clone, Copy)]
pub struct CappedGreedyMatcher {
    pub max_distance: f32,
}

impl CappedGreedyMatcher {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }
}

impl Matcher for CappedGreedyMatcher {
    fn assign(&self, distances: &DMatrix<f32>) -> Assignment {
        Assignment::from_matches(
            greedy(distances, self.max_distance),
            distances.nrows(),
            distances.ncols(),
        )
    }
}

fn greedy(distances: &DMatrix<f32>, max_distance: f32) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize)> = (0..distances.nrows())
        .flat_map(|r| (0..distances.ncols()).map(move |c| (r, c)))
        .filter(|&(r, c)| distances[(r, c)] <= max_distance)
        .collect();
    // stable sort keeps row-major order among ties
    pairs.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

    let mut row_used = vec![false; distances.nrows()];
    let mut col_used = vec![false; distances.ncols()];
    let mut matches = Vec::new();
    for (r, c) in pairs {
        if row_used[r] || col_used[c] {
            continue;
        }
        row_used[r] = true;
        col_used[c] = true;
        matches.push((r, c));
    }
    matches
}
