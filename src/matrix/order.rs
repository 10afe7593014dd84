use ndarray::{Array1, Array2, Axis};

/// Proposes a column order that places similar columns next to each other.
///
/// The returned vector lists current column positions in their new order and
/// must be a permutation of `0..grid.ncols()`.
pub trait ColumnReorderer {
    fn reorder(&self, grid: &Array2<f64>) -> Vec<usize>;
}

/// Sorts columns by their projection onto the first principal axis of the
/// column cloud, found by power iteration.
#[derive(Clone, Copy, Debug)]
pub struct PrincipalComponentOrder {
    pub iterations: usize,
}

impl Default for PrincipalComponentOrder {
    fn default() -> Self {
        Self { iterations: 64 }
    }
}

impl ColumnReorderer for PrincipalComponentOrder {
    fn reorder(&self, grid: &Array2<f64>) -> Vec<usize> {
        let identity: Vec<usize> = (0..grid.ncols()).collect();
        if grid.nrows() == 0 || grid.ncols() < 2 {
            return identity;
        }

        // Sentinel cells carry no signal.
        let values = grid.mapv(|value| value.max(0.0));
        let Some(mean) = values.mean_axis(Axis(1)) else {
            return identity;
        };
        let centered = &values - &mean.insert_axis(Axis(1));

        let mut axis = Array1::from_iter((0..grid.nrows()).map(|index| 1.0 + index as f64));
        normalize(&mut axis);
        for _ in 0..self.iterations {
            let mut next = centered.dot(&centered.t().dot(&axis));
            if !normalize(&mut next) {
                return identity;
            }
            axis = next;
        }

        let projection = centered.t().dot(&axis);
        let mut order = identity;
        order.sort_by(|&a, &b| projection[a].total_cmp(&projection[b]));
        order
    }
}

fn normalize(vector: &mut Array1<f64>) -> bool {
    let norm = vector.iter().map(|value| value * value).sum::<f64>().sqrt();
    if !norm.is_finite() || norm <= f64::EPSILON {
        return false;
    }
    vector.mapv_inplace(|value| value / norm);
    true
}

/// True when `order` is a permutation of `0..len`.
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}
