//! KD-tree over K-Means centroids for nearest-centroid assignment.
//!
//! Built on the host once per Lloyd iteration and stored as flat vectors
//! indexed by node id. A query returns the exact nearest centroid with ties
//! broken toward the lower centroid index, matching a brute-force `argmin`.

/// Host KD-tree over `k` points of dimension `d`.
#[derive(Debug, Clone)]
pub struct CentroidTree<'a> {
    points: &'a [f64],
    dim: usize,
    /// Split dimension per node, -1 for leaves.
    split_dims: Vec<i64>,
    split_values: Vec<f64>,
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    leaf_starts: Vec<usize>,
    leaf_sizes: Vec<usize>,
    /// Leaf node id -> position in `leaf_starts`.
    leaf_slots: Vec<usize>,
    point_indices: Vec<usize>,
}

const LEAF_SIZE: usize = 4;

impl<'a> CentroidTree<'a> {
    /// Build from row-major points [k, d]. `points` must be non-empty.
    pub fn build(points: &'a [f64], dim: usize) -> Self {
        let k = if dim == 0 { 0 } else { points.len() / dim };
        let mut tree = Self {
            points,
            dim,
            split_dims: Vec::new(),
            split_values: Vec::new(),
            left_children: Vec::new(),
            right_children: Vec::new(),
            leaf_starts: Vec::new(),
            leaf_sizes: Vec::new(),
            leaf_slots: Vec::new(),
            point_indices: Vec::with_capacity(k),
        };
        let mut indices: Vec<usize> = (0..k).collect();
        tree.build_node(&mut indices);
        tree
    }

    fn coord(&self, point: usize, d: usize) -> f64 {
        self.points[point * self.dim + d]
    }

    fn build_node(&mut self, indices: &mut [usize]) -> i64 {
        let node = self.split_dims.len();
        let n = indices.len();

        // Split along the dimension with the largest spread.
        let mut split_dim = 0;
        let mut best_range = 0.0;
        for d in 0..self.dim {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = self.coord(i, d);
                (lo.min(v), hi.max(v))
            });
            if hi - lo > best_range {
                best_range = hi - lo;
                split_dim = d;
            }
        }

        if n <= LEAF_SIZE || best_range == 0.0 {
            self.split_dims.push(-1);
            self.split_values.push(0.0);
            self.left_children.push(-1);
            self.right_children.push(-1);
            self.leaf_slots.push(self.leaf_starts.len());
            self.leaf_starts.push(self.point_indices.len());
            self.leaf_sizes.push(n);
            self.point_indices.extend_from_slice(indices);
            return node as i64;
        }

        indices.sort_by(|&a, &b| self.coord(a, split_dim).total_cmp(&self.coord(b, split_dim)));
        let mid = n / 2;
        let split_value = self.coord(indices[mid], split_dim);

        self.split_dims.push(split_dim as i64);
        self.split_values.push(split_value);
        self.left_children.push(-1);
        self.right_children.push(-1);
        self.leaf_slots.push(usize::MAX);

        let (left, right) = indices.split_at_mut(mid);
        let left_child = self.build_node(left);
        let right_child = self.build_node(right);
        self.left_children[node] = left_child;
        self.right_children[node] = right_child;

        node as i64
    }

    /// Nearest point to `query` [d]: (index, squared distance).
    pub fn nearest(&self, query: &[f64]) -> (usize, f64) {
        let mut best = (usize::MAX, f64::INFINITY);
        self.search(0, query, &mut best);
        best
    }

    fn search(&self, node: usize, query: &[f64], best: &mut (usize, f64)) {
        let split_dim = self.split_dims[node];
        if split_dim < 0 {
            let slot = self.leaf_slots[node];
            let start = self.leaf_starts[slot];
            for &i in &self.point_indices[start..start + self.leaf_sizes[slot]] {
                let dist: f64 = (0..self.dim)
                    .map(|d| {
                        let diff = query[d] - self.coord(i, d);
                        diff * diff
                    })
                    .sum();
                if dist < best.1 || (dist == best.1 && i < best.0) {
                    *best = (i, dist);
                }
            }
            return;
        }

        let diff = query[split_dim as usize] - self.split_values[node];
        let (near, far) = if diff < 0.0 {
            (self.left_children[node], self.right_children[node])
        } else {
            (self.right_children[node], self.left_children[node])
        };

        self.search(near as usize, query, best);
        // `<=` keeps equidistant candidates reachable for the index tie-break.
        if diff * diff <= best.1 {
            self.search(far as usize, query, best);
        }
    }
}
