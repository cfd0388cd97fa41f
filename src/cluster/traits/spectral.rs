//! Spectral clustering trait.

use numr::error::Result;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

use super::kmeans::KMeansResult;

/// Graph Laplacian type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaplacianType {
    /// L = D - W.
    Unnormalized,
    /// L_sym = I - D^{-1/2} W D^{-1/2}.
    NormalizedSymmetric,
    /// Generalized problem L x = λ D x with L = D - W.
    #[default]
    NormalizedRandomWalk,
}

/// Graph Laplacian built from an affinity matrix.
///
/// Isolated nodes (zero degree) get a zero scaling factor in the normalized
/// variants, so they form singleton components with eigenvalue 0.
#[derive(Debug, Clone)]
pub enum GraphLaplacian<R: Runtime> {
    /// Symmetric matrix [n, n] solved as a standard eigenproblem.
    Standard {
        /// Laplacian matrix [n, n].
        matrix: Tensor<R>,
        /// Degree vector [n].
        degrees: Tensor<R>,
        /// Which variant produced the matrix.
        kind: LaplacianType,
    },
    /// Matrix pencil (L, D) of the generalized problem L x = λ D x.
    Pencil {
        /// L = D - W [n, n].
        laplacian: Tensor<R>,
        /// Diagonal of D [n].
        degrees: Tensor<R>,
    },
}

impl<R: Runtime> GraphLaplacian<R> {
    /// Number of graph nodes.
    pub fn num_nodes(&self) -> usize {
        match self {
            Self::Standard { matrix, .. } => matrix.shape()[0],
            Self::Pencil { laplacian, .. } => laplacian.shape()[0],
        }
    }

    /// Degree vector [n].
    pub fn degrees(&self) -> &Tensor<R> {
        match self {
            Self::Standard { degrees, .. } | Self::Pencil { degrees, .. } => degrees,
        }
    }

    /// Laplacian variant.
    pub fn kind(&self) -> LaplacianType {
        match self {
            Self::Standard { kind, .. } => *kind,
            Self::Pencil { .. } => LaplacianType::NormalizedRandomWalk,
        }
    }
}

/// Smallest eigenpairs of a graph Laplacian.
#[derive(Debug, Clone)]
pub struct EigenSpectrum<R: Runtime> {
    /// Eigenvalues [m], ascending, clamped to be non-negative.
    pub eigenvalues: Tensor<R>,
    /// Eigenvectors [n, m]; column j pairs with eigenvalue j.
    pub eigenvectors: Tensor<R>,
}

/// Options for the iterative subspace eigensolver.
#[derive(Debug, Clone)]
pub struct SubspaceOptions {
    /// Maximum number of subspace iterations.
    pub max_iter: usize,
    /// Residual tolerance, relative to the spectral radius bound.
    pub tol: f64,
    /// Block size; defaults to min(2m, n) when None.
    pub block_size: Option<usize>,
}

impl Default for SubspaceOptions {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-10,
            block_size: None,
        }
    }
}

/// Eigensolver strategy.
///
/// Every strategy returns the same contract: ascending clamped eigenvalues
/// paired with eigenvector columns.
#[derive(Debug, Clone, Default)]
pub enum EigenSolver {
    /// Dense full-spectrum symmetric decomposition, O(n^3).
    #[default]
    Dense,
    /// Truncated block subspace iteration with Rayleigh-Ritz extraction.
    Subspace(SubspaceOptions),
    /// Dense up to `dense_max_nodes` nodes, subspace iteration above.
    Auto {
        /// Largest graph still solved densely.
        dense_max_nodes: usize,
        /// Options used when the subspace solver is selected.
        subspace: SubspaceOptions,
    },
}

/// How the number of clusters is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterCount {
    /// Exactly this many clusters; must be in [1, n].
    Fixed(usize),
    /// At most `max_clusters` (0 or values above n mean n). With `estimate`
    /// the eigengap heuristic picks the count, otherwise the bound is used.
    Bounded {
        /// Upper bound on the cluster count.
        max_clusters: usize,
        /// Estimate the count from the eigenvalue gaps.
        estimate: bool,
    },
}

impl Default for ClusterCount {
    fn default() -> Self {
        Self::Bounded {
            max_clusters: 0,
            estimate: true,
        }
    }
}

/// Options for clustering the embedded points.
#[derive(Debug, Clone)]
pub struct ClusteringOptions {
    /// Maximum K-Means iterations.
    pub max_iter: usize,
    /// Convergence tolerance on inertia change.
    pub tol: f64,
    /// Use a KD-tree over the centroids for nearest-centroid lookup.
    pub use_kd_tree: bool,
    /// Number of K-Means restarts (best result kept).
    pub n_init: usize,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: f64::EPSILON,
            use_kd_tree: false,
            n_init: 1,
        }
    }
}

/// Options for spectral clustering.
#[derive(Debug, Clone, Default)]
pub struct SpectralOptions {
    /// Fixed or bounded/estimated cluster count.
    pub cluster_count: ClusterCount,
    /// Laplacian type.
    pub laplacian: LaplacianType,
    /// Eigensolver strategy.
    pub eigen_solver: EigenSolver,
    /// K-Means settings for the embedding.
    pub clustering: ClusteringOptions,
}

/// K-Means partition of a point set.
#[derive(Debug, Clone)]
pub struct KMeansPartition<R: Runtime> {
    result: KMeansResult<R>,
    cluster_point_indices: Vec<Vec<usize>>,
    cluster_index_map: Vec<usize>,
}

impl<R: Runtime> KMeansPartition<R> {
    /// Build the partition index structures from a K-Means result.
    pub fn from_result(result: KMeansResult<R>, n_clusters: usize) -> Self {
        let labels: Vec<i64> = result.labels.contiguous().to_vec();
        let cluster_index_map: Vec<usize> = labels.iter().map(|&l| l as usize).collect();
        let mut cluster_point_indices = vec![Vec::new(); n_clusters];
        for (point, &cluster) in cluster_index_map.iter().enumerate() {
            cluster_point_indices[cluster].push(point);
        }
        Self {
            result,
            cluster_point_indices,
            cluster_index_map,
        }
    }

    /// Point indices of each cluster; a cluster may be empty.
    pub fn cluster_point_indices(&self) -> &[Vec<usize>] {
        &self.cluster_point_indices
    }

    /// Cluster index of each point [n].
    pub fn cluster_index_map(&self) -> &[usize] {
        &self.cluster_index_map
    }

    /// Number of clusters requested from K-Means.
    pub fn num_clusters(&self) -> usize {
        self.cluster_point_indices.len()
    }

    /// Underlying K-Means result (centroids, labels, inertia, iterations).
    pub fn result(&self) -> &KMeansResult<R> {
        &self.result
    }
}

/// Result of spectral clustering. Immutable once built.
#[derive(Debug, Clone)]
pub struct SpectralClustering<R: Runtime> {
    pub(crate) embedding: Tensor<R>,
    pub(crate) eigenvalues: Tensor<R>,
    pub(crate) clusterer: KMeansPartition<R>,
}

impl<R: Runtime> SpectralClustering<R> {
    /// Embedded points [k, n]; column c is point c.
    pub fn embedding(&self) -> &Tensor<R> {
        &self.embedding
    }

    /// All computed eigenvalues [m], ascending.
    pub fn eigenvalues(&self) -> &Tensor<R> {
        &self.eigenvalues
    }

    /// Final number of clusters (embedding dimension).
    pub fn num_clusters(&self) -> usize {
        self.embedding.shape()[0]
    }

    /// Point indices of each cluster.
    pub fn cluster_point_indices(&self) -> &[Vec<usize>] {
        self.clusterer.cluster_point_indices()
    }

    /// Cluster index of each point.
    pub fn cluster_index_map(&self) -> &[usize] {
        self.clusterer.cluster_index_map()
    }

    /// The clusterer that partitioned the embedding.
    pub fn clusterer(&self) -> &KMeansPartition<R> {
        &self.clusterer
    }
}

/// Spectral clustering algorithms.
pub trait SpectralClusteringAlgorithms<R: Runtime> {
    /// Build a graph Laplacian from a symmetric nonnegative affinity [n, n].
    fn graph_laplacian(
        &self,
        affinities: &Tensor<R>,
        laplacian: LaplacianType,
    ) -> Result<GraphLaplacian<R>>;

    /// Compute the `n_eigenpairs` smallest eigenpairs of a Laplacian.
    fn laplacian_eigenpairs(
        &self,
        laplacian: &GraphLaplacian<R>,
        n_eigenpairs: usize,
        solver: &EigenSolver,
    ) -> Result<EigenSpectrum<R>>;

    /// Build the [k, n] embedding from the first `n_clusters` eigenvectors.
    fn spectral_embedding(
        &self,
        spectrum: &EigenSpectrum<R>,
        n_clusters: usize,
        laplacian: LaplacianType,
    ) -> Result<Tensor<R>>;

    /// Partition the columns of a [k, n] embedding into `n_clusters` groups.
    fn cluster_embedding(
        &self,
        embedding: &Tensor<R>,
        n_clusters: usize,
        options: &ClusteringOptions,
    ) -> Result<KMeansPartition<R>>;

    /// Run the full pipeline on a precomputed affinity matrix [n, n].
    fn spectral_clustering(
        &self,
        affinities: &Tensor<R>,
        options: &SpectralOptions,
    ) -> Result<SpectralClustering<R>>;
}
