//! CPU implementation of spectral clustering.

use crate::cluster::impl_generic::{
    cluster_embedding_impl, graph_laplacian_impl, laplacian_eigenpairs_impl,
    spectral_clustering_impl, spectral_embedding_impl,
};
use crate::cluster::traits::spectral::{
    ClusteringOptions, EigenSolver, EigenSpectrum, GraphLaplacian, KMeansPartition,
    LaplacianType, SpectralClustering, SpectralClusteringAlgorithms, SpectralOptions,
};
use numr::error::Result;
use numr::runtime::cpu::{CpuClient, CpuRuntime};
use numr::tensor::Tensor;

impl SpectralClusteringAlgorithms<CpuRuntime> for CpuClient {
    fn graph_laplacian(
        &self,
        affinities: &Tensor<CpuRuntime>,
        laplacian: LaplacianType,
    ) -> Result<GraphLaplacian<CpuRuntime>> {
        graph_laplacian_impl(self, affinities, laplacian)
    }

    fn laplacian_eigenpairs(
        &self,
        laplacian: &GraphLaplacian<CpuRuntime>,
        n_eigenpairs: usize,
        solver: &EigenSolver,
    ) -> Result<EigenSpectrum<CpuRuntime>> {
        laplacian_eigenpairs_impl(self, laplacian, n_eigenpairs, solver)
    }

    fn spectral_embedding(
        &self,
        spectrum: &EigenSpectrum<CpuRuntime>,
        n_clusters: usize,
        laplacian: LaplacianType,
    ) -> Result<Tensor<CpuRuntime>> {
        spectral_embedding_impl(self, spectrum, n_clusters, laplacian)
    }

    fn cluster_embedding(
        &self,
        embedding: &Tensor<CpuRuntime>,
        n_clusters: usize,
        options: &ClusteringOptions,
    ) -> Result<KMeansPartition<CpuRuntime>> {
        cluster_embedding_impl(self, embedding, n_clusters, options)
    }

    fn spectral_clustering(
        &self,
        affinities: &Tensor<CpuRuntime>,
        options: &SpectralOptions,
    ) -> Result<SpectralClustering<CpuRuntime>> {
        spectral_clustering_impl(self, affinities, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::traits::spectral::{ClusterCount, SubspaceOptions};
    use approx::assert_abs_diff_eq;
    use numr::runtime::cpu::CpuDevice;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;

    const ALL_LAPLACIANS: [LaplacianType; 3] = [
        LaplacianType::Unnormalized,
        LaplacianType::NormalizedSymmetric,
        LaplacianType::NormalizedRandomWalk,
    ];

    fn setup() -> (CpuClient, CpuDevice) {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
        let device = CpuDevice::new();
        let client = CpuClient::new(device.clone());
        (client, device)
    }

    /// Disjoint complete graphs with unit weights and zero diagonal.
    fn block_affinity(sizes: &[usize]) -> (Vec<f64>, usize) {
        let n: usize = sizes.iter().sum();
        let mut w = vec![0.0; n * n];
        let mut start = 0;
        for &size in sizes {
            for i in start..start + size {
                for j in start..start + size {
                    if i != j {
                        w[i * n + j] = 1.0;
                    }
                }
            }
            start += size;
        }
        (w, n)
    }

    /// Connected weighted graph: a ring plus a few chords.
    fn ring_affinity(n: usize) -> Vec<f64> {
        let mut w = vec![0.0; n * n];
        let mut link = |i: usize, j: usize, v: f64| {
            w[i * n + j] = v;
            w[j * n + i] = v;
        };
        for i in 0..n {
            link(i, (i + 1) % n, 1.0 + (i % 3) as f64 * 0.5);
        }
        link(0, n / 2, 0.3);
        link(1, n / 3, 0.7);
        w
    }

    /// Two dense groups of 4 joined by weak edges.
    fn two_community_affinity() -> Vec<f64> {
        let n = 8;
        let mut w = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                w[i * n + j] = if (i < 4) == (j < 4) {
                    0.8 + ((i + j) % 3) as f64 * 0.1
                } else {
                    0.01
                };
            }
        }
        w
    }

    fn to_host(t: &Tensor<CpuRuntime>) -> Vec<f64> {
        t.contiguous().to_vec()
    }

    fn assert_partition(clustering: &SpectralClustering<CpuRuntime>, n: usize) {
        let mut seen = vec![0usize; n];
        for (cluster, points) in clustering.cluster_point_indices().iter().enumerate() {
            for &p in points {
                seen[p] += 1;
                assert_eq!(clustering.cluster_index_map()[p], cluster);
            }
        }
        assert!(seen.iter().all(|&count| count == 1), "not a partition: {seen:?}");
        assert_eq!(clustering.cluster_index_map().len(), n);
    }

    fn sorted_groups(groups: &[Vec<usize>]) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> =
            groups.iter().filter(|g| !g.is_empty()).cloned().collect();
        groups.sort();
        groups
    }

    #[test]
    fn test_laplacian_is_symmetric() {
        let (client, device) = setup();
        let n = 7;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);

        for kind in [LaplacianType::Unnormalized, LaplacianType::NormalizedSymmetric] {
            let laplacian = client.graph_laplacian(&affinities, kind).unwrap();
            assert_eq!(laplacian.kind(), kind);
            let GraphLaplacian::Standard { matrix, .. } = &laplacian else {
                panic!("{kind:?} should build a standard Laplacian");
            };
            let m = to_host(matrix);
            for i in 0..n {
                for j in 0..n {
                    assert_abs_diff_eq!(m[i * n + j], m[j * n + i], epsilon = 1e-12);
                }
            }
        }

        let unnormalized = client
            .graph_laplacian(&affinities, LaplacianType::Unnormalized)
            .unwrap();
        let GraphLaplacian::Standard { matrix, .. } = &unnormalized else {
            panic!("expected a standard Laplacian");
        };
        let m = to_host(matrix);
        for row in m.chunks(n) {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        }

        let pencil = client
            .graph_laplacian(&affinities, LaplacianType::NormalizedRandomWalk)
            .unwrap();
        assert!(matches!(pencil, GraphLaplacian::Pencil { .. }));
        assert_eq!(pencil.num_nodes(), n);
    }

    #[test]
    fn test_eigenvalues_nonnegative_and_ascending() {
        let (client, device) = setup();
        let n = 9;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);

        for kind in ALL_LAPLACIANS {
            let laplacian = client.graph_laplacian(&affinities, kind).unwrap();
            let spectrum = client
                .laplacian_eigenpairs(&laplacian, n, &EigenSolver::Dense)
                .unwrap();
            assert_eq!(spectrum.eigenvectors.shape(), &[n, n]);

            let values = to_host(&spectrum.eigenvalues);
            assert_eq!(values.len(), n);
            assert!(values.iter().all(|&v| v >= 0.0), "{kind:?}: {values:?}");
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "{kind:?}: {values:?}");
            // Connected graph: smallest eigenvalue is zero.
            assert_abs_diff_eq!(values[0], 0.0, epsilon = 1e-9);
            assert!(values[1] > 1e-6, "{kind:?}: graph should be connected");
        }
    }

    #[test]
    fn test_random_walk_solves_generalized_problem() {
        let (client, device) = setup();
        let n = 8;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);

        let laplacian = client
            .graph_laplacian(&affinities, LaplacianType::NormalizedRandomWalk)
            .unwrap();
        let m = 4;
        let spectrum = client
            .laplacian_eigenpairs(&laplacian, m, &EigenSolver::Dense)
            .unwrap();

        let GraphLaplacian::Pencil { laplacian: l, degrees } = &laplacian else {
            panic!("expected a pencil");
        };
        let l = to_host(l);
        let d = to_host(degrees);
        let lambda = to_host(&spectrum.eigenvalues);
        let x = to_host(&spectrum.eigenvectors);

        for j in 0..m {
            for i in 0..n {
                let lx: f64 = (0..n).map(|c| l[i * n + c] * x[c * m + j]).sum();
                assert_abs_diff_eq!(lx, lambda[j] * d[i] * x[i * m + j], epsilon = 1e-9);
            }
            // D-orthonormal eigenvectors.
            let d_norm: f64 = (0..n).map(|i| d[i] * x[i * m + j] * x[i * m + j]).sum();
            assert_abs_diff_eq!(d_norm, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_two_blocks_end_to_end() {
        let (client, device) = setup();
        let (w, n) = block_affinity(&[4, 5]);
        let affinities = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);

        let options = SpectralOptions {
            cluster_count: ClusterCount::Bounded {
                max_clusters: 2,
                estimate: true,
            },
            laplacian: LaplacianType::Unnormalized,
            ..Default::default()
        };
        let clustering = client.spectral_clustering(&affinities, &options).unwrap();

        let values = to_host(clustering.eigenvalues());
        assert_eq!(values.len(), 3);
        assert_abs_diff_eq!(values[0], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[1], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(values[2], 4.0, epsilon = 1e-9);

        assert_eq!(clustering.num_clusters(), 2);
        assert_eq!(clustering.embedding().shape(), &[2, n]);
        assert_partition(&clustering, n);
        assert_eq!(
            sorted_groups(clustering.cluster_point_indices()),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7, 8]]
        );
        assert_eq!(clustering.clusterer().num_clusters(), 2);
        assert_eq!(clustering.clusterer().result().labels.shape(), &[n]);
    }

    #[test]
    fn test_fixed_cluster_count() {
        let (client, device) = setup();
        let (w, n) = block_affinity(&[4, 5]);
        let affinities = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);

        let options = SpectralOptions {
            cluster_count: ClusterCount::Fixed(2),
            ..Default::default()
        };
        let clustering = client.spectral_clustering(&affinities, &options).unwrap();
        assert_eq!(clustering.num_clusters(), 2);
        assert_eq!(clustering.eigenvalues().shape(), &[2]);
        assert_eq!(
            sorted_groups(clustering.cluster_point_indices()),
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7, 8]]
        );

        for bad in [0, n + 1] {
            let options = SpectralOptions {
                cluster_count: ClusterCount::Fixed(bad),
                ..Default::default()
            };
            assert!(client.spectral_clustering(&affinities, &options).is_err());
        }
    }

    #[test]
    fn test_bound_is_clamped_to_graph_size() {
        let (client, device) = setup();
        let (w, n) = block_affinity(&[4, 5]);
        let affinities = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);

        let estimated = SpectralOptions {
            cluster_count: ClusterCount::Bounded {
                max_clusters: 50,
                estimate: true,
            },
            ..Default::default()
        };
        let clustering = client.spectral_clustering(&affinities, &estimated).unwrap();
        assert_eq!(clustering.eigenvalues().shape(), &[n]);
        assert_eq!(clustering.num_clusters(), 2);

        let unbounded = SpectralOptions {
            cluster_count: ClusterCount::Bounded {
                max_clusters: 0,
                estimate: false,
            },
            ..Default::default()
        };
        let clustering = client.spectral_clustering(&affinities, &unbounded).unwrap();
        assert_eq!(clustering.num_clusters(), n);
        assert_eq!(clustering.embedding().shape(), &[n, n]);
        assert_partition(&clustering, n);
    }

    #[test]
    fn test_symmetric_embedding_has_unit_columns() {
        let (client, device) = setup();
        let n = 10;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);

        let laplacian = client
            .graph_laplacian(&affinities, LaplacianType::NormalizedSymmetric)
            .unwrap();
        let spectrum = client
            .laplacian_eigenpairs(&laplacian, 3, &EigenSolver::Dense)
            .unwrap();
        let k = 3;
        let embedding = client
            .spectral_embedding(&spectrum, k, LaplacianType::NormalizedSymmetric)
            .unwrap();
        assert_eq!(embedding.shape(), &[k, n]);

        let e = to_host(&embedding);
        for c in 0..n {
            let norm: f64 = (0..k).map(|r| e[r * n + c] * e[r * n + c]).sum::<f64>().sqrt();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-9);
        }

        // Other variants keep the raw eigenvector rows.
        let raw = client
            .spectral_embedding(&spectrum, k, LaplacianType::Unnormalized)
            .unwrap();
        let raw = to_host(&raw);
        let vectors = to_host(&spectrum.eigenvectors);
        for r in 0..k {
            for c in 0..n {
                assert_abs_diff_eq!(raw[r * n + c], vectors[c * 3 + r], epsilon = 1e-15);
            }
        }

        assert!(
            client
                .spectral_embedding(&spectrum, 4, LaplacianType::NormalizedSymmetric)
                .is_err()
        );
    }

    #[test]
    fn test_symmetric_embedding_keeps_zero_columns() {
        let (client, device) = setup();
        let (n, m) = (5, 2);

        // Point 2 has an all-zero row; point 4's squared norm underflows to 0.
        #[rustfmt::skip]
        let vectors = [
            0.6, 0.0,
            0.0, 0.5,
            0.0, 0.0,
            0.3, -0.4,
            1e-310, 0.0,
        ];
        let spectrum = EigenSpectrum {
            eigenvalues: Tensor::<CpuRuntime>::from_slice(&[0.0, 0.5], &[m], &device),
            eigenvectors: Tensor::<CpuRuntime>::from_slice(&vectors, &[n, m], &device),
        };

        let embedding = client
            .spectral_embedding(&spectrum, m, LaplacianType::NormalizedSymmetric)
            .unwrap();
        assert_eq!(embedding.shape(), &[m, n]);

        let e = to_host(&embedding);
        for c in 0..n {
            let column: Vec<f64> = (0..m).map(|r| e[r * n + c]).collect();
            if c == 2 {
                assert_eq!(column, vec![0.0, 0.0]);
            } else if c == 4 {
                assert_eq!(column, vec![1e-310, 0.0]);
            } else {
                let norm = column.iter().map(|v| v * v).sum::<f64>().sqrt();
                assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
            }
        }
        assert!(e.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_isolated_node_is_singleton() {
        let (client, device) = setup();
        // Blocks {0, 1, 2} and {3, 4, 5}; node 6 has no edges.
        let (w, _) = block_affinity(&[3, 3, 1]);
        let n = 7;
        let affinities = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);

        for kind in ALL_LAPLACIANS {
            let options = SpectralOptions {
                cluster_count: ClusterCount::Fixed(3),
                laplacian: kind,
                clustering: ClusteringOptions {
                    n_init: 3,
                    ..Default::default()
                },
                ..Default::default()
            };
            let clustering = client.spectral_clustering(&affinities, &options).unwrap();

            let values = to_host(clustering.eigenvalues());
            for v in &values {
                assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-9);
            }
            assert!(to_host(clustering.embedding()).iter().all(|v| v.is_finite()));
            assert_eq!(
                sorted_groups(clustering.cluster_point_indices()),
                vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]],
                "{kind:?}"
            );
        }
    }

    #[test]
    fn test_permutation_invariance() {
        let (client, device) = setup();
        let n = 8;
        let w = two_community_affinity();

        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut StdRng::seed_from_u64(7));
        let mut permuted = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                permuted[i * n + j] = w[perm[i] * n + perm[j]];
            }
        }

        let options = SpectralOptions {
            cluster_count: ClusterCount::Fixed(2),
            laplacian: LaplacianType::Unnormalized,
            clustering: ClusteringOptions {
                n_init: 5,
                ..Default::default()
            },
            ..Default::default()
        };

        let original = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);
        let permuted = Tensor::<CpuRuntime>::from_slice(&permuted, &[n, n], &device);
        let a = client.spectral_clustering(&original, &options).unwrap();
        let b = client.spectral_clustering(&permuted, &options).unwrap();

        let values_a = to_host(a.eigenvalues());
        let values_b = to_host(b.eigenvalues());
        for (x, y) in values_a.iter().zip(&values_b) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-9);
        }

        let labels_a = a.cluster_index_map();
        let labels_b = b.cluster_index_map();
        for i in 0..n {
            for j in 0..n {
                assert_eq!(
                    labels_a[perm[i]] == labels_a[perm[j]],
                    labels_b[i] == labels_b[j],
                    "co-membership of permuted points {i} and {j} changed"
                );
            }
        }
    }

    #[test]
    fn test_subspace_solver_matches_dense() {
        let (client, device) = setup();
        let n = 12;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);
        let m = 3;

        let subspace = SubspaceOptions::default();
        let solvers = [
            EigenSolver::Subspace(subspace.clone()),
            EigenSolver::Auto {
                dense_max_nodes: 4,
                subspace,
            },
        ];

        for kind in ALL_LAPLACIANS {
            let laplacian = client.graph_laplacian(&affinities, kind).unwrap();
            let dense = client
                .laplacian_eigenpairs(&laplacian, m, &EigenSolver::Dense)
                .unwrap();
            let dense_values = to_host(&dense.eigenvalues);

            for solver in &solvers {
                let spectrum = client.laplacian_eigenpairs(&laplacian, m, solver).unwrap();
                assert_eq!(spectrum.eigenvectors.shape(), &[n, m]);
                let values = to_host(&spectrum.eigenvalues);
                for (a, b) in values.iter().zip(&dense_values) {
                    assert_abs_diff_eq!(*a, *b, epsilon = 1e-8);
                }
            }
        }
    }

    #[test]
    fn test_cluster_embedding_partitions_columns() {
        let (client, device) = setup();

        #[rustfmt::skip]
        let embedding = Tensor::<CpuRuntime>::from_slice(
            &[
                0.0, 0.1, 5.0, 5.1, 0.05, 4.9,
                1.0, 1.0, 0.0, 0.0, 1.0,  0.1,
            ],
            &[2, 6],
            &device,
        );
        let options = ClusteringOptions {
            use_kd_tree: true,
            n_init: 3,
            ..Default::default()
        };
        let partition = client.cluster_embedding(&embedding, 2, &options).unwrap();

        assert_eq!(partition.num_clusters(), 2);
        assert_eq!(
            sorted_groups(partition.cluster_point_indices()),
            vec![vec![0, 1, 4], vec![2, 3, 5]]
        );
        let map = partition.cluster_index_map();
        assert_eq!(map[0], map[1]);
        assert_ne!(map[0], map[2]);
        assert_eq!(partition.result().centroids.shape(), &[2, 2]);
    }

    #[test]
    fn test_f32_affinities() {
        let (client, device) = setup();
        let (w, n) = block_affinity(&[3, 4]);
        let w: Vec<f32> = w.iter().map(|&v| v as f32).collect();
        let affinities = Tensor::<CpuRuntime>::from_slice(&w, &[n, n], &device);

        let options = SpectralOptions {
            cluster_count: ClusterCount::Bounded {
                max_clusters: 3,
                estimate: true,
            },
            ..Default::default()
        };
        let clustering = client.spectral_clustering(&affinities, &options).unwrap();
        assert_eq!(clustering.num_clusters(), 2);
        assert_eq!(
            sorted_groups(clustering.cluster_point_indices()),
            vec![vec![0, 1, 2], vec![3, 4, 5, 6]]
        );
    }

    #[test]
    fn test_invalid_inputs() {
        let (client, device) = setup();

        let not_square = Tensor::<CpuRuntime>::from_slice(&[0.0; 6], &[2, 3], &device);
        assert!(
            client
                .spectral_clustering(&not_square, &SpectralOptions::default())
                .is_err()
        );

        let ints = Tensor::<CpuRuntime>::from_slice(&[0i32, 1, 1, 0], &[2, 2], &device);
        assert!(
            client
                .graph_laplacian(&ints, LaplacianType::Unnormalized)
                .is_err()
        );

        let n = 4;
        let affinities = Tensor::<CpuRuntime>::from_slice(&ring_affinity(n), &[n, n], &device);
        let laplacian = client
            .graph_laplacian(&affinities, LaplacianType::Unnormalized)
            .unwrap();
        assert!(
            client
                .laplacian_eigenpairs(&laplacian, n + 1, &EigenSolver::Dense)
                .is_err()
        );

        let bad_tol = EigenSolver::Subspace(SubspaceOptions {
            tol: 0.0,
            ..Default::default()
        });
        assert!(client.laplacian_eigenpairs(&laplacian, 2, &bad_tol).is_err());
    }
}
