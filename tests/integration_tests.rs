//! Integration tests for the drift-kernels library
//!
//! These tests exercise the kernels end to end on random batches, the way a
//! two-sample test consumes them.

use approx::assert_relative_eq;
use drift_kernels::kernel::projection_fn;
use drift_kernels::utils::{is_symmetric, subset_matrix, zero_diag};
use drift_kernels::{
    batch_compute_kernel_matrix, divide_kernel, log_sigma_median, product_kernels,
    squared_pairwise_distance, sum_kernels, BandwidthFn, DeepKernel, GaussianRBF, Heuristic,
    Kernel, KernelConfig, KernelError, LinearProjection, Matrix, Periodic, RationalQuadratic,
};
use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_batch(rows: usize, dim: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_simple_fn((rows, dim), || rng.gen_range(-1.0..1.0))
}

fn assert_matrix_eq(a: &Matrix, b: &Matrix, tol: f64) {
    assert_eq!(a.dim(), b.dim());
    for (u, v) in a.iter().zip(b.iter()) {
        assert_relative_eq!(*u, *v, epsilon = tol);
    }
}

fn base_kernels() -> Vec<Box<dyn Kernel>> {
    vec![
        Box::new(GaussianRBF::new()),
        Box::new(RationalQuadratic::new()),
        Box::new(Periodic::new()),
        Box::new(GaussianRBF::with_sigma(&[0.5, 1.0, 2.0]).unwrap()),
        Box::new(
            RationalQuadratic::builder()
                .alpha(&[0.5, 2.0])
                .sigma(&[1.0])
                .build()
                .unwrap(),
        ),
        Box::new(Periodic::builder().tau(&[1.5]).sigma(&[0.8]).build().unwrap()),
    ]
}

/// X = 100×5, Y = 75×5, sigma inferred with the median heuristic
#[test]
fn test_gaussian_reference_scenario() {
    init_logging();
    let x = random_batch(100, 5, 1);
    let y = random_batch(75, 5, 2);
    let kernel = GaussianRBF::new();

    let k_xy = kernel.evaluate(x.view(), y.view(), true).unwrap();
    assert_eq!(k_xy.dim(), (100, 75));
    assert!(k_xy.iter().all(|&v| v > 0.0 && v <= 1.0));

    let k_xx = kernel.evaluate(x.view(), x.view(), true).unwrap();
    assert_relative_eq!(k_xx.diag().sum(), 100.0, epsilon = 1e-4);
    for v in k_xx.diag() {
        assert_relative_eq!(*v, 1.0, epsilon = 1e-4);
    }
}

#[test]
fn test_inferred_sigma_follows_median_heuristic() {
    let x = random_batch(30, 4, 3);
    let y = random_batch(20, 4, 4);
    let kernel = GaussianRBF::new();
    kernel.evaluate(x.view(), y.view(), true).unwrap();

    let dist = squared_pairwise_distance(x.view(), y.view()).unwrap();
    let log_sigma = log_sigma_median(x.view(), y.view(), dist.view()).unwrap();
    assert_relative_eq!(
        kernel.sigma().unwrap()[0],
        log_sigma[0].exp(),
        epsilon = 1e-12
    );
}

#[test]
fn test_custom_init_fn_sets_sigma() {
    let x = random_batch(15, 3, 5);
    let y = random_batch(12, 3, 6);
    let init_fn = BandwidthFn::new(|_x, _y, dist| {
        let max = dist.iter().cloned().fold(0.0_f64, f64::max);
        Ok(Array1::from_vec(vec![max.sqrt().ln()]))
    });
    let kernel = GaussianRBF::builder()
        .init_sigma_fn(init_fn.clone())
        .build()
        .unwrap();
    kernel.evaluate(x.view(), y.view(), true).unwrap();

    let dist = squared_pairwise_distance(x.view(), y.view()).unwrap();
    let expected = init_fn.call(x.view(), y.view(), dist.view()).unwrap()[0].exp();
    assert_relative_eq!(kernel.sigma().unwrap()[0], expected, epsilon = 1e-12);
}

#[test]
fn test_base_kernels_shape_and_positivity() {
    init_logging();
    let x = random_batch(40, 6, 7);
    let y = random_batch(25, 6, 8);
    for kernel in base_kernels() {
        let k = kernel.evaluate(x.view(), y.view(), false).unwrap();
        assert_eq!(k.dim(), (40, 25), "{}", kernel.name());
        assert!(
            k.iter().all(|&v| v > 0.0 && v.is_finite()),
            "{} produced a non-positive entry",
            kernel.name()
        );
    }
}

#[test]
fn test_base_kernels_swap_is_transpose() {
    let x = random_batch(20, 3, 9);
    let y = random_batch(14, 3, 10);
    for kernel in base_kernels() {
        let k_xy = kernel.evaluate(x.view(), y.view(), false).unwrap();
        let k_yx = kernel.evaluate(y.view(), x.view(), false).unwrap();
        assert_matrix_eq(&k_xy, &k_yx.t().to_owned(), 1e-10);
    }
}

#[test]
fn test_trainable_kernels_reject_inference() {
    let x = random_batch(10, 2, 11);
    let kernels: Vec<Box<dyn Kernel>> = vec![
        Box::new(GaussianRBF::builder().trainable(true).build().unwrap()),
        Box::new(RationalQuadratic::builder().trainable(true).build().unwrap()),
        Box::new(Periodic::builder().trainable(true).build().unwrap()),
    ];
    for kernel in kernels {
        let err = kernel.evaluate(x.view(), x.view(), true).unwrap_err();
        assert!(
            matches!(err, KernelError::InferenceConflict { .. }),
            "{}: unexpected {err}",
            kernel.name()
        );
    }
}

#[test]
fn test_rational_quadratic_unit_diagonal() {
    let x = random_batch(50, 5, 12);
    let kernel = RationalQuadratic::builder()
        .sigma(&[1.0])
        .alpha(&[1.0])
        .trainable(false)
        .build()
        .unwrap();
    let k = kernel.evaluate(x.view(), x.view(), false).unwrap();
    for v in k.diag() {
        assert_eq!(*v, 1.0);
    }
}

#[test]
fn test_multi_bandwidth_averages() {
    let x = random_batch(30, 4, 13);
    let kernel = GaussianRBF::with_sigma(&[0.1, 1.0, 10.0]).unwrap();
    let k = kernel.evaluate(x.view(), x.view(), false).unwrap();

    // A sum over three bandwidths would put 3 on the diagonal
    for v in k.diag() {
        assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
    }
    assert!(k.iter().all(|&v| v <= 1.0));
}

#[test]
fn test_product_of_three_kernels() {
    let x = random_batch(18, 3, 14);
    let y = random_batch(11, 3, 15);
    let k1 = GaussianRBF::with_sigma(&[0.7]).unwrap();
    let k2 = RationalQuadratic::builder()
        .alpha(&[2.0])
        .sigma(&[1.2])
        .build()
        .unwrap();
    let k3 = Periodic::builder().tau(&[2.0]).sigma(&[1.0]).build().unwrap();

    let expected = k1.evaluate(x.view(), y.view(), false).unwrap()
        * k2.evaluate(x.view(), y.view(), false).unwrap()
        * k3.evaluate(x.view(), y.view(), false).unwrap();

    let product = product_kernels(vec![Box::new(k1), Box::new(k2), Box::new(k3)]).unwrap();
    let k = product.evaluate(x.view(), y.view(), false).unwrap();
    assert_matrix_eq(&k, &expected, 1e-12);
}

#[test]
fn test_normalised_composites_keep_unit_diagonal() {
    init_logging();
    let x = random_batch(25, 4, 16);

    let pair = divide_kernel(
        sum_kernels(vec![Box::new(GaussianRBF::new()), Box::new(Periodic::new())]).unwrap(),
        2.0,
    )
    .unwrap();
    let triple = divide_kernel(
        sum_kernels(vec![
            Box::new(GaussianRBF::new()),
            Box::new(RationalQuadratic::new()),
            Box::new(Periodic::new()),
        ])
        .unwrap(),
        3.0,
    )
    .unwrap();

    for kernel in [pair, triple] {
        let k = kernel.evaluate(x.view(), x.view(), true).unwrap();
        assert!(kernel.is_initialized());
        for v in k.diag() {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-10);
        }
    }
}

fn deep_kernel(seed: u64) -> DeepKernel {
    let weights = random_batch(5, 3, seed);
    let bias = Array1::from_vec(vec![0.1, -0.2, 0.0]);
    let projection = LinearProjection::new(weights, bias).unwrap();
    DeepKernel::new(projection, GaussianRBF::new()).unwrap()
}

#[test]
fn test_deep_kernel_swap_is_transpose() {
    let x = random_batch(30, 5, 17);
    let y = random_batch(20, 5, 18);
    let kernel = deep_kernel(19);

    let k_xy = kernel.evaluate(x.view(), y.view(), false).unwrap();
    let k_yx = kernel.evaluate(y.view(), x.view(), false).unwrap();
    assert_matrix_eq(&k_xy, &k_yx.t().to_owned(), 1e-5);

    let k_xx = kernel.evaluate(x.view(), x.view(), false).unwrap();
    assert!(k_xx.diag().iter().all(|&v| v > 0.0));
    assert!(is_symmetric(k_xx.view(), 1e-10));
}

#[test]
fn test_deep_kernel_blends_with_eps() {
    let x = random_batch(12, 4, 20);
    let y = random_batch(9, 4, 21);
    let kernel_a = GaussianRBF::with_sigma(&[0.5]).unwrap();
    let kernel_b = GaussianRBF::with_sigma(&[2.0]).unwrap();
    let k_a = {
        let xp = x.mapv(f64::tanh);
        let yp = y.mapv(f64::tanh);
        kernel_a.evaluate(xp.view(), yp.view(), false).unwrap()
    };
    let k_b = kernel_b.evaluate(x.view(), y.view(), false).unwrap();

    let projection = projection_fn(|b| Ok(b.mapv(f64::tanh)));
    let kernel = DeepKernel::builder(projection, kernel_a)
        .kernel_b(kernel_b)
        .eps(0.3)
        .build()
        .unwrap();
    let k = kernel.evaluate(x.view(), y.view(), false).unwrap();
    assert_matrix_eq(&k, &(0.3 * &k_a + 0.7 * &k_b), 1e-12);
}

#[test]
fn test_deep_kernel_rejects_eps_outside_unit_interval() {
    for eps in [-0.1, 1.5, f64::NAN] {
        let projection = LinearProjection::new(Array2::eye(2), Array1::zeros(2)).unwrap();
        assert!(matches!(
            DeepKernel::builder(projection, GaussianRBF::new())
                .eps(eps)
                .build(),
            Err(KernelError::InvalidParameter(_))
        ));
    }
}

#[test]
fn test_deep_kernel_parameter_store() {
    let x = random_batch(10, 5, 22);
    let kernel = deep_kernel(23);
    kernel.evaluate(x.view(), x.view(), false).unwrap();

    let store = drift_kernels::ParameterStore::from_kernel(&kernel);
    // kernel_a sigma, kernel_b sigma, eps
    assert_eq!(store.len(), 3);
    let trainable = store.trainable_indices();
    assert_eq!(trainable.len(), 1);

    let eps_index = trainable[0];
    assert_eq!(store.get(eps_index).unwrap().name(), "eps");
    store
        .update(eps_index, Array1::from_vec(vec![2.0]))
        .unwrap();
    assert_relative_eq!(kernel.eps(), 1.0 / (1.0 + (-2.0_f64).exp()), epsilon = 1e-12);
}

#[test]
fn test_batched_matches_unblocked() {
    init_logging();
    let n = 37;
    let x = random_batch(n, 5, 24);
    let y = random_batch(23, 5, 25);
    let kernels: Vec<Box<dyn Kernel>> = vec![
        Box::new(GaussianRBF::with_sigma(&[0.9, 1.8]).unwrap()),
        Box::new(
            RationalQuadratic::builder()
                .alpha(&[1.5])
                .sigma(&[1.0])
                .build()
                .unwrap(),
        ),
        Box::new(deep_kernel(26)),
    ];

    for kernel in &kernels {
        // Seed any lazily initialised parameter on the full batch first
        let full = kernel.evaluate(x.view(), y.view(), false).unwrap();
        for block_size in [1, n / 2, n, n + 10] {
            let k = batch_compute_kernel_matrix(x.view(), y.view(), kernel, block_size).unwrap();
            assert_matrix_eq(&k, &full, 1e-12);
        }
    }
}

#[test]
fn test_joint_matrix_blocks() {
    let x = random_batch(8, 3, 27);
    let y = random_batch(6, 3, 28);
    let z = concatenate(Axis(0), &[x.view(), y.view()]).unwrap();
    let kernel = GaussianRBF::with_sigma(&[1.0]).unwrap();

    let k_zz = kernel.evaluate(z.view(), z.view(), false).unwrap();
    let x_idx: Vec<usize> = (0..8).collect();
    let y_idx: Vec<usize> = (8..14).collect();
    let k_xy = subset_matrix(k_zz.view(), &x_idx, &y_idx).unwrap();
    let direct = kernel.evaluate(x.view(), y.view(), false).unwrap();
    assert_matrix_eq(&k_xy, &direct, 1e-12);

    let k_xx = zero_diag(k_zz.slice(s![..8, ..8])).unwrap();
    assert!(k_xx.diag().iter().all(|&v| v == 0.0));
}

#[test]
fn test_config_kernel_matches_builder() {
    let x = random_batch(16, 3, 29);
    let y = random_batch(10, 3, 30);
    let config = KernelConfig::from_json_str(
        r#"{"kernel_name": "Periodic",
            "kernel_config": {"init_tau_fn": "mean", "init_sigma_fn": "median"}}"#,
    )
    .unwrap();
    let from_config = config.build().unwrap();
    let direct = Periodic::builder()
        .init_tau_fn(Heuristic::Mean)
        .init_sigma_fn(Heuristic::Median)
        .build()
        .unwrap();

    let k1 = from_config.evaluate(x.view(), y.view(), true).unwrap();
    let k2 = direct.evaluate(x.view(), y.view(), true).unwrap();
    assert_matrix_eq(&k1, &k2, 1e-12);
}

#[test]
fn test_shape_errors() {
    let x = random_batch(5, 3, 31);
    let y = random_batch(5, 4, 32);
    let empty = Array2::<f64>::zeros((0, 3));
    let kernel = GaussianRBF::with_sigma(&[1.0]).unwrap();

    assert!(matches!(
        kernel.evaluate(x.view(), y.view(), false),
        Err(KernelError::DimensionMismatch {
            expected: 3,
            actual: 4
        })
    ));
    assert!(matches!(
        kernel.evaluate(empty.view(), x.view(), false),
        Err(KernelError::EmptyBatch(_))
    ));
}
