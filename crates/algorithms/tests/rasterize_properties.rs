//! End-to-end properties of multi-cloud rasterization.

use approx::assert_relative_eq;
use plyraster_algorithms::rasterize::{
    Dsm, OutputStatistics, ProcessingMode, RasterizeParams, Roi, Statistic, rasterize,
};
use plyraster_core::{Error, PointCloud};

fn cloud(rows: &[[f64; 3]]) -> PointCloud {
    let rows: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
    PointCloud::from_rows(&rows).unwrap()
}

/// Deterministic scattered points over `[x0, x0 + 20) × [y0, y0 + 20)`
fn scattered(seed: u64, n: usize, x0: f64, y0: f64) -> PointCloud {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    let values: Vec<f64> = (0..n)
        .flat_map(|_| {
            let x = x0 + 20.0 * next();
            let y = y0 + 20.0 * next();
            [x, y, 50.0 + 10.0 * next()]
        })
        .collect();
    PointCloud::from_flat(values, 3).unwrap()
}

fn all_stats(resolution: f64) -> RasterizeParams {
    RasterizeParams {
        outputs: OutputStatistics::all(),
        ..RasterizeParams::with_resolution(resolution)
    }
}

fn assert_same_surface(a: &Dsm, b: &Dsm) {
    assert_eq!(a.grid(), b.grid());
    assert_eq!(a.statistics(), b.statistics());
    assert_eq!(a.layers().len(), b.layers().len());
    let channels = a.channels().max(1);
    for (i, (la, lb)) in a.layers().iter().zip(b.layers()).enumerate() {
        // std comes from a difference of f32 sums and is the least stable layer
        let epsilon = match a.statistics()[i / channels] {
            Statistic::StdDev => 5e-2,
            _ => 1e-3,
        };
        for (&va, &vb) in la.data().iter().zip(lb.data().iter()) {
            if va.is_nan() || vb.is_nan() {
                assert!(va.is_nan() && vb.is_nan(), "nodata differs: {va} vs {vb}");
            } else {
                assert_relative_eq!(va, vb, epsilon = epsilon, max_relative = 1e-4);
            }
        }
    }
}

#[test]
fn two_points_two_rows() {
    let params = RasterizeParams {
        roi: Some(Roi::new(0.0, 2.0, 1, 2)),
        ..all_stats(1.0)
    };
    let dsm = rasterize(&[cloud(&[[0.5, 0.5, 10.0], [0.5, 1.5, 20.0]])], &params).unwrap();

    assert_eq!(dsm.grid().shape(), (2, 1));
    let column = |stat| {
        let layer = dsm.layer(stat, 0).unwrap();
        vec![layer.get(0, 0).unwrap(), layer.get(1, 0).unwrap()]
    };
    // row 0 is the northern (higher y) row
    assert_eq!(column(Statistic::Mean), vec![20.0, 10.0]);
    assert_eq!(column(Statistic::StdDev), vec![0.0, 0.0]);
    assert_eq!(column(Statistic::Min), vec![20.0, 10.0]);
    assert_eq!(column(Statistic::Max), vec![20.0, 10.0]);
}

#[test]
fn two_values_in_one_cell() {
    let params = RasterizeParams {
        roi: Some(Roi::new(0.0, 1.0, 1, 1)),
        ..all_stats(1.0)
    };
    let dsm = rasterize(&[cloud(&[[0.5, 0.5, 10.0], [0.7, 0.2, 20.0]])], &params).unwrap();

    assert_eq!(dsm.grid().shape(), (1, 1));
    let at = |stat| dsm.layer(stat, 0).unwrap().get(0, 0).unwrap();
    assert_eq!(at(Statistic::Mean), 15.0);
    assert_eq!(at(Statistic::StdDev), 5.0);
    assert_eq!(at(Statistic::Min), 10.0);
    assert_eq!(at(Statistic::Max), 20.0);
}

#[test]
fn cloud_order_does_not_matter() {
    let clouds = [
        scattered(1, 400, 0.0, 0.0),
        scattered(2, 300, 10.0, 5.0),
        scattered(3, 500, -5.0, 12.0),
    ];
    let params = RasterizeParams {
        radius: 1,
        sigma: 1.5,
        ..all_stats(1.0)
    };

    let forward = rasterize(&[&clouds[0], &clouds[1], &clouds[2]], &params).unwrap();
    let backward = rasterize(&[&clouds[2], &clouds[0], &clouds[1]], &params).unwrap();
    assert_same_surface(&forward, &backward);
}

#[test]
fn split_clouds_match_concatenation() {
    let a = scattered(7, 600, 0.0, 0.0);
    let b = scattered(8, 600, 3.0, 4.0);
    let params = RasterizeParams {
        radius: 2,
        circular: true,
        sigma: 1.0,
        ..all_stats(0.5)
    };

    let joined = rasterize(&[a.concat(&b).unwrap()], &params).unwrap();
    let streamed = rasterize(&[a, b], &params).unwrap();
    assert_same_surface(&joined, &streamed);
}

#[test]
fn empty_cells_are_nan_everywhere() {
    // two clusters with an empty gap of cells between them
    let dsm = rasterize(
        &[cloud(&[[0.5, 0.5, 1.0], [9.5, 0.5, 2.0]])],
        &all_stats(1.0),
    )
    .unwrap();

    // the lattice adds a southern row that no point reaches
    assert_eq!(dsm.grid().shape(), (2, 10));
    for layer in dsm.layers() {
        assert!(!layer.get(0, 0).unwrap().is_nan());
        assert!(!layer.get(0, 9).unwrap().is_nan());
        for col in 1..9 {
            assert!(layer.get(0, col).unwrap().is_nan());
        }
        assert!(layer.data().row(1).iter().all(|v| v.is_nan()));
    }
}

#[test]
fn mean_lies_between_extremes() {
    let params = RasterizeParams {
        radius: 2,
        sigma: 0.75,
        ..all_stats(0.5)
    };
    let dsm = rasterize(&[scattered(11, 2_000, 0.0, 0.0)], &params).unwrap();

    let avg = dsm.layer(Statistic::Mean, 0).unwrap().data();
    let min = dsm.layer(Statistic::Min, 0).unwrap().data();
    let max = dsm.layer(Statistic::Max, 0).unwrap().data();
    let mut filled = 0;
    for ((&a, &lo), &hi) in avg.iter().zip(min.iter()).zip(max.iter()) {
        if a.is_nan() {
            continue;
        }
        filled += 1;
        assert!(lo <= a && a <= hi, "{lo} <= {a} <= {hi}");
    }
    assert!(filled > 0);
}

#[test]
fn constant_values_have_zero_std() {
    let points: Vec<[f64; 3]> = (0..50)
        .map(|i| [(i % 7) as f64 * 0.9 + 0.13, (i / 7) as f64 * 0.8 + 0.21, 7.25])
        .collect();
    let params = RasterizeParams {
        radius: 1,
        sigma: 0.8,
        ..all_stats(1.0)
    };
    let dsm = rasterize(&[cloud(&points)], &params).unwrap();

    let std = dsm.layer(Statistic::StdDev, 0).unwrap().data();
    let avg = dsm.layer(Statistic::Mean, 0).unwrap().data();
    for (&s, &a) in std.iter().zip(avg.iter()) {
        if !a.is_nan() {
            assert_eq!(s, 0.0);
            assert_eq!(a, 7.25);
        }
    }
}

#[test]
fn gaussian_weights_neighbours() {
    // two points at the centers of adjacent cells
    let params = RasterizeParams {
        radius: 1,
        sigma: 1.0,
        roi: Some(Roi::new(0.0, 1.0, 2, 1)),
        ..RasterizeParams::with_resolution(1.0)
    };
    let dsm = rasterize(&[cloud(&[[0.5, 0.5, 10.0], [1.5, 0.5, 20.0]])], &params).unwrap();

    let w = (-0.5f64).exp();
    let avg = dsm.layer(Statistic::Mean, 0).unwrap();
    assert_relative_eq!(
        avg.get(0, 0).unwrap() as f64,
        (10.0 + 20.0 * w) / (1.0 + w),
        epsilon = 1e-4
    );
    assert_relative_eq!(
        avg.get(0, 1).unwrap() as f64,
        (10.0 * w + 20.0) / (1.0 + w),
        epsilon = 1e-4
    );
}

#[test]
fn infinite_sigma_is_plain_mean() {
    let params = RasterizeParams {
        radius: 1,
        roi: Some(Roi::new(0.0, 1.0, 2, 1)),
        ..RasterizeParams::with_resolution(1.0)
    };
    let dsm = rasterize(&[cloud(&[[0.5, 0.5, 10.0], [1.5, 0.5, 20.0]])], &params).unwrap();
    let avg = dsm.layer(Statistic::Mean, 0).unwrap();
    assert_eq!(avg.get(0, 0).unwrap(), 15.0);
    assert_eq!(avg.get(0, 1).unwrap(), 15.0);
}

#[test]
fn doubling_resolution_halves_the_grid() {
    let clouds = [scattered(5, 300, 100.0, 200.0)];
    let fine = rasterize(&clouds, &RasterizeParams::with_resolution(0.5)).unwrap();
    let coarse = rasterize(&clouds, &RasterizeParams::with_resolution(1.0)).unwrap();

    let (fr, fc) = fine.grid().shape();
    let (cr, cc) = coarse.grid().shape();
    assert!(fr.abs_diff(2 * cr) <= 2);
    assert!(fc.abs_diff(2 * cc) <= 2);
}

#[test]
fn threading_modes_agree() {
    let clouds = [scattered(21, 150_000, 0.0, 0.0), scattered(22, 90_000, 5.0, 5.0)];
    let base = RasterizeParams {
        radius: 1,
        sigma: 1.0,
        ..all_stats(0.25)
    };

    let sequential = rasterize(
        &clouds,
        &RasterizeParams {
            mode: ProcessingMode::Sequential,
            ..base.clone()
        },
    )
    .unwrap();
    for mode in [ProcessingMode::Parallel, ProcessingMode::ParallelWith(3)] {
        let threaded = rasterize(&clouds, &RasterizeParams { mode, ..base.clone() }).unwrap();
        assert_same_surface(&sequential, &threaded);
    }
}

#[test]
fn channel_count_is_fixed_by_the_first_cloud() {
    let rgb = PointCloud::from_rows(&[vec![0.5, 0.5, 1.0, 200.0, 100.0, 50.0]]).unwrap();
    let height = cloud(&[[1.5, 0.5, 2.0]]);

    let err = rasterize(&[&rgb, &height], &RasterizeParams::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::ChannelMismatch { expected: 4, found: 1, .. }
    ));
}

#[test]
fn every_channel_gets_layers() {
    let rgb = PointCloud::from_rows(&[
        vec![0.5, 0.5, 1.0, 200.0, 100.0],
        vec![0.6, 0.4, 3.0, 100.0, 50.0],
    ])
    .unwrap();
    let params = RasterizeParams {
        outputs: OutputStatistics {
            max: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let dsm = rasterize(&[rgb], &params).unwrap();

    assert_eq!(dsm.channels(), 3);
    assert_eq!(dsm.layers().len(), 6);
    assert_eq!(dsm.layer(Statistic::Mean, 1).unwrap().get(0, 0).unwrap(), 150.0);
    assert_eq!(dsm.layer(Statistic::Max, 2).unwrap().get(0, 0).unwrap(), 100.0);

    let stack = dsm.into_stack().unwrap();
    assert_eq!(stack.dim(), (2, 1, 6));
    assert_eq!(stack[[0, 0, 0]], 2.0);
}

#[test]
fn coordinates_only_clouds_produce_no_layers() {
    let xy = PointCloud::from_rows(&[vec![0.5, 0.5], vec![3.5, 2.5]]).unwrap();
    let dsm = rasterize(&[xy], &all_stats(1.0)).unwrap();
    assert_eq!(dsm.channels(), 0);
    assert!(dsm.layers().is_empty());
}

#[test]
fn empty_cloud_aborts_the_run() {
    let empty = PointCloud::from_rows(&[]).unwrap();
    let err = rasterize(&[cloud(&[[0.5, 0.5, 1.0]]), empty], &RasterizeParams::default())
        .unwrap_err();
    assert!(matches!(err, Error::EmptyInput { .. }));
}
