//! Integration tests for SPMD execution on thread-backed ranks

mod common;

use common::{assert_allclose_f64, assert_bits_eq, init_tracing, real_dataset};
use dalcore::algorithm::basic_statistics::BasicStatisticsDescriptor;
use dalcore::algorithm::covariance::CovarianceDescriptor;
use dalcore::algorithm::linear_regression::{LinearRegressionDescriptor, infer_distributed};
use dalcore::communicator::{Collectives, Communicator, ReduceOp, SingleRank, ThreadCommunicator};
use dalcore::compute::{self, ResultOptions, spmd};
use dalcore::error::ErrorKind;
use dalcore::table::Table;

const ROWS: usize = 10;
const COLS: usize = 3;

fn dataset() -> Table {
    Table::from_rows(real_dataset(ROWS, COLS), ROWS, COLS).unwrap()
}

#[test]
fn test_four_ranks_match_single_rank() {
    init_tracing();
    let data = dataset();
    let desc = CovarianceDescriptor::default()
        .with_result_options(ResultOptions::COV_MATRIX | ResultOptions::MEANS);

    let per_rank = ThreadCommunicator::run(4, |comm| {
        let parts = data.split_rows(comm.rank_count())?;
        let result = spmd::compute(comm, &desc, &parts[comm.rank()])?;
        result.cov_matrix()?.to_row_major_f64()
    })
    .unwrap();

    // every rank finalizes the same merged accumulator
    for other in &per_rank[1..] {
        assert_bits_eq(other, &per_rank[0], "rank result");
    }

    let single = spmd::compute(&SingleRank, &desc, &data).unwrap();
    assert_allclose_f64(
        &per_rank[0],
        &single.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        1e-12,
        1e-12,
        "four ranks vs one",
    );

    let batch = compute::compute(&desc, &data).unwrap();
    assert_allclose_f64(
        &per_rank[0],
        &batch.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        1e-12,
        1e-12,
        "four ranks vs batch",
    );
}

#[test]
fn test_rank_without_rows_contributes_nothing() {
    let data = dataset();
    let desc = BasicStatisticsDescriptor::default();

    let per_rank = ThreadCommunicator::run(3, |comm| {
        let local = match comm.rank() {
            0 => data.row_slice(0..6)?,
            1 => Table::Empty,
            _ => data.row_slice(6..ROWS)?,
        };
        let result = spmd::compute(comm, &desc, &local)?;
        Ok((result.observation_count(), result.max()?.to_row_major_f64()?))
    })
    .unwrap();

    let batch = compute::compute(&desc, &data).unwrap();
    for (nobs, max) in per_rank {
        assert_eq!(nobs, ROWS as u64);
        assert_bits_eq(&max, &batch.max().unwrap().to_row_major_f64().unwrap(), "max");
    }
}

#[test]
fn test_all_ranks_empty_is_computation_error() {
    let outcome = ThreadCommunicator::run(2, |comm| {
        spmd::compute(comm, &BasicStatisticsDescriptor::default(), &Table::Empty).map(drop)
    });
    assert_eq!(outcome.unwrap_err().kind(), ErrorKind::ComputationError);
}

#[test]
fn test_linear_regression_train_and_infer() {
    init_tracing();
    let x = dataset();
    // y = 0.5 - a + 2 b + 0.25 c
    let y_values: Vec<f64> = real_dataset(ROWS, COLS)
        .chunks(COLS)
        .map(|r| 0.5 - r[0] + 2.0 * r[1] + 0.25 * r[2])
        .collect();
    let y = Table::column(y_values.clone()).unwrap();
    let desc = LinearRegressionDescriptor::default();

    let per_rank = ThreadCommunicator::run(4, |comm| {
        let xs = x.split_rows(comm.rank_count())?;
        let ys = y.split_rows(comm.rank_count())?;
        let local = comm.rank();
        let model = spmd::train(comm, &desc, &xs[local], &ys[local])?;
        let coefficients = model.coefficients().to_row_major_f64()?;
        let intercept = model.intercept()?.to_row_major_f64()?;
        let predicted = infer_distributed(comm, &model, &xs[local])?;
        Ok((coefficients, intercept, predicted.to_row_major_f64()?))
    })
    .unwrap();

    let reference = compute::train(&desc, &x, &y).unwrap();
    for (coefficients, intercept, predicted) in &per_rank {
        assert_allclose_f64(coefficients, &[-1.0, 2.0, 0.25], 1e-8, 1e-8, "coefficients");
        assert_allclose_f64(intercept, &[0.5], 1e-8, 1e-8, "intercept");
        assert_eq!(predicted.len(), ROWS);
        assert_allclose_f64(predicted, &y_values, 1e-8, 1e-8, "predictions in row order");
        assert_allclose_f64(
            predicted,
            &reference.infer(&x).unwrap().to_row_major_f64().unwrap(),
            1e-10,
            1e-10,
            "distributed vs local inference",
        );
    }
}

#[test]
fn test_concat_rows_preserves_rank_order() {
    let per_rank = ThreadCommunicator::run(3, |comm| {
        let r = comm.rank() as f64;
        let local = if comm.rank() == 1 {
            Table::Empty
        } else {
            Table::from_rows(vec![r, r + 0.5, r + 10.0, r + 10.5], 2, 2)?
        };
        spmd::concat_rows(comm, &local)?.to_row_major_f64()
    })
    .unwrap();

    let expected = vec![0.0, 0.5, 10.0, 10.5, 2.0, 2.5, 12.0, 12.5];
    for rows in per_rank {
        assert_eq!(rows, expected);
    }
}

#[test]
fn test_concat_rows_column_mismatch() {
    let outcome = ThreadCommunicator::run(2, |comm| {
        let local = Table::from_rows(vec![1.0f64; 2 + comm.rank()], 1, 2 + comm.rank())?;
        spmd::concat_rows(comm, &local).map(drop)
    });
    assert_eq!(outcome.unwrap_err().kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_replicated_takes_rank_zero() {
    let values = ThreadCommunicator::run(3, |comm| spmd::replicated(comm, &[1.5, -2.0])).unwrap();
    assert!(values.iter().all(|v| v == &[1.5, -2.0]));
}

// ============================================================================
// Collectives
// ============================================================================

#[test]
fn test_all_reduce_ops() {
    let per_rank = ThreadCommunicator::run(4, |comm| {
        let r = comm.rank() as i64;
        let mut sum = [r, 1];
        let mut min = [r, -r];
        let mut max = [r, -r];
        comm.all_reduce(&mut sum, ReduceOp::Sum)?.wait()?;
        comm.all_reduce(&mut min, ReduceOp::Min)?.wait()?;
        comm.all_reduce(&mut max, ReduceOp::Max)?.wait()?;
        Ok((sum, min, max))
    })
    .unwrap();

    for (sum, min, max) in per_rank {
        assert_eq!(sum, [6, 4]);
        assert_eq!(min, [0, -3]);
        assert_eq!(max, [3, 0]);
    }
}

#[test]
fn test_broadcast_from_root() {
    let per_rank = ThreadCommunicator::run(3, |comm| {
        let mut values = [comm.rank() as f64; 3];
        comm.broadcast(&mut values, 2)?.wait()?;
        Ok(values)
    })
    .unwrap();
    assert!(per_rank.iter().all(|v| v == &[2.0; 3]));
}

#[test]
fn test_all_gather_variable() {
    let counts = [1usize, 3, 2];
    let displs = [0usize, 1, 4];
    let per_rank = ThreadCommunicator::run(3, |comm| {
        let r = comm.rank();
        let local: Vec<f32> = (0..counts[r]).map(|i| (r * 10 + i) as f32).collect();
        let mut recv = vec![0.0f32; 6];
        comm.all_gather_variable(&local, &mut recv, &counts, &displs)?
            .wait()?;
        Ok(recv)
    })
    .unwrap();

    for recv in per_rank {
        assert_eq!(recv, vec![0.0, 10.0, 11.0, 12.0, 20.0, 21.0]);
    }
}

#[test]
fn test_single_rank_collectives_are_identity() {
    let comm = SingleRank;
    assert!(comm.is_root());
    assert!(comm.supports_device_memory());

    let mut values = [3.0f64, -1.0];
    comm.all_reduce(&mut values, ReduceOp::Sum).unwrap().wait().unwrap();
    assert_eq!(values, [3.0, -1.0]);
    comm.barrier().unwrap();
}
