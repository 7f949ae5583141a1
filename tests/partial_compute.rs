//! Integration tests for batch and online execution of the partial protocol

mod common;

use common::{assert_allclose_f64, assert_bits_eq, integer_table, real_dataset};
use dalcore::algorithm::basic_statistics::{BasicStatisticsDescriptor, BasicStatisticsResult};
use dalcore::algorithm::covariance::CovarianceDescriptor;
use dalcore::array::Array;
use dalcore::compute::{
    self, Online, OnlineState, PartialCompute, PartialResult, ResultOptions,
};
use dalcore::error::ErrorKind;
use dalcore::table::{DataLayout, HomogenTable, Table};

fn stats_values(result: &BasicStatisticsResult) -> Vec<f64> {
    [
        result.min(),
        result.max(),
        result.sum(),
        result.sum_squares(),
        result.mean(),
        result.variance(),
        result.standard_deviation(),
    ]
    .into_iter()
    .flat_map(|table| table.unwrap().to_row_major_f64().unwrap())
    .collect()
}

#[test]
fn test_three_chunks_match_single_chunk() {
    common::init_tracing();
    let data = integer_table(9, 3);
    let desc = BasicStatisticsDescriptor::default();

    let mut online = Online::new(desc.clone()).unwrap();
    for chunk in data.split_rows(3).unwrap() {
        assert_eq!(chunk.row_count(), 3);
        online.push(&chunk).unwrap();
    }
    let chunked = online.finalize().unwrap();

    let mut single = Online::new(desc).unwrap();
    single.push(&data).unwrap();
    let whole = single.finalize().unwrap();

    assert_eq!(chunked.observation_count(), 9);
    assert_bits_eq(&stats_values(&chunked), &stats_values(&whole), "basic statistics");
}

#[test]
fn test_covariance_chunks_match_batch() {
    let data = integer_table(9, 3);
    let desc = CovarianceDescriptor::default()
        .with_result_options(ResultOptions::COV_MATRIX | ResultOptions::COR_MATRIX);

    let mut online = Online::new(desc.clone()).unwrap();
    for range in [0..4, 4..5, 5..9] {
        online.push(&data.row_slice(range).unwrap()).unwrap();
    }
    let chunked = online.finalize().unwrap();
    let batch = compute::compute(&desc, &data).unwrap();

    assert_bits_eq(
        &chunked.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        &batch.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        "covariance",
    );
    assert_bits_eq(
        &chunked.cor_matrix().unwrap().to_row_major_f64().unwrap(),
        &batch.cor_matrix().unwrap().to_row_major_f64().unwrap(),
        "correlation",
    );
}

#[test]
fn test_merge_grouping_does_not_matter() {
    let rows = 12;
    let data = Table::from_rows(real_dataset(rows, 4), rows, 4).unwrap();
    let desc = CovarianceDescriptor::default();
    let empty = <CovarianceDescriptor as PartialCompute>::Partial::default();

    // twelve singleton chunks, merged left to right
    let singletons = (0..rows)
        .map(|i| desc.partial_compute(&empty, &data.row_slice(i..i + 1).unwrap()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let by_row = singletons
        .iter()
        .try_fold(empty.clone(), |acc, p| acc.merge(p))
        .unwrap();

    // three larger chunks, merged right to left
    let blocks = data
        .split_rows(3)
        .unwrap()
        .iter()
        .map(|chunk| desc.partial_compute(&empty, chunk))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let by_block = blocks[2]
        .merge(&blocks[1])
        .and_then(|p| p.merge(&blocks[0]))
        .unwrap();

    let a = desc.finalize_compute(&by_row).unwrap();
    let b = desc.finalize_compute(&by_block).unwrap();
    assert_allclose_f64(
        &a.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        &b.cov_matrix().unwrap().to_row_major_f64().unwrap(),
        1e-12,
        1e-12,
        "covariance by grouping",
    );
    assert_allclose_f64(
        &a.means().unwrap().to_row_major_f64().unwrap(),
        &b.means().unwrap().to_row_major_f64().unwrap(),
        1e-12,
        1e-12,
        "means by grouping",
    );
}

#[test]
fn test_finalize_is_idempotent() {
    let data = Table::from_rows(real_dataset(7, 3), 7, 3).unwrap();
    let desc = BasicStatisticsDescriptor::default();

    let mut online = Online::new(desc).unwrap();
    online.push(&data).unwrap();
    let first = online.finalize().unwrap();
    let second = online.finalize().unwrap();
    assert_bits_eq(&stats_values(&first), &stats_values(&second), "finalize twice");

    // further chunks are reflected by the next finalize
    online.push(&data).unwrap();
    assert_eq!(online.finalize().unwrap().observation_count(), 14);
    assert_eq!(first.observation_count(), 7);
}

#[test]
fn test_partial_compute_leaves_prior_untouched() {
    let desc = BasicStatisticsDescriptor::default();
    let data = integer_table(4, 2);
    let prior = desc
        .partial_compute(&Default::default(), &data.row_slice(0..2).unwrap())
        .unwrap();
    let snapshot = prior.clone();

    let next = desc.partial_compute(&prior, &data.row_slice(2..4).unwrap()).unwrap();
    assert_eq!(prior.observation_count(), snapshot.observation_count());
    assert_eq!(prior.sum(), snapshot.sum());
    assert_eq!(next.observation_count(), 4);
}

#[test]
fn test_empty_finalize_is_computation_error() {
    let online = Online::new(BasicStatisticsDescriptor::default()).unwrap();
    assert_eq!(online.state(), OnlineState::Empty);
    let err = online.finalize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ComputationError);

    let desc = CovarianceDescriptor::default();
    let err = desc.finalize_compute(&Default::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ComputationError);
}

#[test]
fn test_column_mismatch_is_invalid_argument() {
    let mut online = Online::new(BasicStatisticsDescriptor::default()).unwrap();
    online.push(&integer_table(3, 3)).unwrap();
    let err = online.push(&integer_table(3, 2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    // the failed chunk left the accumulator as it was
    assert_eq!(online.partial().observation_count(), 3);

    let err = online.push(&Table::Empty).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_layouts_and_dtypes_agree() {
    // the same 3x2 matrix, [[1 4] [2 5] [3 6]], in three representations
    let row_major = Table::from_rows(vec![1.0f64, 4.0, 2.0, 5.0, 3.0, 6.0], 3, 2).unwrap();
    let column_major = Table::from(
        HomogenTable::wrap(
            Array::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]),
            3,
            2,
            DataLayout::ColumnMajor,
        )
        .unwrap(),
    );
    let integers = Table::from_rows(vec![1i32, 4, 2, 5, 3, 6], 3, 2).unwrap();

    let desc = BasicStatisticsDescriptor::default();
    let expected = stats_values(&compute::compute(&desc, &row_major).unwrap());
    for table in [column_major, integers] {
        let got = stats_values(&compute::compute(&desc, &table).unwrap());
        assert_bits_eq(&got, &expected, "representation");
    }
}

#[test]
fn test_result_options_limit_outputs() {
    let desc = BasicStatisticsDescriptor::default()
        .with_result_options(ResultOptions::MEAN | ResultOptions::MAX);
    let result = compute::compute(&desc, &integer_table(5, 2)).unwrap();
    assert_eq!(result.options(), ResultOptions::MEAN | ResultOptions::MAX);
    assert!(result.mean().is_ok());
    assert!(result.max().is_ok());
    assert!(result.variance().is_err());
}
