//! Capability-based kernel selection
//!
//! Kernels come in variants tuned for different vector widths. A
//! [`KernelRegistry`] maps the minimum [`CpuCapability`] each variant needs
//! to a factory; the best variant for the running CPU is resolved once and
//! cached for the life of the process.
//!
//! Every variant adds products in the same order per output element, so
//! the choice affects speed, not results. The parallel wrapper (feature
//! `rayon`) splits rows into fixed-size blocks and sums the block results
//! in block order, so it is deterministic for a given input too.

use std::sync::OnceLock;

/// Vector capability of the running CPU
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuCapability {
    /// No usable vector unit
    Scalar = 0,
    /// 128-bit vectors (NEON)
    Vector128 = 1,
    /// 256-bit vectors with FMA (AVX2)
    Vector256 = 2,
    /// 512-bit vectors (AVX-512F)
    Vector512 = 3,
}

impl CpuCapability {
    /// Number of f64 values per vector register
    #[inline]
    pub const fn f64_lanes(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vector128 => 2,
            Self::Vector256 => 4,
            Self::Vector512 => 8,
        }
    }

    /// Short name
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Vector128 => "vector128",
            Self::Vector256 => "vector256",
            Self::Vector512 => "vector512",
        }
    }
}

impl std::fmt::Display for CpuCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static CAPABILITY: OnceLock<CpuCapability> = OnceLock::new();

/// Detected capability, cached after the first call
#[inline]
pub fn detect_capability() -> CpuCapability {
    *CAPABILITY.get_or_init(detect_capability_uncached)
}

#[cold]
fn detect_capability_uncached() -> CpuCapability {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx512f") {
            return CpuCapability::Vector512;
        }
        if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
            return CpuCapability::Vector256;
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        // NEON is mandatory on AArch64
        return CpuCapability::Vector128;
    }

    CpuCapability::Scalar
}

/// Accumulates the cross product `X^T X` of row-major blocks
pub trait CrossProductKernel: Send + Sync {
    /// Variant name, for logging
    fn name(&self) -> &'static str;

    /// Add `X^T X` of a `rows x cols` row-major block into `out`
    ///
    /// `out` is a full (both triangles) row-major `cols x cols` matrix.
    fn accumulate(&self, block: &[f64], cols: usize, out: &mut [f64]);
}

/// One row at a time, one product at a time
#[derive(Debug, Default)]
pub struct ScalarCrossProduct;

impl CrossProductKernel for ScalarCrossProduct {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn accumulate(&self, block: &[f64], cols: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), cols * cols);
        for row in block.chunks_exact(cols) {
            for (i, &xi) in row.iter().enumerate() {
                let out_row = &mut out[i * cols..(i + 1) * cols];
                for (o, &xj) in out_row.iter_mut().zip(row) {
                    *o += xi * xj;
                }
            }
        }
    }
}

/// Inner loop unrolled by `LANES` so it vectorizes at that width
#[derive(Debug, Default)]
pub struct UnrolledCrossProduct<const LANES: usize>;

impl<const LANES: usize> CrossProductKernel for UnrolledCrossProduct<LANES> {
    fn name(&self) -> &'static str {
        match LANES {
            2 => "unrolled-2",
            4 => "unrolled-4",
            8 => "unrolled-8",
            _ => "unrolled",
        }
    }

    fn accumulate(&self, block: &[f64], cols: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), cols * cols);
        for row in block.chunks_exact(cols) {
            for (i, &xi) in row.iter().enumerate() {
                let out_row = &mut out[i * cols..(i + 1) * cols];
                let mut out_chunks = out_row.chunks_exact_mut(LANES);
                let mut row_chunks = row.chunks_exact(LANES);
                for (o, r) in (&mut out_chunks).zip(&mut row_chunks) {
                    for lane in 0..LANES {
                        o[lane] += xi * r[lane];
                    }
                }
                for (o, &xj) in out_chunks
                    .into_remainder()
                    .iter_mut()
                    .zip(row_chunks.remainder())
                {
                    *o += xi * xj;
                }
            }
        }
    }
}

/// Splits the rows of large blocks across the rayon pool
#[cfg(feature = "rayon")]
pub struct ParallelCrossProduct {
    inner: Box<dyn CrossProductKernel>,
    rows_per_task: usize,
}

#[cfg(feature = "rayon")]
impl ParallelCrossProduct {
    /// Wrap `inner`, giving each task `rows_per_task` rows
    pub fn new(inner: Box<dyn CrossProductKernel>, rows_per_task: usize) -> Self {
        Self {
            inner,
            rows_per_task: rows_per_task.max(1),
        }
    }
}

#[cfg(feature = "rayon")]
impl CrossProductKernel for ParallelCrossProduct {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn accumulate(&self, block: &[f64], cols: usize, out: &mut [f64]) {
        use rayon::prelude::*;

        let task_len = self.rows_per_task * cols;
        if block.len() <= task_len {
            self.inner.accumulate(block, cols, out);
            return;
        }
        let partials: Vec<Vec<f64>> = block
            .par_chunks(task_len)
            .map(|rows| {
                let mut local = vec![0.0; cols * cols];
                self.inner.accumulate(rows, cols, &mut local);
                local
            })
            .collect();
        for partial in &partials {
            for (o, p) in out.iter_mut().zip(partial) {
                *o += p;
            }
        }
    }
}

type KernelFactory<K> = fn() -> Box<K>;

/// Kernel variants keyed by the capability they require
pub struct KernelRegistry<K: ?Sized> {
    entries: Vec<(CpuCapability, KernelFactory<K>)>,
}

impl<K: ?Sized> KernelRegistry<K> {
    /// Registry with no variants
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a variant usable from `capability` upwards
    pub fn register(mut self, capability: CpuCapability, factory: KernelFactory<K>) -> Self {
        self.entries.push((capability, factory));
        self
    }

    /// Instantiate the most capable variant `capability` can run
    pub fn resolve(&self, capability: CpuCapability) -> Option<Box<K>> {
        self.entries
            .iter()
            .filter(|(required, _)| *required <= capability)
            .max_by_key(|(required, _)| *required)
            .map(|(_, factory)| factory())
    }
}

impl<K: ?Sized> Default for KernelRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

fn boxed<K: CrossProductKernel + Default + 'static>() -> Box<dyn CrossProductKernel> {
    Box::new(K::default())
}

/// Registry of the built-in cross-product variants
pub fn cross_product_registry() -> KernelRegistry<dyn CrossProductKernel> {
    KernelRegistry::new()
        .register(CpuCapability::Scalar, boxed::<ScalarCrossProduct>)
        .register(CpuCapability::Vector128, boxed::<UnrolledCrossProduct<2>>)
        .register(CpuCapability::Vector256, boxed::<UnrolledCrossProduct<4>>)
        .register(CpuCapability::Vector512, boxed::<UnrolledCrossProduct<8>>)
}

#[cfg(feature = "rayon")]
const ROWS_PER_TASK: usize = 4096;

static CROSS_PRODUCT: OnceLock<Box<dyn CrossProductKernel>> = OnceLock::new();

/// Cross-product kernel for this process
pub fn cross_product_kernel() -> &'static dyn CrossProductKernel {
    CROSS_PRODUCT
        .get_or_init(|| {
            let capability = detect_capability();
            let kernel = cross_product_registry()
                .resolve(capability)
                .unwrap_or_else(|| Box::new(ScalarCrossProduct));
            tracing::debug!(%capability, kernel = kernel.name(), "resolved cross-product kernel");
            #[cfg(feature = "rayon")]
            let kernel: Box<dyn CrossProductKernel> =
                Box::new(ParallelCrossProduct::new(kernel, ROWS_PER_TASK));
            kernel
        })
        .as_ref()
}
