//! Dot-product kernels for dense layers.
//!
//! The accelerated kernel is selected at runtime; the scalar kernel is always available and
//! is what the engine uses when acceleration is disabled.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotKernel {
    Scalar,
    #[cfg(target_arch = "x86_64")]
    Avx2Fma,
}

impl DotKernel {
    /// Best kernel for this CPU.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx2") && std::is_x86_feature_detected!("fma") {
                return DotKernel::Avx2Fma;
            }
        }

        DotKernel::Scalar
    }

    pub fn select(use_acceleration: bool) -> Self {
        if use_acceleration {
            Self::detect()
        } else {
            DotKernel::Scalar
        }
    }

    /// Dot product of the common prefix of `a` and `b`.
    #[inline]
    pub fn dot(self, a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);
        match self {
            DotKernel::Scalar => dot_scalar(a, b),
            #[cfg(target_arch = "x86_64")]
            // SAFETY: this variant is only produced by `detect` after checking avx2 and fma.
            DotKernel::Avx2Fma => unsafe { dot_avx2_fma(a, b) },
        }
    }
}

#[inline]
fn dot_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut sums = [0.0f32; 4];
    let mut a_chunks = a.chunks_exact(4);
    let mut b_chunks = b.chunks_exact(4);
    for (ca, cb) in a_chunks.by_ref().zip(b_chunks.by_ref()) {
        for lane in 0..4 {
            sums[lane] = ca[lane].mul_add(cb[lane], sums[lane]);
        }
    }

    let mut sum = (sums[0] + sums[1]) + (sums[2] + sums[3]);
    for (&x, &y) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        sum = x.mul_add(y, sum);
    }
    sum
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
#[allow(unused_unsafe)]
unsafe fn dot_avx2_fma(a: &[f32], b: &[f32]) -> f32 {
    use core::arch::x86_64::*;

    let len = a.len();
    let mut i = 0usize;
    // SAFETY: i + 8 <= len for both slices; loads are unaligned and `lanes` holds 8 floats.
    let lanes = unsafe {
        let mut acc = _mm256_setzero_ps();
        while i + 8 <= len {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            acc = _mm256_fmadd_ps(va, vb, acc);
            i += 8;
        }
        let mut lanes = [0.0f32; 8];
        _mm256_storeu_ps(lanes.as_mut_ptr(), acc);
        lanes
    };

    let mut sum = lanes.iter().sum::<f32>();
    for j in i..len {
        sum = a[j].mul_add(b[j], sum);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_scalar_matches_reference() {
        let a: Vec<f32> = (0..19).map(|i| i as f32 * 0.25).collect();
        let b: Vec<f32> = (0..19).map(|i| 1.0 - i as f32 * 0.1).collect();
        let result = DotKernel::Scalar.dot(&a, &b);
        assert!((result - reference(&a, &b)).abs() < 1e-4);
    }

    #[test]
    fn test_detected_kernel_matches_scalar() {
        let a: Vec<f32> = (0..37).map(|i| (i as f32 * 0.3).sin()).collect();
        let b: Vec<f32> = (0..37).map(|i| (i as f32 * 0.7).cos()).collect();
        let scalar = DotKernel::Scalar.dot(&a, &b);
        let detected = DotKernel::detect().dot(&a, &b);
        assert!((scalar - detected).abs() < 1e-4);
    }

    #[test]
    fn test_disabled_acceleration_selects_scalar() {
        assert_eq!(DotKernel::select(false), DotKernel::Scalar);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(DotKernel::Scalar.dot(&[], &[]), 0.0);
    }
}
