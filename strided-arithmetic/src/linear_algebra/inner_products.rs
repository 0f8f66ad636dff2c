use num_traits::{Float, One, Zero};

use crate::error::{Result, VectorError};
use crate::linear_algebra::{Scalar, Vector};
use crate::traits::{ClosedAdd, ClosedMul, RealOf, ScalarTraits, WithL2Norm, WithLinfNorm};

/// Compute $\sum_i \mathrm{lhs}_i \cdot \overline{\mathrm{rhs}_i}$, i.e. linear in the left and
/// conjugate-linear in the right argument. Zero for empty vectors.
pub fn inner_product<T>(lhs: &Vector<'_, T>, rhs: &Vector<'_, T>) -> Result<T>
where
    T: Scalar + ScalarTraits<Value = T> + Zero + ClosedAdd + ClosedMul,
{
    if lhs.len() != rhs.len() {
        return Err(VectorError::LengthMismatch {
            left: lhs.len(),
            right: rhs.len(),
        });
    }
    Ok(lhs
        .iter()
        .zip(rhs.iter())
        .fold(T::zero(), |acc, (a, b)| acc + a.clone() * b.conj()))
}

/// Compute the $p$-norm $(\sum_i |v_i|^p)^{1/p}$. `p` may be infinite, giving the maximum norm.
pub fn norm<T>(v: &Vector<'_, T>, p: RealOf<T>) -> Result<RealOf<T>>
where
    T: ScalarTraits,
    RealOf<T>: Float,
{
    // also rejects NaN
    if !(p >= RealOf::<T>::one()) {
        return Err(VectorError::InvalidNormOrder);
    }
    if p.is_infinite() {
        return Ok(max_abs(v));
    }
    let sum = v
        .iter()
        .fold(RealOf::<T>::zero(), |acc, x| acc + x.abs().powf(p));
    Ok(sum.powf(p.recip()))
}

fn max_abs<T>(v: &Vector<'_, T>) -> RealOf<T>
where
    T: ScalarTraits,
    RealOf<T>: Float,
{
    v.iter()
        .map(ScalarTraits::abs)
        .fold(RealOf::<T>::zero(), Float::max)
}

impl<T> WithL2Norm for Vector<'_, T>
where
    T: ScalarTraits,
    RealOf<T>: Float,
{
    type Norm = RealOf<T>;

    fn l2_norm(&self) -> RealOf<T> {
        self.iter()
            .fold(RealOf::<T>::zero(), |acc, x| {
                let a = x.abs();
                acc + a * a
            })
            .sqrt()
    }
}

impl<T> WithLinfNorm for Vector<'_, T>
where
    T: ScalarTraits,
    RealOf<T>: Float,
{
    type Norm = RealOf<T>;

    fn linf_norm(&self) -> RealOf<T> {
        max_abs(self)
    }
}
