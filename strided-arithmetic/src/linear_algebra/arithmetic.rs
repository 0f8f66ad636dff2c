use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::error::{Result, VectorError};
use crate::linear_algebra::Vector;
use crate::memory_resource::{default_resource, ResourceRef};
use crate::traits::{ClosedAdd, ClosedMul, ClosedNeg, ClosedSub};

impl<'a, T> Vector<'a, T> {
    fn resource_or_default(&self) -> ResourceRef {
        self.resource().cloned().unwrap_or_else(default_resource)
    }

    /// Applies `f` to every element, collecting the results into fresh contiguous storage from this
    /// vector's resource (the default resource for external or empty vectors).
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Result<Vector<'static, U>> {
        self.map_in(self.resource_or_default(), f)
    }

    pub fn map_in<U>(&self, resource: ResourceRef, f: impl FnMut(&T) -> U) -> Result<Vector<'static, U>> {
        Vector::from_exact_iter_in(self.len(), resource, self.iter().map(f))
    }

    /// Element-wise `f(self[i], rhs[i])`. Fails with [`VectorError::LengthMismatch`] if the lengths
    /// differ.
    pub fn zip_map<U, V>(
        &self,
        rhs: &Vector<'_, U>,
        mut f: impl FnMut(&T, &U) -> V,
    ) -> Result<Vector<'static, V>> {
        if self.len() != rhs.len() {
            return Err(VectorError::LengthMismatch {
                left: self.len(),
                right: rhs.len(),
            });
        }
        Vector::from_exact_iter_in(
            self.len(),
            self.resource_or_default(),
            self.iter().zip(rhs.iter()).map(|(a, b)| f(a, b)),
        )
    }

    pub fn try_add(&self, rhs: &Vector<'_, T>) -> Result<Vector<'static, T>>
    where
        T: Clone + ClosedAdd,
    {
        self.zip_map(rhs, |a, b| a.clone() + b.clone())
    }

    pub fn try_sub(&self, rhs: &Vector<'_, T>) -> Result<Vector<'static, T>>
    where
        T: Clone + ClosedSub,
    {
        self.zip_map(rhs, |a, b| a.clone() - b.clone())
    }

    pub fn try_neg(&self) -> Result<Vector<'static, T>>
    where
        T: Clone + ClosedNeg,
    {
        self.map(|a| -a.clone())
    }

    /// `k * self[i]` for every element.
    pub fn scale(&self, k: &T) -> Result<Vector<'static, T>>
    where
        T: Clone + ClosedMul,
    {
        self.map(|a| k.clone() * a.clone())
    }
}

/// Implement `&Vector op &Vector` and `Vector op Vector` in terms of the fallible method
macro_rules! impl_binop {
    ($op:ident, $OpTrait:ident, $try_op:ident, $Closed:ident) => {
        impl<'b, T: Clone + $Closed> $OpTrait<&Vector<'b, T>> for &Vector<'_, T> {
            type Output = Vector<'static, T>;

            fn $op(self, rhs: &Vector<'b, T>) -> Self::Output {
                self.$try_op(rhs)
                    .unwrap_or_else(|e| panic!("vector {} failed: {e}", stringify!($op)))
            }
        }

        impl<'b, T: Clone + $Closed> $OpTrait<Vector<'b, T>> for Vector<'_, T> {
            type Output = Vector<'static, T>;

            fn $op(self, rhs: Vector<'b, T>) -> Self::Output {
                $OpTrait::$op(&self, &rhs)
            }
        }
    };
}

impl_binop!(add, Add, try_add, ClosedAdd);
impl_binop!(sub, Sub, try_sub, ClosedSub);

/// Implement in-place `Vector op= &Vector`. Panics if the lengths differ or `self` is not unique,
/// so `rhs` never aliases `self`.
macro_rules! impl_binop_assign {
    ($op:ident, $OpTrait:ident, $Closed:ident) => {
        impl<'b, T: Clone + $Closed> $OpTrait<&Vector<'b, T>> for Vector<'_, T> {
            fn $op(&mut self, rhs: &Vector<'b, T>) {
                assert_eq!(
                    self.len(),
                    rhs.len(),
                    "vector {} on vectors of different lengths",
                    stringify!($op)
                );
                for (x, r) in self.iter_mut().zip(rhs.iter()) {
                    x.$op(r.clone());
                }
            }
        }
    };
}

impl_binop_assign!(add_assign, AddAssign, ClosedAdd);
impl_binop_assign!(sub_assign, SubAssign, ClosedSub);

impl<T: Clone + ClosedNeg> Neg for &Vector<'_, T> {
    type Output = Vector<'static, T>;

    fn neg(self) -> Self::Output {
        self.try_neg()
            .unwrap_or_else(|e| panic!("vector neg failed: {e}"))
    }
}

impl<T: Clone + ClosedNeg> Neg for Vector<'_, T> {
    type Output = Vector<'static, T>;

    fn neg(self) -> Self::Output {
        -&self
    }
}

impl<T: Clone + ClosedMul> Mul<T> for &Vector<'_, T> {
    type Output = Vector<'static, T>;

    fn mul(self, k: T) -> Self::Output {
        self.scale(&k)
            .unwrap_or_else(|e| panic!("vector mul failed: {e}"))
    }
}

impl<T: Clone + ClosedMul> Mul<T> for Vector<'_, T> {
    type Output = Vector<'static, T>;

    fn mul(self, k: T) -> Self::Output {
        &self * k
    }
}

/// Panics if `self` is not unique.
impl<T: Clone + ClosedMul> MulAssign<T> for Vector<'_, T> {
    fn mul_assign(&mut self, k: T) {
        for x in self.iter_mut() {
            *x = k.clone() * x.clone();
        }
    }
}

/// Element-wise addition and scaling, the shared arithmetic of every vector flavour.
pub trait LinearOps {
    type Scalar;

    fn dim(&self) -> usize;

    /// `self[i] += k * other[i]` for every element.
    fn add_scaled(&mut self, k: &Self::Scalar, other: &Self) -> Result<()>;

    /// `self[i] = k * self[i]` for every element. Vectors panic if their storage is shared.
    fn scale_mut(&mut self, k: &Self::Scalar);
}

impl<T: Clone + ClosedAdd + ClosedMul> LinearOps for Vector<'_, T> {
    type Scalar = T;

    fn dim(&self) -> usize {
        self.len()
    }

    fn add_scaled(&mut self, k: &T, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(VectorError::LengthMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        if !self.is_unique() {
            return Err(VectorError::SharedStorage);
        }
        for (x, y) in self.iter_mut().zip(other.iter()) {
            *x += k.clone() * y.clone();
        }
        Ok(())
    }

    fn scale_mut(&mut self, k: &T) {
        *self *= k.clone();
    }
}

impl<T: Clone + ClosedAdd + ClosedMul, const N: usize> LinearOps for [T; N] {
    type Scalar = T;

    fn dim(&self) -> usize {
        N
    }

    fn add_scaled(&mut self, k: &T, other: &Self) -> Result<()> {
        for (x, y) in self.iter_mut().zip(other) {
            *x += k.clone() * y.clone();
        }
        Ok(())
    }

    fn scale_mut(&mut self, k: &T) {
        for x in self.iter_mut() {
            *x = k.clone() * x.clone();
        }
    }
}

/// Accumulates `Σ k_i * v_i` into `acc`.
pub fn linear_combination<'t, V>(
    acc: &mut V,
    terms: impl IntoIterator<Item = (&'t V::Scalar, &'t V)>,
) -> Result<()>
where
    V: LinearOps + 't,
    V::Scalar: 't,
{
    for (k, v) in terms {
        acc.add_scaled(k, v)?;
    }
    Ok(())
}
