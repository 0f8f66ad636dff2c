use std::ops::Neg;

use nalgebra::Complex;
use num_traits::Float;

/// Per-type scalar capabilities, resolved at compile time.
///
/// Implemented for the real float types, the integer types, `Complex<f32|f64>`, and for references
/// to any of those, in which case [`ScalarTraits::Value`] is the referenced type itself.
pub trait ScalarTraits {
    /// The canonical value type, with references stripped.
    type Value;
    /// The type of [`ScalarTraits::abs`], i.e. the underlying real type.
    type Real;

    /// Complex conjugate; the identity for real types.
    fn conj(&self) -> Self::Value;

    /// Absolute value, or modulus for complex types.
    fn abs(&self) -> Self::Real;
}

pub type ValueOf<T> = <T as ScalarTraits>::Value;
pub type RealOf<T> = <T as ScalarTraits>::Real;

macro_rules! impl_scalar_traits_float {
    ($($t:ty),*) => {
        $(impl ScalarTraits for $t {
            type Value = $t;
            type Real = $t;

            #[inline]
            fn conj(&self) -> $t {
                *self
            }

            #[inline]
            fn abs(&self) -> $t {
                Float::abs(*self)
            }
        })*
    };
}

macro_rules! impl_scalar_traits_signed {
    ($($t:ty),*) => {
        $(impl ScalarTraits for $t {
            type Value = $t;
            type Real = $t;

            #[inline]
            fn conj(&self) -> $t {
                *self
            }

            #[inline]
            fn abs(&self) -> $t {
                <$t>::abs(*self)
            }
        })*
    };
}

macro_rules! impl_scalar_traits_unsigned {
    ($($t:ty),*) => {
        $(impl ScalarTraits for $t {
            type Value = $t;
            type Real = $t;

            #[inline]
            fn conj(&self) -> $t {
                *self
            }

            #[inline]
            fn abs(&self) -> $t {
                *self
            }
        })*
    };
}

impl_scalar_traits_float!(f32, f64);
impl_scalar_traits_signed!(i8, i16, i32, i64, i128, isize);
impl_scalar_traits_unsigned!(u8, u16, u32, u64, u128, usize);

impl<T: Float> ScalarTraits for Complex<T> {
    type Value = Complex<T>;
    type Real = T;

    #[inline]
    fn conj(&self) -> Complex<T> {
        Complex::conj(self)
    }

    #[inline]
    fn abs(&self) -> T {
        self.norm()
    }
}

impl<T: ScalarTraits + ?Sized> ScalarTraits for &T {
    type Value = T::Value;
    type Real = T::Real;

    #[inline]
    fn conj(&self) -> T::Value {
        T::conj(*self)
    }

    #[inline]
    fn abs(&self) -> T::Real {
        T::abs(*self)
    }
}

impl<T: ScalarTraits + ?Sized> ScalarTraits for &mut T {
    type Value = T::Value;
    type Real = T::Real;

    #[inline]
    fn conj(&self) -> T::Value {
        T::conj(&**self)
    }

    #[inline]
    fn abs(&self) -> T::Real {
        T::abs(&**self)
    }
}

pub trait ClosedAdd: nalgebra::ClosedAddAssign {}
impl<T> ClosedAdd for T where T: nalgebra::ClosedAddAssign {}

pub trait ClosedSub: nalgebra::ClosedSubAssign {}
impl<T> ClosedSub for T where T: nalgebra::ClosedSubAssign {}

pub trait ClosedMul: nalgebra::ClosedMulAssign {}
impl<T> ClosedMul for T where T: nalgebra::ClosedMulAssign {}

pub trait ClosedNeg: Sized + Neg<Output = Self> {}
impl<T> ClosedNeg for T where T: Neg<Output = T> {}

pub trait WithL2Norm {
    type Norm;

    fn l2_norm(&self) -> Self::Norm;
}

pub trait WithLinfNorm {
    type Norm;

    fn linf_norm(&self) -> Self::Norm;
}
