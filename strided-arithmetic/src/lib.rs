//! Strided, reference-counted numeric vectors backed by pluggable memory resources.
//!
//! A [`Vector`] either owns its elements (in a buffer obtained from a
//! [`MemoryResource`](memory_resource::MemoryResource) and shared between clones) or views memory
//! borrowed from the caller, optionally with a stride between consecutive elements.

pub mod error;
pub mod linear_algebra;
pub mod memory_resource;
pub mod traits;

pub use error::{AllocError, Result, VectorError};
pub use linear_algebra::Vector;
pub use memory_resource::{MemoryResource, ResourceRef};
pub use traits::ScalarTraits;

/// Creates a [`Vector`] holding the given elements, allocated from the default memory resource.
/// Evaluates to `Result<Vector<T>, VectorError>`.
///
/// ```
/// use strided_arithmetic::vector;
///
/// let v = vector![1.0, 2.0, 3.0].unwrap();
/// assert_eq!(v.len(), 3);
/// ```
#[macro_export]
macro_rules! vector {
    () => {
        $crate::linear_algebra::Vector::from_values(&[])
    };
    ($($x:expr),+ $(,)?) => {
        $crate::linear_algebra::Vector::from_values(&[$($x),+])
    };
}
