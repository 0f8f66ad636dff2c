mod arithmetic;
pub mod inner_products;
pub mod iter;
#[cfg(feature = "serde")]
mod serialization;
mod storage;
mod vector;

pub use arithmetic::{linear_combination, LinearOps};
pub use inner_products::{inner_product, norm};
pub use iter::{Cursor, CursorMut, Iter, IterMut};
pub use vector::Vector;

pub trait Scalar: nalgebra::Scalar {}
impl<T: nalgebra::Scalar> Scalar for T {}
