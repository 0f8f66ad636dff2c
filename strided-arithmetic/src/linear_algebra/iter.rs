//! Strided traversal of a [`Vector`].
//!
//! [`Iter`] and [`IterMut`] plug into Rust's iterator protocol (double-ended, exact-size, O(1)
//! `nth`). [`Cursor`] and [`CursorMut`] are position-plus-stride values for random-access style
//! code: they can be offset by any amount, compared, subtracted, and only touch memory when
//! dereferenced inside `[0, len)`. Advancing by one always moves `step` slots in the buffer.

use std::cmp::Ordering;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::ptr;

use crate::linear_algebra::Vector;

pub struct Iter<'v, T> {
    ptr: *const T,
    step: usize,
    front: usize,
    back: usize,
    _marker: PhantomData<&'v T>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

impl<'v, T> Iterator for Iter<'v, T> {
    type Item = &'v T;

    #[inline]
    fn next(&mut self) -> Option<&'v T> {
        if self.front == self.back {
            return None;
        }
        // SAFETY: front < back <= len
        let item = unsafe { &*self.ptr.add(self.front * self.step) };
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<&'v T> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }

    fn count(self) -> usize {
        self.len()
    }

    fn last(mut self) -> Option<&'v T> {
        self.next_back()
    }
}

impl<'v, T> DoubleEndedIterator for Iter<'v, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'v T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        // SAFETY: front <= back < len
        Some(unsafe { &*self.ptr.add(self.back * self.step) })
    }

    #[inline]
    fn nth_back(&mut self, n: usize) -> Option<&'v T> {
        self.back = self.back.saturating_sub(n).max(self.front);
        self.next_back()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

pub struct IterMut<'v, T> {
    ptr: *mut T,
    step: usize,
    front: usize,
    back: usize,
    _marker: PhantomData<&'v mut T>,
}

impl<'v, T> Iterator for IterMut<'v, T> {
    type Item = &'v mut T;

    #[inline]
    fn next(&mut self) -> Option<&'v mut T> {
        if self.front == self.back {
            return None;
        }
        // SAFETY: front < back <= len, and every position is handed out at most once
        let item = unsafe { &mut *self.ptr.add(self.front * self.step) };
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }

    #[inline]
    fn nth(&mut self, n: usize) -> Option<&'v mut T> {
        self.front = self.front.saturating_add(n).min(self.back);
        self.next()
    }
}

impl<'v, T> DoubleEndedIterator for IterMut<'v, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'v mut T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        // SAFETY: front <= back < len, and every position is handed out at most once
        Some(unsafe { &mut *self.ptr.add(self.back * self.step) })
    }

    #[inline]
    fn nth_back(&mut self, n: usize) -> Option<&'v mut T> {
        self.back = self.back.saturating_sub(n).max(self.front);
        self.next_back()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

/// Read-only position in a vector. Positions outside `[0, len)` are allowed (`end()` is one
/// step past the last element) but cannot be dereferenced.
pub struct Cursor<'v, T> {
    base: *const T,
    index: isize,
    len: usize,
    step: usize,
    _marker: PhantomData<&'v T>,
}

impl<T> Clone for Cursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Cursor<'_, T> {}

impl<T> Default for Cursor<'_, T> {
    fn default() -> Self {
        Self {
            base: ptr::null(),
            index: 0,
            len: 0,
            step: 1,
            _marker: PhantomData,
        }
    }
}

impl<'v, T> Cursor<'v, T> {
    /// Logical position (in elements).
    #[inline]
    pub fn index(&self) -> isize {
        self.index
    }

    /// Position in the underlying buffer (in slots).
    #[inline]
    pub fn raw_position(&self) -> isize {
        self.index * self.step as isize
    }

    #[inline]
    pub fn is_dereferenceable(&self) -> bool {
        self.index >= 0 && (self.index as usize) < self.len
    }

    /// The element under the cursor.
    pub fn get(&self) -> Option<&'v T> {
        // SAFETY: 0 <= index < len
        self.is_dereferenceable()
            .then(|| unsafe { &*self.base.add(self.index as usize * self.step) })
    }

    /// The element `n` positions away from the cursor.
    pub fn offset(&self, n: isize) -> Option<&'v T> {
        (*self + n).get()
    }

    /// Advance by one element.
    pub fn move_next(&mut self) -> &mut Self {
        self.index += 1;
        self
    }

    /// Step back by one element.
    pub fn move_prev(&mut self) -> &mut Self {
        self.index -= 1;
        self
    }

    /// Advance by one element, returning the cursor as it was before.
    pub fn post_inc(&mut self) -> Self {
        let old = *self;
        self.index += 1;
        old
    }

    /// Step back by one element, returning the cursor as it was before.
    pub fn post_dec(&mut self) -> Self {
        let old = *self;
        self.index -= 1;
        old
    }
}

impl<T> Add<isize> for Cursor<'_, T> {
    type Output = Self;

    fn add(mut self, n: isize) -> Self {
        self.index += n;
        self
    }
}

impl<'v, T> Add<Cursor<'v, T>> for isize {
    type Output = Cursor<'v, T>;

    fn add(self, cursor: Cursor<'v, T>) -> Cursor<'v, T> {
        cursor + self
    }
}

impl<T> Sub<isize> for Cursor<'_, T> {
    type Output = Self;

    fn sub(mut self, n: isize) -> Self {
        self.index -= n;
        self
    }
}

impl<T> AddAssign<isize> for Cursor<'_, T> {
    fn add_assign(&mut self, n: isize) {
        self.index += n;
    }
}

impl<T> SubAssign<isize> for Cursor<'_, T> {
    fn sub_assign(&mut self, n: isize) {
        self.index -= n;
    }
}

/// Distance in elements between two cursors over the same vector.
impl<'v, T> Sub for Cursor<'v, T> {
    type Output = isize;

    fn sub(self, rhs: Self) -> isize {
        debug_assert!(ptr::eq(self.base, rhs.base) && self.step == rhs.step);
        (self.raw_position() - rhs.raw_position()) / self.step as isize
    }
}

impl<'w, T> PartialEq<Cursor<'w, T>> for Cursor<'_, T> {
    fn eq(&self, other: &Cursor<'w, T>) -> bool {
        ptr::eq(self.base, other.base) && self.raw_position() == other.raw_position()
    }
}

impl<T> Eq for Cursor<'_, T> {}

impl<'w, T> PartialOrd<Cursor<'w, T>> for Cursor<'_, T> {
    fn partial_cmp(&self, other: &Cursor<'w, T>) -> Option<Ordering> {
        Some(
            self.raw_position()
                .cmp(&other.raw_position())
                .then((self.base as usize).cmp(&(other.base as usize))),
        )
    }
}

impl<T> Ord for Cursor<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw_position()
            .cmp(&other.raw_position())
            .then((self.base as usize).cmp(&(other.base as usize)))
    }
}

impl<T> std::fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("index", &self.index)
            .field("len", &self.len)
            .field("step", &self.step)
            .finish()
    }
}

/// Read/write position in a vector.
pub struct CursorMut<'v, T> {
    base: *mut T,
    index: isize,
    len: usize,
    step: usize,
    _marker: PhantomData<&'v mut T>,
}

impl<'v, T> CursorMut<'v, T> {
    #[inline]
    pub fn index(&self) -> isize {
        self.index
    }

    #[inline]
    pub fn raw_position(&self) -> isize {
        self.index * self.step as isize
    }

    #[inline]
    pub fn is_dereferenceable(&self) -> bool {
        self.index >= 0 && (self.index as usize) < self.len
    }

    pub fn get(&self) -> Option<&T> {
        self.as_cursor().get()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.is_dereferenceable() {
            // SAFETY: 0 <= index < len, and the result borrows the cursor mutably
            Some(unsafe { &mut *self.base.add(self.index as usize * self.step) })
        } else {
            None
        }
    }

    /// The element `n` positions away from the cursor.
    pub fn offset_mut(&mut self, n: isize) -> Option<&mut T> {
        self.index += n;
        let is_valid = self.is_dereferenceable();
        let slot = (self.index as usize).wrapping_mul(self.step);
        self.index -= n;
        // SAFETY: the position was checked to be inside [0, len)
        is_valid.then(|| unsafe { &mut *self.base.add(slot) })
    }

    pub fn move_next(&mut self) -> &mut Self {
        self.index += 1;
        self
    }

    pub fn move_prev(&mut self) -> &mut Self {
        self.index -= 1;
        self
    }

    /// Advance by one element, returning a read-only cursor at the previous position.
    pub fn post_inc(&mut self) -> Cursor<'_, T> {
        self.index += 1;
        self.as_cursor() - 1
    }

    /// Step back by one element, returning a read-only cursor at the previous position.
    pub fn post_dec(&mut self) -> Cursor<'_, T> {
        self.index -= 1;
        self.as_cursor() + 1
    }

    /// A read-only cursor at the same position, borrowing this one.
    pub fn as_cursor(&self) -> Cursor<'_, T> {
        Cursor {
            base: self.base,
            index: self.index,
            len: self.len,
            step: self.step,
            _marker: PhantomData,
        }
    }
}

impl<'v, T> From<CursorMut<'v, T>> for Cursor<'v, T> {
    fn from(cursor: CursorMut<'v, T>) -> Self {
        Cursor {
            base: cursor.base,
            index: cursor.index,
            len: cursor.len,
            step: cursor.step,
            _marker: PhantomData,
        }
    }
}

impl<T> Add<isize> for CursorMut<'_, T> {
    type Output = Self;

    fn add(mut self, n: isize) -> Self {
        self.index += n;
        self
    }
}

impl<'v, T> Add<CursorMut<'v, T>> for isize {
    type Output = CursorMut<'v, T>;

    fn add(self, cursor: CursorMut<'v, T>) -> CursorMut<'v, T> {
        cursor + self
    }
}

impl<T> Sub<isize> for CursorMut<'_, T> {
    type Output = Self;

    fn sub(mut self, n: isize) -> Self {
        self.index -= n;
        self
    }
}

impl<T> AddAssign<isize> for CursorMut<'_, T> {
    fn add_assign(&mut self, n: isize) {
        self.index += n;
    }
}

impl<T> SubAssign<isize> for CursorMut<'_, T> {
    fn sub_assign(&mut self, n: isize) {
        self.index -= n;
    }
}

impl<T> std::fmt::Debug for CursorMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorMut")
            .field("index", &self.index)
            .field("len", &self.len)
            .field("step", &self.step)
            .finish()
    }
}

/// Distance in elements from a cursor over the same vector.
impl<'w, T> Sub<Cursor<'w, T>> for &CursorMut<'_, T> {
    type Output = isize;

    fn sub(self, rhs: Cursor<'w, T>) -> isize {
        self.as_cursor() - rhs
    }
}

impl<'w, T> Sub<&CursorMut<'w, T>> for &CursorMut<'_, T> {
    type Output = isize;

    fn sub(self, rhs: &CursorMut<'w, T>) -> isize {
        self.as_cursor() - rhs.as_cursor()
    }
}

impl<'w, T> PartialEq<CursorMut<'w, T>> for CursorMut<'_, T> {
    fn eq(&self, other: &CursorMut<'w, T>) -> bool {
        self.as_cursor() == other.as_cursor()
    }
}

impl<T> Eq for CursorMut<'_, T> {}

impl<'w, T> PartialOrd<CursorMut<'w, T>> for CursorMut<'_, T> {
    fn partial_cmp(&self, other: &CursorMut<'w, T>) -> Option<Ordering> {
        self.as_cursor().partial_cmp(&other.as_cursor())
    }
}

impl<T> Ord for CursorMut<'_, T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_cursor().cmp(&other.as_cursor())
    }
}

impl<'w, T> PartialEq<Cursor<'w, T>> for CursorMut<'_, T> {
    fn eq(&self, other: &Cursor<'w, T>) -> bool {
        self.as_cursor() == *other
    }
}

impl<'w, T> PartialOrd<Cursor<'w, T>> for CursorMut<'_, T> {
    fn partial_cmp(&self, other: &Cursor<'w, T>) -> Option<Ordering> {
        self.as_cursor().partial_cmp(other)
    }
}

impl<'a, T> Vector<'a, T> {
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ptr: self.as_ptr(),
            step: self.step(),
            front: 0,
            back: self.len(),
            _marker: PhantomData,
        }
    }

    /// # Panics
    ///
    /// If the vector is not unique, see [`Vector::is_unique`].
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        assert!(self.is_unique(), "mutable access to shared vector storage");
        IterMut {
            step: self.step(),
            front: 0,
            back: self.len(),
            ptr: self.as_mut_ptr(),
            _marker: PhantomData,
        }
    }

    fn cursor_at(&self, index: usize) -> Cursor<'_, T> {
        Cursor {
            base: self.as_ptr(),
            index: index as isize,
            len: self.len(),
            step: self.step(),
            _marker: PhantomData,
        }
    }

    /// Cursor at the first element.
    pub fn begin(&self) -> Cursor<'_, T> {
        self.cursor_at(0)
    }

    /// Cursor one step past the last element.
    pub fn end(&self) -> Cursor<'_, T> {
        self.cursor_at(self.len())
    }

    /// Read/write cursor at the first element.
    ///
    /// # Panics
    ///
    /// If the vector is not unique, see [`Vector::is_unique`].
    pub fn begin_mut(&mut self) -> CursorMut<'_, T> {
        assert!(self.is_unique(), "mutable access to shared vector storage");
        CursorMut {
            index: 0,
            len: self.len(),
            step: self.step(),
            base: self.as_mut_ptr(),
            _marker: PhantomData,
        }
    }
}

impl<'v, T> IntoIterator for &'v Vector<'_, T> {
    type Item = &'v T;
    type IntoIter = Iter<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'v, T> IntoIterator for &'v mut Vector<'_, T> {
    type Item = &'v mut T;
    type IntoIter = IterMut<'v, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::vector;

    fn strided(buf: &mut [f32], step: usize) -> Vector<'_, f32> {
        Vector::from_external_strided(buf, step).unwrap()
    }

    #[test]
    fn test_iter_visits_strided_order() {
        let mut buf: Vec<f32> = (0..11).map(|i| i as f32).collect();
        let v = strided(&mut buf, 3);
        itertools::assert_equal(v.iter().copied(), [0.0, 3.0, 6.0, 9.0]);
        itertools::assert_equal(v.iter().rev().copied(), [9.0, 6.0, 3.0, 0.0]);
        assert_eq!(v.iter().len(), 4);
        assert_eq!(v.iter().count(), v.len());
        assert_eq!(v.iter().last(), Some(&9.0));
    }

    #[test]
    fn test_iter_random_access() {
        let v = Vector::<u32>::from_fn(10, |i| i as u32 * 2).unwrap();
        let mut it = v.iter();
        assert_eq!(it.nth(3), Some(&6));
        assert_eq!(it.next(), Some(&8));
        assert_eq!(it.nth_back(2), Some(&14));
        assert_eq!(it.len(), 2);
        assert_eq!(it.nth(5), None);
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);
    }

    #[test]
    fn test_iter_meets_in_the_middle() {
        let v = vector![1, 2, 3, 4, 5].unwrap();
        let mut it = v.iter();
        let mut seen = vec![];
        while let (Some(a), b) = (it.next(), it.next_back()) {
            seen.push(*a);
            if let Some(b) = b {
                seen.push(*b);
            }
        }
        assert_eq!(seen.into_iter().sorted().collect_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_iter_mut() {
        let mut buf = [1.0f32; 7];
        {
            let mut v = strided(&mut buf, 2);
            for (i, x) in (&mut v).into_iter().enumerate() {
                *x = i as f32 * 10.0;
            }
            let mut it = v.iter_mut();
            if let Some(last) = it.next_back() {
                *last += 1.0;
            }
        }
        assert_eq!(buf, [0.0, 1.0, 10.0, 1.0, 20.0, 1.0, 31.0]);
    }

    #[test]
    fn test_empty_iteration() {
        let v = Vector::<f64>::default();
        assert_eq!(v.iter().next(), None);
        assert_eq!(v.begin(), v.end());
        assert_eq!(v.end() - v.begin(), 0);
        assert_eq!(v.begin().get(), None);
    }

    #[test]
    fn test_cursor_distance() {
        for step in 1..5 {
            let mut buf = [0.0f32; 17];
            let v = strided(&mut buf, step);
            assert_eq!(v.end() - v.begin(), v.len() as isize);
            assert_eq!(v.begin() - v.end(), -(v.len() as isize));
            assert_eq!(v.end().raw_position(), (v.len() * step) as isize);
        }
    }

    #[test]
    fn test_cursor_navigation() {
        let v = Vector::<f64>::from_fn(5, |i| (i + 1) as f64 * 3.14).unwrap();
        let b = v.begin();
        let e = v.end();
        assert_eq!(b.get(), v.get(0));
        assert_ne!(b, e);
        assert!(b < e);
        assert!(e >= b);

        let mut tmp1 = v.begin();
        let mut tmp2 = tmp1;
        let before = tmp1.post_inc();
        let x = tmp2.get();
        tmp2.move_next();
        assert_eq!(before.get(), x);
        assert_eq!(tmp1, tmp2);

        assert_eq!((b + 2).get(), Some(&(3.0 * 3.14)));
        assert_eq!((2isize + b).get(), (b + 2).get());
        assert_eq!(b.offset(4), v.get(4));
        assert_eq!(b.offset(5), None);
        assert_eq!((e - 1).get(), v.get(4));
        assert_eq!(b.offset(-1), None);

        let mut c = e;
        c -= 5;
        assert_eq!(c, b);
        c += 1;
        let prev = c.post_dec();
        assert_eq!(prev - c, 1);
        c.move_prev();
        assert_eq!(c.index(), -1);
        assert!(!c.is_dereferenceable());
    }

    #[test]
    fn test_cursor_ordering_follows_raw_position() {
        let mut buf = [0.0f32; 9];
        let v = strided(&mut buf, 4);
        let positions = (0..=v.len() as isize).map(|i| v.begin() + i).collect_vec();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(positions.iter().max(), Some(&v.end()));
        assert_eq!(positions[1].raw_position(), 4);
    }

    #[test]
    fn test_default_cursors_compare_equal() {
        let a = Cursor::<f32>::default();
        let b = a;
        assert_eq!(a, b);
        assert_eq!(a.get(), None);
    }

    #[test]
    fn test_cursor_mut() {
        let mut v = Vector::<i32>::new(4).unwrap();
        {
            let mut c = v.begin_mut();
            let mut i = 0;
            while let Some(x) = c.get_mut() {
                *x = i * i;
                i += 1;
                c.move_next();
            }
            assert_eq!(c.index(), 4);
            c -= 4;
            assert_eq!(c.offset_mut(2).map(|x| *x), Some(4));
            assert_eq!(c.offset_mut(4), None);
            assert_eq!(c.get(), Some(&0));

            c += 1;
            let ro: Cursor<'_, i32> = c.into();
            assert_eq!(ro.get(), Some(&1));
        }
        assert_eq!(v.as_slice(), Some(&[0, 1, 4, 9][..]));

        let end = v.end().index();
        let mut c = v.begin_mut();
        c += end;
        assert!(!c.is_dereferenceable());
        assert_eq!(c.as_cursor().index(), 4);

        let mut c = v.begin_mut() + 1;
        let before = c.post_inc();
        assert_eq!(before.index(), 1);
        assert_eq!(before.get(), Some(&1));
        assert_eq!(c.index(), 2);
        let before = c.post_dec();
        assert_eq!(before.get(), Some(&4));
        assert_eq!(c.index(), 1);

        let c = 3isize + (c - 1);
        assert_eq!(c.get(), Some(&9));
        assert_eq!(&c - start_of(&c), 3);
    }

    fn start_of<'c, T>(c: &'c CursorMut<'_, T>) -> Cursor<'c, T> {
        c.as_cursor() - c.index()
    }

    #[test]
    fn test_cursor_mut_distance_and_ordering() {
        let mut a = Vector::<i64>::from_fn(6, |i| i as i64).unwrap();
        let mut b = Vector::<i64>::new(6).unwrap();
        let ca = a.begin_mut() + 4;
        let cb = b.begin_mut() + 4;
        assert_eq!(&ca - &ca, 0);
        assert_eq!(&ca - (ca.as_cursor() - 3), 3);
        assert_ne!(ca, cb);
        assert_eq!(ca.partial_cmp(&cb).map(|o| o.is_eq()), Some(false));

        let mut a2 = Vector::<i64>::from_fn(6, |i| i as i64).unwrap();
        let mut lo = a2.begin_mut();
        lo += 1;
        assert!(lo.index() < ca.index());
        assert_eq!(lo.get(), Some(&1));
        assert!(ca == ca.as_cursor());
        assert_eq!(ca.cmp(&ca), Ordering::Equal);
    }

    #[test]
    #[should_panic(expected = "mutable access to shared vector storage")]
    fn test_iter_mut_rejects_shared_storage() {
        let mut v = Vector::<f32>::new(3).unwrap();
        let _other = v.clone();
        let _it = v.iter_mut();
    }

    #[test]
    #[should_panic(expected = "mutable access to shared vector storage")]
    fn test_begin_mut_rejects_cloned_external_view() {
        let mut buf = [0u8; 4];
        let mut view = Vector::from_external(&mut buf);
        let _other = view.clone();
        let _c = view.begin_mut();
    }

    #[test]
    fn test_cursor_mut_compares_with_cursor() {
        let mut v = Vector::<u8>::new(3).unwrap();
        let mut c = v.begin_mut();
        c.move_next().move_next();
        let as_ro = c.as_cursor();
        assert!(c == as_ro);
        assert!(c > as_ro - 1);
        c.move_prev();
        assert!(c.get().is_some());
    }

    #[test]
    fn test_iterators_work_with_std_algorithms() {
        let v = vector![4.0, -1.0, 7.5, 2.0].unwrap();
        let max = v.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(max, 7.5);
        assert_eq!(v.iter().position(|x| *x == 7.5), Some(2));
        let sum: f64 = (&v).into_iter().sum();
        assert_eq!(sum, 12.5);
    }
}
