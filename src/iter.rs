//! Iterator extension methods.

use std::iter::Zip;

/// A variant of [`Iterator::zip`] that panics if the iterators have different lengths.
///
/// Network outputs are copied into preallocated landmark buffers; a length mismatch there means
/// the wrong network was loaded, and silently truncating would hide that.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );

    a.zip(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_lengths() {
        let sum: i32 = zip_exact([1, 2, 3], [4, 5, 6]).map(|(a, b)| a * b).sum();
        assert_eq!(sum, 32);
    }

    #[test]
    #[should_panic(expected = "different lengths")]
    fn different_lengths() {
        zip_exact([1, 2], [1, 2, 3]).for_each(drop);
    }
}
