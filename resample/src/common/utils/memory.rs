//! Utils for memory computation

/// Computing the smallest value that is multiple of align and greater than
/// or equal to size. Returns `None` if the computation overflows.
///
/// Note that `align` is the alignment, therefore, it must be power of two.
/// Otherwise, the returned value is incorrect!
#[inline]
pub fn next_multiple_of_align(size: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    let mask = align - 1;
    size.checked_add(mask).map(|size| size & !mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_multiple_of_align() {
        assert_eq!(next_multiple_of_align(0, 8), Some(0));
        assert_eq!(next_multiple_of_align(1, 8), Some(8));
        assert_eq!(next_multiple_of_align(8, 8), Some(8));
        assert_eq!(next_multiple_of_align(9, 8), Some(16));
        assert_eq!(next_multiple_of_align(24, 16), Some(32));
        assert_eq!(next_multiple_of_align(3, 1), Some(3));
        assert_eq!(next_multiple_of_align(usize::MAX, 8), None);
    }
}
