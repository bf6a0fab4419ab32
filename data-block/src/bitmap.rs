//! Bitmap

use std::fmt::Debug;

/// Underling type that stores the bitmap
pub(crate) type BitStore = u64;

const BITS: usize = BitStore::BITS as usize;

/// Bitmap in data-block, each boolean is stored as a single bit
///
/// Note that array all of the elements are not null, the [`Bitmap`] could be empty
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Internal buffer stores the bits
    buffer: Vec<BitStore>,
    /// Number of live bits in the allocation
    num_bits: usize,
}

impl Bitmap {
    /// Create a new [`Bitmap`]
    #[inline]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            num_bits: 0,
        }
    }

    /// Create a new [`Bitmap`] with given capacity
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(elts(capacity)),
            num_bits: 0,
        }
    }

    /// Create a new [`Bitmap`] that has `len` bits and all of them are `value`
    pub fn from_value(value: bool, len: usize) -> Self {
        let fill = if value { BitStore::MAX } else { 0 };
        Self {
            buffer: vec![fill; elts(len)],
            num_bits: len,
        }
    }

    /// Number of bits in the bitmap
    #[inline]
    pub fn len(&self) -> usize {
        self.num_bits
    }

    /// Returns true if the bitmap does not contain any bit
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Returns true if all of the bits are set or the bitmap is empty
    #[inline]
    pub fn all_valid(&self) -> bool {
        self.iter().all(|bit| bit)
    }

    /// Get the bit with given index without bound check
    ///
    /// # Safety
    ///
    /// `index < self.len()`
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> bool {
        #[cfg(feature = "verify")]
        assert!(index < self.num_bits);

        unsafe { self.buffer.get_unchecked(index / BITS) & (1 << (index % BITS)) != 0 }
    }

    /// Get the bit with given index, it will panic if the index out of bounds
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.num_bits);
        unsafe { self.get_unchecked(index) }
    }

    /// Append a bit to the end of the bitmap
    #[inline]
    pub fn push(&mut self, bit: bool) {
        if self.num_bits % BITS == 0 {
            self.buffer.push(0);
        }
        let last = self.buffer.len() - 1;
        let mask = 1 << (self.num_bits % BITS);
        if bit {
            self.buffer[last] |= mask;
        } else {
            self.buffer[last] &= !mask;
        }
        self.num_bits += 1;
    }

    /// Iterate over the bits
    #[inline]
    pub fn iter(&self) -> BitmapIter<'_> {
        BitmapIter {
            bitmap: self,
            index: 0,
        }
    }

    /// Count the number of `1` in the bitmap
    pub fn count_ones(&self) -> usize {
        self.iter().filter(|bit| *bit).count()
    }

    /// Clear the bitmap
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.num_bits = 0;
    }
}

impl Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<bool> for Bitmap {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut bitmap = Self::with_capacity(iter.size_hint().0);
        iter.for_each(|bit| bitmap.push(bit));
        bitmap
    }
}

/// Iterator of the [`Bitmap`]
#[derive(Debug)]
pub struct BitmapIter<'a> {
    bitmap: &'a Bitmap,
    index: usize,
}

impl Iterator for BitmapIter<'_> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<bool> {
        if self.index == self.bitmap.num_bits {
            None
        } else {
            // SAFETY: index < num_bits
            let bit = unsafe { self.bitmap.get_unchecked(self.index) };
            self.index += 1;
            Some(bit)
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remain = self.bitmap.num_bits - self.index;
        (remain, Some(remain))
    }
}

impl ExactSizeIterator for BitmapIter<'_> {}

/// Number of [`BitStore`] elements needed to hold `len` bits
#[inline]
fn elts(len: usize) -> usize {
    len.div_ceil(BITS)
}
