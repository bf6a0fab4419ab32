//! Reference to a list element

use std::fmt::{Debug, Display};

use super::ElementImplRef;
use crate::array::ArrayImpl;
use crate::types::LogicalType;

/// Reference to the list in the [`ListArray`](crate::array::ListArray). It is a view
/// of `elements[start..start+len]`
#[derive(Clone, Copy)]
pub struct ListElementRef<'a> {
    elements: &'a ArrayImpl,
    start: usize,
    len: usize,
}

impl<'a> ListElementRef<'a> {
    /// Create a new [`ListElementRef`]. `start + len` should not exceed the length of
    /// the `elements`
    #[inline]
    pub fn new(elements: &'a ArrayImpl, start: usize, len: usize) -> Self {
        debug_assert!(start + len <= elements.len());
        Self {
            elements,
            start,
            len,
        }
    }

    /// Number of elements in the list
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical type of the elements in the list
    #[inline]
    pub fn element_type(&self) -> &'a LogicalType {
        self.elements.logical_type()
    }

    /// Iterate over the elements in the list
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Option<ElementImplRef<'a>>> + 'a {
        let elements = self.elements;
        // SAFETY: the constructor guarantees the range is valid
        (self.start..self.start + self.len)
            .map(move |index| unsafe { elements.get_unchecked(index) })
    }
}

impl Debug for ListElementRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl Display for ListElementRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (index, element) in self.iter().enumerate() {
            if index != 0 {
                write!(f, ", ")?;
            }
            match element {
                Some(element) => write!(f, "{}", element)?,
                None => write!(f, "Null")?,
            }
        }
        write!(f, "]")
    }
}
