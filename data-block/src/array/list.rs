//! Elements in the array are list

use snafu::ensure;

use super::{Array, ArrayImpl, InvalidLogicalTypeSnafu, Result, push_validity};
use crate::bitmap::Bitmap;
use crate::element::list::ListElementRef;
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};

/// Array of lists. The elements of all lists are stored contiguously in a single child
/// array. `offsets[i]` is the **end** position of the ith list in the child array, the
/// start position is `offsets[i-1]` (or 0 for the first list). Therefore, building a
/// list array only requires appending elements to the child array and then pushing
/// the boundary with [`ListArray::push_offset`]
#[derive(Debug)]
pub struct ListArray {
    /// Logical type
    logical_type: LogicalType,
    /// validity
    validity: Bitmap,
    /// End offsets of each list in the elements
    offsets: Vec<u64>,
    /// array that contains its elements
    elements: Box<ArrayImpl>,
}

impl ListArray {
    /// Create a new empty [`ListArray`]
    #[inline]
    pub fn new(logical_type: LogicalType) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::List,
            InvalidLogicalTypeSnafu {
                array_name: "ListArray".to_string(),
                array_physical_type: PhysicalType::List,
                logical_type
            }
        );

        // SAFETY: we check the physical type above
        unsafe { Ok(Self::new_unchecked(logical_type)) }
    }

    /// Create a new empty [`ListArray`] without check
    ///
    /// # Safety
    ///
    /// physical type of the logical type should be `List`
    #[inline]
    pub unsafe fn new_unchecked(logical_type: LogicalType) -> Self {
        #[cfg(feature = "verify")]
        assert_eq!(logical_type.physical_type(), PhysicalType::List);

        let element_type = match &logical_type {
            LogicalType::List { element_type, .. } => (**element_type).clone(),
            _ => unsafe { std::hint::unreachable_unchecked() },
        };

        Self {
            logical_type,
            validity: Bitmap::new(),
            offsets: Vec::new(),
            elements: Box::new(ArrayImpl::new(element_type)),
        }
    }

    /// Get the child array that contains the elements of all lists
    #[inline]
    pub fn elements(&self) -> &ArrayImpl {
        &self.elements
    }

    /// Get the mutable child array. Elements appended to it belong to the next list
    /// closed by [`ListArray::push_offset`]
    #[inline]
    pub fn elements_mut(&mut self) -> &mut ArrayImpl {
        &mut self.elements
    }

    /// End offsets of the lists
    #[inline]
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Close the current list: all of the elements appended to the child array since
    /// the last boundary become a new (valid) list
    #[inline]
    pub fn push_offset(&mut self) {
        push_validity(&mut self.validity, self.offsets.len(), true);
        self.offsets.push(self.elements.len() as u64);
    }

    /// Returns true if the elements of the given list can be copied into self
    #[inline]
    pub fn accepts(&self, list: ListElementRef<'_>) -> bool {
        is_layout_compatible(list.element_type(), self.elements.logical_type())
    }

    #[inline]
    fn start_of(&self, index: usize) -> u64 {
        if index == 0 {
            0
        } else {
            self.offsets[index - 1]
        }
    }
}

impl Sealed for ListArray {}

impl Array for ListArray {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::List;

    type ElementRef<'a> = ListElementRef<'a>;

    #[inline]
    fn validity(&self) -> &Bitmap {
        &self.validity
    }

    #[inline]
    fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    unsafe fn get_value_unchecked(&self, index: usize) -> ListElementRef<'_> {
        #[cfg(feature = "verify")]
        assert!(index < self.len());

        let start = self.start_of(index);
        let end = unsafe { *self.offsets.get_unchecked(index) };
        ListElementRef::new(&self.elements, start as usize, (end - start) as usize)
    }

    #[inline]
    fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Copy the elements of the given list into self
    ///
    /// It will panic if [`ListArray::accepts`] returns false for the given list,
    /// [`ArrayImpl::push`] checks it before calling this function
    fn push(&mut self, element: Option<ListElementRef<'_>>) {
        match element {
            Some(list) => {
                list.iter().for_each(|element| {
                    self.elements
                        .push(element)
                        .expect("Element type of the pushed list should match the ListArray")
                });
                self.push_offset();
            }
            None => {
                push_validity(&mut self.validity, self.offsets.len(), false);
                self.offsets.push(self.elements.len() as u64);
            }
        }
    }

    #[inline]
    fn clear(&mut self) {
        self.validity.clear();
        self.offsets.clear();
        self.elements.clear();
    }
}

/// Element arrays with same physical layout at every nesting level accept each
/// other's elements
fn is_layout_compatible(from: &LogicalType, to: &LogicalType) -> bool {
    match (from, to) {
        (
            LogicalType::List {
                element_type: from, ..
            },
            LogicalType::List {
                element_type: to, ..
            },
        ) => is_layout_compatible(from, to),
        _ => from.physical_type() == to.physical_type(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementImplRef;

    #[test]
    fn test_build_with_offsets() {
        let mut array = ListArray::new(LogicalType::list_of(LogicalType::BigInt)).unwrap();
        array.elements_mut().push(Some(ElementImplRef::Int64(1))).unwrap();
        array.elements_mut().push(Some(ElementImplRef::Int64(2))).unwrap();
        array.push_offset();
        array.push_offset();
        array.elements_mut().push(None).unwrap();
        array.push_offset();

        assert_eq!(array.offsets(), &[2, 2, 3]);
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(0).unwrap().len(), 2);
        assert!(array.get(1).unwrap().is_empty());
        assert_eq!(array.get(2).unwrap().to_string(), "[Null]");
    }

    #[test]
    fn test_push_copies_list() {
        let mut source = ListArray::new(LogicalType::list_of(LogicalType::VarChar)).unwrap();
        source.elements_mut().push(Some(ElementImplRef::String("a"))).unwrap();
        source.push_offset();

        let mut target = ListArray::new(LogicalType::list_of(LogicalType::VarChar)).unwrap();
        target.push(source.get(0));
        target.push(None);
        assert_eq!(target.offsets(), &[1, 1]);
        assert_eq!(target.get(0).unwrap().to_string(), "[a]");
        assert!(target.get(1).is_none());
    }

    #[test]
    fn test_accepts() {
        let mut ints = ListArray::new(LogicalType::list_of(LogicalType::BigInt)).unwrap();
        ints.elements_mut().push(Some(ElementImplRef::Int64(1))).unwrap();
        ints.push_offset();
        let strings = ListArray::new(LogicalType::list_of(LogicalType::VarChar)).unwrap();
        let nested =
            ListArray::new(LogicalType::list_of(LogicalType::list_of(LogicalType::BigInt)))
                .unwrap();

        let list = ints.get(0).unwrap();
        assert!(!strings.accepts(list));
        assert!(!nested.accepts(list));
        let non_nullable = ListArray::new(LogicalType::List {
            element_type: std::sync::Arc::new(LogicalType::BigInt),
            is_nullable: false,
        })
        .unwrap();
        assert!(non_nullable.accepts(list));
    }

    #[test]
    fn test_not_list_type() {
        assert!(ListArray::new(LogicalType::BigInt).is_err());
    }
}
