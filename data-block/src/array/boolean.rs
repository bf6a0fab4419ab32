//! Boolean array

use snafu::ensure;

use super::{Array, InvalidLogicalTypeSnafu, Result, push_validity};
use crate::bitmap::Bitmap;
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};

/// Boolean array, each element is stored as a single bit
#[derive(Debug)]
pub struct BooleanArray {
    logical_type: LogicalType,
    data: Bitmap,
    validity: Bitmap,
}

impl BooleanArray {
    /// Create a new empty [`BooleanArray`]
    #[inline]
    pub fn new(logical_type: LogicalType) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::Boolean,
            InvalidLogicalTypeSnafu {
                array_name: "BooleanArray".to_string(),
                array_physical_type: PhysicalType::Boolean,
                logical_type,
            }
        );

        // SAFETY: we check the physical type above
        unsafe { Ok(Self::new_unchecked(logical_type)) }
    }

    /// Create a new empty [`BooleanArray`] without check
    ///
    /// # Safety
    ///
    /// physical type of the logical type should be `Boolean`
    #[inline]
    pub unsafe fn new_unchecked(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            data: Bitmap::new(),
            validity: Bitmap::new(),
        }
    }
}

impl Sealed for BooleanArray {}

impl Array for BooleanArray {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::Boolean;

    type ElementRef<'a> = bool;

    #[inline]
    fn validity(&self) -> &Bitmap {
        &self.validity
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    unsafe fn get_value_unchecked(&self, index: usize) -> bool {
        unsafe { self.data.get_unchecked(index) }
    }

    #[inline]
    fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    #[inline]
    fn push(&mut self, element: Option<bool>) {
        push_validity(&mut self.validity, self.data.len(), element.is_some());
        self.data.push(element.unwrap_or_default());
    }

    #[inline]
    fn clear(&mut self) {
        self.data.clear();
        self.validity.clear();
    }
}

impl FromIterator<Option<bool>> for BooleanArray {
    fn from_iter<I: IntoIterator<Item = Option<bool>>>(iter: I) -> Self {
        // SAFETY: Boolean logical type has the Boolean physical type
        let mut array = unsafe { Self::new_unchecked(LogicalType::Boolean) };
        iter.into_iter().for_each(|element| array.push(element));
        array
    }
}
