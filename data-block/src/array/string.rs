//! Array of Utf-8 strings

use snafu::ensure;

use super::{Array, InvalidLogicalTypeSnafu, Result, push_validity};
use crate::bitmap::Bitmap;
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};

/// Array of variable length Utf-8 strings. All of the strings are stored in a
/// single buffer, `offsets[i]..offsets[i+1]` is the range of the ith string
#[derive(Debug)]
pub struct StringArray {
    logical_type: LogicalType,
    bytes: String,
    offsets: Vec<usize>,
    validity: Bitmap,
}

impl StringArray {
    /// Create a new empty [`StringArray`]
    #[inline]
    pub fn new(logical_type: LogicalType) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == PhysicalType::String,
            InvalidLogicalTypeSnafu {
                array_name: "StringArray".to_string(),
                array_physical_type: PhysicalType::String,
                logical_type,
            }
        );

        // SAFETY: we check the physical type above
        unsafe { Ok(Self::new_unchecked(logical_type)) }
    }

    /// Create a new empty [`StringArray`] without check
    ///
    /// # Safety
    ///
    /// physical type of the logical type should be `String`
    #[inline]
    pub unsafe fn new_unchecked(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            bytes: String::new(),
            offsets: vec![0],
            validity: Bitmap::new(),
        }
    }
}

impl Sealed for StringArray {}

impl Array for StringArray {
    const PHYSICAL_TYPE: PhysicalType = PhysicalType::String;

    type ElementRef<'a> = &'a str;

    #[inline]
    fn validity(&self) -> &Bitmap {
        &self.validity
    }

    #[inline]
    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    unsafe fn get_value_unchecked(&self, index: usize) -> &str {
        unsafe {
            let start = *self.offsets.get_unchecked(index);
            let end = *self.offsets.get_unchecked(index + 1);
            // SAFETY: offsets always lie on the boundaries of the pushed strings
            self.bytes.get_unchecked(start..end)
        }
    }

    #[inline]
    fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    #[inline]
    fn push(&mut self, element: Option<&str>) {
        let len = self.len();
        push_validity(&mut self.validity, len, element.is_some());
        if let Some(element) = element {
            self.bytes.push_str(element);
        }
        self.offsets.push(self.bytes.len());
    }

    #[inline]
    fn clear(&mut self) {
        self.bytes.clear();
        self.offsets.truncate(1);
        self.validity.clear();
    }
}

impl<'a> FromIterator<Option<&'a str>> for StringArray {
    fn from_iter<I: IntoIterator<Item = Option<&'a str>>>(iter: I) -> Self {
        // SAFETY: VarChar has the String physical type
        let mut array = unsafe { Self::new_unchecked(LogicalType::VarChar) };
        iter.into_iter().for_each(|element| array.push(element));
        array
    }
}
