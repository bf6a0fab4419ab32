//! [`Array`] is the memory format of the columnar storage.
//!
//! Heavily adapted from [`type-exercise-in-rust`](https://github.com/skyzh/type-exercise-in-rust)

pub mod boolean;
pub mod list;
pub mod primitive;
pub mod string;

use crate::bitmap::Bitmap;
use crate::element::ElementImplRef;
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};
pub use boolean::BooleanArray;
pub use list::ListArray;
pub use primitive::*;
use snafu::Snafu;
use std::fmt::Debug;
pub use string::StringArray;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum ArrayError {
    #[snafu(display(
        "Invalid logical type `{:?}({})` passed to creating a new array `{}` that has `{}`",
        logical_type,
        logical_type.physical_type(),
        array_name,
        array_physical_type
    ))]
    InvalidLogicalType {
        array_name: String,
        array_physical_type: PhysicalType,
        logical_type: LogicalType,
    },
    #[snafu(display("Can not convert `ArrayImpl::{array}` array into `{target}` array"))]
    Convert {
        array: &'static str,
        target: &'static str,
    },
    #[snafu(display("Can not push `{element}` element into `ArrayImpl::{array}` array"))]
    Push {
        array: &'static str,
        element: &'static str,
    },
}

type Result<T> = std::result::Result<T, ArrayError>;

/// A trait over all arrays
pub trait Array: Sealed + Debug + 'static + Sized {
    /// Physical type of the array
    const PHYSICAL_TYPE: PhysicalType;

    /// Reference to the element stored in the [`Array`]
    type ElementRef<'a>: Copy + Debug
    where
        Self: 'a;

    /// Get the validity. **If the validity is not empty, the length must equal to
    /// [`Self::len`]**
    fn validity(&self) -> &Bitmap;

    /// Get the number of elements in the [`Array`]
    fn len(&self) -> usize;

    /// Returns `true` if the [`Array`] contains no elements
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a reference to the element at the given index without bound check.
    /// The validity is ignored
    ///
    /// # Safety
    /// Caller should guarantee `index < self.len()`, otherwise, [undefined behavior] happens
    ///
    /// [undefined behavior]: https://doc.rust-lang.org/reference/behavior-considered-undefined.html
    unsafe fn get_value_unchecked(&self, index: usize) -> Self::ElementRef<'_>;

    /// Returns a reference to the element at the given index. It will panic if the index
    /// out of bounds
    fn get(&self, index: usize) -> Option<Self::ElementRef<'_>> {
        assert!(index < self.len());
        unsafe { self.get_unchecked(index) }
    }

    /// Returns a reference to the element at the given index without bound check
    ///
    /// # Safety
    /// Caller should guarantee `index < self.len()`, otherwise, [undefined behavior] happens
    ///
    /// [undefined behavior]: https://doc.rust-lang.org/reference/behavior-considered-undefined.html
    #[inline]
    unsafe fn get_unchecked(&self, index: usize) -> Option<Self::ElementRef<'_>> {
        let validity = self.validity();
        unsafe {
            if validity.is_empty() || validity.get_unchecked(index) {
                Some(self.get_value_unchecked(index))
            } else {
                None
            }
        }
    }

    /// Get the logical type of the array. This function enforces each array implementation
    /// should have a [`LogicalType`] as its field
    fn logical_type(&self) -> &LogicalType;

    // Mutate array

    /// Append an element to the end of the array, `None` represents `NULL`
    fn push(&mut self, element: Option<Self::ElementRef<'_>>);

    /// Clear the array
    fn clear(&mut self);
}

/// Update the validity before pushing a new element into an array that has `len`
/// elements. The validity stays empty until the first `NULL` is pushed
#[inline]
pub(crate) fn push_validity(validity: &mut Bitmap, len: usize, is_valid: bool) {
    if validity.is_empty() {
        if is_valid {
            return;
        }
        *validity = Bitmap::from_value(true, len);
    }
    validity.push(is_valid);
}

macro_rules! array_impl {
    ($({$variant:ident, $element_ref_ty:ty, $array_ty:ident}),+) => {
        /// Implementations of the [`Array`], enum dispatch
        #[derive(Debug)]
        pub enum ArrayImpl {
            $(
                #[doc = concat!("Array of `", stringify!($element_ref_ty), "`")]
                $variant($array_ty)
            ),+
        }

        impl ArrayImpl{
            /// Create a new empty [`ArrayImpl`] based on the [`LogicalType`]
            pub fn new(logical_type: LogicalType) -> Self {
                let physical_type = logical_type.physical_type();
                // SAFETY: the array is chosen based on the physical type of the logical type
                unsafe {
                    match physical_type {
                        $(
                            PhysicalType::$variant => ArrayImpl::$variant($array_ty::new_unchecked(logical_type)),
                        )+
                    }
                }
            }

            /// Get the number of elements in the Array
            pub fn len(&self) -> usize {
                match self{
                    $(
                        Self::$variant(array) => array.len(),
                    )+
                }
            }

            /// Returns `true` if the Array contains no elements
            pub fn is_empty(&self) -> bool {
                match self{
                    $(
                        Self::$variant(array) => array.is_empty(),
                    )+
                }
            }

            /// Get ident of the array
            pub fn ident(&self) -> &'static str{
                match self{
                    $(
                        Self::$variant(_) => stringify!($variant),
                    )+
                }
            }

            /// Return the [`LogicalType`] of the array
            pub fn logical_type(&self) -> &LogicalType{
                match self{
                    $(
                        Self::$variant(array) => array.logical_type(),
                    )+
                }
            }

            /// Get the validity bitmap
            pub fn validity(&self) -> &Bitmap{
                match self{
                    $(
                        Self::$variant(array) => array.validity(),
                    )+
                }
            }

            /// Get element ref. It will panic if the index out of bounds
            pub fn get(&self, index: usize) -> Option<ElementImplRef<'_>> {
                match self {
                    $(
                        Self::$variant(array) => array.get(index).map(ElementImplRef::$variant),
                    )+
                }
            }

            /// Get element ref without bound check
            ///
            /// # Safety
            ///
            /// `index < self.len()`
            pub unsafe fn get_unchecked(&self, index: usize) -> Option<ElementImplRef<'_>> {
                unsafe {
                    match self {
                        $(
                            Self::$variant(array) => array.get_unchecked(index).map(ElementImplRef::$variant),
                        )+
                    }
                }
            }

            /// Append an element to the end of the array, `None` represents `NULL`.
            ///
            /// If the element does not match the physical type of the array, return error
            pub fn push(&mut self, element: Option<ElementImplRef<'_>>) -> Result<()> {
                match (self, element) {
                    (Self::List(array), Some(ElementImplRef::List(list)))
                        if !array.accepts(list) =>
                    {
                        return PushSnafu {
                            array: "List",
                            element: "List",
                        }
                        .fail()
                    }
                    $(
                        (Self::$variant(array), Some(ElementImplRef::$variant(element))) => {
                            array.push(Some(element));
                        }
                        (Self::$variant(array), None) => {
                            array.push(None);
                        }
                    )+
                    (array, Some(element)) => {
                        return PushSnafu {
                            array: array.ident(),
                            element: element.ident(),
                        }
                        .fail()
                    }
                }
                Ok(())
            }

            /// Clear the array
            pub fn clear(&mut self) {
                match self {
                    $(
                        Self::$variant(array) => array.clear(),
                    )+
                }
            }
        }

        $(
            impl<'a> TryFrom<&'a ArrayImpl> for &'a $array_ty {
                type Error = ArrayError;

                fn try_from(array: &'a ArrayImpl) -> Result<&'a $array_ty>{
                    if let ArrayImpl::$variant(array) = array{
                        Ok(array)
                    }else{
                        ConvertSnafu{
                            array: array.ident(),
                            target: stringify!($array_ty),
                        }.fail()
                    }
                }
            }

            impl<'a> TryFrom<&'a mut ArrayImpl> for &'a mut $array_ty {
                type Error = ArrayError;

                fn try_from(array: &'a mut ArrayImpl) -> Result<&'a mut $array_ty>{
                    if let ArrayImpl::$variant(array) = array{
                        Ok(array)
                    }else{
                        ConvertSnafu{
                            array: array.ident(),
                            target: stringify!($array_ty),
                        }.fail()
                    }
                }
            }

            impl From<$array_ty> for ArrayImpl {
                #[inline]
                fn from(array: $array_ty) -> Self {
                    Self::$variant(array)
                }
            }
        )+
    };
}

crate::macros::for_all_variants!(array_impl);

impl ArrayImpl {
    /// Get the signed integer at the given index, widened to `i64`. Returns `None` if
    /// the element is `NULL` or the array is not a signed integer array. It will panic
    /// if the index out of bounds
    #[inline]
    pub fn get_int(&self, index: usize) -> Option<i64> {
        match self {
            Self::Int8(array) => array.get(index).map(i64::from),
            Self::Int16(array) => array.get(index).map(i64::from),
            Self::Int32(array) => array.get(index).map(i64::from),
            Self::Int64(array) => array.get(index),
            _ => None,
        }
    }

    /// Get the unsigned integer at the given index, widened to `u64`. Returns `None` if
    /// the element is `NULL` or the array is not an unsigned integer array. It will panic
    /// if the index out of bounds
    #[inline]
    pub fn get_uint(&self, index: usize) -> Option<u64> {
        match self {
            Self::UInt8(array) => array.get(index).map(u64::from),
            Self::UInt16(array) => array.get(index).map(u64::from),
            Self::UInt32(array) => array.get(index).map(u64::from),
            Self::UInt64(array) => array.get(index),
            _ => None,
        }
    }

    /// Get the numeric element at the given index as `f64`. Returns `None` if the
    /// element is `NULL` or the array is not numeric. It will panic if the index out
    /// of bounds
    pub fn get_float(&self, index: usize) -> Option<f64> {
        match self {
            Self::Float32(array) => array.get(index).map(f64::from),
            Self::Float64(array) => array.get(index),
            Self::Int8(_) | Self::Int16(_) | Self::Int32(_) | Self::Int64(_) => {
                self.get_int(index).map(|v| v as f64)
            }
            Self::UInt8(_) | Self::UInt16(_) | Self::UInt32(_) | Self::UInt64(_) => {
                self.get_uint(index).map(|v| v as f64)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut array = ArrayImpl::new(LogicalType::BigInt);
        array.push(Some(ElementImplRef::Int64(7))).unwrap();
        array.push(None).unwrap();
        array.push(Some(ElementImplRef::Int64(-3))).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get_int(0), Some(7));
        assert_eq!(array.get_int(1), None);
        assert_eq!(array.get_int(2), Some(-3));
        assert_eq!(array.get_float(2), Some(-3.0));
        assert_eq!(array.get_uint(0), None);
    }

    #[test]
    fn test_push_mismatch() {
        let mut array = ArrayImpl::new(LogicalType::UnsignedBigInt);
        let err = array.push(Some(ElementImplRef::String("a"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not push `String` element into `ArrayImpl::UInt64` array"
        );
    }

    #[test]
    fn test_push_list_mismatch() {
        let mut ints = ListArray::new(LogicalType::list_of(LogicalType::BigInt)).unwrap();
        ints.elements_mut().push(Some(ElementImplRef::Int64(1))).unwrap();
        ints.elements_mut().push(Some(ElementImplRef::Int64(2))).unwrap();
        ints.push_offset();

        let mut strings = ArrayImpl::new(LogicalType::list_of(LogicalType::VarChar));
        let err = strings.push(ints.get(0).map(ElementImplRef::List)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not push `List` element into `ArrayImpl::List` array"
        );
        // Nothing is pushed into the elements
        let strings: &ListArray = (&strings).try_into().unwrap();
        assert!(strings.is_empty());
        assert!(strings.elements().is_empty());

        let mut copy = ArrayImpl::new(LogicalType::list_of(LogicalType::BigInt));
        copy.push(ints.get(0).map(ElementImplRef::List)).unwrap();
        assert_eq!(copy.len(), 1);
    }

    #[test]
    fn test_convert() {
        let array = ArrayImpl::from(Int32Array::from_values_iter([1, 2]));
        let int32: &Int32Array = (&array).try_into().unwrap();
        assert_eq!(int32.values(), &[1, 2]);
        let err = <&UInt8Array>::try_from(&array).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can not convert `ArrayImpl::Int32` array into `UInt8Array` array"
        );
    }
}
