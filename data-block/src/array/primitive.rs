//! [`PrimitiveArray`] that stores fixed byte-width data

use super::{Array, InvalidLogicalTypeSnafu, Result, push_validity};
use snafu::ensure;
use std::fmt::Debug;

use crate::bitmap::Bitmap;
use crate::macros::for_all_primitive_types;
use crate::private::Sealed;
use crate::types::{LogicalType, PhysicalType};

/// Trait for types that can be placed on the [`PrimitiveArray`]
pub trait PrimitiveType: Copy + Debug + Default + PartialOrd + Send + Sync + 'static {
    /// Physical type of this primitive type
    const PHYSICAL_TYPE: PhysicalType;
    /// Default logical type of this primitive type
    const LOGICAL_TYPE: LogicalType;
}

macro_rules! impl_primitive_type {
    ($({$pt_variant:ident, $primitive_element_ty:ty, $alias:ident, $lt:ident}),*) => {
        $(
            impl PrimitiveType for $primitive_element_ty {
                const PHYSICAL_TYPE: PhysicalType = PhysicalType::$pt_variant;
                const LOGICAL_TYPE: LogicalType = LogicalType::$lt;
            }

            #[doc = concat!("Array of [`", stringify!($primitive_element_ty), "`]")]
            pub type $alias = PrimitiveArray<$primitive_element_ty>;
        )*
    };
}

for_all_primitive_types!(impl_primitive_type);

/// [`PrimitiveArray`] that stores fixed byte-width data, such as `i32` or `f64`
pub struct PrimitiveArray<T: PrimitiveType> {
    logical_type: LogicalType,
    data: Vec<T>,
    validity: Bitmap,
}

impl<T: PrimitiveType> PrimitiveArray<T> {
    /// Create a new empty [`PrimitiveArray`]
    #[inline]
    pub fn new(logical_type: LogicalType) -> Result<Self> {
        Self::with_capacity(logical_type, 0)
    }

    /// Create a new empty [`PrimitiveArray`] without check
    ///
    /// # Safety
    ///
    /// physical type of the logical type should be `T::PHYSICAL_TYPE`
    #[inline]
    pub unsafe fn new_unchecked(logical_type: LogicalType) -> Self {
        unsafe { Self::with_capacity_unchecked(logical_type, 0) }
    }

    /// Create a new empty [`PrimitiveArray`] with given capacity
    #[inline]
    pub fn with_capacity(logical_type: LogicalType, capacity: usize) -> Result<Self> {
        ensure!(
            logical_type.physical_type() == T::PHYSICAL_TYPE,
            InvalidLogicalTypeSnafu {
                array_name: format!("PrimitiveArray<{}>", std::any::type_name::<T>()),
                array_physical_type: T::PHYSICAL_TYPE,
                logical_type,
            }
        );
        // SAFETY: we check the physical type above
        unsafe { Ok(Self::with_capacity_unchecked(logical_type, capacity)) }
    }

    /// Create a new empty [`PrimitiveArray`] with given capacity without check
    ///
    /// # Safety
    ///
    /// physical type of the logical type should be `T::PHYSICAL_TYPE`
    #[inline]
    pub unsafe fn with_capacity_unchecked(logical_type: LogicalType, capacity: usize) -> Self {
        #[cfg(feature = "verify")]
        assert_eq!(logical_type.physical_type(), T::PHYSICAL_TYPE);

        Self {
            logical_type,
            data: Vec::with_capacity(capacity),
            validity: Bitmap::new(),
        }
    }

    /// Create a [`PrimitiveArray`] with the default logical type from values. All of the
    /// values are valid
    #[inline]
    pub fn from_values_iter(iter: impl IntoIterator<Item = T>) -> Self {
        Self {
            logical_type: T::LOGICAL_TYPE,
            data: iter.into_iter().collect(),
            validity: Bitmap::new(),
        }
    }

    /// Get the values slice, the validity is ignored
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.data
    }
}

impl<T: PrimitiveType> Debug for PrimitiveArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PrimitiveArray<{}> {{ logical_type: {:?}, len: {}, data: ",
            std::any::type_name::<T>(),
            self.logical_type,
            self.len()
        )?;
        f.debug_list()
            .entries((0..self.len()).map(|index| self.get(index)))
            .finish()?;
        write!(f, " }}")
    }
}

impl<T: PrimitiveType> Sealed for PrimitiveArray<T> {}

impl<T: PrimitiveType> Array for PrimitiveArray<T> {
    const PHYSICAL_TYPE: PhysicalType = T::PHYSICAL_TYPE;

    type ElementRef<'a> = T;

    #[inline]
    fn validity(&self) -> &Bitmap {
        &self.validity
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    unsafe fn get_value_unchecked(&self, index: usize) -> T {
        #[cfg(feature = "verify")]
        assert!(index < self.data.len());

        unsafe { *self.data.get_unchecked(index) }
    }

    #[inline]
    fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    #[inline]
    fn push(&mut self, element: Option<T>) {
        push_validity(&mut self.validity, self.data.len(), element.is_some());
        self.data.push(element.unwrap_or_default());
    }

    #[inline]
    fn clear(&mut self) {
        self.data.clear();
        self.validity.clear();
    }
}

impl<T: PrimitiveType> FromIterator<Option<T>> for PrimitiveArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        // SAFETY: the default logical type has the physical type of T
        let mut array = unsafe { Self::new_unchecked(T::LOGICAL_TYPE) };
        iter.into_iter().for_each(|element| array.push(element));
        array
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_with_null() {
        let array: Int32Array = [Some(1), None, Some(3)].into_iter().collect();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(0), Some(1));
        assert_eq!(array.get(1), None);
        assert_eq!(array.get(2), Some(3));
        assert_eq!(array.validity().len(), 3);
    }

    #[test]
    fn test_validity_stays_empty_without_null() {
        let array = UInt64Array::from_values_iter([1, 2, 3]);
        assert!(array.validity().is_empty());
        assert_eq!(array.values(), &[1, 2, 3]);
    }

    #[test]
    fn test_invalid_logical_type() {
        assert!(Float64Array::new(LogicalType::BigInt).is_err());
        assert!(Int64Array::new(LogicalType::BigInt).is_ok());
    }
}
