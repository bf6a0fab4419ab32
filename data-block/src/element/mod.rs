//! This module contains the reference of the elements stored in the `Array`

pub mod list;

use std::fmt::{Debug, Display};

use self::list::ListElementRef;
use crate::for_all_variants;

macro_rules! element_impl_ref {
    ($({$variant:ident, $element_ref_ty:ty, $array_ty:ident}),+) => {
        /// Reference to an element in the [`ArrayImpl`](crate::array::ArrayImpl), enum
        /// dispatch
        #[derive(Debug, Clone, Copy)]
        pub enum ElementImplRef<'a> {
            $(
                #[doc = concat!("Element of the `", stringify!($array_ty), "`")]
                $variant($element_ref_ty)
            ),+
        }

        impl ElementImplRef<'_> {
            /// Get ident of the element
            pub fn ident(&self) -> &'static str {
                match self {
                    $(
                        Self::$variant(_) => stringify!($variant),
                    )+
                }
            }
        }
    };
}

for_all_variants!(element_impl_ref);

impl PartialEq for ElementImplRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::UInt8(l), Self::UInt8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::UInt16(l), Self::UInt16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::UInt32(l), Self::UInt32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::UInt64(l), Self::UInt64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::String(l), Self::String(r)) => l == r,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::List(l), Self::List(r)) => l.iter().eq(r.iter()),
            _ => false,
        }
    }
}

/// Human readable representation, floats always keep the fraction part
impl Display for ElementImplRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int8(v) => write!(f, "{}", v),
            Self::UInt8(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float32(v) => write!(f, "{:?}", v),
            Self::Float64(v) => write!(f, "{:?}", v),
            Self::String(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::List(v) => write!(f, "{}", v),
        }
    }
}
