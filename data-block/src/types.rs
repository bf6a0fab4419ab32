//! Re-export types and traits
//!
//! Relationships:
//!
//! - [`LogicalType`] adds semantic above the [`PhysicalType`], different logical types
//! may share the same physical type
//!
//! - [`PrimitiveType`] is the set of fixed width types that can be stored in the
//! [`PrimitiveArray`](crate::array::PrimitiveArray)

use std::fmt::Display;
use std::sync::Arc;

pub use crate::array::primitive::PrimitiveType;
pub use crate::array::Array;

/// Physical type has a one-to-one mapping to each variant of the
/// [`ArrayImpl`](crate::array::ArrayImpl)
///
/// [`PhysicalType`] determines the memory representation of the [`Array`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    /// Boolean
    Boolean,
    /// Signed 8-bit integer, also known as `TINYINT`
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer, also known as `SMALLINT`
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer, also known as `INTEGER`
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer, also known as `BIGINT`
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit float number, also known as `FLOAT/REAL`
    Float32,
    /// 64-bit float number, also known as `DOUBLE`
    Float64,
    /// Variable length Utf-8 String, also known as `VARCHAR`
    String,
    // Complex types
    /// List of a physical type
    List = 64,
}

impl Display for PhysicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PhysicalType::{:?}", self)
    }
}

/// All of the supported logical types. Different logical types may have same [`PhysicalType`].
///
/// It add some semantic above the physical type. Operations between [`Array`]s
/// should have different behavior based on the associated [`LogicalType`]s
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Boolean value represent `true` or `false`
    Boolean,
    /// Signed 8-bit integer
    TinyInt,
    /// Signed 16-bit integer
    SmallInt,
    /// Signed 32-bit integer
    Integer,
    /// Signed 64-bit integer
    BigInt,
    /// Unsigned 8-bit integer
    UnsignedTinyInt,
    /// Unsigned 16-bit integer
    UnsignedSmallInt,
    /// Unsigned 32-bit integer
    UnsignedInteger,
    /// Unsigned 64-bit integer
    UnsignedBigInt,
    /// 32-bit float number
    Float,
    /// 64-bit float number
    Double,
    /// Variable length Utf-8 String
    VarChar,

    // Complex types
    /// List of LogicalType. The child type can be scalar type or complex type
    List {
        /// Type of the element in list
        ///
        /// We use Arc here to avoid repeated memory allocation. During the plan
        /// phase, Logical type is cloned frequently.
        element_type: Arc<LogicalType>,
        /// Is the element in list nullable?
        is_nullable: bool,
    },
}

impl LogicalType {
    /// Get the underling physical type of the logical type
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            Self::Boolean => PhysicalType::Boolean,
            Self::TinyInt => PhysicalType::Int8,
            Self::SmallInt => PhysicalType::Int16,
            Self::Integer => PhysicalType::Int32,
            Self::BigInt => PhysicalType::Int64,
            Self::UnsignedTinyInt => PhysicalType::UInt8,
            Self::UnsignedSmallInt => PhysicalType::UInt16,
            Self::UnsignedInteger => PhysicalType::UInt32,
            Self::UnsignedBigInt => PhysicalType::UInt64,
            Self::Float => PhysicalType::Float32,
            Self::Double => PhysicalType::Float64,
            Self::VarChar => PhysicalType::String,

            // Complex types
            Self::List { .. } => PhysicalType::List,
        }
    }

    /// Create a list type whose elements have the given type. Elements are nullable
    #[inline]
    pub fn list_of(element_type: LogicalType) -> Self {
        Self::List {
            element_type: Arc::new(element_type),
            is_nullable: true,
        }
    }

    /// Get the child type with given index. Only complex types have children
    #[inline]
    pub fn child(&self, index: usize) -> Option<&LogicalType> {
        match self {
            Self::List { element_type, .. } if index == 0 => Some(element_type),
            _ => None,
        }
    }

    /// Returns true if the type is a signed integer
    #[inline]
    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Integer | Self::BigInt
        )
    }

    /// Returns true if the type is an unsigned integer
    #[inline]
    pub fn is_unsigned_integer(&self) -> bool {
        matches!(
            self,
            Self::UnsignedTinyInt
                | Self::UnsignedSmallInt
                | Self::UnsignedInteger
                | Self::UnsignedBigInt
        )
    }

    /// Returns true if the type is a float number
    #[inline]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

/// SQL style name of the type, used by the output formats that write the type header
impl Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "Bool"),
            Self::TinyInt => write!(f, "Int8"),
            Self::SmallInt => write!(f, "Int16"),
            Self::Integer => write!(f, "Int32"),
            Self::BigInt => write!(f, "Int64"),
            Self::UnsignedTinyInt => write!(f, "UInt8"),
            Self::UnsignedSmallInt => write!(f, "UInt16"),
            Self::UnsignedInteger => write!(f, "UInt32"),
            Self::UnsignedBigInt => write!(f, "UInt64"),
            Self::Float => write!(f, "Float32"),
            Self::Double => write!(f, "Float64"),
            Self::VarChar => write!(f, "String"),
            Self::List {
                element_type,
                is_nullable,
            } => {
                if *is_nullable {
                    write!(f, "Array(Nullable({}))", element_type)
                } else {
                    write!(f, "Array({})", element_type)
                }
            }
        }
    }
}
