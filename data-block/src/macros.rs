//! Macros used in the data-block

/// Macros for all of the variants in the array
///
/// Tuple: {enum variant name, element ref type, array type}
#[macro_export]
macro_rules! for_all_variants {
    ($macro:ident) => {
        $macro! {
            {Int8, i8, Int8Array},
            {UInt8, u8, UInt8Array},
            {Int16, i16, Int16Array},
            {UInt16, u16, UInt16Array},
            {Int32, i32, Int32Array},
            {UInt32, u32, UInt32Array},
            {Int64, i64, Int64Array},
            {UInt64, u64, UInt64Array},
            {Float32, f32, Float32Array},
            {Float64, f64, Float64Array},
            {String, &'a str, StringArray},
            {Boolean, bool, BooleanArray},
            {List, ListElementRef<'a>, ListArray}
        }
    };
}

pub(crate) use for_all_variants;

/// Call macro for all primitive types.
///
/// Tuple: {enum variant name, element type, array type, logical type variant}
macro_rules! for_all_primitive_types {
    ($macro:ident) => {
        $macro! {
            {Int8, i8, Int8Array, TinyInt},
            {UInt8, u8, UInt8Array, UnsignedTinyInt},
            {Int16, i16, Int16Array, SmallInt},
            {UInt16, u16, UInt16Array, UnsignedSmallInt},
            {Int32, i32, Int32Array, Integer},
            {UInt32, u32, UInt32Array, UnsignedInteger},
            {Int64, i64, Int64Array, BigInt},
            {UInt64, u64, UInt64Array, UnsignedBigInt},
            {Float32, f32, Float32Array, Float},
            {Float64, f64, Float64Array, Double}
        }
    };
}

pub(crate) use for_all_primitive_types;
