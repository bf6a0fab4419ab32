//! Aggregate functions
//!
//! Each aggregate function describes an opaque state by its [`Layout`]. The caller owns
//! the memory of the state and drives its lifecycle through the [`AggregateFunction`]
//! contract: `create` -> (`add` | `merge` | `deserialize`)* -> `insert_result_into` ->
//! `destroy`. The same contract is implemented by the combinators, therefore a
//! combinator can be nested into another combinator

pub mod avg;
pub mod combinator;
pub mod count;
pub mod min_max;
pub mod slab;
pub mod sum;

use std::alloc::Layout;
use std::fmt::Debug;
use std::ptr::NonNull;
use std::sync::Arc;

use data_block::array::{Array, ArrayError, ArrayImpl, StringArray};
use data_block::element::ElementImplRef;
use data_block::types::LogicalType;
use snafu::Snafu;

use super::Function;
use crate::error::SendableError;
use crate::io::{BinarySerde, IoError, ReadBuffer, WriteBuffer};

/// Arena used to allocate the variable-size memory during aggregation. It lives as
/// long as the query, all of the memory is released at once when it is dropped
pub type Arena = bumpalo::Bump;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum AggregationError {
    #[snafu(display("Invalid configuration of the `{func}` aggregation function: {reason}"))]
    Configuration { func: String, reason: &'static str },
    #[snafu(display(
        "Overflow in internal computations of the `{func}` aggregation function with begin `{begin}`, end `{end}` and step `{step}`. Too large arguments"
    ))]
    Overflow {
        func: String,
        begin: String,
        end: String,
        step: u64,
    },
    #[snafu(display(
        "The range given to the `{func}` aggregation function contains too many elements: `{total}` > `{max_elements}`"
    ))]
    RangeTooLarge {
        func: String,
        total: usize,
        max_elements: usize,
    },
    #[snafu(display(
        "`{func}` aggregation function expect {expect} argument, however the argument has logical type `{arg_type}`"
    ))]
    ArgTypeMismatch {
        func: String,
        expect: &'static str,
        arg_type: LogicalType,
    },
    #[snafu(display(
        "`{func}` aggregation function expect `{expect}` arguments, found `{actual}` arguments"
    ))]
    InvalidArgumentCount {
        func: String,
        expect: usize,
        actual: usize,
    },
    #[snafu(display(
        "Parameter `{param}` of the `{func}` aggregation function has value `{value}` that can not be represented by the key type `{key_type}`"
    ))]
    ParameterOutOfRange {
        func: String,
        param: &'static str,
        value: i128,
        key_type: &'static str,
    },
    #[snafu(display("Failed to serialize the state of the `{func}` aggregation function"))]
    Serialize { func: String, source: SendableError },
    #[snafu(display("Failed to deserialize the state of the `{func}` aggregation function"))]
    Deserialize { func: String, source: IoError },
    #[snafu(display(
        "Result array passed to the `{func}` aggregation function does not match its return type"
    ))]
    ResultArrayMismatch { func: String, source: ArrayError },
    #[snafu(display("Failed to create the state of the `{func}` aggregation function"))]
    CreateState { func: String, source: SendableError },
    #[snafu(display("Arithmetic overflow in the `{func}` aggregation function"))]
    ArithmeticOverflow { func: String },
}

/// Aggregation result
pub type Result<T> = std::result::Result<T, AggregationError>;

/// Pointer that points to the aggregation state
///
/// The aggregation state is an opaque byte region described by the
/// [`AggregateFunction::state_layout`]. Only the function that reports the layout knows
/// its internal structure, other code only moves the pointer around. Using this pointer
/// is totally **unsafe**: caller should guarantee the memory behind the pointer is
/// allocated with the layout of the function that accesses it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct AggregateDataPtr(NonNull<u8>);

impl AggregateDataPtr {
    /// Create a new [`AggregateDataPtr`]
    #[inline]
    pub fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    /// Create a new dangling pointer with the given alignment. It is the pointer of the
    /// zero-sized states
    #[inline]
    pub fn dangling(align: usize) -> Self {
        debug_assert!(align.is_power_of_two());
        // SAFETY: alignment is never zero
        Self(unsafe { NonNull::new_unchecked(std::ptr::without_provenance_mut(align)) })
    }

    /// Raw pointer
    #[inline]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Pointer that points to `self + offset` bytes
    ///
    /// # Safety
    ///
    /// `self + offset` should be in the bounds of the same allocation
    #[inline]
    pub unsafe fn add(self, offset: usize) -> Self {
        unsafe { Self(self.0.add(offset)) }
    }

    /// View the pointer as `&mut T`
    ///
    /// # Safety
    ///
    /// The pointer should point to an initialized and properly aligned `T`
    #[inline]
    pub unsafe fn as_mut<'a, T>(self) -> &'a mut T {
        unsafe { &mut *(self.0.as_ptr() as *mut T) }
    }

    /// View the pointer as `&T`
    ///
    /// # Safety
    ///
    /// The pointer should point to an initialized and properly aligned `T`
    #[inline]
    pub unsafe fn as_ref<'a, T>(self) -> &'a T {
        unsafe { &*(self.0.as_ptr() as *const T) }
    }

    /// Write the value into the uninitialized memory without dropping the old value
    ///
    /// # Safety
    ///
    /// The pointer should be valid for writes and properly aligned for `T`
    #[inline]
    pub unsafe fn write<T>(self, value: T) {
        unsafe { std::ptr::write(self.0.as_ptr() as *mut T, value) }
    }

    /// Drop the `T` in place
    ///
    /// # Safety
    ///
    /// The pointer should point to an initialized `T`, and it should not be used
    /// as `T` after calling this function
    #[inline]
    pub unsafe fn drop_in_place<T>(self) {
        unsafe { std::ptr::drop_in_place(self.0.as_ptr() as *mut T) }
    }
}

/// Stringify the aggregation function
pub trait Stringify {
    /// Get name of the aggregation function
    fn name(&self) -> &str;

    /// Debug message
    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;

    /// Display message
    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result;
}

/// Trait for all of the aggregate functions
///
/// # Safety of the state pointers
///
/// All of the `unsafe` methods that take [`AggregateDataPtr`] require the pointer points
/// to a memory region allocated with [`AggregateFunction::state_layout`] of **this**
/// function. Except [`AggregateFunction::create`], the state should have been created.
/// Calls on the same state should be serialized by the caller, different states are
/// independent
pub trait AggregateFunction: Function + Stringify {
    /// Layout of the aggregation state
    fn state_layout(&self) -> Layout;

    /// Size of the aggregation state in bytes
    #[inline]
    fn size_of_data(&self) -> usize {
        self.state_layout().size()
    }

    /// Alignment of the aggregation state
    #[inline]
    fn align_of_data(&self) -> usize {
        self.state_layout().align()
    }

    /// Returns true if the function produces the intermediate state instead of the
    /// finalized value
    fn is_state(&self) -> bool {
        false
    }

    /// Returns true if the serialized state depends on the protocol version
    fn is_versioned(&self) -> bool {
        false
    }

    /// Protocol version used when the caller does not specify one
    fn default_version(&self) -> usize {
        0
    }

    /// Map the revision of the peer to the protocol version of the serialized state
    fn version_from_revision(&self, _revision: usize) -> usize {
        0
    }

    /// Returns true if the function allocates memory in the [`Arena`]
    fn allocates_memory_in_arena(&self) -> bool {
        false
    }

    /// Returns true if destroying the state is no-op
    fn has_trivial_destructor(&self) -> bool {
        true
    }

    /// Initialize the allocated state.
    ///
    /// # Safety
    ///
    /// The state is allocated but uninitialized, implementation should use
    /// [`AggregateDataPtr::write`] to avoid dropping the garbage. If it fails, the
    /// implementation should clean up everything it has built, the caller will not
    /// call `destroy` on the failed state
    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()>;

    /// Destroy the state, it never fails
    ///
    /// # Safety
    ///
    /// The state should not be used after destroy
    unsafe fn destroy(&self, place: AggregateDataPtr);

    /// Destroy the part of the state that is required by the intermediate state. For
    /// most of the functions it is identical to [`AggregateFunction::destroy`]
    ///
    /// # Safety
    ///
    /// Same as [`AggregateFunction::destroy`]
    unsafe fn destroy_up_to_state(&self, place: AggregateDataPtr) {
        unsafe { self.destroy(place) }
    }

    /// Update the state with the `row` in the `columns`
    ///
    /// # Safety
    ///
    /// - `columns` match the signature of the function
    /// - `row` is in the bounds of the `columns`
    unsafe fn add(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        row: usize,
        arena: &Arena,
    ) -> Result<()>;

    /// Update the state with all of the rows in the `columns`
    ///
    /// # Safety
    ///
    /// Same as [`AggregateFunction::add`]
    unsafe fn add_batch(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        num_rows: usize,
        arena: &Arena,
    ) -> Result<()> {
        (0..num_rows).try_for_each(|row| unsafe { self.add(place, columns, row, arena) })
    }

    /// Merge the `rhs` state into the `place` state. `rhs` is not modified
    ///
    /// # Safety
    ///
    /// `place` and `rhs` are different states created by this function
    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        arena: &Arena,
    ) -> Result<()>;

    /// Serialize the state into the buffer
    ///
    /// # Safety
    ///
    /// See trait level docs
    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        version: Option<usize>,
    ) -> Result<()>;

    /// Deserialize the state written by [`AggregateFunction::serialize`] into the
    /// created state
    ///
    /// # Safety
    ///
    /// See trait level docs
    unsafe fn deserialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut ReadBuffer<'_>,
        version: Option<usize>,
        arena: &Arena,
    ) -> Result<()>;

    /// Append the finalized result of the state into the array
    ///
    /// # Safety
    ///
    /// See trait level docs
    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        arena: &Arena,
    ) -> Result<()>;

    /// Append the result of the merged state into the array. Functions that release
    /// their state during finalization distinguish it from
    /// [`AggregateFunction::insert_result_into`]
    ///
    /// # Safety
    ///
    /// See trait level docs
    unsafe fn insert_merge_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        arena: &Arena,
    ) -> Result<()> {
        unsafe { self.insert_result_into(place, to, arena) }
    }

    /// The function wrapped by the combinator
    fn nested_function(&self) -> Option<&Arc<dyn AggregateFunction>> {
        None
    }
}

impl Debug for dyn AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.debug(f)
    }
}

impl std::fmt::Display for dyn AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display(f)
    }
}

/// Value stored in the states of the sum/min/max functions
pub trait StateValue: BinarySerde + Clone + Debug + PartialOrd + Send + Sync + 'static {
    /// Logical type of the value
    const LOGICAL_TYPE: LogicalType;

    /// Description of the arguments it accepts, used in error message
    const EXPECT: &'static str;

    /// Returns true if the value can be extracted from the array with the logical type
    fn accepts(arg: &LogicalType) -> bool;

    /// Extract the value in the row, `None` represents `NULL`
    fn extract(array: &ArrayImpl, row: usize) -> Option<Self>;

    /// Append the value to the array, `None` represents `NULL`
    fn push_into(
        value: Option<&Self>,
        array: &mut ArrayImpl,
    ) -> std::result::Result<(), ArrayError>;
}

macro_rules! impl_numeric_state_value {
    ($({$ty:ty, $logical_type:ident, $variant:ident, $expect:literal, $accepts:expr, $extract:ident}),+) => {
        $(
            impl StateValue for $ty {
                const LOGICAL_TYPE: LogicalType = LogicalType::$logical_type;

                const EXPECT: &'static str = $expect;

                #[inline]
                fn accepts(arg: &LogicalType) -> bool {
                    $accepts(arg)
                }

                #[inline]
                fn extract(array: &ArrayImpl, row: usize) -> Option<Self> {
                    array.$extract(row)
                }

                #[inline]
                fn push_into(
                    value: Option<&Self>,
                    array: &mut ArrayImpl,
                ) -> std::result::Result<(), ArrayError> {
                    array.push(value.map(|&v| ElementImplRef::$variant(v)))
                }
            }
        )+
    };
}

impl_numeric_state_value!(
    {i64, BigInt, Int64, "signed integer", LogicalType::is_signed_integer, get_int},
    {u64, UnsignedBigInt, UInt64, "unsigned integer", LogicalType::is_unsigned_integer, get_uint},
    {f64, Double, Float64, "numeric", is_numeric, get_float}
);

#[inline]
fn is_numeric(arg: &LogicalType) -> bool {
    arg.is_signed_integer() || arg.is_unsigned_integer() || arg.is_float()
}

impl StateValue for String {
    const LOGICAL_TYPE: LogicalType = LogicalType::VarChar;

    const EXPECT: &'static str = "string";

    #[inline]
    fn accepts(arg: &LogicalType) -> bool {
        *arg == LogicalType::VarChar
    }

    #[inline]
    fn extract(array: &ArrayImpl, row: usize) -> Option<Self> {
        let array: &StringArray = array.try_into().ok()?;
        array.get(row).map(String::from)
    }

    #[inline]
    fn push_into(
        value: Option<&Self>,
        array: &mut ArrayImpl,
    ) -> std::result::Result<(), ArrayError> {
        array.push(value.map(|v| ElementImplRef::String(v.as_str())))
    }
}
