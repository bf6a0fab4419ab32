//! Count aggregation function

use std::alloc::Layout;
use std::fmt::Debug;

use data_block::array::ArrayImpl;
use data_block::element::ElementImplRef;
use data_block::types::LogicalType;
use snafu::{ResultExt, ensure};

use super::{
    AggregateDataPtr, AggregateFunction, Arena, DeserializeSnafu, InvalidArgumentCountSnafu,
    Result, ResultArrayMismatchSnafu, Stringify,
};
use crate::function::Function;
use crate::io::{ReadBuffer, WriteBuffer};

/// State of the count function
type CountState = u64;

/// Count aggregation function
///
/// # Generic
///
/// - `STAR`: If it is true, it is `count(*)` that counts all of the rows. Otherwise,
///   it only counts the rows whose argument is not `NULL`
pub struct Count<const STAR: bool> {
    args: Vec<LogicalType>,
}

/// `count(*)`
pub type CountStar = Count<true>;

impl CountStar {
    /// Create a new `count(*)` function
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }
}

impl Default for CountStar {
    fn default() -> Self {
        Self::new()
    }
}

impl Count<false> {
    /// Create a new count function that counts the non-null rows of the argument
    pub fn try_new(args: Vec<LogicalType>) -> Result<Self> {
        ensure!(
            args.len() == 1,
            InvalidArgumentCountSnafu {
                func: "count",
                expect: 1_usize,
                actual: args.len()
            }
        );
        Ok(Self { args })
    }
}

impl<const STAR: bool> Debug for Count<STAR> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if STAR {
            f.debug_struct("CountStar").finish()
        } else {
            f.debug_struct("Count").field("args", &self.args).finish()
        }
    }
}

impl<const STAR: bool> Stringify for Count<STAR> {
    fn name(&self) -> &str {
        "count"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if STAR {
            write!(f, "fn count(*) -> UInt64")
        } else {
            write!(f, "fn count({}) -> UInt64", self.args[0])
        }
    }
}

impl<const STAR: bool> Function for Count<STAR> {
    fn arguments(&self) -> &[LogicalType] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        LogicalType::UnsignedBigInt
    }
}

impl<const STAR: bool> AggregateFunction for Count<STAR> {
    fn state_layout(&self) -> Layout {
        Layout::new::<CountState>()
    }

    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
        unsafe { place.write::<CountState>(0) };
        Ok(())
    }

    unsafe fn destroy(&self, _place: AggregateDataPtr) {}

    unsafe fn add(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        row: usize,
        _arena: &Arena,
    ) -> Result<()> {
        if STAR || columns[0].get(row).is_some() {
            unsafe { *place.as_mut::<CountState>() += 1 };
        }
        Ok(())
    }

    unsafe fn add_batch(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        num_rows: usize,
        _arena: &Arena,
    ) -> Result<()> {
        let count = if STAR {
            num_rows
        } else {
            let validity = columns[0].validity();
            if validity.all_valid() {
                num_rows
            } else {
                validity.iter().take(num_rows).filter(|&valid| valid).count()
            }
        };
        unsafe { *place.as_mut::<CountState>() += count as u64 };
        Ok(())
    }

    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        _arena: &Arena,
    ) -> Result<()> {
        unsafe { *place.as_mut::<CountState>() += *rhs.as_ref::<CountState>() };
        Ok(())
    }

    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        _version: Option<usize>,
    ) -> Result<()> {
        buf.write_var_uint(unsafe { *place.as_ref::<CountState>() });
        Ok(())
    }

    unsafe fn deserialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut ReadBuffer<'_>,
        _version: Option<usize>,
        _arena: &Arena,
    ) -> Result<()> {
        let count = buf
            .read_var_uint()
            .context(DeserializeSnafu { func: self.name() })?;
        unsafe { *place.as_mut::<CountState>() = count };
        Ok(())
    }

    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        _arena: &Arena,
    ) -> Result<()> {
        let count = unsafe { *place.as_ref::<CountState>() };
        to.push(Some(ElementImplRef::UInt64(count)))
            .context(ResultArrayMismatchSnafu { func: self.name() })
    }
}
