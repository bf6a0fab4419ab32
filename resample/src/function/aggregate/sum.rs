//! Sum aggregation function

use std::alloc::Layout;
use std::fmt::Debug;
use std::marker::PhantomData;

use data_block::array::ArrayImpl;
use data_block::types::LogicalType;
use snafu::{OptionExt, ResultExt, ensure};

use super::{
    AggregateDataPtr, AggregateFunction, Arena, ArgTypeMismatchSnafu, ArithmeticOverflowSnafu,
    DeserializeSnafu, InvalidArgumentCountSnafu, Result, ResultArrayMismatchSnafu, StateValue,
    Stringify,
};
use crate::function::Function;
use crate::io::{BinarySerde, ReadBuffer, WriteBuffer};

/// Value that can be summed
pub trait SumValue: StateValue + Copy {
    /// Additive identity
    const ZERO: Self;

    /// Add two values. Returns `None` if it overflows and the `overflow_checks`
    /// feature is enabled. Otherwise, integers wrap around on overflow
    fn add_value(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_integer_sum_value {
    ($($ty:ty),+) => {
        $(
            impl SumValue for $ty {
                const ZERO: Self = 0;

                #[inline]
                fn add_value(self, rhs: Self) -> Option<Self> {
                    #[cfg(feature = "overflow_checks")]
                    {
                        self.checked_add(rhs)
                    }
                    #[cfg(not(feature = "overflow_checks"))]
                    {
                        Some(self.wrapping_add(rhs))
                    }
                }
            }
        )+
    };
}

impl_integer_sum_value!(i64, u64);

impl SumValue for f64 {
    const ZERO: Self = 0.0;

    #[inline]
    fn add_value(self, rhs: Self) -> Option<Self> {
        Some(self + rhs)
    }
}

/// State of the sum function, `None` means no value has been added
type SumState<T> = Option<T>;

/// Sum aggregation function. The argument is widened to `T` before summing, `NULL`s
/// are ignored. The result is `NULL` if no value is summed
///
/// # Generic
///
/// - `T`: type of the sum, `i64` for signed integers, `u64` for unsigned integers and
///   `f64` for any numeric
pub struct Sum<T> {
    args: Vec<LogicalType>,
    _phantom: PhantomData<T>,
}

impl<T: SumValue> Sum<T> {
    /// Create a new sum function
    pub fn try_new(args: Vec<LogicalType>) -> Result<Self> {
        ensure!(
            args.len() == 1,
            InvalidArgumentCountSnafu {
                func: "sum",
                expect: 1_usize,
                actual: args.len()
            }
        );
        ensure!(
            T::accepts(&args[0]),
            ArgTypeMismatchSnafu {
                func: "sum",
                expect: T::EXPECT,
                arg_type: args[0].clone()
            }
        );

        Ok(Self {
            args,
            _phantom: PhantomData,
        })
    }
}

impl<T: SumValue> Debug for Sum<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sum")
            .field("args", &self.args)
            .field("sum_type", &T::LOGICAL_TYPE)
            .finish()
    }
}

impl<T: SumValue> Stringify for Sum<T> {
    fn name(&self) -> &str {
        "sum"
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn sum({}) -> {}", self.args[0], T::LOGICAL_TYPE)
    }
}

impl<T: SumValue> Function for Sum<T> {
    fn arguments(&self) -> &[LogicalType] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        T::LOGICAL_TYPE
    }
}

impl<T: SumValue> Sum<T> {
    #[inline]
    fn accumulate(&self, state: &mut SumState<T>, value: T) -> Result<()> {
        *state = Some(match *state {
            Some(sum) => sum
                .add_value(value)
                .context(ArithmeticOverflowSnafu { func: self.name() })?,
            None => value,
        });
        Ok(())
    }
}

impl<T: SumValue> AggregateFunction for Sum<T> {
    fn state_layout(&self) -> Layout {
        Layout::new::<SumState<T>>()
    }

    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
        unsafe { place.write::<SumState<T>>(None) };
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
        match T::extract(columns[0], row) {
            Some(value) => self.accumulate(unsafe { place.as_mut() }, value),
            None => Ok(()),
        }
    }

    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        _arena: &Arena,
    ) -> Result<()> {
        match unsafe { *rhs.as_ref::<SumState<T>>() } {
            Some(value) => self.accumulate(unsafe { place.as_mut() }, value),
            None => Ok(()),
        }
    }

    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        _version: Option<usize>,
    ) -> Result<()> {
        unsafe { place.as_ref::<SumState<T>>() }.write_binary(buf);
        Ok(())
    }

    unsafe fn deserialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut ReadBuffer<'_>,
        _version: Option<usize>,
        _arena: &Arena,
    ) -> Result<()> {
        let state =
            SumState::<T>::read_binary(buf).context(DeserializeSnafu { func: self.name() })?;
        unsafe { *place.as_mut::<SumState<T>>() = state };
        Ok(())
    }

    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        _arena: &Arena,
    ) -> Result<()> {
        let state = unsafe { place.as_ref::<SumState<T>>() };
        T::push_into(state.as_ref(), to).context(ResultArrayMismatchSnafu { func: self.name() })
    }
}
