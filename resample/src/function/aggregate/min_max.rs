//! Min/Max aggregation function

use std::alloc::Layout;
use std::fmt::Debug;
use std::marker::PhantomData;

use data_block::array::ArrayImpl;
use data_block::types::LogicalType;
use snafu::{ResultExt, ensure};

use super::{
    AggregateDataPtr, AggregateFunction, Arena, ArgTypeMismatchSnafu, DeserializeSnafu,
    InvalidArgumentCountSnafu, Result, ResultArrayMismatchSnafu, StateValue, Stringify,
};
use crate::function::Function;
use crate::io::{BinarySerde, ReadBuffer, WriteBuffer};

/// Aggregation state of the min/max function
type MinMaxState<T> = Option<T>;

/// Min/Max aggregation function
///
/// FIXME: If we compute the min/max for the float array that contains `NaN`, the result
/// will be undetermined
///
/// # Generic
///
/// - `IS_MIN`: If it is true, it will be min aggregation function
/// - `T`: The type of the value, the argument is widened to it
pub struct MinMax<const IS_MIN: bool, T> {
    args: Vec<LogicalType>,
    _phantom: PhantomData<T>,
}

/// Min aggregation function
pub type Min<T> = MinMax<true, T>;
/// Max aggregation function
pub type Max<T> = MinMax<false, T>;

impl<const IS_MIN: bool, T: StateValue> MinMax<IS_MIN, T> {
    const NAME: &'static str = if IS_MIN { "min" } else { "max" };

    /// Create a new MinMax function
    pub fn try_new(args: Vec<LogicalType>) -> Result<Self> {
        ensure!(
            args.len() == 1,
            InvalidArgumentCountSnafu {
                func: Self::NAME,
                expect: 1_usize,
                actual: args.len()
            }
        );
        ensure!(
            T::accepts(&args[0]),
            ArgTypeMismatchSnafu {
                func: Self::NAME,
                expect: T::EXPECT,
                arg_type: args[0].clone()
            }
        );

        Ok(Self {
            args,
            _phantom: PhantomData,
        })
    }

    #[inline]
    fn update(current: &mut MinMaxState<T>, value: T) {
        let replace = match current {
            Some(current) => {
                if IS_MIN {
                    value < *current
                } else {
                    value > *current
                }
            }
            None => true,
        };
        if replace {
            *current = Some(value);
        }
    }
}

impl<const IS_MIN: bool, T: StateValue> Debug for MinMax<IS_MIN, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(if IS_MIN { "Min" } else { "Max" })
            .field("args", &self.args)
            .finish()
    }
}

impl<const IS_MIN: bool, T: StateValue> Stringify for MinMax<IS_MIN, T> {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn debug(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }

    fn display(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fn {}({}) -> {}",
            self.name(),
            self.args[0],
            T::LOGICAL_TYPE
        )
    }
}

impl<const IS_MIN: bool, T: StateValue> Function for MinMax<IS_MIN, T> {
    fn arguments(&self) -> &[LogicalType] {
        &self.args
    }

    fn return_type(&self) -> LogicalType {
        T::LOGICAL_TYPE
    }
}

impl<const IS_MIN: bool, T: StateValue> AggregateFunction for MinMax<IS_MIN, T> {
    fn state_layout(&self) -> Layout {
        Layout::new::<MinMaxState<T>>()
    }

    fn has_trivial_destructor(&self) -> bool {
        !std::mem::needs_drop::<MinMaxState<T>>()
    }

    unsafe fn create(&self, place: AggregateDataPtr) -> Result<()> {
        // Using write here to avoid drop the uninitiated value, especially for `String`
        unsafe { place.write::<MinMaxState<T>>(None) };
        Ok(())
    }

    /// Drop the memory contained by the state. For example, string has memory allocation
    unsafe fn destroy(&self, place: AggregateDataPtr) {
        unsafe { place.drop_in_place::<MinMaxState<T>>() }
    }

    unsafe fn add(
        &self,
        place: AggregateDataPtr,
        columns: &[&ArrayImpl],
        row: usize,
        _arena: &Arena,
    ) -> Result<()> {
        if let Some(value) = T::extract(columns[0], row) {
            Self::update(unsafe { place.as_mut() }, value);
        }
        Ok(())
    }

    unsafe fn merge(
        &self,
        place: AggregateDataPtr,
        rhs: AggregateDataPtr,
        _arena: &Arena,
    ) -> Result<()> {
        if let Some(value) = unsafe { rhs.as_ref::<MinMaxState<T>>() } {
            Self::update(unsafe { place.as_mut() }, value.clone());
        }
        Ok(())
    }

    unsafe fn serialize(
        &self,
        place: AggregateDataPtr,
        buf: &mut WriteBuffer,
        _version: Option<usize>,
    ) -> Result<()> {
        unsafe { place.as_ref::<MinMaxState<T>>() }.write_binary(buf);
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
            MinMaxState::<T>::read_binary(buf).context(DeserializeSnafu { func: self.name() })?;
        // Assignment drops the old value
        unsafe { *place.as_mut::<MinMaxState<T>>() = state };
        Ok(())
    }

    unsafe fn insert_result_into(
        &self,
        place: AggregateDataPtr,
        to: &mut ArrayImpl,
        _arena: &Arena,
    ) -> Result<()> {
        let state = unsafe { place.as_ref::<MinMaxState<T>>() };
        T::push_into(state.as_ref(), to).context(ResultArrayMismatchSnafu { func: self.name() })
    }
}
