//! Owner of the aggregation state

use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ptr::NonNull;
use std::sync::Arc;

use data_block::array::ArrayImpl;

use super::{AggregateDataPtr, AggregateFunction, Arena, Result};
use crate::io::{ReadBuffer, WriteBuffer};

/// A created aggregation state of an [`AggregateFunction`]. The memory is allocated
/// with the layout reported by the function, the state is created on construction
/// and destroyed when the slab is dropped.
///
/// The slab is the safe entry of the aggregation: it guarantees the state passed to
/// the function is always created by the same function
#[derive(Debug)]
pub struct StateSlab {
    func: Arc<dyn AggregateFunction>,
    ptr: AggregateDataPtr,
    layout: Layout,
}

/// SAFETY: the slab exclusively owns the state memory, the function is Send + Sync
unsafe impl Send for StateSlab {}

impl StateSlab {
    /// Allocate the memory and create the state
    pub fn try_new(func: Arc<dyn AggregateFunction>) -> Result<Self> {
        let layout = func.state_layout();
        let ptr = if layout.size() == 0 {
            AggregateDataPtr::dangling(layout.align())
        } else {
            // SAFETY: size of the layout is not zero
            let ptr = unsafe { alloc(layout) };
            AggregateDataPtr::new(NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(layout)))
        };

        // SAFETY: ptr is allocated with the layout of the function
        if let Err(e) = unsafe { func.create(ptr) } {
            // The failed state has been cleaned up by the function itself
            if layout.size() != 0 {
                unsafe { dealloc(ptr.as_ptr(), layout) };
            }
            return Err(e);
        }

        Ok(Self { func, ptr, layout })
    }

    /// Function that owns the state
    #[inline]
    pub fn func(&self) -> &Arc<dyn AggregateFunction> {
        &self.func
    }

    /// Pointer to the state
    #[inline]
    pub fn as_ptr(&self) -> AggregateDataPtr {
        self.ptr
    }

    /// Update the state with the `row` in the `columns`
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds
    pub fn add(&mut self, columns: &[&ArrayImpl], row: usize, arena: &Arena) -> Result<()> {
        check_columns(&*self.func, columns, row + 1);
        // SAFETY: state is created by the func and columns are checked
        unsafe { self.func.add(self.ptr, columns, row, arena) }
    }

    /// Update the state with the first `num_rows` rows in the `columns`
    ///
    /// # Panics
    ///
    /// Panics if any column has less than `num_rows` rows
    pub fn add_batch(
        &mut self,
        columns: &[&ArrayImpl],
        num_rows: usize,
        arena: &Arena,
    ) -> Result<()> {
        check_columns(&*self.func, columns, num_rows);
        // SAFETY: state is created by the func and columns are checked
        unsafe { self.func.add_batch(self.ptr, columns, num_rows, arena) }
    }

    /// Merge the state of `other` into self
    ///
    /// # Panics
    ///
    /// Panics if two slabs are not created by the same function
    pub fn merge(&mut self, other: &StateSlab, arena: &Arena) -> Result<()> {
        assert!(
            Arc::ptr_eq(&self.func, &other.func),
            "Can not merge the states created by different aggregate functions"
        );
        // SAFETY: both of the states are created by the func and exclusive
        unsafe { self.func.merge(self.ptr, other.ptr, arena) }
    }

    /// Serialize the state into the buffer
    pub fn serialize(&self, buf: &mut WriteBuffer, version: Option<usize>) -> Result<()> {
        // SAFETY: state is created by the func
        unsafe { self.func.serialize(self.ptr, buf, version) }
    }

    /// Deserialize the state from the buffer
    pub fn deserialize(
        &mut self,
        buf: &mut ReadBuffer<'_>,
        version: Option<usize>,
        arena: &Arena,
    ) -> Result<()> {
        // SAFETY: state is created by the func
        unsafe { self.func.deserialize(self.ptr, buf, version, arena) }
    }

    /// Append the finalized result into the array
    pub fn insert_result_into(&mut self, to: &mut ArrayImpl, arena: &Arena) -> Result<()> {
        // SAFETY: state is created by the func
        unsafe { self.func.insert_result_into(self.ptr, to, arena) }
    }

    /// Append the result of the merged state into the array
    pub fn insert_merge_result_into(&mut self, to: &mut ArrayImpl, arena: &Arena) -> Result<()> {
        // SAFETY: state is created by the func
        unsafe { self.func.insert_merge_result_into(self.ptr, to, arena) }
    }
}

impl Drop for StateSlab {
    fn drop(&mut self) {
        // SAFETY: state is created by the func and it will never be used again
        unsafe {
            self.func.destroy(self.ptr);
            if self.layout.size() != 0 {
                dealloc(self.ptr.as_ptr(), self.layout);
            }
        }
    }
}

/// Allocate the state of the function in the arena and create it. The arena never
/// runs the destructor, caller should call [`AggregateFunction::destroy`] on the
/// returned state before the arena is dropped if the function does not have trivial
/// destructor
pub fn alloc_state_in(arena: &Arena, func: &dyn AggregateFunction) -> Result<AggregateDataPtr> {
    let ptr = AggregateDataPtr::new(arena.alloc_layout(func.state_layout()));
    // SAFETY: ptr is allocated with the layout of the function
    unsafe { func.create(ptr)? };
    Ok(ptr)
}

#[inline]
fn check_columns(func: &dyn AggregateFunction, columns: &[&ArrayImpl], num_rows: usize) {
    assert_eq!(
        columns.len(),
        func.arguments().len(),
        "`{}` expect `{}` columns",
        func.name(),
        func.arguments().len()
    );
    columns.iter().for_each(|column| {
        assert!(
            column.len() >= num_rows,
            "Column of `{}` has `{}` rows, expect at least `{}` rows",
            func.name(),
            column.len(),
            num_rows
        )
    });

    #[cfg(feature = "verify")]
    columns
        .iter()
        .zip(func.arguments())
        .for_each(|(column, arg)| assert_eq!(column.logical_type(), arg));
}
