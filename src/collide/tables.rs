use crate::species::Species;
use crate::Float;
use std::marker::PhantomData;

/// Shared mutable view of one velocity-component array.
///
/// Copyable and shareable across workers so every voxel task can update
/// particle momenta in place. There are no locks and no atomics on this
/// data: write exclusivity comes entirely from the pairing partition
/// (each particle offset is written by at most one worker per dispatch).
#[derive(Copy, Clone)]
pub struct VelocityView<'a> {
    ptr: *mut Float,
    len: usize,
    _marker: PhantomData<&'a mut [Float]>,
}

unsafe impl<'a> Send for VelocityView<'a> {}
unsafe impl<'a> Sync for VelocityView<'a> {}

impl<'a> VelocityView<'a> {
    pub fn new(buf: &'a mut [Float]) -> VelocityView<'a> {
        VelocityView {
            ptr: buf.as_mut_ptr(),
            len: buf.len(),
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// # Safety
    /// `i` must be in bounds and no other worker may be writing offset
    /// `i` concurrently.
    #[inline(always)]
    pub unsafe fn get(&self, i: usize) -> Float {
        if !cfg!(feature = "unchecked") {
            assert!(i < self.len);
        }
        *self.ptr.add(i)
    }

    /// # Safety
    /// `i` must be in bounds and this worker must hold exclusive write
    /// access to offset `i` for the duration of the dispatch.
    #[inline(always)]
    pub unsafe fn set(&self, i: usize, val: Float) {
        if !cfg!(feature = "unchecked") {
            assert!(i < self.len);
        }
        *self.ptr.add(i) = val;
    }
}

/// Per-dispatch view of one species' particle table: mutable velocity
/// components plus read-only weights and sort products. For
/// self-collision the second species' table is a copy of the first;
/// copying the view is what makes aliasing cheap.
#[derive(Copy, Clone)]
pub struct SpeciesTable<'a> {
    pub ux: VelocityView<'a>,
    pub uy: VelocityView<'a>,
    pub uz: VelocityView<'a>,
    pub w: &'a [Float],
    pub sort_index: &'a [usize],
    pub partition: &'a [usize],
}

impl<'a> SpeciesTable<'a> {
    pub fn new(sp: &'a mut Species) -> SpeciesTable<'a> {
        let Species {
            ux,
            uy,
            uz,
            w,
            sort_index,
            partition,
            ..
        } = sp;
        SpeciesTable {
            ux: VelocityView::new(ux),
            uy: VelocityView::new(uy),
            uz: VelocityView::new(uz),
            w,
            sort_index,
            partition,
        }
    }
}
