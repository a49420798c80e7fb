use crate::{Float, PRTL_CHUNK_SIZE};
use rayon::prelude::*;
use std::sync::atomic::Ordering;

#[cfg(feature = "dprec")]
use std::sync::atomic::AtomicU64 as AtomicBits;

#[cfg(not(feature = "dprec"))]
use std::sync::atomic::AtomicU32 as AtomicBits;

// Float atomics aren't native, so accumulate through the bit pattern
// with a CAS loop.
#[inline(always)]
fn atomic_add(cell: &AtomicBits, val: Float) {
    let mut cur = cell.load(Ordering::Relaxed);
    loop {
        let new = (Float::from_bits(cur) + val).to_bits();
        match cell.compare_exchange_weak(cur, new, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(seen) => cur = seen,
        }
    }
}

/// Per-voxel weighted number density for one species: a scatter-add
/// histogram of `w * rdv` over voxel ids. Rebuilt every dispatch.
pub fn weighted_density(voxel: &[usize], w: &[Float], num_voxels: usize, rdv: Float) -> Vec<Float> {
    if !cfg!(feature = "unchecked") {
        assert_eq!(voxel.len(), w.len());
        assert!(voxel.iter().all(|&v| v < num_voxels));
    }
    let hist: Vec<AtomicBits> = (0..num_voxels).map(|_| AtomicBits::new(0)).collect();
    voxel
        .par_chunks(PRTL_CHUNK_SIZE)
        .zip(w.par_chunks(PRTL_CHUNK_SIZE))
        .for_each(|(vs, ws)| {
            for (&v, &wt) in vs.iter().zip(ws.iter()) {
                atomic_add(&hist[v], wt * rdv);
            }
        });
    hist.into_iter()
        .map(|bits| Float::from_bits(bits.into_inner()))
        .collect()
}
