use crate::rng::{splitmix64, RngPool, RngState};
use crate::species::Species;
use crate::{Float, Grid};
use anyhow::{bail, Result};
use rayon::prelude::*;

pub mod density;
pub mod kernel;
pub mod models;
pub mod tables;

use density::weighted_density;
use kernel::ReducedMass;
use models::{CollisionModel, MonteCarloModel};
use tables::SpeciesTable;

/// The two species taking part in a collision pass. `Intra` is
/// self-collision: both sides of every pair come from the same
/// population, and the density histogram is shared instead of
/// recomputed.
pub enum SpeciesPair<'a> {
    Inter(&'a mut Species, &'a mut Species),
    Intra(&'a mut Species),
}

impl<'a> SpeciesPair<'a> {
    fn spi(&self) -> &Species {
        match self {
            SpeciesPair::Inter(spi, _) => &**spi,
            SpeciesPair::Intra(sp) => &**sp,
        }
    }

    fn spj(&self) -> &Species {
        match self {
            SpeciesPair::Inter(_, spj) => &**spj,
            SpeciesPair::Intra(sp) => &**sp,
        }
    }
}

/// Round-robin pairing of two sub-populations of a voxel.
///
/// Every particle of the larger population appears in exactly one pair;
/// particle `k` of the smaller population owns a contiguous block of
/// `rounds(k)` partners, so its whole collision sequence can run
/// serially on one worker while different `k` run concurrently. The
/// first `remain` small-side particles get `ncoll + 1` partners, the
/// rest get `ncoll`; total pairs = `nmax`.
#[derive(Copy, Clone)]
pub struct PairSchedule {
    pub nmax: usize,
    pub nmin: usize,
    pub ncoll: usize,
    pub remain: usize,
    /// True when species i is the larger side.
    pub swapped: bool,
}

impl PairSchedule {
    pub fn new(ni: usize, nj: usize) -> PairSchedule {
        let swapped = ni > nj;
        let (nmax, nmin) = if swapped { (ni, nj) } else { (nj, ni) };
        let ncoll = if nmin == 0 { 0 } else { nmax / nmin };
        let remain = if nmin == 0 { 0 } else { nmax - ncoll * nmin };
        PairSchedule {
            nmax,
            nmin,
            ncoll,
            remain,
            swapped,
        }
    }

    /// Total pairs generated, one per larger-side particle.
    pub fn pairs(&self) -> usize {
        if self.nmin == 0 {
            0
        } else {
            self.nmax
        }
    }

    /// Number of partners of small-side particle `k`.
    pub fn rounds(&self, k: usize) -> usize {
        if k < self.remain {
            self.ncoll + 1
        } else {
            self.ncoll
        }
    }

    /// Offsets (into the species-i range, the species-j range) of the
    /// `l`-th partner of small-side particle `k`.
    pub fn pair(&self, k: usize, l: usize) -> (usize, usize) {
        if !cfg!(feature = "unchecked") {
            assert!(k < self.nmin);
            assert!(l < self.rounds(k));
        }
        let large = if k < self.remain {
            l + k * (self.ncoll + 1)
        } else {
            l + self.remain * (self.ncoll + 1) + (k - self.remain) * self.ncoll
        };
        if self.swapped {
            (large, k)
        } else {
            (k, large)
        }
    }
}

type PairKernel<M> = unsafe fn(
    ReducedMass,
    &SpeciesTable,
    &SpeciesTable,
    &M,
    &mut RngState,
    Float,
    usize,
    usize,
);

/// General purpose pipeline producing binary collisions between the
/// particles of two (possibly identical) species.
///
/// Within each voxel there are max(ni, nj) collisions per dispatch, and
/// every particle's updates happen inside exactly one worker's serial
/// pair sequence, so no locks are needed on particle data. Collision
/// order is deterministic within one dispatch;
/// randomization across dispatches comes from reshuffling the sort
/// index of species i.
pub struct BinaryCollisionPipeline<'a> {
    pair: SpeciesPair<'a>,
    pool: &'a RngPool,
    coef: ReducedMass,
    dtinterval: Float,
    rdv: Float,
    size_x: usize,
    size_y: usize,
    size_z: usize,
    num_voxels: usize,
}

impl<'a> BinaryCollisionPipeline<'a> {
    /// Both species must have been built on `grid`, and `interval` (the
    /// number of steps covered by one collision pass) must be positive.
    pub fn new(
        pair: SpeciesPair<'a>,
        grid: &Grid,
        interval: Float,
        pool: &'a RngPool,
    ) -> Result<BinaryCollisionPipeline<'a>> {
        let nv = grid.num_voxels();
        let dims = (grid.size_x, grid.size_y, grid.size_z);
        let coef;
        {
            let spi = pair.spi();
            let spj = pair.spj();
            // Compare the interior shape, not the voxel count: distinct
            // grids with permuted dimensions share a count.
            if spi.dims != dims || spj.dims != dims {
                bail!(
                    "species {} and {} were not built on this grid",
                    spi.name,
                    spj.name
                );
            }
            if !(interval > 0.0) {
                bail!("collision interval must be positive, got {}", interval);
            }
            if !(spi.m > 0.0) || !(spj.m > 0.0) {
                bail!("species masses must be positive");
            }
            coef = ReducedMass::new(spi.m, spj.m);
        }
        Ok(BinaryCollisionPipeline {
            pair,
            pool,
            coef,
            dtinterval: grid.dt * interval,
            rdv: 1.0 / grid.dv,
            size_x: grid.size_x,
            size_y: grid.size_y,
            size_z: grid.size_z,
            num_voxels: nv,
        })
    }

    /// Dispatch a collision model on this pipeline.
    ///
    /// Each dispatch tests every eligible particle for collision at
    /// least once. May be called several times per step to layer
    /// different physical processes; densities are recomputed on every
    /// call (caching them across same-step dispatches would be a
    /// worthwhile optimization if model layering gets heavy).
    pub fn dispatch<M: CollisionModel>(&mut self, grid: &Grid, model: &M) -> Result<()> {
        self.dispatch_with(grid, model, kernel::binary_collision::<M>)
    }

    /// As [`dispatch`](Self::dispatch), but each pair is first tested to
    /// collide with probability `cross_section * nvdt`.
    pub fn dispatch_monte_carlo<M: MonteCarloModel>(
        &mut self,
        grid: &Grid,
        model: &M,
    ) -> Result<()> {
        self.dispatch_with(grid, model, kernel::binary_collision_mc::<M>)
    }

    // The Monte Carlo policy is resolved here, once per dispatch; the
    // per-pair hot path is monomorphized and branch-free.
    fn dispatch_with<M: CollisionModel>(
        &mut self,
        grid: &Grid,
        model: &M,
        kernel: PairKernel<M>,
    ) -> Result<()> {
        let step = grid.t.get();

        // Ensure the sort products are current for this step.
        match &mut self.pair {
            SpeciesPair::Inter(spi, spj) => {
                if spi.last_indexed != Some(step) {
                    spi.sort(step);
                }
                if spj.last_indexed != Some(step) {
                    spj.sort(step);
                }
            }
            SpeciesPair::Intra(sp) => {
                if sp.last_indexed != Some(step) {
                    sp.sort(step);
                }
            }
        }

        // Sorting rebuilt the views we are about to take, so validate
        // them against the particle counts.
        {
            let spi = self.pair.spi();
            let spj = self.pair.spj();
            if spi.np != spi.sort_index.len() || self.num_voxels + 1 != spi.partition.len() {
                bail!("bad sort products for species {}", spi.name);
            }
            if spj.np != spj.sort_index.len() || self.num_voxels + 1 != spj.partition.len() {
                bail!("bad sort products for species {}", spj.name);
            }
        }

        // Shuffling one species is enough to randomize the pairings
        // across repeated dispatches.
        let pool = self.pool;
        match &mut self.pair {
            SpeciesPair::Inter(spi, _) => spi.shuffle_sorted(pool),
            SpeciesPair::Intra(sp) => sp.shuffle_sorted(pool),
        }

        // Batch the density histograms up front; doing this inline per
        // pair is much slower. Self-collision shares one histogram.
        let (dens_i, dens_j) = match &self.pair {
            SpeciesPair::Inter(spi, spj) => (
                weighted_density(&spi.voxel, &spi.w, self.num_voxels, self.rdv),
                Some(weighted_density(&spj.voxel, &spj.w, self.num_voxels, self.rdv)),
            ),
            SpeciesPair::Intra(sp) => (
                weighted_density(&sp.voxel, &sp.w, self.num_voxels, self.rdv),
                None,
            ),
        };
        let dens_j_ref: &[Float] = match &dens_j {
            Some(d) => d,
            None => &dens_i,
        };

        self.apply_model(model, kernel, &dens_i, dens_j_ref);
        Ok(())
    }

    /// Loop over voxels performing collisions: one parallel task per
    /// interior voxel, and within it a parallel loop over the smaller
    /// sub-population. Each small-side particle's partner sequence runs
    /// serially on one worker with its own rng sub-stream, which is
    /// what keeps every momentum write single-writer without atomics.
    fn apply_model<M: CollisionModel>(
        &mut self,
        model: &M,
        kernel: PairKernel<M>,
        dens_i: &[Float],
        dens_j: &[Float],
    ) {
        let coef = self.coef;
        let dtinterval = self.dtinterval;
        let pool = self.pool;
        let (sx, sy, sz) = (self.size_x, self.size_y, self.size_z);

        let intra = matches!(self.pair, SpeciesPair::Intra(_));
        let (ti, tj) = match &mut self.pair {
            SpeciesPair::Inter(spi, spj) => (SpeciesTable::new(spi), SpeciesTable::new(spj)),
            SpeciesPair::Intra(sp) => {
                let t = SpeciesTable::new(sp);
                (t, t)
            }
        };

        (0..sx * sy * sz).into_par_iter().for_each(|rank| {
            let vx = rank % sx;
            let vy = (rank / sx) % sy;
            let vz = rank / (sx * sy);
            // +1 in each dimension for the ghost border
            let v = (vx + 1) + (sx + 2) * ((vy + 1) + (sy + 2) * (vz + 1));

            let mut i0 = ti.partition[v];
            let mut ni = ti.partition[v + 1] - i0;
            let mut j0 = tj.partition[v];
            let mut nj = tj.partition[v + 1] - j0;

            if ni == 0 || nj == 0 {
                return; // nothing to collide here
            }

            // Expected encounters per particle, limited by the sparser
            // of the two reagents.
            let ndt = dens_i[v].min(dens_j[v]) * dtinterval;

            pool.scope(|rg| {
                if intra {
                    // Odd population: serially collide the three unique
                    // pairs among the first three particles at half
                    // strength, then drop them from the even split
                    // below. This finishes before the pairing loop is
                    // forked, so the shrunken range is safe to use.
                    if ni % 2 == 1 && ni >= 3 {
                        unsafe {
                            kernel(coef, &ti, &tj, model, rg, 0.5 * ndt,
                                ti.sort_index[i0], ti.sort_index[i0 + 1]);
                            kernel(coef, &ti, &tj, model, rg, 0.5 * ndt,
                                ti.sort_index[i0], ti.sort_index[i0 + 2]);
                            kernel(coef, &ti, &tj, model, rg, 0.5 * ndt,
                                ti.sort_index[i0 + 1], ti.sort_index[i0 + 2]);
                        }
                        ni -= 3;
                        i0 += 3;
                    }

                    // Split the even remainder into two equal halves.
                    ni /= 2;
                    nj = ni;
                    j0 = i0 + ni;
                }

                let sched = PairSchedule::new(ni, nj);
                if sched.pairs() == 0 {
                    return;
                }

                // One team draw seeds a deterministic sub-stream per
                // inner worker, so the checked-out state is never drawn
                // from concurrently.
                let team_seed = rg.gen_u64();
                (0..sched.nmin).into_par_iter().for_each(|k| {
                    let mut rg = RngState::seeded(splitmix64(team_seed ^ k as u64));
                    for l in 0..sched.rounds(k) {
                        let (ioff, joff) = sched.pair(k, l);
                        unsafe {
                            kernel(coef, &ti, &tj, model, &mut rg, ndt,
                                ti.sort_index[i0 + ioff],
                                tj.sort_index[j0 + joff]);
                        }
                    }
                });
            });
        });
    }
}
