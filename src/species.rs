use crate::rng::{splitmix64, RngPool, RngState};
use crate::{Float, Grid};
use itertools::izip;
use rayon::prelude::*;

/// A named population of macro-particles sharing mass and charge.
///
/// Particle data is a structure of arrays. `partition` and `sort_index`
/// are the sort products: `partition` has length `num_voxels + 1` and is
/// monotone, and `sort_index[partition[v]..partition[v+1]]` lists the
/// particles in voxel `v`. `last_indexed` marks the step the sort was
/// built on; anything that grows or moves particles must clear it.
pub struct Species {
    pub name: String,
    pub m: Float,
    pub q: Float,
    pub np: usize,
    pub ux: Vec<Float>,
    pub uy: Vec<Float>,
    pub uz: Vec<Float>,
    pub w: Vec<Float>,
    pub voxel: Vec<usize>,
    pub partition: Vec<usize>,
    pub sort_index: Vec<usize>,
    pub last_indexed: Option<u32>,
    pub num_voxels: usize,
    /// Interior cell counts of the grid this species was built on.
    pub dims: (usize, usize, usize),
}

impl Species {
    pub fn new(grid: &Grid, name: &str, m: Float, q: Float) -> Species {
        Species {
            name: name.to_string(),
            m,
            q,
            np: 0,
            ux: Vec::new(),
            uy: Vec::new(),
            uz: Vec::new(),
            w: Vec::new(),
            voxel: Vec::new(),
            partition: vec![0; grid.num_voxels() + 1],
            sort_index: Vec::new(),
            last_indexed: None,
            num_voxels: grid.num_voxels(),
            dims: (grid.size_x, grid.size_y, grid.size_z),
        }
    }

    /// Load `dens` particles per interior cell with Maxwellian velocities
    /// of thermal spread `vth` and uniform statistical weight.
    pub fn maxwellian(
        grid: &Grid,
        name: &str,
        m: Float,
        q: Float,
        dens: usize,
        vth: Float,
        weight: Float,
        pool: &RngPool,
    ) -> Species {
        let mut sp = Species::new(grid, name, m, q);
        let np = grid.size_x * grid.size_y * grid.size_z * dens;
        sp.ux.reserve(np);
        sp.uy.reserve(np);
        sp.uz.reserve(np);
        sp.w.reserve(np);
        sp.voxel.reserve(np);
        pool.scope(|rg| {
            for iz in 0..grid.size_z {
                for iy in 0..grid.size_y {
                    for ix in 0..grid.size_x {
                        // +1 for the ghost border
                        let v = grid.voxel(ix + 1, iy + 1, iz + 1);
                        for _ in 0..dens {
                            sp.push(v, vth * rg.normal(), vth * rg.normal(), vth * rg.normal(), weight);
                        }
                    }
                }
            }
        });
        sp
    }

    /// Append one particle. Invalidates the sort products.
    pub fn push(&mut self, voxel: usize, ux: Float, uy: Float, uz: Float, w: Float) {
        if !cfg!(feature = "unchecked") {
            assert!(voxel < self.num_voxels);
        }
        self.voxel.push(voxel);
        self.ux.push(ux);
        self.uy.push(uy);
        self.uz.push(uz);
        self.w.push(w);
        self.np += 1;
        self.last_indexed = None;
    }

    /// Stable voxel-bucket (counting) sort. Rebuilds `partition` and
    /// `sort_index` and stamps `last_indexed` with `step`.
    pub fn sort(&mut self, step: u32) {
        let nv = self.num_voxels;
        if !cfg!(feature = "unchecked") {
            assert_eq!(self.partition.len(), nv + 1);
            assert!(self.voxel.iter().all(|&v| v < nv));
        }
        for p in self.partition.iter_mut() {
            *p = 0;
        }
        for &v in &self.voxel {
            self.partition[v + 1] += 1;
        }
        for v in 0..nv {
            self.partition[v + 1] += self.partition[v];
        }
        self.sort_index.resize(self.np, 0);
        let mut cursor = self.partition[..nv].to_vec();
        for (i, &v) in self.voxel.iter().enumerate() {
            self.sort_index[cursor[v]] = i;
            cursor[v] += 1;
        }
        self.last_indexed = Some(step);
    }

    /// Randomize the order of `sort_index` within each voxel's range.
    /// The partition invariant is untouched: each range remains a
    /// permutation of that voxel's particles. Ranges are disjoint so
    /// voxels shuffle in parallel, each on its own sub-stream.
    pub fn shuffle_sorted(&mut self, pool: &RngPool) {
        let nv = self.num_voxels;
        if !cfg!(feature = "unchecked") {
            assert_eq!(self.partition.len(), nv + 1);
            assert_eq!(self.sort_index.len(), self.np);
        }
        let mut ranges: Vec<&mut [usize]> = Vec::with_capacity(nv);
        let mut rest = &mut self.sort_index[..];
        for v in 0..nv {
            let n = self.partition[v + 1] - self.partition[v];
            let (head, tail) = rest.split_at_mut(n);
            ranges.push(head);
            rest = tail;
        }
        let base = pool.scope(|rg| rg.gen_u64());
        ranges.into_par_iter().enumerate().for_each(|(v, range)| {
            if range.len() > 1 {
                let mut rg = RngState::seeded(splitmix64(base ^ v as u64));
                rg.shuffle(range);
            }
        });
    }

    /// Weight-averaged kinetic energy per macro-particle.
    pub fn mean_kinetic_energy(&self) -> Float {
        let mut ke = 0.0;
        let mut wtot = 0.0;
        for (ux, uy, uz, w) in izip!(&self.ux, &self.uy, &self.uz, &self.w) {
            ke += 0.5 * self.m * w * (ux * ux + uy * uy + uz * uz);
            wtot += w;
        }
        if wtot > 0.0 {
            ke / wtot
        } else {
            0.0
        }
    }
}
