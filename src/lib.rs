use serde::Deserialize;
use std::cell::Cell;
use std::fs;

use anyhow::{Context, Result};

pub mod collide;
pub mod rng;
pub mod species;

use collide::models::TakizukaAbe;
use collide::{BinaryCollisionPipeline, SpeciesPair};
use rng::RngPool;
use species::Species;

// We use a type alias for f64/Float to easily support
// double and single precision.
#[cfg(feature = "dprec")]
pub type Float = f64;

#[cfg(not(feature = "dprec"))]
pub type Float = f32;

pub(crate) const PI: Float = std::f64::consts::PI as Float;

// chunk size for the parallel density deposit
pub(crate) const PRTL_CHUNK_SIZE: usize = 8192;

#[derive(Deserialize)]
pub struct Config {
    pub params: Params,
    pub setup: Setup,
}

#[derive(Deserialize)]
pub struct Setup {
    pub t_final: u32,
    pub seed: u64,
    pub print_interval: u32,
}

#[derive(Deserialize)]
pub struct Params {
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub dt: Float,
    pub dv: Float,
    pub dens: usize,
    pub vth: Float,
    pub interval: Float,
    pub nu0: Float,
}

impl Config {
    pub fn new() -> Result<Config> {
        let contents =
            fs::read_to_string("config.toml").context("Could not open the config.toml file")?;
        toml::from_str(&contents).with_context(|| "Could not parse Config file")
    }
}

/// The spatial mesh the particles live on. Every dimension carries one
/// ghost cell on each side, so voxel ids index an
/// `(size_x + 2) * (size_y + 2) * (size_z + 2)` block and interior
/// cells sit at `1..=size`.
pub struct Grid {
    pub t: Cell<u32>,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub dt: Float,
    pub dv: Float,
}

impl Grid {
    pub fn new(cfg: &Config) -> Grid {
        Grid {
            t: Cell::new(0),
            size_x: cfg.params.size_x,
            size_y: cfg.params.size_y,
            size_z: cfg.params.size_z,
            dt: cfg.params.dt,
            dv: cfg.params.dv,
        }
    }

    pub fn num_voxels(&self) -> usize {
        (self.size_x + 2) * (self.size_y + 2) * (self.size_z + 2)
    }

    /// Voxel id from ghost-inclusive cell coordinates.
    #[inline(always)]
    pub fn voxel(&self, ix: usize, iy: usize, iz: usize) -> usize {
        if !cfg!(feature = "unchecked") {
            assert!(ix < self.size_x + 2);
            assert!(iy < self.size_y + 2);
            assert!(iz < self.size_z + 2);
        }
        ix + (self.size_x + 2) * (iy + (self.size_y + 2) * iz)
    }
}

pub fn run(cfg: Config) -> Result<()> {
    if cfg.params.size_x == 0 || cfg.params.size_y == 0 || cfg.params.size_z == 0 {
        return Err(anyhow::Error::msg(
            "Number of cells must be nonzero in every direction",
        ));
    }
    if !(cfg.params.dt > 0.0) {
        return Err(anyhow::Error::msg("Timestep must be positive"));
    }
    if !(cfg.params.dv > 0.0) {
        return Err(anyhow::Error::msg("Voxel volume must be positive"));
    }

    let grid = Grid::new(&cfg);
    let pool = RngPool::new(cfg.setup.seed);

    println!("initializing prtls");
    let mut ions = Species::maxwellian(
        &grid, "ions", 1.0, 1.0, cfg.params.dens, cfg.params.vth, 1.0, &pool,
    );
    let mut lecs = Species::maxwellian(
        &grid, "lecs", 1.0, -1.0, cfg.params.dens, cfg.params.vth, 1.0, &pool,
    );

    let model = TakizukaAbe {
        nu0: cfg.params.nu0,
    };

    for t in 0..=cfg.setup.t_final {
        grid.t.set(t);

        BinaryCollisionPipeline::new(
            SpeciesPair::Inter(&mut ions, &mut lecs),
            &grid,
            cfg.params.interval,
            &pool,
        )?
        .dispatch(&grid, &model)?;

        BinaryCollisionPipeline::new(
            SpeciesPair::Intra(&mut lecs),
            &grid,
            cfg.params.interval,
            &pool,
        )?
        .dispatch(&grid, &model)?;

        if t % cfg.setup.print_interval == 0 {
            println!(
                "t = {:05}: <KE> ions {:.6e}, lecs {:.6e}",
                t,
                ions.mean_kinetic_energy(),
                lecs.mean_kinetic_energy()
            );
        }
    }
    Ok(())
}
