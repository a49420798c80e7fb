#![allow(dead_code)]

use collide_rs::rng::RngPool;
use collide_rs::species::Species;
use collide_rs::{Config, Float, Grid, Params, Setup};

// This is a function that sets up a dummy small
// simulation so that it can be used in testing;
pub fn setup_config() -> Config {
    Config {
        setup: Setup {
            t_final: 10,
            seed: 12345,
            print_interval: 5,
        },
        params: Params {
            size_x: 4,
            size_y: 3,
            size_z: 2,
            dt: 0.1,
            dv: 1.0,
            dens: 8,
            vth: 0.05,
            interval: 10.0,
            nu0: 1e-2,
        },
    }
}

pub fn setup_grid() -> Grid {
    Grid::new(&setup_config())
}

pub fn single_cell_grid() -> Grid {
    let mut cfg = setup_config();
    cfg.params.size_x = 1;
    cfg.params.size_y = 1;
    cfg.params.size_z = 1;
    Grid::new(&cfg)
}

/// Load `n` Maxwellian particles of weight `w` into a single voxel.
pub fn fill_voxel(
    sp: &mut Species,
    voxel: usize,
    n: usize,
    vth: Float,
    w: Float,
    pool: &RngPool,
) {
    pool.scope(|rg| {
        for _ in 0..n {
            sp.push(
                voxel,
                vth * rg.normal(),
                vth * rg.normal(),
                vth * rg.normal(),
                w,
            );
        }
    });
}
