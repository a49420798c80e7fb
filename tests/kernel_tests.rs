mod common;

use collide_rs::collide::kernel::{
    binary_collision, binary_collision_mc, ReducedMass, TAN_THETA_HALF_MAX,
};
use collide_rs::collide::models::{CollisionModel, HardSphere, MonteCarloModel, TakizukaAbe};
use collide_rs::collide::tables::SpeciesTable;
use collide_rs::rng::RngState;
use collide_rs::species::Species;
use collide_rs::Float;

/// Scatters by a fixed polar angle; elastic. Draws nothing itself, so
/// two runs from the same seed consume identical random sequences.
struct FixedTan {
    tan: Float,
}

impl CollisionModel for FixedTan {
    fn tan_theta_half(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        self.tan
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0
    }
}

struct ZeroCrossSection;

impl CollisionModel for ZeroCrossSection {
    fn tan_theta_half(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        0.7
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0
    }
}

impl MonteCarloModel for ZeroCrossSection {
    fn cross_section(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        0.0
    }
}

struct HugeCrossSection;

impl CollisionModel for HugeCrossSection {
    fn tan_theta_half(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        0.7
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0
    }
}

impl MonteCarloModel for HugeCrossSection {
    fn cross_section(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0e30
    }
}

fn two_prtl_pair(
    m_i: Float,
    m_j: Float,
    ui: [Float; 3],
    uj: [Float; 3],
    wi: Float,
    wj: Float,
) -> (Species, Species) {
    let grid = common::single_cell_grid();
    let v = grid.voxel(1, 1, 1);
    let mut spi = Species::new(&grid, "ions", m_i, 1.0);
    let mut spj = Species::new(&grid, "lecs", m_j, -1.0);
    spi.push(v, ui[0], ui[1], ui[2], wi);
    spj.push(v, uj[0], uj[1], uj[2], wj);
    spi.sort(0);
    spj.sort(0);
    (spi, spj)
}

fn momentum(spi: &Species, spj: &Species) -> [Float; 3] {
    [
        spi.m * spi.w[0] * spi.ux[0] + spj.m * spj.w[0] * spj.ux[0],
        spi.m * spi.w[0] * spi.uy[0] + spj.m * spj.w[0] * spj.uy[0],
        spi.m * spi.w[0] * spi.uz[0] + spj.m * spj.w[0] * spj.uz[0],
    ]
}

fn kinetic_energy(spi: &Species, spj: &Species) -> Float {
    0.5 * spi.m
        * spi.w[0]
        * (spi.ux[0] * spi.ux[0] + spi.uy[0] * spi.uy[0] + spi.uz[0] * spi.uz[0])
        + 0.5 * spj.m
            * spj.w[0]
            * (spj.ux[0] * spj.ux[0] + spj.uy[0] * spj.uy[0] + spj.uz[0] * spj.uz[0])
}

#[test]
fn test_elastic_scatter_conserves_momentum_and_energy() {
    let (m_i, m_j) = (1.0, 4.0);
    let (mut spi, mut spj) =
        two_prtl_pair(m_i, m_j, [0.3, -0.1, 0.05], [-0.2, 0.4, 0.0], 1.0, 1.0);
    let coef = ReducedMass::new(m_i, m_j);
    let model = HardSphere { diameter: 1e-3 };
    let p0 = momentum(&spi, &spj);
    let ke0 = kinetic_energy(&spi, &spj);

    let mut rg = RngState::seeded(7);
    for trial in 0..64 {
        {
            let ti = SpeciesTable::new(&mut spi);
            let tj = SpeciesTable::new(&mut spj);
            unsafe {
                binary_collision(coef, &ti, &tj, &model, &mut rg, 1.0, 0, 0);
            }
        }
        let p1 = momentum(&spi, &spj);
        let ke1 = kinetic_energy(&spi, &spj);
        for d in 0..3 {
            assert!(
                (p1[d] - p0[d]).abs() < 1e-4,
                "momentum drift at trial {}: {:?} vs {:?}",
                trial,
                p1,
                p0
            );
        }
        assert!(
            (ke1 - ke0).abs() < 1e-4 * ke0.max(1.0),
            "energy drift at trial {}: {} vs {}",
            trial,
            ke1,
            ke0
        );
    }
}

#[test]
fn test_zero_relative_velocity_stays_finite() {
    // Both particles moving identically: ur = 0, e = 0, nvdt = 0.
    let (mut spi, mut spj) =
        two_prtl_pair(1.0, 1.0, [0.1, 0.2, 0.3], [0.1, 0.2, 0.3], 1.0, 1.0);
    let coef = ReducedMass::new(1.0, 1.0);
    let model = TakizukaAbe { nu0: 1.0e3 };
    let mut rg = RngState::seeded(11);
    {
        let ti = SpeciesTable::new(&mut spi);
        let tj = SpeciesTable::new(&mut spj);
        unsafe {
            binary_collision(coef, &ti, &tj, &model, &mut rg, 1.0, 0, 0);
        }
    }
    for u in &[
        spi.ux[0], spi.uy[0], spi.uz[0], spj.ux[0], spj.uy[0], spj.uz[0],
    ] {
        assert!(u.is_finite());
    }
}

#[test]
fn test_backscatter_clamp_is_exact() {
    // An infinite tangent must land on exactly the same trajectory as
    // the clamp value itself, bit for bit.
    let init = ([0.5, -0.2, 0.1], [-0.3, 0.1, 0.4]);
    let run = |tan: Float| -> Vec<u64> {
        let (mut spi, mut spj) = two_prtl_pair(1.0, 1.0, init.0, init.1, 1.0, 1.0);
        let coef = ReducedMass::new(1.0, 1.0);
        let model = FixedTan { tan };
        let mut rg = RngState::seeded(99);
        {
            let ti = SpeciesTable::new(&mut spi);
            let tj = SpeciesTable::new(&mut spj);
            unsafe {
                binary_collision(coef, &ti, &tj, &model, &mut rg, 1.0, 0, 0);
            }
        }
        assert!(spi.ux[0].is_finite() && spj.ux[0].is_finite());
        vec![
            spi.ux[0].to_bits() as u64,
            spi.uy[0].to_bits() as u64,
            spi.uz[0].to_bits() as u64,
            spj.ux[0].to_bits() as u64,
            spj.uy[0].to_bits() as u64,
            spj.uz[0].to_bits() as u64,
        ]
    };
    let clamped = run(Float::INFINITY);
    let exact = run(TAN_THETA_HALF_MAX);
    assert_eq!(clamped, exact);
}

#[test]
fn test_unequal_weights_detailed_balance() {
    // wi = 2 wj: the heavy macro-particle should be updated about half
    // as often, and the light one every time.
    let n = 10_000;
    let mut i_updates = 0;
    let mut rg = RngState::seeded(3);
    let (mut spi, mut spj) =
        two_prtl_pair(1.0, 1.0, [0.3, 0.0, 0.0], [-0.3, 0.1, 0.0], 2.0, 1.0);
    let coef = ReducedMass::new(1.0, 1.0);
    let model = FixedTan { tan: 0.4 };
    for _ in 0..n {
        spi.ux[0] = 0.3;
        spi.uy[0] = 0.0;
        spi.uz[0] = 0.0;
        spj.ux[0] = -0.3;
        spj.uy[0] = 0.1;
        spj.uz[0] = 0.0;
        {
            let ti = SpeciesTable::new(&mut spi);
            let tj = SpeciesTable::new(&mut spj);
            unsafe {
                binary_collision(coef, &ti, &tj, &model, &mut rg, 1.0, 0, 0);
            }
        }
        if spi.ux[0] != 0.3 || spi.uy[0] != 0.0 || spi.uz[0] != 0.0 {
            i_updates += 1;
        }
        // The lighter particle is always kicked.
        assert!(spj.ux[0] != -0.3 || spj.uy[0] != 0.1 || spj.uz[0] != 0.0);
    }
    assert!(
        i_updates > 4600 && i_updates < 5400,
        "i updated {} times out of {}",
        i_updates,
        n
    );
}

#[test]
fn test_monte_carlo_rejection_leaves_momenta_untouched() {
    let (mut spi, mut spj) =
        two_prtl_pair(1.0, 1.0, [0.5, -0.2, 0.1], [-0.3, 0.1, 0.4], 1.0, 1.0);
    let coef = ReducedMass::new(1.0, 1.0);
    let before = (
        spi.ux[0].to_bits(),
        spi.uy[0].to_bits(),
        spi.uz[0].to_bits(),
        spj.ux[0].to_bits(),
        spj.uy[0].to_bits(),
        spj.uz[0].to_bits(),
    );
    let mut rg = RngState::seeded(17);
    {
        let ti = SpeciesTable::new(&mut spi);
        let tj = SpeciesTable::new(&mut spj);
        unsafe {
            binary_collision_mc(coef, &ti, &tj, &ZeroCrossSection, &mut rg, 1.0, 0, 0);
        }
    }
    let after = (
        spi.ux[0].to_bits(),
        spi.uy[0].to_bits(),
        spi.uz[0].to_bits(),
        spj.ux[0].to_bits(),
        spj.uy[0].to_bits(),
        spj.uz[0].to_bits(),
    );
    assert_eq!(before, after);
}

#[test]
fn test_monte_carlo_acceptance_scatters() {
    let (mut spi, mut spj) =
        two_prtl_pair(1.0, 1.0, [0.5, -0.2, 0.1], [-0.3, 0.1, 0.4], 1.0, 1.0);
    let coef = ReducedMass::new(1.0, 1.0);
    let before = (spi.ux[0], spi.uy[0], spi.uz[0]);
    let mut rg = RngState::seeded(17);
    {
        let ti = SpeciesTable::new(&mut spi);
        let tj = SpeciesTable::new(&mut spj);
        unsafe {
            binary_collision_mc(coef, &ti, &tj, &HugeCrossSection, &mut rg, 1.0, 0, 0);
        }
    }
    assert_ne!(before, (spi.ux[0], spi.uy[0], spi.uz[0]));
}
