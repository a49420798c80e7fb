use crate::rng::RngState;
use crate::{Float, PI};

/// A physics regime for binary collisions.
///
/// `e` is the reduced-mass-scaled kinetic energy of the pair in
/// simulation-normalized units; `nvdt` is the dimensionless
/// flux-encounter parameter (relative speed times the encounter window).
pub trait CollisionModel: Sync {
    /// tan(theta/2) where theta is the polar scattering angle. The
    /// half-angle tangent keeps precision near 0 and near pi; exact
    /// backscatter is clamped away by the kernel.
    fn tan_theta_half(&self, rg: &mut RngState, e: Float, nvdt: Float) -> Float;

    /// Coefficient of restitution, 0 <= R <= 1. R = 1 is elastic.
    fn restitution(&self, rg: &mut RngState, e: Float, nvdt: Float) -> Float;
}

/// A collision model whose collisions are individually tested to occur.
/// Each pair collides with probability `cross_section * nvdt`.
pub trait MonteCarloModel: CollisionModel {
    /// Cross-section in normalized units.
    fn cross_section(&self, rg: &mut RngState, e: Float, nvdt: Float) -> Float;
}

/// Elastic hard spheres: isotropic scattering in the collision frame
/// and a geometric cross-section.
pub struct HardSphere {
    pub diameter: Float,
}

impl CollisionModel for HardSphere {
    fn tan_theta_half(&self, rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        // Isotropic: cos(theta) uniform on [-1, 1).
        let c = rg.uniform(-1.0, 1.0);
        ((1.0 - c) / (1.0 + c + Float::MIN_POSITIVE)).sqrt()
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0
    }
}

impl MonteCarloModel for HardSphere {
    fn cross_section(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        PI * self.diameter * self.diameter
    }
}

/// Coulomb-like small-angle scattering: Gaussian tan(theta/2) whose
/// variance grows with the encounter flux and falls off with energy
/// squared. `nu0` sets the base collisionality. Elastic; dispatched
/// deterministically (every pair scatters, most by a small angle).
pub struct TakizukaAbe {
    pub nu0: Float,
}

impl CollisionModel for TakizukaAbe {
    fn tan_theta_half(&self, rg: &mut RngState, e: Float, nvdt: Float) -> Float {
        let var = self.nu0 * nvdt / (2.0 * e * e + Float::MIN_POSITIVE);
        rg.normal() * var.sqrt()
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        1.0
    }
}

/// Isotropic scattering with a fixed coefficient of restitution.
pub struct Inelastic {
    pub r: Float,
}

impl CollisionModel for Inelastic {
    fn tan_theta_half(&self, rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        let c = rg.uniform(-1.0, 1.0);
        ((1.0 - c) / (1.0 + c + Float::MIN_POSITIVE)).sqrt()
    }

    fn restitution(&self, _rg: &mut RngState, _e: Float, _nvdt: Float) -> Float {
        self.r
    }
}
