use crate::collide::models::{CollisionModel, MonteCarloModel};
use crate::collide::tables::SpeciesTable;
use crate::rng::RngState;
use crate::{Float, PI};

/// Largest representable tan(theta/2). Chosen below sqrt(f32::MAX) so
/// that 2t/(1+t*t) stays in range in single precision. Perfect
/// backscatter cannot occur; angles arbitrarily close to it can.
pub const TAN_THETA_HALF_MAX: Float = 1.30e19;

#[inline(always)]
fn prevent_backscatter(tan: Float) -> Float {
    if !tan.is_finite() || tan > TAN_THETA_HALF_MAX {
        TAN_THETA_HALF_MAX
    } else {
        tan
    }
}

/// Reduced-mass coefficients shared by every pair in a dispatch.
#[derive(Copy, Clone)]
pub struct ReducedMass {
    pub mu_i: Float,
    pub mu_j: Float,
    pub mu: Float,
}

impl ReducedMass {
    pub fn new(m_i: Float, m_j: Float) -> ReducedMass {
        ReducedMass {
            mu_i: m_j / (m_i + m_j),
            mu_j: m_i / (m_i + m_j),
            mu: m_i * m_j / (m_i + m_j),
        }
    }
}

struct Encounter {
    uix: Float,
    uiy: Float,
    uiz: Float,
    wi: Float,
    ujx: Float,
    ujy: Float,
    ujz: Float,
    wj: Float,
    urx: Float,
    ury: Float,
    urz: Float,
    ur: Float,
    /// mu ur^2, the collision-frame kinetic energy.
    e: Float,
    /// ur ndt, the flux-encounter parameter.
    nvdt: Float,
}

#[inline(always)]
unsafe fn load(
    mu: Float,
    ti: &SpeciesTable,
    tj: &SpeciesTable,
    ndt: Float,
    i: usize,
    j: usize,
) -> Encounter {
    if !cfg!(feature = "unchecked") {
        assert!(i < ti.w.len());
        assert!(j < tj.w.len());
    }
    let uix = ti.ux.get(i);
    let uiy = ti.uy.get(i);
    let uiz = ti.uz.get(i);
    let wi = *ti.w.get_unchecked(i);

    let ujx = tj.ux.get(j);
    let ujy = tj.uy.get(j);
    let ujz = tj.uz.get(j);
    let wj = *tj.w.get_unchecked(j);

    let urx = uix - ujx;
    let ury = uiy - ujy;
    let urz = uiz - ujz;
    let ursq = urx * urx + ury * ury + urz * urz;
    let ur = ursq.sqrt();

    Encounter {
        uix,
        uiy,
        uiz,
        wi,
        ujx,
        ujy,
        ujz,
        wj,
        urx,
        ury,
        urz,
        ur,
        e: mu * ursq,
        nvdt: ur * ndt,
    }
}

#[inline(always)]
unsafe fn scatter<M: CollisionModel>(
    coef: ReducedMass,
    ti: &SpeciesTable,
    tj: &SpeciesTable,
    model: &M,
    rg: &mut RngState,
    enc: &Encounter,
    i: usize,
    j: usize,
) {
    // Restitution must be drawn before the tangent is clamped; both see
    // the same (e, nvdt).
    let rr = model.restitution(rg, enc.e, enc.nvdt);
    let dd = prevent_backscatter(model.tan_theta_half(rg, enc.e, enc.nvdt));

    // Transverse unit vector: zero the smallest-magnitude component of
    // the relative velocity so the normalization below never divides by
    // a near-degenerate pair. Branch-light by design.
    let mut t0 = enc.urx * enc.urx;
    let mut d0 = 0;
    let mut d1 = 1;
    let mut d2 = 2;
    let mut tmin = t0;

    t0 = enc.ury * enc.ury;
    if t0 < tmin {
        d0 = 1;
        d1 = 2;
        d2 = 0;
        tmin = t0;
    }

    t0 = enc.urz * enc.urz;
    if t0 < tmin {
        d0 = 2;
        d1 = 0;
        d2 = 1;
    }

    let mut stack = [enc.urx, enc.ury, enc.urz];
    let t1 = stack[d1];
    let t2 = stack[d2];
    let t0 = 1.0 / (t1 * t1 + t2 * t2 + Float::MIN_POSITIVE).sqrt();
    stack[d0] = 0.0;
    stack[d1] = t0 * t2;
    stack[d2] = -t0 * t1;
    let tx = stack[0];
    let ty = stack[1];
    let tz = stack[2];

    // Convert tan(theta/2) to sin/cos of the full angle.
    let mut t0 = 2.0 * dd / (1.0 + dd * dd);

    // Azimuthal angle is random.
    let phi = rg.uniform(0.0, 2.0 * PI);
    let t2 = t0 * phi.sin();
    let t1 = t0 * enc.ur * phi.cos();
    t0 *= -dd;

    // (1 - cos theta) u + |u| sin theta Tperp
    let dvx = (t0 * enc.urx + t1 * tx) + t2 * (enc.ury * tz - enc.urz * ty);
    let dvy = (t0 * enc.ury + t1 * ty) + t2 * (enc.urz * tx - enc.urx * tz);
    let dvz = (t0 * enc.urz + t1 * tz) + t2 * (enc.urx * ty - enc.ury * tx);

    // Center-of-mass velocity, scaled by the inelastic loss.
    let t1 = 1.0 - rr;
    let cmx = t1 * (coef.mu_j * enc.uix + coef.mu_i * enc.ujx);
    let cmy = t1 * (coef.mu_j * enc.uiy + coef.mu_i * enc.ujy);
    let cmz = t1 * (coef.mu_j * enc.uiz + coef.mu_i * enc.ujz);

    // Handle unequal particle weights using detailed balance: one shared
    // draw decides both updates, so the lighter macro-particle updates
    // less often in proportion to the weight ratio.
    let t0 = rg.uniform(0.0, 1.0);

    if enc.wi * t0 <= enc.wj {
        ti.ux.set(i, (enc.uix + coef.mu_i * dvx) * rr + cmx);
        ti.uy.set(i, (enc.uiy + coef.mu_i * dvy) * rr + cmy);
        ti.uz.set(i, (enc.uiz + coef.mu_i * dvz) * rr + cmz);
    }

    if enc.wj * t0 <= enc.wi {
        tj.ux.set(j, (enc.ujx - coef.mu_j * dvx) * rr + cmx);
        tj.uy.set(j, (enc.ujy - coef.mu_j * dvy) * rr + cmy);
        tj.uz.set(j, (enc.ujz - coef.mu_j * dvz) * rr + cmz);
    }
}

/// Collide particle `i` of species i with particle `j` of species j,
/// updating momenta in place. Deterministic given identical random draws.
///
/// # Safety
/// `i` and `j` must be in bounds for their tables, and the caller must
/// guarantee no other worker writes either offset during the call. The
/// pairing schedule is the sole mechanism providing that guarantee.
pub unsafe fn binary_collision<M: CollisionModel>(
    coef: ReducedMass,
    ti: &SpeciesTable,
    tj: &SpeciesTable,
    model: &M,
    rg: &mut RngState,
    ndt: Float,
    i: usize,
    j: usize,
) {
    let enc = load(coef.mu, ti, tj, ndt, i, j);
    scatter(coef, ti, tj, model, rg, &enc, i, j);
}

/// Monte Carlo variant of [`binary_collision`]: the pair scatters with
/// probability `cross_section * nvdt`, otherwise nothing changes.
///
/// # Safety
/// Same contract as [`binary_collision`].
pub unsafe fn binary_collision_mc<M: MonteCarloModel>(
    coef: ReducedMass,
    ti: &SpeciesTable,
    tj: &SpeciesTable,
    model: &M,
    rg: &mut RngState,
    ndt: Float,
    i: usize,
    j: usize,
) {
    let enc = load(coef.mu, ti, tj, ndt, i, j);

    // TODO: the acceptance test is purely classical. Decide whether a
    // relativistically correct evaluation in the scattering particle's
    // frame is worth the cost before enabling this for hot species.
    let sigma = model.cross_section(rg, enc.e, enc.nvdt);
    if rg.frand() > sigma * enc.nvdt {
        return; // no collision this pair, this dispatch
    }

    scatter(coef, ti, tj, model, rg, &enc, i, j);
}
