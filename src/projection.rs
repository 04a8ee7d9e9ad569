//! Bregman projection onto the intersection of an L1 ball and a box.
//!
//! The divergence is the one induced by the mirror map `x -> sign(x) ln(|x|/beta + 1)`.
//! When `sum val <= D` the point is only clipped to the box. Otherwise the budget is
//! spent exactly, `sum |phi| = D` unless the box caps every coordinate first, with
//! `|phi_i| = clip(lambda (val_i + beta) - beta, 0, c_i)` for a single scalar `lambda`
//! and `c_i` the distance to the box boundary in the direction of `sign_i`. This is the
//! divergence minimiser over `{sum |phi| = D, lower <= phi <= upper}`; a clipped point
//! with a smaller L1 norm can be closer when the box binds. `lambda` is found by
//! bisection over the `2N` breakpoints at which coordinates leave zero or hit their
//! bound, after which the active coordinates are solved exactly.
use crate::bounds::Bounds1;
use crate::AdvFloat;
use itertools::Itertools;
use log::trace;
use ndarray::{Array1, ArrayView1, Zip};

/// Projects the signed magnitudes `sign * val` with smoothing `beta` onto the L1 ball of
/// radius `radius` intersected with `bounds`.
///
/// `bounds` must contain the origin and `val` must be finite. The result always lies
/// inside `bounds` exactly and its L1 norm exceeds `radius` by at most floating-point
/// rounding.
pub fn project_l1_box(
    sign: &ArrayView1<AdvFloat>,
    val: &ArrayView1<AdvFloat>,
    beta: AdvFloat,
    radius: AdvFloat,
    bounds: &Bounds1,
) -> Array1<AdvFloat> {
    debug_assert_eq!(sign.len(), val.len());
    debug_assert_eq!(val.len(), bounds.ndim());
    debug_assert!(val.iter().all(|v| v.is_finite()));
    if radius <= 0. {
        return Array1::zeros(val.len());
    }
    if val.sum() <= radius {
        return bounds.clip(&(sign * val).view());
    }

    let extent = bounds.directional_extent(sign).mapv(|c| c.max(0.));
    let lam_lower = val.mapv(|v| beta / (v + beta));
    let lam_upper = Zip::from(&extent)
        .and(val)
        .map_collect(|&c, &v| (c + beta) / (v + beta));
    let breakpoints: Vec<AdvFloat> = lam_lower
        .iter()
        .chain(lam_upper.iter())
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();

    let radius_at = |lam: AdvFloat| {
        Zip::from(val)
            .and(&extent)
            .fold(0., |acc, &v, &c| acc + (lam * (v + beta) - beta).min(c).max(0.))
    };

    let (mut lo, mut hi) = (0, breakpoints.len() - 1);
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let r = radius_at(breakpoints[mid]);
        if r > radius {
            hi = mid;
        } else if r < radius {
            lo = mid;
        } else {
            lo = mid;
            hi = mid;
        }
    }
    let (lam_lo, lam_hi) = (breakpoints[lo], breakpoints[hi]);

    let mut saturated_mass = 0.;
    let mut active_weight = 0.;
    let mut num_active = 0_usize;
    Zip::from(&lam_lower)
        .and(&lam_upper)
        .and(&extent)
        .and(val)
        .for_each(|&l, &u, &c, &v| {
            if u <= lam_lo {
                saturated_mass += c;
            } else if l < lam_hi {
                active_weight += v + beta;
                num_active += 1;
            }
        });

    // With no active coordinate the saturated point is the answer.
    let lam_star = if num_active == 0 {
        0.
    } else {
        (radius - saturated_mass + beta * num_active as AdvFloat) / active_weight
    };
    trace!(
        "l1 projection: lambda in [{}, {}], {} active, lambda* {}",
        lam_lo,
        lam_hi,
        num_active,
        lam_star
    );

    let mut phi = Array1::zeros(val.len());
    Zip::from(&mut phi)
        .and(&lam_lower)
        .and(&lam_upper)
        .and(&extent)
        .and(val)
        .for_each(|p, &l, &u, &c, &v| {
            *p = if u <= lam_lo {
                c
            } else if l < lam_hi {
                (lam_star * (v + beta) - beta).max(0.).min(c)
            } else {
                0.
            };
        });
    phi * sign
}
