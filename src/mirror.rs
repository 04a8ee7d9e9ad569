//! One exponentiated-gradient step in the dual of the entropic mirror map, with a
//! regret-driven step size.
use crate::bounds::Bounds1;
use crate::projection::project_l1_box;
use crate::util::{l1_norm, linf_norm, sign};
use crate::AdvFloat;
use log::trace;
use ndarray::{Array1, ArrayView1, Zip};

/// Dual magnitudes are clamped here so that `beta * exp_m1(|z|)` stays finite.
const MAX_DUAL: AdvFloat = 300.;

/// Accumulated regret of one sample's optimization.
///
/// The regret never decreases, so the step size `eta_t` it drives never decreases either.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveStepSize {
    regret: AdvFloat,
    learning_rate: AdvFloat,
}

impl AdaptiveStepSize {
    pub const fn new(learning_rate: AdvFloat) -> Self {
        Self {
            regret: 0.,
            learning_rate,
        }
    }

    pub const fn regret(&self) -> AdvFloat {
        self.regret
    }

    /// `eta_t = max(sqrt(regret), grad_linf) / learning_rate`
    pub fn step_scale(&self, grad_linf: AdvFloat) -> AdvFloat {
        self.regret.sqrt().max(grad_linf) / self.learning_rate
    }

    /// Adds the squared scaled movement of the last step.
    pub fn accumulate(&mut self, eta_t: AdvFloat, epsilon: AdvFloat, movement_l1: AdvFloat) {
        self.regret += (eta_t / (2. * epsilon) * movement_l1).powi(2);
    }
}

/// Mirror descent on perturbations constrained to an L1 ball of radius `epsilon`
/// intersected with a box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MirrorDescent {
    pub epsilon: AdvFloat,
    pub beta: AdvFloat,
}

impl MirrorDescent {
    pub const fn new(epsilon: AdvFloat, beta: AdvFloat) -> Self {
        Self { epsilon, beta }
    }

    /// Moves the perturbation `x` against `grad` and returns the new perturbation.
    ///
    /// `bounds` is the perturbation box of the sample, containing the origin. The
    /// result lies inside it exactly and within the L1 ball up to rounding.
    pub fn step(
        &self,
        grad: &ArrayView1<AdvFloat>,
        x: &ArrayView1<AdvFloat>,
        bounds: &Bounds1,
        tracker: &mut AdaptiveStepSize,
    ) -> Array1<AdvFloat> {
        if self.epsilon <= 0. {
            return Array1::zeros(x.len());
        }
        let eta_t = tracker.step_scale(linf_norm(*grad));
        if eta_t <= 0. {
            return x.to_owned();
        }
        let beta = self.beta;

        let z = Zip::from(x)
            .and(grad)
            .map_collect(|&x, &g| sign(x) * (x.abs() / beta + 1.).ln() - g / eta_t);
        let z_sign = z.mapv(sign);
        let y = z.mapv(|z| beta * z.abs().min(MAX_DUAL).exp_m1());
        let v = project_l1_box(&z_sign.view(), &y.view(), beta, self.epsilon, bounds);

        tracker.accumulate(eta_t, self.epsilon, l1_norm((x - &v).view()));
        let eta_t1 = tracker.step_scale(linf_norm(*grad));
        let keep = eta_t / eta_t1;
        trace!(
            "mirror step: eta_t {} eta_t1 {} regret {}",
            eta_t,
            eta_t1,
            tracker.regret()
        );

        let blended = Zip::from(x)
            .and(&v)
            .map_collect(|&x, &v| (1. - keep) * x + keep * v);
        // The convex blend of two box members is a box member up to rounding.
        bounds.clip(&blended.view())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::classifier::ClipValues;
    use crate::test_util::*;
    use approx::assert_abs_diff_eq;
    use more_asserts::{assert_ge, assert_le};
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_step_scale() {
        let mut tracker = AdaptiveStepSize::new(0.5);
        assert_abs_diff_eq!(tracker.step_scale(2.), 4.);
        tracker.accumulate(1., 0.5, 3.);
        assert_abs_diff_eq!(tracker.regret(), 9.);
        assert_abs_diff_eq!(tracker.step_scale(2.), 6.);
    }

    #[test]
    fn test_zero_epsilon_gives_zero_perturbation() {
        let bounds = Bounds1::perturbation_box(&array![0.5, 0.5].view(), ClipValues::default());
        let mut tracker = AdaptiveStepSize::new(1.);
        let step = MirrorDescent::new(0., 1e-3);
        let out = step.step(&array![1., -1.].view(), &array![0.1, 0.].view(), &bounds, &mut tracker);
        assert_eq!(out, array![0., 0.]);
        assert_eq!(tracker.regret(), 0.);
    }

    #[test]
    fn test_zero_gradient_leaves_state_alone() {
        let bounds = Bounds1::perturbation_box(&array![0.5, 0.5].view(), ClipValues::default());
        let mut tracker = AdaptiveStepSize::new(1.);
        let step = MirrorDescent::new(1., 1e-3);
        let x = array![0.2, -0.1];
        let out = step.step(&array![0., 0.].view(), &x.view(), &bounds, &mut tracker);
        assert_eq!(out, x);
        assert_eq!(tracker.regret(), 0.);
    }

    #[test]
    fn test_first_step_moves_against_gradient() {
        let bounds = Bounds1::perturbation_box(&array![0.5, 0.5, 0.5].view(), ClipValues::default());
        let mut tracker = AdaptiveStepSize::new(1.);
        let step = MirrorDescent::new(0.3, 0.01);
        let out = step.step(
            &array![-2., 1., 0.].view(),
            &Array1::zeros(3).view(),
            &bounds,
            &mut tracker,
        );
        assert!(out[0] > 0.);
        assert!(out[1] < 0.);
        assert_eq!(out[2], 0.);
        assert_ge!(out[0], -out[1]);
        assert!(tracker.regret() > 0.);
    }

    #[test]
    fn test_large_learning_rate_keeps_budget() {
        let bounds = Bounds1::perturbation_box(&array![0.5, 0.5, 0.5, 0.5].view(), ClipValues::default());
        let mut tracker = AdaptiveStepSize::new(1e4);
        let step = MirrorDescent::new(1., 1e-3);
        let out = step.step(
            &array![1., -1., 0.5, 0.].view(),
            &Array1::zeros(4).view(),
            &bounds,
            &mut tracker,
        );
        assert!(out.iter().all(|v| v.is_finite()));
        assert!(bounds.is_member(&out.view(), 0.));
        assert_le!(l1_norm(out.view()), 1. + 1e-9);
        assert!(out[0] < 0. && out[1] > 0. && out[2] < 0.);
        assert_eq!(out[3], 0.);
        assert!(tracker.regret().is_finite());
    }

    proptest! {
        #[test]
        fn test_huge_steps_are_bounded(
            bounds in perturbation_bounds1(12),
            grads in proptest::collection::vec(array1(12), 1..6),
            epsilon in 0.01..5.,
            lr in 1e2..1e6,
        ) {
            let step = MirrorDescent::new(epsilon, epsilon / 12.);
            let mut tracker = AdaptiveStepSize::new(lr);
            let mut x = Array1::zeros(12);
            for grad in &grads {
                x = step.step(&grad.view(), &x.view(), &bounds, &mut tracker);
                prop_assert!(bounds.is_member(&x.view(), 0.));
                prop_assert!(l1_norm(x.view()) <= epsilon * (1. + 1e-9));
            }
        }

        #[test]
        fn test_step_is_bounded(
            bounds in perturbation_bounds1(12),
            grads in proptest::collection::vec(array1(12), 1..8),
            epsilon in 0.01..5.,
            beta in 1e-4..0.5,
            lr in 0.1..2.,
        ) {
            let step = MirrorDescent::new(epsilon, beta);
            let mut tracker = AdaptiveStepSize::new(lr);
            let mut x = Array1::zeros(12);
            for grad in &grads {
                x = step.step(&grad.view(), &x.view(), &bounds, &mut tracker);
                prop_assert!(bounds.is_member(&x.view(), 0.));
                assert_le!(l1_norm(x.view()), epsilon * (1. + 1e-9));
            }
        }

        #[test]
        fn test_regret_is_monotone(
            bounds in perturbation_bounds1(8),
            grads in proptest::collection::vec(array1(8), 1..10),
            epsilon in 0.01..5.,
        ) {
            let step = MirrorDescent::new(epsilon, epsilon / 8.);
            let mut tracker = AdaptiveStepSize::new(1.);
            let mut x = Array1::zeros(8);
            let mut last = tracker.regret();
            for grad in &grads {
                x = step.step(&grad.view(), &x.view(), &bounds, &mut tracker);
                prop_assert!(tracker.regret() >= last);
                last = tracker.regret();
            }
        }
    }
}
