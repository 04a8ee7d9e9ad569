#![allow(clippy::module_name_repetitions)]
use crate::classifier::ClipValues;
use crate::AdvFloat;
use ndarray::iter::Lanes;
use ndarray::Axis;
use ndarray::Ix2;
use ndarray::RemoveAxis;
use ndarray::Zip;
use ndarray::{stack, Array, Array1, Dimension};
use ndarray::{ArrayView, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub type Bounds1 = Bounds<Ix2>;

/// Elementwise box `[lower, upper]`, stored with lower and upper stacked on axis 0.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Bounds<D: Dimension> {
    data: Array<AdvFloat, D>,
}

impl<D: Dimension + RemoveAxis> Bounds<D> {
    /// # Panics
    /// If `lower` and `upper` differ in shape
    pub fn new<'a, S: Dimension + Dimension<Larger = D>>(
        lower: ArrayView<'a, AdvFloat, S>,
        upper: ArrayView<'a, AdvFloat, S>,
    ) -> Self {
        let data: Array<AdvFloat, D> = stack(Axis(0), &[lower, upper]).unwrap();
        Self { data }
    }

    pub fn lower(&self) -> ArrayView<AdvFloat, D::Smaller> {
        self.data.index_axis(Axis(0), 0)
    }

    pub fn upper(&self) -> ArrayView<AdvFloat, D::Smaller> {
        self.data.index_axis(Axis(0), 1)
    }

    pub fn ndim(&self) -> usize {
        self.data.shape().iter().skip(1).product()
    }

    pub fn bounds_iter(&self) -> Lanes<AdvFloat, D::Smaller> {
        self.data.lanes(Axis(0))
    }

    pub fn is_member(&self, x: &ArrayView<AdvFloat, D::Smaller>, eps: AdvFloat) -> bool {
        Zip::from(x)
            .and(self.bounds_iter())
            .all(|&x, bounds| bounds[0] - eps <= x && x <= bounds[1] + eps)
    }

    pub fn clip(&self, x: &ArrayView<AdvFloat, D::Smaller>) -> Array<AdvFloat, D::Smaller> {
        Zip::from(x)
            .and(self.bounds_iter())
            .map_collect(|&x, bounds| x.max(bounds[0]).min(bounds[1]))
    }

    pub fn sample_uniform(&self, seed: u64) -> Array<AdvFloat, D::Smaller> {
        let mut rng = StdRng::seed_from_u64(seed);
        Zip::from(self.bounds_iter())
            .map_collect(|x| Uniform::new_inclusive(x[0], x[1]).sample(&mut rng))
    }
}

impl Bounds1 {
    /// Box of admissible perturbations around `x0`, so that `x0 + delta` stays inside `clip`.
    pub fn perturbation_box(x0: &ArrayView1<AdvFloat>, clip: ClipValues) -> Self {
        let lower = x0.mapv(|x| clip.min - x);
        let upper = x0.mapv(|x| clip.max - x);
        Self::new(lower.view(), upper.view())
    }

    /// Distance to the boundary in the direction of `sign`: `upper` for positive
    /// signs, `|lower|` otherwise.
    pub fn directional_extent(&self, sign: &ArrayView1<AdvFloat>) -> Array1<AdvFloat> {
        Zip::from(sign)
            .and(self.bounds_iter())
            .map_collect(|&s, bounds| if s > 0. { bounds[1] } else { bounds[0].abs() })
    }
}
