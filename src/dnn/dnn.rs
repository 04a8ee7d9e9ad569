use crate::affine::Affine2;
use crate::classifier::{Classifier, ClipValues};
use crate::dnn::{Dense, Layer, ReLU};
use crate::error::ClassifierError;
use crate::util::{flatten_batch, unflatten_batch};
use crate::AdvFloat;
use ndarray::{Array, Array2, ArrayD, ArrayView2, ArrayViewD};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A sequential feed-forward network over flattened inputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DNN {
    layers: Vec<Box<dyn Layer>>,
    input_shape: Vec<usize>,
    clip_values: ClipValues,
}

impl DNN {
    pub fn new(input_shape: Vec<usize>, clip_values: ClipValues) -> Self {
        Self {
            layers: vec![],
            input_shape,
            clip_values,
        }
    }

    /// Fully connected ReLU network with normally distributed weights scaled by fan-in.
    ///
    /// # Panics
    pub fn random_mlp<R: Rng>(
        input_shape: Vec<usize>,
        hidden: &[usize],
        nb_classes: usize,
        rng: &mut R,
    ) -> Self {
        let input_dim = input_shape.iter().product::<usize>();
        let mut dnn = Self::new(input_shape, ClipValues::default());
        let widths: Vec<usize> = std::iter::once(input_dim)
            .chain(hidden.iter().copied())
            .chain(std::iter::once(nb_classes))
            .collect();
        for (i, pair) in widths.windows(2).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let dist = Normal::new(0., 1. / (fan_in as AdvFloat).sqrt()).unwrap();
            dnn.add_layer(Box::new(Dense::new(Affine2::new(
                Array::random_using((fan_out, fan_in), dist, rng),
                Array::random_using(fan_out, dist, rng),
            ))));
            if i + 2 < widths.len() {
                dnn.add_layer(Box::new(ReLU::new(fan_out)));
            }
        }
        dnn
    }

    pub fn add_layer(&mut self, layer: Box<dyn Layer>) {
        debug_assert!(self
            .layers
            .last()
            .map_or(true, |last| last.output_dim() == layer.input_dim()));
        self.layers.push(layer);
    }

    pub fn get_layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.input_shape.iter().product()
    }

    pub fn output_dim(&self) -> usize {
        self.layers
            .last()
            .map_or_else(|| self.input_dim(), |layer| layer.output_dim())
    }

    pub fn forward2(&self, input: &ArrayView2<AdvFloat>) -> Array2<AdvFloat> {
        self.layers
            .iter()
            .fold(input.to_owned(), |x, layer| layer.forward2(&x.view()))
    }

    /// Backpropagates `grad_output` through every layer, returning the input gradient.
    pub fn backward2(
        &self,
        input: &ArrayView2<AdvFloat>,
        grad_output: &ArrayView2<AdvFloat>,
    ) -> Array2<AdvFloat> {
        let mut activations = Vec::with_capacity(self.layers.len());
        let mut x = input.to_owned();
        for layer in &self.layers {
            let next = layer.forward2(&x.view());
            activations.push(x);
            x = next;
        }
        self.layers
            .iter()
            .zip(activations.iter())
            .rev()
            .fold(grad_output.to_owned(), |grad, (layer, act)| {
                layer.backward2(&act.view(), &grad.view())
            })
    }

    fn check_input(&self, x: &ArrayViewD<AdvFloat>) -> Result<(), ClassifierError> {
        if x.ndim() == 0 || x.shape()[1..] != self.input_shape[..] {
            let mut expected = vec![x.shape().first().copied().unwrap_or(0)];
            expected.extend_from_slice(&self.input_shape);
            return Err(ClassifierError::ShapeMismatch {
                expected,
                got: x.shape().to_vec(),
            });
        }
        Ok(())
    }
}

impl Classifier for DNN {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn nb_classes(&self) -> usize {
        self.output_dim()
    }

    fn clip_values(&self) -> ClipValues {
        self.clip_values
    }

    fn predict(&self, x: &ArrayViewD<AdvFloat>) -> Result<Array2<AdvFloat>, ClassifierError> {
        self.check_input(x)?;
        let flat = flatten_batch(x).map_err(|e| ClassifierError::Backend(e.to_string()))?;
        Ok(self.forward2(&flat.view()))
    }

    fn backward(
        &self,
        x: &ArrayViewD<AdvFloat>,
        grad_logits: &ArrayView2<AdvFloat>,
    ) -> Result<ArrayD<AdvFloat>, ClassifierError> {
        self.check_input(x)?;
        if grad_logits.shape() != [x.shape()[0], self.output_dim()] {
            return Err(ClassifierError::ShapeMismatch {
                expected: vec![x.shape()[0], self.output_dim()],
                got: grad_logits.shape().to_vec(),
            });
        }
        let flat = flatten_batch(x).map_err(|e| ClassifierError::Backend(e.to_string()))?;
        let grad = self.backward2(&flat.view(), grad_logits);
        unflatten_batch(grad, x.shape()).map_err(|e| ClassifierError::Backend(e.to_string()))
    }
}

impl fmt::Display for DNN {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let layers: Vec<String> = self.layers.iter().map(|x| format!("{}", x)).collect();
        write!(f, "Input {:?} => {}", self.input_shape, layers.join(" => "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dnn::Softmax;
    use crate::loss::{LogitLoss, LossKind};
    use crate::test_util::*;
    use approx::{assert_abs_diff_eq, AbsDiffEq};
    use ndarray::{Array1, Axis, IxDyn};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_random_mlp_shapes() {
        let mut rng = Pcg64::seed_from_u64(7);
        let dnn = DNN::random_mlp(vec![2, 3, 3], &[16, 8], 10, &mut rng);
        assert_eq!(dnn.input_dim(), 18);
        assert_eq!(dnn.nb_classes(), 10);
        assert_eq!(dnn.get_layers().len(), 5);
        let x = ArrayD::from_elem(IxDyn(&[4, 2, 3, 3]), 0.5);
        assert_eq!(dnn.predict(&x.view()).unwrap().shape(), &[4, 10]);
    }

    #[test]
    fn test_rejects_wrong_input_shape() {
        let mut rng = Pcg64::seed_from_u64(7);
        let dnn = DNN::random_mlp(vec![4], &[], 3, &mut rng);
        let x = ArrayD::zeros(IxDyn(&[1, 5]));
        assert!(matches!(
            dnn.predict(&x.view()),
            Err(ClassifierError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_serialization() {
        let mut rng = Pcg64::seed_from_u64(3);
        let mut dnn = DNN::random_mlp(vec![4], &[5], 3, &mut rng);
        dnn.add_layer(Box::new(Softmax::new(3)));
        let serialization = serde_json::to_string(&dnn).unwrap();
        let restored: DNN = serde_json::from_str(&serialization).unwrap();
        let x = ArrayD::from_elem(IxDyn(&[2, 4]), 0.25);
        assert_eq!(
            dnn.predict(&x.view()).unwrap(),
            restored.predict(&x.view()).unwrap()
        );
    }

    #[test]
    fn test_loss_gradient_matches_finite_difference() {
        let mut rng = Pcg64::seed_from_u64(11);
        let dnn = DNN::random_mlp(vec![3], &[6, 5], 4, &mut rng);
        let x = Array1::from(vec![0.2, 0.7, 0.4]).insert_axis(Axis(0)).into_dyn();
        let labels = Array2::from_shape_vec((1, 4), vec![0., 1., 0., 0.]).unwrap();
        for loss in [LossKind::cross_entropy(), LossKind::difference_logits_ratio()] {
            let grad = dnn.loss_gradient(&x.view(), &labels.view(), &loss).unwrap();
            let value = |x: &ArrayD<f64>| -> f64 {
                let logits = dnn.predict(&x.view()).unwrap();
                loss.value(&logits.view(), &labels.view()).mean().unwrap()
            };
            let h = 1e-6;
            for j in 0..3 {
                let mut plus = x.clone();
                plus[[0, j]] += h;
                let mut minus = x.clone();
                minus[[0, j]] -= h;
                let numeric = (value(&plus) - value(&minus)) / (2. * h);
                assert_abs_diff_eq!(numeric, grad[[0, j]], epsilon = 1e-5);
            }
        }
    }

    proptest! {
        #[test]
        fn test_backward_is_linear_in_cotangent(
            dnn in fc_dnn(4, 3, 2, 6),
            x in array2(2, 4),
            g in array2(2, 3),
        ) {
            let x = x.into_dyn();
            let once = dnn.backward(&x.view(), &g.view()).unwrap();
            let twice = dnn.backward(&x.view(), &(&g * 2.).view()).unwrap();
            prop_assert_eq!(once.shape(), &[2, 4]);
            let scale = 1. + once.fold(0., |m: f64, v| m.max(v.abs()));
            prop_assert!(twice.abs_diff_eq(&(&once * 2.), 1e-9 * scale));
        }
    }
}
