#![allow(dead_code)]
use exp_attack::affine::Affine2;
use exp_attack::dnn::{Dense, ReLU, Softmax, DNN};
use exp_attack::{Classifier, ClassifierError, ClipValues};
use ndarray::{Array, Array2, ArrayD, ArrayView2, ArrayViewD, IxDyn};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::cell::Cell;

pub const CIFAR_SHAPE: [usize; 3] = [3, 32, 32];

pub fn affine2<R: Rng>(in_dim: usize, out_dim: usize, rng: &mut R) -> Affine2 {
    let dist = Normal::new(0., 1. / (in_dim as f64).sqrt()).unwrap();
    Affine2::new(
        Array::random_using((out_dim, in_dim), dist, rng),
        Array::random_using(out_dim, dist, rng),
    )
}

/// Dense/ReLU classifier over CIFAR-shaped inputs.
pub fn make_classifier(hidden: usize, nb_classes: usize, seed: u64) -> DNN {
    let mut rng = Pcg64::seed_from_u64(seed);
    let input_dim = CIFAR_SHAPE.iter().product();
    let mut dnn = DNN::new(CIFAR_SHAPE.to_vec(), ClipValues::default());
    dnn.add_layer(Box::new(Dense::new(affine2(input_dim, hidden, &mut rng))));
    dnn.add_layer(Box::new(ReLU::new(hidden)));
    dnn.add_layer(Box::new(Dense::new(affine2(hidden, nb_classes, &mut rng))));
    dnn
}

pub fn make_softmax_classifier(hidden: usize, nb_classes: usize, seed: u64) -> DNN {
    let mut dnn = make_classifier(hidden, nb_classes, seed);
    dnn.add_layer(Box::new(Softmax::new(nb_classes)));
    dnn
}

pub fn cifar_batch(n: usize, seed: u64) -> ArrayD<f64> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let mut shape = vec![n];
    shape.extend_from_slice(&CIFAR_SHAPE);
    Array::random_using(IxDyn(&shape), Uniform::new_inclusive(0., 1.), &mut rng)
}

/// Forwards to an inner classifier while counting oracle queries.
#[derive(Debug)]
pub struct CountingClassifier<C> {
    pub inner: C,
    pub predictions: Cell<usize>,
    pub backward_passes: Cell<usize>,
}

impl<C: Classifier> CountingClassifier<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            predictions: Cell::new(0),
            backward_passes: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.predictions.get() + self.backward_passes.get()
    }

    pub fn reset(&self) {
        self.predictions.set(0);
        self.backward_passes.set(0);
    }
}

impl<C: Classifier> Classifier for CountingClassifier<C> {
    fn input_shape(&self) -> &[usize] {
        self.inner.input_shape()
    }

    fn nb_classes(&self) -> usize {
        self.inner.nb_classes()
    }

    fn clip_values(&self) -> ClipValues {
        self.inner.clip_values()
    }

    fn predict(&self, x: &ArrayViewD<f64>) -> Result<Array2<f64>, ClassifierError> {
        self.predictions.set(self.predictions.get() + 1);
        self.inner.predict(x)
    }

    fn backward(
        &self,
        x: &ArrayViewD<f64>,
        grad_logits: &ArrayView2<f64>,
    ) -> Result<ArrayD<f64>, ClassifierError> {
        self.backward_passes.set(self.backward_passes.get() + 1);
        self.inner.backward(x, grad_logits)
    }
}
