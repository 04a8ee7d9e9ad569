#![cfg(test)]
use crate::affine::Affine2;
use crate::bounds::Bounds1;
use crate::classifier::ClipValues;
use crate::dnn::{Dense, ReLU, DNN};
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use proptest::arbitrary::functor::ArbitraryF1;
use proptest::prelude::*;
use proptest::sample::SizeRange;

prop_compose! {
    pub fn array1(len: usize)(v in Vec::lift1_with(-10. .. 10., SizeRange::new(len..=len))) -> Array1<f64> {
        Array1::from_vec(v)
    }
}

prop_compose! {
    pub fn unit_array1(len: usize)(v in Vec::lift1_with(0. ..=1., SizeRange::new(len..=len))) -> Array1<f64> {
        Array1::from_vec(v)
    }
}

prop_compose! {
    pub fn array2(rows: usize, cols: usize)(v in Vec::lift1_with(array1(cols), SizeRange::new(rows..=rows))) -> Array2<f64> {
        assert!(rows > 0);
        ndarray::stack(Axis(0), &v.iter().map(|x| x.view()).collect::<Vec<ArrayView1<f64>>>()).unwrap()
    }
}

prop_compose! {
    pub fn affine2(in_dim: usize, out_dim: usize)(basis in array2(out_dim, in_dim), shift in array1(out_dim)) -> Affine2 {
        Affine2::new(basis, shift)
    }
}

prop_compose! {
    /// Perturbation box around a point of the unit cube.
    pub fn perturbation_bounds1(len: usize)(x0 in unit_array1(len)) -> Bounds1 {
        Bounds1::perturbation_box(&x0.view(), ClipValues::default())
    }
}

prop_compose! {
    pub fn signs(len: usize)(v in Vec::lift1_with(-1_i8..=1, SizeRange::new(len..=len))) -> Array1<f64> {
        Array1::from_iter(v.into_iter().map(f64::from))
    }
}

prop_compose! {
    /// `(sign, val, beta, radius, bounds)` inputs for the L1 box projection.
    pub fn projection_case(len: usize)(
        sign in signs(len),
        val in Vec::lift1_with(0. ..5., SizeRange::new(len..=len)),
        beta in 1e-4..1.,
        radius in 1e-3..10.,
        bounds in perturbation_bounds1(len),
    ) -> (Array1<f64>, Array1<f64>, f64, f64, Bounds1) {
        (sign, Array1::from_vec(val), beta, radius, bounds)
    }
}

prop_compose! {
    pub fn fc_dnn(input_size: usize, output_size: usize, nlayers: usize, max_layer_width: usize)(repr_sizes in Vec::lift1_with(1..max_layer_width, SizeRange::new(nlayers..=nlayers)).prop_map(move |mut x| {x.insert(0, input_size); x.push(output_size); x}))(affines in {let pairs = repr_sizes.iter().zip(repr_sizes.iter().skip(1)); pairs.map(|(&x, &y)| affine2(x,y)).collect::<Vec<_>>()}) -> DNN {
        let mut dnn = DNN::new(vec![input_size], ClipValues::default());
        let nlayers = affines.len();
        affines.into_iter().enumerate().for_each(|(i, aff)| {
            let output_dim = aff.output_dim();
            dnn.add_layer(Box::new(Dense::new(aff)));
            if i + 1 < nlayers {
                dnn.add_layer(Box::new(ReLU::new(output_dim)));
            }
        });
        dnn
    }
}
