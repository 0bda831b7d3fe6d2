//! Torch components
pub mod distributions;
pub mod modules;
pub mod optimizers;
pub mod serialize;

pub use distributions::Categorical;
pub use modules::{Activation, Mlp, MlpConfig};
pub use optimizers::AdamConfig;

use ndarray::ArrayD;
use tch::{Device, Tensor};

/// Copy an f32 array into a new tensor with the same shape on the given device.
#[allow(clippy::cast_possible_wrap)]
pub fn tensor_from_array(array: &ArrayD<f32>, device: Device) -> Tensor {
    let shape: Vec<i64> = array.shape().iter().map(|&d| d as i64).collect();
    let data: Vec<f32> = array.iter().copied().collect();
    Tensor::of_slice(&data).reshape(&shape).to_device(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn tensor_from_array_keeps_layout() {
        let array = arr2(&[[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn();
        let tensor = tensor_from_array(&array, Device::Cpu);
        assert_eq!(tensor.size(), vec![2, 3]);
        assert_eq!(f64::from(&tensor.get(1).get(0)), 4.0);

        // Transposed (non-standard) layout is copied in logical order
        let transposed = array.t().to_owned();
        let tensor = tensor_from_array(&transposed, Device::Cpu);
        assert_eq!(tensor.size(), vec![3, 2]);
        assert_eq!(f64::from(&tensor.get(0).get(1)), 4.0);
    }
}
