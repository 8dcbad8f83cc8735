//! Filter parameters and their GPU uniform serialization
//!
//! [`KuwaharaParameters`] is the value struct callers edit; [`ParameterBuffer`] is its
//! fixed 32-byte image matching the `KuwaharaParams` uniform struct declared in
//! `shaders/common.wgsl`. The build script checks the WGSL side of that layout and the
//! `const` assertions below check the Rust side.

use crate::error::{KuwaharaError, Result};
use serde::{Deserialize, Serialize};

/// Parameters of one anisotropic Kuwahara filter run
///
/// All fields are immutable for the duration of a run; changing any field triggers a new run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KuwaharaParameters {
    /// Neighborhood radius driver (ellipse radius is half of it, blur radius equals it)
    pub kernel_size: i32,
    /// Exponent shaping the sector selection weight
    pub sharpness: f32,
    /// Variance sensitivity of the sector selection weight
    pub hardness: f32,
    /// Maps anisotropy to the ellipse axis ratio
    pub alpha: f32,
    /// Angle (radians) controlling the polynomial sector falloff
    pub zero_crossing: f32,
    /// Sharpness of the polynomial sector weighting
    pub zeta: f32,
    /// Standard deviation of the structure tensor smoothing
    pub sigma: f32,
}

impl Default for KuwaharaParameters {
    fn default() -> Self {
        Self {
            kernel_size: 10,
            sharpness: 8.0,
            hardness: 8.0,
            alpha: 1.0,
            zero_crossing: 0.58,
            zeta: 1.0,
            sigma: 2.0,
        }
    }
}

/// Inclusive range a parameter may take, in the field's own type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange<T> {
    /// Field name as used in presets and error messages
    pub name: &'static str,
    /// Smallest accepted value
    pub min: T,
    /// Largest accepted value
    pub max: T,
}

impl<T: PartialOrd + Copy + Into<f64>> ParameterRange<T> {
    /// Accepts `value` when `min <= value <= max`; NaN is always rejected
    pub fn check(&self, value: T) -> Result<()> {
        if (self.min..=self.max).contains(&value) {
            Ok(())
        } else {
            Err(KuwaharaError::InvalidParameter {
                name: self.name,
                value: value.into(),
                min: self.min.into(),
                max: self.max.into(),
            })
        }
    }
}

/// Declared range of `kernel_size`
pub const KERNEL_SIZE_RANGE: ParameterRange<i32> = ParameterRange { name: "kernel_size", min: 1, max: 160 };

/// Declared ranges of the floating-point parameters, in field order
pub const FLOAT_PARAMETER_RANGES: [ParameterRange<f32>; 6] = [
    ParameterRange { name: "sharpness", min: 0.01, max: 20.0 },
    ParameterRange { name: "hardness", min: 0.1, max: 20.0 },
    ParameterRange { name: "alpha", min: 0.01, max: 10.0 },
    ParameterRange {
        name: "zero_crossing",
        min: 0.0,
        max: std::f32::consts::PI,
    },
    ParameterRange { name: "zeta", min: 0.01, max: 6.0 },
    ParameterRange { name: "sigma", min: 0.5, max: 200.0 },
];

impl KuwaharaParameters {
    /// Floating-point field values, in the order of [`FLOAT_PARAMETER_RANGES`]
    fn float_values(&self) -> [f32; 6] {
        [self.sharpness, self.hardness, self.alpha, self.zero_crossing, self.zeta, self.sigma]
    }

    /// Checks every field against its declared range
    ///
    /// # Returns
    /// `Ok(())`, or [`KuwaharaError::InvalidParameter`] for the first offending field
    pub fn validate(&self) -> Result<()> {
        KERNEL_SIZE_RANGE.check(self.kernel_size)?;
        FLOAT_PARAMETER_RANGES.iter().zip(self.float_values()).try_for_each(|(range, value)| range.check(value))
    }

    /// Serializes the parameters into the uniform block layout
    pub fn to_buffer(&self) -> ParameterBuffer {
        ParameterBuffer::from(self)
    }
}

/// GPU-side image of [`KuwaharaParameters`]
///
/// Layout (bytes): 0 `kernel_size` (i32), 4 `sharpness`, 8 `hardness`, 12 `alpha`,
/// 16 `zero_crossing`, 20 `zeta`, 24 `sigma` (all f32), 28 padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParameterBuffer {
    kernel_size: i32,
    sharpness: f32,
    hardness: f32,
    alpha: f32,
    zero_crossing: f32,
    zeta: f32,
    sigma: f32,
    _padding: f32,
}

/// Size of the uniform block in bytes
pub const PARAMETER_BUFFER_SIZE: usize = 32;

const _: () = assert!(std::mem::size_of::<ParameterBuffer>() == PARAMETER_BUFFER_SIZE);
const _: () = assert!(std::mem::size_of::<ParameterBuffer>() % 16 == 0);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, kernel_size) == 0);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, sharpness) == 4);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, hardness) == 8);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, alpha) == 12);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, zero_crossing) == 16);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, zeta) == 20);
const _: () = assert!(std::mem::offset_of!(ParameterBuffer, sigma) == 24);

impl From<&KuwaharaParameters> for ParameterBuffer {
    fn from(parameters: &KuwaharaParameters) -> Self {
        Self {
            kernel_size: parameters.kernel_size,
            sharpness: parameters.sharpness,
            hardness: parameters.hardness,
            alpha: parameters.alpha,
            zero_crossing: parameters.zero_crossing,
            zeta: parameters.zeta,
            sigma: parameters.sigma,
            _padding: 0.0,
        }
    }
}

impl ParameterBuffer {
    /// Returns the raw bytes uploaded to the uniform buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_buffer_byte_layout() {
        let parameters = KuwaharaParameters {
            kernel_size: 4,
            sharpness: 0.8,
            hardness: 0.5,
            alpha: 1.0,
            zero_crossing: 0.1,
            zeta: 0.05,
            sigma: 5.0,
        };

        let buffer = parameters.to_buffer();
        let bytes = buffer.as_bytes();

        assert_eq!(bytes.len(), PARAMETER_BUFFER_SIZE);
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 4);
        assert_eq!(read_f32(bytes, 4), 0.8);
        assert_eq!(read_f32(bytes, 8), 0.5);
        assert_eq!(read_f32(bytes, 12), 1.0);
        assert_eq!(read_f32(bytes, 16), 0.1);
        assert_eq!(read_f32(bytes, 20), 0.05);
        assert_eq!(read_f32(bytes, 24), 5.0);
        assert_eq!(&bytes[28..32], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_kernel_size_is_stored_as_integer() {
        let parameters = KuwaharaParameters {
            kernel_size: 160,
            ..Default::default()
        };
        let buffer = parameters.to_buffer();
        // 160 as an f32 would read back as 1126170624
        assert_eq!(i32::from_le_bytes(buffer.as_bytes()[0..4].try_into().unwrap()), 160);
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(KuwaharaParameters::default().validate().is_ok());
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let lower = KuwaharaParameters {
            kernel_size: 1,
            sharpness: 0.01,
            hardness: 0.1,
            alpha: 0.01,
            zero_crossing: 0.0,
            zeta: 0.01,
            sigma: 0.5,
        };
        assert!(lower.validate().is_ok());

        let upper = KuwaharaParameters {
            kernel_size: 160,
            sharpness: 20.0,
            hardness: 20.0,
            alpha: 10.0,
            zero_crossing: std::f32::consts::PI,
            zeta: 6.0,
            sigma: 200.0,
        };
        assert!(upper.validate().is_ok());
    }

    #[test]
    fn test_values_just_outside_bounds_are_rejected() {
        let below = KuwaharaParameters {
            sharpness: 0.0099,
            ..Default::default()
        };
        assert!(matches!(below.validate(), Err(KuwaharaError::InvalidParameter { name: "sharpness", .. })));

        let above = KuwaharaParameters {
            zero_crossing: 3.1416,
            ..Default::default()
        };
        assert!(matches!(above.validate(), Err(KuwaharaError::InvalidParameter { name: "zero_crossing", .. })));

        let infinite = KuwaharaParameters {
            alpha: f32::INFINITY,
            ..Default::default()
        };
        assert!(matches!(infinite.validate(), Err(KuwaharaError::InvalidParameter { name: "alpha", .. })));
    }

    #[test]
    fn test_out_of_range_parameter_is_named() {
        let parameters = KuwaharaParameters {
            kernel_size: 0,
            ..Default::default()
        };
        match parameters.validate() {
            Err(KuwaharaError::InvalidParameter { name, value, .. }) => {
                assert_eq!(name, "kernel_size");
                assert_eq!(value, 0.0);
            }
            other => panic!("expected invalid kernel_size, got {other:?}"),
        }

        let parameters = KuwaharaParameters {
            sigma: f32::NAN,
            ..Default::default()
        };
        assert!(matches!(parameters.validate(), Err(KuwaharaError::InvalidParameter { name: "sigma", .. })));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parameters: KuwaharaParameters = serde_norway::from_str("kernel_size: 4\nsigma: 5.0\n").unwrap();
        assert_eq!(parameters.kernel_size, 4);
        assert_eq!(parameters.sigma, 5.0);
        assert_eq!(parameters.zeta, KuwaharaParameters::default().zeta);
    }
}
