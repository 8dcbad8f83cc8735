//! CPU reference implementation of the Kuwahara passes
//!
//! Mirrors the WGSL passes operation by operation in `f32`, so GPU output can be checked
//! against it within a small tolerance. It is slow and only meant as a verification oracle.

use image::Rgba32FImage;
use kuwahara_wgpu::KuwaharaParameters;

const EPSILON: f32 = 1e-6;
const LUMINANCE_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];
const SECTOR_COUNT: usize = 8;
const GAUSSIAN_FALLOFF: f32 = 3.125;
const HARDNESS_SCALE: f32 = 1000.0;

/// Axis of one separable blur pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurAxis {
    Horizontal,
    Vertical,
}

impl BlurAxis {
    fn direction(&self) -> (i64, i64) {
        match self {
            BlurAxis::Horizontal => (1, 0),
            BlurAxis::Vertical => (0, 1),
        }
    }
}

/// Eigen decomposition of one structure tensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EigenSample {
    /// Larger eigenvalue
    pub lambda1: f32,
    /// Smaller eigenvalue
    pub lambda2: f32,
    /// Angle of the major eigenvector
    pub theta: f32,
    /// `(λ1 - λ2) / (λ1 + λ2)` in `[0, 1]`
    pub anisotropy: f32,
}

impl EigenSample {
    /// Decomposes the symmetric tensor `[[gxx, gxy], [gxy, gyy]]`
    pub fn from_tensor(gxx: f32, gyy: f32, gxy: f32) -> Self {
        let half_trace = 0.5 * (gxx + gyy);
        let det = gxx * gyy - gxy * gxy;
        let root = (half_trace * half_trace - det).max(0.0).sqrt();
        let lambda1 = half_trace + root;
        let lambda2 = half_trace - root;

        let theta = if gxy != 0.0 || gxx != gyy {
            0.5 * (2.0 * gxy).atan2(gxx - gyy)
        } else {
            0.0
        };

        let anisotropy = if lambda1 + lambda2 >= EPSILON {
            ((lambda1 - lambda2) / (lambda1 + lambda2 + EPSILON)).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            lambda1,
            lambda2,
            theta,
            anisotropy,
        }
    }
}

/// Every image produced by one reference run
#[derive(Debug, Clone)]
pub struct ReferenceOutput {
    pub structure_tensor: Rgba32FImage,
    pub horizontal_blur: Rgba32FImage,
    pub blur_output: Rgba32FImage,
    pub eigenvector_output: Rgba32FImage,
    pub kuwahara_output: Rgba32FImage,
}

/// Runs the reference passes with one parameter set
#[derive(Debug, Clone, Copy)]
pub struct ReferenceEngine {
    parameters: KuwaharaParameters,
}

/// Loads a texel with coordinates clamped to the image
fn load(image: &Rgba32FImage, x: i64, y: i64) -> [f32; 4] {
    let x = x.clamp(0, image.width() as i64 - 1) as u32;
    let y = y.clamp(0, image.height() as i64 - 1) as u32;
    image.get_pixel(x, y).0
}

fn luminance(pixel: [f32; 4]) -> f32 {
    pixel[0] * LUMINANCE_WEIGHTS[0] + pixel[1] * LUMINANCE_WEIGHTS[1] + pixel[2] * LUMINANCE_WEIGHTS[2]
}

/// Structure tensor `(Sx², Sy², Sx·Sy, 1)` from Sobel gradients of the luminance
pub fn structure_tensor(source: &Rgba32FImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(source.width(), source.height(), |x, y| {
        let (x, y) = (x as i64, y as i64);
        let l = |dx: i64, dy: i64| luminance(load(source, x + dx, y + dy));

        let sx = (l(1, -1) + 2.0 * l(1, 0) + l(1, 1)) - (l(-1, -1) + 2.0 * l(-1, 0) + l(-1, 1));
        let sy = (l(-1, 1) + 2.0 * l(0, 1) + l(1, 1)) - (l(-1, -1) + 2.0 * l(0, -1) + l(1, -1));

        image::Rgba([sx * sx, sy * sy, sx * sy, 1.0])
    })
}

/// One axis of the normalized Gaussian blur with radius `kernel_size`
pub fn gaussian_blur(input: &Rgba32FImage, parameters: &KuwaharaParameters, axis: BlurAxis) -> Rgba32FImage {
    let radius = parameters.kernel_size.max(0) as i64;
    let sigma = parameters.sigma.max(EPSILON);
    let denominator = 2.0 * sigma * sigma;
    let (dx, dy) = axis.direction();

    Rgba32FImage::from_fn(input.width(), input.height(), |x, y| {
        let mut sum = [0.0f32; 4];
        let mut weight_sum = 0.0f32;
        for offset in -radius..=radius {
            let weight = (-((offset * offset) as f32) / denominator).exp();
            let texel = load(input, x as i64 + dx * offset, y as i64 + dy * offset);
            for (s, t) in sum.iter_mut().zip(texel) {
                *s += weight * t;
            }
            weight_sum += weight;
        }
        image::Rgba(sum.map(|s| s / weight_sum))
    })
}

/// `(cos θ, sin θ, anisotropy, λ1)` per pixel of a smoothed tensor
pub fn eigen_analysis(tensor: &Rgba32FImage) -> Rgba32FImage {
    Rgba32FImage::from_fn(tensor.width(), tensor.height(), |x, y| {
        let [gxx, gyy, gxy, _] = tensor.get_pixel(x, y).0;
        let sample = EigenSample::from_tensor(gxx, gyy, gxy);
        image::Rgba([sample.theta.cos(), sample.theta.sin(), sample.anisotropy, sample.lambda1])
    })
}

/// Unnormalized weights of the 4 cardinal (even) and 4 diagonal (odd) sectors
fn sector_weights(v: [f32; 2], zeta: f32, eta: f32) -> [f32; SECTOR_COUNT] {
    let mut weights = [0.0; SECTOR_COUNT];
    let squared = |z: f32| {
        let z = z.max(0.0);
        z * z
    };

    let vxx = zeta - eta * v[0] * v[0];
    let vyy = zeta - eta * v[1] * v[1];
    weights[0] = squared(v[1] + vxx);
    weights[2] = squared(-v[0] + vyy);
    weights[4] = squared(-v[1] + vxx);
    weights[6] = squared(v[0] + vyy);

    let half_sqrt_2 = std::f32::consts::FRAC_1_SQRT_2;
    let d = [half_sqrt_2 * (v[0] - v[1]), half_sqrt_2 * (v[0] + v[1])];
    let dxx = zeta - eta * d[0] * d[0];
    let dyy = zeta - eta * d[1] * d[1];
    weights[1] = squared(d[1] + dxx);
    weights[3] = squared(-d[0] + dyy);
    weights[5] = squared(-d[1] + dxx);
    weights[7] = squared(d[0] + dyy);

    weights
}

/// Sharpness of the polynomial sector weights
pub fn polynomial_eta(zeta: f32, zero_crossing: f32) -> f32 {
    let sin_zero_crossing = zero_crossing.sin();
    if sin_zero_crossing.abs() > EPSILON {
        (zeta + zero_crossing.cos()) / (sin_zero_crossing * sin_zero_crossing)
    } else {
        zeta
    }
}

/// Ellipse semi-axes `(a, b)` for a given anisotropy
pub fn ellipse_axes(parameters: &KuwaharaParameters, anisotropy: f32) -> (f32, f32) {
    let kernel_radius = parameters.kernel_size as f32 / 2.0;
    let safe_alpha = parameters.alpha.max(EPSILON);
    let a = kernel_radius * ((parameters.alpha + anisotropy) / safe_alpha).clamp(0.1, 2.0);
    let b = kernel_radius * (safe_alpha / (parameters.alpha + anisotropy).max(EPSILON)).clamp(0.1, 2.0);
    (a, b)
}

/// The anisotropic Kuwahara filter over `source` guided by an eigen analysis image
pub fn anisotropic_kuwahara(source: &Rgba32FImage, eigen: &Rgba32FImage, parameters: &KuwaharaParameters) -> Rgba32FImage {
    let zeta = parameters.zeta;
    let eta = polynomial_eta(zeta, parameters.zero_crossing);

    Rgba32FImage::from_fn(source.width(), source.height(), |x, y| {
        let original = source.get_pixel(x, y).0;
        let [cos_theta, sin_theta, anisotropy, _] = eigen.get_pixel(x, y).0;
        let (a, b) = ellipse_axes(parameters, anisotropy);

        let max_x = (a * a * cos_theta * cos_theta + b * b * sin_theta * sin_theta).sqrt().ceil() as i64;
        let max_y = (a * a * sin_theta * sin_theta + b * b * cos_theta * cos_theta).sqrt().ceil() as i64;

        let mut color_sums = [[0.0f32; 3]; SECTOR_COUNT];
        let mut square_sums = [[0.0f32; 3]; SECTOR_COUNT];
        let mut weight_sums = [0.0f32; SECTOR_COUNT];

        for oy in -max_y..=max_y {
            for ox in -max_x..=max_x {
                let (fx, fy) = (ox as f32, oy as f32);
                let v = [(cos_theta * fx + sin_theta * fy) / a, (-sin_theta * fx + cos_theta * fy) / b];
                let radius_squared = v[0] * v[0] + v[1] * v[1];
                if radius_squared > 1.0 {
                    continue;
                }

                let weights = sector_weights(v, zeta, eta);
                let weight_total: f32 = weights.iter().sum();
                if weight_total <= EPSILON {
                    continue;
                }

                let falloff = (-GAUSSIAN_FALLOFF * radius_squared).exp() / weight_total;
                let texel = load(source, x as i64 + ox, y as i64 + oy);
                for k in 0..SECTOR_COUNT {
                    let weight = weights[k] * falloff;
                    for c in 0..3 {
                        color_sums[k][c] += texel[c] * weight;
                        square_sums[k][c] += texel[c] * texel[c] * weight;
                    }
                    weight_sums[k] += weight;
                }
            }
        }

        let mut blended = [0.0f32; 3];
        let mut selection_total = 0.0f32;
        for k in 0..SECTOR_COUNT {
            if weight_sums[k] <= EPSILON {
                continue;
            }

            let mean = color_sums[k].map(|sum| sum / weight_sums[k]);
            let variance: f32 = (0..3).map(|c| (square_sums[k][c] / weight_sums[k] - mean[c] * mean[c]).max(0.0)).sum();
            let scaled_variance = (parameters.hardness * HARDNESS_SCALE * variance).max(0.0);
            let selection = if scaled_variance > 0.0 {
                1.0 / (1.0 + scaled_variance.powf(parameters.sharpness * 0.5))
            } else {
                1.0
            };

            for c in 0..3 {
                blended[c] += mean[c] * selection;
            }
            selection_total += selection;
        }

        let result = if selection_total > EPSILON {
            [blended[0] / selection_total, blended[1] / selection_total, blended[2] / selection_total, original[3]]
        } else {
            original
        };
        image::Rgba(result.map(|c| c.clamp(0.0, 1.0)))
    })
}

impl ReferenceEngine {
    pub fn new(parameters: KuwaharaParameters) -> Self {
        Self { parameters }
    }

    /// Runs every pass over `source` in pipeline order
    pub fn process(&self, source: &Rgba32FImage) -> ReferenceOutput {
        let structure_tensor = structure_tensor(source);
        let horizontal_blur = gaussian_blur(&structure_tensor, &self.parameters, BlurAxis::Horizontal);
        let blur_output = gaussian_blur(&horizontal_blur, &self.parameters, BlurAxis::Vertical);
        let eigenvector_output = eigen_analysis(&blur_output);
        let kuwahara_output = anisotropic_kuwahara(source, &eigenvector_output, &self.parameters);

        ReferenceOutput {
            structure_tensor,
            horizontal_blur,
            blur_output,
            eigenvector_output,
            kuwahara_output,
        }
    }
}
