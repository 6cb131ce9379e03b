use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, PI, TAU};

use glam::DVec3;
use rand::Rng;

use crate::error::{ShowreelError, ShowreelResult};

/// Spiral-on-a-sphere parameters. Polar angles follow
/// `arccos((1 - i/(n-1)) * 2 - 1)`, which spaces samples uniformly over the
/// sphere's surface area rather than uniformly in the polar angle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpiralParams {
    pub center: DVec3,
    pub radius: f64,
    pub num_points: usize,
    pub num_loops: u32,
    pub extra: bool,
    pub randomize: bool,
}

impl SpiralParams {
    pub fn new(center: DVec3, radius: f64, num_points: usize) -> Self {
        Self {
            center,
            radius,
            num_points,
            num_loops: 1,
            extra: false,
            randomize: false,
        }
    }

    pub fn with_loops(mut self, num_loops: u32) -> Self {
        self.num_loops = num_loops;
        self
    }

    pub fn with_extra(mut self, extra: bool) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }
}

fn on_sphere(center: DVec3, radius: f64, phi: f64, theta: f64) -> DVec3 {
    center
        + radius
            * DVec3::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            )
}

/// Ordered pole-to-pole spiral of camera positions.
///
/// When `randomize` is set, a single azimuthal phase in `[0, 2π)` is drawn
/// per call and added to every point. When `extra` is set, 8 fixed anchor
/// points at `φ ∈ {π/3, π/2} × θ ∈ {0, π/2, π, 3π/2}` are appended after the
/// primary sequence, independent of `num_points`.
pub fn spiral(params: &SpiralParams, rng: &mut impl Rng) -> ShowreelResult<Vec<DVec3>> {
    if params.num_points < 2 {
        return Err(ShowreelError::validation(
            "spiral trajectory needs at least 2 points",
        ));
    }

    let phase = if params.randomize {
        rng.random_range(0.0..TAU)
    } else {
        0.0
    };

    let last = (params.num_points - 1) as f64;
    let mut points = Vec::with_capacity(params.num_points + if params.extra { 8 } else { 0 });
    for i in 0..params.num_points {
        let t = i as f64 / last;
        let phi = ((1.0 - t) * 2.0 - 1.0).acos();
        let theta = t * TAU * f64::from(params.num_loops) + phase;
        points.push(on_sphere(params.center, params.radius, phi, theta));
    }

    if params.extra {
        for phi in [FRAC_PI_3, FRAC_PI_2] {
            for theta in [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
                points.push(on_sphere(params.center, params.radius, phi, theta));
            }
        }
    }

    Ok(points)
}

/// Random positions inside a spherical shell around `center`.
///
/// Each point draws a direction uniformly from the cube `[-1,1]^3` and
/// normalizes it, then scales by a fresh radius draw. The direction is
/// cube-uniform, not surface-uniform; corner directions are over-represented.
pub fn uniform_sphere_shell(
    center: DVec3,
    radius_min: f64,
    radius_max: f64,
    num_points: usize,
    rng: &mut impl Rng,
) -> Vec<DVec3> {
    (0..num_points)
        .map(|_| {
            let dir = DVec3::new(
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
                rng.random_range(-1.0..=1.0),
            );
            let radius = rng.random_range(radius_min..=radius_max);
            center + dir.normalize() * radius
        })
        .collect()
}
