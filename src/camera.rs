use glam::{DMat4, DVec3, DVec4};

use crate::{
    error::{ShowreelError, ShowreelResult},
    scene::{Lens, ObjectId, Scene},
};

/// Which sensor dimension defines the field of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SensorFit {
    Auto,
    Horizontal,
    Vertical,
}

/// Pose whose local +Z axis points along `eye - target` (the camera looks
/// down its local -Z, so it faces the target), with the local Y axis pulled
/// toward `up_hint`. Translation is composed in front of the rotation:
/// `Translate(eye) * R`, the orbit-camera convention.
///
/// Caller preconditions: `eye != target`, and `up_hint` not parallel to the
/// viewing direction.
pub fn look_at(eye: DVec3, target: DVec3, up_hint: DVec3) -> DMat4 {
    let z = (eye - target).normalize();
    let x = up_hint.cross(z).normalize();
    let y = z.cross(x);
    let rotation = DMat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), DVec4::W);
    DMat4::from_translation(eye) * rotation
}

/// Pinhole calibration:
///
/// ```text
/// [[fx, skew, cx],
///  [ 0,   fy, cy],
///  [ 0,    0,  1]]
/// ```
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub skew: f64,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    /// Symmetric pinhole model from a horizontal field of view, principal
    /// point at the pixel-grid center.
    pub fn from_fov(width: u32, height: u32, fov_radians: f64) -> Self {
        let f = 0.5 * f64::from(width) / (fov_radians * 0.5).tan();
        Self {
            fx: f,
            fy: f,
            cx: (f64::from(width) - 1.0) / 2.0,
            cy: (f64::from(height) - 1.0) / 2.0,
            skew: 0.0,
            width,
            height,
        }
    }
}

/// Physical lens parameters in the renderer's own terms.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LensParams {
    pub focal_length_mm: f64,
    /// Resolved fit (never `Auto`).
    pub sensor_fit: SensorFit,
    pub sensor_size_mm: f64,
    pub shift_x: f64,
    pub shift_y: f64,
    pub pixel_aspect_x: f64,
    pub pixel_aspect_y: f64,
}

const SKEW_TOLERANCE: f64 = 1e-7;
/// Renderer-imposed floor on the physical focal length.
const MIN_FOCAL_LENGTH_MM: f64 = 1.0;

/// Map a pinhole calibration onto physical lens parameters.
///
/// Pure function of its inputs. Fails on nonzero skew and on derived focal
/// lengths below the renderer's 1 mm floor.
pub fn intrinsics_to_lens(
    k: &Intrinsics,
    sensor_width_mm: f64,
    sensor_height_mm: f64,
    configured_fit: SensorFit,
) -> ShowreelResult<LensParams> {
    if k.skew.abs() >= SKEW_TOLERANCE {
        return Err(ShowreelError::intrinsics(format!(
            "nonzero skew {} is not representable",
            k.skew
        )));
    }

    let width = f64::from(k.width);
    let height = f64::from(k.height);
    let pixel_aspect_ratio = k.fx / k.fy;

    let sensor_fit = match configured_fit {
        SensorFit::Auto => {
            if width / k.fx >= height / k.fy {
                SensorFit::Horizontal
            } else {
                SensorFit::Vertical
            }
        }
        fit => fit,
    };

    let view_fac_px = match sensor_fit {
        SensorFit::Horizontal => width,
        _ => pixel_aspect_ratio * height,
    };
    // The sensor dimension follows the *configured* fit: Auto reads the
    // sensor width even when the resolved fit is vertical.
    let sensor_size_mm = if configured_fit == SensorFit::Vertical {
        sensor_height_mm
    } else {
        sensor_width_mm
    };

    let focal_length_mm = k.fx * sensor_size_mm / view_fac_px;
    if focal_length_mm < MIN_FOCAL_LENGTH_MM {
        return Err(ShowreelError::intrinsics(format!(
            "derived focal length {focal_length_mm:.4}mm is below the {MIN_FOCAL_LENGTH_MM}mm floor"
        )));
    }

    let shift_x = (k.cx - (width - 1.0) / 2.0) / -view_fac_px;
    let shift_y = (k.cy - (height - 1.0) / 2.0) / view_fac_px * pixel_aspect_ratio;

    let pixel_aspect_y = if k.fx > k.fy { k.fx / k.fy } else { 1.0 };
    let pixel_aspect_x = if k.fx < k.fy { k.fy / k.fx } else { 1.0 };

    Ok(LensParams {
        focal_length_mm,
        sensor_fit,
        sensor_size_mm,
        shift_x,
        shift_y,
        pixel_aspect_x,
        pixel_aspect_y,
    })
}

/// Inverse of [`intrinsics_to_lens`] for a given output size.
pub fn lens_to_intrinsics(lens: &LensParams, width: u32, height: u32) -> Intrinsics {
    let w = f64::from(width);
    let h = f64::from(height);
    let pixel_aspect_ratio = lens.pixel_aspect_y / lens.pixel_aspect_x;

    let view_fac_px = match lens.sensor_fit {
        SensorFit::Horizontal => w,
        _ => pixel_aspect_ratio * h,
    };

    let fx = lens.focal_length_mm * view_fac_px / lens.sensor_size_mm;
    let fy = fx / pixel_aspect_ratio;
    let cx = (w - 1.0) / 2.0 - lens.shift_x * view_fac_px;
    let cy = (h - 1.0) / 2.0 + lens.shift_y * view_fac_px / pixel_aspect_ratio;

    Intrinsics {
        fx,
        fy,
        cx,
        cy,
        skew: 0.0,
        width,
        height,
    }
}

/// Solve the scene camera's lens from a calibration matrix and write the
/// result onto the camera and the render settings.
pub fn apply_intrinsics(scene: &mut Scene, id: ObjectId, k: &Intrinsics) -> ShowreelResult<LensParams> {
    let data = scene.camera_data(id)?;
    let lens = intrinsics_to_lens(
        k,
        data.sensor_width_mm,
        data.sensor_height_mm,
        data.sensor_fit,
    )?;

    let data = scene.camera_data_mut(id)?;
    data.lens = Lens::Millimeters(lens.focal_length_mm);
    data.sensor_fit = lens.sensor_fit;
    data.shift_x = lens.shift_x;
    data.shift_y = lens.shift_y;

    scene.render.pixel_aspect_x = lens.pixel_aspect_x;
    scene.render.pixel_aspect_y = lens.pixel_aspect_y;
    scene.render.resolution_x = k.width;
    scene.render.resolution_y = k.height;
    Ok(lens)
}
