use std::f64::consts::TAU;

use crate::{
    error::{ShowreelError, ShowreelResult},
    scene::{Object, ObjectId, ObjectMode, RotationKey, Scene},
};

/// Key a full revolution about the vertical axis across `frame_count` frames
/// and set the scene's active range to `[0, frame_count)`.
///
/// NOTE: the per-frame angle is `(frame - 1) * 2π / frame_count`, so frame 0
/// sits one step behind the zero orientation. Kept for output parity with
/// existing captures (see DESIGN.md).
pub fn animate_turntable(
    scene: &mut Scene,
    id: ObjectId,
    frame_count: u32,
) -> ShowreelResult<()> {
    if frame_count == 0 {
        return Err(ShowreelError::validation(
            "turntable frame count must be > 0",
        ));
    }
    if scene.object(id).mode != ObjectMode::Object {
        return Err(ShowreelError::validation(format!(
            "object '{}' is being edited; keyframes require object mode",
            scene.object(id).name
        )));
    }

    scene.frame_start = 0;
    scene.frame_end = i64::from(frame_count) - 1;

    let step = TAU / f64::from(frame_count);
    let object = scene.object_mut(id);
    object.rotation_keys.clear();
    for frame in 0..i64::from(frame_count) {
        object.rotation_keys.push(RotationKey {
            frame,
            angle_rad: (frame as f64 - 1.0) * step,
        });
    }
    Ok(())
}

/// Keyed rotation at `frame`, holding the last key at or before it.
pub fn rotation_at(object: &Object, frame: i64) -> Option<f64> {
    let keys = &object.rotation_keys;
    let idx = keys.partition_point(|k| k.frame <= frame);
    if idx == 0 {
        return None;
    }
    Some(keys[idx - 1].angle_rad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Aabb, Mesh, ObjectData};
    use glam::DVec3;

    const EPS: f64 = 1e-12;

    fn scene_with_mesh() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let id = scene.add_object(Object::new(
            "model",
            ObjectData::Mesh(Mesh {
                bounds: Aabb::new(DVec3::ZERO, DVec3::ONE),
            }),
        ));
        (scene, id)
    }

    #[test]
    fn sets_frame_range_and_key_per_frame() {
        let (mut scene, id) = scene_with_mesh();
        animate_turntable(&mut scene, id, 24).unwrap();

        assert_eq!(scene.frame_start, 0);
        assert_eq!(scene.frame_end, 23);
        assert_eq!(scene.object(id).rotation_keys.len(), 24);
    }

    #[test]
    fn frame_zero_is_one_step_behind() {
        let (mut scene, id) = scene_with_mesh();
        animate_turntable(&mut scene, id, 8).unwrap();

        let keys = &scene.object(id).rotation_keys;
        let step = TAU / 8.0;
        assert!((keys[0].angle_rad + step).abs() < EPS);
        assert!(keys[1].angle_rad.abs() < EPS);
        assert!((keys[7].angle_rad - 6.0 * step).abs() < EPS);
    }

    #[test]
    fn edit_mode_is_fatal() {
        let (mut scene, id) = scene_with_mesh();
        scene.object_mut(id).mode = ObjectMode::Edit;
        assert!(animate_turntable(&mut scene, id, 24).is_err());
    }

    #[test]
    fn zero_frames_is_rejected() {
        let (mut scene, id) = scene_with_mesh();
        assert!(animate_turntable(&mut scene, id, 0).is_err());
    }

    #[test]
    fn rotation_at_holds_last_key() {
        let (mut scene, id) = scene_with_mesh();
        animate_turntable(&mut scene, id, 4).unwrap();
        let object = scene.object(id);

        assert_eq!(rotation_at(object, -1), None);
        let step = TAU / 4.0;
        assert!((rotation_at(object, 2).unwrap() - step).abs() < EPS);
        // Past the last key the value holds.
        assert!((rotation_at(object, 99).unwrap() - 2.0 * step).abs() < EPS);
    }
}
