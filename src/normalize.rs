use glam::{DMat4, DVec3};

use crate::{
    error::{ShowreelError, ShowreelResult},
    scene::{Aabb, ObjectId, Scene},
};

/// Uniform scale followed by a translation, composed as
/// `Scale(scale) * Translate(offset)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Similarity {
    pub scale: f64,
    pub offset: DVec3,
}

impl Similarity {
    pub fn to_matrix(self) -> DMat4 {
        DMat4::from_scale(DVec3::splat(self.scale)) * DMat4::from_translation(self.offset)
    }
}

/// World-space bounds of a single mesh object. The local bound corners are
/// taken through `matrix_world` individually; reducing in local space would
/// under- or over-estimate rotated objects.
pub fn compute_bbox(scene: &Scene, id: ObjectId) -> ShowreelResult<Aabb> {
    let object = scene.object(id);
    let mesh = object.mesh().ok_or_else(|| {
        ShowreelError::geometry(format!("object '{}' has no mesh", object.name))
    })?;
    Ok(world_bounds(object.matrix_world, mesh.bounds))
}

/// World-space bounds over every mesh in the scene.
pub fn scene_bbox(scene: &Scene) -> ShowreelResult<Aabb> {
    let mut acc: Option<Aabb> = None;
    for (_, object) in scene.objects() {
        let Some(mesh) = object.mesh() else { continue };
        let bounds = world_bounds(object.matrix_world, mesh.bounds);
        acc = Some(match acc {
            None => bounds,
            Some(prev) => Aabb::new(prev.min.min(bounds.min), prev.max.max(bounds.max)),
        });
    }
    acc.ok_or_else(|| ShowreelError::geometry("no mesh found in the scene"))
}

fn world_bounds(matrix_world: DMat4, local: Aabb) -> Aabb {
    let mut min = DVec3::INFINITY;
    let mut max = DVec3::NEG_INFINITY;
    for corner in local.corners() {
        let p = matrix_world.transform_point3(corner);
        min = min.min(p);
        max = max.max(p);
    }
    Aabb::new(min, max)
}

fn similarity_for(bounds: Aabb) -> Similarity {
    let size = bounds.size();
    Similarity {
        scale: 1.0 / size.x.max(size.y).max(size.z),
        offset: -bounds.center(),
    }
}

/// Center the object at the origin and scale it into the unit cube.
///
/// The scale is `1 / largest per-axis extent` (not the diagonal), so the
/// asset stays isotropic and its longest side lands on exactly 1.0. The
/// derived transform is left-multiplied onto the object's existing world
/// transform; a pre-existing placement is preserved relative to the new
/// canonical frame.
pub fn normalize_object(scene: &mut Scene, id: ObjectId) -> ShowreelResult<Similarity> {
    let similarity = similarity_for(compute_bbox(scene, id)?);
    let object = scene.object_mut(id);
    object.matrix_world = similarity.to_matrix() * object.matrix_world;
    Ok(similarity)
}

/// Scene-wide variant: one similarity from the combined mesh bounds, applied
/// to every object so relative placement survives.
pub fn normalize_scene(scene: &mut Scene) -> ShowreelResult<Similarity> {
    let similarity = similarity_for(scene_bbox(scene)?);
    let t = similarity.to_matrix();
    let ids: Vec<ObjectId> = scene.objects().map(|(id, _)| id).collect();
    for id in ids {
        let object = scene.object_mut(id);
        object.matrix_world = t * object.matrix_world;
    }
    Ok(similarity)
}
