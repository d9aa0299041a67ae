//! CPU ray picking against proxy bounding boxes and the ground plane.

use super::camera::Ray;
use crate::assets::Aabb;
use crate::scene::ObjectId;
use glam::{Mat4, Vec3};

/// The visible ground quad is 200 x 200 m, centred on the origin, slightly
/// below y = 0.
pub const GROUND_HALF_EXTENT: f32 = 100.0;
pub const GROUND_Y: f32 = -0.01;

#[derive(Debug, Clone, PartialEq)]
pub enum PickHit {
    Object { id: ObjectId, distance: f32 },
    Ground { point: Vec3 },
    None,
}

/// One pickable box: local bounds placed by an instance transform.
pub struct Pickable<'a> {
    pub id: &'a ObjectId,
    pub bounds: Aabb,
    pub world: Mat4,
}

/// Nearest object along the ray, falling back to the ground plane.
pub fn pick<'a>(ray: &Ray, pickables: impl IntoIterator<Item = Pickable<'a>>) -> PickHit {
    let nearest = pickables
        .into_iter()
        .filter_map(|p| ray_box_distance(ray, &p.bounds, &p.world).map(|t| (p.id, t)))
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((id, distance)) = nearest {
        return PickHit::Object {
            id: id.clone(),
            distance,
        };
    }
    match ray_ground(ray) {
        Some(point) => PickHit::Ground { point },
        None => PickHit::None,
    }
}

/// Distance to an oriented box given by `bounds` in the local frame of `world`.
/// `world` must be rigid (rotation + translation) so distances are preserved.
pub fn ray_box_distance(ray: &Ray, bounds: &Aabb, world: &Mat4) -> Option<f32> {
    let inverse = world.inverse();
    let origin = inverse.transform_point3(ray.origin);
    let direction = inverse.transform_vector3(ray.direction);

    let mut t_min = 0.0f32;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let (lo, hi) = (bounds.min[axis], bounds.max[axis]);
        if d.abs() < 1e-8 {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut t0, mut t1) = ((lo - o) * inv, (hi - o) * inv);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

pub fn ray_ground(ray: &Ray) -> Option<Vec3> {
    let point = ray_plane(ray, Vec3::new(0.0, GROUND_Y, 0.0), Vec3::Y)?;
    (point.x.abs() <= GROUND_HALF_EXTENT && point.z.abs() <= GROUND_HALF_EXTENT).then_some(point)
}

pub fn ray_plane(ray: &Ray, plane_point: Vec3, normal: Vec3) -> Option<Vec3> {
    let denom = ray.direction.dot(normal);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (plane_point - ray.origin).dot(normal) / denom;
    (t > 0.0).then(|| ray.at(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn down_ray(x: f32, z: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, 10.0, z),
            direction: Vec3::NEG_Y,
        }
    }

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    #[test]
    fn nearest_box_wins() {
        let low = ObjectId::new("low");
        let high = ObjectId::new("high");
        let hit = pick(
            &down_ray(0.0, 0.0),
            [
                Pickable {
                    id: &low,
                    bounds: unit_box(),
                    world: Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)),
                },
                Pickable {
                    id: &high,
                    bounds: unit_box(),
                    world: Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0)),
                },
            ],
        );
        match hit {
            PickHit::Object { id, distance } => {
                assert_eq!(id, high);
                assert!((distance - 6.5).abs() < 1e-4);
            }
            other => panic!("expected object hit, got {other:?}"),
        }
    }

    #[test]
    fn rotated_box_uses_local_frame() {
        let long = Aabb::new(Vec3::new(-2.0, -0.5, -0.25), Vec3::new(2.0, 0.5, 0.25));
        let rotated = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        // After a quarter turn the long side lies along Z.
        assert!(ray_box_distance(&down_ray(0.0, 1.5), &long, &rotated).is_some());
        assert!(ray_box_distance(&down_ray(1.5, 0.0), &long, &rotated).is_none());
    }

    #[test]
    fn miss_falls_back_to_ground_then_nothing() {
        let id = ObjectId::new("car");
        let hit = pick(
            &down_ray(5.0, 5.0),
            [Pickable {
                id: &id,
                bounds: unit_box(),
                world: Mat4::IDENTITY,
            }],
        );
        assert!(matches!(hit, PickHit::Ground { point } if (point.y - GROUND_Y).abs() < 1e-6));

        let sky = Ray {
            origin: Vec3::new(0.0, 1.0, 0.0),
            direction: Vec3::Y,
        };
        assert_eq!(pick(&sky, std::iter::empty()), PickHit::None);
        assert_eq!(pick(&down_ray(150.0, 0.0), std::iter::empty()), PickHit::None);
    }
}
