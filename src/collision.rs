use bevy::math::{Quat, Vec3};
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::generation::{HazardSpec, PlatformSpec};
use crate::locomotion_core::{GroundProbe, ProbeHit, SurfaceQuery, SurfaceTag};

pub const LAYER_GROUND: u32 = 1;
pub const LAYER_HAZARD: u32 = 1 << 1;
pub const LAYER_VOID: u32 = 1 << 2;

/// Tolerance for treating a body as resting on a surface.
const SKIN: f32 = 0.05;
const SPIKE_HALF_EXTENTS: Vec3 = Vec3::new(0.4, 0.3, 0.4);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum ColliderOwner {
    Platform(usize),
    Hazard(usize),
    Void,
}

/// Yaw-only oriented box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlatformCollider {
    pub center: Vec3,
    pub half_extents: Vec3,
    pub rotation: Quat,
    pub tag: SurfaceTag,
    pub lethal: bool,
    pub layer: u32,
    pub owner: ColliderOwner,
}

impl PlatformCollider {
    pub fn from_platform(spec: &PlatformSpec, bounce_force: f32) -> Self {
        Self {
            center: spec.position,
            half_extents: spec.scale * 0.5,
            rotation: spec.rotation,
            tag: spec.surface_tag(bounce_force),
            lethal: false,
            layer: LAYER_GROUND,
            owner: ColliderOwner::Platform(spec.index),
        }
    }

    pub fn from_hazard(index: usize, hazard: &HazardSpec) -> Self {
        Self {
            center: hazard.position + Vec3::Y * SPIKE_HALF_EXTENTS.y,
            half_extents: SPIKE_HALF_EXTENTS,
            rotation: Quat::IDENTITY,
            tag: SurfaceTag::Hazard,
            lethal: false,
            layer: LAYER_HAZARD,
            owner: ColliderOwner::Hazard(index),
        }
    }

    /// A wide lethal slab `depth` units under `floor_y`.
    pub fn void_below(floor_y: f32, depth: f32, around: Vec3, extent: f32) -> Self {
        Self {
            center: Vec3::new(around.x, floor_y - depth - 0.5, around.z),
            half_extents: Vec3::new(extent, 0.5, extent),
            rotation: Quat::IDENTITY,
            tag: SurfaceTag::None,
            lethal: true,
            layer: LAYER_VOID,
            owner: ColliderOwner::Void,
        }
    }

    pub fn top(&self) -> f32 {
        self.center.y + self.half_extents.y
    }

    pub fn bottom(&self) -> f32 {
        self.center.y - self.half_extents.y
    }

    fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.center)
    }

    fn to_world(&self, local: Vec3) -> Vec3 {
        self.center + self.rotation * local
    }

    fn footprint_contains(&self, point: Vec3, margin: f32) -> bool {
        let local = self.to_local(point);
        local.x.abs() <= self.half_extents.x + margin && local.z.abs() <= self.half_extents.z + margin
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyShape {
    pub radius: f32,
    pub height: f32,
}

impl BodyShape {
    /// A body with no radius or no height cannot be moved by the controller.
    pub fn is_usable(&self) -> bool {
        self.radius > 0.0 && self.height > 0.0
    }
}

impl Default for BodyShape {
    fn default() -> Self {
        Self {
            radius: 0.5,
            height: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Contact {
    pub owner: ColliderOwner,
    pub tag: SurfaceTag,
    pub lethal: bool,
    /// Center of the touched collider.
    pub origin: Vec3,
    /// Feet position of the body at the moment of contact.
    pub point: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MoveResult {
    pub position: Vec3,
    pub grounded: bool,
    pub ceiling: bool,
    pub contacts: Vec<Contact>,
}

#[derive(Resource, Clone, Debug, Default)]
pub struct CollisionWorld {
    pub colliders: Vec<PlatformCollider>,
}

impl CollisionWorld {
    /// Colliders for a generated level plus a lethal void. An empty level still gets a void
    /// under `start`.
    pub fn from_level(
        platforms: &[PlatformSpec],
        hazards: &[HazardSpec],
        start: Vec3,
        bounce_force: f32,
        void_depth: f32,
    ) -> Self {
        let mut colliders: Vec<PlatformCollider> = platforms
            .iter()
            .map(|p| PlatformCollider::from_platform(p, bounce_force))
            .collect();
        colliders.extend(
            hazards
                .iter()
                .enumerate()
                .map(|(i, h)| PlatformCollider::from_hazard(i, h)),
        );

        if platforms.is_empty() {
            colliders.push(PlatformCollider::void_below(start.y, void_depth, start, 100.0));
        } else {
            let lowest = platforms
                .iter()
                .map(|p| p.position.y - p.scale.y * 0.5)
                .fold(f32::INFINITY, f32::min);
            let (min, max) = platforms.iter().fold(
                (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
                |(min, max), p| (min.min(p.position), max.max(p.position)),
            );
            let middle = (min + max) * 0.5;
            let extent = (max - min).max_element() + 100.0;
            colliders.push(PlatformCollider::void_below(lowest, void_depth, middle, extent));
        }
        Self { colliders }
    }

    fn contact(collider: &PlatformCollider, feet: Vec3) -> Contact {
        Contact {
            owner: collider.owner,
            tag: collider.tag,
            lethal: collider.lethal,
            origin: collider.center,
            point: feet,
        }
    }

    /// Kinematic move of a vertical body: horizontal push-out first, then landing and ceiling
    /// resolution against top and bottom faces.
    pub fn move_body(&self, feet: Vec3, body: BodyShape, displacement: Vec3) -> MoveResult {
        let mut contacts = Vec::new();
        let mut target = feet + Vec3::new(displacement.x, 0.0, displacement.z);
        let r = body.radius;

        for collider in &self.colliders {
            let overlaps_vertically =
                target.y < collider.top() - SKIN && target.y + body.height > collider.bottom();
            if !overlaps_vertically {
                continue;
            }
            let mut local = collider.to_local(target);
            let hx = collider.half_extents.x + r;
            let hz = collider.half_extents.z + r;
            if local.x.abs() >= hx || local.z.abs() >= hz {
                continue;
            }
            let pen_x = hx - local.x.abs();
            let pen_z = hz - local.z.abs();
            if pen_x < pen_z {
                local.x = hx.copysign(local.x);
            } else {
                local.z = hz.copysign(local.z);
            }
            let pushed = collider.to_world(local);
            target.x = pushed.x;
            target.z = pushed.z;
            contacts.push(Self::contact(collider, target));
        }

        let dy = displacement.y;
        let new_y = target.y + dy;
        let mut landing: Option<&PlatformCollider> = None;
        let mut ceiling: Option<&PlatformCollider> = None;

        for collider in &self.colliders {
            if !collider.footprint_contains(target, r) {
                continue;
            }
            let top = collider.top();
            let bottom = collider.bottom();
            if dy <= 0.0 && target.y >= top - SKIN && new_y <= top {
                if landing.map_or(true, |best| top > best.top()) {
                    landing = Some(collider);
                }
            } else if dy > 0.0
                && target.y + body.height <= bottom + SKIN
                && new_y + body.height >= bottom
                && ceiling.map_or(true, |best| bottom < best.bottom())
            {
                ceiling = Some(collider);
            }
        }

        let mut result = MoveResult {
            position: Vec3::new(target.x, new_y, target.z),
            ..Default::default()
        };
        if let Some(collider) = landing {
            result.position.y = collider.top();
            result.grounded = true;
            contacts.push(Self::contact(collider, result.position));
        } else if let Some(collider) = ceiling {
            result.position.y = collider.bottom() - body.height;
            result.ceiling = true;
            contacts.push(Self::contact(collider, result.position));
        }
        result.contacts = contacts;
        result
    }
}

impl GroundProbe for CollisionWorld {
    fn query(&self, origin: Vec3, radius: f32, max_distance: f32, mask: u32) -> Option<ProbeHit> {
        self.colliders
            .iter()
            .filter(|c| c.layer & mask != 0 && c.footprint_contains(origin, radius))
            .filter_map(|c| {
                let distance = origin.y - radius - c.top();
                if distance >= -SKIN && distance <= max_distance {
                    Some(ProbeHit {
                        point: Vec3::new(origin.x, c.top(), origin.z),
                        distance: distance.max(0.0),
                        tag: c.tag,
                    })
                } else {
                    None
                }
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl SurfaceQuery for CollisionWorld {
    fn surface_at(&self, point: Vec3) -> SurfaceTag {
        self.colliders
            .iter()
            .filter(|c| c.footprint_contains(point, 0.0) && (point.y - c.top()).abs() <= SKIN)
            .max_by(|a, b| a.top().total_cmp(&b.top()))
            .map(|c| c.tag)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PlatformKind;

    fn platform(position: Vec3, kind: PlatformKind, index: usize) -> PlatformSpec {
        PlatformSpec {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(4.0, 1.0, 4.0),
            kind,
            index,
        }
    }

    fn world() -> CollisionWorld {
        CollisionWorld::from_level(
            &[
                platform(Vec3::ZERO, PlatformKind::Normal, 0),
                platform(Vec3::new(0.0, 0.0, 10.0), PlatformKind::Trampoline, 1),
                platform(Vec3::new(0.0, 5.0, 20.0), PlatformKind::Goal, 2),
            ],
            &[],
            Vec3::ZERO,
            25.0,
            20.0,
        )
    }

    #[test]
    fn body_lands_on_top_face() {
        let out = world().move_body(Vec3::new(0.0, 1.0, 0.0), BodyShape::default(), Vec3::new(0.0, -2.0, 0.0));
        assert!(out.grounded);
        assert_eq!(out.position.y, 0.5);
        assert_eq!(out.contacts[0].owner, ColliderOwner::Platform(0));
    }

    #[test]
    fn body_resting_on_top_stays_grounded() {
        let out = world().move_body(Vec3::new(1.0, 0.5, 0.0), BodyShape::default(), Vec3::new(0.0, -0.1, 0.0));
        assert!(out.grounded);
        assert_eq!(out.position.y, 0.5);
    }

    #[test]
    fn side_contact_pushes_body_out() {
        let out = world().move_body(
            Vec3::new(-4.0, -0.5, 0.0),
            BodyShape::default(),
            Vec3::new(2.0, 0.0, 0.0),
        );
        assert!((out.position.x - (-2.5)).abs() < 1e-5);
        assert!(!out.contacts.is_empty());
    }

    #[test]
    fn head_bump_sets_ceiling() {
        let out = world().move_body(
            Vec3::new(0.0, -3.0, 0.0),
            BodyShape::default(),
            Vec3::new(0.0, 1.0, 0.0),
        );
        assert!(out.ceiling);
        assert_eq!(out.position.y, -2.5);
    }

    #[test]
    fn walking_off_the_edge_falls() {
        let out = world().move_body(
            Vec3::new(0.0, 0.5, 3.0),
            BodyShape::default(),
            Vec3::new(0.0, -0.1, 0.0),
        );
        assert!(!out.grounded);
        assert!(out.position.y < 0.5);
    }

    #[test]
    fn probe_reports_nearest_top_and_tag() {
        let w = world();
        let hit = w
            .query(Vec3::new(0.0, 0.9, 10.0), 0.0, 0.5, u32::MAX)
            .expect("trampoline below");
        assert_eq!(hit.tag, SurfaceTag::Trampoline(25.0));
        assert!((hit.distance - 0.4).abs() < 1e-5);
        assert!(w.query(Vec3::new(0.0, 3.0, 10.0), 0.0, 0.5, u32::MAX).is_none());
        assert!(w
            .query(Vec3::new(0.0, 0.9, 10.0), 0.0, 0.5, LAYER_HAZARD)
            .is_none());
    }

    #[test]
    fn surface_tag_lookup() {
        let w = world();
        assert_eq!(w.surface_at(Vec3::new(0.0, 5.5, 20.0)), SurfaceTag::Goal);
        assert_eq!(w.surface_at(Vec3::new(0.0, 0.5, 0.0)), SurfaceTag::None);
        assert_eq!(w.surface_at(Vec3::new(50.0, 0.5, 0.0)), SurfaceTag::None);
    }

    #[test]
    fn rotated_footprint_respects_yaw() {
        let mut spec = platform(Vec3::ZERO, PlatformKind::Normal, 0);
        spec.scale = Vec3::new(1.0, 1.0, 8.0);
        spec.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let collider = PlatformCollider::from_platform(&spec, 0.0);
        assert!(collider.footprint_contains(Vec3::new(3.5, 0.0, 0.0), 0.0));
        assert!(!collider.footprint_contains(Vec3::new(0.0, 0.0, 3.5), 0.0));
    }

    #[test]
    fn void_sits_under_the_lowest_platform() {
        let w = world();
        let void = w
            .colliders
            .iter()
            .find(|c| c.owner == ColliderOwner::Void)
            .expect("void collider");
        assert!(void.lethal);
        assert_eq!(void.top(), -0.5 - 20.0);
        assert!(void.footprint_contains(Vec3::new(0.0, 0.0, 20.0), 0.0));
    }

    #[test]
    fn empty_level_still_has_a_void_under_start() {
        let start = Vec3::new(3.0, 10.0, -2.0);
        let w = CollisionWorld::from_level(&[], &[], start, 25.0, 20.0);
        assert_eq!(w.colliders.len(), 1);
        let void = w.colliders[0];
        assert_eq!(void.owner, ColliderOwner::Void);
        assert_eq!(void.top(), 10.0 - 20.0);

        let out = w.move_body(Vec3::new(3.0, -9.5, -2.0), BodyShape::default(), Vec3::new(0.0, -1.0, 0.0));
        assert!(out.grounded);
        assert!(out.contacts.iter().any(|c| c.lethal && c.owner == ColliderOwner::Void));
    }

    #[test]
    fn body_needs_radius_and_height() {
        assert!(BodyShape::default().is_usable());
        assert!(!BodyShape { radius: 0.0, height: 2.0 }.is_usable());
        assert!(!BodyShape { radius: 0.5, height: 0.0 }.is_usable());
    }
}
