//! Kinematic 2D collision for player bodies.
//!
//! Players are axis-aligned boxes moved by explicit displacements. Static
//! solids block them; players never block each other. A move is resolved
//! one axis at a time (x, then y), so sliding along a wall keeps the
//! component parallel to it.

use std::collections::HashMap;

use glam::Vec2;

/// Gap tolerance when deciding whether a box is on the near side of a solid.
const CONTACT_EPSILON: f32 = 1e-4;

/// Axis-aligned bounding box. Touching edges do not count as overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    /// Builds a box from two corners in any order.
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_center(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }
}

/// Handle to a body in a [`PhysicsWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId(u64);

#[derive(Debug)]
struct Body {
    center: Vec2,
    half_extents: Vec2,
}

impl Body {
    fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, self.half_extents)
    }
}

#[derive(Debug)]
struct Solid {
    name: String,
    bounds: Aabb,
    enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Player bodies plus the static level geometry.
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    bodies: HashMap<BodyId, Body>,
    solids: Vec<Solid>,
    next_body: u64,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_body(&mut self, center: Vec2, half_extents: Vec2) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        self.bodies.insert(
            id,
            Body {
                center,
                half_extents: half_extents.abs(),
            },
        );
        id
    }

    pub fn remove_body(&mut self, id: BodyId) -> bool {
        self.bodies.remove(&id).is_some()
    }

    pub fn body_center(&self, id: BodyId) -> Option<Vec2> {
        self.bodies.get(&id).map(|b| b.center)
    }

    pub fn body_bounds(&self, id: BodyId) -> Option<Aabb> {
        self.bodies.get(&id).map(Body::bounds)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Adds an enabled solid. Names need not be unique; toggling by name
    /// affects every solid that carries it.
    pub fn add_solid(&mut self, name: impl Into<String>, bounds: Aabb) {
        self.solids.push(Solid {
            name: name.into(),
            bounds,
            enabled: true,
        });
    }

    /// Enables or disables every solid called `name`. Returns how many
    /// matched.
    pub fn set_solid_enabled(&mut self, name: &str, enabled: bool) -> usize {
        let mut matched = 0;
        for solid in self.solids.iter_mut().filter(|s| s.name == name) {
            solid.enabled = enabled;
            matched += 1;
        }
        matched
    }

    /// Whether the first solid called `name` currently blocks. `None` if
    /// there is no such solid.
    pub fn solid_enabled(&self, name: &str) -> Option<bool> {
        self.solids.iter().find(|s| s.name == name).map(|s| s.enabled)
    }

    /// Moves a body by `displacement`, stopping at the first enabled solid
    /// on each axis. Returns the new center, or `None` for an unknown body.
    ///
    /// A solid the body already overlaps does not block it, so a body that
    /// somehow ended up inside geometry can always walk out.
    pub fn move_and_collide(&mut self, id: BodyId, displacement: Vec2) -> Option<Vec2> {
        let start = self.bodies.get(&id)?.bounds();

        let dx = self.sweep(start, displacement.x, Axis::X);
        let after_x = start.translated(Vec2::new(dx, 0.0));
        let dy = self.sweep(after_x, displacement.y, Axis::Y);

        let body = self.bodies.get_mut(&id)?;
        body.center += Vec2::new(dx, dy);
        Some(body.center)
    }

    /// How far `bounds` may travel by `delta` along `axis` before touching
    /// an enabled solid.
    fn sweep(&self, bounds: Aabb, delta: f32, axis: Axis) -> f32 {
        if delta == 0.0 {
            return 0.0;
        }
        let (along, across) = match axis {
            Axis::X => (0, 1),
            Axis::Y => (1, 0),
        };

        let mut allowed = delta;
        for solid in self.solids.iter().filter(|s| s.enabled) {
            let s = solid.bounds;
            // No overlap on the other axis: the solid is not in the path.
            if bounds.min[across] >= s.max[across] || bounds.max[across] <= s.min[across] {
                continue;
            }
            if delta > 0.0 && bounds.max[along] <= s.min[along] + CONTACT_EPSILON {
                let gap = (s.min[along] - bounds.max[along]).max(0.0);
                allowed = allowed.min(gap);
            } else if delta < 0.0 && bounds.min[along] >= s.max[along] - CONTACT_EPSILON {
                let gap = (s.max[along] - bounds.min[along]).min(0.0);
                allowed = allowed.max(gap);
            }
        }
        allowed
    }
}
