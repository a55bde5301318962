//! Weak, re-resolvable references between simulation objects.
//!
//! A `WeakRef` never owns or pins its target. It holds either a resolved
//! entity handle or only the target's persistent identifier, and is resolved
//! on demand against an [`EntityLookup`]. Failed resolutions are counted; once
//! the grace period runs out the reference is cleared for good.

use crate::index::EntityIndex;
use bevy_ecs::prelude::*;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;
use uuid::Uuid;

/// Consecutive failed resolutions tolerated before a reference is forgotten.
pub const DEFAULT_GRACE_TICKS: u32 = 30;

/// Source of live objects a `WeakRef` resolves against.
pub trait EntityLookup<T> {
    /// Whether `entity` still exists and is a `T`.
    fn is_live(&self, entity: Entity) -> bool;

    /// Find a live `T` carrying `id`.
    fn find(&self, id: Uuid) -> Option<Entity>;
}

/// Lookup backed by an ECS world and its identifier index.
pub struct WorldLookup<'w> {
    world: &'w World,
}

impl<'w> WorldLookup<'w> {
    pub fn new(world: &'w World) -> Self {
        Self { world }
    }
}

impl<T: Component> EntityLookup<T> for WorldLookup<'_> {
    fn is_live(&self, entity: Entity) -> bool {
        self.world.get::<T>(entity).is_some()
    }

    fn find(&self, id: Uuid) -> Option<Entity> {
        let entity = self.world.get_resource::<EntityIndex>()?.get(id)?;
        <Self as EntityLookup<T>>::is_live(self, entity).then_some(entity)
    }
}

/// Outcome of a single resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The target is loaded and live.
    Live(Entity),
    /// The target could not be found, but the grace period has not run out.
    Pending,
    /// The reference has been permanently cleared.
    Gone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Resolved { entity: Entity, id: Uuid },
    Detached(Uuid),
    Cleared,
}

/// Identifier-based link to a `T` that tolerates the target being absent.
pub struct WeakRef<T> {
    link: Link,
    misses: u32,
    grace: u32,
    _target: PhantomData<fn() -> T>,
}

impl<T> WeakRef<T> {
    /// Reference to an object that is known to be live right now.
    pub fn resolved(entity: Entity, id: Uuid) -> Self {
        Self::with_link(Link::Resolved { entity, id })
    }

    /// Reference that only knows the identifier, e.g. after loading a save.
    pub fn from_id(id: Uuid) -> Self {
        Self::with_link(Link::Detached(id))
    }

    fn with_link(link: Link) -> Self {
        Self {
            link,
            misses: 0,
            grace: DEFAULT_GRACE_TICKS,
            _target: PhantomData,
        }
    }

    /// Override the number of failed resolutions tolerated.
    pub fn with_grace(mut self, grace: u32) -> Self {
        self.grace = grace;
        self
    }

    /// Persistent identifier of the target, `None` once cleared.
    pub fn id(&self) -> Option<Uuid> {
        match self.link {
            Link::Resolved { id, .. } | Link::Detached(id) => Some(id),
            Link::Cleared => None,
        }
    }

    /// Whether this reference names the object with `id`.
    pub fn refers_to(&self, id: Uuid) -> bool {
        self.id() == Some(id)
    }

    pub fn is_cleared(&self) -> bool {
        self.link == Link::Cleared
    }

    /// Cached handle, without checking liveness.
    pub fn cached(&self) -> Option<Entity> {
        match self.link {
            Link::Resolved { entity, .. } => Some(entity),
            Link::Detached(_) | Link::Cleared => None,
        }
    }

    /// Failed resolutions since the last success.
    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// Resolve the reference, upgrading or forgetting it as needed.
    pub fn resolve(&mut self, lookup: &impl EntityLookup<T>) -> Resolution {
        let id = match self.link {
            Link::Cleared => return Resolution::Gone,
            Link::Resolved { entity, id } => {
                if lookup.is_live(entity) {
                    self.misses = 0;
                    return Resolution::Live(entity);
                }
                self.link = Link::Detached(id);
                id
            }
            Link::Detached(id) => id,
        };

        if let Some(entity) = lookup.find(id) {
            self.link = Link::Resolved { entity, id };
            self.misses = 0;
            return Resolution::Live(entity);
        }

        self.misses += 1;
        if self.misses >= self.grace {
            debug!(%id, misses = self.misses, "weak reference expired");
            self.link = Link::Cleared;
            return Resolution::Gone;
        }
        Resolution::Pending
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link,
            misses: self.misses,
            grace: self.grace,
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("link", &self.link)
            .field("misses", &self.misses)
            .field("grace", &self.grace)
            .finish()
    }
}
