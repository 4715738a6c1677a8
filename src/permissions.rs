//! Ownership permissions for jobs and preflight results
//!
//! Pure predicates, no I/O. Read access is open; writes need an
//! authenticated actor; deletes need the owner or a superuser.

use crate::models::{Job, PreflightResult, UserId};
use strum::{Display, EnumString};

/// Request method the permission is evaluated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Options,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Methods that never modify state
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }
}

/// Whoever is making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actor {
    /// `None` for anonymous requests
    pub id: Option<UserId>,
    pub is_superuser: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: UserId) -> Self {
        Self {
            id: Some(id),
            is_superuser: false,
        }
    }

    pub fn superuser(id: UserId) -> Self {
        Self {
            id: Some(id),
            is_superuser: true,
        }
    }

    #[inline]
    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }
}

/// A resource with an (optional) owning user
pub trait Owned {
    fn owner(&self) -> Option<UserId>;
}

impl Owned for Job {
    fn owner(&self) -> Option<UserId> {
        self.user
    }
}

impl Owned for PreflightResult {
    fn owner(&self) -> Option<UserId> {
        self.user
    }
}

/// Object-level permission check.
pub trait Permission {
    fn has_object_permission(&self, actor: &Actor, method: Method, obj: &dyn Owned) -> bool;
}

/// Safe methods for everyone, everything else for authenticated actors.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsAuthenticatedOrReadOnly;

impl Permission for IsAuthenticatedOrReadOnly {
    fn has_object_permission(&self, actor: &Actor, method: Method, _obj: &dyn Owned) -> bool {
        method.is_safe() || actor.is_authenticated()
    }
}

/// [`IsAuthenticatedOrReadOnly`], except DELETE is limited to the owner or a superuser.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyOwnerOrSuperuserCanDelete;

impl Permission for OnlyOwnerOrSuperuserCanDelete {
    fn has_object_permission(&self, actor: &Actor, method: Method, obj: &dyn Owned) -> bool {
        if method == Method::Delete {
            return allow_delete(actor, obj);
        }
        IsAuthenticatedOrReadOnly.has_object_permission(actor, method, obj)
    }
}

/// Superusers may delete anything; other actors only what they own.
pub fn allow_delete(actor: &Actor, resource: &dyn Owned) -> bool {
    actor.is_superuser || (actor.is_authenticated() && actor.id == resource.owner())
}
