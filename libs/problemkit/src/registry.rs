//! Priority-ordered mapper registry and resolver
//!
//! Registrations are split once into primary and fallback lists, each sorted by descending
//! priority with a stable sort so equal priorities keep registration order. Both lists are
//! immutable afterwards; resolution takes no locks.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::fault::Fault;
use crate::mapper::{Mapped, ProblemMapper};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no fallback mapper registered: at least one registration must be marked as fallback")]
    NoFallback,
}

/// A mapper together with its ordering metadata.
#[derive(Clone)]
pub struct MapperRegistration {
    mapper: Arc<dyn ProblemMapper>,
    priority: i32,
    is_fallback: bool,
}

impl MapperRegistration {
    pub fn new(mapper: impl ProblemMapper + 'static, priority: i32, is_fallback: bool) -> Self {
        Self::from_arc(Arc::new(mapper), priority, is_fallback)
    }

    #[must_use]
    pub fn from_arc(mapper: Arc<dyn ProblemMapper>, priority: i32, is_fallback: bool) -> Self {
        Self {
            mapper,
            priority,
            is_fallback,
        }
    }

    pub fn primary(mapper: impl ProblemMapper + 'static, priority: i32) -> Self {
        Self::new(mapper, priority, false)
    }

    pub fn fallback(mapper: impl ProblemMapper + 'static, priority: i32) -> Self {
        Self::new(mapper, priority, true)
    }

    #[must_use]
    pub fn mapper(&self) -> &dyn ProblemMapper {
        self.mapper.as_ref()
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }
}

impl fmt::Debug for MapperRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperRegistration")
            .field("mapper", &self.mapper.name())
            .field("priority", &self.priority)
            .field("is_fallback", &self.is_fallback)
            .finish()
    }
}

pub struct MapperRegistry {
    primary: Vec<MapperRegistration>,
    fallback: Vec<MapperRegistration>,
    last_resort: Arc<dyn ProblemMapper>,
}

impl MapperRegistry {
    /// Builds the ordered lists.
    ///
    /// # Errors
    /// Returns [`RegistryError::NoFallback`] when no registration is marked as fallback.
    pub fn new(
        registrations: impl IntoIterator<Item = MapperRegistration>,
    ) -> Result<Self, RegistryError> {
        let (mut fallback, mut primary): (Vec<_>, Vec<_>) = registrations
            .into_iter()
            .partition(MapperRegistration::is_fallback);

        // `sort_by_key` is stable
        primary.sort_by_key(|r| Reverse(r.priority));
        fallback.sort_by_key(|r| Reverse(r.priority));

        let last_resort = fallback
            .last()
            .map(|r| Arc::clone(&r.mapper))
            .ok_or(RegistryError::NoFallback)?;

        tracing::debug!(
            primary = ?primary.iter().map(|r| r.mapper.name()).collect::<Vec<_>>(),
            fallback = ?fallback.iter().map(|r| r.mapper.name()).collect::<Vec<_>>(),
            "mapper registry built"
        );

        Ok(Self {
            primary,
            fallback,
            last_resort,
        })
    }

    /// First matching primary mapper, else first matching fallback mapper.
    #[must_use]
    pub fn try_resolve(&self, fault: &Fault) -> Option<&dyn ProblemMapper> {
        self.primary
            .iter()
            .chain(&self.fallback)
            .map(MapperRegistration::mapper)
            .find(|m| m.can_handle(fault))
    }

    /// Like [`Self::try_resolve`], but never fails: when no fallback accepts the fault the
    /// lowest-priority fallback is used and the misconfiguration is logged.
    #[must_use]
    pub fn resolve(&self, fault: &Fault) -> &dyn ProblemMapper {
        if let Some(mapper) = self.try_resolve(fault) {
            tracing::debug!(mapper = mapper.name(), kind = fault.kind_name(), "mapper resolved");
            return mapper;
        }
        tracing::error!(
            kind = fault.kind_name(),
            mapper = self.last_resort.name(),
            "no registered mapper accepts this fault; using lowest-priority fallback"
        );
        self.last_resort.as_ref()
    }

    /// Resolves and maps in one step.
    #[must_use]
    pub fn map_fault(&self, ctx: &RequestContext, fault: &Fault) -> Mapped {
        self.resolve(fault).map(ctx, fault)
    }

    #[must_use]
    pub fn primary(&self) -> &[MapperRegistration] {
        &self.primary
    }

    #[must_use]
    pub fn fallback(&self) -> &[MapperRegistration] {
        &self.fallback
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}
