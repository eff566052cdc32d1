//! Remote accessor boundary
//!
//! The engine never talks to a transport directly. Integrators supply a
//! [`RemoteAccessor`] per entity kind, either as a type implementing the trait
//! or as a pair of async closures via [`accessor_fn`].

use crate::entity::{EntityId, SyncEntity};
use crate::error::AccessError;
use crate::patch::Patch;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// Fetch/update contract for one entity kind
#[async_trait]
pub trait RemoteAccessor<E: SyncEntity>: Send + Sync + 'static {
    /// Load the full record
    ///
    /// # Errors
    /// `AccessError::NotFound` when the id does not exist, any other variant
    /// for transport or server failures.
    async fn fetch(&self, id: &EntityId) -> Result<E, AccessError>;

    /// Push a partial update
    ///
    /// Returns the authoritative subset of fields that changed, possibly
    /// normalized or extended with server-derived values.
    ///
    /// # Errors
    /// Any failure; the engine decides how to recover.
    async fn update(&self, id: &EntityId, patch: Patch) -> Result<Patch, AccessError>;
}

#[async_trait]
impl<E, A> RemoteAccessor<E> for Arc<A>
where
    E: SyncEntity,
    A: RemoteAccessor<E> + ?Sized,
{
    async fn fetch(&self, id: &EntityId) -> Result<E, AccessError> {
        (**self).fetch(id).await
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<Patch, AccessError> {
        (**self).update(id, patch).await
    }
}

/// Accessor assembled from a fetch closure and an update closure
pub struct FnAccessor<F, U> {
    fetch: F,
    update: U,
}

impl<F, U> fmt::Debug for FnAccessor<F, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAccessor").finish_non_exhaustive()
    }
}

/// Build an accessor from two async functions
///
/// # Example
///
/// ```rust,ignore
/// let accessor = accessor_fn(
///     move |id| Box::pin(api.clone().get_course(id)),
///     move |id, patch| Box::pin(api.clone().put_course(id, patch)),
/// );
/// ```
pub fn accessor_fn<E, F, U>(fetch: F, update: U) -> FnAccessor<F, U>
where
    E: SyncEntity,
    F: Fn(EntityId) -> BoxFuture<'static, Result<E, AccessError>> + Send + Sync + 'static,
    U: Fn(EntityId, Patch) -> BoxFuture<'static, Result<Patch, AccessError>> + Send + Sync + 'static,
{
    FnAccessor { fetch, update }
}

#[async_trait]
impl<E, F, U> RemoteAccessor<E> for FnAccessor<F, U>
where
    E: SyncEntity,
    F: Fn(EntityId) -> BoxFuture<'static, Result<E, AccessError>> + Send + Sync + 'static,
    U: Fn(EntityId, Patch) -> BoxFuture<'static, Result<Patch, AccessError>> + Send + Sync + 'static,
{
    async fn fetch(&self, id: &EntityId) -> Result<E, AccessError> {
        (self.fetch)(id.clone()).await
    }

    async fn update(&self, id: &EntityId, patch: Patch) -> Result<Patch, AccessError> {
        (self.update)(id.clone(), patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: EntityId,
        label: String,
    }

    impl SyncEntity for Tag {
        const KIND: &'static str = "tag";

        fn id(&self) -> &EntityId {
            &self.id
        }
    }

    #[tokio::test]
    async fn fn_accessor_forwards() {
        let accessor = accessor_fn(
            |id: EntityId| -> BoxFuture<'static, Result<Tag, AccessError>> {
                Box::pin(async move {
                    Ok(Tag {
                        label: format!("label-{id}"),
                        id,
                    })
                })
            },
            |_id: EntityId, patch: Patch| -> BoxFuture<'static, Result<Patch, AccessError>> {
                Box::pin(async move { Ok(patch) })
            },
        );

        let tag: Tag = accessor.fetch(&EntityId::new("t1")).await.unwrap();
        assert_eq!(tag.label, "label-t1");

        let echoed = RemoteAccessor::<Tag>::update(
            &accessor,
            &EntityId::new("t1"),
            Patch::new().set("label", "x"),
        )
        .await
        .unwrap();
        assert_eq!(echoed, Patch::new().set("label", "x"));
    }

    #[tokio::test]
    async fn arc_accessor_forwards() {
        let accessor = Arc::new(accessor_fn(
            |id: EntityId| -> BoxFuture<'static, Result<Tag, AccessError>> {
                Box::pin(async move { Err(AccessError::not_found("tag", id.as_str())) })
            },
            |_id: EntityId, _patch: Patch| -> BoxFuture<'static, Result<Patch, AccessError>> {
                Box::pin(async move { Err(AccessError::Network("down".to_string())) })
            },
        ));

        let result: Result<Tag, _> = accessor.fetch(&EntityId::new("t9")).await;
        assert!(matches!(result, Err(AccessError::NotFound { .. })));
    }
}
