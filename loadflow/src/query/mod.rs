//! Ownership-scoped record queries.
//!
//! Listing never reaches the store until the actor's ownership is resolved,
//! and an actor missing the link its role needs gets nothing rather than an
//! unfiltered query.

mod scope;

use tracing::debug;
use uuid::Uuid;

use crate::auth::{guard, Action, AuthorizationContext, ResolvedActor, RESOURCE_LOADINGS};
use crate::core::LoadingRecord;
use crate::errors::{LoadflowError, Result};
use crate::store::RecordStore;

pub use scope::VisibilityScope;

/// Outcome of a non-blocking listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// Ownership is still being resolved; no query was issued.
    Pending,
    /// Visible records, newest first.
    Ready(Vec<LoadingRecord>),
}

impl Listing {
    /// Returns true while pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The records, if ready.
    #[must_use]
    pub fn into_records(self) -> Option<Vec<LoadingRecord>> {
        match self {
            Self::Pending => None,
            Self::Ready(records) => Some(records),
        }
    }
}

/// Visibility-scoped reads over a [`RecordStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordQuery;

impl RecordQuery {
    /// Lists every record the session may see, waiting for ownership.
    pub async fn list_visible(ctx: &AuthorizationContext, store: &dyn RecordStore) -> Result<Vec<LoadingRecord>> {
        let actor = ctx.resolved_actor().await?;
        Self::ensure_can_read(ctx, &actor).await?;
        Self::list_for(&actor, store).await
    }

    /// Like [`list_visible`](Self::list_visible) but returns
    /// [`Listing::Pending`] instead of waiting.
    pub async fn try_list_visible(ctx: &AuthorizationContext, store: &dyn RecordStore) -> Result<Listing> {
        let Some(actor) = ctx.try_resolved_actor() else {
            debug!(actor_id = %ctx.actor().id, "Ownership pending, listing deferred");
            return Ok(Listing::Pending);
        };
        Self::ensure_can_read(ctx, &actor).await?;
        Ok(Listing::Ready(Self::list_for(&actor, store).await?))
    }

    /// Reads one record the session may see.
    ///
    /// A record that exists but is not visible is reported as not found.
    pub async fn get_visible(ctx: &AuthorizationContext, store: &dyn RecordStore, id: Uuid) -> Result<LoadingRecord> {
        let actor = ctx.resolved_actor().await?;
        Self::ensure_can_read(ctx, &actor).await?;
        let record = store
            .get(id)
            .await
            .map_err(|err| LoadflowError::from_store(Some(id), err))?;
        match record {
            Some(record) if guard::can_view_record(&actor, &record) => Ok(record),
            _ => Err(LoadflowError::record_not_found(id)),
        }
    }

    async fn ensure_can_read(ctx: &AuthorizationContext, actor: &ResolvedActor) -> Result<()> {
        if ctx.can_access_resource(RESOURCE_LOADINGS, Action::Read).await? {
            Ok(())
        } else {
            Err(LoadflowError::authorization(
                actor.id(),
                format!("no read access to {RESOURCE_LOADINGS}"),
            ))
        }
    }

    async fn list_for(actor: &ResolvedActor, store: &dyn RecordStore) -> Result<Vec<LoadingRecord>> {
        let scope = VisibilityScope::for_actor(actor);
        let Some(filter) = scope.filter() else {
            debug!(actor_id = %actor.id(), "Actor has no visible scope");
            return Ok(Vec::new());
        };
        let records = store
            .list(filter)
            .await
            .map_err(|err| LoadflowError::from_store(None, err))?;
        Ok(records
            .into_iter()
            .filter(|record| guard::can_view_record(actor, record))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::store::InMemoryRecordStore;
    use crate::testing::fixtures;

    async fn seeded() -> (InMemoryRecordStore, Vec<LoadingRecord>) {
        let store = InMemoryRecordStore::new();
        let records: Vec<_> = (1..=3).map(fixtures::record_at).collect();
        for record in &records {
            store.insert(record).await.unwrap();
        }
        (store, records)
    }

    #[tokio::test]
    async fn test_staff_list_everything() {
        let (store, _) = seeded().await;
        let ctx = fixtures::role_context(Role::Logistica);
        let records = RecordQuery::list_visible(&ctx, &store).await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_warehouse_lists_own_records_only() {
        let (store, records) = seeded().await;
        let ctx = fixtures::warehouse_context(&records[1]);
        let visible = RecordQuery::list_visible(&ctx, &store).await.unwrap();
        assert_eq!(visible, vec![records[1].clone()]);
    }

    #[tokio::test]
    async fn test_customer_lists_own_records_only() {
        let (store, records) = seeded().await;
        let ctx = fixtures::customer_context(records[2].cliente_id());
        let visible = RecordQuery::list_visible(&ctx, &store).await.unwrap();
        assert_eq!(visible, vec![records[2].clone()]);
    }

    #[tokio::test]
    async fn test_unlinked_customer_sees_nothing_without_query() {
        let (store, _) = seeded().await;
        let ctx = fixtures::role_context(Role::Cliente);
        let visible = RecordQuery::list_visible(&ctx, &store).await.unwrap();
        assert!(visible.is_empty());
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_comercial_lacks_read_permission() {
        let (store, _) = seeded().await;
        let ctx = fixtures::role_context(Role::Comercial);
        let err = RecordQuery::list_visible(&ctx, &store).await.unwrap_err();
        assert_eq!(err.code(), "LOADING-AUTHZ");
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_try_list_is_pending_before_resolution() {
        let (store, records) = seeded().await;
        let ctx = fixtures::warehouse_context(&records[0]);

        let listing = RecordQuery::try_list_visible(&ctx, &store).await.unwrap();
        assert!(listing.is_pending());
        assert_eq!(store.list_calls(), 0);

        ctx.resolved_actor().await.unwrap();
        let listing = RecordQuery::try_list_visible(&ctx, &store).await.unwrap();
        assert_eq!(listing.into_records(), Some(vec![records[0].clone()]));
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_hides_foreign_records() {
        let (store, records) = seeded().await;
        let ctx = fixtures::customer_context(records[0].cliente_id());

        let own = RecordQuery::get_visible(&ctx, &store, records[0].id()).await.unwrap();
        assert_eq!(own.id(), records[0].id());

        let foreign = RecordQuery::get_visible(&ctx, &store, records[1].id()).await.unwrap_err();
        let missing = RecordQuery::get_visible(&ctx, &store, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(foreign.code(), "LOADING-NOT-FOUND");
        assert_eq!(missing.code(), foreign.code());
    }
}
