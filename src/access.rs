use crate::error::CoreError;
use crate::models::{News, User};
use crate::repository::Repository;

/// Visibility & Ownership Engine
///
/// The single authorization boundary for news records. Every read path surfaces
/// content through `can_view`, and every mutation path passes `can_mutate` (or an
/// owner-scoped repository query, which encodes the same rule) before any repository
/// write. The rules are pure functions of the viewer and the record; no ambient state.

/// can_view
///
/// A public record is readable by anyone, including anonymous viewers. A private one
/// is readable only by its owner.
pub fn can_view(viewer: Option<&User>, post: &News) -> bool {
    !post.is_private || viewer.is_some_and(|u| u.id == post.user_id)
}

/// can_mutate
///
/// Only the owner may edit or delete, and there must be a viewer at all. The privacy
/// flag plays no part in mutation rights.
pub fn can_mutate(viewer: Option<&User>, post: &News) -> bool {
    viewer.is_some_and(|u| u.id == post.user_id)
}

/// ensure_can_mutate
///
/// The checked form callers use ahead of a mutation when they already hold the record.
pub fn ensure_can_mutate(viewer: Option<&User>, post: &News) -> Result<(), CoreError> {
    if can_mutate(viewer, post) {
        Ok(())
    } else {
        tracing::debug!(post = %post.id, "mutation denied: viewer is not the owner");
        Err(CoreError::Unauthorized)
    }
}

/// list_visible
///
/// Everything the viewer may read, in the insertion order of the underlying store
/// (stable, never re-sorted). Each call takes a fresh consistent snapshot; re-querying
/// is safe and reflects the store at that moment, not a live cursor. The visibility
/// filter is pushed into the store, and `can_view` is re-applied here so this engine
/// stays the authoritative gate even over a permissive store implementation.
pub async fn list_visible(
    repo: &dyn Repository,
    viewer: Option<&User>,
) -> Result<Vec<News>, CoreError> {
    let mut items = repo.list_news_visible_to(viewer.map(|u| u.id)).await?;
    items.retain(|post| can_view(viewer, post));
    Ok(items)
}
