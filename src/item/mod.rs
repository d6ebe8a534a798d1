/// Item workflows: listings, admin edits and reservations
///
/// Reservation changes go through the store's conditional update, so two
/// concurrent reservations of one item produce exactly one winner and the
/// loser sees `EditConflict`.
use crate::{
    error::{WishlistError, WishlistResult},
    store::{Item, ItemChange, ItemCondition, ItemFilter, ItemId, ItemStore, NewItem, UserId},
};
use std::sync::Arc;

/// Item workflow service
pub struct ItemService {
    items: Arc<dyn ItemStore>,
}

impl ItemService {
    pub fn new(items: Arc<dyn ItemStore>) -> Self {
        Self { items }
    }

    async fn list(&self, filter: ItemFilter) -> WishlistResult<Vec<Item>> {
        self.items.find_items(filter).await.map_err(|e| {
            tracing::error!("Failed to list items ({:?}): {}", filter, e);
            WishlistError::StorageError(e.to_string())
        })
    }

    /// Unreserved items, in listing order
    pub async fn get_wanted(&self) -> WishlistResult<Vec<Item>> {
        self.list(ItemFilter::Wanted).await
    }

    /// Every item, reserved or not
    pub async fn get_all(&self) -> WishlistResult<Vec<Item>> {
        self.list(ItemFilter::All).await
    }

    /// Items reserved by `user`
    pub async fn get_reserved(&self, user: UserId) -> WishlistResult<Vec<Item>> {
        self.list(ItemFilter::ReservedBy(user)).await
    }

    /// Add a new, unreserved item
    pub async fn add_item(&self, name: &str, url: &str, rank: i64) -> WishlistResult<Item> {
        let item = self
            .items
            .create_item(NewItem {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
                rank,
            })
            .await
            .map_err(|e| {
                tracing::error!("Failed to add item {}: {}", name, e);
                WishlistError::AddItemError
            })?;

        tracing::info!("Added item {} ({})", item.name, item.id);
        Ok(item)
    }

    pub async fn delete_item(&self, id: ItemId) -> WishlistResult<()> {
        let removed = self.items.delete_item(id).await.map_err(|e| {
            tracing::error!("Failed to delete item {}: {}", id, e);
            WishlistError::StorageError(e.to_string())
        })?;

        if removed == 0 {
            tracing::debug!("Delete of item {} matched nothing", id);
            return Err(WishlistError::DeleteConflict);
        }

        tracing::info!("Deleted item {}", id);
        Ok(())
    }

    /// Reserve an available item for `user`
    pub async fn reserve_item(&self, id: ItemId, user: UserId) -> WishlistResult<()> {
        self.edit(id, ItemCondition::Available, ItemChange::Reserve(user))
            .await
    }

    /// Release an item; only the user holding the reservation may do this
    pub async fn unreserve_item(&self, id: ItemId, user: UserId) -> WishlistResult<()> {
        self.edit(id, ItemCondition::ReservedBy(user), ItemChange::Unreserve)
            .await
    }

    /// Change an item's rank; reservation state is untouched
    pub async fn edit_item_rank(&self, id: ItemId, rank: i64) -> WishlistResult<()> {
        self.edit(id, ItemCondition::Exists, ItemChange::Rank(rank))
            .await
    }

    async fn edit(
        &self,
        id: ItemId,
        expected: ItemCondition,
        change: ItemChange,
    ) -> WishlistResult<()> {
        let updated = self
            .items
            .update_item_if(id, expected, change)
            .await
            .map_err(|e| {
                tracing::error!("Failed to update item {} ({:?}): {}", id, change, e);
                WishlistError::StorageError(e.to_string())
            })?;

        if updated == 0 {
            tracing::debug!("Item {} not in state {:?}, {:?} refused", id, expected, change);
            return Err(WishlistError::EditConflict);
        }

        tracing::debug!("Item {}: {:?}", id, change);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, UnavailableStore};

    fn service() -> ItemService {
        ItemService::new(Arc::new(MemoryStore::new()))
    }

    fn ids(items: &[Item]) -> Vec<ItemId> {
        items.iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let items = service();
        let a = items.add_item(" Kettle ", "https://example.com/k", 2).await.unwrap();
        let b = items.add_item("Bike", "https://example.com/b", 1).await.unwrap();

        assert_eq!(a.name, "Kettle");
        assert!(!a.is_reserved());
        assert_eq!(ids(&items.get_wanted().await.unwrap()), vec![b.id, a.id]);
        assert_eq!(ids(&items.get_all().await.unwrap()), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_reserve_moves_item_between_listings() {
        let items = service();
        let item = items.add_item("Kettle", "https://example.com/k", 1).await.unwrap();

        items.reserve_item(item.id, 7).await.unwrap();

        assert!(items.get_wanted().await.unwrap().is_empty());
        assert_eq!(ids(&items.get_reserved(7).await.unwrap()), vec![item.id]);
        assert!(items.get_reserved(8).await.unwrap().is_empty());

        let all = items.get_all().await.unwrap();
        assert_eq!(all[0].reserved_by, Some(7));
    }

    #[tokio::test]
    async fn test_reserve_taken_item_conflicts() {
        let items = service();
        let item = items.add_item("Kettle", "https://example.com/k", 1).await.unwrap();

        items.reserve_item(item.id, 7).await.unwrap();
        assert!(matches!(
            items.reserve_item(item.id, 8).await,
            Err(WishlistError::EditConflict)
        ));
        assert!(matches!(
            items.reserve_item(item.id, 7).await,
            Err(WishlistError::EditConflict)
        ));
        assert!(matches!(
            items.reserve_item(404, 7).await,
            Err(WishlistError::EditConflict)
        ));
    }

    #[tokio::test]
    async fn test_only_holder_can_unreserve() {
        let items = service();
        let item = items.add_item("Kettle", "https://example.com/k", 1).await.unwrap();

        assert!(matches!(
            items.unreserve_item(item.id, 7).await,
            Err(WishlistError::EditConflict)
        ));

        items.reserve_item(item.id, 7).await.unwrap();
        assert!(matches!(
            items.unreserve_item(item.id, 8).await,
            Err(WishlistError::EditConflict)
        ));

        items.unreserve_item(item.id, 7).await.unwrap();
        assert_eq!(ids(&items.get_wanted().await.unwrap()), vec![item.id]);
    }

    #[tokio::test]
    async fn test_rank_edit_keeps_reservation() {
        let items = service();
        let a = items.add_item("A", "https://example.com/a", 1).await.unwrap();
        let b = items.add_item("B", "https://example.com/b", 2).await.unwrap();
        items.reserve_item(a.id, 7).await.unwrap();

        items.edit_item_rank(a.id, 5).await.unwrap();

        let all = items.get_all().await.unwrap();
        assert_eq!(ids(&all), vec![b.id, a.id]);
        assert_eq!(all[1].rank, 5);
        assert_eq!(all[1].reserved_by, Some(7));

        assert!(matches!(
            items.edit_item_rank(404, 1).await,
            Err(WishlistError::EditConflict)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let items = service();
        let item = items.add_item("Kettle", "https://example.com/k", 1).await.unwrap();

        items.delete_item(item.id).await.unwrap();
        assert!(items.get_all().await.unwrap().is_empty());
        assert!(matches!(
            items.delete_item(item.id).await,
            Err(WishlistError::DeleteConflict)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reserve_has_one_winner() {
        let items = Arc::new(service());
        let item = items.add_item("Bike", "https://example.com/b", 1).await.unwrap();

        let handles: Vec<_> = (1..=16)
            .map(|user| {
                let items = items.clone();
                tokio::spawn(async move { items.reserve_item(item.id, user).await })
            })
            .collect();

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => winners += 1,
                Err(WishlistError::EditConflict) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn test_store_failures() {
        let items = ItemService::new(Arc::new(UnavailableStore));

        assert!(matches!(
            items.get_wanted().await,
            Err(WishlistError::StorageError(_))
        ));
        assert!(matches!(
            items.add_item("A", "https://example.com", 1).await,
            Err(WishlistError::AddItemError)
        ));
        assert!(matches!(
            items.reserve_item(1, 1).await,
            Err(WishlistError::StorageError(_))
        ));
        assert!(matches!(
            items.delete_item(1).await,
            Err(WishlistError::StorageError(_))
        ));
    }
}
