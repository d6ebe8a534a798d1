/// SQLite item store
///
/// Conditional updates are single `UPDATE ... WHERE` statements, so the
/// check and the write cannot interleave with another request.
use crate::store::{
    Item, ItemChange, ItemCondition, ItemFilter, ItemId, ItemStore, NewItem, StoreResult,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

const ITEM_COLUMNS: &str = "id, name, url, rank, reserver_id, created_at, updated_at";

/// Items table backed by SQLite
#[derive(Clone)]
pub struct SqliteItemStore {
    db: SqlitePool,
}

impl SqliteItemStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn item_from_row(row: &SqliteRow) -> StoreResult<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        rank: row.try_get("rank")?,
        reserved_by: row.try_get("reserver_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn find_items(&self, filter: ItemFilter) -> StoreResult<Vec<Item>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM items", ITEM_COLUMNS));
        match filter {
            ItemFilter::All => {}
            ItemFilter::Wanted => {
                query.push(" WHERE reserver_id IS NULL");
            }
            ItemFilter::ReservedBy(user) => {
                query.push(" WHERE reserver_id = ").push_bind(user);
            }
        }
        query.push(" ORDER BY rank ASC, id DESC");

        let rows = query.build().fetch_all(&self.db).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn find_item(&self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    async fn create_item(&self, item: NewItem) -> StoreResult<Item> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO items (name, url, rank, reserver_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?4)",
        )
        .bind(&item.name)
        .bind(&item.url)
        .bind(item.rank)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Item {
            id: result.last_insert_rowid(),
            name: item.name,
            url: item.url,
            rank: item.rank,
            reserved_by: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_item_if(
        &self,
        id: ItemId,
        expected: ItemCondition,
        change: ItemChange,
    ) -> StoreResult<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE items SET ");
        match change {
            ItemChange::Reserve(user) => {
                query.push("reserver_id = ").push_bind(user);
            }
            ItemChange::Unreserve => {
                query.push("reserver_id = NULL");
            }
            ItemChange::Rank(rank) => {
                query.push("rank = ").push_bind(rank);
            }
        }
        query.push(", updated_at = ").push_bind(Utc::now());

        query.push(" WHERE id = ").push_bind(id);
        match expected {
            ItemCondition::Exists => {}
            ItemCondition::Available => {
                query.push(" AND reserver_id IS NULL");
            }
            ItemCondition::ReservedBy(user) => {
                query.push(" AND reserver_id = ").push_bind(user);
            }
        }

        let result = query.build().execute(&self.db).await?;
        Ok(result.rows_affected())
    }

    async fn delete_item(&self, id: ItemId) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
