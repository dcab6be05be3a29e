use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait, sea_query::NullOrdering,
};
use uuid::Uuid;

use crate::entities::todos;

/// Database-assigned transaction identifier, echoed to clients so they can
/// correlate their own writes with change-feed entries.
pub type Txid = i64;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("todo not found")]
    NotFound,

    #[error(transparent)]
    Db(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct TodoPage {
    pub count: u64,
    pub results: Vec<todos::Model>,
}

pub struct TodoRepository {
    conn: DatabaseConnection,
}

impl TodoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Paginated list of non-deleted todos, completed-first (nulls first on
    /// the completion timestamp) then most recently updated.
    pub async fn list(&self, page: u64, limit: u64) -> Result<TodoPage, DbErr> {
        let active = todos::Entity::find().filter(todos::Column::DeletedAt.is_null());

        let count = active.clone().count(&self.conn).await?;

        let results = active
            .order_by_with_nulls(todos::Column::CompletedAt, Order::Desc, NullOrdering::First)
            .order_by_desc(todos::Column::UpdatedAt)
            .limit(limit)
            .offset(page.saturating_sub(1).saturating_mul(limit))
            .all(&self.conn)
            .await?;

        Ok(TodoPage { count, results })
    }

    /// Direct fetch by id. Deliberately not filtered by soft delete so a
    /// deleted row remains inspectable.
    pub async fn get(&self, id: Uuid) -> Result<Option<todos::Model>, DbErr> {
        todos::Entity::find_by_id(id).one(&self.conn).await
    }

    /// Insert a new todo. The row mutation and the transaction-id capture
    /// share one transaction: the returned txid is only observable if the
    /// insert committed.
    pub async fn create(&self, new: NewTodo) -> Result<(Txid, todos::Model), WriteError> {
        let txn = self.conn.begin().await?;
        let txid = current_txid(&txn).await?;

        let now = Utc::now();
        let todo = todos::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            description: Set(new.description),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok((txid, todo))
    }

    /// Apply a partial update. `updated_at` is always refreshed.
    pub async fn update(
        &self,
        id: Uuid,
        changes: TodoChanges,
    ) -> Result<(Txid, todos::Model), WriteError> {
        let txn = self.conn.begin().await?;
        let txid = current_txid(&txn).await?;

        let existing = todos::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(WriteError::NotFound)?;

        let mut active: todos::ActiveModel = existing.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        if let Some(completed_at) = changes.completed_at {
            active.completed_at = Set(Some(completed_at));
        }
        active.updated_at = Set(Utc::now());

        let todo = active.update(&txn).await?;

        txn.commit().await?;
        Ok((txid, todo))
    }

    /// Flip the completion timestamp: null becomes now, a timestamp becomes
    /// null. Toggling twice round-trips back to incomplete.
    pub async fn toggle_completed(&self, id: Uuid) -> Result<(Txid, todos::Model), WriteError> {
        let txn = self.conn.begin().await?;
        let txid = current_txid(&txn).await?;

        let existing = todos::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(WriteError::NotFound)?;

        let now = Utc::now();
        let next = match existing.completed_at {
            Some(_) => None,
            None => Some(now),
        };

        let mut active: todos::ActiveModel = existing.into();
        active.completed_at = Set(next);
        active.updated_at = Set(now);

        let todo = active.update(&txn).await?;

        txn.commit().await?;
        Ok((txid, todo))
    }

    /// Mark a todo deleted. The row is never physically removed, and a repeat
    /// call on an already-deleted id is a no-op that preserves the original
    /// deletion timestamp.
    pub async fn soft_delete(&self, id: Uuid) -> Result<(Txid, todos::Model), WriteError> {
        let txn = self.conn.begin().await?;
        let txid = current_txid(&txn).await?;

        let existing = todos::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(WriteError::NotFound)?;

        if existing.deleted_at.is_some() {
            txn.commit().await?;
            return Ok((txid, existing));
        }

        let now = Utc::now();
        let mut active: todos::ActiveModel = existing.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);

        let todo = active.update(&txn).await?;

        txn.commit().await?;
        Ok((txid, todo))
    }
}

/// Capture the current transaction identifier from inside an open
/// transaction.
///
/// Postgres: the `::xid` cast strips the epoch, leaving the raw 32-bit value
/// that logical replication streams (and the change feed) report. Sqlite has
/// no replication txid, so a single-row counter bumped inside the same
/// transaction stands in: it commits or rolls back together with the
/// mutation and stays monotonic.
async fn current_txid<C: ConnectionTrait>(conn: &C) -> Result<Txid, DbErr> {
    let backend = conn.get_database_backend();

    let stmt = match backend {
        DbBackend::Postgres => Statement::from_string(
            backend,
            "SELECT pg_current_xact_id()::xid::text AS txid".to_string(),
        ),
        _ => Statement::from_string(
            backend,
            "UPDATE txid_seq SET value = value + 1 RETURNING value AS txid".to_string(),
        ),
    };

    let row = conn
        .query_one(stmt)
        .await?
        .ok_or_else(|| DbErr::Custom("Failed to get transaction ID".to_string()))?;

    match backend {
        DbBackend::Postgres => {
            let raw: String = row.try_get("", "txid")?;
            raw.parse()
                .map_err(|e| DbErr::Custom(format!("Unparsable transaction ID {raw}: {e}")))
        }
        _ => row.try_get("", "txid"),
    }
}
