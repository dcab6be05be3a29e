use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::entities::{todos, users};

pub mod migrator;
pub mod repositories;

pub use repositories::todo::{NewTodo, TodoChanges, TodoPage, Txid, WriteError};
pub use repositories::user::{CreateUserError, PublicUser};

/// Facade over the database connection: owns the pool, runs migrations on
/// connect, and exposes the repository operations the handlers need.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if let Some(path_str) = db_url
            .strip_prefix("sqlite:")
            .map(|rest| rest.trim_start_matches("//"))
            .filter(|rest| !rest.starts_with(":memory:") && !rest.is_empty())
        {
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn todo_repo(&self) -> repositories::todo::TodoRepository {
        repositories::todo::TodoRepository::new(self.conn.clone())
    }

    pub async fn find_active_user_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        self.user_repo().find_active_by_email(email).await
    }

    pub async fn find_active_user_by_id(&self, id: Uuid) -> Result<Option<users::Model>> {
        self.user_repo().find_active_by_id(id).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<users::Model, CreateUserError> {
        self.user_repo().create(name, email, password).await
    }

    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        self.user_repo()
            .verify_password(password, password_hash)
            .await
    }

    pub async fn set_refresh_token(&self, id: Uuid, refresh_token: Option<String>) -> Result<()> {
        self.user_repo().set_refresh_token(id, refresh_token).await
    }

    pub async fn list_todos(&self, page: u64, limit: u64) -> Result<TodoPage, sea_orm::DbErr> {
        self.todo_repo().list(page, limit).await
    }

    pub async fn get_todo(&self, id: Uuid) -> Result<Option<todos::Model>, sea_orm::DbErr> {
        self.todo_repo().get(id).await
    }

    pub async fn create_todo(&self, new: NewTodo) -> Result<(Txid, todos::Model), WriteError> {
        self.todo_repo().create(new).await
    }

    pub async fn update_todo(
        &self,
        id: Uuid,
        changes: TodoChanges,
    ) -> Result<(Txid, todos::Model), WriteError> {
        self.todo_repo().update(id, changes).await
    }

    pub async fn toggle_todo_completed(
        &self,
        id: Uuid,
    ) -> Result<(Txid, todos::Model), WriteError> {
        self.todo_repo().toggle_completed(id).await
    }

    pub async fn soft_delete_todo(&self, id: Uuid) -> Result<(Txid, todos::Model), WriteError> {
        self.todo_repo().soft_delete(id).await
    }
}
