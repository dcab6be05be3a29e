use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "todos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    /// Null means incomplete; a timestamp records when the task was completed.
    pub completed_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    /// Refreshed explicitly on every mutation by the write coordinator.
    pub updated_at: DateTimeUtc,

    /// Soft delete marker. List reads exclude non-null rows; direct fetches
    /// by id do not.
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
