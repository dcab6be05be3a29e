use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum TxidSeq {
    Table,
    Value,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Todos)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Transaction-id source for the sqlite backend. Postgres reads
        // pg_current_xact_id() instead and never touches this table.
        manager
            .create_table(
                Table::create()
                    .table(TxidSeq::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TxidSeq::Value).big_integer().not_null())
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(TxidSeq::Table)
            .columns([TxidSeq::Value])
            .values_panic([0i64.into()])
            .to_owned();

        manager.exec_stmt(seed).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TxidSeq::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Todos).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
