use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tasks table
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tasks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Tasks::TaskId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Tasks::TaskType).string_len(64).not_null())
                    .col(ColumnDef::new(Tasks::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Tasks::Trigger).string_len(64).not_null().default("api"))
                    .col(ColumnDef::new(Tasks::Config).json_binary().not_null())
                    .col(ColumnDef::new(Tasks::QueuedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Tasks::FinishedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Tasks::DurationSeconds)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Tasks::LogSummary).text())
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_status")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        // Create task_logs table (append-only audit trail)
        manager
            .create_table(
                Table::create()
                    .table(TaskLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TaskLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TaskLogs::TaskId).big_integer().not_null())
                    .col(
                        ColumnDef::new(TaskLogs::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TaskLogs::Level).string_len(16).not_null())
                    .col(ColumnDef::new(TaskLogs::Message).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_logs_task_id")
                            .from(TaskLogs::Table, TaskLogs::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_task_logs_task_id_timestamp")
                    .table(TaskLogs::Table)
                    .col(TaskLogs::TaskId)
                    .col(TaskLogs::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    TaskId,
    TaskType,
    Status,
    Trigger,
    Config,
    QueuedAt,
    StartedAt,
    FinishedAt,
    DurationSeconds,
    LogSummary,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskLogs {
    Table,
    Id,
    TaskId,
    Timestamp,
    Level,
    Message,
}
