use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Posts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Posts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Posts::UserId).uuid().not_null())
                    .col(ColumnDef::new(Posts::Title).string_len(500).not_null())
                    .col(ColumnDef::new(Posts::Content).text().not_null())
                    .col(
                        ColumnDef::new(Posts::Status)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Posts::ScheduledFor).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::ExternalPostId).string())
                    .col(ColumnDef::new(Posts::ErrorMessage).text())
                    .col(
                        ColumnDef::new(Posts::PublishAttempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Posts::RetryAfter).timestamp_with_time_zone())
                    .col(ColumnDef::new(Posts::ClaimToken).uuid())
                    .col(ColumnDef::new(Posts::ClaimExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Posts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Posts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(Expr::col(Posts::Status).is_in([
                        "draft",
                        "scheduled",
                        "published",
                        "failed",
                    ]))
                    .to_owned(),
            )
            .await?;

        // Sweeper lookup: scheduled posts ordered by due time
        manager
            .create_index(
                Index::create()
                    .name("idx_posts_status_scheduled_for")
                    .table(Posts::Table)
                    .col(Posts::Status)
                    .col(Posts::ScheduledFor)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_user_id")
                    .table(Posts::Table)
                    .col(Posts::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_published_at")
                    .table(Posts::Table)
                    .col(Posts::PublishedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_posts_claim_token")
                    .table(Posts::Table)
                    .col(Posts::ClaimToken)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Posts {
    Table,
    Id,
    UserId,
    Title,
    Content,
    Status,
    ScheduledFor,
    PublishedAt,
    ExternalPostId,
    ErrorMessage,
    PublishAttempts,
    RetryAfter,
    ClaimToken,
    ClaimExpiresAt,
    CreatedAt,
    UpdatedAt,
}
