//! Long-lived, multi-use authorization codes bound to the security context that
//! requested them.
//!
//! Codes are never deleted: expiry is logical and revocation flips `is_active`.
//! There is no `ON DELETE CASCADE` towards users; dependent rows
//! are revoked by the application when a user is deactivated.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthorizationCodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthorizationCodes::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::Code)
                            .string_len(128)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::UserUuid)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::ApplicationUuid)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::UserAgent)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::BrowserFingerprint)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::IpAddress)
                            .string_len(45)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::UsageCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::LastUsedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationCodes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_authorization_codes_user_application")
                    .table(AuthorizationCodes::Table)
                    .col(AuthorizationCodes::UserUuid)
                    .col(AuthorizationCodes::ApplicationUuid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_authorization_codes_expires_at")
                    .table(AuthorizationCodes::Table)
                    .col(AuthorizationCodes::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_authorization_codes_expires_at")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_authorization_codes_user_application")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(AuthorizationCodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthorizationCodes {
    Table,
    Uuid,
    Code,
    UserUuid,
    ApplicationUuid,
    UserAgent,
    BrowserFingerprint,
    IpAddress,
    ExpiresAt,
    IsActive,
    UsageCount,
    LastUsedAt,
    CreatedAt,
    UpdatedAt,
}
