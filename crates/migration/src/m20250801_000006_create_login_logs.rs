//! Password login attempts, successful or not.
//!
//! `user_uuid` is empty when the username did not resolve.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoginLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginLogs::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginLogs::UserUuid).uuid().null())
                    .col(
                        ColumnDef::new(LoginLogs::LoginType)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginLogs::IpAddress)
                            .string_len(45)
                            .not_null(),
                    )
                    .col(ColumnDef::new(LoginLogs::UserAgent).text().not_null())
                    .col(
                        ColumnDef::new(LoginLogs::BrowserFingerprint)
                            .string_len(128)
                            .null(),
                    )
                    .col(ColumnDef::new(LoginLogs::IsSuccess).boolean().not_null())
                    .col(
                        ColumnDef::new(LoginLogs::FailureReason)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(LoginLogs::LoginAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LoginLogs::CreatedAt)
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
                    .name("idx_login_logs_user")
                    .table(LoginLogs::Table)
                    .col(LoginLogs::UserUuid)
                    .col(LoginLogs::LoginAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_login_logs_user").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LoginLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LoginLogs {
    Table,
    Uuid,
    UserUuid,
    LoginType,
    IpAddress,
    UserAgent,
    BrowserFingerprint,
    IsSuccess,
    FailureReason,
    LoginAt,
    CreatedAt,
}
