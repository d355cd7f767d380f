//! Append-only audit trail of authorization code verification attempts.
//!
//! Every reference column is nullable: a lookup miss has no code (and therefore
//! no application or user), and rows must outlive whatever they describe.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuthorizationLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuthorizationLogs::Uuid)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::AuthorizationCodeUuid)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::ApplicationUuid)
                            .uuid()
                            .null(),
                    )
                    .col(ColumnDef::new(AuthorizationLogs::UserUuid).uuid().null())
                    .col(
                        ColumnDef::new(AuthorizationLogs::RequestIpAddress)
                            .string_len(45)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::RequestUserAgent)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::RequestBrowserFingerprint)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::IsSuccess)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::FailureReason)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::FingerprintMatched)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::UserAgentMatched)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::IpMatched)
                            .boolean()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::VerifiedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuthorizationLogs::CreatedAt)
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
                    .name("idx_authorization_logs_code")
                    .table(AuthorizationLogs::Table)
                    .col(AuthorizationLogs::AuthorizationCodeUuid)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_authorization_logs_application")
                    .table(AuthorizationLogs::Table)
                    .col(AuthorizationLogs::ApplicationUuid)
                    .col(AuthorizationLogs::VerifiedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_authorization_logs_application")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_authorization_logs_code").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AuthorizationLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AuthorizationLogs {
    Table,
    Uuid,
    AuthorizationCodeUuid,
    ApplicationUuid,
    UserUuid,
    RequestIpAddress,
    RequestUserAgent,
    RequestBrowserFingerprint,
    IsSuccess,
    FailureReason,
    FingerprintMatched,
    UserAgentMatched,
    IpMatched,
    VerifiedAt,
    CreatedAt,
}
