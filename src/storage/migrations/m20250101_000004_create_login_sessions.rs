use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoginSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoginSessions::TokenHash)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoginSessions::UserId).integer().not_null())
                    .col(ColumnDef::new(LoginSessions::ActiveSessionId).integer().null())
                    .col(ColumnDef::new(LoginSessions::Notice).text().null())
                    .col(ColumnDef::new(LoginSessions::CreatedAt).date_time().not_null())
                    .col(ColumnDef::new(LoginSessions::ExpiresAt).date_time().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_session_user")
                            .from(LoginSessions::Table, LoginSessions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_login_session_chat_session")
                            .from(LoginSessions::Table, LoginSessions::ActiveSessionId)
                            .to(ChatSessions::Table, ChatSessions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_login_sessions_expires_at")
                    .table(LoginSessions::Table)
                    .col(LoginSessions::ExpiresAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoginSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LoginSessions {
    Table,
    TokenHash,
    UserId,
    ActiveSessionId,
    Notice,
    CreatedAt,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum ChatSessions {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
