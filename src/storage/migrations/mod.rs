use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users;
mod m20250101_000002_create_chat_sessions;
mod m20250101_000003_create_chat_messages;
mod m20250101_000004_create_login_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users::Migration),
            Box::new(m20250101_000002_create_chat_sessions::Migration),
            Box::new(m20250101_000003_create_chat_messages::Migration),
            Box::new(m20250101_000004_create_login_sessions::Migration),
        ]
    }
}
