//! Schema bootstrap from the entity definitions
//!
//! PostgreSQL deployments use the SQL migrations; this builds the same
//! tables for any backend sea-orm supports.

use super::models::{PostEntity, PostTagEntity, SectionEntity, TagEntity};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema};

/// Create every table if it does not exist yet. Parents first.
pub async fn create_all<C: ConnectionTrait>(conn: &C) -> Result<(), DbErr> {
    create_table(conn, SectionEntity).await?;
    create_table(conn, TagEntity).await?;
    create_table(conn, PostEntity).await?;
    create_table(conn, PostTagEntity).await?;
    Ok(())
}

async fn create_table<C, E>(conn: &C, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let mut stmt = Schema::new(backend).create_table_from_entity(entity);
    stmt.if_not_exists();
    conn.execute(backend.build(&stmt)).await?;
    Ok(())
}
