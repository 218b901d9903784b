use model::entities::visit;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument};

use crate::auth::Principal;
use crate::error::Result;
use crate::ownership::{ensure_client_access, owned_client_ids, resolve_owner};

#[instrument(skip(db))]
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<visit::Model>> {
    Ok(visit::Entity::find()
        .order_by_desc(visit::Column::VisitDate)
        .all(db)
        .await?)
}

/// Visits of one client the caller may access.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn list_for_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
) -> Result<Vec<visit::Model>> {
    ensure_client_access(db, principal, client_id).await?;
    Ok(visit::Entity::find()
        .filter(visit::Column::ClientId.eq(client_id))
        .order_by_desc(visit::Column::VisitDate)
        .all(db)
        .await?)
}

/// Visits across every client of the caller's owner.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn list_for_user(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<visit::Model>> {
    let owner_id = resolve_owner(db, principal.user_id).await?;
    let ids = owned_client_ids(db, owner_id).await?;
    let visits = visit::Entity::find()
        .filter(visit::Column::ClientId.is_in(ids))
        .order_by_desc(visit::Column::VisitDate)
        .all(db)
        .await?;
    debug!("Owner {} has {} visits", owner_id, visits.len());
    Ok(visits)
}
