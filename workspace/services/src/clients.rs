use chrono::NaiveDate;
use model::entities::{client, tariff, user, user_client, visit};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::audit;
use crate::auth::Principal;
use crate::cashback::totals_for_clients;
use crate::error::{Result, ServiceError};
use crate::ownership::{ensure_client_access, owned_client_ids, resolve_owner};

const ENTITY: &str = "Client";

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub cashback_percentage: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub cashback_percentage: Option<i32>,
}

/// A client together with the sum of its cashback ledger.
#[derive(Debug, Clone)]
pub struct ClientWithBalance {
    pub client: client::Model,
    pub total_cashback: Decimal,
}

#[derive(Debug, Clone)]
pub struct ClientOverview {
    pub client: client::Model,
    pub visits: Vec<visit::Model>,
    pub total_cashback: Decimal,
}

fn check_percentage(percentage: i32) -> Result<()> {
    if !(0..=100).contains(&percentage) {
        return Err(ServiceError::Validation(
            "Cashback percentage must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Fails once `owner_id` already holds as many clients as the tariff allows.
async fn check_quota<C: ConnectionTrait>(db: &C, owner_id: i32) -> Result<()> {
    let (owner, plan) = user::Entity::find_by_id(owner_id)
        .find_also_related(tariff::Entity)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", owner_id))?;
    let plan = plan.ok_or_else(|| {
        ServiceError::Internal(format!("User {} has no tariff", owner.id))
    })?;

    let current = user_client::Entity::find()
        .filter(user_client::Column::UserId.eq(owner_id))
        .count(db)
        .await?;
    debug!("Owner {} holds {} of {} clients", owner_id, current, plan.max_client);
    if current >= plan.max_client.max(0) as u64 {
        warn!("Owner {} reached the client limit of tariff {}", owner_id, plan.id);
        return Err(ServiceError::QuotaExceeded {
            max_client: plan.max_client,
        });
    }
    Ok(())
}

/// Creates a client owned by the caller's resolved owner, within the tariff quota.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn create_client(
    db: &DatabaseConnection,
    principal: &Principal,
    new_client: NewClient,
) -> Result<client::Model> {
    trace!("Entering create_client function");
    check_percentage(new_client.cashback_percentage)?;
    if new_client.phone.trim().is_empty() {
        return Err(ServiceError::Validation("Phone is required".to_string()));
    }

    let owner_id = resolve_owner(db, principal.user_id).await?;
    let txn = db.begin().await?;
    check_quota(&txn, owner_id).await?;

    let created = client::ActiveModel {
        name: Set(new_client.name),
        phone: Set(new_client.phone),
        email: Set(new_client.email),
        birth_date: Set(new_client.birth_date),
        cashback_percentage: Set(new_client.cashback_percentage),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    user_client::ActiveModel {
        user_id: Set(owner_id),
        client_id: Set(created.id),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Client {} created for owner {}", created.id, owner_id);
    audit::record(db, owner_id, audit::CREATE, ENTITY, created.id).await;
    Ok(created)
}

#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn get_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
) -> Result<ClientWithBalance> {
    let client = ensure_client_access(db, principal, client_id).await?;
    let totals = totals_for_clients(db, &[client.id]).await?;
    Ok(ClientWithBalance {
        total_cashback: totals.get(&client.id).copied().unwrap_or_default(),
        client,
    })
}

/// Looks a client of the caller up by phone, or by email when no phone is given.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn find_by_phone_or_email(
    db: &DatabaseConnection,
    principal: &Principal,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<ClientWithBalance> {
    let condition = match (phone, email) {
        (Some(phone), _) => client::Column::Phone.eq(phone),
        (None, Some(email)) => client::Column::Email.eq(email),
        (None, None) => {
            return Err(ServiceError::Validation(
                "Either phone or email must be provided".to_string(),
            ));
        }
    };

    let mut query = client::Entity::find().filter(condition);
    if !principal.is_admin() {
        let owner_id = resolve_owner(db, principal.user_id).await?;
        query = query.filter(client::Column::Id.is_in(owned_client_ids(db, owner_id).await?));
    }

    let client = query
        .order_by_asc(client::Column::Id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("No matching client was found".to_string()))?;
    let totals = totals_for_clients(db, &[client.id]).await?;
    Ok(ClientWithBalance {
        total_cashback: totals.get(&client.id).copied().unwrap_or_default(),
        client,
    })
}

/// The caller's clients with their visits and cashback totals.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn list_for_user(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<ClientOverview>> {
    let owner_id = resolve_owner(db, principal.user_id).await?;
    let ids = owned_client_ids(db, owner_id).await?;
    let clients = client::Entity::find()
        .filter(client::Column::Id.is_in(ids.clone()))
        .order_by_asc(client::Column::Id)
        .find_with_related(visit::Entity)
        .all(db)
        .await?;
    let totals = totals_for_clients(db, &ids).await?;

    debug!("Owner {} has {} clients", owner_id, clients.len());
    Ok(clients
        .into_iter()
        .map(|(client, visits)| ClientOverview {
            total_cashback: totals.get(&client.id).copied().unwrap_or_default(),
            client,
            visits,
        })
        .collect())
}

/// Every client in the system, for admins.
#[instrument(skip(db))]
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<ClientWithBalance>> {
    let clients = client::Entity::find()
        .order_by_asc(client::Column::Id)
        .all(db)
        .await?;
    let ids: Vec<i32> = clients.iter().map(|c| c.id).collect();
    let totals = totals_for_clients(db, &ids).await?;
    Ok(clients
        .into_iter()
        .map(|client| ClientWithBalance {
            total_cashback: totals.get(&client.id).copied().unwrap_or_default(),
            client,
        })
        .collect())
}

#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn update_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
    changes: ClientChanges,
) -> Result<client::Model> {
    if let Some(percentage) = changes.cashback_percentage {
        check_percentage(percentage)?;
    }
    let existing = ensure_client_access(db, principal, client_id).await?;

    let mut active = existing.into_active_model();
    if let Some(name) = changes.name {
        active.name = Set(Some(name));
    }
    if let Some(phone) = changes.phone {
        active.phone = Set(phone);
    }
    if let Some(email) = changes.email {
        active.email = Set(Some(email));
    }
    if let Some(birth_date) = changes.birth_date {
        active.birth_date = Set(Some(birth_date));
    }
    if let Some(percentage) = changes.cashback_percentage {
        active.cashback_percentage = Set(percentage);
    }
    let updated = active.update(db).await?;

    info!("Client {} updated", client_id);
    audit::record(db, principal.user_id, audit::UPDATE, ENTITY, client_id).await;
    Ok(updated)
}

/// Deletes a client with its visits, purchases and ledger.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn delete_client(db: &DatabaseConnection, principal: &Principal, client_id: i32) -> Result<()> {
    let existing = ensure_client_access(db, principal, client_id).await?;
    existing.delete(db).await?;

    info!("Client {} deleted", client_id);
    audit::record(db, principal.user_id, audit::DELETE, ENTITY, client_id).await;
    Ok(())
}

/// Shares one of the caller's clients with another user.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn grant_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
    target_user_id: i32,
) -> Result<()> {
    ensure_client_access(db, principal, client_id).await?;

    let txn = db.begin().await?;
    user::Entity::find_by_id(target_user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", target_user_id))?;
    if user_client::Entity::find_by_id((target_user_id, client_id))
        .one(&txn)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "Client {client_id} is already linked to user {target_user_id}"
        )));
    }
    check_quota(&txn, target_user_id).await?;
    user_client::ActiveModel {
        user_id: Set(target_user_id),
        client_id: Set(client_id),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Client {} linked to user {}", client_id, target_user_id);
    audit::record(db, target_user_id, audit::ADD_CLIENT_TO_USER, ENTITY, client_id).await;
    Ok(())
}
