use model::entities::{client, purchase, role, tariff, user};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, trace, warn};

use crate::auth::Principal;
use crate::error::{Result, ServiceError};
use crate::ownership::resolve_owner;
use crate::password::hash_password;
use crate::purchases::reverse;
use crate::roles::{assign_role, role_names_for_user};

/// Tariff every self-registered account starts on.
pub const DEFAULT_TARIFF_ID: i32 = 1;

/// Registration input. The password arrives in plaintext and is hashed here.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: user::Model,
    pub roles: Vec<String>,
    pub tariff: Option<tariff::Model>,
    pub clients: Vec<client::Model>,
}

/// Rejects a username or email that another account already uses.
pub(crate) async fn ensure_unique<C: ConnectionTrait>(
    db: &C,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i32>,
) -> Result<()> {
    let mut clash = Condition::any();
    if let Some(username) = username {
        clash = clash.add(user::Column::Username.eq(username));
    }
    if let Some(email) = email {
        clash = clash.add(user::Column::Email.eq(email));
    }
    if username.is_none() && email.is_none() {
        return Ok(());
    }

    let mut query = user::Entity::find().filter(clash);
    if let Some(id) = except {
        query = query.filter(user::Column::Id.ne(id));
    }
    if let Some(existing) = query.one(db).await? {
        let field = if Some(existing.email.as_str()) == email {
            "email"
        } else {
            "username"
        };
        warn!("Account {} already uses this {}", existing.id, field);
        return Err(ServiceError::Conflict(format!(
            "A user with this {field} already exists"
        )));
    }
    Ok(())
}

/// Inserts an account with one role. Callers own the surrounding transaction.
pub(crate) async fn create_account<C: ConnectionTrait>(
    db: &C,
    new_user: NewUser,
    tariff_id: i32,
    role_name: &str,
) -> Result<user::Model> {
    if new_user.username.trim().is_empty() || new_user.password.is_empty() {
        return Err(ServiceError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    ensure_unique(db, Some(&new_user.username), Some(&new_user.email), None).await?;

    let account = user::ActiveModel {
        username: Set(new_user.username),
        name: Set(new_user.name),
        password_hash: Set(hash_password(&new_user.password)?),
        email: Set(new_user.email),
        phone: Set(new_user.phone),
        tariff_id: Set(tariff_id),
        ..Default::default()
    }
    .insert(db)
    .await?;
    assign_role(db, account.id, role_name).await?;
    Ok(account)
}

/// Self-registration: default tariff and the `user` role.
#[instrument(skip(db, new_user), fields(username = %new_user.username))]
pub async fn register(db: &DatabaseConnection, new_user: NewUser) -> Result<user::Model> {
    trace!("Entering register function");
    let txn = db.begin().await?;
    let account = create_account(&txn, new_user, DEFAULT_TARIFF_ID, role::USER).await?;
    txn.commit().await?;
    info!("Registered user {} ({})", account.id, account.username);
    Ok(account)
}

#[instrument(skip(db))]
pub async fn get_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))
}

#[instrument(skip(db))]
pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} users", users.len());
    Ok(users)
}

/// The account with its roles, tariff and owned clients.
#[instrument(skip(db))]
pub async fn get_profile(db: &DatabaseConnection, user_id: i32) -> Result<UserProfile> {
    let account = get_user(db, user_id).await?;
    let roles = role_names_for_user(db, user_id).await?;
    let tariff = account.find_related(tariff::Entity).one(db).await?;
    let clients = account
        .find_related(client::Entity)
        .order_by_asc(client::Column::Id)
        .all(db)
        .await?;
    Ok(UserProfile {
        user: account,
        roles,
        tariff,
        clients,
    })
}

/// Updates an account. Only the account itself or an admin may do this.
#[instrument(skip(db, principal, changes), fields(caller = principal.user_id))]
pub async fn update_user(
    db: &DatabaseConnection,
    principal: &Principal,
    user_id: i32,
    changes: UserChanges,
) -> Result<user::Model> {
    if principal.user_id != user_id && !principal.is_admin() {
        warn!("User {} tried to update user {}", principal.user_id, user_id);
        return Err(ServiceError::Forbidden(
            "You can only update your own account".to_string(),
        ));
    }
    let existing = get_user(db, user_id).await?;
    let updated = apply_changes(db, existing, changes).await?;
    info!("User {} updated", updated.id);
    Ok(updated)
}

/// Writes the given fields onto an account, keeping username and email unique.
pub(crate) async fn apply_changes<C: ConnectionTrait>(
    db: &C,
    existing: user::Model,
    changes: UserChanges,
) -> Result<user::Model> {
    ensure_unique(
        db,
        changes.username.as_deref(),
        changes.email.as_deref(),
        Some(existing.id),
    )
    .await?;

    let mut active = existing.into_active_model();
    if let Some(username) = changes.username {
        active.username = Set(username);
    }
    if let Some(name) = changes.name {
        active.name = Set(Some(name));
    }
    if let Some(email) = changes.email {
        active.email = Set(email);
    }
    if let Some(phone) = changes.phone {
        active.phone = Set(Some(phone));
    }
    if let Some(password) = changes.password {
        active.password_hash = Set(hash_password(&password)?);
    }
    Ok(active.update(db).await?)
}

/// Deletes an account without losing the cashback ledger's backing.
///
/// Purchases a manager recorded move to the creating user. Purchases any
/// other account recorded are reversed with a debit before the account goes.
#[instrument(skip(db))]
pub async fn delete_user(db: &DatabaseConnection, user_id: i32) -> Result<()> {
    let existing = get_user(db, user_id).await?;
    let owner_id = resolve_owner(db, user_id).await?;

    let txn = db.begin().await?;
    if owner_id != user_id {
        let moved = purchase::Entity::update_many()
            .col_expr(purchase::Column::UserId, Expr::value(owner_id))
            .filter(purchase::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        debug!("{} purchases moved to user {}", moved.rows_affected, owner_id);
    } else {
        let recorded = purchase::Entity::find()
            .filter(purchase::Column::UserId.eq(user_id))
            .all(&txn)
            .await?;
        for entry in recorded {
            let reversal = reverse(&txn, entry).await?;
            debug!("Purchase {} reversed with {}", reversal.purchase.id, reversal.debit.amount);
        }
    }
    existing.delete(&txn).await?;
    txn.commit().await?;

    info!("User {} deleted", user_id);
    Ok(())
}
