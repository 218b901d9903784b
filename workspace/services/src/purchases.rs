use model::entities::{cashback_transaction, client, purchase, visit};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    ModelTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::{info, instrument, trace, warn};

use crate::audit;
use crate::auth::Principal;
use crate::cashback::{calculate_cashback, post_entry};
use crate::error::{Result, ServiceError};
use crate::ownership::{ensure_client_access, owned_client_ids, resolve_owner};

const ENTITY: &str = "Purchase";

/// Everything a purchase creates in one go.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub purchase: purchase::Model,
    pub visit: visit::Model,
    pub cashback: cashback_transaction::Model,
}

/// A removed purchase and the debit that reversed its cashback.
#[derive(Debug, Clone)]
pub struct PurchaseReversal {
    pub purchase: purchase::Model,
    pub debit: cashback_transaction::Model,
}

/// Records a sale: a visit, the purchase and its cashback credit, atomically.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn create_purchase(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
    amount: Decimal,
) -> Result<PurchaseReceipt> {
    trace!("Entering create_purchase function");
    if amount <= Decimal::ZERO {
        return Err(ServiceError::Validation("Purchase amount must be positive".to_string()));
    }
    let client = ensure_client_access(db, principal, client_id).await?;

    let txn = db.begin().await?;
    let visit = visit::ActiveModel {
        client_id: Set(client.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let purchase = purchase::ActiveModel {
        user_id: Set(principal.user_id),
        client_id: Set(client.id),
        visit_id: Set(visit.id),
        amount: Set(amount),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    let cashback = post_entry(
        &txn,
        client.id,
        calculate_cashback(amount, client.cashback_percentage),
    )
    .await?;
    txn.commit().await?;

    info!(
        "Purchase {} of {} for client {} earned {} cashback",
        purchase.id, amount, client.id, cashback.amount
    );
    audit::record(db, principal.user_id, audit::CREATE, ENTITY, purchase.id).await;
    Ok(PurchaseReceipt {
        purchase,
        visit,
        cashback,
    })
}

/// Purchases of every client the caller's owner holds, newest first.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn list_for_user(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<purchase::Model>> {
    let owner_id = resolve_owner(db, principal.user_id).await?;
    let ids = owned_client_ids(db, owner_id).await?;
    Ok(purchase::Entity::find()
        .filter(purchase::Column::ClientId.is_in(ids))
        .order_by_desc(purchase::Column::CreatedAt)
        .all(db)
        .await?)
}

#[instrument(skip(db))]
pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<purchase::Model>> {
    Ok(purchase::Entity::find()
        .order_by_desc(purchase::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Deletes the purchase and books the matching debit. The visit stays.
pub(crate) async fn reverse(txn: &DatabaseTransaction, existing: purchase::Model) -> Result<PurchaseReversal> {
    let client = client::Entity::find_by_id(existing.client_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Client", existing.client_id))?;
    let credited = calculate_cashback(existing.amount, client.cashback_percentage);

    existing.clone().delete(txn).await?;
    let debit = post_entry(txn, client.id, -credited).await?;
    Ok(PurchaseReversal {
        purchase: existing,
        debit,
    })
}

async fn find_purchase(db: &DatabaseConnection, purchase_id: i32) -> Result<purchase::Model> {
    purchase::Entity::find_by_id(purchase_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found("Purchase", purchase_id))
}

/// Cancels a purchase of one of the caller's clients.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn cancel_purchase(
    db: &DatabaseConnection,
    principal: &Principal,
    purchase_id: i32,
) -> Result<PurchaseReversal> {
    let existing = find_purchase(db, purchase_id).await?;
    ensure_client_access(db, principal, existing.client_id).await?;

    let txn = db.begin().await?;
    let reversal = reverse(&txn, existing).await?;
    txn.commit().await?;

    info!("Purchase {} cancelled, debited {}", purchase_id, reversal.debit.amount);
    audit::record(db, principal.user_id, audit::DELETE, ENTITY, purchase_id).await;
    Ok(reversal)
}

/// Administrative removal of any purchase.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn delete_purchase(
    db: &DatabaseConnection,
    principal: &Principal,
    purchase_id: i32,
) -> Result<PurchaseReversal> {
    if !principal.is_admin() {
        warn!("Non-admin {} tried to delete purchase {}", principal.user_id, purchase_id);
        return Err(ServiceError::Forbidden("Only admins can delete purchases".to_string()));
    }
    let existing = find_purchase(db, purchase_id).await?;

    let txn = db.begin().await?;
    let reversal = reverse(&txn, existing).await?;
    txn.commit().await?;

    info!("Purchase {} deleted by admin", purchase_id);
    audit::record(db, principal.user_id, audit::DELETE, ENTITY, purchase_id).await;
    Ok(reversal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashback::totals_for_clients;
    use crate::testing::{new_client, new_manager, new_user, principal_for, setup_db};
    use model::entities::role;

    #[tokio::test]
    async fn test_purchase_creates_visit_and_credit() {
        let db = setup_db().await;
        let owner = new_user(&db, "shop").await;
        let client = new_client(&db, &owner, 5).await;

        let receipt = create_purchase(&db, &principal_for(&owner, &[role::USER]), client.id, Decimal::new(1000, 0))
            .await
            .unwrap();
        assert_eq!(receipt.purchase.visit_id, receipt.visit.id);
        assert_eq!(receipt.visit.client_id, client.id);
        assert_eq!(receipt.cashback.amount, Decimal::new(50, 0));
        assert_eq!(receipt.purchase.user_id, owner.id);
    }

    #[tokio::test]
    async fn test_cancel_reverses_credit() {
        let db = setup_db().await;
        let owner = new_user(&db, "refund").await;
        let client = new_client(&db, &owner, 12).await;
        let as_owner = principal_for(&owner, &[role::USER]);

        let receipt = create_purchase(&db, &as_owner, client.id, Decimal::new(25050, 2))
            .await
            .unwrap();
        let reversal = cancel_purchase(&db, &as_owner, receipt.purchase.id).await.unwrap();
        assert_eq!(reversal.debit.amount, -receipt.cashback.amount);

        let totals = totals_for_clients(&db, &[client.id]).await.unwrap();
        assert_eq!(totals[&client.id], Decimal::ZERO);
        assert!(purchase::Entity::find_by_id(receipt.purchase.id).one(&db).await.unwrap().is_none());
        // The visit survives
        assert!(visit::Entity::find_by_id(receipt.visit.id).one(&db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_manager_records_for_owner() {
        let db = setup_db().await;
        let owner = new_user(&db, "franchise").await;
        let helper = new_manager(&db, &owner, "cashier").await;
        let client = new_client(&db, &owner, 3).await;

        let receipt = create_purchase(&db, &principal_for(&helper, &[role::MANAGER]), client.id, Decimal::new(100, 0))
            .await
            .unwrap();
        assert_eq!(receipt.purchase.user_id, helper.id);

        let listed = list_for_user(&db, &principal_for(&owner, &[role::USER])).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_purchases_rejected() {
        let db = setup_db().await;
        let owner = new_user(&db, "strict").await;
        let stranger = new_user(&db, "outsider").await;
        let client = new_client(&db, &owner, 3).await;

        assert!(matches!(
            create_purchase(&db, &principal_for(&owner, &[role::USER]), client.id, Decimal::ZERO).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            create_purchase(&db, &principal_for(&stranger, &[role::USER]), client.id, Decimal::ONE).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            delete_purchase(&db, &principal_for(&owner, &[role::USER]), 1).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
