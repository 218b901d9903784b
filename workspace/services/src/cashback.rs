//! Cashback ledger.
//!
//! Credits and debits are signed rows of `cashback_transactions`. The amount
//! a client may spend is the ledger sum multiplied by the client's cashback
//! percentage, not the plain ledger sum.

use std::collections::HashMap;

use model::entities::{cashback_transaction, client};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::auth::Principal;
use crate::error::{Result, ServiceError};
use crate::ownership::ensure_client_access;

/// Bonus earned by a purchase: `amount × percentage / 100`.
pub fn calculate_cashback(amount: Decimal, percentage: i32) -> Decimal {
    amount * Decimal::from(percentage) / Decimal::ONE_HUNDRED
}

/// Spendable bonus for a ledger: `Σ amount × percentage`.
pub fn spendable_balance(ledger: &[cashback_transaction::Model], percentage: i32) -> Decimal {
    ledger
        .iter()
        .map(|entry| entry.amount * Decimal::from(percentage))
        .sum()
}

/// Plain signed ledger sum per client; clients without entries are absent.
pub async fn totals_for_clients<C: ConnectionTrait>(
    db: &C,
    client_ids: &[i32],
) -> Result<HashMap<i32, Decimal>> {
    let entries = cashback_transaction::Entity::find()
        .filter(cashback_transaction::Column::ClientId.is_in(client_ids.iter().copied()))
        .all(db)
        .await?;

    let mut totals: HashMap<i32, Decimal> = HashMap::new();
    for entry in entries {
        *totals.entry(entry.client_id).or_default() += entry.amount;
    }
    Ok(totals)
}

async fn ledger_of<C: ConnectionTrait>(db: &C, client_id: i32) -> Result<Vec<cashback_transaction::Model>> {
    Ok(cashback_transaction::Entity::find()
        .filter(cashback_transaction::Column::ClientId.eq(client_id))
        .order_by_asc(cashback_transaction::Column::Id)
        .all(db)
        .await?)
}

/// Inserts a ledger row. Positive amounts credit, negative amounts debit.
pub(crate) async fn post_entry<C: ConnectionTrait>(
    db: &C,
    client_id: i32,
    amount: Decimal,
) -> Result<cashback_transaction::Model> {
    let entry = cashback_transaction::ActiveModel {
        client_id: Set(client_id),
        amount: Set(amount),
        ..Default::default()
    }
    .insert(db)
    .await?;
    debug!("Ledger entry {} of {} for client {}", entry.id, amount, client_id);
    Ok(entry)
}

#[instrument(skip(db))]
pub async fn available_balance(db: &DatabaseConnection, client: &client::Model) -> Result<Decimal> {
    let ledger = ledger_of(db, client.id).await?;
    Ok(spendable_balance(&ledger, client.cashback_percentage))
}

/// Pays `amount` with the client's bonus, debiting the ledger.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn pay_by_bonus(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
    amount: Decimal,
) -> Result<cashback_transaction::Model> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::Validation("Amount must be positive".to_string()));
    }
    let client = ensure_client_access(db, principal, client_id).await?;

    let txn = db.begin().await?;
    let ledger = ledger_of(&txn, client.id).await?;
    let available = spendable_balance(&ledger, client.cashback_percentage);
    if amount > available {
        warn!("Client {} has {} bonus, {} requested", client.id, available, amount);
        return Err(ServiceError::InsufficientBalance {
            available,
            requested: amount,
        });
    }
    let debit = post_entry(&txn, client.id, -amount).await?;
    txn.commit().await?;

    info!("Client {} paid {} with bonus", client.id, amount);
    Ok(debit)
}

/// The client's ledger, oldest first.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn list_for_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
) -> Result<Vec<cashback_transaction::Model>> {
    let client = ensure_client_access(db, principal, client_id).await?;
    ledger_of(db, client.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_client, new_user, principal_for, setup_db};
    use model::entities::role;

    #[test]
    fn test_calculate_cashback() {
        assert_eq!(calculate_cashback(Decimal::new(1000, 0), 5), Decimal::new(50, 0));
        assert_eq!(calculate_cashback(Decimal::new(999, 1), 10), Decimal::new(999, 2));
        assert_eq!(calculate_cashback(Decimal::new(500, 0), 0), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_pay_by_bonus_against_scaled_balance() {
        let db = setup_db().await;
        let owner = new_user(&db, "bonus").await;
        let client = new_client(&db, &owner, 10).await;
        let as_owner = principal_for(&owner, &[role::USER]);
        post_entry(&db, client.id, Decimal::new(5, 0)).await.unwrap();

        // 5 × 10 = 50 spendable
        assert_eq!(available_balance(&db, &client).await.unwrap(), Decimal::new(50, 0));

        let err = pay_by_bonus(&db, &as_owner, client.id, Decimal::new(51, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientBalance { .. }));

        let debit = pay_by_bonus(&db, &as_owner, client.id, Decimal::new(4, 0))
            .await
            .unwrap();
        assert_eq!(debit.amount, Decimal::new(-4, 0));

        let ledger = list_for_client(&db, &as_owner, client.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        let totals = totals_for_clients(&db, &[client.id]).await.unwrap();
        assert_eq!(totals[&client.id], Decimal::new(1, 0));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let db = setup_db().await;
        let owner = new_user(&db, "zero").await;
        let client = new_client(&db, &owner, 10).await;
        let as_owner = principal_for(&owner, &[role::USER]);

        for amount in [Decimal::ZERO, Decimal::new(-3, 0)] {
            assert!(matches!(
                pay_by_bonus(&db, &as_owner, client.id, amount).await,
                Err(ServiceError::Validation(_))
            ));
        }
    }
}
