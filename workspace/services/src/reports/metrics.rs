use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use common::{
    ActiveClients, ChurnRate, ClientActivityDays, ClientLtv, ClientMeanCheck,
    ClientPurchaseFrequency, CohortBucket, MainMetrics, MonthlyValue, RepeatPurchaseRate,
    round_percentage,
};
use model::entities::{client, purchase};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, instrument, trace};

use super::DateFilter;
use crate::auth::Principal;
use crate::error::Result;
use crate::ownership::{ensure_client_access, owned_client_ids, resolve_owner};

async fn scope(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<i32>> {
    let owner_id = resolve_owner(db, principal.user_id).await?;
    owned_client_ids(db, owner_id).await
}

/// Purchases of `client_ids` inside the filter, oldest first.
async fn purchases_in(
    db: &DatabaseConnection,
    client_ids: &[i32],
    filter: &DateFilter,
) -> Result<Vec<purchase::Model>> {
    let mut query = purchase::Entity::find()
        .filter(purchase::Column::ClientId.is_in(client_ids.iter().copied()));
    if let Some(from) = filter.from() {
        query = query.filter(purchase::Column::CreatedAt.gte(from));
    }
    if let Some(until) = filter.until() {
        query = query.filter(purchase::Column::CreatedAt.lt(until));
    }
    let purchases = query
        .order_by_asc(purchase::Column::CreatedAt)
        .all(db)
        .await?;
    debug!("{} purchases in report window {:?}", purchases.len(), filter);
    Ok(purchases)
}

fn by_client(purchases: &[purchase::Model]) -> BTreeMap<i32, Vec<&purchase::Model>> {
    let mut grouped: BTreeMap<i32, Vec<&purchase::Model>> = BTreeMap::new();
    for p in purchases {
        grouped.entry(p.client_id).or_default().push(p);
    }
    grouped
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn month_key(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}

fn days_in_month(month: NaiveDate) -> i64 {
    month
        .checked_add_months(Months::new(1))
        .map_or(30, |next| (next - month).num_days())
}

/// First day of every month from `first` through `last`.
fn months(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut series = Vec::new();
    let mut current = month_start(first);
    while current <= last {
        series.push(current);
        match current.checked_add_months(Months::new(1)) {
            Some(next) => current = next,
            None => break,
        }
    }
    series
}

/// Month series for a window: the filter start (or `earliest`) up to the
/// filter end (or today).
fn window_months(filter: &DateFilter, earliest: Option<NaiveDate>) -> Vec<NaiveDate> {
    let first = filter.from().map(|from| from.date_naive()).or(earliest);
    let last = match filter {
        DateFilter::Between { end, .. } => *end,
        _ => Utc::now().date_naive(),
    };
    first.map(|first| months(first, last)).unwrap_or_default()
}

fn average(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        (total / Decimal::from(count)).round_dp(2)
    }
}

/// Average order value of one client.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn mean_check_for_client(
    db: &DatabaseConnection,
    principal: &Principal,
    client_id: i32,
    filter: &DateFilter,
) -> Result<ClientMeanCheck> {
    trace!("Entering mean_check_for_client function");
    ensure_client_access(db, principal, client_id).await?;
    let purchases = purchases_in(db, &[client_id], filter).await?;
    let total: Decimal = purchases.iter().map(|p| p.amount).sum();
    Ok(ClientMeanCheck {
        client_id,
        purchase_count: purchases.len() as u64,
        average_check: average(total, purchases.len()),
    })
}

/// Average order value over all clients, one bucket per month.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn mean_check_by_month(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<MonthlyValue>> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;

    let mut per_month: HashMap<NaiveDate, (Decimal, usize)> = HashMap::new();
    for p in &purchases {
        let bucket = per_month
            .entry(month_start(p.created_at.date_naive()))
            .or_default();
        bucket.0 += p.amount;
        bucket.1 += 1;
    }

    let earliest = purchases.first().map(|p| p.created_at.date_naive());
    if earliest.is_none() && matches!(filter, DateFilter::Unbounded) {
        return Ok(Vec::new());
    }
    Ok(window_months(filter, earliest)
        .into_iter()
        .map(|month| {
            let (total, count) = per_month.get(&month).copied().unwrap_or_default();
            MonthlyValue {
                month: month_key(month),
                value: average(total, count),
            }
        })
        .collect())
}

#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn active_clients(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<ActiveClients> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    let total = client_ids.len() as u64;
    let active = by_client(&purchases).len() as u64;
    Ok(ActiveClients {
        total_clients: total,
        active_clients: active,
        active_percentage: round_percentage(active, total),
    })
}

/// Clients grouped by the month of their very first purchase.
///
/// Only clients whose first purchase falls inside the filter are counted.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn cohorts(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<CohortBucket>> {
    let client_ids = scope(db, principal).await?;
    let history = purchases_in(db, &client_ids, &DateFilter::Unbounded).await?;

    let mut first_purchase: BTreeMap<i32, chrono::DateTime<Utc>> = BTreeMap::new();
    for p in &history {
        first_purchase.entry(p.client_id).or_insert(p.created_at);
    }
    let firsts: Vec<NaiveDate> = first_purchase
        .values()
        .filter(|at| filter.contains(**at))
        .map(|at| at.date_naive())
        .collect();
    if firsts.is_empty() {
        return Ok(Vec::new());
    }

    let mut per_month: HashMap<NaiveDate, u64> = HashMap::new();
    for date in &firsts {
        *per_month.entry(month_start(*date)).or_default() += 1;
    }
    Ok(window_months(filter, firsts.iter().min().copied())
        .into_iter()
        .map(|month| CohortBucket {
            month: month_key(month),
            clients: per_month.get(&month).copied().unwrap_or(0),
        })
        .collect())
}

#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn repeat_purchase_rate(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<RepeatPurchaseRate> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    let total = client_ids.len() as u64;
    let repeat = by_client(&purchases)
        .values()
        .filter(|made| made.len() > 1)
        .count() as u64;
    Ok(RepeatPurchaseRate {
        total_clients: total,
        repeat_clients: repeat,
        repeat_percentage: round_percentage(repeat, total),
    })
}

#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn churn_rate(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<ChurnRate> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    let total = client_ids.len() as u64;
    let churned = total.saturating_sub(by_client(&purchases).len() as u64);
    Ok(ChurnRate {
        total_clients: total,
        churned_clients: churned,
        churn_percentage: round_percentage(churned, total),
    })
}

/// Sum of positive purchase amounts per client that bought in the window.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn lifetime_values(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<ClientLtv>> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    let names: HashMap<i32, Option<String>> = client::Entity::find()
        .filter(client::Column::Id.is_in(client_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    Ok(by_client(&purchases)
        .into_iter()
        .filter_map(|(client_id, made)| {
            let ltv: Decimal = made
                .iter()
                .map(|p| p.amount)
                .filter(|amount| *amount > Decimal::ZERO)
                .sum();
            (ltv > Decimal::ZERO).then(|| ClientLtv {
                client_id,
                name: names.get(&client_id).cloned().flatten(),
                ltv,
            })
        })
        .collect())
}

/// Per month: revenue per buying client divided by the days of that month.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn average_ltv(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<MonthlyValue>> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;

    let mut per_month: HashMap<NaiveDate, HashMap<i32, Decimal>> = HashMap::new();
    for p in purchases.iter().filter(|p| p.amount > Decimal::ZERO) {
        *per_month
            .entry(month_start(p.created_at.date_naive()))
            .or_default()
            .entry(p.client_id)
            .or_default() += p.amount;
    }

    let earliest = purchases.first().map(|p| p.created_at.date_naive());
    if earliest.is_none() {
        return Ok(Vec::new());
    }
    Ok(window_months(filter, earliest)
        .into_iter()
        .map(|month| {
            let value = per_month.get(&month).map_or(Decimal::ZERO, |clients| {
                let total: Decimal = clients.values().copied().sum();
                let per_client = total / Decimal::from(clients.len());
                (per_client / Decimal::from(days_in_month(month))).round_dp(2)
            });
            MonthlyValue {
                month: month_key(month),
                value,
            }
        })
        .collect())
}

/// Distinct calendar days with a purchase, per client.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn activity_days(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<ClientActivityDays>> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    Ok(by_client(&purchases)
        .into_iter()
        .map(|(client_id, made)| {
            let days: BTreeSet<NaiveDate> = made.iter().map(|p| p.created_at.date_naive()).collect();
            ClientActivityDays {
                client_id,
                activity_days: days.len() as u64,
            }
        })
        .collect())
}

/// Purchases per day of the window; an unbounded window counts as one day.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn purchase_frequency(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<Vec<ClientPurchaseFrequency>> {
    let client_ids = scope(db, principal).await?;
    let purchases = purchases_in(db, &client_ids, filter).await?;
    let span = filter.span_days().unwrap_or(1).max(1) as f64;
    Ok(by_client(&purchases)
        .into_iter()
        .map(|(client_id, made)| ClientPurchaseFrequency {
            client_id,
            purchases: made.len() as u64,
            frequency: made.len() as f64 / span,
        })
        .collect())
}

/// The dashboard metrics, computed concurrently.
#[instrument(skip(db, principal), fields(user_id = principal.user_id))]
pub async fn main_metrics(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &DateFilter,
) -> Result<MainMetrics> {
    let (mean_check, active_clients, repeat_purchase, churn, ltv, activity_days, purchase_frequency) =
        tokio::try_join!(
            mean_check_by_month(db, principal, filter),
            active_clients(db, principal, filter),
            repeat_purchase_rate(db, principal, filter),
            churn_rate(db, principal, filter),
            lifetime_values(db, principal, filter),
            activity_days(db, principal, filter),
            purchase_frequency(db, principal, filter),
        )?;
    Ok(MainMetrics {
        mean_check,
        active_clients,
        repeat_purchase,
        churn,
        ltv,
        activity_days,
        purchase_frequency,
    })
}
