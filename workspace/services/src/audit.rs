use model::entities::log;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tracing::{debug, instrument, warn};

/// User id recorded for actions the system performs on its own.
pub const SYSTEM_USER_ID: i32 = 0;

pub const CREATE: &str = "CREATE";
pub const UPDATE: &str = "UPDATE";
pub const DELETE: &str = "DELETE";
pub const ADD_CLIENT_TO_USER: &str = "ADD_CLIENT_TO_USER";
pub const MAIL: &str = "MAIL";
pub const PAYMENT: &str = "PAYMENT";
pub const EXPIRE: &str = "EXPIRE";

/// Appends an audit row. Best-effort: a failed write is logged and dropped,
/// the triggering operation has already succeeded.
#[instrument(skip(db))]
pub async fn record<C>(db: &C, user_id: i32, action: &str, entity: &str, entity_id: i32)
where
    C: ConnectionTrait,
{
    let row = log::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_string()),
        entity: Set(entity.to_string()),
        entity_id: Set(entity_id),
        ..Default::default()
    };

    match row.insert(db).await {
        Ok(saved) => debug!("Audit row {} written", saved.id),
        Err(e) => warn!(
            "Failed to write audit row {} {} {} for user {}: {}",
            action, entity, entity_id, user_id, e
        ),
    }
}
