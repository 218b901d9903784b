use sea_orm::entity::prelude::*;
use sea_orm::Set;

/// Audit trail row. `user_id` 0 marks actions of the system itself.
///
/// No foreign key: audit rows outlive their subjects.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub action: String,
    pub entity: String,
    pub entity_id: i32,
    pub timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.timestamp.is_not_set() {
            self.timestamp = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}
