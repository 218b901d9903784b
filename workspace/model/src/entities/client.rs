use sea_orm::entity::prelude::*;
use sea_orm::Set;

/// A customer of a business. Ownership is expressed through `user_clients`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "clients")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: Option<String>,
    pub phone: String,
    pub email: Option<String>,
    pub birth_date: Option<Date>,
    /// Share of every purchase credited back, in whole percent.
    pub cashback_percentage: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_client::Entity")]
    UserClient,
    #[sea_orm(has_many = "super::visit::Entity")]
    Visit,
    #[sea_orm(has_many = "super::purchase::Entity")]
    Purchase,
    #[sea_orm(has_many = "super::cashback_transaction::Entity")]
    CashbackTransaction,
}

impl Related<super::visit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Visit.def()
    }
}

impl Related<super::purchase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchase.def()
    }
}

impl Related<super::cashback_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashbackTransaction.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        super::user_client::Relation::User.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::user_client::Relation::Client.def().rev())
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}
