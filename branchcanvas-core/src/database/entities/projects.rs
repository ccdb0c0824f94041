use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub last_modified: ChronoDateTimeUtc,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub fn new(title: String) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Set(uuid::Uuid::new_v4().to_string()),
            title: Set(title),
            last_modified: Set(now),
            created_at: Set(now),
        }
    }

    /// Move `last_modified` past `previous`, to now when the clock allows.
    pub fn touch(mut self, previous: ChronoDateTimeUtc) -> Self {
        let now = chrono::Utc::now();
        self.last_modified = Set(if now > previous {
            now
        } else {
            previous + chrono::Duration::milliseconds(1)
        });
        self
    }
}

