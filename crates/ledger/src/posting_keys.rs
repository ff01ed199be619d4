//! Idempotency keys: one row per `(source_type, source_id, event_kind)`,
//! pointing at the entry that recorded that business event.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EventKind, SourceType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posting_keys")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_type: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub event_kind: String,
    pub entry_id: Uuid,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entries::Entity",
        from = "Column::EntryId",
        to = "super::entries::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Entries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn new(
        source_type: SourceType,
        source_id: &str,
        event_kind: EventKind,
        entry_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_type: ActiveValue::Set(source_type.as_str().to_string()),
            source_id: ActiveValue::Set(source_id.to_string()),
            event_kind: ActiveValue::Set(event_kind.as_str().to_string()),
            entry_id: ActiveValue::Set(entry_id),
            created_at: ActiveValue::Set(created_at),
        }
    }
}
