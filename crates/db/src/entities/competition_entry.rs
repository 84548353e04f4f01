//! Competition entry entity: one participant's submission.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub competition_id: String,

    /// Owning participant. Unique together with `competition_id`.
    #[sea_orm(indexed)]
    pub user_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(nullable)]
    pub media_url: Option<String>,

    /// Always equals the number of votes referencing this entry.
    pub vote_count: i32,

    /// Null while the entry is still an editable draft.
    #[sea_orm(nullable)]
    pub submitted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    #[must_use]
    pub const fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// Whether there is anything to submit: a non-blank description or media.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
            || self
                .media_url
                .as_deref()
                .is_some_and(|m| !m.trim().is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::competition::Entity",
        from = "Column::CompetitionId",
        to = "super::competition::Column::Id",
        on_delete = "Cascade"
    )]
    Competition,
    #[sea_orm(has_many = "super::competition_vote::Entity")]
    Vote,
}

impl Related<super::competition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Competition.def()
    }
}

impl Related<super::competition_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
