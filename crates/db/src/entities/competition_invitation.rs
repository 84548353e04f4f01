//! Competition invitation entity.
//!
//! Tracks per-slot invitations for curated 1-on-1 competitions and the
//! challenge sent to the named opponent of a direct challenge.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::competition::Slot;

/// Status of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum InvitationStatus {
    /// Invitation is waiting for the invitee.
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    /// Invitee took the slot.
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Invitee turned the slot down.
    #[sea_orm(string_value = "declined")]
    Declined,
    /// Nobody answered before `expires_at`.
    #[sea_orm(string_value = "expired")]
    Expired,
    /// An admin gave the slot to someone else.
    #[sea_orm(string_value = "replaced")]
    Replaced,
}

impl InvitationStatus {
    /// Whether this invitation still holds its slot.
    #[must_use]
    pub const fn holds_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "competition_invitation")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub competition_id: String,

    #[sea_orm(indexed)]
    pub invitee_id: String,

    /// Admin or challenger who sent the invitation.
    pub inviter_id: String,

    pub slot: Slot,

    pub status: InvitationStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub message: Option<String>,

    pub expires_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub responded_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
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
}

impl Related<super::competition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Competition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
