//! Business logic services.

#![allow(missing_docs)]

pub mod competition;
pub mod ledger;
pub mod notifier;

pub use competition::{
    Acquisition, Actor, CompetitionEngine, CompetitionView, CreateCompetitionInput, EntryInput,
    EntryView, InviteInput, Settlement, SettlementPlan, Stores, SweepReport, VoteStats,
    plan_head_to_head, plan_open,
};
pub use ledger::{NoOpLedger, RewardEffect, RewardLedger, RewardLedgerService, RewardReason, StatsLedger};
pub use notifier::{NoOpNotifier, NotificationKind, Notifier, NotifierService, TracingNotifier};
