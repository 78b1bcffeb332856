//! 流程层（Workflow Layer）
//!
//! - `store`：唯一持有控制台状态的仓库，命令进、事件出
//! - `ledger`：需要远程确认的变更台账

pub mod ledger;
pub mod store;

pub use ledger::{LedgerStats, MutationId, MutationKind, MutationLedger, MutationRecord, MutationState, Settlement};
pub use store::{Command, ConsoleStore, DispatchOutcome, Rejection, StoreEvent};
