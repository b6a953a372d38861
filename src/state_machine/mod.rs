// State machine module for the editorial workflow
//
// Statuses, the events that move a work item between them, and the pure
// transition table the stores enforce through conditional transitions.

pub mod errors;
pub mod events;
pub mod states;
pub mod work_item_state_machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use events::WorkItemEvent;
pub use states::{ReviewDecision, WorkItemStatus};
pub use work_item_state_machine::{determine_target_state, source_states, target_state};
