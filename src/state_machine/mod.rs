// Task lifecycle state machine
//
// Four states, three events. Transitions are validated so a task cannot be
// completed twice or restarted after reaching a terminal state.

pub mod events;
pub mod states;

pub use events::TaskEvent;
pub use states::TaskState;
