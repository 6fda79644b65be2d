//! Core engine for the vigil agent runtime.
//!
//! The pieces assembled here form the agent's heartbeat:
//!
//! - [`safety::SafetyValidator`] gates every action and redacts secrets
//! - [`dispatcher::ToolDispatcher`] is the one chokepoint for tool calls
//! - [`planner::Planner`] runs the two-phase triage -> full-plan pipeline
//! - [`core_loop::CoreLoop`] drives the iteration state machine
//! - [`watchdog::Watchdog`] restarts the loop task if it dies
//! - [`runtime::Runtime`] wires everything into one explicit root object
//!
//! Cross-task influence on the loop goes exclusively through the
//! [`chat::ChatQueue`] and the [`wake::WakeSignal`]; only the loop task
//! mutates agent state and working memory.

pub mod budget_gate;
pub mod chat;
pub mod core_loop;
pub mod dispatcher;
pub mod notifier;
pub mod observer;
pub mod planner;
pub mod prompt;
pub mod runtime;
pub mod safety;
pub mod tools;
pub mod wake;
pub mod watchdog;

pub use core_loop::CoreLoop;
pub use dispatcher::ToolDispatcher;
pub use planner::Planner;
pub use runtime::Runtime;
pub use safety::SafetyValidator;
pub use tools::{Tool, ToolRegistry};
