//! Generic utility primitives with zero domain knowledge.
//!
//! - `command` - Command execution with streamed output and error handling
//! - `shell` - Shell escaping and quoting

pub mod command;
pub mod shell;
