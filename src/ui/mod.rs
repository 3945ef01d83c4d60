pub mod commands;
pub mod repl;

pub use commands::{parse_command, Command, DisplayOptions};
pub use repl::{Flow, Repl};
