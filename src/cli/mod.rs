//! Terminal front end: input, colored output and the chat loop

pub mod chat;
pub mod console;
pub mod input;

pub use chat::{ChatCommand, ChatLoop};
pub use console::Console;
pub use input::{Interrupt, LineInput, ReaderInput, ThreadedInput};
