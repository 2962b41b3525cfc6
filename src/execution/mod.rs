pub mod executor;

pub use executor::{tail_text, CommandExecutor, TAIL_BYTES};
