mod commands;

pub use commands::{djson, indexify, rewrite, Cli, Commands};
