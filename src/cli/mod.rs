//! CLI module for PMP Translator
//!
//! - `serve`: HTTP API server
//! - `translate`: one translation from the command line

pub mod serve;
pub mod translate;

use clap::{Parser, Subcommand};

/// PMP Translator - rewrite content between developer and product language
#[derive(Parser)]
#[command(name = "pmp-translator")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Translate one piece of content and print the result as JSON lines
    Translate(translate::TranslateArgs),
}
