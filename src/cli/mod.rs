//! Command line interface
//!
//! - `serve`: run the HTTP API
//! - `convert`: convert one local file and print or save the Markdown

pub mod convert;
pub mod serve;

use clap::{Parser, Subcommand};

/// mathmark - math-aware PDF and image to Markdown conversion
#[derive(Parser)]
#[command(name = "mathmark")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Convert a single file without starting the server
    Convert(convert::ConvertArgs),
}
