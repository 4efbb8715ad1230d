use clap::{Parser, Subcommand};

use crate::config::Backend;

#[derive(Parser, Debug)]
#[command(name = "stellarforge")]
#[command(version, about = "World notes with debounced autosave")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stellarforge project in the current directory
    Init {
        /// Storage backend (loro or sqlite)
        #[arg(long, default_value = "loro")]
        backend: Backend,

        /// Quiet period in milliseconds before an edit is saved
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Show the note for a world
    Show {
        /// World ID
        world: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit a world's note from stdin, autosaving as lines arrive
    Edit {
        /// World ID
        world: String,

        /// Actor ID (defaults to config, $STELLARFORGE_ACTOR, then git user.email)
        #[arg(long)]
        actor: Option<String>,

        /// Each line replaces the whole note instead of being appended
        #[arg(long)]
        replace: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all notes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
