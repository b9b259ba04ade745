// Copyright 2026 Omnio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "omnio", version, about = "Embedded content-addressed object store")]
pub struct Cli {
    /// Enable debug-level logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Omnio root in the current directory
    Init {
        /// Bucket name
        #[arg(long, default_value = "default")]
        bucket: String,

        /// Default part size in bytes
        #[arg(long, default_value_t = 8 * 1024 * 1024)]
        part_size: u64,
    },

    /// Write an object, reading its bytes from a file or stdin
    Put(PutArgs),

    /// Read an object's bytes to a file or stdout
    Get(GetArgs),

    /// Show whether a path is an object, a directory, both, or neither
    Stat(PathArgs),

    /// List the objects and directories directly under a directory
    Ls(LsArgs),

    /// Move an object's catalog row to trash
    Rm(PathArgs),

    /// Permanently delete a trashed object and its entity directory
    Purge(PurgeArgs),

    /// Move an object from one path to another
    Mv(MoveArgs),

    /// Copy an object from one path to another
    Cp(MoveArgs),

    /// Full-text search over object descriptions
    Search(SearchArgs),

    /// Check that every cataloged object still has an entity on disk
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script to stdout
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Destination object path
    pub path: String,

    /// Source file (reads stdin when omitted)
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Write flag: w (create), a (append), wx (create-exclusive), ax (append-exclusive)
    #[arg(long, default_value = "w")]
    pub flag: String,

    /// Part size in bytes for this write
    #[arg(long)]
    pub part_size: Option<u64>,

    /// MIME type
    #[arg(long)]
    pub mime_type: Option<String>,

    /// Object tag; may be repeated
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Free-text description, indexed for search
    #[arg(long)]
    pub description: Option<String>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Source object path
    pub path: String,

    /// Destination file (writes stdout when omitted, unless --json is set)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Print a JSON summary instead of the raw bytes; requires --out
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    /// Object path
    pub path: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Object id returned by `rm`
    pub object_id: String,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory to list (root when omitted)
    pub dir: Option<String>,

    /// List trashed objects instead of live ones
    #[arg(long)]
    pub trash: bool,

    /// Number of entries to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Maximum entries to return
    #[arg(long, default_value_t = 100)]
    pub take: usize,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Source object path
    pub src: String,

    /// Destination object path
    pub dst: String,

    /// Fail instead of overwriting an existing object at the destination
    #[arg(long)]
    pub exclusive: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Directory to search under (root when omitted)
    #[arg(long)]
    pub dir: Option<String>,

    /// Search directories beneath `dir` too
    #[arg(long)]
    pub recursive: bool,

    /// Number of hits to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Maximum hits to return
    #[arg(long, default_value_t = 10)]
    pub take: usize,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}
