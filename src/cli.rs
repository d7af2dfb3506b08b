use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(name = "runtar")]
#[command(version)]
#[command(about = "A Rust tar utility for classic fixed-header archives", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["create", "extract", "list"])))]
#[command(after_help = "Examples:\n  \
  runtar --create out.tar docs notes.txt   archive a directory and a file\n  \
  runtar --extract out.tar restored        extract out.tar into restored/\n  \
  runtar --list -v out.tar                 show entries with sizes")]
pub struct Cli {
    /// Create ARCHIVE from the given files and directories
    #[arg(short = 'c', long, value_name = "ARCHIVE")]
    pub create: Option<String>,

    /// Extract ARCHIVE into the given directory
    #[arg(short = 'x', long, value_name = "ARCHIVE")]
    pub extract: Option<String>,

    /// List the entries of ARCHIVE
    #[arg(short = 't', long, value_name = "ARCHIVE")]
    pub list: Option<String>,

    /// Paths to archive, or the output directory when extracting
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Directory entry names are relative to (default: current directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    pub root: Option<String>,

    /// Skip inputs outside the root instead of stripping "../" from their names
    #[arg(long)]
    pub reject_outside_root: bool,

    /// Verify header checksums while reading
    #[arg(long)]
    pub verify: bool,

    /// List verbosely / enable debug logging
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
