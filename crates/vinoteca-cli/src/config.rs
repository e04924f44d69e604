use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use vinoteca_core::{CellarFilter, PersonalEntry, SortOption, WinePatch, WineType};

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "vinoteca")]
#[command(author, version, about = "Wine tasting journal with AI-assisted research")]
#[command(after_help = "Examples:
  vinoteca research \"Cloudy Bay Sauvignon Blanc 2022\" --save --rating 4.5
  vinoteca list --type red --cellar --sort rating
  vinoteca ask \"What should I open with roast lamb?\"
  vinoteca export --format jsonl > wines.jsonl")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Google Gemini API key, needed by `research` and `ask`
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Path to the TOML configuration file
    #[arg(long, env = "VINOTECA_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Research a wine with Gemini and optionally save it
    #[command(after_help = "Examples:
  vinoteca research \"Barolo Brunate 2016\"
  vinoteca research \"Chablis\" --image label.jpg --save --cellar")]
    Research {
        /// Wine name to look up
        name: String,
        /// Photo of the bottle or label to send along with the name
        #[arg(short, long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Save the researched wine to the journal
        #[arg(short, long)]
        save: bool,
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// Add a wine manually, without research
    Add {
        /// Wine name
        name: String,
        #[command(flatten)]
        details: DetailArgs,
        #[command(flatten)]
        entry: EntryArgs,
    },
    /// List wines, with optional search, filters and sort
    #[command(after_help = "Examples:
  vinoteca list pinot
  vinoteca list --type red --type rose --cellar
  vinoteca list --sort name-az")]
    List {
        /// Case-insensitive text matched against name, notes and varietal
        search: Option<String>,
        /// Only wines of this type (repeatable)
        #[arg(short = 't', long = "type", value_name = "TYPE")]
        types: Vec<WineType>,
        /// Only wines in the cellar
        #[arg(long, conflicts_with = "not_in_cellar")]
        cellar: bool,
        /// Only wines not in the cellar
        #[arg(long)]
        not_in_cellar: bool,
        /// Sort order
        #[arg(short, long, default_value = "date-added")]
        sort: SortArg,
    },
    /// Show every field of one wine
    Show {
        /// Wine id
        id: String,
    },
    /// Change fields of a wine
    #[command(after_help = "Example: vinoteca edit 3f2c… --rating 4 --notes \"opened up after an hour\"")]
    Edit {
        /// Wine id
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        details: DetailArgs,
        /// Personal rating, 1 to 5 in half stars (0 clears it)
        #[arg(short, long)]
        rating: Option<f64>,
        /// Tasting notes
        #[arg(short, long)]
        notes: Option<String>,
        /// Whether the wine is in the cellar
        #[arg(long, value_name = "BOOL")]
        in_cellar: Option<bool>,
    },
    /// Delete a wine
    Delete {
        /// Wine id
        id: String,
    },
    /// Ask for a recommendation based on your cellar and ratings
    Ask {
        /// Question for the sommelier
        question: String,
    },
    /// Export the journal
    #[command(after_help = "Examples:
  vinoteca export --format jsonl > wines.jsonl
  vinoteca export --format csv --limit 100")]
    Export {
        /// Output format for exported data
        #[arg(short, long, default_value = "jsonl")]
        format: ExportFormat,
        /// Maximum number of wines to export
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Import wines from a JSON or JSON Lines export
    Import {
        /// File to import
        path: PathBuf,
    },
    /// Show journal statistics
    Stats,
}

/// Descriptive fields settable on add and edit
#[derive(Args, Debug, Default)]
pub struct DetailArgs {
    /// Vintage year (0 for non-vintage)
    #[arg(long)]
    pub vintage: Option<u32>,
    /// Grape variety
    #[arg(long)]
    pub varietal: Option<String>,
    /// Country of origin
    #[arg(long)]
    pub country: Option<String>,
    /// Wine type: red, white, rose, sparkling, dessert or unknown
    #[arg(short = 't', long = "type", value_name = "TYPE")]
    pub wine_type: Option<WineType>,
    /// Price in USD
    #[arg(long)]
    pub price: Option<f64>,
}

/// Personal fields given when saving a new wine
#[derive(Args, Debug, Default)]
pub struct EntryArgs {
    /// Personal rating, 1 to 5 in half stars
    #[arg(short, long, default_value_t = 0.0)]
    pub rating: f64,
    /// Tasting notes
    #[arg(short, long, default_value = "")]
    pub notes: String,
    /// The wine is in the cellar
    #[arg(long)]
    pub cellar: bool,
}

impl EntryArgs {
    pub fn personal(&self) -> PersonalEntry {
        PersonalEntry {
            rating: self.rating,
            notes: self.notes.clone(),
            in_cellar: self.cellar,
        }
    }
}

impl DetailArgs {
    /// Patch with the given fields set and everything else untouched.
    pub fn into_patch(self) -> WinePatch {
        WinePatch {
            vintage: self.vintage,
            varietal: self.varietal,
            country: self.country,
            wine_type: self.wine_type,
            price: self.price,
            ..WinePatch::default()
        }
    }
}

/// Cellar filter from the two list flags.
pub fn cellar_filter(cellar: bool, not_in_cellar: bool) -> CellarFilter {
    match (cellar, not_in_cellar) {
        (true, _) => CellarFilter::Only(true),
        (false, true) => CellarFilter::Only(false),
        (false, false) => CellarFilter::All,
    }
}

/// Sort orders accepted by `list`
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    /// Newest first
    DateAdded,
    /// Highest personal rating first
    Rating,
    /// Name, A to Z
    NameAz,
    /// Name, Z to A
    NameZa,
}

impl From<SortArg> for SortOption {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::DateAdded => SortOption::DateAdded,
            SortArg::Rating => SortOption::Rating,
            SortArg::NameAz => SortOption::NameAz,
            SortArg::NameZa => SortOption::NameZa,
        }
    }
}

/// Supported export formats
#[derive(Debug, Clone, ValueEnum)]
pub enum ExportFormat {
    /// JSON Lines format (one JSON object per line)
    Jsonl,
    /// Standard JSON array format
    Json,
    /// CSV format (comma-separated values)
    Csv,
}
