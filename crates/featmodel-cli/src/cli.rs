use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fmctl",
    about = "fmctl: validate, analyze, configure, export and publish feature models",
    version
)]
pub struct Cli {
    /// Engine settings (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the structural checks and the satisfiability check over a model
    Validate {
        /// Path to the model document (JSON)
        model: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check one concrete selection of features against a model
    CheckConfig {
        /// Path to the model document (JSON)
        model: String,

        /// Selected features, by name or id (repeatable or comma-separated)
        #[arg(long = "select", value_delimiter = ',')]
        select: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run structural analyses and report findings
    Analyze {
        /// Path to the model document (JSON)
        model: String,

        /// Analysis to run (repeatable); all analyses when omitted
        #[arg(long = "kind")]
        kinds: Vec<String>,

        /// Also report core, dead and false-optional features
        #[arg(long)]
        variability: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report how much of a model depends on one feature
    Impact {
        /// Path to the model document (JSON)
        model: String,

        /// Feature name or id
        feature: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate configurations with a heuristic strategy
    Generate {
        /// Path to the model document (JSON)
        model: String,

        /// Strategy: greedy, random, or beam_search
        #[arg(long, default_value = "greedy")]
        strategy: String,

        /// Seed for the random strategy
        #[arg(long)]
        seed: Option<u64>,

        /// Number of configurations; more than one switches to random sampling
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Reject configurations whose selection was already produced
        #[arg(long)]
        diverse: bool,

        /// Features the result must select (repeatable or comma-separated)
        #[arg(long = "require", value_delimiter = ',')]
        require: Vec<String>,

        /// Features the result must leave out (repeatable or comma-separated)
        #[arg(long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode a model in an interchange or diagram format
    Export {
        /// Path to the model document (JSON)
        model: String,

        /// Format: xml, splot_xml, tvl, dimacs, json, uvl, dot, or mermaid
        #[arg(long, default_value = "json")]
        format: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<String>,
    },

    /// Import a model as a new draft and publish it
    Publish {
        /// Path to the model document (JSON)
        model: String,

        /// Version store file; created when missing and saved afterwards
        #[arg(long)]
        store: Option<String>,

        /// Actor recorded on the new version
        #[arg(long, default_value = "fmctl")]
        actor: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
