use clap::{Parser, Subcommand};
use marketlens::{config, history, reports, run};
use marketlens_api::ReportSort;
use marketlens_core::Budget;

#[derive(Parser)]
#[command(
    name = "marketlens",
    version,
    about = "marketlens CLI - run multi-agent investment research from the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a research query and stream the agents' progress
    Run {
        /// The research question, e.g. "Compare NVDA and AMD margins"
        query: String,

        /// Research budget for this run (low, medium, high)
        #[arg(long)]
        budget: Option<Budget>,

        /// Show plan steps expanded in the final transcript
        #[arg(long)]
        expand_plans: bool,

        /// Only print the settled transcript
        #[arg(long, short)]
        quiet: bool,
    },

    /// Show the saved report of a session
    Report {
        session_id: String,

        /// Print the markdown body only
        #[arg(long)]
        raw: bool,
    },

    /// List recent reports
    Reports {
        /// Number of reports to fetch (defaults to display.recent_limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Keep reports whose title or query contains this text
        #[arg(long)]
        search: Option<String>,

        /// date-desc, date-asc, title-asc or title-desc
        #[arg(long, default_value = "date-desc")]
        sort: ReportSort,
    },

    /// List past sessions, or show one session's messages and reports
    History { session_id: Option<String> },

    /// Show or set configuration
    Config {
        /// Set the server URL
        #[arg(long)]
        server: Option<String>,

        /// Set the default research budget
        #[arg(long)]
        budget: Option<Budget>,

        /// Override one LLM role: ROLE=PROVIDER:MODEL (repeatable)
        #[arg(long = "model")]
        models: Vec<String>,

        /// Start from defaults instead of the saved file
        #[arg(long)]
        reset: bool,
    },

    /// Check that the server is reachable
    Health,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            query,
            budget,
            expand_plans,
            quiet,
        } => run::run_query(&query, budget, expand_plans, quiet).await,
        Commands::Report { session_id, raw } => reports::run_report(&session_id, raw).await,
        Commands::Reports {
            limit,
            search,
            sort,
        } => reports::run_reports(limit, search, sort).await,
        Commands::History { session_id } => history::run_history(session_id.as_deref()).await,
        Commands::Config {
            server,
            budget,
            models,
            reset,
        } => {
            if server.is_none() && budget.is_none() && models.is_empty() && !reset {
                config::show_config()
            } else {
                config::set_config(server, budget, models, reset)
            }
        }
        Commands::Health => history::run_health().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
