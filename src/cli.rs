use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docpipe")]
#[command(
    version,
    about = "Render business documents to PDF and deliver them",
    long_about = "docpipe renders a quote or invoice page in a headless browser, prints it to an A4 PDF and delivers it.\n\nCommands:\n- serve: run the HTTP surface (GET /api/generate-pdf/{id}).\n- render: run one document through the pipeline and print the result.\n- doctor: show the detected environment and which browser would be used.\n\nOn read-only serverless hosts an upload URL is required; locally PDFs are written to the output directory."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, value_enum, default_value = "text", help = "Log output format")]
    pub log_format: LogFormat,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML); defaults to ~/.config/docpipe/config.toml. CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the PDF generation endpoint over HTTP
    Serve {
        #[arg(long, value_name = "ADDR", help = "Bind address (default from config: 127.0.0.1:8080)")]
        bind: Option<String>,

        #[arg(long, value_enum, help = "Force the execution mode instead of detecting it")]
        mode: Option<ModeArg>,
    },
    /// Render one document and deliver it
    Render {
        #[arg(long = "type", value_name = "KIND", help = "Document type (quote or invoice)")]
        kind: String,

        #[arg(long, value_name = "ID", help = "Document id")]
        id: String,

        #[arg(long, value_name = "URL", help = "Render this page instead of the default page URL")]
        url: Option<String>,

        #[arg(long, value_name = "URL", help = "Pre-authorized upload URL for remote storage")]
        upload_url: Option<String>,

        #[arg(long, value_enum, help = "Force the execution mode instead of detecting it")]
        mode: Option<ModeArg>,

        #[arg(long, value_name = "PATH", help = "Local output directory (overrides config)")]
        output_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,
    },
    /// Show the detected environment and browser resolution
    Doctor {
        #[arg(long, value_enum, help = "Force the execution mode instead of detecting it")]
        mode: Option<ModeArg>,

        #[arg(long, value_enum, default_value = "json", help = "Output format")]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Local,
    Serverless,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

pub fn parse() -> Cli {
    Cli::parse()
}
