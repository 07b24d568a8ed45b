mod cli;
mod commands;
mod formatting;
mod logging;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_doctor, run_render, run_serve, RenderArgs};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let args = cli::parse();

    // Local development reads DOCPIPE_* from a .env next to the pages app.
    if matches!(args.command, Commands::Serve { .. }) {
        dotenvy::dotenv().ok();
    }
    logging::init_tracing(args.verbose, args.log_format);

    match args.command {
        Commands::Serve { bind, mode } => run_serve(args.config, bind, mode).await,
        Commands::Render {
            kind,
            id,
            url,
            upload_url,
            mode,
            output_dir,
            format,
            output,
        } => {
            run_render(
                args.config,
                RenderArgs {
                    kind,
                    id,
                    url,
                    upload_url,
                    mode,
                    output_dir,
                },
                format,
                output,
            )
            .await
        }
        Commands::Doctor { mode, format } => run_doctor(args.config, mode, format).await,
    }
}
