use clap::Parser;

use gui_act::cli::Cli;
use gui_act::report::{JsonMode, ReportBuilder, ReportError, ResultCode};

#[tokio::main]
async fn main() {
    gui_act::init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let report = ReportBuilder::start("unknown").fail(
                ResultCode::UsageError,
                "Invalid command line.",
                ReportError::new(
                    "ArgumentError",
                    e.to_string().trim(),
                    Some("Run `gui-act --help` for available commands."),
                ),
                serde_json::json!({}),
            );
            println!("{}", report.render(JsonMode::Compact));
            std::process::exit(report.exit_code());
        }
    };

    let mode = cli.json_mode;
    let report = gui_act::run(cli).await;
    println!("{}", report.render(mode));
    std::process::exit(report.exit_code());
}
