use std::path::PathBuf;

use clap::Parser;

use code_assistant_lib::analysis::AnalysisMode;
use code_assistant_lib::config::AssistantConfig;
use code_assistant_lib::panel::{initialization_failed, FieldState};
use code_assistant_lib::{load_snapshot, RunOptions};

#[derive(Parser)]
#[command(name = "code-assistant")]
#[command(about = "Capture code from a page snapshot and send it for analysis")]
struct Cli {
    /// Page snapshot JSON: one frame or a list of frames, top frame first
    snapshot: PathBuf,

    /// Analysis mode to submit: hints, suggestions, explanation, cleancode or solutions
    #[arg(short, long)]
    mode: Option<AnalysisMode>,

    /// Email sent along with the analysis request
    #[arg(long)]
    email: Option<String>,

    /// Capture through the context menu with this selection
    #[arg(long)]
    selection: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let setup = AssistantConfig::from_env()
        .and_then(|config| load_snapshot(&cli.snapshot).map(|frames| (config, frames)));
    let (config, frames) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("{}", initialization_failed(&e));
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        mode: cli.mode,
        email: cli.email,
        selection: cli.selection,
    };
    let report = match code_assistant_lib::run(config, frames, options).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error running code assistant: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== {} input ({:?}) ===", report.active_mode, report.prefill);
    println!("{}", report.input);

    match report.outcome {
        Some(FieldState::Result { title, text, incomplete }) => {
            println!("\n=== {} ===", title);
            println!("{}", text);
            if incomplete {
                println!("\n⚠️ The response may be incomplete.");
            }
        }
        Some(FieldState::Error(message)) => {
            eprintln!("\n❌ {}", message);
            std::process::exit(1);
        }
        Some(_) | None => {}
    }
}
