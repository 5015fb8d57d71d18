// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use askdesk_core::adapter::EndpointAdapter;
use askdesk_core::capability::task_type_supported;
use askdesk_core::config::ChatConfig;
use askdesk_core::probe::{ProbeReport, probe};
use askdesk_core::session::{ChatSession, FailureNotice};
use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Check => {
            let config = load_config(args.endpoint.as_deref())?;
            block_on(check(&config))?;
        }
        Commands::Probe { question, json } => {
            let config = load_config(args.endpoint.as_deref())?;
            let report = block_on(async {
                let adapter = EndpointAdapter::from_config(&config, reqwest::Client::new());
                probe(&adapter, &config.endpoint_name, question).await
            })?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_probe(&report);
            }
        }
        Commands::Ask { question } => {
            let config = load_config(args.endpoint.as_deref())?;
            block_on(ask(&config, question))??;
        }
    }

    Ok(())
}

fn load_config(endpoint: Option<&str>) -> Result<ChatConfig> {
    let config = ChatConfig::from_lookup(|name| match (name, endpoint) {
        ("SERVING_ENDPOINT", Some(endpoint)) => Some(endpoint.to_string()),
        _ => std::env::var(name).ok(),
    })?;
    log::debug!("using serving endpoint {}", config.endpoint_name);
    Ok(config)
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Runtime::new()?;
    Ok(runtime.block_on(future))
}

async fn check(config: &ChatConfig) {
    let adapter = EndpointAdapter::from_config(config, reqwest::Client::new());
    let name = &config.endpoint_name;
    let limit = adapter.chain().timeout();
    let lookup = tokio::time::timeout(limit, adapter.control_plane().get_endpoint(name)).await;
    match lookup {
        Ok(Ok(ep)) => {
            let task = ep.task_type.as_deref();
            println!("endpoint:  {}", ep.name);
            println!("task type: {}", task.unwrap_or("<none>"));
            if let Some(ready) = ep.state.and_then(|s| s.ready) {
                println!("ready:     {ready}");
            }
            println!("supported: {}", task_type_supported(task));
        }
        Ok(Err(e)) => {
            println!("endpoint:  {name}");
            println!("task type: unknown ({e})");
            println!("supported: true (not verifiable, allowed)");
        }
        Err(_) => {
            println!("endpoint:  {name}");
            println!("task type: unknown (lookup timed out after {limit:?})");
            println!("supported: true (not verifiable, allowed)");
        }
    }
}

async fn ask(config: &ChatConfig, question: &str) -> Result<()> {
    let adapter = EndpointAdapter::from_config(config, reqwest::Client::new());
    let mut session = ChatSession::new(config);
    session.open();

    let outcome = session
        .submit(question, &adapter)
        .await
        .map_err(|e| Error::Custom(e.to_string()))?;
    println!("{}", outcome.reply.content);

    if let Some(notice) = outcome.notice {
        eprintln!("{} {}", notice.headline(), notice.guidance());
        if let FailureNotice::MultipleAttemptsFailed { details } = &notice {
            eprintln!("Technical details: {details}...");
        }
    }
    Ok(())
}

fn print_probe(report: &ProbeReport) {
    println!("endpoint: {}", report.endpoint);
    match &report.info {
        Ok(info) => println!(
            "task type: {} (ready: {}, supported: {})",
            info.task_type.as_deref().unwrap_or("<none>"),
            info.ready.as_deref().unwrap_or("unknown"),
            info.supported
        ),
        Err(e) => println!("task type: unknown ({e})"),
    }
    println!("question: {}", report.question);
    println!();

    for attempt in &report.attempts {
        let mark = if attempt.success { "ok  " } else { "FAIL" };
        println!("[{mark}] {}: {}", attempt.strategy, attempt.detail);
    }

    println!();
    match report.working_strategy() {
        Some(strategy) => println!("working strategy: {strategy}"),
        None => println!("no strategy reached the endpoint"),
    }
}
