use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

use latency_lab::bench::{aggregate, BenchmarkRunner};
use latency_lab::client::{ClientTimingCollector, ObservedClient, RequestExecutor, ResponseEvents};
use latency_lab::clock::SystemClock;
use latency_lab::config::{
    BenchmarkConfig, DEFAULT_ENDPOINT, DEFAULT_ITERATIONS, DEFAULT_PROGRESS_EVERY, DEFAULT_WARMUP,
};

#[derive(Parser, Debug)]
#[command(
    name = "latency-bench",
    about = "Measure create-user latency against a running latency-lab server"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sequential benchmark with warmup, printing min/max/avg/median/p95/p99
    Run(RunArgs),
    /// Create one user and print the client and server timings
    Create(CreateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Full URL of the endpoint to POST to
    #[arg(long, env = "BENCH_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Measured requests
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Discarded requests before measuring
    #[arg(long, default_value_t = DEFAULT_WARMUP)]
    warmup: usize,

    /// Print progress after this many measured requests
    #[arg(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
    progress_every: usize,

    /// Pause between warmup requests in milliseconds
    #[arg(long, default_value_t = 0)]
    warmup_pause_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long, env = "BENCH_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args).await,
        Command::Create(args) => create(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let config = BenchmarkConfig::try_new(&args.endpoint, args.iterations, args.warmup)?
        .with_progress_every(args.progress_every)?
        .with_warmup_pause(Duration::from_millis(args.warmup_pause_ms));

    let clock = SystemClock::shared();
    let executor = RequestExecutor::new(clock.clone())?;
    let runner = BenchmarkRunner::new(config, executor, clock);

    let config = runner.config();
    println!(
        "Running {} requests to {} ({} warmup)...\n",
        config.iterations, config.endpoint, config.warmup
    );

    let series = runner
        .run_with_progress(|p| {
            print!("Progress: {}/{}\r", p.completed, p.total);
            let _ = io::stdout().flush();
        })
        .await;

    let report = aggregate(&series).context("benchmark produced no usable measurements")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n\nResults:");
        println!("{report}");
    }
    Ok(())
}

async fn create(args: CreateArgs) -> Result<()> {
    let url = Url::parse(&args.endpoint)
        .with_context(|| format!("invalid endpoint URL: {}", args.endpoint))?;
    let path = url.path().to_owned();
    let body = json!({ "username": args.username, "email": args.email });

    let client = ObservedClient::new(SystemClock::shared(), ResponseEvents::new())?;
    let collector = ClientTimingCollector::attached_to(&client);

    let tracked = collector
        .track(|e| e.path_is(&path), || client.post_json(&url, &body))
        .await?;

    let sample = tracked.sample;
    let response = tracked.outcome;

    println!("Status:            {}", response.status);
    if let Some(id) = &response.request_id {
        println!("Request ID:        {id}");
    }
    match response.body.get("error").and_then(|e| e.as_str()) {
        Some(error) => println!("Error:             {error}"),
        None => println!("User:              {}", response.body["user"]),
    }
    println!();
    println!("Button click:      {}", iso(sample.action_time()));
    println!("Request sent:      {}", iso(sample.request_sent_time()));
    println!("Response received: {}", iso(sample.response_received_time()));
    println!("Dispatch delay:    {:.2}ms", sample.dispatch_delay());
    println!("Client duration:   {:.2}ms", sample.client_duration());
    if let Some(server) = response.body.get("requestDuration").and_then(|d| d.as_f64()) {
        println!("Server duration:   {server:.2}ms");
    }
    if let Some(ts) = response.body.get("timestamp").and_then(|t| t.as_f64()) {
        println!("Server timestamp:  {}", iso(ts));
    }
    Ok(())
}

fn iso(ms: f64) -> String {
    chrono::DateTime::from_timestamp_millis(ms as i64)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{ms:.3}"))
}
