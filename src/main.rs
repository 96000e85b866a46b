//! Example run: the same workload through a pass-through, a fixed-latency link and the
//! secure module, reporting the secure module's slowdown.

use anyhow::Context;
use clap::Parser;
use secure_mem_sim::config::SimConfig;
use secure_mem_sim::event::Tick;
use secure_mem_sim::link::FixedLatencyLink;
use secure_mem_sim::memory::SimpleMemory;
use secure_mem_sim::metrics::RunMetrics;
use secure_mem_sim::pipe::PassThrough;
use secure_mem_sim::secure_module::SecureModule;
use secure_mem_sim::simulator::System;
use secure_mem_sim::workload::TrafficGenerator;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML file with [secure_module], [link], [memory] and [workload] tables.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides workload.num_requests.
    #[arg(long)]
    requests: Option<usize>,

    /// Tick budget per run.
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: Tick,
}

fn print_run(title: &str, m: &RunMetrics) {
    println!("--- {title} ({}) ---", m.component);
    println!("  Total ticks:         {}", m.total_ticks);
    println!("  Responses:           {}", m.responses_received);
    println!("  Avg round trip:      {:.2}", m.avg_round_trip());
    println!("  Max round trip:      {}", m.max_round_trip_ticks);
    println!("  Request rejections:  {}", m.request_rejections);
    println!("  Memory rejections:   {}", m.memory_rejections);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    if let Some(n) = args.requests {
        config.workload.num_requests = n;
    }

    let requester = || TrafficGenerator::new(config.workload.clone());
    let memory = || SimpleMemory::new(config.memory.clone());

    println!("=== Secure Memory Module Benchmark ===\n");

    let baseline = System::new(PassThrough::new(requester(), memory()))
        .run_to_completion(args.max_ticks)
        .context("pass-through run")?;
    print_run("Baseline", &baseline);

    let link = FixedLatencyLink::new(config.link.clone(), requester(), memory())?;
    let linked = System::new(link)
        .run_to_completion(args.max_ticks)
        .context("fixed-latency link run")?;
    println!();
    print_run("Fixed-latency link", &linked);

    let module = SecureModule::new(config.secure_module.clone(), requester(), memory())?;
    let mut secure = System::new(module);
    let guarded = secure
        .run_to_completion(args.max_ticks)
        .context("secure module run")?;
    println!();
    print_run("Secure module", &guarded);
    let stats = secure.component().stats();
    println!("  Read requests:       {}", stats.read_reqs());
    println!("  Write requests:      {}", stats.write_reqs());

    println!("\n--- Quantified slowdown vs baseline ---");
    println!(
        "  Fixed-latency link:  {:.2}%",
        linked.slowdown_percent(baseline.total_ticks)
    );
    println!(
        "  Secure module:       {:.2}%",
        guarded.slowdown_percent(baseline.total_ticks)
    );
    Ok(())
}
