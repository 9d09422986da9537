//! Planlens Command Line Interface
//!
//! Reads EXPLAIN output from a file or stdin and prints the annotated plan.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use planlens_analyzer::{AnnotatedPlan, ParseContext, ParserOptions, PlanNode};

/// Parse PostgreSQL EXPLAIN output and report per-node metrics
#[derive(Parser, Debug)]
#[command(name = "planlens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File holding the EXPLAIN output, or `-` for stdin
    #[arg(default_value = "-")]
    pub input: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// TOML file with parser options
    #[arg(short, long, env = "PLANLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Output format for the annotated plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One row per node with its exclusive figures
    Table,
    /// The full annotated plan as JSON
    Json,
    /// Plan-wide totals and maxima only
    Summary,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let options = match &cli.config {
        Some(path) => ParserOptions::from_toml_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => ParserOptions::default(),
    };

    let raw = read_input(&cli.input)?;
    tracing::debug!(input = %cli.input, bytes = raw.len(), "read EXPLAIN output");
    let mut ctx = ParseContext::new(options);
    let plan = planlens_analyzer::parse_with_context(&raw, &mut ctx)
        .context("Failed to parse EXPLAIN output")?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => println!("{}", node_table(&plan)),
        OutputFormat::Summary => print_summary(&plan),
    }

    Ok(())
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("Failed to read stdin")?;
        return Ok(raw);
    }
    std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))
}

fn node_table(plan: &AnnotatedPlan) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(
        ["#", "Node", "Relation", "Excl. ms", "Excl. cost", "Rows", "Estimate"]
            .into_iter()
            .map(|col| Cell::new(col).fg(Color::Green)),
    );

    let mut rows = Vec::new();
    collect_rows(plan.root(), 0, &mut rows);
    for cte in plan.ctes() {
        collect_rows(cte, 0, &mut rows);
    }

    for (depth, node) in rows {
        let metrics = &node.metrics;
        let label = match &node.subplan_name {
            Some(name) => format!("{}{} [{name}]", "  ".repeat(depth), node.type_label),
            None => format!("{}{}", "  ".repeat(depth), node.type_label),
        };
        let estimate = metrics.planner_estimate.map(|estimate| match estimate.factor {
            Some(factor) => format!("{} x{factor:.1}", estimate.direction.as_str()),
            None => estimate.direction.as_str().to_string(),
        });
        let mut duration = Cell::new(format_opt(metrics.exclusive_duration_ms, 3));
        if metrics.has_anomalies() {
            duration = duration.fg(Color::Yellow);
        }

        table.add_row(vec![
            Cell::new(node.node_id),
            Cell::new(label),
            Cell::new(node.relation.as_deref().unwrap_or("")),
            duration,
            Cell::new(format_opt(metrics.exclusive_cost, 2)),
            Cell::new(format_opt(metrics.revised_actual_rows, 0)),
            Cell::new(estimate.unwrap_or_default()),
        ]);
    }

    table
}

fn collect_rows<'a>(node: &'a PlanNode, depth: usize, rows: &mut Vec<(usize, &'a PlanNode)>) {
    rows.push((depth, node));
    for child in &node.children {
        collect_rows(child, depth + 1, rows);
    }
}

fn format_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|value| format!("{value:.precision$}"))
        .unwrap_or_default()
}

fn print_summary(plan: &AnnotatedPlan) {
    let stats = plan.stats();
    let maxima = plan.maxima();

    println!("Nodes:           {}", stats.node_count);
    println!("CTEs:            {}", plan.ctes().len());
    println!("Analyzed:        {}", stats.is_analyze);
    if let Some(ms) = stats.planning_time_ms {
        println!("Planning time:   {ms:.3} ms");
    }
    if let Some(ms) = stats.execution_time_ms {
        println!("Execution time:  {ms:.3} ms");
    }
    if let Some(ms) = stats.jit_time_ms {
        println!("JIT time:        {ms:.3} ms");
    }
    if stats.trigger_count > 0 {
        println!(
            "Triggers:        {} ({:.3} ms)",
            stats.trigger_count, stats.trigger_time_ms
        );
    }
    if let Some(ms) = maxima.max_duration {
        println!("Slowest node:    {ms:.3} ms");
    }
    if let Some(cost) = maxima.max_cost {
        println!("Costliest node:  {cost:.2}");
    }
    if let Some(rows) = maxima.max_rows {
        println!("Largest output:  {rows:.0} rows");
    }

    let anomalies: usize = plan
        .iter_nodes()
        .map(|node| node.metrics.anomalies.len())
        .sum();
    if anomalies > 0 {
        println!("Anomalies:       {anomalies}");
    }
}
