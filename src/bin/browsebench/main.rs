use anyhow::{Result, bail};
use colored::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use browsebench::config::BenchConfig;
use browsebench::logging::init_logging;
use browsebench::orchestrator::{self, BenchmarkOrchestrator, RunOutput};
use browsebench::providers::OpenRouterFactory;
use browsebench::test_suite::{self, TestSuite};
use browsebench::tools::http::HttpSessionFactory;

mod args;
use args::{CliArgs, RunArgs, USAGE};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = match CliArgs::parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{} {}\n\n{USAGE}", "✗".red().bold(), e.to_string().red());
            std::process::exit(2);
        }
    };
    let config = BenchConfig::load()?;

    match cli {
        CliArgs::Run(run) => run_benchmark(config, run).await,
        CliArgs::Results { output } => {
            let path = output.unwrap_or(config.results_path);
            let results = orchestrator::load_results(&path)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
        CliArgs::Tests { tests_dir } => {
            let dir = tests_dir.unwrap_or(config.tests_dir);
            for test in test_suite::load_suite(&dir)? {
                println!("{} {}", test.name.bold(), test.description.dimmed());
            }
            Ok(())
        }
        CliArgs::Help => {
            println!("{USAGE}");
            Ok(())
        }
    }
}

async fn run_benchmark(mut config: BenchConfig, run: RunArgs) -> Result<()> {
    if let Some(dir) = run.tests_dir {
        config.tests_dir = dir;
    }
    if let Some(path) = run.output {
        config.results_path = path;
    }
    if let Some(steps) = run.max_steps {
        config.max_steps = steps;
    }
    if let Some(sessions) = run.sessions {
        config.max_sessions_per_model = sessions;
    }
    if run.trace_dir.is_some() {
        config.trace_dir = run.trace_dir;
    }

    let suite: TestSuite = if run.tests.is_empty() {
        test_suite::load_suite(&config.tests_dir)?
    } else {
        test_suite::select_suite(&config.tests_dir, &run.tests)?
    };
    if suite.is_empty() {
        bail!("no tests found in {}", config.tests_dir.display());
    }
    let models = if run.models.is_empty() {
        config.model_ids()
    } else {
        run.models
    };

    println!(
        "{} {} | {} | {}",
        ">>".bold(),
        "browsebench".bold(),
        models.join(", ").cyan(),
        format!("{} test(s)", suite.len()).dimmed()
    );

    let sessions = HttpSessionFactory::new(config.http_timeout_secs)?;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{}", "● Cancelling run...".yellow());
                cancel.cancel();
            }
        });
    }

    let orchestrator = BenchmarkOrchestrator::new(
        Arc::new(config),
        Arc::new(OpenRouterFactory),
        Arc::new(sessions),
    )
    .with_cancellation(cancel);

    let output = orchestrator.run_and_persist(&models, &suite).await?;
    print_summary(&output);
    println!(
        "{}",
        format!("Results written to {}", orchestrator.config().results_path.display()).dimmed()
    );
    Ok(())
}

fn print_summary(output: &RunOutput) {
    for (model, results) in output {
        println!(
            "\n{} {}  {}/{} completed ({:.0}%)  avg steps {:.1}  avg time {:.1}s  tokens {}  cost ${:.4}",
            "●".cyan(),
            model.bold(),
            results.completed_tests,
            results.total_tests,
            results.completion_rate * 100.0,
            results.average_steps,
            results.average_response_time,
            results.total_token_usage,
            results.total_cost
        );
        for result in &results.results {
            let mark = if result.success {
                "✓".green().bold()
            } else {
                "✗".red().bold()
            };
            let reason = result.finish_reason().unwrap_or_default();
            println!(
                "  {mark} {} ({} steps) {}",
                result.test_name,
                result.steps,
                reason.dimmed()
            );
        }
    }
}
