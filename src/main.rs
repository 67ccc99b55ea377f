use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use corvus_core::{CorvusConfig, OutputFormat, Platform, ReviewRequest, Severity};
use corvus_platform::github::GitHubClient;
use corvus_platform::gitlab::GitLabClient;
use corvus_platform::PlatformClient;
use corvus_review::llm::LlmClient;
use corvus_review::{Orchestrator, ReviewEngine, RunReport};

#[derive(Parser)]
#[command(
    name = "corvus",
    version,
    about = "AI code review for pull and merge requests",
    long_about = "Corvus reviews GitHub pull requests and GitLab merge requests with an LLM.\n\n\
                   It fetches the diff, reviews each changed file against per-language\n\
                   instructions, and posts one review: a summary, inline comments, and a\n\
                   verdict (approve / request changes / comment).\n\n\
                   Examples:\n  \
                     corvus review --platform github --repo owner/repo --request 123\n  \
                     corvus review --platform gitlab --repo group/project --request 45 --dry-run\n  \
                     corvus init                     Create a .corvus.toml config file\n  \
                     corvus doctor                   Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .corvus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull or merge request and post the result
    #[command(long_about = "Review a pull or merge request and post the result.\n\n\
        Fetches the request's diff, reviews each changed file with the configured\n\
        LLM, and submits a summary, inline comments, and a verdict back to the\n\
        platform. Files that cannot be parsed or reviewed are reported in the\n\
        summary without blocking the rest.\n\n\
        Examples:\n  corvus review --platform github --repo rust-lang/rust --request 12345\n  \
        corvus review --platform gitlab --repo group/project --request 7 --dry-run")]
    Review {
        /// Hosting platform (github or gitlab)
        #[arg(long)]
        platform: Platform,
        /// Repository: owner/repo (GitHub) or full project path (GitLab)
        #[arg(long)]
        repo: String,
        /// Pull request number or merge request IID
        #[arg(long)]
        request: u64,
        /// Platform API token (falls back to config, then GITHUB_TOKEN / GITLAB_TOKEN)
        #[arg(long)]
        token: Option<String>,
        /// Directory with per-language instruction files (<language>.md)
        #[arg(long)]
        instructions: Option<PathBuf>,
        /// Findings at or above this severity force a request-changes verdict
        #[arg(
            long,
            long_help = "Findings at or above this severity force a request-changes verdict.\n\n\
                Severity ranking: bug > warning > suggestion > info.\nDefault: bug."
        )]
        threshold: Option<Severity>,
        /// Maximum files reviewed concurrently
        #[arg(long)]
        concurrency: Option<usize>,
        /// Wall-clock budget for the whole run, in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Print the review instead of submitting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Create a default .corvus.toml configuration file
    #[command(long_about = "Create a default .corvus.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .corvus.toml already exists.")]
    Init,
    /// Check your Corvus setup and environment
    #[command(long_about = "Check your Corvus setup and environment.\n\n\
        Runs diagnostics for the config file, LLM API key, and platform tokens.\n\
        Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!(
            "\x1b[1m\x1b[33m\u{1f426}\x1b[0m \x1b[1mcorvus\x1b[0m v{version} — AI review for pull and merge requests\n"
        );
        println!("Quick start:");
        println!("  \x1b[36mcorvus init\x1b[0m                        Create a .corvus.toml config file");
        println!("  \x1b[36mcorvus review --platform github \\");
        println!("    --repo owner/repo --request 123\x1b[0m  Review a pull request\n");
        println!("All commands:");
        println!("  \x1b[32mreview\x1b[0m   Review a pull/merge request and post the result");
        println!("  \x1b[32mdoctor\x1b[0m   Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m     Create default configuration\n");
    } else {
        println!("corvus v{version} — AI review for pull and merge requests\n");
        println!("Quick start:");
        println!("  corvus init                        Create a .corvus.toml config file");
        println!("  corvus review --platform github \\");
        println!("    --repo owner/repo --request 123  Review a pull request\n");
        println!("All commands:");
        println!("  review   Review a pull/merge request and post the result");
        println!("  doctor   Check your setup and environment");
        println!("  init     Create default configuration\n");
    }

    println!("Run 'corvus <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            _ => "\u{2717}",
        }
    }
}

fn run_doctor(config: &CorvusConfig, format: OutputFormat) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    let config_path = std::path::Path::new(".corvus.toml");
    if config_path.exists() {
        checks.push(CheckResult::pass("config_file", ".corvus.toml found"));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".corvus.toml not found",
            "run 'corvus init' to create a default config",
        ));
    }

    let llm_env_var = match config.llm.provider.as_str() {
        "anthropic" => "ANTHROPIC_API_KEY",
        _ => "OPENAI_API_KEY",
    };
    if config.llm.api_key.is_some() || std::env::var(llm_env_var).is_ok() {
        checks.push(CheckResult::pass(
            "llm_api_key",
            format!("{llm_env_var} set (model: {})", config.llm.model),
        ));
    } else {
        checks.push(CheckResult::fail(
            "llm_api_key",
            format!("{llm_env_var} not set"),
            format!("export {llm_env_var}=... or set api_key in .corvus.toml [llm]"),
        ));
    }

    if config.platform.github_token.is_some() || std::env::var("GITHUB_TOKEN").is_ok() {
        checks.push(CheckResult::pass("github_token", "GITHUB_TOKEN set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "export GITHUB_TOKEN=... (needed for --platform github)",
        ));
    }

    if config.platform.gitlab_token.is_some() || std::env::var("GITLAB_TOKEN").is_ok() {
        checks.push(CheckResult::pass("gitlab_token", "GITLAB_TOKEN set"));
    } else {
        checks.push(CheckResult::fail(
            "gitlab_token",
            "GITLAB_TOKEN not set",
            "export GITLAB_TOKEN=... (needed for --platform gitlab)",
        ));
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            println!("Corvus v{} — Environment Check\n", env!("CARGO_PKG_VERSION"));
            for check in &checks {
                let label = check.name.replace('_', " ");
                println!("  {} {label:<16} {}", check.symbol(), check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }
            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            println!("\n{passed} checks passed, {failed} failed");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Corvus Configuration
# See: https://github.com/corvus-ai/corvus

[llm]
# provider = "openai"
# model = "gpt-4o"
# base_url = "https://api.openai.com"
# api_key = "..."            # prefer OPENAI_API_KEY

[review]
# max_concurrency = 4
# verdict_threshold = "bug"  # bug | warning | suggestion | info
# max_comments = 25
# timeout_secs = 600
# instructions_dir = "docs/review-instructions"

[platform]
# github_token = "..."       # prefer GITHUB_TOKEN
# gitlab_token = "..."       # prefer GITLAB_TOKEN
# gitlab_api_url = "https://gitlab.com/api/v4"
# max_attempts = 5
"#;

async fn run_review<P: PlatformClient>(
    platform: P,
    engine: ReviewEngine<LlmClient>,
    config: &CorvusConfig,
    dry_run: bool,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let orchestrator = Orchestrator::new(
        platform,
        engine,
        config.review.clone(),
        config.platform.max_attempts,
    )
    .dry_run(dry_run);

    let report = orchestrator.run().await?;

    if verbose {
        eprintln!(
            "files: {} reviewed, {} failed, {} skipped",
            report.files_reviewed, report.files_failed, report.files_skipped
        );
    }

    print_report(&report, format)
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "title": report.metadata.title,
                "verdict": report.review.verdict,
                "summary": report.review.summary,
                "comments": report.review.comments,
                "filesReviewed": report.files_reviewed,
                "filesFailed": report.files_failed,
                "filesSkipped": report.files_skipped,
                "submitted": report.submitted,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("{}", report.review.summary);
            for comment in &report.review.comments {
                println!(
                    "### `{}:{}`\n\n{}\n",
                    comment.file_path.display(),
                    comment.line,
                    comment.body
                );
            }
        }
        OutputFormat::Text => {
            let action = if report.submitted {
                "submitted"
            } else {
                "dry run, not submitted"
            };
            println!(
                "{} — verdict: {:?} ({} inline comments, {action})",
                report.metadata.title,
                report.review.verdict,
                report.review.comments.len(),
            );
            println!("\n{}", report.review.summary);
            for comment in &report.review.comments {
                println!("{}:{}", comment.file_path.display(), comment.line);
                for line in comment.body.lines() {
                    println!("  {line}");
                }
                println!();
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CorvusConfig::from_file(path)?,
        None => {
            let default_path = std::path::Path::new(".corvus.toml");
            if default_path.exists() {
                CorvusConfig::from_file(default_path)?
            } else {
                CorvusConfig::default()
            }
        }
    };

    let use_color = std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();

    match cli.command {
        None => {
            print_welcome(use_color);
            Ok(())
        }
        Some(Command::Review {
            platform,
            ref repo,
            request,
            ref token,
            ref instructions,
            threshold,
            concurrency,
            timeout,
            dry_run,
        }) => {
            // Hint: missing API key — check before creating the LLM client
            let llm_env_var = match config.llm.provider.as_str() {
                "anthropic" => "ANTHROPIC_API_KEY",
                _ => "OPENAI_API_KEY",
            };
            if config.llm.api_key.is_none() && std::env::var(llm_env_var).is_err() {
                miette::bail!(miette::miette!(
                    help = format!(
                        "Set {llm_env_var} or add api_key in your .corvus.toml under [llm]"
                    ),
                    "No API key configured for LLM provider '{}'",
                    config.llm.provider
                ));
            }

            let mut config = config;
            if let Some(threshold) = threshold {
                config.review.verdict_threshold = threshold;
            }
            if let Some(concurrency) = concurrency {
                config.review.max_concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                config.review.timeout_secs = timeout;
            }
            let job = ReviewRequest {
                platform,
                repository: repo.clone(),
                number: request,
                instructions_dir: instructions
                    .clone()
                    .or_else(|| config.review.instructions_dir.clone()),
            };

            let llm = LlmClient::new(&config.llm)?;
            let engine = ReviewEngine::new(llm, job.instructions_dir.clone());

            match job.platform {
                Platform::GitHub => {
                    let token = token.as_deref().or(config.platform.github_token.as_deref());
                    let client = GitHubClient::new(&job.repository, job.number, token)?;
                    run_review(client, engine, &config, dry_run, cli.format, cli.verbose).await
                }
                Platform::GitLab => {
                    let token = token.as_deref().or(config.platform.gitlab_token.as_deref());
                    let client = GitLabClient::new(
                        &job.repository,
                        job.number,
                        token,
                        &config.platform.gitlab_api_url,
                    )?;
                    run_review(client, engine, &config, dry_run, cli.format, cli.verbose).await
                }
            }
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".corvus.toml");
            if path.exists() {
                miette::bail!(".corvus.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .corvus.toml with default configuration");
            Ok(())
        }
        Some(Command::Doctor) => run_doctor(&config, cli.format),
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "corvus", &mut std::io::stdout());
            Ok(())
        }
    }
}
