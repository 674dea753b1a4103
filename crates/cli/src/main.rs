use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use {
    anyhow::{Context, Result},
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::EnvFilter,
    warden_ipfilter::{ClientRequest, IpFilter, IpRange, RuleSet, respond_blocked},
};

const BLOCKED_EXIT_CODE: u8 = 2;

/// Inspect and exercise IP/country filter rules.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a rule file and report what it contains.
    Validate {
        /// Path to the TOML rule file.
        #[arg(short, long, env = "WARDEN_CONFIG")]
        config: PathBuf,
    },
    /// Decide a single request against a rule file.
    Check {
        #[arg(short, long, env = "WARDEN_CONFIG")]
        config: PathBuf,

        /// Request path, e.g. `/admin/users`.
        #[arg(long, default_value = "/")]
        path: String,

        /// Direct connection address, `ip` or `ip:port`.
        #[arg(long)]
        remote: String,

        /// Value of the X-Forwarded-For header, if any.
        #[arg(long)]
        forwarded_for: Option<String>,

        /// Write the block response body to stdout when blocked.
        #[arg(long)]
        body: bool,
    },
    /// Show the address bounds of range expressions.
    Range {
        #[arg(required = true)]
        expressions: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(args.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Validate { config } => validate(&config),
        Command::Check {
            config,
            path,
            remote,
            forwarded_for,
            body,
        } => {
            let allowed = check(&config, &path, &remote, forwarded_for.as_deref(), body)?;
            Ok(if allowed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(BLOCKED_EXIT_CODE)
            })
        },
        Command::Range { expressions } => ranges(&expressions),
    }
}

fn load(config: &Path) -> Result<RuleSet> {
    RuleSet::load(config).with_context(|| format!("failed to load {}", config.display()))
}

fn validate(config: &Path) -> Result<ExitCode> {
    let rules = load(config)?;
    println!(
        "{}: {} rule group(s), country database: {}",
        config.display(),
        rules.groups().len(),
        if rules.has_country_database() { "yes" } else { "no" }
    );
    for (index, group) in rules.groups().iter().enumerate() {
        println!(
            "  #{} {} scopes={:?} countries={:?} ranges=[{}]{}",
            index + 1,
            group.action(),
            group.scopes(),
            group.countries(),
            group
                .ranges()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            if group.is_strict() { " strict" } else { "" },
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Evaluate one request, returning whether it is allowed.
fn check(
    config: &Path,
    path: &str,
    remote: &str,
    forwarded_for: Option<&str>,
    body: bool,
) -> Result<bool> {
    let filter = IpFilter::new(load(config)?);
    debug!(path, remote, forwarded_for, "checking request");
    let request = ClientRequest::new(path, remote).with_forwarded_for(forwarded_for);
    let decision = filter
        .evaluate(&request)
        .context("request evaluation failed")?;

    let verdict = if decision.allow { "allow" } else { "block" };
    let summary = format!("{verdict} (scope: {})", decision.scope.unwrap_or("<none>"));
    // With --body, stdout carries the response body only.
    if body && !decision.allow {
        eprintln!("{summary}");
    } else {
        println!("{summary}");
    }
    if decision.allow {
        return Ok(true);
    }

    if body {
        let mut stdout = io::stdout().lock();
        let status = respond_blocked(decision.block_page, &mut stdout)?;
        stdout.flush()?;
        eprintln!("status: {}", status.status_code());
    } else if let Some(page) = decision.block_page_path() {
        println!("block page: {}", page.display());
    }
    Ok(false)
}

fn ranges(expressions: &[String]) -> Result<ExitCode> {
    for expr in expressions {
        let range = IpRange::parse(expr)?;
        println!("{expr}\t{}\t{}", range.start(), range.end());
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_check() {
        let args = Args::try_parse_from([
            "warden",
            "check",
            "--config",
            "rules.toml",
            "--path",
            "/admin",
            "--remote",
            "10.0.0.1:443",
            "--forwarded-for",
            "203.0.113.9",
        ])
        .unwrap();
        match args.command {
            Command::Check {
                path,
                remote,
                forwarded_for,
                body,
                ..
            } => {
                assert_eq!(path, "/admin");
                assert_eq!(remote, "10.0.0.1:443");
                assert_eq!(forwarded_for.as_deref(), Some("203.0.113.9"));
                assert!(!body);
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn range_requires_an_expression() {
        assert!(Args::try_parse_from(["warden", "range"]).is_err());
    }

    #[test]
    fn check_reports_block() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("rules.toml");
        std::fs::write(
            &config,
            "[[rule]]\nscopes = [\"/\"]\naction = \"block\"\nips = [\"10\"]\n",
        )
        .unwrap();

        assert!(!check(&config, "/", "10.0.0.1:1", None, false).unwrap());
        assert!(check(&config, "/", "11.0.0.1:1", None, false).unwrap());
        assert!(check(&config, "/", "nonsense", None, false).is_err());
    }
}
