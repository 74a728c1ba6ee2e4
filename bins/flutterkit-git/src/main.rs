//! flutterkit-git
//!
//! Stage, commit and push the project in one guided run. Offers `git init`
//! and the configured `origin`, checks that the host is reachable, and falls
//! back to pinned addresses when a push cannot get through.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use flutterkit_cli::output::{self, Status};
use flutterkit_cli::prompt::Prompter;
use flutterkit_core::config::Config;
use flutterkit_core::error::{exit_codes, Error, ErrorCode};
use flutterkit_core::git::{self, AuthMode, CommitOutcome, GitRepo, PushTarget};
use flutterkit_core::interrupt;
use flutterkit_core::network::{self, CONNECT_TIMEOUT};
use flutterkit_telemetry::{ErrorLog, TelemetryConfig};
use std::path::{Path, PathBuf};

/// Environment variable holding a personal access token
const TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Parser)]
#[command(name = "flutterkit-git")]
#[command(about = "Commit and push the project with guided prompts")]
#[command(version)]
struct Cli {
    /// Commit message (prompted, else `Update at <timestamp>`)
    #[arg(short, long)]
    message: Option<String>,

    /// Branch to push (prompted, else the configured branch)
    #[arg(short, long)]
    branch: Option<String>,

    /// Authentication: ssh, token or password
    #[arg(long)]
    auth: Option<AuthMode>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Project root
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        output::set_colors(false);
    }
    let _telemetry = match flutterkit_telemetry::init_with_config(TelemetryConfig {
        verbose: cli.verbose,
        color: !cli.no_color,
        ..TelemetryConfig::default()
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            Status::warning(&format!("Logging is unavailable: {}", e));
            None
        }
    };
    if let Err(e) = interrupt::install() {
        Status::warning(&e.to_string());
    }

    let exit_code = match run(&cli) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            report_failure(&e);
            exit_codes::FAILURE
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<()> {
    std::env::set_current_dir(&cli.project_dir)
        .with_context(|| format!("Cannot enter {}", cli.project_dir.display()))?;
    let config = Config::load(cli.config.as_deref())?;
    let settings = &config.schema.git;
    let prompter = Prompter::new();

    Status::header("Commit and push");
    let cwd = std::env::current_dir()?;
    println!("Working directory: {}", cwd.display());
    let repo = GitRepo::at(&cwd);

    let status = repo.status()?;
    if status.success {
        print!("{}", status.stdout);
    } else {
        Status::warning("This directory is not a git repository");
        if !prompter.confirm("Initialize a repository here?", false)? {
            return Err(Error::not_a_git_repo().into());
        }
        repo.init()?;
        Status::success("Initialized an empty repository");
    }

    let base_url = ensure_origin(&repo, &settings.remote_url, |question, default| {
        prompter.confirm(question, default)
    })?;

    repo.add_all()?;
    let message = match &cli.message {
        Some(message) => message.clone(),
        None => prompter.input(
            "Commit message (Enter for a timestamp)",
            &git::default_commit_message(&Local::now()),
        )?,
    };
    match repo.commit(&message)? {
        CommitOutcome::Committed => Status::success(&format!("Committed: {}", message)),
        CommitOutcome::NothingToCommit => Status::info("Nothing to commit, pushing existing history"),
    }

    let branch = match &cli.branch {
        Some(branch) => branch.clone(),
        None => prompter.input("Branch to push", &settings.branch)?,
    };

    let auth = match cli.auth {
        Some(auth) => auth,
        None => {
            let index = prompter.select("Authentication", &AuthMode::ALL, 2)?;
            AuthMode::ALL[index]
        }
    };
    let token = match auth {
        AuthMode::Token => Some(read_token(&prompter)?),
        _ => None,
    };
    let url = push_url(&base_url, auth, token.as_deref())?;
    let target = push_target(auth, &url);
    let host = git::host_of(&url).unwrap_or_else(|| settings.host.clone());

    let reachability = network::check_host(&host, 443, CONNECT_TIMEOUT);
    if !reachability.is_reachable() {
        Status::warning(&format!("{} does not look reachable", host));
        Status::hints(&reachability.hints());
    }

    let description = format!("Pushing {} to {}", branch, git::redact_url(&url));
    let result = repo
        .push_command(target, &branch, None)
        .description(description.clone())
        .run();
    if result.success {
        Status::success("Commit and push finished");
        return Ok(());
    }
    if result.interrupted() {
        return result.into_result(&description).map(|_| ()).map_err(Into::into);
    }

    Status::error(&format!("Pushing to '{}' failed", branch));
    if !settings.fallback_ips.is_empty()
        && prompter.confirm("Retry through alternate server addresses?", false)?
    {
        for ip in &settings.fallback_ips {
            Status::info(&format!("Trying {} via {}", host, ip));
            let retry = repo
                .push_command(target, &branch, Some((host.as_str(), ip.as_str())))
                .description(format!("Pushing {} via {}", branch, ip))
                .run();
            if retry.success {
                Status::success(&format!("Pushed via {}", ip));
                return Ok(());
            }
            if retry.interrupted() {
                return retry
                    .into_result("Pushing via alternate address")
                    .map(|_| ())
                    .map_err(Into::into);
            }
        }
    }

    Status::instructions(
        "If the remote has diverged and you want to overwrite it:",
        &[format!("git push --force origin {}", branch)],
    );
    Err(Error::new(ErrorCode::PushFailed, format!("Could not push '{}'", branch))
        .with_context(result.output().trim().to_string())
        .into())
}

/// Make sure `origin` exists and offer to point it at `target`
///
/// Returns the URL `origin` points at. Declining to add a missing `origin`
/// stops the run before anything is staged.
fn ensure_origin<F>(repo: &GitRepo, target: &str, confirm: F) -> Result<String>
where
    F: Fn(&str, bool) -> flutterkit_core::Result<bool>,
{
    match repo.remote_url("origin")? {
        None => {
            Status::warning("No 'origin' remote is configured");
            if !confirm(&format!("Add '{}' as origin?", target), true)? {
                return Err(missing_origin().into());
            }
            repo.add_remote("origin", target)?;
            Status::success("Added origin");
            Ok(target.to_string())
        }
        Some(current) if current != target => {
            Status::warning(&format!("origin points at {}", git::redact_url(&current)));
            if confirm(&format!("Replace it with '{}'?", target), false)? {
                repo.set_remote_url("origin", target)?;
                Status::success("Updated origin");
                Ok(target.to_string())
            } else {
                Ok(current)
            }
        }
        Some(current) => Ok(current),
    }
}

fn missing_origin() -> Error {
    Error::git("No 'origin' remote to push to")
        .with_suggestion("Add one with: git remote add origin <url>")
}

/// Plain HTTPS pushes go through `origin` and set its upstream, rewritten
/// URLs are pushed once without touching `.git/config`
fn push_target(auth: AuthMode, url: &str) -> PushTarget<'_> {
    match auth {
        AuthMode::Password => PushTarget::Remote("origin"),
        AuthMode::Ssh | AuthMode::Token => PushTarget::Url(url),
    }
}

fn read_token(prompter: &Prompter) -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            tracing::debug!("Using token from {}", TOKEN_ENV);
            return Ok(token.trim().to_string());
        }
    }
    Ok(prompter.password("Personal access token")?)
}

/// URL to push to for the chosen authentication mode
fn push_url(base: &str, auth: AuthMode, token: Option<&str>) -> Result<String> {
    let url = match (auth, token) {
        (AuthMode::Ssh, _) => git::to_ssh_url(base).ok_or_else(|| {
            Error::git(format!("Cannot derive an SSH URL from {}", git::redact_url(base)))
        })?,
        (AuthMode::Token, Some(token)) => git::with_token(base, token)?,
        _ => base.to_string(),
    };
    Ok(url)
}

fn report_failure(error: &anyhow::Error) {
    let interrupted = error
        .downcast_ref::<Error>()
        .is_some_and(|e| e.is_interrupted());
    if interrupted {
        Status::warning(interrupt::MESSAGE);
        return;
    }
    Status::error(&format!("{:#}", error));

    let report = error.downcast_ref::<Error>().map(Error::to_report);
    match ErrorLog::new("git_push", format!("{:?}", error))
        .contexts(report.iter().flat_map(|r| r.fields()))
        .write_to(Path::new("."))
    {
        Ok(path) => Status::info(&format!("Error log saved to {}", path.display())),
        Err(e) => Status::warning(&format!("Could not write the error log: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://github.com/Eiji-Y-work/gyroscopeApp.git";

    #[test]
    fn test_push_url_per_auth_mode() {
        assert_eq!(
            push_url(BASE, AuthMode::Ssh, None).unwrap(),
            "git@github.com:Eiji-Y-work/gyroscopeApp.git"
        );
        assert_eq!(
            push_url(BASE, AuthMode::Token, Some("ghp_abc")).unwrap(),
            "https://ghp_abc@github.com/Eiji-Y-work/gyroscopeApp.git"
        );
        assert_eq!(push_url(BASE, AuthMode::Password, None).unwrap(), BASE);
    }

    #[test]
    fn test_push_url_ssh_needs_known_scheme() {
        assert!(push_url("file:///tmp/repo.git", AuthMode::Ssh, None).is_err());
    }

    #[test]
    fn test_only_plain_pushes_track_origin() {
        let token_url = push_url(BASE, AuthMode::Token, Some("ghp_abc")).unwrap();
        assert_eq!(
            push_target(AuthMode::Token, &token_url),
            PushTarget::Url("https://ghp_abc@github.com/Eiji-Y-work/gyroscopeApp.git")
        );
        assert!(matches!(push_target(AuthMode::Ssh, BASE), PushTarget::Url(_)));
        assert_eq!(push_target(AuthMode::Password, BASE), PushTarget::Remote("origin"));
    }

    #[test]
    fn test_declined_origin_stops_the_run() {
        if !flutterkit_core::process::command_exists("git") {
            return;
        }
        let temp = tempfile::tempdir().unwrap();
        let repo = GitRepo::at(temp.path());
        repo.init().unwrap();
        std::fs::write(temp.path().join("a.txt"), "hello").unwrap();

        let err = ensure_origin(&repo, BASE, |_, _| Ok(false)).unwrap_err();
        assert!(format!("{:#}", err).contains("origin"));
        assert_eq!(repo.remote_url("origin").unwrap(), None);

        assert_eq!(ensure_origin(&repo, BASE, |_, default| Ok(default)).unwrap(), BASE);
        assert_eq!(repo.remote_url("origin").unwrap().as_deref(), Some(BASE));
    }

    #[test]
    fn test_cli_parses_auth_mode() {
        let cli = Cli::try_parse_from(["flutterkit-git", "--auth", "token", "-m", "msg"]).unwrap();
        assert_eq!(cli.auth, Some(AuthMode::Token));
        assert_eq!(cli.message.as_deref(), Some("msg"));
        assert!(Cli::try_parse_from(["flutterkit-git", "--auth", "kerberos"]).is_err());
    }
}
