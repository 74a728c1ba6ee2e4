//! Git operations using command-line git
//!
//! Read-only and local operations go through `run_command_in_dir` with
//! explicit arguments. Pushes go through [`ShellCommand`] so git can prompt
//! for credentials on the terminal.

use crate::error::{Error, ErrorCode, Result};
use crate::process::{run_command_in_dir, shell_quote, CommandResult, ShellCommand};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Git repository wrapper
pub struct GitRepo {
    workdir: PathBuf,
}

impl GitRepo {
    /// Wrap a directory that may not be a repository yet
    pub fn at(path: &Path) -> Self {
        Self {
            workdir: path.to_path_buf(),
        }
    }

    /// Open a git repository at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let result = run_command_in_dir("git", &["rev-parse", "--show-toplevel"], path)?;
        if !result.success {
            return Err(Error::not_a_git_repo());
        }
        Ok(Self {
            workdir: PathBuf::from(result.stdout.trim()),
        })
    }

    /// Get the repository working directory
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn git(&self, args: &[&str]) -> Result<CommandResult> {
        tracing::debug!(?args, "git");
        run_command_in_dir("git", args, &self.workdir)
    }

    fn git_checked(&self, args: &[&str]) -> Result<CommandResult> {
        let result = self.git(args)?;
        if result.success {
            Ok(result)
        } else {
            Err(Error::new(
                ErrorCode::GitCommandFailed,
                format!("git {} failed", args.join(" ")),
            )
            .with_context(result.output().trim().to_string()))
        }
    }

    /// `git status`
    pub fn status(&self) -> Result<CommandResult> {
        self.git(&["status"])
    }

    /// `git init`
    pub fn init(&self) -> Result<()> {
        self.git_checked(&["init"]).map(|_| ())
    }

    /// Remotes from `git remote -v`
    pub fn remotes(&self) -> Result<Vec<Remote>> {
        let result = self.git(&["remote", "-v"])?;
        Ok(parse_remotes(&result.stdout))
    }

    /// Fetch URL of a named remote
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .remotes()?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.url))
    }

    /// `git remote add <name> <url>`
    pub fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        self.git_checked(&["remote", "add", name, url]).map(|_| ())
    }

    /// `git remote set-url <name> <url>`
    pub fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        self.git_checked(&["remote", "set-url", name, url]).map(|_| ())
    }

    /// `git add .`
    pub fn add_all(&self) -> Result<()> {
        self.git_checked(&["add", "."]).map(|_| ())
    }

    /// `git commit -m <message>`
    ///
    /// A clean tree is not an error.
    pub fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let result = self.git(&["commit", "-m", message])?;
        if result.success {
            return Ok(CommitOutcome::Committed);
        }
        if is_nothing_to_commit(&result.combined_output()) {
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(Error::new(ErrorCode::GitCommandFailed, "git commit failed")
            .with_context(result.output().trim().to_string()))
    }

    /// Build the push command for `target` and `branch`
    ///
    /// Only a named remote becomes the branch upstream, so a URL carrying a
    /// token is never written to `.git/config`. `resolve` pins the host to
    /// one address via `http.curloptResolve`.
    pub fn push_command(&self, target: PushTarget<'_>, branch: &str, resolve: Option<(&str, &str)>) -> ShellCommand {
        let config = resolve
            .map(|(host, ip)| format!("-c http.curloptResolve={}:443:{} ", host, ip))
            .unwrap_or_default();
        let line = |dest: &str| {
            let upstream = if target.is_remote() { "-u " } else { "" };
            format!(
                "git {}push {}{} {}",
                config,
                upstream,
                shell_quote(dest),
                shell_quote(branch)
            )
        };
        ShellCommand::new(line(target.as_str()))
            .display_as(line(&redact_url(target.as_str())))
            .current_dir(&self.workdir)
            .stream()
    }

    /// `git config --get <key>`, `None` when unset
    pub fn config_value(&self, key: &str) -> Result<Option<String>> {
        let result = self.git(&["config", "--get", key])?;
        Ok(result
            .success
            .then(|| result.stdout.trim().to_string())
            .filter(|v| !v.is_empty()))
    }
}

/// Destination of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTarget<'a> {
    /// A configured remote such as `origin`; the branch tracks it
    Remote(&'a str),
    /// A one-off URL; nothing is recorded in the repository config
    Url(&'a str),
}

impl<'a> PushTarget<'a> {
    fn is_remote(&self) -> bool {
        matches!(self, PushTarget::Remote(_))
    }

    fn as_str(&self) -> &'a str {
        match self {
            PushTarget::Remote(s) | PushTarget::Url(s) => s,
        }
    }
}

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new commit was created
    Committed,
    /// The tree was clean
    NothingToCommit,
}

/// One remote line from `git remote -v`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    /// Remote name, e.g. `origin`
    pub name: String,
    /// Remote URL
    pub url: String,
}

/// Parse `git remote -v`, keeping fetch URLs only
pub fn parse_remotes(output: &str) -> Vec<Remote> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let url = parts.next()?;
            match parts.next() {
                Some("(push)") => None,
                _ => Some(Remote {
                    name: name.to_string(),
                    url: url.to_string(),
                }),
            }
        })
        .collect()
}

fn is_nothing_to_commit(output: &str) -> bool {
    output.contains("nothing to commit") || output.contains("nothing added to commit")
}

/// `Update at YYYY-mm-dd HH:MM:SS`
pub fn default_commit_message(at: &DateTime<Local>) -> String {
    format!("Update at {}", at.format("%Y-%m-%d %H:%M:%S"))
}

/// How the push authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Rewrite the remote to `git@host:owner/repo.git`
    Ssh,
    /// Embed a personal access token in the HTTPS URL
    Token,
    /// Plain HTTPS, git prompts for credentials
    Password,
}

impl AuthMode {
    /// All modes in menu order
    pub const ALL: [AuthMode; 3] = [AuthMode::Ssh, AuthMode::Token, AuthMode::Password];

    /// Menu label
    pub fn label(&self) -> &'static str {
        match self {
            AuthMode::Ssh => "SSH key",
            AuthMode::Token => "Personal access token",
            AuthMode::Password => "Username and password (interactive)",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(AuthMode::Ssh),
            "token" => Ok(AuthMode::Token),
            "password" | "https" => Ok(AuthMode::Password),
            other => Err(Error::invalid_selection(format!(
                "Unknown auth mode '{}', expected ssh, token or password",
                other
            ))),
        }
    }
}

fn split_https(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("https://")?;
    let rest = rest.rsplit_once('@').map_or(rest, |(_, r)| r);
    rest.split_once('/')
}

/// `https://github.com/o/r.git` → `git@github.com:o/r.git`
pub fn to_ssh_url(url: &str) -> Option<String> {
    if url.starts_with("git@") {
        return Some(url.to_string());
    }
    let (host, path) = split_https(url)?;
    let path = if path.ends_with(".git") {
        path.to_string()
    } else {
        format!("{}.git", path)
    };
    Some(format!("git@{}:{}", host, path))
}

/// `https://host/path` → `https://<token>@host/path`
pub fn with_token(url: &str, token: &str) -> Result<String> {
    let (host, path) = split_https(url).ok_or_else(|| {
        Error::git(format!("Token authentication needs an HTTPS remote, got {}", url))
    })?;
    Ok(format!("https://{}@{}/{}", token, host, path))
}

/// Hide credentials embedded in a URL
pub fn redact_url(url: &str) -> String {
    match url.strip_prefix("https://").and_then(|r| r.rsplit_once('@')) {
        Some((_, rest)) => format!("https://***@{}", rest),
        None => url.to_string(),
    }
}

/// Host part of an HTTPS or SCP-style git URL
pub fn host_of(url: &str) -> Option<String> {
    if let Some((host, _)) = split_https(url) {
        return Some(host.split(':').next().unwrap_or(host).to_string());
    }
    url.strip_prefix("git@")
        .and_then(|r| r.split_once(':'))
        .map(|(host, _)| host.to_string())
}

/// Check if we're in a git repository
pub fn is_git_repo(path: &Path) -> bool {
    run_command_in_dir("git", &["rev-parse", "--git-dir"], path)
        .map(|r| r.success)
        .unwrap_or(false)
}
