//! Implementation of the `rwlockfile status` command.
//!
//! Looks at `<base>.lock` to decide which kind of lock lives there:
//! - a directory is a mutex claim
//! - a file is read/write state, reported together with its guard claim

use crate::cli::StatusArgs;
use rwlockfile::liveness::{ProcessLiveness, SystemLiveness};
use rwlockfile::locks::age_string;
use rwlockfile::{ClaimInfo, Job, LockConfig, Lockfile, RwLockfile};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What was found at `<base>.lock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    None,
    Mutex,
    RwLock,
}

/// A mutex claim as shown to the user.
#[derive(Debug, Serialize)]
pub struct ClaimReport {
    pub path: PathBuf,
    pub uuid: Option<String>,
    pub pid: Option<i64>,
    pub hostname: Option<String>,
    pub reason: Option<String>,
    pub age_ms: u64,
    pub stale: bool,
}

impl From<ClaimInfo> for ClaimReport {
    fn from(claim: ClaimInfo) -> Self {
        let age_ms = u64::try_from(claim.age().as_millis()).unwrap_or(u64::MAX);
        let info = claim.info;
        Self {
            path: claim.path,
            uuid: info.as_ref().map(|i| i.uuid.clone()),
            pid: info.as_ref().map(|i| i.pid),
            hostname: info.as_ref().and_then(|i| i.hostname.clone()),
            reason: info.and_then(|i| i.reason),
            age_ms,
            stale: claim.stale,
        }
    }
}

/// A read/write entry plus whether its owner is still running.
///
/// `alive` is `None` for entries recorded on another host.
#[derive(Debug, Serialize)]
pub struct JobReport {
    #[serde(flatten)]
    pub job: Job,
    pub alive: Option<bool>,
}

impl JobReport {
    fn probe(job: Job, liveness: &dyn ProcessLiveness) -> Self {
        let alive = job.is_local().then(|| liveness.is_alive(job.pid));
        Self { job, alive }
    }
}

/// Everything `status` knows about one base path.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub base: PathBuf,
    pub path: PathBuf,
    pub kind: LockKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writer: Option<JobReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub readers: Vec<JobReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<ClaimReport>,
}

/// Execute the `rwlockfile status` command.
pub async fn cmd_status(args: StatusArgs, config: LockConfig) -> anyhow::Result<()> {
    let report = collect(&args.base, config, &SystemLiveness).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

/// Inspect the files of `base` without modifying them.
pub async fn collect(
    base: &Path,
    config: LockConfig,
    liveness: &dyn ProcessLiveness,
) -> anyhow::Result<StatusReport> {
    let rw = RwLockfile::with_config(base, config.clone());
    let path = rw.path().to_path_buf();
    let mut report = StatusReport {
        base: rw.base().to_path_buf(),
        path: path.clone(),
        kind: LockKind::None,
        claim: None,
        writer: None,
        readers: Vec::new(),
        guard: rw.internal().info().await?.map(ClaimReport::from),
    };

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        report.kind = LockKind::Mutex;
        let mutex = Lockfile::with_config(base, config);
        report.claim = mutex.info().await?.map(ClaimReport::from);
    } else {
        report.kind = LockKind::RwLock;
        let state = rw.state().await?;
        report.writer = state.writer.map(|job| JobReport::probe(job, liveness));
        report.readers = state
            .readers
            .into_iter()
            .map(|job| JobReport::probe(job, liveness))
            .collect();
    }
    Ok(report)
}

/// Human-readable rendering of a report.
pub fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    match report.kind {
        LockKind::None => line(format!("No lock at {}.", report.path.display())),
        LockKind::Mutex => {
            line(format!("Mutex {}:", report.path.display()));
            match &report.claim {
                Some(claim) => render_claim(&mut line, claim),
                None => line("    (released while reading)".to_string()),
            }
        }
        LockKind::RwLock => {
            line(format!("Read/write lock {}:", report.path.display()));
            match &report.writer {
                Some(writer) => {
                    line("  Writer:".to_string());
                    render_job(&mut line, writer);
                }
                None => line("  Writer:     none".to_string()),
            }
            line(format!("  Readers:    {}", report.readers.len()));
            for reader in &report.readers {
                render_job(&mut line, reader);
            }
        }
    }

    if let Some(guard) = &report.guard {
        line(String::new());
        line("State guard held:".to_string());
        render_claim(&mut line, guard);
    }

    let stale = [&report.claim, &report.guard]
        .into_iter()
        .flatten()
        .any(|c| c.stale);
    let dead = report
        .writer
        .iter()
        .chain(&report.readers)
        .any(|j| j.alive == Some(false));
    if stale || dead {
        line(String::new());
        line(format!(
            "Note: the lock has abandoned owners. The next contender removes them, \
             or use `rwlockfile clear {} --force`.",
            report.base.display()
        ));
    }
    out
}

fn render_claim(line: &mut impl FnMut(String), claim: &ClaimReport) {
    match claim.pid {
        Some(pid) => line(format!("    PID:        {}", pid)),
        None => line("    Owner:      unknown (no info file)".to_string()),
    }
    if let Some(host) = &claim.hostname {
        line(format!("    Host:       {}", host));
    }
    if let Some(reason) = &claim.reason {
        line(format!("    Reason:     {}", reason));
    }
    line(format!(
        "    Heartbeat:  {} ago",
        age_string(std::time::Duration::from_millis(claim.age_ms))
    ));
    if claim.stale {
        line("    Status:     STALE".to_string());
    }
}

fn render_job(line: &mut impl FnMut(String), report: &JobReport) {
    let job = &report.job;
    let alive = match report.alive {
        Some(true) => "alive",
        Some(false) => "DEAD",
        None => "remote",
    };
    line(format!(
        "    - pid {} on {} ({}), since {}{}",
        job.pid,
        job.hostname.as_deref().unwrap_or("unknown host"),
        alive,
        job.created.format("%Y-%m-%d %H:%M:%S UTC"),
        job.reason
            .as_deref()
            .map(|r| format!(": {}", r))
            .unwrap_or_default(),
    ));
}
