//! Production snapshot fetcher.
//!
//! Pulls logs and state files from the production host over FTPS into a local
//! directory that mirrors the remote category names. Per-directory and
//! per-file refusals are logged and counted; only usage errors and a lost
//! session abort the run.
use crate::cli::FetchLogsArgs;
use crate::util::{format_megabytes, format_thousands};
use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

mod archive;
mod credentials;
mod listing;
mod remote;
mod since;

use archive::{decompress_gzip, GZIP_SUFFIX};
use credentials::load_credentials;
use listing::{format_time_ago, list_directory};
use remote::{FtpsSession, RemoteError, RemoteStore};
use since::parse_since;

/// Remote root all categories hang off.
pub const REMOTE_BASE: &str = "/public_html/tub/backend";

/// A remote directory mirrored into `<output>/<name>/`.
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    pub remote_subdir: &'static str,
}

pub const CATEGORIES: [Category; 4] = [
    Category {
        name: "logs",
        remote_subdir: "storage/logs",
    },
    Category {
        name: "state",
        remote_subdir: "storage/state",
    },
    Category {
        name: "crontab-backups",
        remote_subdir: "storage/crontab-backups",
    },
    Category {
        name: "scheduled-jobs",
        remote_subdir: "storage/scheduled-jobs",
    },
];

impl Category {
    fn remote_dir(&self) -> String {
        format!("{REMOTE_BASE}/{}", self.remote_subdir)
    }
}

/// What one fetch run should do.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub output_dir: PathBuf,
    pub since: Option<NaiveDateTime>,
    pub list_only: bool,
    pub decompress: bool,
    /// Reference time for listing years and age labels.
    pub now: NaiveDateTime,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes: u64,
}

enum Download {
    Saved(u64),
    Refused(RemoteError),
}

pub fn fetch_logs(args: FetchLogsArgs) -> Result<()> {
    let now = Local::now().naive_local();
    let since = match args.since.as_deref() {
        Some(expr) => Some(parse_since(expr, now).ok_or_else(|| {
            anyhow!(
                "Could not parse time expression: '{expr}'\nExamples: {}",
                since::EXAMPLES
            )
        })?),
        None => None,
    };

    if !args.env_file.is_file() {
        return Err(anyhow!("{} not found", args.env_file.display()));
    }

    let output_dir = args.output.unwrap_or_else(|| default_output_dir(now));
    if !args.list {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("create {}", output_dir.display()))?;
        println!("Output directory: {}", output_dir.display());
    }

    let creds = load_credentials(&args.env_file)?;
    println!("Connecting to {} as {}...", creds.host, creds.username);
    if let Some(since) = since {
        println!(
            "Filtering: files modified since {}",
            since.format("%Y-%m-%d %H:%M:%S")
        );
    }
    let mut session = FtpsSession::connect(&creds)
        .with_context(|| format!("connect to {}:{}", creds.host, creds.port))?;

    let plan = FetchPlan {
        output_dir,
        since,
        list_only: args.list,
        decompress: !args.no_decompress,
        now,
    };
    let stats = run_fetch(&mut session, &plan)?;
    if let Err(err) = session.quit() {
        tracing::debug!(%err, "quit failed");
    }

    if plan.list_only {
        if stats.skipped > 0 {
            println!("\nSkipped (older than --since): {}", stats.skipped);
        }
    } else {
        print_summary(&stats, &plan.output_dir);
    }
    Ok(())
}

fn default_output_dir(now: NaiveDateTime) -> PathBuf {
    std::env::temp_dir().join(format!("prod-debug-{}", now.format("%Y%m%d-%H%M%S")))
}

/// Walk every category in order, listing or downloading each remaining file.
pub fn run_fetch(remote: &mut dyn RemoteStore, plan: &FetchPlan) -> Result<FetchStats> {
    let mut stats = FetchStats::default();

    for category in CATEGORIES {
        let verb = if plan.list_only { "Listing" } else { "Downloading" };
        println!("\n{verb} {}/", category.name);

        let remote_dir = category.remote_dir();
        let entries = match list_directory(remote, &remote_dir, plan.now) {
            Ok(entries) => entries,
            Err(err) if err.is_permission() => {
                tracing::warn!(dir = %remote_dir, %err, "cannot access remote directory");
                Vec::new()
            }
            Err(err) => return Err(err).with_context(|| format!("list {remote_dir}")),
        };
        if entries.is_empty() {
            println!("  (no files)");
            continue;
        }

        for entry in entries {
            if let (Some(since), Some(modified)) = (plan.since, entry.modified) {
                if modified < since {
                    stats.skipped += 1;
                    continue;
                }
            }
            let age = entry
                .modified
                .map(|modified| format_time_ago(modified, plan.now))
                .unwrap_or_else(|| "?".to_string());

            if plan.list_only {
                match remote.size(&entry.name) {
                    Ok(size) => println!("  {} ({} bytes, {age})", entry.name, format_thousands(size)),
                    Err(err) => {
                        tracing::debug!(file = %entry.name, %err, "size unavailable");
                        println!("  {} ({age})", entry.name);
                    }
                }
                continue;
            }

            if entry.name.contains(['/', '\\']) {
                tracing::warn!(file = %entry.name, "refusing remote name with a path separator");
                stats.failed += 1;
                continue;
            }
            let local = plan.output_dir.join(category.name).join(&entry.name);
            match download_file(remote, &entry.name, &local)? {
                Download::Saved(size) => {
                    stats.downloaded += 1;
                    stats.bytes += size;
                    println!("  {} ({} bytes, {age})", entry.name, format_thousands(size));
                }
                Download::Refused(err) => {
                    tracing::warn!(file = %format!("{remote_dir}/{}", entry.name), %err, "cannot download");
                    stats.failed += 1;
                    continue;
                }
            }

            if plan.decompress && entry.name.ends_with(GZIP_SUFFIX) {
                match decompress_gzip(&local) {
                    Ok(path) => {
                        let name = path.file_name().unwrap_or_default().to_string_lossy();
                        println!("    -> decompressed to {name}");
                    }
                    Err(err) => {
                        let error = format!("{err:#}");
                        tracing::warn!(file = %local.display(), %error, "cannot decompress");
                    }
                }
            }
        }
    }

    tracing::info!(
        downloaded = stats.downloaded,
        skipped = stats.skipped,
        failed = stats.failed,
        bytes = stats.bytes,
        "fetch finished"
    );
    Ok(stats)
}

/// Stream one remote file to `local`. A refusal removes the partial file and
/// is returned as `Refused`; session and local I/O failures are errors.
fn download_file(remote: &mut dyn RemoteStore, name: &str, local: &Path) -> Result<Download> {
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file = File::create(local).with_context(|| format!("create {}", local.display()))?;
    let mut writer = BufWriter::new(file);
    let retrieved = remote.retrieve(name, &mut writer);
    let flushed = writer.flush();

    match retrieved {
        Ok(_) => {
            flushed.with_context(|| format!("write {}", local.display()))?;
            let size = fs::metadata(local)
                .with_context(|| format!("stat {}", local.display()))?
                .len();
            Ok(Download::Saved(size))
        }
        Err(err) => {
            let _ = fs::remove_file(local);
            if err.is_permission() {
                Ok(Download::Refused(err))
            } else {
                Err(err).with_context(|| format!("download {name}"))
            }
        }
    }
}

fn print_summary(stats: &FetchStats, output_dir: &Path) {
    let out = output_dir.display();
    println!("\n{}", "=".repeat(50));
    println!("Download complete!");
    println!("  Files downloaded: {}", stats.downloaded);
    if stats.skipped > 0 {
        println!("  Files skipped (older than --since): {}", stats.skipped);
    }
    println!(
        "  Total size: {} bytes ({})",
        format_thousands(stats.bytes),
        format_megabytes(stats.bytes)
    );
    if stats.failed > 0 {
        println!("  Failed: {}", stats.failed);
    }
    println!("\nFiles saved to: {out}");
    println!("\nQuick commands:");
    println!("  grep -r 'heat-target' {out}/logs/");
    println!("  cat {out}/state/target-temperature.json");
    println!("  ls -la {out}/crontab-backups/");
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
