use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use tokio::time::{Duration, sleep};
use whistle_core::proto::{BackupResult, LogLine, UnixMillis};

mod client;

/// Control the whistle backup daemon.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    Ping,
    /// Scheduler state and the last backup run.
    Status,
    /// Back up the database now, regardless of schedule or mode.
    Backup,
    /// List archives in the backup directory, oldest first.
    Archives,
    Logs {
        #[arg(short = 'n', long = "lines", default_value_t = 200)]
        lines: usize,

        #[arg(short = 'f', long = "follow")]
        follow: bool,
    },
    Shutdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.cmd {
        Cmd::Ping => {
            let resp = client::ping().await?;
            println!("{resp}");
        }
        Cmd::Status => {
            let (daemon, backup) = client::status().await?;
            println!(
                "daemon {} (pid {}, up {}s)",
                daemon.daemon_version,
                daemon.pid,
                daemon.uptime_ms / 1000
            );
            println!("mode:       {:?}", backup.run_mode);
            println!("database:   {}", backup.database_path);
            println!("backups:    {}", backup.backup_dir);
            println!("retention:  {} days", backup.retention_days);
            if backup.scheduler_enabled {
                println!("schedule:   {}", backup.schedule);
                match backup.next_run_ms {
                    Some(ms) => println!("next run:   {}", format_time(ms)),
                    None => println!("next run:   (not planned)"),
                }
            } else {
                println!("schedule:   disabled (set NODE_ENV=production or ENABLE_BACKUPS)");
            }
            match backup.last_run {
                Some(run) => println!(
                    "last run:   {} ({:?}) {}",
                    format_time(run.started_at_ms),
                    run.trigger,
                    describe(&run.result)
                ),
                None => println!("last run:   never"),
            }
        }
        Cmd::Backup => {
            let result = client::backup::backup_now().await?;
            println!("{}", describe(&result));
            if let BackupResult::Failed { .. } = result {
                std::process::exit(1);
            }
        }
        Cmd::Archives => {
            let entries = client::backup::list_archives().await?;
            if entries.is_empty() {
                println!("no archives");
            }
            for entry in entries {
                println!(
                    "{}  {:>10}  {}",
                    format_time(entry.modified_ms),
                    format_bytes(entry.size_bytes),
                    entry.name
                );
            }
        }
        Cmd::Logs { lines, follow } => {
            if follow {
                follow_logs(lines).await?;
            } else {
                let (lines, _) = client::daemon_logs_tail(lines).await?;
                for line in lines {
                    print_log_line(&line);
                }
            }
        }
        Cmd::Shutdown => {
            let resp = client::shutdown().await?;
            println!("{resp}");
        }
    }
    Ok(())
}

async fn follow_logs(lines: usize) -> anyhow::Result<()> {
    let mut last_at_ms = 0u64;
    let mut last_lines: Vec<String> = Vec::new();

    loop {
        let (tail, _) = client::daemon_logs_tail(lines).await?;
        for line in tail {
            if line.at_ms > last_at_ms {
                last_at_ms = line.at_ms;
                last_lines.clear();
                last_lines.push(line.line.clone());
                print_log_line(&line);
                continue;
            }

            if line.at_ms == last_at_ms && !last_lines.contains(&line.line) {
                last_lines.push(line.line.clone());
                print_log_line(&line);
            }
        }

        sleep(Duration::from_secs(1)).await;
    }
}

fn print_log_line(line: &LogLine) {
    println!("{}", line.line.trim_end());
}

fn describe(result: &BackupResult) -> String {
    match result {
        BackupResult::Created { archive, swept, sweep_failures } => {
            let mut text = format!("created {archive}");
            if !swept.is_empty() {
                text.push_str(&format!(", removed {} expired", swept.len()));
            }
            if !sweep_failures.is_empty() {
                text.push_str(&format!(", {} could not be removed", sweep_failures.len()));
            }
            text
        }
        BackupResult::SkippedMissingSource { source } => {
            format!("skipped: database file {source} does not exist")
        }
        BackupResult::Failed { error } => format!("failed: {error}"),
    }
}

fn format_time(ms: UnixMillis) -> String {
    match Local.timestamp_millis_opt(ms as i64).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
