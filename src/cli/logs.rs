use crate::error::Result;
use crate::logging;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

const LOG_PREFIX: &str = "opsdeck.log";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Args)]
pub struct LogsArgs {
    /// Follow log file (like tail -f)
    #[arg(short, long)]
    pub follow: bool,

    /// Show logs from a specific date (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<String>,

    /// Number of lines to show
    #[arg(short, long, default_value = "100")]
    pub lines: usize,
}

pub async fn run(args: LogsArgs) -> Result<()> {
    let log_dir = logging::log_dir()?;

    let log_file = match &args.date {
        Some(date) => log_dir.join(format!("{}.{}", LOG_PREFIX, date)),
        None => match latest_log(&log_dir).await? {
            Some(path) => path,
            None => {
                eprintln!("No log files in {}", log_dir.display());
                return Ok(());
            }
        },
    };

    if !log_file.exists() {
        eprintln!("Log file not found: {}", log_file.display());
        return Ok(());
    }

    let content = tokio::fs::read_to_string(&log_file).await?;
    for line in tail(&content, args.lines) {
        println!("{}", line);
    }

    if args.follow {
        follow(&log_file, content.len() as u64).await?;
    }
    Ok(())
}

/// Most recent daily log file; the date suffix sorts chronologically
async fn latest_log(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut latest: Option<PathBuf> = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOG_PREFIX) {
            continue;
        }
        let path = entry.path();
        if latest.as_ref().map_or(true, |current| path > *current) {
            latest = Some(path);
        }
    }
    Ok(latest)
}

fn tail(content: &str, count: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

/// Print bytes appended after `offset` until Ctrl-C
async fn follow(path: &Path, mut offset: u64) -> Result<()> {
    let mut file = File::open(path).await?;
    let mut buf = Vec::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let len = tokio::fs::metadata(path).await?.len();
        if len < offset {
            // Truncated or replaced
            file = File::open(path).await?;
            offset = 0;
        }
        if len == offset {
            continue;
        }

        file.seek(SeekFrom::Start(offset)).await?;
        buf.clear();
        let read = (&mut file).take(len - offset).read_to_end(&mut buf).await?;
        offset += read as u64;
        print!("{}", String::from_utf8_lossy(&buf));
        std::io::Write::flush(&mut std::io::stdout())?;
    }
}
