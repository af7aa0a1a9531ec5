use std::{
    env, fs, panic,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    thread,
    time::{Duration, SystemTime},
};

use tokio::net::TcpListener;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Keeps the non-blocking log writer alive for the life of the process.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Log to stdout, and additionally to a daily-rolled file under LOG_DIR
/// when that directory is writable. RUST_LOG overrides the default filter.
pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let file = file_writer(service_name);
    let file_layer = file
        .as_ref()
        .map(|(writer, _)| fmt::layer().with_writer(writer.clone()));

    let subscriber = Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    TracingGuards {
        _file_guard: file.map(|(_, guard)| guard),
    }
}

fn file_writer(service_name: &str) -> Option<(NonBlocking, WorkerGuard)> {
    let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "/var/log/mira".to_string());
    let log_root = PathBuf::from(log_dir).join(service_name);
    fs::create_dir_all(&log_root).ok()?;

    // rolling::daily panics on an unwritable path instead of erroring.
    let appender = panic::catch_unwind(|| {
        tracing_appender::rolling::daily(&log_root, format!("{service_name}.log"))
    })
    .ok()?;

    let retention_days = env_or("LOG_RETENTION_DAYS", 14u64);
    let sweep_minutes = env_or("LOG_CLEANUP_INTERVAL_MINUTES", 360u64);
    if retention_days > 0 && sweep_minutes > 0 {
        spawn_log_sweeper(log_root, retention_days, sweep_minutes);
    }

    Some(tracing_appender::non_blocking(appender))
}

fn spawn_log_sweeper(log_root: PathBuf, retention_days: u64, sweep_minutes: u64) {
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let interval = Duration::from_secs(sweep_minutes * 60);

    thread::spawn(move || loop {
        if let Some(cutoff) = SystemTime::now().checked_sub(retention) {
            remove_logs_older_than(&log_root, cutoff);
        }
        thread::sleep(interval);
    });
}

fn remove_logs_older_than(root: &std::path::Path, cutoff: SystemTime) {
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let modified = entry.metadata().and_then(|m| m.modified());
            if matches!(modified, Ok(stamp) if stamp < cutoff) {
                let _ = fs::remove_file(&path);
            }
        }
    }
}

/// Parse a typed environment value, falling back to `default` when the
/// variable is absent or malformed.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

/// Split a comma-separated environment value (e.g. CORS_ORIGINS) into
/// trimmed, non-empty entries.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Bind on all interfaces for container compatibility.
pub async fn bind_listener(port: u16) -> TcpListener {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await.expect("bind listener")
}

/// Resolves on ctrl-c or SIGTERM so axum can drain in-flight requests.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::{env_or, split_csv};

    #[test]
    fn splits_and_trims_csv() {
        let items = split_csv(" https://a.example ,, https://b.example ");
        assert_eq!(items, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn empty_csv_is_empty() {
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn env_or_falls_back_on_missing_key() {
        assert_eq!(env_or("MIRA_TEST_MISSING_KEY", 7u16), 7);
    }
}
