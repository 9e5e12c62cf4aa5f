//! Runs long-lived processes side by side and shuts them down together.
//!
//! Each process receives a [`CancellationToken`]. The token is cancelled when
//! SIGINT/SIGTERM arrives, when any process fails, or when the caller cancels
//! a token supplied through [`Runner::with_cancellation_token`]. Closers then
//! run under a shared timeout.
//!
//! # Example
//!
//! ```no_run
//! use uplink_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_named_process("ticker", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {
//!                         tracing::info!("tick");
//!                     }
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type BoxedResultFuture = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

/// A process body. Must return once the token is cancelled.
pub type AppProcess = Box<dyn FnOnce(CancellationToken) -> BoxedResultFuture + Send>;

/// Cleanup run after every process has stopped.
pub type Closer = Box<dyn FnOnce() -> BoxedResultFuture + Send>;

struct NamedProcess {
    name: String,
    process: AppProcess,
}

pub struct Runner {
    app_processes: Vec<NamedProcess>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
    cancellation_token: CancellationToken,
    handle_signals: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Closer timeout defaults to 10 seconds.
    pub fn new() -> Self {
        Self {
            app_processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
            cancellation_token: CancellationToken::new(),
            handle_signals: true,
        }
    }

    pub fn with_app_process<F, Fut>(self, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.with_named_process("app", process)
    }

    /// Add a process whose name is attached to its log lines.
    pub fn with_named_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.app_processes.push(NamedProcess {
            name: name.into(),
            process: Box::new(|token| Box::pin(process(token))),
        });
        self
    }

    /// Closers run concurrently; a failing closer does not stop the others.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Disable SIGINT/SIGTERM handling, leaving shutdown to the token.
    pub fn without_signal_handlers(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Run until stopped, then exit the process with code 0 or 1.
    pub async fn run(self) {
        match self.run_until_stopped().await {
            Ok(()) => {
                tracing::info!("Application exiting normally");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!("Application exiting with error: {:#}", err);
                std::process::exit(1);
            }
        }
    }

    /// Run all processes until cancellation or the first failure, then run
    /// closers. Returns the first process error, if any.
    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        let token = self.cancellation_token;
        let mut join_set = JoinSet::new();

        for NamedProcess { name, process } in self.app_processes {
            let process_token = token.clone();
            join_set.spawn(async move { (name, process(process_token).await) });
        }

        if self.handle_signals {
            spawn_signal_handlers(token.clone());
        }

        let mut first_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "App process completed successfully");
                }
                Ok((name, Err(err))) => {
                    if !token.is_cancelled() {
                        tracing::error!(process = %name, "App process error: {:#}", err);
                        first_error = Some(err);
                        token.cancel();
                    }
                }
                Err(err) => {
                    tracing::error!("App process panicked: {}", err);
                    if first_error.is_none() {
                        first_error = Some(anyhow::anyhow!("app process panicked: {}", err));
                    }
                    token.cancel();
                }
            }

            if token.is_cancelled() {
                break;
            }
        }

        join_set.shutdown().await;

        if !self.closers.is_empty() {
            tracing::info!("Running closers with timeout of {:?}", self.closer_timeout);
            match tokio::time::timeout(self.closer_timeout, run_closers(self.closers)).await {
                Ok(()) => tracing::info!("All closers completed"),
                Err(_) => tracing::error!("Closers timed out after {:?}", self.closer_timeout),
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => tracing::error!("Error setting up signal handler: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => tracing::error!("Error setting up SIGTERM handler: {}", err),
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }

    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => tracing::debug!("Closer completed successfully"),
            Ok(Err(err)) => tracing::error!("Closer error: {:#}", err),
            Err(err) => tracing::error!("Closer panicked: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn wait_for_cancel(ctx: CancellationToken) -> Result<(), anyhow::Error> {
        ctx.cancelled().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_external_cancellation_stops_processes_and_runs_closers() {
        let closer_called = Arc::new(AtomicBool::new(false));
        let flag = closer_called.clone();
        let token = CancellationToken::new();

        let runner = Runner::new()
            .without_signal_handlers()
            .with_named_process("first", wait_for_cancel)
            .with_named_process("second", wait_for_cancel)
            .with_closer(move || async move {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .with_cancellation_token(token.clone());

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result = runner.run_until_stopped().await;
        assert!(result.is_ok());
        assert!(closer_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failing_process_cancels_siblings() {
        let token = CancellationToken::new();

        let result = Runner::new()
            .without_signal_handlers()
            .with_cancellation_token(token.clone())
            .with_named_process("sibling", wait_for_cancel)
            .with_named_process("broken", |_| async move { anyhow::bail!("boom") })
            .run_until_stopped()
            .await;

        assert_eq!(result.unwrap_err().to_string(), "boom");
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failing_closer_does_not_block_others() {
        let completed = Arc::new(AtomicUsize::new(0));
        let c1 = completed.clone();
        let c2 = completed.clone();

        let closers: Vec<Closer> = vec![
            Box::new(|| Box::pin(async move { anyhow::bail!("closer failed") })),
            Box::new(move || {
                Box::pin(async move {
                    c1.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
            Box::new(move || {
                Box::pin(async move {
                    c2.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }),
        ];

        run_closers(closers).await;
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closer_timeout_does_not_hang() {
        let token = CancellationToken::new();
        token.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            Runner::new()
                .without_signal_handlers()
                .with_cancellation_token(token)
                .with_app_process(wait_for_cancel)
                .with_closer(|| async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .with_closer_timeout(Duration::from_millis(50))
                .run_until_stopped(),
        )
        .await;

        assert!(matches!(result, Ok(Ok(()))));
    }
}
