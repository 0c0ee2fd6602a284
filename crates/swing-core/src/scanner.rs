//! Sector-wide scan over a bounded worker pool

use crate::config::{RankingConfig, ScanConfig};
use crate::error::{Result, TraderError};
use crate::pipeline::Pipeline;
use crate::ranker::rank;
use crate::result::{FailureKind, SectorScanResult, TickerFailure};
use crate::sector::SectorLoader;
use crate::state::PipelineOutcome;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant as TokioInstant;
use tracing::{Instrument, info, info_span, instrument, warn};

/// Terminal state of one ticker's run inside a scan
#[derive(Debug)]
enum RunOutcome {
    Finished(PipelineOutcome),
    Crashed(String),
}

/// Resolves a sector, runs one pipeline per ticker and ranks the results
pub struct SectorScanner {
    loader: SectorLoader,
    pipeline: Arc<Pipeline>,
    ranking: RankingConfig,
}

impl SectorScanner {
    pub fn new(loader: SectorLoader, pipeline: Arc<Pipeline>, ranking: RankingConfig) -> Self {
        Self {
            loader,
            pipeline,
            ranking,
        }
    }

    pub fn loader(&self) -> &SectorLoader {
        &self.loader
    }

    /// Scan `sector`.
    ///
    /// `config.workers` tasks pull tickers from a shared cursor. Output order
    /// depends only on the tickers and their reports, never on completion
    /// order. When the deadline passes, in-flight runs are aborted and every
    /// ticker without an outcome is reported as `DeadlineExceeded`. The
    /// deadline also covers sector resolution; running out there fails the
    /// whole scan since no ticker is known yet.
    #[instrument(skip_all, fields(sector = %sector))]
    pub async fn scan(&self, sector: &str, config: &ScanConfig) -> Result<SectorScanResult> {
        let started = Instant::now();
        let expires = config.deadline().map(|deadline| TokioInstant::now() + deadline);
        let sector = sector.trim().to_ascii_uppercase();

        let resolve = self.loader.resolve(&sector);
        let tickers = match expires {
            Some(at) => tokio::time::timeout_at(at, resolve).await.map_err(|_| {
                TraderError::Upstream(format!("{sector} did not resolve before the scan deadline"))
            })??,
            None => resolve.await?,
        };
        let tickers = Arc::new(tickers);
        let workers = config.workers.clamp(1, tickers.len().max(1));
        info!(tickers = tickers.len(), workers, "Starting sector scan");

        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::channel::<(usize, RunOutcome)>(tickers.len().max(1));
        let mut pool = JoinSet::new();

        for worker in 0..workers {
            let tickers = Arc::clone(&tickers);
            let cursor = Arc::clone(&cursor);
            let pipeline = Arc::clone(&self.pipeline);
            let sector = sector.clone();
            let tx = tx.clone();

            pool.spawn(
                async move {
                    loop {
                        let idx = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(ticker) = tickers.get(idx) else {
                            break;
                        };

                        let run = AssertUnwindSafe(pipeline.run(ticker, Some(&sector)));
                        let outcome = match run.catch_unwind().await {
                            Ok(Ok(outcome)) => RunOutcome::Finished(outcome),
                            Ok(Err(e)) => RunOutcome::Crashed(e.to_string()),
                            Err(panic) => RunOutcome::Crashed(panic_message(panic.as_ref())),
                        };

                        if tx.send((idx, outcome)).await.is_err() {
                            break;
                        }
                    }
                }
                .instrument(info_span!("scan_worker", worker)),
            );
        }
        drop(tx);

        let mut slots: Vec<Option<RunOutcome>> = (0..tickers.len()).map(|_| None).collect();
        let collect = async {
            while let Some((idx, outcome)) = rx.recv().await {
                slots[idx] = Some(outcome);
            }
        };

        match expires {
            Some(at) => {
                if tokio::time::timeout_at(at, collect).await.is_err() {
                    warn!(deadline = ?config.deadline(), "Scan deadline passed, abandoning in-flight runs");
                }
            },
            None => collect.await,
        }
        pool.shutdown().await;

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (ticker, slot) in tickers.iter().zip(slots) {
            match slot {
                Some(RunOutcome::Finished(PipelineOutcome::Signaled(report))) => reports.push(*report),
                Some(RunOutcome::Finished(PipelineOutcome::Aborted(failure))) => {
                    failures.push(TickerFailure::from(failure));
                },
                Some(RunOutcome::Crashed(detail)) => {
                    warn!(ticker = %ticker, "Pipeline run crashed: {detail}");
                    failures.push(TickerFailure::new(ticker.as_str(), FailureKind::Crashed, detail));
                },
                None => failures.push(TickerFailure::new(
                    ticker.as_str(),
                    FailureKind::DeadlineExceeded,
                    "no outcome before the scan deadline",
                )),
            }
        }

        let ranked = rank(&reports, &self.ranking)?;
        info!(
            ranked = ranked.len(),
            failures = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sector scan complete"
        );
        Ok(SectorScanResult::new(sector, tickers.len(), ranked, failures))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "pipeline panicked".to_string())
}
