//! Multi-page processing on a bounded producer/worker/collector pipeline.
//!
//! A producer feeds page indices into a bounded job channel, a fixed number of
//! workers run the page pipeline, and the calling thread collects results back
//! into input order. Pages stay borrowed for the whole batch; nothing is copied.

use super::recognizer::{PageRecognizer, PageTranscription};
use crossbeam_channel::bounded;
use scribe_ocr_core::core::{OCRError, OcrResult};
use scribe_ocr_core::domain::PageImage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, info, warn};

/// A shared flag that stops a running batch.
///
/// Clones observe the same flag, so one clone can be handed to another thread
/// and cancelled from there.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type PageOutcome = (usize, OcrResult<PageTranscription>);

/// Processes `pages` with `recognizer`, returning one result per page in input order.
///
/// Pages already queued when the token is set are abandoned and the whole
/// batch returns `Cancelled`. A failing page does not stop the others.
pub fn process_pages(
    recognizer: &PageRecognizer,
    pages: &[PageImage],
    token: &CancellationToken,
) -> OcrResult<Vec<OcrResult<PageTranscription>>> {
    if token.is_cancelled() {
        return Err(OCRError::Cancelled);
    }
    if pages.is_empty() {
        return Ok(Vec::new());
    }

    let policy = &recognizer.config().parallel;
    let workers = policy.worker_count(pages.len());
    let capacity = policy.channel_capacity.max(1);
    info!(
        "Processing {} page(s) on {} worker(s), queue depth {}",
        pages.len(),
        workers,
        capacity
    );

    let (job_tx, job_rx) = bounded::<usize>(capacity);
    let (result_tx, result_rx) = bounded::<PageOutcome>(capacity);
    let mut slots: Vec<Option<OcrResult<PageTranscription>>> =
        (0..pages.len()).map(|_| None).collect();

    let joined = thread::scope(|scope| {
        let producer = scope.spawn(move || {
            for index in 0..pages.len() {
                if token.is_cancelled() {
                    debug!("Producer stopping at page {}", index);
                    break;
                }
                if job_tx.send(index).is_err() {
                    break;
                }
            }
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for index in job_rx.iter() {
                        if token.is_cancelled() {
                            break;
                        }
                        let result = recognizer.process_page(&pages[index]);
                        if let Err(e) = &result {
                            warn!("Worker {} failed on page {}: {}", worker, index, e);
                        }
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        // Workers hold the only remaining ends; the collector stops when they exit.
        drop(job_rx);
        drop(result_tx);

        for (index, result) in result_rx.iter() {
            slots[index] = Some(result);
            if token.is_cancelled() {
                break;
            }
        }
        // Unblock workers waiting on a full result queue.
        drop(result_rx);

        let mut panicked = producer.join().is_err();
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        panicked
    });

    if token.is_cancelled() {
        info!("Page batch cancelled");
        return Err(OCRError::Cancelled);
    }
    if joined {
        return Err(OCRError::batch_processing(
            "page worker",
            std::io::Error::other("worker thread panicked"),
        ));
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.ok_or_else(|| {
                OCRError::batch_processing(
                    "collecting results",
                    std::io::Error::other(format!("page {index} produced no result")),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::PipelineConfig;
    use crate::pipeline::testing::{
        GatedSegmenter, ink, recognition_model, recognizer, striped_page,
    };
    use crossbeam_channel::unbounded;
    use scribe_ocr_core::core::ParallelPolicy;

    fn pages() -> Vec<PageImage> {
        vec![
            striped_page(&[(20, ink(1))]),
            striped_page(&[(20, ink(2)), (50, ink(3))]),
            striped_page(&[]),
            striped_page(&[(20, ink(3)), (50, ink(1)), (80, ink(2))]),
            striped_page(&[(50, ink(2))]),
        ]
    }

    #[test]
    fn test_results_keep_input_order() {
        let config = PipelineConfig::new().with_parallel(
            ParallelPolicy::new()
                .with_max_threads(Some(3))
                .with_channel_capacity(1),
        );
        let rec = recognizer(config);
        let results = rec.process_pages(&pages(), &CancellationToken::new()).unwrap();
        let texts: Vec<String> = results
            .into_iter()
            .map(|r| r.unwrap().transcription.text())
            .collect();
        assert_eq!(texts, vec!["a", "b\nc", "", "c\na\nb", "b"]);
    }

    #[test]
    fn test_empty_batch() {
        let rec = recognizer(PipelineConfig::new());
        let results = rec.process_pages(&[], &CancellationToken::new()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_cancelled_token_stops_batch() {
        let rec = recognizer(PipelineConfig::new());
        let token = CancellationToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
        let err = rec.process_pages(&pages(), &observer).unwrap_err();
        assert!(matches!(err, OCRError::Cancelled));
    }

    #[test]
    fn test_cancel_during_batch_discards_finished_pages() {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded::<()>();
        let rec = PageRecognizer::builder()
            .segmentation_model(Arc::new(GatedSegmenter::new(started_tx, release_rx)))
            .recognition_model(recognition_model(&["a", "b", "c"]))
            .config(
                PipelineConfig::new().with_parallel(
                    ParallelPolicy::new()
                        .with_max_threads(Some(2))
                        .with_channel_capacity(1),
                ),
            )
            .build()
            .unwrap();
        let pages = pages();
        let token = CancellationToken::new();

        let result = thread::scope(|scope| {
            let batch = scope.spawn(|| rec.process_pages(&pages, &token));
            started_rx.recv().unwrap();
            token.cancel();
            // Closing the gate lets every blocked worker finish its page.
            drop(release_tx);
            batch.join().unwrap()
        });

        assert!(matches!(result, Err(OCRError::Cancelled)));
        // Pages started after cancellation never reach the segmenter.
        assert!(started_rx.try_iter().count() < pages.len());
    }
}
