//! 경계 있는 워커 풀 — 연결 메시지 처리의 동시성 한도
//!
//! 고정 수의 워커가 하나의 대기열을 공유합니다. 대기열이 가득 차면
//! 경고를 남기지만 제출은 계속 진행됩니다 — 배압은 관찰용이며
//! 메시지를 버리지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use cisin_core::metrics::CORRELATION_WORKER_QUEUE_DEPTH;
use cisin_core::pipeline::BoxFuture;

/// 경계 있는 워커 풀
pub struct WorkerPool {
    tx: mpsc::Sender<BoxFuture<'static, ()>>,
    queued: Arc<AtomicUsize>,
    max_queue: usize,
}

impl WorkerPool {
    /// `size`개의 워커와 `max_queue` 크기의 대기열로 풀을 생성합니다.
    ///
    /// 워커는 취소 토큰이 취소되면 종료합니다.
    pub fn new(size: usize, max_queue: usize, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel::<BoxFuture<'static, ()>>(max_queue);
        let rx = Arc::new(Mutex::new(rx));
        let queued = Arc::new(AtomicUsize::new(0));

        for _ in 0..size {
            let rx = Arc::clone(&rx);
            let queued = Arc::clone(&queued);
            let cancel = cancel.clone();

            tokio::spawn(async move {
                loop {
                    let task = tokio::select! {
                        _ = cancel.cancelled() => return,
                        task = async { rx.lock().await.recv().await } => task,
                    };

                    let Some(task) = task else { return };

                    queued.fetch_sub(1, Ordering::Relaxed);
                    metrics::gauge!(CORRELATION_WORKER_QUEUE_DEPTH)
                        .set(queued.load(Ordering::Relaxed) as f64);

                    task.await;
                }
            });
        }

        Self {
            tx,
            queued,
            max_queue,
        }
    }

    /// 작업을 제출합니다.
    ///
    /// 대기열이 가득 차면 경고를 남기고, 자리가 날 때까지 기다린 뒤
    /// 제출합니다. 작업이 버려지는 일은 없습니다.
    pub async fn submit(&self, task: impl std::future::Future<Output = ()> + Send + 'static) {
        let depth = self.queued.load(Ordering::Relaxed);

        if depth >= self.max_queue {
            tracing::warn!(size = depth, "skip message due to full worker");
        }

        self.queued.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!(CORRELATION_WORKER_QUEUE_DEPTH)
            .set(self.queued.load(Ordering::Relaxed) as f64);

        if self.tx.send(Box::pin(task)).await.is_err() {
            // 풀이 이미 종료됨
            self.queued.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// 대기 중인 작업 수를 반환합니다.
    pub fn queue_len(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }
}
