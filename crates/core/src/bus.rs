//! 메시지 버스 — 타입화된 pub/sub 추상화
//!
//! [`MessageBus`]는 와이어 직렬화 가능한 메시지 타입 `M`에 대한
//! fire-and-forget 발행과 큐 그룹 구독을 제공합니다. 큐 그룹에
//! 참여한 구독자들은 부하를 분산합니다: 발행된 각 메시지는 그룹당
//! 정확히 한 구독자에게 전달됩니다.
//!
//! 구체 브로커(NATS 등)는 이 trait 뒤의 외부 협력자입니다.
//! 이 크레이트는 두 구현을 제공합니다:
//!
//! - [`NoopBus`] — 오프라인 테스트용. 발행은 성공하고 구독 채널은
//!   유휴 상태를 유지합니다.
//! - [`MemoryBus`] — 프로세스 내 브로커. 큐 그룹 의미론을 포함하여
//!   통합 테스트와 단일 프로세스 배포에 사용합니다.
//!
//! 역직렬화에 실패한 메시지는 조용히 폐기됩니다 (메시지 유실,
//! 처리는 계속).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::pipeline::BoxFuture;
use crate::wire::WireMessage;

/// 구독자별 수신 버퍼 크기
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// 타입화된 pub/sub 버스
///
/// 메서드는 dyn-compatibility를 위해 [`BoxFuture`]를 반환합니다.
/// 모듈은 `Arc<dyn MessageBus<Connection>>` 형태로 버스를 공유합니다.
pub trait MessageBus<M: WireMessage>: Send + Sync {
    /// 메시지를 발행합니다. fire-and-forget이며 전달을 보장하지 않습니다.
    fn publish<'a>(&'a self, subject: &'a str, message: &'a M)
        -> BoxFuture<'a, Result<(), BusError>>;

    /// 큐 그룹 `queue`로 `subject`를 구독합니다.
    ///
    /// 취소 토큰이 취소되면 반환된 채널이 닫혀 소비 루프가 종료됩니다.
    fn subscribe<'a>(
        &'a self,
        subject: &'a str,
        queue: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<M>, BusError>>;
}

// ─── NoopBus ─────────────────────────────────────────────────────────

/// 아무것도 하지 않는 버스
///
/// 발행은 항상 성공하고, 구독 채널은 취소 전까지 메시지 없이
/// 열려 있습니다.
#[derive(Debug, Clone, Default)]
pub struct NoopBus;

impl NoopBus {
    /// 새 noop 버스를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl<M: WireMessage> MessageBus<M> for NoopBus {
    fn publish<'a>(
        &'a self,
        _subject: &'a str,
        _message: &'a M,
    ) -> BoxFuture<'a, Result<(), BusError>> {
        Box::pin(async { Ok(()) })
    }

    fn subscribe<'a>(
        &'a self,
        _subject: &'a str,
        _queue: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<M>, BusError>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(1);

            // 송신측을 취소 시점까지 잡아두어 채널을 유휴 상태로 유지
            tokio::spawn(async move {
                cancel.cancelled().await;
                drop(tx);
            });

            Ok(rx)
        })
    }
}

// ─── MemoryBus ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct QueueGroup {
    subscribers: Vec<mpsc::Sender<Vec<u8>>>,
    next: usize,
}

#[derive(Debug, Default)]
struct BrokerState {
    // subject → queue group 이름 → 그룹
    subjects: HashMap<String, HashMap<String, QueueGroup>>,
}

/// 프로세스 내 브로커 버스
///
/// 발행된 프레임은 subject의 모든 큐 그룹에 복사되고, 각 그룹
/// 내에서는 라운드로빈으로 한 구독자에게 전달됩니다. 닫힌 구독자는
/// 발행 경로에서 제거됩니다.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBus {
    /// 새 브로커를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 프레임을 그룹당 한 구독자에게 전달합니다.
    async fn dispatch(&self, subject: &str, frame: Vec<u8>) {
        let groups: Vec<String> = {
            let state = self.state.lock().expect("bus state lock poisoned");
            match state.subjects.get(subject) {
                Some(groups) => groups.keys().cloned().collect(),
                None => return,
            }
        };

        for group in groups {
            self.dispatch_to_group(subject, &group, frame.clone()).await;
        }
    }

    async fn dispatch_to_group(&self, subject: &str, group: &str, frame: Vec<u8>) {
        loop {
            // 락을 잡은 채로 await하지 않기 위해 대상 선택과 전송을 분리
            let target = {
                let mut state = self.state.lock().expect("bus state lock poisoned");
                let Some(queue_group) = state
                    .subjects
                    .get_mut(subject)
                    .and_then(|groups| groups.get_mut(group))
                else {
                    return;
                };

                if queue_group.subscribers.is_empty() {
                    return;
                }

                let index = queue_group.next % queue_group.subscribers.len();
                queue_group.next = queue_group.next.wrapping_add(1);
                queue_group.subscribers[index].clone()
            };

            if target.send(frame.clone()).await.is_ok() {
                return;
            }

            // 구독자가 사라짐 — 제거 후 다음 구독자로 재시도
            let mut state = self.state.lock().expect("bus state lock poisoned");
            if let Some(queue_group) = state
                .subjects
                .get_mut(subject)
                .and_then(|groups| groups.get_mut(group))
            {
                queue_group
                    .subscribers
                    .retain(|subscriber| !subscriber.same_channel(&target));
            }
        }
    }

    fn register(&self, subject: &str, queue: &str, sender: mpsc::Sender<Vec<u8>>) {
        let mut state = self.state.lock().expect("bus state lock poisoned");
        state
            .subjects
            .entry(subject.to_owned())
            .or_default()
            .entry(queue.to_owned())
            .or_default()
            .subscribers
            .push(sender);
    }
}

impl<M: WireMessage> MessageBus<M> for MemoryBus {
    fn publish<'a>(
        &'a self,
        subject: &'a str,
        message: &'a M,
    ) -> BoxFuture<'a, Result<(), BusError>> {
        Box::pin(async move {
            let frame = message.encode_to_vec();
            self.dispatch(subject, frame).await;
            Ok(())
        })
    }

    fn subscribe<'a>(
        &'a self,
        subject: &'a str,
        queue: &'a str,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<mpsc::Receiver<M>, BusError>> {
        Box::pin(async move {
            let (raw_tx, mut raw_rx) = mpsc::channel::<Vec<u8>>(SUBSCRIBER_CHANNEL_CAPACITY);
            let (typed_tx, typed_rx) = mpsc::channel::<M>(SUBSCRIBER_CHANNEL_CAPACITY);

            self.register(subject, queue, raw_tx);

            let subject = subject.to_owned();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        frame = raw_rx.recv() => {
                            let Some(frame) = frame else { return };

                            let message = match M::decode(&frame) {
                                Ok(message) => message,
                                Err(err) => {
                                    tracing::trace!(subject = %subject, error = %err, "drop undecodable message");
                                    continue;
                                }
                            };

                            if typed_tx.send(message).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });

            Ok(typed_rx)
        })
    }
}
