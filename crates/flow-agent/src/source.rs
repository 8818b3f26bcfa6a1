//! 플로우 소스 — 메시 관측 플레인의 플로우 스트림 추상화
//!
//! [`FlowSource`]는 플로우 채널과 에러 채널의 쌍을 노출합니다.
//! 구체 소스(Hubble gRPC 등)는 이 trait 뒤의 외부 협력자입니다.
//! 구현은 전송 계층의 취소/완료 신호를 에러가 아니라 채널 닫힘으로
//! 변환해야 합니다. 에러 채널의 에러는 스트림이 종료되지 않는 한
//! 치명적이지 않습니다 (로그만 남김).

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cisin_core::types::Flow;

use crate::error::FlowAgentError;

/// 플로우 채널 버퍼 크기
const FLOW_CHANNEL_CAPACITY: usize = 1024;

/// 플로우 스트림 소스
pub trait FlowSource: Send + Sync {
    /// 플로우 수신을 시작합니다.
    ///
    /// 반환된 플로우 채널은 생산자 순서를 따르지만, 재연결을 넘어선
    /// 순서는 보장되지 않습니다. 취소 토큰이 취소되면 채널이 닫힙니다.
    fn stream(
        &self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<Flow>, mpsc::Receiver<FlowAgentError>);
}

/// 채널 주입 기반 플로우 소스
///
/// 테스트와 재생(replay) 실행에 사용합니다. 생성 시 받은 송신측으로
/// 플로우를 주입하면 `stream`이 반환한 채널로 전달됩니다.
pub struct ChannelFlowSource {
    flow_rx: Mutex<Option<mpsc::Receiver<Flow>>>,
    error_rx: Mutex<Option<mpsc::Receiver<FlowAgentError>>>,
}

/// [`ChannelFlowSource`]로 플로우를 주입하는 핸들
#[derive(Clone)]
pub struct FlowInjector {
    flow_tx: mpsc::Sender<Flow>,
    error_tx: mpsc::Sender<FlowAgentError>,
}

impl FlowInjector {
    /// 플로우를 주입합니다.
    pub async fn send(&self, flow: Flow) -> Result<(), FlowAgentError> {
        self.flow_tx
            .send(flow)
            .await
            .map_err(|e| FlowAgentError::Source(e.to_string()))
    }

    /// 스트림 에러를 주입합니다.
    pub async fn send_error(&self, error: FlowAgentError) {
        let _ = self.error_tx.send(error).await;
    }
}

impl ChannelFlowSource {
    /// 소스와 주입 핸들 쌍을 생성합니다.
    pub fn new() -> (Self, FlowInjector) {
        let (flow_tx, flow_rx) = mpsc::channel(FLOW_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(16);

        (
            Self {
                flow_rx: Mutex::new(Some(flow_rx)),
                error_rx: Mutex::new(Some(error_rx)),
            },
            FlowInjector { flow_tx, error_tx },
        )
    }
}

impl FlowSource for ChannelFlowSource {
    fn stream(
        &self,
        _cancel: CancellationToken,
    ) -> (mpsc::Receiver<Flow>, mpsc::Receiver<FlowAgentError>) {
        // 한 번만 스트림을 내어줄 수 있음 — 두 번째 호출은 닫힌 채널
        let flow_rx = self
            .flow_rx
            .lock()
            .expect("flow source lock poisoned")
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1);

        let error_rx = self
            .error_rx
            .lock()
            .expect("flow source lock poisoned")
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1);

        (flow_rx, error_rx)
    }
}
