//! SBOM 합성 추상화 — 외부 도구 기반 SBOM 생성
//!
//! [`SbomSynth`]는 식별자(이미지 참조 또는 파일시스템 경로)에서
//! SBOM 문서 바이트를 합성하고, 이미지에 대해서는 원격 SBOM 탐색
//! 사이드 채널(서명/증명 첨부)을 시도할 수 있습니다.
//!
//! [`CommandSbomSynth`]는 syft 계열 CLI 도구를 서브프로세스로
//! 구동합니다. 도구 자체는 외부 협력자이며 명령어는 설정으로
//! 주입됩니다.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::process::Command;

use cisin_core::pipeline::BoxFuture;

use crate::error::SbomServiceError;

/// SBOM 합성 인터페이스
pub trait SbomSynth: Send + Sync {
    /// 식별자에서 SBOM 문서를 합성합니다.
    fn synthesize<'a>(
        &'a self,
        location: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, SbomServiceError>>;

    /// 원격에 이미 존재하는 SBOM의 URL을 탐색합니다.
    ///
    /// 실패는 치명적이지 않습니다 — 호출자는 합성으로 폴백합니다.
    fn remote_sbom_url<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>>;
}

/// 외부 CLI 도구 기반 합성 구현
///
/// `<command> scan <location> -o <format>` 형태로 도구를 실행하고
/// stdout을 SBOM 문서로 사용합니다.
pub struct CommandSbomSynth {
    command: String,
    output_format: String,
}

impl CommandSbomSynth {
    /// 명령어와 출력 형식으로 합성기를 생성합니다.
    pub fn new(command: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            output_format: output_format.into(),
        }
    }

    /// 미디어 타입에 맞는 도구 출력 형식을 반환합니다.
    pub fn output_format_for_media_type(media_type: &str) -> &'static str {
        if media_type.contains("cyclonedx") {
            "cyclonedx-json"
        } else {
            "spdx-json"
        }
    }
}

impl SbomSynth for CommandSbomSynth {
    fn synthesize<'a>(
        &'a self,
        location: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, SbomServiceError>> {
        Box::pin(async move {
            tracing::debug!(location = %location, "generate SBOM");

            let output = Command::new(&self.command)
                .args(["scan", location, "-o", &self.output_format])
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| {
                    SbomServiceError::Synthesis(format!("spawn {}: {e}", self.command))
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(SbomServiceError::Synthesis(format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim(),
                )));
            }

            Ok(output.stdout)
        })
    }

    fn remote_sbom_url<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>> {
        Box::pin(async move {
            // 탐색 사이드 채널이 설정되지 않음 — 합성으로 폴백
            Err(SbomServiceError::RemoteSbom(format!(
                "no discovery channel for {reference}"
            )))
        })
    }
}

/// 고정 문서를 반환하는 합성 구현 (테스트용)
#[derive(Debug, Clone, Default)]
pub struct StaticSbomSynth {
    document: Vec<u8>,
    remote_urls: Arc<Mutex<std::collections::HashMap<String, String>>>,
}

impl StaticSbomSynth {
    /// 고정 문서로 합성기를 생성합니다.
    pub fn new(document: impl Into<Vec<u8>>) -> Self {
        Self {
            document: document.into(),
            remote_urls: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    /// 참조에 대한 원격 SBOM URL을 등록합니다.
    pub fn add_remote_url(&self, reference: impl Into<String>, url: impl Into<String>) {
        self.remote_urls
            .lock()
            .expect("synth lock poisoned")
            .insert(reference.into(), url.into());
    }
}

impl SbomSynth for StaticSbomSynth {
    fn synthesize<'a>(
        &'a self,
        _location: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, SbomServiceError>> {
        Box::pin(async move { Ok(self.document.clone()) })
    }

    fn remote_sbom_url<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>> {
        Box::pin(async move {
            self.remote_urls
                .lock()
                .expect("synth lock poisoned")
                .get(reference)
                .cloned()
                .ok_or_else(|| {
                    SbomServiceError::RemoteSbom(format!("no remote sbom for {reference}"))
                })
        })
    }
}
