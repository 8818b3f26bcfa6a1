//! 취약점 스캐너 추상화 — SBOM 파일을 스캔하여 CVE 목록 산출
//!
//! [`CommandVulnScanner`]는 grype 계열 CLI를 서브프로세스로 구동하고
//! JSON 출력을 파싱합니다. 스캐너 자체는 외부 협력자입니다.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use cisin_core::pipeline::BoxFuture;

use crate::error::CveMetricsError;

/// 스캔 결과 보고서
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// 매칭된 취약점 목록
    #[serde(default)]
    pub matches: Vec<ScanMatch>,
}

/// 취약점 매치 하나
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanMatch {
    /// 취약점 정보
    pub vulnerability: ScanVulnerability,
}

/// 취약점 정보
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanVulnerability {
    /// 취약점 ID (CVE-...)
    pub id: String,
    /// 심각도 (Critical, High, ...)
    #[serde(default)]
    pub severity: String,
    /// 연관 취약점
    #[serde(rename = "relatedVulnerabilities", default)]
    pub related_vulnerabilities: Vec<ScanVulnerability>,
    /// CVSS 점수
    #[serde(rename = "cvss", default, skip_serializing_if = "Vec::is_empty")]
    pub cvss: Vec<ScanCvss>,
}

/// CVSS 항목
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCvss {
    /// 점수 묶음
    #[serde(default)]
    pub metrics: ScanCvssMetrics,
}

/// CVSS 점수
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanCvssMetrics {
    /// 기본 점수
    #[serde(rename = "baseScore", default)]
    pub base_score: f64,
}

/// 취약점 스캐너 인터페이스
pub trait VulnScanner: Send + Sync {
    /// SBOM 파일을 스캔합니다.
    fn scan<'a>(&'a self, sbom_path: &'a str)
        -> BoxFuture<'a, Result<ScanReport, CveMetricsError>>;
}

/// 외부 CLI 기반 스캐너
///
/// `<command> sbom:<path> -o json`으로 실행합니다.
pub struct CommandVulnScanner {
    command: String,
}

impl CommandVulnScanner {
    /// 명령어로 스캐너를 생성합니다.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl VulnScanner for CommandVulnScanner {
    fn scan<'a>(
        &'a self,
        sbom_path: &'a str,
    ) -> BoxFuture<'a, Result<ScanReport, CveMetricsError>> {
        Box::pin(async move {
            let output = Command::new(&self.command)
                .args([&format!("sbom:{sbom_path}"), "-o", "json"])
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| CveMetricsError::Scan(format!("spawn {}: {e}", self.command)))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(CveMetricsError::Scan(format!(
                    "{} exited with {}: {}",
                    self.command,
                    output.status,
                    stderr.trim(),
                )));
            }

            serde_json::from_slice(&output.stdout)
                .map_err(|e| CveMetricsError::ScanParse(e.to_string()))
        })
    }
}

/// 고정 결과를 반환하는 스캐너 (테스트용)
#[derive(Debug, Clone, Default)]
pub struct StaticVulnScanner {
    report: Arc<Mutex<ScanReport>>,
}

impl StaticVulnScanner {
    /// 보고서로 스캐너를 생성합니다.
    pub fn new(report: ScanReport) -> Self {
        Self {
            report: Arc::new(Mutex::new(report)),
        }
    }

    /// 매치 목록으로 스캐너를 생성합니다.
    pub fn with_findings(findings: &[(&str, &str)]) -> Self {
        let matches = findings
            .iter()
            .map(|(id, severity)| ScanMatch {
                vulnerability: ScanVulnerability {
                    id: (*id).to_owned(),
                    severity: (*severity).to_owned(),
                    ..Default::default()
                },
            })
            .collect();

        Self::new(ScanReport { matches })
    }
}

impl VulnScanner for StaticVulnScanner {
    fn scan<'a>(
        &'a self,
        _sbom_path: &'a str,
    ) -> BoxFuture<'a, Result<ScanReport, CveMetricsError>> {
        Box::pin(async move {
            Ok(self.report.lock().expect("scanner lock poisoned").clone())
        })
    }
}
