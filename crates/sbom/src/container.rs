//! 컨테이너 데몬 추상화 — 로컬 이미지 목록과 다이제스트 해석
//!
//! 구체 데몬 클라이언트(containerd 등)는 이 trait 뒤의 외부
//! 협력자입니다. `list_container_images`는 실행 중인 컨테이너의
//! 이미지만 반환해야 합니다.

use std::sync::{Arc, Mutex};

use cisin_core::imageref;
use cisin_core::pipeline::BoxFuture;

use crate::error::SbomServiceError;

/// 컨테이너 이미지 참조와 다이제스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerImage {
    /// 이미지 참조
    pub image: String,
    /// 이미지 다이제스트 (`algo:hex`)
    pub digest: String,
}

/// 컨테이너 데몬 인터페이스
pub trait ContainerDaemon: Send + Sync {
    /// 실행 중인 컨테이너의 이미지 목록을 반환합니다.
    fn list_container_images(
        &self,
    ) -> BoxFuture<'_, Result<Vec<ContainerImage>, SbomServiceError>>;

    /// 이미지 참조의 다이제스트를 해석합니다.
    fn get_digest<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>>;
}

/// 고정 이미지 목록을 제공하는 데몬 구현
///
/// 테스트와 오프라인 실행에 사용합니다.
#[derive(Debug, Clone, Default)]
pub struct StaticContainerDaemon {
    images: Arc<Mutex<Vec<ContainerImage>>>,
}

impl StaticContainerDaemon {
    /// 빈 데몬을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 이미지를 등록합니다.
    pub fn add_image(&self, image: impl Into<String>, digest: impl Into<String>) {
        self.images
            .lock()
            .expect("container daemon lock poisoned")
            .push(ContainerImage {
                image: image.into(),
                digest: digest.into(),
            });
    }
}

impl ContainerDaemon for StaticContainerDaemon {
    fn list_container_images(
        &self,
    ) -> BoxFuture<'_, Result<Vec<ContainerImage>, SbomServiceError>> {
        Box::pin(async move {
            Ok(self
                .images
                .lock()
                .expect("container daemon lock poisoned")
                .clone())
        })
    }

    fn get_digest<'a>(
        &'a self,
        reference: &'a str,
    ) -> BoxFuture<'a, Result<String, SbomServiceError>> {
        Box::pin(async move {
            let canonical = imageref::canonical(reference);

            self.images
                .lock()
                .expect("container daemon lock poisoned")
                .iter()
                .find(|image| {
                    image.image == reference || imageref::canonical(&image.image) == canonical
                })
                .map(|image| image.digest.clone())
                .ok_or_else(|| {
                    SbomServiceError::ContainerDaemon(format!("image {reference} not found"))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_registered_images() {
        let daemon = StaticContainerDaemon::new();
        daemon.add_image("docker.io/library/nginx:latest", "sha256:abc");

        let images = daemon.list_container_images().await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].digest, "sha256:abc");
    }

    #[tokio::test]
    async fn resolves_digest_through_canonicalization() {
        let daemon = StaticContainerDaemon::new();
        daemon.add_image("docker.io/library/nginx:latest", "sha256:abc");

        // 축약형 참조도 같은 이미지로 해석
        let digest = daemon.get_digest("nginx").await.unwrap();
        assert_eq!(digest, "sha256:abc");
    }

    #[tokio::test]
    async fn unknown_image_is_an_error() {
        let daemon = StaticContainerDaemon::new();
        assert!(daemon.get_digest("ghost").await.is_err());
    }
}
