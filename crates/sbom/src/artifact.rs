//! SBOM 아티팩트 모델 — 단일 레이어 OCI 이미지
//!
//! SBOM은 레이어가 정확히 하나인 OCI 이미지로 레지스트리에
//! 저장됩니다. 레이어의 미디어 타입이 SBOM 형식을 나타내며
//! 프로세스당 하나로 고정됩니다.

use bytes::Bytes;

/// OCI config 미디어 타입
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// OCI manifest 미디어 타입
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// SPDX JSON 레이어 미디어 타입
pub const SPDX_JSON_MEDIA_TYPE: &str = "application/vnd.spdx+json";

/// CycloneDX JSON 레이어 미디어 타입
pub const CYCLONEDX_JSON_MEDIA_TYPE: &str = "application/vnd.cyclonedx+json";

/// 아티팩트 레이어
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomLayer {
    /// 레이어 미디어 타입
    pub media_type: String,
    /// 레이어 내용
    pub data: Bytes,
}

impl SbomLayer {
    /// 새 레이어를 생성합니다.
    pub fn new(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// 레지스트리에 저장되는 SBOM 아티팩트
///
/// 레이어 순서는 보존됩니다. SBOM 아티팩트는 항상 단일 레이어지만,
/// pull 경로는 임의 레이어 수를 다룰 수 있어야 합니다 (소비자는
/// SBOM 미디어 타입 레이어만 사용).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomArtifact {
    /// config 미디어 타입
    pub config_media_type: String,
    /// manifest 미디어 타입
    pub manifest_media_type: String,
    /// 레이어 목록 (순서 보존)
    pub layers: Vec<SbomLayer>,
}

impl SbomArtifact {
    /// SBOM 데이터 하나를 단일 레이어 아티팩트로 감쌉니다.
    pub fn single_layer(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            config_media_type: CONFIG_MEDIA_TYPE.to_owned(),
            manifest_media_type: MANIFEST_MEDIA_TYPE.to_owned(),
            layers: vec![SbomLayer::new(data, media_type)],
        }
    }

    /// 주어진 미디어 타입의 레이어들을 반환합니다.
    pub fn layers_with_media_type<'a>(
        &'a self,
        media_type: &'a str,
    ) -> impl Iterator<Item = &'a SbomLayer> {
        self.layers
            .iter()
            .filter(move |layer| layer.media_type == media_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layer_sets_oci_media_types() {
        let artifact = SbomArtifact::single_layer(b"{}".as_slice(), SPDX_JSON_MEDIA_TYPE);

        assert_eq!(artifact.config_media_type, CONFIG_MEDIA_TYPE);
        assert_eq!(artifact.manifest_media_type, MANIFEST_MEDIA_TYPE);
        assert_eq!(artifact.layers.len(), 1);
        assert_eq!(artifact.layers[0].media_type, SPDX_JSON_MEDIA_TYPE);
    }

    #[test]
    fn layers_with_media_type_filters() {
        let mut artifact = SbomArtifact::single_layer(b"{}".as_slice(), SPDX_JSON_MEDIA_TYPE);
        artifact
            .layers
            .push(SbomLayer::new(b"other".as_slice(), "application/octet-stream"));

        let matching: Vec<_> = artifact.layers_with_media_type(SPDX_JSON_MEDIA_TYPE).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].data.as_ref(), b"{}");
    }
}
