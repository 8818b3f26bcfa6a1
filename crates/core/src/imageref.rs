//! 이미지 참조 헬퍼 — 컨테이너 이미지 참조의 정규화와 분해
//!
//! 이미지 참조는 `[registry/]repository[:tag][@digest]` 형태입니다.
//! 에이전트 모듈은 정규화된 참조를, SBOM 서비스는 repository 부분과
//! identifier 부분을 사용합니다.

/// 기본 레지스트리
const DEFAULT_REGISTRY: &str = "docker.io";

/// 단일 조각 이름의 기본 repository 접두어
const DEFAULT_REPOSITORY_PREFIX: &str = "library";

/// 기본 태그
const DEFAULT_TAG: &str = "latest";

/// 참조를 정규화합니다.
///
/// 레지스트리가 없으면 `docker.io`를, 단일 조각 이름이면 `library/`를,
/// 태그와 다이제스트가 모두 없으면 `:latest`를 보충합니다.
///
/// ```
/// use cisin_core::imageref;
///
/// assert_eq!(imageref::canonical("nginx"), "docker.io/library/nginx:latest");
/// assert_eq!(
///     imageref::canonical("quay.io/app/web:v1"),
///     "quay.io/app/web:v1",
/// );
/// ```
pub fn canonical(reference: &str) -> String {
    let repository = repository(reference);

    match identifier(reference) {
        Some(identifier) if reference.contains('@') => format!("{repository}@{identifier}"),
        Some(identifier) => format!("{repository}:{identifier}"),
        None => format!("{repository}:{DEFAULT_TAG}"),
    }
}

/// 참조에서 태그/다이제스트를 제외한 repository 부분을 반환합니다.
///
/// 레지스트리와 repository 접두어는 정규화됩니다.
pub fn repository(reference: &str) -> String {
    let base = strip_identifier(reference);

    let mut parts: Vec<&str> = base.split('/').collect();

    // 첫 조각이 레지스트리인지 판별: 점, 콜론 또는 "localhost"를 포함해야 함
    let has_registry = parts.len() > 1
        && (parts[0].contains('.') || parts[0].contains(':') || parts[0] == "localhost");

    if !has_registry {
        if parts.len() == 1 {
            parts.insert(0, DEFAULT_REPOSITORY_PREFIX);
        }
        parts.insert(0, DEFAULT_REGISTRY);
    }

    parts.join("/")
}

/// 참조의 identifier 부분 — 다이제스트 또는 태그 — 를 반환합니다.
///
/// `repo@sha256:abc` → `sha256:abc`, `repo:v1` → `v1`,
/// 둘 다 없으면 `None`.
pub fn identifier(reference: &str) -> Option<String> {
    if let Some((_, digest)) = reference.split_once('@') {
        return Some(digest.to_owned());
    }

    let last_segment = reference.rsplit('/').next().unwrap_or(reference);
    last_segment
        .split_once(':')
        .map(|(_, tag)| tag.to_owned())
}

fn strip_identifier(reference: &str) -> &str {
    let base = reference.split('@').next().unwrap_or(reference);

    // 태그 콜론은 마지막 경로 조각에서만 유효 — 포트 콜론과 혼동 금지
    match base.rfind('/') {
        Some(slash) => match base[slash..].find(':') {
            Some(colon) => &base[..slash + colon],
            None => base,
        },
        None => base.split(':').next().unwrap_or(base),
    }
}
