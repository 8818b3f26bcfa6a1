//! 스레드 안전 맵 — [`SafeMap`]과 TTL 변형 [`SafeMapTtl`]
//!
//! [`SafeMap`]은 임의의 동시 호출자 아래에서 모든 연산이 서로
//! 직렬화되는 key→value 매핑입니다. 코어의 유일한 프로세스 내
//! 공유 가변 상태이며, 읽기-수정-쓰기를 수행하는 호출자는 짧은
//! 비원자 구간을 감수합니다 (반복 메시지로 결과가 수렴).
//!
//! [`SafeMapTtl`]은 `set`마다 키별 데드라인을 기록하고, 백그라운드
//! 스위퍼가 만료된 키를 제거합니다. 스위퍼는 취소 토큰으로 정지합니다.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// 스레드 안전 key→value 맵
///
/// 연산은 잠금으로 직렬화되며, 값은 복제로 반환됩니다.
/// `Clone`은 같은 맵에 대한 핸들을 공유합니다.
#[derive(Debug)]
pub struct SafeMap<K, V> {
    inner: Arc<Mutex<HashMap<K, V>>>,
}

impl<K, V> Clone for SafeMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for SafeMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SafeMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// 빈 맵을 생성합니다.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 값을 조회합니다. `(value, present)` 의미론을 따릅니다.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .expect("safemap lock poisoned")
            .get(key)
            .cloned()
    }

    /// 값을 설정합니다. 기존 항목은 제자리에서 갱신됩니다.
    pub fn set(&self, key: K, value: V) {
        self.inner
            .lock()
            .expect("safemap lock poisoned")
            .insert(key, value);
    }

    /// 현재 키들의 스냅샷을 반환합니다.
    ///
    /// 반환 이후의 변경은 스냅샷에 반영되지 않습니다.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .lock()
            .expect("safemap lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// 항목 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("safemap lock poisoned").len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// TTL 만료가 있는 스레드 안전 맵
///
/// `set` 시점에 키별 데드라인(`now + ttl`)을 기록합니다.
/// [`SafeMapTtl::spawn_sweeper`]로 시작한 백그라운드 스위퍼가
/// `ttl_interval`마다 데드라인이 지난 키를 제거합니다.
#[derive(Debug)]
pub struct SafeMapTtl<K, V> {
    inner: Arc<Mutex<TtlInner<K, V>>>,
    ttl: Duration,
}

#[derive(Debug)]
struct TtlInner<K, V> {
    map: HashMap<K, V>,
    deadlines: HashMap<K, Instant>,
}

impl<K, V> Clone for SafeMapTtl<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
        }
    }
}

impl<K, V> SafeMapTtl<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// TTL 맵을 생성합니다. 스위퍼는 별도로 시작해야 합니다.
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TtlInner {
                map: HashMap::new(),
                deadlines: HashMap::new(),
            })),
            ttl,
        }
    }

    /// TTL 맵을 생성하고 스위퍼 태스크를 함께 시작합니다.
    pub fn with_sweeper(ttl: Duration, ttl_interval: Duration, cancel: CancellationToken) -> Self {
        let map = Self::new(ttl);
        map.spawn_sweeper(ttl_interval, cancel);
        map
    }

    /// 값을 조회합니다. 만료 판정은 스위퍼가 수행하므로, 데드라인이
    /// 지났지만 아직 제거되지 않은 항목은 반환될 수 있습니다.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .expect("safemap ttl lock poisoned")
            .map
            .get(key)
            .cloned()
    }

    /// 값을 설정하고 데드라인을 `now + ttl`로 갱신합니다.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("safemap ttl lock poisoned");
        inner.deadlines.insert(key.clone(), Instant::now() + self.ttl);
        inner.map.insert(key, value);
    }

    /// 현재 키들의 스냅샷을 반환합니다.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .lock()
            .expect("safemap ttl lock poisoned")
            .map
            .keys()
            .cloned()
            .collect()
    }

    /// 항목 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("safemap ttl lock poisoned")
            .map
            .len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 스위퍼 태스크를 시작합니다.
    ///
    /// `ttl_interval`마다 만료된 키를 제거하며, 취소 토큰이
    /// 취소되면 종료합니다.
    pub fn spawn_sweeper(&self, ttl_interval: Duration, cancel: CancellationToken) {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ttl_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // interval의 첫 tick은 즉시 발화하므로 소비
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        sweep(&inner);
                    }
                }
            }
        });
    }

    /// 만료된 키를 즉시 제거합니다. (테스트 및 스위퍼 공용)
    pub fn sweep_now(&self) {
        sweep(&self.inner);
    }
}

fn sweep<K, V>(inner: &Arc<Mutex<TtlInner<K, V>>>)
where
    K: Eq + Hash + Clone,
{
    let mut inner = inner.lock().expect("safemap ttl lock poisoned");
    let now = Instant::now();

    let expired: Vec<K> = inner
        .deadlines
        .iter()
        .filter(|(_, deadline)| **deadline <= now)
        .map(|(key, _)| key.clone())
        .collect();

    for key in expired {
        inner.map.remove(&key);
        inner.deadlines.remove(&key);
    }
}
