//! 单飞锁集成测试
//!
//! 同一缓存键的并发未命中请求只触发一次翻译

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use page_translate::translation::core::{CacheKey, Outcome, RenderRequest};
use page_translate::translation::error::TranslationResult;
use page_translate::translation::storage::{
    Artifact, CacheStore, FileCacheStore, FileLockService, LockService, MemoryCacheStore,
    MemoryLockService,
};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{welcome_page, DictionaryProvider, TestEnvironmentBuilder};

const WORKERS: usize = 8;

thread_local! {
    static FIRST_READ_DONE: Cell<bool> = Cell::new(false);
}

/// 每个线程的第一次读取在拿到结果后按到达顺序依次停顿，
/// 让后到者带着过期的未命中结果去抢锁
struct StaggeredStore {
    inner: Arc<MemoryCacheStore>,
    arrivals: AtomicUsize,
    step: Duration,
}

impl CacheStore for StaggeredStore {
    fn get(&self, key: &CacheKey) -> TranslationResult<Option<Artifact>> {
        let result = self.inner.get(key);
        if !FIRST_READ_DONE.with(|done| done.replace(true)) {
            let order = self.arrivals.fetch_add(1, Ordering::SeqCst) as u32;
            thread::sleep(self.step * order);
        }
        result
    }

    fn set(&self, key: &CacheKey, artifact: &Artifact) -> TranslationResult<()> {
        self.inner.set(key, artifact)
    }

    fn delete(&self, key: &CacheKey) -> TranslationResult<()> {
        self.inner.delete(key)
    }
}

/// 测试并发请求共享一次翻译
#[test]
fn test_concurrent_misses_share_one_translation() {
    let provider = Arc::new(DictionaryProvider::german().with_delay(Duration::from_millis(300)));
    let env = TestEnvironmentBuilder::new(provider.clone()).build();
    let barrier = Barrier::new(WORKERS);

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let barrier = &barrier;
                let env = &env;
                scope.spawn(move || {
                    barrier.wait();
                    env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    // 咨询式锁允许极少数重复执行
    assert!(provider.calls() <= 2, "provider called {} times", provider.calls());
    assert!(outcomes.iter().all(|o| o.html.contains("<p>Willkommen</p>")));
    assert!(outcomes.iter().any(|o| o.outcome == Outcome::CacheHit));
    assert_eq!(env.store.len(), 1);
}

/// 测试拿到锁后先复查缓存，前一个持锁者的结果不会被重复翻译
#[test]
fn test_lock_winner_rechecks_cache() {
    let provider = Arc::new(DictionaryProvider::german().with_delay(Duration::from_millis(100)));
    let inner = Arc::new(MemoryCacheStore::new(16));
    let store = StaggeredStore {
        inner: inner.clone(),
        arrivals: AtomicUsize::new(0),
        step: Duration::from_millis(250),
    };
    let env = TestEnvironmentBuilder::new(provider.clone())
        .store(Arc::new(store))
        .build();
    let barrier = Barrier::new(4);

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let barrier = &barrier;
                let env = &env;
                scope.spawn(move || {
                    barrier.wait();
                    env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(provider.calls(), 1);
    assert_eq!(inner.len(), 1);
    assert!(outcomes.iter().all(|o| o.html.contains("<p>Willkommen</p>")));
    assert_eq!(
        outcomes.iter().filter(|o| o.outcome == Outcome::CacheHit).count(),
        3
    );
}

/// 测试不同缓存键互不阻塞
#[test]
fn test_different_keys_do_not_wait() {
    let provider = Arc::new(DictionaryProvider::german().with_delay(Duration::from_millis(200)));
    let env = TestEnvironmentBuilder::new(provider.clone())
        .config(|config| config.lock_wait_secs = 0)
        .build();
    let barrier = Barrier::new(2);

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["/de/", "/fr/"]
            .into_iter()
            .map(|path| {
                let barrier = &barrier;
                let env = &env;
                scope.spawn(move || {
                    barrier.wait();
                    env.orchestrator.handle(&RenderRequest::new(path, welcome_page()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(outcomes
        .iter()
        .all(|o| o.outcome == Outcome::Translated { stored: true }));
    assert_eq!(provider.calls(), 2);
}

/// 测试磁盘锁在两个编排器实例之间生效
#[test]
fn test_file_lock_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(DictionaryProvider::german().with_delay(Duration::from_millis(300)));

    let build = || {
        TestEnvironmentBuilder::new(provider.clone())
            .store(Arc::new(FileCacheStore::new(dir.path())))
            .locks(Arc::new(FileLockService::new(dir.path().join("locks"))))
            .build()
    };
    let first = build();
    let second = build();
    let barrier = Barrier::new(2);

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = [&first, &second]
            .into_iter()
            .map(|env| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(provider.calls() <= 2);
    assert!(outcomes.iter().all(|o| o.html.contains("<p>Willkommen</p>")));
    // 锁文件已释放
    let leftover = std::fs::read_dir(dir.path().join("locks"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

/// 测试持锁者崩溃后锁过期，后来者接管
#[test]
fn test_expired_lock_is_taken_over() {
    let provider = Arc::new(DictionaryProvider::german());
    let locks = Arc::new(MemoryLockService::new());
    let env = TestEnvironmentBuilder::new(provider.clone())
        .config(|config| config.lock_wait_secs = 0)
        .locks(locks.clone())
        .build();

    let request = RenderRequest::new("/de/", welcome_page());
    let context = env.orchestrator.prepare(&request).unwrap();
    let lock_key = format!("lock:{}", context.cache_key);

    assert!(locks.try_acquire(&lock_key, Duration::from_millis(50)).unwrap());

    assert_eq!(env.orchestrator.handle(&request).outcome, Outcome::LockTimeout);

    thread::sleep(Duration::from_millis(80));
    assert_eq!(
        env.orchestrator.handle(&request).outcome,
        Outcome::Translated { stored: true }
    );
    assert_eq!(provider.calls(), 1);
}
