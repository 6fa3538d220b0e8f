//! 页面缓存模块
//!
//! 按缓存键保存最终标记。有效期在读取时判断，过期条目视为未命中；
//! 存储层的任何错误都降级为未命中，不会影响请求。

use std::fs;
use std::io::{ErrorKind, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use lru::LruCache;
use tempfile::NamedTempFile;

use crate::translation::config::TranslationConfig;
use crate::translation::core::route::CacheKey;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::utils::clock::{Clock, SystemClock};

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub html: String,
    pub stored_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(html: impl Into<String>, stored_at: DateTime<Utc>) -> Self {
        Self {
            html: html.into(),
            stored_at,
        }
    }

    /// 检查条目是否过期
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.stored_at);
        age.to_std().map_or(false, |age| age > ttl)
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub expired: u64,
    pub stores: u64,
    pub errors: u64,
}

/// 键值存储后端
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> TranslationResult<Option<Artifact>>;
    fn set(&self, key: &CacheKey, artifact: &Artifact) -> TranslationResult<()>;
    fn delete(&self, key: &CacheKey) -> TranslationResult<()>;
}

// ============================================================================
// 内存存储
// ============================================================================

/// 进程内 LRU 存储
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, Artifact>>,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> TranslationResult<std::sync::MutexGuard<'_, LruCache<String, Artifact>>> {
        self.entries
            .lock()
            .map_err(|_| TranslationError::Storage("内存缓存锁已损坏".to_string()))
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(crate::translation::config::constants::DEFAULT_MEMORY_CACHE_SIZE)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> TranslationResult<Option<Artifact>> {
        Ok(self.entries()?.get(key.as_str()).cloned())
    }

    fn set(&self, key: &CacheKey, artifact: &Artifact) -> TranslationResult<()> {
        self.entries()?.put(key.to_string(), artifact.clone());
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> TranslationResult<()> {
        self.entries()?.pop(key.as_str());
        Ok(())
    }
}

// ============================================================================
// 文件存储
// ============================================================================

/// 磁盘存储：`{base}/{lang}/pages/{h[0..2]}/{h}.html`，文件修改时间即存储时间
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    base_dir: PathBuf,
}

impl FileCacheStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 缓存键对应的文件路径
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let hash = blake3::hash(key.as_str().as_bytes()).to_hex().to_string();
        self.base_dir
            .join(key.lang())
            .join("pages")
            .join(&hash[..2])
            .join(format!("{}.html", hash))
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &CacheKey) -> TranslationResult<Option<Artifact>> {
        let path = self.path_for(key);

        let html = match fs::read_to_string(&path) {
            Ok(html) => html,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TranslationError::from(e).with_context(&path.display().to_string())),
        };
        let modified = fs::metadata(&path)?.modified()?;

        Ok(Some(Artifact::new(html, DateTime::<Utc>::from(modified))))
    }

    fn set(&self, key: &CacheKey, artifact: &Artifact) -> TranslationResult<()> {
        let path = self.path_for(key);
        let dir = path
            .parent()
            .ok_or_else(|| TranslationError::Storage(format!("无效的缓存路径: {}", path.display())))?;
        fs::create_dir_all(dir)?;

        // 先写临时文件再原子替换，读者不会看到半个文件
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(artifact.html.as_bytes())?;
        file.as_file().set_modified(SystemTime::from(artifact.stored_at))?;
        file.persist(&path)
            .map_err(|e| TranslationError::Storage(format!("无法写入 {}: {}", path.display(), e.error)))?;

        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> TranslationResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// 带有效期的缓存
// ============================================================================

/// 页面缓存：在存储后端之上处理有效期、统计和错误降级
pub struct ArtifactCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    stats: RwLock<CacheStats>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self::with_clock(store, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CacheStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            ttl,
            clock,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// 使用配置中的有效期（已按最小值收紧）
    pub fn from_config(store: Arc<dyn CacheStore>, config: &TranslationConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(store, config.cache_ttl(), clock)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 读取未过期的页面
    pub fn fetch(&self, key: &CacheKey) -> Option<String> {
        self.record(|stats| stats.total_requests += 1);

        let artifact = match self.store.get(key) {
            Ok(Some(artifact)) => artifact,
            Ok(None) => {
                self.record(|stats| stats.cache_misses += 1);
                return None;
            }
            Err(e) => {
                tracing::warn!("缓存读取失败，按未命中处理 {}: {}", key, e);
                self.record(|stats| {
                    stats.errors += 1;
                    stats.cache_misses += 1;
                });
                return None;
            }
        };

        if artifact.is_expired(self.clock.now(), self.ttl) {
            tracing::debug!("缓存已过期: {}", key);
            self.record(|stats| {
                stats.expired += 1;
                stats.cache_misses += 1;
            });
            if let Err(e) = self.store.delete(key) {
                tracing::debug!("删除过期缓存失败 {}: {}", key, e);
            }
            return None;
        }

        self.record(|stats| stats.cache_hits += 1);
        Some(artifact.html)
    }

    /// 保存页面；失败只记录日志
    pub fn store(&self, key: &CacheKey, html: &str) -> bool {
        let artifact = Artifact::new(html, self.clock.now());
        match self.store.set(key, &artifact) {
            Ok(()) => {
                tracing::info!("已缓存 {} ({} 字节)", key, html.len());
                self.record(|stats| stats.stores += 1);
                true
            }
            Err(e) => {
                tracing::warn!("缓存写入失败 {}: {}", key, e);
                self.record(|stats| stats.errors += 1);
                false
            }
        }
    }

    /// 只检查是否存在未过期条目，不计入统计
    pub fn contains(&self, key: &CacheKey) -> bool {
        matches!(
            self.store.get(key),
            Ok(Some(artifact)) if !artifact.is_expired(self.clock.now(), self.ttl)
        )
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CacheStats {
        self.stats.read().map(|stats| stats.clone()).unwrap_or_default()
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            update(&mut stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::language::LanguageCode;
    use crate::translation::core::route::RouteIdentity;
    use crate::utils::clock::ManualClock;

    fn key(id: u64) -> CacheKey {
        let config = TranslationConfig::for_site("https://example.com", "en");
        let lang = LanguageCode::parse("de").unwrap();
        CacheKey::from_config(&config, &lang, &RouteIdentity::ByEntity(id))
    }

    struct BrokenStore;

    impl CacheStore for BrokenStore {
        fn get(&self, _key: &CacheKey) -> TranslationResult<Option<Artifact>> {
            Err(TranslationError::Storage("disk gone".to_string()))
        }

        fn set(&self, _key: &CacheKey, _artifact: &Artifact) -> TranslationResult<()> {
            Err(TranslationError::Storage("disk gone".to_string()))
        }

        fn delete(&self, _key: &CacheKey) -> TranslationResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_memory_store_lru() {
        let store = MemoryCacheStore::new(2);
        let now = Utc::now();
        store.set(&key(1), &Artifact::new("one", now)).unwrap();
        store.set(&key(2), &Artifact::new("two", now)).unwrap();
        store.set(&key(3), &Artifact::new("three", now)).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&key(1)).unwrap().is_none());
        assert_eq!(store.get(&key(3)).unwrap().unwrap().html, "three");

        store.delete(&key(3)).unwrap();
        assert!(store.get(&key(3)).unwrap().is_none());
    }

    #[test]
    fn test_ttl_evaluated_at_read_time() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryCacheStore::new(8));
        let cache = ArtifactCache::with_clock(store.clone(), Duration::from_secs(14 * 24 * 3600), clock.clone());

        assert!(cache.store(&key(1), "<html>cached</html>"));
        assert_eq!(cache.fetch(&key(1)).as_deref(), Some("<html>cached</html>"));

        clock.advance(chrono::Duration::days(13));
        assert!(cache.contains(&key(1)));

        clock.advance(chrono::Duration::days(2));
        assert!(cache.fetch(&key(1)).is_none());
        assert!(store.is_empty());

        let stats = cache.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.stores, 1);
    }

    #[test]
    fn test_store_errors_degrade_to_miss() {
        let cache = ArtifactCache::new(Arc::new(BrokenStore), Duration::from_secs(60));

        assert!(cache.fetch(&key(1)).is_none());
        assert!(!cache.store(&key(1), "<html></html>"));
        assert_eq!(cache.get_stats().errors, 2);
    }

    #[test]
    fn test_file_store_layout_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        let stored_at = Utc::now() - chrono::Duration::hours(3);

        store.set(&key(9), &Artifact::new("<html>Hallo</html>", stored_at)).unwrap();

        let path = store.path_for(&key(9));
        assert!(path.starts_with(dir.path().join("de").join("pages")));
        assert!(path.exists());
        let shard = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        let name = path.file_stem().unwrap().to_string_lossy().to_string();
        assert_eq!(shard, name[..2]);

        let artifact = store.get(&key(9)).unwrap().unwrap();
        assert_eq!(artifact.html, "<html>Hallo</html>");
        assert!((artifact.stored_at - stored_at).num_seconds().abs() <= 1);

        store.delete(&key(9)).unwrap();
        assert!(store.get(&key(9)).unwrap().is_none());
        store.delete(&key(9)).unwrap();
    }
}
