//! 单飞锁
//!
//! 同一缓存键同一时间最多一个翻译尝试。锁是建议性的：持有者崩溃时靠失效时间兜底，
//! 失效后可能出现一次重复翻译，这是可以接受的。

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::translation::error::TranslationResult;

/// 锁服务
pub trait LockService: Send + Sync {
    /// 尝试获取锁；已被他人持有时返回 `false`
    fn try_acquire(&self, key: &str, ttl: Duration) -> TranslationResult<bool>;

    fn release(&self, key: &str) -> TranslationResult<()>;

    /// 锁当前是否被持有
    fn peek(&self, key: &str) -> TranslationResult<bool>;
}

// ============================================================================
// 内存锁
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    acquired_at: Instant,
    ttl: Duration,
}

impl LockEntry {
    fn new(ttl: Duration) -> Self {
        Self {
            acquired_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }
}

/// 进程内锁
#[derive(Debug, Default)]
pub struct MemoryLockService {
    locks: DashMap<String, LockEntry>,
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockService for MemoryLockService {
    fn try_acquire(&self, key: &str, ttl: Duration) -> TranslationResult<bool> {
        match self.locks.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired() {
                    tracing::debug!("接管已失效的锁: {}", key);
                    entry.insert(LockEntry::new(ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(LockEntry::new(ttl));
                Ok(true)
            }
        }
    }

    fn release(&self, key: &str) -> TranslationResult<()> {
        self.locks.remove(key);
        Ok(())
    }

    fn peek(&self, key: &str) -> TranslationResult<bool> {
        Ok(self
            .locks
            .get(key)
            .map_or(false, |entry| !entry.is_expired()))
    }
}

// ============================================================================
// 文件锁
// ============================================================================

/// 基于独占创建文件的锁，可跨进程使用
#[derive(Debug, Clone)]
pub struct FileLockService {
    dir: PathBuf,
}

impl FileLockService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes()).to_hex();
        self.dir.join(format!("{}.lock", hash))
    }

    fn is_stale(path: &Path, ttl: Duration) -> bool {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map_or(false, |age| age >= ttl)
    }

    fn create(path: &Path) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(())
    }
}

impl LockService for FileLockService {
    fn try_acquire(&self, key: &str, ttl: Duration) -> TranslationResult<bool> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        match Self::create(&path) {
            Ok(()) => return Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        if !Self::is_stale(&path, ttl) {
            return Ok(false);
        }

        tracing::debug!("删除已失效的锁文件: {}", path.display());
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // 只重试一次，与他人同时接管时由独占创建决定胜者
        match Self::create(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self, key: &str) -> TranslationResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn peek(&self, key: &str) -> TranslationResult<bool> {
        Ok(self.path_for(key).exists())
    }
}

// ============================================================================
// 锁守卫
// ============================================================================

/// 持有中的锁，离开作用域时释放
pub struct LockGuard {
    service: Arc<dyn LockService>,
    key: String,
}

impl LockGuard {
    /// 尝试获取锁
    pub fn acquire(
        service: &Arc<dyn LockService>,
        key: &str,
        ttl: Duration,
    ) -> TranslationResult<Option<Self>> {
        if service.try_acquire(key, ttl)? {
            Ok(Some(Self {
                service: Arc::clone(service),
                key: key.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.service.release(&self.key) {
            tracing::warn!("释放锁失败 {}: {}", self.key, e);
        }
    }
}
