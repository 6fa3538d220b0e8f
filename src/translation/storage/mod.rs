//! 存储模块
//!
//! 页面缓存与单飞锁。

pub mod cache;
pub mod lock;

pub use cache::{Artifact, ArtifactCache, CacheStats, CacheStore, FileCacheStore, MemoryCacheStore};
pub use lock::{FileLockService, LockGuard, LockService, MemoryLockService};
