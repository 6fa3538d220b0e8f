// 集成测试公共模块
//
// 提供假翻译服务、页面样例和编排器构建工具

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use page_translate::translation::core::{MetadataInjector, NoopInjector, Orchestrator, SlugResolver};
use page_translate::translation::error::{TranslationError, TranslationResult};
use page_translate::translation::provider::{ProviderRequest, TranslationProvider};
use page_translate::translation::storage::{CacheStore, LockService, MemoryCacheStore, MemoryLockService};
use page_translate::translation::TranslationConfig;
use page_translate::utils::clock::ManualClock;

use serde_json::Value;

// ============================================================================
// 假翻译服务
// ============================================================================

/// 按词典翻译载荷中的片段，记录每次调用
pub struct DictionaryProvider {
    dictionary: HashMap<String, String>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl DictionaryProvider {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            dictionary: entries
                .iter()
                .map(|(source, target)| (source.to_string(), target.to_string()))
                .collect(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 德语样例词典
    pub fn german() -> Self {
        Self::new(&[
            ("Home", "Startseite"),
            ("Welcome", "Willkommen"),
            ("About us", "Über uns"),
            ("Contact", "Kontakt"),
            ("Our bakery in the heart of the city", "Unsere Bäckerei im Herzen der Stadt"),
            ("Fresh bread every morning", "Jeden Morgen frisches Brot"),
            ("A loaf of bread", "Ein Laib Brot"),
            ("Search", "Suchen"),
            ("Send", "Senden"),
        ])
    }

    /// 每次调用前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl TranslationProvider for DictionaryProvider {
    fn complete(&self, request: &ProviderRequest) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let payload: Value = serde_json::from_str(&request.payload)?;
        let mut translations = serde_json::Map::new();
        for segment in payload["segments"].as_array().cloned().unwrap_or_default() {
            let id = segment["id"].as_str().unwrap_or_default();
            let text = segment["text"].as_str().unwrap_or_default();
            if let Some(translated) = self.dictionary.get(text) {
                translations.insert(id.to_string(), Value::String(translated.clone()));
            }
        }

        Ok(serde_json::json!({ "translations": translations }).to_string())
    }

    fn name(&self) -> &str {
        "dictionary"
    }
}

/// 总是返回固定文本
pub struct ScriptedProvider {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranslationProvider for ScriptedProvider {
    fn complete(&self, _request: &ProviderRequest) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// 总是失败
pub struct FailingProvider {
    error: TranslationError,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new(error: TranslationError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranslationProvider for FailingProvider {
    fn complete(&self, _request: &ProviderRequest) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

// ============================================================================
// 页面样例
// ============================================================================

/// 最简单的页面
pub fn welcome_page() -> String {
    "<!DOCTYPE html><html lang=\"en\"><head><title>Home</title></head><body><p>Welcome</p></body></html>".to_string()
}

/// 含导航、属性、元数据和不透明块的页面
pub fn bakery_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Home</title>
<meta name="description" content="Fresh bread every morning">
<script type="application/ld+json">{"@type":"Bakery","name":"Bread & Butter <Utrecht>"}</script>
<style>nav > a { color: #333; }</style>
</head>
<body>
<nav class="menu"><a href="/">Home</a> <a href="/about-us/">About us</a></nav>
<h1>Welcome</h1>
<p>Our bakery in the heart of the city</p>
<img src="/bread.jpg" alt="A loaf of bread">
<pre>Fresh bread every morning</pre>
<p class="notranslate">Welcome</p>
<script>window.dataLayer = [{"page": "<p>Home</p>"}];</script>
</body>
</html>"#
        .to_string()
}

/// 带特权访问者工具栏的页面
pub fn page_with_toolbar() -> String {
    r#"<!DOCTYPE html><html><head><title>Home</title></head><body><div id="wpadminbar"><a href="/wp-admin/">Dashboard</a></div><p>Welcome</p></body></html>"#
        .to_string()
}

// ============================================================================
// 编排器构建
// ============================================================================

/// 测试用配置：源语言英语，启用德语和法语
pub fn test_config() -> TranslationConfig {
    let mut config = TranslationConfig::for_site("https://example.com", "en");
    config.enabled_languages = vec!["de".to_string(), "fr".to_string()];
    config.min_budget_secs = 1;
    config.lock_wait_secs = 5;
    config.lock_poll_interval_ms = 20;
    config
}

/// 测试环境：编排器与可观察的存储和时钟
pub struct TestEnvironment {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryCacheStore>,
    pub clock: Arc<ManualClock>,
}

/// 测试环境构建器
pub struct TestEnvironmentBuilder {
    config: TranslationConfig,
    provider: Arc<dyn TranslationProvider>,
    store: Option<Arc<dyn CacheStore>>,
    locks: Arc<dyn LockService>,
    slugs: Option<Arc<dyn SlugResolver>>,
    injector: Arc<dyn MetadataInjector>,
}

impl TestEnvironmentBuilder {
    pub fn new(provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            config: test_config(),
            provider,
            store: None,
            locks: Arc::new(MemoryLockService::new()),
            slugs: None,
            injector: Arc::new(NoopInjector),
        }
    }

    pub fn config(mut self, update: impl FnOnce(&mut TranslationConfig)) -> Self {
        update(&mut self.config);
        self
    }

    /// 替换存储后端（此时 `TestEnvironment::store` 不再被使用）
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn locks(mut self, locks: Arc<dyn LockService>) -> Self {
        self.locks = locks;
        self
    }

    pub fn slugs(mut self, slugs: Arc<dyn SlugResolver>) -> Self {
        self.slugs = Some(slugs);
        self
    }

    pub fn injector(mut self, injector: Arc<dyn MetadataInjector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn build(self) -> TestEnvironment {
        let memory = Arc::new(MemoryCacheStore::new(64));
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn CacheStore> = self.store.unwrap_or_else(|| memory.clone());

        let mut builder = Orchestrator::builder(self.config, self.provider)
            .store(store)
            .locks(self.locks)
            .injector(self.injector)
            .clock(clock.clone());
        if let Some(slugs) = self.slugs {
            builder = builder.slugs(slugs);
        }

        TestEnvironment {
            orchestrator: builder.build(),
            store: memory,
            clock,
        }
    }
}

/// 去掉标签间空白后比较
pub fn compact(html: &str) -> String {
    html.split('\n').map(str::trim).collect::<Vec<_>>().join("")
}
