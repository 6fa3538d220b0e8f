//! 请求编排器
//!
//! 跳过检查 → 路由与缓存键 → 读缓存 → 单飞锁 → 翻译 → 校验 → 写缓存 → 后处理。
//! 编排器从不返回错误：所有失败都记录日志并降级为返回原始页面。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::eligibility::{cache_policy, check_skip, is_structurally_sound, SkipReason};
use super::language::LanguageResolver;
use super::postprocess::{strip_toolbar, MetadataInjector, NoopInjector, PostProcessor};
use super::request::{RenderRequest, RequestContext};
use super::route::{resolve_route, CacheKey, NoopSlugResolver, SlugResolver};
use crate::parsers::link_rewriter::localize_links;
use crate::translation::config::TranslationConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{
    BatchRequest, BatchTranslator, ClassifyRules, SegmentFilter, Segmenter,
};
use crate::translation::provider::TranslationProvider;
use crate::translation::storage::{
    ArtifactCache, CacheStats, CacheStore, LockGuard, LockService, MemoryCacheStore,
    MemoryLockService,
};
use crate::utils::clock::{Clock, SystemClock};

// ============================================================================
// 结果与统计
// ============================================================================

/// 一次请求的结局
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    /// 目标语言即源语言，只做元数据注入
    SourceLanguage,
    CacheHit,
    /// 等锁超时，返回实时页面
    LockTimeout,
    Translated { stored: bool },
    /// 没有可用译文，返回原始页面
    Untranslated,
    /// 暂停新翻译
    Paused,
    BudgetExceeded,
    /// 翻译或校验失败，返回原始页面
    Degraded,
}

/// 编排结果
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub html: String,
    pub outcome: Outcome,
}

impl RenderOutcome {
    fn new(html: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            html: html.into(),
            outcome,
        }
    }
}

/// 编排器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub skips: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub translations: u64,
    pub stores: u64,
    pub lock_timeouts: u64,
    pub degraded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    skips: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    translations: AtomicU64,
    stores: AtomicU64,
    lock_timeouts: AtomicU64,
    degraded: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// ============================================================================
// 构建器
// ============================================================================

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: TranslationConfig,
    provider: Arc<dyn TranslationProvider>,
    store: Option<Arc<dyn CacheStore>>,
    locks: Option<Arc<dyn LockService>>,
    slugs: Arc<dyn SlugResolver>,
    injector: Arc<dyn MetadataInjector>,
    clock: Arc<dyn Clock>,
}

impl OrchestratorBuilder {
    pub fn new(config: TranslationConfig, provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            config,
            provider,
            store: None,
            locks: None,
            slugs: Arc::new(NoopSlugResolver),
            injector: Arc::new(NoopInjector),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn locks(mut self, locks: Arc<dyn LockService>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn slugs(mut self, slugs: Arc<dyn SlugResolver>) -> Self {
        self.slugs = slugs;
        self
    }

    pub fn injector(mut self, injector: Arc<dyn MetadataInjector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Orchestrator {
        let config = self.config;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCacheStore::new(config.memory_cache_size)));
        let locks = self
            .locks
            .unwrap_or_else(|| Arc::new(MemoryLockService::new()));

        let rules = ClassifyRules::default().with_skip_id(&config.toolbar_element_id);

        Orchestrator {
            languages: LanguageResolver::from_config(&config),
            cache: ArtifactCache::from_config(store, &config, self.clock),
            locks,
            translator: BatchTranslator::new(
                self.provider,
                SegmentFilter::new(config.skip_already_translated),
            ),
            post: PostProcessor::new(&config, self.injector, Arc::clone(&self.slugs)),
            slugs: self.slugs,
            segmenter: Segmenter::new(rules),
            counters: Counters::default(),
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// 编排器
// ============================================================================

/// 请求编排器
pub struct Orchestrator {
    config: Arc<TranslationConfig>,
    languages: LanguageResolver,
    cache: ArtifactCache,
    locks: Arc<dyn LockService>,
    translator: BatchTranslator,
    slugs: Arc<dyn SlugResolver>,
    post: PostProcessor,
    segmenter: Segmenter,
    counters: Counters,
}

impl Orchestrator {
    pub fn builder(config: TranslationConfig, provider: Arc<dyn TranslationProvider>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config, provider)
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 获取统计信息
    pub fn stats(&self) -> OrchestratorStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        OrchestratorStats {
            skips: load(&self.counters.skips),
            cache_hits: load(&self.counters.cache_hits),
            cache_misses: load(&self.counters.cache_misses),
            translations: load(&self.counters.translations),
            stores: load(&self.counters.stores),
            lock_timeouts: load(&self.counters.lock_timeouts),
            degraded: load(&self.counters.degraded),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats()
    }

    /// 解析语言、路由、缓存键和缓存策略
    pub fn prepare(&self, request: &RenderRequest) -> Result<RequestContext, SkipReason> {
        let language = self
            .languages
            .resolve(request.language_hint.as_deref(), &request.path)
            .ok_or(SkipReason::UnresolvedLanguage)?;
        let source_language = self
            .languages
            .default_language()
            .cloned()
            .ok_or(SkipReason::UnresolvedLanguage)?;

        let route = resolve_route(
            &request.page,
            &request.path,
            request.query.as_deref(),
            &language,
            &self.languages,
            &self.config,
            self.slugs.as_ref(),
        );
        let cache_key = CacheKey::from_config(&self.config, &language, &route);

        Ok(RequestContext {
            policy: cache_policy(request, &self.config),
            privileged: request.privileged_viewer,
            language,
            source_language,
            route,
            cache_key,
        })
    }

    /// 处理一次渲染
    pub fn handle(&self, request: &RenderRequest) -> RenderOutcome {
        let skip = check_skip(request).map_or_else(|| self.prepare(request), Err);
        let context = match skip {
            Ok(context) => context,
            Err(reason) => {
                tracing::debug!("跳过 {}: {}", request.path, reason);
                bump(&self.counters.skips);
                return RenderOutcome::new(request.html.as_str(), Outcome::Skipped(reason));
            }
        };

        if context.language == context.source_language {
            let html = self.post.inject(&request.html, &context.language);
            return RenderOutcome::new(html, Outcome::SourceLanguage);
        }

        tracing::debug!(
            "请求 {} -> {} (route {}, key {})",
            request.path,
            context.language,
            context.route,
            context.cache_key
        );

        if context.policy.read {
            if let Some(html) = self.cache.fetch(&context.cache_key) {
                return self.serve_hit(&html, request, &context);
            }
        }
        bump(&self.counters.cache_misses);

        if self.config.pause_translations {
            tracing::debug!("翻译已暂停，返回实时页面");
            return self.serve_live(request, &context, Outcome::Paused);
        }

        if let Err(e) = request.budget.ensure(self.config.min_budget()) {
            return self.abandon(request, e);
        }

        if context.policy.is_bypass() {
            return self.translate_and_finish(request, &context);
        }

        let lock_key = format!("lock:{}", context.cache_key);
        let guard = match LockGuard::acquire(&self.locks, &lock_key, self.config.lock_ttl()) {
            Ok(Some(guard)) => Some(guard),
            Ok(None) => return self.wait_for_holder(request, &context, &lock_key),
            Err(e) => {
                tracing::warn!("锁服务不可用，无锁翻译: {}", e);
                None
            }
        };

        // 上一个持锁者可能刚写完缓存
        if guard.is_some() && context.policy.read {
            if let Some(html) = self.cache.fetch(&context.cache_key) {
                drop(guard);
                return self.serve_hit(&html, request, &context);
            }
        }

        let outcome = self.translate_and_finish(request, &context);
        drop(guard);
        outcome
    }

    /// 返回实时页面，仍然经过完整后处理
    fn serve_live(&self, request: &RenderRequest, context: &RequestContext, outcome: Outcome) -> RenderOutcome {
        let html = self
            .post
            .run(&request.html, &context.language, &request.html, context.privileged);
        RenderOutcome::new(html, outcome)
    }

    fn serve_hit(&self, html: &str, request: &RenderRequest, context: &RequestContext) -> RenderOutcome {
        tracing::debug!("缓存命中: {}", context.cache_key);
        bump(&self.counters.cache_hits);
        let html = self
            .post
            .run(html, &context.language, &request.html, context.privileged);
        RenderOutcome::new(html, Outcome::CacheHit)
    }

    /// 锁被他人持有：定期查看缓存，直到填充、锁被释放或等待上限
    fn wait_for_holder(&self, request: &RenderRequest, context: &RequestContext, lock_key: &str) -> RenderOutcome {
        let wait = request.budget.clamp(self.config.lock_wait());
        let interval = self.config.lock_poll_interval();
        let started = Instant::now();

        tracing::debug!("等待其他请求完成翻译: {} (最多 {:?})", context.cache_key, wait);

        while started.elapsed() < wait {
            std::thread::sleep(interval.min(wait.saturating_sub(started.elapsed())));

            if let Some(html) = self.cache.fetch(&context.cache_key) {
                return self.serve_hit(&html, request, context);
            }

            // 持锁者已放弃且没有写缓存，不必等满
            if let Ok(false) = self.locks.peek(lock_key) {
                if let Some(html) = self.cache.fetch(&context.cache_key) {
                    return self.serve_hit(&html, request, context);
                }
                tracing::info!("持锁者未写入缓存即释放，返回实时页面: {}", context.cache_key);
                break;
            }
        }

        if started.elapsed() >= wait {
            tracing::info!("等锁超时，返回实时页面: {}", context.cache_key);
        }
        bump(&self.counters.lock_timeouts);
        self.serve_live(request, context, Outcome::LockTimeout)
    }

    /// 放弃翻译，原样返回
    fn abandon(&self, request: &RenderRequest, error: TranslationError) -> RenderOutcome {
        tracing::warn!("{}，放弃翻译 {}", error, request.path);
        bump(&self.counters.degraded);
        RenderOutcome::new(request.html.as_str(), Outcome::BudgetExceeded)
    }

    fn translate_and_finish(&self, request: &RenderRequest, context: &RequestContext) -> RenderOutcome {
        let translated = match self.translate(request, context) {
            Ok(Some(html)) => html,
            Ok(None) => return self.serve_live(request, context, Outcome::Untranslated),
            Err(e @ TranslationError::BudgetExceeded { .. }) => return self.abandon(request, e),
            Err(e) => {
                tracing::warn!("翻译失败，返回原始页面 {}: {}", request.path, e);
                bump(&self.counters.degraded);
                return self.serve_live(request, context, Outcome::Degraded);
            }
        };
        bump(&self.counters.translations);

        if !is_structurally_sound(&translated) {
            tracing::warn!("翻译结果结构不完整，丢弃: {}", request.path);
            bump(&self.counters.degraded);
            return self.serve_live(request, context, Outcome::Degraded);
        }

        let mut stored = false;
        if context.policy.write {
            let artifact = strip_toolbar(&translated, self.post.toolbar_id());
            stored = self.cache.store(&context.cache_key, &artifact);
            if stored {
                bump(&self.counters.stores);
            }
        }

        let html = self
            .post
            .run(&translated, &context.language, &request.html, context.privileged);
        RenderOutcome::new(html, Outcome::Translated { stored })
    }

    /// 分段 → 批次翻译 → 合并；没有可用译文时返回 `None`
    fn translate(&self, request: &RenderRequest, context: &RequestContext) -> TranslationResult<Option<String>> {
        let plan = self.segmenter.plan(&request.html);
        if plan.is_empty() {
            tracing::debug!("没有可翻译片段: {}", request.path);
            return Ok(None);
        }

        request.budget.ensure(self.config.min_budget())?;
        let batch = BatchRequest {
            source_lang: context.source_language.as_str(),
            target_lang: context.language.as_str(),
            site_context: self.config.site_context.as_deref(),
            model: &self.config.model,
            timeout: request.budget.clamp(self.config.provider_timeout()),
        };

        let translations = self.translator.translate(plan.segments(), &batch);
        if translations.is_empty() {
            tracing::info!("没有收到译文，返回原始页面: {}", request.path);
            return Ok(None);
        }

        // 翻译服务可能耗尽剩余时间
        request.budget.ensure(Duration::from_millis(1))?;

        let applied = plan.apply(&translations);
        plan.set_locale(context.language.as_str());
        if self.config.cleanup_duplicate_words && applied > 0 {
            plan.cleanup_duplicate_words();
        }
        if let Some(links) = self.post.link_context(&context.language) {
            localize_links(plan.document().document(), &links);
        }

        tracing::debug!("应用 {}/{} 条译文", applied, plan.len());
        plan.render().map(Some)
    }
}
