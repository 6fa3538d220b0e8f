//! 错误处理集成测试
//!
//! 所有外部失败都降级为返回原始页面，从不向调用方报错

use std::sync::Arc;
use std::time::Duration;

use page_translate::translation::core::{CacheKey, ExecutionBudget, Outcome, RenderRequest, SkipReason};
use page_translate::translation::error::{TranslationError, TranslationResult};
use page_translate::translation::storage::{Artifact, CacheStore, LockService};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{
    welcome_page, DictionaryProvider, FailingProvider, ScriptedProvider, TestEnvironmentBuilder,
};

struct BrokenStore;

impl CacheStore for BrokenStore {
    fn get(&self, _key: &CacheKey) -> TranslationResult<Option<Artifact>> {
        Err(TranslationError::Storage("connection refused".to_string()))
    }

    fn set(&self, _key: &CacheKey, _artifact: &Artifact) -> TranslationResult<()> {
        Err(TranslationError::Storage("connection refused".to_string()))
    }

    fn delete(&self, _key: &CacheKey) -> TranslationResult<()> {
        Err(TranslationError::Storage("connection refused".to_string()))
    }
}

struct BrokenLocks;

impl LockService for BrokenLocks {
    fn try_acquire(&self, _key: &str, _ttl: Duration) -> TranslationResult<bool> {
        Err(TranslationError::Storage("lock backend down".to_string()))
    }

    fn release(&self, _key: &str) -> TranslationResult<()> {
        Ok(())
    }

    fn peek(&self, _key: &str) -> TranslationResult<bool> {
        Ok(false)
    }
}

/// 测试翻译服务失败时返回原始页面且不写缓存
#[test]
fn test_provider_failure_serves_original() {
    let provider = Arc::new(FailingProvider::new(TranslationError::Transport(
        "timeout".to_string(),
    )));
    let env = TestEnvironmentBuilder::new(provider.clone()).build();
    let page = welcome_page();

    let outcome = env.orchestrator.handle(&RenderRequest::new("/de/", page.as_str()));

    assert_eq!(outcome.outcome, Outcome::Untranslated);
    assert_eq!(outcome.html, page);
    assert!(env.store.is_empty());

    // 下一次请求重新尝试
    env.orchestrator.handle(&RenderRequest::new("/de/", page.as_str()));
    assert_eq!(provider.calls(), 2);
}

/// 测试格式错误的响应按整批失败处理
#[test]
fn test_malformed_response_is_full_batch_failure() {
    for reply in [
        "I'm sorry, I can't help with that.",
        r#"{"translations": {"t1": ["Startseite"]}}"#,
        r#"{"translations": "Willkommen"}"#,
        "",
    ] {
        let provider = Arc::new(ScriptedProvider::new(reply));
        let env = TestEnvironmentBuilder::new(provider.clone()).build();
        let page = welcome_page();

        let outcome = env.orchestrator.handle(&RenderRequest::new("/de/", page.as_str()));
        assert_eq!(outcome.outcome, Outcome::Untranslated, "reply: {:?}", reply);
        assert_eq!(outcome.html, page);
        assert_eq!(provider.calls(), 1);
    }
}

/// 测试代码围栏包裹的响应仍可使用
#[test]
fn test_fenced_response_is_accepted() {
    let provider = Arc::new(ScriptedProvider::new(
        "```json\n{\"translations\": {\"t1\": \"Startseite\", \"t2\": \"Willkommen\", \"t99\": \"x\"}}\n```",
    ));
    let env = TestEnvironmentBuilder::new(provider).build();

    let outcome = env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()));
    assert_eq!(outcome.outcome, Outcome::Translated { stored: true });
    assert!(outcome.html.contains("<p>Willkommen</p>"));
}

/// 测试剩余预算不足时放弃翻译
#[test]
fn test_insufficient_budget_returns_input() {
    let provider = Arc::new(DictionaryProvider::german());
    let env = TestEnvironmentBuilder::new(provider.clone())
        .config(|config| config.min_budget_secs = 5)
        .build();
    let page = welcome_page();

    let request = RenderRequest::new("/de/", page.as_str())
        .with_budget(ExecutionBudget::with_remaining(Duration::from_secs(2)));
    let outcome = env.orchestrator.handle(&request);

    assert_eq!(outcome.outcome, Outcome::BudgetExceeded);
    assert_eq!(outcome.html, page);
    assert_eq!(provider.calls(), 0);
}

/// 测试服务耗尽预算后不合并
#[test]
fn test_budget_exhausted_by_provider_call() {
    let provider = Arc::new(DictionaryProvider::german().with_delay(Duration::from_millis(2000)));
    let env = TestEnvironmentBuilder::new(provider.clone()).build();
    let page = welcome_page();

    let request = RenderRequest::new("/de/", page.as_str())
        .with_budget(ExecutionBudget::with_remaining(Duration::from_millis(1500)));
    let outcome = env.orchestrator.handle(&request);

    assert_eq!(outcome.outcome, Outcome::BudgetExceeded);
    assert_eq!(outcome.html, page);
    assert!(env.store.is_empty());
}

/// 测试跳过检查的顺序与结果
#[test]
fn test_skip_checks() {
    let provider = Arc::new(DictionaryProvider::german());
    let env = TestEnvironmentBuilder::new(provider.clone()).build();

    let mut admin = RenderRequest::new("/de/", welcome_page());
    admin.is_admin = true;
    assert_eq!(
        env.orchestrator.handle(&admin).outcome,
        Outcome::Skipped(SkipReason::AdminOrInternal)
    );

    let fragment = RenderRequest::new("/de/", "<li>Welcome</li>");
    let outcome = env.orchestrator.handle(&fragment);
    assert_eq!(outcome.outcome, Outcome::Skipped(SkipReason::Incomplete));
    assert_eq!(outcome.html, "<li>Welcome</li>");

    let not_found = RenderRequest::new("/de/", welcome_page()).with_status(404);
    assert_eq!(
        env.orchestrator.handle(&not_found).outcome,
        Outcome::Skipped(SkipReason::NotAPage)
    );

    let json = RenderRequest::new("/de/", welcome_page()).with_content_type(Some("application/json"));
    assert_eq!(env.orchestrator.handle(&json).outcome, Outcome::Skipped(SkipReason::NotHtml));

    assert_eq!(provider.calls(), 0);
    assert_eq!(env.orchestrator.stats().skips, 4);
}

/// 测试没有默认语言时无法解析语言
#[test]
fn test_unresolved_language_is_skipped() {
    let env = TestEnvironmentBuilder::new(Arc::new(DictionaryProvider::german()))
        .config(|config| config.default_language = String::new())
        .build();

    let outcome = env.orchestrator.handle(&RenderRequest::new("/about/", welcome_page()));
    assert_eq!(outcome.outcome, Outcome::Skipped(SkipReason::UnresolvedLanguage));
}

/// 测试缓存后端故障不影响翻译
#[test]
fn test_broken_store_still_translates() {
    let provider = Arc::new(DictionaryProvider::german());
    let env = TestEnvironmentBuilder::new(provider.clone())
        .store(Arc::new(BrokenStore))
        .build();

    let outcome = env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()));
    assert_eq!(outcome.outcome, Outcome::Translated { stored: false });
    assert!(outcome.html.contains("Willkommen"));
}

/// 测试锁服务故障时无锁翻译
#[test]
fn test_broken_lock_service_translates_without_lock() {
    let provider = Arc::new(DictionaryProvider::german());
    let env = TestEnvironmentBuilder::new(provider.clone())
        .locks(Arc::new(BrokenLocks))
        .build();

    let outcome = env.orchestrator.handle(&RenderRequest::new("/de/", welcome_page()));
    assert_eq!(outcome.outcome, Outcome::Translated { stored: true });
    assert_eq!(provider.calls(), 1);
}

/// 测试错误分类
#[test]
fn test_error_taxonomy() {
    assert!(TranslationError::Transport("reset".into()).is_retryable());
    assert!(!TranslationError::Parse("placeholder lost".into()).is_retryable());
    assert!(TranslationError::BudgetExceeded { remaining_ms: 10 }
        .to_string()
        .contains("10"));
}
