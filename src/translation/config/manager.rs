//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// 翻译配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 站点
    pub site_url: String,
    pub site_context: Option<String>,
    pub default_language: String,
    pub enabled_languages: Vec<String>,

    // 翻译服务
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub provider_timeout_secs: u64,

    // 缓存
    pub cache_ttl_hours: u64,
    pub cache_dir: Option<String>,
    pub cache_key_prefix: String,
    pub cache_key_version: String,
    pub memory_cache_size: usize,
    pub pause_translations: bool,
    pub ignored_query_params: Vec<String>,

    // 单飞锁
    pub lock_ttl_secs: u64,
    pub lock_wait_secs: u64,
    pub lock_poll_interval_ms: u64,
    pub min_budget_secs: u64,

    // 页面处理
    pub toolbar_element_id: String,
    pub store_privileged_renders: bool,
    pub skip_already_translated: bool,
    pub cleanup_duplicate_words: bool,
    pub excluded_link_paths: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost".to_string(),
            site_context: None,
            default_language: constants::DEFAULT_LANGUAGE.to_string(),
            enabled_languages: Vec::new(),

            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: constants::DEFAULT_MODEL.to_string(),
            provider_timeout_secs: constants::DEFAULT_PROVIDER_TIMEOUT.as_secs(),

            cache_ttl_hours: constants::DEFAULT_CACHE_TTL_HOURS,
            cache_dir: None,
            cache_key_prefix: constants::DEFAULT_CACHE_KEY_PREFIX.to_string(),
            cache_key_version: constants::DEFAULT_CACHE_KEY_VERSION.to_string(),
            memory_cache_size: constants::DEFAULT_MEMORY_CACHE_SIZE,
            pause_translations: false,
            ignored_query_params: owned(constants::DEFAULT_IGNORED_QUERY_PARAMS),

            lock_ttl_secs: constants::DEFAULT_LOCK_TTL.as_secs(),
            lock_wait_secs: constants::DEFAULT_LOCK_WAIT.as_secs(),
            lock_poll_interval_ms: constants::DEFAULT_LOCK_POLL_INTERVAL.as_millis() as u64,
            min_budget_secs: constants::DEFAULT_MIN_BUDGET.as_secs(),

            toolbar_element_id: constants::DEFAULT_TOOLBAR_ID.to_string(),
            store_privileged_renders: false,
            skip_already_translated: false,
            cleanup_duplicate_words: true,
            excluded_link_paths: owned(constants::DEFAULT_EXCLUDED_LINK_PATHS),
        }
    }
}

impl TranslationConfig {
    /// 创建指定站点的默认配置
    pub fn for_site(site_url: &str, default_language: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            default_language: default_language.to_lowercase(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        let lang = &self.default_language;
        if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(TranslationError::Config(format!("默认语言无效: '{}'", lang)));
        }

        if url::Url::parse(&self.site_url).is_err() {
            return Err(TranslationError::Config(format!("站点地址无效: '{}'", self.site_url)));
        }

        if self.lock_ttl_secs == 0 {
            return Err(TranslationError::Config("锁失效时间不能为0".to_string()));
        }

        if self.lock_poll_interval_ms == 0 {
            return Err(TranslationError::Config("锁轮询间隔不能为0".to_string()));
        }

        if self.lock_poll_interval() >= self.lock_wait() {
            return Err(TranslationError::Config("锁轮询间隔必须小于最长等待时间".to_string()));
        }

        if self.memory_cache_size == 0 {
            return Err(TranslationError::Config("内存缓存大小不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, translation, EnvResult, EnvVar};

        fn apply<T>(var: &str, value: Option<EnvResult<T>>, target: &mut T) {
            match value {
                Some(Ok(value)) => *target = value,
                Some(Err(e)) => tracing::warn!("忽略无效的环境变量 {}: {}", var, e),
                None => {}
            }
        }

        apply(translation::SiteUrl::NAME, translation::SiteUrl::get_if_set(), &mut self.site_url);
        apply(
            translation::DefaultLanguage::NAME,
            translation::DefaultLanguage::get_if_set(),
            &mut self.default_language,
        );
        apply(
            translation::EnabledLanguages::NAME,
            translation::EnabledLanguages::get_if_set(),
            &mut self.enabled_languages,
        );
        apply(translation::ApiUrl::NAME, translation::ApiUrl::get_if_set(), &mut self.api_url);
        apply(translation::ApiKey::NAME, translation::ApiKey::get_if_set(), &mut self.api_key);
        apply(translation::Model::NAME, translation::Model::get_if_set(), &mut self.model);
        apply(
            translation::Paused::NAME,
            translation::Paused::get_if_set(),
            &mut self.pause_translations,
        );
        apply(cache::TtlHours::NAME, cache::TtlHours::get_if_set(), &mut self.cache_ttl_hours);

        if let Some(timeout) = translation::ProviderTimeout::get_if_set() {
            match timeout {
                Ok(timeout) => self.provider_timeout_secs = timeout.as_secs(),
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        if let Some(ttl) = cache::LockTtl::get_if_set() {
            match ttl {
                Ok(ttl) => self.lock_ttl_secs = ttl.as_secs(),
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }

        if let Some(dir) = cache::Dir::get_if_set() {
            match dir {
                Ok(dir) => self.cache_dir = Some(dir),
                Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
            }
        }
    }

    /// 实际生效的缓存有效期（最少14天）
    pub fn cache_ttl(&self) -> Duration {
        let hours = self.cache_ttl_hours.max(constants::MIN_CACHE_TTL_HOURS);
        Duration::from_secs(hours * 3600)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_secs)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    pub fn min_budget(&self) -> Duration {
        Duration::from_secs(self.min_budget_secs)
    }

    /// 缓存目录（已展开 `~`）
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
    }

    /// 查询参数是否被忽略（不影响路由和缓存）
    pub fn is_ignored_query_param(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.ignored_query_params.iter().any(|param| *param == name)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let (mut config, source) = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config, source })
    }

    /// 从指定文件创建配置管理器
    pub fn from_file<P: AsRef<Path>>(path: P) -> TranslationResult<Self> {
        Self::load_dotenv();

        let path = path.as_ref();
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self {
            config,
            source: Some(path.to_path_buf()),
        })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 配置来源文件
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 查找并加载配置文件
    fn load_config() -> TranslationResult<(TranslationConfig, Option<PathBuf>)> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                let config = Self::load_from_file(candidate)?;
                return Ok((config, Some(candidate.to_path_buf())));
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok((TranslationConfig::default(), None))
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config<P: AsRef<Path>>(path: P) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
