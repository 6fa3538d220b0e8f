//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 缓存键
    pub const DEFAULT_CACHE_KEY_PREFIX: &str = "ptc";
    pub const DEFAULT_CACHE_KEY_VERSION: &str = "v2";
    pub const SITE_HASH_LEN: usize = 8;
    pub const PATH_HASH_LEN: usize = 16;

    // 缓存有效期
    pub const MIN_CACHE_TTL_HOURS: u64 = 14 * 24;
    pub const DEFAULT_CACHE_TTL_HOURS: u64 = 14 * 24;
    pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 512;

    // 单飞锁
    pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(120);
    pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(10);
    pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(250);

    // 翻译服务
    pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MIN_BUDGET: Duration = Duration::from_secs(5);

    // 文档结构检查
    pub const MIN_DOCUMENT_LENGTH: usize = 48;

    // 默认语言
    pub const DEFAULT_LANGUAGE: &str = "en";

    // 特权访问者工具栏
    pub const DEFAULT_TOOLBAR_ID: &str = "wpadminbar";

    // 可翻译元素
    pub const TRANSLATABLE_ELEMENTS: &[&str] = &[
        "title", "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "dt", "dd", "td", "th",
        "caption", "figcaption", "label", "legend", "summary", "blockquote", "a", "button",
        "img", "span", "strong", "em", "b", "i", "small", "option",
    ];

    // 跳过的元素
    pub const DENYLISTED_ELEMENTS: &[&str] = &["code", "pre", "script", "style", "noscript"];

    // 禁止翻译标记
    pub const NO_TRANSLATE_CLASSES: &[&str] = &["notranslate", "no-translate"];
    pub const NO_TRANSLATE_ATTR: &str = "data-translate-skip";

    // 导航区域
    pub const NAVIGATION_ROLES: &[&str] = &["navigation", "menubar", "menu"];
    pub const NAVIGATION_CLASSES: &[&str] = &[
        "menu", "nav", "navbar", "navbar-nav", "menu-item", "nav-item",
    ];

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &["title", "alt", "placeholder", "aria-label"];
    pub const SUBMIT_INPUT_TYPES: &[&str] = &["submit", "button", "reset"];
    pub const META_NAMES: &[&str] = &["description", "twitter:title", "twitter:description"];
    pub const META_PROPERTIES: &[&str] = &["og:title", "og:description"];

    // 查询参数
    pub const BYPASS_QUERY_PARAMS: &[&str] = &["nocache", "no_cache"];
    pub const DYNAMIC_QUERY_PARAMS: &[&str] = &[
        "add-to-cart", "action", "_wpnonce", "nonce", "preview", "replytocom", "token",
        "logout", "login",
    ];
    pub const DEFAULT_IGNORED_QUERY_PARAMS: &[&str] = &[
        "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content", "fbclid",
        "gclid", "msclkid", "ref", "_ga",
    ];

    // 不做本地化的链接路径
    pub const DEFAULT_EXCLUDED_LINK_PATHS: &[&str] =
        &["/wp-admin", "/wp-login.php", "/wp-json", "/xmlrpc.php"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "page-translate.toml",
        ".page-translate.toml",
        "~/.config/page-translate/config.toml",
        "/etc/page-translate/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}

/// 加载配置，失败时退回默认配置
pub fn load_translation_config() -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.into_config(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default()
        }
    }
}
