//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问，供配置覆盖和命令行日志级别使用

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    /// 仅在变量被显式设置时返回，用于覆盖文件配置
    fn get_if_set() -> Option<EnvResult<T>> {
        env::var(Self::NAME).ok().map(|value| Self::parse(&value))
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "PAGE_TRANSLATE_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 站点地址
    pub struct SiteUrl;
    impl EnvVar<String> for SiteUrl {
        const NAME: &'static str = "PAGE_TRANSLATE_SITE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Public base URL of the site being translated";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 源语言（站点默认语言）
    pub struct DefaultLanguage;
    impl EnvVar<String> for DefaultLanguage {
        const NAME: &'static str = "PAGE_TRANSLATE_DEFAULT_LANGUAGE";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("en".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Default (source) language of the site (ISO 639-1 code)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_language(value, Self::NAME)
        }
    }

    /// 启用的目标语言列表
    pub struct EnabledLanguages;
    impl EnvVar<Vec<String>> for EnabledLanguages {
        const NAME: &'static str = "PAGE_TRANSLATE_ENABLED_LANGUAGES";
        const DEFAULT: Option<Vec<String>> = None;
        const DESCRIPTION: &'static str = "Comma separated list of enabled target languages";

        fn parse(value: &str) -> EnvResult<Vec<String>> {
            value
                .split(',')
                .map(str::trim)
                .filter(|lang| !lang.is_empty())
                .map(|lang| parse_language(lang, Self::NAME))
                .collect()
        }
    }

    /// API URL
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "PAGE_TRANSLATE_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL of the OpenAI-compatible translation API";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "PAGE_TRANSLATE_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Bearer key for the translation API";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "PAGE_TRANSLATE_MODEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Model identifier sent to the translation API";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }

    /// 服务调用超时
    pub struct ProviderTimeout;
    impl EnvVar<Duration> for ProviderTimeout {
        const NAME: &'static str = "PAGE_TRANSLATE_PROVIDER_TIMEOUT";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(30));
        const DESCRIPTION: &'static str = "Translation API timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_u64(value, Self::NAME, 1, 300)?;
            Ok(Duration::from_secs(seconds))
        }
    }

    /// 暂停新翻译
    pub struct Paused;
    impl EnvVar<bool> for Paused {
        const NAME: &'static str = "PAGE_TRANSLATE_PAUSED";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Serve cached pages only, never start new translations";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 缓存目录
    pub struct Dir;
    impl EnvVar<String> for Dir {
        const NAME: &'static str = "PAGE_TRANSLATE_CACHE_DIR";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Directory for on-disk artifacts and locks";

        fn parse(value: &str) -> EnvResult<String> {
            let dir = value.trim();
            if dir.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Cache directory cannot be empty".to_string(),
                });
            }
            Ok(shellexpand::tilde(dir).into_owned())
        }
    }

    /// 缓存有效期（小时）
    pub struct TtlHours;
    impl EnvVar<u64> for TtlHours {
        const NAME: &'static str = "PAGE_TRANSLATE_CACHE_TTL_HOURS";
        const DEFAULT: Option<u64> = Some(14 * 24);
        const DESCRIPTION: &'static str = "Artifact TTL in hours (minimum 14 days is enforced)";

        fn parse(value: &str) -> EnvResult<u64> {
            parse_positive_u64(value, Self::NAME, 1, 24 * 365)
        }
    }

    /// 锁失效时间
    pub struct LockTtl;
    impl EnvVar<Duration> for LockTtl {
        const NAME: &'static str = "PAGE_TRANSLATE_LOCK_TTL";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(120));
        const DESCRIPTION: &'static str = "Failsafe expiry of the translation lock in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_u64(value, Self::NAME, 1, 3600)?;
            Ok(Duration::from_secs(seconds))
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_u64(value: &str, var_name: &str, min: u64, max: u64) -> EnvResult<u64> {
    let num: u64 = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

fn parse_language(value: &str, var_name: &str) -> EnvResult<String> {
    let lang = value.trim().to_lowercase();
    if lang.len() != 2 || !lang.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Language code '{}' must be 2 letters (ISO 639-1)", value),
        });
    }
    Ok(lang)
}

fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let url = value.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables\n\n");

    let entries: &[(&str, &str)] = &[
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (translation::SiteUrl::NAME, translation::SiteUrl::DESCRIPTION),
        (translation::DefaultLanguage::NAME, translation::DefaultLanguage::DESCRIPTION),
        (translation::EnabledLanguages::NAME, translation::EnabledLanguages::DESCRIPTION),
        (translation::ApiUrl::NAME, translation::ApiUrl::DESCRIPTION),
        (translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION),
        (translation::Model::NAME, translation::Model::DESCRIPTION),
        (translation::ProviderTimeout::NAME, translation::ProviderTimeout::DESCRIPTION),
        (translation::Paused::NAME, translation::Paused::DESCRIPTION),
        (cache::Dir::NAME, cache::Dir::DESCRIPTION),
        (cache::TtlHours::NAME, cache::TtlHours::DESCRIPTION),
        (cache::LockTtl::NAME, cache::LockTtl::DESCRIPTION),
    ];

    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }

    docs
}
