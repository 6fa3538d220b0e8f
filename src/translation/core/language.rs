//! 目标语言解析
//!
//! 每个请求显式解析一次语言并放进请求上下文，没有全局缓存。

use std::fmt;

use crate::translation::config::TranslationConfig;
use crate::utils::url::language_prefix;

/// 两个小写字母的语言代码
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// 解析语言代码；格式不对返回 `None`
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        (code.len() == 2 && code.chars().all(|c| c.is_ascii_lowercase())).then_some(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 语言解析器
#[derive(Debug, Clone)]
pub struct LanguageResolver {
    default: Option<LanguageCode>,
    enabled: Vec<LanguageCode>,
}

impl LanguageResolver {
    pub fn new(default: Option<LanguageCode>, enabled: Vec<LanguageCode>) -> Self {
        Self { default, enabled }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        let enabled = config
            .enabled_languages
            .iter()
            .filter_map(|code| LanguageCode::parse(code))
            .collect();
        Self::new(LanguageCode::parse(&config.default_language), enabled)
    }

    /// 源语言（站点默认语言）
    pub fn default_language(&self) -> Option<&LanguageCode> {
        self.default.as_ref()
    }

    /// 是否为允许的语言；未配置启用列表时任何合法代码都允许
    pub fn is_allowed(&self, code: &LanguageCode) -> bool {
        self.enabled.is_empty() || self.enabled.contains(code) || self.default.as_ref() == Some(code)
    }

    /// 是否为启用列表中的语言前缀
    pub fn is_enabled_prefix(&self, code: &str) -> bool {
        self.enabled.iter().any(|lang| lang.as_str() == code)
    }

    /// 显式提示 > 路径前缀 > 默认语言；不允许的代码退回默认语言
    pub fn resolve(&self, hint: Option<&str>, path: &str) -> Option<LanguageCode> {
        let candidate = hint
            .and_then(LanguageCode::parse)
            .or_else(|| language_prefix(path).and_then(LanguageCode::parse));

        match candidate {
            Some(code) if self.is_allowed(&code) => Some(code),
            Some(code) => {
                tracing::debug!("语言 {} 未启用，使用默认语言", code);
                self.default.clone()
            }
            None => self.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> LanguageCode {
        LanguageCode::parse(s).unwrap()
    }

    #[test]
    fn test_parse_language_code() {
        assert_eq!(LanguageCode::parse(" DE ").unwrap().as_str(), "de");
        assert!(LanguageCode::parse("deu").is_none());
        assert!(LanguageCode::parse("d1").is_none());
        assert!(LanguageCode::parse("").is_none());
    }

    #[test]
    fn test_resolution_precedence() {
        let resolver = LanguageResolver::new(Some(code("en")), vec![code("de"), code("fr")]);

        assert_eq!(resolver.resolve(Some("fr"), "/de/about/"), Some(code("fr")));
        assert_eq!(resolver.resolve(None, "/de/about/"), Some(code("de")));
        assert_eq!(resolver.resolve(None, "/about/"), Some(code("en")));
        // 未启用的语言退回默认
        assert_eq!(resolver.resolve(Some("ja"), "/"), Some(code("en")));
    }

    #[test]
    fn test_unresolved_without_default() {
        let resolver = LanguageResolver::new(None, vec![code("de")]);
        assert_eq!(resolver.resolve(None, "/about/"), None);
        assert_eq!(resolver.resolve(None, "/de/"), Some(code("de")));
    }

    #[test]
    fn test_any_code_allowed_without_enabled_list() {
        let resolver = LanguageResolver::new(Some(code("en")), Vec::new());
        assert_eq!(resolver.resolve(None, "/nl/contact/"), Some(code("nl")));
    }
}
