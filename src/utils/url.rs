//! URL 与路径处理工具

use percent_encoding::percent_decode_str;
pub use url::Url;

/// 被视为页面而不是文件下载的扩展名
const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "php"];

/// 拆开的链接：路径、查询串、片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HrefParts<'a> {
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

/// 拆分相对链接或路径
pub fn split_href(href: &str) -> HrefParts<'_> {
    let (rest, fragment) = match href.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (href, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    HrefParts {
        path,
        query,
        fragment,
    }
}

/// 解析查询串为键值对，保留原始顺序
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// 规范化请求路径：百分号解码、合并重复斜杠、去掉末尾斜杠
pub fn normalize_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let segments: Vec<&str> = decoded.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// 路径第一段若形如语言代码（两个小写字母）则返回它
pub fn language_prefix(path: &str) -> Option<&str> {
    let first = path.trim_start_matches('/').split('/').next()?;
    (first.len() == 2 && first.chars().all(|c| c.is_ascii_lowercase())).then_some(first)
}

/// 去掉指定语言前缀，返回以 `/` 开头的剩余路径
pub fn strip_language_prefix<'a>(path: &'a str, lang: &str) -> &'a str {
    let trimmed = path.trim_start_matches('/');
    match trimmed.strip_prefix(lang) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// 路径最后一段是否带文件扩展名（下载链接）
pub fn has_file_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            !PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// 链接是否指向本站；相对链接总是站内
pub fn is_internal_link(href: &str, site: &Url) -> bool {
    if href.starts_with("//") {
        return Url::parse(&format!("{}:{}", site.scheme(), href))
            .map_or(false, |url| url.host_str() == site.host_str());
    }

    match Url::parse(href) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str() == site.host_str()
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}
