//! 片段过滤器
//!
//! 决定哪些片段值得发送给翻译服务。被过滤的片段保留原文，不影响计划本身。

use std::sync::OnceLock;

use regex::Regex;

use super::segmenter::Segment;

/// 目标书写系统字符占比超过此值视为"已翻译"
const TARGET_SCRIPT_THRESHOLD: f32 = 0.5;

/// 片段过滤器
#[derive(Debug, Default)]
pub struct SegmentFilter {
    /// 启用"看起来已经是目标语言"的启发式判断
    skip_already_translated: bool,
    url_regex: OnceLock<Option<Regex>>,
    email_regex: OnceLock<Option<Regex>>,
}

impl SegmentFilter {
    pub fn new(skip_already_translated: bool) -> Self {
        Self {
            skip_already_translated,
            ..Self::default()
        }
    }

    /// 判断片段是否需要发送
    pub fn should_translate(&self, segment: &Segment, target_lang: &str) -> bool {
        let text = segment.source_text();

        if text.is_empty() || !text.chars().any(|c| c.is_alphabetic()) {
            return false;
        }

        if self.is_url(text) || self.is_email(text) {
            return false;
        }

        if self.skip_already_translated && looks_like_target(text, target_lang) {
            tracing::trace!("片段 {} 看起来已是目标语言，跳过", segment.id);
            return false;
        }

        true
    }

    /// 过滤片段列表
    pub fn filter<'a>(&self, segments: &'a [Segment], target_lang: &str) -> Vec<&'a Segment> {
        segments
            .iter()
            .filter(|segment| self.should_translate(segment, target_lang))
            .collect()
    }

    /// 检查是否为URL
    fn is_url(&self, text: &str) -> bool {
        if text.contains(char::is_whitespace) {
            return false;
        }

        self.url_regex
            .get_or_init(|| Regex::new(r"^(?i)(https?|ftp)://\S+$|^www\.\S+\.\S+$").ok())
            .as_ref()
            .map_or(false, |re| re.is_match(text))
    }

    /// 检查是否为邮箱
    fn is_email(&self, text: &str) -> bool {
        if text.len() > 100 || !text.contains('@') {
            return false;
        }

        self.email_regex
            .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
            .as_ref()
            .map_or(false, |re| re.is_match(text))
    }
}

/// 目标语言对应的书写系统，拉丁字母语言无法判断
fn script_of(lang: &str) -> Option<fn(char) -> bool> {
    let matcher: fn(char) -> bool = match lang {
        "zh" => |c| ('\u{4e00}'..='\u{9fff}').contains(&c),
        "ja" => |c| {
            ('\u{3040}'..='\u{30ff}').contains(&c) || ('\u{4e00}'..='\u{9fff}').contains(&c)
        },
        "ko" => |c| ('\u{ac00}'..='\u{d7af}').contains(&c) || ('\u{1100}'..='\u{11ff}').contains(&c),
        "ru" | "uk" | "bg" | "sr" | "be" | "mk" => |c| ('\u{0400}'..='\u{04ff}').contains(&c),
        "el" => |c| ('\u{0370}'..='\u{03ff}').contains(&c),
        "ar" | "fa" | "ur" => |c| ('\u{0600}'..='\u{06ff}').contains(&c),
        "he" => |c| ('\u{0590}'..='\u{05ff}').contains(&c),
        "th" => |c| ('\u{0e00}'..='\u{0e7f}').contains(&c),
        _ => return None,
    };
    Some(matcher)
}

/// 文本是否已主要由目标语言的书写系统构成
pub fn looks_like_target(text: &str, target_lang: &str) -> bool {
    let Some(in_script) = script_of(target_lang) else {
        return false;
    };

    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }

    let matching = letters.iter().filter(|&&c| in_script(c)).count();
    matching as f32 / letters.len() as f32 > TARGET_SCRIPT_THRESHOLD
}
