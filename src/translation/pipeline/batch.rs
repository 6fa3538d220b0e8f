//! 批次翻译客户端
//!
//! 把一组片段变成恰好一次上游调用，并把结构化响应解析为 id → 译文 映射。
//! 任何失败都返回空结果，从不向调用方抛出；重试策略不在这里。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::filters::SegmentFilter;
use super::merge::TranslationMap;
use super::segmenter::{Segment, SegmentKind};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::provider::{ProviderRequest, TranslationProvider};

const RESPONSE_RULE: &str =
    r#"Return JSON: {"translations": {"<id>": "<translated>"}}. No extra text."#;

/// 一次批次调用的参数
#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub source_lang: &'a str,
    pub target_lang: &'a str,
    pub site_context: Option<&'a str>,
    pub model: &'a str,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct PayloadSegment<'a> {
    id: &'a str,
    text: &'a str,
    kind: SegmentKind,
    #[serde(rename = "attr", skip_serializing_if = "Option::is_none")]
    attribute: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    navigation: bool,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    source_language: &'a str,
    target_language: &'a str,
    segments: Vec<PayloadSegment<'a>>,
    instruction: &'static str,
}

/// 语言代码对应的英文名称，未知代码原样返回
pub fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "de" => "German",
        "nl" => "Dutch",
        "fr" => "French",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "pl" => "Polish",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" | "nb" => "Norwegian",
        "fi" => "Finnish",
        "cs" => "Czech",
        "tr" => "Turkish",
        "ru" => "Russian",
        "uk" => "Ukrainian",
        "el" => "Greek",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "th" => "Thai",
        other => other,
    }
}

/// 构建指令消息：显式固定源语言和目标语言
pub fn build_instruction(source_lang: &str, target_lang: &str, site_context: Option<&str>) -> String {
    let source = language_name(source_lang);
    let target = language_name(target_lang);

    let mut instruction = format!(
        "You are a professional website translation engine. Translate every segment from {source} ({source_lang}) to {target} ({target_lang}).\n\
         The source language is {source}. Trust this declaration even when a short text looks like another language; never detect or guess the language yourself.\n\
         Keep numbers, URLs, e-mail addresses, HTML entities and brand names unchanged. Preserve the meaning and tone of each segment.\n\
         Segments marked \"navigation\": true are menu labels: translate them to at most two words.\n"
    );

    if let Some(context) = site_context.map(str::trim).filter(|c| !c.is_empty()) {
        instruction.push_str(&format!("Website context: {}\n", context));
    }

    instruction.push_str(RESPONSE_RULE);
    instruction
}

/// 构建载荷消息
pub fn build_payload(
    segments: &[&Segment],
    source_lang: &str,
    target_lang: &str,
) -> TranslationResult<String> {
    let payload = Payload {
        source_language: source_lang,
        target_language: target_lang,
        segments: segments
            .iter()
            .map(|segment| PayloadSegment {
                id: &segment.id,
                text: segment.source_text(),
                kind: segment.kind,
                attribute: segment.attribute.as_deref(),
                navigation: segment.navigation,
            })
            .collect(),
        instruction: RESPONSE_RULE,
    };

    Ok(serde_json::to_string(&payload)?)
}

/// 去掉代码围栏并截取最外层的 JSON 对象
fn extract_json_object(content: &str) -> Option<&str> {
    let mut text = content.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // 跳过 ```json 之类的语言标记行
        text = rest.split_once('\n').map_or(rest, |(_, body)| body);
        text = text.trim_end().trim_end_matches("```");
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// 解析模型输出为 id → 译文 映射
///
/// 接受 `{"translations": {...}}` 或裸对象；未请求的 id 和空白译文被丢弃，
/// 任何非字符串值都视为格式错误
pub fn parse_translation_map(
    content: &str,
    requested: &HashSet<&str>,
) -> TranslationResult<TranslationMap> {
    let json = extract_json_object(content)
        .ok_or_else(|| TranslationError::ProviderResponse("响应中没有JSON对象".to_string()))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| TranslationError::ProviderResponse(format!("无法解析响应JSON: {}", e)))?;

    let object = match value.get("translations") {
        Some(Value::Object(translations)) => translations,
        Some(_) => {
            return Err(TranslationError::ProviderResponse(
                "translations 字段不是对象".to_string(),
            ))
        }
        None => value.as_object().ok_or_else(|| {
            TranslationError::ProviderResponse("响应不是JSON对象".to_string())
        })?,
    };

    let mut translations = TranslationMap::new();
    for (id, text) in object {
        let Value::String(text) = text else {
            return Err(TranslationError::ProviderResponse(format!(
                "片段 {} 的译文不是字符串",
                id
            )));
        };

        if !requested.contains(id.as_str()) {
            tracing::debug!("忽略未请求的片段 id: {}", id);
            continue;
        }
        if text.trim().is_empty() {
            continue;
        }

        translations.insert(id.clone(), text.clone());
    }

    Ok(translations)
}

/// 批次翻译客户端
pub struct BatchTranslator {
    provider: Arc<dyn TranslationProvider>,
    filter: SegmentFilter,
}

impl BatchTranslator {
    pub fn new(provider: Arc<dyn TranslationProvider>, filter: SegmentFilter) -> Self {
        Self { provider, filter }
    }

    /// 翻译片段；失败时返回空映射
    pub fn translate(&self, segments: &[Segment], request: &BatchRequest<'_>) -> TranslationMap {
        match self.try_translate(segments, request) {
            Ok(translations) => translations,
            Err(e) => {
                helpers::log_error(&e);
                TranslationMap::new()
            }
        }
    }

    fn try_translate(
        &self,
        segments: &[Segment],
        request: &BatchRequest<'_>,
    ) -> TranslationResult<TranslationMap> {
        let selected = self.filter.filter(segments, request.target_lang);
        if selected.is_empty() {
            tracing::debug!("没有需要发送的片段");
            return Ok(TranslationMap::new());
        }

        let provider_request = ProviderRequest {
            model: request.model.to_string(),
            instruction: build_instruction(
                request.source_lang,
                request.target_lang,
                request.site_context,
            ),
            payload: build_payload(&selected, request.source_lang, request.target_lang)?,
            timeout: request.timeout,
        };

        tracing::debug!(
            "调用 {} 翻译 {} 个片段 ({} -> {})",
            self.provider.name(),
            selected.len(),
            request.source_lang,
            request.target_lang
        );

        let content = self.provider.complete(&provider_request)?;
        let requested: HashSet<&str> = selected.iter().map(|s| s.id.as_str()).collect();
        let translations = parse_translation_map(&content, &requested)?;

        tracing::info!("收到 {}/{} 条译文", translations.len(), selected.len());
        Ok(translations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: TranslationResult<String>,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(reply: TranslationResult<String>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl TranslationProvider for ScriptedProvider {
        fn complete(&self, request: &ProviderRequest) -> TranslationResult<String> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn segment(id: &str, text: &str, navigation: bool) -> Segment {
        Segment {
            id: id.to_string(),
            text: text.to_string(),
            kind: SegmentKind::Node,
            attribute: None,
            navigation,
        }
    }

    fn request() -> BatchRequest<'static> {
        BatchRequest {
            source_lang: "en",
            target_lang: "de",
            site_context: Some("A bakery in Utrecht"),
            model: "test-model",
            timeout: Duration::from_secs(5),
        }
    }

    fn ids<'a>(ids: &[&'a str]) -> HashSet<&'a str> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_instruction_pins_languages() {
        let instruction = build_instruction("en", "de", Some("  A bakery  "));
        assert!(instruction.contains("from English (en) to German (de)"));
        assert!(instruction.contains("at most two words"));
        assert!(instruction.contains("Website context: A bakery"));

        let without = build_instruction("en", "xx", None);
        assert!(!without.contains("Website context"));
        assert!(without.contains("to xx (xx)"));
    }

    #[test]
    fn test_payload_serializes_segments() {
        let nav = segment("t1", " Home ", true);
        let mut alt = segment("a1", "A cat", false);
        alt.kind = SegmentKind::Attribute;
        alt.attribute = Some("alt".to_string());

        let payload = build_payload(&[&nav, &alt], "en", "de").unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();

        assert_eq!(value["segments"][0]["text"], "Home");
        assert_eq!(value["segments"][0]["navigation"], true);
        assert_eq!(value["segments"][1]["kind"], "attribute");
        assert_eq!(value["segments"][1]["attr"], "alt");
        assert!(value["segments"][1].get("navigation").is_none());
        assert_eq!(value["target_language"], "de");
    }

    #[test]
    fn test_parse_accepts_wrapped_and_bare_objects() {
        let requested = ids(&["t1", "t2"]);

        let wrapped = parse_translation_map(r#"{"translations":{"t1":"Hallo"}}"#, &requested).unwrap();
        assert_eq!(wrapped.get("t1").map(String::as_str), Some("Hallo"));

        let bare = parse_translation_map(r#"{"t1":"Hallo","t2":"Welt"}"#, &requested).unwrap();
        assert_eq!(bare.len(), 2);

        let fenced = parse_translation_map(
            "```json\n{\"translations\": {\"t2\": \"Welt\"}}\n```",
            &requested,
        )
        .unwrap();
        assert_eq!(fenced.get("t2").map(String::as_str), Some("Welt"));
    }

    #[test]
    fn test_parse_drops_unknown_and_blank() {
        let requested = ids(&["t1"]);
        let map = parse_translation_map(r#"{"t1":"  ","t9":"Extra"}"#, &requested).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let requested = ids(&["t1"]);
        assert!(parse_translation_map("Sorry, I cannot help", &requested).is_err());
        assert!(parse_translation_map(r#"{"t1": 42}"#, &requested).is_err());
        assert!(parse_translation_map(r#"{"translations": ["Hallo"]}"#, &requested).is_err());
        assert!(parse_translation_map(r#"{"t1": "Hallo""#, &requested).is_err());
    }

    #[test]
    fn test_translate_makes_exactly_one_call() {
        let provider = ScriptedProvider::new(Ok(r#"{"translations":{"t1":"Hallo","t2":"Welt"}}"#.to_string()));
        let translator = BatchTranslator::new(provider.clone(), SegmentFilter::default());

        let segments = vec![segment("t1", "Hello", false), segment("t2", "World", false)];
        let map = translator.translate(&segments, &request());

        assert_eq!(map.len(), 2);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "test-model");
        assert!(seen[0].payload.contains("\"Hello\""));
    }

    #[test]
    fn test_provider_error_yields_empty_result() {
        let provider = ScriptedProvider::new(Err(TranslationError::Transport("refused".to_string())));
        let translator = BatchTranslator::new(provider, SegmentFilter::default());

        let map = translator.translate(&[segment("t1", "Hello", false)], &request());
        assert!(map.is_empty());
    }

    #[test]
    fn test_nothing_to_send_skips_provider() {
        let provider = ScriptedProvider::new(Ok("{}".to_string()));
        let translator = BatchTranslator::new(provider.clone(), SegmentFilter::default());

        let map = translator.translate(&[segment("t1", "2024", false)], &request());
        assert!(map.is_empty());
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
