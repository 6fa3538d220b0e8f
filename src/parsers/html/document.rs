//! 可安全往返的文档封装
//!
//! HTML 解析器把 `<script>`/`<style>` 当作原始文本处理，重新序列化时会破坏内嵌的
//! JSON-LD、speculationrules 等机器可读内容。解析前先把这些块替换为占位符，
//! 渲染后再逐字还原；文档类型声明同样按原样还原。

use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, RcDom};
use regex::Regex;

use super::dom::html_to_dom;
use super::serializer::serialize_document;
use crate::translation::error::{TranslationError, TranslationResult};

const PLACEHOLDER_ATTR: &str = "data-pt-preserve";

fn opaque_block_regex() -> Option<&'static Regex> {
    static OPAQUE: OnceLock<Option<Regex>> = OnceLock::new();
    OPAQUE
        .get_or_init(|| {
            Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").ok()
        })
        .as_ref()
}

fn doctype_regex() -> Option<&'static Regex> {
    static DOCTYPE: OnceLock<Option<Regex>> = OnceLock::new();
    DOCTYPE
        .get_or_init(|| Regex::new(r"(?i)^\s*(<!DOCTYPE[^>]*>)").ok())
        .as_ref()
}

/// 被占位符替换的原始块
#[derive(Debug, Clone, Default)]
pub struct PreservedBlocks {
    blocks: Vec<(String, String)>,
}

impl PreservedBlocks {
    fn placeholder(index: usize) -> String {
        format!(
            "<script type=\"text/plain\" {}=\"PT_PRESERVE_{}\"></script>",
            PLACEHOLDER_ATTR, index
        )
    }

    /// 提取所有不透明块，返回替换后的标记
    pub fn extract(html: &str) -> (String, Self) {
        let Some(re) = opaque_block_regex() else {
            return (html.to_string(), Self::default());
        };

        let mut blocks = Vec::new();
        let replaced = re.replace_all(html, |caps: &regex::Captures<'_>| {
            let placeholder = Self::placeholder(blocks.len() + 1);
            blocks.push((placeholder.clone(), caps[0].to_string()));
            placeholder
        });

        (replaced.into_owned(), Self { blocks })
    }

    /// 逐字还原；任一占位符丢失视为解析错误
    pub fn restore(&self, html: &str) -> TranslationResult<String> {
        let mut restored = html.to_string();

        for (placeholder, original) in &self.blocks {
            if !restored.contains(placeholder.as_str()) {
                return Err(TranslationError::Parse(format!(
                    "占位符在解析过程中丢失: {}",
                    placeholder
                )));
            }
            restored = restored.replacen(placeholder.as_str(), original, 1);
        }

        Ok(restored)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// 原始块内容（按出现顺序）
    pub fn originals(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|(_, original)| original.as_str())
    }
}

/// 提取原始文档类型声明
pub fn extract_doctype(html: &str) -> Option<String> {
    doctype_regex()?
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// 用原始声明替换序列化器生成的声明
pub fn restore_doctype(html: &str, doctype: Option<&str>) -> String {
    let Some(doctype) = doctype else {
        return html.to_string();
    };

    match extract_doctype(html) {
        Some(serialized) => {
            let start = html.find(serialized.as_str()).unwrap_or(0);
            let mut restored = String::with_capacity(html.len() + doctype.len());
            restored.push_str(&html[..start]);
            restored.push_str(doctype);
            restored.push_str(&html[start + serialized.len()..]);
            restored
        }
        None => format!("{}{}", doctype, html),
    }
}

/// 解析后的文档，附带还原所需的全部信息
pub struct PreparedDocument {
    dom: RcDom,
    preserved: PreservedBlocks,
    doctype: Option<String>,
}

impl PreparedDocument {
    /// 提取不透明块并解析
    pub fn parse(html: &str) -> Self {
        let doctype = extract_doctype(html);
        let (masked, preserved) = PreservedBlocks::extract(html);
        let dom = html_to_dom(&masked);

        Self {
            dom,
            preserved,
            doctype,
        }
    }

    /// 文档根节点
    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    pub fn preserved(&self) -> &PreservedBlocks {
        &self.preserved
    }

    /// 序列化并还原文档类型与不透明块
    pub fn render(&self) -> TranslationResult<String> {
        let serialized = serialize_document(&self.dom)?;
        let with_doctype = restore_doctype(&serialized, self.doctype.as_deref());
        self.preserved.restore(&with_doctype)
    }
}

/// 在 DOM 上做一次可选修改
///
/// `edit` 返回 `false` 表示没有改动，此时原样返回输入，不做任何重新序列化
pub fn edit_document<F>(html: &str, edit: F) -> TranslationResult<String>
where
    F: FnOnce(&Handle) -> bool,
{
    let document = PreparedDocument::parse(html);
    if edit(document.document()) {
        document.render()
    } else {
        Ok(html.to_string())
    }
}
