//! 合并引擎
//!
//! 把译文写回计划中的锚点并重新序列化。缺失的译文保持原样。

use std::collections::HashMap;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, NodeData};

use super::segmenter::{Anchor, Plan};
use crate::parsers::html::dom::{
    find_nodes, get_child_node_by_name, get_parent_node, set_node_attr, set_text, text_content,
};
use crate::translation::error::TranslationResult;

/// 片段 id → 译文
pub type TranslationMap = HashMap<String, String>;

impl Plan {
    /// 写回译文，返回实际应用的数量
    pub fn apply(&self, translations: &TranslationMap) -> usize {
        let mut applied = 0;

        for segment in self.segments() {
            let Some(translated) = translations.get(&segment.id) else {
                continue;
            };
            let translated = translated.trim();
            if translated.is_empty() {
                continue;
            }

            match self.anchor(&segment.id) {
                Some(Anchor::Text {
                    node,
                    leading,
                    trailing,
                }) => {
                    set_text(node, &format!("{}{}{}", leading, translated, trailing));
                    applied += 1;
                }
                Some(Anchor::Attribute { element, name }) => {
                    set_node_attr(element, name, Some(translated.to_string()));
                    applied += 1;
                }
                None => {
                    tracing::warn!("片段 {} 没有对应的锚点", segment.id);
                }
            }
        }

        applied
    }

    /// 设置根元素语言标记
    pub fn set_locale(&self, lang: &str) {
        if let Some(html) = get_child_node_by_name(self.document().document(), "html") {
            set_node_attr(&html, "lang", Some(lang.to_string()));
        }
    }

    /// 清理链接两侧重复的词
    pub fn cleanup_duplicate_words(&self) -> usize {
        cleanup_duplicate_words(self.document().document())
    }

    /// 序列化，还原文档类型与保留块
    pub fn render(&self) -> TranslationResult<String> {
        self.document().render()
    }
}

/// 合并译文并输出完整标记
///
/// `lang` 为 `None` 时不修改根元素语言，用于往返一致性比较
pub fn merge(
    plan: &Plan,
    translations: &TranslationMap,
    lang: Option<&str>,
) -> TranslationResult<String> {
    let applied = plan.apply(translations);
    if let Some(lang) = lang {
        plan.set_locale(lang);
    }
    if applied > 0 {
        plan.cleanup_duplicate_words();
    }

    tracing::debug!("合并完成: 应用 {}/{} 条译文", applied, plan.len());
    plan.render()
}

fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 链接文本被相邻文本重复时（如 "Kontakt <a>Kontakt</a>"）删除重复部分
///
/// 尽力而为的外观修正，只匹配完整单词
pub fn cleanup_duplicate_words(root: &Handle) -> usize {
    let mut cleaned = 0;

    for anchor in find_nodes(root, "a") {
        let label = text_content(&anchor).trim().to_string();
        if label.is_empty() {
            continue;
        }
        let Some(parent) = get_parent_node(&anchor) else {
            continue;
        };

        let children = parent.children.borrow();
        let Some(index) = children.iter().position(|child| Rc::ptr_eq(child, &anchor)) else {
            continue;
        };

        if let Some(prev) = index.checked_sub(1).and_then(|i| children.get(i)) {
            if let Some(text) = text_of(prev) {
                if let Some(rest) = text.trim_end().strip_suffix(label.as_str()) {
                    if rest.is_empty() || rest.ends_with(char::is_whitespace) {
                        let rest = rest.trim_end();
                        let replacement = if rest.is_empty() {
                            String::new()
                        } else {
                            format!("{} ", rest)
                        };
                        set_text(prev, &replacement);
                        cleaned += 1;
                    }
                }
            }
        }

        if let Some(next) = children.get(index + 1) {
            if let Some(text) = text_of(next) {
                if let Some(rest) = text.trim_start().strip_prefix(label.as_str()) {
                    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                        let rest = rest.trim_start();
                        let replacement = if rest.is_empty() {
                            String::new()
                        } else {
                            format!(" {}", rest)
                        };
                        set_text(next, &replacement);
                        cleaned += 1;
                    }
                }
            }
        }
    }

    if cleaned > 0 {
        tracing::debug!("清理了 {} 处重复词", cleaned);
    }

    cleaned
}
