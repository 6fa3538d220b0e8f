//! 分段引擎
//!
//! 从任意 HTML 中提取可翻译片段并记录锚点，合并时按锚点写回。
//! 文本节点分两轮收集：先收集可翻译元素下的文本，再全局扫描剩余文本，按节点身份去重。

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use markup5ever_rcdom::{Handle, Node, NodeData};
use serde::Serialize;

use super::classify::{classify, is_translatable_tag, ClassifyRules, ElementClass, ElementInfo};
use crate::parsers::html::document::PreparedDocument;
use crate::parsers::html::dom::{get_node_attr, get_node_name};
use crate::translation::config::constants::{
    META_NAMES, META_PROPERTIES, SUBMIT_INPUT_TYPES, TRANSLATABLE_ATTRS,
};

// ============================================================================
// 核心类型
// ============================================================================

/// 片段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Node,
    Attribute,
    Meta,
}

impl SegmentKind {
    fn id_prefix(self) -> char {
        match self {
            SegmentKind::Node => 't',
            SegmentKind::Attribute => 'a',
            SegmentKind::Meta => 'm',
        }
    }
}

/// 一个可翻译片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub id: String,
    /// 原始文本；文本节点保留首尾空白
    pub text: String,
    pub kind: SegmentKind,
    #[serde(rename = "attr", skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub navigation: bool,
}

impl Segment {
    /// 去掉首尾空白后的待翻译文本
    pub fn source_text(&self) -> &str {
        self.text.trim()
    }
}

/// 合并时写回的位置
#[derive(Debug, Clone)]
pub(crate) enum Anchor {
    Text {
        node: Handle,
        leading: String,
        trailing: String,
    },
    Attribute {
        element: Handle,
        name: String,
    },
}

/// 一次解析得到的全部片段与锚点
pub struct Plan {
    document: PreparedDocument,
    segments: Vec<Segment>,
    anchors: HashMap<String, Anchor>,
    original: String,
}

impl Plan {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    /// 原始输入标记
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn document(&self) -> &PreparedDocument {
        &self.document
    }

    pub(crate) fn anchor(&self, id: &str) -> Option<&Anchor> {
        self.anchors.get(id)
    }
}

// ============================================================================
// 分段器
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct WalkContext {
    navigation: bool,
    under_translatable: bool,
}

struct TextCandidate {
    node: Handle,
    context: WalkContext,
}

struct AttributeCandidate {
    element: Handle,
    name: String,
    value: String,
    kind: SegmentKind,
    navigation: bool,
}

/// 分段器
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    rules: ClassifyRules,
}

impl Segmenter {
    pub fn new(rules: ClassifyRules) -> Self {
        Self { rules }
    }

    /// 生成翻译计划；容错解析，不会失败
    pub fn plan(&self, html: &str) -> Plan {
        let document = PreparedDocument::parse(html);
        let (texts, attributes) = self.walk(document.document());

        let mut builder = PlanBuilder::default();

        // 第一轮：可翻译元素下的文本
        let mut visited: HashSet<*const Node> = HashSet::new();
        for candidate in texts.iter().filter(|c| c.context.under_translatable) {
            visited.insert(Rc::as_ptr(&candidate.node));
            builder.push_text(candidate);
        }

        // 第二轮：全局扫描剩余文本
        for candidate in &texts {
            if visited.insert(Rc::as_ptr(&candidate.node)) {
                builder.push_text(candidate);
            }
        }

        for candidate in attributes {
            builder.push_attribute(candidate);
        }

        tracing::debug!(
            "分段完成: {} 个片段, {} 个保留块",
            builder.segments.len(),
            document.preserved().len()
        );

        Plan {
            document,
            segments: builder.segments,
            anchors: builder.anchors,
            original: html.to_string(),
        }
    }

    /// 按文档顺序遍历，跳过被禁止的子树
    fn walk(&self, root: &Handle) -> (Vec<TextCandidate>, Vec<AttributeCandidate>) {
        let mut texts = Vec::new();
        let mut attributes = Vec::new();
        let mut stack = vec![(root.clone(), WalkContext::default())];

        while let Some((node, context)) = stack.pop() {
            let child_context = match &node.data {
                NodeData::Text { contents } => {
                    if !contents.borrow().trim().is_empty() {
                        texts.push(TextCandidate {
                            node: node.clone(),
                            context,
                        });
                    }
                    continue;
                }
                NodeData::Element { .. } => {
                    let Some(info) = ElementInfo::from_node(&node) else {
                        continue;
                    };

                    let class = classify(&info, &self.rules);
                    if class == ElementClass::Denylisted {
                        continue;
                    }

                    let navigation = context.navigation || class == ElementClass::NavigationContext;
                    collect_attributes(&node, &info, navigation, &mut attributes);

                    WalkContext {
                        navigation,
                        under_translatable: context.under_translatable
                            || class == ElementClass::Translatable
                            || (class == ElementClass::NavigationContext
                                && is_translatable_tag(&info.tag)),
                    }
                }
                NodeData::Document => context,
                _ => continue,
            };

            for child in node.children.borrow().iter().rev() {
                stack.push((child.clone(), child_context));
            }
        }

        (texts, attributes)
    }
}

/// 属性值统一折叠空白
fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_attributes(
    element: &Handle,
    info: &ElementInfo,
    navigation: bool,
    out: &mut Vec<AttributeCandidate>,
) {
    let mut push = |name: &str, kind: SegmentKind| {
        if let Some(value) = get_node_attr(element, name) {
            let value = normalize_whitespace(&value);
            if !value.is_empty() {
                out.push(AttributeCandidate {
                    element: element.clone(),
                    name: name.to_string(),
                    value,
                    kind,
                    navigation,
                });
            }
        }
    };

    if info.tag == "meta" {
        let name = get_node_attr(element, "name").map(|n| n.to_ascii_lowercase());
        let property = get_node_attr(element, "property").map(|p| p.to_ascii_lowercase());

        let is_translatable_meta = name.as_deref().map_or(false, |n| META_NAMES.contains(&n))
            || property.as_deref().map_or(false, |p| META_PROPERTIES.contains(&p));
        if is_translatable_meta {
            push("content", SegmentKind::Meta);
        }
        return;
    }

    for name in TRANSLATABLE_ATTRS {
        push(name, SegmentKind::Attribute);
    }

    if get_node_name(element) == Some("input") {
        let input_type = get_node_attr(element, "type").map(|t| t.trim().to_ascii_lowercase());
        if input_type.as_deref().map_or(false, |t| SUBMIT_INPUT_TYPES.contains(&t)) {
            push("value", SegmentKind::Attribute);
        }
    }
}

#[derive(Default)]
struct PlanBuilder {
    segments: Vec<Segment>,
    anchors: HashMap<String, Anchor>,
    counters: HashMap<SegmentKind, usize>,
}

impl PlanBuilder {
    fn next_id(&mut self, kind: SegmentKind) -> String {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        format!("{}{}", kind.id_prefix(), counter)
    }

    fn push_text(&mut self, candidate: &TextCandidate) {
        let NodeData::Text { contents } = &candidate.node.data else {
            return;
        };
        let text = contents.borrow().to_string();

        let core_start = text.len() - text.trim_start().len();
        let core_end = text.trim_end().len();
        let leading = text[..core_start].to_string();
        let trailing = text[core_end..].to_string();

        let id = self.next_id(SegmentKind::Node);
        self.anchors.insert(
            id.clone(),
            Anchor::Text {
                node: candidate.node.clone(),
                leading,
                trailing,
            },
        );
        self.segments.push(Segment {
            id,
            text,
            kind: SegmentKind::Node,
            attribute: None,
            navigation: candidate.context.navigation,
        });
    }

    fn push_attribute(&mut self, candidate: AttributeCandidate) {
        let id = self.next_id(candidate.kind);
        self.anchors.insert(
            id.clone(),
            Anchor::Attribute {
                element: candidate.element,
                name: candidate.name.clone(),
            },
        );
        self.segments.push(Segment {
            id,
            text: candidate.value,
            kind: candidate.kind,
            attribute: Some(candidate.name),
            navigation: candidate.navigation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(html: &str) -> Plan {
        Segmenter::default().plan(html)
    }

    fn texts(plan: &Plan, kind: SegmentKind) -> Vec<String> {
        plan.segments()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.source_text().to_string())
            .collect()
    }

    #[test]
    fn test_simple_paragraph() {
        let plan = plan("<html><body><p>Welcome</p></body></html>");
        assert_eq!(plan.len(), 1);
        let segment = &plan.segments()[0];
        assert_eq!(segment.id, "t1");
        assert_eq!(segment.text, "Welcome");
        assert_eq!(segment.kind, SegmentKind::Node);
    }

    #[test]
    fn test_denylisted_subtrees_are_skipped() {
        let plan = plan(
            "<html><body><p>Run <code>cargo build</code> now</p><pre>raw text</pre>\
             <div class=\"notranslate\"><p>Brand</p></div><noscript>Enable JS</noscript></body></html>",
        );
        assert_eq!(texts(&plan, SegmentKind::Node), vec!["Run", "now"]);
    }

    #[test]
    fn test_whitespace_is_captured_not_sent() {
        let plan = plan("<html><body><p>Read <a href=\"/x\">more</a>\u{00A0}today </p></body></html>");
        let segments = plan.segments();
        assert_eq!(segments[0].text, "Read ");
        assert_eq!(segments[0].source_text(), "Read");
        assert_eq!(segments[2].text, "\u{00A0}today ");
        assert_eq!(segments[2].source_text(), "today");
    }

    #[test]
    fn test_global_sweep_catches_loose_text() {
        let plan = plan("<html><body><div>Loose text<p>Inside</p></div></body></html>");
        // 可翻译元素下的文本排在前面
        assert_eq!(texts(&plan, SegmentKind::Node), vec!["Inside", "Loose text"]);
        assert_eq!(plan.segments()[0].id, "t1");
        assert_eq!(plan.segments()[1].id, "t2");
    }

    #[test]
    fn test_every_text_node_appears_exactly_once() {
        let plan = plan(
            "<html><body><ul><li>One <span>two <b>three</b></span></li></ul>\
             <table><tr><td>cell</td></tr></table><section>four</section></body></html>",
        );
        let mut all = texts(&plan, SegmentKind::Node);
        all.sort();
        assert_eq!(all, vec!["One", "cell", "four", "three", "two"]);
    }

    #[test]
    fn test_attributes_and_meta() {
        let plan = plan(
            "<html><head><meta name=\"description\" content=\"  A   site \">\
             <meta property=\"og:title\" content=\"Home\"><meta name=\"viewport\" content=\"width=device-width\"></head>\
             <body><img src=\"a.png\" alt=\"A cat\"><input type=\"submit\" value=\"Send\">\
             <input type=\"text\" value=\"typed\" placeholder=\"Your name\"></body></html>",
        );

        assert_eq!(texts(&plan, SegmentKind::Meta), vec!["A site", "Home"]);
        assert_eq!(
            texts(&plan, SegmentKind::Attribute),
            vec!["A cat", "Send", "Your name"]
        );

        let meta = plan.get("m1").unwrap();
        assert_eq!(meta.attribute.as_deref(), Some("content"));
        let send = plan.get("a2").unwrap();
        assert_eq!(send.attribute.as_deref(), Some("value"));
    }

    #[test]
    fn test_navigation_flag() {
        let plan = plan(
            "<html><body><nav><ul><li><a href=\"/\">Home</a></li></ul></nav>\
             <ul class=\"menu\"><li class=\"menu-item\">About us</li></ul><p>Body</p></body></html>",
        );

        let nav: Vec<_> = plan
            .segments()
            .iter()
            .filter(|s| s.navigation)
            .map(|s| s.source_text())
            .collect();
        assert_eq!(nav, vec!["Home", "About us"]);
        assert!(!plan.segments().iter().any(|s| s.source_text() == "Body" && s.navigation));
    }

    #[test]
    fn test_scripts_never_become_segments() {
        let plan = plan(
            "<html><head><script type=\"application/ld+json\">{\"name\":\"Shop\"}</script></head>\
             <body><p>Hello</p><script>document.write('Hi')</script></body></html>",
        );
        assert_eq!(texts(&plan, SegmentKind::Node), vec!["Hello"]);
        assert_eq!(plan.document().preserved().len(), 2);
    }

    #[test]
    fn test_toolbar_is_skipped() {
        let segmenter = Segmenter::new(ClassifyRules::default().with_skip_id("wpadminbar"));
        let plan = segmenter.plan(
            "<html><body><div id=\"wpadminbar\"><a href=\"/wp-admin\">Dashboard</a></div><p>Text</p></body></html>",
        );
        assert_eq!(texts(&plan, SegmentKind::Node), vec!["Text"]);
    }
}
