use std::sync::OnceLock;

use encoding_rs::{Encoding, UTF_8};
use html5ever::parse_document;
use html5ever::tendril::{StrTendril, TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::bytes::Regex;

/// 在前 1024 字节内查找 `<meta charset>` 声明
fn sniff_meta_charset(data: &[u8]) -> Option<&'static Encoding> {
    static META_CHARSET: OnceLock<Option<Regex>> = OnceLock::new();

    let re = META_CHARSET
        .get_or_init(|| {
            Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([A-Za-z0-9_\-:.]+)"#).ok()
        })
        .as_ref()?;

    let head = &data[..data.len().min(1024)];
    let label = re.captures(head)?.get(1)?;
    Encoding::for_label(label.as_bytes())
}

/// 将任意编码的页面字节统一转换为 UTF-8 字符串
///
/// 优先级：BOM > 调用方提供的字符集 > `<meta charset>` > UTF-8
pub fn decode_markup(data: &[u8], charset_hint: Option<&str>) -> String {
    let encoding = Encoding::for_bom(data)
        .map(|(encoding, _)| encoding)
        .or_else(|| charset_hint.and_then(|label| Encoding::for_label(label.trim().as_bytes())))
        .or_else(|| sniff_meta_charset(data))
        .unwrap_or(UTF_8);

    // decode() 会自行剥离 BOM
    let (string, _, had_errors) = encoding.decode(data);
    if had_errors {
        tracing::debug!("页面字节包含无法解码的序列，已替换 ({})", encoding.name());
    }

    string.into_owned()
}

/// 将 HTML 字符串解析为 DOM（容错解析，从不失败）
pub fn html_to_dom(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(StrTendril::from(html))
}

/// 按文档顺序收集所有后代节点（含自身），非递归以避免深层文档栈溢出
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut stack = vec![node.clone()];

    while let Some(current) = stack.pop() {
        for child in current.children.borrow().iter().rev() {
            stack.push(child.clone());
        }
        found.push(current);
    }

    found
}

/// 查找所有指定名称的元素
pub fn find_nodes(node: &Handle, node_name: &str) -> Vec<Handle> {
    descendants(node)
        .into_iter()
        .filter(|candidate| get_node_name(candidate) == Some(node_name))
        .collect()
}

/// 按 id 查找元素
pub fn find_element_by_id(node: &Handle, id: &str) -> Option<Handle> {
    descendants(node)
        .into_iter()
        .find(|candidate| get_node_attr(candidate, "id").as_deref() == Some(id))
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// `parent` 是 `Cell`，取出后必须放回，否则节点会与树脱钩
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 节点的 class 列表
pub fn get_node_classes(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|classes| {
            classes
                .split_ascii_whitespace()
                .map(|class| class.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// 拼接节点下所有文本
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    for descendant in descendants(node) {
        if let NodeData::Text { contents } = &descendant.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// 替换文本节点内容，非文本节点忽略
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from(text);
    }
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{namespace_url, ns, LocalName};

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.as_deref() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value);
                } else {
                    // Remove attr completely if attr_value is not defined
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}
