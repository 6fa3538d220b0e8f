//! 元素分类
//!
//! 固定的数据驱动分类函数，与 DOM 遍历解耦，可以单独测试。

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{get_node_attr, get_node_classes, get_node_name};
use crate::translation::config::constants::{
    DENYLISTED_ELEMENTS, NAVIGATION_CLASSES, NAVIGATION_ROLES, NO_TRANSLATE_ATTR,
    NO_TRANSLATE_CLASSES, TRANSLATABLE_ELEMENTS,
};

/// 元素类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementClass {
    /// 其文本后代是首要的翻译对象
    Translatable,
    /// 整个子树都不翻译
    Denylisted,
    /// 导航区域，仅作为提示词标记
    NavigationContext,
    /// 普通容器
    Neutral,
}

/// 分类所需的元素信息
#[derive(Debug, Clone, Default)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub role: Option<String>,
    pub translate: Option<String>,
    pub skip_flag: bool,
}

impl ElementInfo {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_ascii_lowercase());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_ascii_lowercase());
        self
    }

    pub fn with_translate(mut self, value: &str) -> Self {
        self.translate = Some(value.to_ascii_lowercase());
        self
    }

    pub fn with_skip_flag(mut self) -> Self {
        self.skip_flag = true;
        self
    }

    /// 从 DOM 元素读取，非元素节点返回 `None`
    pub fn from_node(node: &Handle) -> Option<Self> {
        let tag = get_node_name(node)?;

        Some(Self {
            tag: tag.to_ascii_lowercase(),
            id: get_node_attr(node, "id"),
            classes: get_node_classes(node),
            role: get_node_attr(node, "role").map(|role| role.trim().to_ascii_lowercase()),
            translate: get_node_attr(node, "translate").map(|t| t.trim().to_ascii_lowercase()),
            skip_flag: get_node_attr(node, NO_TRANSLATE_ATTR).is_some(),
        })
    }
}

/// 分类规则中可配置的部分
#[derive(Debug, Clone, Default)]
pub struct ClassifyRules {
    /// 整个子树不翻译的元素 id（例如特权访问者工具栏）
    pub skip_ids: Vec<String>,
}

impl ClassifyRules {
    pub fn with_skip_id(mut self, id: &str) -> Self {
        if !id.is_empty() {
            self.skip_ids.push(id.to_string());
        }
        self
    }

    fn is_do_not_translate(&self, info: &ElementInfo) -> bool {
        info.skip_flag
            || info.translate.as_deref() == Some("no")
            || info
                .classes
                .iter()
                .any(|class| NO_TRANSLATE_CLASSES.contains(&class.as_str()))
            || info
                .id
                .as_ref()
                .map_or(false, |id| self.skip_ids.iter().any(|skip| skip == id))
    }
}

/// 是否为导航区域
fn is_navigation(info: &ElementInfo) -> bool {
    info.tag == "nav"
        || info
            .role
            .as_deref()
            .map_or(false, |role| NAVIGATION_ROLES.contains(&role))
        || info
            .classes
            .iter()
            .any(|class| NAVIGATION_CLASSES.contains(&class.as_str()))
}

/// 元素分类：禁止 > 导航 > 可翻译 > 普通
pub fn classify(info: &ElementInfo, rules: &ClassifyRules) -> ElementClass {
    if DENYLISTED_ELEMENTS.contains(&info.tag.as_str()) || rules.is_do_not_translate(info) {
        ElementClass::Denylisted
    } else if is_navigation(info) {
        ElementClass::NavigationContext
    } else if TRANSLATABLE_ELEMENTS.contains(&info.tag.as_str()) {
        ElementClass::Translatable
    } else {
        ElementClass::Neutral
    }
}

/// 导航区域里的可翻译元素（如 `li.menu-item`）同样收集文本
pub fn is_translatable_tag(tag: &str) -> bool {
    TRANSLATABLE_ELEMENTS.contains(&tag)
}
