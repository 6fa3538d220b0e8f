//! # 工具模块
//!
//! - `clock` - 时钟抽象，用于缓存有效期判断
//! - `url` - 链接拆分、路径规范化、语言前缀处理

pub mod clock;
pub mod url;

// Re-export commonly used items for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use url::{
    has_file_extension, is_internal_link, language_prefix, normalize_path, parse_query,
    split_href, strip_language_prefix, HrefParts, Url,
};
