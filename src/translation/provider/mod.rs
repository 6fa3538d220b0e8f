//! 翻译服务接口
//!
//! 同步的请求/响应模型：一次请求 = {模型, 指令文本, 载荷文本}，返回模型输出的原始文本。
//! 解析成 id → 译文 映射由批次客户端负责。

use std::time::Duration;

use crate::translation::error::TranslationResult;

pub mod openai;

pub use openai::OpenAiCompatibleProvider;

/// 发送给翻译服务的一次请求
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub model: String,
    pub instruction: String,
    pub payload: String,
    /// 本次调用的超时，已按剩余执行预算收紧
    pub timeout: Duration,
}

/// 翻译服务
pub trait TranslationProvider: Send + Sync {
    /// 执行一次调用，返回模型输出的文本
    fn complete(&self, request: &ProviderRequest) -> TranslationResult<String>;

    /// 用于日志的服务名称
    fn name(&self) -> &str {
        "provider"
    }
}

impl<P: TranslationProvider + ?Sized> TranslationProvider for std::sync::Arc<P> {
    fn complete(&self, request: &ProviderRequest) -> TranslationResult<String> {
        (**self).complete(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
