//! 生成接口模块
//!
//! Input: ProviderRegistry, GenerationLedger, 已认证的 UserId
//! Output: 文本/图像生成 API 路由
//! Pos: 请求校验、上游调用与记账的编排层

mod handlers;
mod router;
mod service;
pub mod types;

pub use router::create_chat_router;
pub use service::ChatService;
