//! 上游 Provider 共用的 reqwest 客户端
//!
//! 一个客户端承载 `providerTimeoutSecs` 超时和可选的 `proxyUrl`，
//! 文本与图像生成请求都经由它发出。

use reqwest::{Client, Proxy};
use std::time::Duration;

/// 上游重定向次数上限（Pollinations 图像地址会跳转到 CDN）
const MAX_REDIRECTS: usize = 10;

/// 按配置构建 Provider 客户端
///
/// `proxy_url` 为空字符串时视为未配置；支持 `http://`、带认证的
/// `http://user:pass@`、`socks5://` 代理。
pub fn build_client(proxy_url: Option<&str>, timeout_secs: u64) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

    if let Some(url) = proxy_url.filter(|u| !u.trim().is_empty()) {
        let proxy = Proxy::all(url)?;
        builder = builder.proxy(proxy);
        tracing::debug!("Provider 请求经由代理: {}", url);
    }

    Ok(builder.build()?)
}
