//! 公共工具模块

pub mod auth;

/// 安全地截断 UTF-8 字符串，确保不会在多字节字符中间截断
///
/// 返回不超过 `max_bytes` 字节的最长有效 UTF-8 子串
pub fn truncate_str_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// 生成日志用的 prompt 预览
///
/// 未启用 `sensitive-logs` 时只保留前 `max_bytes` 字节并追加省略号
pub fn prompt_preview(s: &str, max_bytes: usize) -> String {
    if cfg!(feature = "sensitive-logs") || s.len() <= max_bytes {
        return s.to_string();
    }

    let truncate_at = if max_bytes > 3 { max_bytes - 3 } else { max_bytes };
    format!("{}...", truncate_str_safe(s, truncate_at))
}
