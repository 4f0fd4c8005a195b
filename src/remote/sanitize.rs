//! Scrubbing of provider error messages
//!
//! Provider error payloads echo session state (csrf tokens, XDUSS, bdstoken). Anything
//! that ends up in a stored task message or a log line goes through here first.

use regex::Regex;
use std::sync::LazyLock;

/// Keys whose values are credentials
const CREDENTIAL_KEYS: &[&str] = &[
    "csrf", "XDUSS", "BDUSS", "bdstoken", "STOKEN", "BDCLND", "randsk", "PTOKEN", "sekey",
];

static CREDENTIAL_VALUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    let keys = CREDENTIAL_KEYS.join("|");
    Regex::new(&format!(
        r#"(?i)["']?\b({keys})\b["']?\s*[:=]\s*("[^"]*"|'[^']*'|[^\s;,&}}]*)"#
    ))
    .ok()
});

/// Canonical description of a provider error code
pub fn describe_code(code: i64) -> Option<&'static str> {
    let text = match code {
        -6 => "身份验证失败",
        -7 => "文件或目录名错误或无权访问",
        -8 => "文件或目录已存在",
        -9 => "文件或目录不存在",
        -12 => "提取码错误",
        -32 => "剩余空间不足，无法转存",
        -33 => "一次支持操作999个，减点试试吧",
        -62 => "可能需要输入验证码",
        2 => "参数错误",
        4 => "share transfer pcs error",
        12 => "文件已经存在",
        105 => "啊哦，链接错误没找到文件",
        115 => "该文件禁止分享",
        117 => "该分享已过期",
        130 => "转存文件数超限",
        31034 => "操作过于频繁",
        31066 => "文件不存在",
        _ => return None,
    };
    Some(text)
}

/// Whether `message` mentions any credential key
pub fn mentions_credentials(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    CREDENTIAL_KEYS
        .iter()
        .any(|key| lower.contains(&key.to_ascii_lowercase()))
}

/// Mask `key=value` / `'key': 'value'` credential pairs
pub fn scrub(message: &str) -> String {
    match CREDENTIAL_VALUE.as_ref() {
        Some(re) => re.replace_all(message, "***").into_owned(),
        None => String::new(),
    }
}

/// Message to carry for a provider error
///
/// Known codes get their canonical description. Unknown codes keep the provider's
/// message unless it mentions a credential, in which case the payload is withheld.
pub fn provider_message(code: i64, raw: &str) -> String {
    if let Some(text) = describe_code(code) {
        return text.to_string();
    }
    if mentions_credentials(raw) {
        return "provider payload withheld".to_string();
    }
    raw.to_string()
}

/// Scrub an arbitrary error text (request failures carry URLs and headers)
pub fn sanitize_message(message: &str) -> String {
    let scrubbed = scrub(message);
    if mentions_credentials(&scrubbed) {
        // Only key names remain; drop them too
        let mut out = scrubbed;
        for key in CREDENTIAL_KEYS {
            out = replace_case_insensitive(&out, key);
        }
        out
    } else {
        scrubbed
    }
}

fn replace_case_insensitive(haystack: &str, needle: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(needle))) {
        Ok(re) => re.replace_all(haystack, "***").into_owned(),
        Err(_) => haystack.to_string(),
    }
}
