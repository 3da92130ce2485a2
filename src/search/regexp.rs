//! `regexp_with_flags` scalar function / 带标志的正则匹配函数
//!
//! Generated predicates call `regexp_with_flags(pattern, flags, text)`. The
//! storage layer registers this implementation with its SQLite connection.
//!
//! Flags / 标志：
//! - `i` case-insensitive, `m` multi-line, `s` dot matches newline, `x` verbose
//! - `u` is implied, `g` and `y` are accepted and ignored, anything else is ignored

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// Compiled regex cache / 正则缓存
static CACHE: Lazy<Mutex<HashMap<(String, String), Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

const CACHE_CAPACITY: usize = 128;

/// Compile `pattern` with JavaScript-style flags
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .unicode(true)
        .build()
}

/// Evaluate one `regexp_with_flags` call / 执行一次匹配
pub fn regexp_with_flags(pattern: &str, flags: &str, text: &str) -> Result<bool, regex::Error> {
    let key = (pattern.to_string(), flags.to_string());
    if let Some(regex) = CACHE.lock().get(&key) {
        return Ok(regex.is_match(text));
    }

    let regex = build_regex(pattern, flags)?;
    let matched = regex.is_match(text);

    let mut cache = CACHE.lock();
    if cache.len() >= CACHE_CAPACITY {
        // 缓存满了直接清空
        cache.clear();
    }
    cache.insert(key, regex);
    Ok(matched)
}
