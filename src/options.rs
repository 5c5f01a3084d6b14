// SPDX-FileCopyrightText: 2023 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

//! Translates a [ScanConfiguration] into the flat option payload of the remote service.
//!
//! Unset fields are never sent and empty or whitespace-only text fields count as unset.
//! Booleans and numbers may be given as strings and are coerced without failing, a blank
//! flag is false and a blank number is 0.

use serde_json::Value;

use crate::models::{Flag, Number, OptionMap, ScanConfiguration};

/// Builds the option payload for `config`.
///
/// The custom options are merged last and replace computed keys. A custom option set to
/// `null` removes the computed key.
pub fn to_remote_options(config: &ScanConfiguration) -> OptionMap {
    let mut options = OptionMap::new();
    let request = &config.request;
    insert_text(&mut options, "url", Some(&request.target));
    insert_text(&mut options, "method", request.method.as_ref());
    insert_text(&mut options, "data", request.data.as_ref());
    insert_text(&mut options, "cookie", request.cookie.as_ref());
    insert_text(&mut options, "userAgent", request.user_agent.as_ref());
    insert_text(&mut options, "referer", request.referer.as_ref());
    if let Some(headers) = request.headers.as_ref().filter(|h| !h.is_empty()) {
        options.insert("headers".to_owned(), Value::String(headers.join("\n")));
    }

    let connection = &config.connection;
    insert_text(&mut options, "proxy", connection.proxy.as_ref());
    insert_text(&mut options, "proxyCred", connection.proxy_cred.as_ref());
    insert_text(&mut options, "proxyFile", connection.proxy_file.as_ref());

    let flags = &config.flags;
    insert_flag(&mut options, "tor", flags.tor.as_ref());
    insert_flag(&mut options, "checkTor", flags.check_tor.as_ref());
    insert_flag(&mut options, "skipUrlEncode", flags.skip_url_encode.as_ref());
    insert_flag(&mut options, "forceSsl", flags.force_ssl.as_ref());
    insert_flag(&mut options, "chunked", flags.chunked.as_ref());
    insert_flag(&mut options, "hpp", flags.hpp.as_ref());

    insert_text(&mut options, "torPort", connection.tor_port.as_ref());
    insert_text(&mut options, "torType", connection.tor_type.as_ref());
    insert_text(&mut options, "randomize", connection.randomize.as_ref());
    insert_text(&mut options, "safeUrl", connection.safe_url.as_ref());
    insert_text(&mut options, "safePost", connection.safe_post.as_ref());
    insert_text(&mut options, "safeReqFile", connection.safe_req_file.as_ref());
    insert_text(&mut options, "csrfToken", connection.csrf_token.as_ref());
    insert_text(&mut options, "csrfUrl", connection.csrf_url.as_ref());
    insert_text(&mut options, "csrfMethod", connection.csrf_method.as_ref());
    insert_text(&mut options, "eval", connection.eval.as_ref());

    let knobs = &config.knobs;
    insert_number(&mut options, "delay", knobs.delay.as_ref());
    insert_number(&mut options, "timeout", knobs.timeout.as_ref());
    insert_number(&mut options, "retries", knobs.retries.as_ref());
    insert_number(&mut options, "safeFreq", knobs.safe_freq.as_ref());

    for (key, value) in &config.custom_options {
        if value.is_null() {
            options.remove(key);
        } else {
            options.insert(key.clone(), value.clone());
        }
    }
    options
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn insert_text(options: &mut OptionMap, key: &str, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !is_blank(v)) {
        options.insert(key.to_owned(), Value::String(value.clone()));
    }
}

fn insert_flag(options: &mut OptionMap, key: &str, value: Option<&Flag>) {
    if let Some(value) = value.map(coerce_flag) {
        options.insert(key.to_owned(), Value::Bool(value));
    }
}

fn insert_number(options: &mut OptionMap, key: &str, value: Option<&Number>) {
    if let Some(value) = value.map(coerce_number) {
        options.insert(key.to_owned(), number_value(value));
    }
}

/// "true", "1" and "yes" are true regardless of case, every other string is false.
pub fn coerce_flag(flag: &Flag) -> bool {
    match flag {
        Flag::Bool(value) => *value,
        Flag::Text(value) => matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
    }
}

/// Unparsable, blank or non-finite values become 0.
pub fn coerce_number(number: &Number) -> f64 {
    match number {
        Number::Float(value) if value.is_finite() => *value,
        Number::Float(_) => 0.0,
        Number::Text(value) => parse_number_prefix(value),
    }
}

/// Parses the longest numeric prefix of `input`, e.g. `"3.5abc"` is 3.5.
///
/// Leading whitespace is skipped. Returns 0 when there is no numeric prefix.
pub fn parse_number_prefix(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut at: usize| {
        while at < bytes.len() && bytes[at].is_ascii_digit() {
            at += 1;
        }
        at
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let integer_end = digits_from(end);
    let mut digits = integer_end - end;
    end = integer_end;
    if bytes.get(end) == Some(&b'.') {
        let fraction_end = digits_from(end + 1);
        digits += fraction_end - end - 1;
        if digits > 0 {
            end = fraction_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent = end + 1;
        if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
            exponent += 1;
        }
        let exponent_end = digits_from(exponent);
        if exponent_end > exponent {
            end = exponent_end;
        }
    }
    s[..end]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}
