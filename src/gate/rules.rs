//! Declarative request filtering rules.
//!
//! Every rule is data: a target, a pattern and the rejection it produces.
//! The tables are compile-time constants and are compiled once into a
//! [`RuleSet`] when the gate is built.

use crate::error::{GatewayError, Result};
use axum::http::StatusCode;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Why the gate refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    ForbiddenAgent,
    SuspiciousQuery,
    UnsupportedMediaType,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ForbiddenAgent => "forbidden-agent",
            RejectReason::SuspiciousQuery => "suspicious-query",
            RejectReason::UnsupportedMediaType => "unsupported-media-type",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RejectReason::ForbiddenAgent => StatusCode::FORBIDDEN,
            RejectReason::SuspiciousQuery => StatusCode::BAD_REQUEST,
            RejectReason::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the request a rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    /// Case-insensitive regex against the `User-Agent` header
    UserAgent,
    /// Substring of the lower-cased query string
    Query,
}

/// A single filtering rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRule {
    pub target: RuleTarget,
    pub pattern: &'static str,
    pub reason: RejectReason,
}

impl GateRule {
    const fn user_agent(pattern: &'static str) -> Self {
        Self {
            target: RuleTarget::UserAgent,
            pattern,
            reason: RejectReason::ForbiddenAgent,
        }
    }

    const fn query(pattern: &'static str) -> Self {
        Self {
            target: RuleTarget::Query,
            pattern,
            reason: RejectReason::SuspiciousQuery,
        }
    }
}

/// Security scanner signatures
pub const USER_AGENT_RULES: &[GateRule] = &[
    GateRule::user_agent(r"sqlmap"),
    GateRule::user_agent(r"nikto"),
    GateRule::user_agent(r"\bnmap\b"),
    GateRule::user_agent(r"masscan"),
    GateRule::user_agent(r"nessus"),
    GateRule::user_agent(r"openvas"),
    GateRule::user_agent(r"acunetix"),
    GateRule::user_agent(r"\bw3af"),
    GateRule::user_agent(r"dirbuster"),
    GateRule::user_agent(r"gobuster"),
    GateRule::user_agent(r"wpscan"),
    GateRule::user_agent(r"nuclei"),
    GateRule::user_agent(r"zgrab"),
    GateRule::user_agent(r"havij"),
    GateRule::user_agent(r"\bhydra\b"),
    GateRule::user_agent(r"burp\s?suite"),
    GateRule::user_agent(r"zmeu"),
];

/// Injection and traversal indicators, all lower case
pub const QUERY_RULES: &[GateRule] = &[
    // SQL
    GateRule::query("union select"),
    GateRule::query("union all select"),
    GateRule::query("select * from"),
    GateRule::query("drop table"),
    GateRule::query("insert into"),
    GateRule::query("delete from"),
    GateRule::query("' or '1'='1"),
    GateRule::query("' or 1=1"),
    GateRule::query("sleep("),
    GateRule::query("benchmark("),
    // Script injection
    GateRule::query("<script"),
    GateRule::query("</script"),
    GateRule::query("javascript:"),
    GateRule::query("vbscript:"),
    GateRule::query("onerror="),
    GateRule::query("onload="),
    GateRule::query("data:text/html"),
    // Traversal and sensitive files
    GateRule::query("../"),
    GateRule::query("..\\"),
    GateRule::query("..%2f"),
    GateRule::query("%2e%2e"),
    GateRule::query("%00"),
    GateRule::query("/etc/passwd"),
    GateRule::query("/etc/shadow"),
    GateRule::query("/proc/self"),
    GateRule::query("c:\\windows"),
    GateRule::query("/.env"),
    GateRule::query("=.env"),
    GateRule::query(".git/"),
    GateRule::query("wp-config"),
];

/// Accepted `Content-Type` prefixes for POST, PUT and PATCH
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
    "image/svg+xml",
];

/// Rules ready for evaluation
#[derive(Debug)]
pub struct RuleSet {
    user_agents: Vec<(Regex, GateRule)>,
    queries: Vec<GateRule>,
    allowed_content_types: &'static [&'static str],
}

impl RuleSet {
    /// Compile the built-in rule tables
    pub fn builtin() -> Result<Self> {
        Self::compile(
            USER_AGENT_RULES.iter().chain(QUERY_RULES),
            ALLOWED_CONTENT_TYPES,
        )
    }

    /// Compile rules, dispatching each one on its target
    pub fn compile<'r>(
        rules: impl IntoIterator<Item = &'r GateRule>,
        allowed_content_types: &'static [&'static str],
    ) -> Result<Self> {
        let mut user_agents = Vec::new();
        let mut queries = Vec::new();

        for rule in rules {
            match rule.target {
                RuleTarget::UserAgent => {
                    let regex = RegexBuilder::new(rule.pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            GatewayError::Config(format!(
                                "Invalid user agent pattern '{}': {}",
                                rule.pattern, e
                            ))
                        })?;
                    user_agents.push((regex, *rule));
                }
                RuleTarget::Query => queries.push(*rule),
            }
        }

        Ok(Self {
            user_agents,
            queries,
            allowed_content_types,
        })
    }

    /// First scanner signature matching the user agent
    pub fn match_user_agent(&self, user_agent: &str) -> Option<&GateRule> {
        if user_agent.is_empty() {
            return None;
        }

        self.user_agents
            .iter()
            .find(|(regex, _)| regex.is_match(user_agent))
            .map(|(_, rule)| rule)
    }

    /// First indicator found in the query, raw or percent-decoded
    pub fn match_query(&self, query: &str) -> Option<&GateRule> {
        if query.is_empty() {
            return None;
        }

        let raw = query.to_lowercase();
        let decoded = percent_encoding::percent_decode_str(&query.replace('+', " "))
            .decode_utf8_lossy()
            .to_lowercase();

        self.queries
            .iter()
            .find(|rule| raw.contains(rule.pattern) || decoded.contains(rule.pattern))
    }

    /// Whether the content type starts with an allowed MIME type
    pub fn content_type_allowed(&self, content_type: Option<&str>) -> bool {
        let Some(content_type) = content_type else {
            return false;
        };

        let content_type = content_type.trim_start().to_ascii_lowercase();
        self.allowed_content_types
            .iter()
            .any(|allowed| content_type.starts_with(allowed))
    }
}
