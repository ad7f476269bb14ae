//! Defensive parsing of semi-structured model output.
//!
//! Models are asked for bare JSON but frequently wrap it in prose or code
//! fences. We locate the first balanced `[...]` / `{...}` span, parse that, and
//! fall back to a fixed value per call site when anything goes wrong. Parse
//! failures never leave this module.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::types::{ResearchStep, Synthesis};

/// Summary used when the synthesis reply cannot be parsed.
pub const FALLBACK_SUMMARY: &str = "Research complete. An automated summary could not be generated; see the detailed findings below.";

/// Return the first balanced span delimited by `open`/`close`.
///
/// Brackets inside JSON string literals are ignored. Returns `None` when no
/// opening delimiter exists or the span is never closed.
fn first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First balanced JSON array in `text`.
pub fn extract_json_array(text: &str) -> Option<&str> {
    first_balanced(text, '[', ']')
}

/// First balanced JSON object in `text`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    first_balanced(text, '{', '}')
}

/// Queries from a plan reply, or `None` if the reply is unusable.
fn plan_queries(text: &str) -> Option<Vec<String>> {
    let array = extract_json_array(text)?;
    let items: Vec<Value> = serde_json::from_str(array).ok()?;
    let queries: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("query").and_then(Value::as_str))
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    if queries.is_empty() { None } else { Some(queries) }
}

/// Turn a planning reply into pending steps.
///
/// Falls back to a single step carrying `original_query` verbatim.
pub fn parse_plan(text: &str, original_query: &str) -> Vec<ResearchStep> {
    match plan_queries(text) {
        Some(queries) => queries.into_iter().map(ResearchStep::pending).collect(),
        None => {
            warn!(
                reply_len = text.len(),
                "Could not parse research plan, using the original query as a single step"
            );
            vec![ResearchStep::pending(original_query)]
        }
    }
}

#[derive(Debug, Deserialize)]
struct SynthesisReply {
    summary: String,
    #[serde(alias = "deep_dive")]
    #[serde(rename = "deepDive")]
    deep_dive: String,
}

/// Turn a synthesis reply into a summary and deep dive.
///
/// Falls back to [`FALLBACK_SUMMARY`] with the raw dossier as the deep dive.
pub fn parse_synthesis(text: &str, dossier: &str) -> Synthesis {
    let parsed = extract_json_object(text)
        .and_then(|object| serde_json::from_str::<SynthesisReply>(object).ok())
        .filter(|reply| !reply.summary.trim().is_empty());

    match parsed {
        Some(reply) => Synthesis {
            summary: reply.summary,
            deep_dive: reply.deep_dive,
        },
        None => {
            warn!(
                reply_len = text.len(),
                "Could not parse synthesis reply, falling back to the raw dossier"
            );
            Synthesis {
                summary: FALLBACK_SUMMARY.to_string(),
                deep_dive: dossier.to_string(),
            }
        }
    }
}
