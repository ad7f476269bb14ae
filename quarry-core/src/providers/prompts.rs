//! Prompt text shared by all backends.

use crate::search::SearchHit;
use crate::types::ResearchStep;

/// Result cap for each evidence source call.
pub const MAX_SEARCH_RESULTS: usize = 5;

/// Per-hit content excerpt length in the analysis context, in characters.
pub const EXCERPT_CHARS: usize = 1000;

/// Fixed result for a step whose search returned nothing.
pub const NO_RESULTS_MESSAGE: &str = "No relevant search results were found for this query.";

pub const PLAN_TEMPERATURE: f32 = 0.2;
pub const STEP_TEMPERATURE: f32 = 0.3;
pub const SYNTHESIS_TEMPERATURE: f32 = 0.4;

pub const RESEARCHER_SYSTEM: &str = "You are a meticulous research analyst. You answer precisely, \
cite evidence when you have it, and never invent facts.";

/// Prompt asking for a 3-4 step plan as a JSON array.
pub fn plan_prompt(query: &str) -> String {
    format!(
        "Break the following research question into 3 to 4 focused sub-questions that can each \
         be answered with a web search.\n\n\
         Research question: {query}\n\n\
         Respond ONLY with a JSON array of objects, each with a single \"query\" field, for example:\n\
         [{{\"query\": \"first sub-question\"}}, {{\"query\": \"second sub-question\"}}]"
    )
}

/// Prompt for a self-grounded step (the backend searches on its own).
pub fn grounded_step_prompt(query: &str) -> String {
    format!(
        "Research the following question using web search and write a concise, factual answer \
         of two to four paragraphs. Include concrete figures and dates where available.\n\n\
         Question: {query}"
    )
}

/// Prompt asking the model to answer a sub-question from search context.
pub fn analysis_prompt(query: &str, context: &str) -> String {
    format!(
        "Using only the search results below, answer the research question in two to four \
         paragraphs. Refer to results by their [number] when you rely on them. If the results \
         do not answer the question, say so.\n\n\
         Question: {query}\n\n\
         Search results:\n{context}"
    )
}

/// Prompt asking for the final `{summary, deepDive}` object.
pub fn synthesis_prompt(original_query: &str, dossier: &str) -> String {
    format!(
        "You are writing the final report for the research question: {original_query}\n\n\
         Research dossier:\n{dossier}\n\n\
         Respond ONLY with a JSON object with exactly two string fields:\n\
         - \"summary\": an executive summary of 3 to 5 sentences\n\
         - \"deepDive\": a detailed markdown report with headings that integrates all findings"
    )
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Numbered search context: `[n] title` followed by a bounded excerpt.
pub fn build_search_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {}\n{}",
                i + 1,
                hit.title,
                excerpt(hit.content.trim(), EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Concatenate each step's query and result in step order.
pub fn build_dossier(steps: &[ResearchStep]) -> String {
    steps
        .iter()
        .map(|step| format!("## {}\n{}", step.query, step.result.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepStatus;
    use pretty_assertions::assert_eq;

    fn hit(title: &str, content: &str) -> SearchHit {
        SearchHit {
            uri: format!("https://example.com/{title}"),
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_search_context_is_numbered() {
        let context = build_search_context(&[hit("Alpha", " first "), hit("Beta", "second")]);
        assert_eq!(context, "[1] Alpha\nfirst\n\n[2] Beta\nsecond");
    }

    #[test]
    fn test_search_context_truncates_content() {
        let long = "é".repeat(EXCERPT_CHARS + 50);
        let context = build_search_context(&[hit("Long", &long)]);
        let body = context.strip_prefix("[1] Long\n").unwrap();
        assert_eq!(body.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn test_dossier_in_step_order() {
        let mut first = ResearchStep::pending("current AI tools in classrooms");
        first.status = StepStatus::Completed;
        first.result = Some("Tutoring bots are common.".into());
        let second = ResearchStep::pending("teacher adoption barriers");

        assert_eq!(
            build_dossier(&[first, second]),
            "## current AI tools in classrooms\nTutoring bots are common.\n\n## teacher adoption barriers\n"
        );
    }

    #[test]
    fn test_plan_prompt_mentions_query_and_format() {
        let prompt = plan_prompt("impact of AI on education");
        assert!(prompt.contains("impact of AI on education"));
        assert!(prompt.contains("\"query\""));
    }
}
