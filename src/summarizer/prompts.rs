//! Prompt templates for the map and reduce stages.

/// Build the per-chunk summarization prompt.
pub fn build_map_prompt(chunk_text: &str) -> String {
    format!(
        "Summarize this civic or government-related text in 2-3 sentences.\n\
         Focus on actions taken and why it matters to the public.\n\
         Use neutral tone.\n\n\
         Text to summarize:\n{chunk_text}\n\n\
         Summary:"
    )
}

/// Build the aggregation prompt, numbering chunk summaries from 1 in document order.
pub fn build_reduce_prompt(title: &str, chunk_summaries: &[String]) -> String {
    let numbered = chunk_summaries
        .iter()
        .enumerate()
        .map(|(index, summary)| format!("Chunk {}: {}", index + 1, summary.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Create one concise, coherent summary of the document below from these chunk summaries.\n\
         Group related items.\n\
         Avoid repetition.\n\
         Highlight major actions.\n\
         Use neutral, plain language.\n\n\
         Document title: {title}\n\n\
         Chunk summaries:\n{numbered}\n\n\
         Final summary:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_prompt_embeds_chunk_text() {
        let prompt = build_map_prompt("The House passed HB 12.");
        assert!(prompt.contains("Text to summarize:\nThe House passed HB 12.\n"));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn reduce_prompt_numbers_summaries_in_order() {
        let prompt = build_reduce_prompt(
            "Budget Hearing",
            &["First point.".to_string(), "Second point.".to_string()],
        );
        assert!(prompt.contains("Document title: Budget Hearing"));
        let first = prompt.find("Chunk 1: First point.").expect("chunk 1");
        let second = prompt.find("Chunk 2: Second point.").expect("chunk 2");
        assert!(first < second);
        assert!(prompt.ends_with("Final summary:"));
    }
}
