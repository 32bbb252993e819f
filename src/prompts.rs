// prompts.rs

/// Selection and summarization instructions for one digest pass. The item
/// block lists candidates grouped by source, each prefixed with its index
/// into the input list.
pub fn digest_selection_prompt(item_block: &str, max_items: usize, category_limits: &str) -> String {
    format!(
        "{} | You are curating today's edition of a daily digest from the numbered items above.

Select the most noteworthy items, up to {} in total, respecting these per-category limits: {}.
Favor substance over hype, skip promotional content, and diversify across sources: include at
least one item from every source that has something notable.

Respond with ONLY a JSON array, no prose before or after. Each element must be an object with
these fields:
- \"item_index\": the number of the chosen item from the list above
- \"title\": a clear, plain-language headline
- \"summary\": two or three sentences on what happened
- \"why_it_matters\": one sentence on why a reader should care (optional)
- \"category\": one of the category names listed above
- \"source_name\": the name of the source the item came from

Do not invent items that are not in the list, do not repeat an item_index, and do not include
URLs anywhere in your answer.",
        item_block, max_items, category_limits
    )
}

/// Fixed instruction for summarizing a discussion thread.
pub fn comment_summary_prompt(title: &str, comments_block: &str) -> String {
    format!(
        "{} | The lines above are reader comments on \"{}\". Summarize the overall discussion in
2-3 sentences: the prevailing sentiment, the strongest points raised, and any notable
disagreement. Write in plain American English.

Do not tell me what you're doing, and do not quote commenters directly.",
        comments_block, title
    )
}

/// Answer a reader question against today's digest content.
pub fn assistant_prompt(digest_block: &str, question: &str) -> String {
    format!(
        "{} | Using only the digest items above, answer this reader question in a few sentences:
{}

If the digest does not cover the question, say so briefly instead of speculating.",
        digest_block, question
    )
}
