use serde_json::{json, Value};

use crate::library::SummaryDetail;

/// System instruction sent with every classification request.
pub const SYSTEM_PROMPT: &str = "\
You are a professional content librarian and intelligence analyst.
Your task is to analyze user-provided URLs or text and extract precise metadata.

CRITICAL RULES:
1. PLATFORM DETECTION: Inspect the URL or text. If it's a youtube.com/youtu.be link, platform is 'YouTube'. If instagram.com, 'Instagram'. If reddit.com, 'Reddit'. Otherwise 'Web/Blogs' or 'Other'.
2. TITLE: Extract a compelling, accurate title.
3. SUMMARY (aiInsight): Write a clear, 1-sentence summary describing EXACTLY what the content is about.
4. CATEGORIZATION: Select the most appropriate category from (Learning, Career, Tech, Mental Health, Fitness, Entertainment, Others).
5. KEY POINTS: Extract 3 vital takeaways.

OUTPUT: Return ONLY a JSON object. No markdown, no preamble.
{
  \"title\": \"...\",
  \"platform\": \"YouTube\" | \"Instagram\" | \"Reddit\" | \"Web/Blogs\" | \"Other\",
  \"category\": \"...\",
  \"subcategory\": \"...\",
  \"aiInsight\": \"...\",
  \"keyPoints\": [\"...\", \"...\", \"...\"]
}";

/// Extra instruction appended to the input, by summary detail.
pub fn instruction_for(detail: SummaryDetail) -> &'static str {
    match detail {
        SummaryDetail::Detailed => "Perform an exhaustive deep-dive analysis.",
        SummaryDetail::Concise => "Perform a rapid, high-level categorization.",
    }
}

/// The user turn: raw input followed by the detail instruction.
pub fn user_text(input: &str, detail: SummaryDetail) -> String {
    format!("INPUT: {input}\n\nCONTEXT: {}", instruction_for(detail))
}

/// JSON schema the model is asked to answer with.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "platform": { "type": "STRING" },
            "category": { "type": "STRING" },
            "subcategory": { "type": "STRING" },
            "aiInsight": { "type": "STRING" },
            "keyPoints": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["title", "platform", "category", "subcategory", "aiInsight", "keyPoints"]
    })
}

/// Slice from the first `{` to the last `}`. Models sometimes wrap the object
/// in a code fence or a sentence despite the instruction.
pub fn extract_json_object(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}
