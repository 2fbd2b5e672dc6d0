//! Prompts for LLM-based document classification.
//!
//! All prompt text lives here so a wording change happens in one place and
//! can be checked by unit tests without calling a real model.
//!
//! Callers can override the system prompt via
//! [`crate::config::ClassifierConfig::system_prompt`]; the user prompt is
//! always built by [`classification_prompt`] because the reply parser depends
//! on the grammar it spells out.

use crate::category::CategorySet;

/// Default system prompt for classification.
pub const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are a document librarian. You read text extracted from the first pages of a document (often OCR output in Thai and English, with recognition errors) and decide which folder it belongs in.

Follow these rules precisely:

1. Pick exactly ONE folder from the list you are given. If none fits exactly, pick the closest one.
2. Score every folder independently from 0 to 100. The scores do NOT need to sum to 100. If a folder is slightly related, give it a higher score too.
3. Do not guess when the text carries too little context. Give low scores instead.
4. Reply with a single line and nothing else: no explanation, no markdown, no quotes."#;

/// User prompt: the forwarded document text plus the reply grammar.
///
/// The expected reply is `<folder>,[v1,...,vN]` with one integer per
/// category, in category order.
pub fn classification_prompt(text: &str, categories: &CategorySet) -> String {
    let names = categories.names();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("score{i}")).collect();
    let example = example_reply(categories);
    format!(
        "Read the following document.\n\
         \n\
         {text}\n\
         \n\
         Folder list (scores must follow this order): {categories}\n\
         \n\
         Reply in exactly this format: <foldername>,[{placeholders}]\n\
         Each score is an integer between 0 and 100.\n\
         Example: {example}",
        placeholders = placeholders.join(","),
    )
}

/// A well-formed reply for `categories`, used as the in-prompt example.
fn example_reply(categories: &CategorySet) -> String {
    let n = categories.len();
    let scores: Vec<&str> = (0..n).map(|i| if i == 0 { "80" } else { "10" }).collect();
    // names() is never empty; CategorySet::new rejects an empty list.
    let first = categories.names().first().map(String::as_str).unwrap_or("folder");
    format!("{first},[{}]", scores.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::reply::parse_reply;

    fn cats() -> CategorySet {
        CategorySet::new(["MobileApp", "WebApp", "HardwareIOT"]).unwrap()
    }

    #[test]
    fn prompt_carries_text_and_category_order() {
        let p = classification_prompt("บทคัดย่อ a web portal", &cats());
        assert!(p.contains("บทคัดย่อ a web portal"));
        assert!(p.contains("['MobileApp', 'WebApp', 'HardwareIOT']"));
        assert!(p.contains("<foldername>,[score1,score2,score3]"));
    }

    #[test]
    fn in_prompt_example_parses() {
        let c = cats();
        let example = example_reply(&c);
        assert_eq!(example, "MobileApp,[80,10,10]");
        let (label, conf) = parse_reply(&example, c.len()).unwrap();
        assert_eq!(label, "MobileApp");
        assert_eq!(conf.values(), &[80, 10, 10]);
    }

    #[test]
    fn system_prompt_states_independent_scores() {
        assert!(CLASSIFICATION_SYSTEM_PROMPT.contains("do NOT need to sum to 100"));
    }
}
