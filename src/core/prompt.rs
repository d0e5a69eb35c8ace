//! Instruction preamble and canned utterances

use std::collections::HashMap;

use super::call_store::CallContext;

const BASE_INSTRUCTIONS: &str = "You are a helpful voice assistant on a phone call. \
Keep replies short and conversational, one or two sentences, with no lists or markdown.";

fn param<'a>(params: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

/// Build the system preamble from the call's parameters and looked-up context.
///
/// Each persona attribute, the document-grounding instruction and the
/// customer name are included only when present.
pub fn build_instruction_preamble(
    params: &HashMap<String, String>,
    context: &CallContext,
) -> String {
    let mut lines = vec![BASE_INSTRUCTIONS.to_string()];

    if let Some(name) = param(params, &["persona_name"]) {
        lines.push(format!("Your name is {name}."));
    }
    if let Some(age) = param(params, &["persona_age"]) {
        lines.push(format!("You are {age} years old."));
    }
    if let Some(gender) = param(params, &["persona_gender"]) {
        lines.push(format!("Your gender is {gender}."));
    }
    if let Some(city) = param(params, &["persona_city"]) {
        lines.push(format!("You live in {city}."));
    }
    if let Some(tone) = param(params, &["persona_tone"]) {
        lines.push(format!("Speak in a {tone} tone."));
    }
    if let Some(language) = param(params, &["persona_language", "language"]) {
        lines.push(format!("Always reply in {language}."));
    }

    let has_documents = param(params, &["document_id", "document_ids", "knowledge_base_id"]).is_some();
    match context.rag_context.as_deref().map(str::trim) {
        Some(snippets) if !snippets.is_empty() => {
            lines.push(
                "Answer using only the reference material below. If it does not cover the \
                 question, say you will check and follow up."
                    .to_string(),
            );
            lines.push(format!("Reference material:\n{snippets}"));
        }
        _ if has_documents => lines.push(
            "Ground your answers in the documents provided for this campaign and do not \
             invent facts."
                .to_string(),
        ),
        _ => {}
    }

    if let Some(customer) = param(params, &["customer_name", "name"]) {
        lines.push(format!("You are speaking with {customer}. Address them by name."));
    }

    lines.join("\n")
}

/// Text spoken when the call starts
pub fn greeting_text(params: &HashMap<String, String>, default_greeting: Option<&str>) -> String {
    if let Some(greeting) = param(params, &["greeting", "greeting_message"]) {
        return greeting.to_string();
    }
    match (param(params, &["persona_name"]), param(params, &["customer_name", "name"])) {
        (Some(persona), Some(customer)) => {
            format!("Hello {customer}, this is {persona}. How can I help you today?")
        }
        (Some(persona), None) => format!("Hello, this is {persona}. How can I help you today?"),
        _ => default_greeting
            .filter(|g| !g.trim().is_empty())
            .unwrap_or("Hello! How can I help you today?")
            .to_string(),
    }
}

/// Deterministic reply used when generation fails or returns nothing
pub fn fallback_response(user_text: &str) -> String {
    format!("I heard you say: \"{}\". Could you tell me a little more?", user_text.trim())
}
