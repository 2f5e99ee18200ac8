//! Prompt construction for the completion backend.

use facet::Facet;
use indexmap::IndexMap;

use crate::chat::{ChatMessage, Role};

/// Default instruction sent ahead of every conversation.
pub const SYSTEM_PROMPT: &str = r#"You are a website builder that creates and modifies modern websites styled with Tailwind CSS utility classes.

Rules:
1. Create a fresh website only for the first request or when explicitly asked; otherwise modify the existing one.
2. Keep the current structure and change only what the user asks for.
3. Use Tailwind classes for all styling and semantic HTML for structure.
4. For photos, emit <unsplash-image query="search terms" alt="description" /> exactly in that shape.
5. Respond only with one JSON object:
{"html": "<complete HTML>", "css": "", "explanation": "what was created or changed", "isNewWebsite": false}"#;

/// One message of the prompt sent to the backend.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The site as the model should see it.
#[derive(Debug, Clone, Copy)]
pub struct SiteContext<'a> {
    pub html: &'a str,
    pub css: &'a str,
    /// Identifier → content the model must keep
    pub edits: &'a IndexMap<String, String>,
}

fn context_block(site: &SiteContext<'_>) -> String {
    let mut block = format!(
        "Current website state:\nHTML:\n{}\n\nCSS:\n{}\n",
        site.html, site.css
    );
    if !site.edits.is_empty() {
        block.push_str(
            "\nThe user edited these elements by hand. Keep their content and styling exactly as they are:\n",
        );
        for (id, content) in site.edits {
            block.push_str(&format!("data-editable-id=\"{id}\": \"{content}\"\n"));
        }
    }
    block.push_str(
        "\nPlease modify the above website based on the user's request. Only create a new website if explicitly asked.",
    );
    block
}

/// System instruction, then the current site (if any), then the history,
/// then the new user message.
pub fn build_prompt(
    system: &str,
    site: Option<SiteContext<'_>>,
    history: &[ChatMessage],
    user_input: &str,
) -> Vec<PromptMessage> {
    let mut prompt = Vec::with_capacity(history.len() + 3);
    prompt.push(PromptMessage::new(Role::System, system));
    if let Some(site) = site.filter(|site| !site.html.trim().is_empty()) {
        prompt.push(PromptMessage::new(Role::System, context_block(&site)));
    }
    prompt.extend(
        history
            .iter()
            .map(|m| PromptMessage::new(m.role, m.content.clone())),
    );
    prompt.push(PromptMessage::new(Role::User, user_input));
    prompt
}
