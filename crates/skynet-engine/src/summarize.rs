use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use skynet_core::config::SummarySettings;
use skynet_core::traits::{ChatTurn, DocumentDigest, Summarizer};
use skynet_core::{Error, Result, Role};
use skynet_embed::{api_key_from_env, ApiClient};

pub fn role_prompt(role: Role) -> &'static str {
    match role {
        Role::Researcher => {
            "You are a scientific research assistant. Summarize focusing on methods, datasets, key numerical results, and open research gaps."
        }
        Role::FundingManager => {
            "You are a funding analyst. Summarize focusing on impact, applications, scalability, collaborators, and any explicit funding needs."
        }
        Role::Student => "You are explaining to a student. Give simple takeaways, what was done, and why it matters.",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self { Self { role: role.to_string(), content: content.into() } }
}

/// `[section] text` blocks of one document, blank-line separated.
pub fn excerpt_text(digest: &DocumentDigest) -> String {
    digest.excerpts.iter().map(|(section, text)| format!("[{section}] {text}")).collect::<Vec<_>>().join("\n\n")
}

pub fn document_messages(role: Role, digest: &DocumentDigest) -> Vec<Message> {
    let system = role_prompt(role);
    let prompt = format!(
        "{system}\n\nSummarize the following extracted text from a single paper into 3-6 concise bullet points. \
         Keep it factual, include any explicit funding/grant strings if present.\n\nTITLE: {}\n\nTEXT:\n{}",
        digest.title,
        excerpt_text(digest)
    );
    vec![Message::new("system", system), Message::new("user", prompt)]
}

/// Consolidation request. Prior conversation turns sit between the system
/// prompt and the new request.
pub fn consolidation_messages(role: Role, query: &str, summaries: &[String], digests: &[DocumentDigest], history: &[ChatTurn]) -> Vec<Message> {
    let system = role_prompt(role);
    let sources = digests.iter().map(|d| format!("- {} ({})", d.title, d.url)).collect::<Vec<_>>().join("\n");
    let prompt = format!(
        "{system}\n\nThe user asked: \"{query}\".\nThe following are short summaries from relevant papers. Produce a single, \
         structured summary tailored to the role ({role}). Include: 1) 5-8 key takeaways, 2) suggested next research steps \
         or funding recommendations (if Funding Manager), and 3) top source titles and links (2-3). Be concise.\n\n\
         SOURCES:\n{sources}\n\nSOURCE SUMMARIES:\n{}",
        summaries.join("\n\n")
    );

    let mut messages = vec![Message::new("system", system)];
    messages.extend(history.iter().map(|t| Message::new(&t.role, t.content.clone())));
    messages.push(Message::new("user", prompt));
    messages
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Two-stage summarizer over an OpenAI-compatible chat completions endpoint:
/// one bullet summary per document, then a role-tailored consolidation.
pub struct OpenAiSummarizer {
    api: ApiClient,
    model: String,
    temperature: f32,
    per_doc_max_tokens: u32,
    final_max_tokens: u32,
}

impl OpenAiSummarizer {
    pub fn from_settings(settings: &SummarySettings) -> Result<Self> {
        let api_key = api_key_from_env(&settings.api_key_env)?;
        let api = ApiClient::new(&settings.base_url, &api_key, Duration::from_secs(settings.timeout_secs), settings.max_retries)?;
        Ok(Self {
            api,
            model: settings.model.clone(),
            temperature: settings.temperature,
            per_doc_max_tokens: settings.per_doc_max_tokens,
            final_max_tokens: settings.final_max_tokens,
        })
    }

    fn chat(&self, messages: &[Message], max_tokens: u32) -> Result<String> {
        let request = ChatRequest { model: &self.model, messages, temperature: self.temperature, max_tokens };
        let response: ChatResponse = self.api.post("/chat/completions", &request)?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| Error::ExternalDependency("chat completion returned no content".into()))
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, role: Role, query: &str, digests: &[DocumentDigest], history: &[ChatTurn]) -> Result<String> {
        info!(role = %role, documents = digests.len(), "generating summary");
        let mut summaries = Vec::with_capacity(digests.len());
        for digest in digests {
            debug!(pmcid = %digest.pmcid, "summarizing document");
            summaries.push(self.chat(&document_messages(role, digest), self.per_doc_max_tokens)?);
        }
        self.chat(&consolidation_messages(role, query, &summaries, digests, history), self.final_max_tokens)
    }
}
