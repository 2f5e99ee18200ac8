//! Orchestration around the sitewright core.
//!
//! [`Session`] owns the chat log, the version history and the live preview,
//! and drives one cancelable generation at a time through the pipeline
//! parse → enrich images → tag → extract → merge → (version + preview).
//! It is transport-agnostic: the completion backend is a
//! [`CompletionClient`], and [`PublishRegistry`] carries the publish and
//! public-preview endpoint semantics without any HTTP.
//!
//! A cancelled generation leaves the version history and the preview
//! exactly as they were, and removes its placeholder message.

use facet::Facet;
use futures::StreamExt;
use indexmap::IndexMap;
use sitewright::dom::Document;
use sitewright::extract::extract_document;
use sitewright::tag::tag_document;
use sitewright::{
    ChangeKind, EditablePolicy, FallbackImages, HtmlError, IdGenerator, ImageSource, ManualEdit,
    NewVersion, PreviewStore, Styles, Theme, VersionChanges, VersionStore, enrich_images,
    parse_generation_response,
};

mod tracing_macros;

pub mod chat;
pub mod context;
pub mod generation;
pub mod publish;

pub use chat::{ChatLog, ChatMessage, Role};
pub use context::{PromptMessage, SYSTEM_PROMPT, SiteContext, build_prompt};
pub use generation::{AbortHandle, CompletionClient, Generation, GenerationError, GenerationOutcome};
pub use publish::{PublicPreview, PublishError, PublishRegistry, PublishedSite};

use generation::InFlight;
use tracing_macros::{debug, warn};

/// Session options.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Instruction sent ahead of every prompt
    pub system_prompt: String,
    /// Placeholder shown while the first site is generated
    pub generating_text: String,
    /// Placeholder shown while an existing site is modified
    pub modifying_text: String,
    /// Characters of edited content quoted in a manual version's description
    pub description_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            generating_text: "Generating your website...".to_string(),
            modifying_text: "Modifying your website...".to_string(),
            description_limit: 50,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_description_limit(mut self, limit: usize) -> Self {
        self.description_limit = limit;
        self
    }
}

/// `Updated text "ID" to "CONTENT"`, with long content cut short.
pub fn manual_edit_description(id: &str, content: &str, limit: usize) -> String {
    let quoted = if content.chars().count() > limit {
        let cut: String = content.chars().take(limit).collect();
        format!("{cut}...")
    } else {
        content.to_owned()
    };
    format!("Updated text \"{id}\" to \"{quoted}\"")
}

/// One user's building session.
#[derive(Debug)]
pub struct Session<I: ImageSource = FallbackImages> {
    config: SessionConfig,
    chat: ChatLog,
    versions: VersionStore,
    preview: PreviewStore,
    images: I,
    in_flight: Option<InFlight>,
    generations: u64,
    error: Option<String>,
    manual_ids: IdGenerator,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_images(SessionConfig::default(), EditablePolicy::default(), FallbackImages)
    }
}

impl<I: ImageSource> Session<I> {
    pub fn with_images(config: SessionConfig, policy: EditablePolicy, images: I) -> Self {
        Self {
            config,
            chat: ChatLog::new(),
            versions: VersionStore::new(),
            preview: PreviewStore::with_policy(policy),
            images,
            in_flight: None,
            generations: 0,
            error: None,
            manual_ids: IdGenerator::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.chat.messages()
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn preview(&self) -> &PreviewStore {
        &self.preview
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The last visible failure, cleared when a new generation starts.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.preview.toggle_theme()
    }

    /// Manual edits the next prompt must respect: those recorded in the
    /// history since the latest AI version, overridden by the live map.
    fn edits_for_prompt(&self) -> IndexMap<String, String> {
        let mut edits: IndexMap<String, String> = self
            .versions
            .latest_non_manual_version()
            .map(|latest| {
                latest
                    .manual_edits
                    .into_iter()
                    .map(|edit| (edit.id, edit.content))
                    .collect()
            })
            .unwrap_or_default();
        for (id, entry) in self.preview.editable_elements() {
            edits.insert(id.clone(), entry.content.clone());
        }
        edits
    }

    /// Start a generation for `input`. Any generation already in flight is
    /// cancelled first.
    pub fn begin_generation(&mut self, input: &str) -> Generation {
        self.begin_generation_with(input, AbortHandle::new())
    }

    /// Like [`Self::begin_generation`], stopped through a handle the caller
    /// already holds.
    pub fn begin_generation_with(&mut self, input: &str, abort: AbortHandle) -> Generation {
        if self.in_flight.is_some() {
            debug!("new request supersedes the generation in flight");
            self.cancel_generation();
        }

        if let Some(latest) = self.versions.latest_non_manual_version() {
            let message_id = latest.version.message_id.clone();
            self.chat.remove_messages_after(&message_id);
        }

        let edits = self.edits_for_prompt();
        let has_site = !self.preview.html().trim().is_empty();
        let site = has_site.then(|| SiteContext {
            html: self.preview.html(),
            css: self.preview.css(),
            edits: &edits,
        });
        let prompt = build_prompt(&self.config.system_prompt, site, self.chat.messages(), input);

        self.chat.push(Role::User, input);
        let placeholder = if has_site {
            &self.config.modifying_text
        } else {
            &self.config.generating_text
        };
        let placeholder_id = self.chat.push(Role::Assistant, placeholder.clone());

        self.generations += 1;
        self.in_flight = Some(InFlight {
            id: self.generations,
            placeholder_id,
            buffer: String::new(),
            abort: abort.clone(),
        });
        self.error = None;
        debug!(generation = self.generations, "generation started");

        Generation {
            id: self.generations,
            prompt,
            abort,
        }
    }

    fn in_flight_for(&mut self, ticket: &Generation) -> Result<&mut InFlight, GenerationError> {
        match self.in_flight.as_mut() {
            Some(in_flight) if in_flight.id == ticket.id => Ok(in_flight),
            _ => Err(GenerationError::Stale { id: ticket.id }),
        }
    }

    /// Accumulate streamed text. Nothing is visible until completion.
    pub fn push_chunk(&mut self, ticket: &Generation, chunk: &str) -> Result<(), GenerationError> {
        self.in_flight_for(ticket)?.buffer.push_str(chunk);
        Ok(())
    }

    /// Abort the generation in flight and remove its placeholder. Silent:
    /// no error is recorded. Returns false when nothing was in flight.
    pub fn cancel_generation(&mut self) -> bool {
        let Some(in_flight) = self.in_flight.take() else {
            return false;
        };
        in_flight.abort.abort();
        self.chat.remove(&in_flight.placeholder_id);
        debug!(generation = in_flight.id, "generation cancelled");
        true
    }

    /// End the generation with a visible error in place of its placeholder.
    pub fn fail_generation(&mut self, ticket: &Generation, message: &str) -> Result<(), GenerationError> {
        self.in_flight_for(ticket)?;
        let error = GenerationError::Transport {
            message: message.to_owned(),
        };
        self.surface_error(&error);
        Ok(())
    }

    fn surface_error(&mut self, error: &GenerationError) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        self.chat.remove(&in_flight.placeholder_id);
        let text = format!("Error: {error}. Please try again.");
        warn!(generation = in_flight.id, %error, "generation failed");
        self.chat.push(Role::Assistant, text.clone());
        self.error = Some(text);
    }

    /// Turn the accumulated response into a new version and preview state.
    /// On failure both stores are left untouched and the error is shown as
    /// a chat message.
    pub fn complete_generation(
        &mut self,
        ticket: &Generation,
    ) -> Result<GenerationOutcome, GenerationError> {
        let raw = std::mem::take(&mut self.in_flight_for(ticket)?.buffer);
        match self.reconcile(&raw) {
            Ok((outcome, placeholder)) => {
                self.in_flight = None;
                self.chat.set_content(&placeholder, outcome.explanation.clone());
                debug!(version = %outcome.version_id, "generation completed");
                Ok(outcome)
            }
            Err(error) => {
                self.surface_error(&error);
                Err(error)
            }
        }
    }

    fn reconcile(&mut self, raw: &str) -> Result<(GenerationOutcome, String), GenerationError> {
        let placeholder = self
            .in_flight
            .as_ref()
            .map(|f| f.placeholder_id.clone())
            .unwrap_or_default();

        let response = parse_generation_response(raw).map_err(|e| {
            GenerationError::InvalidResponse {
                message: e.to_string(),
            }
        })?;
        let enriched = enrich_images(&response.html, &self.images);

        let policy = self.preview.policy().clone();
        let markup_error = |e: HtmlError| GenerationError::InvalidMarkup {
            message: e.to_string(),
        };
        let mut doc = Document::parse_strict(&enriched).map_err(markup_error)?;
        tag_document(&mut doc, &policy);
        let tagged = doc.to_html();

        let prepared = if response.is_new_website {
            self.preview.prepare_replacement(&tagged, &response.css)
        } else {
            self.preview
                .prepare_update(&tagged, &response.css)
                .map_err(markup_error)?
        };
        let editable = extract_document(&Document::parse(prepared.html()), &policy);
        let dropped_edits = prepared.dropped().to_vec();

        // nothing below can fail: version and preview change together
        let kind = if self.versions.is_empty() {
            ChangeKind::Initial
        } else {
            ChangeKind::Update
        };
        let version_id = self.versions.add_version(NewVersion {
            message_id: placeholder.clone(),
            html: prepared.html().to_owned(),
            css: prepared.css().to_owned(),
            changes: VersionChanges::generated(kind, response.explanation.clone()),
        });
        self.preview.commit(prepared);

        Ok((
            GenerationOutcome {
                version_id,
                explanation: response.explanation,
                editable,
                dropped_edits,
            },
            placeholder,
        ))
    }

    /// Drive `client` to completion for `input`.
    ///
    /// Calling [`AbortHandle::abort`] on `abort` stops the stream at once,
    /// even while it waits for the next chunk, and the generation ends as
    /// [`GenerationError::Cancelled`]. Dropping the returned future has the
    /// same effect on the session.
    pub async fn run_generation<C: CompletionClient>(
        &mut self,
        client: &C,
        input: &str,
        abort: &AbortHandle,
    ) -> Result<GenerationOutcome, GenerationError> {
        let ticket = self.begin_generation_with(input, abort.clone());
        let mut stream = client.stream(ticket.prompt()).take_until(abort.aborted());
        let mut guard = CancelOnDrop {
            session: self,
            id: ticket.id,
        };

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => guard.session.push_chunk(&ticket, &text)?,
                Err(message) => {
                    guard.session.fail_generation(&ticket, &message)?;
                    return Err(GenerationError::Transport { message });
                }
            }
        }

        if abort.is_aborted() {
            guard.session.cancel_generation();
            return Err(GenerationError::Cancelled);
        }
        guard.session.complete_generation(&ticket)
    }

    /// Record an in-preview edit: rewrite the live element and append a
    /// manual version. Returns the version id, or `None` when no element
    /// carries `id`.
    pub fn record_manual_edit(
        &mut self,
        id: &str,
        content: &str,
        styles: Option<Styles>,
    ) -> Result<Option<String>, HtmlError> {
        if !self.preview.update_element(id, content, styles)? {
            return Ok(None);
        }

        let message_id = self
            .versions
            .current_version()
            .map(|v| v.message_id.clone())
            .unwrap_or_else(|| self.manual_ids.next_id(12));
        let description = manual_edit_description(id, content, self.config.description_limit);
        let version_id = self.versions.add_version(NewVersion {
            message_id,
            html: self.preview.html().to_owned(),
            css: self.preview.css().to_owned(),
            changes: VersionChanges::manual(
                description,
                vec![ManualEdit {
                    id: id.to_owned(),
                    content: content.to_owned(),
                }],
            ),
        });
        Ok(Some(version_id))
    }

    /// Go back to the site as it was when `message_id` was answered.
    /// Returns false when no version belongs to that message.
    pub fn revert_to_message(&mut self, message_id: &str) -> bool {
        let Some(version_id) = self
            .versions
            .find_by_message_id(message_id)
            .map(|v| v.id.clone())
        else {
            return false;
        };
        if self.in_flight.is_some() {
            self.cancel_generation();
        }
        self.chat.remove_messages_after(message_id);
        self.preview.revert_to_version(&mut self.versions, &version_id)
    }

    /// Publish the live preview.
    pub fn publish(&self, registry: &mut PublishRegistry) -> Result<String, PublishError> {
        registry.publish(
            self.preview.html(),
            self.preview.css(),
            self.versions.current_version_id(),
        )
    }
}

/// Cancels generation `id` if it is still in flight when dropped, so an
/// abandoned [`Session::run_generation`] future leaves no placeholder behind.
struct CancelOnDrop<'a, I: ImageSource> {
    session: &'a mut Session<I>,
    id: u64,
}

impl<I: ImageSource> Drop for CancelOnDrop<'_, I> {
    fn drop(&mut self) {
        if self
            .session
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.id == self.id)
        {
            debug!(generation = self.id, "generation abandoned");
            self.session.cancel_generation();
        }
    }
}
