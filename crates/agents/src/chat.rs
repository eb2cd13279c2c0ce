//! Chat Agent - Answers questions within a conversation

use crate::prompt::{build_chat_prompt, build_general_prompt, QueryProfile};
use crate::retrieval::{RagDigest, RetrievalAgent};
use crate::{LanguageModel, Result};
use medibot_core::ChatSession;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Messages of history, the new question included, shown to the model
pub const CONTEXT_MESSAGES: usize = 4;

/// Separates the model's answer from the retrieved passages
pub const SOURCES_HEADER: &str = "\n\n📚 **Additional Research & Sources:**\n";

/// One answered question
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The model's answer alone
    pub answer: String,
    /// What was stored in the session: the answer plus any sources
    pub final_text: String,
    pub digest: Option<RagDigest>,
}

impl ChatReply {
    fn new(answer: String, digest: Option<RagDigest>) -> Self {
        let final_text = match &digest {
            Some(digest) => format!("{}{}{}", answer, SOURCES_HEADER, digest),
            None => answer.clone(),
        };
        Self {
            answer,
            final_text,
            digest,
        }
    }

    /// Text appended after the streamed answer, if any
    pub fn sources_suffix(&self) -> &str {
        &self.final_text[self.answer.len()..]
    }
}

/// The Chat agent handles conversational questions
pub struct ChatAgent {
    model: Arc<dyn LanguageModel>,
    retrieval: Option<RetrievalAgent>,
}

impl ChatAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            retrieval: None,
        }
    }

    /// Builder: look up supporting passages when sources are requested
    pub fn with_retrieval(mut self, retrieval: RetrievalAgent) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    /// Answer `question` and record both turns in `session`
    pub async fn respond(
        &self,
        session: &mut ChatSession,
        question: &str,
        show_sources: bool,
    ) -> Result<ChatReply> {
        self.respond_inner(session, question, show_sources, None)
            .await
    }

    /// Like `respond`, handing answer text to `on_text` as it streams in
    pub async fn respond_streaming(
        &self,
        session: &mut ChatSession,
        question: &str,
        show_sources: bool,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<ChatReply> {
        self.respond_inner(session, question, show_sources, Some(on_text))
            .await
    }

    #[instrument(skip(self, session, on_text), fields(model = self.model.name()))]
    async fn respond_inner(
        &self,
        session: &mut ChatSession,
        question: &str,
        show_sources: bool,
        on_text: Option<&mut (dyn for<'a> FnMut(&'a str) + Send)>,
    ) -> Result<ChatReply> {
        session.push_user(question);

        let context = session.context_transcript(CONTEXT_MESSAGES);
        let profile = QueryProfile::analyze(question);
        debug!(?profile, "Analyzed question");
        let prompt = build_chat_prompt(&context, question, &profile);

        let generated = match on_text {
            Some(on_text) => self.model.generate_stream(&prompt, on_text).await,
            None => self.model.generate(&prompt).await,
        };
        let answer = match generated {
            Ok(answer) => answer,
            Err(e) => {
                // Leave the session as it was before the question
                session.messages.pop();
                return Err(e);
            }
        };

        let digest = if show_sources {
            self.sources_for(question).await
        } else {
            None
        };

        let reply = ChatReply::new(answer, digest);
        session.push_assistant(reply.final_text.clone());

        debug!("Answered question ({} chars)", reply.final_text.len());
        Ok(reply)
    }

    /// Retrieval is best effort; failures are logged and dropped
    async fn sources_for(&self, question: &str) -> Option<RagDigest> {
        let retrieval = self.retrieval.as_ref()?;
        match retrieval.digest(question).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Retrieval failed: {}", e);
                None
            }
        }
    }

    /// Answer a standalone question with no conversation
    #[instrument(skip(self))]
    pub async fn general_answer(&self, question: &str, show_sources: bool) -> Result<ChatReply> {
        let answer = self.model.generate(&build_general_prompt(question)).await?;
        let digest = if show_sources {
            self.sources_for(question).await
        } else {
            None
        };
        Ok(ChatReply::new(answer, digest))
    }
}
