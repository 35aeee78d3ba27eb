//! A conversational session: retrieve, answer, remember.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use newsrag_core::types::ChatTurn;
use newsrag_retrieval::RetrievalEngine;

use crate::answer::AnswerGenerator;
use crate::error::ChatError;
use crate::history::HistoryStore;

/// The outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    /// Number of retrieved articles available to the answer model.
    pub context_count: usize,
}

/// Answers questions against the retrieval engine and keeps a bounded,
/// persisted history. Calls are serialized so concurrent questions never
/// interleave their history updates.
pub struct ChatSession {
    engine: Arc<RetrievalEngine>,
    answerer: AnswerGenerator,
    history: HistoryStore,
    max_history_turns: usize,
    lock: Mutex<()>,
}

impl ChatSession {
    pub fn new(
        engine: Arc<RetrievalEngine>,
        answerer: AnswerGenerator,
        history: HistoryStore,
        max_history_turns: usize,
    ) -> Self {
        Self {
            engine,
            answerer,
            history,
            max_history_turns: max_history_turns.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    /// Answer `query` and record the turn.
    ///
    /// Retrieval failures degrade to an answer without context, and model
    /// failures are reported in the answer text; only history I/O fails the
    /// call.
    pub async fn ask(&self, query: &str) -> Result<ChatReply, ChatError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let _guard = self.lock.lock().await;
        let mut turns = self.history.load().await?;

        let context = match self.engine.retrieve_default(query).await {
            Ok(context) => context,
            Err(err) => {
                warn!(error = %err, "Retrieval failed, answering without context");
                Vec::new()
            }
        };

        let answer = match self.answerer.answer(query, &context, &turns).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(error = %err, "Answer generation failed");
                format!("[Error contacting model API: {}]", err)
            }
        };

        turns.push(ChatTurn::new(query, answer.clone()));
        if turns.len() > self.max_history_turns {
            let excess = turns.len() - self.max_history_turns;
            turns.drain(..excess);
        }
        self.history.save(&turns).await?;

        info!(context = context.len(), history = turns.len(), "Answered chat message");
        Ok(ChatReply {
            answer,
            context_count: context.len(),
        })
    }

    /// Stored turns, oldest first.
    pub async fn history(&self) -> Result<Vec<ChatTurn>, ChatError> {
        let _guard = self.lock.lock().await;
        self.history.load().await
    }

    /// Forget the conversation.
    pub async fn clear(&self) -> Result<(), ChatError> {
        let _guard = self.lock.lock().await;
        self.history.clear().await
    }
}
