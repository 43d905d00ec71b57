// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream 5: the Responder.
//!
//! Wraps the Coordinator's ContextBundle in persona, generates the reply,
//! emits it through the transport, and loops the generated message back
//! into ingestion so the agent's own words are persisted symmetrically.
//! Total generation failure for a message that reached this stream yields
//! the terse apology; only NOBODY/SKIP verdicts may be dropped silently.

use std::sync::Arc;

use potik_bus::QueueSender;
use potik_core::traits::{LlmRequest, Transport};
use potik_core::types::{
    epoch_now, ChatKind, ContextBundle, EventSource, IngestEvent, TaskStatus,
};
use potik_core::PotikError;
use potik_graph::GraphStore;
use potik_prompt::PromptAssembler;
use potik_switchboard::Switchboard;
use tracing::{info, warn};

/// Recent messages included as conversational grounding.
const REPLY_CONTEXT: usize = 10;

/// The terse apology for total generation failure.
const APOLOGY: &str = "Вибач, щось пішло не так — не можу зараз відповісти.";

/// Stream 5 worker: persona-layered reply generation and emission.
pub struct Responder {
    store: Arc<dyn GraphStore>,
    switchboard: Arc<Switchboard>,
    assembler: Arc<PromptAssembler>,
    transport: Arc<dyn Transport>,
    ingestion: QueueSender<IngestEvent>,
    agent_telegram_id: i64,
}

impl Responder {
    pub fn new(
        store: Arc<dyn GraphStore>,
        switchboard: Arc<Switchboard>,
        assembler: Arc<PromptAssembler>,
        transport: Arc<dyn Transport>,
        ingestion: QueueSender<IngestEvent>,
        agent_telegram_id: i64,
    ) -> Self {
        Self {
            store,
            switchboard,
            assembler,
            transport,
            ingestion,
            agent_telegram_id,
        }
    }

    /// Generate and emit the reply for one bundle.
    pub async fn handle(&self, bundle: ContextBundle) {
        let chat_id = bundle.snapshot.chat_id;

        let text = match self.compose(&bundle).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => {
                // Anything that reached this stream deserves at least the
                // apology; silent drops stopped at the Gatekeeper.
                warn!(uid = %bundle.snapshot.msg_uid, "reply generation failed, sending apology");
                APOLOGY.to_string()
            }
        };

        let message_id = match self.transport.send_message(chat_id, &text).await {
            Ok(message_id) => message_id,
            Err(e) => {
                warn!(chat_id, error = %e, "transport send failed");
                return;
            }
        };
        info!(chat_id, message_id, "reply emitted");

        // Feedback loop: the agent's own message enters ingestion so the
        // history stays symmetric.
        let loopback = IngestEvent {
            chat_id,
            message_id,
            source: EventSource::Agent,
            sender_id: self.agent_telegram_id,
            sender_name: None,
            chat_kind: ChatKind::Group,
            text,
            timestamp: epoch_now(),
            media: None,
        };
        if let Err(e) = self.ingestion.send(loopback).await {
            warn!(chat_id, error = %e, "failed to loop reply back into ingestion");
        }
    }

    async fn compose(&self, bundle: &ContextBundle) -> Result<String, PotikError> {
        let system = self.assembler.assemble("Responder", Some("ComposeReply")).await?;

        let context = self
            .store
            .chat_context(bundle.snapshot.chat_id, REPLY_CONTEXT)
            .await
            .unwrap_or_default();
        let history: String = context
            .iter()
            .map(|line| format!("[{}] {}: {}\n", line.time, line.author, line.text))
            .collect();

        let mut grounding = String::new();
        if let Some(narrative) = &bundle.snapshot.narrative {
            grounding.push_str(&format!("Наратив ситуації: {narrative}\n"));
        }
        for output in &bundle.outputs {
            match output.status {
                TaskStatus::Done if !output.output.is_empty() => {
                    grounding.push_str(&format!(
                        "[ЗНАЙДЕНО В БАЗІ ЗНАНЬ ({})]:\n{}\n",
                        output.action, output.output
                    ));
                }
                TaskStatus::TimedOut | TaskStatus::Failed | TaskStatus::Rejected => {
                    grounding.push_str(&format!(
                        "Інструмент {} не дав результату.\n",
                        output.action
                    ));
                }
                _ => {}
            }
        }

        let wants_apology = bundle
            .snapshot
            .tasks
            .iter()
            .any(|t| t.args.get("style").and_then(|v| v.as_str()) == Some("apology"));
        let style_note = if wants_apology {
            "\nВідповідь має бути коротким вибаченням: щось пішло не так."
        } else {
            ""
        };

        // Tool results and narrative ride below the persona prompt, the way
        // the assembler contract defines runtime context.
        let system = PromptAssembler::with_context(&system, grounding.trim());

        let user_prompt = format!(
            "Історія чату:\n{history}\nТон відповіді: {tone}.{style_note}\n\n\
             Повідомлення, на яке відповідаєш:\n{trigger}\n\nТвоя відповідь:",
            tone = bundle.snapshot.gate.tone_hint,
            trigger = bundle.snapshot.trigger_text,
        );

        let reply = self
            .switchboard
            .call(&LlmRequest::prompt(Some(system), user_prompt))
            .await?;
        Ok(reply.content.trim().to_string())
    }
}
