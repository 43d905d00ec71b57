// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `GraphStore` implementation against a FalkorDB-style endpoint.
//!
//! All writes are single Cypher statements (one graph transaction each);
//! the LAST_EVENT repoint additionally runs under a striped per-chat lock so
//! two persists for the same chat cannot both read the old list head.
//! Message text and every user-supplied string is escaped before being
//! embedded into a statement.

use async_trait::async_trait;
use potik_core::types::{AnalystSnapshot, Enrichment, EventSource, IngestEvent, MessageUid};
use potik_core::PotikError;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::GraphClient;
use crate::locks::ChatLocks;
use crate::schema::PRIMARY_CONSTRAINTS;
use crate::store::{
    ContextLine, GraphStore, PromptAtom, PromptSeed, StoredMessage, TopicInfo,
};
use crate::value::{as_f64, as_i64, as_str, escape};

/// Graph store over two logical graphs on one endpoint.
pub struct FalkorStore {
    client: GraphClient,
    primary: String,
    thoughtlog: String,
    agent_telegram_id: i64,
    agent_name: String,
    locks: ChatLocks,
}

impl FalkorStore {
    pub fn new(
        client: GraphClient,
        primary: impl Into<String>,
        thoughtlog: impl Into<String>,
        agent_telegram_id: i64,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            primary: primary.into(),
            thoughtlog: thoughtlog.into(),
            agent_telegram_id,
            agent_name: agent_name.into(),
            locks: ChatLocks::default(),
        }
    }

    /// Next per-day human label for the author, `{ABBREV}{SEQ:02}`.
    async fn next_message_name(&self, event: &IngestEvent) -> String {
        let author_name = match event.source {
            EventSource::Agent => self.agent_name.clone(),
            EventSource::User => event.sender_name.clone().unwrap_or_default(),
        };
        let abbrev = author_abbrev(&author_name);

        let count_query = format!(
            "MATCH (d:Day {{date: '{day}'}}) \
             MATCH (m:Message)-[:HAPPENED_AT]->(d) \
             MATCH (author)-[:AUTHORED|GENERATED]->(m) \
             WHERE author.telegram_id = {sender} \
             RETURN count(m)",
            day = event.day(),
            sender = event.sender_id,
        );

        let count = match self.client.query(&self.primary, &count_query).await {
            Ok(reply) => reply.scalar().map(as_i64).unwrap_or(0),
            Err(e) => {
                debug!(error = %e, "message naming count failed, starting at 0");
                0
            }
        };

        format!("{abbrev}{:02}", count + 1)
    }
}

#[async_trait]
impl GraphStore for FalkorStore {
    async fn ping(&self) -> Result<(), PotikError> {
        self.client.ping().await?;
        self.client.query(&self.primary, "RETURN 1").await?;
        self.client.query(&self.thoughtlog, "RETURN 1").await?;
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), PotikError> {
        for (label, property) in PRIMARY_CONSTRAINTS {
            self.client
                .ensure_unique_constraint(&self.primary, label, property)
                .await?;
        }
        Ok(())
    }

    async fn persist_event(&self, event: &IngestEvent) -> Result<MessageUid, PotikError> {
        let uid = event.uid();

        // Fast idempotence probe outside the lock.
        if self.message_exists(&uid).await? {
            debug!(%uid, "persist skipped: uid already present");
            return Ok(uid);
        }

        let _chat_guard = self.locks.lock(event.chat_id).await;

        // Re-check under the lock: a concurrent redelivery may have won.
        if self.message_exists(&uid).await? {
            return Ok(uid);
        }

        let node_name = self.next_message_name(event).await;
        let query = persist_query(event, &node_name, self.agent_telegram_id, &self.agent_name);
        self.client.query_with_retry(&self.primary, &query).await?;

        info!(%uid, name = node_name.as_str(), source = %event.source, "persisted message");
        Ok(uid)
    }

    async fn apply_enrichment(&self, enrichment: &Enrichment) -> Result<(), PotikError> {
        for query in enrichment_queries(enrichment) {
            self.client.query(&self.primary, &query).await?;
        }
        debug!(
            uid = %enrichment.msg_uid,
            topics = enrichment.topics.len(),
            entities = enrichment.entities.len(),
            "enrichment applied"
        );
        Ok(())
    }

    async fn chat_context(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<ContextLine>, PotikError> {
        let query = format!(
            "MATCH (m:Message)-[:HAPPENED_IN]->(c:Chat {{chat_id: {chat_id}}}) \
             MATCH (author)-[:AUTHORED|GENERATED]->(m) \
             OPTIONAL MATCH (m)-[h:HAPPENED_AT]->(:Day) \
             RETURN author.name, m.text, h.time, m.created_at \
             ORDER BY m.created_at DESC \
             LIMIT {limit}"
        );
        let reply = self.client.query(&self.primary, &query).await?;

        let mut lines: Vec<ContextLine> = reply
            .rows
            .iter()
            .map(|row| ContextLine {
                author: row.first().map(as_str).unwrap_or_default(),
                text: row.get(1).map(as_str).unwrap_or_default(),
                time: row.get(2).map(as_str).unwrap_or_default(),
                created_at: row.get(3).map(as_f64).unwrap_or(0.0),
            })
            .collect();

        // Oldest first for prompt building.
        lines.reverse();
        Ok(lines)
    }

    async fn active_topics(&self) -> Result<Vec<TopicInfo>, PotikError> {
        let reply = self
            .client
            .query(
                &self.primary,
                "MATCH (t:Topic {status: 'active'}) RETURN t.title, t.description ORDER BY t.title",
            )
            .await?;
        Ok(reply
            .rows
            .iter()
            .map(|row| TopicInfo {
                title: row.first().map(as_str).unwrap_or_default(),
                description: row.get(1).map(as_str).unwrap_or_default(),
            })
            .collect())
    }

    async fn entity_kinds(&self) -> Result<Vec<String>, PotikError> {
        let reply = self
            .client
            .query(&self.primary, "MATCH (e:Entity) RETURN DISTINCT e.type")
            .await?;
        Ok(reply
            .rows
            .iter()
            .filter_map(|row| row.first().map(as_str))
            .filter(|kind| !kind.is_empty())
            .collect())
    }

    async fn message_exists(&self, uid: &MessageUid) -> Result<bool, PotikError> {
        let query = format!(
            "MATCH (m:Message {{uid: '{}'}}) RETURN m.uid",
            escape(&uid.0)
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(!reply.rows.is_empty())
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<StoredMessage>, PotikError> {
        let query = format!(
            "MATCH (m:Message)-[:HAPPENED_IN]->(c:Chat) \
             RETURN m.uid, c.chat_id, m.message_id, m.text, m.created_at \
             ORDER BY m.created_at DESC \
             LIMIT {limit}"
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(reply
            .rows
            .iter()
            .map(|row| StoredMessage {
                uid: MessageUid(row.first().map(as_str).unwrap_or_default()),
                chat_id: row.get(1).map(as_i64).unwrap_or(0),
                message_id: row.get(2).map(as_i64).unwrap_or(0),
                text: row.get(3).map(as_str).unwrap_or_default(),
                created_at: row.get(4).map(as_f64).unwrap_or(0.0),
            })
            .collect())
    }

    async fn save_thought_snapshot(
        &self,
        uid: &MessageUid,
        narrative: &str,
        model: &str,
    ) -> Result<String, PotikError> {
        let snapshot_id = format!("snap_narrative_{}", short_id());
        let query = format!(
            "MATCH (m:Message {{uid: '{uid}'}}) \
             MERGE (a:Agent {{telegram_id: {agent}}}) \
             ON CREATE SET a.id = 'agent_{agent}', a.name = '{agent_name}' \
             CREATE (s:ThoughtSnapshot {{id: '{id}', narrative: '{narrative}', \
             model: '{model}', timestamp: {ts}}}) \
             CREATE (m)-[:TRIGGERED]->(s) \
             CREATE (a)-[:THOUGHT]->(s) \
             RETURN s.id",
            uid = escape(&uid.0),
            agent = self.agent_telegram_id,
            agent_name = escape(&self.agent_name),
            id = snapshot_id,
            narrative = escape(narrative),
            model = escape(model),
            ts = potik_core::types::epoch_now(),
        );
        self.client.query(&self.primary, &query).await?;
        Ok(snapshot_id)
    }

    async fn save_plan_snapshot(
        &self,
        narrative_id: Option<&str>,
        snapshot: &AnalystSnapshot,
    ) -> Result<String, PotikError> {
        let snapshot_id = format!("snap_plan_{}", short_id());
        let tasks_json = serde_json::to_string(&snapshot.tasks)
            .map_err(|e| PotikError::Internal(format!("plan serialization failed: {e}")))?;

        let create = format!(
            "CREATE (p:PlanSnapshot {{id: '{id}', intent: '{intent}', \
             tasks: '{tasks}', created_at: {ts}}}) RETURN p.id",
            id = snapshot_id,
            intent = snapshot.intent,
            tasks = escape(&tasks_json),
            ts = snapshot.created_at,
        );

        let query = match narrative_id {
            Some(narrative_id) => format!(
                "MATCH (n:ThoughtSnapshot {{id: '{nid}'}}) \
                 CREATE (p:PlanSnapshot {{id: '{id}', intent: '{intent}', \
                 tasks: '{tasks}', created_at: {ts}}}) \
                 CREATE (n)-[:LED_TO]->(p) RETURN p.id",
                nid = escape(narrative_id),
                id = snapshot_id,
                intent = snapshot.intent,
                tasks = escape(&tasks_json),
                ts = snapshot.created_at,
            ),
            None => create,
        };

        self.client.query(&self.primary, &query).await?;
        Ok(snapshot_id)
    }

    async fn save_execution_snapshot(
        &self,
        plan_id: &str,
        summary: &str,
    ) -> Result<String, PotikError> {
        let snapshot_id = format!("snap_exec_{}", short_id());
        let query = format!(
            "MATCH (p:PlanSnapshot {{id: '{plan}'}}) \
             CREATE (e:ExecutionSnapshot {{id: '{id}', context: '{summary}', \
             created_at: {ts}}}) \
             CREATE (p)-[:LED_TO]->(e) RETURN e.id",
            plan = escape(plan_id),
            id = snapshot_id,
            summary = escape(summary),
            ts = potik_core::types::epoch_now(),
        );
        self.client.query(&self.primary, &query).await?;
        Ok(snapshot_id)
    }

    async fn log_thought(
        &self,
        prompt: &str,
        response: &str,
        model: &str,
    ) -> Result<(), PotikError> {
        let query = format!(
            "CREATE (:LogEntry {{id: 'log_{id}', timestamp: {ts}, \
             prompt: '{prompt}', response: '{response}', model: '{model}'}})",
            id = short_id(),
            ts = potik_core::types::epoch_now(),
            prompt = escape(prompt),
            response = escape(response),
            model = escape(model),
        );
        self.client.query(&self.thoughtlog, &query).await?;
        Ok(())
    }

    async fn recent_thoughts(&self, limit: usize) -> Result<Vec<String>, PotikError> {
        let query = format!(
            "MATCH (l:LogEntry) RETURN l.response ORDER BY l.timestamp DESC LIMIT {limit}"
        );
        let reply = self.client.query(&self.thoughtlog, &query).await?;
        Ok(reply
            .rows
            .iter()
            .filter_map(|row| row.first().map(as_str))
            .collect())
    }

    async fn log_system_event(
        &self,
        kind: &str,
        source: &str,
        severity: &str,
        details: &str,
    ) -> Result<(), PotikError> {
        let query = format!(
            "CREATE (:SystemEvent {{id: 'sys_{id}', type: '{kind}', source: '{source}', \
             severity: '{severity}', details: '{details}', created_at: {ts}}})",
            id = short_id(),
            kind = escape(kind),
            source = escape(source),
            severity = escape(severity),
            details = escape(details),
            ts = potik_core::types::epoch_now(),
        );
        self.client.query(&self.primary, &query).await?;
        Ok(())
    }

    async fn set_working_on(&self, task_label: &str) -> Result<(), PotikError> {
        // The newer intent supersedes: drop any prior lock edge and node.
        self.clear_working_on().await?;
        let query = format!(
            "MERGE (a:Agent {{telegram_id: {agent}}}) \
             ON CREATE SET a.id = 'agent_{agent}', a.name = '{name}' \
             CREATE (a)-[:WORKING_ON]->(:Task {{name: 'working_{id}', \
             description: '{label}', created_at: {ts}}})",
            agent = self.agent_telegram_id,
            name = escape(&self.agent_name),
            id = short_id(),
            label = escape(task_label),
            ts = potik_core::types::epoch_now(),
        );
        self.client.query(&self.primary, &query).await?;
        Ok(())
    }

    async fn clear_working_on(&self) -> Result<(), PotikError> {
        let query = format!(
            "MATCH (:Agent {{telegram_id: {agent}}})-[:WORKING_ON]->(t:Task) \
             DETACH DELETE t",
            agent = self.agent_telegram_id,
        );
        self.client.query(&self.primary, &query).await?;
        Ok(())
    }

    async fn newer_message_in_chat(
        &self,
        chat_id: i64,
        since_epoch: f64,
    ) -> Result<bool, PotikError> {
        let query = format!(
            "MATCH (:User)-[:AUTHORED]->(m:Message)-[:HAPPENED_IN]->(:Chat {{chat_id: {chat_id}}}) \
             WHERE m.created_at >= {since_epoch} \
             RETURN count(m)"
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(reply.scalar().map(as_i64).unwrap_or(0) > 0)
    }

    async fn user_profile(&self, name: &str) -> Result<String, PotikError> {
        let query = format!(
            "MATCH (u:User) WHERE toLower(u.name) CONTAINS '{needle}' \
             OPTIONAL MATCH (u)-[:AUTHORED]->(m:Message) \
             RETURN u.name, u.telegram_id, count(m) \
             LIMIT 1",
            needle = escape(&name.trim().to_lowercase()),
        );
        let reply = self.client.query(&self.primary, &query).await?;
        match reply.rows.first() {
            Some(row) => Ok(format!(
                "{} (telegram_id {}), {} повідомлень у графі",
                row.first().map(as_str).unwrap_or_default(),
                row.get(1).map(as_i64).unwrap_or(0),
                row.get(2).map(as_i64).unwrap_or(0),
            )),
            None => Ok(format!("Користувача '{name}' не знайдено у графі")),
        }
    }

    async fn remember_fact(&self, fact: &str) -> Result<(), PotikError> {
        // Key by a bounded prefix; char-wise so Cyrillic text never splits.
        let name: String = normalize_title(fact).chars().take(80).collect();
        let query = format!(
            "MERGE (e:Entity {{name: '{name}'}}) \
             ON CREATE SET e.type = 'Concept', e.description = '{fact}'",
            name = escape(&name),
            fact = escape(fact),
        );
        self.client.query(&self.primary, &query).await?;
        Ok(())
    }

    async fn run_readonly(&self, cypher: &str) -> Result<Vec<serde_json::Value>, PotikError> {
        let reply = self.client.ro_query(&self.primary, cypher).await?;
        Ok(reply.objects())
    }

    async fn prompt_role(&self, role: &str) -> Result<Option<PromptAtom>, PotikError> {
        let query = format!(
            "MATCH (r:Role {{name: '{role}'}}) RETURN r.name, r.description",
            role = escape(role),
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(reply.rows.first().map(|row| PromptAtom {
            name: row.first().map(as_str).unwrap_or_default(),
            content: row.get(1).map(as_str).unwrap_or_default(),
        }))
    }

    async fn prompt_tasks(&self, role: &str) -> Result<Vec<PromptAtom>, PotikError> {
        let query = format!(
            "MATCH (:Role {{name: '{role}'}})-[:RESPONSIBLE_FOR]->(t:Task) \
             RETURN t.name, t.description ORDER BY t.name",
            role = escape(role),
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(rows_to_atoms(&reply.rows))
    }

    async fn prompt_instructions(
        &self,
        role: &str,
        task: &str,
    ) -> Result<Vec<PromptAtom>, PotikError> {
        let via_protocol = format!(
            "MATCH (:Role {{name: '{role}'}})-[:RESPONSIBLE_FOR]->(:Task {{name: '{task}'}})\
             -[:FOLLOWS_PROTOCOL]->(:Protocol)-[co:COMPOSED_OF]->(i:Instruction) \
             RETURN i.name, i.content ORDER BY co.order",
            role = escape(role),
            task = escape(task),
        );
        let direct = format!(
            "MATCH (:Role {{name: '{role}'}})-[:RESPONSIBLE_FOR]->(:Task {{name: '{task}'}})\
             -[:FOLLOWS]->(i:Instruction) \
             RETURN i.name, i.content ORDER BY i.name",
            role = escape(role),
            task = escape(task),
        );

        let mut atoms = rows_to_atoms(&self.client.query(&self.primary, &via_protocol).await?.rows);
        let mut direct_atoms =
            rows_to_atoms(&self.client.query(&self.primary, &direct).await?.rows);
        atoms.append(&mut direct_atoms);
        Ok(atoms)
    }

    async fn prompt_rules(&self, instruction: &str) -> Result<Vec<PromptAtom>, PotikError> {
        let query = format!(
            "MATCH (:Instruction {{name: '{instruction}'}})-[:ENFORCES]->(r:Rule) \
             RETURN r.name, r.content ORDER BY r.name",
            instruction = escape(instruction),
        );
        let reply = self.client.query(&self.primary, &query).await?;
        Ok(rows_to_atoms(&reply.rows))
    }

    async fn prompt_graph_is_empty(&self) -> Result<bool, PotikError> {
        let reply = self
            .client
            .query(&self.primary, "MATCH (r:Role) RETURN count(r)")
            .await?;
        Ok(reply.scalar().map(as_i64).unwrap_or(0) == 0)
    }

    async fn seed_prompt_graph(&self, seeds: &[PromptSeed]) -> Result<(), PotikError> {
        for seed in seeds {
            for query in seed_queries(seed) {
                self.client.query(&self.primary, &query).await?;
            }
        }
        info!(roles = seeds.len(), "prompt subgraph seeded");
        Ok(())
    }
}

/// Trimmed, case-folded topic/entity key per the normalization invariant.
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Two-letter author abbreviation for the per-day message label.
fn author_abbrev(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.as_slice() {
        [] => "U".to_string(),
        [single] => {
            let initials: String = single.chars().take(2).collect();
            initials.to_uppercase()
        }
        [first, second, ..] => {
            let mut abbrev = String::new();
            abbrev.extend(first.chars().next());
            abbrev.extend(second.chars().next());
            abbrev.to_uppercase()
        }
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn rows_to_atoms(rows: &[Vec<serde_json::Value>]) -> Vec<PromptAtom> {
    rows.iter()
        .map(|row| PromptAtom {
            name: row.first().map(as_str).unwrap_or_default(),
            content: row.get(1).map(as_str).unwrap_or_default(),
        })
        .collect()
}

/// Builds the single-transaction persist statement for one event.
fn persist_query(
    event: &IngestEvent,
    node_name: &str,
    agent_telegram_id: i64,
    agent_name: &str,
) -> String {
    let uid = event.uid();
    let safe_text = escape(&event.text);
    let day = event.day();
    let time = event.time_of_day();

    let (identity, authorship) = match event.source {
        EventSource::User => {
            let author_name = escape(event.sender_name.as_deref().unwrap_or("User"));
            (
                format!(
                    "MERGE (u:User {{telegram_id: {sender}}}) \
                     ON CREATE SET u.id = 'user_{sender}', u.name = '{author_name}' \
                     ON MATCH SET u.name = '{author_name}'",
                    sender = event.sender_id,
                ),
                "CREATE (u)-[:AUTHORED]->(m)".to_string(),
            )
        }
        EventSource::Agent => (
            format!(
                "MERGE (u:Agent {{telegram_id: {agent_telegram_id}}}) \
                 ON CREATE SET u.id = 'agent_{agent_telegram_id}', u.name = '{name}'",
                name = escape(agent_name),
            ),
            "CREATE (u)-[:GENERATED]->(m)".to_string(),
        ),
    };

    format!(
        "{identity} \
         MERGE (c:Chat {{chat_id: {chat_id}}}) \
         ON CREATE SET c.id = 'chat_{chat_id}', c.name = 'Chat {chat_id}', c.type = '{chat_kind}' \
         MERGE (d:Day {{date: '{day}'}}) \
         ON CREATE SET d.id = '{day_id}' \
         MERGE (y:Year {{value: {year}}}) \
         MERGE (y)-[:MONTH {{number: {month}}}]->(d) \
         CREATE (m:Message {{uid: '{uid}', message_id: {message_id}, text: '{safe_text}', \
         created_at: {created_at}, name: '{node_name}'}}) \
         {authorship} \
         CREATE (m)-[:HAPPENED_IN]->(c) \
         CREATE (m)-[:HAPPENED_AT {{time: '{time}'}}]->(d) \
         WITH c, m \
         OPTIONAL MATCH (c)-[last_rel:LAST_EVENT]->(prev) \
         DELETE last_rel \
         WITH c, m, prev \
         FOREACH (_ IN CASE WHEN prev IS NOT NULL THEN [1] ELSE [] END | \
         CREATE (prev)-[:NEXT]->(m)) \
         CREATE (c)-[:LAST_EVENT]->(m) \
         RETURN m.uid",
        chat_id = event.chat_id,
        chat_kind = event.chat_kind,
        day_id = Uuid::new_v4(),
        year = event.year(),
        month = event.month(),
        uid = escape(&uid.0),
        message_id = event.message_id,
        created_at = event.timestamp,
    )
}

/// Builds the idempotent enrichment statements for one payload.
fn enrichment_queries(enrichment: &Enrichment) -> Vec<String> {
    let uid = escape(&enrichment.msg_uid.0);
    let mut queries = Vec::new();

    for topic in &enrichment.topics {
        let title = escape(&normalize_title(&topic.title));
        let description = escape(topic.title.trim());
        queries.push(format!(
            "MATCH (m:Message {{uid: '{uid}'}}) \
             MERGE (t:Topic {{title: '{title}'}}) \
             ON CREATE SET t.description = '{description}', t.status = 'active', \
             t.created_at = {ts} \
             MERGE (m)-[:DISCUSSES]->(t)",
            ts = potik_core::types::epoch_now(),
        ));
    }

    for entity in &enrichment.entities {
        let name = escape(&normalize_title(&entity.name));
        queries.push(format!(
            "MATCH (m:Message {{uid: '{uid}'}}) \
             MERGE (e:Entity {{name: '{name}'}}) \
             ON CREATE SET e.type = '{kind}' \
             MERGE (m)-[:MENTIONS]->(e)",
            kind = entity.kind,
        ));

        for topic in &enrichment.topics {
            let title = escape(&normalize_title(&topic.title));
            queries.push(format!(
                "MATCH (t:Topic {{title: '{title}'}}) \
                 MATCH (e:Entity {{name: '{name}'}}) \
                 MERGE (t)-[:INVOLVES]->(e)"
            ));
        }
    }

    queries
}

/// Builds the idempotent MERGE statements materializing one prompt seed.
fn seed_queries(seed: &PromptSeed) -> Vec<String> {
    let role = escape(&seed.role_name);
    let task = escape(&seed.task_name);
    let protocol = escape(&seed.protocol_name);
    let mut queries = vec![format!(
        "MERGE (r:Role {{name: '{role}'}}) \
         ON CREATE SET r.description = '{role_desc}', r.language = 'uk' \
         MERGE (t:Task {{name: '{task}'}}) \
         ON CREATE SET t.description = '{task_desc}', t.language = 'uk' \
         MERGE (r)-[:RESPONSIBLE_FOR]->(t) \
         MERGE (p:Protocol {{name: '{protocol}'}}) \
         ON CREATE SET p.language = 'uk' \
         MERGE (t)-[:FOLLOWS_PROTOCOL]->(p)",
        role_desc = escape(&seed.role_description),
        task_desc = escape(&seed.task_description),
    )];

    for instruction in &seed.instructions {
        let instr = escape(&instruction.name);
        queries.push(format!(
            "MATCH (p:Protocol {{name: '{protocol}'}}) \
             MERGE (i:Instruction {{name: '{instr}'}}) \
             ON CREATE SET i.content = '{content}', i.language = 'uk' \
             MERGE (p)-[co:COMPOSED_OF]->(i) \
             ON CREATE SET co.order = {order}",
            content = escape(&instruction.content),
            order = instruction.order,
        ));

        for rule in &instruction.rules {
            queries.push(format!(
                "MATCH (i:Instruction {{name: '{instr}'}}) \
                 MERGE (ru:Rule {{name: '{rule}'}}) \
                 ON CREATE SET ru.content = '{content}', ru.language = 'uk' \
                 MERGE (i)-[:ENFORCES]->(ru)",
                rule = escape(&rule.name),
                content = escape(&rule.content),
            ));
        }
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SeedInstruction, SeedRule};
    use potik_core::types::{ChatKind, EntityKind, EntityRef, TopicRef};

    fn sample_event(source: EventSource) -> IngestEvent {
        IngestEvent {
            chat_id: 1,
            message_id: 100,
            source,
            sender_id: 42,
            sender_name: Some("Maks Ivanov".into()),
            chat_kind: ChatKind::Group,
            text: "it's о 9:00".into(),
            timestamp: 1_738_670_000.0,
            media: None,
        }
    }

    #[test]
    fn abbrev_from_full_name() {
        assert_eq!(author_abbrev("Maks Ivanov"), "MI");
        assert_eq!(author_abbrev("Yulianna"), "YU");
        assert_eq!(author_abbrev("X"), "X");
        assert_eq!(author_abbrev(""), "U");
    }

    #[test]
    fn normalize_folds_case_and_trims() {
        assert_eq!(normalize_title("  Docker Compose "), "docker compose");
    }

    #[test]
    fn persist_query_user_creates_authored_edge() {
        let query = persist_query(&sample_event(EventSource::User), "MI01", 99, "Bober");
        assert!(query.contains("MERGE (u:User {telegram_id: 42})"));
        assert!(query.contains("[:AUTHORED]"));
        assert!(!query.contains("[:GENERATED]"));
        assert!(query.contains("uid: '1:100'"));
        assert!(query.contains(r"it\'s"));
        assert!(query.contains("OPTIONAL MATCH (c)-[last_rel:LAST_EVENT]->(prev)"));
        assert!(query.contains("CREATE (prev)-[:NEXT]->(m)"));
        assert!(query.contains("CREATE (c)-[:LAST_EVENT]->(m)"));
    }

    #[test]
    fn persist_query_agent_creates_generated_edge() {
        let query = persist_query(&sample_event(EventSource::Agent), "BS01", 99, "Bober");
        assert!(query.contains("MERGE (u:Agent {telegram_id: 99})"));
        assert!(query.contains("[:GENERATED]"));
        assert!(!query.contains("[:AUTHORED]"));
    }

    #[test]
    fn persist_query_materializes_time_nodes() {
        let query = persist_query(&sample_event(EventSource::User), "MI01", 99, "Bober");
        assert!(query.contains("MERGE (d:Day {date: '2025-02-04'})"));
        assert!(query.contains("MERGE (y:Year {value: 2025})"));
        assert!(query.contains("MERGE (y)-[:MONTH {number: 2}]->(d)"));
        assert!(query.contains("HAPPENED_AT {time:"));
    }

    #[test]
    fn enrichment_queries_upsert_by_normalized_key() {
        let enrichment = Enrichment {
            msg_uid: MessageUid::new(1, 100),
            topics: vec![TopicRef {
                title: "  Docker Setup ".into(),
                is_new: true,
            }],
            entities: vec![EntityRef {
                name: "Docker".into(),
                kind: EntityKind::Technology,
            }],
            narrative: "setup talk".into(),
        };

        let queries = enrichment_queries(&enrichment);
        // topic upsert + entity upsert + topic-entity link
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("MERGE (t:Topic {title: 'docker setup'})"));
        assert!(queries[0].contains("t.status = 'active'"));
        assert!(queries[0].contains("[:DISCUSSES]"));
        assert!(queries[1].contains("MERGE (e:Entity {name: 'docker'})"));
        assert!(queries[1].contains("e.type = 'Technology'"));
        assert!(queries[1].contains("[:MENTIONS]"));
        assert!(queries[2].contains("[:INVOLVES]"));
    }

    #[test]
    fn seed_queries_merge_whole_subtree() {
        let seed = PromptSeed {
            role_name: "Thinker".into(),
            role_description: "Аналітик".into(),
            task_name: "SemanticAnalysis".into(),
            task_description: "Аналіз".into(),
            protocol_name: "ThinkerProtocol".into(),
            instructions: vec![SeedInstruction {
                name: "ThinkerJSONFormat".into(),
                content: "Поверни JSON".into(),
                order: 1,
                rules: vec![SeedRule {
                    name: "ThinkerAnalysisRules".into(),
                    content: "Без вигадок".into(),
                }],
            }],
        };

        let queries = seed_queries(&seed);
        assert_eq!(queries.len(), 3);
        assert!(queries[0].contains("MERGE (r:Role {name: 'Thinker'})"));
        assert!(queries[0].contains("[:RESPONSIBLE_FOR]"));
        assert!(queries[0].contains("[:FOLLOWS_PROTOCOL]"));
        assert!(queries[1].contains("co.order = 1"));
        assert!(queries[2].contains("[:ENFORCES]"));
        assert!(queries[2].contains("language = 'uk'"));
    }
}
