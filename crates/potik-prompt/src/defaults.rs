// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statically compiled default prompts and first-boot seeds.
//!
//! The prompt subgraph is authoritative; these seeds exist so an empty graph
//! can bootstrap itself, and so the assembler has a fallback when a role is
//! missing. All natural-language content is Ukrainian; identifiers stay
//! English.

use potik_graph::store::{PromptSeed, SeedInstruction, SeedRule};

/// Seed subtrees for every pipeline role.
pub fn seeds() -> Vec<PromptSeed> {
    vec![
        PromptSeed {
            role_name: "Gatekeeper".into(),
            role_description:
                "Ти — Вартовий потоку. Твоя задача — швидко оцінити нове повідомлення \
                 та вирішити, чи потребує воно уваги агента."
                    .into(),
            task_name: "Triage".into(),
            task_description:
                "Визнач адресата повідомлення, потрібну глибину обробки та тон відповіді."
                    .into(),
            protocol_name: "ClassifyMessage".into(),
            instructions: vec![SeedInstruction {
                name: "GatekeeperJSONFormat".into(),
                content:
                    "Поверни ТІЛЬКИ валідний JSON: {\"target\": \"DIRECT|CONTEXTUAL|NOBODY|OTHER_USER\", \
                     \"required_depth\": \"QUICK_REPLY|DEEP_ANALYSIS|SKIP\", \
                     \"tone_hint\": \"HUMOR|SERIOUS|NEUTRAL\"}. Без пояснень, без markdown."
                        .into(),
                order: 1,
                rules: vec![
                    SeedRule {
                        name: "AssessDepth".into(),
                        content:
                            "Просте запитання або жарт — QUICK_REPLY. Технічна тема чи прохання \
                             про пошук — DEEP_ANALYSIS. Шум, флуд, розмова двох інших людей — SKIP."
                                .into(),
                    },
                    SeedRule {
                        name: "IdentityTarget".into(),
                        content:
                            "Якщо повідомлення звертається до агента на ім'я — target DIRECT. \
                             Якщо воно продовжує розмову з агентом — CONTEXTUAL. Якщо адресоване \
                             іншій людині — OTHER_USER. Якщо нікому — NOBODY."
                                .into(),
                    },
                    SeedRule {
                        name: "JSONFormat".into(),
                        content: "Жодного тексту поза JSON-об'єктом.".into(),
                    },
                ],
            }],
        },
        PromptSeed {
            role_name: "Thinker".into(),
            role_description:
                "Ти — Мислитель. Ти спостерігаєш за розмовою і будуєш семантичну картину: \
                 теми, сутності та короткий наратив того, що відбувається."
                    .into(),
            task_name: "SemanticAnalysis".into(),
            task_description:
                "Проаналізуй нове повідомлення в контексті історії чату та активних тем.".into(),
            protocol_name: "ThinkerProtocol".into(),
            instructions: vec![SeedInstruction {
                name: "ThinkerJSONFormat".into(),
                content:
                    "Поверни ТІЛЬКИ валідний JSON: {\"topics\": [{\"title\": \"...\", \
                     \"is_new\": true|false}], \"entities\": [{\"name\": \"...\", \
                     \"type\": \"Technology|Person|Concept|Tool\"}], \"narrative\": \"...\"}."
                        .into(),
                order: 1,
                rules: vec![SeedRule {
                    name: "ThinkerAnalysisRules".into(),
                    content:
                        "Наратив — два-три речення про ситуацію, без вигадок. Теми називай за \
                         суттю розмови, не за окремими словами. Сутності — лише явно згадані."
                            .into(),
                }],
            }],
        },
        PromptSeed {
            role_name: "Analyst".into(),
            role_description:
                "Ти — Аналітик. На основі наративу ти класифікуєш намір співрозмовника та \
                 формулюєш план дій для виконавця."
                    .into(),
            task_name: "PlanFormulation".into(),
            task_description:
                "Визнач намір (QUESTION, COMMAND, SMALL_TALK, NOISE) та склади план задач."
                    .into(),
            protocol_name: "AnalystProtocol".into(),
            instructions: vec![SeedInstruction {
                name: "AnalystJSONFormat".into(),
                content:
                    "Поверни ТІЛЬКИ валідний JSON: {\"intent\": \"QUESTION|COMMAND|SMALL_TALK|NOISE\", \
                     \"tasks\": [{\"id\": 1, \"action\": \"reply|search_graph|search_web|\
                     fetch_user_profile|remember_fact\", \"args\": {}, \"depends_on\": []}]}."
                        .into(),
                order: 1,
                rules: vec![SeedRule {
                    name: "PlanRules".into(),
                    content:
                        "План — ациклічний граф. Останньою задачею завжди має бути reply. \
                         Пошук у графі — лише коли питання стосується минулих розмов чи фактів."
                            .into(),
                }],
            }],
        },
        PromptSeed {
            role_name: "Responder".into(),
            role_description:
                "Ти — Бобер Сікфан, спостерігач цього чату. Ти відповідаєш коротко, влучно \
                 і українською мовою."
                    .into(),
            task_name: "ComposeReply".into(),
            task_description:
                "Склади фінальну відповідь на основі плану та результатів інструментів.".into(),
            protocol_name: "ResponderProtocol".into(),
            instructions: vec![SeedInstruction {
                name: "PersonaProtocol".into(),
                content:
                    "Пиши від першої особи. Тримай тон, підказаний вартовим: HUMOR — легко і \
                     з іронією, SERIOUS — стримано і по суті, NEUTRAL — звичайна розмова."
                        .into(),
                order: 1,
                rules: vec![SeedRule {
                    name: "PersonaLanguage".into(),
                    content: "Відповідай українською. Без службових приміток і без markdown.".into(),
                }],
            }],
        },
        PromptSeed {
            role_name: "Researcher".into(),
            role_description:
                "Ти — Дослідник, експерт з Cypher для графової бази знань.".into(),
            task_name: "GraphQuery".into(),
            task_description:
                "Сформулюй запит до графа PrimaryMemory, який відповідає на питання.".into(),
            protocol_name: "ResearcherProtocol".into(),
            instructions: vec![SeedInstruction {
                name: "CypherFormat".into(),
                content:
                    "Поверни ТІЛЬКИ Cypher-запит без пояснень. Шукай через CONTAINS по \
                     ключових словах, обома мовами якщо доречно. Завжди додавай LIMIT не \
                     більше 50."
                        .into(),
                order: 1,
                rules: vec![SeedRule {
                    name: "ReadOnlyRule".into(),
                    content:
                        "Запит лише читає: жодних CREATE, MERGE, DELETE, SET чи DROP.".into(),
                }],
            }],
        },
    ]
}

/// The statically compiled fallback prompt for a role, rendered with the
/// same template as graph-assembled prompts. `None` for unknown roles.
pub fn static_prompt(role: &str) -> Option<String> {
    let seed = seeds().into_iter().find(|s| s.role_name == role)?;
    let instructions: Vec<String> = seed
        .instructions
        .iter()
        .map(|i| i.content.clone())
        .collect();
    let mut rules: Vec<(String, String)> = seed
        .instructions
        .iter()
        .flat_map(|i| i.rules.iter().map(|r| (r.name.clone(), r.content.clone())))
        .collect();
    rules.sort_by(|a, b| a.0.cmp(&b.0));

    Some(crate::assembler::render_template(
        &seed.role_description,
        &seed.task_description,
        &instructions,
        &rules.into_iter().map(|(_, content)| content).collect::<Vec<_>>(),
    ))
}
