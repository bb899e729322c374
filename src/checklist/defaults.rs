//! Defaulting pass: after the merge, every key of the checklist shape is
//! guaranteed present with the right type, whatever the model omitted.

use serde_json::{json, Map, Value};

use super::SCHEMA_VERSION;

const EDITAL_FIELDS: [&str; 6] = [
    "orgao",
    "objeto",
    "numeroEdital",
    "processo",
    "totalReais",
    "dataAbertura",
];

pub const PARTICIPACAO_FLAGS: [&str; 6] = [
    "mei",
    "meEpp",
    "exclusivoMeEpp",
    "consorcio",
    "cooperativa",
    "subcontratacao",
];

const PRAZOS_FIELDS: [&str; 7] = [
    "dataAbertura",
    "horaAbertura",
    "prazoImpugnacao",
    "prazoEsclarecimentos",
    "prazoRecurso",
    "validadeProposta",
    "vigenciaContrato",
];

const SESSAO_FIELDS: [&str; 5] = ["data", "hora", "plataforma", "modoDisputa", "intervaloLances"];

const PROPOSTA_FIELDS: [&str; 4] = [
    "dataVisita",
    "validade",
    "formaApresentacao",
    "criterioJulgamento",
];

const OUTROS_EDITAL_FIELDS: [&str; 5] = [
    "mecanismoPagamento",
    "prazoPagamento",
    "dotacaoOrcamentaria",
    "garantiaContratual",
    "reajuste",
];

/// Fill every required key of the v2 checklist shape with a typed default.
pub fn apply_defaults(checklist: &mut Value) {
    if !checklist.is_object() {
        *checklist = Value::Object(Map::new());
    }

    fill_subtree(checklist, "edital", &EDITAL_FIELDS, Value::String(String::new()));
    fill_subtree(
        checklist,
        "participacao",
        &PARTICIPACAO_FLAGS,
        Value::Bool(false),
    );
    fill_subtree(checklist, "prazos", &PRAZOS_FIELDS, Value::String(String::new()));
    fill_subtree(checklist, "sessao", &SESSAO_FIELDS, Value::String(String::new()));
    fill_subtree(
        checklist,
        "proposta",
        &PROPOSTA_FIELDS,
        Value::String(String::new()),
    );
    fill_subtree(
        checklist,
        "outrosEdital",
        &OUTROS_EDITAL_FIELDS,
        Value::String(String::new()),
    );

    let Value::Object(map) = checklist else {
        return;
    };
    ensure(map, "visitaTecnica", json!(false));
    ensure(map, "documentos", json!([]));
    ensure(map, "requisitos", json!([]));
    ensure(map, "modalidadeLicitacao", json!(""));
    ensure(map, "responsavelAnalise", json!(""));
    ensure(map, "recomendacao", json!(""));
    ensure(map, "pontuacao", json!(0));
    ensure(map, "evidence", json!({}));
    ensure(map, "schemaVersion", json!(SCHEMA_VERSION));
}

/// Make `key` an object and populate its missing fields with `default`.
fn fill_subtree(checklist: &mut Value, key: &str, fields: &[&str], default: Value) {
    let Value::Object(map) = checklist else {
        return;
    };
    let subtree = map.entry(key.to_string()).or_insert_with(|| json!({}));
    if !subtree.is_object() {
        *subtree = json!({});
    }
    if let Value::Object(subtree_map) = subtree {
        for field in fields {
            ensure(subtree_map, field, default.clone());
        }
    }
}

fn ensure(map: &mut Map<String, Value>, key: &str, default: Value) {
    if !map.contains_key(key) || map[key].is_null() {
        map.insert(key.to_string(), default);
    }
}
