//! JSON schemas sent as the structured-output constraint of each block.
//!
//! Every leaf is a `{value, evidence}` wrapper; `evidence` quotes the
//! passage the model relied on. The schemas mirror the typed structs in
//! `flatten` — parsing those structs is the validation step.

use serde_json::{json, Value};

fn evidence_schema() -> Value {
    json!({
        "type": ["object", "null"],
        "properties": {
            "trecho": { "type": "string" },
            "ref": { "type": "string" },
            "page": { "type": ["integer", "null"] },
        },
        "required": ["trecho", "ref"],
        "additionalProperties": false,
    })
}

fn text_field() -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": { "type": "string" },
            "evidence": evidence_schema(),
        },
        "required": ["value"],
        "additionalProperties": false,
    })
}

fn bool_field() -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": { "type": ["boolean", "string"] },
            "evidence": evidence_schema(),
        },
        "required": ["value"],
        "additionalProperties": false,
    })
}

fn int_field() -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": { "type": ["integer", "string"] },
            "evidence": evidence_schema(),
        },
        "required": ["value"],
        "additionalProperties": false,
    })
}

fn object(properties: Value) -> Value {
    let required: Vec<String> = properties
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

pub fn edital() -> Value {
    object(json!({
        "orgao": text_field(),
        "objeto": text_field(),
        "numeroEdital": text_field(),
        "processo": text_field(),
        "totalReais": text_field(),
        "dataAbertura": text_field(),
        "modalidadeLicitacao": text_field(),
    }))
}

pub fn modalidade_participacao() -> Value {
    object(json!({
        "modalidadeLicitacao": text_field(),
        "mei": bool_field(),
        "meEpp": bool_field(),
        "exclusivoMeEpp": bool_field(),
        "consorcio": bool_field(),
        "cooperativa": bool_field(),
        "subcontratacao": bool_field(),
    }))
}

pub fn prazos() -> Value {
    object(json!({
        "dataAbertura": text_field(),
        "horaAbertura": text_field(),
        "prazoImpugnacao": text_field(),
        "prazoEsclarecimentos": text_field(),
        "prazoRecurso": text_field(),
        "validadeProposta": text_field(),
        "vigenciaContrato": text_field(),
    }))
}

pub fn documentos() -> Value {
    json!({
        "type": "object",
        "properties": {
            "requisitos": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "categoria": { "type": "string" },
                        "documento": { "type": "string" },
                        "referencia": { "type": "string" },
                        "obrigatorio": { "type": ["boolean", "string"] },
                        "evidence": evidence_schema(),
                    },
                    "required": ["categoria", "documento"],
                    "additionalProperties": false,
                },
            },
        },
        "required": ["requisitos"],
        "additionalProperties": false,
    })
}

pub fn visita_proposta() -> Value {
    object(json!({
        "visitaTecnica": bool_field(),
        "dataVisita": text_field(),
        "validadeProposta": text_field(),
        "formaApresentacao": text_field(),
        "criterioJulgamento": text_field(),
    }))
}

pub fn sessao_disputa() -> Value {
    object(json!({
        "data": text_field(),
        "hora": text_field(),
        "plataforma": text_field(),
        "modoDisputa": text_field(),
        "intervaloLances": text_field(),
    }))
}

pub fn pagamento_contrato() -> Value {
    object(json!({
        "mecanismoPagamento": text_field(),
        "prazoPagamento": text_field(),
        "dotacaoOrcamentaria": text_field(),
        "garantiaContratual": text_field(),
        "reajuste": text_field(),
    }))
}

pub fn analise() -> Value {
    object(json!({
        "pontuacao": int_field(),
        "recomendacao": text_field(),
        "responsavelAnalise": text_field(),
    }))
}
