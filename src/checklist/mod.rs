pub mod blocks;
pub mod defaults;
pub mod flatten;
pub mod merge;
pub mod normalize;
pub mod schemas;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current checklist schema version.
pub const SCHEMA_VERSION: i64 = 2;

/// The eight semantic blocks, in their fixed merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKey {
    Edital,
    ModalidadeParticipacao,
    Prazos,
    Documentos,
    VisitaProposta,
    SessaoDisputa,
    PagamentoContrato,
    Analise,
}

impl BlockKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edital => "edital",
            Self::ModalidadeParticipacao => "modalidade_participacao",
            Self::Prazos => "prazos",
            Self::Documentos => "documentos",
            Self::VisitaProposta => "visita_proposta",
            Self::SessaoDisputa => "sessao_disputa",
            Self::PagamentoContrato => "pagamento_contrato",
            Self::Analise => "analise",
        }
    }
}

/// Source quotation backing an extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Evidence {
    #[serde(default)]
    pub trecho: String,
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub page: Option<i64>,
}

/// A text leaf of a block result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextField {
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

/// A leaf whose value the model frequently types loosely: booleans arriving
/// as "sim"/"não", scores arriving as strings. The raw shape is kept and
/// coerced by the normaliser (booleans) or at flatten time (integers).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlexField {
    #[serde(default)]
    pub value: ScalarValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

/// Scalar JSON value; anything structured is a schema violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Default for ScalarValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl ScalarValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
            Self::Null => Value::Null,
        }
    }

    /// Integer reading with string fallback, for score-like fields.
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Int(i) => *i,
            Self::Float(f) => f.round() as i64,
            Self::Bool(b) => i64::from(*b),
            Self::Text(s) => s.trim().parse().unwrap_or(0),
            Self::Null => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evidence_ref_rename() {
        let ev: Evidence = serde_json::from_value(serde_json::json!({
            "trecho": "conforme item 9.1",
            "ref": "9.1",
            "page": 12,
        }))
        .unwrap();
        assert_eq!(ev.reference, "9.1");
        let back = serde_json::to_value(&ev).unwrap();
        assert_eq!(back["ref"], "9.1");
    }

    #[test]
    fn test_text_field_defaults_when_sparse() {
        let f: TextField = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(f.value, "");
        assert!(f.evidence.is_none());
    }

    #[test]
    fn test_flex_field_accepts_loose_booleans() {
        let f: FlexField = serde_json::from_value(serde_json::json!({"value": "sim"})).unwrap();
        assert_eq!(f.value, ScalarValue::Text("sim".into()));

        let f: FlexField = serde_json::from_value(serde_json::json!({"value": true})).unwrap();
        assert_eq!(f.value, ScalarValue::Bool(true));

        let f: FlexField = serde_json::from_value(serde_json::json!({"value": 72})).unwrap();
        assert_eq!(f.value.as_int(), 72);
    }

    #[test]
    fn test_flex_field_rejects_structured_values() {
        assert!(
            serde_json::from_value::<FlexField>(serde_json::json!({"value": {"nested": 1}}))
                .is_err()
        );
    }

    #[test]
    fn test_scalar_int_fallbacks() {
        assert_eq!(ScalarValue::Text(" 72 ".into()).as_int(), 72);
        assert_eq!(ScalarValue::Text("alta".into()).as_int(), 0);
        assert_eq!(ScalarValue::Float(71.6).as_int(), 72);
        assert_eq!(ScalarValue::Null.as_int(), 0);
    }
}
