//! Deep merge of block projections into the checklist accumulator.
//!
//! The eight blocks overlap on a few keys; the fixed merge order plus the
//! "earlier non-empty wins" rule make the outcome deterministic. Evidence
//! is accumulated in a sibling map keyed by block and never flows through
//! the data merge.

use serde_json::{Map, Value};

use super::flatten::FlatBlock;
use super::BlockKey;

/// Merge `incoming` into `acc`.
///
/// Objects merge recursively. A later scalar wins only when the earlier
/// value is the empty string, null, or absent. Arrays are replaced
/// wholesale by the later block.
pub fn deep_merge(acc: &mut Value, incoming: &Value) {
    let Some(incoming_map) = incoming.as_object() else {
        return;
    };
    if !acc.is_object() {
        *acc = Value::Object(Map::new());
    }
    let Value::Object(acc_map) = acc else {
        return;
    };

    for (key, incoming_value) in incoming_map {
        match acc_map.get_mut(key) {
            None => {
                acc_map.insert(key.clone(), incoming_value.clone());
            }
            Some(existing) => {
                if incoming_value.is_array() {
                    *existing = incoming_value.clone();
                } else if existing.is_object() && incoming_value.is_object() {
                    deep_merge(existing, incoming_value);
                } else if is_empty(existing) && !is_empty(incoming_value) {
                    *existing = incoming_value.clone();
                }
            }
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Fold the eight flattened blocks, in merge order, into one checklist
/// value with the evidence side-channel stitched in at the end.
pub fn merge_blocks(results: &[(BlockKey, FlatBlock)]) -> Value {
    let mut data = Value::Object(Map::new());
    let mut evidence = Map::new();

    for (key, flat) in results {
        deep_merge(&mut data, &flat.data);
        if flat
            .evidence
            .as_object()
            .is_some_and(|map| !map.is_empty())
        {
            evidence.insert(key.as_str().to_string(), flat.evidence.clone());
        }
    }

    deep_merge(
        &mut data,
        &Value::Object(Map::from_iter([(
            "evidence".to_string(),
            Value::Object(evidence),
        )])),
    );
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_empty_block_is_identity() {
        let mut acc = json!({ "edital": { "orgao": "Prefeitura" } });
        let before = acc.clone();
        deep_merge(&mut acc, &json!({}));
        assert_eq!(acc, before);
    }

    #[test]
    fn test_later_fills_empty_string() {
        let mut acc = json!({ "modalidadeLicitacao": "" });
        deep_merge(&mut acc, &json!({ "modalidadeLicitacao": "Pregão Eletrônico" }));
        assert_eq!(acc["modalidadeLicitacao"], "Pregão Eletrônico");
    }

    #[test]
    fn test_later_empty_does_not_clobber() {
        let mut acc = json!({ "modalidadeLicitacao": "Pregão Eletrônico" });
        deep_merge(&mut acc, &json!({ "modalidadeLicitacao": "" }));
        assert_eq!(acc["modalidadeLicitacao"], "Pregão Eletrônico");
    }

    #[test]
    fn test_later_non_empty_does_not_overwrite() {
        let mut acc = json!({ "modalidadeLicitacao": "Concorrência" });
        deep_merge(&mut acc, &json!({ "modalidadeLicitacao": "Pregão" }));
        // Earlier block wins on conflicting non-empty scalars.
        assert_eq!(acc["modalidadeLicitacao"], "Concorrência");
    }

    #[test]
    fn test_null_is_fillable() {
        let mut acc = json!({ "prazos": { "prazoRecurso": null } });
        deep_merge(&mut acc, &json!({ "prazos": { "prazoRecurso": "3 dias úteis" } }));
        assert_eq!(acc["prazos"]["prazoRecurso"], "3 dias úteis");
    }

    #[test]
    fn test_objects_merge_recursively() {
        let mut acc = json!({ "edital": { "orgao": "Prefeitura", "objeto": "" } });
        deep_merge(
            &mut acc,
            &json!({ "edital": { "objeto": "Material escolar", "processo": "123" } }),
        );
        assert_eq!(acc["edital"]["orgao"], "Prefeitura");
        assert_eq!(acc["edital"]["objeto"], "Material escolar");
        assert_eq!(acc["edital"]["processo"], "123");
    }

    #[test]
    fn test_arrays_replaced_wholesale() {
        let mut acc = json!({ "requisitos": [{ "documento": "antigo" }] });
        deep_merge(&mut acc, &json!({ "requisitos": [{ "documento": "novo" }] }));
        assert_eq!(acc["requisitos"].as_array().unwrap().len(), 1);
        assert_eq!(acc["requisitos"][0]["documento"], "novo");
    }

    #[test]
    fn test_false_is_not_empty() {
        let mut acc = json!({ "participacao": { "mei": false } });
        deep_merge(&mut acc, &json!({ "participacao": { "mei": true } }));
        assert_eq!(acc["participacao"]["mei"], false);
    }

    #[test]
    fn test_merge_blocks_accumulates_evidence_separately() {
        use super::super::flatten::{flatten_edital, flatten_prazos};

        let edital = flatten_edital(&json!({
            "orgao": { "value": "Prefeitura de X", "evidence": { "trecho": "A PREFEITURA", "ref": "preâmbulo", "page": 1 } },
        }))
        .unwrap();
        let prazos = flatten_prazos(&json!({
            "prazoImpugnacao": { "value": "até 3 dias úteis", "evidence": { "trecho": "art. 24", "ref": "24", "page": 7 } },
        }))
        .unwrap();

        let merged = merge_blocks(&[
            (BlockKey::Edital, edital),
            (BlockKey::Prazos, prazos),
        ]);

        assert_eq!(merged["edital"]["orgao"], "Prefeitura de X");
        assert_eq!(merged["prazos"]["prazoImpugnacao"], "até 3 dias úteis");
        assert_eq!(merged["evidence"]["edital"]["orgao"]["page"], 1);
        assert_eq!(merged["evidence"]["prazos"]["prazoImpugnacao"]["ref"], "24");
        // Evidence never leaks into the data subtrees.
        assert!(merged["edital"].get("evidence").is_none());
        assert!(merged["prazos"].get("evidence").is_none());
    }

    #[test]
    fn test_merge_blocks_modalidade_precedence() {
        use super::super::flatten::{flatten_edital, flatten_modalidade_participacao};

        let edital = flatten_edital(&json!({
            "modalidadeLicitacao": { "value": "Pregão Eletrônico" },
        }))
        .unwrap();
        let modalidade = flatten_modalidade_participacao(&json!({
            "modalidadeLicitacao": { "value": "Concorrência" },
            "meEpp": { "value": true },
        }))
        .unwrap();

        let merged = merge_blocks(&[
            (BlockKey::Edital, edital),
            (BlockKey::ModalidadeParticipacao, modalidade),
        ]);

        // The edital block comes first in merge order and its value is
        // non-empty, so it wins the overlap.
        assert_eq!(merged["modalidadeLicitacao"], "Pregão Eletrônico");
        assert_eq!(merged["participacao"]["meEpp"], true);
    }
}
