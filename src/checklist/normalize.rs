//! Normalisation pass over the merged, defaulted checklist.
//!
//! Idempotent by construction: every rewrite produces a form the rules
//! leave alone. The `evidence` subtree is untouched — quoted source text
//! must survive verbatim.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

static DATE_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{2})/(\d{2})/(\d{4})\s*$").expect("valid regex"));
static DATE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{4})-(\d{2})-(\d{2})\s*$").expect("valid regex"));
static DATE_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{2})-(\d{2})-(\d{4})\s*$").expect("valid regex"));
static DATE_EXTENSO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d{1,2})\s+de\s+(\p{L}+)\s+de\s+(\d{4})\s*$").expect("valid regex")
});

static MONEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{1,3}(\.\d{3})*,\d{2}\s*$").expect("valid regex"));

static EVIDENCIA_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[,'"]\s*evidencia\s*[:{]"#).expect("valid regex"));
static TRECHO_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']?trecho["']?\s*:"#).expect("valid regex"));

const PAYMENT_MAX_CHARS: usize = 600;

/// Apply every normalisation rule in place.
pub fn normalize_checklist(checklist: &mut Value) {
    if let Value::Object(map) = checklist {
        for (key, value) in map.iter_mut() {
            if key != "evidence" {
                normalize_scalars(value);
            }
        }
    }
    coerce_bools(checklist);
    dedupe_document_items(checklist);
    sanitize_payment_field(checklist);
}

fn normalize_scalars(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(date) = normalize_date(s) {
                *s = date;
            } else if let Some(money) = normalize_money(s) {
                *s = money;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_scalars),
        Value::Object(map) => map.values_mut().for_each(normalize_scalars),
        _ => {}
    }
}

/// Rewrite a recognised date to `DD/MM/YYYY`; `None` leaves it unchanged.
pub fn normalize_date(s: &str) -> Option<String> {
    let (day, month, year) = if let Some(c) = DATE_SLASH.captures(s) {
        (num(&c[1]), num(&c[2]), num(&c[3]))
    } else if let Some(c) = DATE_ISO.captures(s) {
        (num(&c[3]), num(&c[2]), num(&c[1]))
    } else if let Some(c) = DATE_DASH.captures(s) {
        (num(&c[1]), num(&c[2]), num(&c[3]))
    } else if let Some(c) = DATE_EXTENSO.captures(s) {
        (num(&c[1]), month_number(&c[2])?, num(&c[3]))
    } else {
        return None;
    };

    // Calendar-invalid matches (e.g. 99-99) pass through untouched.
    NaiveDate::from_ymd_opt(year as i32, month, day)?;
    Some(format!("{day:02}/{month:02}/{year:04}"))
}

fn num(s: &str) -> u32 {
    s.parse().unwrap_or(0)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "janeiro" => 1,
        "fevereiro" => 2,
        "março" | "marco" => 3,
        "abril" => 4,
        "maio" => 5,
        "junho" => 6,
        "julho" => 7,
        "agosto" => 8,
        "setembro" => 9,
        "outubro" => 10,
        "novembro" => 11,
        "dezembro" => 12,
        _ => return None,
    };
    Some(month)
}

/// Prefix a bare Brazilian monetary amount with `R$ `.
pub fn normalize_money(s: &str) -> Option<String> {
    if MONEY.is_match(s) {
        Some(format!("R$ {}", s.trim()))
    } else {
        None
    }
}

fn coerce_bools(checklist: &mut Value) {
    if let Some(Value::Object(participacao)) = checklist.get_mut("participacao") {
        for value in participacao.values_mut() {
            *value = Value::Bool(truthy(value));
        }
    }
    if let Some(value) = checklist.get_mut("visitaTecnica") {
        *value = Value::Bool(truthy(value));
    }
    if let Some(Value::Array(requisitos)) = checklist.get_mut("requisitos") {
        for requisito in requisitos {
            if let Some(value) = requisito.get_mut("obrigatorio") {
                *value = Value::Bool(truthy(value));
            }
        }
    }
}

/// Boolean reading of a loosely typed flag.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "sim" | "yes" | "1" => true,
            "false" | "não" | "nao" | "no" | "0" | "" => false,
            _ => true,
        },
        _ => false,
    }
}

fn dedupe_document_items(checklist: &mut Value) {
    let Some(Value::Array(groups)) = checklist.get_mut("documentos") else {
        return;
    };
    for group in groups {
        let Some(Value::Array(itens)) = group.get_mut("itens") else {
            continue;
        };
        let mut seen: HashSet<(String, String)> = HashSet::new();
        itens.retain(|item| {
            let key = (
                item.get("documento")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                item.get("referencia")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            );
            seen.insert(key)
        });
    }
}

fn sanitize_payment_field(checklist: &mut Value) {
    if let Some(Value::String(s)) = checklist.pointer_mut("/outrosEdital/mecanismoPagamento") {
        *s = sanitize_payment(s);
    }
}

/// Strip trailing JSON-evidence fragments the model sometimes leaks into
/// the payment description, then bound the length.
pub fn sanitize_payment(text: &str) -> String {
    let mut end = text.len();
    if let Some(m) = EVIDENCIA_FRAGMENT.find(text) {
        end = end.min(m.start());
    }
    if let Some(m) = TRECHO_FRAGMENT.find(text) {
        end = end.min(m.start());
    }

    let cut = text[..end]
        .trim_end_matches(|c: char| matches!(c, '}' | '`' | '"' | '\'' | ',') || c.is_whitespace());

    if cut.chars().count() > PAYMENT_MAX_CHARS {
        let mut truncated: String = cut.chars().take(PAYMENT_MAX_CHARS - 1).collect();
        truncated.push('…');
        truncated
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── dates ───────────────────────────────────────────────────────────

    #[test]
    fn test_date_coercion_vectors() {
        for input in ["2024-05-01", "01/05/2024", "01-05-2024", "01 de maio de 2024"] {
            assert_eq!(
                normalize_date(input).as_deref(),
                Some("01/05/2024"),
                "input {input}"
            );
        }
    }

    #[test]
    fn test_date_invalid_passes_through() {
        assert_eq!(normalize_date("99-99-9999"), None);
        assert_eq!(normalize_date("31/02/2024"), None);
        assert_eq!(normalize_date("em breve"), None);
        assert_eq!(normalize_date("12/2024"), None);
    }

    #[test]
    fn test_date_extenso_case_and_single_digit() {
        assert_eq!(
            normalize_date("3 de Março de 2025").as_deref(),
            Some("03/03/2025")
        );
    }

    // ── money ───────────────────────────────────────────────────────────

    #[test]
    fn test_money_coercion_vectors() {
        assert_eq!(normalize_money("1.234,56").as_deref(), Some("R$ 1.234,56"));
        assert_eq!(normalize_money("R$ 1.234,56"), None);
        assert_eq!(normalize_money("abc"), None);
        assert_eq!(
            normalize_money("12.345.678,90").as_deref(),
            Some("R$ 12.345.678,90")
        );
        assert_eq!(normalize_money("1234,56"), None);
    }

    // ── payment sanitisation ────────────────────────────────────────────

    #[test]
    fn test_payment_sanitisation_scenario() {
        let input = "Pagamento em 30 dias', 'evidencia':{'trecho':'...'}}}";
        assert_eq!(sanitize_payment(input), "Pagamento em 30 dias");
    }

    #[test]
    fn test_payment_trecho_fragment() {
        let input = "Pagamento mensal \"trecho\": \"conforme cronograma\"";
        assert_eq!(sanitize_payment(input), "Pagamento mensal");
    }

    #[test]
    fn test_payment_clean_text_untouched() {
        let input = "Pagamento em até 30 dias após atesto da nota fiscal";
        assert_eq!(sanitize_payment(input), input);
    }

    #[test]
    fn test_payment_truncation_bounded_and_idempotent() {
        let input = "x".repeat(900);
        let once = sanitize_payment(&input);
        assert_eq!(once.chars().count(), 600);
        assert!(once.ends_with('…'));
        assert_eq!(sanitize_payment(&once), once);
    }

    // ── full pass ───────────────────────────────────────────────────────

    fn sample() -> Value {
        json!({
            "edital": {
                "orgao": "Prefeitura de X",
                "totalReais": "1.234,56",
                "dataAbertura": "2024-05-01",
            },
            "participacao": { "mei": "sim", "meEpp": 1, "consorcio": "não", "cooperativa": false, "exclusivoMeEpp": "", "subcontratacao": "permitida" },
            "visitaTecnica": "yes",
            "requisitos": [
                { "categoria": "Fiscal", "documento": "CND", "referencia": "9.1", "obrigatorio": "sim" },
            ],
            "documentos": [
                { "categoria": "Fiscal", "itens": [
                    { "documento": "CND", "referencia": "9.1" },
                    { "documento": "CND", "referencia": "9.1" },
                    { "documento": "FGTS", "referencia": "9.2" },
                ]},
            ],
            "prazos": { "dataAbertura": "01-05-2024" },
            "outrosEdital": { "mecanismoPagamento": "Em 30 dias', 'evidencia':{'trecho':'x'}}" },
            "evidence": { "edital": { "dataAbertura": { "trecho": "2024-05-01", "ref": "1" } } },
        })
    }

    #[test]
    fn test_full_pass() {
        let mut checklist = sample();
        normalize_checklist(&mut checklist);

        assert_eq!(checklist["edital"]["totalReais"], "R$ 1.234,56");
        assert_eq!(checklist["edital"]["dataAbertura"], "01/05/2024");
        assert_eq!(checklist["prazos"]["dataAbertura"], "01/05/2024");
        assert_eq!(checklist["participacao"]["mei"], true);
        assert_eq!(checklist["participacao"]["meEpp"], true);
        assert_eq!(checklist["participacao"]["consorcio"], false);
        assert_eq!(checklist["participacao"]["exclusivoMeEpp"], false);
        // Unrecognised non-empty string in a boolean slot reads as true.
        assert_eq!(checklist["participacao"]["subcontratacao"], true);
        assert_eq!(checklist["visitaTecnica"], true);
        assert_eq!(checklist["requisitos"][0]["obrigatorio"], true);
        assert_eq!(
            checklist["documentos"][0]["itens"].as_array().unwrap().len(),
            2
        );
        assert_eq!(checklist["outrosEdital"]["mecanismoPagamento"], "Em 30 dias");
        // Evidence is quoted source text; it is never rewritten.
        assert_eq!(
            checklist["evidence"]["edital"]["dataAbertura"]["trecho"],
            "2024-05-01"
        );
    }

    #[test]
    fn test_normalisation_idempotent() {
        let mut once = sample();
        normalize_checklist(&mut once);
        let mut twice = once.clone();
        normalize_checklist(&mut twice);
        assert_eq!(once, twice);
    }
}
