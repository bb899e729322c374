//! Projection of validated block results into the shared checklist shape.
//!
//! Each block result is parsed into its typed struct first — that parse is
//! the schema validation — and then projected into two sibling trees: the
//! checklist data (plain leaf values) and the evidence map (same field
//! names, only where the model quoted a source). Evidence never travels
//! through the data merge.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{Evidence, FlexField, ScalarValue, TextField};

/// One block projected into the checklist shape.
#[derive(Debug, Clone)]
pub struct FlatBlock {
    pub data: Value,
    pub evidence: Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EditalBlock {
    orgao: TextField,
    objeto: TextField,
    #[serde(rename = "numeroEdital")]
    numero_edital: TextField,
    processo: TextField,
    #[serde(rename = "totalReais")]
    total_reais: TextField,
    #[serde(rename = "dataAbertura")]
    data_abertura: TextField,
    #[serde(rename = "modalidadeLicitacao")]
    modalidade_licitacao: TextField,
}

pub fn flatten_edital(raw: &Value) -> Result<FlatBlock> {
    let block: EditalBlock = parse(raw)?;
    let data = json!({
        "edital": {
            "orgao": block.orgao.value,
            "objeto": block.objeto.value,
            "numeroEdital": block.numero_edital.value,
            "processo": block.processo.value,
            "totalReais": block.total_reais.value,
            "dataAbertura": block.data_abertura.value,
        },
        "modalidadeLicitacao": block.modalidade_licitacao.value,
    });
    let evidence = evidence_map([
        ("orgao", &block.orgao.evidence),
        ("objeto", &block.objeto.evidence),
        ("numeroEdital", &block.numero_edital.evidence),
        ("processo", &block.processo.evidence),
        ("totalReais", &block.total_reais.evidence),
        ("dataAbertura", &block.data_abertura.evidence),
        ("modalidadeLicitacao", &block.modalidade_licitacao.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ModalidadeParticipacaoBlock {
    #[serde(rename = "modalidadeLicitacao")]
    modalidade_licitacao: TextField,
    mei: FlexField,
    #[serde(rename = "meEpp")]
    me_epp: FlexField,
    #[serde(rename = "exclusivoMeEpp")]
    exclusivo_me_epp: FlexField,
    consorcio: FlexField,
    cooperativa: FlexField,
    subcontratacao: FlexField,
}

pub fn flatten_modalidade_participacao(raw: &Value) -> Result<FlatBlock> {
    let block: ModalidadeParticipacaoBlock = parse(raw)?;
    let data = json!({
        "participacao": {
            "mei": block.mei.value.to_json(),
            "meEpp": block.me_epp.value.to_json(),
            "exclusivoMeEpp": block.exclusivo_me_epp.value.to_json(),
            "consorcio": block.consorcio.value.to_json(),
            "cooperativa": block.cooperativa.value.to_json(),
            "subcontratacao": block.subcontratacao.value.to_json(),
        },
        "modalidadeLicitacao": block.modalidade_licitacao.value,
    });
    let evidence = evidence_map([
        ("modalidadeLicitacao", &block.modalidade_licitacao.evidence),
        ("mei", &block.mei.evidence),
        ("meEpp", &block.me_epp.evidence),
        ("exclusivoMeEpp", &block.exclusivo_me_epp.evidence),
        ("consorcio", &block.consorcio.evidence),
        ("cooperativa", &block.cooperativa.evidence),
        ("subcontratacao", &block.subcontratacao.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PrazosBlock {
    #[serde(rename = "dataAbertura")]
    data_abertura: TextField,
    #[serde(rename = "horaAbertura")]
    hora_abertura: TextField,
    #[serde(rename = "prazoImpugnacao")]
    prazo_impugnacao: TextField,
    #[serde(rename = "prazoEsclarecimentos")]
    prazo_esclarecimentos: TextField,
    #[serde(rename = "prazoRecurso")]
    prazo_recurso: TextField,
    #[serde(rename = "validadeProposta")]
    validade_proposta: TextField,
    #[serde(rename = "vigenciaContrato")]
    vigencia_contrato: TextField,
}

pub fn flatten_prazos(raw: &Value) -> Result<FlatBlock> {
    let block: PrazosBlock = parse(raw)?;
    let data = json!({
        "prazos": {
            "dataAbertura": block.data_abertura.value,
            "horaAbertura": block.hora_abertura.value,
            "prazoImpugnacao": block.prazo_impugnacao.value,
            "prazoEsclarecimentos": block.prazo_esclarecimentos.value,
            "prazoRecurso": block.prazo_recurso.value,
            "validadeProposta": block.validade_proposta.value,
            "vigenciaContrato": block.vigencia_contrato.value,
        },
    });
    let evidence = evidence_map([
        ("dataAbertura", &block.data_abertura.evidence),
        ("horaAbertura", &block.hora_abertura.evidence),
        ("prazoImpugnacao", &block.prazo_impugnacao.evidence),
        ("prazoEsclarecimentos", &block.prazo_esclarecimentos.evidence),
        ("prazoRecurso", &block.prazo_recurso.evidence),
        ("validadeProposta", &block.validade_proposta.evidence),
        ("vigenciaContrato", &block.vigencia_contrato.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Requisito {
    pub categoria: String,
    pub documento: String,
    pub referencia: String,
    pub obrigatorio: ScalarValue,
    pub evidence: Option<Evidence>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocumentosBlock {
    requisitos: Vec<Requisito>,
}

pub fn flatten_documentos(raw: &Value) -> Result<FlatBlock> {
    let block: DocumentosBlock = parse(raw)?;

    let requisitos: Vec<Value> = block
        .requisitos
        .iter()
        .map(|r| {
            json!({
                "categoria": r.categoria,
                "documento": r.documento,
                "referencia": r.referencia,
                "obrigatorio": r.obrigatorio.to_json(),
            })
        })
        .collect();

    let data = json!({
        "requisitos": requisitos,
        "documentos": requisitos_to_documentos(&block.requisitos),
    });

    // Evidence mirrors the list positionally.
    let item_evidence: Vec<Value> = block
        .requisitos
        .iter()
        .map(|r| match &r.evidence {
            Some(ev) => serde_json::to_value(ev).unwrap_or(Value::Null),
            None => Value::Null,
        })
        .collect();
    let evidence = if item_evidence.iter().all(Value::is_null) {
        json!({})
    } else {
        json!({ "requisitos": item_evidence })
    };

    Ok(FlatBlock { data, evidence })
}

/// Group requirements into the browsable `documentos` view, one group per
/// `categoria` in encounter order.
pub fn requisitos_to_documentos(requisitos: &[Requisito]) -> Value {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: Map<String, Value> = Map::new();

    for requisito in requisitos {
        let item = json!({
            "documento": requisito.documento,
            "referencia": requisito.referencia,
        });
        if !groups.contains_key(requisito.categoria.as_str()) {
            order.push(requisito.categoria.as_str());
            groups.insert(requisito.categoria.clone(), json!([]));
        }
        if let Some(Value::Array(itens)) = groups.get_mut(requisito.categoria.as_str()) {
            itens.push(item);
        }
    }

    Value::Array(
        order
            .into_iter()
            .map(|categoria| {
                json!({
                    "categoria": categoria,
                    "itens": groups[categoria],
                })
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct VisitaPropostaBlock {
    #[serde(rename = "visitaTecnica")]
    visita_tecnica: FlexField,
    #[serde(rename = "dataVisita")]
    data_visita: TextField,
    #[serde(rename = "validadeProposta")]
    validade_proposta: TextField,
    #[serde(rename = "formaApresentacao")]
    forma_apresentacao: TextField,
    #[serde(rename = "criterioJulgamento")]
    criterio_julgamento: TextField,
}

pub fn flatten_visita_proposta(raw: &Value) -> Result<FlatBlock> {
    let block: VisitaPropostaBlock = parse(raw)?;
    let data = json!({
        "visitaTecnica": block.visita_tecnica.value.to_json(),
        "proposta": {
            "dataVisita": block.data_visita.value,
            "validade": block.validade_proposta.value,
            "formaApresentacao": block.forma_apresentacao.value,
            "criterioJulgamento": block.criterio_julgamento.value,
        },
    });
    let evidence = evidence_map([
        ("visitaTecnica", &block.visita_tecnica.evidence),
        ("dataVisita", &block.data_visita.evidence),
        ("validadeProposta", &block.validade_proposta.evidence),
        ("formaApresentacao", &block.forma_apresentacao.evidence),
        ("criterioJulgamento", &block.criterio_julgamento.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct SessaoDisputaBlock {
    data: TextField,
    hora: TextField,
    plataforma: TextField,
    #[serde(rename = "modoDisputa")]
    modo_disputa: TextField,
    #[serde(rename = "intervaloLances")]
    intervalo_lances: TextField,
}

pub fn flatten_sessao_disputa(raw: &Value) -> Result<FlatBlock> {
    let block: SessaoDisputaBlock = parse(raw)?;
    let data = json!({
        "sessao": {
            "data": block.data.value,
            "hora": block.hora.value,
            "plataforma": block.plataforma.value,
            "modoDisputa": block.modo_disputa.value,
            "intervaloLances": block.intervalo_lances.value,
        },
    });
    let evidence = evidence_map([
        ("data", &block.data.evidence),
        ("hora", &block.hora.evidence),
        ("plataforma", &block.plataforma.evidence),
        ("modoDisputa", &block.modo_disputa.evidence),
        ("intervaloLances", &block.intervalo_lances.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PagamentoContratoBlock {
    #[serde(rename = "mecanismoPagamento")]
    mecanismo_pagamento: TextField,
    #[serde(rename = "prazoPagamento")]
    prazo_pagamento: TextField,
    #[serde(rename = "dotacaoOrcamentaria")]
    dotacao_orcamentaria: TextField,
    #[serde(rename = "garantiaContratual")]
    garantia_contratual: TextField,
    reajuste: TextField,
}

pub fn flatten_pagamento_contrato(raw: &Value) -> Result<FlatBlock> {
    let block: PagamentoContratoBlock = parse(raw)?;
    let data = json!({
        "outrosEdital": {
            "mecanismoPagamento": block.mecanismo_pagamento.value,
            "prazoPagamento": block.prazo_pagamento.value,
            "dotacaoOrcamentaria": block.dotacao_orcamentaria.value,
            "garantiaContratual": block.garantia_contratual.value,
            "reajuste": block.reajuste.value,
        },
    });
    let evidence = evidence_map([
        ("mecanismoPagamento", &block.mecanismo_pagamento.evidence),
        ("prazoPagamento", &block.prazo_pagamento.evidence),
        ("dotacaoOrcamentaria", &block.dotacao_orcamentaria.evidence),
        ("garantiaContratual", &block.garantia_contratual.evidence),
        ("reajuste", &block.reajuste.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct AnaliseBlock {
    pontuacao: FlexField,
    recomendacao: TextField,
    #[serde(rename = "responsavelAnalise")]
    responsavel_analise: TextField,
}

pub fn flatten_analise(raw: &Value) -> Result<FlatBlock> {
    let block: AnaliseBlock = parse(raw)?;
    let data = json!({
        "pontuacao": block.pontuacao.value.as_int(),
        "recomendacao": block.recomendacao.value,
        "responsavelAnalise": block.responsavel_analise.value,
    });
    let evidence = evidence_map([
        ("pontuacao", &block.pontuacao.evidence),
        ("recomendacao", &block.recomendacao.evidence),
        ("responsavelAnalise", &block.responsavel_analise.evidence),
    ]);
    Ok(FlatBlock { data, evidence })
}

fn parse<T: serde::de::DeserializeOwned>(raw: &Value) -> Result<T> {
    serde_json::from_value(raw.clone()).context("block result does not match its schema")
}

fn evidence_map<const N: usize>(entries: [(&str, &Option<Evidence>); N]) -> Value {
    let mut map = Map::new();
    for (key, evidence) in entries {
        if let Some(ev) = evidence {
            if let Ok(v) = serde_json::to_value(ev) {
                map.insert(key.to_string(), v);
            }
        }
    }
    Value::Object(map)
}
