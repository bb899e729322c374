//! The eight checklist blocks as a static table: retrieval query, section
//! hints, LLM instruction, output schema and flatten projection. Blocks
//! are data, not trait objects — the pipeline iterates the table.

use anyhow::Result;
use serde_json::Value;

use super::flatten::{
    flatten_analise, flatten_documentos, flatten_edital, flatten_modalidade_participacao,
    flatten_pagamento_contrato, flatten_prazos, flatten_sessao_disputa, flatten_visita_proposta,
    FlatBlock,
};
use super::{schemas, BlockKey};
use crate::parser::{NormalizedChunk, SectionHint};

/// System prompt shared by every block call.
pub const SYSTEM_PROMPT: &str = "Você é um especialista em licitações públicas brasileiras. \
Analise o trecho do edital fornecido e responda em português. \
Retorne apenas JSON válido conforme o schema solicitado. \
Use string vazia quando a informação não constar do documento. \
Em cada campo 'evidence', cite o trecho exato do edital que fundamenta o valor, \
a referência (item ou cláusula) e a página quando conhecida.";

/// One row of the block table.
pub struct BlockSpec {
    pub key: BlockKey,
    /// Canonical retrieval query (pt-BR), expanded with the hint phrases.
    pub query: &'static str,
    /// Section hints that boost matching chunks and expand the query.
    pub hints: &'static [SectionHint],
    /// Instruction prefixed to the block's context.
    pub instruction: &'static str,
    pub schema: fn() -> Value,
    pub flatten: fn(&Value) -> Result<FlatBlock>,
}

pub static BLOCKS: [BlockSpec; 8] = [
    BlockSpec {
        key: BlockKey::Edital,
        query: "órgão licitante, objeto da licitação, número do edital, processo administrativo e valor total estimado",
        hints: &[SectionHint::Edital],
        instruction: "Identifique o edital: órgão responsável, objeto licitado, número do edital, \
            número do processo, valor total estimado e data de abertura.",
        schema: schemas::edital,
        flatten: flatten_edital,
    },
    BlockSpec {
        key: BlockKey::ModalidadeParticipacao,
        query: "modalidade da licitação e condições de participação de ME, EPP, MEI, consórcios e cooperativas",
        hints: &[SectionHint::Modalidade],
        instruction: "Determine a modalidade da licitação e as condições de participação: \
            MEI, ME/EPP, participação exclusiva de ME/EPP, consórcios, cooperativas e subcontratação.",
        schema: schemas::modalidade_participacao,
        flatten: flatten_modalidade_participacao,
    },
    BlockSpec {
        key: BlockKey::Prazos,
        query: "prazos de impugnação, esclarecimentos, recursos, validade da proposta e datas de abertura",
        hints: &[SectionHint::Prazos],
        instruction: "Extraia os prazos do certame: data e hora de abertura, prazo de impugnação, \
            prazo para esclarecimentos, prazo recursal, validade da proposta e vigência do contrato.",
        schema: schemas::prazos,
        flatten: flatten_prazos,
    },
    BlockSpec {
        key: BlockKey::Documentos,
        query: "documentos exigidos para habilitação jurídica, fiscal, trabalhista, técnica e econômico-financeira",
        hints: &[SectionHint::Documentos],
        instruction: "Liste todos os documentos de habilitação exigidos, um requisito por item, \
            com categoria (jurídica, fiscal, técnica, econômico-financeira, outros), \
            nome do documento, referência no edital e se é obrigatório.",
        schema: schemas::documentos,
        flatten: flatten_documentos,
    },
    BlockSpec {
        key: BlockKey::VisitaProposta,
        query: "visita técnica obrigatória ou facultativa e requisitos de apresentação da proposta",
        hints: &[SectionHint::Proposta],
        instruction: "Informe se há visita técnica (e sua data) e os requisitos da proposta: \
            validade, forma de apresentação e critério de julgamento.",
        schema: schemas::visita_proposta,
        flatten: flatten_visita_proposta,
    },
    BlockSpec {
        key: BlockKey::SessaoDisputa,
        query: "data, horário e plataforma da sessão pública de disputa de lances",
        hints: &[SectionHint::SessaoDisputa],
        instruction: "Descreva a sessão pública: data, hora, plataforma (ex. comprasnet, BLL), \
            modo de disputa e intervalo mínimo entre lances.",
        schema: schemas::sessao_disputa,
        flatten: flatten_sessao_disputa,
    },
    BlockSpec {
        key: BlockKey::PagamentoContrato,
        query: "condições de pagamento, dotação orçamentária, garantias e reajuste do contrato",
        hints: &[SectionHint::Pagamento],
        instruction: "Extraia as condições contratuais: mecanismo e prazo de pagamento, \
            dotação orçamentária, garantia contratual exigida e critério de reajuste.",
        schema: schemas::pagamento_contrato,
        flatten: flatten_pagamento_contrato,
    },
    BlockSpec {
        key: BlockKey::Analise,
        query: "síntese do edital para análise de viabilidade de participação na licitação",
        hints: &[SectionHint::Analise, SectionHint::Edital],
        instruction: "Com base no conteúdo, atribua uma pontuação de 0 a 100 para a atratividade \
            da licitação e uma recomendação curta de participação.",
        schema: schemas::analise,
        flatten: flatten_analise,
    },
];

impl BlockSpec {
    /// Retrieval query: canonical query plus the hint phrases.
    pub fn search_query(&self) -> String {
        let mut query = self.query.to_string();
        for hint in self.hints {
            query.push_str(". ");
            query.push_str(hint.query_phrase());
        }
        query
    }

    /// User payload for the text-mode call: instruction plus the retrieved
    /// chunks, each tagged with its page for evidence references.
    pub fn user_prompt(&self, chunks: &[&NormalizedChunk]) -> String {
        let mut prompt = String::from(self.instruction);
        prompt.push_str("\n\nTrechos do edital:\n");
        for chunk in chunks {
            match chunk.page_number {
                Some(page) => prompt.push_str(&format!("\n--- [página {page}] ---\n")),
                None => prompt.push_str("\n--- [página desconhecida] ---\n"),
            }
            prompt.push_str(&chunk.text);
            prompt.push('\n');
        }
        prompt
    }

    pub fn schema_name(&self) -> String {
        format!("checklist_{}", self.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_follow_merge_order() {
        // The table order IS the merge order; overlapping keys (e.g.
        // modalidadeLicitacao) resolve in favour of the earlier block.
        let table: Vec<&str> = BLOCKS.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(
            table,
            vec![
                "edital",
                "modalidade_participacao",
                "prazos",
                "documentos",
                "visita_proposta",
                "sessao_disputa",
                "pagamento_contrato",
                "analise",
            ]
        );
    }

    #[test]
    fn test_search_query_expands_hints() {
        let documentos = &BLOCKS[3];
        let query = documentos.search_query();
        assert!(query.starts_with(documentos.query));
        assert!(query.contains("documentos de habilitação exigidos"));
    }

    #[test]
    fn test_user_prompt_tags_pages() {
        let chunk = NormalizedChunk {
            id: 0,
            text: "DO OBJETO: aquisição de material".into(),
            page_number: Some(3),
            section_hint: None,
            embedding: Vec::new(),
        };
        let untagged = NormalizedChunk {
            id: 1,
            text: "linha de planilha".into(),
            page_number: None,
            section_hint: None,
            embedding: Vec::new(),
        };
        let prompt = BLOCKS[0].user_prompt(&[&chunk, &untagged]);
        assert!(prompt.contains("[página 3]"));
        assert!(prompt.contains("[página desconhecida]"));
        assert!(prompt.contains("DO OBJETO"));
    }

    #[test]
    fn test_every_block_has_schema_and_flatten() {
        for block in &BLOCKS {
            let schema = (block.schema)();
            assert_eq!(schema["type"], "object", "{}", block.key.as_str());
            // An all-defaults value must flatten cleanly: the providers are
            // told to use empty strings, not omissions, but both work.
            let flat = (block.flatten)(&serde_json::json!({})).unwrap();
            assert!(flat.data.is_object());
        }
    }

    #[test]
    fn test_schema_names_are_distinct() {
        let names: std::collections::HashSet<String> =
            BLOCKS.iter().map(|b| b.schema_name()).collect();
        assert_eq!(names.len(), BLOCKS.len());
    }
}
