use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::{
    CampoEspecial, CampoMapeado, Contexto, Documento, Elemento, Expressao, FiscalResult, Mapeamento,
    NAMESPACE_CTE, NAMESPACE_NFE, NotaFiscal, Registro, valor_texto,
};

/// Tributos com colunas próprias no relatório.
pub const IMPOSTOS_PRINCIPAIS: [&str; 5] = ["ICMS", "IPI", "PIS", "COFINS", "ISSQN"];

const SEPARADOR_IMPOSTOS: &str = ", ";

/// Primeiro valor textual da expressão avaliada sobre o documento inteiro.
fn valor_no_documento(doc: &Documento, expressao: &str) -> Option<String> {
    let valor = Expressao::parse(expressao).avaliar(Contexto::Documento(doc));
    match valor {
        Value::Array(lista) => lista.first().and_then(valor_texto),
        outro => valor_texto(&outro),
    }
}

/// Classifica o documento em `mercadoria`, `serviço` ou `CT-e`.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::{Documento, tipo_documento};
///
/// let nfe = Documento::parse("<NFe><infNFe><ide><mod>65</mod></ide></infNFe></NFe>").unwrap();
/// assert_eq!(tipo_documento(&nfe), Some("mercadoria"));
///
/// let nfse = Documento::parse(
///     r#"<CompNfse xmlns="http://www.abrasf.org.br/nfse.xsd"><Numero>1</Numero></CompNfse>"#,
/// ).unwrap();
/// assert_eq!(tipo_documento(&nfse), Some("serviço"));
/// ```
pub fn tipo_documento(doc: &Documento) -> Option<&'static str> {
    match doc.namespace.as_deref() {
        Some(NAMESPACE_CTE) => return Some("CT-e"),
        Some(ns) if ns != NAMESPACE_NFE => return Some("serviço"),
        _ => {}
    }

    match valor_no_documento(doc, "infNFe/ide/mod ou infCte/ide/mod").as_deref() {
        Some("55" | "65") => return Some("mercadoria"),
        Some("57") => return Some("CT-e"),
        _ => {}
    }

    if doc.raiz.tag == "NCM" || doc.raiz.contem("NCM") {
        Some("mercadoria")
    } else if doc.raiz.tag == "ISSQN" || doc.raiz.contem("ISSQN") {
        Some("serviço")
    } else {
        None
    }
}

/// Nomes das tags filhas de `imposto` no item.
fn tags_de_imposto(det: &Elemento) -> Vec<&str> {
    det.filho("imposto")
        .map(|imposto| imposto.filhos.iter().map(|f| f.tag.as_str()).collect())
        .unwrap_or_default()
}

/// Todos os tributos do item separados por vírgula (ex: `ICMS, IPI, PIS, COFINS`).
pub fn todos_impostos(det: &Elemento) -> Option<String> {
    let tags = tags_de_imposto(det);
    (!tags.is_empty()).then(|| tags.join(SEPARADOR_IMPOSTOS))
}

/// Tributos do item além de ICMS, IPI, PIS, COFINS e ISSQN (ex: `IBSCBS, IS`).
pub fn outros_impostos(det: &Elemento) -> Option<String> {
    let tags: Vec<&str> = tags_de_imposto(det)
        .into_iter()
        .filter(|tag| !IMPOSTOS_PRINCIPAIS.contains(tag))
        .collect();
    (!tags.is_empty()).then(|| tags.join(SEPARADOR_IMPOSTOS))
}

/// Campos da nota usados na regra de DIFAL, lidos uma vez por documento.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DifalNota {
    pub ind_final: Option<String>,
    pub uf_emit: Option<String>,
    pub uf_dest: Option<String>,
    pub ind_ie_dest: Option<String>,
}

impl DifalNota {
    pub fn extrair(doc: &Documento) -> Self {
        let difal = DifalNota {
            ind_final: valor_no_documento(doc, "infNFe/ide/indFinal"),
            uf_emit: valor_no_documento(doc, "infNFe/emit/enderEmit/UF"),
            uf_dest: valor_no_documento(doc, "infNFe/dest/enderDest/UF"),
            ind_ie_dest: valor_no_documento(doc, "infNFe/dest/indIEDest"),
        };

        debug!(?difal, "campos de DIFAL da nota");

        difal
    }

    /// Operação interestadual para consumidor final não contribuinte
    /// (`indFinal = 1`, UFs distintas e `indIEDest = 9`).
    pub fn nao_contribuinte_interestadual(&self) -> bool {
        let interestadual = match (&self.uf_emit, &self.uf_dest) {
            (Some(emit), Some(dest)) => emit != dest,
            _ => false,
        };

        self.ind_final.as_deref() == Some("1")
            && interestadual
            && self.ind_ie_dest.as_deref() == Some("9")
    }
}

/// Indica DIFAL no item: `"1"` ou `"0"`.
///
/// Há DIFAL quando o item traz o grupo `ICMSUFDest`, ou quando a nota é
/// interestadual para consumidor final não contribuinte.
pub fn verificar_difal(nota: &DifalNota, det: &Elemento) -> &'static str {
    if det.contem("ICMSUFDest") || nota.nao_contribuinte_interestadual() {
        "1"
    } else {
        "0"
    }
}

/// Tag do primeiro filho de cada elemento selecionado (ex: `ICMS` -> `ICMS60`).
fn valor_bloco(elementos: Vec<&Elemento>) -> Value {
    let mut tags: Vec<Value> = elementos
        .iter()
        .map(|e| {
            e.filhos
                .first()
                .map_or(Value::Null, |f| Value::String(f.tag.clone()))
        })
        .collect();

    match tags.len() {
        0 => Value::Null,
        1 => tags.remove(0),
        _ => Value::Array(tags),
    }
}

/// Um valor por item: escalar para um item, lista para vários.
fn por_item(doc: &Documento, calcular: impl Fn(&Elemento) -> Value) -> Value {
    let mut valores: Vec<Value> = doc.itens().into_iter().map(calcular).collect();

    match valores.len() {
        0 => Value::Null,
        1 => valores.remove(0),
        _ => Value::Array(valores),
    }
}

fn texto_ou_nulo(texto: Option<String>) -> Value {
    texto.map_or(Value::Null, Value::String)
}

fn valor_especial(
    doc: &Documento,
    difal: &DifalNota,
    especial: CampoEspecial,
    det: Option<&Elemento>,
) -> Value {
    match (especial, det) {
        (CampoEspecial::NamespaceRaiz, _) => texto_ou_nulo(doc.namespace.clone()),
        (CampoEspecial::TipoDocumento, _) => texto_ou_nulo(tipo_documento(doc).map(String::from)),
        (CampoEspecial::TodosImpostos, Some(det)) => texto_ou_nulo(todos_impostos(det)),
        (CampoEspecial::OutrosImpostos, Some(det)) => texto_ou_nulo(outros_impostos(det)),
        (CampoEspecial::TemDifal, Some(det)) => Value::from(verificar_difal(difal, det)),
        // Campos de item sem `det`: um valor por item da nota
        (CampoEspecial::TodosImpostos, None) => {
            por_item(doc, |det| texto_ou_nulo(todos_impostos(det)))
        }
        (CampoEspecial::OutrosImpostos, None) => {
            por_item(doc, |det| texto_ou_nulo(outros_impostos(det)))
        }
        (CampoEspecial::TemDifal, None) => {
            por_item(doc, |det| Value::from(verificar_difal(difal, det)))
        }
    }
}

fn avaliar_campo(
    doc: &Documento,
    difal: &DifalNota,
    campo: &CampoMapeado,
    det: Option<&Elemento>,
) -> Value {
    if let Some(especial) = campo.especial {
        return valor_especial(doc, difal, especial, det);
    }

    let (expressao, contexto) = match det {
        Some(det) => (
            &campo.expressao_item,
            Contexto::Item { documento: doc, det },
        ),
        None => (&campo.expressao, Contexto::Documento(doc)),
    };

    if campo.eh_bloco() {
        valor_bloco(expressao.elementos(contexto))
    } else {
        expressao.avaliar(contexto)
    }
}

/// Modo plano: um campo por chave do mapeamento, avaliado sobre o documento
/// inteiro. Toda chave declarada está presente (`null` quando não encontrada).
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::{Documento, Mapeamento, mapear_documento};
/// use serde_json::{Value, json};
///
/// let mapeamento = Mapeamento::from_json(r#"{
///     "NUMERO_NF": { "caminho_xml": "infNFe/ide/nNF" },
///     "DEST_UF": { "caminho_xml": "infNFe/dest/enderDest/UF", "target_field": "UF_DESTINO" },
///     "SEM_CAMINHO": { "opcional": true }
/// }"#).unwrap();
///
/// let doc = Documento::parse("<NFe><infNFe><ide><nNF>42</nNF></ide></infNFe></NFe>").unwrap();
/// let registro = mapear_documento(&doc, &mapeamento);
///
/// assert_eq!(registro["NUMERO_NF"], json!("42"));
/// assert_eq!(registro["UF_DESTINO"], Value::Null);
/// assert_eq!(registro["SEM_CAMINHO"], Value::Null);
/// ```
pub fn mapear_documento(doc: &Documento, mapeamento: &Mapeamento) -> Registro {
    let difal = DifalNota::extrair(doc);

    mapeamento
        .campos()
        .iter()
        .map(|campo| (campo.destino.clone(), avaliar_campo(doc, &difal, campo, None)))
        .collect()
}

fn montar_item(
    doc: &Documento,
    difal: &DifalNota,
    mapeamento: &Mapeamento,
    det: Option<&Elemento>,
) -> Registro {
    let mut item: Registro = mapeamento
        .campos_do_item()
        .map(|campo| {
            (
                campo.nome_no_item().to_string(),
                avaliar_campo(doc, difal, campo, det),
            )
        })
        .collect();

    let sem_numero = item.get("NUMERO").is_none_or(Value::is_null);

    if let Some(n_item) = det.and_then(|d| d.atributo("nItem")).filter(|_| sem_numero) {
        item.insert("NUMERO".to_string(), Value::from(n_item));
    }

    item
}

/// Modo estruturado: cabeçalho da nota mais um registro por item (`det`).
///
/// Campos `ITEM_*` são avaliados relativos a cada `det`. Uma nota sem `det`
/// (NFS-e, CT-e) gera um único item avaliado sobre o documento inteiro.
pub fn processar_nota(doc: &Documento, mapeamento: &Mapeamento) -> NotaFiscal {
    let difal = DifalNota::extrair(doc);

    let cabecalho: Registro = mapeamento
        .campos_da_nota()
        .map(|campo| (campo.destino.clone(), avaliar_campo(doc, &difal, campo, None)))
        .collect();

    let dets = doc.itens();

    let itens = if dets.is_empty() {
        vec![montar_item(doc, &difal, mapeamento, None)]
    } else {
        dets.into_iter()
            .map(|det| montar_item(doc, &difal, mapeamento, Some(det)))
            .collect()
    };

    NotaFiscal {
        cabecalho,
        itens,
        xml_filename: None,
    }
}

fn nome_do_arquivo(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lê um arquivo XML e extrai a nota estruturada.
pub fn processar_arquivo(path: &Path, mapeamento: &Mapeamento) -> FiscalResult<NotaFiscal> {
    let doc = Documento::from_path(path)?;

    let mut nota = processar_nota(&doc, mapeamento);
    nota.xml_filename = Some(nome_do_arquivo(path));

    debug!(
        arquivo = %path.display(),
        itens = nota.itens.len(),
        "nota processada"
    );

    Ok(nota)
}

/// Lê um arquivo XML e extrai o registro plano.
pub fn processar_arquivo_plano(path: &Path, mapeamento: &Mapeamento) -> FiscalResult<Registro> {
    let doc = Documento::from_path(path)?;

    let mut registro = mapear_documento(&doc, mapeamento);
    registro.insert(
        "xml_filename".to_string(),
        Value::String(nome_do_arquivo(path)),
    );

    Ok(registro)
}

/// Aplica `processar` em paralelo; arquivos com erro são registrados e ignorados.
/// A ordem de saída segue a ordem de `arquivos`.
fn processar_em_paralelo<T, F>(arquivos: &[PathBuf], processar: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Path) -> FiscalResult<T> + Sync,
{
    arquivos
        .par_iter()
        .filter_map(|path| {
            processar(path)
                .map_err(|e| {
                    error!(arquivo = %path.display(), "{e}");
                    e
                })
                .ok()
        })
        .collect()
}

/// Processa todos os arquivos XML (modo estruturado).
pub fn processar_pasta(arquivos: &[PathBuf], mapeamento: &Mapeamento) -> Vec<NotaFiscal> {
    processar_em_paralelo(arquivos, |path| processar_arquivo(path, mapeamento))
}

/// Processa todos os arquivos XML (modo plano).
pub fn processar_pasta_plano(arquivos: &[PathBuf], mapeamento: &Mapeamento) -> Vec<Registro> {
    processar_em_paralelo(arquivos, |path| processar_arquivo_plano(path, mapeamento))
}
