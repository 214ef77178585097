use quick_xml::{
    Reader,
    encoding::Decoder,
    events::{BytesStart, Event},
};
use std::{fs, io::BufRead, path::Path};

use crate::{FiscalError, FiscalResult};

/// Namespace das NF-e/NFC-e (modelos 55 e 65).
pub const NAMESPACE_NFE: &str = "http://www.portalfiscal.inf.br/nfe";

/// Namespace dos CT-e (modelo 57).
pub const NAMESPACE_CTE: &str = "http://www.portalfiscal.inf.br/cte";

/// Elemento XML com os nomes já sem prefixo de namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Elemento {
    pub tag: String,
    pub atributos: Vec<(String, String)>,
    /// Texto direto do elemento (sem espaços nas bordas). `None` quando vazio.
    pub texto: Option<String>,
    pub filhos: Vec<Elemento>,
}

impl Elemento {
    fn novo(tag: String, atributos: Vec<(String, String)>) -> Self {
        Elemento {
            tag,
            atributos,
            texto: None,
            filhos: Vec::new(),
        }
    }

    pub fn atributo(&self, nome: &str) -> Option<&str> {
        self.atributos
            .iter()
            .find(|(chave, _)| chave == nome)
            .map(|(_, valor)| valor.as_str())
    }

    /// Primeiro filho direto com a tag informada.
    pub fn filho(&self, tag: &str) -> Option<&Elemento> {
        self.filhos.iter().find(|f| f.tag == tag)
    }

    /// Todos os descendentes (excluindo o próprio elemento) em ordem de documento.
    pub fn descendentes(&self) -> Vec<&Elemento> {
        let mut saida = Vec::new();
        let mut pilha: Vec<&Elemento> = self.filhos.iter().rev().collect();

        while let Some(atual) = pilha.pop() {
            saida.push(atual);
            pilha.extend(atual.filhos.iter().rev());
        }

        saida
    }

    /// Verifica se existe algum descendente com a tag informada.
    pub fn contem(&self, tag: &str) -> bool {
        self.filhos.iter().any(|f| f.tag == tag || f.contem(tag))
    }

    fn acrescentar_texto(&mut self, trecho: &str) {
        let trecho = trecho.trim();
        if trecho.is_empty() {
            return;
        }
        match &mut self.texto {
            Some(texto) => texto.push_str(trecho),
            None => self.texto = Some(trecho.to_string()),
        }
    }
}

/// Documento fiscal carregado em memória, sem namespaces nas tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Documento {
    pub raiz: Elemento,
    /// Namespace do elemento raiz antes da remoção (ex: `http://www.portalfiscal.inf.br/nfe`).
    pub namespace: Option<String>,
}

impl Documento {
    /// Faz o parsing do texto XML.
    ///
    /// ### Exemplo
    /// ```
    /// use classificar_notas_fiscais::Documento;
    ///
    /// let xml = r#"<nfe:NFe xmlns:nfe="http://www.portalfiscal.inf.br/nfe">
    ///     <nfe:infNFe><nfe:ide><nfe:mod>55</nfe:mod></nfe:ide></nfe:infNFe>
    /// </nfe:NFe>"#;
    ///
    /// let doc = Documento::parse(xml).unwrap();
    /// assert_eq!(doc.raiz.tag, "NFe");
    /// assert_eq!(doc.namespace.as_deref(), Some("http://www.portalfiscal.inf.br/nfe"));
    /// ```
    pub fn parse(xml: &str) -> FiscalResult<Documento> {
        Documento::montar(Reader::from_str(xml.trim_start_matches('\u{feff}')))
    }

    /// Faz o parsing de bytes XML, decodificando conforme o BOM ou a
    /// declaração `encoding` (ex: `ISO-8859-1`). Sem declaração, usa UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> FiscalResult<Documento> {
        Documento::montar(Reader::from_reader(bytes))
    }

    fn montar<R: BufRead>(mut reader: Reader<R>) -> FiscalResult<Documento> {
        let mut buf = Vec::new();
        let mut pilha: Vec<Elemento> = Vec::new();
        let mut raiz: Option<Elemento> = None;
        let mut namespace: Option<String> = None;

        loop {
            buf.clear();
            let evento = reader.read_event_into(&mut buf)?;
            // A declaração XML pode trocar a codificação do leitor
            let decoder = reader.decoder();

            match evento {
                Event::Start(ref e) => {
                    let (elemento, ns) = abrir_elemento(e, decoder)?;
                    if pilha.is_empty() && raiz.is_none() {
                        namespace = ns;
                    }
                    pilha.push(elemento);
                }
                Event::Empty(ref e) => {
                    let (elemento, ns) = abrir_elemento(e, decoder)?;
                    match pilha.last_mut() {
                        Some(pai) => pai.filhos.push(elemento),
                        None if raiz.is_none() => {
                            namespace = ns;
                            raiz = Some(elemento);
                        }
                        None => {}
                    }
                }
                Event::Text(ref e) => {
                    if let Some(atual) = pilha.last_mut() {
                        atual.acrescentar_texto(&e.unescape()?);
                    }
                }
                Event::CData(ref e) => {
                    if let Some(atual) = pilha.last_mut() {
                        let texto = decoder.decode(e).map_err(quick_xml::Error::from)?;
                        atual.acrescentar_texto(&texto);
                    }
                }
                Event::End(_) => {
                    if let Some(fechado) = pilha.pop() {
                        match pilha.last_mut() {
                            Some(pai) => pai.filhos.push(fechado),
                            None if raiz.is_none() => raiz = Some(fechado),
                            None => {}
                        }
                    }
                }
                Event::Eof => break,
                // Declaração, comentários, DOCTYPE e instruções de processamento
                _ => {}
            }
        }

        let raiz = raiz.ok_or(FiscalError::DocumentoVazio)?;

        Ok(Documento { raiz, namespace })
    }

    /// Lê e faz o parsing de um arquivo XML.
    ///
    /// Arquivos em ISO-8859-1 (comuns em notas antigas) são decodificados
    /// pela declaração `encoding`.
    pub fn from_path(path: &Path) -> FiscalResult<Documento> {
        let bytes = fs::read(path).map_err(|e| FiscalError::IoReader {
            source: e,
            arquivo: path.to_path_buf(),
        })?;

        Documento::from_bytes(&bytes).map_err(|e| e.no_arquivo(path.to_path_buf()))
    }

    /// Elementos `det` (itens) da nota, em ordem de documento.
    pub fn itens(&self) -> Vec<&Elemento> {
        let mut itens: Vec<&Elemento> = self
            .raiz
            .descendentes()
            .into_iter()
            .filter(|e| e.tag == "det")
            .collect();

        if self.raiz.tag == "det" {
            itens.insert(0, &self.raiz);
        }

        itens
    }
}

/// Remove o prefixo de namespace (`nfe:infNFe` -> `infNFe`).
fn nome_local(nome: &str) -> String {
    match nome.split_once(':') {
        Some((_, local)) => local.to_string(),
        None => nome.to_string(),
    }
}

fn decodificar(decoder: Decoder, bytes: &[u8]) -> FiscalResult<String> {
    let texto = decoder.decode(bytes).map_err(quick_xml::Error::from)?;
    Ok(texto.into_owned())
}

/// Converte um evento de abertura em `Elemento`, devolvendo também o
/// namespace associado ao prefixo do próprio elemento (se declarado nele).
fn abrir_elemento(e: &BytesStart, decoder: Decoder) -> FiscalResult<(Elemento, Option<String>)> {
    let nome_completo = decodificar(decoder, e.name().as_ref())?;
    let prefixo = nome_completo.split_once(':').map(|(p, _)| p.to_string());

    let mut atributos = Vec::new();
    let mut namespace = None;

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let chave = decodificar(decoder, attr.key.as_ref())?;
        let valor = attr.decode_and_unescape_value(decoder)?.into_owned();

        match (chave.as_str(), prefixo.as_deref()) {
            ("xmlns", None) => namespace = Some(valor),
            (decl, Some(p)) if decl.strip_prefix("xmlns:") == Some(p) => namespace = Some(valor),
            (decl, _) if decl == "xmlns" || decl.starts_with("xmlns:") => {}
            _ => atributos.push((nome_local(&chave), valor)),
        }
    }

    let elemento = Elemento::novo(nome_local(&nome_completo), atributos);

    Ok((elemento, namespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_namespaces_e_preserva_atributos() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
              <NFe>
                <infNFe Id="NFe3124" versao="4.00">
                  <det nItem="1"><prod><NCM>27101921</NCM></prod></det>
                  <det nItem="2"><prod><NCM>22011000</NCM></prod></det>
                </infNFe>
              </NFe>
            </nfeProc>"#;

        let doc = Documento::parse(xml).unwrap();

        assert_eq!(doc.namespace.as_deref(), Some(NAMESPACE_NFE));
        assert_eq!(doc.raiz.tag, "nfeProc");
        assert_eq!(doc.raiz.atributo("versao"), Some("4.00"));

        let itens = doc.itens();
        assert_eq!(itens.len(), 2);
        assert_eq!(itens[1].atributo("nItem"), Some("2"));
    }

    #[test]
    fn texto_com_entidades_e_cdata() {
        let xml = "<infAdic><infCpl>A &amp; B <![CDATA[<C>]]></infCpl><vazio/></infAdic>";
        let doc = Documento::parse(xml).unwrap();

        let inf_cpl = doc.raiz.filho("infCpl").unwrap();
        assert_eq!(inf_cpl.texto.as_deref(), Some("A & B<C>"));
        assert_eq!(doc.raiz.filho("vazio").unwrap().texto, None);
    }

    #[test]
    fn arquivo_latin1_decodificado_pela_declaracao() {
        let mut bytes = br#"<?xml version="1.0" encoding="ISO-8859-1"?>
            <NFe><infNFe><emit><xNome>Jo"#
            .to_vec();
        bytes.push(0xE3); // 'ã' em ISO-8859-1
        bytes.extend_from_slice(b"o Ltda</xNome></emit><ide natOp=\"Devolu");
        bytes.extend_from_slice(&[0xE7, 0xE3]); // "çã"
        bytes.extend_from_slice(b"o\"/></infNFe></NFe>");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.xml");
        fs::write(&path, &bytes).unwrap();

        let doc = Documento::from_path(&path).unwrap();
        let inf_nfe = doc.raiz.filho("infNFe").unwrap();

        let emit = inf_nfe.filho("emit").unwrap();
        assert_eq!(emit.filho("xNome").unwrap().texto.as_deref(), Some("João Ltda"));
        assert_eq!(inf_nfe.filho("ide").unwrap().atributo("natOp"), Some("Devolução"));
    }

    #[test]
    fn bytes_utf8_com_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("<NFe><xNome>Ação</xNome></NFe>".as_bytes());

        let doc = Documento::from_bytes(&bytes).unwrap();
        assert_eq!(doc.raiz.tag, "NFe");
        assert_eq!(doc.raiz.filho("xNome").unwrap().texto.as_deref(), Some("Ação"));
    }

    #[test]
    fn documento_sem_raiz_e_erro() {
        let resultado = Documento::parse("<?xml version=\"1.0\"?>");
        assert!(matches!(resultado, Err(FiscalError::DocumentoVazio)));
    }

    #[test]
    fn xml_malformado_e_erro() {
        assert!(Documento::parse("<a><b></a>").is_err());
    }
}
