use serde_json::Value;
use std::ptr;

use crate::{Documento, Elemento, RE_PRESENCA};

/// Separador de caminhos alternativos no mapeamento.
pub const SEPARADOR_ALTERNATIVAS: &str = " ou ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eixo {
    Filho,
    Descendente,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Teste {
    Nome(String),
    /// `*`: qualquer elemento
    Qualquer,
    /// `ICMS*`: qualquer elemento cuja tag comece com o prefixo
    Prefixo(String),
}

impl Teste {
    fn aceita(&self, tag: &str) -> bool {
        match self {
            Teste::Nome(nome) => nome == tag,
            Teste::Qualquer => true,
            Teste::Prefixo(prefixo) => tag.starts_with(prefixo.as_str()),
        }
    }

    fn eh_curinga(&self) -> bool {
        matches!(self, Teste::Qualquer | Teste::Prefixo(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Passo {
    eixo: Eixo,
    teste: Teste,
}

/// Onde a avaliação de um caminho começa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ancora {
    /// Raiz do documento (`/nfeProc/NFe`)
    Documento,
    /// Elemento de contexto (o documento inteiro ou um item `det`)
    Contexto,
}

/// Caminho XML simplificado: passos de filho (`a/b`), descendente (`a//b`),
/// curinga final (`imposto/*`) e atributo final (`det/@nItem`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caminho {
    ancora: Ancora,
    passos: Vec<Passo>,
    atributo: Option<String>,
}

impl Caminho {
    /// Interpreta um caminho. Caminhos sem `/` inicial são procurados em
    /// qualquer nível (equivalente a `//caminho`).
    ///
    /// Retorna `None` para expressões que não podem ser avaliadas
    /// (passo vazio no fim, `@` sem nome, predicados `[...]`).
    pub fn parse(texto: &str) -> Option<Caminho> {
        let texto = texto.trim();
        if texto.is_empty() {
            return None;
        }

        let (ancora, eixo_inicial, resto) = if let Some(resto) = texto.strip_prefix("//") {
            (Ancora::Contexto, Eixo::Descendente, resto)
        } else if let Some(resto) = texto.strip_prefix('/') {
            (Ancora::Documento, Eixo::Filho, resto)
        } else if let Some(resto) = texto.strip_prefix(".//") {
            (Ancora::Contexto, Eixo::Descendente, resto)
        } else if let Some(resto) = texto.strip_prefix("./") {
            (Ancora::Contexto, Eixo::Filho, resto)
        } else if texto == "." {
            (Ancora::Contexto, Eixo::Filho, "")
        } else {
            (Ancora::Contexto, Eixo::Descendente, texto)
        };

        let mut passos = Vec::new();
        let mut atributo = None;
        let mut eixo = eixo_inicial;
        let segmentos: Vec<&str> = if resto.is_empty() {
            Vec::new()
        } else {
            resto.split('/').collect()
        };
        let ultimo = segmentos.len().saturating_sub(1);

        for (i, segmento) in segmentos.iter().enumerate() {
            let segmento = segmento.trim();

            if segmento.is_empty() {
                // "a//b": o próximo passo é descendente
                if i == ultimo {
                    return None;
                }
                eixo = Eixo::Descendente;
                continue;
            }

            if segmento == "." {
                continue;
            }

            if let Some(nome) = segmento.strip_prefix('@') {
                if i != ultimo || nome.is_empty() {
                    return None;
                }
                atributo = Some(nome.to_string());
                continue;
            }

            if segmento.contains(['[', ']', '(', ')', ' ', '=']) {
                return None;
            }

            let teste = match segmento {
                "*" => Teste::Qualquer,
                s if s.ends_with('*') => Teste::Prefixo(s.trim_end_matches('*').to_string()),
                s => Teste::Nome(s.to_string()),
            };

            passos.push(Passo { eixo, teste });
            eixo = Eixo::Filho;
        }

        // "./@x" e "." referem-se ao próprio contexto
        if passos.is_empty() && atributo.is_none() && texto != "." {
            return None;
        }

        Some(Caminho {
            ancora,
            passos,
            atributo,
        })
    }

    /// Indica se o último passo é um curinga (o valor extraído é o nome da tag).
    pub fn termina_em_curinga(&self) -> bool {
        self.atributo.is_none() && self.passos.last().is_some_and(|p| p.teste.eh_curinga())
    }

    /// Elementos selecionados, em ordem de documento e sem repetição.
    pub fn selecionar<'a>(&self, contexto: Contexto<'a>) -> Vec<&'a Elemento> {
        let inicio = match (self.ancora, contexto) {
            (Ancora::Documento, ctx) => No::Documento(ctx.raiz()),
            (Ancora::Contexto, Contexto::Documento(doc)) => No::Documento(&doc.raiz),
            (Ancora::Contexto, Contexto::Item { det, .. }) => No::Elemento(det),
        };

        if self.passos.is_empty() {
            return vec![inicio.elemento()];
        }

        let mut atuais = vec![inicio];

        for passo in &self.passos {
            let mut proximos: Vec<&'a Elemento> = Vec::new();

            for no in &atuais {
                let candidatos = match passo.eixo {
                    Eixo::Filho => no.filhos(),
                    Eixo::Descendente => no.descendentes(),
                };

                for candidato in candidatos {
                    if passo.teste.aceita(&candidato.tag)
                        && !proximos.iter().any(|p| ptr::eq(*p, candidato))
                    {
                        proximos.push(candidato);
                    }
                }
            }

            if proximos.is_empty() {
                return Vec::new();
            }

            atuais = proximos.into_iter().map(No::Elemento).collect();
        }

        atuais.into_iter().map(|no| no.elemento()).collect()
    }

    /// Valores textuais do caminho: nomes de tag (curinga), atributos ou textos.
    pub fn valores(&self, contexto: Contexto) -> Vec<String> {
        let elementos = self.selecionar(contexto);

        if let Some(nome) = &self.atributo {
            return elementos
                .iter()
                .filter_map(|e| e.atributo(nome))
                .map(String::from)
                .collect();
        }

        if self.termina_em_curinga() {
            return elementos.iter().map(|e| e.tag.clone()).collect();
        }

        elementos
            .iter()
            .filter_map(|e| e.texto.clone())
            .collect()
    }
}

/// Ponto de partida da avaliação.
#[derive(Debug, Clone, Copy)]
pub enum Contexto<'a> {
    /// Documento inteiro
    Documento(&'a Documento),
    /// Um item (`det`) da nota; caminhos absolutos continuam ancorados na raiz.
    Item {
        documento: &'a Documento,
        det: &'a Elemento,
    },
}

impl<'a> Contexto<'a> {
    fn raiz(&self) -> &'a Elemento {
        match self {
            Contexto::Documento(doc) => &doc.raiz,
            Contexto::Item { documento, .. } => &documento.raiz,
        }
    }
}

/// Nó de avaliação: o nó-documento (pai virtual da raiz) ou um elemento.
#[derive(Debug, Clone, Copy)]
enum No<'a> {
    Documento(&'a Elemento),
    Elemento(&'a Elemento),
}

impl<'a> No<'a> {
    fn elemento(&self) -> &'a Elemento {
        match self {
            No::Documento(raiz) | No::Elemento(raiz) => raiz,
        }
    }

    fn filhos(&self) -> Vec<&'a Elemento> {
        match self {
            No::Documento(raiz) => vec![*raiz],
            No::Elemento(e) => e.filhos.iter().collect(),
        }
    }

    fn descendentes(&self) -> Vec<&'a Elemento> {
        match self {
            No::Documento(raiz) => {
                let mut todos = vec![*raiz];
                todos.extend(raiz.descendentes());
                todos
            }
            No::Elemento(e) => e.descendentes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Alternativa {
    /// "presença de X": verdadeiro se X existir
    Presenca(Caminho),
    Valor(Caminho),
}

/// Expressão de extração do mapeamento: alternativas separadas por `" ou "`.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::{Contexto, Documento, Expressao};
/// use serde_json::{Value, json};
///
/// let doc = Documento::parse(
///     "<NFe><infNFe><emit><CPF>12345678901</CPF></emit></infNFe></NFe>",
/// ).unwrap();
/// let ctx = Contexto::Documento(&doc);
///
/// let emissor = Expressao::parse("infNFe/emit/CNPJ ou infNFe/emit/CPF");
/// assert_eq!(emissor.avaliar(ctx), json!("12345678901"));
///
/// let issqn = Expressao::parse("presença de infNFe/det/imposto/ISSQN");
/// assert_eq!(issqn.avaliar(ctx), Value::Bool(false));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expressao {
    alternativas: Vec<Alternativa>,
}

impl Expressao {
    pub fn parse(texto: &str) -> Expressao {
        Expressao::construir(texto, Caminho::parse)
    }

    /// Interpreta a expressão para avaliação relativa a um item (`det`):
    /// o trecho do caminho até `det/` é removido. Caminhos que não passam
    /// por `det` continuam sendo avaliados sobre o documento inteiro.
    pub fn parse_item(texto: &str) -> Expressao {
        Expressao::construir(texto, caminho_do_item)
    }

    fn construir(texto: &str, interpretar: impl Fn(&str) -> Option<Caminho>) -> Expressao {
        let alternativas = texto
            .split(SEPARADOR_ALTERNATIVAS)
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .filter_map(|alt| {
                if let Some(m) = RE_PRESENCA.find(alt) {
                    let caminho = alt[m.end()..].trim();
                    return interpretar(caminho).map(Alternativa::Presenca);
                }

                // Textos descritivos ("não se aplica", "valor fixo") não são caminhos
                if alt.contains(' ') && !alt.contains('/') {
                    return None;
                }

                interpretar(alt).map(Alternativa::Valor)
            })
            .collect();

        Expressao { alternativas }
    }

    pub fn is_empty(&self) -> bool {
        self.alternativas.is_empty()
    }

    /// Avalia as alternativas em ordem e retorna o primeiro valor encontrado.
    ///
    /// - presença: `true` quando encontrada; `false` se nenhuma alternativa
    ///   encontrou valor e ao menos uma verificação de presença foi feita;
    /// - um único valor: texto; vários valores: lista;
    /// - nada encontrado: `null`.
    pub fn avaliar(&self, contexto: Contexto) -> Value {
        let mut valor = Value::Null;

        for alternativa in &self.alternativas {
            match alternativa {
                Alternativa::Presenca(caminho) => {
                    if !caminho.selecionar(contexto).is_empty() {
                        return Value::Bool(true);
                    }
                    if valor.is_null() {
                        valor = Value::Bool(false);
                    }
                }
                Alternativa::Valor(caminho) => {
                    let valores = caminho.valores(contexto);
                    if !valores.is_empty() {
                        return escalar_ou_lista(valores);
                    }
                }
            }
        }

        valor
    }

    /// Elementos da primeira alternativa que selecionar algo (campos `_BLOCO`).
    pub fn elementos<'a>(&self, contexto: Contexto<'a>) -> Vec<&'a Elemento> {
        self.alternativas
            .iter()
            .map(|alt| match alt {
                Alternativa::Presenca(c) | Alternativa::Valor(c) => c.selecionar(contexto),
            })
            .find(|elementos| !elementos.is_empty())
            .unwrap_or_default()
    }
}

/// Um valor vira texto; vários viram lista.
pub fn escalar_ou_lista(mut valores: Vec<String>) -> Value {
    match valores.len() {
        0 => Value::Null,
        1 => Value::String(valores.remove(0)),
        _ => Value::Array(valores.into_iter().map(Value::String).collect()),
    }
}

/// `infNFe/det/imposto/ICMS` -> `./imposto/ICMS`; `infNFe/det/@nItem` -> `./@nItem`.
fn caminho_do_item(caminho: &str) -> Option<Caminho> {
    if caminho.starts_with('.') {
        return Caminho::parse(caminho);
    }

    let segmentos: Vec<&str> = caminho.trim_start_matches('/').split('/').collect();

    match segmentos.iter().position(|s| *s == "det") {
        Some(i) if i + 1 == segmentos.len() => Caminho::parse("."),
        Some(i) => Caminho::parse(&format!("./{}", segmentos[i + 1..].join("/"))),
        // Campo da nota: repetido em cada item
        None => Caminho::parse(caminho).map(|mut c| {
            c.ancora = Ancora::Documento;
            c
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NFE: &str = r#"
        <nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
          <NFe>
            <infNFe>
              <ide><mod>55</mod><indFinal>1</indFinal></ide>
              <emit><CNPJ>11222333000181</CNPJ><enderEmit><UF>MG</UF></enderEmit></emit>
              <det nItem="1">
                <prod><NCM>27101921</NCM><CFOP>5656</CFOP></prod>
                <imposto>
                  <ICMS><ICMS61><CST>61</CST><qBCMonoRet>100.00</qBCMonoRet></ICMS61></ICMS>
                  <PIS><PISNT><CST>04</CST></PISNT></PIS>
                </imposto>
              </det>
              <det nItem="2">
                <prod><NCM>22011000</NCM><CFOP>5102</CFOP></prod>
                <imposto>
                  <ICMS><ICMS00><CST>00</CST></ICMS00></ICMS>
                  <ISSQN><vBC>10.00</vBC></ISSQN>
                </imposto>
              </det>
            </infNFe>
          </NFe>
        </nfeProc>"#;

    fn doc() -> Documento {
        Documento::parse(NFE).unwrap()
    }

    #[test]
    fn varios_valores_viram_lista() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        assert_eq!(
            Expressao::parse("infNFe/det/prod/CFOP").avaliar(ctx),
            json!(["5656", "5102"])
        );
        assert_eq!(Expressao::parse("infNFe/ide/mod").avaliar(ctx), json!("55"));
    }

    #[test]
    fn curinga_retorna_nome_da_tag() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        assert_eq!(
            Expressao::parse("infNFe/det/imposto/ICMS/*").avaliar(ctx),
            json!(["ICMS61", "ICMS00"])
        );
        assert_eq!(
            Expressao::parse("imposto/PIS/PIS*").avaliar(ctx),
            json!("PISNT")
        );
    }

    #[test]
    fn caminho_absoluto_e_atributo() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        assert_eq!(
            Expressao::parse("/nfeProc/NFe/infNFe/ide/indFinal").avaliar(ctx),
            json!("1")
        );
        assert_eq!(Expressao::parse("/NFe/infNFe/ide/indFinal").avaliar(ctx), Value::Null);
        assert_eq!(
            Expressao::parse("infNFe/det/@nItem").avaliar(ctx),
            json!(["1", "2"])
        );
    }

    #[test]
    fn alternativas_e_textos_descritivos() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        let expr = Expressao::parse("não se aplica ou infNFe/emit/CPF ou infNFe/emit/CNPJ");
        assert_eq!(expr.avaliar(ctx), json!("11222333000181"));

        assert!(Expressao::parse("campo calculado").is_empty());
    }

    #[test]
    fn presenca_verdadeira_falsa_e_nula() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        assert_eq!(
            Expressao::parse("Presença de infNFe/det/imposto/ISSQN").avaliar(ctx),
            Value::Bool(true)
        );
        assert_eq!(
            Expressao::parse("presença de ICMSUFDest ou infNFe/ide/xpto").avaliar(ctx),
            Value::Bool(false)
        );
        assert_eq!(Expressao::parse("infNFe/ide/xpto").avaliar(ctx), Value::Null);
    }

    #[test]
    fn avaliacao_relativa_ao_item() {
        let doc = doc();
        let itens = doc.itens();

        let cst = Expressao::parse_item("infNFe/det/imposto/ICMS/*/CST");
        let numero = Expressao::parse_item("infNFe/det/@nItem");
        let uf = Expressao::parse_item("infNFe/emit/enderEmit/UF");
        let issqn = Expressao::parse_item("presença de infNFe/det/imposto/ISSQN");

        let primeiro = Contexto::Item { documento: &doc, det: itens[0] };
        let segundo = Contexto::Item { documento: &doc, det: itens[1] };

        assert_eq!(cst.avaliar(primeiro), json!("61"));
        assert_eq!(cst.avaliar(segundo), json!("00"));
        assert_eq!(numero.avaliar(segundo), json!("2"));
        assert_eq!(uf.avaliar(primeiro), json!("MG"));
        assert_eq!(issqn.avaliar(primeiro), Value::Bool(false));
        assert_eq!(issqn.avaliar(segundo), Value::Bool(true));
    }

    #[test]
    fn descendente_no_meio_do_caminho() {
        let doc = doc();
        let ctx = Contexto::Documento(&doc);

        assert_eq!(
            Expressao::parse("infNFe//qBCMonoRet").avaliar(ctx),
            json!("100.00")
        );
        assert_eq!(Expressao::parse(".//ISSQN/vBC").avaliar(ctx), json!("10.00"));
    }

    #[test]
    fn expressoes_invalidas_sao_ignoradas() {
        assert!(Caminho::parse("infNFe/det[1]/prod").is_none());
        assert!(Caminho::parse("infNFe/").is_none());
        assert!(Caminho::parse("infNFe/@").is_none());
        assert!(Caminho::parse("infNFe/@Id/x").is_none());
        assert!(Caminho::parse("").is_none());
    }
}
