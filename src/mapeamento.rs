use serde::Deserialize;
use serde_json::{Map, Value};
use std::{fs, path::Path};

use crate::{Expressao, FiscalError, FiscalResult};

/// Mapeamento embutido no binário (usado quando `--mapeamento` não é informado).
pub const MAPEAMENTO_PADRAO: &str = include_str!("../config/mapping_config.json");

/// Prefixo dos campos de item no mapeamento.
pub const PREFIXO_ITEM: &str = "ITEM_";

/// Sufixo dos campos cujo valor é o nome do primeiro filho do elemento (ex: `ICMS60`).
pub const SUFIXO_BLOCO: &str = "_BLOCO";

/// Configuração de um campo, como escrita no JSON de mapeamento.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigCampo {
    #[serde(default)]
    pub caminho_xml: Option<String>,
    #[serde(default)]
    pub target_field: Option<String>,
    #[serde(default)]
    pub opcional: bool,
}

/// Campos cujo valor é calculado a partir do documento, e não lido de um caminho.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampoEspecial {
    NamespaceRaiz,
    TipoDocumento,
    TodosImpostos,
    OutrosImpostos,
    TemDifal,
}

impl CampoEspecial {
    pub fn from_chave(chave: &str) -> Option<CampoEspecial> {
        match chave {
            "NAMESPACE_RAIZ" => Some(CampoEspecial::NamespaceRaiz),
            "TIPO_DOCUMENTO" => Some(CampoEspecial::TipoDocumento),
            "ITEM_TODOS_IMPOSTOS" => Some(CampoEspecial::TodosImpostos),
            "ITEM_OUTROS_IMPOSTOS" => Some(CampoEspecial::OutrosImpostos),
            "ITEM_TEM_DIFAL" => Some(CampoEspecial::TemDifal),
            _ => None,
        }
    }
}

/// Campo do mapeamento com as expressões já interpretadas.
#[derive(Debug, Clone)]
pub struct CampoMapeado {
    /// Chave no arquivo de mapeamento (ex: `ITEM_ICMS_CST`)
    pub chave: String,
    /// Nome do campo no registro extraído (`target_field`, ou a própria chave)
    pub destino: String,
    pub opcional: bool,
    pub caminho_xml: Option<String>,
    pub especial: Option<CampoEspecial>,
    /// Expressão avaliada sobre o documento inteiro
    pub expressao: Expressao,
    /// Expressão avaliada relativa a cada item (`det`)
    pub expressao_item: Expressao,
}

impl CampoMapeado {
    fn novo(chave: String, config: ConfigCampo) -> Self {
        let caminho = config.caminho_xml.as_deref().unwrap_or_default();

        CampoMapeado {
            destino: config.target_field.unwrap_or_else(|| chave.clone()),
            especial: CampoEspecial::from_chave(&chave),
            expressao: Expressao::parse(caminho),
            expressao_item: Expressao::parse_item(caminho),
            opcional: config.opcional,
            caminho_xml: config.caminho_xml,
            chave,
        }
    }

    pub fn eh_item(&self) -> bool {
        self.chave.starts_with(PREFIXO_ITEM)
    }

    pub fn eh_bloco(&self) -> bool {
        self.chave.ends_with(SUFIXO_BLOCO)
    }

    /// Nome do campo dentro do item: `ITEM_NCM` -> `NCM`.
    pub fn nome_no_item(&self) -> &str {
        self.destino
            .strip_prefix(PREFIXO_ITEM)
            .unwrap_or(self.destino.as_str())
    }
}

/// Estrutura de mapeamento campo -> caminho XML, na ordem do arquivo.
#[derive(Debug, Clone)]
pub struct Mapeamento {
    campos: Vec<CampoMapeado>,
}

impl Mapeamento {
    /// Interpreta o JSON de mapeamento.
    ///
    /// ### Exemplo
    /// ```
    /// use classificar_notas_fiscais::Mapeamento;
    ///
    /// let json = r#"{
    ///     "NUMERO_NF": { "caminho_xml": "infNFe/ide/nNF" },
    ///     "ITEM_NCM": { "caminho_xml": "infNFe/det/prod/NCM", "target_field": "ITEM_NCM", "opcional": true }
    /// }"#;
    ///
    /// let mapeamento = Mapeamento::from_json(json).unwrap();
    /// let chaves: Vec<&str> = mapeamento.campos().iter().map(|c| c.chave.as_str()).collect();
    /// assert_eq!(chaves, ["NUMERO_NF", "ITEM_NCM"]);
    /// ```
    pub fn from_json(texto: &str) -> Result<Mapeamento, serde_json::Error> {
        let bruto: Map<String, Value> = serde_json::from_str(texto)?;

        let campos = bruto
            .into_iter()
            .map(|(chave, valor)| {
                let config: ConfigCampo = serde_json::from_value(valor)?;
                Ok(CampoMapeado::novo(chave, config))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        Ok(Mapeamento { campos })
    }

    /// Lê o arquivo de mapeamento.
    pub fn from_path(path: &Path) -> FiscalResult<Mapeamento> {
        println!("Lendo estrutura de mapeamento em: {}", path.display());

        let texto = fs::read_to_string(path).map_err(|e| FiscalError::IoReader {
            source: e,
            arquivo: path.to_path_buf(),
        })?;

        let mapeamento =
            Mapeamento::from_json(&texto).map_err(|e| FiscalError::MapeamentoInvalido {
                source: e,
                arquivo: path.to_path_buf(),
            })?;

        mapeamento.validar()
    }

    /// Mapeamento embutido (`config/mapping_config.json`).
    pub fn padrao() -> FiscalResult<Mapeamento> {
        Mapeamento::from_json(MAPEAMENTO_PADRAO)?.validar()
    }

    /// Um mapeamento sem nenhum caminho não extrai nada: é erro de configuração.
    fn validar(self) -> FiscalResult<Mapeamento> {
        let algum_campo = self
            .campos
            .iter()
            .any(|c| c.especial.is_some() || !c.expressao.is_empty());

        if algum_campo {
            Ok(self)
        } else {
            Err(FiscalError::MapeamentoVazio)
        }
    }

    pub fn campos(&self) -> &[CampoMapeado] {
        &self.campos
    }

    pub fn campos_da_nota(&self) -> impl Iterator<Item = &CampoMapeado> {
        self.campos.iter().filter(|c| !c.eh_item())
    }

    pub fn campos_do_item(&self) -> impl Iterator<Item = &CampoMapeado> {
        self.campos.iter().filter(|c| c.eh_item())
    }

    pub fn len(&self) -> usize {
        self.campos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campos.is_empty()
    }
}
