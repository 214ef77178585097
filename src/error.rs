use std::{io, path::PathBuf};
use thiserror::Error;

/// Tipo de retorno conveniente para todo o projeto
pub type FiscalResult<T> = Result<T, FiscalError>;

#[derive(Error, Debug)]
pub enum FiscalError {
    #[error("Erro de configuração: {0}")]
    Config(String),

    #[error("Erro no processamento CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Diretório de XMLs não encontrado: {0:?}")]
    DiretorioNaoEncontrado(PathBuf),

    #[error("Documento XML sem elemento raiz!")]
    DocumentoVazio,

    #[error("Erro de I/O: {0}")]
    Io(#[from] io::Error),

    #[error(
        "Arquivo não encontrado ou ilegível!\n\
        Arquivo: {arquivo:?}\n\
        {source}"
    )]
    IoReader {
        #[source]
        source: io::Error,
        arquivo: PathBuf,
    },

    #[error("Erro de JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "Arquivo de mapeamento inválido!\n\
        Arquivo: {arquivo:?}\n\
        {source}"
    )]
    MapeamentoInvalido {
        #[source]
        source: serde_json::Error,
        arquivo: PathBuf,
    },

    #[error("Mapeamento sem campos: informe ao menos um campo com 'caminho_xml'")]
    MapeamentoVazio,

    #[error("Coluna essencial ausente no arquivo {arquivo:?}: {coluna}")]
    MissingEssentialColumn { arquivo: PathBuf, coluna: String },

    #[error("Nenhum arquivo XML encontrado no diretório {0:?}")]
    NoXmlFilesFound(PathBuf),

    #[error("Erro de XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error(
        "XML malformado!\n\
        Arquivo: {arquivo:?}\n\
        {source}"
    )]
    XmlArquivo {
        #[source]
        source: Box<FiscalError>,
        arquivo: PathBuf,
    },
}

impl FiscalError {
    /// Anexa o caminho do arquivo XML a um erro de parsing.
    pub fn no_arquivo(self, arquivo: PathBuf) -> Self {
        match self {
            FiscalError::XmlArquivo { .. } | FiscalError::IoReader { .. } => self,
            outro => FiscalError::XmlArquivo {
                source: Box::new(outro),
                arquivo,
            },
        }
    }
}
