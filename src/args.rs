use clap::Parser;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{FiscalError, FiscalResult, REGEX_SEARCH_XML};

// Estrutura para o Clap processar os argumentos da linha de comando
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Arquivo CSV com descrições de CFOP (colunas `Codigo CFOP;Descricao`).
    ///
    /// As descrições deste arquivo substituem as da tabela interna.
    #[arg(short = 'b', long)]
    base_cfop: Option<PathBuf>,

    /// Clear screen
    #[arg(short, long, default_value_t = false)]
    clear: bool,

    /// Arquivo JSON de mapeamento (campo -> caminho XML).
    ///
    /// Sem este argumento, usa o mapeamento interno (`config/mapping_config.json`).
    #[arg(short, long)]
    mapeamento: Option<PathBuf>,

    /// Diretório de saída dos relatórios
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Gerar também o arquivo de registros planos (uma entrada por chave do mapeamento)
    #[arg(long, default_value_t = false)]
    plano: bool,

    /// Ativar modo detalhado (verbose)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Diretório com os arquivos XML das notas fiscais
    #[arg(short = 'd', long, default_value = "xml")]
    xml_dir: PathBuf,
}

#[derive(Debug)]
pub struct Config {
    pub base_cfop: Option<PathBuf>,
    pub clear: bool,
    pub mapeamento: Option<PathBuf>,
    pub output: PathBuf,
    pub plano: bool,
    pub verbose: bool,
    pub xml_dir: PathBuf,

    // Arquivos XML encontrados em `xml_dir` (ordem alfabética)
    pub arquivos_xml: Vec<PathBuf>,
}

impl Config {
    /// Caminho de um arquivo dentro do diretório de saída.
    pub fn saida(&self, nome: &str) -> PathBuf {
        self.output.join(nome)
    }
}

pub fn get_config() -> FiscalResult<Config> {
    let args = Arguments::parse();

    // 1. Buscar arquivos XML no diretório informado
    let arquivos_xml = search_xml_files(&args.xml_dir)?;

    println!(
        " Arquivo(s) XML encontrado(s) em <{}>: {}\n",
        args.xml_dir.display(),
        arquivos_xml.len()
    );

    if args.verbose {
        arquivos_xml.iter().enumerate().for_each(|(i, path)| {
            println!("{:6}: {}", i + 1, path.display());
        });
        println!();
    }

    // 2. Diretório de saída
    fs::create_dir_all(&args.output)?;

    Ok(Config {
        base_cfop: args.base_cfop,
        clear: args.clear,
        mapeamento: args.mapeamento,
        output: args.output,
        plano: args.plano,
        verbose: args.verbose,
        xml_dir: args.xml_dir,
        arquivos_xml,
    })
}

/// Procura arquivos XML (extensão `.xml`, sem diferenciar maiúsculas) no diretório.
pub fn search_xml_files(dir: &Path) -> FiscalResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(FiscalError::DiretorioNaoEncontrado(dir.to_path_buf()));
    }

    // 1. Leitura funcional do diretório
    let mut arquivos_xml: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(FiscalError::Io)?
        .flatten() // Ignora erros individuais de entrada
        .filter_map(|entry| {
            let path = entry.path();
            let is_match = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|name| REGEX_SEARCH_XML.is_match(name))
                .unwrap_or_default();

            if path.is_file() && is_match {
                Some(path)
            } else {
                None
            }
        })
        .collect();

    // 2. Validação de existência
    if arquivos_xml.is_empty() {
        return Err(FiscalError::NoXmlFilesFound(dir.to_path_buf()));
    }

    // 3. Ordenação (alfabética)
    arquivos_xml.sort();

    Ok(arquivos_xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn encontra_xml_sem_diferenciar_maiusculas() {
        let dir = tempfile::tempdir().unwrap();

        for nome in ["b.XML", "a.xml", ".oculto.xml", "notas.json", "c.xml.bak"] {
            File::create(dir.path().join(nome)).unwrap();
        }
        fs::create_dir(dir.path().join("pasta.xml")).unwrap();

        let arquivos = search_xml_files(dir.path()).unwrap();
        let nomes: Vec<_> = arquivos
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();

        assert_eq!(nomes, ["a.xml", "b.XML"]);
    }

    #[test]
    fn diretorio_sem_xml_ou_inexistente() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            search_xml_files(dir.path()),
            Err(FiscalError::NoXmlFilesFound(_))
        ));

        assert!(matches!(
            search_xml_files(&dir.path().join("nada")),
            Err(FiscalError::DiretorioNaoEncontrado(_))
        ));
    }
}
