use regex::Regex;
use std::sync::LazyLock;

/// Arquivos de notas fiscais: qualquer nome terminado em `.xml`.
///
/// i: case-insensitive (aceita `.XML`, comum em exportações da SEFAZ)
/// x: modo verbose (ignora espaços e permite comentários)
pub static REGEX_SEARCH_XML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^ # Início da string
        [^.].* # Ignora arquivos ocultos (ex: .~lock)
        \.xml # Extensão
        $ # Fim da string
        ",
    )
    .unwrap()
});

// Regex para limpeza e validação
pub static RE_MULTISPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
pub static RE_NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());

/// Prefixo de verificação de existência no caminho XML (ex: "presença de infNFe/det/imposto/ISSQN").
pub static RE_PRESENCA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^presença\s+de\s+").unwrap());

/// Data no início de `dhEmi`/`dEmi` (ex: 2024-03-15T10:20:00-03:00).
pub static RE_DATA_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").unwrap());
