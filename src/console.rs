use std::process::Command;

use crate::FiscalResult;

/// Limpar a tela.
pub fn clear_screen(clear_screen: bool) -> FiscalResult<()> {
    if clear_screen {
        if cfg!(target_os = "windows") {
            // 'cls' é um comando interno do 'cmd'
            Command::new("cmd").args(["/c", "cls"]).status()?;
        } else {
            Command::new("clear").status()?;
        }
    }

    Ok(())
}

/// Exibe a descrição e a versão do programa.
pub fn imprimir_versao_do_programa() {
    let descr = [
        "Este programa lê documentos fiscais eletrônicos (NF-e, NFC-e, CT-e e NFS-e) em formato XML.",
        "Os campos de cada nota são extraídos conforme um arquivo JSON de mapeamento (campo -> caminho XML).",
        "Cada item da nota é classificado quanto a CFOP, ICMS, IPI, PIS/COFINS, ISS, DIFAL, IBS, CBS e IS.",
        "São gerados o relatório customizado por item, os cenários agrupados e a análise por empresa emitente.",
    ];

    let version = env!("CARGO_PKG_VERSION");

    for line in &descr {
        println!(" {}", line);
    }

    println!("\n versão: {}\n", version);
}

/// Formata inteiros com separador de milhares (`1234567` -> `1.234.567`).
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::fmt_milhares;
///
/// assert_eq!(fmt_milhares(999), "999");
/// assert_eq!(fmt_milhares(1234567), "1.234.567");
/// ```
pub fn fmt_milhares(n: usize) -> String {
    let s = n.to_string();
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);

    s.chars().enumerate().for_each(|(i, c)| {
        if i > 0 && (len - i).is_multiple_of(3) {
            result.push('.');
        }
        result.push(c);
    });

    result
}
