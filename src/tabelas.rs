use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use crate::{FiscalError, FiscalResult};

// --- Tabelas de Referência ---
// Armazenadas no binário (match), sem alocação em tempo de execução.

/// Códigos Fiscais de Operações e Prestações (CFOP) mais frequentes.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::descricao_cfop_padrao;
///
/// assert_eq!(descricao_cfop_padrao("5101"), Some("Venda de produção do estabelecimento"));
/// assert_eq!(descricao_cfop_padrao("0000"), None);
/// ```
pub fn descricao_cfop_padrao(cfop: &str) -> Option<&'static str> {
    let descricao = match cfop {
        // Entradas (estaduais)
        "1101" => "Compra para industrialização ou produção rural",
        "1102" => "Compra para comercialização",
        "1116" => {
            "Compra para industrialização ou produção rural originada de encomenda para recebimento futuro"
        }
        "1117" => "Compra para comercialização originada de encomenda para recebimento futuro",
        "1124" => "Industrialização efetuada por outra empresa",
        "1151" => "Transferência para industrialização ou produção rural",
        "1152" => "Transferência para comercialização",
        "1201" => "Devolução de venda de produção do estabelecimento",
        "1202" => "Devolução de venda de mercadoria adquirida ou recebida de terceiros",
        "1252" => "Compra de energia elétrica por estabelecimento industrial",
        "1253" => "Compra de energia elétrica por estabelecimento comercial",
        "1303" => "Aquisição de serviço de comunicação por estabelecimento comercial",
        "1352" => "Aquisição de serviço de transporte por estabelecimento industrial",
        "1353" => "Aquisição de serviço de transporte por estabelecimento comercial",
        "1401" => {
            "Compra para industrialização ou produção rural em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "1403" => {
            "Compra para comercialização em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "1407" => {
            "Compra de mercadoria para uso ou consumo cuja mercadoria está sujeita ao regime de substituição tributária"
        }
        "1410" => {
            "Devolução de venda de produção do estabelecimento em operação com produto sujeito ao regime de substituição tributária"
        }
        "1411" => {
            "Devolução de venda de mercadoria adquirida ou recebida de terceiros em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "1551" => "Compra de bem para o ativo imobilizado",
        "1556" => "Compra de material para uso ou consumo",
        "1652" => "Compra de combustível ou lubrificante para comercialização",
        "1653" => "Compra de combustível ou lubrificante por consumidor ou usuário final",
        "1661" => {
            "Devolução de venda de combustível ou lubrificante destinado à comercialização"
        }
        "1662" => {
            "Devolução de venda de combustível ou lubrificante destinado a consumidor ou usuário final"
        }
        "1910" => "Entrada de bonificação, doação ou brinde",
        "1915" => "Entrada de mercadoria ou bem recebido para conserto ou reparo",
        "1949" => "Outra entrada de mercadoria ou prestação de serviço não especificada",

        // Entradas (interestaduais)
        "2101" => "Compra para industrialização ou produção rural",
        "2102" => "Compra para comercialização",
        "2151" => "Transferência para industrialização ou produção rural",
        "2152" => "Transferência para comercialização",
        "2201" => "Devolução de venda de produção do estabelecimento",
        "2202" => "Devolução de venda de mercadoria adquirida ou recebida de terceiros",
        "2352" => "Aquisição de serviço de transporte por estabelecimento industrial",
        "2353" => "Aquisição de serviço de transporte por estabelecimento comercial",
        "2403" => {
            "Compra para comercialização em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "2551" => "Compra de bem para o ativo imobilizado",
        "2556" => "Compra de material para uso ou consumo",
        "2653" => "Compra de combustível ou lubrificante por consumidor ou usuário final",
        "2910" => "Entrada de bonificação, doação ou brinde",
        "2949" => "Outra entrada de mercadoria ou prestação de serviço não especificada",

        // Entradas (exterior)
        "3101" => "Compra para industrialização ou produção rural",
        "3102" => "Compra para comercialização",
        "3551" => "Compra de bem para o ativo imobilizado",
        "3556" => "Compra de material para uso ou consumo",
        "3949" => "Outra entrada de mercadoria ou prestação de serviço não especificada",

        // Saídas (estaduais)
        "5101" => "Venda de produção do estabelecimento",
        "5102" => "Venda de mercadoria adquirida ou recebida de terceiros",
        "5103" => "Venda de produção do estabelecimento, efetuada fora do estabelecimento",
        "5104" => {
            "Venda de mercadoria adquirida ou recebida de terceiros, efetuada fora do estabelecimento"
        }
        "5116" => "Venda de produção do estabelecimento originada de encomenda para entrega futura",
        "5117" => {
            "Venda de mercadoria adquirida ou recebida de terceiros, originada de encomenda para entrega futura"
        }
        "5124" => "Industrialização efetuada para outra empresa",
        "5151" => "Transferência de produção do estabelecimento",
        "5152" => "Transferência de mercadoria adquirida ou recebida de terceiros",
        "5201" => "Devolução de compra para industrialização ou produção rural",
        "5202" => "Devolução de compra para comercialização",
        "5352" => "Prestação de serviço de transporte a estabelecimento industrial",
        "5353" => "Prestação de serviço de transporte a estabelecimento comercial",
        "5357" => "Prestação de serviço de transporte a não contribuinte",
        "5401" => {
            "Venda de produção do estabelecimento em operação com produto sujeito ao regime de substituição tributária, na condição de contribuinte substituto"
        }
        "5403" => {
            "Venda de mercadoria adquirida ou recebida de terceiros em operação com mercadoria sujeita ao regime de substituição tributária, na condição de contribuinte substituto"
        }
        "5405" => {
            "Venda de mercadoria adquirida ou recebida de terceiros em operação com mercadoria sujeita ao regime de substituição tributária, na condição de contribuinte substituído"
        }
        "5409" => {
            "Transferência de mercadoria adquirida ou recebida de terceiros em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "5411" => {
            "Devolução de compra para comercialização em operação com mercadoria sujeita ao regime de substituição tributária"
        }
        "5551" => "Venda de bem do ativo imobilizado",
        "5556" => "Devolução de compra de material de uso ou consumo",
        "5655" => {
            "Venda de combustível ou lubrificante adquirido ou recebido de terceiros destinado à industrialização subsequente"
        }
        "5656" => {
            "Venda de combustível ou lubrificante adquirido ou recebido de terceiros destinado a consumidor ou usuário final"
        }
        "5659" => "Transferência de combustível ou lubrificante adquirido ou recebido de terceiros",
        "5901" => "Remessa para industrialização por encomenda",
        "5902" => "Retorno de mercadoria utilizada na industrialização por encomenda",
        "5910" => "Remessa em bonificação, doação ou brinde",
        "5911" => "Remessa de amostra grátis",
        "5915" => "Remessa de mercadoria ou bem para conserto ou reparo",
        "5916" => "Retorno de mercadoria ou bem recebido para conserto ou reparo",
        "5920" => "Remessa de vasilhame ou sacaria",
        "5927" => {
            "Lançamento efetuado a título de baixa de estoque decorrente de perda, roubo ou deterioração"
        }
        "5933" => "Prestação de serviço tributado pelo ISSQN",
        "5949" => "Outra saída de mercadoria ou prestação de serviço não especificada",

        // Saídas (interestaduais)
        "6101" => "Venda de produção do estabelecimento",
        "6102" => "Venda de mercadoria adquirida ou recebida de terceiros",
        "6107" => "Venda de produção do estabelecimento, destinada a não contribuinte",
        "6108" => {
            "Venda de mercadoria adquirida ou recebida de terceiros, destinada a não contribuinte"
        }
        "6151" => "Transferência de produção do estabelecimento",
        "6152" => "Transferência de mercadoria adquirida ou recebida de terceiros",
        "6201" => "Devolução de compra para industrialização ou produção rural",
        "6202" => "Devolução de compra para comercialização",
        "6352" => "Prestação de serviço de transporte a estabelecimento industrial",
        "6353" => "Prestação de serviço de transporte a estabelecimento comercial",
        "6401" => {
            "Venda de produção do estabelecimento em operação com produto sujeito ao regime de substituição tributária, na condição de contribuinte substituto"
        }
        "6403" => {
            "Venda de mercadoria adquirida ou recebida de terceiros em operação com mercadoria sujeita ao regime de substituição tributária, na condição de contribuinte substituto"
        }
        "6404" => {
            "Venda de mercadoria sujeita ao regime de substituição tributária, cujo imposto já tenha sido retido anteriormente"
        }
        "6551" => "Venda de bem do ativo imobilizado",
        "6655" => {
            "Venda de combustível ou lubrificante adquirido ou recebido de terceiros destinado à industrialização subsequente"
        }
        "6656" => {
            "Venda de combustível ou lubrificante adquirido ou recebido de terceiros destinado a consumidor ou usuário final"
        }
        "6910" => "Remessa em bonificação, doação ou brinde",
        "6915" => "Remessa de mercadoria ou bem para conserto ou reparo",
        "6949" => "Outra saída de mercadoria ou prestação de serviço não especificada",

        // Saídas (exterior)
        "7101" => "Venda de produção do estabelecimento",
        "7102" => "Venda de mercadoria adquirida ou recebida de terceiros",
        "7949" => "Outra saída de mercadoria ou prestação de serviço não especificada",

        _ => return None,
    };

    Some(descricao)
}

/// Código de Situação Tributária do ICMS (Regime Normal - NF-e/NFC-e)
pub fn cst_icms(cst: &str) -> Option<&'static str> {
    let descricao = match cst {
        "00" => "Tributada integralmente",
        "02" => "Tributação monofásica própria sobre combustíveis",
        "10" => "Tributada e com cobrança do ICMS por substituição tributária",
        "15" => {
            "Tributação monofásica própria e com responsabilidade pela retenção sobre combustíveis"
        }
        "20" => "Com redução da base de cálculo",
        "30" => "Isenta ou não tributada e com cobrança do ICMS por substituição tributária",
        "40" => "Isenta",
        "41" => "Não tributada",
        "50" => "Suspensão",
        "51" => "Diferimento",
        "53" => "Tributação monofásica sobre combustíveis com recolhimento diferido",
        "60" => "ICMS cobrado anteriormente por substituição tributária",
        "61" => "Tributação monofásica sobre combustíveis cobrada anteriormente",
        "70" => {
            "Com redução de base de cálculo e cobrança do ICMS por substituição tributária"
        }
        "90" => "Outras",
        _ => return None,
    };

    Some(descricao)
}

/// Código de Situação da Operação no Simples Nacional (CSOSN)
pub fn csosn_icms(csosn: &str) -> Option<&'static str> {
    let descricao = match csosn {
        "101" => "Tributada pelo Simples Nacional com permissão de crédito",
        "102" => "Tributada pelo Simples Nacional sem permissão de crédito",
        "103" => "Isenção do ICMS no Simples Nacional para faixa de receita bruta",
        "201" => {
            "Tributada pelo Simples Nacional com permissão de crédito e com cobrança do ICMS por substituição tributária"
        }
        "202" => {
            "Tributada pelo Simples Nacional sem permissão de crédito e com cobrança do ICMS por substituição tributária"
        }
        "203" => {
            "Isenção do ICMS no Simples Nacional para faixa de receita bruta e com cobrança do ICMS por substituição tributária"
        }
        "300" => "Imune",
        "400" => "Não tributada pelo Simples Nacional",
        "500" => {
            "ICMS cobrado anteriormente por substituição tributária (substituído) ou por antecipação"
        }
        "900" => "Outros (a critério da UF)",
        _ => return None,
    };

    Some(descricao)
}

/// Código de Situação Tributária do IPI
pub fn cst_ipi(cst: &str) -> Option<&'static str> {
    let descricao = match cst {
        "00" => "Entrada com recuperação de crédito",
        "01" => "Entrada tributada com alíquota zero",
        "02" => "Entrada isenta",
        "03" => "Entrada não-tributada",
        "04" => "Entrada imune",
        "05" => "Entrada com suspensão",
        "49" => "Outras entradas",
        "50" => "Saída tributada",
        "51" => "Saída tributada com alíquota zero",
        "52" => "Saída isenta",
        "53" => "Saída não-tributada",
        "54" => "Saída imune",
        "55" => "Saída com suspensão",
        "99" => "Outras saídas",
        _ => return None,
    };

    Some(descricao)
}

/// Código de Situação Tributária do PIS/PASEP e da COFINS
pub fn cst_pis_cofins(cst: &str) -> Option<&'static str> {
    let descricao = match cst {
        "01" => "Operação Tributável com Alíquota Básica",
        "02" => "Operação Tributável com Alíquota Diferenciada",
        "03" => "Operação Tributável com Alíquota por Unidade de Medida de Produto",
        "04" => "Operação Tributável Monofásica - Revenda a Alíquota Zero",
        "05" => "Operação Tributável por Substituição Tributária",
        "06" => "Operação Tributável a Alíquota Zero",
        "07" => "Operação Isenta da Contribuição",
        "08" => "Operação sem Incidência da Contribuição",
        "09" => "Operação com Suspensão da Contribuição",
        "49" => "Outras Operações de Saída",
        "50" => {
            "Operação com Direito a Crédito - Vinculada Exclusivamente a Receita Tributada no Mercado Interno"
        }
        "99" => "Outras Operações",
        _ => return None,
    };

    Some(descricao)
}

/// Modalidade do frete (`transp/modFrete`)
pub fn modalidade_frete(codigo: &str) -> Option<&'static str> {
    let descricao = match codigo {
        "0" => "Por Conta do Emitente",
        "1" => "Por Conta do Destinatário",
        "2" => "Por Conta de Terceiro",
        "3" => "Por Conta de Terceiro (Comodato)",
        "4" => "Sem Movimento Físico",
        "9" => "Sem Frete",
        _ => return None,
    };

    Some(descricao)
}

/// Origem da mercadoria (`ICMS/*/orig`)
pub fn origem_mercadoria(codigo: &str) -> &'static str {
    match codigo {
        "0" => "Nacional",
        "1" => "Estrangeira - Importação Direta",
        "2" => "Estrangeira - Adquirida no Brasil",
        "3" => "Nacional - Conteúdo de Importação superior a 40% e inferior ou igual a 70%",
        "4" => "Nacional - Produção conforme processos produtivos básicos",
        "5" => "Nacional - Conteúdo de Importação inferior ou igual a 40%",
        "6" => "Estrangeira - Importação Direta, sem similar nacional (lista CAMEX)",
        "7" => "Estrangeira - Adquirida no Brasil, sem similar nacional (lista CAMEX)",
        "8" => "Nacional - Conteúdo de Importação superior a 70%",
        _ => "Outra/Desconhecida",
    }
}

/// Modelos de Documentos Fiscais - Tabela 4.1.1
pub fn modelo_documento_fiscal(codigo: &str) -> &'static str {
    match codigo {
        "01" => "Nota Fiscal",
        "1B" => "Nota Fiscal Avulsa",
        "04" => "Nota Fiscal de Produtor",
        "55" => "Nota Fiscal Eletrônica: NF-e",
        "57" => "Conhecimento de Transporte Eletrônico: CT-e",
        "59" => "Cupom Fiscal Eletrônico: CF-e (CF-e-SAT)",
        "63" => "Bilhete de Passagem Eletrônico: BP-e",
        "65" => "Nota Fiscal Eletrônica ao Consumidor Final: NFC-e",
        "66" => "Nota Fiscal de Energia Elétrica Eletrônica: NF3e",
        "67" => "Conhecimento de Transporte Eletrônico para Outros Serviços: CT-e OS",
        _ => "Modelo Desconhecido",
    }
}

/// Descrição do CST do ICMS (2 dígitos) ou do CSOSN (3 dígitos).
pub fn descricao_cst_icms(cst: &str) -> String {
    let cst = cst.trim();

    if cst.is_empty() {
        return "N/A".to_string();
    }

    if cst.len() == 3 {
        csosn_icms(cst).map_or_else(|| format!("CSOSN {cst}"), String::from)
    } else {
        cst_icms(cst).map_or_else(|| format!("CST {cst}"), String::from)
    }
}

pub fn descricao_cst_ipi(cst: &str) -> String {
    cst_ipi(cst.trim()).map_or_else(|| format!("CST {cst}"), String::from)
}

pub fn descricao_cst_pis_cofins(cst: &str) -> String {
    cst_pis_cofins(cst.trim()).map_or_else(|| format!("CST {cst}"), String::from)
}

/// Colunas esperadas no arquivo CSV de base de CFOP.
pub const COLUNA_CODIGO_CFOP: &str = "Codigo CFOP";
pub const COLUNA_DESCRICAO_CFOP: &str = "Descricao";

/// Base de descrições de CFOP: tabela embutida mais as linhas de um CSV opcional.
/// As linhas do CSV têm prioridade sobre a tabela embutida.
#[derive(Debug, Clone, Default)]
pub struct BaseCfop {
    extras: HashMap<String, String>,
}

impl BaseCfop {
    /// Carrega o CSV (`Codigo CFOP;Descricao`).
    pub fn from_csv(path: &Path) -> FiscalResult<BaseCfop> {
        let file = File::open(path).map_err(|e| FiscalError::IoReader {
            source: e,
            arquivo: path.to_path_buf(),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers = rdr.headers()?.clone();
        let idx_codigo = posicao_coluna(&headers, COLUNA_CODIGO_CFOP, path)?;
        let idx_descricao = posicao_coluna(&headers, COLUNA_DESCRICAO_CFOP, path)?;

        let mut extras = HashMap::new();

        for result in rdr.records() {
            let record = result?;
            let codigo: String = record
                .get(idx_codigo)
                .unwrap_or_default()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            let descricao = record.get(idx_descricao).unwrap_or_default();

            if !codigo.is_empty() && !descricao.is_empty() {
                extras.insert(codigo, descricao.to_string());
            }
        }

        println!(
            "Base de CFOP <{}>: {} descrições carregadas.",
            path.display(),
            extras.len()
        );

        Ok(BaseCfop { extras })
    }

    /// Base opcional: sem caminho, apenas a tabela embutida.
    pub fn carregar(path: Option<&PathBuf>) -> FiscalResult<BaseCfop> {
        match path {
            Some(path) => BaseCfop::from_csv(path),
            None => Ok(BaseCfop::default()),
        }
    }

    pub fn inserir(&mut self, cfop: &str, descricao: &str) {
        self.extras.insert(cfop.to_string(), descricao.to_string());
    }

    /// Descrição do CFOP.
    ///
    /// ### Exemplo
    /// ```
    /// use classificar_notas_fiscais::BaseCfop;
    ///
    /// let base = BaseCfop::default();
    /// assert_eq!(base.descricao("5101"), "Venda de produção do estabelecimento");
    /// assert_eq!(base.descricao("5999"), "CFOP 5999");
    /// assert_eq!(base.descricao(""), "CFOP não informado");
    /// ```
    pub fn descricao(&self, cfop: &str) -> String {
        let cfop = cfop.trim();

        if cfop.is_empty() {
            return "CFOP não informado".to_string();
        }

        self.extras
            .get(cfop)
            .cloned()
            .or_else(|| descricao_cfop_padrao(cfop).map(String::from))
            .unwrap_or_else(|| format!("CFOP {cfop}"))
    }
}

fn posicao_coluna(headers: &csv::StringRecord, coluna: &str, path: &Path) -> FiscalResult<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}') == coluna)
        .ok_or_else(|| FiscalError::MissingEssentialColumn {
            arquivo: path.to_path_buf(),
            coluna: coluna.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cst_icms_ou_csosn_pelo_tamanho() {
        assert_eq!(descricao_cst_icms("00"), "Tributada integralmente");
        assert_eq!(
            descricao_cst_icms("102"),
            "Tributada pelo Simples Nacional sem permissão de crédito"
        );
        assert_eq!(descricao_cst_icms("77"), "CST 77");
        assert_eq!(descricao_cst_icms("777"), "CSOSN 777");
        assert_eq!(descricao_cst_icms(""), "N/A");
    }

    #[test]
    fn descricoes_desconhecidas() {
        assert_eq!(descricao_cst_ipi("50"), "Saída tributada");
        assert_eq!(descricao_cst_ipi("7"), "CST 7");
        assert_eq!(descricao_cst_pis_cofins("99"), "Outras Operações");
        assert_eq!(origem_mercadoria("9"), "Outra/Desconhecida");
        assert_eq!(modalidade_frete("5"), None);
        assert_eq!(modelo_documento_fiscal("65"), "Nota Fiscal Eletrônica ao Consumidor Final: NFC-e");
    }

    #[test]
    fn base_cfop_prioriza_extras() {
        let mut base = BaseCfop::default();
        base.inserir("5101", "Venda de produção própria");
        base.inserir("5999", "Outro código local");

        assert_eq!(base.descricao("5101"), "Venda de produção própria");
        assert_eq!(base.descricao(" 5999 "), "Outro código local");
        assert_eq!(
            base.descricao("5102"),
            "Venda de mercadoria adquirida ou recebida de terceiros"
        );
    }

    #[test]
    fn base_cfop_lida_do_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfop.csv");
        std::fs::write(
            &path,
            "\u{feff}Codigo CFOP;Descricao\n\
             5.101;Venda de produção própria\n\
             6108 ; Venda interestadual a não contribuinte \n\
             ;Sem código\n\
             5999;\n",
        )
        .unwrap();

        let base = BaseCfop::from_csv(&path).unwrap();

        assert_eq!(base.extras.len(), 2);
        assert_eq!(base.descricao("5101"), "Venda de produção própria");
        assert_eq!(base.descricao("6108"), "Venda interestadual a não contribuinte");
        assert_eq!(base.descricao("5999"), "CFOP 5999");

        let carregada = BaseCfop::carregar(Some(&path)).unwrap();
        assert_eq!(carregada.descricao("5101"), "Venda de produção própria");
    }

    #[test]
    fn base_cfop_sem_coluna_essencial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfop.csv");
        std::fs::write(&path, "Codigo CFOP;Texto\n5101;Venda\n").unwrap();

        match BaseCfop::from_csv(&path) {
            Err(FiscalError::MissingEssentialColumn { coluna, .. }) => {
                assert_eq!(coluna, COLUNA_DESCRICAO_CFOP)
            }
            outro => panic!("esperava coluna ausente, obtido {outro:?}"),
        }

        assert!(matches!(
            BaseCfop::from_csv(&dir.path().join("inexistente.csv")),
            Err(FiscalError::IoReader { .. })
        ));
    }
}
