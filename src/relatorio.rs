use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    BaseCfop, FiscalResult, NotaFiscal, Registro, analisar_icms, campo, campo_ou_vazio, cbs_info,
    cfop_info, cofins_status, consumidor_final, cst_ou_csosn, descricao_cst_icms,
    descricao_cst_pis_cofins, fmt_milhares, gerar_cenario, ibs_info, identificar_difal,
    info_adicionais, ipi_status, is_info, issqn_info, modelo_documento_fiscal, natureza_operacao,
    primeiro_campo, tipi_aplicavel, tipo_operacao, transporte,
};

/// Uma linha do relatório customizado: um item de uma nota, já classificado.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinhaRelatorio {
    #[serde(rename = "ID")]
    pub id: usize,
    #[serde(rename = "Cenario")]
    pub cenario: String,
    #[serde(rename = "Numero Nota")]
    pub numero_nota: String,
    #[serde(rename = "JSON da nota")]
    pub json_nota: String,
    #[serde(rename = "Tipo")]
    pub tipo: String,
    #[serde(rename = "CNPJ/CPF Emissor")]
    pub cnpj_cpf_emissor: String,
    #[serde(rename = "Razão Social Emissor")]
    pub razao_social_emissor: String,
    #[serde(rename = "CNPJ/CPF Destinatário")]
    pub cnpj_cpf_destinatario: String,
    #[serde(rename = "Razão Social Destinatário")]
    pub razao_social_destinatario: String,
    #[serde(rename = "UF Emissor")]
    pub uf_emissor: String,
    #[serde(rename = "UF Destinatário")]
    pub uf_destinatario: String,
    #[serde(rename = "Operação")]
    pub operacao: String,
    #[serde(rename = "Consumidor Final")]
    pub consumidor_final: String,
    #[serde(rename = "Transporte")]
    pub transporte: String,

    #[serde(rename = "NCM")]
    pub ncm: String,
    #[serde(rename = "Classificação/Produto")]
    pub produto: String,
    #[serde(rename = "NATOP")]
    pub natop: String,
    #[serde(rename = "Natureza da Operação")]
    pub natureza_operacao: String,
    #[serde(rename = "CFOP")]
    pub cfop: String,
    #[serde(rename = "DESC CFOP")]
    pub desc_cfop: String,

    #[serde(rename = "CST ICMS")]
    pub cst_icms: String,
    #[serde(rename = "DESC CST ICMS")]
    pub desc_cst_icms: String,
    #[serde(rename = "%ICMS Normal")]
    pub aliquota_icms: String,
    #[serde(rename = "ICMS VBC")]
    pub icms_vbc: String,

    #[serde(rename = "CST IPI")]
    pub cst_ipi: String,
    #[serde(rename = "ENQUADRAMENTO IPI")]
    pub enquadramento_ipi: String,
    #[serde(rename = "Valor IPI")]
    pub valor_ipi: String,
    #[serde(rename = "TIPI")]
    pub tipi: String,

    #[serde(rename = "CST PIS")]
    pub cst_pis: String,
    #[serde(rename = "DESC CST PIS")]
    pub desc_cst_pis: String,
    #[serde(rename = "%PIS")]
    pub aliquota_pis: String,
    #[serde(rename = "CST COFINS")]
    pub cst_cofins: String,
    #[serde(rename = "DESC CST COFINS")]
    pub desc_cst_cofins: String,
    #[serde(rename = "%COFINS")]
    pub aliquota_cofins: String,

    #[serde(rename = "Sujeito a ISS?")]
    pub sujeito_iss: String,

    #[serde(rename = "DIFAL")]
    pub difal: bool,
    #[serde(rename = "DIFAL motivo")]
    pub difal_motivo: String,
    #[serde(rename = "DIFAL interestadual")]
    pub difal_interestadual: bool,
    #[serde(rename = "DIFAL consumidor final")]
    pub difal_consumidor_final: String,
    #[serde(rename = "DIFAL ind_ie_dest")]
    pub difal_ind_ie_dest: String,
    #[serde(rename = "DIFAL cfop")]
    pub difal_cfop: String,

    #[serde(rename = "Tipo ICMS")]
    pub tipo_icms: String,
    #[serde(rename = "Regime ICMS")]
    pub regime_icms: String,
    #[serde(rename = "ICMS VBCST")]
    pub icms_vbcst: String,
    #[serde(rename = "ICMS VICMSST")]
    pub icms_vicmsst: String,
    #[serde(rename = "ICMS Retido Monofásico")]
    pub icms_retido_mono: String,
    #[serde(rename = "Origem Mercadoria")]
    pub origem_mercadoria: String,

    #[serde(rename = "IBS")]
    pub ibs: String,
    #[serde(rename = "CBS")]
    pub cbs: String,
    #[serde(rename = "IS")]
    pub imposto_seletivo: String,

    #[serde(rename = "Outros Impostos")]
    pub outros_impostos: String,
    #[serde(rename = "Todos Impostos")]
    pub todos_impostos: String,
    #[serde(rename = "Infos Adicionais")]
    pub infos_adicionais: String,
}

fn campo_ou(registro: &Registro, nome: &str, padrao: &str) -> String {
    campo(registro, nome).unwrap_or_else(|| padrao.to_string())
}

fn montar_linha(
    id: usize,
    nota: &NotaFiscal,
    json_nota: &str,
    item: &Registro,
    indice: usize,
    base: &BaseCfop,
) -> LinhaRelatorio {
    let cabecalho = &nota.cabecalho;

    let cfop = cfop_info(item, base);
    let cst_icms = cst_ou_csosn(item);
    let ipi = ipi_status(item);
    let cofins = cofins_status(item);
    let difal = identificar_difal(cabecalho, item);
    let icms = analisar_icms(item);

    LinhaRelatorio {
        id,
        cenario: gerar_cenario(cabecalho, item),
        numero_nota: campo_ou_vazio(cabecalho, "NUMERO_NF"),
        json_nota: json_nota.to_string(),
        tipo: campo_ou_vazio(cabecalho, "TIPO_DOCUMENTO"),
        cnpj_cpf_emissor: primeiro_campo(cabecalho, &["EMIT_CNPJ", "EMIT_CPF"]).unwrap_or_default(),
        razao_social_emissor: campo_ou_vazio(cabecalho, "EMIT_RAZAO_SOCIAL"),
        cnpj_cpf_destinatario: primeiro_campo(cabecalho, &["DEST_CNPJ", "DEST_CPF"])
            .unwrap_or_default(),
        razao_social_destinatario: campo_ou_vazio(cabecalho, "DEST_RAZAO_SOCIAL"),
        uf_emissor: campo_ou_vazio(cabecalho, "EMIT_UF"),
        uf_destinatario: campo_ou_vazio(cabecalho, "DEST_UF"),
        operacao: tipo_operacao(cabecalho).to_string(),
        consumidor_final: consumidor_final(cabecalho).indicador.to_string(),
        transporte: transporte(cabecalho),

        ncm: campo_ou_vazio(item, "NCM"),
        produto: campo_ou_vazio(item, "XPROD"),
        natop: campo_ou_vazio(cabecalho, "NATUREZA_OPERACAO"),
        natureza_operacao: natureza_operacao(&cfop.cfop),
        cfop: cfop.cfop,
        desc_cfop: cfop.descricao,

        desc_cst_icms: descricao_cst_icms(&cst_icms),
        cst_icms,
        aliquota_icms: campo_ou(item, "ICMS_PICMS", "0"),
        icms_vbc: campo_ou(item, "ICMS_VBC", "0"),

        cst_ipi: ipi.cst,
        enquadramento_ipi: ipi.status.to_string(),
        valor_ipi: ipi.valor,
        tipi: tipi_aplicavel(item).to_string(),

        desc_cst_pis: descricao_cst_pis_cofins(&cofins.cst_pis),
        cst_pis: cofins.cst_pis,
        aliquota_pis: campo_ou_vazio(item, "PIS_PPIS"),
        cst_cofins: cofins.cst_cofins,
        desc_cst_cofins: cofins.tem_cofins.to_string(),
        aliquota_cofins: campo_ou_vazio(item, "COFINS_PCOFINS"),

        sujeito_iss: issqn_info(item).to_string(),

        difal: difal.tem_difal,
        difal_motivo: difal.motivo.to_string(),
        difal_interestadual: difal.interestadual,
        difal_consumidor_final: difal.consumidor_final,
        difal_ind_ie_dest: difal.ind_ie_dest,
        difal_cfop: difal.cfop,

        tipo_icms: icms.tipo_icms,
        regime_icms: icms.regime,
        icms_vbcst: icms.vbcst,
        icms_vicmsst: icms.vicmsst,
        icms_retido_mono: icms.valor_icms_retido,
        origem_mercadoria: icms.origem_mercadoria,

        ibs: ibs_info(item),
        cbs: cbs_info(item),
        imposto_seletivo: is_info(item),

        outros_impostos: campo_ou_vazio(item, "OUTROS_IMPOSTOS"),
        todos_impostos: campo_ou_vazio(item, "TODOS_IMPOSTOS"),
        infos_adicionais: info_adicionais(cabecalho, item, indice),
    }
}

/// Uma linha por item, com ID sequencial a partir de 0.
pub fn montar_linhas(notas: &[NotaFiscal], base: &BaseCfop) -> FiscalResult<Vec<LinhaRelatorio>> {
    let mut linhas = Vec::new();

    for nota in notas {
        let json_nota = serde_json::to_string_pretty(nota)?;

        for (indice, item) in nota.itens.iter().enumerate() {
            let linha = montar_linha(linhas.len(), nota, &json_nota, item, indice, base);
            linhas.push(linha);
        }
    }

    Ok(linhas)
}

/// Grava qualquer estrutura serializável como JSON indentado.
pub fn salvar_json<T: Serialize + ?Sized>(dados: &T, path: &Path) -> FiscalResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, dados)?;
    writer.flush()?;
    Ok(())
}

/// Notas estruturadas (cabeçalho + ITEMS) em JSON.
pub fn salvar_notas_json(notas: &[NotaFiscal], path: &Path) -> FiscalResult<()> {
    salvar_json(notas, path)?;
    println!(" Notas estruturadas salvas em: <{}>", path.display());
    Ok(())
}

/// Registros planos (uma entrada por chave do mapeamento) em JSON.
pub fn salvar_registros_json(registros: &[Registro], path: &Path) -> FiscalResult<()> {
    salvar_json(registros, path)?;
    println!(" Registros planos salvos em: <{}>", path.display());
    Ok(())
}

/// Relatório customizado em CSV (delimitador `;`).
pub fn salvar_relatorio_csv(linhas: &[LinhaRelatorio], path: &Path) -> FiscalResult<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;

    for linha in linhas {
        wtr.serialize(linha)?;
    }

    wtr.flush()?;
    println!(
        " Relatório customizado ({} linhas) salvo em: <{}>",
        fmt_milhares(linhas.len()),
        path.display()
    );

    Ok(())
}

/// Totais por modelo de documento e por CFOP.
pub fn imprimir_estatisticas(notas: &[NotaFiscal]) {
    let total_itens: usize = notas.iter().map(|n| n.itens.len()).sum();

    let mut por_modelo: BTreeMap<String, usize> = BTreeMap::new();
    let mut por_cfop: BTreeMap<String, usize> = BTreeMap::new();

    for nota in notas {
        let modelo = nota.campo("MODELO").unwrap_or_else(|| "N/A".to_string());
        *por_modelo.entry(modelo).or_default() += 1;

        for item in &nota.itens {
            let cfop = campo(item, "CFOP").unwrap_or_else(|| "N/A".to_string());
            *por_cfop.entry(cfop).or_default() += 1;
        }
    }

    println!("\n --- Estatísticas ---");
    println!(" Total de notas: {}", fmt_milhares(notas.len()));
    println!(" Total de itens: {}", fmt_milhares(total_itens));

    println!("\n Notas por modelo:");
    for (modelo, qtd) in &por_modelo {
        println!(
            "  {modelo:>3} ({}): {}",
            modelo_documento_fiscal(modelo),
            fmt_milhares(*qtd)
        );
    }

    println!("\n Itens por CFOP:");
    for (cfop, qtd) in &por_cfop {
        println!("  {cfop}: {}", fmt_milhares(*qtd));
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nota_exemplo() -> NotaFiscal {
        serde_json::from_value(json!({
            "TIPO_DOCUMENTO": "mercadoria",
            "NUMERO_NF": "123",
            "TIPO_NF": "1",
            "MODELO": "55",
            "EMIT_CNPJ": null,
            "EMIT_CPF": "12345678901",
            "EMIT_UF": "MG",
            "DEST_UF": "SP",
            "CONSUMIDOR_FINAL": "1",
            "IND_FINAL": "1",
            "DEST_IND_IE_DEST": "9",
            "DIFAL_EMIT_UF": "MG",
            "DIFAL_DEST_UF": "SP",
            "INF_CPL": "Pedido 42",
            "ITEMS": [
                {
                    "NUMERO": "1", "CFOP": "6108", "NCM": "84713012",
                    "ICMS_BLOCO": "ICMS00", "ICMS_CST": "00", "ICMS_PICMS": "12.00",
                    "IPI_BLOCO": "IPITrib", "IPI_CST": "50", "IPI_VIPI": "3.00",
                    "PIS_CST": "01", "COFINS_CST": "01",
                    "TODOS_IMPOSTOS": "ICMS, IPI, PIS, COFINS"
                },
                { "NUMERO": "2", "CFOP": "5101", "INFO_ADICIONAL": "Brinde" }
            ],
            "xml_filename": "nota.xml"
        }))
        .unwrap()
    }

    #[test]
    fn uma_linha_por_item() {
        let linhas = montar_linhas(&[nota_exemplo()], &BaseCfop::default()).unwrap();

        assert_eq!(linhas.len(), 2);
        assert_eq!(linhas[0].id, 0);
        assert_eq!(linhas[1].id, 1);

        let primeira = &linhas[0];
        assert_eq!(primeira.cnpj_cpf_emissor, "12345678901");
        assert_eq!(primeira.natureza_operacao, "Saída (CFOP 6108)");
        assert_eq!(primeira.desc_cst_icms, "Tributada integralmente");
        assert_eq!(primeira.enquadramento_ipi, "TRIBUTADO");
        assert_eq!(primeira.tipi, "SIM");
        assert!(primeira.difal);
        assert_eq!(primeira.regime_icms, "Tributado Integralmente");
        assert!(primeira.json_nota.contains("\"xml_filename\": \"nota.xml\""));

        let segunda = &linhas[1];
        assert_eq!(segunda.desc_cfop, "Venda de produção do estabelecimento");
        assert_eq!(segunda.aliquota_icms, "0");
        assert_eq!(segunda.infos_adicionais, "[CONTRIBUINTE]: Pedido 42 | [ITEM 2]: Brinde");
        assert_eq!(segunda.ibs, "NAO");
    }

    #[test]
    fn csv_com_ponto_e_virgula() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relatorio.csv");

        let linhas = montar_linhas(&[nota_exemplo()], &BaseCfop::default()).unwrap();
        salvar_relatorio_csv(&linhas, &path).unwrap();

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .from_path(&path)
            .unwrap();

        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "ID");
        assert_eq!(&headers[1], "Cenario");

        let lidas: Vec<LinhaRelatorio> = rdr.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(lidas, linhas);
    }
}
