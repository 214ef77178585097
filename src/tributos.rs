use serde::Serialize;

use crate::{
    Registro, campo, campo_ou_vazio, cst_ou_csosn, descricao_cst_ipi, descricao_cst_pis_cofins,
    origem_mercadoria, primeiro_campo,
};

// --- IPI ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpiStatus {
    pub status: &'static str,
    pub descricao: String,
    pub cst: String,
    pub valor: String,
}

/// Enquadramento do IPI pelo CST.
pub fn ipi_status(item: &Registro) -> IpiStatus {
    let cst = campo_ou_vazio(item, "IPI_CST");

    let (status, descricao) = match cst.as_str() {
        "" => ("SEM_IPI", "Não se aplica".to_string()),
        "50" | "51" => ("TRIBUTADO", descricao_cst_ipi(&cst)),
        "52" | "53" | "54" | "55" | "99" => ("ISENTO", descricao_cst_ipi(&cst)),
        _ => ("OUTROS", descricao_cst_ipi(&cst)),
    };

    IpiStatus {
        status,
        descricao,
        valor: campo(item, "IPI_VIPI").unwrap_or_else(|| "0.00".to_string()),
        cst,
    }
}

/// Produto sujeito à TIPI: tem grupo IPI e o CST não é de isenção/suspensão.
pub fn tipi_aplicavel(item: &Registro) -> &'static str {
    if campo(item, "IPI_BLOCO").is_none() {
        return "NAO";
    }

    match campo_ou_vazio(item, "IPI_CST").as_str() {
        "52" | "53" | "54" | "55" => "NAO",
        _ => "SIM",
    }
}

// --- PIS/COFINS ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CofinsStatus {
    pub cst_cofins: String,
    pub tem_cofins: &'static str,
    pub status: String,
    pub cst_pis: String,
    pub descricao_cst_pis: String,
}

pub fn cofins_status(item: &Registro) -> CofinsStatus {
    let cst_cofins = campo_ou_vazio(item, "COFINS_CST");

    let (tem_cofins, status) = match cst_cofins.as_str() {
        "" => ("NAO", "Não mapeado".to_string()),
        "07" | "08" | "09" => (
            "NAO",
            format!("{} (Isento/Suspenso)", descricao_cst_pis_cofins(&cst_cofins)),
        ),
        "01" | "02" | "03" | "04" | "05" | "06" => ("SIM", descricao_cst_pis_cofins(&cst_cofins)),
        outro => ("OUTRO", format!("CST {outro} (não classificado)")),
    };

    let cst_pis = campo_ou_vazio(item, "PIS_CST");

    CofinsStatus {
        descricao_cst_pis: descricao_cst_pis_cofins(&cst_pis),
        cst_pis,
        cst_cofins,
        tem_cofins,
        status,
    }
}

// --- ISSQN ---

/// Item de serviço: grupo ISSQN presente (o campo de presença só conta quando verdadeiro).
pub fn issqn_info(item: &Registro) -> &'static str {
    if campo(item, "ISSQN_BLOCO").is_some() || campo(item, "TEM_ISSQN").is_some() {
        "SIM"
    } else {
        "NAO"
    }
}

// --- DIFAL ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difal {
    pub tem_difal: bool,
    pub motivo: &'static str,
    pub interestadual: bool,
    pub consumidor_final: String,
    pub ind_ie_dest: String,
    pub cfop: String,
}

/// Identifica o diferencial de alíquota (EC 87/2015) no item.
///
/// 1. grupo `ICMSUFDest` no item (ou `TEM_DIFAL = "1"`);
/// 2. saída interestadual (CFOP 6xxx) para consumidor final não contribuinte;
/// 3. saída interestadual para consumidor final contribuinte (uso/consumo ou ativo).
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::{Registro, identificar_difal};
/// use serde_json::json;
///
/// let nota: Registro = serde_json::from_value(json!({
///     "CONSUMIDOR_FINAL": "1", "DEST_IND_IE_DEST": "9",
///     "DIFAL_EMIT_UF": "MG", "DIFAL_DEST_UF": "SP",
/// })).unwrap();
/// let item: Registro = serde_json::from_value(json!({ "CFOP": "6108" })).unwrap();
///
/// let difal = identificar_difal(&nota, &item);
/// assert!(difal.tem_difal);
/// assert_eq!(difal.motivo, "Operação Interestadual, Consumidor Final Não Contribuinte");
/// ```
pub fn identificar_difal(nota: &Registro, item: &Registro) -> Difal {
    let consumidor_final = campo(nota, "CONSUMIDOR_FINAL").unwrap_or_else(|| "0".to_string());
    let ind_ie_dest = campo_ou_vazio(nota, "DEST_IND_IE_DEST");
    let cfop = campo_ou_vazio(item, "CFOP");

    let interestadual = match (campo(nota, "DIFAL_EMIT_UF"), campo(nota, "DIFAL_DEST_UF")) {
        (Some(emit), Some(dest)) => emit != dest,
        _ => false,
    };
    let saida_interestadual = interestadual && cfop.starts_with('6');
    let final_interestadual = saida_interestadual && consumidor_final == "1";

    let bloco = campo(item, "DIFAL_UFDEST_BLOCO").is_some()
        || campo(item, "TEM_DIFAL").as_deref() == Some("1");

    let motivo = if bloco {
        Some("Bloco ICMSUFDest presente no item")
    } else if final_interestadual && ind_ie_dest == "9" {
        Some("Operação Interestadual, Consumidor Final Não Contribuinte")
    } else if final_interestadual && ind_ie_dest == "1" {
        Some("DIFAL Contribuinte (Uso/Consumo ou Ativo Imobilizado)")
    } else {
        None
    };

    Difal {
        tem_difal: motivo.is_some(),
        motivo: motivo.unwrap_or("Sem incidência"),
        interestadual,
        consumidor_final,
        ind_ie_dest,
        cfop,
    }
}

// --- ICMS ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnaliseIcms {
    pub tipo_icms: String,
    pub cst_csosn: String,
    pub regime: String,
    pub qtd_bc_mono: String,
    pub aliquota_ad_rem: String,
    pub valor_icms_retido: String,
    pub vbcst: String,
    pub picmsst: String,
    pub vicmsst: String,
    pub vbc: String,
    pub picms: String,
    pub vicms: String,
    pub origem_mercadoria: String,
}

fn valor_ou_zero(item: &Registro, nome: &str) -> String {
    campo(item, nome).unwrap_or_else(|| "0.00".to_string())
}

/// Tipo do grupo de ICMS do item e os valores do regime correspondente.
pub fn analisar_icms(item: &Registro) -> AnaliseIcms {
    let Some(bloco) = campo(item, "ICMS_BLOCO") else {
        return AnaliseIcms {
            tipo_icms: "Não Aplicável/Não Encontrado".to_string(),
            cst_csosn: "N/A".to_string(),
            ..Default::default()
        };
    };

    let cst = cst_ou_csosn(item);

    let mut analise = AnaliseIcms {
        cst_csosn: if cst.is_empty() { "N/A".to_string() } else { cst.clone() },
        tipo_icms: bloco.clone(),
        ..Default::default()
    };

    if bloco == "ICMS61" {
        analise.regime = "Monofásico - ICMS Retido Anteriormente".to_string();
        analise.qtd_bc_mono = valor_ou_zero(item, "ICMS_QTD_BC_MONO_RET");
        analise.aliquota_ad_rem = valor_ou_zero(item, "ICMS_ALIQUOTA_MONO_RET");
        analise.valor_icms_retido = valor_ou_zero(item, "ICMS_VALOR_MONO_RET");
    } else if bloco.contains("ICMSST") || matches!(cst.as_str(), "10" | "60" | "70" | "500") {
        analise.regime = "Substituição Tributária (ST)".to_string();
        analise.vbcst = valor_ou_zero(item, "ICMS_VBCST");
        analise.picmsst = valor_ou_zero(item, "ICMS_PICMSST");
        analise.vicmsst = valor_ou_zero(item, "ICMS_VICMSST");
    } else if cst == "00" {
        analise.regime = "Tributado Integralmente".to_string();
        analise.vbc = valor_ou_zero(item, "ICMS_VBC");
        analise.picms = valor_ou_zero(item, "ICMS_PICMS");
        analise.vicms = valor_ou_zero(item, "ICMS_VICMS");
    }

    if let Some(origem) = campo(item, "ICMS_ORIGEM") {
        analise.origem_mercadoria = origem_mercadoria(&origem).to_string();
    }

    analise
}

// --- Reforma Tributária (IBS, CBS e IS) ---

/// Campos alternativos de um tributo da reforma, na ordem de prioridade.
struct CamposReforma {
    presenca: &'static [&'static str],
    valor: &'static [&'static str],
    cst: &'static [&'static str],
    aliquota: &'static [&'static str],
}

const CAMPOS_IBS: CamposReforma = CamposReforma {
    presenca: &["IBSCBS_BLOCO", "IBS_BLOCO", "TEM_IBS"],
    valor: &["IBSCBS_VIBS", "IBS_VIBS", "IBS_VALOR", "VIBS"],
    cst: &["IBSCBS_CST", "IBS_CST"],
    aliquota: &["IBSCBS_PIBSUF", "IBS_PIBSUF", "IBS_ALIQ", "IBS_PALIQ", "PIBSUF"],
};

const CAMPOS_CBS: CamposReforma = CamposReforma {
    presenca: &["IBSCBS_BLOCO", "CBS_BLOCO", "TEM_CBS"],
    valor: &["IBSCBS_VCBS", "CBS_VCBS", "CBS_VALOR", "VCBS"],
    cst: &["IBSCBS_CST", "CBS_CST"],
    aliquota: &["IBSCBS_PCBS", "CBS_PCBS", "CBS_ALIQ", "CBS_PALIQ", "PCBS"],
};

const CAMPOS_IS: CamposReforma = CamposReforma {
    presenca: &["IS_BLOCO", "TEM_IS"],
    valor: &["IS_VIS", "IS_VALOR", "VIS"],
    cst: &["IS_CST"],
    aliquota: &["IS_PIS", "IS_ALIQ", "IS_PALIQ", "PIS"],
};

/// Alíquota como número (`0.10` -> `0.1`, `18.00` -> `18.0`), ou o texto original.
fn formatar_aliquota(aliquota: &str) -> String {
    match aliquota.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => format!("{v:.1}"),
        Ok(v) => format!("{v}"),
        Err(_) => aliquota.to_string(),
    }
}

fn formatar_valor(valor: Option<String>) -> String {
    let valor = valor.unwrap_or_default();
    match valor.parse::<f64>() {
        Ok(v) => format!("{v:.2}"),
        Err(_) if valor.is_empty() => "0.00".to_string(),
        Err(_) => valor,
    }
}

fn info_reforma(item: &Registro, campos: &CamposReforma) -> String {
    let valor = primeiro_campo(item, campos.valor);
    let presente = valor.is_some() || primeiro_campo(item, campos.presenca).is_some();

    if !presente {
        return "NAO".to_string();
    }

    let mut detalhes = Vec::new();

    if let Some(cst) = primeiro_campo(item, campos.cst) {
        detalhes.push(format!("CST: {cst}"));
    }

    if let Some(aliquota) = primeiro_campo(item, campos.aliquota) {
        let aliquota = formatar_aliquota(&aliquota);
        if aliquota.parse::<f64>().is_ok() {
            detalhes.push(format!("Alíq: {aliquota}%"));
        } else {
            detalhes.push(format!("Alíq: {aliquota}"));
        }
    }

    let resumo = format!("SIM - R$ {}", formatar_valor(valor));

    if detalhes.is_empty() {
        resumo
    } else {
        format!("{resumo} ({})", detalhes.join("; "))
    }
}

/// Imposto sobre Bens e Serviços.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::{Registro, ibs_info};
/// use serde_json::json;
///
/// let item: Registro = serde_json::from_value(json!({
///     "IBSCBS_BLOCO": "gIBSCBS", "IBSCBS_CST": "000",
///     "IBSCBS_VIBS": "1.5", "IBSCBS_PIBSUF": "0.10",
/// })).unwrap();
///
/// assert_eq!(ibs_info(&item), "SIM - R$ 1.50 (CST: 000; Alíq: 0.1%)");
/// assert_eq!(ibs_info(&Registro::new()), "NAO");
/// ```
pub fn ibs_info(item: &Registro) -> String {
    info_reforma(item, &CAMPOS_IBS)
}

/// Contribuição sobre Bens e Serviços.
pub fn cbs_info(item: &Registro) -> String {
    info_reforma(item, &CAMPOS_CBS)
}

/// Imposto Seletivo.
pub fn is_info(item: &Registro) -> String {
    info_reforma(item, &CAMPOS_IS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn registro(valor: Value) -> Registro {
        serde_json::from_value(valor).unwrap()
    }

    #[test]
    fn enquadramento_do_ipi() {
        let sem = ipi_status(&Registro::new());
        assert_eq!(sem.status, "SEM_IPI");
        assert_eq!(sem.valor, "0.00");

        let tributado = ipi_status(&registro(json!({ "IPI_CST": "50", "IPI_VIPI": "12.34" })));
        assert_eq!(tributado.status, "TRIBUTADO");
        assert_eq!(tributado.descricao, "Saída tributada");
        assert_eq!(tributado.valor, "12.34");

        assert_eq!(ipi_status(&registro(json!({ "IPI_CST": "53" }))).status, "ISENTO");
        assert_eq!(ipi_status(&registro(json!({ "IPI_CST": "02" }))).status, "OUTROS");
    }

    #[test]
    fn tipi_exige_bloco_e_cst_tributavel() {
        assert_eq!(tipi_aplicavel(&registro(json!({ "IPI_CST": "50" }))), "NAO");
        assert_eq!(
            tipi_aplicavel(&registro(json!({ "IPI_BLOCO": "IPITrib", "IPI_CST": "50" }))),
            "SIM"
        );
        assert_eq!(
            tipi_aplicavel(&registro(json!({ "IPI_BLOCO": "IPINT", "IPI_CST": "53" }))),
            "NAO"
        );
    }

    #[test]
    fn cofins_por_faixa_de_cst() {
        let vazio = cofins_status(&Registro::new());
        assert_eq!((vazio.tem_cofins, vazio.status.as_str()), ("NAO", "Não mapeado"));

        let isento = cofins_status(&registro(json!({ "COFINS_CST": "07", "PIS_CST": "07" })));
        assert_eq!(isento.tem_cofins, "NAO");
        assert_eq!(isento.status, "Operação Isenta da Contribuição (Isento/Suspenso)");
        assert_eq!(isento.descricao_cst_pis, "Operação Isenta da Contribuição");

        assert_eq!(cofins_status(&registro(json!({ "COFINS_CST": "01" }))).tem_cofins, "SIM");

        let outro = cofins_status(&registro(json!({ "COFINS_CST": "49" })));
        assert_eq!(outro.tem_cofins, "OUTRO");
        assert_eq!(outro.status, "CST 49 (não classificado)");
    }

    #[test]
    fn issqn_ignora_presenca_falsa() {
        assert_eq!(issqn_info(&registro(json!({ "TEM_ISSQN": false }))), "NAO");
        assert_eq!(issqn_info(&registro(json!({ "TEM_ISSQN": true }))), "SIM");
        assert_eq!(issqn_info(&registro(json!({ "ISSQN_BLOCO": "vBC" }))), "SIM");
    }

    #[test]
    fn regras_do_difal() {
        let nota = registro(json!({
            "CONSUMIDOR_FINAL": "1",
            "DEST_IND_IE_DEST": "1",
            "DIFAL_EMIT_UF": "MG",
            "DIFAL_DEST_UF": "RJ",
        }));

        let contribuinte = identificar_difal(&nota, &registro(json!({ "CFOP": "6556" })));
        assert!(contribuinte.tem_difal);
        assert_eq!(contribuinte.motivo, "DIFAL Contribuinte (Uso/Consumo ou Ativo Imobilizado)");

        let entrada = identificar_difal(&nota, &registro(json!({ "CFOP": "2102" })));
        assert!(!entrada.tem_difal);
        assert_eq!(entrada.motivo, "Sem incidência");
        assert!(entrada.interestadual);

        let bloco = identificar_difal(
            &Registro::new(),
            &registro(json!({ "DIFAL_UFDEST_BLOCO": "vBCUFDest" })),
        );
        assert!(bloco.tem_difal);
        assert!(!bloco.interestadual);
        assert_eq!(bloco.consumidor_final, "0");
    }

    #[test]
    fn analise_do_icms_por_regime() {
        let mono = analisar_icms(&registro(json!({
            "ICMS_BLOCO": "ICMS61",
            "ICMS_CST": "61",
            "ICMS_QTD_BC_MONO_RET": "100.0000",
            "ICMS_ORIGEM": "0",
        })));
        assert_eq!(mono.regime, "Monofásico - ICMS Retido Anteriormente");
        assert_eq!(mono.qtd_bc_mono, "100.0000");
        assert_eq!(mono.aliquota_ad_rem, "0.00");
        assert_eq!(mono.origem_mercadoria, "Nacional");

        let st = analisar_icms(&registro(json!({ "ICMS_BLOCO": "ICMSSN500", "ICMS_CSOSN": "500" })));
        assert_eq!(st.regime, "Substituição Tributária (ST)");
        assert_eq!(st.cst_csosn, "500");

        let normal = analisar_icms(&registro(json!({
            "ICMS_BLOCO": "ICMS00", "ICMS_CST": "00", "ICMS_PICMS": "18.00", "ICMS_ORIGEM": "2",
        })));
        assert_eq!(normal.regime, "Tributado Integralmente");
        assert_eq!(normal.picms, "18.00");
        assert_eq!(normal.origem_mercadoria, "Estrangeira - Adquirida no Brasil");

        let ausente = analisar_icms(&Registro::new());
        assert_eq!(ausente.tipo_icms, "Não Aplicável/Não Encontrado");
        assert_eq!(ausente.cst_csosn, "N/A");
    }

    #[test]
    fn tributos_da_reforma() {
        let item = registro(json!({
            "IBSCBS_BLOCO": "CST",
            "IBSCBS_VCBS": "10",
            "IBSCBS_PCBS": "0.90",
            "IS_BLOCO": "CSTIS",
            "IS_PIS": "abc",
        }));

        assert_eq!(ibs_info(&item), "SIM - R$ 0.00");
        assert_eq!(cbs_info(&item), "SIM - R$ 10.00 (Alíq: 0.9%)");
        assert_eq!(is_info(&item), "SIM - R$ 0.00 (Alíq: abc)");
        assert_eq!(is_info(&Registro::new()), "NAO");
    }
}
