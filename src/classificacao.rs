use serde::Serialize;

use crate::{
    BaseCfop, RE_MULTISPACE, RE_NON_DIGITS, Registro, campo, campo_ou_vazio, modalidade_frete,
    primeiro_campo,
};

/// Tamanho máximo da natureza da operação no resumo do cenário.
const NATOP_MAX_CHARS: usize = 25;

/// `TIPO_NF` 0 é entrada; qualquer outro valor é saída.
pub fn tipo_operacao(nota: &Registro) -> &'static str {
    match campo(nota, "TIPO_NF").as_deref() {
        Some("0") => "ENTRADA",
        _ => "SAIDA",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsumidorFinal {
    pub indicador: &'static str,
    pub descricao: &'static str,
}

/// Consumidor final: `IND_FINAL = 1`, ou NFC-e (modelo 65). Caso contrário, B2B.
pub fn consumidor_final(nota: &Registro) -> ConsumidorFinal {
    if campo(nota, "IND_FINAL").as_deref() == Some("1") {
        return ConsumidorFinal {
            indicador: "SIM",
            descricao: "Consumidor Final (IND_FINAL=1)",
        };
    }

    if campo(nota, "MODELO").as_deref() == Some("65") {
        return ConsumidorFinal {
            indicador: "SIM",
            descricao: "NFC-e (Modelo 65)",
        };
    }

    ConsumidorFinal {
        indicador: "NAO",
        descricao: "Operação B2B (Modelo 55 ou 57, IND_FINAL=0)",
    }
}

/// Descrição da modalidade de frete da nota.
pub fn transporte(nota: &Registro) -> String {
    match campo(nota, "TRANSP_MOD_FRETE") {
        None => "Não Informado".to_string(),
        Some(codigo) => modalidade_frete(&codigo)
            .map_or_else(|| format!("Modalidade {codigo}"), String::from),
    }
}

/// Abreviação do frete para o resumo do cenário.
fn frete_abreviado(nota: &Registro) -> Option<&'static str> {
    match campo(nota, "TRANSP_MOD_FRETE")?.as_str() {
        "0" => Some("FRETE-EMIT"),
        "1" => Some("FRETE-DEST"),
        "2" | "3" => Some("FRETE-3º"),
        "9" => Some("SEM-FRETE"),
        _ => None,
    }
}

/// Natureza da operação pelo primeiro dígito do CFOP.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::natureza_operacao;
///
/// assert_eq!(natureza_operacao("5101"), "Saída (CFOP 5101)");
/// assert_eq!(natureza_operacao(" 2.102 "), "Entrada (CFOP 2.102)");
/// assert_eq!(natureza_operacao("abc"), "");
/// ```
pub fn natureza_operacao(cfop: &str) -> String {
    let digitos = RE_NON_DIGITS.replace_all(cfop, "");

    let natureza = match digitos.chars().next() {
        None => return String::new(),
        Some('1'..='3') => "Entrada",
        Some('5'..='7') => "Saída",
        Some(_) => "Outros",
    };

    format!("{natureza} (CFOP {})", cfop.trim())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CfopInfo {
    pub cfop: String,
    pub descricao: String,
}

pub fn cfop_info(item: &Registro, base: &BaseCfop) -> CfopInfo {
    let cfop = campo_ou_vazio(item, "CFOP");
    let descricao = base.descricao(&cfop);

    CfopInfo { cfop, descricao }
}

/// Informações complementares do contribuinte, do fisco e do item.
pub fn info_adicionais(nota: &Registro, item: &Registro, indice: usize) -> String {
    let mut partes = Vec::new();
    let compactar = |texto: String| RE_MULTISPACE.replace_all(texto.trim(), " ").into_owned();

    if let Some(info) = primeiro_campo(nota, &["INF_CPL", "INF_COMPLEMENTARES"]) {
        partes.push(format!("[CONTRIBUINTE]: {}", compactar(info)));
    }

    if let Some(info) = campo(nota, "INF_FISCO") {
        partes.push(format!("[FISCO]: {}", compactar(info)));
    }

    if let Some(info) = campo(item, "INFO_ADICIONAL") {
        let numero = campo(item, "NUMERO").unwrap_or_else(|| (indice + 1).to_string());
        partes.push(format!("[ITEM {numero}]: {}", compactar(info)));
    }

    partes.join(" | ")
}

/// CST do ICMS (regime normal) ou CSOSN (Simples Nacional).
pub fn cst_ou_csosn(item: &Registro) -> String {
    primeiro_campo(item, &["ICMS_CST", "ICMS_CSOSN"]).unwrap_or_default()
}

fn regime_icms(cst: &str) -> &'static str {
    match cst {
        "10" | "60" | "70" => "ICMS-ST",
        "61" => "ICMS-MONO",
        "40" | "41" | "50" => "ICMS-ISENTO",
        csosn if csosn.chars().count() == 3 => "SIMPLES",
        _ => "ICMS-NORMAL",
    }
}

/// Resumo do cenário da operação (ex: `MERCADORIA | SAIDA | FRETE-EMIT | Venda | [ICMS, PIS] | ICMS-ST`).
pub fn gerar_cenario(nota: &Registro, item: &Registro) -> String {
    let mut partes: Vec<String> = Vec::new();

    match nota.get("TIPO_DOCUMENTO") {
        None => partes.push("N/A".to_string()),
        Some(_) => {
            if let Some(tipo) = campo(nota, "TIPO_DOCUMENTO") {
                partes.push(tipo.to_uppercase());
            }
        }
    }

    partes.push(tipo_operacao(nota).to_string());

    if let Some(frete) = frete_abreviado(nota) {
        partes.push(frete.to_string());
    }

    if let Some(natop) = campo(nota, "NATUREZA_OPERACAO") {
        if natop.chars().count() > NATOP_MAX_CHARS {
            let resumo: String = natop.chars().take(NATOP_MAX_CHARS).collect();
            partes.push(format!("{resumo}..."));
        } else {
            partes.push(natop);
        }
    }

    if let Some(impostos) = campo(item, "TODOS_IMPOSTOS") {
        partes.push(format!("[{impostos}]"));
    }

    let cst = cst_ou_csosn(item);
    if !cst.is_empty() {
        partes.push(regime_icms(&cst).to_string());
    }

    partes.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn registro(valor: Value) -> Registro {
        match valor {
            Value::Object(map) => map,
            _ => Registro::new(),
        }
    }

    #[test]
    fn operacao_e_consumidor_final() {
        let entrada = registro(json!({ "TIPO_NF": "0", "MODELO": "65" }));
        assert_eq!(tipo_operacao(&entrada), "ENTRADA");
        assert_eq!(consumidor_final(&entrada).descricao, "NFC-e (Modelo 65)");

        let saida = registro(json!({ "TIPO_NF": "1", "IND_FINAL": "0", "MODELO": "55" }));
        assert_eq!(tipo_operacao(&saida), "SAIDA");
        assert_eq!(consumidor_final(&saida).indicador, "NAO");

        let sem_tipo = registro(json!({ "IND_FINAL": "1" }));
        assert_eq!(tipo_operacao(&sem_tipo), "SAIDA");
        assert_eq!(consumidor_final(&sem_tipo).indicador, "SIM");
    }

    #[test]
    fn descricao_do_transporte() {
        assert_eq!(transporte(&registro(json!({ "TRANSP_MOD_FRETE": "9" }))), "Sem Frete");
        assert_eq!(transporte(&registro(json!({ "TRANSP_MOD_FRETE": "7" }))), "Modalidade 7");
        assert_eq!(transporte(&registro(json!({ "TRANSP_MOD_FRETE": null }))), "Não Informado");
    }

    #[test]
    fn natureza_por_primeiro_digito() {
        assert_eq!(natureza_operacao("5101"), "Saída (CFOP 5101)");
        assert_eq!(natureza_operacao("6108"), "Saída (CFOP 6108)");
        assert_eq!(natureza_operacao("1102"), "Entrada (CFOP 1102)");
        assert_eq!(natureza_operacao("3949"), "Entrada (CFOP 3949)");
        assert_eq!(natureza_operacao("4000"), "Outros (CFOP 4000)");
        assert_eq!(natureza_operacao(""), "");
        // Código exibido como informado
        assert_eq!(natureza_operacao("6.108"), "Saída (CFOP 6.108)");
        assert_eq!(natureza_operacao(" 5101\n"), "Saída (CFOP 5101)");
    }

    #[test]
    fn cfop_com_descricao() {
        let item = registro(json!({ "CFOP": "5101" }));
        let info = cfop_info(&item, &BaseCfop::default());

        assert_eq!(info.cfop, "5101");
        assert_eq!(info.descricao, "Venda de produção do estabelecimento");

        let vazio = cfop_info(&Registro::new(), &BaseCfop::default());
        assert_eq!(vazio.descricao, "CFOP não informado");
    }

    #[test]
    fn informacoes_adicionais_concatenadas() {
        let nota = registro(json!({ "INF_CPL": "Pedido   42 ", "INF_FISCO": null }));
        let item = registro(json!({ "INFO_ADICIONAL": "Lote 7" }));

        assert_eq!(
            info_adicionais(&nota, &item, 2),
            "[CONTRIBUINTE]: Pedido 42 | [ITEM 3]: Lote 7"
        );
        assert_eq!(info_adicionais(&Registro::new(), &Registro::new(), 0), "");
    }

    #[test]
    fn cenario_resumido() {
        let nota = registro(json!({
            "TIPO_DOCUMENTO": "mercadoria",
            "TIPO_NF": "1",
            "TRANSP_MOD_FRETE": "0",
            "NATUREZA_OPERACAO": "Venda de mercadoria adquirida de terceiros",
        }));
        let item = registro(json!({ "TODOS_IMPOSTOS": "ICMS, PIS, COFINS", "ICMS_CST": "60" }));

        assert_eq!(
            gerar_cenario(&nota, &item),
            "MERCADORIA | SAIDA | FRETE-EMIT | Venda de mercadoria adqui... | [ICMS, PIS, COFINS] | ICMS-ST"
        );

        let simples = registro(json!({ "ICMS_CSOSN": "102" }));
        assert_eq!(gerar_cenario(&Registro::new(), &simples), "N/A | SAIDA | SIMPLES");
    }
}
