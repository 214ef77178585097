use chrono::NaiveDate;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use crate::{
    CampoMapeado, FiscalResult, LinhaRelatorio, Mapeamento, NotaFiscal, RE_DATA_ISO, Registro, campo,
    campo_ou_vazio, fmt_milhares,
};

/// Colunas de classificação que definem um cenário (na ordem do CSV agrupado).
pub const COLUNAS_CENARIO: [&str; 33] = [
    "Cenario",
    "Tipo",
    "CNPJ/CPF Emissor",
    "Razão Social Emissor",
    "CNPJ/CPF Destinatário",
    "Razão Social Destinatário",
    "UF Emissor",
    "UF Destinatário",
    "Operação",
    "Consumidor Final",
    "Transporte",
    "NCM",
    "Classificação/Produto",
    "NATOP",
    "CFOP",
    "DESC CFOP",
    "CST ICMS",
    "DESC CST ICMS",
    "%ICMS Normal",
    "ICMS VBC",
    "CST IPI",
    "ENQUADRAMENTO IPI",
    "Valor IPI",
    "TIPI",
    "CST PIS",
    "DESC CST PIS",
    "%PIS",
    "CST COFINS",
    "DESC CST COFINS",
    "%COFINS",
    "Sujeito a ISS?",
    "DIFAL",
    "Outros Impostos",
];

/// Chave de agrupamento: os campos de classificação de uma linha do relatório.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cenario {
    pub cenario: String,
    pub tipo: String,
    pub cnpj_cpf_emissor: String,
    pub razao_social_emissor: String,
    pub cnpj_cpf_destinatario: String,
    pub razao_social_destinatario: String,
    pub uf_emissor: String,
    pub uf_destinatario: String,
    pub operacao: String,
    pub consumidor_final: String,
    pub transporte: String,
    pub ncm: String,
    pub produto: String,
    pub natop: String,
    pub cfop: String,
    pub desc_cfop: String,
    pub cst_icms: String,
    pub desc_cst_icms: String,
    pub aliquota_icms: String,
    pub icms_vbc: String,
    pub cst_ipi: String,
    pub enquadramento_ipi: String,
    pub valor_ipi: String,
    pub tipi: String,
    pub cst_pis: String,
    pub desc_cst_pis: String,
    pub aliquota_pis: String,
    pub cst_cofins: String,
    pub desc_cst_cofins: String,
    pub aliquota_cofins: String,
    pub sujeito_iss: String,
    pub difal: String,
    pub outros_impostos: String,
}

impl From<&LinhaRelatorio> for Cenario {
    fn from(linha: &LinhaRelatorio) -> Self {
        let t = |s: &str| s.trim().to_string();

        Cenario {
            cenario: t(&linha.cenario),
            tipo: t(&linha.tipo),
            cnpj_cpf_emissor: t(&linha.cnpj_cpf_emissor),
            razao_social_emissor: t(&linha.razao_social_emissor),
            cnpj_cpf_destinatario: t(&linha.cnpj_cpf_destinatario),
            razao_social_destinatario: t(&linha.razao_social_destinatario),
            uf_emissor: t(&linha.uf_emissor),
            uf_destinatario: t(&linha.uf_destinatario),
            operacao: t(&linha.operacao),
            consumidor_final: t(&linha.consumidor_final),
            transporte: t(&linha.transporte),
            ncm: t(&linha.ncm),
            produto: t(&linha.produto),
            natop: t(&linha.natop),
            cfop: t(&linha.cfop),
            desc_cfop: t(&linha.desc_cfop),
            cst_icms: t(&linha.cst_icms),
            desc_cst_icms: t(&linha.desc_cst_icms),
            aliquota_icms: t(&linha.aliquota_icms),
            icms_vbc: t(&linha.icms_vbc),
            cst_ipi: t(&linha.cst_ipi),
            enquadramento_ipi: t(&linha.enquadramento_ipi),
            valor_ipi: t(&linha.valor_ipi),
            tipi: t(&linha.tipi),
            cst_pis: t(&linha.cst_pis),
            desc_cst_pis: t(&linha.desc_cst_pis),
            aliquota_pis: t(&linha.aliquota_pis),
            cst_cofins: t(&linha.cst_cofins),
            desc_cst_cofins: t(&linha.desc_cst_cofins),
            aliquota_cofins: t(&linha.aliquota_cofins),
            sujeito_iss: t(&linha.sujeito_iss),
            difal: linha.difal.to_string(),
            outros_impostos: t(&linha.outros_impostos),
        }
    }
}

impl Cenario {
    /// Valores na ordem de `COLUNAS_CENARIO`.
    pub fn valores(&self) -> [&str; 33] {
        [
            self.cenario.as_str(),
            self.tipo.as_str(),
            self.cnpj_cpf_emissor.as_str(),
            self.razao_social_emissor.as_str(),
            self.cnpj_cpf_destinatario.as_str(),
            self.razao_social_destinatario.as_str(),
            self.uf_emissor.as_str(),
            self.uf_destinatario.as_str(),
            self.operacao.as_str(),
            self.consumidor_final.as_str(),
            self.transporte.as_str(),
            self.ncm.as_str(),
            self.produto.as_str(),
            self.natop.as_str(),
            self.cfop.as_str(),
            self.desc_cfop.as_str(),
            self.cst_icms.as_str(),
            self.desc_cst_icms.as_str(),
            self.aliquota_icms.as_str(),
            self.icms_vbc.as_str(),
            self.cst_ipi.as_str(),
            self.enquadramento_ipi.as_str(),
            self.valor_ipi.as_str(),
            self.tipi.as_str(),
            self.cst_pis.as_str(),
            self.desc_cst_pis.as_str(),
            self.aliquota_pis.as_str(),
            self.cst_cofins.as_str(),
            self.desc_cst_cofins.as_str(),
            self.aliquota_cofins.as_str(),
            self.sujeito_iss.as_str(),
            self.difal.as_str(),
            self.outros_impostos.as_str(),
        ]
    }
}

/// Cenário com a quantidade de linhas agrupadas e as notas envolvidas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrupoCenario {
    pub cenario: Cenario,
    pub qtd_agrupamentos: usize,
    /// Números das notas, sem repetição, na ordem em que apareceram.
    pub nfs_agrupadas: String,
}

/// Agrupa as linhas do relatório por cenário. Saída ordenada pela chave.
pub fn agrupar_cenarios(linhas: &[LinhaRelatorio]) -> Vec<GrupoCenario> {
    let mut grupos: BTreeMap<Cenario, (usize, Vec<&str>)> = BTreeMap::new();

    for linha in linhas {
        let (qtd, notas) = grupos.entry(Cenario::from(linha)).or_default();
        *qtd += 1;
        if !notas.contains(&linha.numero_nota.as_str()) {
            notas.push(&linha.numero_nota);
        }
    }

    grupos
        .into_iter()
        .map(|(cenario, (qtd_agrupamentos, notas))| GrupoCenario {
            cenario,
            qtd_agrupamentos,
            nfs_agrupadas: notas.join(", "),
        })
        .collect()
}

/// CSV dos cenários agrupados (delimitador `;`).
pub fn salvar_cenarios_csv(grupos: &[GrupoCenario], path: &Path) -> FiscalResult<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;

    let mut cabecalho: Vec<&str> = COLUNAS_CENARIO.to_vec();
    cabecalho.extend(["qtd_agrupamentos", "nfs_agrupadas"]);
    wtr.write_record(&cabecalho)?;

    for grupo in grupos {
        let qtd = grupo.qtd_agrupamentos.to_string();
        let mut registro: Vec<&str> = grupo.cenario.valores().to_vec();
        registro.extend([qtd.as_str(), grupo.nfs_agrupadas.as_str()]);
        wtr.write_record(&registro)?;
    }

    wtr.flush()?;
    println!(
        " Cenários agrupados ({}) salvos em: <{}>",
        fmt_milhares(grupos.len()),
        path.display()
    );

    Ok(())
}

// --- Estrutura hierárquica (emitente -> cenários) ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destinatario {
    pub cnpj: String,
    pub razao_social: String,
    pub uf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DadosFiscais {
    pub operacao: String,
    pub consumidor_final: String,
    pub ncm: String,
    pub cfop: String,
    pub natureza: String,
    pub transporte: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Impostos {
    pub icms_cst: String,
    pub ipi_cst: String,
    pub pis_cst: String,
    pub cofins_cst: String,
    pub outros: String,
    pub sujeito_iss: String,
    pub difal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CenarioEmitente {
    pub tipo: String,
    pub destinatario: Destinatario,
    pub fiscal: DadosFiscais,
    pub impostos: Impostos,
    pub qtd_agrupamentos: usize,
    pub nfs_agrupadas: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emitente {
    pub cnpj_emissor: String,
    pub razao_social_emissor: String,
    pub uf_emissor: String,
    pub cenarios: Vec<CenarioEmitente>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstruturaHierarquica {
    pub total_emitentes: usize,
    pub emitentes: Vec<Emitente>,
}

impl From<&GrupoCenario> for CenarioEmitente {
    fn from(grupo: &GrupoCenario) -> Self {
        let c = &grupo.cenario;

        CenarioEmitente {
            tipo: c.tipo.clone(),
            destinatario: Destinatario {
                cnpj: c.cnpj_cpf_destinatario.clone(),
                razao_social: c.razao_social_destinatario.clone(),
                uf: c.uf_destinatario.clone(),
            },
            fiscal: DadosFiscais {
                operacao: c.operacao.clone(),
                consumidor_final: c.consumidor_final.clone(),
                ncm: c.ncm.clone(),
                cfop: c.cfop.clone(),
                natureza: c.natop.clone(),
                transporte: c.transporte.clone(),
            },
            impostos: Impostos {
                icms_cst: c.cst_icms.clone(),
                ipi_cst: c.cst_ipi.clone(),
                pis_cst: c.cst_pis.clone(),
                cofins_cst: c.cst_cofins.clone(),
                outros: c.outros_impostos.clone(),
                sujeito_iss: c.sujeito_iss.clone(),
                difal: c.difal.clone(),
            },
            qtd_agrupamentos: grupo.qtd_agrupamentos,
            nfs_agrupadas: grupo.nfs_agrupadas.clone(),
        }
    }
}

/// Cenários agrupados por emitente, na ordem em que os emitentes aparecem.
pub fn estrutura_hierarquica(grupos: &[GrupoCenario]) -> EstruturaHierarquica {
    let mut emitentes: Vec<Emitente> = Vec::new();
    let mut indices: HashMap<&str, usize> = HashMap::new();

    for grupo in grupos {
        let cnpj = match grupo.cenario.cnpj_cpf_emissor.as_str() {
            "" => "DESCONHECIDO",
            cnpj => cnpj,
        };

        let indice = *indices.entry(cnpj).or_insert_with(|| {
            emitentes.push(Emitente {
                cnpj_emissor: cnpj.to_string(),
                razao_social_emissor: grupo.cenario.razao_social_emissor.clone(),
                uf_emissor: grupo.cenario.uf_emissor.clone(),
                cenarios: Vec::new(),
            });
            emitentes.len() - 1
        });

        emitentes[indice].cenarios.push(CenarioEmitente::from(grupo));
    }

    EstruturaHierarquica {
        total_emitentes: emitentes.len(),
        emitentes,
    }
}

// --- Análise por empresa (conjuntos fiscais únicos) ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Periodo {
    pub inicio: Option<String>,
    pub fim: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CabecalhoFiscal {
    pub modelo: Option<String>,
    pub tipo_nf: Option<String>,
    pub natureza_operacao: Option<String>,
    pub emit_uf: Option<String>,
    pub emit_mun: Option<String>,
    pub dest_uf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ItemFiscal {
    pub n_item: String,
    pub ncm: String,
    pub cfop: String,
    pub icms_cst: String,
    pub pis_cst: String,
    pub cofins_cst: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConjuntoFiscal {
    pub cabecalho_fiscal: CabecalhoFiscal,
    pub itens_fiscais: Vec<ItemFiscal>,
    pub count: usize,
    /// Hash blake3 do cabeçalho e dos itens fiscais.
    pub assinatura: String,
}

/// Presença de um campo opcional do mapeamento nas notas de uma empresa.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresencaCampo {
    pub presente_em: usize,
    pub total_notas: usize,
    /// Percentual com duas casas decimais.
    pub percentual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnaliseEmpresa {
    pub empresa_cnpj: String,
    pub periodo: Periodo,
    pub campos_opcionais: BTreeMap<String, PresencaCampo>,
    pub notas: Vec<ConjuntoFiscal>,
}

/// `2024-03-15T10:20:00-03:00` -> `2024-03-15`. Datas inválidas são ignoradas.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::normalizar_data;
///
/// assert_eq!(normalizar_data("2024-03-15T10:20:00-03:00").map(|d| d.to_string()), Some("2024-03-15".to_string()));
/// assert_eq!(normalizar_data("2024-02-30"), None);
/// assert_eq!(normalizar_data("15/03/2024"), None);
/// ```
pub fn normalizar_data(texto: &str) -> Option<NaiveDate> {
    let data = RE_DATA_ISO.captures(texto.trim())?.get(1)?.as_str();
    NaiveDate::parse_from_str(data, "%Y-%m-%d").ok()
}

fn periodo(notas: &[&NotaFiscal]) -> Periodo {
    let datas: Vec<NaiveDate> = notas
        .iter()
        .filter_map(|n| n.campo("DATA_EMISSAO"))
        .filter_map(|d| normalizar_data(&d))
        .collect();

    let formatar = |d: &NaiveDate| d.format("%Y-%m-%d").to_string();

    Periodo {
        inicio: datas.iter().min().map(formatar),
        fim: datas.iter().max().map(formatar),
    }
}

fn cabecalho_fiscal(nota: &NotaFiscal) -> CabecalhoFiscal {
    CabecalhoFiscal {
        modelo: nota.campo("MODELO"),
        tipo_nf: nota.campo("TIPO_NF"),
        natureza_operacao: nota.campo("NATUREZA_OPERACAO"),
        emit_uf: nota.campo("EMIT_UF"),
        emit_mun: nota.campo("EMIT_MUN"),
        dest_uf: nota.campo("DEST_UF"),
    }
}

fn item_fiscal(item: &Registro) -> ItemFiscal {
    ItemFiscal {
        n_item: campo_ou_vazio(item, "NUMERO"),
        ncm: campo_ou_vazio(item, "NCM"),
        cfop: campo_ou_vazio(item, "CFOP"),
        icms_cst: campo_ou_vazio(item, "ICMS_CST"),
        pis_cst: campo_ou_vazio(item, "PIS_CST"),
        cofins_cst: campo_ou_vazio(item, "COFINS_CST"),
    }
}

fn assinatura(cabecalho: &CabecalhoFiscal, itens: &[ItemFiscal]) -> FiscalResult<String> {
    let bytes = serde_json::to_vec(&(cabecalho, itens))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

fn conjuntos_unicos(notas: &[&NotaFiscal]) -> FiscalResult<Vec<ConjuntoFiscal>> {
    let mut conjuntos: Vec<ConjuntoFiscal> = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();

    for nota in notas {
        let cabecalho = cabecalho_fiscal(nota);
        let itens: Vec<ItemFiscal> = nota.itens.iter().map(item_fiscal).collect();
        let hash = assinatura(&cabecalho, &itens)?;

        match indices.get(&hash) {
            Some(&i) => conjuntos[i].count += 1,
            None => {
                indices.insert(hash.clone(), conjuntos.len());
                conjuntos.push(ConjuntoFiscal {
                    cabecalho_fiscal: cabecalho,
                    itens_fiscais: itens,
                    count: 1,
                    assinatura: hash,
                });
            }
        }
    }

    Ok(conjuntos)
}

/// Um campo de item está presente na nota quando algum item tem valor.
fn nota_tem_campo(nota: &NotaFiscal, campo_mapeado: &CampoMapeado) -> bool {
    if campo_mapeado.eh_item() {
        let nome = campo_mapeado.nome_no_item();
        nota.itens.iter().any(|item| campo(item, nome).is_some())
    } else {
        nota.campo(&campo_mapeado.destino).is_some()
    }
}

/// Quantas notas preenchem cada campo marcado como `opcional` no mapeamento.
pub fn campos_opcionais(
    notas: &[&NotaFiscal],
    mapeamento: &Mapeamento,
) -> BTreeMap<String, PresencaCampo> {
    let total_notas = notas.len();

    mapeamento
        .campos()
        .iter()
        .filter(|c| c.opcional)
        .map(|c| {
            let presente_em = notas.iter().filter(|n| nota_tem_campo(n, c)).count();
            let percentual = if total_notas > 0 {
                (presente_em as f64 * 10_000.0 / total_notas as f64).round() / 100.0
            } else {
                0.0
            };

            let presenca = PresencaCampo {
                presente_em,
                total_notas,
                percentual,
            };

            (c.chave.clone(), presenca)
        })
        .collect()
}

fn imprimir_campos_opcionais(campos: &BTreeMap<String, PresencaCampo>) {
    for (nome, presenca) in campos {
        if presenca.presente_em > 0 {
            println!(
                "    {nome}: presente em {} notas ({}%)",
                fmt_milhares(presenca.presente_em),
                presenca.percentual
            );
        } else {
            println!("    {nome}: ausente em todas as notas");
        }
    }
}

/// Agrupa as notas por CNPJ do emitente (notas sem CNPJ são ignoradas).
pub fn analisar_por_empresa(
    notas: &[NotaFiscal],
    mapeamento: &Mapeamento,
) -> FiscalResult<Vec<AnaliseEmpresa>> {
    let mut ordem: Vec<String> = Vec::new();
    let mut por_cnpj: HashMap<String, Vec<&NotaFiscal>> = HashMap::new();

    for nota in notas {
        let Some(cnpj) = nota.campo("EMIT_CNPJ") else {
            continue;
        };
        if !por_cnpj.contains_key(&cnpj) {
            ordem.push(cnpj.clone());
        }
        por_cnpj.entry(cnpj).or_default().push(nota);
    }

    let mut analises = Vec::with_capacity(ordem.len());

    for cnpj in ordem {
        let notas_da_empresa = por_cnpj.remove(&cnpj).unwrap_or_default();
        let conjuntos = conjuntos_unicos(&notas_da_empresa)?;
        let opcionais = campos_opcionais(&notas_da_empresa, mapeamento);

        println!(
            " CNPJ {cnpj}: {} notas, {} conjuntos fiscais únicos",
            fmt_milhares(notas_da_empresa.len()),
            fmt_milhares(conjuntos.len())
        );
        imprimir_campos_opcionais(&opcionais);

        analises.push(AnaliseEmpresa {
            periodo: periodo(&notas_da_empresa),
            empresa_cnpj: cnpj,
            campos_opcionais: opcionais,
            notas: conjuntos,
        });
    }

    Ok(analises)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn linha(numero: &str, cfop: &str, emissor: &str) -> LinhaRelatorio {
        LinhaRelatorio {
            numero_nota: numero.to_string(),
            cfop: cfop.to_string(),
            cnpj_cpf_emissor: emissor.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn agrupa_e_concatena_notas_distintas() {
        let linhas = vec![
            linha("10", "5102", "111"),
            linha("10", "5102", "111"),
            linha("7", "5102", "111"),
            linha("8", "5405", "111"),
            linha("9", "5102", "222"),
        ];

        let grupos = agrupar_cenarios(&linhas);
        assert_eq!(grupos.len(), 3);

        let principal = grupos
            .iter()
            .find(|g| g.cenario.cfop == "5102" && g.cenario.cnpj_cpf_emissor == "111")
            .unwrap();
        assert_eq!(principal.qtd_agrupamentos, 3);
        assert_eq!(principal.nfs_agrupadas, "10, 7");

        let estrutura = estrutura_hierarquica(&grupos);
        assert_eq!(estrutura.total_emitentes, 2);
        assert_eq!(estrutura.emitentes[0].cnpj_emissor, "111");
        assert_eq!(estrutura.emitentes[0].cenarios.len(), 2);
    }

    #[test]
    fn agrupamento_ignora_espacos_nas_bordas() {
        let linhas = vec![linha("1", " 5102", "111"), linha("2", "5102 ", "111")];
        assert_eq!(agrupar_cenarios(&linhas).len(), 1);
    }

    fn mapeamento_com_opcionais() -> Mapeamento {
        Mapeamento::from_json(
            r#"{
                "NUMERO_NF": { "caminho_xml": "infNFe/ide/nNF" },
                "DEST_CPF": { "caminho_xml": "infNFe/dest/CPF", "opcional": true },
                "ITEM_IPI_VIPI": { "caminho_xml": "infNFe/det/imposto/IPI/IPITrib/vIPI", "opcional": true },
                "ITEM_CFOP": { "caminho_xml": "infNFe/det/prod/CFOP" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn conjuntos_fiscais_por_empresa() {
        let nota = |numero: &str, data: &str, cfop: &str, mun: &str| -> NotaFiscal {
            serde_json::from_value(json!({
                "NUMERO_NF": numero,
                "EMIT_CNPJ": "11222333000181",
                "EMIT_MUN": mun,
                "MODELO": "55",
                "DATA_EMISSAO": data,
                "ITEMS": [{ "NUMERO": "1", "CFOP": cfop, "NCM": "22011000" }]
            }))
            .unwrap()
        };

        let sem_cnpj: NotaFiscal = serde_json::from_value(json!({ "NUMERO_NF": "9" })).unwrap();

        let notas = vec![
            nota("1", "2024-03-15T10:00:00-03:00", "5102", "Contagem"),
            nota("2", "2024-01-02T08:00:00-03:00", "5102", "Contagem"),
            nota("3", "data inválida", "5405", "Contagem"),
            // Mesmo conjunto da nota 1, mas emitida por outro município
            nota("4", "2024-02-01", "5102", "Betim"),
            sem_cnpj,
        ];

        let analises = analisar_por_empresa(&notas, &mapeamento_com_opcionais()).unwrap();
        assert_eq!(analises.len(), 1);

        let empresa = &analises[0];
        assert_eq!(empresa.periodo.inicio.as_deref(), Some("2024-01-02"));
        assert_eq!(empresa.periodo.fim.as_deref(), Some("2024-03-15"));
        assert_eq!(empresa.notas.len(), 3);
        assert_eq!(empresa.notas[0].count, 2);
        assert_eq!(empresa.notas[0].assinatura.len(), 64);
        assert_eq!(
            empresa.notas[0].cabecalho_fiscal.emit_mun.as_deref(),
            Some("Contagem")
        );
        assert_eq!(empresa.notas[1].itens_fiscais[0].cfop, "5405");
        assert_eq!(
            empresa.notas[2].cabecalho_fiscal.emit_mun.as_deref(),
            Some("Betim")
        );
    }

    #[test]
    fn presenca_de_campos_opcionais() {
        let com_cpf: NotaFiscal = serde_json::from_value(json!({
            "EMIT_CNPJ": "111",
            "DEST_CPF": "12345678901",
            "ITEMS": [{ "IPI_VIPI": null }, { "IPI_VIPI": "10.00" }]
        }))
        .unwrap();
        let sem_cpf: NotaFiscal = serde_json::from_value(json!({
            "EMIT_CNPJ": "111",
            "DEST_CPF": "",
            "ITEMS": [{ "IPI_VIPI": "5.00" }]
        }))
        .unwrap();
        let vazia: NotaFiscal =
            serde_json::from_value(json!({ "EMIT_CNPJ": "111", "ITEMS": [] })).unwrap();

        let notas = [&com_cpf, &sem_cpf, &vazia];
        let campos = campos_opcionais(&notas, &mapeamento_com_opcionais());

        // Apenas os campos marcados como opcionais
        assert_eq!(
            campos.keys().map(String::as_str).collect::<Vec<_>>(),
            ["DEST_CPF", "ITEM_IPI_VIPI"]
        );
        assert_eq!(
            campos["DEST_CPF"],
            PresencaCampo {
                presente_em: 1,
                total_notas: 3,
                percentual: 33.33
            }
        );
        assert_eq!(campos["ITEM_IPI_VIPI"].presente_em, 2);
        assert_eq!(campos["ITEM_IPI_VIPI"].percentual, 66.67);

        assert!(campos_opcionais(&[], &mapeamento_com_opcionais())["DEST_CPF"].percentual == 0.0);

        let analises = analisar_por_empresa(&[com_cpf, sem_cpf, vazia], &mapeamento_com_opcionais())
            .unwrap();
        assert_eq!(analises[0].campos_opcionais["DEST_CPF"].total_notas, 3);
    }
}
