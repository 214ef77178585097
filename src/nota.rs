use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registro de campos extraídos (a ordem de inserção é preservada).
pub type Registro = Map<String, Value>;

/// Nota fiscal estruturada: campos do cabeçalho mais a lista de itens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotaFiscal {
    #[serde(flatten)]
    pub cabecalho: Registro,

    #[serde(rename = "ITEMS", default)]
    pub itens: Vec<Registro>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml_filename: Option<String>,
}

impl NotaFiscal {
    pub fn campo(&self, nome: &str) -> Option<String> {
        campo(&self.cabecalho, nome)
    }

    pub fn campo_ou_vazio(&self, nome: &str) -> String {
        campo_ou_vazio(&self.cabecalho, nome)
    }

    /// Número da nota para relatórios (`NUMERO_NF`, ou `N/A`).
    pub fn numero(&self) -> String {
        self.campo("NUMERO_NF").unwrap_or_else(|| "N/A".to_string())
    }
}

/// Converte um valor extraído em texto.
///
/// `null`, texto vazio e `false` não têm valor; listas são unidas por `", "`.
///
/// ### Exemplo
/// ```
/// use classificar_notas_fiscais::valor_texto;
/// use serde_json::json;
///
/// assert_eq!(valor_texto(&json!("55")), Some("55".to_string()));
/// assert_eq!(valor_texto(&json!(["5102", "5405"])), Some("5102, 5405".to_string()));
/// assert_eq!(valor_texto(&json!(false)), None);
/// assert_eq!(valor_texto(&json!("  ")), None);
/// ```
pub fn valor_texto(valor: &Value) -> Option<String> {
    match valor {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(lista) => {
            let partes: Vec<String> = lista.iter().filter_map(valor_texto).collect();
            (!partes.is_empty()).then(|| partes.join(", "))
        }
        Value::Object(_) => Some(valor.to_string()),
    }
}

pub fn campo(registro: &Registro, nome: &str) -> Option<String> {
    registro.get(nome).and_then(valor_texto)
}

pub fn campo_ou_vazio(registro: &Registro, nome: &str) -> String {
    campo(registro, nome).unwrap_or_default()
}

/// Primeiro campo com valor entre os nomes alternativos.
pub fn primeiro_campo(registro: &Registro, nomes: &[&str]) -> Option<String> {
    nomes.iter().find_map(|nome| campo(registro, nome))
}
