mod args;
mod caminho;
mod cenarios;
mod classificacao;
mod console;
mod documento;
mod error;
mod extrator;
mod mapeamento;
mod nota;
mod regex;
mod relatorio;
mod tabelas;
mod tributos;

pub use self::{
    args::*, caminho::*, cenarios::*, classificacao::*, console::*, documento::*, error::*,
    extrator::*, mapeamento::*, nota::*, regex::*, relatorio::*, tabelas::*, tributos::*,
};
