use execution_time::ExecutionTime;
use std::process;
use tracing_subscriber::EnvFilter;

use classificar_notas_fiscais::{
    BaseCfop, Config, FiscalResult, Mapeamento, agrupar_cenarios, analisar_por_empresa,
    clear_screen, estrutura_hierarquica, get_config, imprimir_estatisticas,
    imprimir_versao_do_programa, montar_linhas, processar_pasta, processar_pasta_plano,
    salvar_cenarios_csv, salvar_json, salvar_notas_json, salvar_registros_json,
    salvar_relatorio_csv,
};

fn main() {
    // A forma mais idiomática de reportar erros ao usuário final sem stack trace técnico
    if let Err(err) = run() {
        eprintln!("\n[ERRO CRÍTICO]: {err}");
        process::exit(1);
    }
}

/// `RUST_LOG` tem prioridade; sem ele, `info` (ou `debug` com `--verbose`).
fn iniciar_log(config: &Config) {
    let padrao = if config.verbose { "debug" } else { "info" };
    let filtro = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(padrao));

    tracing_subscriber::fmt()
        .with_env_filter(filtro)
        .with_target(false)
        .init();
}

fn carregar_mapeamento(config: &Config) -> FiscalResult<Mapeamento> {
    match &config.mapeamento {
        Some(path) => Mapeamento::from_path(path),
        None => Mapeamento::padrao(),
    }
}

fn run() -> FiscalResult<()> {
    let timer = ExecutionTime::start();

    // 1. Obter Configurações
    let config = get_config()?;
    iniciar_log(&config);

    // 2. Setup inicial
    clear_screen(config.clear)?;
    imprimir_versao_do_programa();

    if config.verbose {
        println!("{:#?}\n", config);
    }

    // 3. Mapeamento e base de CFOP
    let mapeamento = carregar_mapeamento(&config)?;
    println!(" Mapeamento com {} campos.\n", mapeamento.len());

    let base_cfop = BaseCfop::carregar(config.base_cfop.as_ref())?;

    // 4. Extração das notas (paralelo)
    let notas = processar_pasta(&config.arquivos_xml, &mapeamento);
    salvar_notas_json(&notas, &config.saida("resposta_notas.json"))?;

    if config.plano {
        let registros = processar_pasta_plano(&config.arquivos_xml, &mapeamento);
        salvar_registros_json(&registros, &config.saida("registros_planos.json"))?;
    }

    // 5. Relatório customizado (uma linha por item)
    let linhas = montar_linhas(&notas, &base_cfop)?;
    salvar_relatorio_csv(&linhas, &config.saida("relatorio_customizado.csv"))?;

    // 6. Cenários agrupados
    let grupos = agrupar_cenarios(&linhas);
    salvar_cenarios_csv(&grupos, &config.saida("relatorio_agrupado.csv"))?;

    let estrutura = estrutura_hierarquica(&grupos);
    salvar_json(&estrutura, &config.saida("relatorio_agrupado.json"))?;
    println!(
        " Estrutura hierárquica ({} emitentes) salva em: <{}>",
        estrutura.total_emitentes,
        config.saida("relatorio_agrupado.json").display()
    );

    // 7. Análise por empresa emitente
    println!();
    let analises = analisar_por_empresa(&notas, &mapeamento)?;
    salvar_json(&analises, &config.saida("analise_por_empresa.json"))?;
    println!(
        " Análise por empresa salva em: <{}>",
        config.saida("analise_por_empresa.json").display()
    );

    // 8. Estatísticas
    imprimir_estatisticas(&notas);

    println!(
        " Processamento concluído: {} de {} arquivo(s) XML.\n",
        notas.len(),
        config.arquivos_xml.len()
    );
    timer.print_elapsed_time();

    Ok(())
}
