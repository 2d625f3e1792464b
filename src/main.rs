use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cfdi_historico::cli::Cli;
use cfdi_historico::config::{PortalConfig, RetryPolicy};
use cfdi_historico::scraping::form_state::FieldSet;
use cfdi_historico::scraping::paginator::NextLinkDiscovery;
use cfdi_historico::RunOptions;

#[tokio::main]
async fn main() -> Result<()> {
    // Carga las variables de entorno desde el archivo .env. Falla
    // silenciosamente si no existe.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let field_set = if cli.strict_fields {
        FieldSet::Strict
    } else {
        FieldSet::Extended
    };
    let next_link = match cli.next_link_id {
        Some(id) => NextLinkDiscovery::ById(id),
        None => NextLinkDiscovery::ByText,
    };

    let options = RunOptions {
        rfc_rec: cli.rfc,
        month: cli.month,
        year: cli.year,
        out_parent: cli.out_dir,
        field_set,
        next_link,
        portal: PortalConfig::from_env(),
        policy: RetryPolicy::default(),
    };

    let summary = cfdi_historico::run(options).await?;
    info!(
        "Resumen: {} registros encontrados, {} archivos descargados, {} combinados",
        summary.records_found, summary.files_downloaded, summary.files_merged
    );
    Ok(())
}
