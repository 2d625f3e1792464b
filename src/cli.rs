use clap::Parser;
use std::path::PathBuf;

/// Descarga las facturas CFDI históricas de un mes y las combina en un
/// solo PDF.
#[derive(Parser, Debug)]
#[command(name = "cfdi-historico", version)]
pub struct Cli {
    /// RFC del receptor cuyas facturas se consultan
    #[arg(long, value_name = "RFC")]
    pub rfc: String,

    /// Mes objetivo (1-12)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: u32,

    /// Año objetivo
    #[arg(long)]
    pub year: i32,

    /// Directorio padre donde crear la carpeta de salida de la corrida
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Replicar solo el trío de campos ocultos requeridos en cada postback
    /// en vez del conjunto extendido
    #[arg(long)]
    pub strict_fields: bool,

    /// Localizar el enlace de paginación por id de elemento en vez de por
    /// su texto ("Siguiente"/"Next")
    #[arg(long, value_name = "ELEMENT_ID")]
    pub next_link_id: Option<String>,

    /// Salida detallada
    #[arg(short, long)]
    pub verbose: bool,
}
