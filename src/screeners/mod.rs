// One module per screening service plus the registry that builds them
// from the configuration.

pub mod funcion_publica;
pub mod lista_eu;
pub mod morosidad;
pub mod sdn;
pub mod vigencia;

pub use funcion_publica::FuncionPublicaScreener;
pub use lista_eu::ListaEuScreener;
pub use morosidad::MorosidadScreener;
pub use sdn::SdnScreener;
pub use vigencia::VigenciaScreener;

use crate::config::toml_config::{ScreeningConfig, ServiceDefinition, KNOWN_SERVICE_TYPES};
use crate::domain::ports::Screener;
use crate::utils::error::{Result, ScreeningError};

/// Builds one screener per requested service.
///
/// An empty selection runs every enabled service in file order. Selected
/// names must name enabled services; anything else aborts so a typo
/// cannot silently drop a list from the report.
pub fn build_screeners(
    config: &ScreeningConfig,
    selected: &[String],
) -> Result<Vec<Box<dyn Screener>>> {
    let enabled = config.enabled_services();

    for name in selected {
        if !enabled.iter().any(|definition| &definition.name == name) {
            let available: Vec<&str> = enabled.iter().map(|d| d.name.as_str()).collect();
            return Err(ScreeningError::ConfigError {
                message: format!(
                    "Unknown or disabled service '{}'. Enabled services: {}",
                    name,
                    available.join(", ")
                ),
            });
        }
    }

    let mut screeners: Vec<Box<dyn Screener>> = Vec::new();
    for definition in enabled {
        if selected.is_empty() || selected.iter().any(|name| name == &definition.name) {
            screeners.push(build_screener(definition)?);
        }
    }

    Ok(screeners)
}

fn build_screener(definition: &ServiceDefinition) -> Result<Box<dyn Screener>> {
    match definition.r#type.as_str() {
        "vigencia" => Ok(Box::new(VigenciaScreener::from_definition(definition)?)),
        "morosidad" => Ok(Box::new(MorosidadScreener::from_definition(definition)?)),
        "funcion_publica" => Ok(Box::new(FuncionPublicaScreener::from_definition(
            definition,
        )?)),
        "sdn" => Ok(Box::new(SdnScreener::from_definition(definition)?)),
        "lista_eu" => Ok(Box::new(ListaEuScreener::from_definition(definition)?)),
        other => Err(ScreeningError::InvalidConfigValueError {
            field: format!("services.{}.type", definition.name),
            value: other.to_string(),
            reason: format!("Known types: {}", KNOWN_SERVICE_TYPES.join(", ")),
        }),
    }
}
