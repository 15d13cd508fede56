use httpmock::prelude::*;
use knowme::config::toml_config::ScreeningConfig;
use knowme::core::engine::ScreeningEngine;
use knowme::utils::loader;
use knowme::utils::validation::Validate;
use knowme::{build_screeners, LocalStorage};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    // Backslashes in Windows paths break TOML strings.
    path.to_str().unwrap().replace('\\', "/")
}

fn output_dir(dir: &TempDir) -> String {
    dir.path()
        .join("salidas")
        .to_str()
        .unwrap()
        .replace('\\', "/")
}

#[tokio::test]
async fn test_end_to_end_screening_with_real_http() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = write_file(&temp_dir, "cedulas.csv", "Documento\n12345678\n87654321\n");
    let output_path = output_dir(&temp_dir);

    // Mock both registries, one response per document
    let server = MockServer::start();
    let vigencia_one = server.mock(|when, then| {
        when.method(POST)
            .path("/vigencia")
            .json_body_partial(r#"{"nuip": "12345678"}"#);
        then.status(200).json_body(serde_json::json!({"vigencia": "VIGENTE"}));
    });
    let vigencia_two = server.mock(|when, then| {
        when.method(POST)
            .path("/vigencia")
            .json_body_partial(r#"{"nuip": "87654321"}"#);
        then.status(200).json_body(serde_json::json!({"vigencia": "CANCELADA POR MUERTE"}));
    });
    let morosidad_one = server.mock(|when, then| {
        when.method(POST)
            .path("/morosidad")
            .json_body_partial(r#"{"Documento": "12345678"}"#);
        then.status(200).json_body(serde_json::json!({
            "Total": 1,
            "Data": [{"Sancionado": "JUAN PEREZ"}]
        }));
    });
    let morosidad_two = server.mock(|when, then| {
        when.method(POST)
            .path("/morosidad")
            .json_body_partial(r#"{"Documento": "87654321"}"#);
        then.status(200).json_body(serde_json::json!({"Total": 0, "Data": []}));
    });

    let config_content = format!(
        r#"
[screening]
name = "knowme"
description = "Consulta integral de documentos"
version = "1.0.0"
input = "{input}"

[[services]]
name = "Vigencia"
type = "vigencia"
url = "{base}/vigencia"
max_concurrent = 4
ip_interval = 1000

[[services]]
name = "Morosidad"
type = "morosidad"
url = "{base}/morosidad"

[output]
path = "{output}"
output_formats = ["csv"]
"#,
        input = input_path,
        base = server.base_url(),
        output = output_path
    );
    let config_path = write_file(&temp_dir, "knowme.toml", &config_content);

    let config = ScreeningConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let documents = loader::load_documents(config.input_path().unwrap()).unwrap();
    let screeners = build_screeners(&config, &[]).unwrap();
    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = ScreeningEngine::new(storage, config, screeners);

    let result = engine.run(&documents).await.unwrap();

    vigencia_one.assert();
    vigencia_two.assert();
    morosidad_one.assert();
    morosidad_two.assert();

    assert_eq!(result.outcomes.len(), 2);
    assert!(result.outcomes.iter().all(|o| o.error.is_none()));
    assert_eq!(
        result.output_files,
        vec!["resultados_scrapers_combinados.csv"]
    );

    // Verify the combined CSV on disk
    let full_path = std::path::Path::new(&output_path).join("resultados_scrapers_combinados.csv");
    assert!(full_path.exists());

    let content = std::fs::read_to_string(&full_path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Documento,Vigencia_Vigencia,Morosidad_Sancionado,Morosidad_Estado"
    );
    assert_eq!(lines.next().unwrap(), "12345678,VIGENTE,JUAN PEREZ,Moroso");
    assert_eq!(
        lines.next().unwrap(),
        "87654321,CANCELADA POR MUERTE,,No moroso"
    );
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_compressed_output_bundles_every_format() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = write_file(&temp_dir, "cedulas.csv", "Documento\n12345678\n");
    let output_path = output_dir(&temp_dir);

    let server = MockServer::start();
    let vigencia_mock = server.mock(|when, then| {
        when.method(POST).path("/vigencia");
        then.status(200).json_body(serde_json::json!({"vigencia": "VIGENTE"}));
    });

    let config_content = format!(
        r#"
[screening]
name = "knowme"
description = "Consulta integral de documentos"
version = "1.0.0"
input = "{input}"

[[services]]
name = "Vigencia"
type = "vigencia"
url = "{base}/vigencia"

[output]
path = "{output}"
output_formats = ["csv", "json"]

[output.compression]
enabled = true
filename = "resultados.zip"
"#,
        input = input_path,
        base = server.base_url(),
        output = output_path
    );
    let config_path = write_file(&temp_dir, "knowme.toml", &config_content);

    let config = ScreeningConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let documents = loader::load_documents(config.input_path().unwrap()).unwrap();
    let screeners = build_screeners(&config, &[]).unwrap();
    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = ScreeningEngine::new(storage, config, screeners);

    let result = engine.run(&documents).await.unwrap();
    vigencia_mock.assert();
    assert_eq!(result.output_files, vec!["resultados.zip"]);

    // Only the archive is written; both renderings live inside it
    let full_path = std::path::Path::new(&output_path).join("resultados.zip");
    let zip_data = std::fs::read(&full_path).unwrap();
    let cursor = std::io::Cursor::new(zip_data);
    let mut archive = zip::ZipArchive::new(cursor).unwrap();
    assert_eq!(archive.len(), 2);

    let mut csv_file = archive.by_name("resultados_scrapers_combinados.csv").unwrap();
    let mut csv_content = String::new();
    std::io::Read::read_to_string(&mut csv_file, &mut csv_content).unwrap();
    assert!(csv_content.contains("Documento,Vigencia_Vigencia"));
    assert!(csv_content.contains("12345678,VIGENTE"));
    drop(csv_file);

    let mut json_file = archive.by_name("resultados_scrapers_combinados.json").unwrap();
    let mut json_content = String::new();
    std::io::Read::read_to_string(&mut json_file, &mut json_content).unwrap();
    let records: Vec<serde_json::Value> = serde_json::from_str(&json_content).unwrap();
    assert_eq!(records[0]["Vigencia_Vigencia"], "VIGENTE");
}

#[tokio::test]
async fn test_service_selection_runs_a_subset() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = write_file(&temp_dir, "cedulas.csv", "Documento\n12345678\n");
    let output_path = output_dir(&temp_dir);

    let server = MockServer::start();
    let vigencia_mock = server.mock(|when, then| {
        when.method(POST).path("/vigencia");
        then.status(200).json_body(serde_json::json!({"vigencia": "VIGENTE"}));
    });
    let morosidad_mock = server.mock(|when, then| {
        when.method(POST).path("/morosidad");
        then.status(200).json_body(serde_json::json!({"Total": 0, "Data": []}));
    });

    let config_content = format!(
        r#"
[screening]
name = "knowme"
description = "Consulta integral de documentos"
version = "1.0.0"
input = "{input}"

[[services]]
name = "Vigencia"
type = "vigencia"
url = "{base}/vigencia"

[[services]]
name = "Morosidad"
type = "morosidad"
url = "{base}/morosidad"

[output]
path = "{output}"
output_formats = ["csv"]
"#,
        input = input_path,
        base = server.base_url(),
        output = output_path
    );
    let config_path = write_file(&temp_dir, "knowme.toml", &config_content);

    let config = ScreeningConfig::from_file(&config_path).unwrap();
    let documents = loader::load_documents(config.input_path().unwrap()).unwrap();

    let screeners = build_screeners(&config, &["Morosidad".to_string()]).unwrap();
    assert_eq!(screeners.len(), 1);

    let storage = LocalStorage::new(config.output_path().to_string());
    let engine = ScreeningEngine::new(storage, config, screeners);
    engine.run(&documents).await.unwrap();

    morosidad_mock.assert();
    assert_eq!(vigencia_mock.hits(), 0);

    let full_path = std::path::Path::new(&output_path).join("resultados_scrapers_combinados.csv");
    let content = std::fs::read_to_string(&full_path).unwrap();
    assert!(content.starts_with("Documento,Morosidad_Sancionado,Morosidad_Estado"));
    assert!(!content.contains("Vigencia"));
}

#[tokio::test]
async fn test_unknown_service_selection_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let input_path = write_file(&temp_dir, "cedulas.csv", "Documento\n12345678\n");

    let config_content = format!(
        r#"
[screening]
name = "knowme"
description = "Consulta integral de documentos"
version = "1.0.0"
input = "{input}"

[[services]]
name = "Vigencia"
type = "vigencia"
url = "https://example.com/vigencia"

[output]
path = "./salidas"
output_formats = ["csv"]
"#,
        input = input_path
    );
    let config_path = write_file(&temp_dir, "knowme.toml", &config_content);

    let config = ScreeningConfig::from_file(&config_path).unwrap();
    let err = build_screeners(&config, &["Interpol".to_string()]).unwrap_err();
    assert!(err.to_string().contains("Interpol"));
}
