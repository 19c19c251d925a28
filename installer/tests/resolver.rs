//! Content resolver tests against a mocked platform API

use std::sync::Arc;

use manifest_models::InstallItem;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use genai_installer::app::options::InstallConfig;
use genai_installer::fetch::DefaultFetcher;
use genai_installer::http::client::HttpClient;
use genai_installer::platform::{ContentOutcome, ContentResolver};
use genai_installer::utils::hex;
use sha2::{Digest, Sha256};

const MODEL_BYTES: &[u8] = b"weights for version two hundred";

fn model_info(server: &MockServer, sha256: &str) -> Value {
    json!({
        "id": 8030,
        "name": "Analog Madness",
        "description": "<p>Film look</p>",
        "type": "Checkpoint",
        "modelVersions": [
            {
                "id": 100,
                "name": "v1",
                "baseModel": "SD 1.5",
                "files": [{
                    "type": "Model",
                    "name": "analogMadness_v1.safetensors",
                    "downloadUrl": format!("{}/download/100", server.uri()),
                    "sizeKB": 10.0
                }],
                "images": []
            },
            {
                "id": 200,
                "name": "v2",
                "baseModel": "SD 1.5",
                "description": "Second release",
                "trainedWords": ["analog style"],
                "files": [
                    {
                        "type": "Model",
                        "name": "analogMadness_v2.safetensors",
                        "downloadUrl": format!("{}/download/200", server.uri()),
                        "sizeKB": 20.0,
                        "hashes": { "SHA256": sha256 }
                    },
                    {
                        "type": "Negative",
                        "name": "analogMadness_neg.pt",
                        "downloadUrl": format!("{}/download/200-neg", server.uri()),
                        "sizeKB": 1.0
                    }
                ],
                "images": [{ "url": format!("{}/images/200.png", server.uri()) }]
            }
        ]
    })
}

fn item(version: Option<u64>) -> InstallItem {
    serde_json::from_value(json!({
        "type": "civitai",
        "path": "models/checkpoints/sd",
        "note": "Analog Madness",
        "modelId": 8030,
        "versionId": version
    }))
    .unwrap()
}

fn resolver(server: &MockServer, staging: &std::path::Path) -> ContentResolver {
    let config = InstallConfig {
        staging_dir: staging.to_path_buf(),
        ..Default::default()
    };
    let fetcher = Arc::new(DefaultFetcher::new(&config, false).unwrap());
    let http = HttpClient::new(&format!("{}/api/v1/models/", server.uri())).unwrap();
    ContentResolver::new(http, fetcher, staging.to_path_buf())
}

async fn mount_metadata(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/models/8030"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_explicit_version_installs_model_and_sidecars() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(&server, model_info(&server, &hex::encode(Sha256::digest(MODEL_BYTES)).to_uppercase())).await;

    Mock::given(method("GET"))
        .and(path("/download/200"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/200.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".as_slice()))
        .expect(1)
        .mount(&server)
        .await;

    let dest = tmp.path().join("models/checkpoints/sd");
    let outcome = resolver(&server, tmp.path()).install(&item(Some(200)), &dest).await.unwrap();

    assert_eq!(outcome, ContentOutcome::Installed(dest.join("analogMadness_v2.safetensors")));
    assert_eq!(std::fs::read(dest.join("analogMadness_v2.safetensors")).unwrap(), MODEL_BYTES);
    assert_eq!(std::fs::read(dest.join("analogMadness_v2.png")).unwrap(), b"png");

    let record: Value = serde_json::from_str(&std::fs::read_to_string(dest.join("analogMadness_v2.json")).unwrap()).unwrap();
    assert_eq!(record["versionName"], "v2");
    assert_eq!(record["baseModel"], "SD 1.5");
    assert_eq!(record["notes"], "Second release");
    assert_eq!(record["trainedWords"][0], "analog style");
    assert_eq!(record["extensions"]["genai_installer"]["versionId"], 200);

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(dest.join("analogMadness_v2.civitai.info")).unwrap()).unwrap();
    assert_eq!(raw["modelVersions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_file_is_not_downloaded_again() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(&server, model_info(&server, "00")).await;

    Mock::given(method("GET"))
        .and(path("/download/100"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .expect(0)
        .mount(&server)
        .await;

    let dest = tmp.path().join("models/checkpoints/sd");
    std::fs::create_dir_all(&dest).unwrap();
    std::fs::write(dest.join("analogMadness_v1.safetensors"), b"already here").unwrap();

    let outcome = resolver(&server, tmp.path()).install(&item(None), &dest).await.unwrap();

    assert_eq!(
        outcome,
        ContentOutcome::AlreadyInstalled(dest.join("analogMadness_v1.safetensors"))
    );
    assert!(!dest.join("analogMadness_v1.json").exists());
}

#[tokio::test]
async fn test_empty_version_list_is_not_found() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(&server, json!({ "id": 8030, "name": "Gone", "modelVersions": [] })).await;

    let err = resolver(&server, tmp.path())
        .install(&item(None), tmp.path())
        .await
        .unwrap_err();

    assert!(err.is_skip(), "{}", err);
}

#[tokio::test]
async fn test_unknown_version_and_missing_model_are_not_found() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(&server, model_info(&server, "00")).await;

    let resolver = resolver(&server, tmp.path());
    assert!(resolver.install(&item(Some(999)), tmp.path()).await.unwrap_err().is_skip());

    let mut missing = item(None);
    missing.platform_id = Some(1);
    assert!(resolver.install(&missing, tmp.path()).await.unwrap_err().is_skip());
}

#[tokio::test]
async fn test_checksum_mismatch_removes_download() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(&server, model_info(&server, &"ab".repeat(32))).await;

    Mock::given(method("GET"))
        .and(path("/download/200"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/200.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".as_slice()))
        .mount(&server)
        .await;

    let dest = tmp.path().join("sd");
    let err = resolver(&server, tmp.path())
        .install(&item(Some(200)), &dest)
        .await
        .unwrap_err();

    assert!(err.is_skip());
    assert!(!dest.join("analogMadness_v2.safetensors").exists());
    assert!(!dest.join("analogMadness_v2.png").exists());
    assert!(!dest.join("analogMadness_v2.json").exists());
    assert!(!dest.join("analogMadness_v2.civitai.info").exists());
}

#[tokio::test]
async fn test_first_listed_accepted_file_is_installed() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    mount_metadata(
        &server,
        json!({
            "id": 8030,
            "name": "Analog Madness",
            "modelVersions": [{
                "id": 300,
                "name": "v3",
                "files": [
                    { "type": "Training Data", "name": "dataset.zip", "downloadUrl": format!("{}/download/300-data", server.uri()) },
                    { "type": "Negative", "name": "analogNeg.pt", "downloadUrl": format!("{}/download/300-neg", server.uri()) },
                    { "type": "Model", "name": "analogMadness_v3.safetensors", "downloadUrl": format!("{}/download/300", server.uri()) }
                ],
                "images": []
            }]
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/download/300-neg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"embedding".as_slice()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/300"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MODEL_BYTES))
        .expect(0)
        .mount(&server)
        .await;

    let dest = tmp.path().join("models/embeddings");
    let outcome = resolver(&server, tmp.path()).install(&item(None), &dest).await.unwrap();

    assert_eq!(outcome, ContentOutcome::Installed(dest.join("analogNeg.pt")));
    assert!(dest.join("analogNeg.json").exists());
    assert!(!dest.join("analogMadness_v3.safetensors").exists());
}
