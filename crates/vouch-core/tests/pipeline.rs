//! Integration tests for InstallerVerifier.
//!
//! Uses wiremock for the installer download and a recording fake for the
//! inspector, so these run on any platform. Malformed bodies wiremock cannot
//! produce are served from a raw socket.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use vouch_core::{
    DownloadConfig, Downloader, InstallerVerifier, PolicyCheck, ProgramOutput, PublisherPolicy,
    SignatureInspector, SignatureRecord, SignerCertificate, SubjectInfo, VouchError, VouchResult,
    EXIT_INVALID, EXIT_VALID,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSTALLER: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1 not really an msi";

/// Records what it was asked to inspect and returns a canned answer.
struct FakeInspector {
    answer: Box<dyn Fn() -> VouchResult<SignatureRecord> + Send + Sync>,
    seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakeInspector {
    fn new(answer: impl Fn() -> VouchResult<SignatureRecord> + Send + Sync + 'static) -> Self {
        Self {
            answer: Box::new(answer),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl SignatureInspector for FakeInspector {
    async fn inspect(&self, path: &Path) -> VouchResult<SignatureRecord> {
        let content = std::fs::read(path).expect("downloaded file must exist during inspection");
        self.seen.lock().unwrap().push((path.to_path_buf(), content));
        (self.answer)()
    }
}

fn record(status: i64, common_name: &str) -> SignatureRecord {
    SignatureRecord {
        signer_certificate: Some(SignerCertificate {
            raw_data: vec![0x30],
            subject: Some(SubjectInfo {
                common_name: common_name.to_string(),
                organization: "Emurasoft, Inc.".to_string(),
                state: "Washington".to_string(),
                country: "US".to_string(),
                ..SubjectInfo::default()
            }),
            ..SignerCertificate::default()
        }),
        status,
        status_message: "Signature verified.".to_string(),
        path: String::new(),
    }
}

fn verifier(inspector: FakeInspector) -> InstallerVerifier<FakeInspector> {
    let downloader = Downloader::new(DownloadConfig::default()).expect("client");
    InstallerVerifier::new(downloader, inspector, PublisherPolicy::default())
}

async fn serve_installer(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("user-agent", vouch_core::USER_AGENT_VALUE))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(INSTALLER))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_verify_url_valid_publisher() {
    let server = MockServer::start().await;
    serve_installer(&server, "/emed64_25.4.3.msi").await;

    let verifier = verifier(FakeInspector::new(|| Ok(record(0, "Emurasoft, Inc."))));
    let url = format!("{}/emed64_25.4.3.msi", server.uri());
    let report = verifier.verify_url(&url).await;

    assert!(report.cleanup.is_ok());
    assert!(report.result().expect("verdict").valid);

    let output = ProgramOutput::from_report(&report);
    assert_eq!(output.exit_code(), EXIT_VALID);
}

#[tokio::test]
async fn test_inspector_sees_complete_file_with_extension_then_it_is_removed() {
    let server = MockServer::start().await;
    serve_installer(&server, "/emed64_25.4.3.msi").await;

    let verifier = verifier(FakeInspector::new(|| Ok(record(0, "Emurasoft, Inc."))));
    let url = format!("{}/emed64_25.4.3.msi", server.uri());
    let report = verifier.verify_url(&url).await;
    assert!(report.outcome.is_ok());

    let seen = verifier.inspector().seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (path, content) = &seen[0];
    assert_eq!(content.as_slice(), INSTALLER);
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("msi"));
    assert!(!path.exists(), "temporary file must be removed");
}

#[tokio::test]
async fn test_verify_url_wrong_publisher_is_result_not_error() {
    let server = MockServer::start().await;
    serve_installer(&server, "/setup.exe").await;

    let verifier = verifier(FakeInspector::new(|| Ok(record(0, "Evil Corp"))));
    let report = verifier
        .verify_url(&format!("{}/setup.exe", server.uri()))
        .await;

    let result = report.result().expect("verdict");
    assert!(!result.valid);
    assert_eq!(result.check, Some(PolicyCheck::CommonName));

    let output = ProgramOutput::from_report(&report);
    assert_eq!(output.exit_code(), EXIT_INVALID);
    assert!(output.error.is_none());
}

#[tokio::test]
async fn test_download_404_never_reaches_inspector() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.msi"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let verifier = verifier(FakeInspector::new(|| panic!("inspector must not run")));
    let report = verifier
        .verify_url(&format!("{}/missing.msi", server.uri()))
        .await;

    match report.error() {
        Some(VouchError::Download { message, .. }) => assert!(message.contains("404"), "{message}"),
        other => panic!("expected Download error, got {:?}", other),
    }
    assert!(report.cleanup.is_ok());
}

#[tokio::test]
async fn test_non_200_success_status_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/partial.msi"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(INSTALLER))
        .mount(&server)
        .await;

    let downloader = Downloader::new(DownloadConfig::default()).unwrap();
    let err = downloader
        .download_to_temp(&format!("{}/partial.msi", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, VouchError::Download { .. }));
}

#[tokio::test]
async fn test_oversized_download_rejected() {
    let server = MockServer::start().await;
    serve_installer(&server, "/big.msi").await;

    let downloader = Downloader::new(DownloadConfig {
        max_bytes: 8,
        ..DownloadConfig::default()
    })
    .unwrap();
    let err = downloader
        .download_to_temp(&format!("{}/big.msi", server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exceeds limit"), "{err}");
}

#[tokio::test]
async fn test_download_records_digest_and_removes_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.msi"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
        .mount(&server)
        .await;

    let downloader = Downloader::new(DownloadConfig::default()).unwrap();
    let file = downloader
        .download_to_temp(&format!("{}/hello.msi", server.uri()))
        .await
        .unwrap();

    assert_eq!(file.len(), 5);
    assert_eq!(
        file.sha256(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    let path = file.path().to_path_buf();
    assert_eq!(std::fs::read(&path).unwrap(), b"hello");

    file.remove().unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_dropped_download_is_still_removed() {
    let server = MockServer::start().await;
    serve_installer(&server, "/dropped.msi").await;

    let downloader = Downloader::new(DownloadConfig::default()).unwrap();
    let file = downloader
        .download_to_temp(&format!("{}/dropped.msi", server.uri()))
        .await
        .unwrap();
    let path = file.path().to_path_buf();
    drop(file);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_inspection_error_still_cleans_up() {
    let server = MockServer::start().await;
    serve_installer(&server, "/emed.msi").await;

    let verifier = verifier(FakeInspector::new(|| {
        Err(VouchError::InspectionExecution {
            program: "pwsh".to_string(),
            message: "failed to start: No such file or directory (os error 2)".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }));
    let report = verifier
        .verify_url(&format!("{}/emed.msi", server.uri()))
        .await;

    assert!(matches!(
        report.error(),
        Some(VouchError::InspectionExecution { .. })
    ));
    assert!(report.cleanup.is_ok());

    let output = ProgramOutput::from_report(&report);
    assert!(output.result.is_none());
    assert_eq!(output.exit_code(), 4);

    let inspector = verifier.into_inspector();
    assert!(inspector.seen_paths().iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn test_verify_path_skips_download() {
    let file = tempfile::Builder::new().suffix(".msi").tempfile().unwrap();
    std::fs::write(file.path(), INSTALLER).unwrap();

    let verifier = verifier(FakeInspector::new(|| Ok(record(1, "Emurasoft, Inc."))));
    let result = verifier.verify_path(file.path()).await.unwrap();
    assert_eq!(result.check, Some(PolicyCheck::Status));
    assert!(file.path().exists(), "local files are never removed");
}

/// Serve one raw HTTP response, byte for byte, then close the connection.
async fn serve_raw_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            request.extend_from_slice(&buf[..n]);
        }
        if socket.write_all(&response).await.is_ok() {
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}", addr)
}

/// Downloads still in the temp dir whose name ends with `ext`.
fn leftover_downloads(ext: &str) -> Vec<PathBuf> {
    std::fs::read_dir(std::env::temp_dir())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("vouch-") && n.ends_with(ext))
        })
        .collect()
}

#[tokio::test]
async fn test_body_shorter_than_content_length_rejected_and_removed() {
    let mut response =
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n".to_vec();
    response.extend_from_slice(b"0123456789");
    let base = serve_raw_once(response).await;

    let downloader = Downloader::new(DownloadConfig::default()).unwrap();
    let err = downloader
        .download_to_temp(&format!("{}/short.shortbody", base))
        .await
        .unwrap_err();

    assert!(matches!(err, VouchError::Download { .. }), "{err:?}");
    assert_eq!(leftover_downloads(".shortbody"), Vec::<PathBuf>::new());
}

#[tokio::test]
async fn test_chunked_body_over_cap_rejected_and_removed() {
    let mut response =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
    for _ in 0..4 {
        response.extend_from_slice(b"10\r\n0123456789abcdef\r\n");
    }
    response.extend_from_slice(b"0\r\n\r\n");
    let base = serve_raw_once(response).await;

    let downloader = Downloader::new(DownloadConfig {
        max_bytes: 40,
        ..DownloadConfig::default()
    })
    .unwrap();
    let err = downloader
        .download_to_temp(&format!("{}/big.chunkcap", base))
        .await
        .unwrap_err();

    match &err {
        VouchError::Download { message, .. } => {
            assert!(message.contains("exceeds limit of 40 bytes"), "{message}")
        }
        other => panic!("expected Download error, got {:?}", other),
    }
    assert_eq!(leftover_downloads(".chunkcap"), Vec::<PathBuf>::new());
}

#[tokio::test]
async fn test_chunked_body_under_cap_accepted() {
    let response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n0\r\n\r\n".to_vec();
    let base = serve_raw_once(response).await;

    let downloader = Downloader::new(DownloadConfig {
        max_bytes: 40,
        ..DownloadConfig::default()
    })
    .unwrap();
    let file = downloader
        .download_to_temp(&format!("{}/small.chunkok", base))
        .await
        .unwrap();
    assert_eq!(file.len(), 5);
    file.remove().unwrap();
    assert_eq!(leftover_downloads(".chunkok"), Vec::<PathBuf>::new());
}
