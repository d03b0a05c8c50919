//! Bootstrap from configuration files through to a finished session.

mod common;

use common::{ptt_init, MockSpeechServer, Recorder};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use vrex_speech::{generate_trx, InputSource, SpeechApplication};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_configured_session_carries_sat_and_identity() {
    let sat = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sat"))
        .and(header("X-Client-Id", "client-1"))
        .and(header("X-Client-Secret", "secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"serviceAccessToken": "sat-abc"})))
        .expect(1)
        .mount(&sat)
        .await;

    let server = MockSpeechServer::start(|mut conn| async move {
        conn.recv_until("init").await;
        conn.send("listening", None).await;
        conn.send("asr", Some(json!({"text": "HBO", "isFinal": true}))).await;
        conn.send("vrexResponse", Some(json!({"returnCode": 0}))).await;
        conn.finish(0).await;
    })
    .await;

    let config = write_temp(&format!(
        r#"
connection:
  websocket:
    url: {}
    version: 3
auth:
  enabled: true
  renewInterval: 60
appId: " sdk-app "
deviceId: device-9
accountId: account-9
customerId: customer-9
"#,
        server.url
    ));
    let secrets = write_temp(&format!(
        "auth.clientId: client-1\nauth.secret: secret-1\nauth.endpoint: {}/sat\n",
        sat.uri()
    ));

    let manager = SpeechApplication::new()
        .with_config_file(config.path())
        .with_secrets_file(secrets.path())
        .without_logging()
        .init()
        .await
        .unwrap();
    assert!(manager.auth_is_enabled());
    assert_eq!(manager.app_id().as_deref(), Some("sdk-app"));

    let trx = generate_trx();
    let recorder = Recorder::new();
    let mut session = manager
        .new_session(trx.clone())
        .unwrap()
        .with_init(ptt_init())
        .with_audio(InputSource::text("HBO"))
        .with_observer(recorder.clone());
    session.start().unwrap();

    assert_eq!(
        recorder.wait_terminal().await,
        vec!["listening", "final:HBO", "response:ok", "close:0"]
    );

    server.wait_finished(1).await;
    let log = server.log(0);
    assert!(log.uri.contains("version=v3"));
    assert!(log.uri.contains("id=sdk-app"));
    assert!(log.uri.contains("sat=sat-abc"));
    assert!(log.uri.contains(&format!("trx={}", trx)));
    assert_eq!(
        log.text("init").unwrap()["msgPayload"]["id"]["values"],
        json!([
            {"key": "deviceId", "value": "device-9"},
            {"key": "accountId", "value": "account-9"},
            {"key": "customerId", "value": "customer-9"},
        ])
    );
}
