use options_data::{Endpoint, GatewayError, HttpGateway, OptionType, OptionsGateway};
use rust_decimal_macros::dec;
use std::time::Duration;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};
use url::Url;

/// Serve exactly one HTTP request with a canned response.
///
/// Resolves to the request line the client sent (eg/ "GET /api/status HTTP/1.1").
async fn serve_once(status_line: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buffer = [0u8; 1024];
        while !request.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).await.unwrap();
            if read == 0 {
                break;
            }
            request.extend_from_slice(&buffer[..read]);
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    let url = Url::parse(&format!("http://{addr}")).unwrap();
    (url, handle)
}

#[tokio::test]
async fn fetch_chart_series_requests_hours_and_decodes() {
    let body = r#"{
        "price_data": [
            {"timestamp": "2024-03-01T12:00:00", "option_type": "ITM", "symbol": "BTC-8MAR24-59000-C",
             "strike": 59000, "premium": 0.061, "iv": 0.48, "spot_price": 62000}
        ],
        "iv_data": []
    }"#;
    let (url, server) = serve_once("200 OK", body).await;

    let gateway = HttpGateway::new(&url).unwrap();
    let chart = gateway.fetch_chart_series(24).await.unwrap();

    assert_eq!(server.await.unwrap(), "GET /api/chart-data?hours=24 HTTP/1.1");

    let samples = chart.into_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].option_type, OptionType::Itm);
    assert_eq!(samples[0].spot_price, dec!(62000));
}

#[tokio::test]
async fn fetch_latest_snapshot_decodes_array() {
    let body = r#"[
        {"timestamp": "2024-03-01T12:00:00Z", "option_type": "ATM", "symbol": "BTC-8MAR24-62000-C",
         "strike": "62000", "premium": "0.042", "iv": "0.45", "spot_price": "62010.5"},
        {"timestamp": "2024-03-01T12:00:00Z", "option_type": "OTM", "symbol": "BTC-8MAR24-65000-C",
         "strike": "65000", "premium": "0.012", "iv": "0.52", "spot_price": "62010.5"}
    ]"#;
    let (url, server) = serve_once("200 OK", body).await;

    let gateway = HttpGateway::new(&url).unwrap();
    let latest = gateway.fetch_latest_snapshot().await.unwrap();

    assert_eq!(server.await.unwrap(), "GET /api/latest-data HTTP/1.1");
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[1].premium, dec!(0.012));
}

#[tokio::test]
async fn fetch_system_status_server_error_is_classified() {
    let (url, server) = serve_once("500 Internal Server Error", r#"{"detail": "boom"}"#).await;

    let gateway = HttpGateway::new(&url).unwrap();
    let error = gateway.fetch_system_status().await.unwrap_err();
    server.await.unwrap();

    assert_eq!(
        error,
        GatewayError::Server {
            endpoint: Endpoint::Status,
            status: 500
        }
    );
    assert!(error.is_server_fault());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (url, server) = serve_once("200 OK", r#"{"unexpected": true}"#).await;

    let gateway = HttpGateway::new(&url).unwrap();
    let error = gateway.fetch_latest_snapshot().await.unwrap_err();
    server.await.unwrap();

    assert!(
        matches!(
            error,
            GatewayError::Decode {
                endpoint: Endpoint::LatestData,
                ..
            }
        ),
        "unexpected error: {error:?}"
    );
}

#[tokio::test]
async fn trigger_collection_posts_and_reads_message() {
    let (url, server) = serve_once("200 OK", r#"{"message": "Collection started"}"#).await;

    let gateway = HttpGateway::new(&url).unwrap();
    let ack = gateway.trigger_collection().await.unwrap();

    assert_eq!(
        server.await.unwrap(),
        "POST /api/trigger-collection HTTP/1.1"
    );
    assert_eq!(ack.status_code, 200);
    assert_eq!(ack.message.as_deref(), Some("Collection started"));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    // Bind then drop to obtain a port with nothing listening on it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = Url::parse(&format!("http://{addr}")).unwrap();
    let gateway = HttpGateway::with_timeout(&url, Duration::from_secs(2)).unwrap();
    let error = gateway.fetch_chart_series(1).await.unwrap_err();

    assert!(error.is_network(), "unexpected error: {error:?}");
    assert_eq!(error.endpoint(), Some(Endpoint::ChartData));
}
