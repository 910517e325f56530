//! Integration tests for rfb-prober.
//!
//! Each test runs a scripted fake RFB server on a loopback port and probes
//! it through the public API.

use rfb_prober::{
    probe, probe_blocking, probe_with, Endpoint, FramingError, ProbeError, ProbeOptions, Prober,
    ProtocolVersion, SecurityOffer, TlsConfig,
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(2);

/// Accept one connection and hand it to `script`. Returns the endpoint to
/// probe and the server task, which yields whatever the script returns.
async fn fake_server<F, Fut, T>(script: F) -> (Endpoint, JoinHandle<T>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = T> + Send,
    T: Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        script(stream).await
    });
    (Endpoint::new("127.0.0.1", port), task)
}

/// Fake server that sends `banner`, reads the client banner, then sends
/// `offer` and waits for the client to hang up. Yields the client banner.
async fn scripted(banner: &'static [u8], offer: Vec<u8>) -> (Endpoint, JoinHandle<Vec<u8>>) {
    fake_server(move |mut stream| async move {
        stream.write_all(banner).await.unwrap();
        let mut client_banner = vec![0u8; 12];
        stream.read_exact(&mut client_banner).await.unwrap();
        stream.write_all(&offer).await.unwrap();
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
        client_banner
    })
    .await
}

fn failure_offer(reason: &[u8]) -> Vec<u8> {
    let mut offer = vec![0u8];
    offer.extend_from_slice(&(reason.len() as u32).to_be_bytes());
    offer.extend_from_slice(reason);
    offer
}

#[tokio::test]
async fn test_server_offering_none() {
    let (endpoint, server) = scripted(b"RFB 003.008\n", vec![1, 1]).await;

    let report = probe(&endpoint, TIMEOUT).await.unwrap();
    assert_eq!(report.version, ProtocolVersion::new(3, 8));
    assert_eq!(report.offer, SecurityOffer::Types(vec![1]));
    assert_eq!(report.security_type_names(), vec!["None"]);
    assert_eq!(report.endpoint, endpoint);

    assert_eq!(server.await.unwrap(), b"RFB 003.008\n".to_vec());
}

#[tokio::test]
async fn test_server_rejecting_connection() {
    let (endpoint, _server) = scripted(b"RFB 003.003\n", failure_offer(b"refused")).await;

    let report = probe(&endpoint, TIMEOUT).await.unwrap();
    assert_eq!(report.version, ProtocolVersion::V3_3);
    assert_eq!(report.rejection_reason(), Some("refused"));
    assert!(report.security_types().is_empty());
}

#[tokio::test]
async fn test_empty_rejection_reason() {
    let (endpoint, _server) = scripted(b"RFB 003.008\n", failure_offer(b"")).await;

    let report = probe(&endpoint, TIMEOUT).await.unwrap();
    assert_eq!(report.offer, SecurityOffer::Failure(String::new()));
}

#[tokio::test]
async fn test_security_types_keep_server_order() {
    let (endpoint, _server) = scripted(b"RFB 003.008\n", vec![2, 2, 1]).await;

    let report = probe(&endpoint, TIMEOUT).await.unwrap();
    assert_eq!(report.security_types(), &[2, 1]);
}

#[tokio::test]
async fn test_client_always_answers_3_8() {
    for banner in [&b"RFB 003.003\n"[..], b"RFB 003.007\n", b"RFB 004.001\n"] {
        let (endpoint, server) = scripted(banner, vec![1, 2]).await;
        let report = probe(&endpoint, TIMEOUT).await.unwrap();
        assert_eq!(report.version.to_banner(), <[u8; 12]>::try_from(banner).unwrap());
        assert_eq!(server.await.unwrap(), b"RFB 003.008\n".to_vec());
    }
}

#[tokio::test]
async fn test_closed_port_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let started = Instant::now();
    let err = probe(&Endpoint::new("127.0.0.1", port), TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Connection(_)), "got {:?}", err);
    assert!(started.elapsed() < TIMEOUT + Duration::from_millis(500));
}

#[tokio::test]
async fn test_silent_server_times_out_as_short_banner() {
    let (endpoint, _server) = fake_server(|stream| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    })
    .await;

    let timeout = Duration::from_millis(300);
    let started = Instant::now();
    let err = probe(&endpoint, timeout).await.unwrap_err();

    assert!(
        matches!(err, ProbeError::Framing(FramingError::ShortBanner { received: 0 })),
        "got {:?}",
        err
    );
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn test_short_banner_then_close() {
    let (endpoint, _server) = fake_server(|mut stream| async move {
        stream.write_all(b"RFB 003").await.unwrap();
    })
    .await;

    let err = probe(&endpoint, TIMEOUT).await.unwrap_err();
    assert!(
        matches!(err, ProbeError::Framing(FramingError::ShortBanner { received: 7 })),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_non_rfb_server_is_framing_error() {
    let (endpoint, _server) = fake_server(|mut stream| async move {
        stream.write_all(b"SSH-2.0-Open").await.unwrap();
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    })
    .await;

    let err = probe(&endpoint, TIMEOUT).await.unwrap_err();
    assert!(
        matches!(err, ProbeError::Framing(FramingError::MalformedBanner(_))),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_truncated_reason_is_framing_error() {
    let mut offer = vec![0u8];
    offer.extend_from_slice(&10u32.to_be_bytes());
    offer.extend_from_slice(b"abc");
    let (endpoint, _server) = fake_server(move |mut stream| async move {
        stream.write_all(b"RFB 003.008\n").await.unwrap();
        let mut client_banner = [0u8; 12];
        stream.read_exact(&mut client_banner).await.unwrap();
        stream.write_all(&offer).await.unwrap();
    })
    .await;

    let err = probe(&endpoint, TIMEOUT).await.unwrap_err();
    assert!(
        matches!(err, ProbeError::Framing(FramingError::ShortRead { field: "failure reason" })),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_stall_inside_reason_times_out_on_that_field() {
    let (endpoint, _server) = fake_server(|mut stream| async move {
        stream.write_all(b"RFB 003.008\n").await.unwrap();
        let mut client_banner = [0u8; 12];
        stream.read_exact(&mut client_banner).await.unwrap();
        stream.write_all(&[0, 0, 0, 0, 10, b'a']).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    })
    .await;

    let timeout = Duration::from_millis(300);
    let started = Instant::now();
    let err = probe(&endpoint, timeout).await.unwrap_err();

    assert!(
        matches!(err, ProbeError::Framing(FramingError::ShortRead { field: "failure reason" })),
        "got {:?}",
        err
    );
    assert!(started.elapsed() < timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn test_stall_after_client_banner_times_out_on_count() {
    let (endpoint, _server) = fake_server(|mut stream| async move {
        stream.write_all(b"RFB 003.008\n").await.unwrap();
        let mut client_banner = [0u8; 12];
        stream.read_exact(&mut client_banner).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    })
    .await;

    let err = probe(&endpoint, Duration::from_millis(300)).await.unwrap_err();
    assert!(
        matches!(
            err,
            ProbeError::Framing(FramingError::ShortRead { field: "security type count" })
        ),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_stalled_tls_handshake_is_connect_timeout() {
    let (endpoint, _server) = fake_server(|stream| async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    })
    .await;

    let timeout = Duration::from_millis(300);
    let options = ProbeOptions::new(timeout).with_tls(TlsConfig::new().disable_verification());
    let started = Instant::now();
    let err = probe_with(&endpoint, &options).await.unwrap_err();

    assert!(matches!(err, ProbeError::Connection(_)), "got {:?}", err);
    assert!(err.is_timeout());
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < timeout + Duration::from_millis(500));
}

#[tokio::test]
async fn test_repeated_probes_agree() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = Endpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                stream.write_all(b"RFB 003.008\n").await.unwrap();
                let mut client_banner = [0u8; 12];
                stream.read_exact(&mut client_banner).await.unwrap();
                stream.write_all(&[2, 2, 1]).await.unwrap();
            });
        }
    });

    let first = probe(&endpoint, TIMEOUT).await.unwrap();
    let second = probe(&endpoint, TIMEOUT).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_probe_all_keeps_input_order() {
    let (first, _a) = scripted(b"RFB 003.008\n", vec![1, 1]).await;
    let (second, _b) = scripted(b"RFB 003.003\n", failure_offer(b"busy")).await;

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let third = Endpoint::new("127.0.0.1", closed.local_addr().unwrap().port());
    drop(closed);

    let prober = Prober::new(ProbeOptions::new(TIMEOUT)).with_concurrency(3);
    let results = prober
        .probe_all(vec![first.clone(), second.clone(), third.clone()])
        .await;

    let endpoints: Vec<_> = results.iter().map(|(e, _)| e.clone()).collect();
    assert_eq!(endpoints, vec![first, second, third]);

    assert_eq!(results[0].1.as_ref().unwrap().security_types(), &[1]);
    assert_eq!(results[1].1.as_ref().unwrap().rejection_reason(), Some("busy"));
    assert!(matches!(results[2].1, Err(ProbeError::Connection(_))));
}

#[test]
fn test_probe_blocking_from_plain_thread() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = Endpoint::new("127.0.0.1", listener.local_addr().unwrap().port());
    let server = std::thread::spawn(move || {
        use std::io::{Read, Write};
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"RFB 003.008\n").unwrap();
        let mut client_banner = [0u8; 12];
        stream.read_exact(&mut client_banner).unwrap();
        stream.write_all(&[1, 2]).unwrap();
        client_banner
    });

    let report = probe_blocking(&endpoint, TIMEOUT).unwrap();
    assert_eq!(report.security_types(), &[2]);
    assert_eq!(&server.join().unwrap(), b"RFB 003.008\n");
}
