//! Live integration tests against the production platform.
//!
//! These exercise the full resolve → connect → subscribe → receive →
//! close lifecycle over the public endpoints with the anonymous auth
//! token (delayed data).
//!
//! All tests are `#[ignore]` because they require network access.
//!
//! Run with:
//! ```bash
//! cargo test --test stream_live -- --ignored
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::time::timeout;

use chartfeed::prelude::*;

const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Liquid around the clock, so quote updates arrive within seconds.
const TEST_SYMBOL: &str = "BINANCE:BTCUSDT";

fn live_client() -> ChartfeedClient {
    // An optional session cookie in .env unlocks private indicators.
    dotenvy::dotenv().ok();
    let mut builder = ChartfeedClient::builder();
    if let Ok(cookie) = std::env::var("CHARTFEED_SESSION_COOKIE") {
        builder = builder.session_cookie(&cookie);
    }
    builder.build()
}

/// Wait for the next packet matching the predicate, ignoring others.
async fn next_matching(stream: &mut PacketStream, predicate: impl Fn(&Packet) -> bool) -> Packet {
    timeout(TEST_TIMEOUT, async {
        while let Some(packet) = stream.next().await {
            let packet = packet.expect("stream errored");
            if predicate(&packet) {
                return packet;
            }
        }
        panic!("stream ended without a matching packet");
    })
    .await
    .expect("timed out waiting for a matching packet")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
#[ignore]
async fn stream_quotes_receives_an_update() {
    let client = live_client();
    let mut stream = client
        .streamer()
        .stream_quotes(&[TEST_SYMBOL])
        .await
        .unwrap();

    let packet = next_matching(&mut stream, |p| p.kind == PacketKind::QuoteData).await;
    let update = packet.as_quote().expect("quote payload should decode");
    assert_eq!(update.symbol.as_str(), TEST_SYMBOL);

    stream.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn stream_ohlc_receives_history() {
    let client = live_client();
    let mut stream = client
        .streamer()
        .stream_ohlc(TEST_SYMBOL, Timeframe::Minute5)
        .await
        .unwrap();

    let packet = next_matching(&mut stream, |p| p.kind == PacketKind::ChartData).await;
    let bars = packet.as_bars();
    assert!(!bars.is_empty(), "initial history should carry bars");

    // The initial load ends with a series-complete marker.
    let _ = next_matching(&mut stream, |p| p.kind == PacketKind::SeriesComplete).await;

    stream.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn stream_with_indicator_receives_study_data() {
    let client = live_client();
    let spec = SubscriptionSpec::new(TEST_SYMBOL)
        .timeframe(Timeframe::Minute5)
        .indicator(IndicatorSpec::with_version("STD;RSI", "last"));
    let mut stream = client.streamer().stream(&[spec]).await.unwrap();

    let packet = next_matching(&mut stream, |p| p.kind == PacketKind::StudyData).await;
    let points = packet.as_study_points();
    assert!(!points.is_empty(), "study history should carry points");

    stream.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn add_symbols_mid_stream() {
    let client = live_client();
    let mut stream = client
        .streamer()
        .stream_quotes(&[TEST_SYMBOL])
        .await
        .unwrap();

    // Drain one update so the session is live, then widen it.
    let first = next_matching(&mut stream, |p| p.kind == PacketKind::QuoteData).await;
    let session = first.session.clone().expect("quote data carries its session");

    stream
        .handle()
        .add_symbols(&session, vec!["BINANCE:ETHUSDT".parse().unwrap()])
        .await
        .unwrap();

    let eth = next_matching(&mut stream, |p| {
        p.as_quote()
            .is_some_and(|q| q.symbol.as_str() == "BINANCE:ETHUSDT")
    })
    .await;
    assert_eq!(eth.kind, PacketKind::QuoteData);

    stream.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn resolve_builtin_indicator_metadata() {
    let client = live_client();
    let meta = client.indicators().resolve("STD;RSI", "last").await.unwrap();
    assert_eq!(meta.id, "STD;RSI");
    assert!(!meta.script.is_empty());

    // Served from the cache on the second call.
    let again = client.indicators().resolve("STD;RSI", "last").await.unwrap();
    assert_eq!(again, meta);
}

#[tokio::test]
#[ignore]
async fn technicals_snapshot_for_symbol() {
    let client = live_client();
    let symbol: Symbol = TEST_SYMBOL.parse().unwrap();
    let snapshot = client
        .technicals()
        .scrape(&symbol, Timeframe::Hour1, &TechnicalsSelection::All)
        .await;
    assert!(snapshot.is_success(), "scrape failed: {:?}", snapshot.error);
    assert!(snapshot.data.contains_key("RSI"));
}
