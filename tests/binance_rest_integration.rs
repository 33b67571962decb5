//! Integration tests for the Binance REST client and exchange gateway
//!
//! Runs against a local wiremock server; no network access is needed.

use dca_safety_bot::binance::auth::API_KEY_HEADER;
use dca_safety_bot::common::errors::BotError;
use dca_safety_bot::common::traits::{ExchangeGateway, SignalSource};
use dca_safety_bot::common::types::{OrderStatus, Pair, Side};
use dca_safety_bot::config::types::{ApiCredentials, StrategyConfig};
use dca_safety_bot::{BinanceClient, BinanceRestClient, IndicatorSettings, KlineSignalSource};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pepe() -> Pair {
    Pair::parse("PEPE/USDT").unwrap()
}

fn signed_client(server: &MockServer) -> BinanceClient {
    let rest = BinanceRestClient::new(&server.uri())
        .unwrap()
        .with_credentials(ApiCredentials::new("test-key".to_string(), "test-secret".to_string()));
    BinanceClient::from_rest(rest)
}

fn exchange_info() -> serde_json::Value {
    json!({
        "symbols": [{
            "symbol": "PEPEUSDT",
            "status": "TRADING",
            "baseAsset": "PEPE",
            "quoteAsset": "USDT",
            "filters": [
                {"filterType": "PRICE_FILTER", "minPrice": "0.00000001", "maxPrice": "1.00000000", "tickSize": "0.00000001"},
                {"filterType": "LOT_SIZE", "minQty": "1.00", "maxQty": "92141578.00", "stepSize": "1.00"},
                {"filterType": "NOTIONAL", "minNotional": "5.00000000", "applyMinToMarket": true}
            ]
        }]
    })
}

fn order_json(order_id: u64, status: &str, side: &str, price: &str, orig: &str, executed: &str, quote: &str) -> serde_json::Value {
    json!({
        "symbol": "PEPEUSDT",
        "orderId": order_id,
        "clientOrderId": "abc",
        "price": price,
        "origQty": orig,
        "executedQty": executed,
        "cummulativeQuoteQty": quote,
        "status": status,
        "timeInForce": "GTC",
        "type": "LIMIT",
        "side": side
    })
}

async fn mount_exchange_info(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .and(query_param("symbol", "PEPEUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_info()))
        .mount(server)
        .await;
}

// ============================================================================
// Public Endpoints
// ============================================================================

#[tokio::test]
async fn test_ping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = BinanceRestClient::new(&server.uri()).unwrap();
    assert!(client.ping().await.unwrap());
}

#[tokio::test]
async fn test_min_notional_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_info()))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_client(&server);
    client.load_markets(&[pepe()]).await.unwrap();

    assert_eq!(client.min_notional(&pepe()).await.unwrap(), dec!(5));
    assert_eq!(client.min_notional(&pepe()).await.unwrap(), dec!(5));
}

#[tokio::test]
async fn test_signal_source_from_klines() {
    let server = MockServer::start().await;
    let rows: Vec<serde_json::Value> = (0..25)
        .map(|i| json!([i, "1.0", "1.01", "0.99", "1.0", "100", i + 1, "100", 5, "0", "0", "0"]))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "PEPEUSDT"))
        .and(query_param("interval", "3m"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"symbol": "PEPEUSDT", "price": "0.95000000"})))
        .mount(&server)
        .await;

    let source = KlineSignalSource::new(
        BinanceRestClient::new(&server.uri()).unwrap(),
        IndicatorSettings::from_config(&StrategyConfig::default()),
    );
    let signal = source.fetch(&pepe()).await.unwrap();

    assert_eq!(signal.price, dec!(0.95));
    assert_eq!(signal.ema, dec!(1));
    assert_eq!(signal.ema_lower_band, dec!(0.96));
}

#[tokio::test]
async fn test_signal_source_all_zero_closes() {
    let server = MockServer::start().await;
    let rows: Vec<serde_json::Value> = (0..25)
        .map(|i| json!([i, "0", "0", "0", "0", "0", i + 1, "0", 0, "0", "0", "0"]))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"symbol": "PEPEUSDT", "price": "0"})))
        .mount(&server)
        .await;

    let source = KlineSignalSource::new(
        BinanceRestClient::new(&server.uri()).unwrap(),
        IndicatorSettings::from_config(&StrategyConfig::default()),
    );
    let err = source.fetch(&pepe()).await.unwrap_err();
    assert!(matches!(err, BotError::DataUnavailable(_)));
}

// ============================================================================
// Signed Endpoints
// ============================================================================

#[tokio::test]
async fn test_market_buy_is_signed_and_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(header(API_KEY_HEADER, "test-key"))
        .and(query_param("symbol", "PEPEUSDT"))
        .and(query_param("side", "BUY"))
        .and(query_param("type", "MARKET"))
        .and(query_param("quoteOrderQty", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(
            42,
            "FILLED",
            "BUY",
            "0.00000000",
            "1000000.00",
            "1000000.00",
            "10.00000000",
        )))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let fill = client.market_buy(&pepe(), dec!(10)).await.unwrap();

    assert_eq!(fill.filled_quantity, dec!(1000000));
    assert_eq!(fill.cost, dec!(10));
    assert_eq!(fill.average_price, dec!(0.00001));

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap().to_string();
    assert!(query.contains("recvWindow=5000"));
    assert!(query.contains("timestamp="));
    assert!(query.contains("&signature="));
}

#[tokio::test]
async fn test_limit_sell_rounds_to_symbol_rules() {
    let server = MockServer::start().await;
    mount_exchange_info(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v3/order"))
        .and(header_exists(API_KEY_HEADER))
        .and(query_param("side", "SELL"))
        .and(query_param("type", "LIMIT"))
        .and(query_param("timeInForce", "GTC"))
        .and(query_param("quantity", "1234"))
        .and(query_param("price", "0.00001012"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(
            7,
            "NEW",
            "SELL",
            "0.00001012",
            "1234.00",
            "0.00",
            "0.00000000",
        )))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let handle = client
        .place_limit_sell(&pepe(), dec!(1234.56), dec!(0.0000101234))
        .await
        .unwrap();

    assert_eq!(handle.order_id, 7);
    assert_eq!(handle.side, Side::Sell);
    assert_eq!(handle.price, dec!(0.00001012));
    assert_eq!(handle.quantity, dec!(1234));
}

#[tokio::test]
async fn test_query_order_maps_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/order"))
        .and(query_param("orderId", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(
            7,
            "FILLED",
            "SELL",
            "0.00001012",
            "1000.00",
            "1000.00",
            "0.01012000",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/order"))
        .and(query_param("orderId", "8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(order_json(
            8, "CANCELED", "SELL", "0.00001012", "1000.00", "0.00", "0.00000000",
        )))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let mut handle = dca_safety_bot::OrderHandle {
        pair: pepe(),
        order_id: 7,
        side: Side::Sell,
        price: dec!(0.00001012),
        quantity: dec!(1000),
    };

    match client.query_order(&handle).await.unwrap() {
        OrderStatus::Filled(fill) => assert_eq!(fill.average_price, dec!(0.00001012)),
        other => panic!("expected a fill, got {:?}", other),
    }

    handle.order_id = 8;
    assert_eq!(client.query_order(&handle).await.unwrap(), OrderStatus::Canceled);
}

#[tokio::test]
async fn test_open_orders_and_balance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/openOrders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([order_json(
            3,
            "PARTIALLY_FILLED",
            "SELL",
            "0.00001100",
            "1000.00",
            "400.00",
            "0.00440000",
        )])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/account"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "balances": [
                {"asset": "USDT", "free": "480.5", "locked": "0"},
                {"asset": "PEPE", "free": "600.00", "locked": "600.00"}
            ]
        })))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let orders = client.open_orders(&pepe()).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, dec!(600));

    assert_eq!(client.free_balance("PEPE").await.unwrap(), dec!(600));
    assert_eq!(client.free_balance("TIA").await.unwrap(), dec!(0));
}

// ============================================================================
// Error Mapping
// ============================================================================

#[tokio::test]
async fn test_rejection_maps_to_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v3/order"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"code": -2011, "msg": "Unknown order sent."})),
        )
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let handle = dca_safety_bot::OrderHandle {
        pair: pepe(),
        order_id: 99,
        side: Side::Sell,
        price: dec!(0.00001),
        quantity: dec!(1),
    };
    match client.cancel(&handle).await.unwrap_err() {
        BotError::Exchange { code, message } => {
            assert_eq!(code, -2011);
            assert_eq!(message, "Unknown order sent.");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/price"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = BinanceRestClient::new(&server.uri()).unwrap();
    let err = client.get_ticker_price("PEPEUSDT").await.unwrap_err();
    assert!(matches!(
        err,
        BotError::RateLimit {
            retry_after_seconds: Some(30),
            ..
        }
    ));
    assert!(err.is_exchange_failure());
}
