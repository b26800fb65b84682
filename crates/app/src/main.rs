//! Local smoke harness: wires the service graph against the mock rail and
//! walks one wallet through a fund → trade → transfer → bill payment day.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::info;

use centavo_app::{AppConfig, AppServices};
use centavo_core::{Currency, InstrumentId, OwnerId, ProviderId};
use centavo_infra::MockGateway;
use centavo_trading::TradeSide;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    centavo_observability::init();

    let config = AppConfig::load()?;
    let services = AppServices::new(config, Arc::new(MockGateway::new()));
    let reconciler = services.spawn_reconciler(Duration::from_secs(30));

    let owner = OwnerId::new();
    let wallet = services.create_wallet(owner, Currency::Ngn)?;
    services.deposit(wallet.account_id, 1_000_00, None)?;

    let trade = services.execute_trade(
        wallet.account_id,
        InstrumentId::from_str("SAFCOM")?,
        TradeSide::Buy,
        Decimal::from(10),
        50_00,
    )?;
    info!(trade_id = %trade.trade_id, total = trade.total, "bought a position");

    let friend = services.create_wallet(OwnerId::new(), Currency::Ngn)?;
    let transfer = services.send_money(wallet.account_id, friend.account_id, 100_00, None)?;
    info!(transfer_id = %transfer.transfer_id, state = ?transfer.state, "sent money");

    let bill = services
        .pay_bill(
            wallet.account_id,
            ProviderId::from_str("dstv")?,
            "4040123456",
            50_00,
        )
        .await?;
    info!(payment_id = %bill.payment_id, state = ?bill.state, "bill payment submitted");

    let balance = services.get_balance(wallet.account_id)?;
    info!(
        balance = balance.balance,
        version = balance.version,
        "end of day"
    );

    reconciler.shutdown().await;
    services.shutdown();
    Ok(())
}
