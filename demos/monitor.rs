use std::net::SocketAddr;

use tcnet_ltc::core::PORT_TIME;
use tcnet_ltc::network::monitor::Monitor;
use tcnet_ltc::protocol::Message;
use tcnet_ltc::time::TimeCodeType;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> tcnet_ltc::Result<()> {
    tracing_subscriber::fmt::init();

    let port = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(PORT_TIME);
    let mut monitor = Monitor::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;

    while let Some(received) = monitor.next_message().await {
        match received {
            Ok((Message::Time(packet), from)) => match packet.timecode(TimeCodeType::default()) {
                Ok(tc) => info!(%from, layer = %packet.layer, "{}", tc),
                Err(e) => warn!(%from, error = %e, "Invalid time message"),
            },
            Ok((Message::OptIn(opt_in), from)) => {
                info!(%from, name = %opt_in.header.node_name, node_type = ?opt_in.header.node_type, "Opt-in")
            }
            Ok((other, from)) => info!(%from, message_type = ?other.message_type(), "Packet"),
            Err(e) => warn!(error = %e, "Receive failed"),
        }
    }
    Ok(())
}
